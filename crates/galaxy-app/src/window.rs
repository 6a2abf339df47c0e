//! Window creation and event handling via winit.
//!
//! [`GalaxyApp`] implements winit's [`ApplicationHandler`]: it owns the
//! generated galaxy, the GPU backend and the layered compositor, and drives
//! one LOD update plus one composited frame per redraw.

use std::sync::Arc;

use galaxy_config::{BloomSettings, CameraConfig, Config, FogSettings, RenderConfig};
use galaxy_input::PointerState;
use galaxy_render::{
    BloomConfig, Camera, ControlIntegration, Fog, GpuBackend, LayeredCompositor, RenderLayer,
    init_render_context_blocking, linear_rgb_from_hex,
};
use galaxy_space::{ConfigurationError, Galaxy};
use glam::Vec3;
use tracing::{error, info, instrument, warn};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::frame_stats::FrameStats;
use crate::orbit_controls::{OrbitControls, OrbitSettings};

/// Errors that stop the viewer before or while the event loop runs.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid galaxy configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("event loop failed: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

/// Returns [`WindowAttributes`] based on the given configuration.
pub fn window_attributes_from_config(config: &Config) -> WindowAttributes {
    WindowAttributes::default()
        .with_title(config.window.title.clone())
        .with_inner_size(winit::dpi::LogicalSize::new(
            config.window.width as f64,
            config.window.height as f64,
        ))
}

/// Initial camera placement for a viewport of `width` x `height`.
pub fn camera_from_config(config: &CameraConfig, width: u32, height: u32) -> Camera {
    let mut camera = Camera {
        fov_y: config.fov_y_degrees.to_radians(),
        near: config.near,
        far: config.far,
        ..Camera::looking_at(
            Vec3::from_array(config.start_position),
            Vec3::from_array(config.target),
        )
    };
    camera.set_aspect_ratio(width as f32, height as f32);
    camera
}

pub fn bloom_config(settings: &BloomSettings) -> BloomConfig {
    BloomConfig {
        threshold: settings.threshold,
        soft_knee: settings.soft_knee,
        strength: settings.strength,
        radius: settings.radius,
        iterations: settings.iterations,
    }
}

pub fn fog(settings: &FogSettings) -> Fog {
    Fog {
        color: linear_rgb_from_hex(settings.color),
        density: settings.density,
    }
}

pub fn control_integration(config: &RenderConfig) -> ControlIntegration {
    if config.single_base_render {
        ControlIntegration::BeforeBase
    } else {
        ControlIntegration::BetweenBaseRenders
    }
}

/// Application state: window, GPU backend, galaxy and camera controls.
pub struct GalaxyApp {
    config: Config,
    window: Option<Arc<Window>>,
    backend: Option<GpuBackend>,
    controls: Option<OrbitControls>,
    galaxy: Galaxy,
    compositor: LayeredCompositor,
    pointer: PointerState,
    frame_stats: FrameStats,
    /// Camera moved since the last LOD update.
    lod_dirty: bool,
}

impl GalaxyApp {
    /// Generate the galaxy. Fails before any window exists if the
    /// configuration is invalid.
    pub fn new(config: Config) -> Result<Self, ConfigurationError> {
        let galaxy = Galaxy::build(&config)?;
        let compositor = LayeredCompositor::new(
            config.window.width,
            config.window.height,
            control_integration(&config.render),
        );
        let frame_stats = FrameStats::new(config.debug.frame_stats_interval);
        Ok(Self {
            config,
            window: None,
            backend: None,
            controls: None,
            galaxy,
            compositor,
            pointer: PointerState::new(),
            frame_stats,
            lod_dirty: true,
        })
    }

    pub fn galaxy(&self) -> &Galaxy {
        &self.galaxy
    }

    pub fn compositor(&self) -> &LayeredCompositor {
        &self.compositor
    }

    fn initialize(&mut self, event_loop: &ActiveEventLoop) {
        let window = match event_loop.create_window(window_attributes_from_config(&self.config)) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                error!("Failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        let size = window.inner_size();
        let context = match init_render_context_blocking(window.clone(), self.config.window.vsync)
        {
            Ok(context) => context,
            Err(e) => {
                error!("GPU initialization failed: {e}");
                event_loop.exit();
                return;
            }
        };

        let camera = camera_from_config(&self.config.camera, size.width, size.height);
        let mut backend = match GpuBackend::new(
            context,
            camera,
            bloom_config(&self.config.render.bloom),
            fog(&self.config.render.fog),
            self.config.render.exposure,
        ) {
            Ok(backend) => backend,
            Err(e) => {
                error!("Failed to create render resources: {e}");
                event_loop.exit();
                return;
            }
        };

        for path in self.galaxy.texture_paths() {
            backend.request_texture(path);
        }
        let attached = self.galaxy.attach(backend.scene_mut());
        self.lod_dirty = true;
        self.compositor.resize(&mut backend, size.width, size.height);

        self.controls = Some(OrbitControls::from_camera(
            backend.camera(),
            OrbitSettings::from(&self.config.camera),
        ));
        let scene = backend.scene();
        info!(
            "Viewer ready: {attached} drawables ({} bloom, {} base), {}x{}, {:?}",
            scene.count_on(RenderLayer::Bloom),
            scene.count_on(RenderLayer::Base),
            size.width,
            size.height,
            self.compositor.integration()
        );

        window.request_redraw();
        self.backend = Some(backend);
        self.window = Some(window);
    }

    fn resize(&mut self, width: u32, height: u32) {
        if let Some(backend) = self.backend.as_mut() {
            self.compositor.resize(backend, width, height);
            let viewport = self.compositor.extents().viewport();
            info!("Window resized to {}x{}", viewport.width, viewport.height);
        }
    }

    fn redraw(&mut self) {
        let (Some(backend), Some(controls)) = (self.backend.as_mut(), self.controls.as_mut())
        else {
            return;
        };

        if self.lod_dirty {
            let camera_position = backend.camera().position;
            self.galaxy.update(camera_position, backend.scene_mut());
            self.lod_dirty = false;
        }

        let input = self.pointer.take_frame();
        let mut moved = false;
        let outcome = self
            .compositor
            .render_frame(backend, |camera| moved = controls.update(camera, input));
        self.lod_dirty = moved;
        self.frame_stats.tick(outcome);

        let pending = backend.pending_sprites();
        if pending > 0 {
            tracing::trace!("{pending} sprites waiting on textures");
        }
    }

    /// Remove the galaxy from the scene and release the GPU.
    fn shutdown(&mut self) {
        if let Some(backend) = self.backend.as_mut() {
            let removed = self.galaxy.detach(backend.scene_mut());
            info!(
                "Detached {removed} drawables after {} frames ({} skipped)",
                self.compositor.frames_presented(),
                self.compositor.frames_skipped()
            );
        }
        self.controls = None;
        self.backend = None;
        self.window = None;
    }
}

impl ApplicationHandler for GalaxyApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            self.initialize(event_loop);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                self.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                self.resize(new_size.width, new_size.height);
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                if let Some(window) = &self.window {
                    let size = window.inner_size();
                    info!("Scale factor changed to {scale_factor:.2}");
                    self.resize(size.width, size.height);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.pointer.on_cursor_moved(position.x, position.y);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.pointer.on_button(button, state);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                self.pointer.on_scroll(delta);
            }
            WindowEvent::CursorLeft { .. } => {
                self.pointer.on_cursor_left();
            }
            WindowEvent::Focused(false) => {
                self.pointer.on_focus_lost();
            }
            WindowEvent::RedrawRequested => {
                self.redraw();
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if self.backend.is_some() {
            warn!("Event loop exiting with the GPU backend still alive");
            self.shutdown();
        }
    }
}

/// Build the galaxy, open the window and run until it is closed.
#[instrument(skip_all)]
pub fn run(config: Config) -> Result<(), AppError> {
    let mut app = GalaxyApp::new(config)?;
    let event_loop = EventLoop::new()?;
    event_loop.run_app(&mut app)?;
    Ok(())
}
