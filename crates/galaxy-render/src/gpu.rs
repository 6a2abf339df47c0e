//! Window surface, device and queue for the viewer.
//!
//! [`RenderContext`] is created once per window. The backend asks it for one
//! swapchain image per composited frame via [`RenderContext::acquire_frame`].

use std::sync::Arc;
use winit::window::Window;

/// The GPU could not be brought up for the window.
#[derive(Debug, thiserror::Error)]
pub enum RenderContextError {
    #[error("no adapter can present to this window")]
    NoAdapter,

    #[error("device request rejected: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("window surface unavailable: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),
}

/// No swapchain image for this frame. The compositor skips it and tries
/// again on the next redraw.
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error("swapchain image still unavailable after reconfiguring the surface")]
    Unrecoverable,

    #[error("GPU out of memory while acquiring a swapchain image")]
    OutOfMemory,

    #[error("timed out waiting for a swapchain image")]
    Timeout,
}

/// Device, queue and the configured window surface.
pub struct RenderContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface: wgpu::Surface<'static>,
    pub surface_config: wgpu::SurfaceConfiguration,
    pub surface_format: wgpu::TextureFormat,
}

impl RenderContext {
    pub async fn new(window: Arc<Window>, vsync: bool) -> Result<Self, RenderContextError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let size = window.inner_size();
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderContextError::NoAdapter)?;

        let info = adapter.get_info();
        log::info!(
            "Adapter {} on {:?} ({:?})",
            info.name,
            info.backend,
            info.device_type
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("galaxy-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
                trace: wgpu::Trace::Off,
            })
            .await?;

        let caps = surface.get_capabilities(&adapter);
        let surface_config = surface_configuration(&caps, size.width, size.height, vsync);
        surface.configure(&device, &surface_config);
        log::info!(
            "Presenting {}x{} as {:?} with {:?}",
            surface_config.width,
            surface_config.height,
            surface_config.format,
            surface_config.present_mode
        );

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            surface_format: surface_config.format,
            surface,
            surface_config,
        })
    }

    /// Reconfigure for a new window size. Zero dimensions become 1.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface_config.width = width.max(1);
        self.surface_config.height = height.max(1);
        self.surface.configure(&self.device, &self.surface_config);
    }

    /// Next swapchain image. A lost or outdated surface is reconfigured and
    /// asked once more.
    pub fn acquire_frame(&self) -> Result<wgpu::SurfaceTexture, AcquireError> {
        match self.surface.get_current_texture() {
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("Swapchain went stale, reconfiguring the surface");
                self.surface.configure(&self.device, &self.surface_config);
                self.surface
                    .get_current_texture()
                    .map_err(|_| AcquireError::Unrecoverable)
            }
            result => result.map_err(|err| match err {
                wgpu::SurfaceError::OutOfMemory => AcquireError::OutOfMemory,
                wgpu::SurfaceError::Timeout => AcquireError::Timeout,
                other => {
                    log::error!("Swapchain acquire failed: {other}");
                    AcquireError::Unrecoverable
                }
            }),
        }
    }
}

/// Block on [`RenderContext::new`].
pub fn init_render_context_blocking(
    window: Arc<Window>,
    vsync: bool,
) -> Result<RenderContext, RenderContextError> {
    pollster::block_on(RenderContext::new(window, vsync))
}

/// Surface setup for a `width` x `height` window from the adapter's
/// capabilities.
fn surface_configuration(
    caps: &wgpu::SurfaceCapabilities,
    width: u32,
    height: u32,
    vsync: bool,
) -> wgpu::SurfaceConfiguration {
    wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format: srgb_format(&caps.formats),
        width: width.max(1),
        height: height.max(1),
        present_mode: present_mode(&caps.present_modes, vsync),
        alpha_mode: caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto),
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    }
}

/// The composite writes linear color and relies on an sRGB swapchain to
/// encode it.
fn srgb_format(formats: &[wgpu::TextureFormat]) -> wgpu::TextureFormat {
    const PREFERRED: [wgpu::TextureFormat; 2] = [
        wgpu::TextureFormat::Bgra8UnormSrgb,
        wgpu::TextureFormat::Rgba8UnormSrgb,
    ];
    PREFERRED
        .into_iter()
        .find(|f| formats.contains(f))
        .or_else(|| formats.iter().copied().find(|f| f.is_srgb()))
        .or_else(|| formats.first().copied())
        .unwrap_or(wgpu::TextureFormat::Bgra8UnormSrgb)
}

fn present_mode(modes: &[wgpu::PresentMode], vsync: bool) -> wgpu::PresentMode {
    if vsync {
        return wgpu::PresentMode::Fifo;
    }
    [wgpu::PresentMode::Mailbox, wgpu::PresentMode::Immediate]
        .into_iter()
        .find(|mode| modes.contains(mode))
        .unwrap_or(wgpu::PresentMode::Fifo)
}
