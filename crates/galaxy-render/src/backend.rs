//! wgpu implementation of [`RenderBackend`].

use std::path::Path;

use crate::bloom::{BloomConfig, BloomFilter};
use crate::camera::Camera;
use crate::composite::CompositePass;
use crate::compositor::RenderBackend;
use crate::gpu::{AcquireError, RenderContext};
use crate::offscreen::{OffscreenTargets, create_linear_sampler, create_texture_bind_group_layout};
use crate::scene::DrawableStore;
use crate::sprite::{Fog, SpriteRenderer};
use crate::targets::{TargetExtents, TargetId};
use crate::texture::{SpriteTextures, TextureError};
use crate::texture_cache::{TextureCache, ThreadImageLoader, request_texture};

struct ActiveFrame {
    surface_texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
}

/// Owns the GPU context, the sprite scene and every render resource.
pub struct GpuBackend {
    context: RenderContext,
    camera: Camera,
    scene: DrawableStore,
    texture_cache: TextureCache,
    loader: ThreadImageLoader,
    sprite_textures: SpriteTextures,
    texture_bgl: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    targets: OffscreenTargets,
    sprites: SpriteRenderer,
    bloom: BloomFilter,
    composite: CompositePass,
    frame: Option<ActiveFrame>,
}

impl GpuBackend {
    pub fn new(
        context: RenderContext,
        camera: Camera,
        bloom: BloomConfig,
        fog: Fog,
        exposure: f32,
    ) -> Result<Self, TextureError> {
        let device = &context.device;
        let extents = TargetExtents::for_viewport(
            context.surface_config.width,
            context.surface_config.height,
        );
        let viewport = extents.viewport();

        let texture_bgl = create_texture_bind_group_layout(device, "sampled-texture-bgl");
        let sampler = create_linear_sampler(device, "linear-sampler");
        let sprite_textures =
            SpriteTextures::new(device, &context.queue, &texture_bgl, &sampler)?;
        let targets = OffscreenTargets::new(device, &texture_bgl, &sampler, extents);
        let sprites = SpriteRenderer::new(device, &texture_bgl, fog);
        let bloom = BloomFilter::new(
            device,
            &texture_bgl,
            &sampler,
            viewport.width,
            viewport.height,
            bloom,
        );
        let composite =
            CompositePass::new(device, &texture_bgl, context.surface_format, exposure);

        Ok(Self {
            context,
            camera,
            scene: DrawableStore::new(),
            texture_cache: TextureCache::new(),
            loader: ThreadImageLoader,
            sprite_textures,
            texture_bgl,
            sampler,
            targets,
            sprites,
            bloom,
            composite,
            frame: None,
        })
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn scene(&self) -> &DrawableStore {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut DrawableStore {
        &mut self.scene
    }

    /// Start loading a sprite texture in the background. Repeated requests
    /// share the first load.
    pub fn request_texture(&mut self, path: &Path) {
        request_texture(&mut self.texture_cache, &self.loader, path);
    }

    /// Sprites skipped by the last scene render while their texture loads.
    pub fn pending_sprites(&self) -> usize {
        self.sprites.skipped_last_render()
    }

    fn new_encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }
}

impl RenderBackend for GpuBackend {
    type FrameError = AcquireError;

    fn begin_frame(&mut self) -> Result<(), AcquireError> {
        if self.frame.take().is_some() {
            log::warn!("Previous frame was never presented, discarding it");
        }
        let surface_texture = self.context.acquire_frame()?;
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = self.new_encoder("frame-encoder");
        self.frame = Some(ActiveFrame {
            surface_texture,
            view,
            encoder,
        });
        Ok(())
    }

    fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    fn render_scene(&mut self, target: TargetId) {
        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        self.sprites.render(
            &self.context.device,
            &self.context.queue,
            &mut frame.encoder,
            &self.targets.get(target).view,
            &self.scene,
            &self.camera,
            &mut self.sprite_textures,
            &self.texture_cache,
        );
    }

    fn apply_bloom(&mut self) {
        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        self.bloom.apply(
            &mut frame.encoder,
            self.targets.get(TargetId::BloomSource),
            self.targets.get(TargetId::BloomOutput),
        );
    }

    fn composite(&mut self) {
        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        self.composite.record(
            &mut frame.encoder,
            self.targets.get(TargetId::Base),
            self.targets.get(TargetId::BloomOutput),
            self.targets.get(TargetId::Overlay),
            &frame.view,
        );
    }

    fn flush(&mut self) {
        let next = self.new_encoder("frame-encoder");
        let Some(frame) = self.frame.as_mut() else {
            return;
        };
        let recorded = std::mem::replace(&mut frame.encoder, next);
        self.context
            .queue
            .submit(std::iter::once(recorded.finish()));
    }

    fn present(&mut self) {
        let Some(frame) = self.frame.take() else {
            return;
        };
        self.context
            .queue
            .submit(std::iter::once(frame.encoder.finish()));
        frame.surface_texture.present();
    }

    fn resize_targets(&mut self, extents: TargetExtents) {
        let viewport = extents.viewport();
        self.frame = None;
        self.context.resize(viewport.width, viewport.height);
        self.targets = OffscreenTargets::new(
            &self.context.device,
            &self.texture_bgl,
            &self.sampler,
            extents,
        );
        self.bloom
            .resize(&self.context.device, viewport.width, viewport.height);
    }
}
