//! GPU sprite textures: upload of decoded images and resolution of cached loads.
//!
//! [`SpriteTextures`] turns the non-blocking state of the [`TextureCache`]
//! into bind groups. Pending textures resolve to `None` so their sprites are
//! skipped; failed loads resolve to a procedural fallback sprite.

use std::path::Path;

use crate::offscreen::create_texture_bind_group;
use crate::scene::TextureKey;
use crate::texture_cache::{ImageData, LoadState, TextureCache};

/// Format of uploaded sprite textures. Sprite PNGs are sRGB encoded.
pub const SPRITE_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Edge length of the procedural fallback sprite.
pub const FALLBACK_SPRITE_SIZE: u32 = 64;

/// Errors that can occur during texture creation.
#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error(
        "texture data size ({actual}) does not match expected ({expected}) for {width}x{height}"
    )]
    DataSizeMismatch {
        actual: usize,
        expected: usize,
        width: u32,
        height: u32,
    },

    #[error("texture dimensions must be non-zero, got {width}x{height}")]
    ZeroDimensions { width: u32, height: u32 },
}

/// An uploaded sprite texture ready to bind.
pub struct SpriteTexture {
    pub texture: wgpu::Texture,
    pub bind_group: wgpu::BindGroup,
    pub dimensions: (u32, u32),
}

/// Upload RGBA8 pixels as a sampled sprite texture.
pub fn upload_sprite_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    name: &str,
    image: &ImageData,
) -> Result<SpriteTexture, TextureError> {
    validate_image(image)?;
    let size = wgpu::Extent3d {
        width: image.width,
        height: image.height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(name),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: SPRITE_TEXTURE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &image.rgba,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(image.width * 4),
            rows_per_image: None,
        },
        size,
    );

    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = create_texture_bind_group(device, layout, &view, sampler, name);
    log::info!(
        "Created sprite texture '{name}' ({}x{})",
        image.width,
        image.height
    );
    Ok(SpriteTexture {
        texture,
        bind_group,
        dimensions: (image.width, image.height),
    })
}

fn validate_image(image: &ImageData) -> Result<(), TextureError> {
    if image.width == 0 || image.height == 0 {
        return Err(TextureError::ZeroDimensions {
            width: image.width,
            height: image.height,
        });
    }
    let expected = image.width as usize * image.height as usize * 4;
    if image.rgba.len() != expected {
        return Err(TextureError::DataSizeMismatch {
            actual: image.rgba.len(),
            expected,
            width: image.width,
            height: image.height,
        });
    }
    Ok(())
}

enum Slot {
    Loaded(SpriteTexture),
    Fallback,
}

/// Uploaded sprite textures indexed by [`TextureKey`].
pub struct SpriteTextures {
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    slots: Vec<Option<Slot>>,
    fallback: SpriteTexture,
}

impl SpriteTextures {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
    ) -> Result<Self, TextureError> {
        let fallback = upload_sprite_texture(
            device,
            queue,
            layout,
            sampler,
            "fallback-sprite",
            &ImageData::radial_falloff(FALLBACK_SPRITE_SIZE),
        )?;
        Ok(Self {
            layout: layout.clone(),
            sampler: sampler.clone(),
            slots: Vec::new(),
            fallback,
        })
    }

    /// Make `key` bindable if the load of `path` has settled. Returns
    /// whether it is.
    pub fn resolve(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        cache: &TextureCache,
        key: TextureKey,
        path: &Path,
    ) -> bool {
        if matches!(self.slots.get(key.index()), Some(Some(_))) {
            return true;
        }
        let slot = match cache.poll(path) {
            LoadState::Missing | LoadState::Pending => return false,
            LoadState::Ready(image) => {
                let name = path.display().to_string();
                match upload_sprite_texture(device, queue, &self.layout, &self.sampler, &name, &image)
                {
                    Ok(texture) => Slot::Loaded(texture),
                    Err(err) => {
                        report_fallback(path, &err.to_string());
                        Slot::Fallback
                    }
                }
            }
            LoadState::Failed(err) => {
                report_fallback(path, &err.to_string());
                Slot::Fallback
            }
        };
        if self.slots.len() <= key.index() {
            self.slots.resize_with(key.index() + 1, || None);
        }
        self.slots[key.index()] = Some(slot);
        true
    }

    /// Bind group for a resolved texture.
    pub fn bind_group(&self, key: TextureKey) -> Option<&wgpu::BindGroup> {
        match self.slots.get(key.index())?.as_ref()? {
            Slot::Loaded(texture) => Some(&texture.bind_group),
            Slot::Fallback => Some(&self.fallback.bind_group),
        }
    }
}

// A key settles once, so this logs at most once per texture.
fn report_fallback(path: &Path, reason: &str) {
    log::warn!(
        "Using fallback sprite for '{}': {reason}",
        path.display()
    );
}

/// Create a test GPU device and queue. Returns `None` if no GPU is available.
#[cfg(test)]
pub(crate) fn create_test_device_queue() -> Option<(wgpu::Device, wgpu::Queue)> {
    pollster::block_on(async {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok()?;

        adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                experimental_features: Default::default(),
                ..Default::default()
            })
            .await
            .ok()
    })
}
