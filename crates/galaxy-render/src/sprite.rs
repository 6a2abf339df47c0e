//! Instanced camera-facing sprite renderer.
//!
//! Each layer gets its own instance and camera buffers so the passes of one
//! frame never overwrite each other's data before submission. Sprites fade
//! toward the fog color with view depth (`1 - exp(-(density * depth)^2)`).

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::camera::{Camera, CameraUniform};
use crate::layer::RenderLayer;
use crate::offscreen::{OFFSCREEN_FORMAT, begin_color_pass};
use crate::scene::{DrawableStore, TextureKey};
use crate::texture::SpriteTextures;
use crate::texture_cache::TextureCache;

/// Instance capacity allocated per layer before the first grow.
const INITIAL_INSTANCE_CAPACITY: usize = 1024;

const SPRITE_SHADER: &str = r#"
struct SpriteUniforms {
    view_proj: mat4x4<f32>,
    right: vec4<f32>,
    up: vec4<f32>,
    // rgb: linear fog color, w: density
    fog: vec4<f32>,
};

struct VertexInput {
    @location(0) corner: vec2<f32>,
    @location(1) center: vec3<f32>,
    @location(2) scale: f32,
    @location(3) color: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) color: vec4<f32>,
    @location(2) view_depth: f32,
};

@group(0) @binding(0) var<uniform> camera: SpriteUniforms;
@group(1) @binding(0) var sprite_tex: texture_2d<f32>;
@group(1) @binding(1) var sprite_sampler: sampler;

@vertex
fn vs_sprite(in: VertexInput) -> VertexOutput {
    let offset = (camera.right.xyz * in.corner.x + camera.up.xyz * in.corner.y) * in.scale;
    var out: VertexOutput;
    out.clip_position = camera.view_proj * vec4<f32>(in.center + offset, 1.0);
    out.uv = vec2<f32>(in.corner.x + 0.5, 0.5 - in.corner.y);
    out.color = in.color;
    // Perspective w is the view-space depth
    out.view_depth = out.clip_position.w;
    return out;
}

@fragment
fn fs_sprite(in: VertexOutput) -> @location(0) vec4<f32> {
    let texel = textureSample(sprite_tex, sprite_sampler, in.uv);
    let density = camera.fog.w;
    let fog_amount = clamp(1.0 - exp(-density * density * in.view_depth * in.view_depth), 0.0, 1.0);
    let rgb = mix(texel.rgb * in.color.rgb, camera.fog.rgb, fog_amount);
    return vec4<f32>(rgb, texel.a * in.color.a);
}
"#;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct SpriteVertex {
    corner: [f32; 2],
}

impl SpriteVertex {
    const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<SpriteVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: 0,
            shader_location: 0,
        }],
    };
}

/// Exponential-squared distance fog applied to every sprite.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Fog {
    /// Linear RGB.
    pub color: [f32; 3],
    /// Per world unit. 0 disables fog.
    pub density: f32,
}

/// Camera basis plus fog, uploaded once per layer render.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct SpriteUniforms {
    camera: CameraUniform,
    fog: [f32; 4],
}

impl SpriteUniforms {
    fn new(camera: &Camera, fog: Fog) -> Self {
        let [r, g, b] = fog.color;
        Self {
            camera: camera.to_uniform(),
            fog: [r, g, b, fog.density.max(0.0)],
        }
    }
}

/// Per-sprite GPU data.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SpriteInstance {
    pub position: [f32; 3],
    pub scale: f32,
    /// Linear RGB tint and opacity.
    pub color: [f32; 4],
}

impl SpriteInstance {
    const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<SpriteInstance>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &[
            wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x3,
                offset: 0,
                shader_location: 1,
            },
            wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32,
                offset: 12,
                shader_location: 2,
            },
            wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x4,
                offset: 16,
                shader_location: 3,
            },
        ],
    };
}

/// Instances sharing one texture, drawn with a single call.
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteBatch {
    pub texture: TextureKey,
    /// Range into the layer's concatenated instance array.
    pub instances: std::ops::Range<u32>,
}

/// Per-layer batching scratch. Buffers are cleared, not reallocated, between
/// renders.
#[derive(Debug, Default)]
pub struct SpriteBatcher {
    grouped: Vec<Vec<SpriteInstance>>,
    instances: Vec<SpriteInstance>,
    batches: Vec<SpriteBatch>,
    skipped: usize,
}

impl SpriteBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the sprites of `layer` into per-texture batches in key order.
    ///
    /// `ready[key]` says whether a texture can be bound; sprites whose
    /// texture is not ready, or has no entry, are skipped.
    pub fn build(&mut self, store: &DrawableStore, layer: RenderLayer, ready: &[bool]) {
        for list in &mut self.grouped {
            list.clear();
        }
        if self.grouped.len() < ready.len() {
            self.grouped.resize_with(ready.len(), Vec::new);
        }
        self.instances.clear();
        self.batches.clear();
        self.skipped = 0;

        for sprite in store.visible(layer.into()) {
            let key = sprite.texture.index();
            if !ready.get(key).copied().unwrap_or(false) {
                self.skipped += 1;
                continue;
            }
            self.grouped[key].push(SpriteInstance {
                position: sprite.position.to_array(),
                scale: sprite.scale,
                color: [
                    sprite.color[0],
                    sprite.color[1],
                    sprite.color[2],
                    sprite.opacity,
                ],
            });
        }

        for (texture, _) in store.textures() {
            let Some(list) = self.grouped.get(texture.index()) else {
                continue;
            };
            if list.is_empty() {
                continue;
            }
            let start = self.instances.len() as u32;
            self.instances.extend_from_slice(list);
            self.batches.push(SpriteBatch {
                texture,
                instances: start..self.instances.len() as u32,
            });
        }
    }

    pub fn instances(&self) -> &[SpriteInstance] {
        &self.instances
    }

    pub fn batches(&self) -> &[SpriteBatch] {
        &self.batches
    }

    /// Sprites left out of the last build because their texture was pending.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

struct LayerBuffers {
    instance_buffer: wgpu::Buffer,
    capacity: usize,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    batcher: SpriteBatcher,
}

/// Draws [`DrawableStore`] sprites layer by layer into offscreen targets.
pub struct SpriteRenderer {
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    layers: [LayerBuffers; 3],
    fog: Fog,
    ready: Vec<bool>,
    skipped_last_render: usize,
}

impl SpriteRenderer {
    /// `texture_bgl` is the layout of the sprite texture bind groups.
    pub fn new(device: &wgpu::Device, texture_bgl: &wgpu::BindGroupLayout, fog: Fog) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sprite-shader"),
            source: wgpu::ShaderSource::Wgsl(SPRITE_SHADER.into()),
        });

        let camera_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sprite-camera-bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: std::num::NonZeroU64::new(
                        std::mem::size_of::<SpriteUniforms>() as u64,
                    ),
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sprite-layout"),
            bind_group_layouts: &[&camera_bgl, texture_bgl],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sprite-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_sprite"),
                buffers: &[SpriteVertex::LAYOUT, SpriteInstance::LAYOUT],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_sprite"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: OFFSCREEN_FORMAT,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview_mask: None,
            cache: None,
        });

        // Unit quad centered on the sprite position
        let quad = [
            SpriteVertex {
                corner: [-0.5, -0.5],
            },
            SpriteVertex {
                corner: [0.5, -0.5],
            },
            SpriteVertex { corner: [0.5, 0.5] },
            SpriteVertex {
                corner: [-0.5, 0.5],
            },
        ];
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sprite-quad"),
            contents: bytemuck::cast_slice(&quad),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let indices: [u16; 6] = [0, 1, 2, 2, 3, 0];
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sprite-indices"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let layers = [
            RenderLayer::Base,
            RenderLayer::Bloom,
            RenderLayer::Overlay,
        ]
        .map(|layer| create_layer_buffers(device, &camera_bgl, layer, fog));

        log::info!(
            "Sprite renderer initialized ({INITIAL_INSTANCE_CAPACITY} instances per layer, fog density {})",
            fog.density
        );

        Self {
            pipeline,
            vertex_buffer,
            index_buffer,
            layers,
            fog,
            ready: Vec::new(),
            skipped_last_render: 0,
        }
    }

    /// Sprites left out of the most recent render because their texture was
    /// still loading.
    pub fn skipped_last_render(&self) -> usize {
        self.skipped_last_render
    }

    /// Clear `target` and draw every sprite the camera mask lets through.
    ///
    /// The mask is expected to name a single layer. Sprites whose texture is
    /// still pending are skipped and retried on the next call.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        store: &DrawableStore,
        camera: &Camera,
        textures: &mut SpriteTextures,
        cache: &TextureCache,
    ) {
        let mut pass_layers = camera.layers.layers();
        let layer = pass_layers.next();
        if pass_layers.next().is_some() {
            log::warn!("Sprite render mask {:?} names several layers; drawing the first", camera.layers);
        }
        let Some(layer) = layer else {
            begin_color_pass(encoder, target, wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT), "sprite-empty");
            return;
        };

        self.ready.clear();
        self.ready.extend(
            store
                .textures()
                .map(|(key, path)| textures.resolve(device, queue, cache, key, path)),
        );

        let buffers = &mut self.layers[layer.index()];
        buffers.batcher.build(store, layer, &self.ready);
        self.skipped_last_render = buffers.batcher.skipped();
        let instances = buffers.batcher.instances();
        if instances.len() > buffers.capacity {
            let capacity = instances.len().next_power_of_two();
            buffers.instance_buffer = create_instance_buffer(device, layer, capacity);
            buffers.capacity = capacity;
            log::debug!("Grew {layer:?} sprite buffer to {capacity} instances");
        }
        queue.write_buffer(
            &buffers.camera_buffer,
            0,
            bytemuck::cast_slice(&[SpriteUniforms::new(camera, self.fog)]),
        );
        if !instances.is_empty() {
            queue.write_buffer(&buffers.instance_buffer, 0, bytemuck::cast_slice(instances));
        }

        let mut pass = begin_color_pass(
            encoder,
            target,
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            "sprite-pass",
        );
        let batches = buffers.batcher.batches();
        if batches.is_empty() {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &buffers.camera_bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_vertex_buffer(1, buffers.instance_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
        for batch in batches {
            let Some(bind_group) = textures.bind_group(batch.texture) else {
                continue;
            };
            pass.set_bind_group(1, bind_group, &[]);
            pass.draw_indexed(0..6, 0, batch.instances.clone());
        }
    }
}

fn create_instance_buffer(device: &wgpu::Device, layer: RenderLayer, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(&format!("sprite-instances-{layer:?}")),
        size: (capacity * std::mem::size_of::<SpriteInstance>()) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_layer_buffers(
    device: &wgpu::Device,
    camera_bgl: &wgpu::BindGroupLayout,
    layer: RenderLayer,
    fog: Fog,
) -> LayerBuffers {
    let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("sprite-camera-{layer:?}")),
        contents: bytemuck::cast_slice(&[SpriteUniforms::new(&Camera::default(), fog)]),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });
    let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(&format!("sprite-camera-bg-{layer:?}")),
        layout: camera_bgl,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: camera_buffer.as_entire_binding(),
        }],
    });
    LayerBuffers {
        instance_buffer: create_instance_buffer(device, layer, INITIAL_INSTANCE_CAPACITY),
        capacity: INITIAL_INSTANCE_CAPACITY,
        camera_buffer,
        camera_bind_group,
        batcher: SpriteBatcher::new(),
    }
}
