//! GPU allocation of the offscreen targets and shared fullscreen-pass helpers.

use crate::targets::{TargetExtents, TargetId};

/// Format of every offscreen target. HDR so bloom and tone mapping have
/// headroom above 1.0.
pub const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// A render target that can also be sampled.
pub struct OffscreenTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub bind_group: wgpu::BindGroup,
}

/// Every offscreen target, allocated together from one [`TargetExtents`].
pub struct OffscreenTargets {
    bloom_source: OffscreenTarget,
    bloom_output: OffscreenTarget,
    overlay: OffscreenTarget,
    base: OffscreenTarget,
}

impl OffscreenTargets {
    pub fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        extents: TargetExtents,
    ) -> Self {
        let make = |id: TargetId| {
            let extent = extents.extent(id);
            create_target(
                device,
                layout,
                sampler,
                extent.width,
                extent.height,
                target_label(id),
            )
        };
        Self {
            bloom_source: make(TargetId::BloomSource),
            bloom_output: make(TargetId::BloomOutput),
            overlay: make(TargetId::Overlay),
            base: make(TargetId::Base),
        }
    }

    pub fn get(&self, id: TargetId) -> &OffscreenTarget {
        match id {
            TargetId::BloomSource => &self.bloom_source,
            TargetId::BloomOutput => &self.bloom_output,
            TargetId::Overlay => &self.overlay,
            TargetId::Base => &self.base,
        }
    }
}

fn target_label(id: TargetId) -> &'static str {
    match id {
        TargetId::BloomSource => "bloom-source-target",
        TargetId::BloomOutput => "bloom-output-target",
        TargetId::Overlay => "overlay-target",
        TargetId::Base => "base-target",
    }
}

/// Layout for one sampled 2D texture plus its filtering sampler.
pub fn create_texture_bind_group_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

/// Linear clamp-to-edge sampler.
pub fn create_linear_sampler(device: &wgpu::Device, label: &str) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::MipmapFilterMode::Linear,
        ..Default::default()
    })
}

/// Bind a texture view and sampler against a layout from
/// [`create_texture_bind_group_layout`].
pub fn create_texture_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
    label: &str,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

/// Allocate a sampled render target in [`OFFSCREEN_FORMAT`].
pub fn create_target(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    width: u32,
    height: u32,
    label: &str,
) -> OffscreenTarget {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OFFSCREEN_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = create_texture_bind_group(device, layout, &view, sampler, label);
    OffscreenTarget {
        texture,
        view,
        bind_group,
    }
}

/// Fullscreen-triangle pipeline. The shader must export `vs_fullscreen`.
pub fn create_fullscreen_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    fragment_entry: &str,
    target_format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_fullscreen"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format: target_format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview_mask: None,
        cache: None,
    })
}

/// Begin a single-attachment color pass with no depth.
pub fn begin_color_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    view: &wgpu::TextureView,
    load: wgpu::LoadOp<wgpu::Color>,
    label: &str,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load,
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    })
}

/// WGSL for the fullscreen triangle shared by every post pass.
pub const FULLSCREEN_VERTEX_WGSL: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_fullscreen(@builtin(vertex_index) idx: u32) -> VertexOutput {
    let uv = vec2<f32>(f32((idx << 1u) & 2u), f32(idx & 2u));
    var out: VertexOutput;
    out.position = vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(uv.x, 1.0 - uv.y);
    return out;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_labels_are_unique() {
        let mut labels: Vec<_> = TargetId::ALL.iter().map(|id| target_label(*id)).collect();
        labels.sort();
        labels.dedup();
        assert_eq!(labels.len(), TargetId::ALL.len());
    }

    #[test]
    fn test_offscreen_format_is_hdr_filterable() {
        assert!(!OFFSCREEN_FORMAT.is_srgb());
        assert_eq!(OFFSCREEN_FORMAT.block_copy_size(None), Some(8));
    }

    #[test]
    fn test_fullscreen_vertex_shader_entry_present() {
        assert!(FULLSCREEN_VERTEX_WGSL.contains("fn vs_fullscreen"));
        assert!(FULLSCREEN_VERTEX_WGSL.contains("struct VertexOutput"));
    }
}
