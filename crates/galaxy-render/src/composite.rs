//! Final composition of the offscreen targets into the frame image.
//!
//! `base + bloom` is summed, the overlay is laid over the sum, and the result
//! is tone mapped (ACES fit) at the configured exposure.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::offscreen::{
    FULLSCREEN_VERTEX_WGSL, OffscreenTarget, begin_color_pass, create_fullscreen_pipeline,
};

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct CompositeParams {
    exposure: f32,
    _padding: [f32; 3],
}

const COMPOSITE_FRAGMENT_WGSL: &str = r#"
struct CompositeParams {
    exposure: f32,
};

@group(0) @binding(0) var<uniform> params: CompositeParams;
@group(1) @binding(0) var base_tex: texture_2d<f32>;
@group(1) @binding(1) var base_sampler: sampler;
@group(2) @binding(0) var bloom_tex: texture_2d<f32>;
@group(2) @binding(1) var bloom_sampler: sampler;
@group(3) @binding(0) var overlay_tex: texture_2d<f32>;
@group(3) @binding(1) var overlay_sampler: sampler;

fn aces(hdr: vec3<f32>) -> vec3<f32> {
    let a = 2.51;
    let b = 0.03;
    let c = 2.43;
    let d = 0.59;
    let e = 0.14;
    return clamp((hdr * (a * hdr + b)) / (hdr * (c * hdr + d) + e), vec3<f32>(0.0), vec3<f32>(1.0));
}

@fragment
fn fs_composite(in: VertexOutput) -> @location(0) vec4<f32> {
    let base = textureSample(base_tex, base_sampler, in.uv).rgb;
    let bloom = textureSample(bloom_tex, bloom_sampler, in.uv).rgb;
    let overlay = textureSample(overlay_tex, overlay_sampler, in.uv);
    let lit = base + bloom;
    let layered = overlay.rgb + lit * (1.0 - overlay.a);
    return vec4<f32>(aces(layered * params.exposure), 1.0);
}
"#;

/// Fullscreen pass combining base, bloom output and overlay.
pub struct CompositePass {
    pipeline: wgpu::RenderPipeline,
    params_buffer: wgpu::Buffer,
    params_bind_group: wgpu::BindGroup,
}

impl CompositePass {
    pub fn new(
        device: &wgpu::Device,
        texture_bgl: &wgpu::BindGroupLayout,
        output_format: wgpu::TextureFormat,
        exposure: f32,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("composite-shader"),
            source: wgpu::ShaderSource::Wgsl(
                format!("{FULLSCREEN_VERTEX_WGSL}{COMPOSITE_FRAGMENT_WGSL}").into(),
            ),
        });

        let params_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("composite-params-bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: std::num::NonZeroU64::new(16),
                },
                count: None,
            }],
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("composite-layout"),
            bind_group_layouts: &[&params_bgl, texture_bgl, texture_bgl, texture_bgl],
            immediate_size: 0,
        });
        let pipeline = create_fullscreen_pipeline(
            device,
            &shader,
            &layout,
            "fs_composite",
            output_format,
            None,
            "composite",
        );

        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("composite-params"),
            contents: bytemuck::cast_slice(&[params(exposure)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let params_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("composite-params-bg"),
            layout: &params_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: params_buffer.as_entire_binding(),
            }],
        });

        Self {
            pipeline,
            params_buffer,
            params_bind_group,
        }
    }

    /// Overwrite `output` with the composite of the three targets.
    pub fn record(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        base: &OffscreenTarget,
        bloom: &OffscreenTarget,
        overlay: &OffscreenTarget,
        output: &wgpu::TextureView,
    ) {
        let mut pass = begin_color_pass(
            encoder,
            output,
            wgpu::LoadOp::Clear(wgpu::Color::BLACK),
            "composite-pass",
        );
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.params_bind_group, &[]);
        pass.set_bind_group(1, &base.bind_group, &[]);
        pass.set_bind_group(2, &bloom.bind_group, &[]);
        pass.set_bind_group(3, &overlay.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

fn params(exposure: f32) -> CompositeParams {
    CompositeParams {
        exposure: exposure.max(0.0),
        _padding: [0.0; 3],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offscreen::create_texture_bind_group_layout;
    use crate::texture::create_test_device_queue;

    #[test]
    fn test_fragment_sums_bloom_onto_base_under_overlay() {
        let src = COMPOSITE_FRAGMENT_WGSL;
        assert!(src.contains("let lit = base + bloom;"));
        assert!(src.contains("let layered = overlay.rgb + lit * (1.0 - overlay.a);"));
        assert!(src.contains("aces(layered * params.exposure)"));
        // Three distinct inputs, one per offscreen target
        for group in ["@group(1)", "@group(2)", "@group(3)"] {
            assert_eq!(src.matches(group).count(), 2, "{group}");
        }
    }

    #[test]
    fn test_composite_shader_compiles() {
        let Some((device, _queue)) = create_test_device_queue() else {
            return;
        };
        let layout = create_texture_bind_group_layout(&device, "test-composite-bgl");
        let _pass = CompositePass::new(
            &device,
            &layout,
            wgpu::TextureFormat::Bgra8UnormSrgb,
            0.5,
        );
    }

    #[test]
    fn test_params_layout_and_negative_exposure() {
        assert_eq!(std::mem::size_of::<CompositeParams>(), 16);
        assert_eq!(params(-1.0).exposure, 0.0);
        assert_eq!(params(0.5).exposure, 0.5);
    }
}
