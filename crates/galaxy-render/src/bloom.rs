//! Bloom filter for the bloom-layer render.
//!
//! Extracts bright pixels from the bloom source, blurs them through a
//! downsample/upsample mip chain, then writes `source + strength * glow` into
//! the bloom output target.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::offscreen::{
    FULLSCREEN_VERTEX_WGSL, OFFSCREEN_FORMAT, OffscreenTarget, begin_color_pass, create_fullscreen_pipeline,
    create_target,
};

/// Parameters of the bloom filter.
#[derive(Clone, Debug, PartialEq)]
pub struct BloomConfig {
    /// Luminance above which pixels start to glow.
    pub threshold: f32,
    /// Width of the soft transition around the threshold. Range \[0, 1\].
    pub soft_knee: f32,
    /// Glow multiplier applied when adding the blur back onto the source.
    pub strength: f32,
    /// Extra blur tap offset in texels. 0 gives the tightest glow.
    pub radius: f32,
    /// Mip levels in the blur chain. Each level halves resolution.
    pub iterations: u32,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            threshold: 0.4,
            soft_knee: 0.5,
            strength: 1.5,
            radius: 0.0,
            iterations: 5,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct BloomParams {
    threshold: f32,
    soft_knee: f32,
    strength: f32,
    radius: f32,
}

impl From<&BloomConfig> for BloomParams {
    fn from(config: &BloomConfig) -> Self {
        Self {
            threshold: config.threshold,
            soft_knee: config.soft_knee.clamp(0.0, 1.0),
            strength: config.strength.max(0.0),
            radius: config.radius.max(0.0),
        }
    }
}

const BLOOM_FRAGMENT_WGSL: &str = r#"
struct BloomParams {
    threshold: f32,
    soft_knee: f32,
    strength: f32,
    radius: f32,
};

@group(0) @binding(0) var<uniform> params: BloomParams;
@group(1) @binding(0) var input_tex: texture_2d<f32>;
@group(1) @binding(1) var input_sampler: sampler;
@group(2) @binding(0) var glow_tex: texture_2d<f32>;
@group(2) @binding(1) var glow_sampler: sampler;

fn soft_threshold(color: vec3<f32>, threshold: f32, knee: f32) -> vec3<f32> {
    let luminance = dot(color, vec3<f32>(0.2126, 0.7152, 0.0722));
    let soft = luminance - threshold + knee;
    let soft_clamped = clamp(soft, 0.0, 2.0 * knee);
    let contribution = soft_clamped * soft_clamped / (4.0 * knee + 0.0001);
    let factor = max(luminance - threshold, contribution) / max(luminance, 0.0001);
    return color * max(factor, 0.0);
}

@fragment
fn fs_extract(in: VertexOutput) -> @location(0) vec4<f32> {
    let src = textureSample(input_tex, input_sampler, in.uv);
    let extracted = soft_threshold(src.rgb, params.threshold, params.soft_knee);
    return vec4<f32>(extracted, 1.0);
}

@fragment
fn fs_downsample(in: VertexOutput) -> @location(0) vec4<f32> {
    let dims = vec2<f32>(textureDimensions(input_tex));
    let texel = (0.5 + params.radius) / dims;
    let a = textureSample(input_tex, input_sampler, in.uv + vec2(-texel.x, -texel.y)).rgb;
    let b = textureSample(input_tex, input_sampler, in.uv + vec2( texel.x, -texel.y)).rgb;
    let c = textureSample(input_tex, input_sampler, in.uv + vec2(-texel.x,  texel.y)).rgb;
    let d = textureSample(input_tex, input_sampler, in.uv + vec2( texel.x,  texel.y)).rgb;
    return vec4<f32>((a + b + c + d) * 0.25, 1.0);
}

@fragment
fn fs_upsample(in: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(textureSample(input_tex, input_sampler, in.uv).rgb, 1.0);
}

@fragment
fn fs_combine(in: VertexOutput) -> @location(0) vec4<f32> {
    let src = textureSample(input_tex, input_sampler, in.uv);
    let glow = textureSample(glow_tex, glow_sampler, in.uv).rgb;
    return vec4<f32>(src.rgb + glow * params.strength, 1.0);
}
"#;

/// Sizes of the blur mip chain for a `width` x `height` source.
///
/// The first level is half resolution. Levels never shrink below 1x1.
pub fn mip_chain_extents(width: u32, height: u32, iterations: u32) -> Vec<(u32, u32)> {
    let mut w = (width / 2).max(1);
    let mut h = (height / 2).max(1);
    let mut levels = Vec::with_capacity(iterations as usize);
    for _ in 0..iterations {
        levels.push((w, h));
        w = (w / 2).max(1);
        h = (h / 2).max(1);
    }
    levels
}

/// Multi-pass bloom filter writing into a caller-owned output target.
pub struct BloomFilter {
    config: BloomConfig,
    texture_bgl: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    extract_pipeline: wgpu::RenderPipeline,
    downsample_pipeline: wgpu::RenderPipeline,
    upsample_pipeline: wgpu::RenderPipeline,
    combine_pipeline: wgpu::RenderPipeline,
    params_buffer: wgpu::Buffer,
    params_bind_group: wgpu::BindGroup,
    mips: Vec<OffscreenTarget>,
}

impl BloomFilter {
    /// `texture_bgl` must be the sampled-texture layout used by the offscreen
    /// targets handed to [`BloomFilter::apply`].
    pub fn new(
        device: &wgpu::Device,
        texture_bgl: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        width: u32,
        height: u32,
        config: BloomConfig,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("bloom-shader"),
            source: wgpu::ShaderSource::Wgsl(
                format!("{FULLSCREEN_VERTEX_WGSL}{BLOOM_FRAGMENT_WGSL}").into(),
            ),
        });

        let params_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bloom-params-bgl"),
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

        let single_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("bloom-single-layout"),
            bind_group_layouts: &[&params_bgl, texture_bgl],
            immediate_size: 0,
        });
        let combine_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("bloom-combine-layout"),
            bind_group_layouts: &[&params_bgl, texture_bgl, texture_bgl],
            immediate_size: 0,
        });

        let additive = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent::OVER,
        };
        let pipeline = |layout: &wgpu::PipelineLayout,
                        entry: &str,
                        blend: Option<wgpu::BlendState>,
                        label: &str| {
            create_fullscreen_pipeline(
                device,
                &shader,
                layout,
                entry,
                OFFSCREEN_FORMAT,
                blend,
                label,
            )
        };
        let extract_pipeline = pipeline(&single_layout, "fs_extract", None, "bloom-extract");
        let downsample_pipeline =
            pipeline(&single_layout, "fs_downsample", None, "bloom-downsample");
        let upsample_pipeline = pipeline(
            &single_layout,
            "fs_upsample",
            Some(additive),
            "bloom-upsample",
        );
        let combine_pipeline = pipeline(&combine_layout, "fs_combine", None, "bloom-combine");

        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("bloom-params"),
            contents: bytemuck::cast_slice(&[BloomParams::from(&config)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let params_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("bloom-params-bg"),
            layout: &params_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: params_buffer.as_entire_binding(),
            }],
        });

        let mips = create_mip_chain(device, texture_bgl, sampler, width, height, &config);
        log::info!(
            "Bloom filter initialized: {} mips, threshold {}, strength {}",
            mips.len(),
            config.threshold,
            config.strength
        );

        Self {
            config,
            texture_bgl: texture_bgl.clone(),
            sampler: sampler.clone(),
            extract_pipeline,
            downsample_pipeline,
            upsample_pipeline,
            combine_pipeline,
            params_buffer,
            params_bind_group,
            mips,
        }
    }

    /// Recreate the mip chain for a new source size.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.mips = create_mip_chain(
            device,
            &self.texture_bgl,
            &self.sampler,
            width,
            height,
            &self.config,
        );
    }

    /// Record extract, blur and combine. Without mips the source is copied
    /// through unchanged.
    pub fn apply(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        source: &OffscreenTarget,
        output: &OffscreenTarget,
    ) {
        let Some(first) = self.mips.first() else {
            self.run_pass(
                encoder,
                &self.upsample_pipeline,
                &[&source.bind_group],
                &output.view,
                wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                "bloom-passthrough",
            );
            return;
        };

        self.run_pass(
            encoder,
            &self.extract_pipeline,
            &[&source.bind_group],
            &first.view,
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            "bloom-extract",
        );

        for i in 1..self.mips.len() {
            self.run_pass(
                encoder,
                &self.downsample_pipeline,
                &[&self.mips[i - 1].bind_group],
                &self.mips[i].view,
                wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                "bloom-downsample",
            );
        }

        for i in (0..self.mips.len() - 1).rev() {
            self.run_pass(
                encoder,
                &self.upsample_pipeline,
                &[&self.mips[i + 1].bind_group],
                &self.mips[i].view,
                wgpu::LoadOp::Load,
                "bloom-upsample",
            );
        }

        self.run_pass(
            encoder,
            &self.combine_pipeline,
            &[&source.bind_group, &first.bind_group],
            &output.view,
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            "bloom-combine",
        );
    }

    fn run_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pipeline: &wgpu::RenderPipeline,
        textures: &[&wgpu::BindGroup],
        target_view: &wgpu::TextureView,
        load_op: wgpu::LoadOp<wgpu::Color>,
        label: &str,
    ) {
        let mut pass = begin_color_pass(encoder, target_view, load_op, label);
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &self.params_bind_group, &[]);
        for (i, bind_group) in textures.iter().enumerate() {
            pass.set_bind_group(i as u32 + 1, *bind_group, &[]);
        }
        pass.draw(0..3, 0..1);
    }
}

fn create_mip_chain(
    device: &wgpu::Device,
    texture_bgl: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    width: u32,
    height: u32,
    config: &BloomConfig,
) -> Vec<OffscreenTarget> {
    mip_chain_extents(width, height, config.iterations)
        .into_iter()
        .enumerate()
        .map(|(i, (w, h))| {
            log::trace!("Bloom mip {i}: {w}x{h}");
            create_target(device, texture_bgl, sampler, w, h, "bloom-mip")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// CPU mirror of the shader's soft threshold, for checking parameters.
    fn soft_threshold(color: [f32; 3], threshold: f32, knee: f32) -> [f32; 3] {
        let luminance = color[0] * 0.2126 + color[1] * 0.7152 + color[2] * 0.0722;
        let soft = (luminance - threshold + knee).clamp(0.0, 2.0 * knee);
        let contribution = soft * soft / (4.0 * knee + 0.0001);
        let factor = (luminance - threshold).max(contribution) / luminance.max(0.0001);
        color.map(|c| c * factor.max(0.0))
    }

    #[test]
    fn test_default_config() {
        let config = BloomConfig::default();
        assert_eq!(config.strength, 1.5);
        assert_eq!(config.threshold, 0.4);
        assert_eq!(config.radius, 0.0);
        assert_eq!(config.iterations, 5);
    }

    #[test]
    fn test_params_clamp_out_of_range_values() {
        let params = BloomParams::from(&BloomConfig {
            threshold: 0.2,
            soft_knee: 3.0,
            strength: -1.0,
            radius: -4.0,
            iterations: 1,
        });
        assert_eq!(params.soft_knee, 1.0);
        assert_eq!(params.strength, 0.0);
        assert_eq!(params.radius, 0.0);
        assert_eq!(std::mem::size_of::<BloomParams>(), 16);
    }

    #[test]
    fn test_bright_star_glows_dim_haze_does_not() {
        let star = soft_threshold([1.0, 0.8, 0.44], 0.4, 0.0);
        assert!(star.iter().all(|c| *c > 0.0), "{star:?}");

        let dark = soft_threshold([0.0, 0.02, 0.05], 0.4, 0.0);
        assert_eq!(dark, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_soft_knee_favours_brighter_pixels() {
        let config = BloomConfig::default();
        let factor = |color: [f32; 3]| {
            soft_threshold(color, config.threshold, config.soft_knee)[1] / color[1]
        };
        assert!(factor([1.0, 0.8, 0.44]) > factor([0.0, 0.02, 0.05]));
    }

    #[test]
    fn test_mip_chain_halves_each_level() {
        let levels = mip_chain_extents(1280, 720, 4);
        assert_eq!(levels, vec![(640, 360), (320, 180), (160, 90), (80, 45)]);
    }

    #[test]
    fn test_mip_chain_never_reaches_zero() {
        let levels = mip_chain_extents(3, 1, 5);
        assert_eq!(levels.len(), 5);
        assert!(levels.iter().all(|(w, h)| *w >= 1 && *h >= 1));
    }

    #[test]
    fn test_zero_iterations_gives_empty_chain() {
        assert!(mip_chain_extents(800, 600, 0).is_empty());
    }
}
