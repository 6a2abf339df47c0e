//! Layered frame composition.
//!
//! [`LayeredCompositor`] drives a [`RenderBackend`] through a fixed pass order
//! each frame:
//!
//! 1. Bloom layer into the bloom source target, then the bloom filter.
//! 2. Overlay layer into the overlay target.
//! 3. Base layer into the base target, composited with bloom and overlay.
//! 4. Camera controls integrate, then base is rendered and composited again.
//!
//! The camera layer mask is written right before every scene render. The
//! presented image is always the last base composite.

use crate::camera::Camera;
use crate::layer::{LayerMask, RenderLayer};
use crate::targets::{TargetExtents, TargetId};

/// Operations the compositor needs from a renderer.
///
/// Everything after [`RenderBackend::begin_frame`] is infallible so a begun
/// frame always runs to completion.
pub trait RenderBackend {
    type FrameError: std::fmt::Display;

    /// Acquire the frame image. On error the whole frame is skipped.
    fn begin_frame(&mut self) -> Result<(), Self::FrameError>;

    fn camera_mut(&mut self) -> &mut Camera;

    /// Restrict what the next scene render can see.
    fn set_layer_mask(&mut self, mask: LayerMask) {
        self.camera_mut().layers = mask;
    }

    /// Render drawables visible to the camera mask into `target`.
    fn render_scene(&mut self, target: TargetId);

    /// Filter the bloom source into the bloom output.
    fn apply_bloom(&mut self);

    /// Blend base, bloom output and overlay into the frame image.
    fn composite(&mut self);

    /// Submit recorded work so far.
    fn flush(&mut self);

    /// Show the frame image.
    fn present(&mut self);

    /// Reallocate every offscreen target from one set of extents.
    fn resize_targets(&mut self, extents: TargetExtents);
}

/// Where camera controls are integrated within a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ControlIntegration {
    /// Render base, integrate controls, then render base again.
    /// The presented image reflects the latest camera state.
    #[default]
    BetweenBaseRenders,
    /// Integrate controls after overlay and render base once.
    /// Saves one base render at the cost of a frame of control latency
    /// relative to the bloom and overlay images.
    BeforeBase,
}

/// One layer-filtered scene render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompositionPass {
    pub layer: RenderLayer,
    pub target: TargetId,
}

/// Result of [`LayeredCompositor::render_frame`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// The frame could not begin. Nothing was rendered.
    Skipped,
}

/// Fixed-order multi-pass compositor.
#[derive(Debug)]
pub struct LayeredCompositor {
    extents: TargetExtents,
    integration: ControlIntegration,
    frames_presented: u64,
    frames_skipped: u64,
}

impl LayeredCompositor {
    /// Scene passes in execution order.
    pub const PASSES: [CompositionPass; 3] = [
        CompositionPass {
            layer: RenderLayer::Bloom,
            target: TargetId::for_layer(RenderLayer::Bloom),
        },
        CompositionPass {
            layer: RenderLayer::Overlay,
            target: TargetId::for_layer(RenderLayer::Overlay),
        },
        CompositionPass {
            layer: RenderLayer::Base,
            target: TargetId::for_layer(RenderLayer::Base),
        },
    ];

    pub fn new(width: u32, height: u32, integration: ControlIntegration) -> Self {
        Self {
            extents: TargetExtents::for_viewport(width, height),
            integration,
            frames_presented: 0,
            frames_skipped: 0,
        }
    }

    pub fn extents(&self) -> TargetExtents {
        self.extents
    }

    pub fn integration(&self) -> ControlIntegration {
        self.integration
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    pub fn frames_skipped(&self) -> u64 {
        self.frames_skipped
    }

    /// Run one frame. `controls` integrates camera input and is called
    /// exactly once per presented frame.
    pub fn render_frame<B, F>(&mut self, backend: &mut B, controls: F) -> FrameOutcome
    where
        B: RenderBackend,
        F: FnOnce(&mut Camera),
    {
        if let Err(err) = backend.begin_frame() {
            self.frames_skipped += 1;
            log::warn!("Skipping frame: {err}");
            return FrameOutcome::Skipped;
        }

        let [bloom, overlay, base] = Self::PASSES;

        Self::run_pass(backend, bloom);
        backend.apply_bloom();

        Self::run_pass(backend, overlay);

        match self.integration {
            ControlIntegration::BetweenBaseRenders => {
                Self::run_pass(backend, base);
                backend.composite();
                backend.flush();
                controls(backend.camera_mut());
                Self::run_pass(backend, base);
                backend.composite();
            }
            ControlIntegration::BeforeBase => {
                controls(backend.camera_mut());
                Self::run_pass(backend, base);
                backend.composite();
            }
        }

        backend.present();
        self.frames_presented += 1;
        FrameOutcome::Presented
    }

    /// Resize every offscreen target to the new viewport.
    ///
    /// Zero dimensions clamp to 1. Resizing back to a previous size yields
    /// identical extents.
    pub fn resize<B: RenderBackend>(&mut self, backend: &mut B, width: u32, height: u32) {
        let extents = TargetExtents::for_viewport(width, height);
        let viewport = extents.viewport();
        backend
            .camera_mut()
            .set_aspect_ratio(viewport.width as f32, viewport.height as f32);
        backend.resize_targets(extents);
        self.extents = extents;
        log::debug!("Resized targets to {}x{}", viewport.width, viewport.height);
    }

    fn run_pass<B: RenderBackend>(backend: &mut B, pass: CompositionPass) {
        backend.set_layer_mask(LayerMask::only(pass.layer));
        backend.render_scene(pass.target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Begin,
        Render {
            target: TargetId,
            mask: LayerMask,
            camera: Vec3,
        },
        Bloom,
        Composite,
        Flush,
        Present,
        Resize(TargetExtents),
    }

    #[derive(Default)]
    struct RecordingBackend {
        camera: Camera,
        calls: Vec<Call>,
        fail_begin: bool,
    }

    impl RenderBackend for RecordingBackend {
        type FrameError = &'static str;

        fn begin_frame(&mut self) -> Result<(), Self::FrameError> {
            if self.fail_begin {
                return Err("surface timeout");
            }
            self.calls.push(Call::Begin);
            Ok(())
        }

        fn camera_mut(&mut self) -> &mut Camera {
            &mut self.camera
        }

        fn render_scene(&mut self, target: TargetId) {
            self.calls.push(Call::Render {
                target,
                mask: self.camera.layers,
                camera: self.camera.position,
            });
        }

        fn apply_bloom(&mut self) {
            self.calls.push(Call::Bloom);
        }

        fn composite(&mut self) {
            self.calls.push(Call::Composite);
        }

        fn flush(&mut self) {
            self.calls.push(Call::Flush);
        }

        fn present(&mut self) {
            self.calls.push(Call::Present);
        }

        fn resize_targets(&mut self, extents: TargetExtents) {
            self.calls.push(Call::Resize(extents));
        }
    }

    fn renders(calls: &[Call]) -> Vec<(TargetId, LayerMask, Vec3)> {
        calls
            .iter()
            .filter_map(|c| match c {
                Call::Render {
                    target,
                    mask,
                    camera,
                } => Some((*target, *mask, *camera)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_frame_runs_passes_in_fixed_order() {
        let mut backend = RecordingBackend::default();
        let mut compositor = LayeredCompositor::new(800, 600, ControlIntegration::default());

        let outcome = compositor.render_frame(&mut backend, |_| {});
        assert_eq!(outcome, FrameOutcome::Presented);

        let order: Vec<_> = backend
            .calls
            .iter()
            .map(|c| match c {
                Call::Render { target, .. } => format!("render:{target:?}"),
                other => format!("{other:?}"),
            })
            .collect();
        assert_eq!(
            order,
            vec![
                "Begin",
                "render:BloomSource",
                "Bloom",
                "render:Overlay",
                "render:Base",
                "Composite",
                "Flush",
                "render:Base",
                "Composite",
                "Present",
            ]
        );
    }

    #[test]
    fn test_mask_matches_each_pass_layer() {
        let mut backend = RecordingBackend::default();
        let mut compositor = LayeredCompositor::new(800, 600, ControlIntegration::default());
        compositor.render_frame(&mut backend, |_| {});

        for (target, mask, _) in renders(&backend.calls) {
            let layers: Vec<_> = mask.layers().collect();
            assert_eq!(layers.len(), 1, "each pass sees exactly one layer");
            assert_eq!(TargetId::for_layer(layers[0]), target);
        }
        let overlay_masks: Vec<_> = renders(&backend.calls)
            .into_iter()
            .filter(|(t, _, _)| *t == TargetId::Overlay)
            .map(|(_, m, _)| m)
            .collect();
        assert!(
            overlay_masks
                .iter()
                .all(|m| !m.contains(RenderLayer::Bloom))
        );
    }

    #[test]
    fn test_final_composite_uses_post_control_camera() {
        let mut backend = RecordingBackend::default();
        backend.camera.position = Vec3::new(0.0, 500.0, 500.0);
        let mut compositor = LayeredCompositor::new(800, 600, ControlIntegration::default());

        let moved = Vec3::new(100.0, 400.0, 450.0);
        compositor.render_frame(&mut backend, |camera| camera.position = moved);

        let base: Vec<_> = renders(&backend.calls)
            .into_iter()
            .filter(|(t, _, _)| *t == TargetId::Base)
            .collect();
        assert_eq!(base.len(), 2);
        assert_eq!(base[0].2, Vec3::new(0.0, 500.0, 500.0));
        assert_eq!(base[1].2, moved);

        let last_render = renders(&backend.calls).pop().unwrap();
        assert_eq!(last_render.0, TargetId::Base);
        assert_eq!(backend.calls.last(), Some(&Call::Present));
    }

    #[test]
    fn test_scripted_camera_moves_always_land_in_last_composite() {
        let mut backend = RecordingBackend::default();
        let mut compositor = LayeredCompositor::new(800, 600, ControlIntegration::default());
        let script = [
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(-5.0, 0.0, 10.0),
            Vec3::new(0.0, 900.0, 0.0),
        ];

        for step in script {
            backend.calls.clear();
            compositor.render_frame(&mut backend, |camera| camera.position = step);
            let last = renders(&backend.calls).pop().unwrap();
            assert_eq!(last.2, step);
        }
        assert_eq!(compositor.frames_presented(), 3);
    }

    #[test]
    fn test_before_base_renders_base_once() {
        let mut backend = RecordingBackend::default();
        let mut compositor = LayeredCompositor::new(800, 600, ControlIntegration::BeforeBase);
        let moved = Vec3::new(7.0, 7.0, 7.0);
        compositor.render_frame(&mut backend, |camera| camera.position = moved);

        let base: Vec<_> = renders(&backend.calls)
            .into_iter()
            .filter(|(t, _, _)| *t == TargetId::Base)
            .collect();
        assert_eq!(base.len(), 1);
        assert_eq!(base[0].2, moved);
        assert!(!backend.calls.contains(&Call::Flush));
        assert_eq!(
            backend
                .calls
                .iter()
                .filter(|c| **c == Call::Composite)
                .count(),
            1
        );
    }

    #[test]
    fn test_failed_begin_skips_whole_frame() {
        let mut backend = RecordingBackend {
            fail_begin: true,
            ..Default::default()
        };
        let mut compositor = LayeredCompositor::new(800, 600, ControlIntegration::default());
        let mut controls_ran = false;

        let outcome = compositor.render_frame(&mut backend, |_| controls_ran = true);

        assert_eq!(outcome, FrameOutcome::Skipped);
        assert!(backend.calls.is_empty());
        assert!(!controls_ran);
        assert_eq!(compositor.frames_skipped(), 1);
        assert_eq!(compositor.frames_presented(), 0);
    }

    #[test]
    fn test_resize_roundtrip_restores_extents() {
        let mut backend = RecordingBackend::default();
        let mut compositor = LayeredCompositor::new(1280, 720, ControlIntegration::default());
        let original = compositor.extents();

        compositor.resize(&mut backend, 640, 480);
        assert_eq!(compositor.extents().viewport().width, 640);
        compositor.resize(&mut backend, 1280, 720);

        assert_eq!(compositor.extents(), original);
        for target in TargetId::ALL {
            assert_eq!(
                compositor.extents().extent(target),
                original.extent(target)
            );
        }
        assert_eq!(
            backend.calls,
            vec![
                Call::Resize(TargetExtents::for_viewport(640, 480)),
                Call::Resize(original),
            ]
        );
        assert!((backend.camera.aspect_ratio - 1280.0 / 720.0).abs() < 1e-5);
    }

    #[test]
    fn test_zero_resize_clamps() {
        let mut backend = RecordingBackend::default();
        let mut compositor = LayeredCompositor::new(1280, 720, ControlIntegration::default());
        compositor.resize(&mut backend, 0, 0);

        let viewport = compositor.extents().viewport();
        assert_eq!((viewport.width, viewport.height), (1, 1));
        assert_eq!(backend.camera.aspect_ratio, 1.0);
    }
}
