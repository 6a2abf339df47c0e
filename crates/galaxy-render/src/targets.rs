//! Offscreen render targets and their shared extents.

use crate::layer::RenderLayer;

/// Every offscreen image the compositor writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetId {
    /// Bloom-layer render before filtering.
    BloomSource,
    /// Filtered bloom image (source plus glow).
    BloomOutput,
    /// Overlay-layer render, never bloomed.
    Overlay,
    /// Base-layer render.
    Base,
}

impl TargetId {
    pub const ALL: [TargetId; 4] = [
        TargetId::BloomSource,
        TargetId::BloomOutput,
        TargetId::Overlay,
        TargetId::Base,
    ];

    /// Target a layer's pass renders into.
    pub const fn for_layer(layer: RenderLayer) -> Self {
        match layer {
            RenderLayer::Bloom => TargetId::BloomSource,
            RenderLayer::Overlay => TargetId::Overlay,
            RenderLayer::Base => TargetId::Base,
        }
    }
}

/// Width and height in pixels, never zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

/// Single source of truth for the size of every offscreen target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TargetExtents {
    viewport: Extent,
}

impl TargetExtents {
    /// Derive all target sizes from a viewport. Zero dimensions clamp to 1.
    pub fn for_viewport(width: u32, height: u32) -> Self {
        if width == 0 || height == 0 {
            log::warn!("Zero-sized viewport {width}x{height}, clamping to at least 1x1");
        }
        Self {
            viewport: Extent {
                width: width.max(1),
                height: height.max(1),
            },
        }
    }

    pub fn viewport(&self) -> Extent {
        self.viewport
    }

    /// Size of a given target. All targets match the viewport.
    pub fn extent(&self, _target: TargetId) -> Extent {
        self.viewport
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.viewport.width as f32 / self.viewport.height as f32
    }
}
