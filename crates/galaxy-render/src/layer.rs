//! Render layers: the tag that decides which composition pass can see a drawable.

/// One of the fixed render layers. Each drawable lives on exactly one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderLayer {
    /// Rendered plainly in the base pass, never bloomed.
    Base,
    /// Rendered in the bloom pass and glowed by the bloom filter.
    Bloom,
    /// Rendered in its own target and layered over the composite unblurred.
    Overlay,
}

impl RenderLayer {
    /// All layers in pass order.
    pub const ALL: [RenderLayer; 3] = [RenderLayer::Bloom, RenderLayer::Overlay, RenderLayer::Base];

    /// Stable slot index, used for per-layer storage.
    pub const fn index(self) -> usize {
        match self {
            RenderLayer::Base => 0,
            RenderLayer::Bloom => 1,
            RenderLayer::Overlay => 2,
        }
    }

    const fn bit(self) -> u8 {
        1 << self.index()
    }
}

/// Camera visibility mask over [`RenderLayer`]s.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayerMask(u8);

impl LayerMask {
    /// Sees nothing.
    pub const NONE: LayerMask = LayerMask(0);
    /// Sees every layer.
    pub const ALL: LayerMask = LayerMask(0b111);

    /// Mask that sees exactly one layer.
    pub const fn only(layer: RenderLayer) -> Self {
        LayerMask(layer.bit())
    }

    /// Whether drawables on `layer` pass this mask.
    pub const fn contains(self, layer: RenderLayer) -> bool {
        self.0 & layer.bit() != 0
    }

    /// Layers this mask sees, in pass order.
    pub fn layers(self) -> impl Iterator<Item = RenderLayer> {
        RenderLayer::ALL.into_iter().filter(move |l| self.contains(*l))
    }
}

impl Default for LayerMask {
    fn default() -> Self {
        LayerMask::only(RenderLayer::Base)
    }
}

impl From<RenderLayer> for LayerMask {
    fn from(layer: RenderLayer) -> Self {
        LayerMask::only(layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_mask_sees_single_layer() {
        for layer in RenderLayer::ALL {
            let mask = LayerMask::only(layer);
            let visible: Vec<_> = mask.layers().collect();
            assert_eq!(visible, vec![layer]);
        }
    }

    #[test]
    fn test_layer_indices_are_distinct() {
        let mut indices: Vec<usize> = RenderLayer::ALL.iter().map(|l| l.index()).collect();
        indices.sort();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_default_mask_is_base() {
        assert_eq!(LayerMask::default(), LayerMask::only(RenderLayer::Base));
        assert_eq!(LayerMask::ALL.layers().count(), 3);
        assert_eq!(LayerMask::NONE.layers().count(), 0);
    }
}
