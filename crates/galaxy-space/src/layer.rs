//! Which render layer each kind of object draws on.

use galaxy_render::RenderLayer;

use crate::object::ObjectKind;

impl ObjectKind {
    /// Stars glow, haze does not.
    pub const fn layer(self) -> RenderLayer {
        match self {
            ObjectKind::Star { .. } => RenderLayer::Bloom,
            ObjectKind::Haze => RenderLayer::Base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stars_bloom_haze_base() {
        for type_index in 0..8 {
            assert_eq!(ObjectKind::Star { type_index }.layer(), RenderLayer::Bloom);
        }
        assert_eq!(ObjectKind::Haze.layer(), RenderLayer::Base);
    }

    #[test]
    fn test_no_kind_uses_overlay() {
        let kinds = [ObjectKind::Star { type_index: 0 }, ObjectKind::Haze];
        assert!(kinds.iter().all(|k| k.layer() != RenderLayer::Overlay));
    }
}
