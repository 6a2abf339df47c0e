/// Invalid galaxy, star-type or LOD parameters. Raised before anything is
/// created, so a failed build leaves no partial galaxy behind.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("star type table is empty")]
    EmptyStarTypes,

    #[error("star type {index} has invalid percentage {weight}")]
    InvalidWeight { index: usize, weight: f32 },

    #[error("star type percentages total {total}, expected 100")]
    WeightTotalOutOfRange { total: f32 },

    #[error("star type {index} has invalid size {size}")]
    InvalidSize { index: usize, size: f32 },

    #[error("object count must be non-zero")]
    ZeroCount,

    #[error("{name} must be positive and finite, got {value}")]
    NonPositive { name: &'static str, value: f32 },

    #[error("{name} must be finite, got {value}")]
    NonFinite { name: &'static str, value: f32 },

    #[error("{name} must lie in [{min}, {max}], got {value}")]
    OutOfRange {
        name: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    #[error("{name} bounds are invalid: min {min}, max {max}")]
    InvalidBounds {
        name: &'static str,
        min: f32,
        max: f32,
    },
}
