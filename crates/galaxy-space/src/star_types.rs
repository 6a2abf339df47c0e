//! Weighted star-type table and type sampling.

use galaxy_config::StarTypesConfig;
use galaxy_render::linear_rgb_from_hex;
use rand::Rng;

use crate::error::ConfigurationError;

/// Percentages are drawn from `[0, PERCENT_TOTAL)`.
pub const PERCENT_TOTAL: f32 = 100.0;

/// Slack allowed around [`PERCENT_TOTAL`] for rounding in hand-written tables.
pub const TOTAL_TOLERANCE: f32 = 0.01;

/// One star category.
#[derive(Clone, Debug, PartialEq)]
pub struct StarType {
    /// `0xRRGGBB` sRGB color as configured.
    pub color_hex: u32,
    /// Linear RGB of `color_hex`.
    pub color: [f32; 3],
    /// Base sprite size; scaled by distance at runtime.
    pub size: f32,
    /// Share of stars of this type, in percent.
    pub percentage: f32,
}

impl StarType {
    pub fn new(color_hex: u32, size: f32, percentage: f32) -> Self {
        Self {
            color_hex,
            color: linear_rgb_from_hex(color_hex),
            size,
            percentage,
        }
    }
}

/// Validated, ordered star categories.
#[derive(Clone, Debug, PartialEq)]
pub struct StarTypeTable {
    types: Vec<StarType>,
}

impl StarTypeTable {
    /// Validate and build a table.
    ///
    /// Percentages must be finite and non-negative and total 100 within
    /// [`TOTAL_TOLERANCE`].
    pub fn new(types: Vec<StarType>) -> Result<Self, ConfigurationError> {
        if types.is_empty() {
            return Err(ConfigurationError::EmptyStarTypes);
        }
        for (index, t) in types.iter().enumerate() {
            if !t.percentage.is_finite() || t.percentage < 0.0 {
                return Err(ConfigurationError::InvalidWeight {
                    index,
                    weight: t.percentage,
                });
            }
            if !t.size.is_finite() || t.size < 0.0 {
                return Err(ConfigurationError::InvalidSize {
                    index,
                    size: t.size,
                });
            }
        }
        let total: f32 = types.iter().map(|t| t.percentage).sum();
        if (total - PERCENT_TOTAL).abs() > TOTAL_TOLERANCE {
            return Err(ConfigurationError::WeightTotalOutOfRange { total });
        }
        Ok(Self { types })
    }

    pub fn from_config(config: &StarTypesConfig) -> Result<Self, ConfigurationError> {
        Self::new(
            config
                .types
                .iter()
                .map(|t| StarType::new(t.color, t.size, t.percentage))
                .collect(),
        )
    }

    /// Category for a draw in `[0, 100)`.
    ///
    /// Subtracts each percentage in order and returns the first index at
    /// which the remainder goes negative, or 0 if none does (rounding at the
    /// top of the range, or a draw outside it).
    pub fn type_for_draw(&self, draw: f32) -> usize {
        let mut remaining = draw;
        for (index, t) in self.types.iter().enumerate() {
            remaining -= t.percentage;
            if remaining < 0.0 {
                return index;
            }
        }
        0
    }

    /// Draw a category index.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        self.type_for_draw(rng.random::<f32>() * PERCENT_TOTAL)
    }

    pub fn get(&self, index: usize) -> Option<&StarType> {
        self.types.get(index)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StarType> {
        self.types.iter()
    }
}
