//! Distance-driven scale and opacity.
//!
//! Stars grow with distance so far stars stay visible; haze fades in with
//! distance so close-up views are not washed out.

use galaxy_config::LodConfig;
use glam::Vec3;

use crate::error::ConfigurationError;
use crate::object::{CelestialObject, ObjectKind};

/// Validated LOD constants.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LodParams {
    pub distance_unit: f32,
    pub star_min: f32,
    pub star_max: f32,
    pub haze_min: f32,
    pub haze_max: f32,
    pub haze_opacity: f32,
    pub haze_falloff_unit: f32,
}

impl LodParams {
    pub fn from_config(config: &LodConfig) -> Result<Self, ConfigurationError> {
        for (name, value) in [
            ("lod.distance_unit", config.distance_unit),
            ("lod.haze_falloff_unit", config.haze_falloff_unit),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigurationError::NonPositive { name, value });
            }
        }
        for (name, min, max) in [
            ("lod.star", config.star_min, config.star_max),
            ("lod.haze", config.haze_min, config.haze_max),
            ("lod.haze_opacity", 0.0, config.haze_opacity),
        ] {
            if !min.is_finite() || !max.is_finite() || min < 0.0 || max < min {
                return Err(ConfigurationError::InvalidBounds { name, min, max });
            }
        }

        Ok(Self {
            distance_unit: config.distance_unit,
            star_min: config.star_min,
            star_max: config.star_max,
            haze_min: config.haze_min,
            haze_max: config.haze_max,
            haze_opacity: config.haze_opacity,
            haze_falloff_unit: config.haze_falloff_unit,
        })
    }
}

/// Visual state for one object at one camera position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LodSample {
    pub scale: f32,
    pub opacity: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct LodScaler {
    params: LodParams,
}

impl LodScaler {
    pub fn new(params: LodParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &LodParams {
        &self.params
    }

    /// Scale and opacity for `object` seen from `camera`. Always within the
    /// configured bounds, even for NaN or infinite distances.
    pub fn sample(&self, object: &CelestialObject, camera: Vec3) -> LodSample {
        let d = object.position().distance(camera) / self.params.distance_unit;
        match object.kind {
            ObjectKind::Star { .. } => LodSample {
                scale: self.star_scale(d, object.base_size),
                opacity: 1.0,
            },
            ObjectKind::Haze => LodSample {
                scale: object.base_size,
                opacity: self.haze_opacity(d),
            },
        }
    }

    /// Star scale at `d` distance units.
    pub fn star_scale(&self, d: f32, base_size: f32) -> f32 {
        let LodParams {
            star_min, star_max, ..
        } = self.params;
        if d.is_nan() {
            return star_min;
        }
        if d.is_infinite() {
            return star_max;
        }
        let scale = d * base_size;
        if scale.is_nan() {
            star_min
        } else {
            scale.clamp(star_min, star_max)
        }
    }

    /// Haze opacity at `d` distance units.
    pub fn haze_opacity(&self, d: f32) -> f32 {
        let max = self.params.haze_opacity;
        if d.is_nan() {
            return 0.0;
        }
        if d.is_infinite() {
            return max;
        }
        let ratio = d / self.params.haze_falloff_unit;
        (max * ratio * ratio).clamp(0.0, max)
    }

    /// Recompute every object in place.
    pub fn update_all(&self, objects: &mut [CelestialObject], camera: Vec3) {
        for object in objects.iter_mut() {
            let LodSample { scale, opacity } = self.sample(object, camera);
            object.scale = scale;
            object.opacity = opacity;
        }
    }
}
