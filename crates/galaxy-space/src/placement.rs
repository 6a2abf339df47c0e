//! Procedural placement: position laws and per-object type sampling.
//!
//! Placement only produces [`CelestialObject`]s. It never touches the scene.

use std::f32::consts::TAU;

use galaxy_config::GalaxyConfig;
use glam::Vec3;
use rand::{Rng, RngCore};

use crate::error::ConfigurationError;
use crate::object::{CelestialObject, ObjectKind};
use crate::star_types::StarTypeTable;

/// Maps an object's index within a batch of `count` to a position.
pub trait PositionLaw {
    fn position(&self, index: usize, count: usize, rng: &mut dyn RngCore) -> Vec3;
}

impl<F> PositionLaw for F
where
    F: Fn(usize, usize, &mut dyn RngCore) -> Vec3,
{
    fn position(&self, index: usize, count: usize, rng: &mut dyn RngCore) -> Vec3 {
        self(index, count, rng)
    }
}

/// Wrap a closure as a [`PositionLaw`], pinning down its argument types.
pub fn law_fn<F>(f: F) -> F
where
    F: Fn(usize, usize, &mut dyn RngCore) -> Vec3,
{
    f
}

/// Normal sample via the Box-Muller transform.
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R, mean: f32, std_dev: f32) -> f32 {
    // 1 - [0, 1) keeps ln() away from zero
    let u = 1.0 - rng.random::<f32>();
    let v = rng.random::<f32>();
    let z = (-2.0 * u.ln()).sqrt() * (TAU * v).cos();
    mean + std_dev * z
}

/// Spiral galaxy in the XY plane, Z is disc thickness.
///
/// The first quarter of a batch forms the core, the second quarter the outer
/// core, and the remaining half is shared round-robin between the arms.
#[derive(Clone, Debug, PartialEq)]
pub struct SpiralGalaxyLaw {
    pub thickness: f32,
    pub core: (f32, f32),
    pub outer_core: (f32, f32),
    pub arm_dist: (f32, f32),
    pub arm_mean: (f32, f32),
    pub spiral: f32,
    pub arms: u32,
}

impl SpiralGalaxyLaw {
    pub fn from_config(config: &GalaxyConfig) -> Result<Self, ConfigurationError> {
        let positive = [
            ("galaxy.thickness", config.thickness),
            ("galaxy.core_x_dist", config.core_x_dist),
            ("galaxy.core_y_dist", config.core_y_dist),
            ("galaxy.outer_core_x_dist", config.outer_core_x_dist),
            ("galaxy.outer_core_y_dist", config.outer_core_y_dist),
            ("galaxy.arm_x_dist", config.arm_x_dist),
            ("galaxy.arm_y_dist", config.arm_y_dist),
            ("galaxy.arms", config.arms as f32),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigurationError::NonPositive { name, value });
            }
        }
        for (name, value) in [
            ("galaxy.arm_x_mean", config.arm_x_mean),
            ("galaxy.arm_y_mean", config.arm_y_mean),
            ("galaxy.spiral", config.spiral),
        ] {
            if !value.is_finite() {
                return Err(ConfigurationError::NonFinite { name, value });
            }
        }

        Ok(Self {
            thickness: config.thickness,
            core: (config.core_x_dist, config.core_y_dist),
            outer_core: (config.outer_core_x_dist, config.outer_core_y_dist),
            arm_dist: (config.arm_x_dist, config.arm_y_dist),
            arm_mean: (config.arm_x_mean, config.arm_y_mean),
            spiral: config.spiral,
            arms: config.arms,
        })
    }

    fn blob(&self, rng: &mut dyn RngCore, (sx, sy): (f32, f32)) -> Vec3 {
        Vec3::new(
            gaussian(rng, 0.0, sx),
            gaussian(rng, 0.0, sy),
            gaussian(rng, 0.0, self.thickness),
        )
    }

    fn arm_point(&self, rng: &mut dyn RngCore, arm: u32) -> Vec3 {
        let x = gaussian(rng, self.arm_mean.0, self.arm_dist.0);
        let y = gaussian(rng, self.arm_mean.1, self.arm_dist.1);
        let z = gaussian(rng, 0.0, self.thickness);
        let r = x.hypot(y);
        let theta =
            arm as f32 * TAU / self.arms as f32 + y.atan2(x) + (r / self.arm_dist.0) * self.spiral;
        Vec3::new(r * theta.cos(), r * theta.sin(), z)
    }
}

impl PositionLaw for SpiralGalaxyLaw {
    fn position(&self, index: usize, count: usize, rng: &mut dyn RngCore) -> Vec3 {
        let quarter = count / 4;
        if index < quarter {
            self.blob(rng, self.core)
        } else if index < 2 * quarter {
            self.blob(rng, self.outer_core)
        } else {
            let arm = ((index - 2 * quarter) % self.arms.max(1) as usize) as u32;
            self.arm_point(rng, arm)
        }
    }
}

/// What [`place`] creates.
#[derive(Clone, Copy, Debug)]
pub enum Recipe<'a> {
    /// Stars with sampled categories.
    Stars(&'a StarTypeTable),
    /// Haze with a size drawn from `max * u`, clamped to `[min, max]`.
    Haze { min: f32, max: f32, opacity: f32 },
}

/// Place `count` objects along `law`.
pub fn place(
    recipe: Recipe<'_>,
    count: usize,
    law: &impl PositionLaw,
    rng: &mut dyn RngCore,
) -> Result<Vec<CelestialObject>, ConfigurationError> {
    if count == 0 {
        return Err(ConfigurationError::ZeroCount);
    }
    if let Recipe::Haze { min, max, .. } = recipe {
        if !min.is_finite() || !max.is_finite() || min < 0.0 || max < min {
            return Err(ConfigurationError::InvalidBounds {
                name: "haze size",
                min,
                max,
            });
        }
    }

    let mut objects = Vec::with_capacity(count);
    for index in 0..count {
        let position = law.position(index, count, rng);
        let object = match recipe {
            Recipe::Stars(table) => {
                let type_index = table.sample(rng);
                let size = table.get(type_index).map_or(1.0, |t| t.size);
                CelestialObject::new(position, ObjectKind::Star { type_index }, size)
            }
            Recipe::Haze { min, max, opacity } => {
                let size = (max * rng.random::<f32>()).clamp(min, max);
                let mut haze = CelestialObject::new(position, ObjectKind::Haze, size);
                haze.opacity = opacity;
                haze
            }
        };
        objects.push(object);
    }
    log::debug!(
        "Placed {count} {}",
        if matches!(recipe, Recipe::Stars(_)) { "stars" } else { "haze sprites" }
    );
    Ok(objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::star_types::StarType;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn origin() -> impl PositionLaw {
        law_fn(|_, _, _| Vec3::ZERO)
    }

    fn table() -> StarTypeTable {
        StarTypeTable::new(vec![
            StarType::new(0xff0000, 1.0, 10.0),
            StarType::new(0x00ff00, 2.0, 20.0),
            StarType::new(0x0000ff, 3.0, 70.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_zero_count_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let table = table();
        assert_eq!(
            place(Recipe::Stars(&table), 0, &origin(), &mut rng),
            Err(ConfigurationError::ZeroCount)
        );
    }

    #[test]
    fn test_stars_take_size_from_type() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let table = table();
        let stars = place(Recipe::Stars(&table), 500, &origin(), &mut rng).unwrap();
        assert_eq!(stars.len(), 500);
        for star in &stars {
            let ObjectKind::Star { type_index } = star.kind else {
                panic!("expected a star");
            };
            assert_eq!(star.base_size, table.get(type_index).unwrap().size);
            assert!(star.render.is_none());
        }
    }

    #[test]
    fn test_positions_follow_law() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let table = table();
        let law = law_fn(|i, n, _| Vec3::new(i as f32, n as f32, 0.0));
        let stars = place(Recipe::Stars(&table), 10, &law, &mut rng).unwrap();
        for (i, star) in stars.iter().enumerate() {
            assert_eq!(star.position(), Vec3::new(i as f32, 10.0, 0.0));
        }
    }

    #[test]
    fn test_haze_size_within_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let recipe = Recipe::Haze {
            min: 1.0,
            max: 10.0,
            opacity: 0.2,
        };
        let haze = place(recipe, 1000, &origin(), &mut rng).unwrap();
        assert!(haze.iter().all(|h| (1.0..=10.0).contains(&h.base_size)));
        assert!(haze.iter().all(|h| h.kind == ObjectKind::Haze));
        assert!(haze.iter().all(|h| h.opacity == 0.2));
        // u < 0.1 clamps to the minimum
        assert!(haze.iter().any(|h| h.base_size == 1.0));
    }

    #[test]
    fn test_haze_bounds_validated() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let recipe = Recipe::Haze {
            min: 10.0,
            max: 1.0,
            opacity: 0.2,
        };
        assert!(matches!(
            place(recipe, 4, &origin(), &mut rng),
            Err(ConfigurationError::InvalidBounds { .. })
        ));
    }

    #[test]
    fn test_placement_is_deterministic_per_seed() {
        let law = SpiralGalaxyLaw::from_config(&GalaxyConfig::default()).unwrap();
        let table = table();
        let a = place(Recipe::Stars(&table), 200, &law, &mut ChaCha8Rng::seed_from_u64(9)).unwrap();
        let b = place(Recipe::Stars(&table), 200, &law, &mut ChaCha8Rng::seed_from_u64(9)).unwrap();
        let c = place(Recipe::Stars(&table), 200, &law, &mut ChaCha8Rng::seed_from_u64(10)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_gaussian_moments() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let n = 50_000;
        let samples: Vec<f32> = (0..n).map(|_| gaussian(&mut rng, 5.0, 2.0)).collect();
        let mean = samples.iter().sum::<f32>() / n as f32;
        let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / n as f32;
        assert!((mean - 5.0).abs() < 0.05, "mean {mean}");
        assert!((var.sqrt() - 2.0).abs() < 0.05, "std {}", var.sqrt());
        assert!(samples.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_spiral_core_is_tighter_than_arms() {
        let law = SpiralGalaxyLaw::from_config(&GalaxyConfig::default()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let count = 4000;
        let points: Vec<Vec3> = (0..count)
            .map(|i| law.position(i, count, &mut rng))
            .collect();
        let mean_radius = |range: std::ops::Range<usize>| {
            let len = range.len() as f32;
            points[range].iter().map(|p| p.truncate().length()).sum::<f32>() / len
        };
        let core = mean_radius(0..1000);
        let outer = mean_radius(1000..2000);
        let arms = mean_radius(2000..4000);
        assert!(core < outer, "core {core} outer {outer}");
        assert!(outer < arms, "outer {outer} arms {arms}");
    }

    #[test]
    fn test_spiral_disc_is_thin() {
        let law = SpiralGalaxyLaw::from_config(&GalaxyConfig::default()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let count = 2000;
        let max_z = (0..count)
            .map(|i| law.position(i, count, &mut rng).z.abs())
            .fold(0.0f32, f32::max);
        // thickness 5, so |z| beyond 8 sigma would be a bug
        assert!(max_z < 40.0, "{max_z}");
    }

    #[test]
    fn test_spiral_config_validation() {
        let config = GalaxyConfig {
            arms: 0,
            ..GalaxyConfig::default()
        };
        assert!(matches!(
            SpiralGalaxyLaw::from_config(&config),
            Err(ConfigurationError::NonPositive {
                name: "galaxy.arms",
                ..
            })
        ));
        let config = GalaxyConfig {
            core_x_dist: f32::NAN,
            ..GalaxyConfig::default()
        };
        assert!(SpiralGalaxyLaw::from_config(&config).is_err());
    }
}
