//! Configuration structs with sensible defaults and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Name of the config file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.ron";

/// Top-level viewer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Window settings.
    pub window: WindowConfig,
    /// Camera and orbit-control settings.
    pub camera: CameraConfig,
    /// Composition and post-processing settings.
    pub render: RenderConfig,
    /// Distance-based scale/opacity tuning.
    pub lod: LodConfig,
    /// Procedural galaxy shape.
    pub galaxy: GalaxyConfig,
    /// Star categories: color, base size and share of the population.
    pub star_types: StarTypesConfig,
    /// Sprite texture paths.
    pub assets: AssetConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Window configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    /// Window width in logical pixels.
    pub width: u32,
    /// Window height in logical pixels.
    pub height: u32,
    /// Enable vsync (PresentMode::Fifo).
    pub vsync: bool,
    /// Window title.
    pub title: String,
}

/// Camera projection and orbit-control limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees.
    pub fov_y_degrees: f32,
    /// Near clip distance.
    pub near: f32,
    /// Far clip distance.
    pub far: f32,
    /// Initial camera position.
    pub start_position: [f32; 3],
    /// Point the camera orbits around.
    pub target: [f32; 3],
    /// Fraction of the pending orbit motion applied per update (0, 1].
    pub damping_factor: f32,
    /// Closest allowed orbit distance.
    pub min_distance: f32,
    /// Farthest allowed orbit distance.
    pub max_distance: f32,
    /// Largest polar angle from the +Y axis, in radians.
    pub max_polar_angle: f32,
    /// Radians of orbit per pixel of drag.
    pub rotate_speed: f32,
    /// Zoom factor per scroll line.
    pub zoom_speed: f32,
    /// Pan distance per pixel of drag, relative to orbit distance.
    pub pan_speed: f32,
}

/// Bloom filter parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BloomSettings {
    /// Glow intensity added on top of the bloom-layer image.
    pub strength: f32,
    /// Luminance above which pixels contribute to the glow.
    pub threshold: f32,
    /// Blur tap spread multiplier.
    pub radius: f32,
    /// Soft knee of the threshold curve, in [0, 1].
    pub soft_knee: f32,
    /// Number of downsample levels in the blur chain.
    pub iterations: u32,
}

/// Exponential-squared distance fog on sprites.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FogSettings {
    /// `0xRRGGBB` sRGB fog color.
    pub color: u32,
    /// Fog density per world unit. 0 disables fog.
    pub density: f32,
}

/// Composition settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Bloom filter applied to the bloom layer.
    pub bloom: BloomSettings,
    /// Distance fog applied to every sprite.
    pub fog: FogSettings,
    /// Exposure applied before ACES tone mapping in the final composite.
    pub exposure: f32,
    /// Render the base layer once, after control integration, instead of
    /// once before and once after.
    pub single_base_render: bool,
}

/// Distance-based scale/opacity tuning constants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LodConfig {
    /// World units per normalized distance step.
    pub distance_unit: f32,
    /// Smallest star sprite scale.
    pub star_min: f32,
    /// Largest star sprite scale.
    pub star_max: f32,
    /// Smallest haze sprite scale assigned at creation.
    pub haze_min: f32,
    /// Largest haze sprite scale assigned at creation.
    pub haze_max: f32,
    /// Full haze opacity, reached far from the camera.
    pub haze_opacity: f32,
    /// Normalized distance at which haze reaches full opacity.
    pub haze_falloff_unit: f32,
}

/// Procedural spiral galaxy shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GalaxyConfig {
    /// Seed for deterministic generation.
    pub seed: u64,
    /// Number of stars.
    pub star_count: u32,
    /// Haze sprites per star.
    pub haze_ratio: f32,
    /// Vertical scatter (standard deviation) of every population.
    pub thickness: f32,
    /// Core standard deviation along X.
    pub core_x_dist: f32,
    /// Core standard deviation along Y.
    pub core_y_dist: f32,
    /// Outer core standard deviation along X.
    pub outer_core_x_dist: f32,
    /// Outer core standard deviation along Y.
    pub outer_core_y_dist: f32,
    /// Arm standard deviation along X.
    pub arm_x_dist: f32,
    /// Arm standard deviation along Y.
    pub arm_y_dist: f32,
    /// Arm mean offset along X.
    pub arm_x_mean: f32,
    /// Arm mean offset along Y.
    pub arm_y_mean: f32,
    /// Twist applied per `arm_x_dist` of radius.
    pub spiral: f32,
    /// Number of spiral arms.
    pub arms: u32,
}

/// A single star category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StarTypeConfig {
    /// Sprite tint as 0xRRGGBB.
    pub color: u32,
    /// Base sprite size; multiplied by normalized distance for LOD.
    pub size: f32,
    /// Share of the population in percent.
    pub percentage: f32,
}

/// Ordered star categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StarTypesConfig {
    /// Categories in sampling order.
    pub types: Vec<StarTypeConfig>,
}

/// Sprite texture locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssetConfig {
    /// Star sprite image.
    pub star_sprite: String,
    /// Haze sprite image.
    pub haze_sprite: String,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Log frame timing every N frames (0 disables).
    pub frame_stats_interval: u32,
}

// --- Default implementations ---

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            vsync: true,
            title: "Galaxy".to_string(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: 60.0,
            near: 0.1,
            far: 5_000_000.0,
            start_position: [0.0, 500.0, 500.0],
            target: [0.0, 0.0, 0.0],
            damping_factor: 0.05,
            min_distance: 1.0,
            max_distance: 16384.0,
            max_polar_angle: std::f32::consts::FRAC_PI_2 - std::f32::consts::PI / 360.0,
            rotate_speed: 0.005,
            zoom_speed: 0.95,
            pan_speed: 0.001,
        }
    }
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            strength: 1.5,
            threshold: 0.4,
            radius: 0.0,
            soft_knee: 0.5,
            iterations: 5,
        }
    }
}

impl Default for FogSettings {
    fn default() -> Self {
        Self {
            color: 0xebe2db,
            density: 0.00003,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            bloom: BloomSettings::default(),
            fog: FogSettings::default(),
            exposure: 0.5,
            single_base_render: false,
        }
    }
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            distance_unit: 250.0,
            star_min: 0.25,
            star_max: 5.0,
            haze_min: 1.0,
            haze_max: 10.0,
            haze_opacity: 0.2,
            haze_falloff_unit: 2.5,
        }
    }
}

impl Default for GalaxyConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            star_count: 7000,
            haze_ratio: 0.5,
            thickness: 5.0,
            core_x_dist: 33.0,
            core_y_dist: 33.0,
            outer_core_x_dist: 100.0,
            outer_core_y_dist: 100.0,
            arm_x_dist: 100.0,
            arm_y_dist: 50.0,
            arm_x_mean: 200.0,
            arm_y_mean: 100.0,
            spiral: 3.0,
            arms: 2,
        }
    }
}

impl Default for StarTypesConfig {
    fn default() -> Self {
        // M, K, G, F, A, B, O main-sequence shares.
        let entries: [(u32, f32, f32); 7] = [
            (0xffcc6f, 0.7, 76.45),
            (0xffd2a1, 0.7, 12.1),
            (0xfff4ea, 1.15, 7.6),
            (0xf8f7ff, 1.48, 3.0),
            (0xcad7ff, 2.0, 0.6),
            (0xaabfff, 2.5, 0.13),
            (0x9bb0ff, 7.0, 0.12),
        ];
        Self {
            types: entries
                .iter()
                .map(|&(color, size, percentage)| StarTypeConfig {
                    color,
                    size,
                    percentage,
                })
                .collect(),
        }
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            star_sprite: "resources/sprite120.png".to_string(),
            haze_sprite: "resources/feathered60.png".to_string(),
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            frame_stats_interval: 600,
        }
    }
}

// --- Load / Save ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(4)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }
}
