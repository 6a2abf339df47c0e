//! Configuration system for the galaxy viewer.
//!
//! Settings persist to disk as RON, load with per-section defaults so partial
//! files stay valid, and accept CLI overrides via clap.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    AssetConfig, BloomSettings, CONFIG_FILE_NAME, CameraConfig, Config, DebugConfig, FogSettings,
    GalaxyConfig, LodConfig, RenderConfig, StarTypeConfig, StarTypesConfig, WindowConfig,
};
pub use error::ConfigError;
