//! Command-line argument parsing for the galaxy viewer.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Galaxy viewer command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "galaxy", about = "Interactive procedural galaxy viewer")]
pub struct CliArgs {
    /// Window width.
    #[arg(long)]
    pub width: Option<u32>,

    /// Window height.
    #[arg(long)]
    pub height: Option<u32>,

    /// Number of stars to generate.
    #[arg(long)]
    pub stars: Option<u32>,

    /// Generation seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Render the base layer once per frame, after camera controls update.
    #[arg(long)]
    pub single_base_render: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(w) = args.width {
            self.window.width = w;
        }
        if let Some(h) = args.height {
            self.window.height = h;
        }
        if let Some(stars) = args.stars {
            self.galaxy.star_count = stars;
        }
        if let Some(seed) = args.seed {
            self.galaxy.seed = seed;
        }
        if args.single_base_render {
            self.render.single_base_render = true;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
