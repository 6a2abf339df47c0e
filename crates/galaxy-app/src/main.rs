//! The `galaxy` binary: an interactive procedural galaxy viewer.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags,
//! e.g. `galaxy --stars 20000 --seed 7`.

use std::process::ExitCode;

use clap::Parser;
use galaxy_app::platform::PlatformDirs;
use galaxy_config::{CliArgs, Config};
use tracing::{error, info, warn};

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let dirs = match args.config.clone() {
        Some(dir) => PlatformDirs::with_config_dir(dir),
        None => match PlatformDirs::resolve() {
            Ok(dirs) => dirs,
            Err(e) => {
                eprintln!("Failed to resolve platform directories: {e}");
                return ExitCode::FAILURE;
            }
        },
    };
    let dirs_error = dirs.create_dirs().err();

    let (mut config, load_error) = match Config::load_or_create(&dirs.config_dir) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    config.apply_cli_overrides(&args);

    galaxy_log::init_logging(Some(&dirs.log_dir), cfg!(debug_assertions), Some(&config));

    if let Some(e) = dirs_error {
        warn!("Failed to create platform directories: {e}");
    }
    if let Some(e) = load_error {
        warn!(
            "Failed to load config from {}, using defaults: {e}",
            dirs.config_dir.display()
        );
    }
    info!(
        "Galaxy viewer: {} stars, seed {}, config at {}",
        config.galaxy.star_count,
        config.galaxy.seed,
        dirs.config_dir.display()
    );

    match galaxy_app::run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
