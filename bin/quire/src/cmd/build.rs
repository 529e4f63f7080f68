//! Build command - generates the static site

use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use quire_generator::{BuildStats, Site};

use super::{load_config, print_build_stats};

/// Run the build command.
///
/// `destination` overrides `build.destination`; `drafts` enables draft posts.
pub fn run(config_path: &Path, destination: Option<&Path>, drafts: bool) -> Result<BuildStats> {
    tracing::info!(?config_path, ?destination, drafts, "Starting build");

    let mut config = load_config(config_path)?;

    if let Some(destination) = destination {
        tracing::info!(?destination, "Overriding destination from CLI");
        config.build.destination = destination.to_path_buf();
    }
    if drafts {
        config.build.include_drafts = true;
    }
    config.validate().wrap_err("Invalid configuration")?;

    let mut site = Site::new(config);
    let stats = site.build().wrap_err("Build failed")?;

    println!();
    println!("  Build completed successfully!");
    print_build_stats(&stats, site.destination());

    tracing::info!(?stats, "Build completed successfully");
    Ok(stats)
}
