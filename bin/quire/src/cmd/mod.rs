//! Command implementations.

pub mod build;
pub mod serve;

use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use quire_core::Config;
use quire_generator::BuildStats;

/// Load `quire.toml` (if present) with `QUIRE__*` environment overrides.
pub(crate) fn load_config(config_path: &Path) -> Result<Config> {
    if !config_path.exists() {
        tracing::info!(?config_path, "no configuration file, using defaults");
    }
    let config = Config::load_with_env(config_path).wrap_err("Failed to load configuration")?;
    tracing::debug!(?config, "Loaded configuration");
    Ok(config)
}

/// Print build statistics in a user-friendly format.
pub(crate) fn print_build_stats(stats: &BuildStats, destination: &Path) {
    println!();
    println!("  Build Statistics:");
    println!("  ─────────────────────────────────");
    println!("  Posts:        {:>6}", stats.posts);
    println!("  Pages:        {:>6}", stats.pages);
    println!("  Files:        {:>6}", stats.files);
    println!("  ─────────────────────────────────");
    println!("  Duration:     {:>6}ms", stats.duration.as_millis());
    println!("  Output:       {}", destination.display());
    println!();
}
