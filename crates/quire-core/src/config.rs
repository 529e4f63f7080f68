//! Site configuration management.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{CoreError, Result};

/// Main configuration structure for Quire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Site-wide settings, exposed to templates as `site`.
    #[serde(default)]
    pub site: SiteConfig,

    /// Build settings.
    #[serde(default)]
    pub build: BuildConfig,

    /// Markdown plugin settings.
    #[serde(default)]
    pub markdown: MarkdownConfig,

    /// Development server settings.
    #[serde(default)]
    pub serve: ServeConfig,
}

/// Site-wide configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site title.
    #[serde(default)]
    pub title: String,

    /// Base URL for the site (e.g., "https://example.com").
    #[serde(default)]
    pub url: String,

    /// Site description for meta tags.
    #[serde(default)]
    pub description: Option<String>,

    /// Any other keys, passed through to templates untouched.
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

/// Build configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Root of the source tree.
    #[serde(default = "default_source")]
    pub source: PathBuf,

    /// Output directory, relative to `source` unless absolute.
    #[serde(default = "default_destination")]
    pub destination: PathBuf,

    /// Directory holding layout templates.
    #[serde(default = "default_layouts_dir")]
    pub layouts_dir: PathBuf,

    /// Directory holding partial templates.
    #[serde(default = "default_partials_dir")]
    pub partials_dir: PathBuf,

    /// Directory holding loose pages.
    #[serde(default = "default_pages_dir")]
    pub pages_dir: PathBuf,

    /// Content types; each is read from `_<plural>/`.
    #[serde(default = "default_post_types")]
    pub post_types: Vec<String>,

    /// Taxonomy types; post terms are read from the plural metadata key.
    #[serde(default = "default_taxonomy_types")]
    pub taxonomy_types: Vec<String>,

    /// Permalink pattern for posts.
    #[serde(default = "default_permalink")]
    pub permalink: String,

    /// Default page size for paginated listings.
    #[serde(default = "default_per_page")]
    pub per_page: usize,

    /// Whether to build posts marked `draft`.
    #[serde(default)]
    pub include_drafts: bool,

    /// Glob patterns (relative to `source`) skipped by the file walk.
    #[serde(default = "default_exclude_files")]
    pub exclude_files: Vec<String>,

    /// Files added to the walk even if excluded.
    #[serde(default)]
    pub include_files: Vec<PathBuf>,

    /// Plugin names that must not be loaded.
    #[serde(default)]
    pub exclude_plugins: Vec<String>,
}

/// Markdown plugin configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownConfig {
    /// Syntax highlighting theme name.
    #[serde(default = "default_syntax_theme")]
    pub syntax_theme: String,
}

/// Development server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Glob patterns ignored by the watcher, on top of the destination.
    #[serde(default = "default_watch_excludes")]
    pub watch_excludes: Vec<String>,
}

// Default value functions
fn default_source() -> PathBuf {
    PathBuf::from(".")
}

fn default_destination() -> PathBuf {
    PathBuf::from("_site")
}

fn default_layouts_dir() -> PathBuf {
    PathBuf::from("_layouts")
}

fn default_partials_dir() -> PathBuf {
    PathBuf::from("_partials")
}

fn default_pages_dir() -> PathBuf {
    PathBuf::from("_pages")
}

fn default_post_types() -> Vec<String> {
    vec!["post".to_string()]
}

fn default_taxonomy_types() -> Vec<String> {
    vec!["tag".to_string(), "category".to_string()]
}

fn default_permalink() -> String {
    "/:type/:slug/".to_string()
}

fn default_per_page() -> usize {
    10
}

fn default_exclude_files() -> Vec<String> {
    vec!["_*".to_string(), ".*".to_string(), "**/.*".to_string()]
}

fn default_syntax_theme() -> String {
    "base16-ocean.dark".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_watch_excludes() -> Vec<String> {
    vec![".*".to_string(), "**/.*".to_string(), "target".to_string()]
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            destination: default_destination(),
            layouts_dir: default_layouts_dir(),
            partials_dir: default_partials_dir(),
            pages_dir: default_pages_dir(),
            post_types: default_post_types(),
            taxonomy_types: default_taxonomy_types(),
            permalink: default_permalink(),
            per_page: default_per_page(),
            include_drafts: false,
            exclude_files: default_exclude_files(),
            include_files: Vec::new(),
            exclude_plugins: Vec::new(),
        }
    }
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            syntax_theme: default_syntax_theme(),
        }
    }
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            watch_excludes: default_watch_excludes(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            CoreError::config_with_source(
                format!("Failed to parse config file: {}", path.display()),
                e,
            )
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration, layering `QUIRE__SECTION__KEY` environment variables
    /// over the file.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix("QUIRE").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.build.post_types.is_empty() {
            return Err(CoreError::config("build.post_types cannot be empty"));
        }

        if self.build.post_types.iter().any(|t| t.trim().is_empty()) {
            return Err(CoreError::config("build.post_types cannot contain empty names"));
        }

        if self.build.per_page == 0 {
            return Err(CoreError::config("build.per_page must be greater than zero"));
        }

        if self.destination_dir() == self.source_dir() {
            return Err(CoreError::config(
                "build.destination cannot be the source directory",
            ));
        }

        if self.site.url.ends_with('/') {
            tracing::warn!("site.url should not have a trailing slash");
        }

        Ok(())
    }

    /// Root of the source tree.
    #[must_use]
    pub fn source_dir(&self) -> &Path {
        &self.build.source
    }

    /// Output directory, resolved against the source root.
    #[must_use]
    pub fn destination_dir(&self) -> PathBuf {
        self.build.source.join(&self.build.destination)
    }

    /// Absolute-or-rooted path of a layout by name.
    #[must_use]
    pub fn layout_path(&self, name: &str) -> PathBuf {
        self.build
            .source
            .join(&self.build.layouts_dir)
            .join(format!("{name}.html"))
    }

    /// Directory holding partials.
    #[must_use]
    pub fn partials_dir(&self) -> PathBuf {
        self.build.source.join(&self.build.partials_dir)
    }

    /// Directory holding loose pages.
    #[must_use]
    pub fn pages_dir(&self) -> PathBuf {
        self.build.source.join(&self.build.pages_dir)
    }

    /// Get the full URL for a permalink.
    pub fn url_for(&self, path: &str) -> String {
        let base = self.site.url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }
}
