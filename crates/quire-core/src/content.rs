//! Content format detection.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Format of a source file, derived from its extension.
///
/// The resolver never looks at this; it tells render plugins what kind of
/// body they are looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    /// Markdown content (`.md`, `.markdown`).
    Markdown,
    /// XML content (feeds, sitemaps).
    Xml,
    /// Anything else.
    #[default]
    Html,
}

impl ContentFormat {
    /// Determine content format from a file extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "md" | "markdown" => Self::Markdown,
            "xml" => Self::Xml,
            _ => Self::Html,
        }
    }

    /// Determine content format from a path.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .map(|ext| Self::from_extension(&ext.to_string_lossy()))
            .unwrap_or_default()
    }

    /// Whether bodies of this format are Markdown.
    #[must_use]
    pub fn is_markdown(&self) -> bool {
        matches!(self, Self::Markdown)
    }
}
