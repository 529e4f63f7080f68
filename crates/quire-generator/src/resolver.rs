//! Template resolution and the per-build template registry.
//!
//! A [`Template`] is a source file with its layout chain resolved: its data is
//! the deep merge of every ancestor layout's data (root-most first) with the
//! file's own metadata winning. Layouts are referenced by path and looked up
//! in the [`TemplateRegistry`], which caches resolved templates per
//! configuration.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use quire_core::{
    Config, ContentFormat, CoreError, Metadata, SourceFile,
    data::deep_merge,
};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace};

use crate::engine::{TemplateEngine, TemplateError};

/// Template resolution errors.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Reading or parsing the source file failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A layout chain leads back to a file already being resolved.
    #[error("cyclic layout chain: {}", Chain(.chain))]
    CyclicLayout { chain: Vec<PathBuf> },

    /// A layout referenced by a template is missing from the registry.
    #[error("layout not resolved: {0}")]
    LayoutNotResolved(PathBuf),

    /// The template engine rejected a template.
    #[error("template error in {path}: {source}")]
    Render {
        path: PathBuf,
        #[source]
        source: TemplateError,
    },
}

/// Result type for resolver operations.
pub type Result<T> = std::result::Result<T, ResolveError>;

struct Chain<'a>(&'a [PathBuf]);

impl fmt::Display for Chain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<_> = self.0.iter().map(|p| p.display().to_string()).collect();
        f.write_str(&parts.join(" -> "))
    }
}

/// A source file with its layout chain resolved.
///
/// Cloning deep-copies the data while sharing the body and the layout
/// reference, so one physical template can be rendered with several data
/// contexts.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    path: Option<PathBuf>,
    data: Metadata,
    content: Arc<str>,
    format: ContentFormat,
    layout: Option<PathBuf>,
}

impl Template {
    /// Create a template that does not come from a file and has no layout.
    pub fn inline(data: Metadata, content: impl Into<Arc<str>>) -> Self {
        Self {
            path: None,
            data,
            content: content.into(),
            format: ContentFormat::Html,
            layout: None,
        }
    }

    /// Path of the source file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Effective (merged) data.
    #[must_use]
    pub fn data(&self) -> &Metadata {
        &self.data
    }

    /// Mutable access to this copy's data.
    pub fn data_mut(&mut self) -> &mut Metadata {
        &mut self.data
    }

    /// Body content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Content format derived from the file extension.
    #[must_use]
    pub fn format(&self) -> ContentFormat {
        self.format
    }

    /// Path of the immediate layout, if any.
    #[must_use]
    pub fn layout(&self) -> Option<&Path> {
        self.layout.as_deref()
    }

    /// Whether the template carries any data.
    #[must_use]
    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }

    fn label(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| PathBuf::from("<inline>"))
    }

    /// Compile the body against `data`, defaulting to the template's own data.
    pub fn render_content(&self, engine: &TemplateEngine, data: Option<&Metadata>) -> Result<String> {
        engine
            .render_map(&self.content, data.unwrap_or(&self.data))
            .map_err(|source| ResolveError::Render {
                path: self.label(),
                source,
            })
    }

    /// Wrap `content` in every layout of the chain, innermost first.
    ///
    /// Each layout is compiled with `data` plus a `content` key holding the
    /// output of the previous step. Without a layout the content comes back
    /// unchanged.
    pub fn render_layout(
        &self,
        registry: &TemplateRegistry,
        engine: &TemplateEngine,
        content: Option<String>,
        data: Option<&Metadata>,
    ) -> Result<String> {
        let mut content = match content {
            Some(content) => content,
            None => self.render_content(engine, data)?,
        };

        let mut scope = Value::Object(data.unwrap_or(&self.data).clone());
        let mut next = self.layout.clone();

        while let Some(path) = next {
            let layout = registry
                .get(&path)
                .ok_or_else(|| ResolveError::LayoutNotResolved(path.clone()))?;

            if let Value::Object(map) = &mut scope {
                map.insert("content".to_string(), Value::String(content));
            }
            content = engine
                .render(&layout.content, &scope)
                .map_err(|source| ResolveError::Render {
                    path: path.clone(),
                    source,
                })?;
            trace!(layout = %path.display(), "rendered layout");
            next = layout.layout.clone();
        }

        Ok(content)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    config: Arc<Config>,
    template: Arc<Template>,
}

/// Cache of resolved templates keyed by absolute path.
///
/// An entry is only returned for the configuration instance it was created
/// under.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    entries: HashMap<PathBuf, Entry>,
}

impl TemplateRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a file and its layout chain.
    ///
    /// Repeated calls with the same path and configuration return the cached
    /// template without touching the filesystem.
    pub fn resolve(&mut self, path: &Path, config: &Arc<Config>) -> Result<Arc<Template>> {
        let path = absolute(path)?;
        if let Some(template) = self.cached(&path, config) {
            return Ok(template);
        }

        // Walk down the chain until a cached layout or a file without one.
        let mut pending: Vec<SourceFile> = Vec::new();
        let mut resolving: HashSet<PathBuf> = HashSet::new();
        let mut current = path.clone();

        let mut base = loop {
            if !resolving.insert(current.clone()) {
                let mut chain: Vec<PathBuf> =
                    pending.iter().map(|s| s.path().to_path_buf()).collect();
                chain.push(current);
                return Err(ResolveError::CyclicLayout { chain });
            }

            trace!(path = %current.display(), "parsing template");
            let source = SourceFile::read(&current)?;
            let layout = layout_name(source.metadata())
                .map(|name| absolute(&config.layout_path(name)))
                .transpose()?;
            pending.push(source);

            match layout {
                None => break None,
                Some(layout) => match self.cached(&layout, config) {
                    Some(template) => break Some(template),
                    None => current = layout,
                },
            }
        };

        // Build root-most first so every template merges onto its parent.
        while let Some(source) = pending.pop() {
            let (file, own, body) = source.into_parts();
            let data = match &base {
                Some(parent) => deep_merge(&parent.data, &own),
                None => own,
            };
            let template = Arc::new(Template {
                format: ContentFormat::from_path(&file),
                path: Some(file.clone()),
                data,
                content: body.into(),
                layout: base.as_ref().and_then(|parent| parent.path.clone()),
            });
            debug!(path = %file.display(), "resolved template");
            self.entries.insert(
                file,
                Entry {
                    config: Arc::clone(config),
                    template: Arc::clone(&template),
                },
            );
            base = Some(template);
        }

        base.ok_or(ResolveError::LayoutNotResolved(path))
    }

    fn cached(&self, path: &Path, config: &Arc<Config>) -> Option<Arc<Template>> {
        self.entries
            .get(path)
            .filter(|entry| Arc::ptr_eq(&entry.config, config))
            .map(|entry| Arc::clone(&entry.template))
    }

    /// Look up a resolved template regardless of configuration.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<Arc<Template>> {
        self.entries.get(path).map(|entry| Arc::clone(&entry.template))
    }

    /// Check whether a path has been resolved.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Number of cached templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every cached template.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

fn layout_name(metadata: &Metadata) -> Option<&str> {
    metadata
        .get("layout")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|e| CoreError::io(path, e).into())
}
