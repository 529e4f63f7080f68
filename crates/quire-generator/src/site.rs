//! Build orchestration.
//!
//! A [`Site`] owns every per-build cache (template registry, partials, hooks,
//! posts, pages, plain files) and drives the build phases in a fixed order.
//! [`Site::rebuild`] drops all of it and builds again from scratch.

use std::{
    collections::HashSet,
    fmt, fs,
    path::{Component, Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use quire_core::{
    Config, CoreError, Metadata,
    data::pluralize,
};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    engine::{TemplateEngine, TemplateError},
    hooks::{BuildHook, FileHook, HookError, Hooks},
    page::{Page, PageError, RenderContext},
    plugin::{Plugin, PluginError, builtin_plugins, select_plugins},
    post::{Post, PostCollection, is_draft},
    resolver::{ResolveError, TemplateRegistry},
    scan::{self, ExcludeSet, ScanError},
};

/// Build errors.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Filesystem failure at a path.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// A partial failed to compile.
    #[error("template error in {path}: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: TemplateError,
    },

    #[error(transparent)]
    Page(PageError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    /// Cleaning the destination would delete the source tree.
    #[error("refusing to clean {0}: it contains the source tree")]
    UnsafeDestination(PathBuf),

    /// An `include_files` entry points outside the source tree.
    #[error("included file {0} is outside the source tree")]
    IncludeOutsideSource(PathBuf),
}

impl From<PageError> for BuildError {
    fn from(err: PageError) -> Self {
        match err {
            PageError::Resolve(err) => Self::Resolve(err),
            PageError::Hook(err) => Self::Hook(err),
            other => Self::Page(other),
        }
    }
}

impl BuildError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for build operations.
pub type Result<T> = std::result::Result<T, BuildError>;

/// Build statistics.
#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    /// Number of posts collected.
    pub posts: usize,

    /// Number of pages written.
    pub pages: usize,

    /// Number of plain files copied.
    pub files: usize,

    /// Build duration.
    pub duration: Duration,
}

/// A site and all of its per-build state.
pub struct Site {
    config: Arc<Config>,
    builtins: Vec<Arc<dyn Plugin>>,
    locals: Vec<Arc<dyn Plugin>>,
    registry: TemplateRegistry,
    engine: TemplateEngine,
    hooks: Hooks,
    posts: PostCollection,
    pages: Vec<Page>,
    files: Vec<PathBuf>,
    root: PathBuf,
    destination: PathBuf,
}

impl fmt::Debug for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plugins: Vec<_> = self
            .builtins
            .iter()
            .chain(&self.locals)
            .map(|plugin| plugin.name())
            .collect();
        f.debug_struct("Site")
            .field("root", &self.root)
            .field("destination", &self.destination)
            .field("plugins", &plugins)
            .field("templates", &self.registry.len())
            .field("posts", &self.posts.len())
            .field("pages", &self.pages.len())
            .field("files", &self.files.len())
            .finish()
    }
}

impl Site {
    /// Create a site with the built-in plugins.
    #[must_use]
    pub fn new(config: impl Into<Arc<Config>>) -> Self {
        let config = config.into();
        let root = config.source_dir().to_path_buf();
        let destination = config.destination_dir();
        Self {
            config,
            builtins: builtin_plugins(),
            locals: Vec::new(),
            registry: TemplateRegistry::new(),
            engine: TemplateEngine::new(),
            hooks: Hooks::new(),
            posts: PostCollection::new(),
            pages: Vec::new(),
            files: Vec::new(),
            root,
            destination,
        }
    }

    /// Add a local plugin; it replaces a built-in of the same name.
    #[must_use]
    pub fn with_plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.locals.push(Arc::new(plugin));
        self
    }

    #[must_use]
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Resolved template cache.
    #[must_use]
    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    #[must_use]
    pub fn posts(&self) -> &PostCollection {
        &self.posts
    }

    /// Pages in render order.
    #[must_use]
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Plain files copied verbatim.
    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Absolute output directory.
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Execute the full build.
    pub fn build(&mut self) -> Result<BuildStats> {
        let start = Instant::now();

        self.root = std::path::absolute(self.config.source_dir())
            .map_err(|e| BuildError::io(self.config.source_dir(), e))?;
        self.destination = std::path::absolute(self.config.destination_dir())
            .map_err(|e| BuildError::io(self.config.destination_dir(), e))?;

        info!(
            source = %self.root.display(),
            destination = %self.destination.display(),
            "starting build"
        );

        // 1. Reset placeholders
        self.reset_placeholders();

        // 2. Scan content types
        self.scan_posts()?;

        // 3. Scan remaining files
        self.scan_files()?;

        // 4. Clean destination
        self.clean_destination()?;

        // 5. Partials and plugins
        self.register_partials()?;
        self.load_plugins()?;

        // 6. Paginate
        self.hooks.fire_build(BuildHook::BeforeBuild, &self.config)?;
        self.paginate()?;

        // 7. Render
        self.hooks.fire_build(BuildHook::BeforeRender, &self.config)?;
        self.render_posts()?;
        let pages = self.render_pages()?;

        // 8. Copy plain files
        let files = self.copy_files()?;
        self.hooks.fire_build(BuildHook::AfterBuild, &self.config)?;

        let stats = BuildStats {
            posts: self.posts.len(),
            pages,
            files,
            duration: start.elapsed(),
        };

        info!(
            posts = stats.posts,
            pages = stats.pages,
            files = stats.files,
            duration_ms = stats.duration.as_millis() as u64,
            "build complete"
        );

        Ok(stats)
    }

    /// Discard every cache and build again.
    pub fn rebuild(&mut self) -> Result<BuildStats> {
        debug!("discarding build state");
        self.hooks = Hooks::new();
        self.registry.clear();
        self.engine = TemplateEngine::new();
        self.reset_placeholders();
        self.build()
    }

    fn reset_placeholders(&mut self) {
        self.posts = PostCollection::new();
        self.pages.clear();
        self.files.clear();
    }

    fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }

    fn scan_posts(&mut self) -> Result<()> {
        for post_type in &self.config.build.post_types {
            let dir = self.root.join(format!("_{}", pluralize(post_type)));
            let files = scan::list_files(&dir)?;
            debug!(post_type = %post_type, dir = %dir.display(), count = files.len(), "scanning posts");

            for path in files {
                let template = self.registry.resolve(&path, &self.config)?;
                if is_draft(template.data()) && !self.config.build.include_drafts {
                    debug!(path = %path.display(), "skipping draft");
                    continue;
                }

                let has_layout = template.layout().is_some();
                let post = Post::new(template, self.relative(&path), post_type, &self.config);
                let page = has_layout.then(|| Page::from_post(&post));
                self.posts.push(post);
                self.pages.extend(page);
            }
        }
        Ok(())
    }

    fn scan_files(&mut self) -> Result<()> {
        let excludes = ExcludeSet::new(&self.config.build.exclude_files)?;
        let mut files = scan::walk_files(&self.root, &excludes, &[self.destination.clone()])?;

        for include in &self.config.build.include_files {
            if !is_contained(include) {
                return Err(BuildError::IncludeOutsideSource(include.clone()));
            }
            let path = self.root.join(include);
            if path.is_file() {
                files.push(path);
            } else {
                warn!(path = %path.display(), "included file not found");
            }
        }
        files.extend(scan::list_files(&self.root.join(&self.config.build.pages_dir))?);

        let mut seen = HashSet::new();
        for path in files {
            if !seen.insert(path.clone()) {
                continue;
            }
            // The first-line check keeps binary assets out of the resolver.
            if !scan::has_front_matter(&path)? {
                self.files.push(path);
                continue;
            }
            let template = self.registry.resolve(&path, &self.config)?;
            if template.has_data() {
                let page = Page::from_template(&template, self.relative(&path), &self.config);
                self.pages.push(page);
            } else {
                debug!(path = %path.display(), "empty metadata, copying verbatim");
                self.files.push(path);
            }
        }

        debug!(pages = self.pages.len(), files = self.files.len(), "scanned files");
        Ok(())
    }

    fn clean_destination(&self) -> Result<()> {
        if self.root.starts_with(&self.destination) {
            return Err(BuildError::UnsafeDestination(self.destination.clone()));
        }

        debug!(dir = %self.destination.display(), "cleaning destination");
        match fs::remove_dir_all(&self.destination) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(BuildError::io(&self.destination, e)),
        }
        fs::create_dir_all(&self.destination).map_err(|e| BuildError::io(&self.destination, e))
    }

    fn register_partials(&mut self) -> Result<()> {
        self.engine = TemplateEngine::new();
        let dir = self.root.join(&self.config.build.partials_dir);
        if !dir.is_dir() {
            return Ok(());
        }

        for path in scan::walk_files(&dir, &ExcludeSet::default(), &[])? {
            let Some(name) = path
                .file_stem()
                .filter(|_| path.extension().is_some())
                .map(|stem| stem.to_string_lossy().into_owned())
            else {
                continue;
            };
            let source = fs::read_to_string(&path).map_err(|e| BuildError::io(&path, e))?;
            self.engine
                .register_partial(&name, &source)
                .map_err(|source| BuildError::Template {
                    path: path.clone(),
                    source,
                })?;
        }

        debug!(count = self.engine.partial_count(), "registered partials");
        Ok(())
    }

    fn load_plugins(&mut self) -> Result<()> {
        let mut hooks = Hooks::new();
        for plugin in select_plugins(&self.builtins, &self.locals, &self.config.build.exclude_plugins) {
            plugin.register(&mut hooks, &self.config)?;
            debug!(plugin = plugin.name(), "loaded plugin");
        }
        self.hooks = hooks;
        Ok(())
    }

    fn paginate(&mut self) -> Result<()> {
        let pages = std::mem::take(&mut self.pages);
        for mut page in pages {
            let rest = page.paginate(&self.posts, &self.config)?;
            self.pages.push(page);
            self.pages.extend(rest);
        }
        Ok(())
    }

    fn site_value(&self) -> Value {
        serde_json::to_value(&self.config.site).unwrap_or(Value::Null)
    }

    fn render_posts(&mut self) -> Result<()> {
        let site = self.site_value();
        for post in self.posts.iter_mut() {
            let mut data = post.data().clone();
            data.entry("site").or_insert_with(|| site.clone());
            post.render(&self.engine, &mut self.hooks, &data)?;
        }
        Ok(())
    }

    fn render_pages(&mut self) -> Result<usize> {
        let mut globals = Metadata::new();
        globals.insert("site".to_string(), self.site_value());
        globals.insert("posts".to_string(), self.posts.summaries());
        globals.insert("taxonomies".to_string(), self.posts.taxonomies_value());

        let mut ctx = RenderContext {
            registry: &self.registry,
            engine: &self.engine,
            hooks: &mut self.hooks,
            posts: &self.posts,
            globals: &globals,
        };

        let mut written = HashSet::new();
        for i in 0..self.pages.len() {
            let page = &mut self.pages[i];
            page.render(&mut ctx)?;
            let path = page.write(&self.destination, ctx.hooks)?;
            debug!(path = %path.display(), "wrote page");
            if !written.insert(path.clone()) {
                warn!(path = %path.display(), source = %page.source_path().display(), "page overwrote earlier output");
            }

            // The next slice of a listing links to where this one was written.
            let (done, rest) = self.pages.split_at_mut(i + 1);
            if let Some(next) = rest.first_mut() {
                next.link_previous(&done[i]);
            }
        }

        Ok(self.pages.len())
    }

    fn copy_files(&mut self) -> Result<usize> {
        for path in &self.files {
            let relative = path
                .strip_prefix(&self.root)
                .ok()
                .filter(|relative| is_contained(relative))
                .ok_or_else(|| BuildError::IncludeOutsideSource(path.clone()))?;
            let target = self.destination.join(relative);

            self.hooks.fire_file(FileHook::BeforeCopy, path)?;
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
            }
            fs::copy(path, &target).map_err(|e| BuildError::io(path, e))?;
            self.hooks.fire_file(FileHook::AfterCopy, path)?;
        }

        debug!(count = self.files.len(), "copied files");
        Ok(self.files.len())
    }
}

/// Whether a relative path stays inside the directory it is joined to.
fn is_contained(relative: &Path) -> bool {
    relative.components().next().is_some()
        && relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}
