//! Pages: renderable output units.
//!
//! A page is a post with a layout, a loose file with front-matter, or one
//! slice of a paginated listing. Rendering compiles the body, then wraps it
//! in the layout chain; lifecycle hooks fire around each step and may change
//! the page's content and permalink in between.

use std::{
    fs,
    path::{Component, Path, PathBuf},
};

use quire_core::{Config, ContentFormat, Metadata, data::merge_into};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    engine::TemplateEngine,
    hooks::{HookError, Hooks, PageHook},
    permalink::{PermalinkContext, compute_permalink, normalize, url_path},
    post::{Post, PostCollection},
    resolver::{ResolveError, Template, TemplateRegistry},
};

/// Default permalink pattern for pages after the first of a listing,
/// relative to the first page's directory.
pub const DEFAULT_PAGE_PATTERN: &str = "page/:num/index.html";

/// Page errors.
#[derive(Debug, Error)]
pub enum PageError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid pagination in {path}: {message}")]
    Pagination { path: PathBuf, message: String },

    #[error("invalid permalink `{0}`")]
    Permalink(String),
}

/// Result type for page operations.
pub type Result<T> = std::result::Result<T, PageError>;

/// Position of a page within a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    /// 1-based page number.
    pub index: usize,
    /// Number of pages in the listing.
    pub total: usize,
    /// Posts per page.
    pub per_page: usize,
    /// Permalink of the previous page.
    pub prev: Option<String>,
    /// Permalink of the next page.
    pub next: Option<String>,
    /// Indices into the post collection shown on this page.
    pub posts: Vec<usize>,
}

impl Pagination {
    fn to_value(&self, posts: &PostCollection) -> Value {
        json!({
            "index": self.index,
            "total": self.total,
            "per_page": self.per_page,
            "prev": self.prev.as_deref().map(url_path),
            "next": self.next.as_deref().map(url_path),
            "posts": posts.summaries_of(&self.posts),
        })
    }
}

/// Shared state a page needs while rendering.
pub struct RenderContext<'a> {
    pub registry: &'a TemplateRegistry,
    pub engine: &'a TemplateEngine,
    pub hooks: &'a mut Hooks,
    pub posts: &'a PostCollection,
    /// Site-wide template data (`site`, `posts`, `taxonomies`).
    pub globals: &'a Metadata,
}

/// A renderable output unit.
#[derive(Debug, Clone)]
pub struct Page {
    template: Template,
    source: PathBuf,
    post_type: Option<String>,
    permalink: String,
    extension: String,
    content: String,
    pagination: Option<Pagination>,
}

impl Page {
    /// Create the page of a post that declares a layout.
    #[must_use]
    pub fn from_post(post: &Post) -> Self {
        Self {
            template: (**post.template()).clone(),
            source: post.relative_path().to_path_buf(),
            post_type: Some(post.post_type().to_string()),
            permalink: post.permalink().to_string(),
            extension: extension_of(post.relative_path()),
            content: String::new(),
            pagination: None,
        }
    }

    /// Create a page from a loose file.
    ///
    /// The permalink is the metadata `permalink` pattern if present,
    /// otherwise the relative path with the pages directory prefix removed.
    #[must_use]
    pub fn from_template(template: &Template, relative: &Path, config: &Config) -> Self {
        let output = relative
            .strip_prefix(&config.build.pages_dir)
            .unwrap_or(relative);

        let permalink = match template.data().get("permalink").and_then(Value::as_str) {
            Some(pattern) => compute_permalink(
                pattern,
                template.data(),
                &PermalinkContext {
                    post_type: "",
                    path: relative,
                },
            ),
            None => normalize(&path_to_permalink(output)),
        };

        Self {
            template: template.clone(),
            source: relative.to_path_buf(),
            post_type: None,
            permalink,
            extension: extension_of(relative),
            content: String::new(),
            pagination: None,
        }
    }

    /// The page's template copy.
    #[must_use]
    pub fn template(&self) -> &Template {
        &self.template
    }

    /// This page's data.
    #[must_use]
    pub fn data(&self) -> &Metadata {
        self.template.data()
    }

    /// Mutable access to this page's data.
    pub fn data_mut(&mut self) -> &mut Metadata {
        self.template.data_mut()
    }

    /// Source path relative to the site root.
    #[must_use]
    pub fn source_path(&self) -> &Path {
        &self.source
    }

    /// Content type when the page comes from a post.
    #[must_use]
    pub fn post_type(&self) -> Option<&str> {
        self.post_type.as_deref()
    }

    #[must_use]
    pub fn permalink(&self) -> &str {
        &self.permalink
    }

    pub fn set_permalink(&mut self, permalink: String) {
        self.permalink = permalink;
    }

    /// Source file extension without the dot.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    #[must_use]
    pub fn format(&self) -> ContentFormat {
        self.template.format()
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn set_content(&mut self, content: String) {
        self.content = content;
    }

    #[must_use]
    pub fn pagination(&self) -> Option<&Pagination> {
        self.pagination.as_ref()
    }

    /// Split a listing page into its pagination slices.
    ///
    /// Does nothing unless the metadata has a `paginate` object. This page
    /// keeps the first slice; the returned pages are slices 2 and up, each
    /// with its own copy of the data.
    pub fn paginate(&mut self, posts: &PostCollection, config: &Config) -> Result<Vec<Page>> {
        let options = match self.template.data().get("paginate") {
            None | Some(Value::Null | Value::Bool(false)) => return Ok(Vec::new()),
            Some(Value::Bool(true)) => Map::new(),
            Some(Value::Object(options)) => options.clone(),
            Some(_) => return Err(self.pagination_error("`paginate` must be an object")),
        };

        let per_page = match options.get("per_page") {
            None => config.build.per_page,
            Some(value) => value
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| self.pagination_error("`per_page` must be a positive integer"))?,
        };
        if per_page == 0 {
            return Err(self.pagination_error("`per_page` must be a positive integer"));
        }

        let pattern = options
            .get("permalink")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_PAGE_PATTERN);
        if !pattern.contains(":num") {
            return Err(self.pagination_error("pagination permalink must contain `:num`"));
        }

        let post_type = options.get("post_type").and_then(Value::as_str);
        let indices = posts.newest_first(post_type);
        let total = indices.len().div_ceil(per_page).max(1);

        let permalinks: Vec<String> = (1..=total)
            .map(|num| {
                if num == 1 {
                    self.permalink.clone()
                } else {
                    page_permalink(&self.permalink, pattern, num)
                }
            })
            .collect();

        let mut slices: Vec<Vec<usize>> = indices.chunks(per_page).map(<[usize]>::to_vec).collect();
        if slices.is_empty() {
            slices.push(Vec::new());
        }

        let mut rest = Vec::with_capacity(total - 1);
        for (i, slice) in slices.into_iter().enumerate() {
            let pagination = Pagination {
                index: i + 1,
                total,
                per_page,
                prev: i.checked_sub(1).map(|prev| permalinks[prev].clone()),
                next: permalinks.get(i + 1).cloned(),
                posts: slice,
            };
            if i == 0 {
                self.pagination = Some(pagination);
            } else {
                let mut page = self.clone();
                page.permalink = permalinks[i].clone();
                page.pagination = Some(pagination);
                rest.push(page);
            }
        }

        debug!(page = %self.source.display(), pages = total, per_page, "paginated");
        Ok(rest)
    }

    /// Point this slice's `prev` link at the slice before it.
    ///
    /// Listeners may move a page while it renders, so the link is taken from
    /// `previous` once it has been written. Pages from other listings are
    /// ignored.
    pub(crate) fn link_previous(&mut self, previous: &Page) {
        let (Some(pagination), Some(before)) = (self.pagination.as_mut(), previous.pagination())
        else {
            return;
        };
        if previous.source == self.source && before.index + 1 == pagination.index {
            pagination.prev = Some(previous.permalink.clone());
        }
    }

    fn pagination_error(&self, message: &str) -> PageError {
        PageError::Pagination {
            path: self.source.clone(),
            message: message.to_string(),
        }
    }

    /// Data the page is compiled with: site globals, then the page's own
    /// metadata, then `page` and `pagination`.
    #[must_use]
    pub fn render_data(&self, globals: &Metadata, posts: &PostCollection) -> Metadata {
        let mut data = globals.clone();
        merge_into(&mut data, self.template.data());

        let mut page = match data.remove("page") {
            Some(Value::Object(page)) => page,
            _ => Map::new(),
        };
        page.insert("permalink".to_string(), Value::String(self.permalink.clone()));
        page.insert("url".to_string(), Value::String(url_path(&self.permalink)));
        page.insert(
            "source".to_string(),
            Value::String(path_to_permalink(&self.source)),
        );
        data.insert("page".to_string(), Value::Object(page));

        if let Some(pagination) = &self.pagination {
            data.insert("pagination".to_string(), pagination.to_value(posts));
        }
        data
    }

    /// Compile the content and wrap it in the layout chain.
    pub fn render(&mut self, ctx: &mut RenderContext<'_>) -> Result<()> {
        ctx.hooks.fire_page(PageHook::BeforeRenderContent, self)?;
        let data = self.render_data(ctx.globals, ctx.posts);
        self.content = self.template.render_content(ctx.engine, Some(&data))?;
        ctx.hooks.fire_page(PageHook::AfterRenderContent, self)?;

        ctx.hooks.fire_page(PageHook::BeforeRenderLayout, self)?;
        // Listeners may have moved the page.
        let data = self.render_data(ctx.globals, ctx.posts);
        let content = std::mem::take(&mut self.content);
        self.content =
            self.template
                .render_layout(ctx.registry, ctx.engine, Some(content), Some(&data))?;
        ctx.hooks.fire_page(PageHook::AfterRenderLayout, self)?;

        trace!(page = %self.source.display(), permalink = %self.permalink, "rendered page");
        Ok(())
    }

    /// Output file of this page under `destination`.
    pub fn output_path(&self, destination: &Path) -> Result<PathBuf> {
        let relative = Path::new(self.permalink.trim_start_matches('/'));
        let valid = relative.components().next().is_some()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !valid {
            return Err(PageError::Permalink(self.permalink.clone()));
        }
        Ok(destination.join(relative))
    }

    /// Write the rendered content to `destination/permalink`.
    pub fn write(&mut self, destination: &Path, hooks: &mut Hooks) -> Result<PathBuf> {
        hooks.fire_page(PageHook::BeforeWrite, self)?;

        let path = self.output_path(destination)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| PageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, &self.content).map_err(|source| PageError::Io {
            path: path.clone(),
            source,
        })?;

        hooks.fire_page(PageHook::AfterWrite, self)?;
        Ok(path)
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn path_to_permalink(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn page_permalink(first: &str, pattern: &str, num: usize) -> String {
    let path = pattern.replace(":num", &num.to_string());
    if path.starts_with('/') {
        return normalize(&path);
    }
    let dir = first.rsplit_once('/').map_or("", |(dir, _)| dir);
    if dir.is_empty() {
        normalize(&path)
    } else {
        normalize(&format!("{dir}/{path}"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;

    fn template(data: Value, body: &str) -> Template {
        let Value::Object(map) = data else {
            panic!("expected object");
        };
        Template::inline(map, body)
    }

    fn collection(n: usize) -> PostCollection {
        let config = Config::default();
        let mut posts = PostCollection::new();
        for i in 0..n {
            let data = json!({"title": format!("Post {i}"), "date": format!("2024-01-{:02}", i + 1)});
            let Value::Object(map) = data else {
                unreachable!()
            };
            let template = Arc::new(Template::inline(map, ""));
            posts.push(Post::new(template, format!("_posts/p{i}.md"), "post", &config));
        }
        posts
    }

    #[test]
    fn test_loose_page_permalink() {
        let config = Config::default();
        let t = template(json!({"title": "About"}), "");

        let page = Page::from_template(&t, Path::new("about/index.html"), &config);
        assert_eq!(page.permalink(), "about/index.html");

        let page = Page::from_template(&t, Path::new("_pages/contact.md"), &config);
        assert_eq!(page.permalink(), "contact.md");
        assert_eq!(page.extension(), "md");
    }

    #[test]
    fn test_metadata_permalink_wins() {
        let config = Config::default();
        let t = template(json!({"title": "Feed", "permalink": "/feed/"}), "");
        let page = Page::from_template(&t, Path::new("feed.xml"), &config);
        assert_eq!(page.permalink(), "/feed/index.html");
    }

    #[test]
    fn test_paginate_page_count_and_links() {
        let config = Config::default();
        let posts = collection(7);
        let t = template(json!({"paginate": {"per_page": 3}}), "");
        let mut first = Page::from_template(&t, Path::new("blog/index.html"), &config);

        let rest = first.paginate(&posts, &config).expect("paginate");
        assert_eq!(rest.len(), 2);

        let p1 = first.pagination().unwrap();
        assert_eq!((p1.index, p1.total, p1.per_page), (1, 3, 3));
        assert_eq!(p1.prev, None);
        assert_eq!(p1.next.as_deref(), Some("blog/page/2/index.html"));
        assert_eq!(p1.posts, [6, 5, 4]);

        let p2 = rest[0].pagination().unwrap();
        assert_eq!(rest[0].permalink(), "blog/page/2/index.html");
        assert_eq!(p2.index, 2);
        assert_eq!(p2.prev.as_deref(), Some("blog/index.html"));
        assert_eq!(p2.next.as_deref(), Some("blog/page/3/index.html"));

        let p3 = rest[1].pagination().unwrap();
        assert_eq!(p3.index, 3);
        assert_eq!(p3.next, None);
        assert_eq!(p3.posts, [0]);
    }

    #[test]
    fn test_prev_link_follows_moved_page() {
        let config = Config::default();
        let posts = collection(3);
        let t = template(json!({"paginate": {"per_page": 2}}), "");
        let mut first = Page::from_template(&t, Path::new("blog.md"), &config);
        let mut rest = first.paginate(&posts, &config).expect("paginate");
        assert_eq!(rest[0].pagination().unwrap().prev.as_deref(), Some("blog.md"));

        first.set_permalink("blog.html".to_string());
        rest[0].link_previous(&first);
        assert_eq!(rest[0].pagination().unwrap().prev.as_deref(), Some("blog.html"));

        let other = Page::from_template(&t, Path::new("other.html"), &config);
        rest[0].link_previous(&other);
        assert_eq!(rest[0].pagination().unwrap().prev.as_deref(), Some("blog.html"));
    }

    #[test]
    fn test_paginate_without_posts_keeps_one_page() {
        let config = Config::default();
        let posts = PostCollection::new();
        let t = template(json!({"paginate": true}), "");
        let mut page = Page::from_template(&t, Path::new("index.html"), &config);

        let rest = page.paginate(&posts, &config).expect("paginate");
        assert!(rest.is_empty());
        let pagination = page.pagination().unwrap();
        assert_eq!((pagination.index, pagination.total), (1, 1));
        assert!(pagination.posts.is_empty());
    }

    #[test]
    fn test_paginate_custom_pattern_and_exact_fit() {
        let config = Config::default();
        let posts = collection(4);
        let t = template(
            json!({"paginate": {"per_page": 2, "permalink": "/archive/:num.html"}}),
            "",
        );
        let mut page = Page::from_template(&t, Path::new("index.html"), &config);
        let rest = page.paginate(&posts, &config).expect("paginate");

        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].permalink(), "/archive/2.html");
    }

    #[test]
    fn test_paginated_pages_have_independent_data() {
        let config = Config::default();
        let posts = collection(2);
        let t = template(json!({"paginate": {"per_page": 1}, "title": "Blog"}), "");
        let mut page = Page::from_template(&t, Path::new("index.html"), &config);
        let mut rest = page.paginate(&posts, &config).expect("paginate");

        rest[0].data_mut().insert("title".into(), json!("Blog 2"));
        assert_eq!(page.data()["title"], json!("Blog"));
    }

    #[test]
    fn test_paginate_rejects_bad_options() {
        let config = Config::default();
        let posts = collection(1);
        for bad in [
            json!({"paginate": {"per_page": 0}}),
            json!({"paginate": {"permalink": "page.html"}}),
            json!({"paginate": "yes"}),
        ] {
            let t = template(bad, "");
            let mut page = Page::from_template(&t, Path::new("index.html"), &config);
            assert!(matches!(
                page.paginate(&posts, &config),
                Err(PageError::Pagination { .. })
            ));
        }
    }

    #[test]
    fn test_render_data() {
        let config = Config::default();
        let posts = collection(1);
        let t = template(json!({"title": "About", "site": {"title": "Mine"}}), "");
        let page = Page::from_template(&t, Path::new("about.html"), &config);

        let mut globals = Metadata::new();
        globals.insert("site".into(), json!({"title": "Site", "url": "https://x"}));
        let data = page.render_data(&globals, &posts);

        assert_eq!(data["title"], json!("About"));
        assert_eq!(data["site"]["title"], json!("Mine"));
        assert_eq!(data["site"]["url"], json!("https://x"));
        assert_eq!(data["page"]["url"], json!("/about.html"));
        assert!(data.get("pagination").is_none());
    }

    #[test]
    fn test_render_fires_hooks_in_order() {
        let config = Config::default();
        let registry = TemplateRegistry::new();
        let engine = TemplateEngine::new();
        let posts = PostCollection::new();
        let globals = Metadata::new();
        let mut hooks = Hooks::new();

        hooks.on_page(PageHook::BeforeRenderContent, |page| {
            page.data_mut().insert("name".into(), json!("world"));
            Ok(())
        });
        hooks.on_page(PageHook::AfterRenderContent, |page| {
            let content = format!("[{}]", page.content());
            page.set_content(content);
            Ok(())
        });
        hooks.on_page(PageHook::AfterRenderLayout, |page| {
            page.set_permalink("moved.html".to_string());
            Ok(())
        });

        let t = template(json!({}), "hello {{name}}");
        let mut page = Page::from_template(&t, Path::new("index.html"), &config);
        let mut ctx = RenderContext {
            registry: &registry,
            engine: &engine,
            hooks: &mut hooks,
            posts: &posts,
            globals: &globals,
        };
        page.render(&mut ctx).expect("render");

        assert_eq!(page.content(), "[hello world]");
        assert_eq!(page.permalink(), "moved.html");
    }

    #[test]
    fn test_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let config = Config::default();
        let t = template(json!({}), "");
        let mut page = Page::from_template(&t, Path::new("a/b/c.html"), &config);
        page.set_content("<p>x</p>".to_string());

        let mut hooks = Hooks::new();
        let path = page.write(dir.path(), &mut hooks).expect("write");

        assert_eq!(path, dir.path().join("a/b/c.html"));
        assert_eq!(fs::read_to_string(path).unwrap(), "<p>x</p>");
    }

    #[test]
    fn test_write_rejects_escaping_permalink() {
        let dir = TempDir::new().unwrap();
        let config = Config::default();
        let t = template(json!({}), "");
        let mut page = Page::from_template(&t, Path::new("a.html"), &config);
        page.set_permalink("../outside.html".to_string());

        let mut hooks = Hooks::new();
        assert!(matches!(
            page.write(dir.path(), &mut hooks),
            Err(PageError::Permalink(_))
        ));
    }
}
