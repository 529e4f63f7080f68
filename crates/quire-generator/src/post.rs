//! Posts and the per-build post collection.

use std::{
    cmp::Reverse,
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::NaiveDateTime;
use quire_core::{Config, ContentFormat, Metadata, data::pluralize};
use serde_json::{Map, Value};
use tracing::trace;

use crate::{
    engine::TemplateEngine,
    hooks::{Hooks, PostHook},
    page::PageError,
    permalink::{PermalinkContext, compute_permalink, parse_date, url_path},
    resolver::Template,
};

/// A source file that belongs to a content type.
#[derive(Debug, Clone)]
pub struct Post {
    template: Arc<Template>,
    post_type: String,
    relative: PathBuf,
    permalink: String,
    terms: BTreeMap<String, Vec<String>>,
    date: Option<NaiveDateTime>,
    content: Option<String>,
}

impl Post {
    /// Create a post of `post_type` from a resolved template.
    ///
    /// `relative` is the source path relative to the site root. Taxonomy
    /// terms are read from the plural metadata keys of the configured
    /// taxonomy types.
    pub fn new(
        template: Arc<Template>,
        relative: impl Into<PathBuf>,
        post_type: &str,
        config: &Config,
    ) -> Self {
        let relative = relative.into();
        let data = template.data();

        let pattern = data
            .get("permalink")
            .and_then(Value::as_str)
            .unwrap_or(&config.build.permalink);
        let permalink = compute_permalink(
            pattern,
            data,
            &PermalinkContext {
                post_type,
                path: &relative,
            },
        );

        let terms = config
            .build
            .taxonomy_types
            .iter()
            .map(|taxonomy| {
                let plural = pluralize(taxonomy);
                let values = read_terms(data.get(&plural));
                (plural, values)
            })
            .filter(|(_, values)| !values.is_empty())
            .collect();

        let date = data.get("date").and_then(parse_date);

        Self {
            template,
            post_type: post_type.to_string(),
            relative,
            permalink,
            terms,
            date,
            content: None,
        }
    }

    /// Resolved template.
    #[must_use]
    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }

    /// Effective metadata.
    #[must_use]
    pub fn data(&self) -> &Metadata {
        self.template.data()
    }

    /// Content type name.
    #[must_use]
    pub fn post_type(&self) -> &str {
        &self.post_type
    }

    /// Source path relative to the site root.
    #[must_use]
    pub fn relative_path(&self) -> &Path {
        &self.relative
    }

    /// Computed permalink.
    #[must_use]
    pub fn permalink(&self) -> &str {
        &self.permalink
    }

    /// Replace the permalink.
    pub fn set_permalink(&mut self, permalink: String) {
        self.permalink = permalink;
    }

    /// Terms of one taxonomy, by plural name.
    #[must_use]
    pub fn terms(&self, plural: &str) -> &[String] {
        self.terms.get(plural).map(Vec::as_slice).unwrap_or_default()
    }

    /// Parsed `date` metadata.
    #[must_use]
    pub fn date(&self) -> Option<NaiveDateTime> {
        self.date
    }

    /// Source content format.
    #[must_use]
    pub fn format(&self) -> ContentFormat {
        self.template.format()
    }

    /// Whether the post is marked `draft: true`.
    #[must_use]
    pub fn is_draft(&self) -> bool {
        is_draft(self.template.data())
    }

    /// Rendered content; `None` before the render phase.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// Replace the rendered content.
    pub fn set_content(&mut self, content: String) {
        self.content = Some(content);
    }

    /// Render the post body for listings, without layouts.
    pub fn render(
        &mut self,
        engine: &TemplateEngine,
        hooks: &mut Hooks,
        data: &Metadata,
    ) -> Result<(), PageError> {
        hooks.fire_post(PostHook::BeforeRenderPost, self)?;
        let content = self.template.render_content(engine, Some(data))?;
        self.content = Some(content);
        hooks.fire_post(PostHook::AfterRenderPost, self)?;
        trace!(post = %self.relative.display(), "rendered post");
        Ok(())
    }

    /// Template-facing summary: metadata plus `type`, `permalink`, `url`
    /// and `content`.
    #[must_use]
    pub fn summary(&self) -> Value {
        let mut map = self.template.data().clone();
        map.insert("type".to_string(), Value::String(self.post_type.clone()));
        map.insert(
            "permalink".to_string(),
            Value::String(self.permalink.clone()),
        );
        map.insert("url".to_string(), Value::String(url_path(&self.permalink)));
        map.insert(
            "content".to_string(),
            Value::String(self.content.clone().unwrap_or_default()),
        );
        Value::Object(map)
    }
}

/// Whether metadata marks a file as a draft.
#[must_use]
pub fn is_draft(data: &Metadata) -> bool {
    data.get("draft").and_then(Value::as_bool).unwrap_or(false)
}

fn read_terms(value: Option<&Value>) -> Vec<String> {
    let raw: Vec<&str> = match value {
        Some(Value::String(term)) => vec![term.as_str()],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };

    let mut terms: Vec<String> = Vec::with_capacity(raw.len());
    for term in raw.into_iter().map(str::trim) {
        if !term.is_empty() && !terms.iter().any(|seen| seen == term) {
            terms.push(term.to_string());
        }
    }
    terms
}

/// Posts of one build, grouped by type and indexed by taxonomy term.
#[derive(Debug, Clone, Default)]
pub struct PostCollection {
    posts: Vec<Post>,
    by_type: BTreeMap<String, Vec<usize>>,
    taxonomies: BTreeMap<String, BTreeMap<String, Vec<usize>>>,
}

impl PostCollection {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a post and index it; returns its index.
    pub fn push(&mut self, post: Post) -> usize {
        let index = self.posts.len();
        self.by_type
            .entry(post.post_type.clone())
            .or_default()
            .push(index);
        for (plural, terms) in &post.terms {
            let index_for_type = self.taxonomies.entry(plural.clone()).or_default();
            for term in terms {
                index_for_type.entry(term.clone()).or_default().push(index);
            }
        }
        self.posts.push(post);
        index
    }

    /// Post at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Post> {
        self.posts.get(index)
    }

    /// Number of posts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.posts.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Posts in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Post> {
        self.posts.iter()
    }

    /// Mutable posts in registration order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Post> {
        self.posts.iter_mut()
    }

    /// Indices of the posts of one type, in registration order.
    #[must_use]
    pub fn of_type(&self, post_type: &str) -> &[usize] {
        self.by_type
            .get(post_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Indices of the posts tagged with `term` in the plural taxonomy.
    #[must_use]
    pub fn with_term(&self, plural: &str, term: &str) -> &[usize] {
        self.taxonomies
            .get(plural)
            .and_then(|terms| terms.get(term))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Terms known for a plural taxonomy, sorted.
    pub fn terms(&self, plural: &str) -> impl Iterator<Item = &str> {
        self.taxonomies
            .get(plural)
            .into_iter()
            .flat_map(|terms| terms.keys().map(String::as_str))
    }

    /// Indices sorted newest first by date; undated posts keep registration
    /// order after the dated ones.
    #[must_use]
    pub fn newest_first(&self, post_type: Option<&str>) -> Vec<usize> {
        let mut indices: Vec<usize> = match post_type {
            Some(post_type) => self.of_type(post_type).to_vec(),
            None => (0..self.posts.len()).collect(),
        };
        self.sort_newest_first(&mut indices);
        indices
    }

    fn sort_newest_first(&self, indices: &mut [usize]) {
        indices.sort_by_key(|&index| Reverse(self.posts[index].date));
    }

    /// Summaries for the given indices.
    #[must_use]
    pub fn summaries_of(&self, indices: &[usize]) -> Value {
        Value::Array(
            indices
                .iter()
                .filter_map(|&index| self.posts.get(index))
                .map(Post::summary)
                .collect(),
        )
    }

    /// Summaries of every post, newest first.
    #[must_use]
    pub fn summaries(&self) -> Value {
        self.summaries_of(&self.newest_first(None))
    }

    /// Taxonomy index as template data: plural type → term → summaries.
    #[must_use]
    pub fn taxonomies_value(&self) -> Value {
        let mut out = Map::new();
        for (plural, terms) in &self.taxonomies {
            let mut by_term = Map::new();
            for (term, indices) in terms {
                let mut sorted = indices.clone();
                self.sort_newest_first(&mut sorted);
                by_term.insert(term.clone(), self.summaries_of(&sorted));
            }
            out.insert(plural.clone(), Value::Object(by_term));
        }
        Value::Object(out)
    }
}
