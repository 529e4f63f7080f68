//! Converts Markdown pages and posts to HTML after their content is compiled.

use std::sync::Arc;

use quire_core::{Config, ContentFormat};
use quire_markdown::MarkdownRenderer;

use crate::{
    hooks::{Hooks, PageHook, PostHook},
    plugin::{Plugin, PluginError},
};

const MARKDOWN_SUFFIXES: [&str; 2] = [".md", ".markdown"];

/// The built-in `markdown` plugin.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownPlugin;

impl Plugin for MarkdownPlugin {
    fn name(&self) -> &str {
        "markdown"
    }

    fn register(&self, hooks: &mut Hooks, config: &Config) -> Result<(), PluginError> {
        let renderer = Arc::new(MarkdownRenderer::with_theme(&config.markdown.syntax_theme));

        let pages = Arc::clone(&renderer);
        hooks.on_page(PageHook::AfterRenderContent, move |page| {
            if !ContentFormat::from_extension(page.extension()).is_markdown() {
                return Ok(());
            }
            let html = pages.render(page.content());
            page.set_content(html);
            if let Some(permalink) = html_permalink(page.permalink()) {
                page.set_permalink(permalink);
            }
            Ok(())
        });

        hooks.on_post(PostHook::AfterRenderPost, move |post| {
            if !ContentFormat::from_path(post.relative_path()).is_markdown() {
                return Ok(());
            }
            let html = renderer.render(post.content().unwrap_or_default());
            post.set_content(html);
            Ok(())
        });

        Ok(())
    }
}

/// Swap a Markdown extension at the end of a permalink for `.html`.
fn html_permalink(permalink: &str) -> Option<String> {
    MARKDOWN_SUFFIXES.iter().find_map(|suffix| {
        permalink
            .strip_suffix(suffix)
            .map(|stem| format!("{stem}.html"))
    })
}
