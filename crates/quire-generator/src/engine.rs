//! Template engine.
//!
//! Templates use Handlebars syntax and are rendered with the [`handlebars`]
//! crate. The engine owns the registered partials; page bodies and layouts
//! are rendered straight from their source text. Missing values render as
//! the empty string.

use handlebars::{Handlebars, RenderError, RenderErrorReason};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Template rendering errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Invalid template syntax.
    #[error("invalid template syntax: {0}")]
    Syntax(String),

    /// Partial not registered.
    #[error("partial not found: {0}")]
    PartialNotFound(String),

    /// Any other rendering failure.
    #[error(transparent)]
    Render(Box<RenderError>),
}

impl From<RenderError> for TemplateError {
    fn from(err: RenderError) -> Self {
        match err.reason() {
            RenderErrorReason::TemplateError(syntax) => Self::Syntax(syntax.to_string()),
            RenderErrorReason::PartialNotFound(name) => Self::PartialNotFound(name.clone()),
            _ => Self::Render(Box::new(err)),
        }
    }
}

impl From<handlebars::TemplateError> for TemplateError {
    fn from(err: handlebars::TemplateError) -> Self {
        Self::Syntax(err.to_string())
    }
}

/// Result type for template operations.
pub type Result<T> = std::result::Result<T, TemplateError>;

/// Template engine holding registered partials.
#[derive(Debug, Clone)]
pub struct TemplateEngine {
    registry: Handlebars<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    /// Create an engine with no partials.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        // Partials are inserted as-is, not re-indented to their call site.
        registry.set_prevent_indent(true);
        Self { registry }
    }

    /// Register (or replace) a partial.
    pub fn register_partial(&mut self, name: &str, source: &str) -> Result<()> {
        self.registry.register_partial(name, source)?;
        Ok(())
    }

    /// Number of registered partials.
    #[must_use]
    pub fn partial_count(&self) -> usize {
        self.registry.get_templates().len()
    }

    /// Compile and render template source against `data`.
    pub fn render(&self, source: &str, data: &Value) -> Result<String> {
        self.render_with(source, data)
    }

    /// Compile and render template source against a metadata map.
    pub fn render_map(&self, source: &str, data: &Map<String, Value>) -> Result<String> {
        self.render_with(source, data)
    }

    fn render_with<T: Serialize>(&self, source: &str, data: &T) -> Result<String> {
        Ok(self.registry.render_template(source, data)?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn render(source: &str, data: Value) -> String {
        TemplateEngine::new().render(source, &data).expect("render")
    }

    #[test]
    fn test_interpolation() {
        assert_eq!(
            render("<h1>{{ title }}</h1>", json!({"title": "Hi"})),
            "<h1>Hi</h1>"
        );
    }

    #[test]
    fn test_escaping_and_raw() {
        let data = json!({"content": "<p>a & b</p>"});
        assert_eq!(
            render("{{ content }}", data.clone()),
            "&lt;p&gt;a &amp; b&lt;/p&gt;"
        );
        assert_eq!(render("{{{ content }}}", data), "<p>a & b</p>");
    }

    #[test]
    fn test_missing_value_is_empty() {
        assert_eq!(render("[{{ nope }}]", json!({})), "[]");
        assert_eq!(render("[{{ a.b.c }}]", json!({"a": 1})), "[]");
    }

    #[test]
    fn test_dotted_paths_and_numbers() {
        let data = json!({"author": {"name": "Ann"}, "items": ["x", "y"], "n": 3});
        assert_eq!(render("{{author.name}}", data.clone()), "Ann");
        assert_eq!(render("{{items.[1]}}", data.clone()), "y");
        assert_eq!(render("{{n}}", data), "3");
    }

    #[test]
    fn test_if_else() {
        let tpl = "{{#if draft}}draft{{else}}live{{/if}}";
        assert_eq!(render(tpl, json!({"draft": true})), "draft");
        assert_eq!(render(tpl, json!({"draft": false})), "live");
        assert_eq!(render(tpl, json!({})), "live");
        assert_eq!(render(tpl, json!({"draft": []})), "live");
    }

    #[test]
    fn test_each_with_locals_and_parent() {
        let tpl = "{{#each posts}}{{@index}}:{{title}}{{#unless @last}},{{/unless}}{{/each}}";
        let data = json!({"posts": [{"title": "a"}, {"title": "b"}, {"title": "c"}]});
        assert_eq!(render(tpl, data), "0:a,1:b,2:c");

        let tpl = "{{#each tags}}{{../prefix}}{{this}} {{/each}}";
        let data = json!({"prefix": "#", "tags": ["rust", "web"]});
        assert_eq!(render(tpl, data), "#rust #web ");
    }

    #[test]
    fn test_each_object_keys() {
        let tpl = "{{#each counts}}{{@key}}={{this}};{{/each}}";
        let data = json!({"counts": {"rust": 2, "web": 1}});
        assert_eq!(render(tpl, data), "rust=2;web=1;");
    }

    #[test]
    fn test_with_and_root() {
        let tpl = "{{#with author}}{{name}} of {{@root.site}}{{/with}}";
        let data = json!({"site": "Blog", "author": {"name": "Ann"}});
        assert_eq!(render(tpl, data), "Ann of Blog");
    }

    #[test]
    fn test_partials() {
        let mut engine = TemplateEngine::new();
        engine
            .register_partial("header", "<header>{{ site }}</header>")
            .expect("register");

        let html = engine
            .render("{{> header }}<main/>", &json!({"site": "Blog"}))
            .expect("render");
        assert_eq!(html, "<header>Blog</header><main/>");
        assert_eq!(engine.partial_count(), 1);
    }

    #[test]
    fn test_missing_partial() {
        let err = TemplateEngine::new()
            .render("{{> footer }}", &json!({}))
            .unwrap_err();
        assert!(matches!(err, TemplateError::PartialNotFound(name) if name == "footer"));
    }

    #[test]
    fn test_syntax_errors() {
        let engine = TemplateEngine::new();
        for source in ["{{ title", "{{#if x}}open", "{{#if x}}{{/each}}"] {
            let result = engine.render(source, &json!({}));
            assert!(
                matches!(result, Err(TemplateError::Syntax(_))),
                "expected syntax error for {source:?}"
            );
        }

        let mut engine = TemplateEngine::new();
        assert!(matches!(
            engine.register_partial("broken", "{{#each x}}"),
            Err(TemplateError::Syntax(_))
        ));
    }
}
