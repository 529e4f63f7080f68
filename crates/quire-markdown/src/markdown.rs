//! Markdown to HTML conversion using pulldown-cmark.

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, html};

use crate::syntax::SyntaxHighlighter;

/// Markdown renderer with syntax highlighting for fenced code.
#[derive(Debug)]
pub struct MarkdownRenderer {
    highlighter: SyntaxHighlighter,
    options: Options,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    /// Create a renderer with the default theme.
    pub fn new() -> Self {
        Self::with_highlighter(SyntaxHighlighter::default())
    }

    /// Create a renderer with a custom syntax theme.
    pub fn with_theme(theme: &str) -> Self {
        Self::with_highlighter(SyntaxHighlighter::new(theme))
    }

    fn with_highlighter(highlighter: SyntaxHighlighter) -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);

        Self {
            highlighter,
            options,
        }
    }

    /// Render markdown source to HTML.
    pub fn render(&self, source: &str) -> String {
        let mut code: Option<(Option<String>, String)> = None;
        let mut events = Vec::new();

        for event in Parser::new_ext(source, self.options) {
            match event {
                Event::Start(Tag::CodeBlock(kind)) => {
                    let lang = match kind {
                        CodeBlockKind::Fenced(info) => info
                            .split_whitespace()
                            .next()
                            .map(str::to_string),
                        CodeBlockKind::Indented => None,
                    };
                    code = Some((lang, String::new()));
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((lang, text)) = code.take() {
                        let highlighted = self.highlighter.highlight(&text, lang.as_deref());
                        events.push(Event::Html(CowStr::from(highlighted)));
                    }
                }
                Event::Text(text) if code.is_some() => {
                    if let Some((_, buffer)) = code.as_mut() {
                        buffer.push_str(&text);
                    }
                }
                other => events.push(other),
            }
        }

        let mut out = String::with_capacity(source.len() * 3 / 2);
        html::push_html(&mut out, events.into_iter());
        out
    }
}
