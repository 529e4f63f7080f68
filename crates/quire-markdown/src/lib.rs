//! Quire Markdown Library
//!
//! Markdown rendering used by the built-in `markdown` plugin.

pub mod markdown;
pub mod syntax;

pub use markdown::MarkdownRenderer;
pub use syntax::SyntaxHighlighter;
