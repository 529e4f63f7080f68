//! Built-in plugins.

mod markdown;

pub use markdown::MarkdownPlugin;
