//! Syntax highlighting for fenced code blocks.

use syntect::{highlighting::ThemeSet, html::highlighted_html_for_string, parsing::SyntaxSet};

/// Default highlighting theme.
pub const DEFAULT_THEME: &str = "base16-ocean.dark";

/// Syntax highlighter using syntect.
#[derive(Debug)]
pub struct SyntaxHighlighter {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
    theme: String,
}

impl Default for SyntaxHighlighter {
    fn default() -> Self {
        Self::new(DEFAULT_THEME)
    }
}

impl SyntaxHighlighter {
    /// Create a highlighter; unknown theme names fall back to the default.
    pub fn new(theme: &str) -> Self {
        let theme_set = ThemeSet::load_defaults();
        let theme = if theme_set.themes.contains_key(theme) {
            theme.to_string()
        } else {
            tracing::warn!(theme, fallback = DEFAULT_THEME, "unknown syntax theme");
            DEFAULT_THEME.to_string()
        };

        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set,
            theme,
        }
    }

    /// Name of the active theme.
    #[must_use]
    pub fn theme(&self) -> &str {
        &self.theme
    }

    /// Highlight code with the given language token.
    ///
    /// Unrecognized languages come back as an escaped `<pre><code>` block.
    pub fn highlight(&self, code: &str, lang: Option<&str>) -> String {
        let syntax = lang.and_then(|l| self.syntax_set.find_syntax_by_token(l));
        let theme = self.theme_set.themes.get(&self.theme);

        match (syntax, theme) {
            (Some(syntax), Some(theme)) => {
                highlighted_html_for_string(code, &self.syntax_set, syntax, theme)
                    .unwrap_or_else(|_| plain_block(code, lang))
            }
            _ => plain_block(code, lang),
        }
    }
}

fn plain_block(code: &str, lang: Option<&str>) -> String {
    let lang_class = lang
        .map(|l| format!(" class=\"language-{}\"", html_escape(l)))
        .unwrap_or_default();
    format!("<pre><code{lang_class}>{}</code></pre>\n", html_escape(code))
}

/// Escape HTML special characters.
pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_rust() {
        let highlighter = SyntaxHighlighter::default();
        let code = "fn main() {\n    println!(\"Hello\");\n}\n";
        let html = highlighter.highlight(code, Some("rust"));

        assert!(html.contains("<pre"));
        assert!(html.contains("main"));
    }

    #[test]
    fn test_unknown_language_falls_back() {
        let highlighter = SyntaxHighlighter::default();
        let html = highlighter.highlight("a < b", Some("unknown_lang_xyz"));

        assert!(html.contains("language-unknown_lang_xyz"));
        assert!(html.contains("a &lt; b"));
    }

    #[test]
    fn test_no_language() {
        let highlighter = SyntaxHighlighter::default();
        let html = highlighter.highlight("plain text", None);

        assert_eq!(html, "<pre><code>plain text</code></pre>\n");
    }

    #[test]
    fn test_unknown_theme_uses_default() {
        let highlighter = SyntaxHighlighter::new("no-such-theme");
        assert_eq!(highlighter.theme(), DEFAULT_THEME);
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<script>"), "&lt;script&gt;");
        assert_eq!(html_escape("a & b"), "a &amp; b");
    }
}
