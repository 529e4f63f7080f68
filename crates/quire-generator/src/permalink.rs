//! Permalink patterns.

use std::path::Path;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use quire_core::{
    Metadata,
    data::{slugify, value_to_string},
};
use serde_json::Value;

/// File name appended to permalinks that end in a directory.
pub const INDEX_FILE: &str = "index.html";

/// Values available to `:type`, `:filename` and `:slug`.
#[derive(Debug, Clone, Copy)]
pub struct PermalinkContext<'a> {
    /// Content type, empty for loose pages.
    pub post_type: &'a str,
    /// Source file path.
    pub path: &'a Path,
}

/// Substitute `:name` tokens in `pattern`.
///
/// `:type`, `:filename`, `:slug`, `:year`, `:month` and `:day` are computed;
/// any other token takes the metadata value of that name. Unknown tokens
/// become empty. Doubled slashes collapse and a trailing slash gets
/// [`INDEX_FILE`].
#[must_use]
pub fn compute_permalink(pattern: &str, metadata: &Metadata, ctx: &PermalinkContext<'_>) -> String {
    let date = metadata.get("date").and_then(parse_date);
    let mut out = String::with_capacity(pattern.len() + 16);
    let mut rest = pattern;

    while let Some(pos) = rest.find(':') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());

        if len == 0 {
            out.push(':');
        } else {
            out.push_str(&token_value(&after[..len], metadata, ctx, date));
        }
        rest = &after[len..];
    }
    out.push_str(rest);

    normalize(&out)
}

fn token_value(
    token: &str,
    metadata: &Metadata,
    ctx: &PermalinkContext<'_>,
    date: Option<NaiveDateTime>,
) -> String {
    match token {
        "type" => ctx.post_type.to_string(),
        "filename" => file_stem(ctx.path),
        "slug" => metadata
            .get("slug")
            .and_then(Value::as_str)
            .map(slugify)
            .or_else(|| metadata.get("title").and_then(Value::as_str).map(slugify))
            .filter(|slug| !slug.is_empty())
            .unwrap_or_else(|| slugify(&file_stem(ctx.path))),
        "year" => date.map(|d| format!("{:04}", d.year())).unwrap_or_default(),
        "month" => date.map(|d| format!("{:02}", d.month())).unwrap_or_default(),
        "day" => date.map(|d| format!("{:02}", d.day())).unwrap_or_default(),
        other => metadata.get(other).map(value_to_string).unwrap_or_default(),
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Collapse doubled slashes and append [`INDEX_FILE`] to a trailing slash.
#[must_use]
pub fn normalize(permalink: &str) -> String {
    let mut out = String::with_capacity(permalink.len() + INDEX_FILE.len());
    for c in permalink.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    if out.is_empty() || out.ends_with('/') {
        out.push_str(INDEX_FILE);
    }
    out
}

/// Site-absolute URL path for a permalink.
#[must_use]
pub fn url_path(permalink: &str) -> String {
    if permalink.starts_with('/') {
        permalink.to_string()
    } else {
        format!("/{permalink}")
    }
}

/// Parse a `date` metadata value (RFC 3339, `YYYY-MM-DD HH:MM:SS` or
/// `YYYY-MM-DD`).
#[must_use]
pub fn parse_date(value: &Value) -> Option<NaiveDateTime> {
    let text = value.as_str()?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn meta(value: Value) -> Metadata {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn ctx(path: &Path) -> PermalinkContext<'_> {
        PermalinkContext {
            post_type: "post",
            path,
        }
    }

    #[test]
    fn test_default_pattern() {
        let path = Path::new("_posts/hello-world.md");
        let metadata = meta(json!({"title": "Hello, World!"}));
        let permalink = compute_permalink("/:type/:slug/", &metadata, &ctx(path));
        assert_eq!(permalink, "/post/hello-world/index.html");
    }

    #[test]
    fn test_metadata_token_verbatim() {
        let path = Path::new("_posts/hello.md");
        let metadata = meta(json!({"title": "Hi"}));
        assert_eq!(
            compute_permalink("/:title/", &metadata, &ctx(path)),
            "/Hi/index.html"
        );
    }

    #[test]
    fn test_date_tokens() {
        let path = Path::new("_posts/a.md");
        let metadata = meta(json!({"date": "2024-03-07"}));
        assert_eq!(
            compute_permalink("/:year/:month/:day/:filename.html", &metadata, &ctx(path)),
            "/2024/03/07/a.html"
        );

        let metadata = meta(json!({"date": "2023-12-31T22:10:00+01:00"}));
        assert_eq!(
            compute_permalink("/:year/:month/", &metadata, &ctx(path)),
            "/2023/12/index.html"
        );
    }

    #[test]
    fn test_unknown_tokens_are_empty() {
        let path = Path::new("_posts/a.md");
        let metadata = Metadata::new();
        assert_eq!(
            compute_permalink("/:missing/:year/:filename/", &metadata, &ctx(path)),
            "/a/index.html"
        );
    }

    #[test]
    fn test_slug_falls_back_to_stem() {
        let path = Path::new("_posts/My Post.md");
        assert_eq!(
            compute_permalink(":slug.html", &Metadata::new(), &ctx(path)),
            "my-post.html"
        );
    }

    #[test]
    fn test_lone_colon_is_kept() {
        let path = Path::new("a.md");
        assert_eq!(
            compute_permalink("/a:/b", &Metadata::new(), &ctx(path)),
            "/a:/b"
        );
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("//a//b/"), "/a/b/index.html");
        assert_eq!(normalize(""), "index.html");
        assert_eq!(normalize("feed.xml"), "feed.xml");
    }

    #[test]
    fn test_url_path() {
        assert_eq!(url_path("about.html"), "/about.html");
        assert_eq!(url_path("/post/a/index.html"), "/post/a/index.html");
    }

    #[test]
    fn test_parse_date_formats() {
        assert!(parse_date(&json!("2024-01-02")).is_some());
        assert!(parse_date(&json!("2024-01-02 10:00:00")).is_some());
        assert!(parse_date(&json!("yesterday")).is_none());
        assert!(parse_date(&json!(20240102)).is_none());
    }
}
