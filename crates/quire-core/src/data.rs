//! Helpers for metadata values and names.

use serde_json::{Map, Value};

/// Deep-merge `overlay` into a copy of `base`.
///
/// Nested objects merge key by key; any other overlay value replaces the base
/// value outright, arrays included.
#[must_use]
pub fn deep_merge(base: &Map<String, Value>, overlay: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = base.clone();
    merge_into(&mut merged, overlay);
    merged
}

/// Deep-merge `overlay` into `target` in place.
pub fn merge_into(target: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_into(existing, incoming);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Render a scalar metadata value as plain text.
#[must_use]
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Convert text to a URL-safe slug.
#[must_use]
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else if c.is_whitespace() || c == '-' || c == '_' {
                '-'
            } else {
                '\0'
            }
        })
        .filter(|c| *c != '\0')
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// English plural of a content or taxonomy type name.
///
/// Covers the regular rules; type names are expected to be simple nouns.
#[must_use]
pub fn pluralize(word: &str) -> String {
    let lower = word.to_lowercase();
    if lower.ends_with('s')
        || lower.ends_with('x')
        || lower.ends_with('z')
        || lower.ends_with("ch")
        || lower.ends_with("sh")
    {
        return format!("{word}es");
    }
    if let Some(stem) = word.strip_suffix('y') {
        let before_y = stem.chars().last();
        if before_y.is_some_and(|c| !"aeiou".contains(c.to_ascii_lowercase())) {
            return format!("{stem}ies");
        }
    }
    format!("{word}s")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_overlay_wins_on_conflict() {
        let base = obj(json!({"title": "Layout", "lang": "en"}));
        let overlay = obj(json!({"title": "Post"}));

        let merged = deep_merge(&base, &overlay);
        assert_eq!(merged["title"], json!("Post"));
        assert_eq!(merged["lang"], json!("en"));
    }

    #[test]
    fn test_nested_objects_merge() {
        let base = obj(json!({"author": {"name": "Ann", "email": "ann@example.com"}}));
        let overlay = obj(json!({"author": {"name": "Bob"}}));

        let merged = deep_merge(&base, &overlay);
        assert_eq!(
            merged["author"],
            json!({"name": "Bob", "email": "ann@example.com"})
        );
    }

    #[test]
    fn test_arrays_replace() {
        let base = obj(json!({"tags": ["a", "b"]}));
        let overlay = obj(json!({"tags": ["c"]}));

        assert_eq!(deep_merge(&base, &overlay)["tags"], json!(["c"]));
    }

    #[test]
    fn test_base_untouched() {
        let base = obj(json!({"title": "Layout"}));
        let overlay = obj(json!({"title": "Post"}));

        let _ = deep_merge(&base, &overlay);
        assert_eq!(base["title"], json!("Layout"));
    }

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&json!("Hi")), "Hi");
        assert_eq!(value_to_string(&json!(3)), "3");
        assert_eq!(value_to_string(&json!(true)), "true");
        assert_eq!(value_to_string(&Value::Null), "");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Test 123 Post"), "test-123-post");
        assert_eq!(slugify("Multiple   Spaces"), "multiple-spaces");
        assert_eq!(slugify("Special!@#Chars"), "specialchars");
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("post"), "posts");
        assert_eq!(pluralize("tag"), "tags");
        assert_eq!(pluralize("category"), "categories");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(pluralize("class"), "classes");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("sketch"), "sketches");
    }
}
