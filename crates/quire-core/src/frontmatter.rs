//! Front-matter parsing for source files.
//!
//! A source file may open with a metadata block wrapped in HTML comment
//! markers, which keeps layouts and pages valid HTML:
//!
//! ```text
//! <!--
//! { "title": "Hello", "layout": "default" }
//! -->
//! Body starts here.
//! ```
//!
//! The block is a JSON object. Files whose first line is not the opening
//! marker have no metadata and the whole file is body content.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{CoreError, Result};

/// Line that opens a metadata block.
pub const OPEN_MARKER: &str = "<!--";

/// Line that closes a metadata block.
pub const CLOSE_MARKER: &str = "-->";

/// Metadata mapping extracted from a front-matter block.
pub type Metadata = Map<String, Value>;

/// A parsed source file: metadata plus body.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    path: PathBuf,
    metadata: Metadata,
    body: String,
}

impl SourceFile {
    /// Read and parse a file from disk.
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        Self::parse(path, &text)
    }

    /// Parse already-loaded file text.
    pub fn parse(path: impl Into<PathBuf>, text: &str) -> Result<Self> {
        let path = path.into();
        let (metadata, body) = split_front_matter(text, &path)?;
        Ok(Self {
            path,
            metadata,
            body,
        })
    }

    /// Path the file was read from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw metadata from the header block.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Body content after the header block.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Split into owned parts.
    #[must_use]
    pub fn into_parts(self) -> (PathBuf, Metadata, String) {
        (self.path, self.metadata, self.body)
    }
}

/// Split file text into metadata and body.
pub fn split_front_matter(text: &str, path: &Path) -> Result<(Metadata, String)> {
    let mut lines = text.split_inclusive('\n');

    let Some(first) = lines.next() else {
        return Ok((Metadata::new(), String::new()));
    };
    if trim_eol(first) != OPEN_MARKER {
        return Ok((Metadata::new(), text.to_string()));
    }

    let mut block = String::new();
    let mut consumed = first.len();
    let mut closed = false;

    for line in lines {
        consumed += line.len();
        if trim_eol(line) == CLOSE_MARKER {
            closed = true;
            break;
        }
        block.push_str(line);
    }

    if !closed {
        return Err(CoreError::malformed(
            path,
            format!("metadata block opened with `{OPEN_MARKER}` is never closed"),
        ));
    }

    let metadata = parse_block(&block, path)?;
    Ok((metadata, text[consumed..].to_string()))
}

fn parse_block(block: &str, path: &Path) -> Result<Metadata> {
    if block.trim().is_empty() {
        return Ok(Metadata::new());
    }

    match serde_json::from_str::<Value>(block) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(CoreError::malformed(
            path,
            format!("metadata must be an object, found {}", type_name(&other)),
        )),
        Err(e) => Err(CoreError::malformed(path, e.to_string())),
    }
}

fn trim_eol(line: &str) -> &str {
    line.trim_end_matches('\n').trim_end_matches('\r')
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
