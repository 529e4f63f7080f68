//! Source tree discovery.

use std::{
    fs,
    io::{BufRead, BufReader, Read},
    path::{Path, PathBuf},
};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use quire_core::frontmatter::OPEN_MARKER;
use thiserror::Error;
use walkdir::WalkDir;

/// Scan errors.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid exclude pattern: {0}")]
    Pattern(#[from] globset::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for scanning.
pub type Result<T> = std::result::Result<T, ScanError>;

/// Compiled glob patterns matched against paths relative to the site root.
///
/// `*` and `?` stay within one path segment, `**` crosses segments. Patterns
/// are anchored at the root, so `.*` only matches top-level dotfiles and
/// `**/.*` matches them anywhere.
#[derive(Debug, Clone)]
pub struct ExcludeSet {
    globs: GlobSet,
}

impl Default for ExcludeSet {
    fn default() -> Self {
        Self {
            globs: GlobSet::empty(),
        }
    }
}

impl ExcludeSet {
    /// Compile a list of glob patterns.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim_start_matches("./");
            builder.add(GlobBuilder::new(pattern).literal_separator(true).build()?);
        }
        Ok(Self {
            globs: builder.build()?,
        })
    }

    /// Whether a relative path matches any pattern.
    #[must_use]
    pub fn is_excluded(&self, relative: &Path) -> bool {
        self.globs.is_match(relative)
    }
}

/// Recursively list files under `root`, sorted by path.
///
/// Excluded directories are not descended into; paths under `skip` (the
/// destination, typically) are left out entirely.
pub fn walk_files(root: &Path, excludes: &ExcludeSet, skip: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let path = entry.path();
            if skip.iter().any(|skipped| path.starts_with(skipped)) {
                return false;
            }
            path.strip_prefix(root)
                .map_or(true, |relative| !excludes.is_excluded(relative))
        });

    for entry in walker {
        let entry = entry.map_err(|err| {
            let path = err.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            ScanError::Io {
                path,
                source: err.into(),
            }
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// List the files directly inside `dir`, sorted. A missing directory is
/// empty.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(ScanError::Io {
                path: dir.to_path_buf(),
                source,
            });
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ScanError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Whether a file opens with a front-matter block.
///
/// Only the first line is read, so binary assets are cheap to classify.
pub fn has_front_matter(path: &Path) -> Result<bool> {
    let io_err = |source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = fs::File::open(path).map_err(io_err)?;

    // The marker plus a line ending is the longest line worth reading.
    let limit = (OPEN_MARKER.len() + 2) as u64;
    let mut line = Vec::new();
    BufReader::new(file)
        .take(limit)
        .read_until(b'\n', &mut line)
        .map_err(io_err)?;

    let line = line.strip_suffix(b"\n").unwrap_or(&line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    Ok(line == OPEN_MARKER.as_bytes())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn excludes(globs: &[&str]) -> ExcludeSet {
        ExcludeSet::new(globs).expect("valid globs")
    }

    #[test]
    fn test_glob_matching() {
        let set = excludes(&["_*", ".*", "**/.*"]);

        assert!(set.is_excluded(Path::new("_posts")));
        assert!(set.is_excluded(Path::new("_layouts")));
        assert!(set.is_excluded(Path::new(".git")));
        assert!(set.is_excluded(Path::new("assets/.DS_Store")));
        assert!(!set.is_excluded(Path::new("index.html")));
        assert!(!set.is_excluded(Path::new("blog/_draft.html")));
    }

    #[test]
    fn test_double_star_and_question_mark() {
        let set = excludes(&["drafts/**", "*.tm?"]);

        assert!(set.is_excluded(Path::new("drafts/a/b.md")));
        assert!(set.is_excluded(Path::new("notes.tmp")));
        assert!(!set.is_excluded(Path::new("dir/notes.tmp")));
        assert!(!set.is_excluded(Path::new("notes.txt")));
    }

    #[test]
    fn test_special_characters_are_literal() {
        let set = excludes(&["a+b.txt", "./build"]);
        assert!(set.is_excluded(Path::new("a+b.txt")));
        assert!(!set.is_excluded(Path::new("aab.txt")));
        assert!(set.is_excluded(Path::new("build")));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            ExcludeSet::new(&["[unclosed"]),
            Err(ScanError::Pattern(_))
        ));
    }

    #[test]
    fn test_walk_skips_excluded_and_destination() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for rel in [
            "index.html",
            "css/site.css",
            "_posts/a.md",
            ".hidden",
            "_site/old.html",
            "img/.keep",
        ] {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "x").unwrap();
        }

        let files = walk_files(
            root,
            &excludes(&[".*", "**/.*"]),
            &[root.join("_site")],
        )
        .expect("walk");
        let relative: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            relative,
            [
                PathBuf::from("_posts/a.md"),
                PathBuf::from("css/site.css"),
                PathBuf::from("index.html"),
            ]
        );
    }

    #[test]
    fn test_list_files_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(list_files(&dir.path().join("nope")).unwrap().is_empty());
    }

    #[test]
    fn test_list_files_is_shallow_and_sorted() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.md"), "").unwrap();
        fs::write(dir.path().join("a.md"), "").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/c.md"), "").unwrap();

        let files = list_files(dir.path()).unwrap();
        assert_eq!(files, [dir.path().join("a.md"), dir.path().join("b.md")]);
    }

    #[test]
    fn test_has_front_matter() {
        let dir = TempDir::new().unwrap();
        let with = dir.path().join("with.html");
        let crlf = dir.path().join("crlf.html");
        let without = dir.path().join("without.html");
        let binary = dir.path().join("image.png");
        fs::write(&with, "<!--\n{}\n-->\nbody").unwrap();
        fs::write(&crlf, "<!--\r\n{}\r\n-->\r\nbody").unwrap();
        fs::write(&without, "<!-- just a comment -->\nbody").unwrap();
        fs::write(&binary, [0x89, b'P', b'N', b'G', 0, 0xff]).unwrap();

        assert!(has_front_matter(&with).unwrap());
        assert!(has_front_matter(&crlf).unwrap());
        assert!(!has_front_matter(&without).unwrap());
        assert!(!has_front_matter(&binary).unwrap());
    }
}
