//! Path scanner
//!
//! Walks the source tree and turns every regular file into a [`FileItem`],
//! split into the plain and trigger groups by an optional base-name glob.

use crate::upload::{FileItem, Group};
use globset::{Glob, GlobMatcher};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Scan errors
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Source path does not exist: {0}")]
    NotFound(PathBuf),

    #[error("Source path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Invalid trigger pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// Scanned files, partitioned by group
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileGroups {
    pub plain: Vec<FileItem>,
    pub trigger: Vec<FileItem>,
}

impl FileGroups {
    pub fn len(&self) -> usize {
        self.plain.len() + self.trigger.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plain.is_empty() && self.trigger.is_empty()
    }

    pub fn get(&self, group: Group) -> &[FileItem] {
        match group {
            Group::Plain => &self.plain,
            Group::Trigger => &self.trigger,
        }
    }

    /// Groups in processing order
    pub fn into_ordered(self) -> Vec<(Group, Vec<FileItem>)> {
        vec![(Group::Plain, self.plain), (Group::Trigger, self.trigger)]
    }
}

/// Collect every file under `root`.
///
/// `source` is `root` joined with the file's relative path and `target` is
/// `prefix` joined with it using `/`. Files whose base name matches
/// `trigger` land in the trigger group. Entries are visited in file-name
/// order so the result is stable for an unchanged tree.
pub fn scan(
    root: &Path,
    bucket: &str,
    prefix: &str,
    trigger: Option<&str>,
) -> Result<FileGroups, ScanError> {
    if !root.exists() {
        return Err(ScanError::NotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    let matcher = trigger
        .filter(|pattern| !pattern.is_empty())
        .map(compile_trigger)
        .transpose()?;

    let mut groups = FileGroups::default();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        let file_type = entry.file_type();
        let is_file = file_type.is_file() || (file_type.is_symlink() && entry.path().is_file());
        if !is_file {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };

        let item = FileItem {
            source: root.join(relative),
            bucket: bucket.to_string(),
            target: object_key(prefix, relative),
        };

        let is_trigger = matcher
            .as_ref()
            .is_some_and(|m| m.is_match(entry.file_name()));

        if is_trigger {
            groups.trigger.push(item);
        } else {
            groups.plain.push(item);
        }
    }

    tracing::debug!(
        plain = groups.plain.len(),
        trigger = groups.trigger.len(),
        "Scanned {}",
        root.display()
    );

    Ok(groups)
}

/// Parse a trigger pattern with shell `fnmatch` semantics.
///
/// `*`, `?` and `[...]` behave as in globset, but `{` and `}` are literal
/// characters rather than alternation.
pub fn trigger_glob(pattern: &str) -> Result<Glob, globset::Error> {
    Glob::new(&literal_braces(pattern))
}

fn literal_braces(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    // Characters seen inside the current `[...]` class, if any
    let mut class: Option<usize> = None;

    for c in pattern.chars() {
        match class {
            Some(seen) => {
                out.push(c);
                class = match c {
                    '!' | '^' if seen == 0 => Some(0),
                    ']' if seen > 0 => None,
                    _ => Some(seen + 1),
                };
            }
            None => match c {
                '[' => {
                    out.push(c);
                    class = Some(0);
                }
                '{' => out.push_str("[{]"),
                '}' => out.push_str("[}]"),
                _ => out.push(c),
            },
        }
    }

    out
}

fn compile_trigger(pattern: &str) -> Result<GlobMatcher, ScanError> {
    trigger_glob(pattern)
        .map(|glob| glob.compile_matcher())
        .map_err(|source| ScanError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}

/// Join a key prefix and a relative path with exactly one `/` between them
pub fn object_key(prefix: &str, relative: &Path) -> String {
    let relative = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");

    if prefix.is_empty() {
        relative
    } else if prefix.ends_with('/') {
        format!("{}{}", prefix, relative)
    } else {
        format!("{}/{}", prefix, relative)
    }
}
