//! `src/index/path_index.rs`
//! ============================================================================
//! # PathIndex: flat, ordered list of every known document path
//!
//! Built once from the manifest text. Blank lines are dropped and duplicate
//! paths keep their first position, so the order callers see is the manifest
//! order. Cloning is cheap (`Arc<[String]>`), which lets the store hand the
//! same index to search and tree code without copying.

use std::sync::Arc;

use ahash::AHashSet;
use tracing::{debug, warn};

/// Separator between path segments.
pub const SEPARATOR: char = '/';

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathIndex {
    paths: Arc<[String]>,
}

impl PathIndex {
    /// Parse a newline-separated manifest.
    ///
    /// An empty result is an empty corpus, not an error.
    #[must_use]
    pub fn from_manifest(text: &str) -> Self {
        let index = Self::from_paths(text.lines());

        if index.is_empty() {
            warn!(
                marker = "INDEX_OPERATION",
                operation_type = "manifest_empty",
                manifest_bytes = text.len(),
                "Manifest produced no usable paths, treating corpus as empty"
            );
        } else {
            debug!(
                marker = "INDEX_OPERATION",
                operation_type = "manifest_parsed",
                path_count = index.len(),
                "Parsed manifest"
            );
        }

        index
    }

    /// Build from arbitrary path strings, dropping blanks and duplicates.
    #[must_use]
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen: AHashSet<String> = AHashSet::new();
        let paths: Vec<String> = paths
            .into_iter()
            .filter_map(|raw| {
                // a lone trailing '\r' survives `lines()`
                let path = raw.as_ref().trim_end_matches('\r');
                (!path.is_empty() && seen.insert(path.to_owned())).then(|| path.to_owned())
            })
            .collect();

        Self {
            paths: paths.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.paths
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    /// The same paths anchored at the root (`docs/a.md` -> `/docs/a.md`),
    /// which is the shape the tree works on.
    #[must_use]
    pub fn rooted(&self) -> Self {
        Self::from_paths(self.iter().map(|p| {
            if p.starts_with(SEPARATOR) {
                p.to_owned()
            } else {
                format!("{SEPARATOR}{p}")
            }
        }))
    }
}

impl<'a> IntoIterator for &'a PathIndex {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}
