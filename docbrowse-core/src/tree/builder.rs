//! `src/tree/builder.rs`
//! ============================================================================
//! # TreeBuilder: one level of the document hierarchy at a time
//!
//! The tree is never materialized. Asking for the children of a prefix scans
//! the flat entry list, keeps the entries below that prefix and groups them by
//! their next path segment. Expanding a node is the same call with the node's
//! path as the new prefix, so there is no subtree state to keep in sync.
//!
//! Entries are rooted paths (`/docs/a.md`); the root prefix is `""`.
//! Descendant checks respect segment boundaries: `/ab.md` is not below `/a`.

use std::time::Instant;

use indexmap::IndexMap;
use tracing::{debug, instrument};

use crate::index::path_index::{PathIndex, SEPARATOR};

/// Label shown for the empty root prefix.
pub const ROOT_LABEL: &str = "root";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildKind {
    /// No further descendants in the entry set; opens a document
    Leaf,

    /// Has descendants; can be expanded
    Node,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Child {
    pub kind: ChildKind,
    pub path: String,
}

impl Child {
    #[must_use]
    pub fn leaf(path: impl Into<String>) -> Self {
        Self {
            kind: ChildKind::Leaf,
            path: path.into(),
        }
    }

    #[must_use]
    pub fn node(path: impl Into<String>) -> Self {
        Self {
            kind: ChildKind::Node,
            path: path.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.kind == ChildKind::Leaf
    }
}

/// Display label for a prefix: `"root"` for the root, the full path otherwise.
#[must_use]
pub fn label(prefix: &str) -> &str {
    if prefix.is_empty() { ROOT_LABEL } else { prefix }
}

/// `path` lies strictly below `prefix`.
#[inline]
#[must_use]
pub fn is_descendant(path: &str, prefix: &str) -> bool {
    path.len() > prefix.len()
        && path.starts_with(prefix)
        && path[prefix.len()..].starts_with(SEPARATOR)
}

/// Entries strictly below `prefix`, in entry order.
pub fn descendants<'a, S>(entries: &'a [S], prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a
where
    S: AsRef<str>,
{
    entries
        .iter()
        .map(|entry| entry.as_ref())
        .filter(move |entry| is_descendant(entry, prefix))
}

/// Immediate children of `prefix`.
///
/// `entries` may be the whole index: anything not below `prefix` is ignored.
/// Children keep the order in which their first entry appears.
#[must_use]
pub fn children_of<S>(entries: &[S], prefix: &str) -> Vec<Child>
where
    S: AsRef<str>,
{
    let mut children: IndexMap<String, ChildKind> = IndexMap::new();

    for entry in descendants(entries, prefix) {
        // skip the separator that follows the prefix
        let rest = &entry[prefix.len() + SEPARATOR.len_utf8()..];
        let segment = rest.find(SEPARATOR).map_or(rest, |end| &rest[..end]);
        let candidate = format!("{prefix}{SEPARATOR}{segment}");

        // every proper descendant of `candidate` passes through here
        let kind = if entry.len() > candidate.len() {
            ChildKind::Node
        } else {
            ChildKind::Leaf
        };

        children
            .entry(candidate)
            .and_modify(|seen| {
                if kind == ChildKind::Node {
                    *seen = ChildKind::Node;
                }
            })
            .or_insert(kind);
    }

    children
        .into_iter()
        .map(|(path, kind)| Child { kind, path })
        .collect()
}

/// Every leaf reachable from the root, in depth-first display order.
#[must_use]
pub fn leaves<S>(entries: &[S]) -> Vec<String>
where
    S: AsRef<str>,
{
    let mut found: Vec<String> = Vec::new();
    let mut stack: Vec<Child> = children_of(entries, "");
    stack.reverse();

    // iterative walk - no recursion on deep trees
    while let Some(child) = stack.pop() {
        match child.kind {
            ChildKind::Leaf => found.push(child.path),
            ChildKind::Node => {
                stack.extend(children_of(entries, &child.path).into_iter().rev());
            }
        }
    }

    found
}

/// The tree over one (rooted) path index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeBuilder {
    entries: PathIndex,
}

impl TreeBuilder {
    /// Build over `index`, rooting paths that lack a leading separator.
    #[must_use]
    pub fn new(index: &PathIndex) -> Self {
        Self {
            entries: index.rooted(),
        }
    }

    #[instrument(level = "trace", skip(self))]
    pub fn children(&self, prefix: &str) -> Vec<Child> {
        let started = Instant::now();
        let children = children_of(self.entries.as_slice(), prefix);

        debug!(
            marker = "TREE_OPERATION",
            operation_type = "children_of",
            prefix = label(prefix),
            children = children.len(),
            elapsed_us = started.elapsed().as_micros(),
            "Computed tree level"
        );

        children
    }

    #[must_use]
    pub fn leaves(&self) -> Vec<String> {
        leaves(self.entries.as_slice())
    }
}
