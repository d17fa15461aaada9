//! Expansion state for a rendered tree
//!
//! The builder knows nothing about which nodes are open; this is the UI side.
//! Collapsing a node forgets the state of everything below it, the same way a
//! collapsed branch drops its children from the screen.

use ahash::AHashSet;

use super::builder::{Child, ChildKind, TreeBuilder, is_descendant, label};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub depth: usize,
    pub kind: ChildKind,
    pub path: String,
    pub expanded: bool,
}

impl TreeRow {
    #[must_use]
    pub fn label(&self) -> &str {
        label(&self.path)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TreeView {
    expanded: AHashSet<String>,
}

impl TreeView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_expanded(&self, path: &str) -> bool {
        self.expanded.contains(path)
    }

    pub fn expand(&mut self, path: &str) {
        self.expanded.insert(path.to_owned());
    }

    pub fn collapse(&mut self, path: &str) {
        self.expanded
            .retain(|open| open != path && !is_descendant(open, path));
    }

    /// Flip `path`; returns the new state.
    pub fn toggle(&mut self, path: &str) -> bool {
        if self.is_expanded(path) {
            self.collapse(path);
            false
        } else {
            self.expand(path);
            true
        }
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }

    /// Rows to draw, top to bottom: the root, then every child of an
    /// expanded node directly under it.
    #[must_use]
    pub fn visible_rows(&self, tree: &TreeBuilder) -> Vec<TreeRow> {
        let mut rows: Vec<TreeRow> = Vec::new();
        let mut stack: Vec<(usize, Child)> = vec![(0, Child::node(""))];

        while let Some((depth, child)) = stack.pop() {
            let expanded = child.kind == ChildKind::Node && self.is_expanded(&child.path);

            if expanded {
                stack.extend(
                    tree.children(&child.path)
                        .into_iter()
                        .rev()
                        .map(|grandchild| (depth + 1, grandchild)),
                );
            }

            rows.push(TreeRow {
                depth,
                kind: child.kind,
                path: child.path,
                expanded,
            });
        }

        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::path_index::PathIndex;

    fn tree() -> TreeBuilder {
        TreeBuilder::new(&PathIndex::from_manifest(
            "README.md\ndocs/api.md\ndocs/guide/intro.md\n",
        ))
    }

    fn labels(rows: &[TreeRow]) -> Vec<(usize, &str)> {
        rows.iter().map(|row| (row.depth, row.label())).collect()
    }

    #[test]
    fn collapsed_root_shows_only_root() {
        let rows = TreeView::new().visible_rows(&tree());

        assert_eq!(labels(&rows), [(0, "root")]);
        assert!(!rows[0].expanded);
    }

    #[test]
    fn expanding_reveals_one_level() {
        let mut view = TreeView::new();
        assert!(view.toggle(""));
        view.expand("/docs");

        let rows = view.visible_rows(&tree());

        assert_eq!(
            labels(&rows),
            [
                (0, "root"),
                (1, "/README.md"),
                (1, "/docs"),
                (2, "/docs/api.md"),
                (2, "/docs/guide"),
            ]
        );
        assert_eq!(rows[4].kind, ChildKind::Node);
        assert!(!rows[4].expanded);
    }

    #[test]
    fn collapse_forgets_descendants() {
        let mut view = TreeView::new();
        view.expand("");
        view.expand("/docs");
        view.expand("/docs/guide");

        assert!(!view.toggle("/docs"));
        assert!(!view.is_expanded("/docs/guide"));
        assert!(view.is_expanded(""));
    }

    #[test]
    fn leaves_never_expand() {
        let mut view = TreeView::new();
        view.expand("");
        view.expand("/README.md");

        let rows = view.visible_rows(&tree());

        assert_eq!(rows[1].path, "/README.md");
        assert!(!rows[1].expanded);
        assert_eq!(rows.len(), 3);
    }
}
