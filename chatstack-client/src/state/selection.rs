//! Selected file/directory paths used as agent context

use std::collections::BTreeSet;

use chatstack_protocol::FileNode;

/// Set of selected paths
///
/// Toggling a directory applies to its whole subtree at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    paths: BTreeSet<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    /// Toggle `path` and every path beneath it in `tree`
    ///
    /// If `path` is currently selected the whole subtree is deselected,
    /// otherwise the whole subtree is selected. Returns false when `path`
    /// is not in the tree, in which case nothing changes.
    pub fn toggle(&mut self, tree: &[FileNode], path: &str) -> bool {
        let Some(node) = FileNode::find(tree, path) else {
            return false;
        };

        let subtree = node.subtree_paths();
        if self.paths.contains(path) {
            for p in &subtree {
                self.paths.remove(p);
            }
        } else {
            self.paths.extend(subtree);
        }
        true
    }

    /// Selected paths that name files (what the agent actually reads)
    pub fn files<'a>(&'a self, tree: &'a [FileNode]) -> impl Iterator<Item = &'a str> + 'a {
        self.iter().filter(move |p| {
            FileNode::find(tree, p).map_or(false, |node| !node.is_directory())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `root{dir A{file A/x, file A/y}, file B}`
    fn tree() -> Vec<FileNode> {
        vec![
            FileNode::directory("A", vec![FileNode::file("A/x"), FileNode::file("A/y")]),
            FileNode::file("B"),
        ]
    }

    fn deep_tree() -> Vec<FileNode> {
        vec![FileNode::directory(
            "src",
            vec![
                FileNode::directory(
                    "src/net",
                    vec![
                        FileNode::file("src/net/ws.rs"),
                        FileNode::directory("src/net/empty", vec![]),
                    ],
                ),
                FileNode::file("src/lib.rs"),
            ],
        )]
    }

    fn paths(selection: &Selection) -> Vec<&str> {
        selection.iter().collect()
    }

    #[test]
    fn test_directory_selection_example() {
        let tree = tree();
        let mut selection = Selection::new();

        assert!(selection.toggle(&tree, "A"));
        assert_eq!(paths(&selection), vec!["A", "A/x", "A/y"]);

        assert!(selection.toggle(&tree, "B"));
        assert_eq!(paths(&selection), vec!["A", "A/x", "A/y", "B"]);

        assert!(selection.toggle(&tree, "A"));
        assert_eq!(paths(&selection), vec!["B"]);
    }

    #[test]
    fn test_toggle_twice_is_identity_for_every_node() {
        let tree = deep_tree();
        let all: Vec<String> = tree.iter().flat_map(FileNode::subtree_paths).collect();

        for start in [Selection::new(), {
            let mut s = Selection::new();
            s.toggle(&tree, "src/lib.rs");
            s
        }] {
            for path in &all {
                // Skip starts where the subtree is partially selected
                let node = FileNode::find(&tree, path).unwrap();
                let sub = node.subtree_paths();
                let selected = sub.iter().filter(|p| start.contains(p)).count();
                if selected != 0 && selected != sub.len() {
                    continue;
                }

                let mut s = start.clone();
                s.toggle(&tree, path);
                s.toggle(&tree, path);
                assert_eq!(s, start, "toggling {path} twice changed the selection");
            }
        }
    }

    #[test]
    fn test_select_covers_all_descendants() {
        let tree = deep_tree();
        for node_path in ["src", "src/net", "src/net/empty"] {
            let mut s = Selection::new();
            s.toggle(&tree, node_path);
            let node = FileNode::find(&tree, node_path).unwrap();
            for p in node.subtree_paths() {
                assert!(s.contains(&p), "{p} missing after selecting {node_path}");
            }
            assert_eq!(s.len(), node.subtree_paths().len());

            s.toggle(&tree, node_path);
            assert!(s.is_empty());
        }
    }

    #[test]
    fn test_select_suppresses_duplicates() {
        let tree = tree();
        let mut s = Selection::new();
        s.toggle(&tree, "A/x");
        s.toggle(&tree, "A");
        assert_eq!(paths(&s), vec!["A", "A/x", "A/y"]);
    }

    #[test]
    fn test_deselect_directory_removes_partially_selected_children() {
        let tree = tree();
        let mut s = Selection::new();
        s.toggle(&tree, "A");
        s.toggle(&tree, "A/y");
        assert_eq!(paths(&s), vec!["A", "A/x"]);

        s.toggle(&tree, "A");
        assert!(s.is_empty());
    }

    #[test]
    fn test_toggle_unknown_path_is_noop() {
        let tree = tree();
        let mut s = Selection::new();
        s.toggle(&tree, "B");
        assert!(!s.toggle(&tree, "C"));
        assert_eq!(paths(&s), vec!["B"]);
    }

    #[test]
    fn test_files_filters_directories() {
        let tree = tree();
        let mut s = Selection::new();
        s.toggle(&tree, "A");
        assert_eq!(s.files(&tree).collect::<Vec<_>>(), vec!["A/x", "A/y"]);
    }
}
