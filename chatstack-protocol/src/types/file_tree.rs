//! File tree nodes sent with FILE_TREE_DATA

use serde::{Deserialize, Serialize};

/// Kind of a file tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileNodeType {
    File,
    Directory,
}

/// A node in a repository file tree
///
/// `id` and `path` are both the repository-relative path. Only directories
/// carry `children`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: FileNodeType,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileNode>>,
}

impl FileNode {
    /// Create a file node for `path`
    pub fn file(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            id: path.clone(),
            name: base_name(&path),
            node_type: FileNodeType::File,
            path,
            children: None,
        }
    }

    /// Create a directory node for `path`
    pub fn directory(path: impl Into<String>, children: Vec<FileNode>) -> Self {
        let path = path.into();
        Self {
            id: path.clone(),
            name: base_name(&path),
            node_type: FileNodeType::Directory,
            path,
            children: Some(children),
        }
    }

    pub fn is_directory(&self) -> bool {
        self.node_type == FileNodeType::Directory
    }

    /// Child nodes (empty for files and childless directories)
    pub fn children(&self) -> &[FileNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    /// Paths of this node and all descendants, in pre-order
    pub fn subtree_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths(&self, out: &mut Vec<String>) {
        out.push(self.path.clone());
        for child in self.children() {
            child.collect_paths(out);
        }
    }

    /// Whether no file node in this subtree carries children
    pub fn is_well_formed(&self) -> bool {
        match self.node_type {
            FileNodeType::File => self.children.is_none(),
            FileNodeType::Directory => self.children().iter().all(FileNode::is_well_formed),
        }
    }

    /// Depth-first lookup of `path` within a forest
    pub fn find<'a>(nodes: &'a [FileNode], path: &str) -> Option<&'a FileNode> {
        for node in nodes {
            if node.path == path {
                return Some(node);
            }
            if let Some(found) = Self::find(node.children(), path) {
                return Some(found);
            }
        }
        None
    }

    /// Number of nodes in a forest
    pub fn count(nodes: &[FileNode]) -> usize {
        nodes.iter().map(|n| 1 + Self::count(n.children())).sum()
    }
}

fn base_name(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}
