//! File tree sources

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use chatstack_protocol::{FileNode, Repository};

use super::{ServiceError, TreeSource};

/// Entries never listed in a tree
const SKIPPED: &[&str] = &[".git"];

const INVALID_REPOSITORY: &str = "Invalid repository or unable to access with provided token";

fn check_descriptor(repository: &Repository) -> Result<(), ServiceError> {
    repository.validate().map_err(|e| {
        tracing::debug!(repository = %repository.name, "Repository rejected: {}", e);
        ServiceError::Invalid(INVALID_REPOSITORY.to_string())
    })
}

/// Serves trees from local checkouts laid out as `<root>/<owner>/<repo>`
#[derive(Debug, Clone)]
pub struct LocalTreeSource {
    root: PathBuf,
}

impl LocalTreeSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn checkout_dir(&self, repository: &Repository) -> PathBuf {
        self.root.join(&repository.owner).join(&repository.repo)
    }
}

#[async_trait]
impl TreeSource for LocalTreeSource {
    async fn validate(&self, repository: &Repository) -> Result<(), ServiceError> {
        check_descriptor(repository)?;
        let dir = self.checkout_dir(repository);
        if !tokio::fs::metadata(&dir).await.map(|m| m.is_dir()).unwrap_or(false) {
            tracing::debug!(dir = %dir.display(), "No checkout for repository");
            return Err(ServiceError::Invalid(INVALID_REPOSITORY.to_string()));
        }
        Ok(())
    }

    async fn fetch_tree(&self, repository: &Repository) -> Result<Vec<FileNode>, ServiceError> {
        let dir = self.checkout_dir(repository);
        let tree = tokio::task::spawn_blocking(move || walk(&dir, &dir))
            .await
            .map_err(|e| ServiceError::Unavailable(format!("tree walk failed: {}", e)))??;
        tracing::debug!(
            repository = %repository.name,
            nodes = FileNode::count(&tree),
            "Tree read from checkout"
        );
        Ok(tree)
    }
}

/// Directories first, each group sorted by name
fn walk(root: &Path, dir: &Path) -> Result<Vec<FileNode>, ServiceError> {
    let mut dirs = Vec::new();
    let mut files = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if SKIPPED.contains(&name.as_str()) {
            continue;
        }

        let path = entry.path();
        let relative = path
            .strip_prefix(root)
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type()?.is_dir() {
            dirs.push(FileNode::directory(relative, walk(root, &path)?));
        } else {
            files.push(FileNode::file(relative));
        }
    }

    dirs.sort_by(|a, b| a.name.cmp(&b.name));
    files.sort_by(|a, b| a.name.cmp(&b.name));
    dirs.extend(files);
    Ok(dirs)
}

/// Same small tree for every repository
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderTreeSource;

#[async_trait]
impl TreeSource for PlaceholderTreeSource {
    async fn validate(&self, repository: &Repository) -> Result<(), ServiceError> {
        check_descriptor(repository)
    }

    async fn fetch_tree(&self, _repository: &Repository) -> Result<Vec<FileNode>, ServiceError> {
        Ok(vec![
            FileNode::directory(
                "src",
                vec![FileNode::file("src/lib.rs"), FileNode::file("src/main.rs")],
            ),
            FileNode::file("Cargo.toml"),
            FileNode::file("README.md"),
        ])
    }
}
