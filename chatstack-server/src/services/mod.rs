//! Collaborators the relay dispatches to
//!
//! The relay itself only sequences messages. Persistence, file trees and the
//! chat agent sit behind the traits in this module so deployments can swap
//! them without touching the dispatch code.

mod agent;
mod memory;
mod tree;

pub use agent::{EchoAgent, DEFAULT_AGENT_NAME};
pub use memory::MemoryRepositoryStore;
pub use tree::{LocalTreeSource, PlaceholderTreeSource};

use std::sync::Arc;

use async_trait::async_trait;

use chatstack_protocol::{FileNode, Repository};

use crate::registry::ClientId;

/// Failure reported by a collaborator
///
/// The display text is sent to the client as the `message` of the matching
/// error frame.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-client repository registry
#[async_trait]
pub trait RepositoryStore: Send + Sync {
    /// Repositories of `client` in registration order
    async fn list(&self, client: ClientId) -> Vec<Repository>;

    async fn get(&self, client: ClientId, id: &str) -> Option<Repository>;

    /// Insert `repository`, replacing an existing entry with the same name
    ///
    /// The stored copy carries a server-assigned id and is returned.
    async fn upsert(&self, client: ClientId, repository: Repository)
        -> Result<Repository, ServiceError>;

    /// Replace the repository stored under `id`
    async fn update(
        &self,
        client: ClientId,
        id: &str,
        repository: Repository,
    ) -> Result<Repository, ServiceError>;

    async fn delete(&self, client: ClientId, id: &str) -> Result<(), ServiceError>;

    /// Drop everything stored for `client`
    async fn forget(&self, client: ClientId);
}

/// Source of repository file trees
#[async_trait]
pub trait TreeSource: Send + Sync {
    /// Check that the repository can be read with the credentials it carries
    async fn validate(&self, repository: &Repository) -> Result<(), ServiceError>;

    async fn fetch_tree(&self, repository: &Repository) -> Result<Vec<FileNode>, ServiceError>;
}

/// What the agent knows about the conversation
#[derive(Debug, Clone, Default)]
pub struct AgentContext {
    pub gemini_token: Option<String>,
    pub repository: Option<Repository>,
}

/// Produces replies to chat messages
#[async_trait]
pub trait ChatAgent: Send + Sync {
    /// Check a model token before it is accepted into a session
    async fn configure(&self, token: &str) -> Result<(), ServiceError>;

    async fn reply(&self, text: &str, context: &AgentContext) -> Result<String, ServiceError>;
}

/// The collaborators shared by every connection
#[derive(Clone)]
pub struct Services {
    pub repositories: Arc<dyn RepositoryStore>,
    pub trees: Arc<dyn TreeSource>,
    pub agent: Arc<dyn ChatAgent>,
}

impl Services {
    pub fn new(
        repositories: Arc<dyn RepositoryStore>,
        trees: Arc<dyn TreeSource>,
        agent: Arc<dyn ChatAgent>,
    ) -> Self {
        Self {
            repositories,
            trees,
            agent,
        }
    }

    /// In-memory store, placeholder trees and the echo agent
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryRepositoryStore::new()),
            Arc::new(PlaceholderTreeSource),
            Arc::new(EchoAgent::default()),
        )
    }
}
