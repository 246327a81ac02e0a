//! Repository handlers
//!
//! Handles: AddRepository, UpdateRepository, DeleteRepository, SelectRepository

use tracing::{info, warn};

use chatstack_protocol::{Repository, RepositoryAction, ServerMessage};

use super::{HandlerContext, Responder};
use crate::services::ServiceError;

impl HandlerContext {
    /// Register a repository; the first one registered becomes selected
    pub async fn handle_add_repository(&mut self, repository: Repository, reply: &Responder) {
        let stored = match self.store_new(repository).await {
            Ok(stored) => stored,
            Err(e) => return self.action_error(RepositoryAction::Add, e, reply).await,
        };
        info!(client = %self.client_id, repository = %stored.name, "Repository added");

        reply
            .send(ServerMessage::RepositoryActionSuccess {
                repository: Some(stored.redacted()),
                repository_id: None,
                action: RepositoryAction::Add,
            })
            .await;
        self.send_repository_list(reply).await;

        if self.session.selected_repository_id.is_none() {
            if let Some(id) = stored.id {
                self.session.selected_repository_id = Some(id.clone());
                self.handle_fetch_files(&id, reply).await;
            }
        }
    }

    async fn store_new(&self, repository: Repository) -> Result<Repository, ServiceError> {
        self.services.trees.validate(&repository).await?;
        self.services
            .repositories
            .upsert(self.client_id, repository)
            .await
    }

    /// Replace a registered repository, refreshing the tree if it is selected
    pub async fn handle_update_repository(
        &mut self,
        repository_id: &str,
        repository: Repository,
        reply: &Responder,
    ) {
        if repository_id.trim().is_empty() {
            let e = ServiceError::Invalid("Repository ID and data are required".into());
            return self.action_error(RepositoryAction::Update, e, reply).await;
        }

        let stored = match self.store_update(repository_id, repository).await {
            Ok(stored) => stored,
            Err(e) => return self.action_error(RepositoryAction::Update, e, reply).await,
        };
        info!(client = %self.client_id, repository = %stored.name, "Repository updated");

        reply
            .send(ServerMessage::RepositoryActionSuccess {
                repository: Some(stored.redacted()),
                repository_id: None,
                action: RepositoryAction::Update,
            })
            .await;
        self.send_repository_list(reply).await;

        if self.session.selected_repository_id.as_deref() == Some(repository_id) {
            self.handle_fetch_files(repository_id, reply).await;
        }
    }

    async fn store_update(
        &self,
        repository_id: &str,
        repository: Repository,
    ) -> Result<Repository, ServiceError> {
        self.services.trees.validate(&repository).await?;
        self.services
            .repositories
            .update(self.client_id, repository_id, repository)
            .await
    }

    /// Remove a repository; if it was selected, move on to the first
    /// remaining one or clear the tree
    pub async fn handle_delete_repository(&mut self, repository_id: &str, reply: &Responder) {
        if repository_id.trim().is_empty() {
            let e = ServiceError::Invalid("Repository ID is required".into());
            return self.action_error(RepositoryAction::Delete, e, reply).await;
        }

        if let Err(e) = self
            .services
            .repositories
            .delete(self.client_id, repository_id)
            .await
        {
            warn!(client = %self.client_id, repository_id, "Delete failed: {}", e);
            let e = ServiceError::Unavailable("Failed to delete repository".into());
            return self.action_error(RepositoryAction::Delete, e, reply).await;
        }
        info!(client = %self.client_id, repository_id, "Repository deleted");

        reply
            .send(ServerMessage::RepositoryActionSuccess {
                repository: None,
                repository_id: Some(repository_id.to_string()),
                action: RepositoryAction::Delete,
            })
            .await;
        let remaining = self.send_repository_list(reply).await;

        if self.session.selected_repository_id.as_deref() != Some(repository_id) {
            return;
        }
        match remaining.first().and_then(|r| r.id.clone()) {
            Some(next) => {
                self.session.selected_repository_id = Some(next.clone());
                self.handle_fetch_files(&next, reply).await;
            }
            None => {
                self.session.selected_repository_id = None;
                reply
                    .send(ServerMessage::FileTreeData {
                        tree: Vec::new(),
                        repository: None,
                    })
                    .await;
            }
        }
    }

    /// Make a repository active and send its tree
    pub async fn handle_select_repository(&mut self, repository_id: &str, reply: &Responder) {
        if repository_id.trim().is_empty() {
            let e = ServiceError::Invalid("Repository ID is required".into());
            return self.action_error(RepositoryAction::Select, e, reply).await;
        }

        let exists = self
            .services
            .repositories
            .get(self.client_id, repository_id)
            .await
            .is_some();
        if !exists {
            let e = ServiceError::NotFound("Repository");
            return self.action_error(RepositoryAction::Select, e, reply).await;
        }

        self.session.selected_repository_id = Some(repository_id.to_string());
        reply
            .send(ServerMessage::RepositoryActionSuccess {
                repository: None,
                repository_id: Some(repository_id.to_string()),
                action: RepositoryAction::Select,
            })
            .await;
        self.handle_fetch_files(repository_id, reply).await;
    }

    async fn action_error(&self, action: RepositoryAction, error: ServiceError, reply: &Responder) {
        warn!(client = %self.client_id, %action, "Repository action failed: {}", error);
        reply
            .send(ServerMessage::RepositoryActionError {
                message: error.to_string(),
            })
            .await;
    }
}
