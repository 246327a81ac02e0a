//! Session configuration handler
//!
//! Handles: SubmitConfig

use tracing::{info, warn};

use chatstack_protocol::{ConfigData, ServerMessage};

use super::{HandlerContext, Responder};
use crate::services::ServiceError;

impl HandlerContext {
    /// Accept a configuration, register its repositories and show the first
    ///
    /// CONFIG_SUCCESS is sent last, after the repository list and tree.
    pub async fn handle_submit_config(&mut self, config: ConfigData, reply: &Responder) {
        match self.apply_config(config, reply).await {
            Ok(()) => reply.send(ServerMessage::ConfigSuccess).await,
            Err(e) => {
                warn!(client = %self.client_id, "Configuration rejected: {}", e);
                reply
                    .send(ServerMessage::ConfigError {
                        message: e.to_string(),
                    })
                    .await;
            }
        }
    }

    async fn apply_config(
        &mut self,
        config: ConfigData,
        reply: &Responder,
    ) -> Result<(), ServiceError> {
        for repository in &config.repositories {
            repository
                .validate()
                .map_err(|e| ServiceError::Invalid(e.to_string()))?;
        }

        self.services.agent.configure(&config.gemini_token).await?;
        self.session.gemini_token = Some(config.gemini_token);

        if config.repositories.is_empty() {
            info!(client = %self.client_id, "Configured without repositories");
            return Ok(());
        }

        for repository in config.repositories {
            self.services
                .repositories
                .upsert(self.client_id, repository)
                .await?;
        }

        let repositories = self.send_repository_list(reply).await;
        info!(
            client = %self.client_id,
            repositories = repositories.len(),
            "Configured"
        );

        if let Some(first) = repositories.first().and_then(|r| r.id.clone()) {
            self.session.selected_repository_id = Some(first.clone());
            self.handle_fetch_files(&first, reply).await;
        }
        Ok(())
    }
}
