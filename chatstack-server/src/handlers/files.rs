//! File tree handler
//!
//! Handles: FetchFiles

use tracing::{debug, warn};

use chatstack_protocol::{FileNode, Repository, ServerMessage};

use super::{HandlerContext, Responder};

impl HandlerContext {
    /// Send the tree of a registered repository, bracketed by typing
    /// indicators
    pub async fn handle_fetch_files(&mut self, repository_id: &str, reply: &Responder) {
        reply.send(ServerMessage::AgentTyping { is_typing: true }).await;

        let message = match self.load_tree(repository_id).await {
            Ok((tree, repository)) => ServerMessage::FileTreeData {
                tree,
                repository: Some(repository.redacted()),
            },
            Err(message) => {
                warn!(client = %self.client_id, repository_id, "Tree fetch failed: {}", message);
                ServerMessage::FileTreeError { message }
            }
        };
        reply.send(message).await;

        reply.send(ServerMessage::AgentTyping { is_typing: false }).await;
    }

    async fn load_tree(&mut self, repository_id: &str) -> Result<(Vec<FileNode>, Repository), String> {
        if repository_id.trim().is_empty() {
            return Err("Repository ID is required".to_string());
        }

        let repository = self
            .services
            .repositories
            .get(self.client_id, repository_id)
            .await
            .ok_or_else(|| "Repository not found".to_string())?;

        self.session.selected_repository_id = Some(repository_id.to_string());

        let tree = self
            .services
            .trees
            .fetch_tree(&repository)
            .await
            .map_err(|e| e.to_string())?;
        debug!(
            client = %self.client_id,
            repository = %repository.name,
            nodes = FileNode::count(&tree),
            "Tree loaded"
        );
        Ok((tree, repository))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use chatstack_protocol::{ClientMessage, ServerMessage};

    fn tree_reply(messages: &[ServerMessage]) -> &ServerMessage {
        assert_eq!(messages.len(), 3, "{messages:?}");
        assert_eq!(messages[0], ServerMessage::AgentTyping { is_typing: true });
        assert_eq!(messages[2], ServerMessage::AgentTyping { is_typing: false });
        &messages[1]
    }

    #[tokio::test]
    async fn test_fetch_registered_repository() {
        let (mut ctx, mut rx) = context();
        let list = configured(&mut ctx, &mut rx, vec![repo("a"), repo("b")]).await;
        let id = list[1].id.clone().unwrap();

        ctx.route_message(request(ClientMessage::FetchFiles {
            repository_id: id.clone(),
        }))
        .await;

        match tree_reply(&drain(&mut rx)) {
            ServerMessage::FileTreeData { tree, repository } => {
                assert!(!tree.is_empty());
                let repository = repository.as_ref().unwrap();
                assert_eq!(repository.id.as_deref(), Some(id.as_str()));
                assert!(repository.token.is_none());
            }
            other => panic!("expected tree, got {other:?}"),
        }
        assert_eq!(ctx.session().selected_repository_id.as_deref(), Some(id.as_str()));
    }

    #[tokio::test]
    async fn test_fetch_unknown_repository() {
        let (mut ctx, mut rx) = context();
        ctx.route_message(request(ClientMessage::FetchFiles {
            repository_id: "nope".into(),
        }))
        .await;

        assert_eq!(
            tree_reply(&drain(&mut rx)),
            &ServerMessage::FileTreeError {
                message: "Repository not found".into()
            }
        );
        assert!(ctx.session().selected_repository_id.is_none());
    }

    #[tokio::test]
    async fn test_fetch_empty_id() {
        let (mut ctx, mut rx) = context();
        ctx.route_message(request(ClientMessage::FetchFiles {
            repository_id: " ".into(),
        }))
        .await;

        assert_eq!(
            tree_reply(&drain(&mut rx)),
            &ServerMessage::FileTreeError {
                message: "Repository ID is required".into()
            }
        );
    }
}
