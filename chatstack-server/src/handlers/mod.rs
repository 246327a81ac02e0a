//! Message handlers for client requests
//!
//! Each WebSocket connection owns one [`HandlerContext`]. It decodes incoming
//! frames, routes them to the handler for their kind and queues the replies
//! on the connection's outbox. Every reply produced while handling a request
//! carries that request's correlation id and epoch.

mod chat;
mod config;
mod files;
mod repository;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use chatstack_protocol::{
    decode_frame, ClientMessage, CodecError, Frame, Repository, RequestId, ServerMessage,
    WireMessage,
};

use crate::registry::ClientId;
use crate::services::Services;

/// What the relay remembers about one connection
#[derive(Debug, Default, Clone)]
pub struct ClientSession {
    /// Model token accepted with SUBMIT_CONFIG
    pub gemini_token: Option<String>,
    pub selected_repository_id: Option<String>,
}

/// Queues replies to one request
#[derive(Clone)]
pub struct Responder {
    outbox: mpsc::Sender<Frame<ServerMessage>>,
    request_id: Option<RequestId>,
    epoch: Option<u64>,
}

impl Responder {
    pub async fn send(&self, message: ServerMessage) {
        let frame = Frame {
            message,
            request_id: self.request_id,
            epoch: self.epoch,
        };
        if self.outbox.send(frame).await.is_err() {
            debug!("Outbox closed, reply dropped");
        }
    }
}

/// Per-connection handler state
pub struct HandlerContext {
    services: Services,
    client_id: ClientId,
    session: ClientSession,
    outbox: mpsc::Sender<Frame<ServerMessage>>,
}

impl HandlerContext {
    pub fn new(
        services: Services,
        client_id: ClientId,
        outbox: mpsc::Sender<Frame<ServerMessage>>,
    ) -> Self {
        Self {
            services,
            client_id,
            session: ClientSession::default(),
            outbox,
        }
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    fn responder(&self, request_id: Option<RequestId>, epoch: Option<u64>) -> Responder {
        Responder {
            outbox: self.outbox.clone(),
            request_id,
            epoch,
        }
    }

    /// Decode and handle one text frame
    pub async fn handle_text(&mut self, text: &str) {
        match decode_frame::<ClientMessage>(text) {
            Ok(frame) => self.route_message(frame).await,
            Err(CodecError::InvalidPayload {
                kind,
                request_id,
                epoch,
                source,
            }) => {
                warn!(client = %self.client_id, %kind, "Invalid payload: {}", source);
                // Settle the request so the client does not wait forever
                let message = invalid_payload_message(&kind, &source);
                if let Some(reply) = ServerMessage::error_for(&kind, message) {
                    self.responder(request_id, epoch).send(reply).await;
                }
            }
            Err(e) if e.is_unknown_kind() => {
                warn!(client = %self.client_id, "Ignoring frame: {}", e);
            }
            Err(e) => {
                warn!(client = %self.client_id, "Dropping malformed frame: {}", e);
            }
        }
    }

    /// Route a client message to the appropriate handler
    pub async fn route_message(&mut self, frame: Frame<ClientMessage>) {
        let reply = self.responder(frame.request_id, frame.epoch);
        debug!(client = %self.client_id, kind = frame.message.kind(), "Handling request");

        match frame.message {
            ClientMessage::SubmitConfig(config) => self.handle_submit_config(config, &reply).await,

            ClientMessage::FetchFiles { repository_id } => {
                self.handle_fetch_files(&repository_id, &reply).await
            }

            ClientMessage::SendChatMessage { text } => {
                self.handle_chat_message(&text, &reply).await
            }

            ClientMessage::AddRepository { repository } => {
                self.handle_add_repository(repository, &reply).await
            }

            ClientMessage::UpdateRepository {
                repository_id,
                repository,
            } => {
                self.handle_update_repository(&repository_id, repository, &reply)
                    .await
            }

            ClientMessage::DeleteRepository { repository_id } => {
                self.handle_delete_repository(&repository_id, &reply).await
            }

            ClientMessage::SelectRepository { repository_id } => {
                self.handle_select_repository(&repository_id, &reply).await
            }
        }
    }

    /// Send REPOSITORIES_LIST and return what was listed
    async fn send_repository_list(&self, reply: &Responder) -> Vec<Repository> {
        let repositories = self.services.repositories.list(self.client_id).await;
        reply
            .send(ServerMessage::RepositoriesList {
                repositories: repositories.iter().map(Repository::redacted).collect(),
            })
            .await;
        repositories
    }

    /// Release everything held for this connection
    pub async fn disconnect(&mut self) {
        self.services.repositories.forget(self.client_id).await;
        self.session = ClientSession::default();
    }
}

fn invalid_payload_message(kind: &str, source: &serde_json::Error) -> String {
    match kind {
        "FETCH_FILES" | "DELETE_REPOSITORY" | "SELECT_REPOSITORY" => {
            "Repository ID is required".to_string()
        }
        "ADD_REPOSITORY" => "Repository data is required".to_string(),
        "UPDATE_REPOSITORY" => "Repository ID and data are required".to_string(),
        _ => source.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    use chatstack_protocol::ConfigData;

    /// Handler over in-memory services plus the receiving end of its outbox
    pub fn context() -> (HandlerContext, mpsc::Receiver<Frame<ServerMessage>>) {
        let (tx, rx) = mpsc::channel(64);
        (HandlerContext::new(Services::in_memory(), ClientId::new(1), tx), rx)
    }

    pub fn drain(rx: &mut mpsc::Receiver<Frame<ServerMessage>>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            out.push(frame.message);
        }
        out
    }

    pub fn repo(name: &str) -> Repository {
        Repository::new("github.com", "octo", name, "main", Some("ghp_x".into()))
    }

    pub fn request(message: ClientMessage) -> Frame<ClientMessage> {
        Frame::request(message, 0)
    }

    /// Configure with the given repositories and discard the replies
    pub async fn configured(
        ctx: &mut HandlerContext,
        rx: &mut mpsc::Receiver<Frame<ServerMessage>>,
        repositories: Vec<Repository>,
    ) -> Vec<Repository> {
        ctx.route_message(request(ClientMessage::SubmitConfig(ConfigData {
            gemini_token: "gem".into(),
            repositories,
        })))
        .await;
        drain(rx);
        ctx.services.repositories.list(ctx.client_id).await
    }
}
