//! Chat handler
//!
//! Handles: SendChatMessage

use tracing::{debug, error};

use chatstack_protocol::{ChatMessage, ChatSender, ServerMessage};

use super::{HandlerContext, Responder};
use crate::services::AgentContext;

impl HandlerContext {
    /// Ask the agent for a reply; the user's own message is not echoed
    pub async fn handle_chat_message(&mut self, text: &str, reply: &Responder) {
        if text.trim().is_empty() {
            debug!(client = %self.client_id, "Ignoring empty chat message");
            return;
        }

        reply.send(ServerMessage::AgentTyping { is_typing: true }).await;

        let context = self.agent_context().await;
        match self.services.agent.reply(text, &context).await {
            Ok(answer) => {
                reply.send(ServerMessage::AgentTyping { is_typing: false }).await;
                reply
                    .send(ServerMessage::NewChatMessage(ChatMessage::new(
                        ChatSender::Agent,
                        answer,
                    )))
                    .await;
            }
            Err(e) => {
                error!(client = %self.client_id, "Agent failed: {}", e);
                reply
                    .send(ServerMessage::NewChatMessage(ChatMessage::new(
                        ChatSender::System,
                        format!("Error processing message: {}", e),
                    )))
                    .await;
                reply.send(ServerMessage::AgentTyping { is_typing: false }).await;
            }
        }
    }

    async fn agent_context(&self) -> AgentContext {
        let repository = match &self.session.selected_repository_id {
            Some(id) => self.services.repositories.get(self.client_id, id).await,
            None => None,
        };
        AgentContext {
            gemini_token: self.session.gemini_token.clone(),
            repository,
        }
    }
}
