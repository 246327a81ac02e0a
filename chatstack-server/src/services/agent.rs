//! Built-in chat agent
//!
//! Answers from a handful of canned replies. Stands in for a model-backed
//! agent, which would implement [`ChatAgent`] the same way.

use std::time::Duration;

use async_trait::async_trait;

use super::{AgentContext, ChatAgent, ServiceError};

pub const DEFAULT_AGENT_NAME: &str = "chatstack";

#[derive(Debug, Clone)]
pub struct EchoAgent {
    name: String,
    /// Pause before answering
    think_time: Duration,
}

impl Default for EchoAgent {
    fn default() -> Self {
        Self::new(DEFAULT_AGENT_NAME, Duration::ZERO)
    }
}

impl EchoAgent {
    pub fn new(name: impl Into<String>, think_time: Duration) -> Self {
        Self {
            name: name.into(),
            think_time,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn compose(&self, text: &str, context: &AgentContext) -> String {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let mentions = |keys: &[&str]| words.iter().any(|w| keys.contains(w));

        if mentions(&["hello", "hi"]) {
            return format!("Hello! I'm {}. How can I help you today?", self.name);
        }
        if mentions(&["files", "file", "code"]) {
            return "I can help you analyze your code or explore files in the repository. \
                    What would you like to know?"
                .to_string();
        }
        if mentions(&["github", "repo", "repository"]) {
            let repo = context
                .repository
                .as_ref()
                .map(|r| format!("{}@{}", r.name, r.branch))
                .unwrap_or_else(|| "unknown repository".to_string());
            return format!(
                "You're working with the {} repository. How can I assist with this codebase?",
                repo
            );
        }
        "I'm here to help with your code and repository. Please let me know what you'd like to do."
            .to_string()
    }
}

#[async_trait]
impl ChatAgent for EchoAgent {
    async fn configure(&self, token: &str) -> Result<(), ServiceError> {
        if token.trim().is_empty() {
            return Err(ServiceError::Invalid("Gemini token is required".into()));
        }
        tracing::info!(agent = %self.name, "Agent configured");
        Ok(())
    }

    async fn reply(&self, text: &str, context: &AgentContext) -> Result<String, ServiceError> {
        if context.gemini_token.is_none() {
            return Err(ServiceError::Unavailable("agent is not configured".into()));
        }
        if !self.think_time.is_zero() {
            tokio::time::sleep(self.think_time).await;
        }
        Ok(self.compose(text, context))
    }
}
