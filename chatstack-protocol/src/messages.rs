//! Client-server message types
//!
//! Both directions are closed tagged unions. On the wire each message is a
//! JSON object whose `type` names the variant and whose `payload` carries
//! the variant's fields (see [`crate::codec`] for the full envelope).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::types::{ChatMessage, ConfigData, FileNode, Repository};

/// A message union that can travel inside a [`crate::Frame`]
pub trait WireMessage: Serialize + DeserializeOwned {
    /// Every `type` discriminator this union accepts
    const KINDS: &'static [&'static str];

    /// The `type` discriminator of this message
    fn kind(&self) -> &'static str;

    /// Whether `kind` names a variant of this union
    fn is_known_kind(kind: &str) -> bool {
        Self::KINDS.contains(&kind)
    }
}

/// Repository operation acknowledged by REPOSITORY_ACTION_SUCCESS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryAction {
    Add,
    Update,
    Delete,
    Select,
}

impl std::fmt::Display for RepositoryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RepositoryAction::Add => "add",
            RepositoryAction::Update => "update",
            RepositoryAction::Delete => "delete",
            RepositoryAction::Select => "select",
        };
        f.write_str(name)
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Submit session configuration
    SubmitConfig(ConfigData),

    /// Request the file tree of a registered repository
    FetchFiles { repository_id: String },

    /// Send a chat message to the agent
    SendChatMessage { text: String },

    /// Register a new repository
    AddRepository { repository: Repository },

    /// Replace a registered repository
    UpdateRepository {
        repository_id: String,
        repository: Repository,
    },

    /// Remove a registered repository
    DeleteRepository { repository_id: String },

    /// Make a repository the active one (server follows up with its tree)
    SelectRepository { repository_id: String },
}

impl ClientMessage {
    /// Whether the server answers this request with a file tree
    pub fn is_tree_fetch(&self) -> bool {
        matches!(
            self,
            ClientMessage::FetchFiles { .. } | ClientMessage::SelectRepository { .. }
        )
    }

    /// Whether this request mutates repository state on the server
    pub fn is_repository_action(&self) -> bool {
        matches!(
            self,
            ClientMessage::AddRepository { .. }
                | ClientMessage::UpdateRepository { .. }
                | ClientMessage::DeleteRepository { .. }
                | ClientMessage::SelectRepository { .. }
        )
    }
}

impl WireMessage for ClientMessage {
    const KINDS: &'static [&'static str] = &[
        "SUBMIT_CONFIG",
        "FETCH_FILES",
        "SEND_CHAT_MESSAGE",
        "ADD_REPOSITORY",
        "UPDATE_REPOSITORY",
        "DELETE_REPOSITORY",
        "SELECT_REPOSITORY",
    ];

    fn kind(&self) -> &'static str {
        match self {
            ClientMessage::SubmitConfig(_) => "SUBMIT_CONFIG",
            ClientMessage::FetchFiles { .. } => "FETCH_FILES",
            ClientMessage::SendChatMessage { .. } => "SEND_CHAT_MESSAGE",
            ClientMessage::AddRepository { .. } => "ADD_REPOSITORY",
            ClientMessage::UpdateRepository { .. } => "UPDATE_REPOSITORY",
            ClientMessage::DeleteRepository { .. } => "DELETE_REPOSITORY",
            ClientMessage::SelectRepository { .. } => "SELECT_REPOSITORY",
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    /// Configuration accepted
    ConfigSuccess,

    /// Configuration rejected
    ConfigError { message: String },

    /// Full file tree of the selected repository; replaces any previous tree
    FileTreeData {
        tree: Vec<FileNode>,
        #[serde(default)]
        repository: Option<Repository>,
    },

    /// File tree could not be fetched
    FileTreeError { message: String },

    /// A transcript entry produced by the agent or the system
    NewChatMessage(ChatMessage),

    /// Agent started or stopped working on a reply
    AgentTyping {
        #[serde(rename = "isTyping")]
        is_typing: bool,
    },

    /// Authoritative list of registered repositories
    RepositoriesList { repositories: Vec<Repository> },

    /// A repository request succeeded
    RepositoryActionSuccess {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        repository: Option<Repository>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        repository_id: Option<String>,
        action: RepositoryAction,
    },

    /// A repository request failed
    RepositoryActionError { message: String },
}

impl ServerMessage {
    /// Error response that terminates a request of `request_kind`, if that
    /// kind has one
    pub fn error_for(request_kind: &str, message: impl Into<String>) -> Option<Self> {
        let message = message.into();
        match request_kind {
            "SUBMIT_CONFIG" => Some(ServerMessage::ConfigError { message }),
            "FETCH_FILES" => Some(ServerMessage::FileTreeError { message }),
            "ADD_REPOSITORY" | "UPDATE_REPOSITORY" | "DELETE_REPOSITORY"
            | "SELECT_REPOSITORY" => Some(ServerMessage::RepositoryActionError { message }),
            _ => None,
        }
    }
}

impl WireMessage for ServerMessage {
    const KINDS: &'static [&'static str] = &[
        "CONFIG_SUCCESS",
        "CONFIG_ERROR",
        "FILE_TREE_DATA",
        "FILE_TREE_ERROR",
        "NEW_CHAT_MESSAGE",
        "AGENT_TYPING",
        "REPOSITORIES_LIST",
        "REPOSITORY_ACTION_SUCCESS",
        "REPOSITORY_ACTION_ERROR",
    ];

    fn kind(&self) -> &'static str {
        match self {
            ServerMessage::ConfigSuccess => "CONFIG_SUCCESS",
            ServerMessage::ConfigError { .. } => "CONFIG_ERROR",
            ServerMessage::FileTreeData { .. } => "FILE_TREE_DATA",
            ServerMessage::FileTreeError { .. } => "FILE_TREE_ERROR",
            ServerMessage::NewChatMessage(_) => "NEW_CHAT_MESSAGE",
            ServerMessage::AgentTyping { .. } => "AGENT_TYPING",
            ServerMessage::RepositoriesList { .. } => "REPOSITORIES_LIST",
            ServerMessage::RepositoryActionSuccess { .. } => "REPOSITORY_ACTION_SUCCESS",
            ServerMessage::RepositoryActionError { .. } => "REPOSITORY_ACTION_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatSender, FileNode};
    use serde_json::json;

    #[test]
    fn test_client_kind_matches_serialized_type() {
        let messages = vec![
            ClientMessage::SubmitConfig(ConfigData::default()),
            ClientMessage::FetchFiles {
                repository_id: "r".into(),
            },
            ClientMessage::SendChatMessage { text: "t".into() },
            ClientMessage::AddRepository {
                repository: Repository::new("github.com", "o", "r", "main", None),
            },
            ClientMessage::UpdateRepository {
                repository_id: "r".into(),
                repository: Repository::new("github.com", "o", "r", "main", None),
            },
            ClientMessage::DeleteRepository {
                repository_id: "r".into(),
            },
            ClientMessage::SelectRepository {
                repository_id: "r".into(),
            },
        ];
        for msg in &messages {
            let value = serde_json::to_value(msg).unwrap();
            assert_eq!(value["type"], msg.kind());
            assert!(ClientMessage::is_known_kind(msg.kind()));
        }
        assert_eq!(messages.len(), ClientMessage::KINDS.len());
    }

    #[test]
    fn test_server_kind_matches_serialized_type() {
        let messages = vec![
            ServerMessage::ConfigSuccess,
            ServerMessage::ConfigError { message: "m".into() },
            ServerMessage::FileTreeData {
                tree: vec![],
                repository: None,
            },
            ServerMessage::FileTreeError { message: "m".into() },
            ServerMessage::NewChatMessage(ChatMessage::new(ChatSender::Agent, "hi")),
            ServerMessage::AgentTyping { is_typing: true },
            ServerMessage::RepositoriesList {
                repositories: vec![],
            },
            ServerMessage::RepositoryActionSuccess {
                repository: None,
                repository_id: Some("r".into()),
                action: RepositoryAction::Delete,
            },
            ServerMessage::RepositoryActionError { message: "m".into() },
        ];
        for msg in &messages {
            let value = serde_json::to_value(msg).unwrap();
            assert_eq!(value["type"], msg.kind());
            assert!(ServerMessage::is_known_kind(msg.kind()));
        }
        assert_eq!(messages.len(), ServerMessage::KINDS.len());
    }

    #[test]
    fn test_config_success_has_no_payload() {
        let value = serde_json::to_value(ServerMessage::ConfigSuccess).unwrap();
        assert_eq!(value, json!({"type": "CONFIG_SUCCESS"}));
    }

    #[test]
    fn test_agent_typing_wire_field() {
        let value = serde_json::to_value(ServerMessage::AgentTyping { is_typing: false }).unwrap();
        assert_eq!(value, json!({"type": "AGENT_TYPING", "payload": {"isTyping": false}}));
    }

    #[test]
    fn test_file_tree_data_from_relay_json() {
        let raw = json!({
            "type": "FILE_TREE_DATA",
            "payload": {
                "tree": [{"id": "a", "name": "a", "type": "file", "path": "a"}],
                "repository": null
            }
        });
        let msg: ServerMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(
            msg,
            ServerMessage::FileTreeData {
                tree: vec![FileNode::file("a")],
                repository: None
            }
        );
    }

    #[test]
    fn test_repository_action_success_omits_absent_fields() {
        let value = serde_json::to_value(ServerMessage::RepositoryActionSuccess {
            repository: None,
            repository_id: Some("r1".into()),
            action: RepositoryAction::Select,
        })
        .unwrap();
        assert_eq!(value["payload"], json!({"repository_id": "r1", "action": "select"}));
    }

    #[test]
    fn test_error_for_request_kinds() {
        assert!(matches!(
            ServerMessage::error_for("SUBMIT_CONFIG", "x"),
            Some(ServerMessage::ConfigError { .. })
        ));
        assert!(matches!(
            ServerMessage::error_for("FETCH_FILES", "x"),
            Some(ServerMessage::FileTreeError { .. })
        ));
        assert!(matches!(
            ServerMessage::error_for("DELETE_REPOSITORY", "x"),
            Some(ServerMessage::RepositoryActionError { .. })
        ));
        assert!(ServerMessage::error_for("SEND_CHAT_MESSAGE", "x").is_none());
    }

    #[test]
    fn test_tree_fetch_classification() {
        assert!(ClientMessage::FetchFiles {
            repository_id: "r".into()
        }
        .is_tree_fetch());
        assert!(ClientMessage::SelectRepository {
            repository_id: "r".into()
        }
        .is_tree_fetch());
        assert!(!ClientMessage::SendChatMessage { text: "t".into() }.is_tree_fetch());
    }

    #[test]
    fn test_repository_action_display() {
        assert_eq!(RepositoryAction::Update.to_string(), "update");
    }
}
