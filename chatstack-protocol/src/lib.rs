//! chatstack-protocol: Shared WebSocket definitions for client-server communication
//!
//! This crate defines the message unions exchanged over the chatstack
//! WebSocket, the data model they carry, and the JSON frame codec that wraps
//! every message in a correlation envelope.

pub mod codec;
pub mod messages;
pub mod types;

// Re-export main types at crate root
pub use codec::{decode_frame, encode_frame, CodecError, Frame, RequestId};
pub use messages::{ClientMessage, RepositoryAction, ServerMessage, WireMessage};
pub use types::{
    ChatMessage, ChatSender, ConfigData, FileNode, FileNodeType, Repository,
    RepositoryError, DEFAULT_BRANCH, DEFAULT_HOST,
};

/// Path the relay serves its WebSocket endpoint on
pub const WS_PATH: &str = "/ws";
