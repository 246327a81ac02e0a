//! Data model carried inside protocol messages

mod chat;
mod file_tree;
mod repository;

pub use chat::{ChatMessage, ChatSender, ConfigData};
pub use file_tree::{FileNode, FileNodeType};
pub use repository::{Repository, RepositoryError, DEFAULT_BRANCH, DEFAULT_HOST};
