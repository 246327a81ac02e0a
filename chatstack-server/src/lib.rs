//! chatstack relay
//!
//! Serves `/ws` for chatstack clients and dispatches each request to the
//! configured collaborators: a repository store, a file tree source and a
//! chat agent.

pub mod config;
pub mod handlers;
pub mod registry;
pub mod services;
pub mod ws;

pub use config::{Args, ServerConfig};
pub use ws::{router, serve, ServerState};
