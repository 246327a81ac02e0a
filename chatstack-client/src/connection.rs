//! Client-server connection management
//!
//! Provides the single WebSocket connection to the chatstack relay with
//! JSON framing, a fixed-interval reconnect policy and async dispatch of
//! inbound frames.

mod client;
mod handler;
mod reconnect;

pub use client::{derive_ws_url, Connection, ConnectionEvent, ConnectionState};
pub use handler::{dispatch_event, MessageHandler, MessageSender};
pub use reconnect::{ReconnectPolicy, DEFAULT_INTERVAL_MS, DEFAULT_MAX_ATTEMPTS};
