//! chatstack client library
//!
//! The pieces behind the `chatstack` binary: the relay connection with
//! reconnect, the application state machine, the mock fallback timer and a
//! line-oriented front end.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod connection;
pub mod fallback;
pub mod state;
pub mod view;

pub use app::App;
pub use commands::{parse_input, Command, ParseError};
pub use state::{Action, AppState, Effect};
