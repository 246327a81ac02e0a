//! Command-line argument parsing for the chatstack client
//!
//! Uses clap for argument parsing with derive macros.

use clap::Parser;
use std::path::PathBuf;

use crate::config::ClientConfig;

/// chatstack - chat with an agent about a repository
#[derive(Parser, Debug)]
#[command(name = "chatstack", author, version, about, long_about = None)]
pub struct Args {
    /// Relay base URL
    ///
    /// The WebSocket endpoint is derived from it: http becomes ws, https
    /// becomes wss and the path is set to /ws.
    /// Example: http://127.0.0.1:8000
    #[arg(long, short = 's', env = "CHATSTACK_SERVER")]
    pub server: Option<String>,

    /// Show a placeholder file tree when the relay is slow to answer
    #[arg(long, default_value_t = false)]
    pub mock_fallback: bool,

    /// Custom config file
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,
}

impl Args {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Apply command-line overrides on top of the file configuration
    pub fn apply(&self, mut config: ClientConfig) -> ClientConfig {
        if let Some(server) = &self.server {
            config.server_url = server.clone();
        }
        if self.mock_fallback {
            config.fallback.enabled = true;
        }
        config
    }
}
