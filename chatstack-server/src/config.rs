//! Relay configuration
//!
//! Loaded from `server.toml` in the chatstack config directory, then
//! overridden from the command line.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

use chatstack_utils::{server_config_file, ChatstackError, Result};

use crate::services::{
    ChatAgent, EchoAgent, LocalTreeSource, MemoryRepositoryStore, PlaceholderTreeSource, Services,
    TreeSource, DEFAULT_AGENT_NAME,
};

pub const DEFAULT_BIND: &str = "127.0.0.1:8000";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub bind: String,
    /// Directory of checkouts laid out as `<owner>/<repo>`; placeholder
    /// trees are served when unset
    pub checkouts_root: Option<PathBuf>,
    pub agent_name: String,
    /// Simulated thinking time before each agent reply
    pub agent_delay_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            checkouts_root: None,
            agent_name: DEFAULT_AGENT_NAME.to_string(),
            agent_delay_ms: 1000,
        }
    }
}

impl ServerConfig {
    /// Load from `explicit`, or from the default location if it exists
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = server_config_file();
                if !path.exists() {
                    return Ok(Self::default());
                }
                path
            }
        };

        let content = std::fs::read_to_string(&path).map_err(|source| ChatstackError::FileRead {
            path: path.clone(),
            source,
        })?;
        Self::parse(&content, &path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ChatstackError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if config.bind.trim().is_empty() {
            return Err(ChatstackError::ConfigInvalid {
                path: path.to_path_buf(),
                message: "bind must not be empty".into(),
            });
        }
        Ok(config)
    }

    /// Collaborators described by this configuration
    pub fn services(&self) -> Services {
        let trees: Arc<dyn TreeSource> = match &self.checkouts_root {
            Some(root) => Arc::new(LocalTreeSource::new(root)),
            None => Arc::new(PlaceholderTreeSource),
        };
        let agent: Arc<dyn ChatAgent> = Arc::new(EchoAgent::new(
            self.agent_name.clone(),
            Duration::from_millis(self.agent_delay_ms),
        ));
        Services::new(Arc::new(MemoryRepositoryStore::new()), trees, agent)
    }
}

/// chatstack-server - WebSocket relay for chatstack clients
#[derive(Parser, Debug)]
#[command(name = "chatstack-server", author, version, about, long_about = None)]
pub struct Args {
    /// Address to listen on, e.g. 0.0.0.0:8000
    #[arg(long, short = 'b', env = "CHATSTACK_BIND")]
    pub bind: Option<String>,

    /// Serve file trees from checkouts under this directory
    #[arg(long)]
    pub checkouts: Option<PathBuf>,

    /// Custom config file
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Apply command-line overrides on top of the file configuration
    pub fn apply(&self, mut config: ServerConfig) -> ServerConfig {
        if let Some(bind) = &self.bind {
            config.bind = bind.clone();
        }
        if let Some(root) = &self.checkouts {
            config.checkouts_root = Some(root.clone());
        }
        config
    }
}
