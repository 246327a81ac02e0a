//! Path utilities for chatstack
//!
//! Handles XDG Base Directory specification compliance for config and
//! state directories.

use std::path::PathBuf;

use directories::ProjectDirs;

/// Application identifier for XDG directories
const APP_NAME: &str = "chatstack";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME)
}

/// Get the configuration directory
///
/// Location: `$XDG_CONFIG_HOME/chatstack` or `~/.config/chatstack`
pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(fallback_config_dir)
}

/// Client configuration file
///
/// Location: `$XDG_CONFIG_HOME/chatstack/client.toml`
pub fn client_config_file() -> PathBuf {
    config_dir().join("client.toml")
}

/// Relay server configuration file
///
/// Location: `$XDG_CONFIG_HOME/chatstack/server.toml`
pub fn server_config_file() -> PathBuf {
    config_dir().join("server.toml")
}

/// Get the state directory
///
/// Location: `$XDG_STATE_HOME/chatstack` or `~/.local/state/chatstack`
pub fn state_dir() -> PathBuf {
    project_dirs()
        .and_then(|p| p.state_dir().map(|d| d.to_path_buf()))
        .unwrap_or_else(fallback_state_dir)
}

/// Get the log directory
///
/// Location: `$XDG_STATE_HOME/chatstack/log`
pub fn log_dir() -> PathBuf {
    state_dir().join("log")
}

// Fallback implementations when ProjectDirs is unavailable

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

fn fallback_config_dir() -> PathBuf {
    home_dir().join(".config").join(APP_NAME)
}

fn fallback_state_dir() -> PathBuf {
    home_dir().join(".local").join("state").join(APP_NAME)
}
