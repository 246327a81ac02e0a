//! Logging infrastructure for chatstack
//!
//! Provides unified logging setup using the tracing ecosystem.

use std::fs::File;

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::{paths, ChatstackError, Result};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "CHATSTACK_LOG";

/// Log output destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// Log to stderr (for the relay server)
    Stderr,
    /// Log to file (for the client, whose stdout carries the view)
    File,
    /// Log to both stderr and file
    Both,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Output destination
    pub output: LogOutput,
    /// Log level filter (e.g., "info", "debug", "chatstack_client=debug,tungstenite=warn")
    pub filter: String,
    /// Include span events (enter/exit)
    pub span_events: bool,
    /// Include file/line in logs
    pub file_line: bool,
    /// Optional custom log file name (defaults to "chatstack.log")
    pub file_name: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: "info".into(),
            span_events: false,
            file_line: false,
            file_name: None,
        }
    }
}

impl LogConfig {
    /// Create config for the client (file logging, since stdout is the view)
    pub fn client() -> Self {
        Self {
            output: LogOutput::File,
            filter: std::env::var(LOG_ENV).unwrap_or_else(|_| "warn".into()),
            span_events: false,
            file_line: false,
            file_name: Some("client.log".into()),
        }
    }

    /// Create config for the relay server (stderr logging)
    pub fn server() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: std::env::var(LOG_ENV).unwrap_or_else(|_| "info".into()),
            span_events: false,
            file_line: true,
            file_name: None,
        }
    }

    /// Create config for development (verbose stderr)
    pub fn development() -> Self {
        Self {
            output: LogOutput::Stderr,
            filter: "debug".into(),
            span_events: true,
            file_line: true,
            file_name: None,
        }
    }
}

/// Initialize logging with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(LogConfig::default())
}

/// Initialize logging with custom configuration
pub fn init_logging_with_config(config: LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| ChatstackError::config(format!("Invalid log filter: {}", e)))?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false);

    let fmt_layer = if config.span_events {
        fmt_layer.with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
    } else {
        fmt_layer
    };

    let fmt_layer = if config.file_line {
        fmt_layer.with_file(true).with_line_number(true)
    } else {
        fmt_layer.with_file(false).with_line_number(false)
    };

    let file_name = config.file_name.as_deref().unwrap_or("chatstack.log");

    match config.output {
        LogOutput::Stderr => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer.with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| ChatstackError::internal(format!("Failed to init logging: {}", e)))?;
        }
        LogOutput::File => {
            let file = open_log_file(file_name)?;
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer.with_writer(file).with_ansi(false))
                .try_init()
                .map_err(|e| ChatstackError::internal(format!("Failed to init logging: {}", e)))?;
        }
        LogOutput::Both => {
            let file = open_log_file(file_name)?;
            let file_layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer.with_writer(std::io::stderr))
                .with(file_layer)
                .try_init()
                .map_err(|e| ChatstackError::internal(format!("Failed to init logging: {}", e)))?;
        }
    }

    Ok(())
}

/// Open (append) a log file in the log directory, creating the directory
fn open_log_file(file_name: &str) -> Result<File> {
    let log_dir = paths::log_dir();
    std::fs::create_dir_all(&log_dir).map_err(|e| ChatstackError::FileWrite {
        path: log_dir.clone(),
        source: e,
    })?;

    let log_path = log_dir.join(file_name);
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| ChatstackError::FileWrite {
            path: log_path,
            source: e,
        })
}
