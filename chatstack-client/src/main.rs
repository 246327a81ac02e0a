//! chatstack client - chat with an agent about a repository
//!
//! Connects to a chatstack relay over WebSocket and drives the session from
//! stdin. Type `/help` for the command list.

use chatstack_client::cli::Args;
use chatstack_client::config::ClientConfig;
use chatstack_client::App;
use chatstack_utils::{init_logging_with_config, LogConfig, Result};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments first (before logging setup)
    let args = Args::parse_args();

    // Log to file so stdout stays a clean transcript
    init_logging_with_config(LogConfig::client())?;
    tracing::info!("chatstack client starting");
    tracing::debug!("CLI args: {:?}", args);

    match run_app(args).await {
        Ok(()) => {
            tracing::info!("chatstack client exiting normally");
            Ok(())
        }
        Err(e) => {
            tracing::error!("chatstack client error: {}", e);
            eprintln!("Error: {}", e);
            Err(e)
        }
    }
}

async fn run_app(args: Args) -> Result<()> {
    let config = args.apply(ClientConfig::load(args.config.as_deref())?);
    tracing::debug!(server = %config.server_url, fallback = config.fallback.enabled, "Configuration loaded");

    let mut app = App::new(&config)?;
    app.run().await
}
