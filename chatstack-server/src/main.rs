//! chatstack-server - WebSocket relay for chatstack clients

use tokio::net::TcpListener;
use tracing::{error, info};

use chatstack_server::{serve, Args, ServerConfig, ServerState};
use chatstack_utils::{init_logging_with_config, ChatstackError, LogConfig, Result};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    init_logging_with_config(LogConfig::server())?;
    info!("chatstack-server starting");

    if let Err(e) = run_server(args).await {
        error!("Server error: {}", e);
        return Err(e);
    }

    info!("chatstack-server stopped");
    Ok(())
}

async fn run_server(args: Args) -> Result<()> {
    let config = args.apply(ServerConfig::load(args.config.as_deref())?);
    info!(
        bind = %config.bind,
        checkouts = ?config.checkouts_root,
        agent = %config.agent_name,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.bind)
        .await
        .map_err(|e| ChatstackError::connection(format!("cannot bind {}: {}", config.bind, e)))?;

    serve(listener, ServerState::new(config.services()), shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
