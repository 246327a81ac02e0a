//! HTTP and WebSocket endpoints

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use chatstack_protocol::{encode_frame, Frame, ServerMessage, WS_PATH};
use chatstack_utils::Result;

use crate::handlers::HandlerContext;
use crate::registry::ClientRegistry;
use crate::services::Services;

/// Replies queued per connection before handlers wait
const OUTBOX_CAPACITY: usize = 100;

/// State shared by every connection
#[derive(Clone)]
pub struct ServerState {
    pub services: Services,
    pub registry: Arc<ClientRegistry>,
}

impl ServerState {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            registry: Arc::new(ClientRegistry::new()),
        }
    }
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/", get(health))
        .route(WS_PATH, get(ws_handler))
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: ServerState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Relay listening on {}", addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ServerState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: ServerState) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbox_tx, mut outbox_rx) = mpsc::channel::<Frame<ServerMessage>>(OUTBOX_CAPACITY);

    let client_id = state.registry.register();
    info!(
        client = %client_id,
        connected = state.registry.client_count(),
        "Client connected"
    );

    // Forward queued replies to the socket
    let send_task = tokio::spawn(async move {
        while let Some(frame) = outbox_rx.recv().await {
            let text = match encode_frame(&frame) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to encode frame: {}", e);
                    continue;
                }
            };
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                debug!("WebSocket send failed, client disconnected");
                break;
            }
        }
    });

    let mut ctx = HandlerContext::new(state.services.clone(), client_id, outbox_tx);

    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(Message::Text(text)) => ctx.handle_text(text.as_str()).await,
            Ok(Message::Binary(_)) => debug!(client = %client_id, "Ignoring binary frame"),
            Ok(Message::Close(_)) => {
                debug!(client = %client_id, "Client sent close frame");
                break;
            }
            // Pings are answered by the transport
            Ok(_) => {}
            Err(e) => {
                warn!(client = %client_id, "WebSocket error: {}", e);
                break;
            }
        }
    }

    ctx.disconnect().await;
    let connected_for = state.registry.unregister(client_id);
    send_task.abort();
    info!(
        client = %client_id,
        ?connected_for,
        remaining = state.registry.client_count(),
        "Client disconnected"
    );
}
