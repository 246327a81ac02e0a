//! Message handler trait and utilities

use chatstack_protocol::{encode_frame, ClientMessage, Frame, ServerMessage};
use tokio::sync::{mpsc, watch};

use super::client::{ConnectionEvent, ConnectionState};

/// Clonable, fire-and-forget message sender
///
/// Frames are only handed to the transport while the connection is open.
/// Anything sent in another state is dropped here, which leaves callers free
/// to update local state optimistically either way.
#[derive(Clone)]
pub struct MessageSender {
    tx: mpsc::Sender<String>,
    state: watch::Receiver<ConnectionState>,
}

impl MessageSender {
    pub fn new(tx: mpsc::Sender<String>, state: watch::Receiver<ConnectionState>) -> Self {
        Self { tx, state }
    }

    /// Current connection state as seen by this sender
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Encode and queue `frame`; returns whether it reached the transport
    pub fn send(&self, frame: &Frame<ClientMessage>) -> bool {
        let state = self.state();
        if state != ConnectionState::Open {
            tracing::debug!(?state, "Connection not open, frame not sent");
            return false;
        }

        let text = match encode_frame(frame) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to encode frame: {}", e);
                return false;
            }
        };

        match self.tx.try_send(text) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to queue frame: {}", e);
                false
            }
        }
    }
}

/// Trait for handling connection events
pub trait MessageHandler: Send {
    /// Handle a server frame
    fn handle(&mut self, frame: Frame<ServerMessage>);

    /// Called on every connection state transition
    fn on_state_changed(&mut self, _state: ConnectionState) {}

    /// Called before each reconnect attempt
    fn on_reconnecting(&mut self, _attempt: u32, _max_attempts: u32) {}

    /// Called once the reconnect budget is spent
    fn on_exhausted(&mut self) {}
}

/// Route a connection event to the matching handler method
pub fn dispatch_event<H: MessageHandler + ?Sized>(handler: &mut H, event: ConnectionEvent) {
    match event {
        ConnectionEvent::StateChanged(state) => handler.on_state_changed(state),
        ConnectionEvent::Message(frame) => handler.handle(frame),
        ConnectionEvent::Reconnecting {
            attempt,
            max_attempts,
        } => handler.on_reconnecting(attempt, max_attempts),
        ConnectionEvent::Exhausted => handler.on_exhausted(),
    }
}
