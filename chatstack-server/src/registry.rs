//! Connected client tracking

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Unique identifier for a connected client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    /// Create a new ClientId from a raw value (mainly for testing)
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Client({})", self.0)
    }
}

/// Registry of connected clients
///
/// Hands out connection ids and remembers when each client connected.
/// Replies never go through here; every connection owns its outbox.
pub struct ClientRegistry {
    clients: DashMap<ClientId, Instant>,
    next_client_id: AtomicU64,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
            next_client_id: AtomicU64::new(1),
        }
    }

    /// Register a new client and return its id
    pub fn register(&self) -> ClientId {
        let id = ClientId(self.next_client_id.fetch_add(1, Ordering::Relaxed));
        self.clients.insert(id, Instant::now());
        tracing::debug!(client = %id, total = self.clients.len(), "Client registered");
        id
    }

    /// Remove a client; returns how long it was connected
    pub fn unregister(&self, id: ClientId) -> Option<Duration> {
        let (_, connected_at) = self.clients.remove(&id)?;
        tracing::debug!(client = %id, total = self.clients.len(), "Client unregistered");
        Some(connected_at.elapsed())
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}
