//! Mock fallback timer
//!
//! When enabled, every tree fetch arms a countdown. If the server has not
//! answered when it fires, the state machine shows [`placeholder_tree`]
//! instead of an endless spinner. The real request stays in flight and its
//! response still replaces the placeholder when it arrives.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use chatstack_protocol::FileNode;

/// Default countdown before placeholder data is shown
pub const DEFAULT_FALLBACK_DELAY_MS: u64 = 2000;

/// Delivered to the event loop when an armed countdown runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackExpired {
    pub ticket: u64,
}

/// Single-slot countdown; arming a new one cancels the previous one
pub struct FallbackTimer {
    delay: Duration,
    tx: mpsc::UnboundedSender<FallbackExpired>,
    pending: Option<(u64, JoinHandle<()>)>,
}

impl FallbackTimer {
    pub fn new(delay: Duration, tx: mpsc::UnboundedSender<FallbackExpired>) -> Self {
        Self {
            delay,
            tx,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Start a countdown that reports `ticket` on expiry
    pub fn arm(&mut self, ticket: u64) {
        self.cancel();

        let tx = self.tx.clone();
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(FallbackExpired { ticket });
        });

        tracing::debug!(ticket, delay_ms = delay.as_millis() as u64, "Fallback timer armed");
        self.pending = Some((ticket, handle));
    }

    /// Stop the pending countdown, if any
    pub fn cancel(&mut self) {
        if let Some((ticket, handle)) = self.pending.take() {
            handle.abort();
            tracing::debug!(ticket, "Fallback timer cancelled");
        }
    }

    /// Ticket of the countdown that has not fired yet
    pub fn armed_ticket(&self) -> Option<u64> {
        self.pending
            .as_ref()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(ticket, _)| *ticket)
    }
}

impl Drop for FallbackTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Tree shown when the server does not answer a fetch in time
pub fn placeholder_tree() -> Vec<FileNode> {
    vec![
        FileNode::file("README.md"),
        FileNode::directory(
            "src",
            vec![
                FileNode::file("src/main.rs"),
                FileNode::file("src/lib.rs"),
                FileNode::directory("src/components", vec![FileNode::file("src/components/chat.rs")]),
            ],
        ),
        FileNode::file("Cargo.toml"),
    ]
}
