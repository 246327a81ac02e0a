//! Fixed-interval reconnect policy

use std::time::Duration;

/// Default number of reconnect attempts before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default pause between reconnect attempts
pub const DEFAULT_INTERVAL_MS: u64 = 3000;

/// How the connection retries after an unexpected close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Attempts allowed after a drop; the counter resets once a connection opens
    pub max_attempts: u32,
    /// Pause before each attempt
    pub interval: Duration,
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Whether another attempt is allowed after `failures` consecutive failures
    pub fn allows(&self, failures: u32) -> bool {
        failures <= self.max_attempts
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            Duration::from_millis(DEFAULT_INTERVAL_MS),
        )
    }
}
