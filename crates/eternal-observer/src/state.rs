//! Shared application state for the gateway.
//!
//! [`AppState`] holds the run registry that every handler talks to. The
//! registry owns all run state; handlers never touch a board directly.

use std::sync::Arc;
use std::time::Duration;

use eternal_core::registry::RunRegistry;

/// Default interval between SSE `ping` events.
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(10);

/// Shared state passed to all Axum handlers via [`axum::extract::State`].
pub struct AppState {
    /// Active runs.
    pub registry: Arc<RunRegistry>,
    /// Interval between `ping` events on state streams.
    pub ping_interval: Duration,
}

impl AppState {
    /// Create state around a registry with the default ping interval.
    pub const fn new(registry: Arc<RunRegistry>) -> Self {
        Self {
            registry,
            ping_interval: DEFAULT_PING_INTERVAL,
        }
    }

    /// Override the ping interval. A zero interval is raised to one
    /// second.
    #[must_use]
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval.max(Duration::from_secs(1));
        self
    }
}
