//! Server-Sent Events stream of a run's state deltas.
//!
//! Clients connect to `GET /state/{runId}` and receive:
//!
//! 1. an `event: connection_established` frame whose data is the current
//!    board as a board-from-nothing delta
//! 2. one unnamed `data:` frame per published [`StateDelta`]
//! 3. an `event: ping` frame every ping interval
//!
//! The stream ends when the run terminates or when the subscriber falls
//! too far behind; the client reconnects to get a fresh bootstrap. When
//! the client disconnects, Axum drops the stream and with it the
//! subscription.
//!
//! [`StateDelta`]: eternal_types::StateDelta

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use eternal_core::broadcast::Subscription;
use eternal_types::RunId;
use futures::stream::{self, Stream};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, warn};

use crate::error::ObserverError;
use crate::state::AppState;

/// Open a state stream for a run.
///
/// # Route
///
/// `GET /state/{runId}`
///
/// # Errors
///
/// Returns [`ObserverError::NotFound`] if the run does not exist or has
/// already terminated.
pub async fn stream_state(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ObserverError> {
    let run_id = RunId::from(run_id);
    let subscription = state.registry.subscribe(&run_id).await?;
    debug!(run_id = %run_id, "State stream opened");

    let now = Instant::now();
    let first_ping = now.checked_add(state.ping_interval).unwrap_or(now);
    let mut ping = interval_at(first_ping, state.ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let feed = StreamFeed {
        subscription,
        ping,
        established: false,
    };
    Ok(Sse::new(stream::unfold(feed, StreamFeed::next_event)))
}

/// Per-connection stream state threaded through [`stream::unfold`].
struct StreamFeed {
    subscription: Subscription,
    ping: Interval,
    established: bool,
}

impl StreamFeed {
    async fn next_event(mut self) -> Option<(Result<Event, Infallible>, Self)> {
        loop {
            tokio::select! {
                delta = self.subscription.next() => {
                    let Some(delta) = delta else {
                        debug!(run_id = %self.subscription.run_id(), "State stream closed");
                        return None;
                    };
                    let json = match serde_json::to_string(&delta) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!(run_id = %delta.id, error = %e, "Failed to serialize delta");
                            continue;
                        }
                    };
                    let event = if self.established {
                        Event::default()
                    } else {
                        self.established = true;
                        Event::default().event("connection_established")
                    };
                    return Some((Ok(event.data(json)), self));
                }
                _ = self.ping.tick() => {
                    return Some((Ok(Event::default().event("ping")), self));
                }
            }
        }
    }
}
