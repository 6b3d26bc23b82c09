//! Per-run fan-out of state deltas to observers.
//!
//! Each registered run owns one bounded [`tokio::sync::broadcast`] channel.
//! Publishing never blocks the controller: with no receivers the delta is
//! simply dropped. HTTP handlers subscribe and unsubscribe concurrently with
//! the controller's publishes, so the run-to-sender map sits behind a
//! read/write lock that is never held across an await point.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use eternal_types::{RunId, StateDelta};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Registry of per-run delta channels.
#[derive(Debug)]
pub struct Broadcaster {
    capacity: usize,
    channels: RwLock<HashMap<RunId, broadcast::Sender<StateDelta>>>,
}

impl Broadcaster {
    /// Create a broadcaster whose channels buffer up to `capacity` deltas
    /// per subscriber.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Open the channel for a run. Registering an already-registered run
    /// keeps the existing channel so open subscriptions survive.
    pub fn register(&self, run_id: &RunId) {
        let mut channels = self
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(run_id.clone())
            .or_insert_with(|| broadcast::channel(self.capacity).0);
    }

    /// Send a delta to every current subscriber of its run.
    ///
    /// Returns how many subscribers received it; zero (nobody listening, or
    /// the run is not registered) is not an error.
    pub fn publish(&self, delta: StateDelta) -> usize {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        channels
            .get(&delta.id)
            .map_or(0, |tx| tx.send(delta).unwrap_or(0))
    }

    /// Attach a new receiver to a run's channel, or `None` if the run is
    /// not registered.
    pub fn subscribe(&self, run_id: &RunId) -> Option<broadcast::Receiver<StateDelta>> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(run_id)
            .map(broadcast::Sender::subscribe)
    }

    /// Remove a run's channel. Open receivers drain what is buffered and
    /// then observe a closed channel.
    pub fn teardown(&self, run_id: &RunId) {
        let removed = self
            .channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(run_id);
        if removed.is_some() {
            debug!(run_id = %run_id, "Broadcast channel torn down");
        }
    }

    /// Whether a run currently has an open channel.
    pub fn is_registered(&self, run_id: &RunId) -> bool {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(run_id)
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// One observer's view of a run: a bootstrap delta followed by live deltas.
#[derive(Debug)]
pub struct Subscription {
    run_id: RunId,
    bootstrap: Option<StateDelta>,
    receiver: broadcast::Receiver<StateDelta>,
    finished: bool,
}

impl Subscription {
    /// Pair a board-from-nothing delta with a receiver created at the same
    /// observed state.
    pub fn new(bootstrap: StateDelta, receiver: broadcast::Receiver<StateDelta>) -> Self {
        Self {
            run_id: bootstrap.id.clone(),
            bootstrap: Some(bootstrap),
            receiver,
            finished: false,
        }
    }

    /// The run being observed.
    pub const fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Next delta for this observer.
    ///
    /// Returns `None` once the run's channel is torn down. A subscriber that
    /// falls more than the channel capacity behind has missed deltas it can
    /// never recover, so its subscription ends as well and the client has
    /// to subscribe again for a fresh bootstrap.
    pub async fn next(&mut self) -> Option<StateDelta> {
        if let Some(bootstrap) = self.bootstrap.take() {
            return Some(bootstrap);
        }
        if self.finished {
            return None;
        }
        match self.receiver.recv().await {
            Ok(delta) => Some(delta),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(run_id = %self.run_id, skipped, "Subscriber lagged, ending subscription");
                self.finished = true;
                None
            }
            Err(broadcast::error::RecvError::Closed) => {
                self.finished = true;
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use eternal_types::Cell;

    use super::*;

    fn delta(run: &str, step: u64, flipped: Vec<Cell>) -> StateDelta {
        StateDelta {
            id: RunId::from(run),
            step,
            paused: false,
            tick_time: Duration::from_millis(10),
            flipped,
        }
    }

    #[test]
    fn publish_without_subscribers_is_dropped() {
        let broadcaster = Broadcaster::new(4);
        let run = RunId::from("a");
        broadcaster.register(&run);
        assert_eq!(broadcaster.publish(delta("a", 1, vec![])), 0);
        assert_eq!(broadcaster.publish(delta("unknown", 1, vec![])), 0);
    }

    #[test]
    fn unknown_run_cannot_be_subscribed() {
        let broadcaster = Broadcaster::new(4);
        assert!(broadcaster.subscribe(&RunId::from("nope")).is_none());
    }

    #[tokio::test]
    async fn subscription_yields_bootstrap_then_live_deltas() {
        let broadcaster = Broadcaster::new(4);
        let run = RunId::from("a");
        broadcaster.register(&run);

        let receiver = broadcaster.subscribe(&run).unwrap();
        let mut sub = Subscription::new(delta("a", 3, vec![Cell(0, 0)]), receiver);
        assert_eq!(broadcaster.publish(delta("a", 4, vec![Cell(1, 1)])), 1);

        assert_eq!(sub.next().await.unwrap().step, 3);
        assert_eq!(sub.next().await.unwrap().flipped, vec![Cell(1, 1)]);
    }

    #[tokio::test]
    async fn teardown_closes_open_subscriptions() {
        let broadcaster = Broadcaster::new(4);
        let run = RunId::from("a");
        broadcaster.register(&run);
        let receiver = broadcaster.subscribe(&run).unwrap();
        let mut sub = Subscription::new(delta("a", 0, vec![]), receiver);

        broadcaster.publish(delta("a", 1, vec![]));
        broadcaster.teardown(&run);
        assert!(!broadcaster.is_registered(&run));

        assert_eq!(sub.next().await.unwrap().step, 0);
        assert_eq!(sub.next().await.unwrap().step, 1);
        assert!(sub.next().await.is_none());
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn lagging_subscriber_is_cut_off() {
        let broadcaster = Broadcaster::new(2);
        let run = RunId::from("a");
        broadcaster.register(&run);
        let receiver = broadcaster.subscribe(&run).unwrap();
        let mut sub = Subscription::new(delta("a", 0, vec![]), receiver);

        for step in 1..=5 {
            broadcaster.publish(delta("a", step, vec![]));
        }

        assert_eq!(sub.next().await.unwrap().step, 0);
        assert!(sub.next().await.is_none());
        // Still registered: only this observer was dropped.
        assert!(broadcaster.is_registered(&run));
    }

    #[test]
    fn re_registering_keeps_existing_channel() {
        let broadcaster = Broadcaster::new(4);
        let run = RunId::from("a");
        broadcaster.register(&run);
        let _receiver = broadcaster.subscribe(&run).unwrap();
        broadcaster.register(&run);
        assert_eq!(broadcaster.publish(delta("a", 1, vec![])), 1);
    }
}
