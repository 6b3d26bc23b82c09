//! Commands accepted by a running simulation and the reasons a run ends.
//!
//! Every external interaction with a run (gateway signals, subscriptions,
//! state queries, stop requests) arrives as a [`RunCommand`] on the run's
//! bounded command channel and is applied by the controller loop one at a
//! time.

use eternal_types::{SplatterSignal, StateDelta};
use serde::Serialize;
use tokio::sync::oneshot;

use crate::broadcast::Subscription;

/// A typed event delivered to the controller loop.
#[derive(Debug)]
pub enum RunCommand {
    /// Flip the paused flag.
    Toggle,
    /// Randomly activate cells around a point.
    Splatter(SplatterSignal),
    /// Open a subscription whose first delta is the current board.
    Subscribe(oneshot::Sender<Subscription>),
    /// Reply with the current state as a board-from-nothing delta.
    Query(oneshot::Sender<StateDelta>),
    /// Terminate the run.
    Stop,
}

impl RunCommand {
    /// Build a [`RunCommand::Subscribe`] together with its reply receiver.
    pub fn subscribe() -> (Self, oneshot::Receiver<Subscription>) {
        let (tx, rx) = oneshot::channel();
        (Self::Subscribe(tx), rx)
    }

    /// Build a [`RunCommand::Query`] together with its reply receiver.
    pub fn query() -> (Self, oneshot::Receiver<StateDelta>) {
        let (tx, rx) = oneshot::channel();
        (Self::Query(tx), rx)
    }

    /// Short name used in log fields.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Toggle => "toggle",
            Self::Splatter(_) => "splatter",
            Self::Subscribe(_) => "subscribe",
            Self::Query(_) => "query",
            Self::Stop => "stop",
        }
    }
}

/// Why a run terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The configured step limit was reached.
    MaxStepsReached,
    /// An explicit stop was requested.
    Stopped,
    /// Every command handle was dropped, so nobody can steer the run.
    Detached,
}

impl core::fmt::Display for EndReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let label = match self {
            Self::MaxStepsReached => "max steps reached",
            Self::Stopped => "stopped",
            Self::Detached => "detached",
        };
        f.write_str(label)
    }
}
