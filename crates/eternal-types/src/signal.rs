//! External signals accepted by a running simulation.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Payload of a `splatter` signal.
///
/// `x` is the row and `y` the column of the origin. The coordinates are
/// signed so that off-board requests reach the controller and are rejected
/// there instead of failing to decode. A missing `size` falls back to the
/// configured default radius; a missing `count` activates half of the
/// candidate cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SplatterSignal {
    /// Origin row.
    pub x: i64,
    /// Origin column.
    pub y: i64,
    /// Splatter radius (Euclidean, in cells).
    #[serde(default)]
    #[ts(optional)]
    pub size: Option<u32>,
    /// Number of cells to activate.
    #[serde(default)]
    #[ts(optional)]
    pub count: Option<usize>,
}

/// Names of the signals exposed on `/signal/{runId}/{signalName}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalName {
    /// Randomly activate cells around a point.
    Splatter,
    /// Flip the paused flag.
    ToggleStatus,
}

/// Returned when a signal name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown signal: {0}")]
pub struct UnknownSignal(pub String);

impl SignalName {
    /// The path segment naming this signal.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Splatter => "splatter",
            Self::ToggleStatus => "toggleStatus",
        }
    }
}

impl core::str::FromStr for SignalName {
    type Err = UnknownSignal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "splatter" => Ok(Self::Splatter),
            "toggleStatus" => Ok(Self::ToggleStatus),
            other => Err(UnknownSignal(other.to_owned())),
        }
    }
}

impl core::fmt::Display for SignalName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
