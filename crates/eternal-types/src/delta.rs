//! State deltas published to observers of a run.
//!
//! A [`StateDelta`] carries only the cells that flipped between two
//! consecutive observed boards, plus the run counters and flags. The one
//! exception is the bootstrap delta sent to a new subscriber, which flips
//! every live cell of the current board ("board from nothing").

use std::time::Duration;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::board::Cell;
use crate::ids::RunId;

/// Difference between two observed states of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct StateDelta {
    /// The run this delta belongs to.
    pub id: RunId,
    /// Generation counter after the change.
    pub step: u64,
    /// Whether the run is paused after the change.
    pub paused: bool,
    /// Tick cadence of the run, encoded as integer nanoseconds.
    #[serde(with = "duration_nanos")]
    #[ts(type = "number")]
    pub tick_time: Duration,
    /// Cells whose state changed, in row-major order.
    pub flipped: Vec<Cell>,
}

impl StateDelta {
    /// Whether the delta carries no cell changes (pause toggles, empty
    /// splatters).
    pub fn is_empty(&self) -> bool {
        self.flipped.is_empty()
    }
}

/// Serde adapter encoding a [`Duration`] as whole nanoseconds.
pub mod duration_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as a `u64` nanosecond count, saturating on overflow.
    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let nanos = u64::try_from(value.as_nanos()).unwrap_or(u64::MAX);
        serializer.serialize_u64(nanos)
    }

    /// Deserialize from a `u64` nanosecond count.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let nanos = u64::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos))
    }
}
