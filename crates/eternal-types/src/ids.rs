//! Identifier types for runs and checkpoints.
//!
//! A [`RunId`] is an opaque string so that both generated ids and
//! well-known fixed ids can name a run. A [`CheckpointRef`] is a UUID
//! handed out by a checkpoint store and consumed by the next controller
//! instance of the run.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Identifier of one logical run, stable across checkpoint restarts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RunId(String);

impl RunId {
    /// Generate a fresh run identifier (UUID v7, time-ordered).
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RunId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RunId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RunId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

/// Opaque handle to a board snapshot held by a checkpoint store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CheckpointRef(pub Uuid);

impl CheckpointRef {
    /// Create a new reference using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for CheckpointRef {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for CheckpointRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CheckpointRef {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}
