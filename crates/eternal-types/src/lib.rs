//! Shared type definitions for the Eternal Life simulation.
//!
//! This crate is the single source of truth for the data model shared by
//! the grid engine, the simulation controller, and the gateway. Wire types
//! flow downstream to `TypeScript` via `ts-rs` for the canvas client.
//!
//! # Modules
//!
//! - [`board`] -- The boolean cell grid and `(row, col)` coordinates
//! - [`delta`] -- State deltas published to observers
//! - [`ids`] -- Run identifiers and checkpoint references
//! - [`signal`] -- External signal names and payloads

pub mod board;
pub mod delta;
pub mod ids;
pub mod signal;

// Re-export all public types at crate root for convenience.
pub use board::{Board, BoardError, Cell};
pub use delta::StateDelta;
pub use ids::{CheckpointRef, RunId};
pub use signal::{SignalName, SplatterSignal, UnknownSignal};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for the canvas client.

    #[test]
    fn export_bindings() {
        // ts-rs writes the bindings into `bindings/` relative to the
        // crate root when `export_all` runs.
        use ts_rs::TS;

        let _ = crate::ids::RunId::export_all();
        let _ = crate::board::Cell::export_all();
        let _ = crate::delta::StateDelta::export_all();
        let _ = crate::signal::SplatterSignal::export_all();
    }
}
