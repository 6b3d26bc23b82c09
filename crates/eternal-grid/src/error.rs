//! Error types for the `eternal-grid` crate.
//!
//! Dimension mismatches are precondition violations and panic instead of
//! appearing here; only conditions caused by external input are errors.

/// Errors that can occur while mutating a board.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    /// The splatter origin lies outside the board.
    #[error("origin ({row}, {col}) is outside the {rows}x{cols} board")]
    OriginOutOfBounds {
        /// Requested origin row.
        row: i64,
        /// Requested origin column.
        col: i64,
        /// Board row count.
        rows: usize,
        /// Board column count.
        cols: usize,
    },

    /// An activation probability outside `[0, 1]`.
    #[error("density {0} is not a probability")]
    InvalidDensity(f64),

    /// A seeding range whose lower bound exceeds its upper bound.
    #[error("invalid seed range for {field}: {min} > {max}")]
    InvalidRange {
        /// Which setting is inverted.
        field: &'static str,
        /// Lower bound.
        min: u32,
        /// Upper bound.
        max: u32,
    },
}
