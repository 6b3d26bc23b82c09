//! Automaton rule, board diffing, and splatter generation for the Eternal
//! Life simulation.
//!
//! This crate holds the stateless parts of the simulation. The controller
//! in `eternal-core` owns the board and calls into these functions.
//!
//! # Modules
//!
//! - [`engine`] -- Next-generation computation and flipped-cell diffs
//! - [`splatter`] -- Random clusters, initial seeding, and live splatters
//! - [`error`] -- Error types for board mutation

pub mod engine;
pub mod error;
pub mod splatter;

pub use engine::{diff_flipped, diff_from_empty, next_generation};
pub use error::GridError;
pub use splatter::{SeedConfig, random_cluster, seed_board, splatter};
