//! HTTP gateway for the Eternal Life simulation.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **Run lifecycle** (`POST /start`, `POST /stop/{runId}`, `GET /runs`)
//! - **Signals** (`POST /signal/{runId}/{signalName}`) for `splatter` and
//!   `toggleStatus`
//! - **State stream** (`GET /state/{runId}`), Server-Sent Events carrying a
//!   bootstrap board followed by incremental deltas
//! - **Board poll** (`GET /board/{runId}`) for clients that do not stream
//!
//! # Architecture
//!
//! Handlers never touch run state directly. Every request becomes a
//! command on the addressed run's channel via the shared
//! [`RunRegistry`], and the run's controller applies it in order with its
//! own ticks.
//!
//! [`RunRegistry`]: eternal_core::registry::RunRegistry

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod sse;
pub mod state;

// Re-export primary types for convenience.
pub use router::build_router;
pub use server::{ServerError, start_server};
pub use state::AppState;
