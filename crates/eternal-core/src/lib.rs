//! Simulation control plane for the Eternal Life simulation.
//!
//! This crate owns the event-driven controller that advances one run's
//! board, applies external commands, publishes deltas, and bounds its own
//! history by checkpointing and restarting.
//!
//! # Modules
//!
//! - [`broadcast`] -- Per-run fan-out of [`StateDelta`]s to subscribers.
//! - [`checkpoint`] -- [`CheckpointStore`] trait with in-memory and
//!   directory-backed stores.
//! - [`command`] -- Commands accepted by a run and why runs end.
//! - [`config`] -- Configuration loading from `eternal-config.yaml` into
//!   strongly-typed structs.
//! - [`controller`] -- The single-writer state machine of one instance.
//! - [`registry`] -- Owned registry of active runs.
//! - [`runner`] -- Drives successive instances of a run to completion.
//!
//! [`StateDelta`]: eternal_types::StateDelta
//! [`CheckpointStore`]: checkpoint::CheckpointStore

pub mod broadcast;
pub mod checkpoint;
pub mod command;
pub mod config;
pub mod controller;
pub mod registry;
pub mod runner;
