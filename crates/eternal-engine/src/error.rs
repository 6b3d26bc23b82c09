//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup and serving.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: eternal_core::config::ConfigError,
    },

    /// The checkpoint store could not be opened.
    #[error("checkpoint store error: {source}")]
    Checkpoint {
        /// The underlying store error.
        #[from]
        source: eternal_core::checkpoint::CheckpointError,
    },

    /// The autostart run could not be started.
    #[error("registry error: {source}")]
    Registry {
        /// The underlying registry error.
        #[from]
        source: eternal_core::registry::RegistryError,
    },

    /// The gateway failed to bind or serve.
    #[error("gateway error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: eternal_observer::ServerError,
    },
}
