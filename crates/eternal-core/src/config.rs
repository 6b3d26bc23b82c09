//! Configuration loading and typed config structures for the Eternal Life
//! simulation.
//!
//! The canonical configuration lives in `eternal-config.yaml` at the
//! project root. Every field has a default (512x512 board, 250 ms ticks,
//! 5000 steps, checkpoint every 50 steps), so an empty file or no file at
//! all yields a working setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use eternal_grid::SeedConfig;
use serde::Deserialize;

/// Longest accepted tick interval (one day).
const MAX_TICK_INTERVAL_MS: u64 = 86_400_000;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but describes an unusable setup.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Board dimensions.
    #[serde(default)]
    pub board: BoardConfig,

    /// Per-run cadence and bounds.
    #[serde(default)]
    pub run: RunConfig,

    /// Initial board seeding.
    #[serde(default)]
    pub seed: SeedConfig,

    /// Splatter command defaults.
    #[serde(default)]
    pub splatter: SplatterConfig,

    /// Checkpoint store selection.
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Observer stream settings.
    #[serde(default)]
    pub stream: StreamConfig,

    /// HTTP gateway settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `ETERNAL_PORT` overrides `server.port`
    /// - `ETERNAL_CHECKPOINT_DIR` overrides `checkpoint.directory`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, apply environment
    /// overrides, and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Override selected values with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Some(port) = std::env::var("ETERNAL_PORT")
            .ok()
            .and_then(|val| val.parse().ok())
        {
            self.server.port = port;
        }
        if let Ok(dir) = std::env::var("ETERNAL_CHECKPOINT_DIR") {
            self.checkpoint.directory = Some(PathBuf::from(dir));
        }
    }

    /// Reject configurations the controller cannot run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| {
            Err(ConfigError::Invalid {
                reason: reason.to_owned(),
            })
        };

        if self.board.rows == 0 || self.board.cols == 0 {
            return invalid("board dimensions must be non-zero");
        }
        if self.board.rows.checked_mul(self.board.cols).is_none() {
            return invalid("board dimensions overflow");
        }
        if self.run.checkpoint_interval == 0 {
            return invalid("run.checkpoint_interval must be at least 1");
        }
        if self.run.tick_interval_ms > MAX_TICK_INTERVAL_MS {
            return invalid("run.tick_interval_ms must not exceed one day");
        }
        if !(0.0..=1.0).contains(&self.seed.density) {
            return invalid("seed.density must be within [0, 1]");
        }
        if self.seed.min_clusters > self.seed.max_clusters
            || self.seed.min_radius > self.seed.max_radius
        {
            return invalid("seed min values must not exceed max values");
        }
        if self.stream.broadcast_capacity == 0 || self.stream.command_capacity == 0 {
            return invalid("stream capacities must be non-zero");
        }
        Ok(())
    }
}

/// Board dimensions, fixed for a run's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BoardConfig {
    /// Number of rows.
    #[serde(default = "default_rows")]
    pub rows: usize,

    /// Number of columns.
    #[serde(default = "default_cols")]
    pub cols: usize,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            rows: default_rows(),
            cols: default_cols(),
        }
    }
}

/// Cadence and bounds applied to every run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunConfig {
    /// Real-time milliseconds between generations.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Step at which a run terminates (0 = unlimited).
    #[serde(default = "default_max_steps")]
    pub max_steps: u64,

    /// Checkpoint and restart the controller every N steps.
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u64,

    /// Whether new runs start paused.
    #[serde(default)]
    pub start_paused: bool,

    /// Fixed random seed for reproducible runs (OS entropy when absent).
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

impl RunConfig {
    /// The tick interval as a [`Duration`].
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            max_steps: default_max_steps(),
            checkpoint_interval: default_checkpoint_interval(),
            start_paused: false,
            rng_seed: None,
        }
    }
}

/// Splatter command defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SplatterConfig {
    /// Radius used when a splatter signal omits `size`.
    #[serde(default = "default_splatter_radius")]
    pub default_radius: u32,
}

impl Default for SplatterConfig {
    fn default() -> Self {
        Self {
            default_radius: default_splatter_radius(),
        }
    }
}

/// Checkpoint store selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CheckpointConfig {
    /// Directory for file-backed checkpoints. In-memory when absent.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

/// Observer stream settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamConfig {
    /// Seconds between SSE `ping` events.
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    /// Deltas buffered per run before a slow subscriber is cut off.
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,

    /// Commands buffered per run before senders wait.
    #[serde(default = "default_command_capacity")]
    pub command_capacity: usize,
}

impl StreamConfig {
    /// The ping interval as a [`Duration`].
    pub const fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: default_ping_interval_secs(),
            broadcast_capacity: default_broadcast_capacity(),
            command_capacity: default_command_capacity(),
        }
    }
}

/// HTTP gateway settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// The host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// The TCP port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Start one run as soon as the server is up.
    #[serde(default)]
    pub autostart: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            autostart: false,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error), used when `RUST_LOG`
    /// is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

const fn default_rows() -> usize {
    512
}

const fn default_cols() -> usize {
    512
}

const fn default_tick_interval_ms() -> u64 {
    250
}

const fn default_max_steps() -> u64 {
    5000
}

const fn default_checkpoint_interval() -> u64 {
    50
}

const fn default_splatter_radius() -> u32 {
    5
}

const fn default_ping_interval_secs() -> u64 {
    10
}

const fn default_broadcast_capacity() -> usize {
    256
}

const fn default_command_capacity() -> usize {
    64
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    String::from("info")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert_eq!(config.board.rows, 512);
        assert_eq!(config.board.cols, 512);
        assert_eq!(config.run.tick_interval(), Duration::from_millis(250));
        assert_eq!(config.run.max_steps, 5000);
        assert_eq!(config.run.checkpoint_interval, 50);
        assert_eq!(config.splatter.default_radius, 5);
        assert_eq!(config.stream.ping_interval(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
board:
  rows: 64
  cols: 32

run:
  tick_interval_ms: 100
  max_steps: 1000
  checkpoint_interval: 120
  start_paused: true
  rng_seed: 7

seed:
  min_clusters: 2
  max_clusters: 3
  density: 0.5

splatter:
  default_radius: 8

checkpoint:
  directory: "/var/lib/eternal"

stream:
  ping_interval_secs: 5
  broadcast_capacity: 32

server:
  host: "127.0.0.1"
  autostart: true

logging:
  level: "debug"
  json: true
"#;

        let config = SimulationConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.unwrap_or_default();
        assert_eq!(config.board.rows, 64);
        assert_eq!(config.board.cols, 32);
        assert_eq!(config.run.rng_seed, Some(7));
        assert!(config.run.start_paused);
        assert_eq!(config.seed.max_clusters, 3);
        assert_eq!(config.seed.min_radius, 2);
        assert_eq!(config.splatter.default_radius, 8);
        assert_eq!(config.stream.command_capacity, 64);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.server.autostart);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn empty_yaml_uses_defaults() {
        let config = SimulationConfig::parse("{}");
        assert!(config.is_ok());
        assert_eq!(config.unwrap_or_default().run.max_steps, 5000);
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        let result = SimulationConfig::parse("board:\n  rows: 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn zero_checkpoint_interval_is_rejected() {
        let result = SimulationConfig::parse("run:\n  checkpoint_interval: 0\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn out_of_range_density_is_rejected() {
        let result = SimulationConfig::parse("seed:\n  density: 1.5\n");
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        let result = SimulationConfig::parse("board: [unterminated");
        assert!(matches!(result, Err(ConfigError::Yaml { .. })));
    }
}
