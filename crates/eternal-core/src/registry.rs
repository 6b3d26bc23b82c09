//! Registry of active runs.
//!
//! A [`RunRegistry`] is created once at server start and owns the command
//! senders of every active run. Each run executes on its own spawned task
//! and removes itself from the registry when it ends, so a lookup that
//! misses means "never existed or already terminated".

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use eternal_types::{RunId, SplatterSignal, StateDelta};
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::broadcast::{Broadcaster, Subscription};
use crate::checkpoint::CheckpointStore;
use crate::command::RunCommand;
use crate::config::SimulationConfig;
use crate::controller::{RunDeps, RunSettings};
use crate::runner::{RunOutcome, RunRequest, RunnerError, log_run_end, run_to_completion};

/// Errors returned when addressing a run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No active run has this id.
    #[error("run not found: {0}")]
    NotFound(RunId),

    /// The run ended while the request was in flight.
    #[error("run {0} has terminated")]
    Gone(RunId),

    /// A run with this id is already active.
    #[error("run {0} is already running")]
    AlreadyRunning(RunId),
}

/// Per-run overrides for [`RunRegistry::start`]. Unset fields use the
/// configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOptions {
    /// Fixed id instead of a generated one.
    pub run_id: Option<RunId>,
    /// Tick interval override.
    pub tick_interval: Option<Duration>,
    /// Step limit override (0 = unlimited).
    pub max_steps: Option<u64>,
    /// Start paused.
    pub paused: Option<bool>,
}

/// A run that has just been started.
#[derive(Debug)]
pub struct StartedRun {
    /// The run's id.
    pub run_id: RunId,
    /// Resolves when the run terminates.
    pub completion: JoinHandle<Result<RunOutcome, RunnerError>>,
}

/// Owner of every active run's command channel.
pub struct RunRegistry {
    runs: Arc<RwLock<HashMap<RunId, mpsc::Sender<RunCommand>>>>,
    settings: RunSettings,
    deps: RunDeps,
    tick_interval: Duration,
    start_paused: bool,
    command_capacity: usize,
}

impl RunRegistry {
    /// Build a registry from configuration and a checkpoint store.
    pub fn new(config: &SimulationConfig, store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            runs: Arc::new(RwLock::new(HashMap::new())),
            settings: RunSettings::from_config(config),
            deps: RunDeps {
                store,
                broadcaster: Arc::new(Broadcaster::new(config.stream.broadcast_capacity)),
            },
            tick_interval: config.run.tick_interval(),
            start_paused: config.run.start_paused,
            command_capacity: config.stream.command_capacity.max(1),
        }
    }

    /// Start a new run on its own task.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyRunning`] if `options.run_id` names
    /// an active run.
    pub async fn start(&self, options: StartOptions) -> Result<StartedRun, RegistryError> {
        let run_id = options.run_id.unwrap_or_else(RunId::generate);
        let tick_interval = options.tick_interval.unwrap_or(self.tick_interval);
        let paused = options.paused.unwrap_or(self.start_paused);
        let mut settings = self.settings.clone();
        if let Some(max_steps) = options.max_steps {
            settings.max_steps = max_steps;
        }

        let (tx, rx) = mpsc::channel(self.command_capacity);
        {
            let mut runs = self.runs.write().await;
            if runs.contains_key(&run_id) {
                return Err(RegistryError::AlreadyRunning(run_id));
            }
            runs.insert(run_id.clone(), tx);
        }

        let request = RunRequest::fresh(run_id.clone(), tick_interval, paused);
        let deps = self.deps.clone();
        let runs = Arc::clone(&self.runs);
        let id = run_id.clone();
        let completion = tokio::spawn(async move {
            let result = run_to_completion(request, &settings, &deps, rx).await;
            runs.write().await.remove(&id);
            match &result {
                Ok(outcome) => log_run_end(outcome),
                Err(e) => error!(run_id = %id, error = %e, "Run failed"),
            }
            result
        });

        info!(
            run_id = %run_id,
            tick_interval_ms = tick_interval.as_millis(),
            paused,
            "Run registered"
        );
        Ok(StartedRun { run_id, completion })
    }

    /// Deliver a command to a run.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for unknown runs and
    /// [`RegistryError::Gone`] if the run ended before accepting it.
    pub async fn send(&self, run_id: &RunId, command: RunCommand) -> Result<(), RegistryError> {
        let sender = self
            .runs
            .read()
            .await
            .get(run_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(run_id.clone()))?;
        if sender.send(command).await.is_err() {
            return Err(RegistryError::Gone(run_id.clone()));
        }
        Ok(())
    }

    /// Flip a run's paused flag.
    ///
    /// # Errors
    ///
    /// See [`RunRegistry::send`].
    pub async fn toggle(&self, run_id: &RunId) -> Result<(), RegistryError> {
        self.send(run_id, RunCommand::Toggle).await
    }

    /// Splatter cells on a run's board.
    ///
    /// # Errors
    ///
    /// See [`RunRegistry::send`].
    pub async fn splatter(
        &self,
        run_id: &RunId,
        signal: SplatterSignal,
    ) -> Result<(), RegistryError> {
        self.send(run_id, RunCommand::Splatter(signal)).await
    }

    /// Open a subscription: the current board first, then live deltas.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for unknown runs and
    /// [`RegistryError::Gone`] if the run ended before replying.
    pub async fn subscribe(&self, run_id: &RunId) -> Result<Subscription, RegistryError> {
        let (command, reply) = RunCommand::subscribe();
        self.send(run_id, command).await?;
        reply.await.map_err(|closed| {
            debug!(run_id = %run_id, error = %closed, "Run ended before replying");
            RegistryError::Gone(run_id.clone())
        })
    }

    /// Current state of a run as a board-from-nothing delta.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for unknown runs and
    /// [`RegistryError::Gone`] if the run ended before replying.
    pub async fn query(&self, run_id: &RunId) -> Result<StateDelta, RegistryError> {
        let (command, reply) = RunCommand::query();
        self.send(run_id, command).await?;
        reply.await.map_err(|closed| {
            debug!(run_id = %run_id, error = %closed, "Run ended before replying");
            RegistryError::Gone(run_id.clone())
        })
    }

    /// Ask a run to terminate.
    ///
    /// # Errors
    ///
    /// See [`RunRegistry::send`].
    pub async fn stop(&self, run_id: &RunId) -> Result<(), RegistryError> {
        self.send(run_id, RunCommand::Stop).await
    }

    /// Ask every active run to terminate. Returns how many accepted.
    pub async fn stop_all(&self) -> usize {
        let mut stopped: usize = 0;
        for run_id in self.run_ids().await {
            if self.stop(&run_id).await.is_ok() {
                stopped = stopped.saturating_add(1);
            }
        }
        stopped
    }

    /// Ids of every active run, sorted.
    pub async fn run_ids(&self) -> Vec<RunId> {
        let mut ids: Vec<RunId> = self.runs.read().await.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Whether a run is active.
    pub async fn contains(&self, run_id: &RunId) -> bool {
        self.runs.read().await.contains_key(run_id)
    }
}
