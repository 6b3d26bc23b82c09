//! Run supervisor: drives successive controller instances of one run.
//!
//! This module provides [`run_to_completion`], which owns a run from its
//! first instance to its termination:
//!
//! - **Fresh start or resume**: the first instance seeds a board or loads
//!   the checkpoint named in the [`RunRequest`]
//! - **Checkpoint/restart**: each time an instance checkpoints, a successor
//!   is initialized from the stored snapshot with the same run id
//! - **Teardown**: the run's broadcast channel is removed on every exit
//!   path, so open streams close gracefully
//!
//! The command receiver outlives the instances, so commands queued while
//! one instance hands over are applied by the next.

use std::time::Duration;

use chrono::{DateTime, Utc};
use eternal_types::{CheckpointRef, RunId};
use tokio::sync::mpsc;
use tracing::info;

use crate::command::{EndReason, RunCommand};
use crate::controller::{
    ControllerError, ControllerInput, InstanceExit, RunDeps, RunSettings, SimulationController,
};

/// Errors that end a run abnormally.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A controller instance hit a fatal error.
    #[error("run {run_id} failed in instance {instance}: {source}")]
    Controller {
        /// The failed run.
        run_id: RunId,
        /// Which instance (1-based) failed.
        instance: u32,
        /// The underlying controller error.
        #[source]
        source: ControllerError,
    },
}

/// How to start a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Identity of the run.
    pub run_id: RunId,
    /// Real-time interval between generations.
    pub tick_interval: Duration,
    /// Whether the run starts paused.
    pub paused: bool,
    /// Resume from a stored board instead of seeding one.
    pub resume_from: Option<CheckpointRef>,
    /// Step counter to resume at.
    pub step: u64,
}

impl RunRequest {
    /// A request for a brand-new run at step 0 with a seeded board.
    pub const fn fresh(run_id: RunId, tick_interval: Duration, paused: bool) -> Self {
        Self {
            run_id,
            tick_interval,
            paused,
            resume_from: None,
            step: 0,
        }
    }
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// The run that ended.
    pub run_id: RunId,
    /// Why it ended.
    pub end_reason: EndReason,
    /// Step counter at termination.
    pub final_step: u64,
    /// Number of controller instances the run went through.
    pub instances: u32,
    /// When the first instance started.
    pub started_at: DateTime<Utc>,
    /// When the run terminated.
    pub ended_at: DateTime<Utc>,
}

/// Drive a run until it terminates.
///
/// Registers the run's broadcast channel, then initializes and runs
/// controller instances back to back, feeding each checkpoint into the
/// next. The channel is torn down whether the run ends normally or fails.
///
/// # Errors
///
/// Returns [`RunnerError::Controller`] if an instance fails fatally
/// (checkpoint store failure, step overflow).
pub async fn run_to_completion(
    request: RunRequest,
    settings: &RunSettings,
    deps: &RunDeps,
    mut commands: mpsc::Receiver<RunCommand>,
) -> Result<RunOutcome, RunnerError> {
    let run_id = request.run_id.clone();
    deps.broadcaster.register(&run_id);
    info!(
        run_id = %run_id,
        step = request.step,
        resumed = request.resume_from.is_some(),
        tick_interval_ms = request.tick_interval.as_millis(),
        max_steps = settings.max_steps,
        "Run starting"
    );

    let result = drive(request, settings, deps, &mut commands).await;
    deps.broadcaster.teardown(&run_id);
    result
}

async fn drive(
    request: RunRequest,
    settings: &RunSettings,
    deps: &RunDeps,
    commands: &mut mpsc::Receiver<RunCommand>,
) -> Result<RunOutcome, RunnerError> {
    let started_at = Utc::now();
    let run_id = request.run_id.clone();
    let mut input = ControllerInput {
        run_id: request.run_id,
        checkpoint: request.resume_from,
        step: request.step,
        tick_interval: request.tick_interval,
        paused: request.paused,
    };
    let mut instances: u32 = 0;

    loop {
        instances = instances.saturating_add(1);
        let failed = |source| RunnerError::Controller {
            run_id: run_id.clone(),
            instance: instances,
            source,
        };

        let controller = SimulationController::initialize(input, settings, deps).map_err(failed)?;
        match controller.run(commands).await.map_err(failed)? {
            InstanceExit::Checkpointed(next) => input = next,
            InstanceExit::Terminated(termination) => {
                return Ok(RunOutcome {
                    run_id,
                    end_reason: termination.reason,
                    final_step: termination.step,
                    instances,
                    started_at,
                    ended_at: Utc::now(),
                });
            }
        }
    }
}

/// Log the end of a run.
pub fn log_run_end(outcome: &RunOutcome) {
    let elapsed = outcome.ended_at.signed_duration_since(outcome.started_at);
    info!(
        run_id = %outcome.run_id,
        reason = %outcome.end_reason,
        final_step = outcome.final_step,
        instances = outcome.instances,
        elapsed_ms = elapsed.num_milliseconds(),
        "Run ended"
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use eternal_grid::{SeedConfig, next_generation};
    use eternal_types::{Board, SplatterSignal, StateDelta};
    use tokio::task::JoinHandle;

    use super::*;
    use crate::broadcast::{Broadcaster, Subscription};
    use crate::checkpoint::{CheckpointError, CheckpointStore, InMemoryCheckpointStore};

    fn settings(max_steps: u64, checkpoint_interval: u64) -> RunSettings {
        RunSettings {
            rows: 12,
            cols: 12,
            seed: SeedConfig::default(),
            max_steps,
            checkpoint_interval,
            splatter_radius: 5,
            rng_seed: Some(42),
        }
    }

    fn deps_with(store: Arc<dyn CheckpointStore>) -> RunDeps {
        RunDeps {
            store,
            broadcaster: Arc::new(Broadcaster::new(64)),
        }
    }

    fn launch(
        request: RunRequest,
        settings: RunSettings,
        deps: &RunDeps,
    ) -> (
        mpsc::Sender<RunCommand>,
        JoinHandle<Result<RunOutcome, RunnerError>>,
    ) {
        let (tx, rx) = mpsc::channel(16);
        let deps = deps.clone();
        let handle =
            tokio::spawn(async move { run_to_completion(request, &settings, &deps, rx).await });
        (tx, handle)
    }

    async fn subscribe(tx: &mpsc::Sender<RunCommand>) -> Subscription {
        let (command, reply) = RunCommand::subscribe();
        tx.send(command).await.unwrap();
        reply.await.unwrap()
    }

    fn apply_flips(board: &mut Board, delta: &StateDelta) {
        for cell in &delta.flipped {
            let alive = board.is_alive(cell.row(), cell.col());
            board.set(cell.row(), cell.col(), !alive).unwrap();
        }
    }

    #[tokio::test]
    async fn three_generations_then_the_stream_closes() {
        let deps = deps_with(Arc::new(InMemoryCheckpointStore::new()));
        let request = RunRequest::fresh(RunId::from("three"), Duration::ZERO, false);
        let (tx, handle) = launch(request, settings(3, 50), &deps);

        let mut sub = subscribe(&tx).await;
        assert_eq!(sub.next().await.unwrap().step, 0);

        let steps: Vec<u64> = [
            sub.next().await.unwrap(),
            sub.next().await.unwrap(),
            sub.next().await.unwrap(),
        ]
        .iter()
        .map(|delta| delta.step)
        .collect();
        assert_eq!(steps, vec![1, 2, 3]);
        assert!(sub.next().await.is_none());

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.end_reason, EndReason::MaxStepsReached);
        assert_eq!(outcome.final_step, 3);
        assert!(!deps.broadcaster.is_registered(&RunId::from("three")));
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_pauses_and_resumes_ticking() {
        let deps = deps_with(Arc::new(InMemoryCheckpointStore::new()));
        let request = RunRequest::fresh(RunId::from("toggle"), Duration::from_millis(100), false);
        let (tx, handle) = launch(request, settings(0, 1000), &deps);

        let mut sub = subscribe(&tx).await;
        assert_eq!(sub.next().await.unwrap().step, 0);
        assert_eq!(sub.next().await.unwrap().step, 1);

        tx.send(RunCommand::Toggle).await.unwrap();
        let paused = sub.next().await.unwrap();
        assert!(paused.paused);
        assert!(paused.is_empty());
        assert_eq!(paused.step, 1);

        // No generation advances while paused.
        let silent = tokio::time::timeout(Duration::from_secs(5), sub.next()).await;
        assert!(silent.is_err());

        tx.send(RunCommand::Toggle).await.unwrap();
        let resumed = sub.next().await.unwrap();
        assert!(!resumed.paused);
        assert!(resumed.is_empty());
        assert_eq!(resumed.step, 1);
        assert_eq!(sub.next().await.unwrap().step, 2);

        tx.send(RunCommand::Stop).await.unwrap();
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.end_reason, EndReason::Stopped);
    }

    #[tokio::test]
    async fn radius_zero_splatter_flips_only_the_origin() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let reference = store.put(&Board::new(12, 12)).unwrap();
        let deps = deps_with(store);

        let mut request = RunRequest::fresh(RunId::from("splat"), Duration::ZERO, true);
        request.resume_from = Some(reference);
        let (tx, handle) = launch(request, settings(0, 50), &deps);

        let mut sub = subscribe(&tx).await;
        assert!(sub.next().await.unwrap().is_empty());

        tx.send(RunCommand::Splatter(SplatterSignal {
            x: 5,
            y: 5,
            size: Some(0),
            count: None,
        }))
        .await
        .unwrap();
        let delta = sub.next().await.unwrap();
        assert_eq!(
            serde_json::to_value(&delta.flipped).unwrap(),
            serde_json::json!([[5, 5]])
        );
        assert_eq!(delta.step, 0);

        tx.send(RunCommand::Stop).await.unwrap();
        assert_eq!(handle.await.unwrap().unwrap().final_step, 0);
    }

    #[tokio::test]
    async fn checkpoint_restarts_preserve_the_board() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let mut blinker = Board::new(12, 12);
        for col in 4..=6 {
            blinker.set(6, col, true).unwrap();
        }
        blinker.set(1, 1, true).unwrap();
        blinker.set(1, 2, true).unwrap();
        blinker.set(2, 1, true).unwrap();
        let reference = store.put(&blinker).unwrap();
        let deps = deps_with(store.clone());

        let mut request = RunRequest::fresh(RunId::from("chain"), Duration::ZERO, false);
        request.resume_from = Some(reference);
        let (tx, handle) = launch(request, settings(5, 2), &deps);

        let mut sub = subscribe(&tx).await;
        let mut observed = Board::new(12, 12);
        let mut steps = Vec::new();
        while let Some(delta) = sub.next().await {
            apply_flips(&mut observed, &delta);
            steps.push(delta.step);
        }
        drop(tx);

        let mut expected = blinker;
        for _ in 0..5 {
            expected = next_generation(&expected);
        }
        assert_eq!(observed, expected);
        assert_eq!(steps, vec![0, 1, 2, 3, 4, 5]);

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.instances, 3);
        assert_eq!(outcome.final_step, 5);
        assert!(store.is_empty());
    }

    struct BrokenStore;

    impl CheckpointStore for BrokenStore {
        fn put(&self, _board: &Board) -> Result<CheckpointRef, CheckpointError> {
            Err(CheckpointError::Unavailable(String::from("disk on fire")))
        }

        fn get(&self, reference: CheckpointRef) -> Result<Board, CheckpointError> {
            Err(CheckpointError::NotFound(reference))
        }

        fn discard(&self, _reference: CheckpointRef) -> Result<(), CheckpointError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn checkpoint_failure_is_fatal_and_closes_streams() {
        let deps = deps_with(Arc::new(BrokenStore));
        let request = RunRequest::fresh(RunId::from("broken"), Duration::ZERO, false);
        let (tx, handle) = launch(request, settings(0, 1), &deps);

        let mut sub = subscribe(&tx).await;
        assert_eq!(sub.next().await.unwrap().step, 0);
        assert_eq!(sub.next().await.unwrap().step, 1);
        assert!(sub.next().await.is_none());

        let result = handle.await.unwrap();
        assert!(matches!(
            result,
            Err(RunnerError::Controller {
                instance: 1,
                source: ControllerError::Checkpoint(CheckpointError::Unavailable(_)),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn rejected_splatter_keeps_the_run_alive() {
        let deps = deps_with(Arc::new(InMemoryCheckpointStore::new()));
        let request = RunRequest::fresh(RunId::from("reject"), Duration::ZERO, true);
        let (tx, handle) = launch(request, settings(0, 50), &deps);

        let mut sub = subscribe(&tx).await;
        let bootstrap = sub.next().await.unwrap();

        tx.send(RunCommand::Splatter(SplatterSignal {
            x: -1,
            y: 3,
            size: None,
            count: None,
        }))
        .await
        .unwrap();
        let (query, reply) = RunCommand::query();
        tx.send(query).await.unwrap();
        assert_eq!(reply.await.unwrap(), bootstrap);

        tx.send(RunCommand::Stop).await.unwrap();
        assert!(sub.next().await.is_none());
        assert_eq!(
            handle.await.unwrap().unwrap().end_reason,
            EndReason::Stopped
        );
    }

    #[tokio::test]
    async fn dropping_every_sender_detaches_the_run() {
        let deps = deps_with(Arc::new(InMemoryCheckpointStore::new()));
        let request = RunRequest::fresh(RunId::from("orphan"), Duration::from_secs(60), true);
        let (tx, handle) = launch(request, settings(0, 50), &deps);
        drop(tx);

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.end_reason, EndReason::Detached);
        assert_eq!(outcome.instances, 1);
    }
}
