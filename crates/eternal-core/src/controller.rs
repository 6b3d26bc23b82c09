//! The simulation controller: one run's single-writer event loop.
//!
//! A [`SimulationController`] owns the board, step counter, pause flag, and
//! tick cadence of exactly one run for the lifetime of one *instance*. Its
//! loop multiplexes two event sources:
//!
//! - the run's command channel (toggle, splatter, subscribe, query, stop)
//! - a tick deadline, armed only while the run is not paused
//!
//! Events are applied strictly one at a time, so the board needs no lock.
//! Every `checkpoint_interval` steps the instance snapshots its board into
//! the [`CheckpointStore`] and exits with a [`ControllerInput`] from which
//! the run supervisor builds the successor instance.
//!
//! Phase flow:
//!
//! ```text
//! Initializing -> Running <-> Paused -> (Checkpointing -> Initializing)* -> Terminated
//! ```

use std::sync::Arc;
use std::time::Duration;

use eternal_grid::{
    SeedConfig, diff_flipped, diff_from_empty, next_generation, seed_board, splatter,
};
use eternal_types::{Board, Cell, CheckpointRef, RunId, SplatterSignal, StateDelta};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, trace, warn};

use crate::broadcast::{Broadcaster, Subscription};
use crate::checkpoint::{CheckpointError, CheckpointStore};
use crate::command::{EndReason, RunCommand};
use crate::config::SimulationConfig;

/// Errors that end a run. Per-command failures never surface here.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// Storing or loading a checkpoint failed.
    #[error("checkpoint failed: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// The initial board could not be seeded.
    #[error("seeding failed: {0}")]
    Grid(#[from] eternal_grid::GridError),

    /// The step counter cannot advance any further.
    #[error("step counter overflow")]
    StepOverflow,
}

/// Lifecycle phase of a controller instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Obtaining the starting board.
    Initializing,
    /// Ticking on the configured cadence.
    Running,
    /// Timer disarmed; commands are still applied.
    Paused,
    /// Snapshotting the board before handing over to a successor.
    Checkpointing,
    /// The run is over.
    Terminated,
}

// ---------------------------------------------------------------------------
// Inputs and shared dependencies
// ---------------------------------------------------------------------------

/// Per-run settings shared by every instance of the run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    /// Board rows.
    pub rows: usize,
    /// Board columns.
    pub cols: usize,
    /// Seeding parameters for a fresh board.
    pub seed: SeedConfig,
    /// Step at which the run terminates (0 = unlimited).
    pub max_steps: u64,
    /// Checkpoint every N steps.
    pub checkpoint_interval: u64,
    /// Radius used when a splatter omits `size`.
    pub splatter_radius: u32,
    /// Fixed random seed, or `None` for OS entropy.
    pub rng_seed: Option<u64>,
}

impl RunSettings {
    /// Derive run settings from the loaded configuration.
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            rows: config.board.rows,
            cols: config.board.cols,
            seed: config.seed.clone(),
            max_steps: config.run.max_steps,
            checkpoint_interval: config.run.checkpoint_interval.max(1),
            splatter_radius: config.splatter.default_radius,
            rng_seed: config.run.rng_seed,
        }
    }
}

/// Collaborators shared by every run.
#[derive(Clone)]
pub struct RunDeps {
    /// Where checkpoints are stored.
    pub store: Arc<dyn CheckpointStore>,
    /// Where deltas are published.
    pub broadcaster: Arc<Broadcaster>,
}

/// Everything an instance needs to start: fresh, or continuing a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerInput {
    /// The run's identity, unchanged across instances.
    pub run_id: RunId,
    /// Snapshot to resume from; `None` seeds a fresh board.
    pub checkpoint: Option<CheckpointRef>,
    /// Step counter carried over from the previous instance.
    pub step: u64,
    /// Real-time interval between generations.
    pub tick_interval: Duration,
    /// Whether the run is paused.
    pub paused: bool,
}

/// The mutable state owned by one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationState {
    /// The run's identity.
    pub run_id: RunId,
    /// Generation counter.
    pub step: u64,
    /// Whether the tick timer is disarmed.
    pub paused: bool,
    /// Real-time interval between generations.
    pub tick_interval: Duration,
    /// Current cells.
    pub board: Board,
}

/// Why an instance stopped running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceExit {
    /// The board was snapshotted; start a successor from this input.
    Checkpointed(ControllerInput),
    /// The run is over.
    Terminated(Termination),
}

/// Final counters of a terminated run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Termination {
    /// Why the run ended.
    pub reason: EndReason,
    /// Step counter at termination.
    pub step: u64,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// One instance of a run's event loop.
pub struct SimulationController {
    state: SimulationState,
    phase: Phase,
    settings: RunSettings,
    deps: RunDeps,
    rng: SmallRng,
    next_tick: Instant,
}

impl SimulationController {
    /// Build an instance from its input: load the checkpoint when one is
    /// given (then release it), otherwise seed a fresh board.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Checkpoint`] if the snapshot cannot be
    /// loaded, or [`ControllerError::Grid`] if seeding fails.
    pub fn initialize(
        input: ControllerInput,
        settings: &RunSettings,
        deps: &RunDeps,
    ) -> Result<Self, ControllerError> {
        let mut rng = match settings.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed.wrapping_add(input.step)),
            None => SmallRng::from_os_rng(),
        };

        let board = match input.checkpoint {
            Some(reference) => {
                let board = blocking_io(|| deps.store.get(reference))?;
                if let Err(e) = blocking_io(|| deps.store.discard(reference)) {
                    warn!(run_id = %input.run_id, %reference, error = %e, "Failed to discard consumed checkpoint");
                }
                debug!(run_id = %input.run_id, %reference, step = input.step, "Resumed from checkpoint");
                board
            }
            None => seed_board(settings.rows, settings.cols, &settings.seed, &mut rng)?,
        };

        let controller = Self {
            state: SimulationState {
                run_id: input.run_id,
                step: input.step,
                paused: input.paused,
                tick_interval: input.tick_interval,
                board,
            },
            phase: Phase::Initializing,
            settings: settings.clone(),
            deps: deps.clone(),
            rng,
            next_tick: deadline_after(input.tick_interval),
        };
        debug!(
            run_id = %controller.state.run_id,
            step = controller.state.step,
            population = controller.state.board.population(),
            "Controller initialized"
        );
        Ok(controller)
    }

    /// Current state of the instance.
    pub const fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Current lifecycle phase.
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// The state as a board-from-nothing delta: every live cell flipped.
    pub fn snapshot(&self) -> StateDelta {
        self.delta(diff_from_empty(&self.state.board))
    }

    /// Drive the event loop until the instance checkpoints or the run ends.
    ///
    /// Commands take priority over a due tick. When every command sender
    /// is gone the run ends as [`EndReason::Detached`].
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError`] if a checkpoint cannot be stored or the
    /// step counter overflows. Both are fatal to the run.
    pub async fn run(
        mut self,
        commands: &mut mpsc::Receiver<RunCommand>,
    ) -> Result<InstanceExit, ControllerError> {
        self.enter(if self.state.paused {
            Phase::Paused
        } else {
            Phase::Running
        });

        loop {
            tokio::select! {
                biased;

                command = commands.recv() => {
                    let Some(command) = command else {
                        return Ok(self.terminate(EndReason::Detached));
                    };
                    if let Some(exit) = self.apply(command) {
                        return Ok(exit);
                    }
                }

                () = sleep_until(self.next_tick), if !self.state.paused => {
                    self.advance()?;
                    self.next_tick = deadline_after(self.state.tick_interval);
                    if let Some(exit) = self.after_tick()? {
                        return Ok(exit);
                    }
                }
            }
        }
    }

    /// Compute one generation and publish what flipped.
    fn advance(&mut self) -> Result<(), ControllerError> {
        let next = next_generation(&self.state.board);
        let flipped = diff_flipped(&self.state.board, &next);
        self.state.board = next;
        self.state.step = self
            .state
            .step
            .checked_add(1)
            .ok_or(ControllerError::StepOverflow)?;
        trace!(run_id = %self.state.run_id, step = self.state.step, flipped = flipped.len(), "Tick");
        self.publish(flipped);
        Ok(())
    }

    /// Step-limit check, then checkpoint check. Runs after ticks only.
    fn after_tick(&mut self) -> Result<Option<InstanceExit>, ControllerError> {
        let max_steps = self.settings.max_steps;
        if max_steps != 0 && self.state.step >= max_steps {
            info!(
                run_id = %self.state.run_id,
                step = self.state.step,
                max_steps,
                "Step limit reached"
            );
            return Ok(Some(self.terminate(EndReason::MaxStepsReached)));
        }

        let due = self
            .state
            .step
            .checked_rem(self.settings.checkpoint_interval)
            .is_some_and(|rem| rem == 0);
        if due {
            return self.checkpoint().map(Some);
        }
        Ok(None)
    }

    /// Snapshot the board and describe the successor instance.
    fn checkpoint(&mut self) -> Result<InstanceExit, ControllerError> {
        self.enter(Phase::Checkpointing);
        let reference = blocking_io(|| self.deps.store.put(&self.state.board))?;
        info!(
            run_id = %self.state.run_id,
            step = self.state.step,
            %reference,
            "Checkpoint stored, handing over to successor"
        );
        Ok(InstanceExit::Checkpointed(ControllerInput {
            run_id: self.state.run_id.clone(),
            checkpoint: Some(reference),
            step: self.state.step,
            tick_interval: self.state.tick_interval,
            paused: self.state.paused,
        }))
    }

    /// Apply one command. Returns an exit when the command ends the run.
    fn apply(&mut self, command: RunCommand) -> Option<InstanceExit> {
        trace!(run_id = %self.state.run_id, command = command.name(), "Command received");
        match command {
            RunCommand::Toggle => {
                self.toggle();
                None
            }
            RunCommand::Splatter(signal) => {
                self.splatter(signal);
                None
            }
            RunCommand::Subscribe(reply) => {
                match self.deps.broadcaster.subscribe(&self.state.run_id) {
                    Some(receiver) => {
                        let subscription = Subscription::new(self.snapshot(), receiver);
                        if reply.send(subscription).is_err() {
                            debug!(run_id = %self.state.run_id, "Subscriber left before the reply");
                        }
                    }
                    None => {
                        warn!(run_id = %self.state.run_id, "No broadcast channel registered for run");
                    }
                }
                None
            }
            RunCommand::Query(reply) => {
                if reply.send(self.snapshot()).is_err() {
                    debug!(run_id = %self.state.run_id, "Query caller left before the reply");
                }
                None
            }
            RunCommand::Stop => {
                info!(run_id = %self.state.run_id, step = self.state.step, "Stop requested");
                Some(self.terminate(EndReason::Stopped))
            }
        }
    }

    fn toggle(&mut self) {
        self.state.paused = !self.state.paused;
        if self.state.paused {
            self.enter(Phase::Paused);
        } else {
            self.next_tick = deadline_after(self.state.tick_interval);
            self.enter(Phase::Running);
        }
        self.publish(Vec::new());
    }

    fn splatter(&mut self, signal: SplatterSignal) {
        let radius = signal.size.unwrap_or(self.settings.splatter_radius);
        match splatter(
            &mut self.state.board,
            signal.x,
            signal.y,
            radius,
            signal.count,
            &mut self.rng,
        ) {
            Ok(flipped) => {
                debug!(
                    run_id = %self.state.run_id,
                    x = signal.x,
                    y = signal.y,
                    radius,
                    flipped = flipped.len(),
                    "Splatter applied"
                );
                self.publish(flipped);
            }
            Err(e) => {
                warn!(run_id = %self.state.run_id, error = %e, "Splatter rejected");
            }
        }
    }

    fn terminate(&mut self, reason: EndReason) -> InstanceExit {
        self.enter(Phase::Terminated);
        InstanceExit::Terminated(Termination {
            reason,
            step: self.state.step,
        })
    }

    fn enter(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!(run_id = %self.state.run_id, from = ?self.phase, to = ?phase, "Phase transition");
            self.phase = phase;
        }
    }

    fn delta(&self, flipped: Vec<Cell>) -> StateDelta {
        StateDelta {
            id: self.state.run_id.clone(),
            step: self.state.step,
            paused: self.state.paused,
            tick_time: self.state.tick_interval,
            flipped,
        }
    }

    fn publish(&self, flipped: Vec<Cell>) {
        let receivers = self.deps.broadcaster.publish(self.delta(flipped));
        trace!(run_id = %self.state.run_id, receivers, "Delta published");
    }
}

/// Run checkpoint store I/O, which may block on the filesystem. On a
/// multi-threaded runtime the worker hands its other tasks off first;
/// anywhere else the call runs inline.
fn blocking_io<T>(io: impl FnOnce() -> T) -> T {
    let flavor = Handle::try_current().map(|handle| handle.runtime_flavor());
    if matches!(flavor, Ok(RuntimeFlavor::MultiThread)) {
        tokio::task::block_in_place(io)
    } else {
        io()
    }
}

fn deadline_after(interval: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(interval).unwrap_or(now)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::checkpoint::{DirectoryCheckpointStore, InMemoryCheckpointStore};

    fn settings(max_steps: u64, checkpoint_interval: u64) -> RunSettings {
        RunSettings {
            rows: 16,
            cols: 16,
            seed: SeedConfig::default(),
            max_steps,
            checkpoint_interval,
            splatter_radius: 2,
            rng_seed: Some(42),
        }
    }

    fn deps() -> (Arc<InMemoryCheckpointStore>, RunDeps) {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let deps = RunDeps {
            store: store.clone(),
            broadcaster: Arc::new(Broadcaster::new(64)),
        };
        (store, deps)
    }

    fn input(run: &str, checkpoint: Option<CheckpointRef>, paused: bool) -> ControllerInput {
        ControllerInput {
            run_id: RunId::from(run),
            checkpoint,
            step: 0,
            tick_interval: Duration::ZERO,
            paused,
        }
    }

    #[test]
    fn fresh_instance_seeds_a_board() {
        let (_, deps) = deps();
        let controller =
            SimulationController::initialize(input("r", None, false), &settings(0, 50), &deps)
                .unwrap();
        assert_eq!(controller.state().board.dimensions(), (16, 16));
        assert_eq!(controller.phase(), Phase::Initializing);
        assert_eq!(
            controller.snapshot().flipped.len(),
            controller.state().board.population()
        );
    }

    #[test]
    fn continuation_loads_and_releases_the_checkpoint() {
        let (store, deps) = deps();
        let mut board = Board::new(16, 16);
        board.set(3, 4, true).unwrap();
        let reference = store.put(&board).unwrap();

        let mut resumed = input("r", Some(reference), true);
        resumed.step = 100;
        let controller =
            SimulationController::initialize(resumed, &settings(0, 50), &deps).unwrap();

        assert_eq!(controller.state().board, board);
        assert_eq!(controller.state().step, 100);
        assert!(controller.state().paused);
        assert!(store.is_empty());
    }

    #[test]
    fn missing_checkpoint_is_fatal() {
        let (_, deps) = deps();
        let result = SimulationController::initialize(
            input("r", Some(CheckpointRef::new()), false),
            &settings(0, 50),
            &deps,
        );
        assert!(matches!(
            result,
            Err(ControllerError::Checkpoint(CheckpointError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn step_limit_wins_over_checkpoint() {
        let (store, deps) = deps();
        let controller =
            SimulationController::initialize(input("r", None, false), &settings(4, 2), &deps)
                .unwrap();
        let (_tx, mut rx) = mpsc::channel(4);

        // First instance checkpoints at step 2.
        let next = match controller.run(&mut rx).await.unwrap() {
            InstanceExit::Checkpointed(next) => Some(next),
            InstanceExit::Terminated(_) => None,
        }
        .unwrap();
        assert_eq!(next.step, 2);
        assert_eq!(store.len(), 1);

        // Second instance reaches the limit at step 4, which is also a
        // checkpoint boundary: it terminates instead.
        let controller = SimulationController::initialize(next, &settings(4, 2), &deps).unwrap();
        let exit = controller.run(&mut rx).await.unwrap();
        assert_eq!(
            exit,
            InstanceExit::Terminated(Termination {
                reason: EndReason::MaxStepsReached,
                step: 4,
            })
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn paused_instance_answers_queries_and_stops() {
        let (_, deps) = deps();
        let controller =
            SimulationController::initialize(input("r", None, true), &settings(0, 50), &deps)
                .unwrap();
        let (tx, mut rx) = mpsc::channel(4);

        let (query, reply) = RunCommand::query();
        tx.send(query).await.unwrap();
        tx.send(RunCommand::Stop).await.unwrap();

        let exit = controller.run(&mut rx).await.unwrap();
        assert_eq!(
            exit,
            InstanceExit::Terminated(Termination {
                reason: EndReason::Stopped,
                step: 0,
            })
        );
        let snapshot = reply.await.unwrap();
        assert_eq!(snapshot.step, 0);
        assert!(snapshot.paused);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn directory_checkpoints_hand_over_on_a_threaded_runtime() {
        let dir = std::env::temp_dir().join(format!("eternal-ctrl-{}", uuid::Uuid::now_v7()));
        let deps = RunDeps {
            store: Arc::new(DirectoryCheckpointStore::open(&dir).unwrap()),
            broadcaster: Arc::new(Broadcaster::new(64)),
        };
        let (_tx, mut rx) = mpsc::channel(4);

        let controller =
            SimulationController::initialize(input("r", None, false), &settings(0, 2), &deps)
                .unwrap();
        let expected = next_generation(&next_generation(&controller.state().board));
        let next = match controller.run(&mut rx).await.unwrap() {
            InstanceExit::Checkpointed(next) => Some(next),
            InstanceExit::Terminated(_) => None,
        }
        .unwrap();
        let reference = next.checkpoint.unwrap();
        assert!(dir.join(format!("{reference}.json")).exists());

        let successor = SimulationController::initialize(next, &settings(0, 2), &deps).unwrap();
        assert_eq!(successor.state().board, expected);
        assert_eq!(successor.state().step, 2);
        assert!(!dir.join(format!("{reference}.json")).exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn store_io_runs_inline_outside_a_threaded_runtime() {
        assert_eq!(blocking_io(|| 7), 7);
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        assert_eq!(runtime.block_on(async { blocking_io(|| 8) }), 8);
    }

    #[tokio::test]
    async fn dropped_senders_detach_the_run() {
        let (_, deps) = deps();
        let controller =
            SimulationController::initialize(input("r", None, true), &settings(0, 50), &deps)
                .unwrap();
        let (tx, mut rx) = mpsc::channel::<RunCommand>(1);
        drop(tx);
        let exit = controller.run(&mut rx).await.unwrap();
        assert!(matches!(
            exit,
            InstanceExit::Terminated(Termination {
                reason: EndReason::Detached,
                ..
            })
        ));
    }
}
