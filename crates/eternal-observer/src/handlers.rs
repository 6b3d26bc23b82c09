//! REST handlers for starting, steering, and inspecting runs.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/start` | Start a run, respond with its id as plain text |
//! | `POST` | `/signal/{runId}/{signalName}` | Send `splatter` or `toggleStatus` |
//! | `GET` | `/board/{runId}` | Current board as a bootstrap delta |
//! | `POST` | `/stop/{runId}` | Terminate a run |
//! | `GET` | `/runs` | Ids of active runs |
//!
//! The state stream (`GET /state/{runId}`) lives in [`crate::sse`].

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use eternal_core::registry::StartOptions;
use eternal_types::{RunId, SignalName, SplatterSignal, StateDelta};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ObserverError;
use crate::state::AppState;

/// Response body of a successful signal delivery.
const SIGNAL_ACK: &str = "Event sent";

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Optional body for `POST /start`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StartRequest {
    /// Tick interval in milliseconds.
    pub tick_interval_ms: Option<u64>,
    /// Step limit (0 = unlimited).
    pub max_steps: Option<u64>,
    /// Start paused.
    pub paused: Option<bool>,
}

impl From<StartRequest> for StartOptions {
    fn from(request: StartRequest) -> Self {
        Self {
            run_id: None,
            tick_interval: request.tick_interval_ms.map(Duration::from_millis),
            max_steps: request.max_steps,
            paused: request.paused,
        }
    }
}

// ---------------------------------------------------------------------------
// POST /start
// ---------------------------------------------------------------------------

/// Start a fresh run and return its id as plain text.
///
/// The body is optional; when present it must be a [`StartRequest`].
pub async fn start(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<String, ObserverError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        StartRequest::default()
    } else {
        serde_json::from_slice::<StartRequest>(&body)
            .map_err(|e| ObserverError::BadRequest(format!("invalid start body: {e}")))?
    };

    let started = state.registry.start(request.into()).await?;
    info!(run_id = %started.run_id, "Run started via gateway");
    Ok(started.run_id.to_string())
}

// ---------------------------------------------------------------------------
// POST /signal/{runId}/{signalName}
// ---------------------------------------------------------------------------

/// Deliver a signal to a run.
///
/// `splatter` requires a JSON [`SplatterSignal`] body; `toggleStatus`
/// ignores its body. Unknown signal names and malformed bodies are
/// rejected before the run is contacted.
pub async fn signal(
    State(state): State<Arc<AppState>>,
    Path((run_id, signal_name)): Path<(String, String)>,
    body: Bytes,
) -> Result<&'static str, ObserverError> {
    let signal: SignalName = signal_name
        .parse()
        .map_err(|e: eternal_types::UnknownSignal| ObserverError::BadRequest(e.to_string()))?;
    let run_id = RunId::from(run_id);

    match signal {
        SignalName::Splatter => {
            let payload: SplatterSignal = serde_json::from_slice(&body)
                .map_err(|e| ObserverError::BadRequest(format!("invalid splatter body: {e}")))?;
            state.registry.splatter(&run_id, payload).await?;
        }
        SignalName::ToggleStatus => {
            state.registry.toggle(&run_id).await?;
        }
    }

    debug!(run_id = %run_id, %signal, "Signal delivered");
    Ok(SIGNAL_ACK)
}

/// `POST /signal/{runId}` without a signal name.
pub async fn signal_missing_name(Path(run_id): Path<String>) -> ObserverError {
    ObserverError::BadRequest(format!("missing signal name for run {run_id}"))
}

/// `POST /signal` without a run id or signal name.
pub async fn signal_missing_run() -> ObserverError {
    ObserverError::BadRequest(String::from("missing run id and signal name in path"))
}

// ---------------------------------------------------------------------------
// GET /board/{runId}
// ---------------------------------------------------------------------------

/// Return the current board of a run as a board-from-nothing delta.
pub async fn get_board(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Json<StateDelta>, ObserverError> {
    let delta = state.registry.query(&RunId::from(run_id)).await?;
    Ok(Json(delta))
}

// ---------------------------------------------------------------------------
// POST /stop/{runId}
// ---------------------------------------------------------------------------

/// Ask a run to terminate. Its streams close once it has.
pub async fn stop(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<&'static str, ObserverError> {
    let run_id = RunId::from(run_id);
    state.registry.stop(&run_id).await?;
    info!(run_id = %run_id, "Stop requested via gateway");
    Ok("Run stopping")
}

// ---------------------------------------------------------------------------
// GET /runs
// ---------------------------------------------------------------------------

/// List the ids of every active run.
pub async fn list_runs(State(state): State<Arc<AppState>>) -> Json<Vec<RunId>> {
    Json(state.registry.run_ids().await)
}
