//! Axum router construction for the gateway.
//!
//! Assembles all routes (REST + SSE) into a single [`Router`] with CORS
//! middleware enabled so the canvas client can be served from any origin.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::sse;
use crate::state::AppState;

/// Build the complete Axum router for the gateway.
///
/// The router includes:
/// - `POST /start` -- start a run
/// - `GET /state/{runId}` -- SSE delta stream
/// - `POST /signal/{runId}/{signalName}` -- splatter / toggle a run
/// - `POST /signal`, `POST /signal/{runId}` -- 400, missing path segments
/// - `GET /board/{runId}` -- current board as a bootstrap delta
/// - `POST /stop/{runId}` -- terminate a run
/// - `GET /runs` -- active run ids
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/start", post(handlers::start))
        // SSE
        .route("/state/{run_id}", get(sse::stream_state))
        // Signals
        .route("/signal", post(handlers::signal_missing_run))
        .route("/signal/{run_id}", post(handlers::signal_missing_name))
        .route("/signal/{run_id}/{signal_name}", post(handlers::signal))
        // Inspection and control
        .route("/board/{run_id}", get(handlers::get_board))
        .route("/stop/{run_id}", post(handlers::stop))
        .route("/runs", get(handlers::list_runs))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
