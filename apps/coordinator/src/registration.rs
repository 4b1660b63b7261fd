//! Worker registration RPC (SPEC_FULL §6), bound on `ASYNC_SERVER_BIND`,
//! separate from the job/callback/health HTTP surface.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::remote::HttpWorkerApiClient;
use crate::state::AppState;

#[derive(Deserialize)]
struct RegisterRequest {
    address: String,
}

#[derive(Serialize)]
struct RegisterReply {
    state: &'static str,
}

/// Registers `address`, returning immediately once the worker reaches
/// *pending* — admission to *active* happens asynchronously behind an Info
/// probe (`WorkerRegistry::register`).
async fn register_worker(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Json<RegisterReply> {
    state
        .worker_registry
        .register(
            req.address,
            Arc::new(HttpWorkerApiClient::new()),
            state.dispatcher.clone(),
        )
        .await;
    Json(RegisterReply { state: "pending" })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/worker/register", post(register_worker))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
