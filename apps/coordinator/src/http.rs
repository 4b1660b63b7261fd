//! The job/worker/callback/health HTTP surface (SPEC_FULL §6), all bound on
//! `ASYNC_SERVER_HTTP`.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_helpers::{health, AppError};
use job_broker::{CoreError, Function, Job, WorkerState};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateJobRequest {
    name: String,
    functions: Vec<Function>,
    #[serde(default)]
    data: HashMap<String, serde_json::Value>,
}

async fn create_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJobRequest>,
) -> Result<Json<Job>, AppError> {
    let job = state
        .job_manager
        .create(req.name, req.functions, req.data)
        .await?;
    Ok(Json(job))
}

async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Job>, AppError> {
    let job = state.job_manager.get_by_id(job_id).await?;
    Ok(Json(job))
}

#[derive(Serialize)]
struct JobsListResponse {
    count: usize,
    jobs: Vec<Job>,
}

async fn list_jobs(State(state): State<AppState>) -> Json<JobsListResponse> {
    let jobs = state.broker.list().await;
    Json(JobsListResponse {
        count: jobs.len(),
        jobs,
    })
}

#[derive(Serialize)]
struct WorkerRecord {
    address: String,
    state: WorkerState,
    id: String,
    version: String,
    max_parallel: usize,
    capabilities: Vec<String>,
}

async fn list_workers(State(state): State<AppState>) -> Json<Vec<WorkerRecord>> {
    let workers = state.worker_registry.list_all().await;
    let mut records = Vec::with_capacity(workers.len());
    for worker in workers {
        let info = worker.info().await;
        records.push(WorkerRecord {
            address: worker.address.clone(),
            state: worker.state().await,
            id: info.id,
            version: info.version,
            max_parallel: info.max_parallel,
            capabilities: info.capabilities,
        });
    }
    Json(records)
}

#[derive(Deserialize)]
struct CallbackRequest {
    status_code: u16,
}

/// Accepted codes are 200/500 (anything else maps through `CoreError::
/// UnknownStatusCode` to a 500 via `AppError`). An id this registry never
/// issued is a 400; one it already resolved (worker callback or expiry
/// sweep) is a silent, idempotent 200 — distinguished by the registry's
/// resolved-id tombstone.
async fn handle_callback(
    State(state): State<AppState>,
    Path(callback_id): Path<Uuid>,
    Json(req): Json<CallbackRequest>,
) -> Result<StatusCode, AppError> {
    let callback = match state.callback_registry.get(callback_id).await {
        Ok(callback) => callback,
        Err(CoreError::CallbackNotFound(_)) => {
            return if state.callback_registry.was_resolved(callback_id).await {
                Ok(StatusCode::OK)
            } else {
                Err(AppError::BadRequest(format!(
                    "unknown callback {callback_id}"
                )))
            };
        }
        Err(err) => return Err(err.into()),
    };

    state
        .job_manager
        .handle_callback(&callback, req.status_code)
        .await?;
    state.callback_registry.delete(callback.id).await;
    Ok(StatusCode::OK)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/job", post(create_job).get(list_jobs))
        .route("/v1/job/{job_id}", get(get_job))
        .route("/v1/worker", get(list_workers))
        .route("/v1/callback/{callback_id}", post(handle_callback))
        .route("/healthz", get(health::health_handler))
        .route("/readyz", get(health::ready_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
