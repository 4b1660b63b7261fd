//! Shared application state threaded through both HTTP routers (the job/
//! worker/callback/health surface and the worker-registration RPC).

use std::sync::Arc;

use axum::extract::FromRef;
use axum_helpers::ReadinessFlag;
use job_broker::{Dispatcher, SharedBroker, SharedCallbackRegistry, SharedJobManager, WorkerRegistry};

#[derive(Clone)]
pub struct AppState {
    pub broker: SharedBroker,
    pub job_manager: SharedJobManager,
    pub callback_registry: SharedCallbackRegistry,
    pub worker_registry: Arc<WorkerRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    pub readiness: ReadinessFlag,
}

impl FromRef<AppState> for ReadinessFlag {
    fn from_ref(state: &AppState) -> Self {
        state.readiness.clone()
    }
}
