//! The real, HTTP-backed sides of `WorkerApiClient` and `FunctionExecutor`.
//!
//! Both talk to a worker's advertised address; neither ever sees a job's
//! real completion — that arrives later over `POST /v1/callback/{id}`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use job_broker::{Callback, CoreError, Function, FunctionExecutor, WorkerApiClient, WorkerInfo};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Worker registration's outbound Info probe timeout (SPEC_FULL §4.9).
pub const WORKER_REGISTRATION_TIMEOUT: Duration = Duration::from_secs(15);

fn connection_error(err: reqwest::Error) -> CoreError {
    CoreError::ConnectionError(err.to_string())
}

pub struct HttpWorkerApiClient {
    client: reqwest::Client,
}

impl HttpWorkerApiClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpWorkerApiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct InfoReply {
    id: String,
    version: String,
    max_parallel: usize,
    capabilities: Vec<String>,
}

#[async_trait]
impl WorkerApiClient for HttpWorkerApiClient {
    async fn info(&self, address: &str) -> Result<WorkerInfo, CoreError> {
        let reply: InfoReply = self
            .client
            .get(format!("{address}/v1/info"))
            .timeout(WORKER_REGISTRATION_TIMEOUT)
            .send()
            .await
            .map_err(connection_error)?
            .error_for_status()
            .map_err(connection_error)?
            .json()
            .await
            .map_err(connection_error)?;

        Ok(WorkerInfo {
            id: reply.id,
            version: reply.version,
            max_parallel: reply.max_parallel,
            capabilities: reply.capabilities,
        })
    }
}

/// Where and how the worker should report a function's outcome — mirrors
/// the original's `FunctionCallback{ID, URL, ExpiredAt}` wire shape, so a
/// real worker process can actually POST its result back.
#[derive(Serialize)]
struct FunctionCallbackPayload {
    callback_id: Uuid,
    url: String,
    expired_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct ExecRequest<'a> {
    function: &'a str,
    args: &'a [serde_json::Value],
    data: &'a HashMap<String, serde_json::Value>,
    callback: FunctionCallbackPayload,
}

/// Issues the fire-and-forget exec RPC. The per-exec deadline is bounded by
/// the callback timeout (SPEC_FULL §9): a hung remote executor can't hold a
/// dispatch slot past the point the expirer would have rescued the job
/// anyway.
pub struct HttpFunctionExecutor {
    client: reqwest::Client,
    deadline: Duration,
    /// Base URL workers use to build their callback URL; see
    /// `CoordinatorConfig::callback_base_url`.
    callback_base_url: String,
}

impl HttpFunctionExecutor {
    pub fn new(deadline: Duration, callback_base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            deadline,
            callback_base_url,
        }
    }

    fn callback_url(&self, callback_id: Uuid) -> String {
        format!("{}/v1/callback/{callback_id}", self.callback_base_url)
    }
}

#[async_trait]
impl FunctionExecutor for HttpFunctionExecutor {
    async fn exec(
        &self,
        address: &str,
        function: &Function,
        data: &HashMap<String, serde_json::Value>,
        callback: &Callback,
    ) -> Result<(), CoreError> {
        let body = ExecRequest {
            function: &function.name,
            args: &function.args,
            data,
            callback: FunctionCallbackPayload {
                callback_id: callback.id,
                url: self.callback_url(callback.id),
                expired_at: callback.expired_at,
            },
        };

        self.client
            .post(format!("{address}/v1/exec"))
            .timeout(self.deadline)
            .json(&body)
            .send()
            .await
            .map_err(connection_error)?
            .error_for_status()
            .map_err(connection_error)?;

        Ok(())
    }
}
