//! Worker records: the coordinator's view of one remote executor.
//!
//! State machine: pending → active ↔ unhealthy → disconnected (terminal,
//! idempotent). A worker is bound into the broker as a `JobProcessor`; its
//! `process` delegates to the `Dispatcher` and folds the synchronous outcome
//! back into its own health tracking.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};
use tracing::{info, warn};

use crate::broker::JobProcessor;
use crate::dispatcher::Dispatcher;
use crate::error::CoreError;
use crate::job::Job;

pub const WORKER_REFRESH_INTERVAL: Duration = Duration::from_secs(1);
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Pending,
    Active,
    Unhealthy,
    Disconnected,
}

#[derive(Debug, Clone, Default)]
pub struct WorkerInfo {
    pub id: String,
    pub version: String,
    pub max_parallel: usize,
    pub capabilities: Vec<String>,
}

/// The outbound side of worker communication: an info probe and the exec
/// RPC the dispatcher drives through `FunctionExecutor`. Kept as a trait so
/// tests never need a real HTTP server.
#[async_trait]
pub trait WorkerApiClient: Send + Sync {
    async fn info(&self, address: &str) -> Result<WorkerInfo, CoreError>;
}

pub struct Worker {
    pub address: String,
    state: RwLock<WorkerState>,
    info: RwLock<WorkerInfo>,
    consecutive_failures: AtomicU32,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    api_client: Arc<dyn WorkerApiClient>,
    dispatcher: Arc<Dispatcher>,
}

impl Worker {
    pub fn new(address: impl Into<String>, api_client: Arc<dyn WorkerApiClient>, dispatcher: Arc<Dispatcher>) -> Arc<Self> {
        let (stop_tx, stop_rx) = watch::channel(false);
        Arc::new(Self {
            address: address.into(),
            state: RwLock::new(WorkerState::Pending),
            info: RwLock::new(WorkerInfo::default()),
            consecutive_failures: AtomicU32::new(0),
            stop_tx,
            stop_rx,
            api_client,
            dispatcher,
        })
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    pub async fn info(&self) -> WorkerInfo {
        self.info.read().await.clone()
    }

    pub async fn id(&self) -> String {
        self.info.read().await.id.clone()
    }

    pub async fn max_parallel(&self) -> usize {
        self.info.read().await.max_parallel
    }

    pub async fn is_active(&self) -> bool {
        *self.state.read().await == WorkerState::Active
    }

    pub async fn is_disconnected(&self) -> bool {
        *self.state.read().await == WorkerState::Disconnected
    }

    /// Issues an info probe and caches the reply. Called once at admission
    /// and on every refresh tick thereafter.
    pub async fn update_info(&self) -> Result<(), CoreError> {
        match self.api_client.info(&self.address).await {
            Ok(info) => {
                *self.info.write().await = info;
                self.note_connection_result(false).await;
                Ok(())
            }
            Err(err) => {
                self.note_connection_result(err.is_connection_fault()).await;
                Err(err)
            }
        }
    }

    /// pending → active. No-op if not currently pending. Launches the
    /// refresh loop exactly once.
    pub async fn validation_complete(self: &Arc<Self>) {
        {
            let mut state = self.state.write().await;
            if *state != WorkerState::Pending {
                return;
            }
            *state = WorkerState::Active;
        }
        let worker = self.clone();
        tokio::spawn(async move { worker.refresh_loop().await });
    }

    async fn refresh_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(WORKER_REFRESH_INTERVAL);
        let mut stop_rx = self.stop_rx.clone();
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let _ = self.update_info().await;
                }
                _ = stop_rx.changed() => {
                    if *stop_rx.borrow() {
                        break;
                    }
                }
            }
        }
    }

    /// Any non-connection outcome clears the failure counter and, if the
    /// worker was unhealthy, restores it to active. A connection fault
    /// increments the counter, demotes an active worker to unhealthy, and
    /// disconnects the worker outright once the counter reaches
    /// `MAX_CONSECUTIVE_FAILURES`.
    async fn note_connection_result(&self, is_connection_fault: bool) {
        if !is_connection_fault {
            self.consecutive_failures.store(0, Ordering::SeqCst);
            let mut state = self.state.write().await;
            if *state == WorkerState::Unhealthy {
                *state = WorkerState::Active;
                info!(address = %self.address, "worker: reconnected");
            }
            return;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.state.write().await;
            if *state == WorkerState::Active {
                *state = WorkerState::Unhealthy;
                warn!(address = %self.address, "worker: unhealthy");
            }
        }
        if failures >= MAX_CONSECUTIVE_FAILURES {
            self.disconnect().await;
        }
    }

    /// Stops all monitoring and consumption bound to this worker. Idempotent.
    pub async fn disconnect(&self) {
        let mut state = self.state.write().await;
        if *state == WorkerState::Disconnected {
            return;
        }
        *state = WorkerState::Disconnected;
        let _ = self.stop_tx.send(true);
        info!(address = %self.address, "worker: disconnected");
    }
}

#[async_trait]
impl JobProcessor for Worker {
    async fn process(&self, job: Job) -> (bool, Result<(), CoreError>) {
        let job_id = job.id;
        match self.dispatcher.dispatch(&self.address, job).await {
            Ok(None) => (false, Ok(())),
            Ok(Some(err)) => {
                self.note_connection_result(err.is_connection_fault()).await;
                (false, Err(err))
            }
            Err(err) => {
                warn!(%job_id, error = %err, "worker: failed to handle job-manager error during dispatch");
                (false, Err(err))
            }
        }
    }

    fn capabilities(&self) -> Vec<String> {
        // Cheap best-effort snapshot; `try_read` avoids blocking the broker's
        // queue-pump setup on a worker mid-refresh.
        self.info
            .try_read()
            .map(|info| info.capabilities.clone())
            .unwrap_or_default()
    }

    fn stopped(&self) -> watch::Receiver<bool> {
        self.stop_rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::Broker;
    use crate::callback::CallbackRegistry;
    use crate::function::Function;
    use crate::job_manager::JobManager;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FlakyClient {
        fail_next: Mutex<u32>,
    }

    #[async_trait]
    impl WorkerApiClient for FlakyClient {
        async fn info(&self, _address: &str) -> Result<WorkerInfo, CoreError> {
            let mut remaining = self.fail_next.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(CoreError::ConnectionError("refused".into()));
            }
            Ok(WorkerInfo {
                id: "w1".into(),
                version: "1.0".into(),
                max_parallel: 2,
                capabilities: vec!["f1".into()],
            })
        }
    }

    struct NoopExecutor;
    #[async_trait]
    impl crate::dispatcher::FunctionExecutor for NoopExecutor {
        async fn exec(
            &self,
            _address: &str,
            _function: &Function,
            _data: &HashMap<String, serde_json::Value>,
            _callback: &crate::callback::Callback,
        ) -> Result<(), CoreError> {
            Ok(())
        }
    }

    fn make_worker(client: Arc<dyn WorkerApiClient>) -> Arc<Worker> {
        let broker = Arc::new(Broker::new());
        let jm = Arc::new(JobManager::new(broker));
        let cb = Arc::new(CallbackRegistry::new());
        let dispatcher = Arc::new(Dispatcher::new(jm, cb, Arc::new(NoopExecutor)));
        Worker::new("http://w1", client, dispatcher)
    }

    #[tokio::test]
    async fn starts_pending_and_activates_once() {
        let worker = make_worker(Arc::new(FlakyClient { fail_next: Mutex::new(0) }));
        assert_eq!(worker.state().await, WorkerState::Pending);
        worker.update_info().await.unwrap();
        worker.validation_complete().await;
        assert_eq!(worker.state().await, WorkerState::Active);
        worker.validation_complete().await;
        assert_eq!(worker.state().await, WorkerState::Active);
    }

    #[tokio::test]
    async fn three_consecutive_connection_faults_disconnect() {
        let worker = make_worker(Arc::new(FlakyClient { fail_next: Mutex::new(10) }));
        worker.validation_complete_for_test().await;

        for _ in 0..2 {
            assert!(worker.update_info().await.is_err());
            assert_eq!(worker.state().await, WorkerState::Unhealthy);
        }
        assert!(worker.update_info().await.is_err());
        assert_eq!(worker.state().await, WorkerState::Disconnected);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let worker = make_worker(Arc::new(FlakyClient { fail_next: Mutex::new(0) }));
        worker.disconnect().await;
        worker.disconnect().await;
        assert_eq!(worker.state().await, WorkerState::Disconnected);
    }

    impl Worker {
        /// Test helper: force straight into active without a real refresh
        /// loop so failure-counter tests don't race a background tick.
        async fn validation_complete_for_test(self: &Arc<Self>) {
            *self.state.write().await = WorkerState::Active;
        }
    }
}
