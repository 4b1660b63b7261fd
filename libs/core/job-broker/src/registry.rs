//! Worker registry: two-phase admission (pending → active) with
//! newest-wins duplicate-id resolution, a reaper per active worker, and
//! fixed-at-admission consumer spawning.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::broker::SharedBroker;
use crate::worker::{Worker, WorkerApiClient, WorkerState};

pub struct WorkerRegistry {
    broker: SharedBroker,
    pending: RwLock<HashMap<String, Arc<Worker>>>,
    active: RwLock<HashMap<String, Arc<Worker>>>,
}

impl WorkerRegistry {
    pub fn new(broker: SharedBroker) -> Arc<Self> {
        Arc::new(Self {
            broker,
            pending: RwLock::new(HashMap::new()),
            active: RwLock::new(HashMap::new()),
        })
    }

    /// Creates the worker record in *pending*, keyed by address, before
    /// returning — only the connect-and-admit step that follows is
    /// asynchronous. This ordering matters: the registration RPC replies as
    /// soon as this call returns, and a `GET /v1/worker` issued right after
    /// that reply must already see the worker in *pending*.
    pub async fn register(self: &Arc<Self>, address: String, api_client: Arc<dyn WorkerApiClient>, dispatcher: Arc<crate::dispatcher::Dispatcher>) {
        let worker = Worker::new(address.clone(), api_client, dispatcher);
        self.pending.write().await.insert(address, worker.clone());

        let registry = self.clone();
        tokio::spawn(async move {
            registry.connect(worker).await;
        });
    }

    async fn connect(self: &Arc<Self>, worker: Arc<Worker>) {
        if let Err(err) = worker.update_info().await {
            warn!(address = %worker.address, error = %err, "registry: failed to validate pending worker");
            self.pending.write().await.remove(&worker.address);
            return;
        }

        let mut pending = self.pending.write().await;
        if pending.remove(&worker.address).is_none() {
            // Already removed (disconnected or superseded) before we got here.
            return;
        }
        drop(pending);

        let worker_id = worker.id().await;
        let mut active = self.active.write().await;
        if let Some(old) = active.remove(&worker_id) {
            warn!(worker_id = %worker_id, old_address = %old.address, new_address = %worker.address, "registry: worker id duplicated, replacing older worker");
            old.disconnect().await;
        }

        worker.validation_complete().await;
        active.insert(worker_id.clone(), worker.clone());
        drop(active);

        self.spawn_reaper(worker.clone());

        let max_parallel = worker.max_parallel().await;
        for _ in 0..max_parallel {
            let broker = self.broker.clone();
            let consumer: Arc<Worker> = worker.clone();
            tokio::spawn(async move { broker.consume(consumer).await });
        }

        info!(worker_id = %worker_id, address = %worker.address, max_parallel, "registry: worker admitted");
    }

    fn spawn_reaper(self: &Arc<Self>, worker: Arc<Worker>) {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut stopped = worker.stopped();
            let _ = stopped.changed().await;
            let worker_id = worker.id().await;
            registry.active.write().await.remove(&worker_id);
            info!(worker_id = %worker_id, "registry: reaped disconnected worker");
        });
    }

    /// All workers, pending and active, for reporting.
    pub async fn list_all(&self) -> Vec<Arc<Worker>> {
        let pending = self.pending.read().await;
        let active = self.active.read().await;
        pending.values().cloned().chain(active.values().cloned()).collect()
    }

    /// The admitted-workers map directly, without the pending set. Active
    /// admission already excludes anything not yet validated.
    pub async fn list_active(&self) -> Vec<Arc<Worker>> {
        self.active.read().await.values().cloned().collect()
    }
}
