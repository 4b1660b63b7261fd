//! Expirer: rescues jobs whose callback never fired because the worker that
//! owned them crashed or lost network. Runs once per second; a callback
//! swept here is handled exactly as a synthetic HTTP 408 and then deleted so
//! it can't be swept twice.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::callback::SharedCallbackRegistry;
use crate::job_manager::SharedJobManager;

pub const EXPIRER_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

pub struct Expirer {
    job_manager: SharedJobManager,
    callback_registry: SharedCallbackRegistry,
}

impl Expirer {
    pub fn new(job_manager: SharedJobManager, callback_registry: SharedCallbackRegistry) -> Self {
        Self {
            job_manager,
            callback_registry,
        }
    }

    /// Runs until `stop` fires. Each tick, errors from either handling or
    /// deleting a given callback are logged and do not abort the rest of
    /// the sweep.
    pub async fn run(self: Arc<Self>, mut stop: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(EXPIRER_SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep().await;
                }
                _ = stop.changed() => {
                    if *stop.borrow() {
                        break;
                    }
                }
            }
        }
    }

    async fn sweep(&self) {
        let expired = self.callback_registry.all_expired(Utc::now()).await;
        if expired.is_empty() {
            return;
        }
        info!(count = expired.len(), "expirer: found expired callbacks");

        for callback in expired {
            if let Err(err) = self.job_manager.handle_callback(&callback, 408).await {
                warn!(callback_id = %callback.id, error = %err, "expirer: failed to handle expired callback");
                continue;
            }
            self.callback_registry.delete(callback.id).await;
        }
    }
}
