//! Callback issuance, lookup, and the expiry sweep's source of truth.
//!
//! Backed by `moka`'s async cache for the same reason the original used an
//! in-memory TTL cache: O(1) get/insert/remove plus a passive per-entry
//! expiry as a leak safety net. The expirer sweep (`expirer.rs`) is the
//! behavioral mechanism the spec actually requires — it must observe and
//! react to expired callbacks, not just let them silently evaporate — so it
//! walks a side index of (callback id, expiry) pairs rather than relying on
//! moka's lazy eviction timing.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::CoreError;

pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callback {
    pub id: Uuid,
    pub job_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expired_at: DateTime<Utc>,
}

impl Callback {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expired_at <= now
    }
}

/// Callback registry. `create` issues a fresh callback for a job's in-flight
/// step; `get`/`delete` are used by the HTTP callback handler; `all_expired`
/// is used by the expirer's once-per-second sweep.
pub struct CallbackRegistry {
    by_id: Cache<Uuid, Callback>,
    // Side index so `all_expired` doesn't need to iterate moka's internals;
    // kept in lockstep with `by_id` under the same mutex.
    index: Mutex<Vec<Uuid>>,
    // Tombstones for ids this registry has already resolved (worker callback
    // or expirer sweep), so the HTTP handler can tell "never existed" (400)
    // apart from "already handled, arrived late" (200, no-op).
    resolved: Cache<Uuid, ()>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self {
            by_id: Cache::builder()
                .time_to_live(Duration::from_secs(5 * 60))
                .build(),
            index: Mutex::new(Vec::new()),
            resolved: Cache::builder()
                .time_to_live(Duration::from_secs(5 * 60))
                .build(),
        }
    }

    pub async fn create(&self, job_id: Uuid, timeout: Duration, now: DateTime<Utc>) -> Callback {
        let callback = Callback {
            id: Uuid::new_v4(),
            job_id,
            created_at: now,
            expired_at: now
                + chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::seconds(60)),
        };
        self.by_id.insert(callback.id, callback.clone()).await;
        self.index.lock().unwrap().push(callback.id);
        callback
    }

    pub async fn get(&self, id: Uuid) -> Result<Callback, CoreError> {
        self.by_id.get(&id).await.ok_or(CoreError::CallbackNotFound(id))
    }

    pub async fn delete(&self, id: Uuid) {
        self.by_id.invalidate(&id).await;
        self.index.lock().unwrap().retain(|existing| *existing != id);
        self.resolved.insert(id, ()).await;
    }

    /// Whether `id` was once valid and has already been resolved (worker
    /// callback or expirer sweep) rather than never having existed at all.
    pub async fn was_resolved(&self, id: Uuid) -> bool {
        self.resolved.get(&id).await.is_some()
    }

    /// Scans the side index for callbacks whose `expired_at <= now`,
    /// dropping ids that have already aged out of `by_id` (raced with a
    /// concurrent `delete`, or evicted by moka's own TTL).
    pub async fn all_expired(&self, now: DateTime<Utc>) -> Vec<Callback> {
        let ids: Vec<Uuid> = self.index.lock().unwrap().clone();
        let mut expired = Vec::new();
        for id in ids {
            if let Some(callback) = self.by_id.get(&id).await {
                if callback.is_expired(now) {
                    expired.push(callback);
                }
            }
        }
        expired
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedCallbackRegistry = Arc<CallbackRegistry>;
