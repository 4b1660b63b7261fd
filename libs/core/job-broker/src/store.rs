//! The broker's by-id job store: a 5-minute idle-TTL cache, sliding on every
//! touch (schedule or mutation). Reporting reads (`List`/`Get`) never mutate
//! the TTL clock themselves.

use std::time::Duration;

use moka::future::Cache;
use uuid::Uuid;

use crate::error::CoreError;
use crate::job::Job;

pub const JOB_IDLE_TTL: Duration = Duration::from_secs(5 * 60);

pub struct JobStore {
    by_id: Cache<Uuid, Job>,
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            by_id: Cache::builder().time_to_idle(JOB_IDLE_TTL).build(),
        }
    }

    pub async fn put(&self, job: Job) {
        self.by_id.insert(job.id, job).await;
    }

    pub async fn get(&self, id: Uuid) -> Result<Job, CoreError> {
        self.by_id.get(&id).await.ok_or(CoreError::JobNotFound(id))
    }

    /// Read-only snapshot for reporting; not on the hot path.
    pub async fn list(&self) -> Vec<Job> {
        self.by_id.iter().map(|(_, job)| job).collect()
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Function;
    use chrono::Utc;

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let store = JobStore::new();
        let job = Job::new("j", vec![Function::new("f1")], Default::default(), Utc::now()).unwrap();
        let id = job.id;
        store.put(job).await;
        let fetched = store.get(id).await.unwrap();
        assert_eq!(fetched.id, id);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = JobStore::new();
        assert!(matches!(
            store.get(Uuid::new_v4()).await,
            Err(CoreError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_returns_all_stored() {
        let store = JobStore::new();
        let j1 = Job::new("a", vec![Function::new("f1")], Default::default(), Utc::now()).unwrap();
        let j2 = Job::new("b", vec![Function::new("f1")], Default::default(), Utc::now()).unwrap();
        store.put(j1.clone()).await;
        store.put(j2.clone()).await;
        let listed = store.list().await;
        assert_eq!(listed.len(), 2);
    }
}
