//! Job manager: the only writer of job state after a job has been
//! dispatched. Every mutator round-trips through the broker's by-id store so
//! readers (`GET /v1/job/{id}`) see transitions as they happen.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::broker::SharedBroker;
use crate::callback::Callback;
use crate::error::CoreError;
use crate::function::Function;
use crate::job::{Job, JobState};

pub struct JobManager {
    broker: SharedBroker,
}

impl JobManager {
    pub fn new(broker: SharedBroker) -> Self {
        Self { broker }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Job, CoreError> {
        self.broker.get(id).await
    }

    /// Rejects an empty function list; otherwise assigns a fresh id and
    /// schedules the job on its first function's queue.
    pub async fn create(
        &self,
        name: impl Into<String>,
        functions: Vec<Function>,
        data: HashMap<String, serde_json::Value>,
    ) -> Result<Job, CoreError> {
        let job = Job::new(name, functions, data, Utc::now())?;
        self.broker.schedule(job.clone()).await?;
        info!(job_id = %job.id, job_name = %job.name, "job_manager: created job");
        Ok(job)
    }

    pub async fn set_state(&self, mut job: Job, state: JobState) -> Job {
        job.state = state;
        self.broker.persist(job.clone()).await;
        job
    }

    pub async fn incr_current_function_retry_count(&self, mut job: Job) -> Job {
        job.current_function_mut().incr_retry_count();
        self.broker.persist(job.clone()).await;
        job
    }

    /// Re-enqueues the job's current function without checking retry
    /// eligibility. Only valid on the success path, where "reschedule" means
    /// "hand the next step to the broker," not "retry a failed step."
    async fn enqueue_pending(&self, mut job: Job) -> Result<Job, CoreError> {
        job.state = JobState::Pending;
        self.broker.schedule(job.clone()).await?;
        Ok(job)
    }

    /// Retry-after-failure path: eligible functions go back onto their own
    /// queue pending; ineligible functions take the job to its terminal
    /// *failed* state.
    pub async fn reschedule(&self, job: Job) -> Result<Job, CoreError> {
        match job.current_function().can_reschedule() {
            Ok(()) => {
                info!(job_id = %job.id, "job_manager: rescheduling job");
                self.enqueue_pending(job).await
            }
            Err(reason) => {
                info!(job_id = %job.id, error = %reason, "job_manager: cannot reschedule, failing job");
                Ok(self.set_state(job, JobState::Failed).await)
            }
        }
    }

    pub async fn reschedule_id(&self, id: Uuid) -> Result<Job, CoreError> {
        let job = self.get_by_id(id).await?;
        self.reschedule(job).await
    }

    /// Resolves the callback's job and applies the outcome named by
    /// `status_code`:
    /// - 200: advance past the current function. If more steps remain,
    ///   enqueue the new current function directly (no retry-eligibility
    ///   check — a normal step transition is not a retry). If that was the
    ///   last step, the job is *done*.
    /// - 500 / 408: the step failed or timed out; apply the retry-eligibility
    ///   gate via `reschedule`.
    /// - anything else: an error the coordinator doesn't understand.
    pub async fn handle_callback(&self, callback: &Callback, status_code: u16) -> Result<Job, CoreError> {
        let job = self.get_by_id(callback.job_id).await?;
        info!(job_id = %job.id, callback_id = %callback.id, status_code, "job_manager: handling callback");

        match status_code {
            200 => {
                let mut job = job;
                if job.advance() {
                    self.enqueue_pending(job).await
                } else {
                    Ok(self.set_state(job, JobState::Done).await)
                }
            }
            500 | 408 => self.reschedule(job).await,
            other => Err(CoreError::UnknownStatusCode(other as i32)),
        }
    }
}

pub type SharedJobManager = Arc<JobManager>;
