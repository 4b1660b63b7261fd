//! Dispatcher: the one-step glue between a job pulled off the broker and the
//! remote executor that will run its current function.
//!
//! The exec RPC is fire-and-forget: `dispatch` only inspects whether the
//! remote executor *accepted* the request. The function's real outcome
//! arrives later through `JobManager::handle_callback`, invoked either by the
//! callback HTTP handler or by the expirer sweep.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::callback::{Callback, SharedCallbackRegistry, DEFAULT_CALLBACK_TIMEOUT};
use crate::error::CoreError;
use crate::function::Function;
use crate::job::{Job, JobState};
use crate::job_manager::SharedJobManager;

/// The remote side of the exec RPC. One implementation talks real HTTP to a
/// worker's advertised address; tests substitute a mock.
#[async_trait]
pub trait FunctionExecutor: Send + Sync {
    async fn exec(
        &self,
        address: &str,
        function: &Function,
        data: &HashMap<String, serde_json::Value>,
        callback: &Callback,
    ) -> Result<(), CoreError>;
}

pub struct Dispatcher {
    job_manager: SharedJobManager,
    callback_registry: SharedCallbackRegistry,
    executor: Arc<dyn FunctionExecutor>,
}

impl Dispatcher {
    pub fn new(
        job_manager: SharedJobManager,
        callback_registry: SharedCallbackRegistry,
        executor: Arc<dyn FunctionExecutor>,
    ) -> Self {
        Self {
            job_manager,
            callback_registry,
            executor,
        }
    }

    /// Returns `Ok(None)` once the step has been handed off to the executor
    /// (outcome pending over the callback channel). Returns `Ok(Some(err))`
    /// when the executor rejected the request synchronously: the job has
    /// already been rescheduled or failed as a result, but `err` is
    /// returned so the caller (the worker) can still fold a connection
    /// fault into its own health tracking.
    pub async fn dispatch(&self, address: &str, job: Job) -> Result<Option<CoreError>, CoreError> {
        let job = self.job_manager.set_state(job, JobState::Doing).await;

        let callback = self
            .callback_registry
            .create(job.id, DEFAULT_CALLBACK_TIMEOUT, chrono::Utc::now())
            .await;

        let job = self.job_manager.incr_current_function_retry_count(job).await;

        let result = self
            .executor
            .exec(address, job.current_function(), &job.data, &callback)
            .await;

        match result {
            Ok(()) => Ok(None),
            Err(err) => {
                warn!(job_id = %job.id, function = %job.current_function().name, error = %err, "dispatcher: exec rejected synchronously");
                // The callback will never be honored now; drop it so the
                // expirer doesn't later reschedule a job that has already
                // been resolved here.
                self.callback_registry.delete(callback.id).await;
                self.job_manager.reschedule(job).await?;
                Ok(Some(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::Broker;
    use crate::job_manager::JobManager;

    struct AlwaysAccepts;
    #[async_trait]
    impl FunctionExecutor for AlwaysAccepts {
        async fn exec(
            &self,
            _address: &str,
            _function: &Function,
            _data: &HashMap<String, serde_json::Value>,
            _callback: &Callback,
        ) -> Result<(), CoreError> {
            Ok(())
        }
    }

    struct AlwaysConnectionFails;
    #[async_trait]
    impl FunctionExecutor for AlwaysConnectionFails {
        async fn exec(
            &self,
            _address: &str,
            _function: &Function,
            _data: &HashMap<String, serde_json::Value>,
            _callback: &Callback,
        ) -> Result<(), CoreError> {
            Err(CoreError::ConnectionError("refused".into()))
        }
    }

    fn setup() -> (Arc<JobManager>, Arc<crate::callback::CallbackRegistry>) {
        let broker = Arc::new(Broker::new());
        (
            Arc::new(JobManager::new(broker)),
            Arc::new(crate::callback::CallbackRegistry::new()),
        )
    }

    #[tokio::test]
    async fn dispatch_accepted_leaves_job_doing_with_live_callback() {
        let (jm, cb) = setup();
        let job = jm
            .create("j", vec![Function::new("f1")], Default::default())
            .await
            .unwrap();
        let dispatcher = Dispatcher::new(jm.clone(), cb.clone(), Arc::new(AlwaysAccepts));

        let outcome = dispatcher.dispatch("http://worker", job.clone()).await.unwrap();
        assert!(outcome.is_none());

        let stored = jm.get_by_id(job.id).await.unwrap();
        assert_eq!(stored.state, crate::job::JobState::Doing);
        assert_eq!(stored.current_function().retry_count, 1);
    }

    #[tokio::test]
    async fn dispatch_synchronous_failure_without_retry_options_fails_job() {
        let (jm, cb) = setup();
        let job = jm
            .create("j", vec![Function::new("f1")], Default::default())
            .await
            .unwrap();
        let dispatcher = Dispatcher::new(jm.clone(), cb, Arc::new(AlwaysConnectionFails));

        let outcome = dispatcher.dispatch("http://worker", job.clone()).await.unwrap();
        assert!(matches!(outcome, Some(CoreError::ConnectionError(_))));

        let stored = jm.get_by_id(job.id).await.unwrap();
        assert_eq!(stored.state, crate::job::JobState::Failed);
    }
}
