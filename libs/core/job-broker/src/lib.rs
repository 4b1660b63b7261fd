//! job-broker - the coordinator's scheduling core.
//!
//! A job is a fixed ordered sequence of named functions sharing a data map.
//! The broker holds one FIFO queue per function name; workers advertise the
//! function names (capabilities) they can run and pull jobs off the
//! matching queues. A worker's RPC to its remote executor is fire-and-forget
//! — the function's real outcome arrives later over a callback, resolved by
//! the job manager, or is synthesized by the expirer if the callback never
//! fires.
//!
//! ```text
//! HTTP job-creation → JobManager::create → Broker::schedule(job)
//!                                                 ↓
//!                                    per-capability queue (async_channel)
//!                                                 ↓
//!                              Worker (JobProcessor) ⇄ Dispatcher
//!                                                 ↓
//!                               remote executor (fire-and-forget exec RPC)
//!                                                 ↓
//!                    POST /v1/callback/{id}  →  JobManager::handle_callback
//!                    (or: Expirer sweep → synthetic 408)
//! ```

mod broker;
mod callback;
mod config;
mod dispatcher;
mod error;
mod expirer;
mod function;
mod job;
mod job_manager;
mod registry;
mod store;
mod worker;

pub use broker::{Broker, JobProcessor, SharedBroker, JOB_QUEUE_CAP};
pub use callback::{Callback, CallbackRegistry, SharedCallbackRegistry, DEFAULT_CALLBACK_TIMEOUT};
pub use config::CoordinatorConfig;
pub use dispatcher::{Dispatcher, FunctionExecutor};
pub use error::{CoreError, ErrorCategory};
pub use expirer::{Expirer, EXPIRER_SWEEP_INTERVAL};
pub use function::{Function, RetryOptions};
pub use job::{Job, JobState};
pub use job_manager::{JobManager, SharedJobManager};
pub use registry::WorkerRegistry;
pub use store::JobStore;
pub use worker::{Worker, WorkerApiClient, WorkerInfo, WorkerState, MAX_CONSECUTIVE_FAILURES, WORKER_REFRESH_INTERVAL};

/// Result type alias for coordinator operations.
pub type CoreResult<T> = Result<T, CoreError>;
