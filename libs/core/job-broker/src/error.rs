//! Error types for the scheduling core.
//!
//! - `CoreError` - the closed error enum every fallible broker/worker/job-manager
//!   operation returns.
//! - `ErrorCategory` - classification used for log severity, mirroring the
//!   transient/permanent split used elsewhere for retry-aware error handling;
//!   here it never drives retry decisions itself (that's `Function`'s job).

use thiserror::Error;
use uuid::Uuid;

/// Errors produced by the broker, worker registry, job manager, and callback
/// registry. Never constructed directly by the HTTP layer; see `AppError` in
/// `axum-helpers` for the client-facing conversion.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("job {0} not found")]
    JobNotFound(Uuid),

    #[error("callback {0} not found")]
    CallbackNotFound(Uuid),

    #[error("worker {0} not found")]
    WorkerNotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("function {function} has no retry options configured")]
    NoRetryOption { function: String },

    #[error("function {function} exceeded its retry limit of {limit}")]
    RetryLimitExceeded { function: String, limit: u32 },

    #[error("connection error reaching worker: {0}")]
    ConnectionError(String),

    #[error("unknown callback status code: {0}")]
    UnknownStatusCode(i32),

    #[error("broker is stopped, cannot schedule")]
    BrokerStopped,
}

/// Coarse classification of a `CoreError`, used only to pick a log level and
/// to decide whether an error should ever reach the worker's connection
/// failure counter. Retry eligibility itself is computed from `Function`'s
/// own retry-options, never from this category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Expected, recoverable outcome of normal operation (not-found, retry
    /// exhaustion) — logged at info/warn.
    Expected,
    /// A network-level fault talking to a worker — logged at warn, counted
    /// against the worker's consecutive-failure counter.
    ConnectionFault,
    /// Programming/protocol violation that should not happen in a healthy
    /// deployment — logged at error.
    Unexpected,
}

impl CoreError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CoreError::JobNotFound(_)
            | CoreError::CallbackNotFound(_)
            | CoreError::WorkerNotFound(_)
            | CoreError::InvalidArgument(_)
            | CoreError::NoRetryOption { .. }
            | CoreError::RetryLimitExceeded { .. } => ErrorCategory::Expected,
            CoreError::ConnectionError(_) => ErrorCategory::ConnectionFault,
            CoreError::UnknownStatusCode(_) | CoreError::BrokerStopped => {
                ErrorCategory::Unexpected
            }
        }
    }

    pub fn is_connection_fault(&self) -> bool {
        matches!(self.category(), ErrorCategory::ConnectionFault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_error_is_connection_fault() {
        let err = CoreError::ConnectionError("refused".into());
        assert!(err.is_connection_fault());
        assert_eq!(err.category(), ErrorCategory::ConnectionFault);
    }

    #[test]
    fn not_found_is_expected() {
        let err = CoreError::JobNotFound(Uuid::nil());
        assert_eq!(err.category(), ErrorCategory::Expected);
        assert!(!err.is_connection_fault());
    }

    #[test]
    fn unknown_status_is_unexpected() {
        let err = CoreError::UnknownStatusCode(999);
        assert_eq!(err.category(), ErrorCategory::Unexpected);
    }
}
