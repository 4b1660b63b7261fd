//! A single step of a job: a function name, its arguments, and its retry policy.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Retry policy for one function. `retry_limit` bounds how many times the
/// function may be re-attempted after its first execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryOptions {
    pub retry_limit: u32,
}

/// One step of a job's pipeline.
///
/// `retry_count` is monotonic and is incremented once per dispatch attempt,
/// *before* the exec RPC is issued (see `job_manager::JobManager::handle_callback`
/// and the dispatcher's ordering rule).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub retry_options: Option<RetryOptions>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            retry_count: 0,
            retry_options: None,
        }
    }

    pub fn with_retry_options(mut self, retry_options: RetryOptions) -> Self {
        self.retry_options = Some(retry_options);
        self
    }

    /// A function is eligible for reschedule iff retry options exist AND
    /// `retry_count < retry_limit`. The two failure modes are distinguishable
    /// so callers can tell "never configured for retry" apart from
    /// "configured, but exhausted".
    pub fn can_reschedule(&self) -> Result<(), CoreError> {
        match &self.retry_options {
            None => Err(CoreError::NoRetryOption {
                function: self.name.clone(),
            }),
            Some(opts) if self.retry_count < opts.retry_limit => Ok(()),
            Some(opts) => Err(CoreError::RetryLimitExceeded {
                function: self.name.clone(),
                limit: opts.retry_limit,
            }),
        }
    }

    pub fn is_eligible_for_reschedule(&self) -> bool {
        self.can_reschedule().is_ok()
    }

    pub fn incr_retry_count(&mut self) {
        self.retry_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_retry_options_is_ineligible() {
        let f = Function::new("f1");
        assert_eq!(
            f.can_reschedule(),
            Err(CoreError::NoRetryOption {
                function: "f1".into()
            })
        );
    }

    #[test]
    fn within_limit_is_eligible() {
        let f = Function::new("f1").with_retry_options(RetryOptions { retry_limit: 2 });
        assert!(f.is_eligible_for_reschedule());
    }

    #[test]
    fn at_limit_is_ineligible() {
        let mut f = Function::new("f1").with_retry_options(RetryOptions { retry_limit: 1 });
        f.incr_retry_count();
        assert_eq!(
            f.can_reschedule(),
            Err(CoreError::RetryLimitExceeded {
                function: "f1".into(),
                limit: 1,
            })
        );
    }

    #[test]
    fn retry_count_is_monotonic() {
        let mut f = Function::new("f1");
        f.incr_retry_count();
        f.incr_retry_count();
        assert_eq!(f.retry_count, 2);
    }
}
