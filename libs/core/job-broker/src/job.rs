//! Jobs: an ordered, fixed-length sequence of `Function`s sharing a data map.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::function::Function;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Doing,
    Done,
    Failed,
}

impl JobState {
    /// `done` and `failed` are terminal: no further state change may occur.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub name: String,
    pub functions: Vec<Function>,
    pub current_function: usize,
    pub state: JobState,
    pub data: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
}

impl Job {
    /// Rejects an empty function list with `InvalidArgument`; the functions
    /// sequence length never changes after this point.
    pub fn new(
        name: impl Into<String>,
        functions: Vec<Function>,
        data: HashMap<String, serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        if functions.is_empty() {
            return Err(CoreError::InvalidArgument(
                "job must have at least one function".into(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name: name.into(),
            functions,
            current_function: 0,
            state: JobState::Pending,
            data,
            created_at: now,
            scheduled_at: now,
        })
    }

    pub fn current_function(&self) -> &Function {
        &self.functions[self.current_function]
    }

    pub fn current_function_mut(&mut self) -> &mut Function {
        &mut self.functions[self.current_function]
    }

    /// Advances `current_function` by one. Returns `true` if there was a
    /// next step to advance into, `false` if this was already the last step
    /// (index is left unchanged: `current_function` only ever increases, and
    /// never past `len - 1`).
    pub fn advance(&mut self) -> bool {
        if self.current_function == self.functions.len() - 1 {
            return false;
        }
        self.current_function += 1;
        true
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn touch_scheduled_at(&mut self, now: DateTime<Utc>) {
        self.scheduled_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(functions: Vec<Function>) -> Result<Job, CoreError> {
        Job::new("job", functions, HashMap::new(), Utc::now())
    }

    #[test]
    fn empty_functions_rejected() {
        let err = sample(vec![]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[test]
    fn created_pending_at_index_zero() {
        let job = sample(vec![Function::new("f1")]).unwrap();
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.current_function, 0);
    }

    #[test]
    fn advance_stops_at_last_step() {
        let mut job = sample(vec![Function::new("f1"), Function::new("f2")]).unwrap();
        assert!(job.advance());
        assert_eq!(job.current_function, 1);
        assert!(!job.advance());
        assert_eq!(job.current_function, 1);
    }

    #[test]
    fn terminal_states() {
        assert!(JobState::Done.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Doing.is_terminal());
    }
}
