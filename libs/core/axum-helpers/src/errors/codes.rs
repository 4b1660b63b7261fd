//! Type-safe error codes for API responses.
//!
//! Single source of truth for the `{code, error, message}` triple every
//! `AppError` variant carries into its HTTP response.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed request body or query.
    InvalidJson,
    /// Semantically invalid request (e.g. empty function list).
    InvalidArgument,
    /// Job or callback lookup miss.
    NotFound,
    /// Callback status code outside {200, 500}.
    UnknownStatus,
    /// An unexpected internal server error occurred.
    InternalError,
    /// Service is draining or not yet ready.
    ServiceUnavailable,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidJson => "INVALID_JSON",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::NotFound => "NOT_FOUND",
            Self::UnknownStatus => "UNKNOWN_STATUS",
            Self::InternalError => "INTERNAL_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidJson => 1001,
            Self::InvalidArgument => 1002,
            Self::NotFound => 1003,
            Self::UnknownStatus => 1004,
            Self::InternalError => 1005,
            Self::ServiceUnavailable => 1006,
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            Self::InvalidJson => "Invalid JSON format",
            Self::InvalidArgument => "Invalid argument",
            Self::NotFound => "Resource not found",
            Self::UnknownStatus => "Unknown callback status code",
            Self::InternalError => "An internal server error occurred",
            Self::ServiceUnavailable => "Service is temporarily unavailable",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
