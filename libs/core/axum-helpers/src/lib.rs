//! Shared Axum plumbing for the coordinator HTTP surface.
//!
//! - Structured error responses (`errors`)
//! - Health/readiness handlers (`health`)
//! - Graceful shutdown coordination (`shutdown`)

pub mod errors;
pub mod health;
pub mod shutdown;

pub use errors::{AppError, ErrorCode, ErrorResponse};
pub use health::{HealthResponse, ReadinessFlag, ReadyResponse};
pub use shutdown::{shutdown_signal, ShutdownCoordinator};
