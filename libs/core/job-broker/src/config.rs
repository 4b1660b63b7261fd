//! Coordinator tunables read through `core_config::FromEnv`. Every field
//! falls back to its documented default when the variable is absent; a
//! malformed value is a typed config error, never a panic.

use core_config::{env_or_default, ConfigError, FromEnv};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Address the worker-registration RPC listens on.
    pub rpc_bind: String,
    /// Address the job/worker/callback/health HTTP surface listens on.
    pub http_bind: String,
    /// Externally-reachable base URL workers use to build their callback
    /// URL (`{callback_base_url}/v1/callback/{id}`). Distinct from
    /// `http_bind`: the bind address may be `0.0.0.0`, which a remote
    /// worker process cannot dial.
    pub callback_base_url: String,
    pub callback_timeout: Duration,
    pub job_queue_cap: usize,
    pub worker_refresh_interval: Duration,
}

impl FromEnv for CoordinatorConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let callback_timeout_secs: u64 = env_or_default("ASYNC_SERVER_CALLBACK_TIMEOUT_SECS", "60")
            .parse()
            .map_err(|e| ConfigError::ParseError {
                key: "ASYNC_SERVER_CALLBACK_TIMEOUT_SECS".to_string(),
                details: format!("{e}"),
            })?;

        let job_queue_cap: usize = env_or_default("ASYNC_SERVER_JOB_QUEUE_CAP", "200")
            .parse()
            .map_err(|e| ConfigError::ParseError {
                key: "ASYNC_SERVER_JOB_QUEUE_CAP".to_string(),
                details: format!("{e}"),
            })?;

        let worker_refresh_interval_secs: u64 =
            env_or_default("ASYNC_SERVER_WORKER_REFRESH_INTERVAL_SECS", "1")
                .parse()
                .map_err(|e| ConfigError::ParseError {
                    key: "ASYNC_SERVER_WORKER_REFRESH_INTERVAL_SECS".to_string(),
                    details: format!("{e}"),
                })?;

        Ok(Self {
            rpc_bind: env_or_default("ASYNC_SERVER_BIND", ":8080"),
            http_bind: env_or_default("ASYNC_SERVER_HTTP", ":8000"),
            callback_base_url: env_or_default("ASYNC_SERVER_CALLBACK_URL", "http://127.0.0.1:8000"),
            callback_timeout: Duration::from_secs(callback_timeout_secs),
            job_queue_cap,
            worker_refresh_interval: Duration::from_secs(worker_refresh_interval_secs),
        })
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            rpc_bind: ":8080".to_string(),
            http_bind: ":8000".to_string(),
            callback_base_url: "http://127.0.0.1:8000".to_string(),
            callback_timeout: Duration::from_secs(60),
            job_queue_cap: 200,
            worker_refresh_interval: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        temp_env::with_vars(
            [
                ("ASYNC_SERVER_BIND", None::<&str>),
                ("ASYNC_SERVER_HTTP", None),
                ("ASYNC_SERVER_CALLBACK_URL", None),
                ("ASYNC_SERVER_CALLBACK_TIMEOUT_SECS", None),
                ("ASYNC_SERVER_JOB_QUEUE_CAP", None),
                ("ASYNC_SERVER_WORKER_REFRESH_INTERVAL_SECS", None),
            ],
            || {
                let config = CoordinatorConfig::from_env().unwrap();
                assert_eq!(config.rpc_bind, ":8080");
                assert_eq!(config.http_bind, ":8000");
                assert_eq!(config.callback_base_url, "http://127.0.0.1:8000");
                assert_eq!(config.callback_timeout, Duration::from_secs(60));
                assert_eq!(config.job_queue_cap, 200);
            },
        );
    }

    #[test]
    fn malformed_value_is_a_typed_error_not_a_panic() {
        temp_env::with_var("ASYNC_SERVER_JOB_QUEUE_CAP", Some("not-a-number"), || {
            assert!(CoordinatorConfig::from_env().is_err());
        });
    }
}
