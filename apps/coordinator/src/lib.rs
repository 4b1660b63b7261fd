//! Coordinator service
//!
//! The scheduling core for a distributed job pipeline: a broker of
//! per-capability job queues, a registry of worker lifecycles, and a job
//! manager that advances jobs through callback resolution or expiry.
//!
//! ## Architecture
//!
//! ```text
//! POST /v1/job  →  JobManager::create  →  Broker::schedule
//!                                                ↓
//!                               per-capability queue (async_channel)
//!                                                ↓
//!                          Worker (JobProcessor) ⇄ Dispatcher ⇄ remote executor
//!                                                ↓
//!                 POST /v1/callback/{id}  →  JobManager::handle_callback
//!                 (or: Expirer sweep → synthetic 408)
//! ```
//!
//! Two listeners share one `AppState`: the worker-registration RPC
//! (`ASYNC_SERVER_BIND`) and the job/worker/callback/health HTTP surface
//! (`ASYNC_SERVER_HTTP`).
//!
//! ## Features
//!
//! - Per-capability FIFO job queues with worker-driven consumption
//! - Worker lifecycle: pending → active ↔ unhealthy → disconnected
//! - Callback-based function completion with expiry-driven rescheduling
//! - Graceful shutdown handling
//! - Health/readiness endpoints for orchestrator probes

pub mod http;
pub mod registration;
pub mod remote;
pub mod state;

use std::sync::Arc;

use core_config::{Environment, FromEnv};
use eyre::Result;
use job_broker::{
    Broker, CallbackRegistry, CoordinatorConfig, Dispatcher, Expirer, JobManager, WorkerRegistry,
};
use axum_helpers::ReadinessFlag;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use remote::HttpFunctionExecutor;
use state::AppState;

fn normalize_bind(addr: &str) -> String {
    if let Some(port) = addr.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else {
        addr.to_string()
    }
}

async fn wait_for_stop(mut stop: watch::Receiver<bool>) {
    loop {
        if *stop.borrow() {
            return;
        }
        if stop.changed().await.is_err() {
            return;
        }
    }
}

/// Run the coordinator.
///
/// Initializes tracing from `Environment`, loads `CoordinatorConfig`,
/// constructs the broker/registry/job-manager/callback-registry, spawns the
/// expirer and both HTTP listeners as background tasks, and waits on a
/// shutdown signal (`SIGTERM`/ctrl-c) that triggers `Broker::stop()` and an
/// orderly drain before exit.
pub async fn run() -> Result<()> {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);
    info!(?environment, version = env!("CARGO_PKG_VERSION"), "coordinator: starting");

    let config = CoordinatorConfig::from_env()?;

    let broker = Arc::new(Broker::new());
    let job_manager = Arc::new(JobManager::new(broker.clone()));
    let callback_registry = Arc::new(CallbackRegistry::new());
    let executor = Arc::new(HttpFunctionExecutor::new(
        config.callback_timeout,
        config.callback_base_url.clone(),
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        job_manager.clone(),
        callback_registry.clone(),
        executor,
    ));
    let worker_registry = WorkerRegistry::new(broker.clone());
    let readiness = ReadinessFlag::new();

    let state = AppState {
        broker: broker.clone(),
        job_manager: job_manager.clone(),
        callback_registry: callback_registry.clone(),
        worker_registry,
        dispatcher,
        readiness: readiness.clone(),
    };

    let (stop_tx, stop_rx) = watch::channel(false);
    let shutdown = axum_helpers::ShutdownCoordinator::new().0;
    {
        let shutdown = shutdown.clone();
        let broker = broker.clone();
        let readiness = readiness.clone();
        tokio::spawn(async move {
            shutdown.wait_for_signal().await;
            info!("coordinator: shutdown signal received, draining");
            readiness.set_not_ready();
            broker.stop();
            let _ = stop_tx.send(true);
        });
    }

    let expirer = Arc::new(Expirer::new(job_manager.clone(), callback_registry.clone()));
    tokio::spawn(expirer.run(stop_rx.clone()));

    let http_app = http::router(state.clone());
    let rpc_app = registration::router(state);

    let http_addr = normalize_bind(&config.http_bind);
    let rpc_addr = normalize_bind(&config.rpc_bind);

    let http_listener = TcpListener::bind(&http_addr).await?;
    let rpc_listener = TcpListener::bind(&rpc_addr).await?;

    readiness.set_ready();
    info!(http = %http_addr, rpc = %rpc_addr, "coordinator: listening");

    let http_server = axum::serve(http_listener, http_app)
        .with_graceful_shutdown(wait_for_stop(stop_rx.clone()));
    let rpc_server = axum::serve(rpc_listener, rpc_app)
        .with_graceful_shutdown(wait_for_stop(stop_rx.clone()));

    tokio::try_join!(http_server, rpc_server)?;

    info!("coordinator: stopped");
    Ok(())
}
