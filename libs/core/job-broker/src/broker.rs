//! The broker: per-capability FIFO job queues, scheduling, and fan-in
//! consumption.
//!
//! Each capability (function name) owns one bounded `async_channel` — chosen
//! over a plain `tokio::mpsc` because multiple independent consumer slots
//! (one per `Consume` call, up to a worker's `MaxParallel`) must compete for
//! jobs on the same capability, and `async_channel::Receiver` is cloneable
//! and supports exactly that multi-consumer work-stealing pop, unlike
//! `mpsc::Receiver`. The *fan-in* channel inside a single `Consume` call is a
//! `tokio::mpsc`, since there only one task (the consumer loop) ever reads it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::CoreError;
use crate::job::Job;
use crate::store::JobStore;

/// Bound on each per-capability queue. Jobs beyond this block the submitter —
/// the intended backpressure on the HTTP job-creation handler.
pub const JOB_QUEUE_CAP: usize = 200;

/// A consumer bound to the broker. Implemented by the worker record (see
/// `worker.rs`): one worker, once admitted, registers `MaxParallel`
/// consumers, each a separate `Consume` call sharing the worker's
/// capabilities and stop signal.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    /// Process one job, returning `(reschedule, result)`. `reschedule` is
    /// only meaningful on success: the caller re-invokes `Schedule` on the
    /// same job when true. A job-manager-level error has already updated job
    /// state; the broker only logs it.
    async fn process(&self, job: Job) -> (bool, Result<(), CoreError>);

    fn capabilities(&self) -> Vec<String>;

    fn stopped(&self) -> watch::Receiver<bool>;
}

struct Capability {
    sender: async_channel::Sender<Job>,
    receiver: async_channel::Receiver<Job>,
}

pub struct Broker {
    queues: RwLock<HashMap<String, Capability>>,
    store: JobStore,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
}

impl Broker {
    pub fn new() -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            queues: RwLock::new(HashMap::new()),
            store: JobStore::new(),
            stop_tx,
            stop_rx,
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_rx.borrow()
    }

    async fn queue_for(&self, capability: &str) -> (async_channel::Sender<Job>, async_channel::Receiver<Job>) {
        if let Some(existing) = self.queues.read().await.get(capability) {
            return (existing.sender.clone(), existing.receiver.clone());
        }
        let mut queues = self.queues.write().await;
        let entry = queues.entry(capability.to_string()).or_insert_with(|| {
            let (sender, receiver) = async_channel::bounded(JOB_QUEUE_CAP);
            Capability { sender, receiver }
        });
        (entry.sender.clone(), entry.receiver.clone())
    }

    /// Records the job, stamps `scheduled_at`, and enqueues it onto its
    /// current function's queue. Blocks if that queue is at capacity. Fails
    /// only if the broker has been stopped.
    pub async fn schedule(&self, mut job: Job) -> Result<(), CoreError> {
        if self.is_stopped() {
            return Err(CoreError::BrokerStopped);
        }
        job.touch_scheduled_at(Utc::now());
        let capability = job.current_function().name.clone();
        self.store.put(job.clone()).await;

        let (sender, _receiver) = self.queue_for(&capability).await;
        sender
            .send(job)
            .await
            .map_err(|_| CoreError::BrokerStopped)?;
        Ok(())
    }

    /// Registers one consumer bound to `processor`. Spawns one pump per
    /// declared capability forwarding into a private fan-in channel, then
    /// loops reading jobs off the fan-in and invoking `processor.process`.
    /// Exits (closing the fan-in sender so pumps detect it and the pumps'
    /// tasks end) when either the broker's global stop or the processor's
    /// own stop fires.
    pub async fn consume(self: &Arc<Self>, processor: Arc<dyn JobProcessor>) {
        let (fan_in_tx, mut fan_in_rx) = mpsc::channel::<Job>(1);
        let mut pump_handles = Vec::new();

        for capability in processor.capabilities() {
            let (_sender, receiver) = self.queue_for(&capability).await;
            let fan_in_tx = fan_in_tx.clone();
            let mut stop_rx = self.stop_rx.clone();
            let mut processor_stop_rx = processor.stopped();
            pump_handles.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        biased;
                        _ = stop_rx.changed(), if *stop_rx.borrow() == false => {
                            if *stop_rx.borrow() { break; }
                        }
                        _ = processor_stop_rx.changed(), if *processor_stop_rx.borrow() == false => {
                            if *processor_stop_rx.borrow() { break; }
                        }
                        job = receiver.recv() => {
                            match job {
                                Ok(job) => {
                                    if fan_in_tx.send(job).await.is_err() {
                                        break;
                                    }
                                }
                                Err(_) => break,
                            }
                        }
                    }
                }
            }));
        }
        drop(fan_in_tx);

        let mut stop_rx = self.stop_rx.clone();
        let mut processor_stop_rx = processor.stopped();
        loop {
            tokio::select! {
                biased;
                _ = stop_rx.changed(), if !*stop_rx.borrow() => {
                    if *stop_rx.borrow() { break; }
                }
                _ = processor_stop_rx.changed(), if !*processor_stop_rx.borrow() => {
                    if *processor_stop_rx.borrow() { break; }
                }
                job = fan_in_rx.recv() => {
                    match job {
                        Some(job) => {
                            let job_id = job.id;
                            let (reschedule, result) = processor.process(job.clone()).await;
                            if let Err(err) = result {
                                warn!(%job_id, error = %err, "broker: job process error");
                            }
                            if reschedule {
                                if let Err(err) = self.schedule(job).await {
                                    warn!(%job_id, error = %err, "broker: failed to reschedule job");
                                }
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        for handle in pump_handles {
            let _ = handle.await;
        }
        debug!("broker: consumer loop exited");
    }

    /// Broadcasts global stop. All consumers and pumps drain and exit; no
    /// further `schedule` succeeds.
    pub fn stop(&self) {
        info!("broker: stopping");
        let _ = self.stop_tx.send(true);
    }

    /// Persists a job's current fields without touching any queue. Used for
    /// state transitions that don't re-enqueue (terminal transitions, the
    /// `doing` marker set before dispatch).
    pub async fn persist(&self, job: Job) {
        self.store.put(job).await;
    }

    pub async fn list(&self) -> Vec<Job> {
        self.store.list().await
    }

    pub async fn get(&self, id: Uuid) -> Result<Job, CoreError> {
        self.store.get(id).await
    }
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedBroker = Arc<Broker>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Function;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProcessor {
        capabilities: Vec<String>,
        stop_tx: watch::Sender<bool>,
        stop_rx: watch::Receiver<bool>,
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl JobProcessor for CountingProcessor {
        async fn process(&self, _job: Job) -> (bool, Result<(), CoreError>) {
            self.count.fetch_add(1, Ordering::SeqCst);
            let _ = self.stop_tx.send(true);
            (false, Ok(()))
        }

        fn capabilities(&self) -> Vec<String> {
            self.capabilities.clone()
        }

        fn stopped(&self) -> watch::Receiver<bool> {
            self.stop_rx.clone()
        }
    }

    fn sample_job(function_name: &str) -> Job {
        Job::new(
            "j",
            vec![Function::new(function_name)],
            Default::default(),
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn schedule_then_consume_invokes_process_once() {
        let broker = Arc::new(Broker::new());
        let count = Arc::new(AtomicUsize::new(0));
        let (stop_tx, stop_rx) = watch::channel(false);
        let processor = Arc::new(CountingProcessor {
            capabilities: vec!["f1".into()],
            stop_tx,
            stop_rx,
            count: count.clone(),
        });

        broker.schedule(sample_job("f1")).await.unwrap();
        broker.consume(processor).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn schedule_after_stop_fails() {
        let broker = Broker::new();
        broker.stop();
        let err = broker.schedule(sample_job("f1")).await.unwrap_err();
        assert!(matches!(err, CoreError::BrokerStopped));
    }

    #[tokio::test]
    async fn list_and_get_reflect_scheduled_jobs() {
        let broker = Broker::new();
        let job = sample_job("f1");
        let id = job.id;
        broker.schedule(job).await.unwrap();

        assert_eq!(broker.list().await.len(), 1);
        assert_eq!(broker.get(id).await.unwrap().id, id);
    }
}
