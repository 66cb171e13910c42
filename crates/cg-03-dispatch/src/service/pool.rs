//! # Mapping Worker Pool
//!
//! A fixed number of workers, each draining its own bounded queue. Tasks are
//! spread round-robin over the queues. Completion order across workers is
//! not preserved.
//!
//! A panicking task is caught at the worker loop and logged; the worker
//! keeps serving its queue.

use crate::error::DispatchError;
use crate::metrics::DispatchMetrics;
use crate::service::pipeline::MappingTask;
use async_trait::async_trait;
use cg_01_mapping::MappingConfig;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Runs one task to completion.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run(&self, task: MappingTask);
}

pub struct MappingWorkerPool {
    queues: RwLock<Vec<mpsc::Sender<MappingTask>>>,
    next: AtomicUsize,
    workers: Mutex<Vec<JoinHandle<()>>>,
    metrics: Arc<DispatchMetrics>,
}

impl MappingWorkerPool {
    /// Spawn `config.parallelism` workers sharing `config.queue_capacity`.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start(
        runner: Arc<dyn TaskRunner>,
        config: &MappingConfig,
        metrics: Arc<DispatchMetrics>,
    ) -> Self {
        let parallelism = config.parallelism.max(1);
        let per_worker = (config.queue_capacity / parallelism).max(1);

        let mut queues = Vec::with_capacity(parallelism);
        let mut workers = Vec::with_capacity(parallelism);
        for worker in 0..parallelism {
            let (tx, rx) = mpsc::channel(per_worker);
            queues.push(tx);
            workers.push(tokio::spawn(worker_loop(
                worker,
                rx,
                runner.clone(),
                metrics.clone(),
            )));
        }

        info!(
            workers = parallelism,
            queue_capacity = per_worker,
            "Mapping worker pool started"
        );

        Self {
            queues: RwLock::new(queues),
            next: AtomicUsize::new(0),
            workers: Mutex::new(workers),
            metrics,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.queues.read().len()
    }

    fn next_queue(&self) -> Result<mpsc::Sender<MappingTask>, DispatchError> {
        let queues = self.queues.read();
        if queues.is_empty() {
            return Err(DispatchError::PoolClosed);
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % queues.len();
        Ok(queues[index].clone())
    }

    /// Enqueue, waiting for space if the chosen queue is full.
    pub async fn submit(&self, task: MappingTask) -> Result<(), DispatchError> {
        let queue = self.next_queue()?;
        queue
            .send(task)
            .await
            .map_err(|_| DispatchError::PoolClosed)
    }

    /// Enqueue without waiting.
    pub fn try_submit(&self, task: MappingTask) -> Result<(), DispatchError> {
        let queue = self.next_queue()?;
        match queue.try_send(task) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(task)) => {
                DispatchMetrics::incr(&self.metrics.queue_rejections);
                debug!(task = task.kind(), "Mapping queue full");
                Err(DispatchError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(DispatchError::PoolClosed),
        }
    }

    /// Stop accepting tasks and wait for the queued ones to finish.
    pub async fn shutdown(&self) {
        self.queues.write().clear();
        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            if let Err(e) = handle.await {
                error!(error = %e, "Mapping worker terminated abnormally");
            }
        }
        info!("Mapping worker pool stopped");
    }
}

async fn worker_loop(
    worker: usize,
    mut rx: mpsc::Receiver<MappingTask>,
    runner: Arc<dyn TaskRunner>,
    metrics: Arc<DispatchMetrics>,
) {
    while let Some(task) = rx.recv().await {
        let kind = task.kind();
        if let Err(payload) = AssertUnwindSafe(runner.run(task)).catch_unwind().await {
            DispatchMetrics::incr(&metrics.worker_panics);
            error!(
                worker,
                task = kind,
                panic = %panic_message(payload.as_ref()),
                "Mapping task panicked"
            );
        }
    }
    debug!(worker, "Mapping worker exiting");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
