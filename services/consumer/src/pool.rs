//! Worker Pool
//!
//! Owns the group's workers and the dispatch queue they share. Each payload
//! goes to exactly one worker; completion order across workers is not
//! preserved.
//!
//! Worker ids are handed out by [`WorkerPool::start`] from its own sequence,
//! `1..=group_size`, so the same id always maps to the same counters slot.

use crate::counters::GroupCounters;
use crate::error::{ConsumerError, ConsumerResult};
use crate::processor::ProcessingContext;
use crate::queue::DispatchQueue;
use crate::subscription::PayloadSink;
use crate::worker::{Worker, WorkerState};
use std::sync::Arc;
use tracing::{info, warn};

pub struct WorkerPool {
    queue: Arc<DispatchQueue>,
    workers: Vec<Worker>,
}

/// Queue depth and per-worker states at one instant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStatus {
    pub queue_len: usize,
    pub workers: Vec<(u64, WorkerState)>,
}

impl WorkerPool {
    /// Start one worker per counters slot
    ///
    /// Publish connections are opened before each thread starts; if any fails,
    /// the workers already running are stopped and the error is returned.
    pub fn start(context: &ProcessingContext, counters: &GroupCounters) -> ConsumerResult<Self> {
        let queue = Arc::new(DispatchQueue::new());
        let mut pool = Self {
            queue: Arc::clone(&queue),
            workers: Vec::with_capacity(counters.len()),
        };

        for worker_id in (1..).take(counters.len()) {
            let started = counters
                .for_worker(worker_id)
                .ok_or_else(|| ConsumerError::Config(format!("no counters for worker {}", worker_id)))
                .and_then(|slot| context.processor(worker_id, slot))
                .and_then(|processor| Worker::spawn(processor, Arc::clone(&queue)));

            match started {
                Ok(worker) => pool.workers.push(worker),
                Err(e) => {
                    warn!(worker_id, error = %e, "Worker failed to start, stopping pool");
                    if let Err(join_error) = pool.shutdown() {
                        warn!(error = %join_error, "Worker failed while stopping pool");
                    }
                    return Err(e);
                }
            }
        }

        info!(workers = pool.workers.len(), "Worker pool started");
        Ok(pool)
    }

    /// Queue a payload for the next free worker
    pub fn submit(&self, payload: String) -> bool {
        match self.queue.push(payload) {
            Ok(()) => true,
            Err(rejected) => {
                warn!(payload = %rejected.0, "Dispatch queue stopped, payload dropped");
                false
            }
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            queue_len: self.queue.len(),
            workers: self.workers.iter().map(|w| (w.id(), w.state())).collect(),
        }
    }

    /// Stop accepting payloads, let workers drain the queue, and join them
    ///
    /// Every worker is joined even if one panicked; the first panic is returned.
    pub fn shutdown(&mut self) -> ConsumerResult<()> {
        self.queue.stop();

        let pending = self.queue.len();
        if pending > 0 {
            info!(pending, "Draining dispatch queue");
        }

        let mut first_error = None;
        for worker in self.workers.drain(..) {
            if let Err(e) = worker.join() {
                warn!(error = %e, "Worker did not stop cleanly");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// A payload refused after shutdown is logged and dropped, not an error
impl PayloadSink for WorkerPool {
    fn deliver(&mut self, payload: String) -> ConsumerResult<()> {
        self.submit(payload);
        Ok(())
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            let _ = self.shutdown();
        }
    }
}
