//! Worker
//!
//! One OS thread draining the shared dispatch queue:
//! `Idle -> Processing -> Publishing -> Idle`. A stop is only observed while
//! `Idle`, inside the queue wait, so an in-flight publish always completes.

use crate::error::{ConsumerError, ConsumerResult};
use crate::processor::MessageProcessor;
use crate::queue::DispatchQueue;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Idle = 0,
    Processing = 1,
    Publishing = 2,
    Stopped = 3,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Idle,
            1 => WorkerState::Processing,
            2 => WorkerState::Publishing,
            _ => WorkerState::Stopped,
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Idle => "idle",
            WorkerState::Processing => "processing",
            WorkerState::Publishing => "publishing",
            WorkerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default)]
struct StateCell(AtomicU8);

impl StateCell {
    fn set(&self, state: WorkerState) {
        self.0.store(state as u8, Ordering::Release);
    }

    fn get(&self) -> WorkerState {
        WorkerState::from_u8(self.0.load(Ordering::Acquire))
    }
}

pub struct Worker {
    id: u64,
    state: Arc<StateCell>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Start the worker thread
    pub fn spawn(processor: MessageProcessor, queue: Arc<DispatchQueue>) -> ConsumerResult<Self> {
        let id = processor.id();
        let state = Arc::new(StateCell::default());
        let name = format!("worker-{}", id);

        let thread_state = Arc::clone(&state);
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run(processor, &queue, &thread_state))
            .map_err(|source| ConsumerError::Spawn { name, source })?;

        Ok(Self {
            id,
            state,
            handle: Some(handle),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.state.get()
    }

    /// Wait for the thread to finish; the queue must already be stopped
    pub fn join(mut self) -> ConsumerResult<()> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| ConsumerError::WorkerPanicked { worker_id: self.id }),
            None => Ok(()),
        }
    }
}

fn run(mut processor: MessageProcessor, queue: &DispatchQueue, state: &StateCell) {
    let worker_id = processor.id();
    info!(worker_id, "Worker ready");

    while let Some(payload) = queue.pop() {
        state.set(WorkerState::Processing);
        if let Some(message) = processor.prepare(&payload) {
            state.set(WorkerState::Publishing);
            processor.deliver(message);
        }
        state.set(WorkerState::Idle);

        let counts = processor.counters().values();
        debug!(
            worker_id,
            processed = counts.processed,
            errors = counts.errors,
            "Messages processed so far"
        );
    }

    state.set(WorkerState::Stopped);
    processor.close();

    let counts = processor.counters().values();
    info!(
        worker_id,
        processed = counts.processed,
        errors = counts.errors,
        "Worker stopped"
    );
}
