//! Dispatch Queue
//!
//! Unbounded FIFO between the subscription reader and the worker group,
//! guarded by one mutex/condvar pair.
//!
//! - `push` never blocks and wakes exactly one waiting worker
//! - `pop` blocks until a payload is available or the queue is stopped
//! - after `stop`, every waiter wakes, remaining payloads are still handed
//!   out, and `pop` returns `None` only once the queue is empty
//!
//! There is no back-pressure: a slow publish path lets the queue grow.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use thiserror::Error;

/// Push refused because the queue was stopped; carries the payload back
#[derive(Debug, Error, PartialEq, Eq)]
#[error("dispatch queue is stopped")]
pub struct QueueStopped(pub String);

#[derive(Debug, Default)]
pub struct DispatchQueue {
    inner: Mutex<QueueInner>,
    available: Condvar,
}

#[derive(Debug, Default)]
struct QueueInner {
    items: VecDeque<String>,
    stopped: bool,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a payload and wake one waiting worker
    pub fn push(&self, payload: String) -> Result<(), QueueStopped> {
        {
            let mut inner = self.inner.lock();
            if inner.stopped {
                return Err(QueueStopped(payload));
            }
            inner.items.push_back(payload);
        }
        self.available.notify_one();
        Ok(())
    }

    /// Take the oldest payload, blocking while the queue is empty and running
    pub fn pop(&self) -> Option<String> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(payload) = inner.items.pop_front() {
                return Some(payload);
            }
            if inner.stopped {
                return None;
            }
            self.available.wait(&mut inner);
        }
    }

    /// Refuse further pushes and wake every waiter
    pub fn stop(&self) {
        self.inner.lock().stopped = true;
        self.available.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.lock().stopped
    }

    /// Payloads waiting for a worker
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
