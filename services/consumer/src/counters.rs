//! Processing counters
//!
//! Each worker increments its own [`Counters`]; nothing on the hot path
//! touches a shared total. Group totals are summed when someone asks.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cumulative successfully processed count, readable from any thread
pub trait ProcessedCount: Send + Sync {
    fn processed_count(&self) -> u64;
}

/// Per-worker processed/error counts
#[derive(Debug, Default)]
pub struct Counters {
    processed: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time copy of one worker's counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterValues {
    pub processed: u64,
    pub errors: u64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Release);
    }

    #[inline]
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Release);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Acquire)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Acquire)
    }

    pub fn values(&self) -> CounterValues {
        CounterValues {
            processed: self.processed(),
            errors: self.errors(),
        }
    }
}

impl ProcessedCount for Counters {
    fn processed_count(&self) -> u64 {
        self.processed()
    }
}

/// Counters of every worker slot in the group
///
/// Slots are created once and handed to each session's workers, so totals
/// keep accumulating across reconnects. Cloning shares the same slots.
#[derive(Debug, Clone)]
pub struct GroupCounters {
    workers: Arc<[Arc<Counters>]>,
}

/// Group totals plus the per-worker breakdown, indexed by worker id - 1
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSnapshot {
    pub processed: u64,
    pub errors: u64,
    pub workers: Vec<CounterValues>,
}

impl GroupCounters {
    pub fn new(group_size: usize) -> Self {
        Self {
            workers: (0..group_size).map(|_| Arc::new(Counters::new())).collect(),
        }
    }

    /// Counters for the worker with 1-based `worker_id`
    pub fn for_worker(&self, worker_id: u64) -> Option<Arc<Counters>> {
        let index = usize::try_from(worker_id).ok()?.checked_sub(1)?;
        self.workers.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn processed(&self) -> u64 {
        self.workers.iter().map(|c| c.processed()).sum()
    }

    pub fn errors(&self) -> u64 {
        self.workers.iter().map(|c| c.errors()).sum()
    }

    pub fn snapshot(&self) -> GroupSnapshot {
        let workers: Vec<CounterValues> = self.workers.iter().map(|c| c.values()).collect();
        GroupSnapshot {
            processed: workers.iter().map(|v| v.processed).sum(),
            errors: workers.iter().map(|v| v.errors).sum(),
            workers,
        }
    }
}

impl ProcessedCount for GroupCounters {
    fn processed_count(&self) -> u64 {
        self.processed()
    }
}

impl<T: ProcessedCount + ?Sized> ProcessedCount for Arc<T> {
    fn processed_count(&self) -> u64 {
        (**self).processed_count()
    }
}
