//! Cooperative stop signal
//!
//! Threads observe the signal only at their own suspension points: the
//! subscription reader between socket polls, the reporter and the
//! supervisor's backoff between timed waits. Nothing in flight is interrupted.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<StopInner>,
}

#[derive(Debug, Default)]
struct StopInner {
    stopped: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop and wake every timed waiter
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::Release);
        let _guard = self.inner.lock.lock();
        self.inner.wake.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Sleep for `timeout` or until stopped; returns whether a stop was requested
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.lock.lock();
        while !self.is_stopped() {
            if self.inner.wake.wait_until(&mut guard, deadline).timed_out() {
                break;
            }
        }
        self.is_stopped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_wait_times_out_when_running() {
        let stop = StopSignal::new();
        let started = Instant::now();
        assert!(!stop.wait_timeout(Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_stop_wakes_waiter_early() {
        let stop = StopSignal::new();
        let waiter = {
            let stop = stop.clone();
            thread::spawn(move || {
                let started = Instant::now();
                let stopped = stop.wait_timeout(Duration::from_secs(10));
                (stopped, started.elapsed())
            })
        };

        thread::sleep(Duration::from_millis(20));
        stop.stop();

        let (stopped, waited) = waiter.join().unwrap();
        assert!(stopped);
        assert!(waited < Duration::from_secs(5));
    }

    #[test]
    fn test_already_stopped_returns_immediately() {
        let stop = StopSignal::new();
        stop.stop();
        assert!(stop.wait_timeout(Duration::from_secs(10)));
    }
}
