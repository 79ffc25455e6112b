//! Throughput reporter
//!
//! Samples the cumulative processed count once per sample period and, once
//! the report interval has elapsed, logs the processed delta divided by the
//! interval. An interval of zero disables reporting.

use crate::counters::ProcessedCount;
use crate::error::{ConsumerError, ConsumerResult};
use crate::shutdown::StopSignal;
use serde::Serialize;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::info;

pub const DEFAULT_SAMPLE_PERIOD: Duration = Duration::from_secs(1);

/// One throughput report
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThroughputReport {
    /// Messages processed since the previous report
    pub processed: u64,
    /// `processed` divided by the configured interval, in messages/sec
    pub rate: f64,
    pub interval_secs: u64,
}

/// Turns cumulative counts into per-interval reports
#[derive(Debug)]
pub struct RateTracker {
    interval: Duration,
    last_count: u64,
    last_report: Instant,
}

impl RateTracker {
    pub fn new(interval: Duration, started: Instant) -> Self {
        Self {
            interval,
            last_count: 0,
            last_report: started,
        }
    }

    /// Record a sample; yields a report once `interval` has elapsed since the last one
    pub fn observe(&mut self, count: u64, now: Instant) -> Option<ThroughputReport> {
        if self.interval.is_zero() || now.saturating_duration_since(self.last_report) < self.interval {
            return None;
        }

        let processed = count.saturating_sub(self.last_count);
        self.last_count = count;
        self.last_report = now;

        Some(ThroughputReport {
            processed,
            rate: processed as f64 / self.interval.as_secs_f64(),
            interval_secs: self.interval.as_secs(),
        })
    }
}

pub struct ThroughputReporter<C> {
    source: C,
    interval: Duration,
    sample_period: Duration,
    stop: StopSignal,
}

impl<C: ProcessedCount + 'static> ThroughputReporter<C> {
    pub fn new(source: C, interval: Duration, stop: StopSignal) -> Self {
        Self {
            source,
            interval,
            sample_period: DEFAULT_SAMPLE_PERIOD,
            stop,
        }
    }

    pub fn with_sample_period(mut self, sample_period: Duration) -> Self {
        self.sample_period = sample_period;
        self
    }

    /// Start the reporter thread; `None` when reporting is disabled
    pub fn spawn(self) -> ConsumerResult<Option<JoinHandle<()>>> {
        if self.interval.is_zero() {
            info!("Throughput monitoring disabled");
            return Ok(None);
        }

        let name = "throughput-monitor".to_string();
        thread::Builder::new()
            .name(name.clone())
            .spawn(move || self.run())
            .map(Some)
            .map_err(|source| ConsumerError::Spawn { name, source })
    }

    /// Sample until stopped
    pub fn run(self) {
        let mut tracker = RateTracker::new(self.interval, Instant::now());
        info!(interval_secs = self.interval.as_secs(), "Throughput monitoring started");

        while !self.stop.wait_timeout(self.sample_period) {
            if let Some(report) = tracker.observe(self.source.processed_count(), Instant::now()) {
                info!(
                    processed = report.processed,
                    rate = format_args!("{:.2}", report.rate),
                    interval_secs = report.interval_secs,
                    "Messages processed per second"
                );
            }
        }
    }
}
