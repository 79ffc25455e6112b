//! Session Supervisor
//!
//! Runs subscription sessions back to back. A session connects and
//! subscribes, starts the processing side (single-path consumer or worker
//! pool), then receives until the connection fails or a stop is requested.
//!
//! ## Retry policy
//!
//! - Retryable faults (transport, protocol) are retried after an exponential
//!   backoff, up to `reconnect.max_attempts` consecutive failures.
//!   `max_attempts = 0` gives up on the first failure.
//! - A session that reached `Receiving` resets the failure count.
//! - Anything else (subscription rejected, worker panic) ends the run.
//!
//! Counters belong to the supervisor, so totals survive reconnects.

use crate::counters::GroupCounters;
use crate::error::{ConsumerError, ConsumerResult};
use crate::extractor::Extractor;
use crate::pool::WorkerPool;
use crate::processor::ProcessingContext;
use crate::publisher::PublishTarget;
use crate::shutdown::StopSignal;
use crate::single::SinglePathConsumer;
use crate::subscription::{PayloadSink, SubscriptionLoop};
use consumer_config::ConsumerConfig;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub struct Supervisor {
    config: ConsumerConfig,
    extractor: Arc<dyn Extractor>,
    counters: GroupCounters,
    stop: StopSignal,
    silent: bool,
}

/// Processing side of one session
enum SessionSink {
    Single(SinglePathConsumer),
    Group(WorkerPool),
}

impl SessionSink {
    fn start(context: &ProcessingContext, counters: &GroupCounters) -> ConsumerResult<Self> {
        if counters.len() == 1 {
            SinglePathConsumer::start(context, counters).map(SessionSink::Single)
        } else {
            WorkerPool::start(context, counters).map(SessionSink::Group)
        }
    }

    /// Stop processing; a worker panic is reported here
    fn finish(self) -> ConsumerResult<()> {
        match self {
            SessionSink::Single(mut single) => single.shutdown(),
            SessionSink::Group(mut pool) => {
                let status = pool.status();
                debug!(queue_len = status.queue_len, workers = ?status.workers, "Stopping worker pool");
                pool.shutdown()
            }
        }
    }
}

impl PayloadSink for SessionSink {
    fn deliver(&mut self, payload: String) -> ConsumerResult<()> {
        match self {
            SessionSink::Single(single) => single.deliver(payload),
            SessionSink::Group(pool) => pool.deliver(payload),
        }
    }
}

impl Supervisor {
    pub fn new(config: ConsumerConfig, extractor: Arc<dyn Extractor>) -> Self {
        let counters = GroupCounters::new(config.group_size);
        Self {
            config,
            extractor,
            counters,
            stop: StopSignal::new(),
            silent: false,
        }
    }

    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Handle for requesting a stop from another thread
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Shared handle on the cumulative counters
    pub fn counters(&self) -> GroupCounters {
        self.counters.clone()
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Run sessions until stopped or until the retry policy gives up
    ///
    /// Returns `Ok(())` after a stop request.
    pub fn run(&self) -> ConsumerResult<()> {
        if self.counters.is_empty() {
            return Err(ConsumerError::Config("group_size must be > 0".to_string()));
        }

        info!(
            host = %self.config.host,
            port = self.config.port,
            group_size = self.config.group_size,
            channel = %self.config.subscription_channel,
            stream = %self.config.processing_stream,
            "Consumer starting"
        );

        let policy = &self.config.reconnect;
        let mut failures: u32 = 0;
        let mut session: u64 = 0;

        loop {
            session += 1;
            let mut reached_receiving = false;
            let result = self.run_session(session, &mut reached_receiving);
            self.log_totals(session);

            let error = match result {
                Ok(()) => {
                    info!(session, "Consumer stopped");
                    return Ok(());
                }
                Err(e) => e,
            };

            if self.stop.is_stopped() {
                warn!(session, error = %error, "Session failed while stopping");
                return Ok(());
            }

            if !error.is_retryable() {
                error!(session, category = error.category(), error = %error, "Session failed, not retrying");
                return Err(error);
            }

            if reached_receiving {
                failures = 0;
            }
            failures += 1;

            if failures > policy.max_attempts {
                error!(
                    session,
                    failures,
                    max_attempts = policy.max_attempts,
                    error = %error,
                    "Giving up after consecutive session failures"
                );
                return Err(error);
            }

            let delay = policy.backoff_for(failures);
            warn!(
                session,
                attempt = failures,
                max_attempts = policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                category = error.category(),
                error = %error,
                "Session failed, reconnecting"
            );

            if self.stop.wait_timeout(delay) {
                info!(session, "Stop requested during backoff");
                return Ok(());
            }
        }
    }

    fn run_session(&self, session: u64, reached_receiving: &mut bool) -> ConsumerResult<()> {
        let context = ProcessingContext::new(
            self.config.subscription_channel.clone(),
            Arc::clone(&self.extractor),
            PublishTarget::from_config(&self.config),
        )
        .with_silent(self.silent);

        let mut subscription = SubscriptionLoop::connect(&self.config)?;
        debug!(session, channel = subscription.channel(), "Subscription connection open");

        if subscription.subscribe(&self.stop)?.is_none() {
            return Ok(());
        }

        // Workers start once the acknowledgement is in; later pushes wait in the socket buffer
        let mut sink = SessionSink::start(&context, &self.counters)?;

        *reached_receiving = true;
        let received = subscription.run(&mut sink, &self.stop);

        let stats = subscription.stats();
        debug!(
            session,
            delivered = stats.delivered,
            foreign_pushes = stats.foreign_pushes,
            ignored = stats.ignored,
            "Subscription session ended"
        );

        sink.finish().and(received)
    }

    fn log_totals(&self, session: u64) {
        let snapshot = self.counters.snapshot();
        info!(
            session,
            processed = snapshot.processed,
            errors = snapshot.errors,
            "Totals so far"
        );
        for (index, values) in snapshot.workers.iter().enumerate() {
            debug!(
                worker_id = index + 1,
                processed = values.processed,
                errors = values.errors,
                "Worker totals"
            );
        }
    }
}
