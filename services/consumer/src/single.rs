//! Single-path consumer
//!
//! Group size 1: the subscription thread processes each payload itself.
//! No queue, no worker threads, same per-message logic as a worker.
//!
//! A panic while processing is caught and reported as
//! [`ConsumerError::WorkerPanicked`] for processor 1, the same error a
//! panicking worker produces in grouped mode. The panic also ends the
//! receive loop, since no other processor can take over.

use crate::counters::GroupCounters;
use crate::error::{ConsumerError, ConsumerResult};
use crate::processor::{MessageProcessor, Outcome, ProcessingContext};
use crate::subscription::PayloadSink;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{error, info};

/// Processor id used when running without a group
pub const SINGLE_PROCESSOR_ID: u64 = 1;

pub struct SinglePathConsumer {
    processor: MessageProcessor,
    panicked: bool,
}

impl SinglePathConsumer {
    /// Build the processor, opening its publish connection if a stream is configured
    pub fn start(context: &ProcessingContext, counters: &GroupCounters) -> ConsumerResult<Self> {
        let slot = counters.for_worker(SINGLE_PROCESSOR_ID).ok_or_else(|| {
            ConsumerError::Config("single-path consumer needs one counters slot".to_string())
        })?;
        let processor = context.processor(SINGLE_PROCESSOR_ID, slot)?;

        info!(processor_id = SINGLE_PROCESSOR_ID, "Single-path consumer ready");
        Ok(Self {
            processor,
            panicked: false,
        })
    }

    /// Process one payload; refused once processing has panicked
    pub fn handle(&mut self, payload: &str) -> ConsumerResult<Outcome> {
        if self.panicked {
            return Err(Self::panicked_error());
        }

        let processor = &mut self.processor;
        match catch_unwind(AssertUnwindSafe(|| processor.handle(payload))) {
            Ok(outcome) => Ok(outcome),
            Err(_) => {
                self.panicked = true;
                error!(processor_id = SINGLE_PROCESSOR_ID, "Message processing panicked");
                Err(Self::panicked_error())
            }
        }
    }

    /// Close the publish connection; reports an earlier processing panic
    pub fn shutdown(&mut self) -> ConsumerResult<()> {
        self.processor.close();
        let counts = self.processor.counters().values();
        info!(
            processor_id = SINGLE_PROCESSOR_ID,
            processed = counts.processed,
            errors = counts.errors,
            "Single-path consumer stopped"
        );

        if self.panicked {
            Err(Self::panicked_error())
        } else {
            Ok(())
        }
    }

    fn panicked_error() -> ConsumerError {
        ConsumerError::WorkerPanicked {
            worker_id: SINGLE_PROCESSOR_ID,
        }
    }
}

impl PayloadSink for SinglePathConsumer {
    fn deliver(&mut self, payload: String) -> ConsumerResult<()> {
        self.handle(&payload).map(|_| ())
    }
}
