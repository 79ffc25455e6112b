//! Per-message processing
//!
//! Extract, enrich, optionally publish, count. Workers and the single-path
//! consumer share this logic; they differ only in where payloads come from.

use crate::counters::Counters;
use crate::error::ConsumerResult;
use crate::extractor::Extractor;
use crate::publisher::{PublishTarget, StreamPublisher};
use std::sync::Arc;
use tracing::{debug, info, warn};
use types::ProcessedMessage;

/// Everything a processor needs besides its identity and counters
#[derive(Clone)]
pub struct ProcessingContext {
    pub source_channel: String,
    pub extractor: Arc<dyn Extractor>,
    /// `None` disables publishing; messages are counted once enriched
    pub target: Option<PublishTarget>,
    /// Per-message success logs go to `debug` instead of `info`
    pub silent: bool,
}

/// What happened to one payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Published { entry_id: String },
    /// Enriched with no stream configured
    Processed,
    /// Extractor found no identifier
    Rejected,
    PublishFailed,
}

impl ProcessingContext {
    pub fn new(
        source_channel: impl Into<String>,
        extractor: Arc<dyn Extractor>,
        target: Option<PublishTarget>,
    ) -> Self {
        Self {
            source_channel: source_channel.into(),
            extractor,
            target,
            silent: false,
        }
    }

    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Build processor `processor_id`, opening its publish connection if a stream is configured
    pub fn processor(&self, processor_id: u64, counters: Arc<Counters>) -> ConsumerResult<MessageProcessor> {
        let publisher = match &self.target {
            Some(target) => Some(target.open(processor_id)?),
            None => {
                debug!(worker_id = processor_id, "No processing stream set");
                None
            }
        };

        Ok(MessageProcessor {
            id: processor_id,
            source_channel: self.source_channel.clone(),
            extractor: Arc::clone(&self.extractor),
            publisher,
            counters,
            silent: self.silent,
        })
    }
}

pub struct MessageProcessor {
    id: u64,
    source_channel: String,
    extractor: Arc<dyn Extractor>,
    publisher: Option<StreamPublisher>,
    counters: Arc<Counters>,
    silent: bool,
}

impl MessageProcessor {
    /// Extract and enrich; a rejected payload is counted as an error here
    pub fn prepare(&self, payload: &str) -> Option<ProcessedMessage> {
        match self.extractor.extract(payload) {
            Some(message) => Some(message.enrich(self.id, &self.source_channel)),
            None => {
                self.counters.record_error();
                warn!(worker_id = self.id, payload, "No message id found in payload");
                None
            }
        }
    }

    /// Publish an enriched message (when a stream is configured) and count the outcome
    pub fn deliver(&mut self, message: ProcessedMessage) -> Outcome {
        let message_id = message.id().to_string();
        if self.silent {
            debug!(worker_id = self.id, message_id = %message_id, processed_at = message.processed_at(), "Processing message");
        } else {
            info!(worker_id = self.id, message_id = %message_id, processed_at = message.processed_at(), "Processing message");
        }

        let Some(publisher) = self.publisher.as_mut() else {
            self.counters.record_processed();
            return Outcome::Processed;
        };

        match publisher.publish(message) {
            Ok(entry_id) => {
                self.counters.record_processed();
                debug!(worker_id = self.id, message_id = %message_id, entry_id = %entry_id, stream = publisher.stream(), "Added message to stream");
                Outcome::Published { entry_id }
            }
            Err(e) => {
                self.counters.record_error();
                warn!(worker_id = self.id, message_id = %message_id, error = %e, "Publish failed");
                Outcome::PublishFailed
            }
        }
    }

    pub fn handle(&mut self, payload: &str) -> Outcome {
        match self.prepare(payload) {
            Some(message) => self.deliver(message),
            None => Outcome::Rejected,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn counters(&self) -> &Arc<Counters> {
        &self.counters
    }

    pub fn publisher(&self) -> Option<&StreamPublisher> {
        self.publisher.as_ref()
    }

    /// Close the publish connection
    pub fn close(&mut self) {
        if let Some(publisher) = self.publisher.as_mut() {
            if let Some(stats) = publisher.connection_stats() {
                debug!(
                    worker_id = self.id,
                    bytes_sent = stats.bytes_sent,
                    bytes_received = stats.bytes_received,
                    connected_for = ?stats.connected_duration,
                    "Closing publish connection"
                );
            }
            publisher.close();
        }
    }
}
