//! Stream publisher
//!
//! Owns one worker's write connection. A publish is a full round trip:
//! encode `XADD`, send, read until one reply decodes, then classify it. Only
//! a bulk reply (the new entry id) counts as success.
//!
//! A transport or protocol fault mid-run leaves the connection in an unknown
//! state, so it is dropped along with any partial reply and reopened on the
//! next publish; a reopen that fails is just another publish error. Opening
//! at start-up is different: that failure belongs to the session and is
//! returned as a [`ConsumerError`].
//!
//! A reply that does not arrive within the publish timeout counts as a
//! connection fault, so a late reply can never be taken for the next one.

use crate::error::{ConnectionRole, ConsumerError, ConsumerResult, PublishError};
use codec::{encode_publish, encode_values_publish, Reply, ReplyDecoder};
use consumer_config::ConsumerConfig;
use network::{ConnectionOptions, ConnectionStats, Endpoint, TcpConnection, TransportError};
use tracing::{debug, info, warn};
use types::ProcessedMessage;

/// Where and how processed messages are published
#[derive(Debug, Clone)]
pub struct PublishTarget {
    pub stream: String,
    pub endpoint: Endpoint,
    pub options: ConnectionOptions,
    pub read_buffer_size: usize,
}

impl PublishTarget {
    /// `None` when no processing stream is configured
    pub fn from_config(config: &ConsumerConfig) -> Option<Self> {
        if !config.publishing_enabled() {
            return None;
        }

        let options = ConnectionOptions {
            connect_timeout: config.connection.connect_timeout(),
            read_timeout: config.connection.publish_timeout(),
            write_timeout: config.connection.publish_timeout(),
            nodelay: true,
        };

        Some(Self {
            stream: config.processing_stream.clone(),
            endpoint: Endpoint::new(config.host.clone(), config.port),
            options,
            read_buffer_size: config.connection.read_buffer_size,
        })
    }

    /// Open the publish connection for `worker_id`
    pub fn open(&self, worker_id: u64) -> ConsumerResult<StreamPublisher> {
        let connection = TcpConnection::open(&self.endpoint, &self.options).map_err(|e| {
            ConsumerError::transport(ConnectionRole::Publisher { worker_id }, e)
        })?;

        debug!(worker_id, stream = %self.stream, "Publish connection ready");

        Ok(StreamPublisher {
            worker_id,
            target: self.clone(),
            connection: Some(connection),
            decoder: ReplyDecoder::with_capacity(self.read_buffer_size),
            read_buffer: vec![0u8; self.read_buffer_size.max(1)],
            reconnects: 0,
        })
    }
}

#[derive(Debug)]
pub struct StreamPublisher {
    worker_id: u64,
    target: PublishTarget,
    connection: Option<TcpConnection>,
    decoder: ReplyDecoder,
    read_buffer: Vec<u8>,
    reconnects: u64,
}

impl StreamPublisher {
    /// Append `message` to the stream; returns the broker-assigned entry id
    pub fn publish(&mut self, message: ProcessedMessage) -> Result<String, PublishError> {
        let frame = encode_publish(&self.target.stream, &message.into_stream_fields());
        self.append(&frame)
    }

    /// Append positional `values` to the stream as fields `value1..valueN`
    ///
    /// An empty value list is refused before anything is sent.
    pub fn publish_values<S: AsRef<str>>(&mut self, values: &[S]) -> Result<String, PublishError> {
        let frame = encode_values_publish(&self.target.stream, values).map_err(PublishError::Invalid)?;
        self.append(&frame)
    }

    fn append(&mut self, frame: &[u8]) -> Result<String, PublishError> {
        match self.round_trip(frame) {
            Ok(reply) => classify_publish_reply(&self.target.stream, reply),
            Err(e) => {
                if e.is_connection_fault() {
                    warn!(
                        worker_id = self.worker_id,
                        error = %e,
                        "Publish connection fault, reconnecting on next publish"
                    );
                    self.drop_connection();
                }
                Err(e)
            }
        }
    }

    fn round_trip(&mut self, frame: &[u8]) -> Result<Reply, PublishError> {
        if self.connection.is_none() {
            self.reopen()?;
        }
        let connection = self
            .connection
            .as_mut()
            .ok_or(TransportError::closed("send"))?;

        connection.send(frame)?;

        loop {
            if let Some(reply) = self.decoder.next_reply()? {
                return Ok(reply);
            }
            let read = connection.recv(&mut self.read_buffer)?;
            self.decoder.feed(&self.read_buffer[..read]);
        }
    }

    fn reopen(&mut self) -> Result<(), PublishError> {
        let connection = TcpConnection::open(&self.target.endpoint, &self.target.options)?;
        self.reconnects += 1;
        info!(
            worker_id = self.worker_id,
            reconnects = self.reconnects,
            "Publish connection reopened"
        );
        self.connection = Some(connection);
        Ok(())
    }

    fn drop_connection(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
        self.decoder.reset();
    }

    pub fn stream(&self) -> &str {
        &self.target.stream
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Times the connection was reopened after a fault
    pub fn reconnects(&self) -> u64 {
        self.reconnects
    }

    pub fn connection_stats(&self) -> Option<ConnectionStats> {
        self.connection.as_ref().map(TcpConnection::stats)
    }

    pub fn close(&mut self) {
        self.drop_connection();
    }
}

/// A bulk reply carries the new entry id; anything else is a failed publish
fn classify_publish_reply(stream: &str, reply: Reply) -> Result<String, PublishError> {
    match reply {
        Reply::Bulk(id) => Ok(String::from_utf8_lossy(&id).into_owned()),
        Reply::Error(message) => Err(PublishError::Rejected {
            stream: stream.to_string(),
            message,
        }),
        other => Err(PublishError::UnexpectedReply {
            stream: stream.to_string(),
            kind: other.kind(),
        }),
    }
}
