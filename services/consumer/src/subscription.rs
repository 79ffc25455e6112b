//! Subscription Loop
//!
//! Reads the subscription connection and routes each pushed payload to a
//! [`PayloadSink`]: the worker pool in grouped mode, the single-path
//! consumer otherwise.
//!
//! ```text
//! Disconnected --connect--> Connected --subscribe + ack--> Subscribed
//!     --run--> Receiving --(transport/protocol error | stop)--> Closed
//! ```
//!
//! There is no unsubscribe; the loop ends only by closing the connection.
//! The socket read deadline is the poll interval, so a stop request is seen
//! within one interval without interrupting a read that is returning data.

use crate::error::{ConnectionRole, ConsumerError, ConsumerResult};
use crate::shutdown::StopSignal;
use codec::{classify_push, encode_subscribe, PushEvent, Reply, ReplyDecoder};
use consumer_config::ConsumerConfig;
use network::{ConnectionOptions, Endpoint, TcpConnection};
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, info, warn};

/// Receiver of payloads pushed on the subscribed channel
///
/// An error ends the receive loop and is returned from
/// [`SubscriptionLoop::run`].
pub trait PayloadSink {
    fn deliver(&mut self, payload: String) -> ConsumerResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Disconnected,
    Connected,
    Subscribed,
    Receiving,
    Closed,
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubscriptionState::Disconnected => "disconnected",
            SubscriptionState::Connected => "connected",
            SubscriptionState::Subscribed => "subscribed",
            SubscriptionState::Receiving => "receiving",
            SubscriptionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Counts of what arrived on the subscription connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionStats {
    /// Payloads handed to the sink
    pub delivered: u64,
    /// `message` pushes reporting a channel other than the subscribed one
    pub foreign_pushes: u64,
    /// Replies of any other shape
    pub ignored: u64,
}

pub struct SubscriptionLoop {
    channel: String,
    state: SubscriptionState,
    connection: Option<TcpConnection>,
    decoder: ReplyDecoder,
    read_buffer: Vec<u8>,
    /// Payloads that arrived before the acknowledgement
    pending: VecDeque<String>,
    stats: SubscriptionStats,
}

const ROLE: ConnectionRole = ConnectionRole::Subscription;

impl SubscriptionLoop {
    /// Open the subscription connection described by `config`
    pub fn connect(config: &ConsumerConfig) -> ConsumerResult<Self> {
        let endpoint = Endpoint::new(config.host.clone(), config.port);
        let options = ConnectionOptions {
            connect_timeout: config.connection.connect_timeout(),
            read_timeout: Some(config.connection.poll_interval()),
            write_timeout: config.connection.publish_timeout(),
            nodelay: true,
        };
        let connection = TcpConnection::open(&endpoint, &options)
            .map_err(|e| ConsumerError::transport(ROLE, e))?;

        Ok(Self::with_connection(
            connection,
            &config.subscription_channel,
            config.connection.read_buffer_size,
        ))
    }

    /// Wrap an already open connection
    pub fn with_connection(connection: TcpConnection, channel: &str, read_buffer_size: usize) -> Self {
        Self {
            channel: channel.to_string(),
            state: SubscriptionState::Connected,
            connection: Some(connection),
            decoder: ReplyDecoder::with_capacity(read_buffer_size),
            read_buffer: vec![0u8; read_buffer_size.max(1)],
            pending: VecDeque::new(),
            stats: SubscriptionStats::default(),
        }
    }

    /// Send `SUBSCRIBE` and wait for its acknowledgement
    ///
    /// Returns the subscription count reported by the broker, or `None` if a
    /// stop was requested first.
    pub fn subscribe(&mut self, stop: &StopSignal) -> ConsumerResult<Option<i64>> {
        let frame = encode_subscribe(&self.channel);
        if let Err(e) = self.connection_mut()?.send(&frame) {
            self.close();
            return Err(ConsumerError::transport(ROLE, e));
        }
        debug!(channel = %self.channel, "Subscribe command sent");

        loop {
            let reply = match self.next_reply(stop) {
                Ok(Some(reply)) => reply,
                Ok(None) => {
                    self.close();
                    return Ok(None);
                }
                Err(e) => {
                    self.close();
                    return Err(e);
                }
            };

            match classify_push(reply, &self.channel) {
                PushEvent::Subscribed { channel, count } if channel == self.channel => {
                    self.state = SubscriptionState::Subscribed;
                    info!(channel = %channel, count, "Subscribed to channel");
                    return Ok(Some(count));
                }
                PushEvent::Error { message } => {
                    self.close();
                    return Err(ConsumerError::SubscriptionRejected {
                        channel: self.channel.clone(),
                        message,
                    });
                }
                PushEvent::Message { payload } => self.pending.push_back(payload),
                event => self.record_unrouted(event),
            }
        }
    }

    /// Receive pushes until a stop is requested, the connection fails or the
    /// sink refuses a payload
    ///
    /// The connection is closed when this returns. A stop yields `Ok(())`.
    pub fn run<S: PayloadSink + ?Sized>(&mut self, sink: &mut S, stop: &StopSignal) -> ConsumerResult<()> {
        if self.state != SubscriptionState::Subscribed {
            return Err(ConsumerError::InvalidState {
                operation: "receive",
                state: self.state.to_string(),
            });
        }
        self.state = SubscriptionState::Receiving;

        let result = self.deliver_pending(sink).and_then(|()| self.receive(sink, stop));
        self.close();
        result
    }

    fn deliver_pending<S: PayloadSink + ?Sized>(&mut self, sink: &mut S) -> ConsumerResult<()> {
        while let Some(payload) = self.pending.pop_front() {
            self.stats.delivered += 1;
            sink.deliver(payload)?;
        }
        Ok(())
    }

    fn receive<S: PayloadSink + ?Sized>(&mut self, sink: &mut S, stop: &StopSignal) -> ConsumerResult<()> {
        while let Some(reply) = self.next_reply(stop)? {
            match classify_push(reply, &self.channel) {
                PushEvent::Message { payload } => {
                    self.stats.delivered += 1;
                    debug!(channel = %self.channel, bytes = payload.len(), "Received message");
                    sink.deliver(payload)?;
                }
                event => self.record_unrouted(event),
            }
        }
        Ok(())
    }

    /// Next decoded reply; `None` once a stop is requested
    ///
    /// Replies already buffered are always handed out first: the stop is only
    /// observed before going back to the socket.
    fn next_reply(&mut self, stop: &StopSignal) -> ConsumerResult<Option<Reply>> {
        loop {
            if let Some(reply) = self
                .decoder
                .next_reply()
                .map_err(|e| ConsumerError::protocol(ROLE, e))?
            {
                return Ok(Some(reply));
            }
            if stop.is_stopped() {
                return Ok(None);
            }

            let connection = self
                .connection
                .as_mut()
                .ok_or_else(|| ConsumerError::transport(ROLE, network::TransportError::closed("recv")))?;
            match connection.recv(&mut self.read_buffer) {
                Ok(read) => self.decoder.feed(&self.read_buffer[..read]),
                // Poll interval elapsed with nothing to read
                Err(e) if e.is_timeout() => continue,
                Err(e) => return Err(ConsumerError::transport(ROLE, e)),
            }
        }
    }

    fn record_unrouted(&mut self, event: PushEvent) {
        match event {
            PushEvent::ForeignMessage { channel } => {
                self.stats.foreign_pushes += 1;
                warn!(
                    subscribed = %self.channel,
                    channel = %channel,
                    "Dropping message pushed for a channel this connection did not subscribe to"
                );
            }
            PushEvent::Error { message } => {
                self.stats.ignored += 1;
                warn!(channel = %self.channel, error = %message, "Broker error on subscription connection");
            }
            other => {
                self.stats.ignored += 1;
                debug!(channel = %self.channel, event = ?other, "Ignoring reply on subscription connection");
            }
        }
    }

    fn connection_mut(&mut self) -> ConsumerResult<&mut TcpConnection> {
        self.connection
            .as_mut()
            .ok_or_else(|| ConsumerError::transport(ROLE, network::TransportError::closed("send")))
    }

    /// Close the connection; later calls are no-ops
    pub fn close(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
            self.decoder.reset();
            self.state = SubscriptionState::Closed;
            info!(
                channel = %self.channel,
                delivered = self.stats.delivered,
                foreign_pushes = self.stats.foreign_pushes,
                ignored = self.stats.ignored,
                "Subscription connection closed"
            );
        }
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn stats(&self) -> SubscriptionStats {
        self.stats
    }

    /// Payloads received before the acknowledgement and not yet delivered
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl Drop for SubscriptionLoop {
    fn drop(&mut self) {
        self.close();
    }
}

impl<S: PayloadSink + ?Sized> PayloadSink for Box<S> {
    fn deliver(&mut self, payload: String) -> ConsumerResult<()> {
        (**self).deliver(payload)
    }
}

/// Collects payloads in arrival order
impl PayloadSink for Vec<String> {
    fn deliver(&mut self, payload: String) -> ConsumerResult<()> {
        self.push(payload);
        Ok(())
    }
}
