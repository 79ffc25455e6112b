//! Consumer Error Types
//!
//! [`ConsumerError`] ends a session and is handed to the supervisor, which
//! decides between reconnecting and giving up. [`PublishError`] never leaves
//! a worker: it is counted and logged, and the worker moves on.

use codec::ProtocolError;
use network::TransportError;
use std::fmt;
use thiserror::Error;

/// Which connection a transport or protocol fault happened on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRole {
    Subscription,
    Publisher { worker_id: u64 },
}

impl fmt::Display for ConnectionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionRole::Subscription => write!(f, "subscription"),
            ConnectionRole::Publisher { worker_id } => write!(f, "worker {} publish", worker_id),
        }
    }
}

/// Session-ending errors
#[derive(Error, Debug)]
pub enum ConsumerError {
    /// Socket connect/send/recv failure
    #[error("Transport error on {role} connection: {source}")]
    Transport {
        role: ConnectionRole,
        #[source]
        source: TransportError,
    },

    /// Undecodable bytes from the broker
    #[error("Protocol error on {role} connection: {source}")]
    Protocol {
        role: ConnectionRole,
        #[source]
        source: ProtocolError,
    },

    /// The broker answered SUBSCRIBE with an error
    #[error("Subscription to {channel} rejected: {message}")]
    SubscriptionRejected { channel: String, message: String },

    #[error("Worker {worker_id} panicked")]
    WorkerPanicked { worker_id: u64 },

    #[error("Failed to spawn thread {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// Operation called in a state that does not allow it
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for consumer operations
pub type ConsumerResult<T> = std::result::Result<T, ConsumerError>;

impl ConsumerError {
    pub fn transport(role: ConnectionRole, source: TransportError) -> Self {
        Self::Transport { role, source }
    }

    pub fn protocol(role: ConnectionRole, source: ProtocolError) -> Self {
        Self::Protocol { role, source }
    }

    /// Whether a fresh session might succeed where this one failed
    pub fn is_retryable(&self) -> bool {
        match self {
            ConsumerError::Transport { source, .. } => source.is_retryable(),
            ConsumerError::Protocol { .. } => true,
            ConsumerError::SubscriptionRejected { .. } => false,
            ConsumerError::WorkerPanicked { .. } => false,
            ConsumerError::Spawn { .. } => false,
            ConsumerError::InvalidState { .. } => false,
            ConsumerError::Config(_) => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            ConsumerError::Transport { .. } => "transport",
            ConsumerError::Protocol { .. } => "protocol",
            ConsumerError::SubscriptionRejected { .. } => "subscription_rejected",
            ConsumerError::WorkerPanicked { .. } => "worker_panicked",
            ConsumerError::Spawn { .. } => "spawn",
            ConsumerError::InvalidState { .. } => "invalid_state",
            ConsumerError::Config(_) => "config",
        }
    }
}

/// A single failed publish
#[derive(Error, Debug)]
pub enum PublishError {
    /// Broker answered with an error reply
    #[error("Broker rejected publish to {stream}: {message}")]
    Rejected { stream: String, message: String },

    /// Broker answered with something other than an entry id
    #[error("Unexpected {kind} reply to publish on {stream}")]
    UnexpectedReply { stream: String, kind: &'static str },

    /// Command could not be built; nothing was sent
    #[error("Invalid publish command: {0}")]
    Invalid(#[source] ProtocolError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl PublishError {
    /// Transport and protocol faults leave the connection in an unknown state
    pub fn is_connection_fault(&self) -> bool {
        matches!(self, PublishError::Transport(_) | PublishError::Protocol(_))
    }
}
