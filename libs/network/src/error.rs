//! Transport Error Types
//!
//! Failures of a single broker connection: resolving and connecting, moving
//! bytes, deadlines, and the peer going away.

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Main transport error type
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection establishment errors
    #[error("Connection error: {message} (remote: {remote_addr:?})")]
    Connection {
        message: String,
        remote_addr: Option<SocketAddr>,
        #[source]
        source: Option<io::Error>,
    },

    /// Read/write failures on an established connection
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<io::Error>,
    },

    /// A deadline elapsed before the operation completed
    #[error("Timeout error: {operation} exceeded {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// The peer closed the connection, or it was closed locally
    #[error("Connection closed during {operation}")]
    Closed { operation: &'static str },

    /// Invalid connection parameters
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        field: Option<String>,
    },
}

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

impl TransportError {
    /// Create a network error with source
    pub fn network_with_source(message: impl Into<String>, source: io::Error) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>, remote_addr: Option<SocketAddr>) -> Self {
        Self::Connection {
            message: message.into(),
            remote_addr,
            source: None,
        }
    }

    /// Create a connection error with source
    pub fn connection_with_source(
        message: impl Into<String>,
        remote_addr: Option<SocketAddr>,
        source: io::Error,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            remote_addr,
            source: Some(source),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    pub fn closed(operation: &'static str) -> Self {
        Self::Closed { operation }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>, field: Option<&str>) -> Self {
        Self::Configuration {
            message: message.into(),
            field: field.map(|s| s.to_string()),
        }
    }

    /// Map an I/O failure of `operation`, turning socket deadline expiry into [`TransportError::Timeout`]
    ///
    /// Blocking sockets report an elapsed read/write timeout as `WouldBlock` on
    /// Unix and `TimedOut` on Windows.
    pub fn from_io(operation: &'static str, error: io::Error, deadline_ms: Option<u64>) -> Self {
        match error.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => {
                Self::timeout(operation, deadline_ms.unwrap_or(0))
            }
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Self::closed(operation),
            _ => Self::network_with_source(format!("{} failed", operation), error),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Connection { .. } => true,
            TransportError::Network { .. } => true,
            TransportError::Timeout { .. } => true,
            TransportError::Closed { .. } => true,
            TransportError::Configuration { .. } => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            TransportError::Connection { .. } => "connection",
            TransportError::Network { .. } => "network",
            TransportError::Timeout { .. } => "timeout",
            TransportError::Closed { .. } => "closed",
            TransportError::Configuration { .. } => "configuration",
        }
    }
}
