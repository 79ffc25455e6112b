//! Broker Transports
//!
//! Only plain TCP is spoken to the broker. A connection is owned by exactly one
//! thread and is never shared, so the transport is a concrete blocking type
//! rather than a trait object.

use std::fmt;
use std::time::Duration;

pub mod tcp;

pub use tcp::{ConnectionStats, TcpConnection};

/// Broker address as configured: a host name or IP literal plus port
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Socket-level settings applied when a connection is opened
///
/// `None` for any timeout means the operation blocks indefinitely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub nodelay: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_millis(crate::DEFAULT_CONNECT_TIMEOUT_MS)),
            read_timeout: None,
            write_timeout: None,
            nodelay: true,
        }
    }
}

impl ConnectionOptions {
    /// Apply the same deadline to reads and writes
    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self.write_timeout = Some(timeout);
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }
}
