//! Network Infrastructure
//!
//! Blocking TCP connections to the broker. Each connection is owned by a
//! single thread; there is no pooling and no sharing.

pub mod error;
pub mod transports;

// Re-export commonly used types
pub use error::{Result, TransportError};
pub use transports::{ConnectionOptions, ConnectionStats, Endpoint, TcpConnection};

/// Connect deadline used when none is configured
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
