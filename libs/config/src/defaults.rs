//! Default configuration values

/// Broker endpoint
pub const HOST: &str = "127.0.0.1";
pub const PORT: u16 = 6379;

/// Group size 1 selects the single-path consumer
pub const GROUP_SIZE: usize = 1;

/// Largest accepted worker group
pub const MAX_GROUP_SIZE: usize = u16::MAX as usize;

pub const SUBSCRIPTION_CHANNEL: &str = "messages:published";
pub const PROCESSING_STREAM: &str = "messages:processed";

/// Throughput report interval (seconds), 0 disables reporting
pub const MONITORING_INTERVAL_SECS: u64 = 3;

/// Connection defaults
pub mod connection {
    /// Connect deadline (milliseconds), 0 waits indefinitely
    pub const CONNECT_TIMEOUT_MS: u64 = 5_000;

    /// Publish round-trip deadline (milliseconds), 0 waits indefinitely
    pub const PUBLISH_TIMEOUT_MS: u64 = 5_000;

    /// How often the subscription reader wakes to check for shutdown (milliseconds)
    pub const POLL_INTERVAL_MS: u64 = 250;

    /// Socket read chunk size (bytes)
    pub const READ_BUFFER_SIZE: usize = 1024;
}

/// Reconnect defaults
pub mod reconnect {
    /// Consecutive failed sessions tolerated, 0 fails on the first error
    pub const MAX_ATTEMPTS: u32 = 5;

    pub const INITIAL_BACKOFF_MS: u64 = 500;

    pub const MAX_BACKOFF_MS: u64 = 30_000;
}
