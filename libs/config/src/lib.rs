//! # Stream Consumer Configuration
//!
//! Loads the consumer's settings from a file layered with environment
//! overrides, and validates them before anything connects.
//!
//! ## Sources (later wins)
//!
//! 1. Built-in defaults ([`defaults`])
//! 2. Configuration file: flat `key=value` (INI) or TOML, chosen by extension
//! 3. Environment variables prefixed `STREAM_CONSUMER__`, e.g.
//!    `STREAM_CONSUMER__PORT=6380` or `STREAM_CONSUMER__RECONNECT__MAX_ATTEMPTS=0`
//!
//! ## Usage
//!
//! ```no_run
//! use consumer_config::ConsumerConfig;
//! use std::path::Path;
//!
//! let config = ConsumerConfig::load(Path::new("consumer.cfg"))?;
//! println!("subscribing to {}", config.subscription_channel);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod consumer_config;
pub mod defaults;

// Re-export commonly used types
pub use consumer_config::{ConnectionSettings, ConsumerConfig, ReconnectSettings, ENV_PREFIX};
