//! Consumer Configuration Module
//!
//! Provides configuration loading and validation for the stream consumer.
//! The flat `key=value` files of earlier deployments load unchanged: their
//! keys are accepted as aliases of the structured field names.

use crate::defaults;
use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable prefix, separated from keys by `__`
pub const ENV_PREFIX: &str = "STREAM_CONSUMER";
const ENV_SEPARATOR: &str = "__";

/// Main consumer configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Broker host name or IP literal
    pub host: String,
    pub port: u16,

    /// Number of workers; 1 runs the single-path consumer
    pub group_size: usize,

    #[serde(alias = "default_subscription_channel")]
    pub subscription_channel: String,

    /// Output stream; empty disables publishing
    #[serde(alias = "default_processing_stream")]
    pub processing_stream: String,

    /// Throughput report interval; 0 disables reporting
    #[serde(alias = "monitoring_interval")]
    pub monitoring_interval_secs: u64,

    pub connection: ConnectionSettings,
    pub reconnect: ReconnectSettings,
}

/// Socket deadlines and buffering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub connect_timeout_ms: u64,
    pub publish_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub read_buffer_size: usize,
}

/// Supervisor retry policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectSettings {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            host: defaults::HOST.to_string(),
            port: defaults::PORT,
            group_size: defaults::GROUP_SIZE,
            subscription_channel: defaults::SUBSCRIPTION_CHANNEL.to_string(),
            processing_stream: defaults::PROCESSING_STREAM.to_string(),
            monitoring_interval_secs: defaults::MONITORING_INTERVAL_SECS,
            connection: ConnectionSettings::default(),
            reconnect: ReconnectSettings::default(),
        }
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: defaults::connection::CONNECT_TIMEOUT_MS,
            publish_timeout_ms: defaults::connection::PUBLISH_TIMEOUT_MS,
            poll_interval_ms: defaults::connection::POLL_INTERVAL_MS,
            read_buffer_size: defaults::connection::READ_BUFFER_SIZE,
        }
    }
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            max_attempts: defaults::reconnect::MAX_ATTEMPTS,
            initial_backoff_ms: defaults::reconnect::INITIAL_BACKOFF_MS,
            max_backoff_ms: defaults::reconnect::MAX_BACKOFF_MS,
        }
    }
}

impl ConsumerConfig {
    /// Load and validate configuration from `path` with environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let config = Self::build(path, environment())?;
        config.validate()?;
        Ok(config)
    }

    /// [`load`](Self::load) with an explicit set of environment variables
    /// instead of the process environment
    pub fn load_with_overrides(path: &Path, overrides: HashMap<String, String>) -> Result<Self> {
        let env = environment().source(Some(overrides.into_iter().collect()));
        let config = Self::build(path, env)?;
        config.validate()?;
        Ok(config)
    }

    fn build(path: &Path, env: Environment) -> Result<Self> {
        let format = file_format(path);
        let name = path
            .to_str()
            .with_context(|| format!("Configuration path {:?} is not valid UTF-8", path))?;

        info!("Loading configuration from {} ({:?})", path.display(), format);

        let settings = Config::builder()
            .add_source(File::new(name, format).required(true))
            .add_source(env)
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        let config: Self = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        debug!(?config, "Configuration loaded");
        Ok(config)
    }

    /// Override the worker group size, as the command line does
    pub fn with_group_size(mut self, group_size: usize) -> Self {
        self.group_size = group_size;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            bail!("host must not be empty");
        }

        if self.port == 0 {
            bail!("port must be > 0");
        }

        if self.group_size == 0 {
            bail!("group_size must be > 0");
        }

        if self.group_size > defaults::MAX_GROUP_SIZE {
            bail!(
                "group_size must be <= {} (got {})",
                defaults::MAX_GROUP_SIZE,
                self.group_size
            );
        }

        if self.subscription_channel.is_empty() {
            bail!("subscription_channel must not be empty");
        }

        self.connection.validate()?;
        self.reconnect.validate()?;

        Ok(())
    }

    pub fn publishing_enabled(&self) -> bool {
        !self.processing_stream.is_empty()
    }

    pub fn monitoring_interval(&self) -> Duration {
        Duration::from_secs(self.monitoring_interval_secs)
    }
}

impl ConnectionSettings {
    fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            bail!("connection.poll_interval_ms must be > 0");
        }

        if self.read_buffer_size == 0 {
            bail!("connection.read_buffer_size must be > 0");
        }

        Ok(())
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.connect_timeout_ms)
    }

    pub fn publish_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.publish_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl ReconnectSettings {
    fn validate(&self) -> Result<()> {
        if self.initial_backoff_ms > self.max_backoff_ms {
            bail!(
                "reconnect.initial_backoff_ms ({}) must be <= reconnect.max_backoff_ms ({})",
                self.initial_backoff_ms,
                self.max_backoff_ms
            );
        }

        Ok(())
    }

    /// Delay before reconnect attempt `attempt` (1-based): doubles from the
    /// initial backoff and saturates at the maximum
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
        let delay_ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(delay_ms)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}

/// `.toml` files are TOML; everything else is the flat `key=value` format
fn file_format(path: &Path) -> FileFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("toml") => FileFormat::Toml,
        _ => FileFormat::Ini,
    }
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ConsumerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 6379);
        assert_eq!(config.group_size, 1);
        assert_eq!(config.subscription_channel, "messages:published");
        assert_eq!(config.processing_stream, "messages:processed");
        assert_eq!(config.monitoring_interval(), Duration::from_secs(3));
        assert!(config.publishing_enabled());
    }

    fn assert_rejected(field: &str, mutate: impl FnOnce(&mut ConsumerConfig)) {
        let mut config = ConsumerConfig::default();
        mutate(&mut config);
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains(field), "{field}: {err}");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert_rejected("host", |c| c.host = " ".into());
        assert_rejected("port", |c| c.port = 0);
        assert_rejected("group_size", |c| c.group_size = 0);
        assert_rejected("group_size", |c| c.group_size = 70_000);
        assert_rejected("subscription_channel", |c| c.subscription_channel.clear());
        assert_rejected("poll_interval_ms", |c| c.connection.poll_interval_ms = 0);
        assert_rejected("read_buffer_size", |c| c.connection.read_buffer_size = 0);
        assert_rejected("initial_backoff_ms", |c| c.reconnect.initial_backoff_ms = 60_000);
    }

    #[test]
    fn test_empty_stream_disables_publishing() {
        let config = ConsumerConfig {
            processing_stream: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert!(!config.publishing_enabled());
    }

    #[test]
    fn test_zero_timeouts_mean_no_deadline() {
        let settings = ConnectionSettings {
            connect_timeout_ms: 0,
            publish_timeout_ms: 250,
            ..Default::default()
        };
        assert_eq!(settings.connect_timeout(), None);
        assert_eq!(settings.publish_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let reconnect = ReconnectSettings {
            max_attempts: 10,
            initial_backoff_ms: 100,
            max_backoff_ms: 1_000,
        };
        assert_eq!(reconnect.backoff_for(1), Duration::from_millis(100));
        assert_eq!(reconnect.backoff_for(2), Duration::from_millis(200));
        assert_eq!(reconnect.backoff_for(4), Duration::from_millis(800));
        assert_eq!(reconnect.backoff_for(5), Duration::from_millis(1_000));
        assert_eq!(reconnect.backoff_for(200), Duration::from_millis(1_000));
    }

    #[test]
    fn test_file_format_by_extension() {
        assert_eq!(file_format(Path::new("consumer.toml")), FileFormat::Toml);
        assert_eq!(file_format(Path::new("consumer.cfg")), FileFormat::Ini);
        assert_eq!(file_format(Path::new("consumer")), FileFormat::Ini);
    }
}
