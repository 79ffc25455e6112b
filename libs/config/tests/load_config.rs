//! Loading configuration files from disk

use consumer_config::ConsumerConfig;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use tempfile::{Builder, NamedTempFile};

fn write_config(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = Builder::new()
        .prefix("consumer")
        .suffix(suffix)
        .tempfile()
        .expect("Failed to create temp file");
    file.write_all(contents.as_bytes()).expect("Failed to write config");
    file
}

#[test]
fn test_flat_key_value_file() {
    let file = write_config(
        ".cfg",
        "# broker\n\
         host=10.0.0.5\n\
         port=6380\n\
         ; workers\n\
         group_size=4\n\
         default_subscription_channel=orders:new\n\
         default_processing_stream=orders:done\n\
         monitoring_interval=10\n",
    );

    let config = ConsumerConfig::load_with_overrides(file.path(), HashMap::new()).unwrap();
    assert_eq!(config.host, "10.0.0.5");
    assert_eq!(config.port, 6380);
    assert_eq!(config.group_size, 4);
    assert_eq!(config.subscription_channel, "orders:new");
    assert_eq!(config.processing_stream, "orders:done");
    assert_eq!(config.monitoring_interval_secs, 10);
    assert_eq!(config.connection, Default::default());
}

#[test]
fn test_toml_file_with_sections() {
    let file = write_config(
        ".toml",
        r#"
host = "broker.internal"
group_size = 3
subscription_channel = "events"
processing_stream = ""

[connection]
publish_timeout_ms = 750
poll_interval_ms = 50

[reconnect]
max_attempts = 0
"#,
    );

    let config = ConsumerConfig::load_with_overrides(file.path(), HashMap::new()).unwrap();
    assert_eq!(config.host, "broker.internal");
    assert_eq!(config.port, 6379);
    assert_eq!(config.group_size, 3);
    assert!(!config.publishing_enabled());
    assert_eq!(config.connection.publish_timeout_ms, 750);
    assert_eq!(config.connection.poll_interval_ms, 50);
    assert_eq!(config.connection.read_buffer_size, 1024);
    assert_eq!(config.reconnect.max_attempts, 0);
    assert_eq!(config.reconnect.max_backoff_ms, 30_000);
}

#[test]
fn test_environment_overrides_file() {
    let file = write_config(".cfg", "port=6380\ngroup_size=2\n");
    let overrides = HashMap::from([
        ("STREAM_CONSUMER__GROUP_SIZE".to_string(), "8".to_string()),
        (
            "STREAM_CONSUMER__RECONNECT__MAX_ATTEMPTS".to_string(),
            "1".to_string(),
        ),
    ]);

    let config = ConsumerConfig::load_with_overrides(file.path(), overrides).unwrap();
    assert_eq!(config.port, 6380);
    assert_eq!(config.group_size, 8);
    assert_eq!(config.reconnect.max_attempts, 1);
}

#[test]
fn test_invalid_values_rejected() {
    let file = write_config(".cfg", "group_size=0\n");
    let err = ConsumerConfig::load_with_overrides(file.path(), HashMap::new()).unwrap_err();
    assert!(err.to_string().contains("group_size"), "{err:#}");

    let file = write_config(".cfg", "port=not-a-port\n");
    assert!(ConsumerConfig::load_with_overrides(file.path(), HashMap::new()).is_err());
}

#[test]
fn test_missing_file_is_an_error() {
    let path = PathBuf::from("/nonexistent/consumer.cfg");
    let err = ConsumerConfig::load_with_overrides(&path, HashMap::new()).unwrap_err();
    assert!(format!("{err:#}").contains("consumer.cfg"));
}
