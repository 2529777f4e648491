use std::io::Write;

use serial_test::serial;

use super::settings::{PartialBrokerSettings, PartialSettings};
use super::{Settings, load_config, load_config_from};

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.broker.host, "broker.emqx.io");
    assert_eq!(settings.broker.port, 8084);
    assert!(settings.broker.use_tls);
    assert_eq!(settings.retry.delay_ms, 5_000);
    assert_eq!(settings.retry.max_attempts, None);
    assert!(!settings.retry.retry_initial_failure);
    assert_eq!(settings.identity.prefix, "Anon_");
}

#[test]
fn test_broker_url() {
    let mut broker = Settings::default().broker;
    assert_eq!(broker.url(), "wss://broker.emqx.io:8084/mqtt");

    broker.use_tls = false;
    broker.host = "127.0.0.1".to_string();
    broker.port = 9001;
    broker.path = "mqtt".to_string();
    assert_eq!(broker.url(), "ws://127.0.0.1:9001/mqtt");
}

#[test]
fn test_merge_keeps_defaults_for_missing_fields() {
    let partial = PartialSettings {
        broker: Some(PartialBrokerSettings {
            room: Some("lobby".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    };
    let settings = Settings::merged(partial);
    assert_eq!(settings.broker.room, "lobby");
    assert_eq!(settings.broker.host, "broker.emqx.io");
    assert_eq!(settings.retry, Settings::default().retry);
}

#[test]
#[serial]
fn test_load_config_without_sources_is_default() {
    temp_env::with_vars_unset(
        ["TERMCHAT__BROKER__HOST", "TERMCHAT__RETRY__DELAY_MS"],
        || {
            let settings = load_config().unwrap();
            assert_eq!(settings, Settings::default());
        },
    );
}

#[test]
#[serial]
fn test_environment_overrides() {
    temp_env::with_vars(
        [
            ("TERMCHAT__BROKER__HOST", Some("localhost")),
            ("TERMCHAT__BROKER__USE_TLS", Some("false")),
            ("TERMCHAT__RETRY__DELAY_MS", Some("250")),
        ],
        || {
            let settings = load_config().unwrap();
            assert_eq!(settings.broker.host, "localhost");
            assert!(!settings.broker.use_tls);
            assert_eq!(settings.retry.delay_ms, 250);
            assert_eq!(settings.broker.port, 8084);
        },
    );
}

#[test]
#[serial]
fn test_file_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("termchat.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        "[broker]\nroom = \"ops\"\nkeep_alive_secs = 30\n\n[retry]\nmax_attempts = 3\nbackoff_factor = 2.0\n\n[identity]\nname = \"Anon_1\""
    )
    .unwrap();

    let settings = load_config_from(Some(&path)).unwrap();
    assert_eq!(settings.broker.room, "ops");
    assert_eq!(settings.broker.keep_alive_secs, 30);
    assert_eq!(settings.retry.max_attempts, Some(3));
    assert_eq!(settings.retry.backoff_factor, 2.0);
    assert_eq!(settings.identity.name.as_deref(), Some("Anon_1"));
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    assert!(load_config_from(Some(&path)).is_err());
}
