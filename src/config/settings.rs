use serde::Deserialize;

/// Top-level configuration settings for the chat client.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub broker: BrokerSettings,
    pub retry: RetrySettings,
    pub identity: IdentitySettings,
    pub logging: LoggingSettings,
}

/// Where the pub/sub broker lives and which topic the chat uses.
///
/// The topic is derived as `<topic_prefix>/<room>`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub use_tls: bool,
    pub keep_alive_secs: u16,
    pub topic_prefix: String,
    pub room: String,
}

/// Reconnect policy knobs. See `relay::RetryPolicy`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RetrySettings {
    pub delay_ms: u64,
    pub max_attempts: Option<u32>,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
    pub retry_initial_failure: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct IdentitySettings {
    pub prefix: String,
    /// Fixed display name. When unset a random one is generated.
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled from `Settings::default()`.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub broker: Option<PartialBrokerSettings>,
    pub retry: Option<PartialRetrySettings>,
    pub identity: Option<PartialIdentitySettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialBrokerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub use_tls: Option<bool>,
    pub keep_alive_secs: Option<u16>,
    pub topic_prefix: Option<String>,
    pub room: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialRetrySettings {
    pub delay_ms: Option<u64>,
    pub max_attempts: Option<u32>,
    pub backoff_factor: Option<f64>,
    pub max_delay_ms: Option<u64>,
    pub retry_initial_failure: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialIdentitySettings {
    pub prefix: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

/// Defaults point at the public broker the chat room has always used.
impl Default for Settings {
    fn default() -> Self {
        Self {
            broker: BrokerSettings {
                host: "broker.emqx.io".to_string(),
                port: 8084,
                path: "/mqtt".to_string(),
                use_tls: true,
                keep_alive_secs: 60,
                topic_prefix: "termchat/messages".to_string(),
                room: "main".to_string(),
            },
            retry: RetrySettings {
                delay_ms: 5_000,
                max_attempts: None,
                backoff_factor: 1.0,
                max_delay_ms: 60_000,
                retry_initial_failure: false,
            },
            identity: IdentitySettings {
                prefix: "Anon_".to_string(),
                name: None,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl Settings {
    /// Fills every field the partial settings leave out with the default.
    pub fn merged(partial: PartialSettings) -> Self {
        let default = Settings::default();
        let broker = partial.broker.unwrap_or_default();
        let retry = partial.retry.unwrap_or_default();
        let identity = partial.identity.unwrap_or_default();
        let logging = partial.logging.unwrap_or_default();

        Settings {
            broker: BrokerSettings {
                host: broker.host.unwrap_or(default.broker.host),
                port: broker.port.unwrap_or(default.broker.port),
                path: broker.path.unwrap_or(default.broker.path),
                use_tls: broker.use_tls.unwrap_or(default.broker.use_tls),
                keep_alive_secs: broker
                    .keep_alive_secs
                    .unwrap_or(default.broker.keep_alive_secs),
                topic_prefix: broker.topic_prefix.unwrap_or(default.broker.topic_prefix),
                room: broker.room.unwrap_or(default.broker.room),
            },
            retry: RetrySettings {
                delay_ms: retry.delay_ms.unwrap_or(default.retry.delay_ms),
                max_attempts: retry.max_attempts.or(default.retry.max_attempts),
                backoff_factor: retry.backoff_factor.unwrap_or(default.retry.backoff_factor),
                max_delay_ms: retry.max_delay_ms.unwrap_or(default.retry.max_delay_ms),
                retry_initial_failure: retry
                    .retry_initial_failure
                    .unwrap_or(default.retry.retry_initial_failure),
            },
            identity: IdentitySettings {
                prefix: identity.prefix.unwrap_or(default.identity.prefix),
                name: identity.name.or(default.identity.name),
            },
            logging: LoggingSettings {
                level: logging.level.unwrap_or(default.logging.level),
            },
        }
    }
}

impl BrokerSettings {
    /// The WebSocket URL of the broker, e.g. `wss://broker.emqx.io:8084/mqtt`.
    pub fn url(&self) -> String {
        let scheme = if self.use_tls { "wss" } else { "ws" };
        let path = if self.path.starts_with('/') || self.path.is_empty() {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("{}://{}:{}{}", scheme, self.host, self.port, path)
    }
}
