mod settings;

use std::path::Path;

use config::{Config, ConfigError, Environment, File};

use crate::config::settings::PartialSettings;

pub use settings::{BrokerSettings, IdentitySettings, LoggingSettings, RetrySettings, Settings};

/// Prefix of the environment variables that override settings,
/// e.g. `TERMCHAT__BROKER__HOST`.
pub const ENV_PREFIX: &str = "TERMCHAT";

/// Loads the configuration from `config/default` (if present) and the environment.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(None)
}

/// Loads the configuration from an explicit file (required when given) or
/// the optional `config/default`, then applies environment overrides.
/// Missing values are merged with `Settings::default()`.
pub fn load_config_from(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let file = match path {
        Some(path) => File::from(path).required(true),
        None => File::with_name("config/default").required(false),
    };

    let builder = Config::builder().add_source(file).add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(Settings::merged(partial))
}

#[cfg(test)]
mod tests;
