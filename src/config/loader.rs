//! Configuration loading from disk and environment.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::observability::logging::LOG_LEVEL_ENV;

/// Environment variable overriding the listener port.
pub const PORT_ENV: &str = "PORT";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value `{value}` for environment variable {var}")]
    Env { var: &'static str, value: String },
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply process environment
/// overrides, and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            parse_config(&content)?
        }
        None => AppConfig::default(),
    };

    apply_env_overrides(&mut config, |var| std::env::var(var).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::debug!(?config, "Configuration loaded");
    Ok(config)
}

/// Parse a TOML document. Missing sections and fields take their defaults.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Apply `LOG_LEVEL` and `PORT` using the given variable lookup.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(level) = lookup(LOG_LEVEL_ENV) {
        config.observability.log_level = level;
    }

    if let Some(raw) = lookup(PORT_ENV) {
        let port: u16 = raw.trim().parse().map_err(|_| ConfigError::Env {
            var: PORT_ENV,
            value: raw.clone(),
        })?;
        // An unparsable bind address is left for validation to report.
        if let Ok(mut addr) = config.listener.bind_address.parse::<SocketAddr>() {
            addr.set_port(port);
            config.listener.bind_address = addr.to_string();
        }
    }

    Ok(())
}
