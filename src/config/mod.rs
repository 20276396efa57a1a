mod types;

pub use types::*;

use crate::{Error, Result};
use std::env;
use tracing::debug;

pub async fn load() -> Result<Config> {
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

    debug!("Loading configuration from: {}", config_path);

    let config_str = tokio::fs::read_to_string(&config_path).await?;
    let mut config = parse(&config_str)?;

    if let Ok(port) = env::var("PORT") {
        config.server.port = port
            .parse()
            .map_err(|_| Error::config(format!("Invalid PORT value: '{}'", port)))?;
    }

    if let Some(llm) = config.llm.as_mut() {
        if llm.api_key.is_empty() {
            if let Ok(key) = env::var("LLM_API_KEY") {
                llm.api_key = key;
            }
        }
    }

    validate(&config)?;
    Ok(config)
}

/// Parses a YAML document without applying environment overrides.
pub fn parse(config_str: &str) -> Result<Config> {
    Ok(serde_yaml::from_str(config_str)?)
}

pub fn validate(config: &Config) -> Result<()> {
    let bridge = &config.bridge;

    if bridge.timeout_secs == 0 {
        return Err(Error::config("bridge.timeout_secs must be greater than zero"));
    }
    if bridge.history_limit == 0 {
        return Err(Error::config("bridge.history_limit must be greater than zero"));
    }

    if bridge.transport == TransportKind::Remote {
        match &config.llm {
            None => {
                return Err(Error::config(
                    "remote transport requires an 'llm' configuration section",
                ));
            }
            Some(llm) if llm.api_key.is_empty() => {
                return Err(Error::config(
                    "remote transport requires llm.api_key (or LLM_API_KEY)",
                ));
            }
            Some(_) => {}
        }
    }

    Ok(())
}
