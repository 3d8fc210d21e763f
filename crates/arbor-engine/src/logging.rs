//! Log subscriber bootstrap.

use tracing_subscriber::EnvFilter;

use crate::config::EngineConfig;
use crate::EngineError;

/// Build the filter: `RUST_LOG` if set and valid, else `config.log_filter`.
pub fn env_filter(config: &EngineConfig) -> Result<EnvFilter, EngineError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.log_filter).map_err(|err| {
            EngineError::InvalidConfig(format!("log_filter {:?}: {err}", config.log_filter))
        }),
    }
}

/// Install a global `fmt` subscriber. Fails if one is already installed.
pub fn init(config: &EngineConfig) -> Result<(), EngineError> {
    let filter = env_filter(config)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| EngineError::Logging(err.to_string()))
}
