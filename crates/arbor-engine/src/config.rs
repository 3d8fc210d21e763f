//! Engine configuration.
//!
//! Loaded from JSON; every field has a default, so `{}` is a valid config.
//!
//! ```json
//! {
//!   "fixed_dt": 0.016666,
//!   "log_filter": "arbor_ecs=debug,info",
//!   "transform": { "stack_capacity": 256, "work_list_capacity": 64 }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Top-level engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fixed time step in seconds per tick. Must be positive and finite.
    pub fixed_dt: f64,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
    pub transform: TransformConfig,
}

/// Scratch-buffer sizing for the transform system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Initial capacity of the depth-first sweep stack.
    pub stack_capacity: usize,
    /// Initial capacity of the per-pass work list.
    pub work_list_capacity: usize,
}

impl Default for EngineConfig {
    /// 60 Hz, `warn` logging.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            log_filter: "warn".to_owned(),
            transform: TransformConfig::default(),
        }
    }
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            stack_capacity: 256,
            work_list_capacity: 64,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json_str(&text)?;
        tracing::debug!(path = %path.display(), ?config, "loaded engine config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.fixed_dt > 0.0 && self.fixed_dt.is_finite()) {
            return Err(EngineError::InvalidConfig(format!(
                "fixed_dt must be positive and finite, got {}",
                self.fixed_dt
            )));
        }
        Ok(())
    }
}
