use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// How channel counts reach the observer when it falls behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPolicy {
    /// One observer call per captured buffer; the callback queue grows
    /// without bound while the observer is slow.
    #[default]
    Unbounded,
    /// At most one pending observer call; newer counts overwrite it.
    Coalesce,
}

/// Configuration for a capture session manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfiguration {
    /// Thread name of the serial executor that owns engine mutation.
    pub executor_label: String,

    /// Thread name of the context that receives raw capture buffers.
    pub delivery_label: String,

    /// Observer backpressure policy (default: unbounded).
    pub delivery_policy: DeliveryPolicy,
}

impl SessionConfiguration {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.executor_label.trim().is_empty() {
            return Err(ConfigError::Invalid("executor label must not be empty".into()));
        }
        if self.delivery_label.trim().is_empty() {
            return Err(ConfigError::Invalid("delivery label must not be empty".into()));
        }
        if self.executor_label == self.delivery_label {
            return Err(ConfigError::Invalid(format!(
                "executor and delivery contexts share the label {:?}",
                self.executor_label
            )));
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SessionConfiguration =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }
}

impl Default for SessionConfiguration {
    fn default() -> Self {
        Self {
            executor_label: "audio-session.config".into(),
            delivery_label: "audio-session.samples".into(),
            delivery_policy: DeliveryPolicy::Unbounded,
        }
    }
}
