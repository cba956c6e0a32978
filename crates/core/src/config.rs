//! Configuration management for device identifier attestation.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::CoreError;

/// Alias namespace used for temporary attestation keys.
pub const DEFAULT_ALIAS_PREFIX: &str = "android_internal_device_id_attestation";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub attestation: AttestationSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttestationSettings {
    /// Prefix of every temporary key alias.
    pub alias_prefix: String,
    /// Telephony slot the IMEI is read from.
    pub imei_slot: u32,
}

impl Default for AttestationSettings {
    fn default() -> Self {
        Self {
            alias_prefix: DEFAULT_ALIAS_PREFIX.to_string(),
            imei_slot: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| CoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would produce unusable key aliases.
    pub fn validate(&self) -> crate::Result<()> {
        let prefix = &self.attestation.alias_prefix;
        if prefix.is_empty() {
            return Err(CoreError::Config("attestation.alias_prefix is empty".into()));
        }
        if !prefix.chars().all(|c| c.is_ascii_graphic()) {
            return Err(CoreError::Config(format!(
                "attestation.alias_prefix '{prefix}' must be printable ASCII without spaces"
            )));
        }
        Ok(())
    }
}
