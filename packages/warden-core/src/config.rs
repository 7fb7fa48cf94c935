//! Core configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::crypto::Curve;
use crate::error::{Error, Result};
use crate::storage::{DecodePolicy, DeviceIdSource, StorageCodec};

/// Configuration for a Warden Core host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Curve for new session key pairs
    pub default_curve: Curve,
    /// Fetch timeout when the request options carry none, in milliseconds
    pub fetch_timeout_ms: u64,
    /// How storage reads handle entries that do not decrypt
    pub decode_policy: DecodePolicy,
    /// Enable verbose logging
    pub verbose_logging: bool,
    /// Storage secret overriding the device identifier
    pub device_secret: Option<String>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            default_curve: Curve::P256,
            fetch_timeout_ms: 60_000,
            decode_policy: DecodePolicy::Strict,
            verbose_logging: cfg!(feature = "verbose-logging"),
            device_secret: None,
        }
    }
}

impl CoreConfig {
    /// Parse from JSON; absent fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no component can use
    pub fn validate(&self) -> Result<()> {
        if self.fetch_timeout_ms == 0 {
            return Err(Error::InvalidConfig("fetch_timeout_ms must be positive".into()));
        }
        if matches!(&self.device_secret, Some(s) if s.is_empty()) {
            return Err(Error::InvalidConfig("device_secret must not be empty".into()));
        }
        Ok(())
    }

    /// Fetch timeout as a duration
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Storage codec for this configuration.
    ///
    /// Uses `device_secret` when set, else the device identifier.
    pub fn storage_codec(&self, device: &dyn DeviceIdSource) -> Result<StorageCodec> {
        Ok(StorageCodec::for_secret(self.device_secret.as_deref(), device)?
            .with_policy(self.decode_policy))
    }
}
