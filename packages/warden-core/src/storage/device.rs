//! # Device Identifier
//!
//! Stable per-install identifier used as the default storage secret.
//!
//! Identifiers are normalized by stripping hyphens, so a UUID-shaped
//! platform identifier becomes 32 hex characters.

use tracing::debug;

use crate::error::{Error, Result};

/// Files consulted by [`MachineIdSource`], in order
pub const MACHINE_ID_PATHS: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];

/// Source of the raw platform installation identifier
pub trait DeviceIdSource: Send + Sync {
    /// Raw identifier as reported by the platform
    fn raw_device_id(&self) -> Result<String>;

    /// Identifier with hyphens and surrounding whitespace removed
    fn device_id(&self) -> Result<String> {
        let id = normalize_device_id(&self.raw_device_id()?);
        if id.is_empty() {
            return Err(Error::InvalidConfig("empty device identifier".into()));
        }
        Ok(id)
    }
}

/// Strip hyphens and surrounding whitespace
pub fn normalize_device_id(raw: &str) -> String {
    raw.trim().replace('-', "")
}

/// Reads the systemd / D-Bus machine id
#[derive(Debug, Clone)]
pub struct MachineIdSource {
    paths: Vec<String>,
}

impl MachineIdSource {
    /// Source over [`MACHINE_ID_PATHS`]
    pub fn new() -> Self {
        Self {
            paths: MACHINE_ID_PATHS.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// Source over custom paths (first readable non-empty file wins)
    pub fn with_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for MachineIdSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceIdSource for MachineIdSource {
    fn raw_device_id(&self) -> Result<String> {
        for path in &self.paths {
            match std::fs::read_to_string(path) {
                Ok(contents) if !contents.trim().is_empty() => {
                    debug!(path = %path, "Read device identifier");
                    return Ok(contents.trim().to_string());
                }
                Ok(_) => continue,
                Err(e) => debug!(path = %path, error = %e, "Device identifier unavailable"),
            }
        }
        Err(Error::InvalidConfig(format!(
            "no device identifier found in {:?}",
            self.paths
        )))
    }
}

/// A fixed identifier, for hosts that supply their own (e.g. a vendor id)
#[derive(Debug, Clone)]
pub struct FixedDeviceId(String);

impl FixedDeviceId {
    /// Wrap an identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A random UUIDv4 identifier, for hosts without a platform id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl DeviceIdSource for FixedDeviceId {
    fn raw_device_id(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}
