//! # Device Integrity
//!
//! Best-effort check for a rooted or jailbroken device, answered by looking
//! for files that only exist once the platform's sandbox has been broken.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       INTEGRITY CHECK                                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  DeviceIntegritySource                                                  │
//! │    └── PathIndicatorScan                                                │
//! │          ├── su binaries        /system/xbin/su, /sbin/su, ...         │
//! │          ├── root managers      Superuser.apk, Magisk                   │
//! │          └── jailbreak tooling  Cydia.app, MobileSubstrate, /var/jb     │
//! │                                                                         │
//! │  any indicator present  →  has_security_risk() == true                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A clean result proves nothing: a determined user can hide every one of
//! these files. Treat a positive result as a signal, not a guarantee.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

/// What a found indicator suggests about the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    /// A `su` binary on a system path
    SuBinary,
    /// A root management app or daemon
    RootManager,
    /// Jailbreak package manager or tweak loader
    Jailbreak,
}

/// A root or jailbreak artifact found on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Indicator {
    /// Category of the artifact
    pub kind: IndicatorKind,
    /// Absolute device path where it was found
    pub path: String,
}

/// Paths whose presence marks a compromised device
pub const INDICATOR_PATHS: &[(IndicatorKind, &str)] = &[
    (IndicatorKind::SuBinary, "/system/bin/su"),
    (IndicatorKind::SuBinary, "/system/xbin/su"),
    (IndicatorKind::SuBinary, "/sbin/su"),
    (IndicatorKind::SuBinary, "/su/bin/su"),
    (IndicatorKind::SuBinary, "/system/sd/xbin/su"),
    (IndicatorKind::SuBinary, "/system/bin/failsafe/su"),
    (IndicatorKind::SuBinary, "/data/local/su"),
    (IndicatorKind::SuBinary, "/data/local/bin/su"),
    (IndicatorKind::SuBinary, "/data/local/xbin/su"),
    (IndicatorKind::SuBinary, "/cache/su"),
    (IndicatorKind::SuBinary, "/data/su"),
    (IndicatorKind::SuBinary, "/dev/su"),
    (IndicatorKind::RootManager, "/system/app/Superuser.apk"),
    (IndicatorKind::RootManager, "/system/app/SuperSU.apk"),
    (IndicatorKind::RootManager, "/sbin/.magisk"),
    (IndicatorKind::RootManager, "/data/adb/magisk"),
    (IndicatorKind::Jailbreak, "/Applications/Cydia.app"),
    (IndicatorKind::Jailbreak, "/Applications/Sileo.app"),
    (IndicatorKind::Jailbreak, "/Library/MobileSubstrate/MobileSubstrate.dylib"),
    (IndicatorKind::Jailbreak, "/usr/libexec/cydia"),
    (IndicatorKind::Jailbreak, "/private/var/lib/cydia"),
    (IndicatorKind::Jailbreak, "/var/jb"),
];

// ============================================================================
// SOURCE TRAIT
// ============================================================================

/// Platform-specific answer to "is this device compromised?"
pub trait DeviceIntegritySource: Send + Sync {
    /// Every indicator found
    fn indicators(&self) -> Vec<Indicator>;

    /// Whether any indicator was found
    fn has_security_risk(&self) -> bool {
        !self.indicators().is_empty()
    }
}

// ============================================================================
// PATH SCAN
// ============================================================================

/// Checks [`INDICATOR_PATHS`] under a filesystem root
#[derive(Debug, Clone)]
pub struct PathIndicatorScan {
    root: PathBuf,
    checks: Vec<(IndicatorKind, String)>,
}

impl PathIndicatorScan {
    /// Scan the real filesystem
    pub fn new() -> Self {
        Self::with_root("/")
    }

    /// Scan with every indicator path resolved under `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            checks: INDICATOR_PATHS
                .iter()
                .map(|(kind, path)| (*kind, path.to_string()))
                .collect(),
        }
    }

    /// Add a host-specific indicator path
    pub fn with_check(mut self, kind: IndicatorKind, path: impl Into<String>) -> Self {
        self.checks.push((kind, path.into()));
        self
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl Default for PathIndicatorScan {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceIntegritySource for PathIndicatorScan {
    fn indicators(&self) -> Vec<Indicator> {
        self.checks
            .iter()
            .filter(|(_, path)| present(&self.resolve(path)))
            .map(|(kind, path)| {
                warn!(kind = ?kind, path = %path, "Integrity indicator present");
                Indicator {
                    kind: *kind,
                    path: path.clone(),
                }
            })
            .collect()
    }
}

// Dangling symlinks count: some root hiders leave the link behind.
fn present(path: &Path) -> bool {
    match std::fs::symlink_metadata(path) {
        Ok(_) => true,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(path = %path.display(), error = %e, "Indicator path unreadable");
            }
            false
        }
    }
}

/// Scan the running device with the default indicator list
pub fn device_has_security_risk() -> bool {
    PathIndicatorScan::new().has_security_risk()
}

// ============================================================================
// TESTS
// ============================================================================
