//! # Pin Sets
//!
//! Per-request pinning configuration: allowed domains plus SHA-256 key
//! digests for intermediates and (optionally) the leaf.
//!
//! ## Pin Format
//!
//! ```text
//!   "sha256/gGLZpgmRMOu2yuTA9DZUDSvIafDbmJmCoVXOmXtuCBQ="
//!    ───┬───  ────────────────────┬────────────────────
//!       │                         └─ base64 of a 32-byte SHA-256 digest
//!       └─ optional, case-insensitive
//! ```
//!
//! ## Domain Patterns
//!
//! | Pattern | Matches | Does not match |
//! |---------|---------|----------------|
//! | `example.com` | `example.com`, `api.example.com` | `badexample.com` |
//! | `*.example.com` | `api.example.com`, `*.example.com` | `example.com` |

use std::collections::HashSet;

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::{Error, Result};

/// A SHA-256 public key digest
pub type PinDigest = [u8; 32];

const PIN_PREFIX: &str = "sha256/";

/// Parse a `sha256/<base64>` pin
pub fn parse_pin(pin: &str) -> Result<PinDigest> {
    let trimmed = pin.trim();
    let encoded = match trimmed.get(..PIN_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(PIN_PREFIX) => &trimmed[PIN_PREFIX.len()..],
        _ => trimmed,
    };

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|_| Error::InvalidPin(format!("{} is not base64", pin)))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| Error::InvalidPin(format!("{} decodes to {} bytes, need 32", pin, b.len())))
}

/// Render a digest as a `sha256/<base64>` pin
pub fn format_pin(digest: &PinDigest) -> String {
    format!("{}{}", PIN_PREFIX, STANDARD.encode(digest))
}

/// Immutable pinning policy for one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinSet {
    domains: Vec<String>,
    pins: HashSet<PinDigest>,
    leaf_pins: HashSet<PinDigest>,
}

impl PinSet {
    /// Build from pin strings and domain patterns
    pub fn new<P, D>(certificates: P, valid_domains: D) -> Result<Self>
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        D: IntoIterator,
        D::Item: AsRef<str>,
    {
        let pins = certificates
            .into_iter()
            .map(|p| parse_pin(p.as_ref()))
            .collect::<Result<HashSet<_>>>()?;
        let domains = valid_domains
            .into_iter()
            .map(|d| d.as_ref().trim().trim_end_matches('.').to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();

        Ok(Self {
            domains,
            pins,
            leaf_pins: HashSet::new(),
        })
    }

    /// Add leaf key pins; an empty set skips the leaf check
    pub fn with_leaf_pins<P>(mut self, leaf_pins: P) -> Result<Self>
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        self.leaf_pins = leaf_pins
            .into_iter()
            .map(|p| parse_pin(p.as_ref()))
            .collect::<Result<HashSet<_>>>()?;
        Ok(self)
    }

    /// Pinning applies only with both pins and domains configured
    pub fn is_configured(&self) -> bool {
        !self.pins.is_empty() && !self.domains.is_empty()
    }

    /// Normalized domain patterns
    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// Intermediate pins
    pub fn pins(&self) -> &HashSet<PinDigest> {
        &self.pins
    }

    /// Leaf pins
    pub fn leaf_pins(&self) -> &HashSet<PinDigest> {
        &self.leaf_pins
    }

    /// Whether some configured domain covers `common_name`
    pub fn allows_domain(&self, common_name: &str) -> bool {
        let cn = common_name.trim_end_matches('.').to_ascii_lowercase();
        self.domains.iter().any(|pattern| domain_matches(pattern, &cn))
    }
}

fn domain_matches(pattern: &str, cn: &str) -> bool {
    if cn == pattern {
        return true;
    }
    match pattern.strip_prefix('*') {
        // "*.example.com": any non-empty label prefix
        Some(suffix) => suffix.starts_with('.') && cn.len() > suffix.len() && cn.ends_with(suffix),
        None => cn
            .strip_suffix(pattern)
            .map_or(false, |head| head.len() > 1 && head.ends_with('.')),
    }
}
