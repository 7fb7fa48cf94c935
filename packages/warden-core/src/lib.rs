//! # Warden Core
//!
//! Device-side security layer: key agreement with a backend, authenticated
//! encryption for the channel and for data at rest, request signing and
//! TLS certificate pinning.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         WARDEN CORE MODULES                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  ┌──────────────┐   │
//! │  │   Session   │  │   Storage   │  │   Pinning   │  │   Network    │   │
//! │  │             │  │             │  │             │  │              │   │
//! │  │ - Key pair  │  │ - Codec     │  │ - Pin sets  │  │ - Fetch      │   │
//! │  │ - Secret    │  │ - Device id │  │ - Validator │  │ - Options    │   │
//! │  │ - Encrypt   │  │ - Facade    │  │ - Verifier  │  │ - Signature  │   │
//! │  └──────┬──────┘  └──────┬──────┘  └──────┬──────┘  └──────┬───────┘   │
//! │         │                │                │                │           │
//! │         └────────────────┴───────┬────────┴────────────────┘           │
//! │                                  ▼                                      │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                          Crypto                                  │  │
//! │  │  ECDH (P-256/384/521) · AES-GCM · HKDF · HS256 detached JWS      │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`config`] - Host configuration
//! - [`logging`] - Tracing subscriber setup
//! - [`crypto`] - Key agreement, AEAD, key derivation, request signatures
//! - [`session`] - Per-connection key agreement state
//! - [`storage`] - Encryption for data at rest
//! - [`integrity`] - Root and jailbreak indicators
//! - [`pinning`] - Certificate pinning on top of WebPKI trust
//! - [`network`] - Pinned HTTPS fetch
//!
//! ## Security Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SECURITY LAYERS                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Layer 1: Transport (rustls + pinning)                                 │
//! │  ─────────────────────────────────────                                  │
//! │  WebPKI trust, narrowed to pinned intermediates and allowed domains.   │
//! │                                                                         │
//! │  Layer 2: Channel (ECDH + AES-GCM)                                     │
//! │  ──────────────────────────────────                                     │
//! │  Payloads sealed under a secret agreed with the backend.               │
//! │                                                                         │
//! │  Layer 3: Request Authentication (HS256 detached JWS)                  │
//! │  ──────────────────────────────────────────────────────                 │
//! │  Request bodies signed with the agreed secret.                         │
//! │                                                                         │
//! │  Layer 4: Local Storage (AES-GCM)                                      │
//! │  ─────────────────────────────────                                      │
//! │  Keys and values sealed under a device-bound secret.                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod config;
pub mod crypto;
pub mod error;
pub mod integrity;
pub mod logging;
pub mod network;
pub mod pinning;
pub mod session;
pub mod storage;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use config::CoreConfig;
pub use crypto::{Curve, EncryptionKey, KeyPair, Mode, SharedSecret};
pub use error::{Error, ErrorKind, Result};
pub use integrity::{device_has_security_risk, DeviceIntegritySource};
pub use network::{fetch, FetchOptions, FetchResponse};
pub use pinning::{PinSet, PinningValidator, Verdict};
pub use session::Session;
pub use storage::{SecureStorage, StorageCodec};

// ============================================================================
// VERSION INFO
// ============================================================================

/// Returns the version of Warden Core
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
