//! # Key Derivation Functions
//!
//! Turns agreement output and storage secrets into AES-GCM keys.
//!
//! ## Derivation Rules
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    SECRET → AEAD KEY                                    │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Channel (ECDH output)                                                 │
//! │  ─────────────────────                                                  │
//! │    32 bytes (P-256)      → used as-is (AES-256 key)                    │
//! │    48 / 66 bytes         → HKDF-SHA256(                                │
//! │                               ikm  = shared_secret,                    │
//! │                               salt = none,                             │
//! │                               info = "warden-channel-key-v1")          │
//! │                             → 32 bytes                                 │
//! │                                                                         │
//! │  Storage (caller secret or device identifier)                          │
//! │  ─────────────────────────────────────────────                          │
//! │    base64 decoding to 16/24/32 bytes → used as-is (AES-128/192/256)   │
//! │    anything else                     → HKDF-SHA256(                    │
//! │                                           ikm  = UTF-8 secret,         │
//! │                                           salt = none,                 │
//! │                                           info = "warden-storage-      │
//! │                                                   key-v1")             │
//! │                                         → 32 bytes                     │
//! │    empty                             → InvalidKey                      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The pass-through rules keep ciphertext written by existing installs
//! readable: a 32-hex-character device identifier is valid base64 for 24
//! bytes, so it selects AES-192 exactly as before.

use base64::{engine::general_purpose::STANDARD, Engine};
use hkdf::Hkdf;
use sha2::Sha256;

use super::encryption::EncryptionKey;
use crate::error::{Error, Result};

/// Domain separation strings for HKDF
pub mod domain {
    /// Channel key derived from a non-256-bit shared secret
    pub const CHANNEL_KEY: &[u8] = b"warden-channel-key-v1";

    /// Storage key derived from a free-form secret
    pub const STORAGE_KEY: &[u8] = b"warden-storage-key-v1";
}

/// Size of HKDF-derived keys in bytes
pub const DERIVED_KEY_SIZE: usize = 32;

/// AEAD key for channel traffic from a raw ECDH shared secret
pub fn derive_channel_key(shared_secret: &[u8]) -> Result<EncryptionKey> {
    if shared_secret.is_empty() {
        return Err(Error::InvalidKey("empty shared secret".into()));
    }
    if shared_secret.len() == DERIVED_KEY_SIZE {
        return EncryptionKey::from_bytes(shared_secret);
    }
    hkdf_expand(shared_secret, domain::CHANNEL_KEY)
}

/// AEAD key for secure storage from a caller secret or device identifier
pub fn derive_storage_key(secret: &str) -> Result<EncryptionKey> {
    if secret.is_empty() {
        return Err(Error::InvalidKey("empty storage secret".into()));
    }

    if let Ok(raw) = STANDARD.decode(secret) {
        if matches!(raw.len(), 16 | 24 | 32) {
            return EncryptionKey::from_bytes(&raw);
        }
    }

    hkdf_expand(secret.as_bytes(), domain::STORAGE_KEY)
}

fn hkdf_expand(ikm: &[u8], info: &[u8]) -> Result<EncryptionKey> {
    let hkdf = Hkdf::<Sha256>::new(None, ikm);
    let mut okm = [0u8; DERIVED_KEY_SIZE];
    hkdf.expand(info, &mut okm)
        .map_err(|_| Error::Internal("HKDF expansion failed".into()))?;
    EncryptionKey::from_bytes(&okm)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_key_passthrough_for_p256() {
        let secret = [7u8; 32];
        let key = derive_channel_key(&secret).unwrap();
        assert_eq!(key.as_bytes(), &secret);
    }

    #[test]
    fn test_channel_key_hkdf_for_longer_secrets() {
        let p384 = derive_channel_key(&[7u8; 48]).unwrap();
        let p521 = derive_channel_key(&[7u8; 66]).unwrap();
        assert_eq!(p384.len(), 32);
        assert_eq!(p521.len(), 32);
        assert_ne!(p384.as_bytes(), p521.as_bytes());
        assert_ne!(p384.as_bytes(), &[7u8; 32]);
    }

    #[test]
    fn test_channel_key_deterministic() {
        let a = derive_channel_key(&[1u8; 48]).unwrap();
        let b = derive_channel_key(&[1u8; 48]).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_storage_key_from_base64_secret() {
        let key = derive_storage_key("KioqKioqKioqKioqKioqKioqKioqKioqKioqKioqKio=").unwrap();
        assert_eq!(key.as_bytes(), &[42u8; 32]);
    }

    #[test]
    fn test_storage_key_from_device_identifier() {
        // 32 hex characters decode as base64 to 24 bytes
        let key = derive_storage_key("6F9619FF8B86D011B42D00C04FC964FF").unwrap();
        assert_eq!(key.len(), 24);
    }

    #[test]
    fn test_storage_key_from_passphrase() {
        let a = derive_storage_key("correct horse battery staple").unwrap();
        let b = derive_storage_key("correct horse battery staple").unwrap();
        let c = derive_storage_key("correct horse battery stapler").unwrap();
        assert_eq!(a.len(), 32);
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.as_bytes(), c.as_bytes());
    }

    #[test]
    fn test_empty_secrets_rejected() {
        assert!(matches!(derive_storage_key(""), Err(Error::InvalidKey(_))));
        assert!(matches!(derive_channel_key(&[]), Err(Error::InvalidKey(_))));
    }
}
