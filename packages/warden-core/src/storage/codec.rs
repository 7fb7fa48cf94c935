//! # Secure Storage Codec
//!
//! Seals storage keys and values independently before they reach the
//! persistence layer.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       ENTRY ENCODING                                    │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  secret (caller-supplied, else device identifier)                      │
//! │     │                                                                   │
//! │     ▼ derive_storage_key                                               │
//! │  EncryptionKey                                                         │
//! │     │                                                                   │
//! │     ├── key   ──▶ DeviceBound ──▶ sealed key   (deterministic,         │
//! │     │                                            so lookups work)      │
//! │     │                                                                   │
//! │     └── value ──▶ DeviceBound ──▶ sealed value                         │
//! │                   or SharedKey (hard mode, random nonce)               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Decoding surfaces every failure by default. [`DecodePolicy::LegacyFallback`]
//! instead hands back the stored string unchanged, which lets a host read
//! entries written before encryption was turned on.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::device::DeviceIdSource;
use crate::crypto::{
    decrypt_string, derive_storage_key, encrypt_string, EncryptionContext, EncryptionKey, Mode,
};
use crate::error::Result;

/// What to do when a stored entry does not decrypt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodePolicy {
    /// Return the decryption error
    #[default]
    Strict,
    /// Return the stored string as-is and log a warning
    LegacyFallback,
}

/// Storage codec bound to one storage key
#[derive(Clone)]
pub struct StorageCodec {
    key: EncryptionKey,
    policy: DecodePolicy,
}

impl StorageCodec {
    /// Codec for an explicit secret
    pub fn new(secret: &str) -> Result<Self> {
        Ok(Self {
            key: derive_storage_key(secret)?,
            policy: DecodePolicy::default(),
        })
    }

    /// Codec for the caller secret if given, else the device identifier
    pub fn for_secret(secret: Option<&str>, device: &dyn DeviceIdSource) -> Result<Self> {
        match secret {
            Some(secret) => Self::new(secret),
            None => Self::new(&device.device_id()?),
        }
    }

    /// Set the decode policy
    pub fn with_policy(mut self, policy: DecodePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Current decode policy
    pub fn policy(&self) -> DecodePolicy {
        self.policy
    }

    // ========================================================================
    // SINGLE VALUES
    // ========================================================================

    /// Seal one string (device-bound, or shared-key in hard mode)
    pub fn encrypt_value(&self, input: &str, hard_mode: bool) -> Result<String> {
        encrypt_string(input, &self.context(hard_mode))
    }

    /// Open one string sealed by [`encrypt_value`](Self::encrypt_value)
    pub fn decrypt_value(&self, stored: &str, hard_mode: bool) -> Result<String> {
        match decrypt_string(stored, &self.context(hard_mode)) {
            Ok(plain) => Ok(plain),
            Err(e) if self.policy == DecodePolicy::LegacyFallback => {
                warn!(error = %e, "Stored entry did not decrypt; returning it unchanged");
                Ok(stored.to_string())
            }
            Err(e) => Err(e),
        }
    }

    // ========================================================================
    // ENTRIES
    // ========================================================================

    /// Seal a storage key. Always device-bound so the result is stable.
    pub fn encode_key(&self, key: &str) -> Result<String> {
        self.encrypt_value(key, false)
    }

    /// Open a sealed storage key
    pub fn decode_key(&self, sealed_key: &str) -> Result<String> {
        self.decrypt_value(sealed_key, false)
    }

    /// Seal a key/value pair
    pub fn encode_entry(&self, key: &str, value: &str, hard_mode: bool) -> Result<(String, String)> {
        Ok((self.encode_key(key)?, self.encrypt_value(value, hard_mode)?))
    }

    /// Open a sealed key/value pair
    pub fn decode_entry(
        &self,
        sealed_key: &str,
        sealed_value: &str,
        hard_mode: bool,
    ) -> Result<(String, String)> {
        Ok((
            self.decode_key(sealed_key)?,
            self.decrypt_value(sealed_value, hard_mode)?,
        ))
    }

    fn context(&self, hard_mode: bool) -> EncryptionContext<'_> {
        let mode = if hard_mode {
            Mode::SharedKey
        } else {
            Mode::DeviceBound
        };
        EncryptionContext::new(mode, &self.key)
    }
}

impl std::fmt::Debug for StorageCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCodec")
            .field("key", &self.key)
            .field("policy", &self.policy)
            .finish()
    }
}

// ============================================================================
// FREE FUNCTIONS
// ============================================================================

/// Seal `(key, value)` under `device_secret`
pub fn encode_entry(
    key: &str,
    value: &str,
    device_secret: &str,
    use_hard_mode: bool,
) -> Result<(String, String)> {
    StorageCodec::new(device_secret)?.encode_entry(key, value, use_hard_mode)
}

/// Open `(sealed_key, sealed_value)` under `device_secret`, strictly
pub fn decode_entry(
    sealed_key: &str,
    sealed_value: &str,
    device_secret: &str,
    use_hard_mode: bool,
) -> Result<(String, String)> {
    StorageCodec::new(device_secret)?.decode_entry(sealed_key, sealed_value, use_hard_mode)
}

/// Seal one string with the caller secret, else the device identifier
pub fn encrypt_value(
    input: &str,
    hard_mode: bool,
    secret: Option<&str>,
    device: &dyn DeviceIdSource,
) -> Result<String> {
    StorageCodec::for_secret(secret, device)?.encrypt_value(input, hard_mode)
}

/// Open one string with the caller secret, else the device identifier
pub fn decrypt_value(
    input: &str,
    hard_mode: bool,
    secret: Option<&str>,
    device: &dyn DeviceIdSource,
) -> Result<String> {
    StorageCodec::for_secret(secret, device)?.decrypt_value(input, hard_mode)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::storage::device::FixedDeviceId;

    const DEVICE: &str = "6F9619FF-8B86-D011-B42D-00C04FC964FF";

    #[test]
    fn test_entry_roundtrip_both_modes() {
        for hard in [false, true] {
            let (k, v) = encode_entry("token", "s3cr3t", "passphrase", hard).unwrap();
            let (key, value) = decode_entry(&k, &v, "passphrase", hard).unwrap();
            assert_eq!(key, "token");
            assert_eq!(value, "s3cr3t");
        }
    }

    #[test]
    fn test_keys_are_deterministic_in_hard_mode() {
        let codec = StorageCodec::new("passphrase").unwrap();
        let (k1, v1) = codec.encode_entry("token", "value", true).unwrap();
        let (k2, v2) = codec.encode_entry("token", "value", true).unwrap();
        assert_eq!(k1, k2);
        assert_ne!(v1, v2);
    }

    #[test]
    fn test_wrong_secret_fails() {
        let (k, v) = encode_entry("token", "value", "secret-a", false).unwrap();
        let result = decode_entry(&k, &v, "secret-b", false);
        assert!(matches!(result, Err(Error::AuthenticationFailure)));
    }

    #[test]
    fn test_mode_mismatch_fails() {
        let codec = StorageCodec::new("passphrase").unwrap();
        let hard = codec.encrypt_value("value", true).unwrap();
        assert!(codec.decrypt_value(&hard, false).is_err());
    }

    #[test]
    fn test_device_identifier_is_default_secret() {
        let device = FixedDeviceId::new(DEVICE);
        let sealed = encrypt_value("hello warden", false, None, &device).unwrap();
        assert_eq!(
            sealed,
            "bj1nixTVoYpSvpdA8wCd1Me5V/FAq+B2qQ2XcV5uLdKpyZXtQvwFdA=="
        );
        assert_eq!(
            decrypt_value(&sealed, false, None, &device).unwrap(),
            "hello warden"
        );
    }

    #[test]
    fn test_caller_secret_overrides_device() {
        let device = FixedDeviceId::new(DEVICE);
        let sealed = encrypt_value("v", false, Some("override"), &device).unwrap();
        assert!(decrypt_value(&sealed, false, None, &device).is_err());
        assert_eq!(
            decrypt_value(&sealed, false, Some("override"), &device).unwrap(),
            "v"
        );
    }

    #[test]
    fn test_strict_policy_surfaces_errors() {
        let codec = StorageCodec::new("passphrase").unwrap();
        assert!(matches!(
            codec.decrypt_value("plain legacy value", false),
            Err(Error::MalformedInput(_))
        ));
    }

    #[test]
    fn test_legacy_fallback_returns_stored() {
        let codec = StorageCodec::new("passphrase")
            .unwrap()
            .with_policy(DecodePolicy::LegacyFallback);
        assert_eq!(
            codec.decrypt_value("plain legacy value", false).unwrap(),
            "plain legacy value"
        );

        // Valid entries still decrypt normally
        let sealed = codec.encrypt_value("fresh", false).unwrap();
        assert_eq!(codec.decrypt_value(&sealed, false).unwrap(), "fresh");
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(StorageCodec::new(""), Err(Error::InvalidKey(_))));
    }

    #[test]
    fn test_policy_serde() {
        let policy: DecodePolicy = serde_json::from_str("\"legacy_fallback\"").unwrap();
        assert_eq!(policy, DecodePolicy::LegacyFallback);
    }
}
