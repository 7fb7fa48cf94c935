//! # Encryption Module
//!
//! AES-GCM authenticated encryption in two modes: device-bound (storage) and
//! shared-key (channel traffic).
//!
//! ## Sealing Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         SEAL / OPEN                                     │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  EncryptionContext                                                     │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  mode   DeviceBound            SharedKey                     │       │
//! │  │  key    16/24/32 bytes         16/24/32 bytes                │       │
//! │  │  nonce  DEVICE_BOUND_NONCE     12 random bytes per call      │       │
//! │  │  aad    DEVICE_BOUND_AAD       caller-supplied (default "")  │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                           │                                             │
//! │                           ▼                                             │
//! │  AES-GCM(key, nonce, plaintext, aad) → ciphertext || tag(16)           │
//! │                           │                                             │
//! │                           ▼                                             │
//! │  SealedMessage = base64( nonce(12) || ciphertext || tag(16) )          │
//! │                                                                         │
//! │  open():                                                               │
//! │    not base64 / < 28 bytes  → MalformedInput                           │
//! │    tag does not verify      → AuthenticationFailure                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Device-Bound Mode
//!
//! Device-bound sealing reuses one nonce and one AAD for every message under
//! a key. Identical plaintext therefore produces identical ciphertext, which
//! is what makes encrypted storage keys lookupable. The cost is the usual
//! GCM nonce-reuse weakness: equal plaintexts are linkable and XOR of two
//! ciphertexts leaks the XOR of their plaintexts. Values that need full AEAD
//! guarantees use [`Mode::SharedKey`], which stores a fresh random nonce next
//! to every ciphertext.

use std::fmt;

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

type Aes192Gcm = AesGcm<aes_gcm::aes::Aes192, U12>;

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// Smallest valid sealed message: nonce plus tag around an empty plaintext
pub const MIN_SEALED_LEN: usize = NONCE_SIZE + TAG_SIZE;

/// Fixed nonce for device-bound sealing (base64 `bj1nixTVoYpSvpdA`)
///
/// Reused for every device-bound message. See the module docs.
pub const DEVICE_BOUND_NONCE: [u8; NONCE_SIZE] = [
    0x6e, 0x3d, 0x67, 0x8b, 0x14, 0xd5, 0xa1, 0x8a, 0x52, 0xbe, 0x97, 0x40,
];

/// Fixed associated data for device-bound sealing
///
/// The DER header of a P-256 `SubjectPublicKeyInfo`
/// (base64 `MFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgA=`).
pub const DEVICE_BOUND_AAD: [u8; 26] = [
    0x30, 0x59, 0x30, 0x13, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x08,
    0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, 0x03, 0x42, 0x00,
];

// ============================================================================
// MODE & KEY
// ============================================================================

/// Nonce/AAD policy for a seal operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Fixed nonce and AAD; deterministic ciphertext
    #[default]
    DeviceBound,
    /// Random nonce per message; the "hard" mode
    SharedKey,
}

/// An AES-GCM key (128, 192 or 256 bits)
///
/// Zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey(Vec<u8>);

impl EncryptionKey {
    /// Create from raw bytes; only 16, 24 and 32 byte keys are accepted
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes.len() {
            16 | 24 | 32 => Ok(Self(bytes.to_vec())),
            n => Err(Error::InvalidKey(format!(
                "AES-GCM keys are 16, 24 or 32 bytes, got {}",
                n
            ))),
        }
    }

    /// Create from a base64-encoded key
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let mut raw = STANDARD
            .decode(encoded)
            .map_err(|e| Error::InvalidKey(format!("key is not base64: {}", e)))?;
        let key = Self::from_bytes(&raw);
        raw.zeroize();
        key
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Key length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; empty keys cannot be constructed
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EncryptionKey(AES-{}, <redacted>)", self.0.len() * 8)
    }
}

// ============================================================================
// CONTEXT
// ============================================================================

/// Everything a seal/open call needs besides the payload
#[derive(Debug, Clone)]
pub struct EncryptionContext<'k> {
    mode: Mode,
    key: &'k EncryptionKey,
    associated_data: Vec<u8>,
}

impl<'k> EncryptionContext<'k> {
    /// Context for `mode` under `key`
    pub fn new(mode: Mode, key: &'k EncryptionKey) -> Self {
        Self {
            mode,
            key,
            associated_data: Vec::new(),
        }
    }

    /// Device-bound context (fixed nonce and AAD)
    pub fn device_bound(key: &'k EncryptionKey) -> Self {
        Self::new(Mode::DeviceBound, key)
    }

    /// Shared-key context (random nonce, empty AAD)
    pub fn shared_key(key: &'k EncryptionKey) -> Self {
        Self::new(Mode::SharedKey, key)
    }

    /// Bind caller associated data. Ignored in device-bound mode.
    pub fn with_associated_data(mut self, aad: impl Into<Vec<u8>>) -> Self {
        self.associated_data = aad.into();
        self
    }

    /// Selected mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Associated data actually fed to the cipher
    pub fn associated_data(&self) -> &[u8] {
        match self.mode {
            Mode::DeviceBound => &DEVICE_BOUND_AAD,
            Mode::SharedKey => &self.associated_data,
        }
    }

    fn nonce(&self) -> Result<[u8; NONCE_SIZE]> {
        match self.mode {
            Mode::DeviceBound => Ok(DEVICE_BOUND_NONCE),
            Mode::SharedKey => {
                let mut nonce = [0u8; NONCE_SIZE];
                OsRng
                    .try_fill_bytes(&mut nonce)
                    .map_err(|_| Error::RngFailed)?;
                Ok(nonce)
            }
        }
    }
}

// ============================================================================
// SEALED MESSAGE
// ============================================================================

/// `nonce || ciphertext || tag`, rendered as one base64 string
#[derive(Clone, PartialEq, Eq)]
pub struct SealedMessage {
    nonce: [u8; NONCE_SIZE],
    /// Ciphertext with the tag appended, as produced by `aes-gcm`
    ciphertext_and_tag: Vec<u8>,
}

impl SealedMessage {
    /// Split raw bytes into nonce and ciphertext-with-tag
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MIN_SEALED_LEN {
            return Err(Error::MalformedInput(format!(
                "sealed message is {} bytes, need at least {}",
                bytes.len(),
                MIN_SEALED_LEN
            )));
        }
        let (nonce, rest) = bytes.split_at(NONCE_SIZE);
        let mut nonce_arr = [0u8; NONCE_SIZE];
        nonce_arr.copy_from_slice(nonce);
        Ok(Self {
            nonce: nonce_arr,
            ciphertext_and_tag: rest.to_vec(),
        })
    }

    /// Parse the base64 wire form
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD.decode(encoded.trim())?;
        Self::from_bytes(&bytes)
    }

    /// Concatenated `nonce || ciphertext || tag`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_SIZE + self.ciphertext_and_tag.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext_and_tag);
        out
    }

    /// Base64 wire form (standard alphabet, padded)
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    /// Nonce segment
    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }

    /// Ciphertext segment, without the tag
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext_and_tag[..self.ciphertext_and_tag.len() - TAG_SIZE]
    }

    /// Authentication tag segment
    pub fn tag(&self) -> &[u8] {
        &self.ciphertext_and_tag[self.ciphertext_and_tag.len() - TAG_SIZE..]
    }
}

impl fmt::Display for SealedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl fmt::Debug for SealedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SealedMessage")
            .field("nonce", &hex::encode(self.nonce))
            .field("len", &self.ciphertext_and_tag.len())
            .finish()
    }
}

// ============================================================================
// SEAL / OPEN
// ============================================================================

/// Encrypt `plaintext` under `context`
pub fn seal(plaintext: &[u8], context: &EncryptionContext<'_>) -> Result<SealedMessage> {
    let nonce = context.nonce()?;
    let payload = Payload {
        msg: plaintext,
        aad: context.associated_data(),
    };

    let key = context.key.as_bytes();
    let ciphertext_and_tag = match key.len() {
        16 => encrypt_with::<Aes128Gcm>(key, &nonce, payload),
        24 => encrypt_with::<Aes192Gcm>(key, &nonce, payload),
        32 => encrypt_with::<Aes256Gcm>(key, &nonce, payload),
        n => Err(Error::InvalidKey(format!("unsupported key length {}", n))),
    }?;

    Ok(SealedMessage {
        nonce,
        ciphertext_and_tag,
    })
}

/// Decrypt and authenticate `sealed` under `context`
///
/// ## Errors
///
/// `AuthenticationFailure` if the ciphertext, tag, nonce or AAD was
/// modified, or if the key is wrong.
pub fn open(sealed: &SealedMessage, context: &EncryptionContext<'_>) -> Result<Vec<u8>> {
    let payload = Payload {
        msg: &sealed.ciphertext_and_tag,
        aad: context.associated_data(),
    };

    let key = context.key.as_bytes();
    match key.len() {
        16 => decrypt_with::<Aes128Gcm>(key, &sealed.nonce, payload),
        24 => decrypt_with::<Aes192Gcm>(key, &sealed.nonce, payload),
        32 => decrypt_with::<Aes256Gcm>(key, &sealed.nonce, payload),
        n => Err(Error::InvalidKey(format!("unsupported key length {}", n))),
    }
}

/// Seal a UTF-8 string and render the base64 wire form
pub fn encrypt_string(plaintext: &str, context: &EncryptionContext<'_>) -> Result<String> {
    Ok(seal(plaintext.as_bytes(), context)?.to_base64())
}

/// Parse the base64 wire form, open it and decode the plaintext as UTF-8
pub fn decrypt_string(encoded: &str, context: &EncryptionContext<'_>) -> Result<String> {
    let sealed = SealedMessage::from_base64(encoded)?;
    let plaintext = open(&sealed, context)?;
    String::from_utf8(plaintext)
        .map_err(|_| Error::MalformedInput("decrypted payload is not UTF-8".into()))
}

fn encrypt_with<C>(key: &[u8], nonce: &[u8; NONCE_SIZE], payload: Payload<'_, '_>) -> Result<Vec<u8>>
where
    C: KeyInit + Aead<NonceSize = U12>,
{
    let cipher = C::new_from_slice(key).map_err(|e| Error::InvalidKey(e.to_string()))?;
    cipher
        .encrypt(GenericArray::from_slice(nonce), payload)
        .map_err(|_| Error::EncryptionFailed("AES-GCM seal failed".into()))
}

fn decrypt_with<C>(key: &[u8], nonce: &[u8; NONCE_SIZE], payload: Payload<'_, '_>) -> Result<Vec<u8>>
where
    C: KeyInit + Aead<NonceSize = U12>,
{
    let cipher = C::new_from_slice(key).map_err(|e| Error::InvalidKey(e.to_string()))?;
    cipher
        .decrypt(GenericArray::from_slice(nonce), payload)
        .map_err(|_| Error::AuthenticationFailure)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn key32() -> EncryptionKey {
        EncryptionKey::from_bytes(&[42u8; 32]).unwrap()
    }

    #[test]
    fn test_device_bound_roundtrip() {
        let key = key32();
        let ctx = EncryptionContext::device_bound(&key);

        let sealed = seal(b"Hello, Warden!", &ctx).unwrap();
        let opened = open(&sealed, &ctx).unwrap();
        assert_eq!(opened, b"Hello, Warden!");
    }

    #[test]
    fn test_device_bound_is_deterministic() {
        let key = key32();
        let ctx = EncryptionContext::device_bound(&key);

        let a = seal(b"same input", &ctx).unwrap();
        let b = seal(b"same input", &ctx).unwrap();
        assert_eq!(a.to_base64(), b.to_base64());
        assert_eq!(a.nonce(), &DEVICE_BOUND_NONCE);
    }

    #[test]
    fn test_shared_key_nonces_differ() {
        let key = key32();
        let ctx = EncryptionContext::shared_key(&key);

        let a = seal(b"same input", &ctx).unwrap();
        let b = seal(b"same input", &ctx).unwrap();
        assert_ne!(a.to_base64(), b.to_base64());
        assert_eq!(open(&a, &ctx).unwrap(), open(&b, &ctx).unwrap());
    }

    #[test]
    fn test_all_key_sizes() {
        for len in [16usize, 24, 32] {
            let key = EncryptionKey::from_bytes(&vec![9u8; len]).unwrap();
            for ctx in [
                EncryptionContext::device_bound(&key),
                EncryptionContext::shared_key(&key),
            ] {
                let sealed = seal(b"payload", &ctx).unwrap();
                assert_eq!(open(&sealed, &ctx).unwrap(), b"payload");
            }
        }
    }

    #[test]
    fn test_invalid_key_lengths() {
        for len in [0usize, 8, 20, 33, 64] {
            let err = EncryptionKey::from_bytes(&vec![1u8; len]).unwrap_err();
            assert!(matches!(err, Error::InvalidKey(_)));
        }
    }

    #[test]
    fn test_known_answer_aes256_device_bound() {
        let key = key32();
        let ctx = EncryptionContext::device_bound(&key);
        assert_eq!(
            encrypt_string("hello warden", &ctx).unwrap(),
            "bj1nixTVoYpSvpdAmoOGj9HtxIK2VnCvg+ZFISAe0E7bIEgdGXw1KQ=="
        );
    }

    #[test]
    fn test_tampering_any_byte_fails_authentication() {
        let key = key32();
        for ctx in [
            EncryptionContext::shared_key(&key),
            EncryptionContext::device_bound(&key),
        ] {
            let sealed = seal(b"sensitive", &ctx).unwrap();
            let bytes = sealed.to_bytes();

            for i in 0..bytes.len() {
                let mut tampered = bytes.clone();
                tampered[i] ^= 0x01;
                let msg = SealedMessage::from_bytes(&tampered).unwrap();
                assert!(
                    matches!(open(&msg, &ctx), Err(Error::AuthenticationFailure)),
                    "{:?}: byte {} flip was not detected",
                    ctx.mode(),
                    i
                );
            }
        }
    }

    #[test]
    fn test_wrong_key_fails_authentication() {
        let key = key32();
        let other = EncryptionKey::from_bytes(&[43u8; 32]).unwrap();

        let sealed = seal(b"secret", &EncryptionContext::device_bound(&key)).unwrap();
        let result = open(&sealed, &EncryptionContext::device_bound(&other));
        assert!(matches!(result, Err(Error::AuthenticationFailure)));
    }

    #[test]
    fn test_associated_data_is_bound() {
        let key = key32();
        let ctx = EncryptionContext::shared_key(&key).with_associated_data(b"request-1".to_vec());
        let sealed = seal(b"body", &ctx).unwrap();

        let wrong = EncryptionContext::shared_key(&key).with_associated_data(b"request-2".to_vec());
        assert!(matches!(open(&sealed, &wrong), Err(Error::AuthenticationFailure)));
        assert_eq!(open(&sealed, &ctx).unwrap(), b"body");
    }

    #[test]
    fn test_malformed_input() {
        let key = key32();
        let ctx = EncryptionContext::device_bound(&key);

        // Too short: 27 bytes
        let short = STANDARD.encode([0u8; MIN_SEALED_LEN - 1]);
        assert!(matches!(decrypt_string(&short, &ctx), Err(Error::MalformedInput(_))));

        // Not base64
        assert!(matches!(
            decrypt_string("not*base64!", &ctx),
            Err(Error::MalformedInput(_))
        ));

        // Exactly 28 bytes parses, then fails authentication
        let minimal = STANDARD.encode([0u8; MIN_SEALED_LEN]);
        assert!(matches!(
            decrypt_string(&minimal, &ctx),
            Err(Error::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_sealed_message_segments() {
        let key = key32();
        let sealed = seal(b"abc", &EncryptionContext::device_bound(&key)).unwrap();
        assert_eq!(sealed.ciphertext().len(), 3);
        assert_eq!(sealed.tag().len(), TAG_SIZE);
        assert_eq!(sealed.to_bytes().len(), NONCE_SIZE + 3 + TAG_SIZE);

        let parsed = SealedMessage::from_base64(&sealed.to_string()).unwrap();
        assert_eq!(parsed, sealed);
    }

    #[test]
    fn test_empty_plaintext() {
        let key = key32();
        let ctx = EncryptionContext::shared_key(&key);
        let sealed = seal(b"", &ctx).unwrap();
        assert_eq!(sealed.to_bytes().len(), MIN_SEALED_LEN);
        assert!(open(&sealed, &ctx).unwrap().is_empty());
    }

    #[test]
    fn test_key_debug_is_redacted() {
        let debug = format!("{:?}", key32());
        assert_eq!(debug, "EncryptionKey(AES-256, <redacted>)");
    }
}
