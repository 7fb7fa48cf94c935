//! # Cryptography Module
//!
//! Key agreement, authenticated encryption, key derivation and request
//! signing for Warden Core.
//!
//! ## Security Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    CRYPTOGRAPHIC ARCHITECTURE                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    KEY AGREEMENT                                │   │
//! │  ├─────────────────────────────────────────────────────────────────┤   │
//! │  │                                                                 │   │
//! │  │  Ephemeral KeyPair (P-256 / P-384 / P-521)                     │   │
//! │  │                          │                                      │   │
//! │  │        peer public key ──┤ ECDH                                 │   │
//! │  │                          ▼                                      │   │
//! │  │  ┌─────────────────────────────────────────────────────────┐   │   │
//! │  │  │              SharedSecret (32 / 48 / 66 bytes)           │   │   │
//! │  │  └─────────────────────────────────────────────────────────┘   │   │
//! │  │            ┌─────────────┴─────────────┐                       │   │
//! │  │            ▼                           ▼                       │   │
//! │  │  ┌─────────────────┐         ┌─────────────────┐              │   │
//! │  │  │ Channel Key     │         │ Request Signer  │              │   │
//! │  │  │ (AES-GCM)       │         │ (HMAC-SHA256)   │              │   │
//! │  │  └─────────────────┘         └─────────────────┘              │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 ENCRYPTION MODES                                │   │
//! │  ├─────────────────────────────────────────────────────────────────┤   │
//! │  │                                                                 │   │
//! │  │  DeviceBound   fixed nonce + fixed AAD   deterministic         │   │
//! │  │  SharedKey     random nonce per message  full AEAD             │   │
//! │  │                                                                 │   │
//! │  │  Wire format:  base64( nonce(12) || ciphertext || tag(16) )    │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Algorithm Choices
//!
//! | Algorithm | Purpose | Crate |
//! |-----------|---------|-------|
//! | ECDH P-256/384/521 | Key agreement | `p256`, `p384`, `p521` |
//! | AES-128/192/256-GCM | Encryption | `aes-gcm` |
//! | HKDF-SHA256 | Key derivation | `hkdf` |
//! | HMAC-SHA256 | Request signatures | `hmac` |
//!
//! ## Security Considerations
//!
//! 1. **Key Zeroization**: private scalars, shared secrets and AEAD keys are
//!    zeroized when dropped
//! 2. **Secure Random**: `rand::rngs::OsRng` for keys and nonces
//! 3. **No Silent Fallbacks**: a missing key is `NoActiveKey`, never a zero key

mod agreement;
mod encryption;
mod kdf;
mod keys;
mod signing;

pub use agreement::{derive_shared_secret, generate_key_pair, SharedSecret};
pub use encryption::{
    decrypt_string, encrypt_string, open, seal, EncryptionContext, EncryptionKey, Mode,
    SealedMessage, DEVICE_BOUND_AAD, DEVICE_BOUND_NONCE, MIN_SEALED_LEN, NONCE_SIZE, TAG_SIZE,
};
pub use kdf::{derive_channel_key, derive_storage_key};
pub use keys::{Curve, KeyPair, PeerPublicKey};
pub use signing::{
    sign_request, verify_request_signature, JwsHeader, ALGORITHM as SIGNATURE_ALGORITHM,
    SIGNATURE_HEADER,
};
