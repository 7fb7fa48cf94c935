//! # Session
//!
//! Caller-owned key agreement state: one key pair and at most one shared
//! secret.
//!
//! ## Lifecycle
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         SESSION STATES                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   ┌──────────┐  generate_key_pair   ┌──────────┐  derive_shared_secret  │
//! │   │  Empty   │ ───────────────────▶ │ KeyPair  │ ─────────────────────▶ │
//! │   └──────────┘                      └──────────┘                        │
//! │        ▲                                 ▲                              │
//! │        │ clear()                         │ generate_key_pair            │
//! │        │                                 │ (old pair + secret wiped)    │
//! │   ┌────┴─────────────────────────────────┴──┐                           │
//! │   │  Active: KeyPair + SharedSecret         │                           │
//! │   │  encrypt / decrypt / sign_request       │                           │
//! │   └─────────────────────────────────────────┘                           │
//! │                                                                         │
//! │   encrypt/decrypt before Active  → NoActiveKey                         │
//! │   sign_request before Active     → "" (logged at warn)                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! State sits behind a `parking_lot::RwLock`. Generation and derivation hold
//! the write lock for their whole duration, so encryption never observes a
//! half-derived secret. Encryption, decryption and signing take the read
//! lock and run in parallel. Sessions are independent of each other.

use base64::{engine::general_purpose::STANDARD, Engine};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::crypto::{
    decrypt_string, derive_shared_secret, encrypt_string, generate_key_pair, sign_request,
    Curve, EncryptionContext, EncryptionKey, KeyPair, Mode, SharedSecret,
};
use crate::error::{Error, Result};

#[derive(Default)]
struct SessionState {
    key_pair: Option<KeyPair>,
    shared: Option<ActiveSecret>,
}

struct ActiveSecret {
    secret: SharedSecret,
    channel_key: EncryptionKey,
}

/// Key agreement session
pub struct Session {
    id: String,
    state: RwLock<SessionState>,
}

impl Session {
    /// Create an empty session
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            state: RwLock::new(SessionState::default()),
        }
    }

    /// Opaque session identifier, used only for log correlation
    pub fn id(&self) -> &str {
        &self.id
    }

    // ========================================================================
    // KEY AGREEMENT
    // ========================================================================

    /// Generate a fresh key pair, replacing (and wiping) any previous pair
    /// and shared secret
    ///
    /// Returns the public key as base64 uncompressed SEC1 point bytes.
    pub fn generate_key_pair(&self, curve: Curve) -> Result<String> {
        let mut state = self.state.write();

        let key_pair = generate_key_pair(curve)?;
        let public = STANDARD.encode(key_pair.public_key_bytes());

        state.shared = None;
        state.key_pair = Some(key_pair);

        info!(session = %self.id, %curve, "Generated key pair");
        Ok(public)
    }

    /// Curve of the current key pair
    pub fn curve(&self) -> Option<Curve> {
        self.state.read().key_pair.as_ref().map(KeyPair::curve)
    }

    /// Current public key as base64 SEC1 point bytes
    pub fn public_key(&self) -> Result<String> {
        let state = self.state.read();
        let key_pair = state.key_pair.as_ref().ok_or(Error::NoActiveKey)?;
        Ok(STANDARD.encode(key_pair.public_key_bytes()))
    }

    /// Current public key as base64 `SubjectPublicKeyInfo` DER
    pub fn public_key_der(&self) -> Result<String> {
        let state = self.state.read();
        let key_pair = state.key_pair.as_ref().ok_or(Error::NoActiveKey)?;
        Ok(STANDARD.encode(key_pair.public_key().to_spki_der()))
    }

    /// Derive the shared secret with a peer and make it the active key
    ///
    /// `peer_public` is base64 of a SEC1 point or SPKI DER on the session
    /// curve. Returns the shared secret as base64.
    pub fn derive_shared_secret(&self, peer_public: &str) -> Result<String> {
        let mut state = self.state.write();

        let key_pair = state.key_pair.as_ref().ok_or(Error::NoActiveKey)?;
        let peer_bytes = STANDARD
            .decode(peer_public.trim())
            .map_err(|e| Error::InvalidPeerKey(format!("not base64: {}", e)))?;

        let secret = derive_shared_secret(key_pair, &peer_bytes)?;
        let channel_key = secret.channel_key()?;
        let encoded = STANDARD.encode(secret.as_bytes());

        info!(session = %self.id, curve = %secret.curve(), "Derived shared secret");
        state.shared = Some(ActiveSecret {
            secret,
            channel_key,
        });
        Ok(encoded)
    }

    /// Whether a shared secret is active
    pub fn has_shared_secret(&self) -> bool {
        self.state.read().shared.is_some()
    }

    /// Drop the key pair and shared secret
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.key_pair = None;
        state.shared = None;
        debug!(session = %self.id, "Session cleared");
    }

    // ========================================================================
    // CHANNEL ENCRYPTION
    // ========================================================================

    /// Encrypt a UTF-8 string under the active channel key
    pub fn encrypt(&self, plaintext: &str, mode: Mode) -> Result<String> {
        let state = self.state.read();
        let active = state.shared.as_ref().ok_or(Error::NoActiveKey)?;
        encrypt_string(plaintext, &EncryptionContext::new(mode, &active.channel_key))
    }

    /// Decrypt a base64 sealed message under the active channel key
    pub fn decrypt(&self, encoded: &str, mode: Mode) -> Result<String> {
        let state = self.state.read();
        let active = state.shared.as_ref().ok_or(Error::NoActiveKey)?;
        decrypt_string(encoded, &EncryptionContext::new(mode, &active.channel_key))
    }

    // ========================================================================
    // REQUEST SIGNING
    // ========================================================================

    /// Detached HS256 signature over `body`
    ///
    /// Returns an empty string when no shared secret is active. Callers send
    /// the request unsigned in that case.
    pub fn sign_request(&self, key_id: &str, request_id: &str, body: &[u8]) -> String {
        let state = self.state.read();
        let Some(active) = state.shared.as_ref() else {
            warn!(session = %self.id, "No shared secret; request left unsigned");
            return String::new();
        };

        match sign_request(active.secret.as_bytes(), key_id, request_id, body) {
            Ok(signature) => signature,
            Err(e) => {
                warn!(session = %self.id, error = %e, "Request signing failed");
                String::new()
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("curve", &self.curve().map(|c| c.name()))
            .field("has_shared_secret", &self.has_shared_secret())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
