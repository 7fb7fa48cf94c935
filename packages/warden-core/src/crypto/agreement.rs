//! # Key Agreement
//!
//! ECDH between a local [`KeyPair`] and a peer public key.
//!
//! ```text
//!   local private ─┐
//!                  ├─ ECDH ─→ SharedSecret ─┬─→ derive_channel_key ─→ AEAD
//!   peer public ───┘                        └─→ HMAC key ──────────→ Signer
//! ```

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use super::encryption::EncryptionKey;
use super::kdf::derive_channel_key;
use super::keys::{Curve, KeyPair, PeerPublicKey};
use crate::error::{Error, Result};

/// Raw ECDH output
///
/// Never logged and never persisted. `Debug` prints only the curve.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret {
    bytes: Vec<u8>,
    #[zeroize(skip)]
    curve: Curve,
}

impl SharedSecret {
    /// Raw secret bytes (32, 48 or 66 depending on the curve)
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Curve the secret was agreed on
    pub fn curve(&self) -> Curve {
        self.curve
    }

    /// AEAD key for channel encryption
    pub fn channel_key(&self) -> Result<EncryptionKey> {
        derive_channel_key(&self.bytes)
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedSecret({}, <redacted>)", self.curve)
    }
}

/// Generate a fresh key pair on `curve`
pub fn generate_key_pair(curve: Curve) -> Result<KeyPair> {
    KeyPair::generate(curve)
}

/// Derive the shared secret between `local` and a peer's encoded public key
///
/// `peer_public` may be a SEC1 point or an SPKI DER blob on the local curve.
pub fn derive_shared_secret(local: &KeyPair, peer_public: &[u8]) -> Result<SharedSecret> {
    let curve = local.curve();
    let peer = PeerPublicKey::parse(curve, peer_public)?;
    let bytes = local.diffie_hellman(&peer)?;

    if bytes.len() != curve.shared_secret_len() || bytes.iter().all(|b| *b == 0) {
        return Err(Error::AgreementFailure(format!(
            "unexpected {} output",
            curve
        )));
    }

    Ok(SharedSecret { bytes, curve })
}

// ============================================================================
// TESTS
// ============================================================================
