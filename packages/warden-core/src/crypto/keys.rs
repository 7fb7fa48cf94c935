//! # Curve Key Pairs
//!
//! Ephemeral NIST-curve key pairs used for ECDH key agreement.
//!
//! ## Key Structure
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           KEY PAIR                                      │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  Curve         P-256        P-384        P-521                  │   │
//! │  │  ─────         ─────        ─────        ─────                  │   │
//! │  │  Scalar        32 bytes     48 bytes     66 bytes               │   │
//! │  │  SEC1 point    65 bytes     97 bytes     133 bytes              │   │
//! │  │  ECDH output   32 bytes     48 bytes     66 bytes               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  Private scalar:  never leaves this module, zeroized on drop           │
//! │  Public point:    exported as uncompressed SEC1 or SPKI DER            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Peers may hand us their key either as a bare SEC1 point (compressed or
//! uncompressed) or wrapped in a DER `SubjectPublicKeyInfo`. Both are
//! accepted by [`PeerPublicKey::parse`].

use std::fmt;
use std::str::FromStr;

use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use x509_parser::prelude::FromDer;
use x509_parser::x509::SubjectPublicKeyInfo;

use crate::error::{Error, Result};

// ============================================================================
// SUBJECT PUBLIC KEY INFO PREFIXES
// ============================================================================

/// DER header of a P-256 `SubjectPublicKeyInfo`, up to the point bytes
pub const P256_SPKI_PREFIX: [u8; 26] = [
    0x30, 0x59, 0x30, 0x13, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x08,
    0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, 0x03, 0x42, 0x00,
];

/// DER header of a P-384 `SubjectPublicKeyInfo`, up to the point bytes
pub const P384_SPKI_PREFIX: [u8; 23] = [
    0x30, 0x76, 0x30, 0x10, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x05,
    0x2b, 0x81, 0x04, 0x00, 0x22, 0x03, 0x62, 0x00,
];

/// DER header of a P-521 `SubjectPublicKeyInfo`, up to the point bytes
pub const P521_SPKI_PREFIX: [u8; 25] = [
    0x30, 0x81, 0x9b, 0x30, 0x10, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06,
    0x05, 0x2b, 0x81, 0x04, 0x00, 0x23, 0x03, 0x81, 0x86, 0x00,
];

// ============================================================================
// CURVE
// ============================================================================

/// Named elliptic curve used for key agreement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Curve {
    /// NIST P-256 (secp256r1)
    #[default]
    P256,
    /// NIST P-384 (secp384r1)
    P384,
    /// NIST P-521 (secp521r1)
    P521,
}

impl Curve {
    /// Canonical name (`P-256`, `P-384`, `P-521`)
    pub fn name(&self) -> &'static str {
        match self {
            Curve::P256 => "P-256",
            Curve::P384 => "P-384",
            Curve::P521 => "P-521",
        }
    }

    /// Length of the raw ECDH output on this curve
    pub fn shared_secret_len(&self) -> usize {
        match self {
            Curve::P256 => 32,
            Curve::P384 => 48,
            Curve::P521 => 66,
        }
    }

    /// Length of an uncompressed SEC1 point on this curve
    pub fn uncompressed_point_len(&self) -> usize {
        1 + 2 * self.shared_secret_len()
    }

    /// DER header that precedes the point in a `SubjectPublicKeyInfo`
    pub fn spki_prefix(&self) -> &'static [u8] {
        match self {
            Curve::P256 => &P256_SPKI_PREFIX,
            Curve::P384 => &P384_SPKI_PREFIX,
            Curve::P521 => &P521_SPKI_PREFIX,
        }
    }
}

impl FromStr for Curve {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "p256" | "p-256" | "secp256r1" | "prime256v1" => Ok(Curve::P256),
            "p384" | "p-384" | "secp384r1" => Ok(Curve::P384),
            // "p512" is accepted as a historical alias for P-521
            "p521" | "p-521" | "secp521r1" | "p512" => Ok(Curve::P521),
            _ => Err(Error::InvalidCurve(s.to_string())),
        }
    }
}

impl TryFrom<String> for Curve {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Curve> for String {
    fn from(curve: Curve) -> Self {
        curve.name().to_string()
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// KEY PAIR
// ============================================================================

/// Private scalar for one of the supported curves.
///
/// The RustCrypto `SecretKey` types zeroize themselves on drop.
enum SecretScalar {
    P256(p256::SecretKey),
    P384(p384::SecretKey),
    P521(p521::SecretKey),
}

/// An ephemeral key agreement key pair
///
/// Exclusively owned by the session that created it. Replacing or dropping
/// the pair wipes the private scalar.
pub struct KeyPair {
    secret: SecretScalar,
    public: PeerPublicKey,
}

impl KeyPair {
    /// Generate a fresh key pair on `curve` from the OS CSPRNG
    pub fn generate(curve: Curve) -> Result<Self> {
        ensure_entropy()?;

        let secret = match curve {
            Curve::P256 => SecretScalar::P256(p256::SecretKey::random(&mut OsRng)),
            Curve::P384 => SecretScalar::P384(p384::SecretKey::random(&mut OsRng)),
            Curve::P521 => SecretScalar::P521(p521::SecretKey::random(&mut OsRng)),
        };
        let public = match &secret {
            SecretScalar::P256(sk) => PeerPublicKey::P256(sk.public_key()),
            SecretScalar::P384(sk) => PeerPublicKey::P384(sk.public_key()),
            SecretScalar::P521(sk) => PeerPublicKey::P521(sk.public_key()),
        };

        Ok(Self { secret, public })
    }

    /// Curve this pair lives on
    pub fn curve(&self) -> Curve {
        self.public.curve()
    }

    /// Public half of the pair
    pub fn public_key(&self) -> &PeerPublicKey {
        &self.public
    }

    /// Uncompressed SEC1 encoding of the public point
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.public.to_sec1_bytes()
    }

    /// Raw ECDH with a peer key on the same curve
    pub(crate) fn diffie_hellman(&self, peer: &PeerPublicKey) -> Result<Vec<u8>> {
        match (&self.secret, peer) {
            (SecretScalar::P256(sk), PeerPublicKey::P256(pk)) => Ok(p256::ecdh::diffie_hellman(
                sk.to_nonzero_scalar(),
                pk.as_affine(),
            )
            .raw_secret_bytes()
            .to_vec()),
            (SecretScalar::P384(sk), PeerPublicKey::P384(pk)) => Ok(p384::ecdh::diffie_hellman(
                sk.to_nonzero_scalar(),
                pk.as_affine(),
            )
            .raw_secret_bytes()
            .to_vec()),
            (SecretScalar::P521(sk), PeerPublicKey::P521(pk)) => Ok(p521::ecdh::diffie_hellman(
                sk.to_nonzero_scalar(),
                pk.as_affine(),
            )
            .raw_secret_bytes()
            .to_vec()),
            _ => Err(Error::AgreementFailure(format!(
                "curve mismatch: local {} vs peer {}",
                self.curve(),
                peer.curve()
            ))),
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("curve", &self.curve().name())
            .field("public", &hex::encode(self.public_key_bytes()))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// PUBLIC KEY
// ============================================================================

/// A validated public point on one of the supported curves
#[derive(Clone, PartialEq, Eq)]
pub enum PeerPublicKey {
    /// P-256 point
    P256(p256::PublicKey),
    /// P-384 point
    P384(p384::PublicKey),
    /// P-521 point
    P521(p521::PublicKey),
}

impl PeerPublicKey {
    /// Parse a peer key for `curve`
    ///
    /// Accepts a DER `SubjectPublicKeyInfo` or a SEC1 point (compressed or
    /// uncompressed). Anything that is not a valid point on `curve` fails
    /// with `InvalidPeerKey`.
    pub fn parse(curve: Curve, bytes: &[u8]) -> Result<Self> {
        match bytes.first() {
            None => Err(Error::InvalidPeerKey("empty key".into())),
            // DER SEQUENCE
            Some(0x30) => {
                let (_, spki) = SubjectPublicKeyInfo::from_der(bytes)
                    .map_err(|e| Error::InvalidPeerKey(format!("bad SubjectPublicKeyInfo: {}", e)))?;
                let point: &[u8] = spki.subject_public_key.data.as_ref();
                Self::from_sec1(curve, point)
            }
            Some(_) => Self::from_sec1(curve, bytes),
        }
    }

    fn from_sec1(curve: Curve, point: &[u8]) -> Result<Self> {
        let invalid = |_| Error::InvalidPeerKey(format!("not a point on {}", curve));
        match curve {
            Curve::P256 => p256::PublicKey::from_sec1_bytes(point)
                .map(PeerPublicKey::P256)
                .map_err(invalid),
            Curve::P384 => p384::PublicKey::from_sec1_bytes(point)
                .map(PeerPublicKey::P384)
                .map_err(invalid),
            Curve::P521 => p521::PublicKey::from_sec1_bytes(point)
                .map(PeerPublicKey::P521)
                .map_err(invalid),
        }
    }

    /// Curve of this point
    pub fn curve(&self) -> Curve {
        match self {
            PeerPublicKey::P256(_) => Curve::P256,
            PeerPublicKey::P384(_) => Curve::P384,
            PeerPublicKey::P521(_) => Curve::P521,
        }
    }

    /// Uncompressed SEC1 encoding (`0x04 || X || Y`)
    pub fn to_sec1_bytes(&self) -> Vec<u8> {
        match self {
            PeerPublicKey::P256(pk) => pk.to_encoded_point(false).as_bytes().to_vec(),
            PeerPublicKey::P384(pk) => pk.to_encoded_point(false).as_bytes().to_vec(),
            PeerPublicKey::P521(pk) => pk.to_encoded_point(false).as_bytes().to_vec(),
        }
    }

    /// DER `SubjectPublicKeyInfo` encoding
    pub fn to_spki_der(&self) -> Vec<u8> {
        let prefix = self.curve().spki_prefix();
        let point = self.to_sec1_bytes();
        let mut der = Vec::with_capacity(prefix.len() + point.len());
        der.extend_from_slice(prefix);
        der.extend_from_slice(&point);
        der
    }
}

impl fmt::Debug for PeerPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerPublicKey({}, {})", self.curve(), hex::encode(self.to_sec1_bytes()))
    }
}

/// Fail early with `RngFailed` if the OS randomness source is unavailable
pub(crate) fn ensure_entropy() -> Result<()> {
    let mut probe = [0u8; 16];
    OsRng.try_fill_bytes(&mut probe).map_err(|_| Error::RngFailed)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_CURVES: [Curve; 3] = [Curve::P256, Curve::P384, Curve::P521];

    #[test]
    fn test_curve_names() {
        assert_eq!("p256".parse::<Curve>().unwrap(), Curve::P256);
        assert_eq!("P-256".parse::<Curve>().unwrap(), Curve::P256);
        assert_eq!("prime256v1".parse::<Curve>().unwrap(), Curve::P256);
        assert_eq!("secp384r1".parse::<Curve>().unwrap(), Curve::P384);
        assert_eq!("P521".parse::<Curve>().unwrap(), Curve::P521);
        assert_eq!("p512".parse::<Curve>().unwrap(), Curve::P521);

        let err = "curve25519".parse::<Curve>().unwrap_err();
        assert!(matches!(err, Error::InvalidCurve(_)));
        assert_eq!(err.code(), 300);
    }

    #[test]
    fn test_curve_serde() {
        let curve: Curve = serde_json::from_str("\"p384\"").unwrap();
        assert_eq!(curve, Curve::P384);
        assert_eq!(serde_json::to_string(&Curve::P521).unwrap(), "\"P-521\"");
        assert!(serde_json::from_str::<Curve>("\"p999\"").is_err());
    }

    #[test]
    fn test_keypair_generation() {
        for curve in ALL_CURVES {
            let kp = KeyPair::generate(curve).unwrap();
            assert_eq!(kp.curve(), curve);

            let public = kp.public_key_bytes();
            assert_eq!(public.len(), curve.uncompressed_point_len());
            assert_eq!(public[0], 0x04);
        }
    }

    #[test]
    fn test_keypairs_are_unique() {
        let a = KeyPair::generate(Curve::P256).unwrap();
        let b = KeyPair::generate(Curve::P256).unwrap();
        assert_ne!(a.public_key_bytes(), b.public_key_bytes());
    }

    #[test]
    fn test_spki_roundtrip_per_curve() {
        for curve in ALL_CURVES {
            let kp = KeyPair::generate(curve).unwrap();
            let der = kp.public_key().to_spki_der();
            assert!(der.starts_with(curve.spki_prefix()));

            let parsed = PeerPublicKey::parse(curve, &der).unwrap();
            assert_eq!(&parsed, kp.public_key());
        }
    }

    #[test]
    fn test_spki_lengths_match_der_headers() {
        // The outer SEQUENCE length must cover the whole encoding
        let kp = KeyPair::generate(Curve::P256).unwrap();
        assert_eq!(kp.public_key().to_spki_der().len(), 91);
        let kp = KeyPair::generate(Curve::P384).unwrap();
        assert_eq!(kp.public_key().to_spki_der().len(), 120);
        let kp = KeyPair::generate(Curve::P521).unwrap();
        assert_eq!(kp.public_key().to_spki_der().len(), 158);
    }

    #[test]
    fn test_parse_rejects_wrong_curve() {
        let kp = KeyPair::generate(Curve::P384).unwrap();
        let err = PeerPublicKey::parse(Curve::P256, &kp.public_key_bytes()).unwrap_err();
        assert!(matches!(err, Error::InvalidPeerKey(_)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            PeerPublicKey::parse(Curve::P256, &[]),
            Err(Error::InvalidPeerKey(_))
        ));
        assert!(matches!(
            PeerPublicKey::parse(Curve::P256, &[0x04; 65]),
            Err(Error::InvalidPeerKey(_))
        ));
        assert!(matches!(
            PeerPublicKey::parse(Curve::P256, &[0x30, 0x03, 0x01, 0x02]),
            Err(Error::InvalidPeerKey(_))
        ));
    }

    #[test]
    fn test_debug_hides_private_scalar() {
        let kp = KeyPair::generate(Curve::P256).unwrap();
        let debug = format!("{:?}", kp);
        assert!(debug.contains("P-256"));
        assert!(!debug.contains("secret"));
    }
}
