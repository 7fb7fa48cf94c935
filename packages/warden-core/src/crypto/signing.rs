//! # Request Signing
//!
//! HS256 detached-payload JWS over outgoing request bodies, keyed with the
//! session's shared secret.
//!
//! ## Signature Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    DETACHED JWS (RFC 7797, b64=false)                   │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  header = {"alg":"HS256","kid":<keyId>,"b64":false,                    │
//! │            "crit":["b64"],"requestId":<requestId>}                     │
//! │                                                                         │
//! │  signing input = base64url(header) || "." || body                      │
//! │                                   (body is NOT base64-encoded)         │
//! │                                                                         │
//! │  signature     = HMAC-SHA256(shared_secret, signing input)             │
//! │                                                                         │
//! │  output        = base64url(header) || ".." || base64url(signature)     │
//! │                                   (empty payload segment)              │
//! │                                                                         │
//! │  base64url is unpadded throughout.                                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The output travels in the `X-JWS-Signature` request header.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// HTTP header carrying the detached signature
pub const SIGNATURE_HEADER: &str = "X-JWS-Signature";

/// The only JWS algorithm produced or accepted
pub const ALGORITHM: &str = "HS256";

/// Protected JWS header
///
/// Field order is the serialization order and therefore part of the
/// signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JwsHeader {
    /// Always `HS256`
    pub alg: String,
    /// Caller key identifier
    pub kid: String,
    /// Always false: the payload is signed unencoded
    pub b64: bool,
    /// Always `["b64"]`
    pub crit: Vec<String>,
    /// Caller request identifier
    pub request_id: String,
}

impl JwsHeader {
    /// Header for `key_id` / `request_id`
    pub fn new(key_id: &str, request_id: &str) -> Self {
        Self {
            alg: ALGORITHM.to_string(),
            kid: key_id.to_string(),
            b64: false,
            crit: vec!["b64".to_string()],
            request_id: request_id.to_string(),
        }
    }

    fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }
}

/// Sign `body` with `secret`, returning `<header>..<signature>`
pub fn sign_request(secret: &[u8], key_id: &str, request_id: &str, body: &[u8]) -> Result<String> {
    let encoded_header = JwsHeader::new(key_id, request_id).encode()?;
    let tag = compute_mac(secret, &encoded_header, body)?;
    Ok(format!("{}..{}", encoded_header, URL_SAFE_NO_PAD.encode(tag)))
}

/// Verify a detached signature over `body`, returning its header
///
/// The MAC comparison is constant-time.
pub fn verify_request_signature(secret: &[u8], body: &[u8], signature: &str) -> Result<JwsHeader> {
    let (encoded_header, encoded_sig) = signature
        .split_once("..")
        .ok_or_else(|| Error::MalformedInput("signature is not a detached JWS".into()))?;

    let header_json = URL_SAFE_NO_PAD.decode(encoded_header)?;
    let header: JwsHeader = serde_json::from_slice(&header_json)
        .map_err(|e| Error::MalformedInput(format!("bad JWS header: {}", e)))?;
    if header.alg != ALGORITHM || header.b64 {
        return Err(Error::MalformedInput(format!(
            "unsupported JWS header: alg={} b64={}",
            header.alg, header.b64
        )));
    }

    let sig = URL_SAFE_NO_PAD.decode(encoded_sig)?;

    let mut mac = new_mac(secret)?;
    mac.update(encoded_header.as_bytes());
    mac.update(b".");
    mac.update(body);
    mac.verify_slice(&sig)
        .map_err(|_| Error::AuthenticationFailure)?;

    Ok(header)
}

fn compute_mac(secret: &[u8], encoded_header: &str, body: &[u8]) -> Result<Vec<u8>> {
    let mut mac = new_mac(secret)?;
    mac.update(encoded_header.as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn new_mac(secret: &[u8]) -> Result<HmacSha256> {
    if secret.is_empty() {
        return Err(Error::NoActiveKey);
    }
    <HmacSha256 as Mac>::new_from_slice(secret).map_err(|e| Error::InvalidKey(e.to_string()))
}

// ============================================================================
// TESTS
// ============================================================================
