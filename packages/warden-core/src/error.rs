//! # Error Handling
//!
//! Error types for Warden Core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Key Agreement Errors (ErrorKind::KeyAgreement)                    │
//! │  │   ├── InvalidCurve          - Unknown curve name                    │
//! │  │   ├── InvalidPeerKey        - Peer key is not a point on the curve  │
//! │  │   ├── AgreementFailure      - ECDH derivation failed                │
//! │  │   └── RngFailed             - OS randomness unavailable             │
//! │  │                                                                      │
//! │  ├── Encryption Errors (ErrorKind::Encryption)                         │
//! │  │   ├── NoActiveKey           - No shared secret derived yet          │
//! │  │   ├── InvalidKey            - Key has an unusable length            │
//! │  │   ├── MalformedInput        - Cannot split nonce/ciphertext/tag     │
//! │  │   └── AuthenticationFailure - Tag mismatch (tampering / wrong key)  │
//! │  │                                                                      │
//! │  ├── Validation Errors (ErrorKind::Validation)                         │
//! │  │   ├── ChainRejected         - Port or chain length out of policy    │
//! │  │   ├── DomainMismatch        - Leaf CN not in the valid domains      │
//! │  │   ├── PinMismatch           - Key digest not pinned                 │
//! │  │   ├── HostMismatch          - Host does not match the leaf CN       │
//! │  │   ├── TrustEvaluationFailed - Signature / validity / policy failure │
//! │  │   ├── InvalidPin            - Pin string is not a SHA-256 digest    │
//! │  │   └── InsecureScheme        - Pins configured for a non-TLS URL     │
//! │  │                                                                      │
//! │  └── Transport Errors (ErrorKind::Transport)                           │
//! │      ├── InvalidUrl            - URL cannot be parsed                  │
//! │      ├── Timeout               - Request timed out                     │
//! │      ├── ConnectionFailed      - Network failure                       │
//! │      └── HttpStatus            - Server answered with status >= 400    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Validation rejections and transport failures are deliberately separate
//! variants: a pinning rejection is terminal for the request, a timeout may
//! be retried by the caller.

use serde::Serialize;
use thiserror::Error;

/// Result type alias for Warden Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Broad failure category, mirrored by the numeric code ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Curve selection, peer key decoding and ECDH
    KeyAgreement,
    /// AEAD sealing/opening and key handling
    Encryption,
    /// Certificate pinning and trust evaluation
    Validation,
    /// Underlying HTTP/TLS transport
    Transport,
    /// Serialization, configuration and other internal failures
    Internal,
}

/// Main error type for Warden Core
#[derive(Error, Debug, Clone)]
pub enum Error {
    // ========================================================================
    // Key Agreement Errors (300-399)
    // ========================================================================
    /// Unknown or unsupported curve name
    #[error("Unsupported curve: {0}")]
    InvalidCurve(String),

    /// Peer public key does not decode to a point on the session curve
    #[error("Invalid peer public key: {0}")]
    InvalidPeerKey(String),

    /// ECDH derivation failed
    #[error("Key agreement failed: {0}")]
    AgreementFailure(String),

    /// Random number generation failed
    #[error("Random number generation failed")]
    RngFailed,

    // ========================================================================
    // Encryption Errors (400-499)
    // ========================================================================
    /// No shared secret has been derived for this session yet
    #[error("No active key. Complete key agreement first.")]
    NoActiveKey,

    /// Key material has an unusable length or encoding
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Encoded message cannot be split into nonce/ciphertext/tag
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Authentication tag did not verify
    #[error("Authentication failed: ciphertext was modified or the key is wrong")]
    AuthenticationFailure,

    /// Cipher failed while sealing
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    // ========================================================================
    // Validation Errors (500-599)
    // ========================================================================
    /// Port or chain length outside the pinning policy
    #[error("Certificate chain rejected: {0}")]
    ChainRejected(String),

    /// Leaf common name is not covered by any valid domain
    #[error("Domain mismatch: {0}")]
    DomainMismatch(String),

    /// A certificate's public key digest is not pinned
    #[error("Pin mismatch: {0}")]
    PinMismatch(String),

    /// Connection host does not match the leaf common name
    #[error("Host mismatch: {0}")]
    HostMismatch(String),

    /// Platform chain evaluation failed
    #[error("Trust evaluation failed: {0}")]
    TrustEvaluationFailed(String),

    /// A configured pin is not a base64 SHA-256 digest
    #[error("Invalid pin: {0}")]
    InvalidPin(String),

    /// Pins were configured for a URL that does not use TLS
    #[error("Pinned requests require https: {0}")]
    InsecureScheme(String),

    /// A certificate could not be parsed
    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    // ========================================================================
    // Transport Errors (600-699)
    // ========================================================================
    /// URL cannot be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Request timed out
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Connection or protocol failure below HTTP
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Server answered with an error status
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// Response status code
        status: u16,
        /// Final request URL
        url: String,
        /// Response body, decoded lossily as UTF-8
        body: String,
    },

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================
    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Get the error code for the host bindings
    ///
    /// Error codes are organized by category:
    /// - 300-399: Key agreement
    /// - 400-499: Encryption
    /// - 500-599: Validation
    /// - 600-699: Transport
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            // Key agreement (300-399)
            Error::InvalidCurve(_) => 300,
            Error::InvalidPeerKey(_) => 301,
            Error::AgreementFailure(_) => 302,
            Error::RngFailed => 303,

            // Encryption (400-499)
            Error::NoActiveKey => 400,
            Error::InvalidKey(_) => 401,
            Error::MalformedInput(_) => 402,
            Error::AuthenticationFailure => 403,
            Error::EncryptionFailed(_) => 404,

            // Validation (500-599)
            Error::ChainRejected(_) => 500,
            Error::DomainMismatch(_) => 501,
            Error::PinMismatch(_) => 502,
            Error::HostMismatch(_) => 503,
            Error::TrustEvaluationFailed(_) => 504,
            Error::InvalidPin(_) => 505,
            Error::InsecureScheme(_) => 506,
            Error::InvalidCertificate(_) => 507,

            // Transport (600-699)
            Error::InvalidUrl(_) => 600,
            Error::Timeout(_) => 601,
            Error::ConnectionFailed(_) => 602,
            Error::HttpStatus { .. } => 603,

            // Internal (900-999)
            Error::Internal(_) => 900,
            Error::SerializationError(_) => 901,
            Error::InvalidConfig(_) => 902,
        }
    }

    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self.code() {
            300..=399 => ErrorKind::KeyAgreement,
            400..=499 => ErrorKind::Encryption,
            500..=599 => ErrorKind::Validation,
            600..=699 => ErrorKind::Transport,
            _ => ErrorKind::Internal,
        }
    }

    /// Check if this error is recoverable
    ///
    /// Only transport hiccups qualify. Validation rejections are terminal.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Timeout(_) | Error::ConnectionFailed(_))
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Error::MalformedInput(format!("invalid base64: {}", err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout(err.to_string())
        } else if err.is_builder() {
            Error::InvalidUrl(err.to_string())
        } else {
            Error::ConnectionFailed(err.to_string())
        }
    }
}

// ============================================================================
// HOST ERROR REPRESENTATION
// ============================================================================

/// Serializable error shape handed to the host bindings
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Numeric error code
    pub code: i32,
    /// Error category
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Whether the error is recoverable
    pub recoverable: bool,
}

impl From<&Error> for ErrorResponse {
    fn from(err: &Error) -> Self {
        Self {
            code: err.code(),
            kind: err.kind(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
        }
    }
}

impl From<Error> for ErrorResponse {
    fn from(err: Error) -> Self {
        ErrorResponse::from(&err)
    }
}

// ============================================================================
// TESTS
// ============================================================================
