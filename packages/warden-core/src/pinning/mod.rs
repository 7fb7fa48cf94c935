//! # Certificate Pinning
//!
//! Restricts which certificate chains a TLS connection will accept, on top
//! of normal WebPKI trust.
//!
//! ## Pinning Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      CERTIFICATE PINNING                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  FetchOptions { certificates, validDomains }                           │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  PinSet (pin_set.rs) ── parsed once per request, immutable             │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  rustls handshake                                                │  │
//! │  │    PinningVerifier (verifier.rs)                                 │  │
//! │  │      │ builds TrustEvaluation {host, port, leaf..root}           │  │
//! │  │      ▼                                                           │  │
//! │  │    PinningValidator::evaluate (validator.rs)                     │  │
//! │  │      │ rules 1-5 on CertificateInfo (certificate.rs)             │  │
//! │  │      ▼                                                           │  │
//! │  │    TrustEvaluator (trust.rs) ── WebPKI over platform roots       │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  Verdict: Accepted ──▶ handshake completes                             │
//! │           Rejected ──▶ handshake aborted, error recorded               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The validator is a synchronous function with no shared state. Every
//! request carries its own pin set and gets exactly one recorded verdict.

mod certificate;
mod pin_set;
mod trust;
mod validator;
mod verifier;

pub use certificate::CertificateInfo;
pub use pin_set::{format_pin, parse_pin, PinDigest, PinSet};
pub use trust::{TrustEvaluation, TrustEvaluator, WebPkiTrustEvaluator, HTTPS_PORT};
pub use validator::{
    host_matches, PinningValidator, ValidationState, Verdict, MAX_CHAIN_LEN, MIN_CHAIN_LEN,
};
pub use verifier::{PinningVerifier, VerdictSlot};
