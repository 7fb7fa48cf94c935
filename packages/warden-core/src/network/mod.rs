//! # Network Module
//!
//! Pinned HTTPS requests.
//!
//! ## Request Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        PINNED FETCH FLOW                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  1. Parse URL and FetchOptions                                         │
//! │     └─► pins with a non-https URL fail with InsecureScheme             │
//! │                                                                         │
//! │  2. Build a one-shot rustls ClientConfig around PinningVerifier        │
//! │     └─► redirects off, no cookie store, timeout (default 60 s)         │
//! │                                                                         │
//! │  3. Sign the body (keyId + requestId set)                              │
//! │     └─► X-JWS-Signature: <header>..<signature>                         │
//! │                                                                         │
//! │  4. Handshake                                                          │
//! │     └─► Rejected verdict: the request fails with that Validation error │
//! │                                                                         │
//! │  5. Response                                                           │
//! │     └─► status < 400: FetchResponse { status, url, body, duration }    │
//! │     └─► status >= 400: Error::HttpStatus { status, url, body }         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod fetch;
mod options;

pub use fetch::{fetch, FetchFailure, FetchResponse, Fetcher, DEFAULT_TIMEOUT};
pub use options::{FetchOptions, HttpMethod};
