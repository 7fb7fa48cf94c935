//! Request options for pinned fetches.
//!
//! Deserializes the camelCase options object hosts already send:
//!
//! ```json
//! {
//!   "method": "POST",
//!   "headers": { "Accept": "application/json" },
//!   "body": { "amount": 10 },
//!   "timeout": 10000,
//!   "certificates": ["sha256/gGLZpgmRMOu2yuTA9DZUDSvIafDbmJmCoVXOmXtuCBQ="],
//!   "validDomains": ["example.com"],
//!   "keyId": "key-1",
//!   "requestId": "req-42"
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pinning::PinSet;

/// HTTP method of a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    #[default]
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl HttpMethod {
    /// POST, PUT and PATCH must carry a body
    pub fn requires_body(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }

    pub(crate) fn to_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_reqwest().as_str())
    }
}

/// Options for one pinned fetch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FetchOptions {
    /// HTTP method, GET when absent
    pub method: HttpMethod,
    /// Extra request headers
    pub headers: BTreeMap<String, String>,
    /// Request body: a string is sent as-is, anything else as JSON
    pub body: Option<serde_json::Value>,
    /// Timeout in milliseconds
    pub timeout: Option<u64>,
    /// Intermediate pins, `sha256/<base64>`
    pub certificates: Vec<String>,
    /// Leaf pins, `sha256/<base64>`; empty skips the leaf check
    pub leaf_certificates: Vec<String>,
    /// Domains the leaf certificate may be issued for
    pub valid_domains: Vec<String>,
    /// Signing key id for the `X-JWS-Signature` header
    pub key_id: Option<String>,
    /// Request id for the `X-JWS-Signature` header
    pub request_id: Option<String>,
}

impl FetchOptions {
    /// Parse from the host's JSON options object
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Pinning policy for this request
    pub fn pin_set(&self) -> Result<PinSet> {
        PinSet::new(&self.certificates, &self.valid_domains)?.with_leaf_pins(&self.leaf_certificates)
    }

    /// Serialized body bytes, if any
    pub fn body_bytes(&self) -> Result<Option<Vec<u8>>> {
        match &self.body {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(text)) => Ok(Some(text.as_bytes().to_vec())),
            Some(value) => Ok(Some(serde_json::to_vec(value)?)),
        }
    }

    /// Whether the body is structured JSON rather than a raw string
    pub fn has_json_body(&self) -> bool {
        !matches!(
            self.body,
            None | Some(serde_json::Value::Null) | Some(serde_json::Value::String(_))
        )
    }

    /// Request timeout, falling back to `default`
    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout.map(Duration::from_millis).unwrap_or(default)
    }

    /// `(keyId, requestId)` when both are set
    pub fn signing_ids(&self) -> Option<(&str, &str)> {
        match (&self.key_id, &self.request_id) {
            (Some(key_id), Some(request_id)) => Some((key_id.as_str(), request_id.as_str())),
            _ => None,
        }
    }

    /// Checks that need no network: body presence and header names
    pub fn validate(&self) -> Result<()> {
        if self.method.requires_body() && self.body_bytes()?.is_none() {
            return Err(Error::InvalidConfig(format!(
                "{} requires a body",
                self.method
            )));
        }
        for (name, value) in &self.headers {
            reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Error::InvalidConfig(format!("invalid header name {:?}", name)))?;
            reqwest::header::HeaderValue::from_str(value)
                .map_err(|_| Error::InvalidConfig(format!("invalid value for header {}", name)))?;
        }
        Ok(())
    }
}
