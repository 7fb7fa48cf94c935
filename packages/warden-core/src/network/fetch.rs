//! Pinned HTTPS fetch over reqwest.

use std::time::{Duration, Instant};

use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::redirect::Policy;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::options::FetchOptions;
use crate::config::CoreConfig;
use crate::crypto::SIGNATURE_HEADER;
use crate::error::{Error, Result};
use crate::pinning::{PinningVerifier, WebPkiTrustEvaluator};
use crate::session::Session;

/// Timeout when neither the options nor the config give one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Successful response (status below 400)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchResponse {
    /// HTTP status
    pub status: u16,
    /// Final URL
    pub url: String,
    /// Body, decoded lossily as UTF-8
    #[serde(rename = "response")]
    pub body: String,
    /// Round trip, rendered `"<n>ms"`
    pub duration: String,
}

impl FetchResponse {
    /// Parse the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Failed fetch, in the shape the host bindings report
#[derive(Debug, Clone, Serialize)]
pub struct FetchFailure {
    /// HTTP status, when the server answered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Requested URL
    pub url: String,
    /// Error body from the server, else the error message
    pub error: String,
    /// Numeric error code
    pub code: i32,
}

impl FetchFailure {
    /// Describe `err` for a request to `url`
    pub fn new(url: &str, err: &Error) -> Self {
        match err {
            Error::HttpStatus { status, url, body } => Self {
                status: Some(*status),
                url: url.clone(),
                error: body.clone(),
                code: err.code(),
            },
            other => Self {
                status: None,
                url: url.to_string(),
                error: other.to_string(),
                code: other.code(),
            },
        }
    }
}

// ============================================================================
// FETCHER
// ============================================================================

/// Issues pinned requests against one trust store
#[derive(Debug, Clone)]
pub struct Fetcher {
    trust: WebPkiTrustEvaluator,
    default_timeout: Duration,
}

impl Fetcher {
    /// Fetcher over an explicit trust evaluator
    pub fn new(trust: WebPkiTrustEvaluator) -> Self {
        Self {
            trust,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Fetcher over the platform root store
    pub fn with_native_roots() -> Result<Self> {
        Ok(Self::new(WebPkiTrustEvaluator::with_native_roots()?))
    }

    /// Fetcher over the platform root store, timeout from `config`
    pub fn from_config(config: &CoreConfig) -> Result<Self> {
        Ok(Self::with_native_roots()?.with_timeout(config.fetch_timeout()))
    }

    /// Timeout used when the options carry none
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Default timeout
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Send one request.
    ///
    /// The handshake is validated against `options`' pins. When both `keyId`
    /// and `requestId` are set the body is signed with `session`'s shared
    /// secret and sent as `X-JWS-Signature`.
    pub async fn fetch(
        &self,
        url: &str,
        options: &FetchOptions,
        session: Option<&Session>,
    ) -> Result<FetchResponse> {
        let target = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))?;
        if target.host_str().is_none() {
            return Err(Error::InvalidUrl(format!("{}: no host", url)));
        }

        let pins = options.pin_set()?;
        if !pins.pins().is_empty() && target.scheme() != "https" {
            return Err(Error::InsecureScheme(url.to_string()));
        }
        options.validate()?;

        let port = target.port_or_known_default().unwrap_or(443);
        let verifier = PinningVerifier::new(self.trust.clone(), pins, port);
        let verdict = verifier.verdict();
        let tls = verifier.into_client_config()?;

        let timeout = options.timeout_or(self.default_timeout);
        let client = reqwest::Client::builder()
            .use_preconfigured_tls(tls)
            .redirect(Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("HTTP client: {}", e)))?;

        let body = options.body_bytes()?;
        let mut request = client.request(options.method.to_reqwest(), target);
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if options.has_json_body() && !has_header(options, CONTENT_TYPE.as_str()) {
            request = request.header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if let Some((key_id, request_id)) = options.signing_ids() {
            let payload = body.as_deref().unwrap_or_default();
            let signature = match session {
                Some(session) => session.sign_request(key_id, request_id, payload),
                None => {
                    warn!(key_id, "Signing requested without a session; sending empty signature");
                    String::new()
                }
            };
            request = request.header(SIGNATURE_HEADER, signature);
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        debug!(method = %options.method, url, ?timeout, "Sending request");
        let started = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                // A pinning rejection aborts the handshake; report it rather
                // than the transport error it surfaces as.
                if let Some(rejection) = verdict.rejection() {
                    return Err(rejection);
                }
                warn!(url, error = %e, "Request failed");
                return Err(e.into());
            }
        };

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let bytes = response.bytes().await?;
        let duration = format!("{}ms", started.elapsed().as_millis());
        let text = String::from_utf8_lossy(&bytes).into_owned();

        if status >= 400 {
            warn!(status, url = %final_url, %duration, "Request returned an error status");
            return Err(Error::HttpStatus {
                status,
                url: final_url,
                body: text,
            });
        }

        info!(status, url = %final_url, %duration, "Fetch completed");
        Ok(FetchResponse {
            status,
            url: final_url,
            body: text,
            duration,
        })
    }
}

/// Send one pinned request with the platform root store
pub async fn fetch(
    url: &str,
    options: &FetchOptions,
    session: Option<&Session>,
) -> Result<FetchResponse> {
    Fetcher::with_native_roots()?.fetch(url, options, session).await
}

fn has_header(options: &FetchOptions, name: &str) -> bool {
    options.headers.keys().any(|k| k.eq_ignore_ascii_case(name))
}
