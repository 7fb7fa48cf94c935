//! # Trust Evaluation
//!
//! Baseline chain verification: signatures, validity periods and the TLS
//! server policy for the host. Pinning only ever narrows what this accepts.
//!
//! The default evaluator is rustls' WebPKI verifier over either the platform
//! root store or caller-supplied roots.

use std::fmt;
use std::sync::Arc;

use rustls::client::danger::ServerCertVerifier;
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::RootCertStore;
use tracing::{debug, warn};

use super::certificate::CertificateInfo;
use crate::error::{Error, Result};

/// Only port for which pinned chains are accepted
pub const HTTPS_PORT: u16 = 443;

/// The chain a peer offered, plus where it was offered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustEvaluation {
    host: String,
    port: u16,
    chain: Vec<Vec<u8>>,
}

impl TrustEvaluation {
    /// `chain` is DER, ordered leaf first
    pub fn new(host: impl Into<String>, port: u16, chain: Vec<Vec<u8>>) -> Self {
        Self {
            host: host.into(),
            port,
            chain,
        }
    }

    /// Host the connection was opened to
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port the connection was opened to
    pub fn port(&self) -> u16 {
        self.port
    }

    /// DER certificates, leaf first
    pub fn chain(&self) -> &[Vec<u8>] {
        &self.chain
    }
}

/// Standard chain evaluation, injected into the pinning validator
pub trait TrustEvaluator: Send + Sync + fmt::Debug {
    /// `Ok(())` if the chain is trusted for the host
    fn evaluate(&self, evaluation: &TrustEvaluation) -> Result<()>;
}

// ============================================================================
// WEBPKI EVALUATOR
// ============================================================================

/// [`TrustEvaluator`] backed by rustls' WebPKI verifier
#[derive(Clone)]
pub struct WebPkiTrustEvaluator {
    verifier: Arc<WebPkiServerVerifier>,
    provider: Arc<CryptoProvider>,
    roots: Arc<Vec<CertificateInfo>>,
}

impl WebPkiTrustEvaluator {
    /// Evaluate against the platform root store
    pub fn with_native_roots() -> Result<Self> {
        let loaded = rustls_native_certs::load_native_certs();
        for err in &loaded.errors {
            warn!(error = %err, "Skipping unreadable platform root");
        }
        if loaded.certs.is_empty() {
            return Err(Error::TrustEvaluationFailed(
                "no platform root certificates available".into(),
            ));
        }
        Self::with_roots(loaded.certs)
    }

    /// Evaluate against the given DER roots only
    pub fn from_der_roots<I, C>(roots: I) -> Result<Self>
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        Self::with_roots(
            roots
                .into_iter()
                .map(|der| CertificateDer::from(der.as_ref().to_vec()))
                .collect(),
        )
    }

    /// Evaluate against already-loaded roots
    pub fn with_roots(roots: Vec<CertificateDer<'static>>) -> Result<Self> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());

        // Anchors the verifier can use, and a parsed catalog for
        // completing chains whose root the server did not send.
        let catalog: Vec<CertificateInfo> = roots
            .iter()
            .filter_map(|der| CertificateInfo::from_der(der.as_ref()).ok())
            .collect();
        let mut store = RootCertStore::empty();
        let (added, ignored) = store.add_parsable_certificates(roots);
        debug!(added, ignored, "Loaded trust anchors");

        let verifier = WebPkiServerVerifier::builder_with_provider(Arc::new(store), provider.clone())
            .build()
            .map_err(|e| Error::TrustEvaluationFailed(e.to_string()))?;

        Ok(Self {
            verifier,
            provider,
            roots: Arc::new(catalog),
        })
    }

    /// Underlying rustls verifier
    pub fn verifier(&self) -> Arc<WebPkiServerVerifier> {
        self.verifier.clone()
    }

    /// Crypto provider the verifier was built with
    pub fn provider(&self) -> Arc<CryptoProvider> {
        self.provider.clone()
    }

    /// Parsed trust anchors
    pub fn roots(&self) -> &[CertificateInfo] {
        &self.roots
    }

    /// Root whose subject is the issuer of `der`
    pub fn find_issuer(&self, der: &[u8]) -> Option<&CertificateInfo> {
        let cert = CertificateInfo::from_der(der).ok()?;
        self.roots
            .iter()
            .find(|root| root.subject_raw() == cert.issuer_raw())
    }
}

impl TrustEvaluator for WebPkiTrustEvaluator {
    fn evaluate(&self, evaluation: &TrustEvaluation) -> Result<()> {
        let (leaf, rest) = evaluation
            .chain()
            .split_first()
            .ok_or_else(|| Error::TrustEvaluationFailed("empty certificate chain".into()))?;

        let server_name = ServerName::try_from(evaluation.host())
            .map_err(|e| Error::TrustEvaluationFailed(format!("{}: {}", evaluation.host(), e)))?;
        let end_entity = CertificateDer::from(leaf.as_slice());
        let intermediates: Vec<CertificateDer<'_>> = rest
            .iter()
            .map(|der| CertificateDer::from(der.as_slice()))
            .collect();

        self.verifier
            .verify_server_cert(&end_entity, &intermediates, &server_name, &[], UnixTime::now())
            .map(|_| ())
            .map_err(|e| Error::TrustEvaluationFailed(e.to_string()))
    }
}

impl fmt::Debug for WebPkiTrustEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebPkiTrustEvaluator")
            .field("roots", &self.roots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &[u8] = include_bytes!("../../tests/fixtures/root.der");
    const INTERMEDIATE: &[u8] = include_bytes!("../../tests/fixtures/intermediate.der");
    const LEAF: &[u8] = include_bytes!("../../tests/fixtures/leaf_api.der");

    fn evaluator() -> WebPkiTrustEvaluator {
        WebPkiTrustEvaluator::from_der_roots([ROOT]).unwrap()
    }

    #[test]
    fn test_trusted_chain() {
        let eval = TrustEvaluation::new(
            "api.example.com",
            443,
            vec![LEAF.to_vec(), INTERMEDIATE.to_vec(), ROOT.to_vec()],
        );
        assert!(evaluator().evaluate(&eval).is_ok());
    }

    #[test]
    fn test_wrong_host_fails() {
        let eval = TrustEvaluation::new(
            "other.example.com",
            443,
            vec![LEAF.to_vec(), INTERMEDIATE.to_vec()],
        );
        assert!(matches!(
            evaluator().evaluate(&eval),
            Err(Error::TrustEvaluationFailed(_))
        ));
    }

    #[test]
    fn test_missing_intermediate_fails() {
        let eval = TrustEvaluation::new("api.example.com", 443, vec![LEAF.to_vec()]);
        assert!(evaluator().evaluate(&eval).is_err());
    }

    #[test]
    fn test_empty_chain_fails() {
        let eval = TrustEvaluation::new("api.example.com", 443, Vec::new());
        assert!(evaluator().evaluate(&eval).is_err());
    }

    #[test]
    fn test_find_issuer() {
        let eval = evaluator();
        assert_eq!(eval.roots().len(), 1);
        assert_eq!(
            eval.find_issuer(INTERMEDIATE).and_then(|r| r.common_name()),
            Some("Warden Test Root")
        );
        assert!(eval.find_issuer(LEAF).is_none());
    }

    #[test]
    fn test_no_roots_is_error() {
        assert!(WebPkiTrustEvaluator::from_der_roots(Vec::<Vec<u8>>::new()).is_err());
    }
}
