//! rustls adapter: runs the pinning validator from inside the handshake.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, SignatureScheme};
use tracing::debug;

use super::pin_set::PinSet;
use super::trust::{TrustEvaluation, WebPkiTrustEvaluator};
use super::validator::{PinningValidator, Verdict};
use crate::error::{Error, Result};

/// Verdict of the first handshake seen by a [`PinningVerifier`]
#[derive(Debug, Clone, Default)]
pub struct VerdictSlot(Arc<OnceCell<Verdict>>);

impl VerdictSlot {
    /// Recorded verdict, if a handshake has happened
    pub fn get(&self) -> Option<&Verdict> {
        self.0.get()
    }

    /// Rejection error, if the recorded verdict was a rejection
    pub fn rejection(&self) -> Option<Error> {
        self.get().and_then(Verdict::error).cloned()
    }

    fn record(&self, verdict: &Verdict) {
        // First handshake wins; later ones are still validated, not recorded.
        let _ = self.0.set(verdict.clone());
    }
}

/// `ServerCertVerifier` that applies a [`PinSet`] on top of WebPKI trust
#[derive(Debug)]
pub struct PinningVerifier {
    trust: WebPkiTrustEvaluator,
    validator: PinningValidator,
    pins: PinSet,
    port: u16,
    verdict: VerdictSlot,
}

impl PinningVerifier {
    /// Verifier for connections to `port` with `pins`
    pub fn new(trust: WebPkiTrustEvaluator, pins: PinSet, port: u16) -> Self {
        let validator = PinningValidator::new(Arc::new(trust.clone()));
        Self {
            trust,
            validator,
            pins,
            port,
            verdict: VerdictSlot::default(),
        }
    }

    /// Shared handle to the recorded verdict
    pub fn verdict(&self) -> VerdictSlot {
        self.verdict.clone()
    }

    /// Client config that verifies servers through this verifier
    pub fn into_client_config(self) -> Result<ClientConfig> {
        let provider = self.trust.provider();
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::Internal(format!("TLS configuration: {}", e)))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(self))
            .with_no_client_auth();
        Ok(config)
    }

    /// Chain as sent, plus the catalog root when the server omitted it
    fn complete_chain(&self, end_entity: &[u8], intermediates: &[CertificateDer<'_>]) -> Vec<Vec<u8>> {
        let mut chain = Vec::with_capacity(intermediates.len() + 2);
        chain.push(end_entity.to_vec());
        chain.extend(intermediates.iter().map(|c| c.as_ref().to_vec()));

        let last = chain.last().map(Vec::as_slice).unwrap_or(end_entity);
        if let Some(root) = self.trust.find_issuer(last) {
            if root.der() != last {
                debug!(root = ?root.common_name(), "Appending root from trust store");
                chain.push(root.der().to_vec());
            }
        }
        chain
    }
}

impl ServerCertVerifier for PinningVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        let evaluation = TrustEvaluation::new(
            server_name.to_str(),
            self.port,
            self.complete_chain(end_entity.as_ref(), intermediates),
        );
        let verdict = self.validator.evaluate(&evaluation, &self.pins);
        self.verdict.record(&verdict);

        match verdict {
            Verdict::Accepted => Ok(ServerCertVerified::assertion()),
            Verdict::Rejected { .. } => Err(rustls::Error::InvalidCertificate(
                CertificateError::ApplicationVerificationFailure,
            )),
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.trust.verifier().verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.trust.verifier().verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.trust.verifier().supported_verify_schemes()
    }
}
