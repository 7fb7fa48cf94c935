//! Parsed view of one DER certificate: the fields the pinning rules read.

use std::collections::HashSet;

use sha2::{Digest, Sha256};
use x509_parser::prelude::{FromDer, X509Certificate};

use super::pin_set::PinDigest;
use crate::error::{Error, Result};

/// Certificate fields used by the pinning validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    der: Vec<u8>,
    common_name: Option<String>,
    spki_sha256: PinDigest,
    key_sha256: PinDigest,
    subject: Vec<u8>,
    issuer: Vec<u8>,
}

impl CertificateInfo {
    /// Parse a DER certificate
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| Error::InvalidCertificate(e.to_string()))?;

        let common_name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .map(str::to_string);

        let spki = cert.public_key();
        let raw_key: &[u8] = spki.subject_public_key.data.as_ref();

        Ok(Self {
            der: der.to_vec(),
            common_name,
            spki_sha256: Sha256::digest(spki.raw).into(),
            key_sha256: Sha256::digest(raw_key).into(),
            subject: cert.subject().as_raw().to_vec(),
            issuer: cert.issuer().as_raw().to_vec(),
        })
    }

    /// DER encoding
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// First subject common name, if any
    pub fn common_name(&self) -> Option<&str> {
        self.common_name.as_deref()
    }

    /// SHA-256 of the DER `SubjectPublicKeyInfo` (the usual HPKP pin)
    pub fn spki_sha256(&self) -> &PinDigest {
        &self.spki_sha256
    }

    /// SHA-256 of the raw subject public key bytes
    pub fn key_sha256(&self) -> &PinDigest {
        &self.key_sha256
    }

    /// Raw DER subject name
    pub fn subject_raw(&self) -> &[u8] {
        &self.subject
    }

    /// Raw DER issuer name
    pub fn issuer_raw(&self) -> &[u8] {
        &self.issuer
    }

    /// Either key digest is in `pins`
    pub fn matches_any(&self, pins: &HashSet<PinDigest>) -> bool {
        pins.contains(&self.spki_sha256) || pins.contains(&self.key_sha256)
    }

    /// Subject and issuer names are identical
    pub fn is_self_issued(&self) -> bool {
        self.subject == self.issuer
    }
}
