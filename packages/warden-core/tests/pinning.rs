//! Pinning decisions against real certificate chains.
//!
//! Fixtures come from `tests/fixtures/generate.sh`: one test root, two
//! intermediates and leaves for `api.example.com`, `example.com` and
//! `*.example.com`.

use std::sync::Arc;

use warden_core::pinning::{
    CertificateInfo, PinSet, PinningValidator, TrustEvaluation, ValidationState, Verdict,
    WebPkiTrustEvaluator,
};
use warden_core::Error;

const ROOT: &[u8] = include_bytes!("fixtures/root.der");
const INTERMEDIATE: &[u8] = include_bytes!("fixtures/intermediate.der");
const INTERMEDIATE2: &[u8] = include_bytes!("fixtures/intermediate2.der");
const LEAF_API: &[u8] = include_bytes!("fixtures/leaf_api.der");
const LEAF_APEX: &[u8] = include_bytes!("fixtures/leaf_apex.der");
const LEAF_WILDCARD: &[u8] = include_bytes!("fixtures/leaf_wildcard.der");
const LEAF_DEEP: &[u8] = include_bytes!("fixtures/leaf_deep.der");
const INTERMEDIATE_PIN: &str = include_str!("fixtures/intermediate.pin");
const INTERMEDIATE2_PIN: &str = "sha256/NMAwKhuwVnaDvFRXC3+zT89aFMSzM6QgHe8WQ+GYcqQ=";

fn validator() -> PinningValidator {
    let trust = WebPkiTrustEvaluator::from_der_roots([ROOT]).unwrap();
    PinningValidator::new(Arc::new(trust))
}

fn chain(certs: &[&[u8]]) -> Vec<Vec<u8>> {
    certs.iter().map(|c| c.to_vec()).collect()
}

fn rejection(verdict: Verdict) -> (ValidationState, Error) {
    match verdict {
        Verdict::Rejected { state, error } => (state, error),
        Verdict::Accepted => panic!("chain was accepted"),
    }
}

#[test]
fn test_two_certificate_chain_rejected() {
    let pins = PinSet::new([INTERMEDIATE_PIN], ["example.com"]).unwrap();
    let eval = TrustEvaluation::new("api.example.com", 443, chain(&[LEAF_API, ROOT]));

    let (state, error) = rejection(validator().evaluate(&eval, &pins));
    assert_eq!(state, ValidationState::Received);
    assert!(matches!(error, Error::ChainRejected(_)));
}

#[test]
fn test_five_certificate_chain_rejected() {
    let pins = PinSet::new([INTERMEDIATE_PIN], ["example.com"]).unwrap();
    let eval = TrustEvaluation::new(
        "api.example.com",
        443,
        chain(&[LEAF_DEEP, INTERMEDIATE2, INTERMEDIATE, INTERMEDIATE, ROOT]),
    );
    assert!(matches!(
        validator().evaluate(&eval, &pins),
        Verdict::Rejected {
            error: Error::ChainRejected(_),
            ..
        }
    ));
}

#[test]
fn test_pinned_three_chain_accepted() {
    let pins = PinSet::new([INTERMEDIATE_PIN], ["example.com"]).unwrap();
    let eval = TrustEvaluation::new("api.example.com", 443, chain(&[LEAF_API, INTERMEDIATE, ROOT]));
    assert!(validator().evaluate(&eval, &pins).is_accepted());
}

#[test]
fn test_raw_key_pin_accepted() {
    let pins = PinSet::new(
        ["sha256/4zFuZrcAUh265CM66c/wqpeOjZv0nDiB7Q2snbJvM7c="],
        ["example.com"],
    )
    .unwrap();
    let eval = TrustEvaluation::new("api.example.com", 443, chain(&[LEAF_API, INTERMEDIATE, ROOT]));
    assert!(validator().evaluate(&eval, &pins).is_accepted());
}

#[test]
fn test_host_outside_leaf_rejected() {
    let pins = PinSet::new([INTERMEDIATE_PIN], ["example.com"]).unwrap();
    let eval = TrustEvaluation::new(
        "evil.example.com",
        443,
        chain(&[LEAF_APEX, INTERMEDIATE, ROOT]),
    );

    let (state, error) = rejection(validator().evaluate(&eval, &pins));
    assert_eq!(state, ValidationState::IntermediatesMatched);
    assert!(matches!(error, Error::HostMismatch(_)));
}

#[test]
fn test_leaf_outside_valid_domains_rejected() {
    let pins = PinSet::new([INTERMEDIATE_PIN], ["example.org"]).unwrap();
    let eval = TrustEvaluation::new("api.example.com", 443, chain(&[LEAF_API, INTERMEDIATE, ROOT]));

    let (state, error) = rejection(validator().evaluate(&eval, &pins));
    assert_eq!(state, ValidationState::ChainLengthChecked);
    assert!(matches!(error, Error::DomainMismatch(_)));
}

#[test]
fn test_wildcard_domain_accepted() {
    let pins = PinSet::new([INTERMEDIATE_PIN], ["*.example.com"]).unwrap();

    let wildcard_leaf = TrustEvaluation::new(
        "api.example.com",
        443,
        chain(&[LEAF_WILDCARD, INTERMEDIATE, ROOT]),
    );
    assert!(validator().evaluate(&wildcard_leaf, &pins).is_accepted());

    let api_leaf = TrustEvaluation::new("api.example.com", 443, chain(&[LEAF_API, INTERMEDIATE, ROOT]));
    assert!(validator().evaluate(&api_leaf, &pins).is_accepted());
}

#[test]
fn test_four_chain_needs_both_intermediates_pinned() {
    let eval = TrustEvaluation::new(
        "api.example.com",
        443,
        chain(&[LEAF_DEEP, INTERMEDIATE2, INTERMEDIATE, ROOT]),
    );

    let both = PinSet::new([INTERMEDIATE_PIN, INTERMEDIATE2_PIN], ["example.com"]).unwrap();
    assert!(validator().evaluate(&eval, &both).is_accepted());

    let one = PinSet::new([INTERMEDIATE_PIN], ["example.com"]).unwrap();
    let (state, error) = rejection(validator().evaluate(&eval, &one));
    assert_eq!(state, ValidationState::DomainChecked);
    assert!(matches!(error, Error::PinMismatch(_)));
}

#[test]
fn test_unpinned_falls_back_to_default_trust() {
    let eval = TrustEvaluation::new("api.example.com", 443, chain(&[LEAF_API, INTERMEDIATE]));
    assert!(validator().evaluate(&eval, &PinSet::default()).is_accepted());

    // Domains without pins is still unpinned
    let domains_only = PinSet::new(Vec::<String>::new(), ["example.com"]).unwrap();
    assert!(validator().evaluate(&eval, &domains_only).is_accepted());
}

#[test]
fn test_unpinned_still_requires_trust() {
    // Root from a store that does not contain it
    let other_roots = WebPkiTrustEvaluator::from_der_roots([INTERMEDIATE2]).unwrap();
    let validator = PinningValidator::new(Arc::new(other_roots));
    let eval = TrustEvaluation::new("api.example.com", 443, chain(&[LEAF_API, INTERMEDIATE]));

    let (state, error) = rejection(validator.evaluate(&eval, &PinSet::default()));
    assert_eq!(state, ValidationState::Received);
    assert!(matches!(error, Error::TrustEvaluationFailed(_)));
}

#[test]
fn test_fixture_pins_match_certificates() {
    let intermediate2 = CertificateInfo::from_der(INTERMEDIATE2).unwrap();
    assert_eq!(
        warden_core::pinning::format_pin(intermediate2.spki_sha256()),
        INTERMEDIATE2_PIN
    );
    let leaf = CertificateInfo::from_der(LEAF_DEEP).unwrap();
    assert_eq!(leaf.issuer_raw(), intermediate2.subject_raw());
}
