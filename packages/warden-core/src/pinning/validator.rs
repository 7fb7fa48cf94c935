//! # Pinning Validator
//!
//! Decides whether one TLS handshake may proceed.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    PINNING STATE MACHINE                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Received                                                              │
//! │     │  1. port == 443, chain length in [3, 4]                          │
//! │     ▼                                                                   │
//! │  ChainLengthChecked                                                    │
//! │     │  2. leaf CN covered by a valid domain                            │
//! │     ▼                                                                   │
//! │  DomainChecked                                                         │
//! │     │  3. every intermediate key digest pinned                         │
//! │     ▼                                                                   │
//! │  IntermediatesMatched                                                  │
//! │     │  4. leaf key digest pinned (when leaf pins exist)                │
//! │     │  5. host matches the leaf CN pattern                             │
//! │     ▼                                                                   │
//! │  LeafMatched                                                           │
//! │     │  6. TrustEvaluator accepts the chain                             │
//! │     ▼                                                                   │
//! │  PolicyEvaluated ──▶ Accepted                                          │
//! │                                                                         │
//! │  Any failing rule ──▶ Rejected { state reached, error }                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An unconfigured [`PinSet`] skips rules 1-5: only the trust evaluator runs.

use std::fmt;
use std::sync::Arc;

use regex::RegexBuilder;
use serde::Serialize;
use tracing::{debug, warn};

use super::certificate::CertificateInfo;
use super::pin_set::PinSet;
use super::trust::{TrustEvaluation, TrustEvaluator, HTTPS_PORT};
use crate::error::{Error, Result};

/// Shortest chain accepted with pinning: leaf, one intermediate, root
pub const MIN_CHAIN_LEN: usize = 3;
/// Longest chain accepted with pinning: leaf, two intermediates, root
pub const MAX_CHAIN_LEN: usize = 4;

/// Progress through the pinning rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationState {
    /// Chain received, nothing checked yet
    Received,
    /// Port and chain length are within policy
    ChainLengthChecked,
    /// Leaf common name is covered by a valid domain
    DomainChecked,
    /// All intermediates are pinned
    IntermediatesMatched,
    /// Leaf pin (if any) and host pattern matched
    LeafMatched,
    /// Trust evaluator accepted the chain
    PolicyEvaluated,
}

/// Final outcome of one handshake
#[derive(Debug, Clone)]
pub enum Verdict {
    /// Handshake may complete
    Accepted,
    /// Handshake must be aborted
    Rejected {
        /// Last state reached before the failing rule
        state: ValidationState,
        /// Why the rule failed
        error: Error,
    },
}

impl Verdict {
    /// Whether the handshake may complete
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    /// The rejection error, if rejected
    pub fn error(&self) -> Option<&Error> {
        match self {
            Verdict::Accepted => None,
            Verdict::Rejected { error, .. } => Some(error),
        }
    }

    /// `Ok(())` if accepted, else the rejection error
    pub fn into_result(self) -> Result<()> {
        match self {
            Verdict::Accepted => Ok(()),
            Verdict::Rejected { error, .. } => Err(error),
        }
    }
}

/// Stateless pinning validator over an injected trust evaluator
#[derive(Clone)]
pub struct PinningValidator {
    evaluator: Arc<dyn TrustEvaluator>,
}

impl PinningValidator {
    /// Create a validator that finishes with `evaluator`
    pub fn new(evaluator: Arc<dyn TrustEvaluator>) -> Self {
        Self { evaluator }
    }

    /// The injected trust evaluator
    pub fn evaluator(&self) -> &Arc<dyn TrustEvaluator> {
        &self.evaluator
    }

    /// Run every rule against one handshake
    pub fn evaluate(&self, evaluation: &TrustEvaluation, pins: &PinSet) -> Verdict {
        let mut state = ValidationState::Received;
        let outcome = if pins.is_configured() {
            self.run_pinned(evaluation, pins, &mut state)
        } else {
            debug!(host = evaluation.host(), "No pins configured, using default trust");
            self.run_policy(evaluation, &mut state)
        };

        match outcome {
            Ok(()) => {
                debug!(host = evaluation.host(), "Certificate chain accepted");
                Verdict::Accepted
            }
            Err(error) => {
                warn!(
                    host = evaluation.host(),
                    state = ?state,
                    error = %error,
                    "Certificate chain rejected"
                );
                Verdict::Rejected { state, error }
            }
        }
    }

    fn run_pinned(
        &self,
        evaluation: &TrustEvaluation,
        pins: &PinSet,
        state: &mut ValidationState,
    ) -> Result<()> {
        let chain = evaluation.chain();

        // 1. Port and chain length
        if evaluation.port() != HTTPS_PORT {
            return Err(Error::ChainRejected(format!(
                "port {} is not {}",
                evaluation.port(),
                HTTPS_PORT
            )));
        }
        if !(MIN_CHAIN_LEN..=MAX_CHAIN_LEN).contains(&chain.len()) {
            return Err(Error::ChainRejected(format!(
                "chain length {} outside {}..={}",
                chain.len(),
                MIN_CHAIN_LEN,
                MAX_CHAIN_LEN
            )));
        }
        advance(state, ValidationState::ChainLengthChecked);

        // 2. Leaf common name against the valid domains
        let leaf = CertificateInfo::from_der(&chain[0])?;
        let common_name = leaf
            .common_name()
            .ok_or_else(|| Error::DomainMismatch("leaf certificate has no common name".into()))?;
        if !pins.allows_domain(common_name) {
            return Err(Error::DomainMismatch(format!(
                "{} is not within {:?}",
                common_name,
                pins.domains()
            )));
        }
        advance(state, ValidationState::DomainChecked);

        // 3. Intermediates: strictly between leaf and root
        for (index, der) in chain[1..chain.len() - 1].iter().enumerate() {
            let intermediate = CertificateInfo::from_der(der)?;
            if !intermediate.matches_any(pins.pins()) {
                return Err(Error::PinMismatch(format!(
                    "intermediate {} ({}) is not pinned",
                    index + 1,
                    intermediate.common_name().unwrap_or("unnamed")
                )));
            }
        }
        advance(state, ValidationState::IntermediatesMatched);

        // 4. Leaf pins
        if !pins.leaf_pins().is_empty() && !leaf.matches_any(pins.leaf_pins()) {
            return Err(Error::PinMismatch(format!(
                "leaf {} is not pinned",
                common_name
            )));
        }

        // 5. Host against the leaf common name
        if !host_matches(common_name, evaluation.host())? {
            return Err(Error::HostMismatch(format!(
                "{} does not match certificate {}",
                evaluation.host(),
                common_name
            )));
        }
        advance(state, ValidationState::LeafMatched);

        // 6. Standard trust evaluation
        self.run_policy(evaluation, state)
    }

    fn run_policy(&self, evaluation: &TrustEvaluation, state: &mut ValidationState) -> Result<()> {
        self.evaluator.evaluate(evaluation)?;
        advance(state, ValidationState::PolicyEvaluated);
        Ok(())
    }
}

impl fmt::Debug for PinningValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinningValidator")
            .field("evaluator", &self.evaluator)
            .finish()
    }
}

fn advance(state: &mut ValidationState, next: ValidationState) {
    debug!(from = ?*state, to = ?next, "Pinning state");
    *state = next;
}

/// Match `host` against a certificate common name.
///
/// Literal characters are escaped; a single leading `*` stands for any
/// non-empty prefix. Anchored and case-insensitive.
pub fn host_matches(common_name: &str, host: &str) -> Result<bool> {
    let pattern = match common_name.strip_prefix('*') {
        Some(rest) => format!("^.+{}$", regex::escape(rest)),
        None => format!("^{}$", regex::escape(common_name)),
    };
    let re = RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::HostMismatch(format!("bad common name pattern: {}", e)))?;
    Ok(re.is_match(host))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pinning::pin_set::format_pin;
    use parking_lot::Mutex;

    const ROOT: &[u8] = include_bytes!("../../tests/fixtures/root.der");
    const INTERMEDIATE: &[u8] = include_bytes!("../../tests/fixtures/intermediate.der");
    const LEAF_API: &[u8] = include_bytes!("../../tests/fixtures/leaf_api.der");

    /// Records calls and answers with a fixed result
    #[derive(Debug, Default)]
    struct RecordingEvaluator {
        calls: Mutex<Vec<String>>,
        reject: bool,
    }

    impl TrustEvaluator for RecordingEvaluator {
        fn evaluate(&self, evaluation: &TrustEvaluation) -> Result<()> {
            self.calls.lock().push(evaluation.host().to_string());
            if self.reject {
                Err(Error::TrustEvaluationFailed("untrusted".into()))
            } else {
                Ok(())
            }
        }
    }

    fn intermediate_pin() -> String {
        format_pin(CertificateInfo::from_der(INTERMEDIATE).unwrap().spki_sha256())
    }

    fn chain() -> Vec<Vec<u8>> {
        vec![LEAF_API.to_vec(), INTERMEDIATE.to_vec(), ROOT.to_vec()]
    }

    fn validator(reject: bool) -> (PinningValidator, Arc<RecordingEvaluator>) {
        let evaluator = Arc::new(RecordingEvaluator {
            reject,
            ..Default::default()
        });
        (PinningValidator::new(evaluator.clone()), evaluator)
    }

    fn rejected(verdict: Verdict) -> (ValidationState, Error) {
        match verdict {
            Verdict::Rejected { state, error } => (state, error),
            Verdict::Accepted => panic!("expected rejection"),
        }
    }

    #[test]
    fn test_host_matches() {
        assert!(host_matches("api.example.com", "API.example.com").unwrap());
        assert!(!host_matches("api.example.com", "apixexample.com").unwrap());
        assert!(!host_matches("api.example.com", "api.example.com.evil").unwrap());
        assert!(host_matches("*.example.com", "a.b.example.com").unwrap());
        assert!(!host_matches("*.example.com", ".example.com").unwrap());
        assert!(!host_matches("*.example.com", "example.com").unwrap());
    }

    #[test]
    fn test_accepts_pinned_chain() {
        let (v, evaluator) = validator(false);
        let pins = PinSet::new([intermediate_pin()], ["example.com"]).unwrap();
        let eval = TrustEvaluation::new("api.example.com", 443, chain());
        assert!(v.evaluate(&eval, &pins).is_accepted());
        assert_eq!(evaluator.calls.lock().len(), 1);
    }

    #[test]
    fn test_wrong_port_rejected_first() {
        let (v, evaluator) = validator(false);
        let pins = PinSet::new([intermediate_pin()], ["example.com"]).unwrap();
        let eval = TrustEvaluation::new("api.example.com", 8443, chain());
        let (state, error) = rejected(v.evaluate(&eval, &pins));
        assert_eq!(state, ValidationState::Received);
        assert!(matches!(error, Error::ChainRejected(_)));
        assert!(evaluator.calls.lock().is_empty());
    }

    #[test]
    fn test_unpinned_intermediate_rejected() {
        let (v, _) = validator(false);
        let other = format_pin(CertificateInfo::from_der(ROOT).unwrap().spki_sha256());
        let pins = PinSet::new([other], ["example.com"]).unwrap();
        let eval = TrustEvaluation::new("api.example.com", 443, chain());
        let (state, error) = rejected(v.evaluate(&eval, &pins));
        assert_eq!(state, ValidationState::DomainChecked);
        assert!(matches!(error, Error::PinMismatch(_)));
    }

    #[test]
    fn test_leaf_pins_checked_when_present() {
        let (v, _) = validator(false);
        let pins = PinSet::new([intermediate_pin()], ["example.com"])
            .unwrap()
            .with_leaf_pins([intermediate_pin()])
            .unwrap();
        let eval = TrustEvaluation::new("api.example.com", 443, chain());
        let (state, error) = rejected(v.evaluate(&eval, &pins));
        assert_eq!(state, ValidationState::IntermediatesMatched);
        assert!(matches!(error, Error::PinMismatch(_)));

        let leaf_pin = format_pin(CertificateInfo::from_der(LEAF_API).unwrap().key_sha256());
        let pins = PinSet::new([intermediate_pin()], ["example.com"])
            .unwrap()
            .with_leaf_pins([leaf_pin])
            .unwrap();
        assert!(v.evaluate(&eval, &pins).is_accepted());
    }

    #[test]
    fn test_host_must_match_leaf() {
        let (v, _) = validator(false);
        let pins = PinSet::new([intermediate_pin()], ["example.com"]).unwrap();
        let eval = TrustEvaluation::new("www.example.com", 443, chain());
        let (state, error) = rejected(v.evaluate(&eval, &pins));
        assert_eq!(state, ValidationState::IntermediatesMatched);
        assert!(matches!(error, Error::HostMismatch(_)));
    }

    #[test]
    fn test_evaluator_failure_rejects() {
        let (v, _) = validator(true);
        let pins = PinSet::new([intermediate_pin()], ["example.com"]).unwrap();
        let eval = TrustEvaluation::new("api.example.com", 443, chain());
        let (state, error) = rejected(v.evaluate(&eval, &pins));
        assert_eq!(state, ValidationState::LeafMatched);
        assert!(matches!(error, Error::TrustEvaluationFailed(_)));
    }

    #[test]
    fn test_unconfigured_uses_evaluator_only() {
        let (v, evaluator) = validator(false);
        // Port and chain length would fail the pinned rules
        let eval = TrustEvaluation::new("api.example.com", 8443, vec![LEAF_API.to_vec()]);
        assert!(v.evaluate(&eval, &PinSet::default()).is_accepted());
        assert_eq!(evaluator.calls.lock().as_slice(), ["api.example.com"]);

        let (v, _) = validator(true);
        let (state, _) = rejected(v.evaluate(&eval, &PinSet::default()));
        assert_eq!(state, ValidationState::Received);
    }

    #[test]
    fn test_verdict_into_result() {
        assert!(Verdict::Accepted.into_result().is_ok());
        let verdict = Verdict::Rejected {
            state: ValidationState::Received,
            error: Error::ChainRejected("x".into()),
        };
        assert_eq!(verdict.error().map(Error::code), Some(500));
        assert!(verdict.into_result().is_err());
    }
}
