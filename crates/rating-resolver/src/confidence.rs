use analysis_core::{CompositeScore, RatingCategory, RiskFlag, Severity, Verdict};

use crate::policy::RatingPolicy;

/// How the score-based signal and the valuation verdict line up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAgreement {
    Agree,
    Neutral,
    Conflict,
    /// No valuation signal to compare with
    Unknown,
}

impl SignalAgreement {
    pub fn between(score_signal: RatingCategory, verdict: Verdict) -> Self {
        use RatingCategory::*;
        match (score_signal, verdict) {
            (_, Verdict::Undetermined) => SignalAgreement::Unknown,
            (Buy, Verdict::Discount) | (Sell, Verdict::Premium) | (Hold, Verdict::Fair) => {
                SignalAgreement::Agree
            }
            (Buy, Verdict::Premium) | (Sell, Verdict::Discount) => SignalAgreement::Conflict,
            _ => SignalAgreement::Neutral,
        }
    }

    fn adjustment(&self) -> f64 {
        match self {
            SignalAgreement::Agree => 0.05,
            SignalAgreement::Neutral => 0.0,
            SignalAgreement::Conflict => -0.10,
            SignalAgreement::Unknown => -0.05,
        }
    }
}

/// Confidence as a fraction in `[0, max_confidence]`.
///
/// Starts from the policy's base, loses the coverage-contract penalty and a
/// per-flag penalty, moves with signal agreement, and is then scaled by
/// metric coverage.
pub fn compute_confidence(
    composite: &CompositeScore,
    flags: &[RiskFlag],
    agreement: SignalAgreement,
    policy: &RatingPolicy,
) -> f64 {
    let mut conf = policy.base_confidence;
    if composite.drivers.is_empty() {
        conf -= 0.30;
    }
    conf -= composite.coverage.confidence_penalty;
    for flag in flags {
        conf -= match flag.severity {
            Severity::Warning => policy.warning_penalty,
            Severity::Caution => policy.caution_penalty,
            Severity::Info => 0.0,
        };
    }
    conf += agreement.adjustment();
    conf *= 0.5 + 0.5 * composite.metric_coverage.clamp(0.0, 1.0);

    if conf.is_nan() {
        return 0.0;
    }
    conf.clamp(0.0, policy.max_confidence)
}
