pub mod confidence;
pub mod flags;
pub mod policy;

pub use confidence::{compute_confidence, SignalAgreement};
pub use flags::{compute_risk_flags, Direction, RiskRule, RISK_RULES};
pub use policy::RatingPolicy;

use analysis_core::{
    CompositeScore, Factor, Rating, RatingCategory, RunContext, ValuationResult, Verdict,
};
use tracing::{info, warn};

/// Category implied by the composite score alone. NaN reads as Hold-Watch.
pub fn score_signal(score: f64, policy: &RatingPolicy) -> RatingCategory {
    if score.is_nan() {
        RatingCategory::HoldWatch
    } else if score >= policy.buy_threshold {
        RatingCategory::Buy
    } else if score >= policy.sell_threshold {
        RatingCategory::Hold
    } else {
        RatingCategory::Sell
    }
}

/// Whether a premium valuation is justified by growth and quality: both
/// factor scores must be present and clear their minimums.
pub fn premium_growth_override(composite: &CompositeScore, policy: &RatingPolicy) -> bool {
    let growth = composite.factor_score(Factor::Growth);
    let quality = composite.factor_score(Factor::Quality);
    growth.is_finite()
        && quality.is_finite()
        && growth >= policy.override_growth_min
        && quality >= policy.override_quality_min
}

/// Resolve the final rating for one run.
///
/// A failed coverage contract locks the rating to Hold with capped
/// confidence whatever the score. Otherwise the score band decides, a
/// premium verdict downgrades Buy unless the growth override holds, and a
/// Sell on thin data becomes Hold-Watch.
pub fn rate(
    ctx: &RunContext,
    composite: &CompositeScore,
    valuation: Option<&ValuationResult>,
    policy: &RatingPolicy,
) -> Rating {
    let verdict = valuation.map_or(Verdict::Undetermined, |v| v.verdict);
    let risk_flags = compute_risk_flags(&composite.metrics, &composite.sector, RISK_RULES);
    let signal = score_signal(composite.score, policy);
    let agreement = SignalAgreement::between(signal, verdict);
    let mut confidence = compute_confidence(composite, &risk_flags, agreement, policy);

    let mut notes = Vec::new();
    let mut locked = false;
    let mut lock_reason = None;
    let mut override_applied = false;

    let category = if !composite.coverage_gate_passed {
        locked = true;
        lock_reason = Some(composite.coverage.message.clone());
        confidence = confidence.min(policy.locked_confidence_cap);
        warn!(
            run_id = %ctx.run_id,
            ticker = %composite.ticker,
            score = composite.score,
            "rating locked to Hold by coverage contract"
        );
        notes.push(composite.coverage.message.clone());
        RatingCategory::Hold
    } else {
        match signal {
            RatingCategory::Buy if verdict == Verdict::Premium => {
                if premium_growth_override(composite, policy) {
                    override_applied = true;
                    let note = format!(
                        "Buy kept despite premium valuation: growth {:.0} and quality {:.0} clear the {:.0}/{:.0} bar.",
                        composite.factor_score(Factor::Growth),
                        composite.factor_score(Factor::Quality),
                        policy.override_growth_min,
                        policy.override_quality_min
                    );
                    info!(run_id = %ctx.run_id, ticker = %composite.ticker, "{note}");
                    notes.push(note);
                    RatingCategory::Buy
                } else {
                    notes.push(
                        "Buy downgraded to Hold: valuation at a premium without growth justification."
                            .to_string(),
                    );
                    RatingCategory::Hold
                }
            }
            RatingCategory::Sell if composite.metric_coverage < policy.watch_coverage => {
                notes.push(format!(
                    "Sell signal on {:.0}% metric coverage: set to Hold-Watch.",
                    composite.metric_coverage * 100.0
                ));
                RatingCategory::HoldWatch
            }
            RatingCategory::HoldWatch => {
                notes.push("Composite score unavailable: set to Hold-Watch.".to_string());
                RatingCategory::HoldWatch
            }
            other => other,
        }
    };

    match valuation {
        None => notes.push("No valuation available.".to_string()),
        Some(v) if !v.dcf_meaningful => {
            notes.push(format!("DCF not meaningful; verdict {} from {:?}.", v.verdict, v.method))
        }
        Some(_) => {}
    }
    if agreement == SignalAgreement::Conflict {
        notes.push(format!(
            "Score signal {signal} conflicts with {verdict} valuation."
        ));
    }

    info!(
        run_id = %ctx.run_id,
        ticker = %composite.ticker,
        period = %composite.period,
        category = %category,
        confidence,
        locked,
        flags = risk_flags.len(),
        "rating resolved"
    );

    Rating {
        run_id: ctx.run_id,
        ticker: composite.ticker.clone(),
        period: composite.period.clone(),
        category,
        confidence,
        locked,
        lock_reason,
        override_applied,
        verdict,
        risk_flags,
        notes,
        rated_at: ctx.as_of,
    }
}

mod tests;
