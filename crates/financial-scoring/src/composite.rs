use analysis_core::numeric::clamp_score;
use analysis_core::{
    AnalysisError, CompositeScore, DerivedMetricSet, Driver, Metric, MissingMetric, MissingReason,
    RunContext,
};
use tracing::warn;

use crate::bands::RatingLabel;
use crate::config::ScoringConfig;
use crate::coverage::check_coverage;
use crate::factors::{factor_composite, score_factors};
use crate::sector::SectorProfile;

/// Blend derived metrics into a composite score.
///
/// Each weighted metric with a value contributes `renormalised weight *
/// sub-score`; metrics without a value drop out and the remaining weights are
/// rescaled to sum to 1, so the drivers always add up to the score. A run with
/// no weighted metric available scores NaN.
pub fn compose(
    ctx: &RunContext,
    metrics: DerivedMetricSet,
    profile: &SectorProfile,
    config: &ScoringConfig,
) -> Result<CompositeScore, AnalysisError> {
    let weights = config.weights_for(profile)?;

    let mut scored: Vec<(Metric, f64, f64, f64)> = Vec::new();
    for (metric, weight) in &weights {
        if *weight <= 0.0 {
            continue;
        }
        let Some(value) = metrics.get(*metric).value() else {
            continue;
        };
        let sub_score = profile.sub_score(*metric, value);
        if sub_score.is_finite() {
            scored.push((*metric, value, sub_score, *weight));
        }
    }

    let weight_coverage: f64 = scored.iter().map(|(_, _, _, w)| w).sum();
    let mut drivers: Vec<Driver> = scored
        .into_iter()
        .map(|(metric, value, sub_score, weight)| {
            let weight = weight / weight_coverage;
            Driver {
                metric,
                value,
                sub_score,
                weight,
                weight_contribution: weight * sub_score,
                label: RatingLabel::from_score(sub_score).as_str().to_string(),
            }
        })
        .collect();
    drivers.sort_by(|a, b| b.weight_contribution.total_cmp(&a.weight_contribution));

    let score = if drivers.is_empty() {
        f64::NAN
    } else {
        clamp_score(drivers.iter().map(|d| d.weight_contribution).sum())
    };

    let mut universe = profile.scoreable_metrics();
    universe.extend(weights.keys().copied());
    universe.sort();
    universe.dedup();

    let missing: Vec<MissingMetric> = universe
        .iter()
        .filter_map(|m| {
            let reason = metrics.get(*m).missing_reason()?;
            Some(MissingMetric { metric: *m, reason })
        })
        .collect();
    let metric_coverage = if universe.is_empty() {
        0.0
    } else {
        (universe.len() - missing.len()) as f64 / universe.len() as f64
    };

    let factors = score_factors(&metrics, profile);
    let blended = factor_composite(&factors, profile);
    let coverage = check_coverage(&metrics, profile, config.coverage_min_fraction);

    let mut notes = vec![format!(
        "Data coverage: {:.0}% of composite weight, {}/{} metrics available.",
        weight_coverage * 100.0,
        universe.len() - missing.len(),
        universe.len()
    )];
    if weight_coverage < config.low_coverage_threshold {
        warn!(
            ticker = %metrics.ticker,
            period = %metrics.period,
            weight_coverage,
            "low data coverage"
        );
        notes.push(format!(
            "Low data coverage ({:.0}%). Confidence will be penalized.",
            weight_coverage * 100.0
        ));
    }
    for factor in factors.iter().filter(|f| !f.is_scored()) {
        notes.push(format!(
            "{} factor not scored: 0/{} metrics available.",
            factor.factor.description(),
            factor.required
        ));
    }
    if missing
        .iter()
        .any(|m| m.reason == MissingReason::CurrencyMismatch)
    {
        notes.push("Some figures were excluded: no FX rate into the reporting currency.".to_string());
    }
    if !coverage.passed {
        notes.push(coverage.message.clone());
    }

    Ok(CompositeScore {
        run_id: ctx.run_id,
        ticker: metrics.ticker.clone(),
        period: metrics.period.clone(),
        sector: profile.name.clone(),
        currency: metrics.currency.clone(),
        score,
        factor_composite: blended,
        factors,
        drivers,
        missing,
        weight_coverage,
        metric_coverage,
        coverage_gate_passed: coverage.passed,
        coverage,
        metrics,
        notes,
        computed_at: ctx.as_of,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sector::SectorRegistry;
    use analysis_core::{Factor, MetricValue, Period};
    use approx::assert_relative_eq;

    fn metrics(values: &[(Metric, f64)]) -> DerivedMetricSet {
        let mut set = DerivedMetricSet::new("AAPL", Period::parse("Q3-2025"), "USD");
        for (m, v) in values {
            set.set(*m, MetricValue::Present(*v));
        }
        set
    }

    fn full_set() -> DerivedMetricSet {
        metrics(&[
            (Metric::RevenueYoy, 0.176),
            (Metric::RevenueQoq, 0.04),
            (Metric::NetMargin, 0.22),
            (Metric::OpMargin, 0.30),
            (Metric::Fcf, 2.0e10),
            (Metric::Ocf, 2.5e10),
            (Metric::DebtToEquity, 1.4),
            (Metric::Roe, 0.9),
            (Metric::CurrentRatio, 1.1),
        ])
    }

    #[test]
    fn test_drivers_sum_to_score() {
        let registry = SectorRegistry::builtin();
        let result = compose(
            &RunContext::new(),
            full_set(),
            registry.get_sector_config("tech"),
            &ScoringConfig::default(),
        )
        .unwrap();

        let total: f64 = result.drivers.iter().map(|d| d.weight_contribution).sum();
        assert_relative_eq!(total, result.score, epsilon = 1e-9);
        assert!((0.0..=100.0).contains(&result.score));
        assert_relative_eq!(result.weight_coverage, 1.0, epsilon = 1e-12);
        assert!(result
            .drivers
            .windows(2)
            .all(|w| w[0].weight_contribution >= w[1].weight_contribution));
    }

    #[test]
    fn test_missing_weights_are_renormalised() {
        let registry = SectorRegistry::builtin();
        let set = metrics(&[(Metric::RevenueYoy, 0.176), (Metric::NetMargin, 0.22)]);
        let result = compose(
            &RunContext::new(),
            set,
            registry.get_sector_config("general"),
            &ScoringConfig::default(),
        )
        .unwrap();

        assert_eq!(result.drivers.len(), 2);
        let weights: f64 = result.drivers.iter().map(|d| d.weight).sum();
        assert_relative_eq!(weights, 1.0, epsilon = 1e-12);
        assert_relative_eq!(result.weight_coverage, 0.35, epsilon = 1e-12);
        assert!(result
            .notes
            .iter()
            .any(|n| n.starts_with("Low data coverage (35%)")));
    }

    #[test]
    fn test_nothing_available_is_nan_not_zero() {
        let registry = SectorRegistry::builtin();
        let result = compose(
            &RunContext::new(),
            metrics(&[]),
            registry.get_sector_config("general"),
            &ScoringConfig::default(),
        )
        .unwrap();

        assert!(result.score.is_nan());
        assert!(result.factor_composite.is_nan());
        assert!(result.drivers.is_empty());
        let quality = result.factor(Factor::Quality).unwrap();
        assert!(quality.score.is_nan());
        assert_eq!(quality.coverage(), 0.0);
        assert!(!result.coverage_gate_passed);
        assert_eq!(result.metric_coverage, 0.0);
    }

    #[test]
    fn test_missing_list_carries_reasons() {
        let registry = SectorRegistry::builtin();
        let mut set = full_set();
        set.set(
            Metric::RevenueYoy,
            MetricValue::Missing(MissingReason::InsufficientHistory),
        );
        let result = compose(
            &RunContext::new(),
            set,
            registry.get_sector_config("general"),
            &ScoringConfig::default(),
        )
        .unwrap();

        let yoy = result
            .missing
            .iter()
            .find(|m| m.metric == Metric::RevenueYoy)
            .unwrap();
        assert_eq!(yoy.reason, MissingReason::InsufficientHistory);
        assert!(result.drivers.iter().all(|d| d.metric != Metric::RevenueYoy));
    }

    #[test]
    fn test_bad_weights_are_fatal() {
        let registry = SectorRegistry::builtin();
        let mut config = ScoringConfig::default();
        config.composite_weights.values_mut().for_each(|w| *w = 0.0);
        let err = compose(
            &RunContext::new(),
            full_set(),
            registry.get_sector_config("general"),
            &config,
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::ConfigurationError(_)));
    }
}
