use analysis_core::numeric::{mean_finite, weighted_mean};
use analysis_core::{DerivedMetricSet, Factor, FactorScore, Metric, SubScore};

use crate::sector::SectorProfile;

/// Fixed metric subset scored by each factor before sector extras.
pub fn base_members(factor: Factor) -> &'static [Metric] {
    match factor {
        Factor::Quality => &[
            Metric::OpMargin,
            Metric::NetMargin,
            Metric::Roe,
            Metric::Roic,
            Metric::GrossMargin,
        ],
        Factor::Growth => &[Metric::RevenueYoy, Metric::EpsGrowth, Metric::RevenueQoq],
        Factor::BalanceSheet => &[Metric::DebtToEquity, Metric::CurrentRatio],
        Factor::Cashflow => &[
            Metric::FcfMargin,
            Metric::CfoToNetIncome,
            Metric::CapexIntensity,
            Metric::Ocf,
            Metric::Fcf,
        ],
        Factor::Shareholder => &[Metric::PayoutRatio, Metric::Dilution],
    }
}

/// Score one factor as the plain mean of its available sub-scores.
///
/// Missing metrics count toward neither the mean nor `available`; with
/// nothing available the score is NaN and coverage is `0/required`.
pub fn score_factor(
    factor: Factor,
    metrics: &DerivedMetricSet,
    profile: &SectorProfile,
) -> FactorScore {
    let members = profile.factor_metrics(factor);
    let sub_scores: Vec<SubScore> = members
        .iter()
        .filter_map(|m| {
            let value = metrics.get(*m).value()?;
            Some(SubScore {
                metric: *m,
                value,
                score: profile.sub_score(*m, value),
            })
        })
        .filter(|s| s.score.is_finite())
        .collect();

    let scores: Vec<f64> = sub_scores.iter().map(|s| s.score).collect();
    FactorScore {
        factor,
        score: mean_finite(&scores),
        available: sub_scores.len(),
        required: members.len(),
        sub_scores,
    }
}

pub fn score_factors(metrics: &DerivedMetricSet, profile: &SectorProfile) -> Vec<FactorScore> {
    Factor::ALL
        .iter()
        .map(|f| score_factor(*f, metrics, profile))
        .collect()
}

/// Sector-weighted blend of factor scores; unscored factors drop out and
/// the remaining weights are renormalised.
pub fn factor_composite(factors: &[FactorScore], profile: &SectorProfile) -> f64 {
    weighted_mean(factors.iter().map(|f| {
        let weight = profile.factor_weights.get(&f.factor).copied().unwrap_or(0.0);
        (f.score, weight)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sector::SectorRegistry;
    use analysis_core::{MetricValue, Period};
    use approx::assert_relative_eq;

    fn metric_set(values: &[(Metric, f64)]) -> DerivedMetricSet {
        let mut set = DerivedMetricSet::new("TEST", Period::parse("Q3-2025"), "USD");
        for (m, v) in values {
            set.set(*m, MetricValue::Present(*v));
        }
        set
    }

    #[test]
    fn test_empty_factor_is_nan_not_zero() {
        let registry = SectorRegistry::builtin();
        let profile = registry.get_sector_config("general");
        let set = metric_set(&[(Metric::RevenueYoy, 0.10)]);

        let shareholder = score_factor(Factor::Shareholder, &set, profile);
        assert!(shareholder.score.is_nan());
        assert_eq!(shareholder.available, 0);
        assert_eq!(shareholder.required, 2);
        assert_eq!(shareholder.coverage(), 0.0);
    }

    #[test]
    fn test_zero_score_is_distinct_from_missing() {
        let registry = SectorRegistry::builtin();
        let profile = registry.get_sector_config("general");
        let set = metric_set(&[(Metric::DebtToEquity, 9.0)]);

        let bs = score_factor(Factor::BalanceSheet, &set, profile);
        assert_eq!(bs.score, 0.0);
        assert_eq!(bs.available, 1);
        assert_relative_eq!(bs.coverage(), 0.5);
    }

    #[test]
    fn test_factor_mean_of_available() {
        let registry = SectorRegistry::builtin();
        let profile = registry.get_sector_config("general");
        // D/E 1.5 -> 50, current ratio 2.5 -> 100
        let set = metric_set(&[(Metric::DebtToEquity, 1.5), (Metric::CurrentRatio, 2.5)]);
        let bs = score_factor(Factor::BalanceSheet, &set, profile);
        assert_relative_eq!(bs.score, 75.0, epsilon = 1e-9);
    }

    #[test]
    fn test_factor_composite_skips_nan_factors() {
        let registry = SectorRegistry::builtin();
        let profile = registry.get_sector_config("general");
        let set = metric_set(&[(Metric::DebtToEquity, 0.0), (Metric::RevenueYoy, -0.20)]);
        let factors = score_factors(&set, profile);
        // balance sheet 100 (w .20), growth 0 (w .20), rest NaN
        assert_relative_eq!(factor_composite(&factors, profile), 50.0, epsilon = 1e-9);

        let empty = metric_set(&[]);
        assert!(factor_composite(&score_factors(&empty, profile), profile).is_nan());
    }
}
