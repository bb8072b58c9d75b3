pub mod bands;
pub mod composite;
pub mod config;
pub mod coverage;
pub mod derive;
pub mod explain;
pub mod factors;
pub mod normalize;
pub mod sector;

pub use analysis_core::FxTable;
pub use bands::{default_band, describe, RatingLabel, ScoreBand};
pub use composite::compose;
pub use config::ScoringConfig;
pub use coverage::{check_coverage, format_coverage_report};
pub use derive::{derive_metrics, History};
pub use explain::explain_score;
pub use factors::{factor_composite, score_factor, score_factors};
pub use normalize::{parse_raw_value, UnitNormalizer};
pub use sector::{canonical_sector, SectorProfile, SectorRegistry};

use analysis_core::{
    AnalysisError, CompositeScore, FinancialFact, NormalizedMetricSet, Period, RunContext,
};
use tracing::info;

/// Scoring engine: facts in, composite score out. Holds only immutable
/// configuration, so one instance can serve many runs in parallel.
pub struct FinancialScorer {
    config: ScoringConfig,
    registry: SectorRegistry,
    normalizer: UnitNormalizer,
}

impl FinancialScorer {
    pub fn new(config: ScoringConfig, registry: SectorRegistry) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self {
            config,
            registry,
            normalizer: UnitNormalizer::default(),
        })
    }

    pub fn with_fx(mut self, fx: FxTable) -> Self {
        self.normalizer = UnitNormalizer::new(fx);
        self
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn registry(&self) -> &SectorRegistry {
        &self.registry
    }

    pub fn normalize(
        &self,
        facts: &[FinancialFact],
        ticker: &str,
        period: &Period,
        currency: Option<&str>,
    ) -> NormalizedMetricSet {
        self.normalizer.normalize(facts, ticker, period, currency)
    }

    /// Score `(ticker, period)` from a fact snapshot that may also hold the
    /// prior-year and prior-quarter facts used for growth metrics.
    ///
    /// Per-metric gaps never fail the run; only invalid configuration does.
    pub fn score(
        &self,
        ctx: &RunContext,
        ticker: &str,
        period: &Period,
        sector: &str,
        facts: &[FinancialFact],
    ) -> Result<CompositeScore, AnalysisError> {
        let profile = self.registry.get_sector_config(sector);

        let current = self.normalize(facts, ticker, period, None);
        let currency = current.currency.clone();
        let prior = |p: Option<Period>| {
            p.map(|p| self.normalize(facts, ticker, &p, Some(&currency)))
                .filter(|set| !set.is_empty())
        };
        let prior_year = prior(period.prior_year());
        let prior_quarter = prior(period.prior_quarter());

        let derived = derive_metrics(
            &current,
            History {
                prior_year: prior_year.as_ref(),
                prior_quarter: prior_quarter.as_ref(),
            },
            self.config.tax_rate,
            self.config.max_debt_to_equity,
        );

        let composite = compose(ctx, derived, profile, &self.config)?;
        info!(
            run_id = %ctx.run_id,
            ticker = %composite.ticker,
            period = %composite.period,
            sector = %composite.sector,
            score = composite.score,
            gate_passed = composite.coverage_gate_passed,
            drivers = composite.drivers.len(),
            "composite score computed"
        );
        Ok(composite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{FactMetric, Metric, Scale};
    use approx::assert_relative_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn fact(period: &str, metric: FactMetric, value: &str) -> FinancialFact {
        FinancialFact::new("AAPL", period, metric, Decimal::from_str(value).unwrap(), "USD")
            .with_scale(Scale::Billions)
    }

    #[test]
    fn test_score_uses_prior_periods_from_snapshot() {
        let facts = vec![
            fact("Q3-2025", FactMetric::Revenue, "45.18"),
            fact("Q3-2024", FactMetric::Revenue, "38.4"),
            fact("Q2-2025", FactMetric::Revenue, "43.0"),
            fact("Q3-2025", FactMetric::NetIncome, "9.9"),
            fact("Q3-2025", FactMetric::OperatingIncome, "13.5"),
        ];
        let scorer = FinancialScorer::new(ScoringConfig::default(), SectorRegistry::builtin()).unwrap();
        let result = scorer
            .score(
                &RunContext::new(),
                "aapl",
                &Period::parse("Q3-2025"),
                "tech",
                &facts,
            )
            .unwrap();

        assert_eq!(result.ticker, "AAPL");
        let yoy = result
            .drivers
            .iter()
            .find(|d| d.metric == Metric::RevenueYoy)
            .unwrap();
        assert_relative_eq!(yoy.value, 0.1766, epsilon = 5e-4);
        assert!(result.metrics.get(Metric::RevenueQoq).is_present());
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let mut config = ScoringConfig::default();
        config.tax_rate = 1.5;
        assert!(FinancialScorer::new(config, SectorRegistry::builtin()).is_err());
    }
}
