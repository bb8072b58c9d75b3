use analysis_core::{AnalysisError, Metric};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;

use crate::sector::{validate_weights, SectorProfile};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Metric weights for the composite; renormalised to sum to 1 on use
    pub composite_weights: BTreeMap<Metric, f64>,
    pub tax_rate: f64,
    /// Replaces every sector's `min_required_fraction` when set
    pub coverage_min_fraction: Option<f64>,
    /// Share of composite weight below which a run is flagged as low coverage
    pub low_coverage_threshold: f64,
    pub max_debt_to_equity: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            composite_weights: BTreeMap::from([
                (Metric::RevenueYoy, 0.20),
                (Metric::NetMargin, 0.15),
                (Metric::OpMargin, 0.15),
                (Metric::Fcf, 0.15),
                (Metric::DebtToEquity, 0.10),
                (Metric::Ocf, 0.10),
                (Metric::RevenueQoq, 0.15),
            ]),
            tax_rate: 0.21,
            coverage_min_fraction: None,
            low_coverage_threshold: 0.50,
            max_debt_to_equity: 10.0,
        }
    }
}

fn env_f64(name: &str, default: f64) -> Result<f64, AnalysisError> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .map_err(|e| AnalysisError::ConfigurationError(format!("{name}: {e}")))
}

impl ScoringConfig {
    /// Defaults overlaid with `WEIGHT_*`, `TAX_RATE`, `COVERAGE_MIN_FRACTION`,
    /// `LOW_COVERAGE_THRESHOLD` and `MAX_DEBT_TO_EQUITY`.
    pub fn from_env() -> Result<Self, AnalysisError> {
        let defaults = Self::default();
        let weight = |name: &str, metric: Metric| -> Result<(Metric, f64), AnalysisError> {
            let default = defaults.composite_weights.get(&metric).copied().unwrap_or(0.0);
            Ok((metric, env_f64(name, default)?))
        };

        let composite_weights = BTreeMap::from([
            weight("WEIGHT_REVENUE_YOY", Metric::RevenueYoy)?,
            weight("WEIGHT_NET_MARGIN", Metric::NetMargin)?,
            weight("WEIGHT_OP_MARGIN", Metric::OpMargin)?,
            weight("WEIGHT_FCF", Metric::Fcf)?,
            weight("WEIGHT_DEBT_EQUITY", Metric::DebtToEquity)?,
            weight("WEIGHT_OCF", Metric::Ocf)?,
            weight("WEIGHT_REVENUE_QOQ", Metric::RevenueQoq)?,
        ]);

        let coverage_min_fraction = match env::var("COVERAGE_MIN_FRACTION") {
            Ok(v) => Some(v.trim().parse().map_err(|e| {
                AnalysisError::ConfigurationError(format!("COVERAGE_MIN_FRACTION: {e}"))
            })?),
            Err(_) => None,
        };

        let config = Self {
            composite_weights,
            tax_rate: env_f64("TAX_RATE", defaults.tax_rate)?,
            coverage_min_fraction,
            low_coverage_threshold: env_f64("LOW_COVERAGE_THRESHOLD", defaults.low_coverage_threshold)?,
            max_debt_to_equity: env_f64("MAX_DEBT_TO_EQUITY", defaults.max_debt_to_equity)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        validate_weights(&self.composite_weights, "composite weights")?;
        if !(0.0..1.0).contains(&self.tax_rate) {
            return Err(AnalysisError::ConfigurationError(format!(
                "tax rate {} outside [0, 1)",
                self.tax_rate
            )));
        }
        if let Some(f) = self.coverage_min_fraction {
            if f.is_nan() || f <= 0.0 || f > 1.0 {
                return Err(AnalysisError::ConfigurationError(format!(
                    "coverage minimum fraction {f} outside (0, 1]"
                )));
            }
        }
        if self.max_debt_to_equity.is_nan() || self.max_debt_to_equity <= 0.0 {
            return Err(AnalysisError::ConfigurationError(
                "max debt-to-equity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Composite weights for a sector, renormalised to sum to 1.
    pub fn weights_for(&self, profile: &SectorProfile) -> Result<BTreeMap<Metric, f64>, AnalysisError> {
        let weights = profile
            .weights_override
            .as_ref()
            .unwrap_or(&self.composite_weights);
        validate_weights(weights, &format!("weights for sector '{}'", profile.name))?;
        let total: f64 = weights.values().sum();
        Ok(weights.iter().map(|(m, w)| (*m, w / total)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sector::SectorRegistry;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_weights_sum_to_one() {
        let config = ScoringConfig::default();
        let total: f64 = config.composite_weights.values().sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
        config.validate().unwrap();
    }

    #[test]
    fn test_weights_are_renormalised() {
        let mut config = ScoringConfig::default();
        config.composite_weights = BTreeMap::from([(Metric::RevenueYoy, 2.0), (Metric::Fcf, 2.0)]);
        let registry = SectorRegistry::builtin();
        let weights = config.weights_for(registry.get_sector_config("general")).unwrap();
        assert_relative_eq!(weights[&Metric::Fcf], 0.5);
    }

    #[test]
    fn test_sector_override_replaces_weights() {
        let config = ScoringConfig::default();
        let registry = SectorRegistry::builtin();
        let weights = config.weights_for(registry.get_sector_config("banking")).unwrap();
        assert!(weights.contains_key(&Metric::NetInterestMargin));
        let total: f64 = weights.values().sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_configs_are_fatal() {
        let mut config = ScoringConfig::default();
        config.composite_weights.insert(Metric::Ocf, -0.1);
        assert!(matches!(
            config.validate(),
            Err(AnalysisError::ConfigurationError(_))
        ));

        let mut config = ScoringConfig::default();
        config.composite_weights.values_mut().for_each(|w| *w = 0.0);
        let err = config.validate().unwrap_err();
        assert!(err.is_fatal());

        let config = ScoringConfig {
            coverage_min_fraction: Some(1.5),
            ..ScoringConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
