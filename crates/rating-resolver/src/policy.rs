use analysis_core::AnalysisError;
use serde::{Deserialize, Serialize};
use std::env;

/// Thresholds for turning a composite score into a rating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingPolicy {
    pub buy_threshold: f64,          // 65
    pub sell_threshold: f64,         // 45
    pub override_growth_min: f64,    // 70, growth factor needed to keep Buy at a premium
    pub override_quality_min: f64,   // 70
    pub watch_coverage: f64,         // 0.5, Sell below this metric coverage becomes Hold-Watch
    pub base_confidence: f64,        // 0.85
    pub max_confidence: f64,         // 0.95
    pub locked_confidence_cap: f64,  // 0.40
    pub warning_penalty: f64,        // 0.05 per warning flag
    pub caution_penalty: f64,        // 0.025 per caution flag
}

impl Default for RatingPolicy {
    fn default() -> Self {
        Self {
            buy_threshold: 65.0,
            sell_threshold: 45.0,
            override_growth_min: 70.0,
            override_quality_min: 70.0,
            watch_coverage: 0.5,
            base_confidence: 0.85,
            max_confidence: 0.95,
            locked_confidence_cap: 0.40,
            warning_penalty: 0.05,
            caution_penalty: 0.025,
        }
    }
}

impl RatingPolicy {
    pub fn from_env() -> Result<Self, AnalysisError> {
        let d = Self::default();
        let var = |name: &str, default: f64| -> Result<f64, AnalysisError> {
            env::var(name)
                .unwrap_or_else(|_| default.to_string())
                .trim()
                .parse()
                .map_err(|e| AnalysisError::ConfigurationError(format!("{name}: {e}")))
        };
        let policy = Self {
            buy_threshold: var("BUY_THRESHOLD", d.buy_threshold)?,
            sell_threshold: var("SELL_THRESHOLD", d.sell_threshold)?,
            override_growth_min: var("OVERRIDE_GROWTH_MIN", d.override_growth_min)?,
            override_quality_min: var("OVERRIDE_QUALITY_MIN", d.override_quality_min)?,
            locked_confidence_cap: var("LOCKED_CONFIDENCE_CAP", d.locked_confidence_cap)?,
            ..d
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let in_score_range = |v: f64| (0.0..=100.0).contains(&v);
        if !in_score_range(self.buy_threshold) || !in_score_range(self.sell_threshold) {
            return Err(AnalysisError::ConfigurationError(
                "rating thresholds must lie in [0, 100]".to_string(),
            ));
        }
        if self.sell_threshold > self.buy_threshold {
            return Err(AnalysisError::ConfigurationError(format!(
                "sell threshold {} above buy threshold {}",
                self.sell_threshold, self.buy_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.max_confidence)
            || !(0.0..=1.0).contains(&self.locked_confidence_cap)
        {
            return Err(AnalysisError::ConfigurationError(
                "confidence caps must lie in [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverted_thresholds_rejected() {
        let policy = RatingPolicy {
            buy_threshold: 40.0,
            ..RatingPolicy::default()
        };
        assert!(policy.validate().is_err());
        RatingPolicy::default().validate().unwrap();
    }
}
