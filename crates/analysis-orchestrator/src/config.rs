use analysis_core::{AnalysisError, FxTable};
use financial_scoring::{ScoringConfig, SectorRegistry};
use rating_resolver::RatingPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use valuation_engine::ValuationAssumptions;

/// Everything an orchestrator needs, assembled once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub scoring: ScoringConfig,
    pub valuation: ValuationAssumptions,
    pub rating: RatingPolicy,
    pub sector_config_path: Option<String>, // JSON registry; built-in profiles when unset
    pub max_concurrency: usize,             // parallel runs in a batch
    /// Pairs from `FX_RATES`, e.g. `USD/IDR=16000`
    #[serde(skip)]
    pub fx: FxTable,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            valuation: ValuationAssumptions::default(),
            rating: RatingPolicy::default(),
            sector_config_path: None,
            max_concurrency: 8,
            fx: FxTable::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, AnalysisError> {
        let max_concurrency = env::var("MAX_CONCURRENCY")
            .unwrap_or_else(|_| "8".to_string())
            .parse::<usize>()
            .map_err(|e| AnalysisError::ConfigurationError(format!("MAX_CONCURRENCY: {e}")))?;
        if max_concurrency == 0 {
            return Err(AnalysisError::ConfigurationError(
                "MAX_CONCURRENCY must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            scoring: ScoringConfig::from_env()?,
            valuation: ValuationAssumptions::from_env()?,
            rating: RatingPolicy::from_env()?,
            sector_config_path: env::var("SECTOR_CONFIG_PATH").ok().filter(|p| !p.is_empty()),
            max_concurrency,
            fx: FxTable::parse(&env::var("FX_RATES").unwrap_or_default())?,
        })
    }

    pub fn sector_registry(&self) -> Result<SectorRegistry, AnalysisError> {
        match &self.sector_config_path {
            Some(path) => SectorRegistry::from_file(path),
            None => Ok(SectorRegistry::builtin()),
        }
    }
}
