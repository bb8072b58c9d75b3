use analysis_core::{AnalysisError, Factor, Metric, MultipleBenchmarks};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::bands::{default_band, ScoreBand};
use crate::factors::base_members;

/// Declarative per-sector configuration: coverage contract, band overrides,
/// weights and valuation benchmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorProfile {
    #[serde(default)]
    pub name: String,
    pub required_metrics: Vec<Metric>,
    #[serde(default)]
    pub recommended_metrics: Vec<Metric>,
    pub min_required_fraction: f64,
    #[serde(default)]
    pub bands: BTreeMap<Metric, ScoreBand>,
    /// Replaces the configured composite weights entirely when present
    #[serde(default)]
    pub weights_override: Option<BTreeMap<Metric, f64>>,
    #[serde(default = "default_factor_weights")]
    pub factor_weights: BTreeMap<Factor, f64>,
    #[serde(default)]
    pub factor_extra_metrics: BTreeMap<Factor, Vec<Metric>>,
    #[serde(default)]
    pub multiples: MultipleBenchmarks,
}

fn default_factor_weights() -> BTreeMap<Factor, f64> {
    factor_weights(0.25, 0.20, 0.20, 0.20, 0.15)
}

fn factor_weights(q: f64, g: f64, bs: f64, cf: f64, sh: f64) -> BTreeMap<Factor, f64> {
    BTreeMap::from([
        (Factor::Quality, q),
        (Factor::Growth, g),
        (Factor::BalanceSheet, bs),
        (Factor::Cashflow, cf),
        (Factor::Shareholder, sh),
    ])
}

fn benchmarks(pe: f64, pb: f64, ps: f64) -> MultipleBenchmarks {
    MultipleBenchmarks {
        pe: Some(pe),
        pb: Some(pb),
        ps: Some(ps),
    }
}

impl SectorProfile {
    pub fn band(&self, metric: Metric) -> ScoreBand {
        self.bands
            .get(&metric)
            .cloned()
            .unwrap_or_else(|| default_band(metric))
    }

    pub fn sub_score(&self, metric: Metric, value: f64) -> f64 {
        match self.bands.get(&metric) {
            Some(band) => band.score(value),
            None => default_band(metric).score(value),
        }
    }

    /// Fixed metric subset for a factor, plus any sector extras.
    pub fn factor_metrics(&self, factor: Factor) -> Vec<Metric> {
        let mut metrics = base_members(factor).to_vec();
        if let Some(extra) = self.factor_extra_metrics.get(&factor) {
            for m in extra {
                if !metrics.contains(m) {
                    metrics.push(*m);
                }
            }
        }
        metrics
    }

    /// Every metric this sector scores in any factor.
    pub fn scoreable_metrics(&self) -> Vec<Metric> {
        let mut all: Vec<Metric> = Factor::ALL
            .iter()
            .flat_map(|f| self.factor_metrics(*f))
            .collect();
        all.sort();
        all.dedup();
        all
    }

    /// Minimum count of required metrics for the gate to pass:
    /// `max(1, floor(required * fraction))`.
    pub fn min_required(&self, fraction_override: Option<f64>) -> usize {
        let fraction = fraction_override.unwrap_or(self.min_required_fraction);
        let n = self.required_metrics.len() as f64;
        ((n * fraction + 1e-9).floor() as usize).max(1)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let name = &self.name;
        if self.required_metrics.is_empty() {
            return Err(AnalysisError::ConfigurationError(format!(
                "sector '{name}': required_metrics is empty"
            )));
        }
        let f = self.min_required_fraction;
        if f.is_nan() || f <= 0.0 || f > 1.0 {
            return Err(AnalysisError::ConfigurationError(format!(
                "sector '{name}': min_required_fraction {} outside (0, 1]",
                self.min_required_fraction
            )));
        }
        for (metric, band) in &self.bands {
            band.validate(*metric)?;
        }
        if let Some(weights) = &self.weights_override {
            validate_weights(weights, &format!("sector '{name}' weights_override"))?;
        }
        validate_weights(&self.factor_weights, &format!("sector '{name}' factor_weights"))?;
        Ok(())
    }
}

/// Weights must be finite, non-negative and not all zero.
pub fn validate_weights<K: std::fmt::Debug>(
    weights: &BTreeMap<K, f64>,
    what: &str,
) -> Result<(), AnalysisError> {
    if let Some((k, w)) = weights.iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
        return Err(AnalysisError::ConfigurationError(format!(
            "{what}: weight for {k:?} is {w}"
        )));
    }
    let total: f64 = weights.values().sum();
    if total <= 0.0 {
        return Err(AnalysisError::ConfigurationError(format!(
            "{what}: weights sum to zero, cannot renormalise"
        )));
    }
    Ok(())
}

#[derive(Deserialize)]
struct RegistryDocument {
    sectors: BTreeMap<String, SectorProfile>,
}

/// Immutable sector lookup; unknown tags fall back to `general`.
#[derive(Debug, Clone)]
pub struct SectorRegistry {
    general: SectorProfile,
    profiles: BTreeMap<String, SectorProfile>,
}

impl SectorRegistry {
    pub fn builtin() -> Self {
        let profiles: BTreeMap<String, SectorProfile> = builtin_profiles()
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();
        Self {
            general: general_profile(),
            profiles,
        }
    }

    /// Load from a `{"sectors": {"<tag>": {...}}}` document. A missing
    /// `general` entry is filled with the built-in one.
    pub fn from_json(json: &str) -> Result<Self, AnalysisError> {
        let doc: RegistryDocument = serde_json::from_str(json).map_err(|e| {
            AnalysisError::ConfigurationError(format!("sector config is not valid JSON: {e}"))
        })?;

        let mut profiles = BTreeMap::new();
        for (tag, mut profile) in doc.sectors {
            let tag = canonical_sector(&tag);
            profile.name = tag.clone();
            profile.validate()?;
            profiles.insert(tag, profile);
        }
        let general = profiles
            .get("general")
            .cloned()
            .unwrap_or_else(general_profile);
        profiles.insert("general".to_string(), general.clone());
        Ok(Self { general, profiles })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AnalysisError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            AnalysisError::ConfigurationError(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    pub fn get_sector_config(&self, sector: &str) -> &SectorProfile {
        self.profiles
            .get(&canonical_sector(sector))
            .unwrap_or(&self.general)
    }

    pub fn sectors(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}

impl Default for SectorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Map common sector spellings onto registry tags.
pub fn canonical_sector(tag: &str) -> String {
    let tag = tag.trim().to_lowercase().replace(['-', ' '], "_");
    let canonical = match tag.as_str() {
        "technology" | "software" | "semiconductors" => "tech",
        "bank" | "banks" | "financial_services" | "financials" => "banking",
        "consumer_cyclical" | "consumer_defensive" | "consumer_staples" | "retail" => "consumer",
        "communication_services" | "telco" | "telecommunications" => "telecom",
        "energy" | "basic_materials" | "mining" | "materials" => "commodities",
        "property" | "realestate" => "real_estate",
        "utility" => "utilities",
        other => other,
    };
    canonical.to_string()
}

fn general_profile() -> SectorProfile {
    SectorProfile {
        name: "general".to_string(),
        required_metrics: vec![
            Metric::RevenueYoy,
            Metric::OpMargin,
            Metric::Roe,
            Metric::DebtToEquity,
            Metric::CurrentRatio,
        ],
        recommended_metrics: vec![Metric::EpsGrowth, Metric::FcfMargin, Metric::PayoutRatio],
        min_required_fraction: 0.6,
        bands: BTreeMap::new(),
        weights_override: None,
        factor_weights: default_factor_weights(),
        factor_extra_metrics: BTreeMap::new(),
        multiples: benchmarks(18.0, 2.5, 2.0),
    }
}

fn builtin_profiles() -> Vec<SectorProfile> {
    let base = general_profile();

    let tech = SectorProfile {
        name: "tech".to_string(),
        required_metrics: vec![
            Metric::RevenueYoy,
            Metric::OpMargin,
            Metric::NetMargin,
            Metric::FcfMargin,
            Metric::DebtToEquity,
        ],
        recommended_metrics: vec![
            Metric::EpsGrowth,
            Metric::RevenueQoq,
            Metric::Dilution,
            Metric::Roic,
            Metric::CapexIntensity,
        ],
        min_required_fraction: 0.8,
        bands: BTreeMap::from([
            (Metric::RevenueYoy, ScoreBand::linear(&[(-0.10, 0.0), (0.40, 100.0)])),
            (Metric::RevenueQoq, ScoreBand::linear(&[(-0.10, 0.0), (0.25, 100.0)])),
        ]),
        factor_weights: factor_weights(0.25, 0.30, 0.10, 0.25, 0.10),
        multiples: benchmarks(30.0, 6.0, 6.0),
        ..base.clone()
    };

    let banking = SectorProfile {
        name: "banking".to_string(),
        required_metrics: vec![
            Metric::NetInterestMargin,
            Metric::NonPerformingLoan,
            Metric::CapitalAdequacyRatio,
            Metric::CostToIncome,
        ],
        recommended_metrics: vec![Metric::Roe, Metric::NetMargin, Metric::EpsGrowth],
        min_required_fraction: 1.0 / 3.0,
        bands: BTreeMap::from([(
            Metric::DebtToEquity,
            ScoreBand::linear(&[(0.0, 100.0), (8.0, 0.0)]),
        )]),
        weights_override: Some(BTreeMap::from([
            (Metric::RevenueYoy, 0.08),
            (Metric::RevenueQoq, 0.05),
            (Metric::NetMargin, 0.10),
            (Metric::OpMargin, 0.05),
            (Metric::Roe, 0.12),
            (Metric::Fcf, 0.05),
            (Metric::Ocf, 0.05),
            (Metric::DebtToEquity, 0.03),
            (Metric::CurrentRatio, 0.02),
            (Metric::EpsGrowth, 0.08),
            (Metric::NetInterestMargin, 0.15),
            (Metric::NonPerformingLoan, 0.12),
            (Metric::CapitalAdequacyRatio, 0.10),
        ])),
        factor_weights: factor_weights(0.30, 0.15, 0.30, 0.10, 0.15),
        factor_extra_metrics: BTreeMap::from([
            (
                Factor::Quality,
                vec![Metric::NetInterestMargin, Metric::CostToIncome],
            ),
            (
                Factor::BalanceSheet,
                vec![Metric::CapitalAdequacyRatio, Metric::NonPerformingLoan],
            ),
        ]),
        multiples: benchmarks(12.0, 1.5, 3.0),
        ..base.clone()
    };

    let consumer = SectorProfile {
        name: "consumer".to_string(),
        required_metrics: vec![
            Metric::RevenueYoy,
            Metric::OpMargin,
            Metric::Roe,
            Metric::CurrentRatio,
            Metric::DebtToEquity,
        ],
        recommended_metrics: vec![Metric::GrossMargin, Metric::PayoutRatio],
        min_required_fraction: 0.8,
        factor_weights: factor_weights(0.25, 0.20, 0.15, 0.20, 0.20),
        multiples: benchmarks(20.0, 3.0, 1.5),
        ..base.clone()
    };

    let telecom = SectorProfile {
        name: "telecom".to_string(),
        required_metrics: vec![
            Metric::RevenueYoy,
            Metric::OpMargin,
            Metric::DebtToEquity,
            Metric::PayoutRatio,
            Metric::FcfMargin,
        ],
        recommended_metrics: vec![Metric::CapexIntensity, Metric::Roe],
        min_required_fraction: 0.6,
        factor_weights: factor_weights(0.20, 0.15, 0.20, 0.25, 0.20),
        multiples: benchmarks(15.0, 2.0, 2.0),
        ..base.clone()
    };

    let commodities = SectorProfile {
        name: "commodities".to_string(),
        required_metrics: vec![
            Metric::RevenueYoy,
            Metric::OpMargin,
            Metric::DebtToEquity,
            Metric::CurrentRatio,
            Metric::FcfMargin,
        ],
        recommended_metrics: vec![Metric::PayoutRatio, Metric::CapexIntensity],
        min_required_fraction: 0.6,
        bands: BTreeMap::from([(
            Metric::CapexIntensity,
            ScoreBand::linear(&[(0.05, 100.0), (0.30, 30.0), (0.50, 0.0)]),
        )]),
        factor_weights: factor_weights(0.20, 0.15, 0.25, 0.25, 0.15),
        multiples: benchmarks(10.0, 1.5, 1.2),
        ..base.clone()
    };

    let real_estate = SectorProfile {
        name: "real_estate".to_string(),
        required_metrics: vec![
            Metric::Roe,
            Metric::DebtToEquity,
            Metric::CurrentRatio,
            Metric::PayoutRatio,
        ],
        recommended_metrics: vec![Metric::RevenueYoy, Metric::NetMargin],
        min_required_fraction: 0.75,
        bands: BTreeMap::from([(
            Metric::DebtToEquity,
            ScoreBand::linear(&[(0.0, 100.0), (4.0, 0.0)]),
        )]),
        factor_weights: factor_weights(0.15, 0.15, 0.30, 0.20, 0.20),
        multiples: benchmarks(18.0, 1.0, 4.0),
        ..base.clone()
    };

    let utilities = SectorProfile {
        name: "utilities".to_string(),
        required_metrics: vec![
            Metric::OpMargin,
            Metric::DebtToEquity,
            Metric::PayoutRatio,
            Metric::FcfMargin,
        ],
        recommended_metrics: vec![Metric::Roe, Metric::RevenueYoy],
        min_required_fraction: 0.5,
        bands: BTreeMap::from([
            (Metric::RevenueYoy, ScoreBand::linear(&[(-0.10, 0.0), (0.10, 100.0)])),
            (Metric::DebtToEquity, ScoreBand::linear(&[(0.5, 100.0), (4.0, 0.0)])),
        ]),
        factor_weights: factor_weights(0.20, 0.10, 0.25, 0.25, 0.20),
        multiples: benchmarks(16.0, 1.8, 2.0),
        ..base.clone()
    };

    vec![
        base,
        tech,
        banking,
        consumer,
        telecom,
        commodities,
        real_estate,
        utilities,
    ]
}
