use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::facts::Money;
use crate::metrics::{DerivedMetricSet, Factor, Metric, MissingReason};
use crate::period::Period;

/// Serialize non-finite floats as `null` and read `null` back as NaN, so a
/// missing score survives a JSON round trip without turning into 0.
pub mod serde_nan {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

/// Identity and clock for one evaluation. Passed in explicitly so scoring
/// stays a pure function of its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunContext {
    pub run_id: Uuid,
    pub as_of: DateTime<Utc>,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            as_of: Utc::now(),
        }
    }

    pub fn fixed(run_id: Uuid, as_of: DateTime<Utc>) -> Self {
        Self { run_id, as_of }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubScore {
    pub metric: Metric,
    pub value: f64,
    pub score: f64,
}

/// Mean of the available sub-scores in one factor. `score` is NaN when no
/// sub-metric was available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorScore {
    pub factor: Factor,
    #[serde(with = "serde_nan")]
    pub score: f64,
    pub available: usize,
    pub required: usize,
    pub sub_scores: Vec<SubScore>,
}

impl FactorScore {
    pub fn coverage(&self) -> f64 {
        if self.required == 0 {
            0.0
        } else {
            self.available as f64 / self.required as f64
        }
    }

    pub fn is_scored(&self) -> bool {
        self.score.is_finite()
    }
}

/// One metric's reconstructible contribution to the composite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub metric: Metric,
    pub value: f64,
    pub sub_score: f64,
    /// Configured weight after renormalisation over available metrics
    pub weight: f64,
    pub weight_contribution: f64,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingMetric {
    pub metric: Metric,
    pub reason: MissingReason,
}

/// Outcome of a sector's coverage contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageReport {
    pub sector: String,
    pub required: Vec<Metric>,
    pub found_required: Vec<Metric>,
    pub missing_required: Vec<Metric>,
    pub missing_recommended: Vec<Metric>,
    pub min_required: usize,
    pub passed: bool,
    pub confidence_penalty: f64,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeScore {
    pub run_id: Uuid,
    pub ticker: String,
    pub period: Period,
    pub sector: String,
    pub currency: String,
    #[serde(with = "serde_nan")]
    pub score: f64,
    /// Sector-weighted blend of the factor scores
    #[serde(with = "serde_nan")]
    pub factor_composite: f64,
    pub factors: Vec<FactorScore>,
    pub drivers: Vec<Driver>,
    pub missing: Vec<MissingMetric>,
    /// Share of configured composite weight backed by data
    pub weight_coverage: f64,
    /// Available scoreable metrics over all scoreable metrics for the sector
    pub metric_coverage: f64,
    pub coverage: CoverageReport,
    pub coverage_gate_passed: bool,
    pub metrics: DerivedMetricSet,
    pub notes: Vec<String>,
    pub computed_at: DateTime<Utc>,
}

impl CompositeScore {
    pub fn factor(&self, factor: Factor) -> Option<&FactorScore> {
        self.factors.iter().find(|f| f.factor == factor)
    }

    /// Factor score, NaN when the factor is absent or unscored.
    pub fn factor_score(&self, factor: Factor) -> f64 {
        self.factor(factor).map(|f| f.score).unwrap_or(f64::NAN)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Bear,
    Base,
    Bull,
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scenario::Bear => "bear",
            Scenario::Base => "base",
            Scenario::Bull => "bull",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioValuation {
    pub scenario: Scenario,
    pub wacc: f64,
    pub terminal_growth: f64,
    pub revenue_growth: f64,
    /// Per share; absent whenever the DCF is not meaningful
    pub intrinsic_value: Option<f64>,
    pub upside_pct: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSet {
    pub bear: ScenarioValuation,
    pub base: ScenarioValuation,
    pub bull: ScenarioValuation,
}

impl ScenarioSet {
    pub fn iter(&self) -> impl Iterator<Item = &ScenarioValuation> {
        [&self.bear, &self.base, &self.bull].into_iter()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionYear {
    pub year: u32,
    pub revenue: f64,
    pub growth: f64,
    pub op_margin: f64,
    pub operating_income: f64,
    pub depreciation: f64,
    pub net_income: f64,
    pub capex: f64,
    pub fcf: f64,
}

/// Five-year forward statements from a single annualised base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projection {
    pub base_revenue: f64,
    pub base_growth: f64,
    pub base_op_margin: f64,
    pub target_op_margin: f64,
    pub tax_rate: f64,
    pub years: Vec<ProjectionYear>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridBasis {
    FreeCashFlow,
    OperatingCashFlow,
    /// 10% FCF margin applied to revenue
    RevenueProxy,
}

/// WACC rows by terminal-growth columns of per-share Gordon values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityGrid {
    pub basis: GridBasis,
    pub cash_flow_per_share: f64,
    pub wacc_values: Vec<f64>,
    pub growth_values: Vec<f64>,
    /// `None` where WACC does not exceed terminal growth
    pub cells: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultipleKind {
    Pe,
    Pb,
    Ps,
}

impl MultipleKind {
    pub fn label(&self) -> &'static str {
        match self {
            MultipleKind::Pe => "P/E",
            MultipleKind::Pb => "P/B",
            MultipleKind::Ps => "P/S",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkSource {
    Peers,
    Sector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultipleAssessment {
    Discount,
    SlightDiscount,
    Fair,
    SlightPremium,
    Premium,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultipleComparison {
    pub kind: MultipleKind,
    pub value: f64,
    pub benchmark: f64,
    pub benchmark_source: BenchmarkSource,
    pub ratio: f64,
    pub assessment: MultipleAssessment,
}

/// Sector-median multiples used when no peer set is available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MultipleBenchmarks {
    pub pe: Option<f64>,
    pub pb: Option<f64>,
    pub ps: Option<f64>,
}

impl MultipleBenchmarks {
    pub fn get(&self, kind: MultipleKind) -> Option<f64> {
        match kind {
            MultipleKind::Pe => self.pe,
            MultipleKind::Pb => self.pb,
            MultipleKind::Ps => self.ps,
        }
    }
}

/// Peer valuation multiples supplied by the market-data collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeerMultiples {
    pub ticker: String,
    pub pe: Option<f64>,
    pub pb: Option<f64>,
    pub ps: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Discount,
    Fair,
    Premium,
    /// Neither a meaningful DCF nor any multiple was available
    Undetermined,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Discount => "discount",
            Verdict::Fair => "fair",
            Verdict::Premium => "premium",
            Verdict::Undetermined => "undetermined",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuationMethod {
    Dcf,
    Multiples,
    Unavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationResult {
    pub run_id: Uuid,
    pub ticker: String,
    pub period: Period,
    /// Reporting currency of the statements
    pub currency: String,
    /// Price as quoted
    pub current_price: Option<Money>,
    /// Price in the reporting currency, used for the verdict and multiples.
    /// `None` when no FX pair connects the two currencies.
    pub reporting_price: Option<Money>,
    pub shares_outstanding: Option<f64>,
    pub scenarios: ScenarioSet,
    pub projection: Option<Projection>,
    pub sensitivity_grid: Option<SensitivityGrid>,
    pub multiples: Vec<MultipleComparison>,
    pub verdict: Verdict,
    pub method: ValuationMethod,
    pub dcf_meaningful: bool,
    pub notes: Vec<String>,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RatingCategory {
    Buy,
    Hold,
    Sell,
    #[serde(rename = "Hold-Watch")]
    HoldWatch,
}

impl fmt::Display for RatingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RatingCategory::Buy => "Buy",
            RatingCategory::Hold => "Hold",
            RatingCategory::Sell => "Sell",
            RatingCategory::HoldWatch => "Hold-Watch",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Caution,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskFlag {
    pub code: String,
    pub severity: Severity,
    pub metric: Metric,
    pub value: f64,
    pub message: String,
}

/// Terminal categorical outcome of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub run_id: Uuid,
    pub ticker: String,
    pub period: Period,
    pub category: RatingCategory,
    /// Fraction in [0, 0.95]
    pub confidence: f64,
    pub locked: bool,
    pub lock_reason: Option<String>,
    pub override_applied: bool,
    pub verdict: Verdict,
    pub risk_flags: Vec<RiskFlag>,
    pub notes: Vec<String>,
    pub rated_at: DateTime<Utc>,
}

impl Rating {
    pub fn confidence_pct(&self) -> f64 {
        (self.confidence * 100.0).round()
    }
}

/// Everything one run produced, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub run_id: Uuid,
    pub ticker: String,
    pub period: Period,
    pub composite: CompositeScore,
    pub valuation: Option<ValuationResult>,
    pub rating: Rating,
    pub created_at: DateTime<Utc>,
}
