use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::facts::FactMetric;
use crate::period::Period;

/// Why a metric has no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingReason {
    NotReported,
    InvalidValue,
    ZeroDenominator,
    /// Denominator exists but the ratio is meaningless for it (e.g. payout on a loss)
    NonPositiveBase,
    CurrencyMismatch,
    InsufficientHistory,
}

impl fmt::Display for MissingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MissingReason::NotReported => "not reported",
            MissingReason::InvalidValue => "invalid value",
            MissingReason::ZeroDenominator => "zero denominator",
            MissingReason::NonPositiveBase => "non-positive base",
            MissingReason::CurrencyMismatch => "currency mismatch",
            MissingReason::InsufficientHistory => "insufficient history",
        };
        f.write_str(s)
    }
}

/// Tri-state numeric: a finite value or an explicit gap. Gaps propagate through
/// every derivation and are never read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricValue {
    Present(f64),
    Missing(MissingReason),
}

impl MetricValue {
    /// Wrap a float, rejecting NaN and infinities.
    pub fn from_f64(value: f64) -> Self {
        if value.is_finite() {
            MetricValue::Present(value)
        } else {
            MetricValue::Missing(MissingReason::InvalidValue)
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            MetricValue::Present(v) => Some(*v),
            MetricValue::Missing(_) => None,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, MetricValue::Present(_))
    }

    pub fn missing_reason(&self) -> Option<MissingReason> {
        match self {
            MetricValue::Present(_) => None,
            MetricValue::Missing(r) => Some(*r),
        }
    }

    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Self {
        match self {
            MetricValue::Present(v) => MetricValue::from_f64(f(v)),
            missing => missing,
        }
    }

    /// Combine two values; the first gap wins.
    pub fn zip_with(self, other: MetricValue, f: impl FnOnce(f64, f64) -> f64) -> Self {
        match (self, other) {
            (MetricValue::Present(a), MetricValue::Present(b)) => MetricValue::from_f64(f(a, b)),
            (MetricValue::Missing(r), _) | (_, MetricValue::Missing(r)) => MetricValue::Missing(r),
        }
    }

    /// `num / den`, with a zero denominator reported as a gap.
    pub fn ratio(num: MetricValue, den: MetricValue) -> Self {
        match (num, den) {
            (MetricValue::Missing(r), _) | (_, MetricValue::Missing(r)) => MetricValue::Missing(r),
            (_, MetricValue::Present(d)) if d == 0.0 => {
                MetricValue::Missing(MissingReason::ZeroDenominator)
            }
            (MetricValue::Present(n), MetricValue::Present(d)) => MetricValue::from_f64(n / d),
        }
    }

    /// `num / den` for ratios that only make sense over a positive base.
    pub fn ratio_positive(num: MetricValue, den: MetricValue) -> Self {
        match den {
            MetricValue::Present(d) if d < 0.0 => MetricValue::Missing(MissingReason::NonPositiveBase),
            _ => MetricValue::ratio(num, den),
        }
    }

    /// `(current - prior) / |prior|`.
    pub fn growth(current: MetricValue, prior: MetricValue) -> Self {
        let change = current.zip_with(prior, |c, p| c - p);
        MetricValue::ratio(change, prior.map(f64::abs))
    }
}

impl From<Option<f64>> for MetricValue {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) => MetricValue::from_f64(v),
            None => MetricValue::Missing(MissingReason::NotReported),
        }
    }
}

/// Raw facts for one (ticker, period), in one currency and absolute units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedMetricSet {
    pub ticker: String,
    pub period: Period,
    pub currency: String,
    values: BTreeMap<FactMetric, MetricValue>,
}

impl NormalizedMetricSet {
    pub fn new(ticker: &str, period: Period, currency: &str) -> Self {
        Self {
            ticker: ticker.to_uppercase(),
            period,
            currency: currency.to_uppercase(),
            values: BTreeMap::new(),
        }
    }

    pub fn get(&self, metric: FactMetric) -> MetricValue {
        self.values
            .get(&metric)
            .copied()
            .unwrap_or(MetricValue::Missing(MissingReason::NotReported))
    }

    /// Store a value; non-finite input is stored as a gap.
    pub fn set(&mut self, metric: FactMetric, value: MetricValue) {
        let value = match value {
            MetricValue::Present(v) => MetricValue::from_f64(v),
            missing => missing,
        };
        self.values.insert(metric, value);
    }

    pub fn present_count(&self) -> usize {
        self.values.values().filter(|v| v.is_present()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FactMetric, MetricValue)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }

    pub fn is_empty(&self) -> bool {
        self.present_count() == 0
    }
}

/// Scored metrics, raw or derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    RevenueYoy,
    RevenueQoq,
    EpsGrowth,
    NetMargin,
    OpMargin,
    GrossMargin,
    Roe,
    Roic,
    Ocf,
    Fcf,
    FcfMargin,
    CfoToNetIncome,
    CapexIntensity,
    DebtToEquity,
    CurrentRatio,
    PayoutRatio,
    Dilution,
    NetInterestMargin,
    NonPerformingLoan,
    CapitalAdequacyRatio,
    CostToIncome,
}

/// Display format for a metric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricFormat {
    Percent,
    Ratio,
    /// Signed amount where only the sign is scored
    Sign,
}

impl Metric {
    pub const ALL: [Metric; 21] = [
        Metric::RevenueYoy,
        Metric::RevenueQoq,
        Metric::EpsGrowth,
        Metric::NetMargin,
        Metric::OpMargin,
        Metric::GrossMargin,
        Metric::Roe,
        Metric::Roic,
        Metric::Ocf,
        Metric::Fcf,
        Metric::FcfMargin,
        Metric::CfoToNetIncome,
        Metric::CapexIntensity,
        Metric::DebtToEquity,
        Metric::CurrentRatio,
        Metric::PayoutRatio,
        Metric::Dilution,
        Metric::NetInterestMargin,
        Metric::NonPerformingLoan,
        Metric::CapitalAdequacyRatio,
        Metric::CostToIncome,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::RevenueYoy => "revenue_yoy",
            Metric::RevenueQoq => "revenue_qoq",
            Metric::EpsGrowth => "eps_growth",
            Metric::NetMargin => "net_margin",
            Metric::OpMargin => "op_margin",
            Metric::GrossMargin => "gross_margin",
            Metric::Roe => "roe",
            Metric::Roic => "roic",
            Metric::Ocf => "ocf",
            Metric::Fcf => "fcf",
            Metric::FcfMargin => "fcf_margin",
            Metric::CfoToNetIncome => "cfo_to_net_income",
            Metric::CapexIntensity => "capex_intensity",
            Metric::DebtToEquity => "debt_to_equity",
            Metric::CurrentRatio => "current_ratio",
            Metric::PayoutRatio => "payout_ratio",
            Metric::Dilution => "dilution",
            Metric::NetInterestMargin => "net_interest_margin",
            Metric::NonPerformingLoan => "non_performing_loan",
            Metric::CapitalAdequacyRatio => "capital_adequacy_ratio",
            Metric::CostToIncome => "cost_to_income",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Metric::RevenueYoy => "Revenue Growth (YoY)",
            Metric::RevenueQoq => "Revenue Growth (QoQ)",
            Metric::EpsGrowth => "EPS Growth (YoY)",
            Metric::NetMargin => "Net Profit Margin",
            Metric::OpMargin => "Operating Margin",
            Metric::GrossMargin => "Gross Margin",
            Metric::Roe => "Return on Equity (ROE)",
            Metric::Roic => "Return on Invested Capital (ROIC)",
            Metric::Ocf => "Operating Cash Flow",
            Metric::Fcf => "Free Cash Flow (FCF)",
            Metric::FcfMargin => "FCF Margin",
            Metric::CfoToNetIncome => "Cash Conversion (OCF / Net Income)",
            Metric::CapexIntensity => "Capex Intensity",
            Metric::DebtToEquity => "Debt-to-Equity Ratio",
            Metric::CurrentRatio => "Current Ratio",
            Metric::PayoutRatio => "Dividend Payout Ratio",
            Metric::Dilution => "Share Dilution (YoY)",
            Metric::NetInterestMargin => "Net Interest Margin (NIM)",
            Metric::NonPerformingLoan => "Non-Performing Loan Ratio (NPL)",
            Metric::CapitalAdequacyRatio => "Capital Adequacy Ratio (CAR)",
            Metric::CostToIncome => "Cost-to-Income Ratio",
        }
    }

    pub fn format(&self) -> MetricFormat {
        match self {
            Metric::Ocf | Metric::Fcf => MetricFormat::Sign,
            Metric::DebtToEquity | Metric::CurrentRatio | Metric::CfoToNetIncome => {
                MetricFormat::Ratio
            }
            _ => MetricFormat::Percent,
        }
    }

    pub fn format_value(&self, value: f64) -> String {
        match self.format() {
            MetricFormat::Percent => format!("{:.1}%", value * 100.0),
            MetricFormat::Ratio => format!("{:.2}x", value),
            MetricFormat::Sign => {
                if value > 0.0 {
                    "Positive".to_string()
                } else {
                    "Negative".to_string()
                }
            }
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        let key = match key.as_str() {
            "revenue_growth" => "revenue_yoy",
            "operating_margin" => "op_margin",
            "nim" => "net_interest_margin",
            "npl" => "non_performing_loan",
            "car" => "capital_adequacy_ratio",
            other => other,
        };
        Metric::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == key)
            .ok_or_else(|| format!("unknown metric '{s}'"))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scored metrics for one (ticker, period), derived from normalized facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivedMetricSet {
    pub ticker: String,
    pub period: Period,
    pub currency: String,
    values: BTreeMap<Metric, MetricValue>,
}

impl DerivedMetricSet {
    pub fn new(ticker: &str, period: Period, currency: &str) -> Self {
        Self {
            ticker: ticker.to_uppercase(),
            period,
            currency: currency.to_uppercase(),
            values: BTreeMap::new(),
        }
    }

    pub fn get(&self, metric: Metric) -> MetricValue {
        self.values
            .get(&metric)
            .copied()
            .unwrap_or(MetricValue::Missing(MissingReason::NotReported))
    }

    pub fn set(&mut self, metric: Metric, value: MetricValue) {
        let value = match value {
            MetricValue::Present(v) => MetricValue::from_f64(v),
            missing => missing,
        };
        self.values.insert(metric, value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, MetricValue)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }

    pub fn available(&self) -> Vec<Metric> {
        self.iter()
            .filter(|(_, v)| v.is_present())
            .map(|(m, _)| m)
            .collect()
    }
}

/// The five named factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    Quality,
    Growth,
    BalanceSheet,
    Cashflow,
    Shareholder,
}

impl Factor {
    pub const ALL: [Factor; 5] = [
        Factor::Quality,
        Factor::Growth,
        Factor::BalanceSheet,
        Factor::Cashflow,
        Factor::Shareholder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Factor::Quality => "quality",
            Factor::Growth => "growth",
            Factor::BalanceSheet => "balance_sheet",
            Factor::Cashflow => "cashflow",
            Factor::Shareholder => "shareholder",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Factor::Quality => "Profitability & stability",
            Factor::Growth => "Revenue & earnings momentum",
            Factor::BalanceSheet => "Leverage, liquidity, solvency",
            Factor::Cashflow => "Cash generation & efficiency",
            Factor::Shareholder => "Capital allocation & returns",
        }
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_missing_propagates() {
        let rev = MetricValue::Present(100.0);
        let ni = MetricValue::Missing(MissingReason::NotReported);
        assert_eq!(
            MetricValue::ratio(ni, rev),
            MetricValue::Missing(MissingReason::NotReported)
        );
        assert_eq!(
            MetricValue::ratio(rev, MetricValue::Present(0.0)),
            MetricValue::Missing(MissingReason::ZeroDenominator)
        );
    }

    #[test]
    fn test_non_finite_is_invalid() {
        assert_eq!(
            MetricValue::from_f64(f64::NAN),
            MetricValue::Missing(MissingReason::InvalidValue)
        );
        assert_eq!(
            MetricValue::Present(1.0).map(|v| v / 0.0),
            MetricValue::Missing(MissingReason::InvalidValue)
        );
    }

    #[test]
    fn test_growth_uses_absolute_prior() {
        let g = MetricValue::growth(MetricValue::Present(45.18e9), MetricValue::Present(38.4e9));
        assert_relative_eq!(g.value().unwrap(), 0.17656, epsilon = 1e-4);

        let recovering = MetricValue::growth(MetricValue::Present(-5.0), MetricValue::Present(-10.0));
        assert_relative_eq!(recovering.value().unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_set_rejects_nan() {
        let mut set = NormalizedMetricSet::new("abc", Period::parse("Q1-2025"), "usd");
        set.set(FactMetric::Revenue, MetricValue::Present(f64::INFINITY));
        assert!(!set.get(FactMetric::Revenue).is_present());
        assert!(set.is_empty());
        assert_eq!(set.currency, "USD");
    }

    #[test]
    fn test_metric_parse_aliases() {
        assert_eq!("revenue_growth".parse::<Metric>(), Ok(Metric::RevenueYoy));
        assert_eq!("NPL".parse::<Metric>(), Ok(Metric::NonPerformingLoan));
        assert!("ebitda".parse::<Metric>().is_err());
    }
}
