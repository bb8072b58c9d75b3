use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::AnalysisError;

/// Standard line items extracted from disclosures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactMetric {
    Revenue,
    GrossProfit,
    OperatingIncome,
    NetIncome,
    OperatingCashFlow,
    Capex,
    TotalAssets,
    TotalLiabilities,
    TotalEquity,
    TotalDebt,
    CurrentAssets,
    CurrentLiabilities,
    Eps,
    SharesOutstanding,
    DividendsPaid,
    NetInterestMargin,
    NonPerformingLoan,
    CapitalAdequacyRatio,
    CostToIncome,
}

/// How a line item is measured, which decides whether scale and currency apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactKind {
    /// Currency amount, scaled (revenue, debt, ...)
    Monetary,
    /// Currency amount per share, never scaled
    PerShare,
    /// Unitless count, scaled (share count)
    Count,
    /// Fraction; percent inputs are converted
    Ratio,
}

impl FactMetric {
    pub const ALL: [FactMetric; 19] = [
        FactMetric::Revenue,
        FactMetric::GrossProfit,
        FactMetric::OperatingIncome,
        FactMetric::NetIncome,
        FactMetric::OperatingCashFlow,
        FactMetric::Capex,
        FactMetric::TotalAssets,
        FactMetric::TotalLiabilities,
        FactMetric::TotalEquity,
        FactMetric::TotalDebt,
        FactMetric::CurrentAssets,
        FactMetric::CurrentLiabilities,
        FactMetric::Eps,
        FactMetric::SharesOutstanding,
        FactMetric::DividendsPaid,
        FactMetric::NetInterestMargin,
        FactMetric::NonPerformingLoan,
        FactMetric::CapitalAdequacyRatio,
        FactMetric::CostToIncome,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FactMetric::Revenue => "revenue",
            FactMetric::GrossProfit => "gross_profit",
            FactMetric::OperatingIncome => "operating_income",
            FactMetric::NetIncome => "net_income",
            FactMetric::OperatingCashFlow => "operating_cash_flow",
            FactMetric::Capex => "capex",
            FactMetric::TotalAssets => "total_assets",
            FactMetric::TotalLiabilities => "total_liabilities",
            FactMetric::TotalEquity => "total_equity",
            FactMetric::TotalDebt => "total_debt",
            FactMetric::CurrentAssets => "current_assets",
            FactMetric::CurrentLiabilities => "current_liabilities",
            FactMetric::Eps => "eps",
            FactMetric::SharesOutstanding => "shares_outstanding",
            FactMetric::DividendsPaid => "dividends_paid",
            FactMetric::NetInterestMargin => "net_interest_margin",
            FactMetric::NonPerformingLoan => "non_performing_loan",
            FactMetric::CapitalAdequacyRatio => "capital_adequacy_ratio",
            FactMetric::CostToIncome => "cost_to_income",
        }
    }

    pub fn kind(&self) -> FactKind {
        match self {
            FactMetric::Eps => FactKind::PerShare,
            FactMetric::SharesOutstanding => FactKind::Count,
            FactMetric::NetInterestMargin
            | FactMetric::NonPerformingLoan
            | FactMetric::CapitalAdequacyRatio
            | FactMetric::CostToIncome => FactKind::Ratio,
            _ => FactKind::Monetary,
        }
    }
}

impl FromStr for FactMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace([' ', '-'], "_");
        let metric = match key.as_str() {
            "earnings_per_share" => FactMetric::Eps,
            "nim" => FactMetric::NetInterestMargin,
            "npl" => FactMetric::NonPerformingLoan,
            "car" => FactMetric::CapitalAdequacyRatio,
            "cir" | "bopo" => FactMetric::CostToIncome,
            "ocf" | "cash_from_operations" => FactMetric::OperatingCashFlow,
            other => {
                return FactMetric::ALL
                    .iter()
                    .copied()
                    .find(|m| m.as_str() == other)
                    .ok_or_else(|| format!("unknown fact metric '{s}'"));
            }
        };
        Ok(metric)
    }
}

impl fmt::Display for FactMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared magnitude of a reported figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    Units,
    Thousands,
    Millions,
    Billions,
    Trillions,
}

impl Scale {
    pub fn factor(&self) -> f64 {
        match self {
            Scale::Units => 1.0,
            Scale::Thousands => 1e3,
            Scale::Millions => 1e6,
            Scale::Billions => 1e9,
            Scale::Trillions => 1e12,
        }
    }

    /// Recognise the scale stated in a unit string such as `"USD millions"`,
    /// `"in thousands"`, `"Rp miliar"` or `"B"`.
    pub fn from_unit(unit: &str) -> Option<Scale> {
        let unit = unit.trim().to_lowercase();
        if unit.is_empty() {
            return Some(Scale::Units);
        }
        for token in unit.split(|c: char| c.is_whitespace() || c == '_' || c == ',') {
            let scale = match token {
                "1" | "unit" | "units" | "ones" => Scale::Units,
                "k" | "thousand" | "thousands" | "ribu" | "ribuan" => Scale::Thousands,
                "m" | "mn" | "mm" | "million" | "millions" | "juta" | "jutaan" => Scale::Millions,
                "b" | "bn" | "billion" | "billions" | "miliar" | "milyar" => Scale::Billions,
                "t" | "tn" | "trillion" | "trillions" | "triliun" => Scale::Trillions,
                _ => continue,
            };
            return Some(scale);
        }
        None
    }
}

/// A raw value as it arrives from extraction: ideally a decimal, sometimes
/// still text (`"1,234.5"`, `"(12)"`, `"n/a"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(Decimal),
    Float(f64),
    Text(String),
}

impl From<Decimal> for RawValue {
    fn from(value: Decimal) -> Self {
        RawValue::Number(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Float(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

/// One extracted line item. Immutable once written; for a given
/// (ticker, period, metric) the latest extraction wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialFact {
    pub ticker: String,
    pub period: String,
    pub metric: FactMetric,
    pub value: RawValue,
    #[serde(default)]
    pub unit: String,
    /// Explicit scale hint; takes precedence over whatever `unit` says.
    #[serde(default)]
    pub scale: Option<Scale>,
    pub currency: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub extracted_at: Option<DateTime<Utc>>,
}

impl FinancialFact {
    pub fn new(
        ticker: &str,
        period: &str,
        metric: FactMetric,
        value: impl Into<RawValue>,
        currency: &str,
    ) -> Self {
        Self {
            ticker: ticker.to_uppercase(),
            period: period.to_string(),
            metric,
            value: value.into(),
            unit: String::new(),
            scale: None,
            currency: currency.to_uppercase(),
            source_url: None,
            extracted_at: None,
        }
    }

    pub fn with_scale(mut self, scale: Scale) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = unit.to_string();
        self
    }

    pub fn extracted_at(mut self, at: DateTime<Utc>) -> Self {
        self.extracted_at = Some(at);
        self
    }
}

/// An amount tagged with its currency. Amounts in different currencies are
/// never combined arithmetically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self {
        Self {
            amount,
            currency: currency.to_uppercase(),
        }
    }
}

impl Money {
    /// The same amount in `currency`, or `None` without an FX pair.
    pub fn convert_to(&self, currency: &str, fx: &FxTable) -> Option<Money> {
        if self.currency.eq_ignore_ascii_case(currency) {
            return Some(self.clone());
        }
        let rate = fx.rate(&self.currency, currency)?;
        let amount = Decimal::from_f64(self.amount.to_f64()? * rate)?;
        Some(Money::new(amount, currency))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.currency, self.amount.round_dp(2))
    }
}

/// Explicit FX pairs. Amounts in a currency with no defined pair are never
/// converted.
#[derive(Debug, Clone, Default)]
pub struct FxTable {
    rates: HashMap<(String, String), f64>,
}

impl FxTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `"USD/IDR=16000,EUR/USD=1.08"`. Empty input is an empty table.
    pub fn parse(spec: &str) -> Result<Self, AnalysisError> {
        let mut table = Self::new();
        for pair in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let bad = || AnalysisError::ConfigurationError(format!("invalid FX pair {pair:?}"));
            let (currencies, rate) = pair.split_once('=').ok_or_else(bad)?;
            let (from, to) = currencies.split_once('/').ok_or_else(bad)?;
            let rate: f64 = rate.trim().parse().map_err(|_| bad())?;
            if !(rate.is_finite() && rate > 0.0) {
                return Err(bad());
            }
            table = table.with_rate(from.trim(), to.trim(), rate);
        }
        Ok(table)
    }

    /// `1 from = rate to`.
    pub fn with_rate(mut self, from: &str, to: &str, rate: f64) -> Self {
        if rate.is_finite() && rate > 0.0 {
            self.rates
                .insert((from.to_uppercase(), to.to_uppercase()), rate);
        }
        self
    }

    pub fn rate(&self, from: &str, to: &str) -> Option<f64> {
        let (from, to) = (from.to_uppercase(), to.to_uppercase());
        if from == to {
            return Some(1.0);
        }
        if let Some(r) = self.rates.get(&(from.clone(), to.clone())) {
            return Some(*r);
        }
        self.rates.get(&(to, from)).map(|r| 1.0 / r)
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_from_unit() {
        assert_eq!(Scale::from_unit("USD millions"), Some(Scale::Millions));
        assert_eq!(Scale::from_unit("in thousands"), Some(Scale::Thousands));
        assert_eq!(Scale::from_unit("Rp miliar"), Some(Scale::Billions));
        assert_eq!(Scale::from_unit("B"), Some(Scale::Billions));
        assert_eq!(Scale::from_unit(""), Some(Scale::Units));
        assert_eq!(Scale::from_unit("furlongs"), None);
    }

    #[test]
    fn test_metric_aliases() {
        assert_eq!("nim".parse::<FactMetric>(), Ok(FactMetric::NetInterestMargin));
        assert_eq!("Total Equity".parse::<FactMetric>(), Ok(FactMetric::TotalEquity));
        assert!("ebitda_adjusted".parse::<FactMetric>().is_err());
    }

    #[test]
    fn test_raw_value_deserializes_numbers_and_text() {
        let fact: FinancialFact = serde_json::from_str(
            r#"{"ticker":"AAPL","period":"Q3-2025","metric":"revenue","value":45.18,
                "unit":"USD billions","currency":"USD"}"#,
        )
        .unwrap();
        assert!(matches!(fact.value, RawValue::Number(_)));

        let fact: FinancialFact = serde_json::from_str(
            r#"{"ticker":"AAPL","period":"Q3-2025","metric":"capex","value":"(1,234)",
                "currency":"USD"}"#,
        )
        .unwrap();
        assert!(matches!(fact.value, RawValue::Text(_)));
        assert!(fact.scale.is_none());
    }

    #[test]
    fn test_money_converts_only_through_a_pair() {
        let price = Money::new(Decimal::new(9500, 0), "idr");
        let fx = FxTable::parse("USD/IDR=16000").unwrap();

        let usd = price.convert_to("USD", &fx).unwrap();
        assert_eq!(usd.currency, "USD");
        assert!((usd.amount.to_f64().unwrap() - 0.59375).abs() < 1e-9);
        assert_eq!(price.convert_to("IDR", &FxTable::new()), Some(price.clone()));
        assert!(price.convert_to("EUR", &fx).is_none());
        assert_eq!(price.to_string(), "IDR 9500");
    }

    #[test]
    fn test_fx_table_parse() {
        let fx = FxTable::parse(" usd/idr=16000, EUR/USD = 1.08 ").unwrap();
        assert_eq!(fx.rate("USD", "IDR"), Some(16000.0));
        assert_eq!(fx.rate("IDR", "USD"), Some(1.0 / 16000.0));
        assert_eq!(fx.rate("eur", "usd"), Some(1.08));
        assert!(FxTable::parse("").unwrap().is_empty());
        assert!(FxTable::parse("USD-IDR=16000").is_err());
        assert!(FxTable::parse("USD/IDR=-1").is_err());
    }
}
