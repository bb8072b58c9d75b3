use analysis_core::{
    FactKind, FactMetric, FinancialFact, FxTable, MetricValue, MissingReason, NormalizedMetricSet,
    Period, RawValue, Scale,
};
use rust_decimal::prelude::ToPrimitive;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Parse a raw extracted value. Returns the number and whether it was
/// written as a percentage (`"12.5%"`).
///
/// Accepts thousands separators and accounting negatives (`"(1,234)"`).
/// Anything else becomes `Missing`, never zero.
pub fn parse_raw_value(raw: &RawValue) -> (MetricValue, bool) {
    match raw {
        RawValue::Number(d) => (d.to_f64().into(), false),
        RawValue::Float(f) => (MetricValue::from_f64(*f), false),
        RawValue::Text(text) => parse_text(text),
    }
}

fn parse_text(text: &str) -> (MetricValue, bool) {
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();
    if matches!(lower.as_str(), "" | "-" | "--" | "n/a" | "na" | "nm" | "null" | "none") {
        return (MetricValue::Missing(MissingReason::NotReported), false);
    }

    let mut s = trimmed.to_string();
    let percent = s.ends_with('%');
    if percent {
        s.pop();
    }
    let negative = s.starts_with('(') && s.ends_with(')');
    if negative {
        s = s[1..s.len() - 1].to_string();
    }
    let cleaned: String = s
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | ' ' | '$'))
        .collect();

    match cleaned.parse::<f64>() {
        Ok(v) => {
            let v = if negative { -v.abs() } else { v };
            (MetricValue::from_f64(v), percent)
        }
        Err(_) => (MetricValue::Missing(MissingReason::InvalidValue), false),
    }
}

/// Only the latest extraction of each metric for `(ticker, period)`.
/// Later `extracted_at` wins; on a tie the later entry wins.
pub fn latest_facts<'a>(
    facts: &'a [FinancialFact],
    ticker: &str,
    period: &Period,
) -> Vec<&'a FinancialFact> {
    let mut latest: BTreeMap<FactMetric, &FinancialFact> = BTreeMap::new();
    for fact in facts
        .iter()
        .filter(|f| f.ticker.eq_ignore_ascii_case(ticker) && Period::parse(&f.period) == *period)
    {
        match latest.get(&fact.metric) {
            Some(current) if fact.extracted_at < current.extracted_at => {}
            _ => {
                latest.insert(fact.metric, fact);
            }
        }
    }
    latest.into_values().collect()
}

/// Most common currency among monetary facts; first seen wins a tie.
pub fn reporting_currency(facts: &[&FinancialFact]) -> Option<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for fact in facts.iter().filter(|f| {
        f.metric.kind() == FactKind::Monetary && !f.currency.trim().is_empty()
    }) {
        let ccy = fact.currency.to_uppercase();
        match counts.iter_mut().find(|(c, _)| *c == ccy) {
            Some((_, n)) => *n += 1,
            None => counts.push((ccy, 1)),
        }
    }
    let mut best: Option<(String, usize)> = None;
    for (ccy, n) in counts {
        if best.as_ref().map_or(true, |(_, b)| n > *b) {
            best = Some((ccy, n));
        }
    }
    best.map(|(c, _)| c)
}

/// Converts raw facts into one currency and absolute units.
#[derive(Debug, Clone, Default)]
pub struct UnitNormalizer {
    fx: FxTable,
}

impl UnitNormalizer {
    pub fn new(fx: FxTable) -> Self {
        Self { fx }
    }

    /// Build the metric set for `(ticker, period)`. When `currency` is not
    /// given, the dominant currency of the monetary facts is used.
    pub fn normalize(
        &self,
        facts: &[FinancialFact],
        ticker: &str,
        period: &Period,
        currency: Option<&str>,
    ) -> NormalizedMetricSet {
        let latest = latest_facts(facts, ticker, period);
        let currency = currency
            .map(str::to_uppercase)
            .or_else(|| reporting_currency(&latest))
            .unwrap_or_else(|| "USD".to_string());

        let mut set = NormalizedMetricSet::new(ticker, period.clone(), &currency);
        for fact in latest {
            let value = self.normalize_fact(fact, &currency);
            if let MetricValue::Missing(reason) = value {
                debug!(
                    ticker = %set.ticker,
                    period = %period,
                    metric = %fact.metric,
                    %reason,
                    "fact dropped during normalisation"
                );
            }
            set.set(fact.metric, value);
        }
        set
    }

    pub fn normalize_fact(&self, fact: &FinancialFact, currency: &str) -> MetricValue {
        let (value, stated_percent) = parse_raw_value(&fact.value);
        let MetricValue::Present(raw) = value else {
            return value;
        };

        match fact.metric.kind() {
            FactKind::Ratio => {
                let unit = fact.unit.to_lowercase();
                let percent = stated_percent
                    || unit.contains('%')
                    || unit.contains("percent")
                    || unit.contains("pct")
                    || raw.abs() >= 1.0;
                MetricValue::from_f64(if percent { raw / 100.0 } else { raw })
            }
            FactKind::Count => MetricValue::from_f64(raw * self.scale_of(fact).factor()),
            FactKind::Monetary => {
                let scaled = raw * self.scale_of(fact).factor();
                self.convert(scaled, fact, currency)
            }
            FactKind::PerShare => self.convert(raw, fact, currency),
        }
    }

    fn scale_of(&self, fact: &FinancialFact) -> Scale {
        fact.scale
            .or_else(|| Scale::from_unit(&fact.unit))
            .unwrap_or(Scale::Units)
    }

    fn convert(&self, amount: f64, fact: &FinancialFact, currency: &str) -> MetricValue {
        let from = fact.currency.trim();
        if from.is_empty() {
            return MetricValue::from_f64(amount);
        }
        match self.fx.rate(from, currency) {
            Some(rate) => MetricValue::from_f64(amount * rate),
            None => {
                warn!(
                    ticker = %fact.ticker,
                    metric = %fact.metric,
                    from = %from,
                    to = %currency,
                    "no FX pair, value left out"
                );
                MetricValue::Missing(MissingReason::CurrencyMismatch)
            }
        }
    }
}
