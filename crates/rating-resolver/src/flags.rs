use analysis_core::{DerivedMetricSet, Metric, RiskFlag, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Above,
    Below,
}

/// A threshold check on one derived metric. `sectors: None` applies everywhere.
#[derive(Debug, Clone, Copy)]
pub struct RiskRule {
    pub code: &'static str,
    pub metric: Metric,
    pub threshold: f64,
    pub direction: Direction,
    pub severity: Severity,
    pub message: &'static str,
    pub sectors: Option<&'static [&'static str]>,
}

impl RiskRule {
    pub fn applies_to(&self, sector: &str) -> bool {
        self.sectors.map_or(true, |s| s.contains(&sector))
    }

    pub fn triggered(&self, value: f64) -> bool {
        match self.direction {
            Direction::Above => value > self.threshold,
            Direction::Below => value < self.threshold,
        }
    }
}

pub const RISK_RULES: &[RiskRule] = &[
    RiskRule {
        code: "high_leverage",
        metric: Metric::DebtToEquity,
        threshold: 2.0,
        direction: Direction::Above,
        severity: Severity::Warning,
        message: "High leverage: D/E ratio above 2.0x",
        sectors: None,
    },
    RiskRule {
        code: "negative_fcf",
        metric: Metric::Fcf,
        threshold: 0.0,
        direction: Direction::Below,
        severity: Severity::Warning,
        message: "Negative free cash flow",
        sectors: None,
    },
    RiskRule {
        code: "declining_revenue",
        metric: Metric::RevenueYoy,
        threshold: -0.05,
        direction: Direction::Below,
        severity: Severity::Caution,
        message: "Revenue declining more than 5% YoY",
        sectors: None,
    },
    RiskRule {
        code: "low_profitability",
        metric: Metric::OpMargin,
        threshold: 0.05,
        direction: Direction::Below,
        severity: Severity::Caution,
        message: "Operating margin below 5%",
        sectors: None,
    },
    RiskRule {
        code: "low_nim",
        metric: Metric::NetInterestMargin,
        threshold: 0.02,
        direction: Direction::Below,
        severity: Severity::Warning,
        message: "Net interest margin below 2%: core lending profitability weak",
        sectors: Some(&["banking"]),
    },
    RiskRule {
        code: "high_npl",
        metric: Metric::NonPerformingLoan,
        threshold: 0.05,
        direction: Direction::Above,
        severity: Severity::Warning,
        message: "NPL ratio above 5%: credit quality deteriorating",
        sectors: Some(&["banking"]),
    },
    RiskRule {
        code: "low_car",
        metric: Metric::CapitalAdequacyRatio,
        threshold: 0.12,
        direction: Direction::Below,
        severity: Severity::Caution,
        message: "Capital adequacy below 12%: regulatory buffer thin",
        sectors: Some(&["banking"]),
    },
    RiskRule {
        code: "capex_heavy",
        metric: Metric::CapexIntensity,
        threshold: 0.30,
        direction: Direction::Above,
        severity: Severity::Caution,
        message: "Capex above 30% of revenue: heavy reinvestment cycle",
        sectors: Some(&["commodities"]),
    },
];

/// Flags raised by `rules` for a sector, most severe first.
pub fn compute_risk_flags(
    metrics: &DerivedMetricSet,
    sector: &str,
    rules: &[RiskRule],
) -> Vec<RiskFlag> {
    let mut flags: Vec<RiskFlag> = rules
        .iter()
        .filter(|r| r.applies_to(sector))
        .filter_map(|r| {
            let value = metrics.get(r.metric).value()?;
            r.triggered(value).then(|| RiskFlag {
                code: r.code.to_string(),
                severity: r.severity,
                metric: r.metric,
                value,
                message: r.message.to_string(),
            })
        })
        .collect();
    flags.sort_by_key(|f| f.severity);
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{MetricValue, Period};

    fn metrics(values: &[(Metric, f64)]) -> DerivedMetricSet {
        let mut set = DerivedMetricSet::new("BBRI", Period::parse("FY-2024"), "IDR");
        for (m, v) in values {
            set.set(*m, MetricValue::Present(*v));
        }
        set
    }

    #[test]
    fn test_bank_rules_only_fire_for_banks() {
        let set = metrics(&[
            (Metric::NonPerformingLoan, 0.07),
            (Metric::OpMargin, 0.02),
        ]);
        let bank = compute_risk_flags(&set, "banking", RISK_RULES);
        assert_eq!(bank.len(), 2);
        assert_eq!(bank[0].code, "high_npl");
        assert_eq!(bank[0].severity, Severity::Warning);

        let general = compute_risk_flags(&set, "general", RISK_RULES);
        assert_eq!(general.len(), 1);
        assert_eq!(general[0].code, "low_profitability");
    }

    #[test]
    fn test_missing_metrics_raise_nothing() {
        let flags = compute_risk_flags(&metrics(&[]), "commodities", RISK_RULES);
        assert!(flags.is_empty());
    }

    #[test]
    fn test_thresholds_are_strict() {
        let set = metrics(&[(Metric::DebtToEquity, 2.0), (Metric::Fcf, 0.0)]);
        assert!(compute_risk_flags(&set, "general", RISK_RULES).is_empty());
    }
}
