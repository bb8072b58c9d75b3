use analysis_core::{
    DerivedMetricSet, FactMetric, Metric, MetricValue, MissingReason, NormalizedMetricSet,
};

/// Prior-period inputs for growth metrics. `None` means the period could not
/// be located, which is reported as insufficient history.
#[derive(Debug, Clone, Copy, Default)]
pub struct History<'a> {
    pub prior_year: Option<&'a NormalizedMetricSet>,
    pub prior_quarter: Option<&'a NormalizedMetricSet>,
}

const NO_HISTORY: MetricValue = MetricValue::Missing(MissingReason::InsufficientHistory);

fn prior(set: Option<&NormalizedMetricSet>, metric: FactMetric) -> MetricValue {
    set.map(|s| s.get(metric)).unwrap_or(NO_HISTORY)
}

/// Compute every scored metric from normalised facts.
///
/// Flow-over-stock ratios (ROE, ROIC) are annualised from the period length.
/// ROE divides by |equity|. D/E is capped at `max_debt_to_equity`, and
/// negative equity pins it to the cap.
pub fn derive_metrics(
    current: &NormalizedMetricSet,
    history: History<'_>,
    tax_rate: f64,
    max_debt_to_equity: f64,
) -> DerivedMetricSet {
    let get = |m: FactMetric| current.get(m);
    let annualize = current.period.annualization_factor();

    let revenue = get(FactMetric::Revenue);
    let net_income = get(FactMetric::NetIncome);
    let op_income = get(FactMetric::OperatingIncome);
    let ocf = get(FactMetric::OperatingCashFlow);
    let capex = get(FactMetric::Capex).map(f64::abs);
    let equity = get(FactMetric::TotalEquity);
    let debt = get(FactMetric::TotalDebt);

    let mut out = DerivedMetricSet::new(&current.ticker, current.period.clone(), &current.currency);

    out.set(
        Metric::RevenueYoy,
        MetricValue::growth(revenue, prior(history.prior_year, FactMetric::Revenue)),
    );
    out.set(
        Metric::RevenueQoq,
        MetricValue::growth(revenue, prior(history.prior_quarter, FactMetric::Revenue)),
    );
    out.set(
        Metric::EpsGrowth,
        MetricValue::growth(get(FactMetric::Eps), prior(history.prior_year, FactMetric::Eps)),
    );

    out.set(Metric::NetMargin, MetricValue::ratio_positive(net_income, revenue));
    out.set(Metric::OpMargin, MetricValue::ratio_positive(op_income, revenue));
    out.set(
        Metric::GrossMargin,
        MetricValue::ratio_positive(get(FactMetric::GrossProfit), revenue),
    );

    out.set(
        Metric::Roe,
        MetricValue::ratio(net_income.map(|v| v * annualize), equity.map(f64::abs)),
    );

    let invested_capital = match debt {
        MetricValue::Present(_) => equity.zip_with(debt, |e, d| e + d),
        MetricValue::Missing(_) => equity.zip_with(get(FactMetric::TotalLiabilities), |e, l| e + l),
    };
    out.set(
        Metric::Roic,
        MetricValue::ratio_positive(
            op_income.map(|v| v * (1.0 - tax_rate) * annualize),
            invested_capital,
        ),
    );

    let fcf = ocf.zip_with(capex, |o, c| o - c);
    out.set(Metric::Ocf, ocf);
    out.set(Metric::Fcf, fcf);
    out.set(Metric::FcfMargin, MetricValue::ratio_positive(fcf, revenue));
    out.set(Metric::CfoToNetIncome, MetricValue::ratio_positive(ocf, net_income));
    out.set(Metric::CapexIntensity, MetricValue::ratio_positive(capex, revenue));

    let leverage = match equity {
        MetricValue::Present(e) if e < 0.0 => debt.map(|_| max_debt_to_equity),
        _ => MetricValue::ratio(debt, equity),
    };
    out.set(Metric::DebtToEquity, leverage.map(|v| v.min(max_debt_to_equity)));
    out.set(
        Metric::CurrentRatio,
        MetricValue::ratio_positive(
            get(FactMetric::CurrentAssets),
            get(FactMetric::CurrentLiabilities),
        ),
    );
    out.set(
        Metric::PayoutRatio,
        MetricValue::ratio_positive(get(FactMetric::DividendsPaid).map(f64::abs), net_income),
    );
    out.set(
        Metric::Dilution,
        MetricValue::growth(
            get(FactMetric::SharesOutstanding),
            prior(history.prior_year, FactMetric::SharesOutstanding),
        ),
    );

    out.set(Metric::NetInterestMargin, get(FactMetric::NetInterestMargin));
    out.set(Metric::NonPerformingLoan, get(FactMetric::NonPerformingLoan));
    out.set(Metric::CapitalAdequacyRatio, get(FactMetric::CapitalAdequacyRatio));
    out.set(Metric::CostToIncome, get(FactMetric::CostToIncome));

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::Period;
    use approx::assert_relative_eq;

    fn set(period: &str, values: &[(FactMetric, f64)]) -> NormalizedMetricSet {
        let mut s = NormalizedMetricSet::new("AAPL", Period::parse(period), "USD");
        for (m, v) in values {
            s.set(*m, MetricValue::Present(*v));
        }
        s
    }

    #[test]
    fn test_revenue_yoy_example() {
        let current = set("Q3-2025", &[(FactMetric::Revenue, 45.18e9)]);
        let prior = set("Q3-2024", &[(FactMetric::Revenue, 38.4e9)]);
        let derived = derive_metrics(
            &current,
            History {
                prior_year: Some(&prior),
                prior_quarter: None,
            },
            0.21,
            10.0,
        );
        let yoy = derived.get(Metric::RevenueYoy).value().unwrap();
        assert_relative_eq!(yoy, 0.1766, epsilon = 5e-4);
        assert_eq!(
            derived.get(Metric::RevenueQoq),
            MetricValue::Missing(MissingReason::InsufficientHistory)
        );
    }

    #[test]
    fn test_zero_revenue_is_missing_not_infinite() {
        let current = set(
            "FY-2024",
            &[(FactMetric::Revenue, 0.0), (FactMetric::NetIncome, 5.0)],
        );
        let derived = derive_metrics(&current, History::default(), 0.21, 10.0);
        assert_eq!(
            derived.get(Metric::NetMargin),
            MetricValue::Missing(MissingReason::ZeroDenominator)
        );
        assert_eq!(
            derived.get(Metric::OpMargin),
            MetricValue::Missing(MissingReason::NotReported)
        );
    }

    #[test]
    fn test_fcf_uses_absolute_capex() {
        let current = set(
            "FY-2024",
            &[
                (FactMetric::Revenue, 1000.0),
                (FactMetric::OperatingCashFlow, 300.0),
                (FactMetric::Capex, -120.0),
            ],
        );
        let derived = derive_metrics(&current, History::default(), 0.21, 10.0);
        assert_eq!(derived.get(Metric::Fcf), MetricValue::Present(180.0));
        assert_relative_eq!(derived.get(Metric::FcfMargin).value().unwrap(), 0.18);
        assert_relative_eq!(derived.get(Metric::CapexIntensity).value().unwrap(), 0.12);
    }

    #[test]
    fn test_quarterly_roe_is_annualised_and_de_capped() {
        let current = set(
            "Q2-2025",
            &[
                (FactMetric::NetIncome, 25.0),
                (FactMetric::TotalEquity, 1000.0),
                (FactMetric::TotalDebt, 50_000.0),
            ],
        );
        let derived = derive_metrics(&current, History::default(), 0.21, 10.0);
        assert_relative_eq!(derived.get(Metric::Roe).value().unwrap(), 0.10);
        assert_eq!(derived.get(Metric::DebtToEquity), MetricValue::Present(10.0));
    }

    #[test]
    fn test_negative_equity_keeps_leverage_at_the_cap() {
        let current = set(
            "FY-2024",
            &[
                (FactMetric::NetIncome, -20.0),
                (FactMetric::TotalEquity, -50.0),
                (FactMetric::TotalDebt, 500.0),
            ],
        );
        let derived = derive_metrics(&current, History::default(), 0.21, 10.0);
        assert_eq!(derived.get(Metric::DebtToEquity), MetricValue::Present(10.0));
        assert_relative_eq!(derived.get(Metric::Roe).value().unwrap(), -0.4);

        // Small debt over a deep deficit still reads as maximum leverage.
        let deficit = set(
            "FY-2024",
            &[(FactMetric::TotalEquity, -5000.0), (FactMetric::TotalDebt, 50.0)],
        );
        let derived = derive_metrics(&deficit, History::default(), 0.21, 10.0);
        assert_eq!(derived.get(Metric::DebtToEquity), MetricValue::Present(10.0));
    }

    #[test]
    fn test_bank_ratios_pass_through() {
        let current = set("Q3-2025", &[(FactMetric::NetInterestMargin, 0.052)]);
        let derived = derive_metrics(&current, History::default(), 0.21, 10.0);
        assert_eq!(
            derived.get(Metric::NetInterestMargin),
            MetricValue::Present(0.052)
        );
        assert!(!derived.get(Metric::CapitalAdequacyRatio).is_present());
    }
}
