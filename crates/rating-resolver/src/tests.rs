#[cfg(test)]
mod rating_tests {
    use crate::{premium_growth_override, rate, score_signal, RatingPolicy};
    use analysis_core::{
        CompositeScore, CoverageReport, DerivedMetricSet, Factor, FactorScore, Metric,
        MetricValue, Period, RatingCategory, RunContext, ScenarioSet, ScenarioValuation,
        Scenario, Severity, ValuationMethod, ValuationResult, Verdict,
    };
    use approx::assert_relative_eq;
    use chrono::Utc;

    const LOCKED_HOLD: &str = "Coverage contract failed: 0/4 required metrics (minimum 1). \
         Missing: net_interest_margin, non_performing_loan, capital_adequacy_ratio, \
         cost_to_income. Rating locked to Hold.";

    fn factor(factor: Factor, score: f64) -> FactorScore {
        FactorScore {
            factor,
            score,
            available: if score.is_nan() { 0 } else { 2 },
            required: 2,
            sub_scores: vec![],
        }
    }

    fn composite(sector: &str, score: f64, gate_passed: bool) -> CompositeScore {
        let ctx = RunContext::new();
        let required = vec![
            Metric::NetInterestMargin,
            Metric::NonPerformingLoan,
            Metric::CapitalAdequacyRatio,
            Metric::CostToIncome,
        ];
        let message = if gate_passed {
            "Coverage contract passed: 4/4 required metrics (minimum 1).".to_string()
        } else {
            LOCKED_HOLD.to_string()
        };
        CompositeScore {
            run_id: ctx.run_id,
            ticker: "BBCA".to_string(),
            period: Period::parse("Q3-2025"),
            sector: sector.to_string(),
            currency: "IDR".to_string(),
            score,
            factor_composite: score,
            factors: vec![
                factor(Factor::Quality, 75.0),
                factor(Factor::Growth, 60.0),
                factor(Factor::BalanceSheet, 70.0),
                factor(Factor::Cashflow, 65.0),
                factor(Factor::Shareholder, 50.0),
            ],
            drivers: vec![],
            missing: vec![],
            weight_coverage: 1.0,
            metric_coverage: 0.9,
            coverage: CoverageReport {
                sector: sector.to_string(),
                found_required: if gate_passed { required.clone() } else { vec![] },
                missing_required: if gate_passed { vec![] } else { required.clone() },
                required,
                missing_recommended: vec![],
                min_required: 1,
                passed: gate_passed,
                confidence_penalty: if gate_passed { 0.0 } else { 0.15 },
                message,
            },
            coverage_gate_passed: gate_passed,
            metrics: DerivedMetricSet::new("BBCA", Period::parse("Q3-2025"), "IDR"),
            notes: vec![],
            computed_at: ctx.as_of,
        }
    }

    fn valuation(verdict: Verdict) -> ValuationResult {
        let scenario = |scenario| ScenarioValuation {
            scenario,
            wacc: 0.10,
            terminal_growth: 0.025,
            revenue_growth: 0.08,
            intrinsic_value: Some(100.0),
            upside_pct: Some(0.0),
        };
        ValuationResult {
            run_id: uuid::Uuid::new_v4(),
            ticker: "BBCA".to_string(),
            period: Period::parse("Q3-2025"),
            currency: "IDR".to_string(),
            current_price: None,
            reporting_price: None,
            shares_outstanding: Some(1e9),
            scenarios: ScenarioSet {
                bear: scenario(Scenario::Bear),
                base: scenario(Scenario::Base),
                bull: scenario(Scenario::Bull),
            },
            projection: None,
            sensitivity_grid: None,
            multiples: vec![],
            verdict,
            method: ValuationMethod::Dcf,
            dcf_meaningful: true,
            notes: vec![],
            computed_at: Utc::now(),
        }
    }

    #[test]
    fn test_failed_gate_forces_hold_regardless_of_score() {
        let policy = RatingPolicy::default();
        let c = composite("banking", 71.4, false);
        let rating = rate(&RunContext::new(), &c, Some(&valuation(Verdict::Discount)), &policy);

        assert_eq!(rating.category, RatingCategory::Hold);
        assert!(rating.locked);
        assert!(rating.confidence <= policy.locked_confidence_cap);
        assert_eq!(rating.lock_reason.as_deref(), Some(LOCKED_HOLD));
    }

    #[test]
    fn test_score_bands() {
        let policy = RatingPolicy::default();
        assert_eq!(score_signal(65.0, &policy), RatingCategory::Buy);
        assert_eq!(score_signal(64.9, &policy), RatingCategory::Hold);
        assert_eq!(score_signal(45.0, &policy), RatingCategory::Hold);
        assert_eq!(score_signal(44.9, &policy), RatingCategory::Sell);
        assert_eq!(score_signal(f64::NAN, &policy), RatingCategory::HoldWatch);
    }

    #[test]
    fn test_premium_downgrades_buy_without_override() {
        let policy = RatingPolicy::default();
        let c = composite("general", 71.4, true);
        assert!(!premium_growth_override(&c, &policy));

        let rating = rate(&RunContext::new(), &c, Some(&valuation(Verdict::Premium)), &policy);
        assert_eq!(rating.category, RatingCategory::Hold);
        assert!(!rating.override_applied);
        assert!(rating.notes.iter().any(|n| n.starts_with("Buy downgraded")));
    }

    #[test]
    fn test_override_keeps_buy_and_says_so() {
        let policy = RatingPolicy::default();
        let mut c = composite("tech", 80.0, true);
        c.factors[1] = factor(Factor::Growth, 85.0);
        assert!(premium_growth_override(&c, &policy));

        let rating = rate(&RunContext::new(), &c, Some(&valuation(Verdict::Premium)), &policy);
        assert_eq!(rating.category, RatingCategory::Buy);
        assert!(rating.override_applied);
        assert!(rating.notes.iter().any(|n| n.starts_with("Buy kept despite premium")));
    }

    #[test]
    fn test_override_needs_scored_factors() {
        let policy = RatingPolicy::default();
        let mut c = composite("tech", 80.0, true);
        c.factors[0] = factor(Factor::Quality, f64::NAN);
        c.factors[1] = factor(Factor::Growth, 95.0);
        assert!(!premium_growth_override(&c, &policy));
    }

    #[test]
    fn test_sell_on_thin_data_is_hold_watch() {
        let policy = RatingPolicy::default();
        let mut c = composite("general", 30.0, true);
        c.metric_coverage = 0.3;
        let rating = rate(&RunContext::new(), &c, None, &policy);
        assert_eq!(rating.category, RatingCategory::HoldWatch);

        c.metric_coverage = 0.8;
        let rating = rate(&RunContext::new(), &c, None, &policy);
        assert_eq!(rating.category, RatingCategory::Sell);
    }

    #[test]
    fn test_nan_score_is_hold_watch() {
        let c = composite("general", f64::NAN, true);
        let rating = rate(&RunContext::new(), &c, None, &RatingPolicy::default());
        assert_eq!(rating.category, RatingCategory::HoldWatch);
    }

    #[test]
    fn test_flags_lower_confidence() {
        let policy = RatingPolicy::default();
        let clean = composite("banking", 55.0, true);
        let mut flagged = clean.clone();
        let mut metrics = DerivedMetricSet::new("BBCA", Period::parse("Q3-2025"), "IDR");
        metrics.set(Metric::NonPerformingLoan, MetricValue::Present(0.08));
        metrics.set(Metric::DebtToEquity, MetricValue::Present(3.0));
        flagged.metrics = metrics;

        let ctx = RunContext::new();
        let a = rate(&ctx, &clean, Some(&valuation(Verdict::Fair)), &policy);
        let b = rate(&ctx, &flagged, Some(&valuation(Verdict::Fair)), &policy);

        assert_eq!(b.risk_flags.len(), 2);
        assert!(b.risk_flags.iter().all(|f| f.severity == Severity::Warning));
        assert_relative_eq!(a.confidence - b.confidence, 0.10 * 0.95, epsilon = 1e-9);
        assert!(a.confidence <= 0.95 && b.confidence >= 0.0);
    }

    #[test]
    fn test_run_identity_comes_from_context() {
        let ctx = RunContext::new();
        let c = composite("general", 50.0, true);
        let rating = rate(&ctx, &c, None, &RatingPolicy::default());
        assert_eq!(rating.run_id, ctx.run_id);
        assert_eq!(rating.rated_at, ctx.as_of);
        assert_eq!(rating.verdict, Verdict::Undetermined);
    }
}
