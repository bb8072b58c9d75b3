pub mod assumptions;
pub mod dcf;
pub mod multiples;
pub mod projection;
pub mod sensitivity;

pub use assumptions::{ScenarioAssumptions, ValuationAssumptions};
pub use dcf::{discounted_value, value_scenarios};
pub use multiples::{assess_ratio, compare_multiples, multiples_verdict, peer_median};
pub use projection::{project, scenario_projection, target_margin, ProjectionBase};
pub use sensitivity::{grid_basis, sensitivity_grid};

use analysis_core::{
    AnalysisError, FactMetric, FxTable, MetricValue, Money, MultipleBenchmarks,
    NormalizedMetricSet, PeerMultiples, RunContext, ValuationMethod, ValuationResult, Verdict,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{info, warn};

/// Everything one valuation needs, gathered by the caller.
#[derive(Debug, Clone)]
pub struct ValuationInput<'a> {
    pub facts: &'a NormalizedMetricSet,
    /// Year-over-year revenue growth, when it could be derived
    pub revenue_growth: Option<f64>,
    pub current_price: Option<Money>,
    /// Overrides the share count reported in the facts
    pub shares_outstanding: Option<Decimal>,
    pub benchmarks: MultipleBenchmarks,
    pub peers: &'a [PeerMultiples],
}

pub struct ValuationEngine {
    assumptions: ValuationAssumptions,
    fx: FxTable,
}

impl ValuationEngine {
    pub fn new(assumptions: ValuationAssumptions) -> Result<Self, AnalysisError> {
        assumptions.validate()?;
        Ok(Self {
            assumptions,
            fx: FxTable::new(),
        })
    }

    /// FX pairs for prices quoted outside the reporting currency.
    pub fn with_fx(mut self, fx: FxTable) -> Self {
        self.fx = fx;
        self
    }

    pub fn assumptions(&self) -> &ValuationAssumptions {
        &self.assumptions
    }

    /// The quote in the statements' currency. A quote in another currency
    /// with no FX pair yields `None`, which skips the verdict and multiples.
    fn reporting_price(
        &self,
        quote: Option<&Money>,
        facts: &NormalizedMetricSet,
        notes: &mut Vec<String>,
    ) -> Option<Money> {
        let quote = quote?;
        let currency = facts.currency.as_str();
        if currency.is_empty() || quote.currency.eq_ignore_ascii_case(currency) {
            return Some(quote.clone());
        }
        match quote.convert_to(currency, &self.fx) {
            Some(converted) => {
                notes.push(format!("Price {quote} converted to {converted} for comparison."));
                Some(converted)
            }
            None => {
                warn!(
                    ticker = %facts.ticker,
                    quote = %quote.currency,
                    reporting = currency,
                    "no FX pair for price"
                );
                notes.push(format!(
                    "Price quoted in {} but statements in {currency} with no FX rate: verdict and multiples skipped.",
                    quote.currency
                ));
                None
            }
        }
    }

    /// Projection, scenario DCF, sensitivity grid, multiples and verdict.
    ///
    /// Each scenario discounts its own projected FCF per share. A
    /// non-positive base-year FCF makes the DCF not meaningful: no scenario
    /// carries an intrinsic value and the verdict comes from multiples.
    pub fn value(
        &self,
        ctx: &RunContext,
        input: &ValuationInput<'_>,
    ) -> Result<ValuationResult, AnalysisError> {
        let a = &self.assumptions;
        let facts = input.facts;
        let mut notes = Vec::new();

        let shares = match input.shares_outstanding {
            Some(s) => Some(s.to_f64().ok_or_else(|| {
                AnalysisError::InvalidValue(format!("shares outstanding {s} not representable"))
            })?),
            None => facts.get(FactMetric::SharesOutstanding).value(),
        };
        if let Some(s) = shares {
            if s.is_nan() || s <= 0.0 {
                return Err(AnalysisError::ConfigurationError(format!(
                    "{}: shares outstanding must be positive, got {s}",
                    facts.ticker
                )));
            }
        }
        let reporting_price = self.reporting_price(input.current_price.as_ref(), facts, &mut notes);
        let price = reporting_price
            .as_ref()
            .and_then(|p| p.amount.to_f64())
            .filter(|p| p.is_finite() && *p > 0.0);

        let base = ProjectionBase::from_facts(facts, input.revenue_growth, a);
        let projection = base.as_ref().map(|b| scenario_projection(b, &a.base, a));
        if projection.is_none() {
            notes.push("No positive revenue: forward projection skipped.".to_string());
        }

        let ocf = facts.get(FactMetric::OperatingCashFlow);
        let capex = facts.get(FactMetric::Capex).map(f64::abs);
        let fcf = MetricValue::zip_with(ocf, capex, |o, c| o - c).value();

        let skip_reason = match (fcf, shares) {
            (Some(f), _) if f <= 0.0 => {
                Some("Negative free cash flow: DCF not meaningful, using multiples.")
            }
            (_, None) => Some("Shares outstanding unknown: DCF not computed."),
            (None, _) => Some("Free cash flow not available: DCF not computed."),
            _ => None,
        };
        let dcf_shares = if skip_reason.is_none() { shares } else { None };
        let scenarios = value_scenarios(base.as_ref(), dcf_shares, price, a);

        let skip_reason = skip_reason.or_else(|| {
            (base.is_some() && scenarios.base.intrinsic_value.is_none())
                .then_some("Projected free cash flow not positive: DCF not meaningful.")
        });
        let dcf_meaningful = scenarios.base.intrinsic_value.is_some();
        if let Some(reason) = skip_reason {
            warn!(ticker = %facts.ticker, period = %facts.period, reason, "dcf skipped");
            notes.push(reason.to_string());
        }

        let sensitivity_grid = match (grid_basis(facts, fcf, a), shares) {
            (Some((basis, cash_flow)), Some(s)) => Some(sensitivity_grid(basis, cash_flow / s, a)),
            _ => None,
        };

        let multiples = match price {
            Some(p) => compare_multiples(facts, p, shares, &input.benchmarks, input.peers),
            None => {
                if input.current_price.is_none() {
                    notes.push("No current price: multiples and verdict unavailable.".to_string());
                }
                Vec::new()
            }
        };

        let dcf_verdict = scenarios
            .base
            .intrinsic_value
            .zip(price)
            .map(|(iv, p)| price_verdict(p, iv, a.fair_band));
        let (verdict, method) = match (dcf_verdict, multiples_verdict(&multiples)) {
            (Some(v), _) => (v, ValuationMethod::Dcf),
            (None, Some(v)) => (v, ValuationMethod::Multiples),
            (None, None) => (Verdict::Undetermined, ValuationMethod::Unavailable),
        };

        info!(
            run_id = %ctx.run_id,
            ticker = %facts.ticker,
            period = %facts.period,
            verdict = %verdict,
            ?method,
            dcf_meaningful,
            "valuation computed"
        );

        Ok(ValuationResult {
            run_id: ctx.run_id,
            ticker: facts.ticker.clone(),
            period: facts.period.clone(),
            currency: facts.currency.clone(),
            current_price: input.current_price.clone(),
            reporting_price,
            shares_outstanding: shares,
            scenarios,
            projection,
            sensitivity_grid,
            multiples,
            verdict,
            method,
            dcf_meaningful,
            notes,
            computed_at: ctx.as_of,
        })
    }
}

/// Price against intrinsic value with a symmetric fair band.
pub fn price_verdict(price: f64, intrinsic: f64, band: f64) -> Verdict {
    if price > intrinsic * (1.0 + band) {
        Verdict::Premium
    } else if price < intrinsic * (1.0 - band) {
        Verdict::Discount
    } else {
        Verdict::Fair
    }
}
