use analysis_core::{FactMetric, NormalizedMetricSet, Projection, ProjectionYear};

use crate::assumptions::{ScenarioAssumptions, ValuationAssumptions};

/// Annualised starting point for the forward statements.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionBase {
    pub revenue: f64,
    pub growth: f64,
    pub op_margin: f64,
    pub capex_ratio: f64,
}

impl ProjectionBase {
    /// Build from normalised facts. Flow figures are annualised from the
    /// period length; missing or negative margins fall back to defaults.
    /// `None` without a positive revenue.
    pub fn from_facts(
        facts: &NormalizedMetricSet,
        revenue_growth: Option<f64>,
        assumptions: &ValuationAssumptions,
    ) -> Option<Self> {
        let revenue = facts.get(FactMetric::Revenue).value()?;
        if revenue <= 0.0 {
            return None;
        }
        let op_margin = facts
            .get(FactMetric::OperatingIncome)
            .value()
            .map(|oi| oi / revenue)
            .filter(|m| *m > 0.0)
            .unwrap_or(assumptions.default_op_margin);
        let capex_ratio = facts
            .get(FactMetric::Capex)
            .value()
            .map(|c| c.abs() / revenue)
            .unwrap_or(assumptions.default_capex_ratio);

        Some(Self {
            revenue: revenue * facts.period.annualization_factor(),
            growth: revenue_growth
                .filter(|g| g.is_finite())
                .unwrap_or(assumptions.default_growth),
            op_margin,
            capex_ratio,
        })
    }
}

/// Growth in year `t` (1-based), decaying geometrically from `start` toward
/// `target`. Restarting the schedule from year 1's growth reproduces year 2.
pub fn decayed_growth(start: f64, target: f64, decay: f64, t: u32) -> f64 {
    target + (start - target) * decay.powi(t as i32)
}

fn step_toward(current: f64, target: f64, step: f64) -> f64 {
    if current < target {
        (current + step).min(target)
    } else {
        (current - step).max(target)
    }
}

/// Target operating margin for a base margin: a small expansion, capped.
pub fn target_margin(base_margin: f64, assumptions: &ValuationAssumptions) -> f64 {
    (base_margin + assumptions.margin_expansion).min(assumptions.max_op_margin)
}

/// Project revenue, operating income, net income and FCF over the horizon.
///
/// Operating margin moves linearly toward `target_op_margin` by a fixed
/// step per year and holds once reached.
pub fn project(
    base: &ProjectionBase,
    target_op_margin: f64,
    assumptions: &ValuationAssumptions,
) -> Projection {
    let horizon = assumptions.horizon_years;
    let step = assumptions.margin_expansion.abs().max(f64::EPSILON) / f64::from(horizon);

    let mut revenue = base.revenue;
    let mut margin = base.op_margin;
    let mut years = Vec::with_capacity(horizon as usize);
    for year in 1..=horizon {
        let growth = decayed_growth(
            base.growth,
            assumptions.long_run_growth,
            assumptions.growth_decay,
            year,
        );
        revenue *= 1.0 + growth;
        margin = step_toward(margin, target_op_margin, step);

        let operating_income = revenue * margin;
        let net_income = operating_income * (1.0 - assumptions.tax_rate);
        let depreciation = revenue * assumptions.da_ratio;
        let capex = revenue * base.capex_ratio;
        years.push(ProjectionYear {
            year,
            revenue,
            growth,
            op_margin: margin,
            operating_income,
            depreciation,
            net_income,
            capex,
            fcf: net_income + depreciation - capex,
        });
    }

    Projection {
        base_revenue: base.revenue,
        base_growth: base.growth,
        base_op_margin: base.op_margin,
        target_op_margin,
        tax_rate: assumptions.tax_rate,
        years,
    }
}

/// Projection under one scenario: the base growth is clamped to the base
/// floor and cap, then shifted and bounded by the scenario.
pub fn scenario_projection(
    base: &ProjectionBase,
    scenario: &ScenarioAssumptions,
    assumptions: &ValuationAssumptions,
) -> Projection {
    let clamped = base
        .growth
        .clamp(assumptions.base_growth_floor, assumptions.base_growth_cap);
    let growth = scenario.revenue_growth(clamped);
    project(
        &ProjectionBase { growth, ..*base },
        target_margin(base.op_margin, assumptions),
        assumptions,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{MetricValue, Period};
    use approx::assert_relative_eq;

    fn facts(period: &str, revenue: f64, op_income: f64) -> NormalizedMetricSet {
        let mut set = NormalizedMetricSet::new("AAPL", Period::parse(period), "USD");
        set.set(FactMetric::Revenue, MetricValue::Present(revenue));
        set.set(FactMetric::OperatingIncome, MetricValue::Present(op_income));
        set
    }

    #[test]
    fn test_restarting_from_year_one_reproduces_year_two() {
        let a = ValuationAssumptions::default();
        let base = ProjectionBase::from_facts(&facts("FY-2024", 100e9, 30e9), Some(0.12), &a).unwrap();
        let target = target_margin(base.op_margin, &a);
        let first = project(&base, target, &a);

        let y1 = &first.years[0];
        let y2 = &first.years[1];
        let next_facts = facts("FY-2025", y1.revenue, y1.operating_income);
        let rebased = ProjectionBase::from_facts(&next_facts, Some(y1.growth), &a).unwrap();
        let second = project(&rebased, target, &a);

        assert_relative_eq!(second.years[0].revenue, y2.revenue, max_relative = 1e-12);
        assert_relative_eq!(second.years[0].op_margin, y2.op_margin, epsilon = 1e-12);
    }

    #[test]
    fn test_five_year_statements() {
        let a = ValuationAssumptions::default();
        let base = ProjectionBase {
            revenue: 100.0,
            growth: 0.10,
            op_margin: 0.20,
            capex_ratio: 0.05,
        };
        let p = project(&base, 0.21, &a);

        let growth = [0.086, 0.0748, 0.06584, 0.058672, 0.0529376];
        let revenue = [108.6, 116.72328, 124.408341, 131.707627, 138.679913];
        let op_margin = [0.202, 0.204, 0.206, 0.208, 0.210];
        let fcf = [15.158388, 16.476658, 17.758047, 19.008045, 20.233399];
        for (i, y) in p.years.iter().enumerate() {
            assert_eq!(y.year, i as u32 + 1);
            assert_relative_eq!(y.growth, growth[i], epsilon = 1e-9);
            assert_relative_eq!(y.revenue, revenue[i], epsilon = 1e-6);
            assert_relative_eq!(y.op_margin, op_margin[i], epsilon = 1e-9);
            assert_relative_eq!(y.fcf, fcf[i], epsilon = 1e-6);
        }
        // year 1: NI = 108.6 * 0.202 * 0.79, D&A 3%, capex 5%
        assert_relative_eq!(p.years[0].net_income, 17.330388, epsilon = 1e-6);
        assert_relative_eq!(p.years[0].depreciation, 3.258, epsilon = 1e-9);
        assert_relative_eq!(p.years[0].capex, 5.43, epsilon = 1e-9);
    }

    #[test]
    fn test_scenario_projection_shifts_growth() {
        let a = ValuationAssumptions::default();
        let base = ProjectionBase {
            revenue: 100.0,
            growth: 0.40,
            op_margin: 0.20,
            capex_ratio: 0.05,
        };
        // capped to 0.15 first, then shifted by each scenario
        assert_relative_eq!(scenario_projection(&base, &a.base, &a).base_growth, 0.15);
        assert_relative_eq!(scenario_projection(&base, &a.bear, &a).base_growth, 0.10);
        assert_relative_eq!(scenario_projection(&base, &a.bull, &a).base_growth, 0.20);
        assert_relative_eq!(
            scenario_projection(&base, &a.base, &a).target_op_margin,
            0.21,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_growth_decays_toward_long_run() {
        let a = ValuationAssumptions::default();
        let base = ProjectionBase::from_facts(&facts("FY-2024", 100.0, 20.0), Some(0.30), &a).unwrap();
        let p = project(&base, target_margin(base.op_margin, &a), &a);

        assert_eq!(p.years.len(), 5);
        assert!(p.years.windows(2).all(|w| w[1].growth < w[0].growth));
        assert!(p.years.iter().all(|y| y.growth > a.long_run_growth));
        assert_relative_eq!(p.years[4].op_margin, 0.21, epsilon = 1e-9);
    }

    #[test]
    fn test_quarter_is_annualised_and_defaults_fill_gaps() {
        let a = ValuationAssumptions::default();
        let mut set = NormalizedMetricSet::new("X", Period::parse("Q2-2025"), "USD");
        set.set(FactMetric::Revenue, MetricValue::Present(25.0));
        set.set(FactMetric::OperatingIncome, MetricValue::Present(-3.0));
        let base = ProjectionBase::from_facts(&set, None, &a).unwrap();

        assert_eq!(base.revenue, 100.0);
        assert_eq!(base.op_margin, a.default_op_margin);
        assert_eq!(base.growth, a.default_growth);
        assert_eq!(base.capex_ratio, a.default_capex_ratio);
    }

    #[test]
    fn test_no_revenue_no_projection() {
        let a = ValuationAssumptions::default();
        let set = NormalizedMetricSet::new("X", Period::parse("FY-2024"), "USD");
        assert!(ProjectionBase::from_facts(&set, Some(0.1), &a).is_none());
    }
}
