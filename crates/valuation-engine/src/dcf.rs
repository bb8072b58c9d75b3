use analysis_core::{Scenario, ScenarioSet, ScenarioValuation};

use crate::assumptions::{ScenarioAssumptions, ValuationAssumptions};
use crate::projection::{scenario_projection, ProjectionBase};

/// Present value per share of a projected FCF stream plus a Gordon terminal
/// value on the final year. `None` for an empty stream or when any year's
/// FCF is not positive.
pub fn discounted_value(fcf_per_share: &[f64], scenario: &ScenarioAssumptions) -> Option<f64> {
    let last = *fcf_per_share.last()?;
    if fcf_per_share.iter().any(|f| !f.is_finite() || *f <= 0.0) {
        return None;
    }
    let ScenarioAssumptions {
        wacc,
        terminal_growth,
        ..
    } = *scenario;
    let discount = |year: usize| (1.0 + wacc).powi(year as i32);

    let present_value: f64 = fcf_per_share
        .iter()
        .enumerate()
        .map(|(i, fcf)| fcf / discount(i + 1))
        .sum();
    let terminal = last * (1.0 + terminal_growth) / (wacc - terminal_growth);
    Some(present_value + terminal / discount(fcf_per_share.len()))
}

/// Upside of intrinsic value over price, in percent.
pub fn upside_pct(intrinsic: f64, price: Option<f64>) -> Option<f64> {
    let price = price.filter(|p| *p > 0.0)?;
    Some((intrinsic / price - 1.0) * 100.0)
}

/// Bear, base and bull valuations. Each scenario projects the statements
/// with its own growth and discounts that projection's FCF per share at its
/// own WACC. Without a projection base or a share count the scenarios carry
/// their assumptions but no intrinsic value.
pub fn value_scenarios(
    base: Option<&ProjectionBase>,
    shares: Option<f64>,
    price: Option<f64>,
    assumptions: &ValuationAssumptions,
) -> ScenarioSet {
    let base_growth = base
        .map(|b| b.growth)
        .filter(|g| g.is_finite())
        .unwrap_or(assumptions.default_growth)
        .clamp(assumptions.base_growth_floor, assumptions.base_growth_cap);
    let shares = shares.filter(|s| s.is_finite() && *s > 0.0);

    let run = |scenario: Scenario| {
        let s = assumptions.scenario(scenario);
        let intrinsic_value = base.zip(shares).and_then(|(b, shares)| {
            let stream: Vec<f64> = scenario_projection(b, s, assumptions)
                .years
                .iter()
                .map(|y| y.fcf / shares)
                .collect();
            discounted_value(&stream, s)
        });
        ScenarioValuation {
            scenario,
            wacc: s.wacc,
            terminal_growth: s.terminal_growth,
            revenue_growth: s.revenue_growth(base_growth),
            intrinsic_value,
            upside_pct: intrinsic_value.and_then(|iv| upside_pct(iv, price)),
        }
    };

    ScenarioSet {
        bear: run(Scenario::Bear),
        base: run(Scenario::Base),
        bull: run(Scenario::Bull),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn base(growth: f64, op_margin: f64, capex_ratio: f64) -> ProjectionBase {
        ProjectionBase {
            revenue: 1000.0,
            growth,
            op_margin,
            capex_ratio,
        }
    }

    #[test]
    fn test_negative_projected_fcf_emits_no_value() {
        let a = ValuationAssumptions::default();
        // capex at half of revenue swamps the operating profit every year
        let heavy = base(0.10, 0.20, 0.50);
        let set = value_scenarios(Some(&heavy), Some(10.0), Some(50.0), &a);
        assert!(set.iter().all(|s| s.intrinsic_value.is_none() && s.upside_pct.is_none()));

        let set = value_scenarios(Some(&base(0.10, 0.20, 0.05)), None, Some(50.0), &a);
        assert!(set.iter().all(|s| s.intrinsic_value.is_none()));
    }

    #[test]
    fn test_scenarios_are_ordered() {
        let a = ValuationAssumptions::default();
        for growth in [-0.4, 0.0, 0.03, 0.08, 0.15, 0.6] {
            for margin in [0.05, 0.2, 0.39] {
                let b = base(growth, margin, 0.04);
                let set = value_scenarios(Some(&b), Some(7.0), None, &a);
                let bear = set.bear.intrinsic_value.unwrap();
                let base = set.base.intrinsic_value.unwrap();
                let bull = set.bull.intrinsic_value.unwrap();
                assert!(bear <= base && base <= bull, "{bear} {base} {bull}");
            }
        }
    }

    #[test]
    fn test_base_scenario_discounts_its_projection() {
        let a = ValuationAssumptions::default();
        let b = base(0.12, 0.25, 0.05);
        let set = value_scenarios(Some(&b), Some(4.0), Some(100.0), &a);

        let years = scenario_projection(&b, &a.base, &a).years;
        let mut expected = 0.0;
        for y in &years {
            expected += y.fcf / 4.0 / 1.10_f64.powi(y.year as i32);
        }
        let last = years[4].fcf / 4.0;
        expected += last * 1.025 / (0.10 - 0.025) / 1.10_f64.powi(5);

        let iv = set.base.intrinsic_value.unwrap();
        assert_relative_eq!(iv, expected, max_relative = 1e-12);
        assert_relative_eq!(set.base.upside_pct.unwrap(), (iv / 100.0 - 1.0) * 100.0);
        assert_relative_eq!(set.base.revenue_growth, 0.12);
    }

    #[test]
    fn test_single_year_matches_closed_form() {
        let s = ScenarioAssumptions {
            wacc: 0.10,
            terminal_growth: 0.02,
            growth_shift: 0.0,
            min_growth: 0.0,
            max_growth: 1.0,
        };
        let v = discounted_value(&[10.2], &s).unwrap();
        let expected = 10.2 / 1.1 + 10.2 * 1.02 / 0.08 / 1.1;
        assert_relative_eq!(v, expected, max_relative = 1e-12);

        assert!(discounted_value(&[], &s).is_none());
        assert!(discounted_value(&[10.0, -0.5, 11.0], &s).is_none());
    }

    #[test]
    fn test_upside_against_price() {
        assert_relative_eq!(upside_pct(120.0, Some(100.0)).unwrap(), 20.0, epsilon = 1e-9);
        assert!(upside_pct(120.0, Some(0.0)).is_none());
        assert!(upside_pct(120.0, None).is_none());
    }
}
