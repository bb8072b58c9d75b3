use analysis_core::{FactMetric, GridBasis, NormalizedMetricSet, SensitivityGrid};

use crate::assumptions::ValuationAssumptions;

/// Pick the cash flow the grid is built on: FCF when positive, else
/// operating cash flow, else a proxy margin on revenue. Annualised.
pub fn grid_basis(
    facts: &NormalizedMetricSet,
    fcf: Option<f64>,
    assumptions: &ValuationAssumptions,
) -> Option<(GridBasis, f64)> {
    let annualize = facts.period.annualization_factor();
    let positive = |v: Option<f64>| v.filter(|x| x.is_finite() && *x > 0.0);

    if let Some(f) = positive(fcf) {
        return Some((GridBasis::FreeCashFlow, f * annualize));
    }
    if let Some(ocf) = positive(facts.get(FactMetric::OperatingCashFlow).value()) {
        return Some((GridBasis::OperatingCashFlow, ocf * annualize));
    }
    positive(facts.get(FactMetric::Revenue).value())
        .map(|rev| (GridBasis::RevenueProxy, rev * annualize * assumptions.proxy_fcf_margin))
}

/// One-period Gordon value per cell. Cells where WACC does not exceed the
/// growth rate are left empty.
pub fn sensitivity_grid(
    basis: GridBasis,
    cash_flow_per_share: f64,
    assumptions: &ValuationAssumptions,
) -> SensitivityGrid {
    let cells = assumptions
        .sensitivity_wacc
        .iter()
        .map(|&wacc| {
            assumptions
                .sensitivity_growth
                .iter()
                .map(|&g| (wacc > g).then(|| cash_flow_per_share * (1.0 + g) / (wacc - g)))
                .collect()
        })
        .collect();

    SensitivityGrid {
        basis,
        cash_flow_per_share,
        wacc_values: assumptions.sensitivity_wacc.clone(),
        growth_values: assumptions.sensitivity_growth.clone(),
        cells,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{MetricValue, Period};
    use approx::assert_relative_eq;

    #[test]
    fn test_default_grid_shape_and_monotonicity() {
        let a = ValuationAssumptions::default();
        let grid = sensitivity_grid(GridBasis::FreeCashFlow, 5.0, &a);
        assert_eq!(grid.cells.len(), 5);
        assert!(grid.cells.iter().all(|row| row.len() == 5));
        // 8% WACC, 2% growth
        assert_relative_eq!(grid.cells[0][1].unwrap(), 5.0 * 1.02 / 0.06, epsilon = 1e-9);
        // higher WACC is worth less
        assert!(grid.cells[4][2].unwrap() < grid.cells[0][2].unwrap());
    }

    #[test]
    fn test_cells_without_spread_are_empty() {
        let a = ValuationAssumptions {
            sensitivity_wacc: vec![0.03, 0.08],
            sensitivity_growth: vec![0.03, 0.04],
            ..ValuationAssumptions::default()
        };
        let grid = sensitivity_grid(GridBasis::FreeCashFlow, 1.0, &a);
        assert_eq!(grid.cells[0], vec![None, None]);
        assert!(grid.cells[1].iter().all(Option::is_some));
    }

    #[test]
    fn test_basis_falls_back_to_ocf_then_revenue() {
        let a = ValuationAssumptions::default();
        let mut facts = NormalizedMetricSet::new("X", Period::parse("FY-2024"), "USD");
        facts.set(FactMetric::Revenue, MetricValue::Present(1000.0));
        assert_eq!(
            grid_basis(&facts, Some(-50.0), &a),
            Some((GridBasis::RevenueProxy, 100.0))
        );

        facts.set(FactMetric::OperatingCashFlow, MetricValue::Present(80.0));
        assert_eq!(
            grid_basis(&facts, Some(-50.0), &a),
            Some((GridBasis::OperatingCashFlow, 80.0))
        );
        assert_eq!(
            grid_basis(&facts, Some(60.0), &a),
            Some((GridBasis::FreeCashFlow, 60.0))
        );
    }
}
