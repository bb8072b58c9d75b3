use analysis_core::{AnalysisError, Scenario};
use serde::{Deserialize, Serialize};
use std::env;

/// Discount rate, terminal growth and revenue-growth rule for one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioAssumptions {
    pub wacc: f64,
    pub terminal_growth: f64,
    /// Added to the clamped base growth
    pub growth_shift: f64,
    pub min_growth: f64,
    pub max_growth: f64,
}

impl ScenarioAssumptions {
    pub fn revenue_growth(&self, base_growth: f64) -> f64 {
        (base_growth + self.growth_shift).clamp(self.min_growth, self.max_growth)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationAssumptions {
    pub horizon_years: u32,                 // 5
    pub tax_rate: f64,                      // 0.21
    pub default_growth: f64,                // 0.05 when revenue growth is unknown
    pub base_growth_floor: f64,             // 0.03
    pub base_growth_cap: f64,               // 0.15
    pub long_run_growth: f64,               // 0.03, projection growth target
    pub growth_decay: f64,                  // 0.8 per year toward the target
    pub default_op_margin: f64,             // 0.15 when margin is unknown or negative
    pub margin_expansion: f64,              // 0.01 over the horizon
    pub max_op_margin: f64,                 // 0.40
    pub da_ratio: f64,                      // 0.03 of revenue
    pub default_capex_ratio: f64,           // 0.05 of revenue
    pub fair_band: f64,                     // 0.15 around intrinsic value
    pub proxy_fcf_margin: f64,              // 0.10 for the sensitivity fallback
    pub bear: ScenarioAssumptions,
    pub base: ScenarioAssumptions,
    pub bull: ScenarioAssumptions,
    pub sensitivity_wacc: Vec<f64>,
    pub sensitivity_growth: Vec<f64>,
}

impl Default for ValuationAssumptions {
    fn default() -> Self {
        Self {
            horizon_years: 5,
            tax_rate: 0.21,
            default_growth: 0.05,
            base_growth_floor: 0.03,
            base_growth_cap: 0.15,
            long_run_growth: 0.03,
            growth_decay: 0.8,
            default_op_margin: 0.15,
            margin_expansion: 0.01,
            max_op_margin: 0.40,
            da_ratio: 0.03,
            default_capex_ratio: 0.05,
            fair_band: 0.15,
            proxy_fcf_margin: 0.10,
            bear: ScenarioAssumptions {
                wacc: 0.12,
                terminal_growth: 0.02,
                growth_shift: -0.05,
                min_growth: 0.01,
                max_growth: 0.25,
            },
            base: ScenarioAssumptions {
                wacc: 0.10,
                terminal_growth: 0.025,
                growth_shift: 0.0,
                min_growth: 0.03,
                max_growth: 0.15,
            },
            bull: ScenarioAssumptions {
                wacc: 0.09,
                terminal_growth: 0.03,
                growth_shift: 0.05,
                min_growth: 0.01,
                max_growth: 0.25,
            },
            sensitivity_wacc: vec![0.08, 0.09, 0.10, 0.11, 0.12],
            sensitivity_growth: vec![0.01, 0.02, 0.025, 0.03, 0.04],
        }
    }
}

fn env_f64(name: &str, default: f64) -> Result<f64, AnalysisError> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .map_err(|e| AnalysisError::ConfigurationError(format!("{name}: {e}")))
}

impl ValuationAssumptions {
    /// Defaults overlaid with `DCF_{BEAR,BASE,BULL}_WACC`,
    /// `DCF_{BEAR,BASE,BULL}_TERMINAL_GROWTH`, `VALUATION_TAX_RATE` and
    /// `VALUATION_FAIR_BAND`.
    pub fn from_env() -> Result<Self, AnalysisError> {
        let mut a = Self::default();
        a.tax_rate = env_f64("VALUATION_TAX_RATE", a.tax_rate)?;
        a.fair_band = env_f64("VALUATION_FAIR_BAND", a.fair_band)?;
        for (prefix, scenario) in [
            ("DCF_BEAR", &mut a.bear),
            ("DCF_BASE", &mut a.base),
            ("DCF_BULL", &mut a.bull),
        ] {
            scenario.wacc = env_f64(&format!("{prefix}_WACC"), scenario.wacc)?;
            scenario.terminal_growth =
                env_f64(&format!("{prefix}_TERMINAL_GROWTH"), scenario.terminal_growth)?;
        }
        a.validate()?;
        Ok(a)
    }

    pub fn scenario(&self, scenario: Scenario) -> &ScenarioAssumptions {
        match scenario {
            Scenario::Bear => &self.bear,
            Scenario::Base => &self.base,
            Scenario::Bull => &self.bull,
        }
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        let err = |msg: String| Err(AnalysisError::ConfigurationError(msg));

        if self.horizon_years == 0 {
            return err("valuation horizon must be at least one year".to_string());
        }
        if !(0.0..1.0).contains(&self.tax_rate) {
            return err(format!("valuation tax rate {} outside [0, 1)", self.tax_rate));
        }
        if !(0.0..1.0).contains(&self.growth_decay) {
            return err(format!("growth decay {} outside [0, 1)", self.growth_decay));
        }
        if self.fair_band.is_nan() || self.fair_band <= 0.0 || self.fair_band >= 1.0 {
            return err(format!("fair band {} outside (0, 1)", self.fair_band));
        }
        for scenario in [Scenario::Bear, Scenario::Base, Scenario::Bull] {
            let s = self.scenario(scenario);
            if !(s.wacc.is_finite() && s.terminal_growth.is_finite()) || s.wacc <= s.terminal_growth {
                return err(format!(
                    "{scenario} scenario: WACC {} must exceed terminal growth {}",
                    s.wacc, s.terminal_growth
                ));
            }
            if s.min_growth > s.max_growth {
                return err(format!("{scenario} scenario: growth bounds are inverted"));
            }
        }
        if self.bear.wacc < self.base.wacc || self.base.wacc < self.bull.wacc {
            return err("scenario WACCs must not decrease from bull to bear".to_string());
        }
        if self.sensitivity_wacc.is_empty() || self.sensitivity_growth.is_empty() {
            return err("sensitivity grid needs at least one WACC and one growth value".to_string());
        }
        Ok(())
    }
}
