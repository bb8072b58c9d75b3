use analysis_core::numeric::{clamp_score, interpolate};
use analysis_core::{AnalysisError, Metric};
use serde::{Deserialize, Serialize};

/// Maps a metric value onto a 0-100 sub-score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    /// Piecewise-linear through `(value, score)` points, flat beyond the ends.
    /// Points must be strictly increasing in value.
    Linear { points: Vec<(f64, f64)> },
    /// Only the sign of the value matters.
    Sign { positive: f64, non_positive: f64 },
}

impl ScoreBand {
    pub fn linear(points: &[(f64, f64)]) -> Self {
        ScoreBand::Linear {
            points: points.to_vec(),
        }
    }

    pub fn sign() -> Self {
        ScoreBand::Sign {
            positive: 100.0,
            non_positive: 0.0,
        }
    }

    pub fn score(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return f64::NAN;
        }
        match self {
            ScoreBand::Sign {
                positive,
                non_positive,
            } => {
                if value > 0.0 {
                    *positive
                } else {
                    *non_positive
                }
            }
            ScoreBand::Linear { points } => {
                let (Some(first), Some(last)) = (points.first(), points.last()) else {
                    return f64::NAN;
                };
                if value <= first.0 {
                    return clamp_score(first.1);
                }
                if value >= last.0 {
                    return clamp_score(last.1);
                }
                let score = points
                    .windows(2)
                    .find(|w| value >= w[0].0 && value <= w[1].0)
                    .map(|w| interpolate(value, w[0], w[1]))
                    .unwrap_or(f64::NAN);
                clamp_score(score)
            }
        }
    }

    pub fn validate(&self, metric: Metric) -> Result<(), AnalysisError> {
        let in_range = |y: f64| y.is_finite() && (0.0..=100.0).contains(&y);
        match self {
            ScoreBand::Sign {
                positive,
                non_positive,
            } => {
                if !in_range(*positive) || !in_range(*non_positive) {
                    return Err(AnalysisError::ConfigurationError(format!(
                        "band for {metric}: sign scores must lie in [0, 100]"
                    )));
                }
            }
            ScoreBand::Linear { points } => {
                if points.len() < 2 {
                    return Err(AnalysisError::ConfigurationError(format!(
                        "band for {metric}: needs at least two points"
                    )));
                }
                if points.iter().any(|(x, y)| !x.is_finite() || !in_range(*y)) {
                    return Err(AnalysisError::ConfigurationError(format!(
                        "band for {metric}: scores must lie in [0, 100]"
                    )));
                }
                if points.windows(2).any(|w| w[1].0 <= w[0].0) {
                    return Err(AnalysisError::ConfigurationError(format!(
                        "band for {metric}: points must be strictly increasing"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Default band set, used when a sector does not override a metric.
pub fn default_band(metric: Metric) -> ScoreBand {
    match metric {
        Metric::RevenueYoy => ScoreBand::linear(&[(-0.20, 0.0), (0.30, 100.0)]),
        Metric::RevenueQoq => ScoreBand::linear(&[(-0.15, 0.0), (0.20, 100.0)]),
        Metric::EpsGrowth => ScoreBand::linear(&[(-0.25, 0.0), (0.30, 100.0)]),
        Metric::NetMargin => ScoreBand::linear(&[(-0.05, 0.0), (0.25, 100.0)]),
        Metric::OpMargin => ScoreBand::linear(&[(-0.05, 0.0), (0.30, 100.0)]),
        Metric::Roe => ScoreBand::linear(&[(-0.05, 0.0), (0.30, 100.0)]),
        Metric::GrossMargin => ScoreBand::linear(&[(0.0, 0.0), (0.30, 30.0), (0.70, 100.0)]),
        Metric::Roic => ScoreBand::linear(&[(0.0, 0.0), (0.10, 30.0), (0.25, 100.0)]),
        Metric::Ocf | Metric::Fcf => ScoreBand::sign(),
        Metric::FcfMargin => ScoreBand::linear(&[(0.0, 0.0), (0.05, 30.0), (0.25, 100.0)]),
        Metric::CfoToNetIncome => ScoreBand::linear(&[(0.0, 0.0), (0.8, 30.0), (2.0, 100.0)]),
        Metric::CapexIntensity => {
            ScoreBand::linear(&[(0.02, 100.0), (0.15, 30.0), (0.30, 0.0)])
        }
        Metric::DebtToEquity => ScoreBand::linear(&[(0.0, 100.0), (3.0, 0.0)]),
        Metric::CurrentRatio => ScoreBand::linear(&[(0.0, 0.0), (2.5, 100.0)]),
        // mid-range payout is best
        Metric::PayoutRatio => ScoreBand::linear(&[(0.20, 0.0), (0.40, 100.0), (0.60, 0.0)]),
        Metric::Dilution => ScoreBand::linear(&[(-0.02, 100.0), (0.01, 30.0), (0.05, 0.0)]),
        Metric::NetInterestMargin => ScoreBand::linear(&[(0.0, 0.0), (0.05, 100.0)]),
        Metric::NonPerformingLoan => ScoreBand::linear(&[(0.0, 100.0), (0.05, 0.0)]),
        Metric::CapitalAdequacyRatio => ScoreBand::linear(&[(0.08, 0.0), (0.20, 100.0)]),
        Metric::CostToIncome => ScoreBand::linear(&[(0.40, 100.0), (0.70, 40.0), (0.90, 0.0)]),
    }
}

/// Five-step label for a sub-score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RatingLabel {
    Excellent,
    Good,
    Fair,
    Weak,
    Poor,
}

impl RatingLabel {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 80.0 => RatingLabel::Excellent,
            s if s >= 60.0 => RatingLabel::Good,
            s if s >= 40.0 => RatingLabel::Fair,
            s if s >= 20.0 => RatingLabel::Weak,
            _ => RatingLabel::Poor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RatingLabel::Excellent => "Excellent",
            RatingLabel::Good => "Good",
            RatingLabel::Fair => "Fair",
            RatingLabel::Weak => "Weak",
            RatingLabel::Poor => "Poor",
        }
    }

    fn index(&self) -> usize {
        match self {
            RatingLabel::Excellent => 0,
            RatingLabel::Good => 1,
            RatingLabel::Fair => 2,
            RatingLabel::Weak => 3,
            RatingLabel::Poor => 4,
        }
    }
}

/// What a metric measures plus one line of interpretation per label.
pub struct MetricDescription {
    pub description: &'static str,
    details: [&'static str; 5],
}

impl MetricDescription {
    pub fn detail(&self, label: RatingLabel) -> &'static str {
        self.details[label.index()]
    }
}

const GENERIC_DETAILS: [&str; 5] = [
    "Well above sector norms",
    "Above average",
    "Average",
    "Below average",
    "Well below sector norms",
];

pub fn describe(metric: Metric) -> MetricDescription {
    let (description, details) = match metric {
        Metric::RevenueYoy => (
            "Year-over-year revenue change; the pace of business expansion.",
            [
                "Revenue up more than 20% YoY, strong expansion",
                "Revenue up 10-20% YoY, healthy growth",
                "Revenue up 0-10% YoY, moderate growth",
                "Revenue down 0-10% YoY, slowing",
                "Revenue down more than 10% YoY, contracting",
            ],
        ),
        Metric::RevenueQoq => (
            "Quarter-over-quarter revenue change; short-term momentum.",
            [
                "Revenue up more than 15% QoQ, strong momentum",
                "Revenue up 5-15% QoQ, solid quarter",
                "Revenue flat to +5% QoQ",
                "Revenue down 0-10% QoQ, losing momentum",
                "Revenue down more than 10% QoQ, sharp drop",
            ],
        ),
        Metric::EpsGrowth => (
            "Year-over-year change in earnings per share.",
            [
                "EPS up more than 25% YoY, accelerating earnings",
                "EPS up 10-25% YoY",
                "EPS up 0-10% YoY",
                "EPS down 0-15% YoY, earnings contracting",
                "EPS down more than 15% YoY",
            ],
        ),
        Metric::NetMargin => (
            "Net income as a share of revenue.",
            [
                "Net margin above 20%, highly profitable",
                "Net margin 10-20%",
                "Net margin 5-10%",
                "Net margin 0-5%, thin",
                "Net margin negative, loss-making",
            ],
        ),
        Metric::OpMargin => (
            "Operating income as a share of revenue; core efficiency.",
            [
                "Operating margin above 20%",
                "Operating margin 10-20%",
                "Operating margin 5-10%",
                "Operating margin 0-5%, tight",
                "Operating margin negative",
            ],
        ),
        Metric::Roe => (
            "Annualised net income over shareholders' equity.",
            [
                "ROE above 25%, exceptional",
                "ROE 15-25%, strong",
                "ROE 8-15%, adequate",
                "ROE 0-8%, below average",
                "ROE negative, destroying shareholder value",
            ],
        ),
        Metric::Ocf => (
            "Cash generated by core operations.",
            [
                "Positive operating cash flow",
                "Positive operating cash flow",
                "Marginal operating cash flow",
                "Negative operating cash flow",
                "Negative operating cash flow, cash burn",
            ],
        ),
        Metric::Fcf => (
            "Operating cash flow less capital expenditure.",
            [
                "Positive free cash flow, self-funding",
                "Positive free cash flow",
                "Marginal free cash flow",
                "Negative free cash flow",
                "Negative free cash flow, spending more than it generates",
            ],
        ),
        Metric::DebtToEquity => (
            "Total debt over total equity; financial leverage.",
            [
                "D/E below 0.5x, conservative",
                "D/E 0.5-1.0x, healthy leverage",
                "D/E 1.0-2.0x, significant leverage",
                "D/E 2.0-3.0x, high leverage",
                "D/E above 3.0x, extremely leveraged",
            ],
        ),
        Metric::CurrentRatio => (
            "Current assets over current liabilities; short-term liquidity.",
            [
                "Current ratio above 2.0x",
                "Current ratio 1.5-2.0x",
                "Current ratio 1.0-1.5x, adequate",
                "Current ratio 0.5-1.0x, tight",
                "Current ratio below 0.5x, liquidity risk",
            ],
        ),
        Metric::NetInterestMargin => (
            "Net interest income over average earning assets.",
            [
                "NIM above 5%, very wide spread",
                "NIM 3-5%",
                "NIM 2-3%",
                "NIM 1-2%, thin spread",
                "NIM below 1%, compressed",
            ],
        ),
        Metric::NonPerformingLoan => (
            "Non-performing loans as a share of the loan book; lower is better.",
            [
                "NPL below 1%, clean loan book",
                "NPL 1-2%",
                "NPL 2-3%, moderate credit risk",
                "NPL 3-5%, elevated credit risk",
                "NPL above 5%, credit problems",
            ],
        ),
        Metric::CapitalAdequacyRatio => (
            "Capital over risk-weighted assets; regulatory floor near 8%.",
            [
                "CAR above 20%, very well capitalised",
                "CAR 15-20%",
                "CAR 12-15%, adequate",
                "CAR 8-12%, near the regulatory minimum",
                "CAR below 8%, under-capitalised",
            ],
        ),
        Metric::GrossMargin => ("Gross profit as a share of revenue.", GENERIC_DETAILS),
        Metric::Roic => ("After-tax operating income over invested capital.", GENERIC_DETAILS),
        Metric::FcfMargin => ("Free cash flow as a share of revenue.", GENERIC_DETAILS),
        Metric::CfoToNetIncome => ("Operating cash flow over net income.", GENERIC_DETAILS),
        Metric::CapexIntensity => ("Capital expenditure over revenue; lower is lighter.", GENERIC_DETAILS),
        Metric::PayoutRatio => ("Dividends paid over net income.", GENERIC_DETAILS),
        Metric::Dilution => ("Year-over-year change in shares outstanding.", GENERIC_DETAILS),
        Metric::CostToIncome => ("Operating cost over operating income; lower is better.", GENERIC_DETAILS),
    };
    MetricDescription {
        description,
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_band_interpolates_and_clamps() {
        let band = default_band(Metric::RevenueYoy);
        assert_eq!(band.score(-0.5), 0.0);
        assert_eq!(band.score(0.9), 100.0);
        assert_relative_eq!(band.score(0.05), 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_inverted_band() {
        let band = default_band(Metric::DebtToEquity);
        assert_eq!(band.score(0.0), 100.0);
        assert_relative_eq!(band.score(1.5), 50.0, epsilon = 1e-9);
        assert_eq!(band.score(8.0), 0.0);
    }

    #[test]
    fn test_payout_mid_range_is_best() {
        let band = default_band(Metric::PayoutRatio);
        assert_eq!(band.score(0.40), 100.0);
        assert_relative_eq!(band.score(0.50), 50.0, epsilon = 1e-9);
        assert_eq!(band.score(0.9), 0.0);
    }

    #[test]
    fn test_sign_band() {
        assert_eq!(default_band(Metric::Fcf).score(-1.0), 0.0);
        assert_eq!(default_band(Metric::Fcf).score(12.0), 100.0);
        assert!(default_band(Metric::Fcf).score(f64::NAN).is_nan());
    }

    #[test]
    fn test_every_default_band_is_valid() {
        for metric in Metric::ALL {
            assert!(default_band(metric).validate(metric).is_ok(), "{metric}");
        }
    }

    #[test]
    fn test_band_validation_rejects_unsorted_points() {
        let band = ScoreBand::linear(&[(0.3, 100.0), (0.1, 0.0)]);
        assert!(band.validate(Metric::Roe).is_err());
        let band = ScoreBand::linear(&[(0.1, 120.0), (0.3, 0.0)]);
        assert!(band.validate(Metric::Roe).is_err());
        let band = ScoreBand::linear(&[(0.1, 10.0)]);
        assert!(band.validate(Metric::Roe).is_err());
    }

    #[test]
    fn test_labels() {
        assert_eq!(RatingLabel::from_score(80.0), RatingLabel::Excellent);
        assert_eq!(RatingLabel::from_score(59.9), RatingLabel::Fair);
        assert_eq!(RatingLabel::from_score(0.0), RatingLabel::Poor);
        assert!(describe(Metric::RevenueYoy)
            .detail(RatingLabel::Good)
            .contains("10-20%"));
    }
}
