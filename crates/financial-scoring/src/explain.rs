use analysis_core::CompositeScore;

use crate::bands::{describe, RatingLabel};

/// Render a composite score as a readable breakdown: overall score, each
/// driver with its interpretation, factor scores and the data gaps.
pub fn explain_score(composite: &CompositeScore) -> String {
    let mut lines = Vec::new();

    if composite.score.is_finite() {
        lines.push(format!(
            "Composite Score for {} ({}): {:.1}/100 ({})",
            composite.ticker,
            composite.period,
            composite.score,
            RatingLabel::from_score(composite.score).as_str()
        ));
    } else {
        lines.push(format!(
            "Composite Score for {} ({}): not available, no weighted metric had data",
            composite.ticker, composite.period
        ));
    }
    lines.push(format!("Sector: {}", composite.sector));
    lines.push(String::new());

    if !composite.drivers.is_empty() {
        lines.push("Score Breakdown:".to_string());
        for driver in &composite.drivers {
            let label = RatingLabel::from_score(driver.sub_score);
            lines.push(format!(
                "  {}: {} -> {:.0}/100 [{}] (weight {:.0}%, contributes {:.1})",
                driver.metric.display_name(),
                driver.metric.format_value(driver.value),
                driver.sub_score,
                label.as_str(),
                driver.weight * 100.0,
                driver.weight_contribution
            ));
            lines.push(format!("    {}", describe(driver.metric).detail(label)));
        }
        lines.push(String::new());
    }

    lines.push("Factors:".to_string());
    for factor in &composite.factors {
        let score = if factor.is_scored() {
            format!("{:.1}", factor.score)
        } else {
            "n/a".to_string()
        };
        lines.push(format!(
            "  {} ({}): {} [{}/{} metrics]",
            factor.factor.as_str(),
            factor.factor.description(),
            score,
            factor.available,
            factor.required
        ));
    }
    if composite.factor_composite.is_finite() {
        lines.push(format!("  Factor composite: {:.1}", composite.factor_composite));
    }

    if !composite.missing.is_empty() {
        lines.push(String::new());
        lines.push("Insufficient data:".to_string());
        for gap in &composite.missing {
            lines.push(format!("  {} ({})", gap.metric.display_name(), gap.reason));
        }
    }

    if !composite.notes.is_empty() {
        lines.push(String::new());
        lines.extend(composite.notes.iter().cloned());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::compose;
    use crate::config::ScoringConfig;
    use crate::sector::SectorRegistry;
    use analysis_core::{DerivedMetricSet, Metric, MetricValue, Period, RunContext};

    #[test]
    fn test_explanation_lists_drivers_and_gaps() {
        let mut set = DerivedMetricSet::new("AAPL", Period::parse("Q3-2025"), "USD");
        set.set(Metric::RevenueYoy, MetricValue::Present(0.176));
        set.set(Metric::OpMargin, MetricValue::Present(0.30));
        let registry = SectorRegistry::builtin();
        let composite = compose(
            &RunContext::new(),
            set,
            registry.get_sector_config("general"),
            &ScoringConfig::default(),
        )
        .unwrap();

        let text = explain_score(&composite);
        assert!(text.contains("Revenue Growth (YoY): 17.6%"));
        assert!(text.contains("Insufficient data:"));
        assert!(text.contains("Free Cash Flow (FCF) (not reported)"));
        assert!(text.contains("Low data coverage"));
    }

    #[test]
    fn test_explanation_of_empty_run() {
        let set = DerivedMetricSet::new("XYZ", Period::parse("FY-2024"), "USD");
        let registry = SectorRegistry::builtin();
        let composite = compose(
            &RunContext::new(),
            set,
            registry.get_sector_config("general"),
            &ScoringConfig::default(),
        )
        .unwrap();

        let text = explain_score(&composite);
        assert!(text.contains("not available"));
        assert!(text.contains("quality (Profitability & stability): n/a [0/5 metrics]"));
    }
}
