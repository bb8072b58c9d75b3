use analysis_core::{CoverageReport, DerivedMetricSet, Metric};
use tracing::{info, warn};

use crate::sector::SectorProfile;

const RECOMMENDED_PENALTY: f64 = 0.02;
const FAILED_BASE_PENALTY: f64 = 0.10;
const REQUIRED_DEFICIT_PENALTY: f64 = 0.05;

/// Evaluate a sector's coverage contract. Passing is inclusive: exactly the
/// minimum count of required metrics passes.
pub fn check_coverage(
    metrics: &DerivedMetricSet,
    profile: &SectorProfile,
    fraction_override: Option<f64>,
) -> CoverageReport {
    let present = |m: &Metric| metrics.get(*m).is_present();

    let (found_required, missing_required): (Vec<Metric>, Vec<Metric>) =
        profile.required_metrics.iter().partition(|m| present(m));
    let missing_recommended: Vec<Metric> = profile
        .recommended_metrics
        .iter()
        .copied()
        .filter(|m| !present(m))
        .collect();

    let min_required = profile.min_required(fraction_override);
    let passed = found_required.len() >= min_required;

    let confidence_penalty = if passed {
        missing_recommended.len() as f64 * RECOMMENDED_PENALTY
    } else {
        let deficit = min_required.saturating_sub(found_required.len());
        FAILED_BASE_PENALTY + deficit as f64 * REQUIRED_DEFICIT_PENALTY
    };

    let message = if passed {
        format!(
            "Coverage contract passed: {}/{} required metrics (minimum {}).",
            found_required.len(),
            profile.required_metrics.len(),
            min_required
        )
    } else {
        format!(
            "Coverage contract failed: {}/{} required metrics (minimum {}). Missing: {}. Rating locked to Hold.",
            found_required.len(),
            profile.required_metrics.len(),
            min_required,
            names(&missing_required)
        )
    };

    if passed {
        info!(
            ticker = %metrics.ticker,
            sector = %profile.name,
            found = found_required.len(),
            required = profile.required_metrics.len(),
            "coverage contract passed"
        );
    } else {
        warn!(
            ticker = %metrics.ticker,
            sector = %profile.name,
            found = found_required.len(),
            min_required,
            missing = ?missing_required,
            "coverage contract failed"
        );
    }

    CoverageReport {
        sector: profile.name.clone(),
        required: profile.required_metrics.clone(),
        found_required,
        missing_required,
        missing_recommended,
        min_required,
        passed,
        confidence_penalty,
        message,
    }
}

fn names(metrics: &[Metric]) -> String {
    metrics
        .iter()
        .map(Metric::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn format_coverage_report(report: &CoverageReport, ticker: &str) -> String {
    let mut lines = vec![
        format!(
            "Coverage Contract: {} ({})",
            report.sector.to_uppercase(),
            ticker
        ),
        format!("Status: {}", if report.passed { "PASS" } else { "FAIL" }),
        format!(
            "Required: {}/{} (min: {})",
            report.found_required.len(),
            report.required.len(),
            report.min_required
        ),
    ];
    if !report.missing_required.is_empty() {
        lines.push(format!("Missing Required: {}", names(&report.missing_required)));
    }
    if !report.missing_recommended.is_empty() {
        lines.push(format!(
            "Missing Recommended: {}",
            names(&report.missing_recommended)
        ));
    }
    if !report.passed {
        lines.push(report.message.clone());
    }
    lines.join("\n")
}
