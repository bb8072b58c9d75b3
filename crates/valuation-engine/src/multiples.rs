use analysis_core::{
    BenchmarkSource, FactMetric, MultipleAssessment, MultipleBenchmarks, MultipleComparison,
    MultipleKind, NormalizedMetricSet, PeerMultiples, Verdict,
};
use statrs::statistics::{Data, Median};

const ALL_KINDS: [MultipleKind; 3] = [MultipleKind::Pe, MultipleKind::Pb, MultipleKind::Ps];

fn positive(v: Option<f64>) -> Option<f64> {
    v.filter(|x| x.is_finite() && *x > 0.0)
}

/// Trailing multiple from annualised facts. Only defined over a positive
/// per-share base.
pub fn compute_multiple(
    kind: MultipleKind,
    facts: &NormalizedMetricSet,
    price: f64,
    shares: Option<f64>,
) -> Option<f64> {
    let annualize = facts.period.annualization_factor();
    let per_share = |metric: FactMetric| -> Option<f64> {
        let total = facts.get(metric).value()?;
        Some(total / positive(shares)?)
    };

    let base = match kind {
        MultipleKind::Pe => facts
            .get(FactMetric::Eps)
            .value()
            .or_else(|| per_share(FactMetric::NetIncome))
            .map(|eps| eps * annualize),
        MultipleKind::Pb => per_share(FactMetric::TotalEquity),
        MultipleKind::Ps => per_share(FactMetric::Revenue).map(|rps| rps * annualize),
    };
    positive(Some(price))?;
    positive(base).map(|b| price / b)
}

/// Median of the positive peer values for one multiple.
pub fn peer_median(peers: &[PeerMultiples], kind: MultipleKind) -> Option<f64> {
    let values: Vec<f64> = peers
        .iter()
        .filter_map(|p| {
            positive(match kind {
                MultipleKind::Pe => p.pe,
                MultipleKind::Pb => p.pb,
                MultipleKind::Ps => p.ps,
            })
        })
        .collect();
    if values.is_empty() {
        return None;
    }
    Some(Data::new(values).median())
}

/// Lower-is-cheaper banding of a multiple relative to its benchmark.
pub fn assess_ratio(ratio: f64) -> MultipleAssessment {
    match ratio {
        r if r < 0.7 => MultipleAssessment::Discount,
        r if r < 0.9 => MultipleAssessment::SlightDiscount,
        r if r < 1.1 => MultipleAssessment::Fair,
        r if r < 1.3 => MultipleAssessment::SlightPremium,
        _ => MultipleAssessment::Premium,
    }
}

/// Compare each computable multiple with the peer median when peers report
/// one, otherwise with the sector median.
pub fn compare_multiples(
    facts: &NormalizedMetricSet,
    price: f64,
    shares: Option<f64>,
    sector: &MultipleBenchmarks,
    peers: &[PeerMultiples],
) -> Vec<MultipleComparison> {
    ALL_KINDS
        .iter()
        .filter_map(|&kind| {
            let value = compute_multiple(kind, facts, price, shares)?;
            let (benchmark, benchmark_source) = match peer_median(peers, kind) {
                Some(m) => (m, BenchmarkSource::Peers),
                None => (positive(sector.get(kind))?, BenchmarkSource::Sector),
            };
            let ratio = value / benchmark;
            Some(MultipleComparison {
                kind,
                value,
                benchmark,
                benchmark_source,
                ratio,
                assessment: assess_ratio(ratio),
            })
        })
        .collect()
}

/// Majority vote over the assessments; ties read as fair.
pub fn multiples_verdict(comparisons: &[MultipleComparison]) -> Option<Verdict> {
    if comparisons.is_empty() {
        return None;
    }
    let count = |f: fn(&MultipleAssessment) -> bool| {
        comparisons.iter().filter(|c| f(&c.assessment)).count()
    };
    let discount = count(|a| {
        matches!(
            a,
            MultipleAssessment::Discount | MultipleAssessment::SlightDiscount
        )
    });
    let premium = count(|a| {
        matches!(
            a,
            MultipleAssessment::Premium | MultipleAssessment::SlightPremium
        )
    });
    let fair = count(|a| *a == MultipleAssessment::Fair);

    Some(if discount > premium && discount > fair {
        Verdict::Discount
    } else if premium > discount && premium > fair {
        Verdict::Premium
    } else {
        Verdict::Fair
    })
}
