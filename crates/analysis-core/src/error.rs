use thiserror::Error;

/// Failure taxonomy for a scoring run.
///
/// Only configuration, data-source and storage failures abort a run. The
/// per-metric variants exist so callers can name a gap precisely; the scoring
/// pipeline itself converts them into `MetricValue::Missing` markers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Missing metric: {0}")]
    MissingMetric(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Coverage contract failed: {0}")]
    CoverageContractFailed(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Valuation not meaningful: {0}")]
    ValuationNotMeaningful(String),

    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl AnalysisError {
    /// Whether this error must abort the surrounding run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AnalysisError::ConfigurationError(_)
                | AnalysisError::DataSource(_)
                | AnalysisError::Storage(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_metric_errors_are_recoverable() {
        assert!(!AnalysisError::MissingMetric("revenue".into()).is_fatal());
        assert!(!AnalysisError::InvalidValue("n/a".into()).is_fatal());
        assert!(!AnalysisError::CoverageContractFailed("0/4".into()).is_fatal());
        assert!(!AnalysisError::ValuationNotMeaningful("negative fcf".into()).is_fatal());
        assert!(AnalysisError::ConfigurationError("weights".into()).is_fatal());
    }
}
