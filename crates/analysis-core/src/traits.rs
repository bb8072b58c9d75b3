use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{AnalysisError, Evaluation, FinancialFact, Money, PeerMultiples, Period};

/// Read access to extracted facts, owned by the ingestion side.
#[async_trait]
pub trait FactSource: Send + Sync {
    /// All facts recorded for `(ticker, period)`, duplicates included.
    async fn get_facts(
        &self,
        ticker: &str,
        period: &Period,
    ) -> Result<Vec<FinancialFact>, AnalysisError>;
}

/// Prices and share counts.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Latest quote in its trading currency.
    async fn get_current_price(&self, ticker: &str) -> Result<Option<Money>, AnalysisError>;

    async fn get_shares_outstanding(&self, ticker: &str)
        -> Result<Option<Decimal>, AnalysisError>;

    async fn get_peer_multiples(&self, _ticker: &str) -> Result<Vec<PeerMultiples>, AnalysisError> {
        Ok(Vec::new())
    }
}

/// Append-only destination for finished runs.
#[async_trait]
pub trait EvaluationSink: Send + Sync {
    async fn append(&self, evaluation: &Evaluation) -> Result<(), AnalysisError>;
}
