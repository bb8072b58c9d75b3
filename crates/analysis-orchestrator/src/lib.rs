pub mod config;
pub mod memory;
pub mod store;

pub use config::EngineConfig;
pub use memory::{InMemoryFactSource, InMemoryMarketData};
pub use store::SqliteEvaluationStore;

use analysis_core::{
    AnalysisError, CompositeScore, Evaluation, EvaluationSink, FactSource, FinancialFact,
    MarketDataSource, Metric, Money, Period, Rating, RunContext, ValuationResult,
};
use financial_scoring::FinancialScorer;
use futures_util::future::{join_all, try_join_all};
use rating_resolver::RatingPolicy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use valuation_engine::{ValuationEngine, ValuationInput};

/// One `(ticker, period)` to evaluate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub ticker: String,
    pub period: Period,
    pub sector: String,
    /// Overrides the market-data price when set
    pub price: Option<Money>,
}

impl EvaluationRequest {
    pub fn new(ticker: &str, period: &str, sector: &str) -> Self {
        Self {
            ticker: ticker.to_uppercase(),
            period: Period::parse(period),
            sector: sector.to_string(),
            price: None,
        }
    }

    pub fn with_price(mut self, price: Money) -> Self {
        self.price = Some(price);
        self
    }
}

/// Result of one request in a batch. A failed run carries its error and
/// leaves the rest of the batch untouched.
#[derive(Debug)]
pub struct BatchOutcome {
    pub request: EvaluationRequest,
    pub result: Result<Evaluation, AnalysisError>,
}

/// Async glue around the pure engines: fetches facts and quotes from the
/// collaborators, runs scoring, valuation and rating, and appends the
/// finished run to the sink.
#[derive(Clone)]
pub struct AnalysisOrchestrator {
    facts: Arc<dyn FactSource>,
    market: Arc<dyn MarketDataSource>,
    sink: Option<Arc<dyn EvaluationSink>>,
    scorer: Arc<FinancialScorer>,
    valuer: Arc<ValuationEngine>,
    policy: RatingPolicy,
    max_concurrency: usize,
}

impl AnalysisOrchestrator {
    pub fn new(
        config: EngineConfig,
        facts: Arc<dyn FactSource>,
        market: Arc<dyn MarketDataSource>,
    ) -> Result<Self, AnalysisError> {
        config.rating.validate()?;
        let registry = config.sector_registry()?;
        let scorer = FinancialScorer::new(config.scoring, registry)?.with_fx(config.fx.clone());
        let valuer = ValuationEngine::new(config.valuation)?.with_fx(config.fx);
        Ok(Self {
            facts,
            market,
            sink: None,
            scorer: Arc::new(scorer),
            valuer: Arc::new(valuer),
            policy: config.rating,
            max_concurrency: config.max_concurrency.max(1),
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn EvaluationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn scorer(&self) -> &FinancialScorer {
        &self.scorer
    }

    /// Facts for the period plus its prior year and prior quarter, which
    /// the growth metrics read from the same snapshot.
    async fn fetch_snapshot(
        &self,
        ticker: &str,
        period: &Period,
    ) -> Result<Vec<FinancialFact>, AnalysisError> {
        let periods: Vec<Period> = [Some(period.clone()), period.prior_year(), period.prior_quarter()]
            .into_iter()
            .flatten()
            .collect();
        let batches = try_join_all(periods.iter().map(|p| self.facts.get_facts(ticker, p))).await?;
        Ok(batches.into_iter().flatten().collect())
    }

    pub async fn score(
        &self,
        ctx: &RunContext,
        ticker: &str,
        period: &Period,
        sector: &str,
    ) -> Result<CompositeScore, AnalysisError> {
        let snapshot = self.fetch_snapshot(ticker, period).await?;
        if snapshot.is_empty() {
            warn!(run_id = %ctx.run_id, ticker, period = %period, "no facts found");
        }
        self.scorer.score(ctx, ticker, period, sector, &snapshot)
    }

    /// Value `(ticker, period)`. The revenue growth feeding the projection
    /// comes from a scoring pass over the same snapshot.
    pub async fn value(
        &self,
        ctx: &RunContext,
        ticker: &str,
        period: &Period,
        sector: &str,
        price: Option<Money>,
    ) -> Result<ValuationResult, AnalysisError> {
        let snapshot = self.fetch_snapshot(ticker, period).await?;
        let composite = self.scorer.score(ctx, ticker, period, sector, &snapshot)?;
        self.value_composite(ctx, &composite, &snapshot, price).await
    }

    async fn value_composite(
        &self,
        ctx: &RunContext,
        composite: &CompositeScore,
        snapshot: &[FinancialFact],
        price: Option<Money>,
    ) -> Result<ValuationResult, AnalysisError> {
        let ticker = composite.ticker.as_str();
        let (quote, shares, peers) = tokio::join!(
            self.market.get_current_price(ticker),
            self.market.get_shares_outstanding(ticker),
            self.market.get_peer_multiples(ticker),
        );
        let current_price = match price {
            Some(p) => Some(p),
            None => quote?,
        };
        let peers = peers?;

        let facts = self.scorer.normalize(
            snapshot,
            ticker,
            &composite.period,
            Some(&composite.currency),
        );
        let benchmarks = self
            .scorer
            .registry()
            .get_sector_config(&composite.sector)
            .multiples;

        self.valuer.value(
            ctx,
            &ValuationInput {
                facts: &facts,
                revenue_growth: composite.metrics.get(Metric::RevenueYoy).value(),
                current_price,
                shares_outstanding: shares?,
                benchmarks,
                peers: &peers,
            },
        )
    }

    pub fn rate(
        &self,
        ctx: &RunContext,
        composite: &CompositeScore,
        valuation: Option<&ValuationResult>,
    ) -> Rating {
        rating_resolver::rate(ctx, composite, valuation, &self.policy)
    }

    /// Score, value and rate one request, then append it to the sink.
    pub async fn evaluate(&self, request: &EvaluationRequest) -> Result<Evaluation, AnalysisError> {
        let ctx = RunContext::new();
        let ticker = request.ticker.to_uppercase();
        info!(
            run_id = %ctx.run_id,
            ticker = %ticker,
            period = %request.period,
            sector = %request.sector,
            "evaluation started"
        );

        let snapshot = self.fetch_snapshot(&ticker, &request.period).await?;
        let composite = self
            .scorer
            .score(&ctx, &ticker, &request.period, &request.sector, &snapshot)?;
        let valuation = self
            .value_composite(&ctx, &composite, &snapshot, request.price.clone())
            .await?;
        let rating = self.rate(&ctx, &composite, Some(&valuation));

        let evaluation = Evaluation {
            run_id: ctx.run_id,
            ticker: composite.ticker.clone(),
            period: composite.period.clone(),
            composite,
            valuation: Some(valuation),
            rating,
            created_at: ctx.as_of,
        };

        if let Some(sink) = &self.sink {
            sink.append(&evaluation).await?;
        }
        Ok(evaluation)
    }

    /// Evaluate many requests concurrently, at most `max_concurrency` at a
    /// time. Outcomes come back in request order.
    pub async fn evaluate_batch(&self, requests: Vec<EvaluationRequest>) -> Vec<BatchOutcome> {
        let total = requests.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        info!(total, concurrency = self.max_concurrency, "batch evaluation started");

        let handles: Vec<_> = requests
            .iter()
            .cloned()
            .map(|request| {
                let orchestrator = self.clone();
                let semaphore = Arc::clone(&semaphore);
                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.map_err(|e| {
                        AnalysisError::DataSource(format!("batch semaphore closed: {e}"))
                    })?;
                    orchestrator.evaluate(&request).await
                })
            })
            .collect();

        let results = join_all(handles).await;
        let outcomes: Vec<BatchOutcome> = requests
            .into_iter()
            .zip(results)
            .map(|(request, joined)| {
                let result = joined.unwrap_or_else(|e| {
                    Err(AnalysisError::DataSource(format!("evaluation task failed: {e}")))
                });
                if let Err(e) = &result {
                    error!(ticker = %request.ticker, period = %request.period, "evaluation failed: {e}");
                }
                BatchOutcome { request, result }
            })
            .collect();

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        info!(total, failed, "batch evaluation finished");
        outcomes
    }
}
