use analysis_core::{
    AnalysisError, FactSource, FinancialFact, MarketDataSource, Money, PeerMultiples, Period,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Fact store held in memory, keyed by ticker. Used by the CLI and tests.
#[derive(Default)]
pub struct InMemoryFactSource {
    facts: RwLock<HashMap<String, Vec<FinancialFact>>>,
}

impl InMemoryFactSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_facts(facts: Vec<FinancialFact>) -> Self {
        let mut by_ticker: HashMap<String, Vec<FinancialFact>> = HashMap::new();
        for fact in facts {
            by_ticker
                .entry(fact.ticker.to_uppercase())
                .or_default()
                .push(fact);
        }
        Self {
            facts: RwLock::new(by_ticker),
        }
    }

    pub async fn insert(&self, fact: FinancialFact) {
        self.facts
            .write()
            .await
            .entry(fact.ticker.to_uppercase())
            .or_default()
            .push(fact);
    }

    pub async fn tickers(&self) -> Vec<String> {
        let mut tickers: Vec<String> = self.facts.read().await.keys().cloned().collect();
        tickers.sort();
        tickers
    }

    /// Distinct period labels recorded for a ticker, as written.
    pub async fn periods(&self, ticker: &str) -> Vec<Period> {
        let facts = self.facts.read().await;
        let mut periods: Vec<Period> = facts
            .get(&ticker.to_uppercase())
            .map(|fs| fs.iter().map(|f| Period::parse(&f.period)).collect())
            .unwrap_or_default();
        periods.sort_by(|a, b| a.label().cmp(b.label()));
        periods.dedup();
        periods
    }
}

#[async_trait]
impl FactSource for InMemoryFactSource {
    async fn get_facts(
        &self,
        ticker: &str,
        period: &Period,
    ) -> Result<Vec<FinancialFact>, AnalysisError> {
        let facts = self.facts.read().await;
        Ok(facts
            .get(&ticker.to_uppercase())
            .map(|fs| {
                fs.iter()
                    .filter(|f| Period::parse(&f.period) == *period)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Quotes held in memory.
#[derive(Default)]
pub struct InMemoryMarketData {
    prices: RwLock<HashMap<String, Money>>,
    shares: RwLock<HashMap<String, Decimal>>,
    peers: RwLock<HashMap<String, Vec<PeerMultiples>>>,
}

impl InMemoryMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_price(&self, ticker: &str, price: Money) {
        self.prices.write().await.insert(ticker.to_uppercase(), price);
    }

    pub async fn set_shares(&self, ticker: &str, shares: Decimal) {
        self.shares.write().await.insert(ticker.to_uppercase(), shares);
    }

    pub async fn set_peers(&self, ticker: &str, peers: Vec<PeerMultiples>) {
        self.peers.write().await.insert(ticker.to_uppercase(), peers);
    }
}

#[async_trait]
impl MarketDataSource for InMemoryMarketData {
    async fn get_current_price(&self, ticker: &str) -> Result<Option<Money>, AnalysisError> {
        Ok(self.prices.read().await.get(&ticker.to_uppercase()).cloned())
    }

    async fn get_shares_outstanding(
        &self,
        ticker: &str,
    ) -> Result<Option<Decimal>, AnalysisError> {
        Ok(self.shares.read().await.get(&ticker.to_uppercase()).copied())
    }

    async fn get_peer_multiples(&self, ticker: &str) -> Result<Vec<PeerMultiples>, AnalysisError> {
        Ok(self
            .peers
            .read()
            .await
            .get(&ticker.to_uppercase())
            .cloned()
            .unwrap_or_default())
    }
}
