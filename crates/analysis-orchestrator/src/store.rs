use analysis_core::{AnalysisError, Evaluation, EvaluationSink, Period};
use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

const CREATE_EVALUATION_RUNS: &str = "CREATE TABLE IF NOT EXISTS evaluation_runs (
    run_id TEXT PRIMARY KEY,
    ticker TEXT NOT NULL,
    period TEXT NOT NULL,
    category TEXT NOT NULL,
    score REAL,
    confidence REAL NOT NULL,
    locked INTEGER NOT NULL DEFAULT 0,
    payload TEXT NOT NULL,
    created_at TEXT NOT NULL
)";

const CREATE_TICKER_PERIOD_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_evaluation_runs_ticker_period ON evaluation_runs (ticker, period)";

fn storage_err(e: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::Storage(e.to_string())
}

/// Append-only run history. Rows are inserted once and never updated or
/// deleted; a second insert with the same run id is an error.
pub struct SqliteEvaluationStore {
    pool: sqlx::AnyPool,
}

impl SqliteEvaluationStore {
    pub fn new(pool: sqlx::AnyPool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) a SQLite file or `sqlite::memory:`.
    pub async fn connect(url: &str) -> Result<Self, AnalysisError> {
        sqlx::any::install_default_drivers();
        let pool = sqlx::any::AnyPoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(storage_err)?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &sqlx::AnyPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), AnalysisError> {
        sqlx::query(CREATE_EVALUATION_RUNS)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        sqlx::query(CREATE_TICKER_PERIOD_INDEX)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// All runs for `(ticker, period)`, oldest first.
    pub async fn history(
        &self,
        ticker: &str,
        period: &Period,
    ) -> Result<Vec<Evaluation>, AnalysisError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT payload FROM evaluation_runs
             WHERE ticker = ? AND period = ?
             ORDER BY created_at ASC, rowid ASC",
        )
        .bind(ticker.to_uppercase())
        .bind(period.label().to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter()
            .map(|(payload,)| serde_json::from_str(&payload).map_err(storage_err))
            .collect()
    }

    pub async fn get(&self, run_id: Uuid) -> Result<Option<Evaluation>, AnalysisError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT payload FROM evaluation_runs WHERE run_id = ?")
                .bind(run_id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_err)?;

        row.map(|(payload,)| serde_json::from_str(&payload).map_err(storage_err))
            .transpose()
    }

    pub async fn count(&self) -> Result<i64, AnalysisError> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM evaluation_runs")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(n)
    }
}

#[async_trait]
impl EvaluationSink for SqliteEvaluationStore {
    async fn append(&self, evaluation: &Evaluation) -> Result<(), AnalysisError> {
        let payload = serde_json::to_string(evaluation).map_err(storage_err)?;
        let score = Some(evaluation.composite.score).filter(|s| s.is_finite());

        sqlx::query(
            "INSERT INTO evaluation_runs
             (run_id, ticker, period, category, score, confidence, locked, payload, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(evaluation.run_id.to_string())
        .bind(evaluation.ticker.to_uppercase())
        .bind(evaluation.period.label().to_string())
        .bind(evaluation.rating.category.to_string())
        .bind(score)
        .bind(evaluation.rating.confidence)
        .bind(i32::from(evaluation.rating.locked))
        .bind(payload)
        .bind(evaluation.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        debug!(run_id = %evaluation.run_id, "evaluation row inserted");
        info!(
            run_id = %evaluation.run_id,
            ticker = %evaluation.ticker,
            period = %evaluation.period,
            category = %evaluation.rating.category,
            "evaluation persisted"
        );
        Ok(())
    }
}
