//! score-runner: score, value and rate tickers from a JSON fact file.
//!
//! The fact file is either a bare array of facts or an object
//! `{"facts": [...], "sectors": {"AAPL": "tech"}}`.
//!
//! Usage:
//!   score-runner --facts facts.json --ticker AAPL --period Q3-2025 --sector tech --price 180
//!   score-runner --facts facts.json --ticker BBCA --period Q3-2025 --price 0.6 --currency USD
//!   score-runner --facts facts.json --period FY-2024 --all --db runs.db
//!   score-runner --facts facts.json --ticker BBCA --period Q3-2025 --json

use analysis_core::{Evaluation, FinancialFact, Money};
use analysis_orchestrator::{
    AnalysisOrchestrator, EngineConfig, EvaluationRequest, InMemoryFactSource,
    InMemoryMarketData, SqliteEvaluationStore,
};
use anyhow::{bail, Context, Result};
use financial_scoring::{explain_score, format_coverage_report};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

const DEFAULT_LOG_FILTER: &str = "score_runner=info,analysis_orchestrator=info,financial_scoring=info,valuation_engine=info,rating_resolver=info";

#[derive(Deserialize)]
#[serde(untagged)]
enum FactFile {
    Bare(Vec<FinancialFact>),
    Tagged {
        facts: Vec<FinancialFact>,
        #[serde(default)]
        sectors: HashMap<String, String>,
    },
}

impl FactFile {
    fn into_parts(self) -> (Vec<FinancialFact>, HashMap<String, String>) {
        match self {
            FactFile::Bare(facts) => (facts, HashMap::new()),
            FactFile::Tagged { facts, sectors } => {
                let sectors = sectors
                    .into_iter()
                    .map(|(t, s)| (t.to_uppercase(), s))
                    .collect();
                (facts, sectors)
            }
        }
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn usage() -> ! {
    eprintln!("Usage:");
    eprintln!("  score-runner --facts FILE --ticker T --period P    Evaluate one ticker");
    eprintln!("  score-runner --facts FILE --period P --all         Evaluate every ticker in FILE");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --sector S     Sector tag (default: from FILE, else general)");
    eprintln!("  --price X      Current price for --ticker");
    eprintln!("  --currency C   Currency of --price (default: the ticker's reporting currency)");
    eprintln!("  --shares N     Shares outstanding for --ticker");
    eprintln!("  --db PATH      Append results to a SQLite database");
    eprintln!("  --json         Print evaluations as JSON");
    std::process::exit(1);
}

fn init_tracing() {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER))
    };
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    // Logs go to stderr so `--json` output stays parseable.
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(filter())
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter())
            .init();
    }
}

fn render_text(evaluation: &Evaluation) -> String {
    let rating = &evaluation.rating;
    let mut out = vec![
        format!("=== {} {} ===", evaluation.ticker, evaluation.period),
        explain_score(&evaluation.composite),
        String::new(),
        format_coverage_report(&evaluation.composite.coverage, &evaluation.ticker),
    ];

    if let Some(v) = &evaluation.valuation {
        out.push(String::new());
        out.push(format!("Valuation ({:?}): {}", v.method, v.verdict));
        match (&v.current_price, &v.reporting_price) {
            (Some(quote), Some(p)) if quote != p => out.push(format!("  price: {quote} ({p})")),
            (Some(quote), _) => out.push(format!("  price: {quote}")),
            _ => {}
        }
        for s in v.scenarios.iter() {
            match (s.intrinsic_value, s.upside_pct) {
                (Some(iv), Some(up)) => out.push(format!(
                    "  {}: {:.2} {} ({:+.1}%)",
                    s.scenario, iv, v.currency, up
                )),
                (Some(iv), None) => out.push(format!("  {}: {:.2} {}", s.scenario, iv, v.currency)),
                _ => out.push(format!("  {}: n/a", s.scenario)),
            }
        }
        for m in &v.multiples {
            out.push(format!(
                "  {}: {:.1}x vs {:.1}x ({:?})",
                m.kind.label(),
                m.value,
                m.benchmark,
                m.assessment
            ));
        }
        out.extend(v.notes.iter().map(|n| format!("  - {n}")));
    }

    out.push(String::new());
    out.push(format!(
        "Rating: {} (confidence {:.0}%){}",
        rating.category,
        rating.confidence_pct(),
        if rating.locked { " [locked]" } else { "" }
    ));
    for flag in &rating.risk_flags {
        out.push(format!("  ! [{:?}] {}", flag.severity, flag.message));
    }
    out.extend(rating.notes.iter().map(|n| format!("  - {n}")));
    out.join("\n")
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let use_all = args.iter().any(|a| a == "--all");
    let json_output = args.iter().any(|a| a == "--json");

    let Some(facts_path) = arg_value(&args, "--facts") else {
        usage();
    };
    let Some(period) = arg_value(&args, "--period") else {
        usage();
    };
    let ticker = arg_value(&args, "--ticker").map(str::to_uppercase);
    if ticker.is_none() && !use_all {
        usage();
    }

    let raw = std::fs::read_to_string(facts_path)
        .with_context(|| format!("cannot read fact file {facts_path}"))?;
    let file: FactFile = serde_json::from_str(&raw)
        .with_context(|| format!("{facts_path} is not a fact array or fact document"))?;
    let (facts, file_sectors) = file.into_parts();
    tracing::info!("Loaded {} facts from {}", facts.len(), facts_path);
    let reporting_currency = ticker.as_deref().and_then(|t| {
        facts
            .iter()
            .find(|f| f.ticker.eq_ignore_ascii_case(t) && !f.currency.is_empty())
            .map(|f| f.currency.clone())
    });

    let config = EngineConfig::from_env().context("invalid engine configuration")?;
    let source = Arc::new(InMemoryFactSource::from_facts(facts));
    let market = Arc::new(InMemoryMarketData::new());

    if let Some(t) = &ticker {
        if let Some(p) = arg_value(&args, "--price") {
            let amount = Decimal::from_str(p).with_context(|| format!("invalid --price {p}"))?;
            let Some(currency) = arg_value(&args, "--currency").or(reporting_currency.as_deref())
            else {
                bail!("--price needs --currency: no facts for {t} name a currency");
            };
            market.set_price(t, Money::new(amount, currency)).await;
        }
        if let Some(n) = arg_value(&args, "--shares") {
            let shares = Decimal::from_str(n).with_context(|| format!("invalid --shares {n}"))?;
            market.set_shares(t, shares).await;
        }
    }

    let mut orchestrator = AnalysisOrchestrator::new(config, source.clone(), market)
        .context("failed to build orchestrator")?;
    if let Some(db_path) = arg_value(&args, "--db") {
        let store = SqliteEvaluationStore::connect(&format!("sqlite:{db_path}?mode=rwc"))
            .await
            .with_context(|| format!("cannot open database {db_path}"))?;
        orchestrator = orchestrator.with_sink(Arc::new(store));
    }

    let tickers = if use_all {
        source.tickers().await
    } else {
        ticker.into_iter().collect()
    };
    let sector_flag = arg_value(&args, "--sector");
    let requests: Vec<EvaluationRequest> = tickers
        .iter()
        .map(|t| {
            let sector = sector_flag
                .or_else(|| file_sectors.get(t).map(String::as_str))
                .unwrap_or("general");
            EvaluationRequest::new(t, period, sector)
        })
        .collect();
    if requests.is_empty() {
        bail!("no tickers to evaluate in {facts_path}");
    }

    let total = requests.len();
    let outcomes = orchestrator.evaluate_batch(requests).await;

    let mut evaluations = Vec::with_capacity(total);
    let mut failures = 0usize;
    for outcome in outcomes {
        match outcome.result {
            Ok(e) => evaluations.push(e),
            Err(e) => {
                failures += 1;
                eprintln!("{} {}: {e}", outcome.request.ticker, outcome.request.period);
            }
        }
    }

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&evaluations).context("failed to serialize results")?
        );
    } else {
        let blocks: Vec<String> = evaluations.iter().map(render_text).collect();
        println!("{}", blocks.join("\n\n"));
    }

    tracing::info!("Done: {} evaluated, {} failed", total - failures, failures);
    if failures > 0 {
        bail!("{failures} of {total} evaluations failed");
    }
    Ok(())
}
