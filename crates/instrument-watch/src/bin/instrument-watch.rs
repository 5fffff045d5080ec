//! Instrument Watch CLI
//!
//! Analyse stocks and ETFs from the command line. Analysed tickers stay
//! cached for the session while their news and sentiment refresh in the
//! background.
//!
//! # Usage
//!
//! ```bash
//! export OPENAI_API_KEY="sk-..."
//! # Optional: OPENAI_API_BASE, WATCH_MODEL, FINNHUB_API_KEY, LOG_LEVEL
//!
//! # One-shot
//! cargo run --bin instrument-watch -- --ticker AAPL --ticker SPY
//!
//! # Interactive
//! cargo run --bin instrument-watch
//! ```

use clap::Parser;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use instrument_watch::{
    InstrumentCoordinator, InstrumentView, LlmAnalysisGenerator, MarketDataProvider,
    NewsAggregator, WatchConfig,
};
use std::env;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use watch_llm::LLMProvider;
use watch_llm::providers::{OpenAIConfig, OpenAIProvider};
use watch_utils::{Settings, init_tracing};

/// Cached stock and ETF analysis with background refresh
#[derive(Parser, Debug)]
#[command(name = "instrument-watch", version, about)]
struct Args {
    /// Analyse this ticker and exit (repeatable)
    #[arg(short, long)]
    ticker: Vec<String>,

    /// Print the full view as JSON
    #[arg(long)]
    json: bool,

    /// Model id (overrides WATCH_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Ask the model for an executive summary of each news bundle
    #[arg(long)]
    summarize_news: bool,
}

fn print_banner() {
    println!(
        r"
Instrument Watch

Commands:
  analyze <ticker>   analysis, regenerated when stale
  data <ticker>      section status of the cached record
  news <ticker>      latest news digest
  jobs               cached tickers and their refresh jobs
  help               show this help
  exit               quit
"
    );
}

fn provider_config() -> OpenAIConfig {
    let api_key = env::var("OPENAI_API_KEY").unwrap_or_else(|_| {
        warn!("OPENAI_API_KEY not set, requests will be unauthenticated");
        "not-needed".to_string()
    });

    let config = OpenAIConfig::new(api_key).with_timeout(180);
    match env::var("OPENAI_API_BASE") {
        Ok(api_base) => config.with_api_base(api_base),
        Err(_) => config,
    }
}

fn print_analysis(view: &InstrumentView, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(view)?);
        return Ok(());
    }

    let source = if view.cached { "cached" } else { "new" };
    println!(
        "\n{} [{}] analysis from {} ({source})\n",
        view.ticker,
        view.kind,
        view.analysis_generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("{}\n", view.analysis);
    Ok(())
}

fn data_table(view: &InstrumentView) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Section", "Status", "Detail"]);

    let reasons = [
        view.record.fundamentals.reason(),
        view.record.technicals.reason(),
        view.record.multi_timeframe.reason(),
        view.record.options.reason(),
        view.record.sentiment.reason(),
        view.record.news.reason(),
        view.record.holdings.reason(),
        view.record.sector_allocation.reason(),
    ];
    for ((name, status), reason) in view.record.section_statuses().into_iter().zip(reasons) {
        table.add_row(vec![name, status, reason.unwrap_or("")]);
    }
    table
}

async fn jobs_table(coordinator: &InstrumentCoordinator) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Ticker", "Kind", "Jobs"]);

    let jobs = coordinator.scheduled_jobs();
    for ticker in coordinator.tickers().await {
        let kind = coordinator
            .peek(ticker.as_str())
            .await
            .map_or_else(|| "?".to_string(), |view| view.kind.to_string());
        let names: Vec<String> = jobs
            .iter()
            .filter(|job| job.ticker == ticker)
            .map(ToString::to_string)
            .collect();
        table.add_row(vec![ticker.to_string(), kind, names.join(", ")]);
    }
    table
}

/// Handle one REPL line; returns false on exit
async fn handle(coordinator: &InstrumentCoordinator, line: &str, json: bool) -> anyhow::Result<bool> {
    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or_default().trim_start_matches('/');
    let argument = parts.next();

    match (command, argument) {
        ("exit" | "quit", _) => return Ok(false),
        ("help", _) => print_banner(),
        ("jobs", _) => println!("{}", jobs_table(coordinator).await),
        ("analyze", Some(ticker)) => {
            let view = coordinator.get_or_create(ticker).await?;
            print_analysis(&view, json)?;
        }
        ("data", Some(ticker)) => {
            let view = coordinator.get_or_create(ticker).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view.record)?);
            } else {
                println!("{} [{}]", view.ticker, view.kind);
                println!("{}", data_table(&view));
            }
        }
        ("news", Some(ticker)) => {
            let bundle = coordinator.news(ticker).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&bundle)?);
            } else {
                if let Some(summary) = bundle.summary.as_deref() {
                    println!("{summary}\n");
                }
                if bundle.digest.is_empty() {
                    println!("No recent news.");
                } else {
                    println!("{}", bundle.digest);
                }
            }
        }
        ("analyze" | "data" | "news", None) => println!("Usage: {command} <ticker>"),
        _ => println!("Unknown command '{command}', type 'help'"),
    }
    Ok(true)
}

async fn repl(coordinator: &InstrumentCoordinator, json: bool) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = std::io::stdout();

    loop {
        print!("watch> ");
        stdout.flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!("\nGoodbye!");
            break;
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match handle(coordinator, line, json).await {
            Ok(true) => {}
            Ok(false) => {
                println!("Goodbye!");
                break;
            }
            Err(e) => eprintln!("Error: {e}\n"),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    init_tracing(&settings);

    let args = Args::parse();

    let mut builder = WatchConfig::builder()
        .with_env_keys()
        .from_env_model()
        .summarize_news(args.summarize_news);
    if let Some(model) = args.model {
        builder = builder.model(model);
    }
    let config = builder.build()?;

    let llm: Arc<dyn LLMProvider> = Arc::new(OpenAIProvider::with_config(provider_config())?);

    let mut news = NewsAggregator::from_config(&config)?;
    if config.summarize_news {
        news = news.with_summarizer(Arc::clone(&llm), config.model.clone());
    }

    let coordinator = InstrumentCoordinator::new(
        config.clone(),
        Arc::new(MarketDataProvider::from_config(&config)?),
        Arc::new(news),
        Arc::new(LlmAnalysisGenerator::from_config(llm, &config)),
    );
    info!(model = %config.model, environment = %settings.environment, "Instrument watch ready");

    let result = if args.ticker.is_empty() {
        print_banner();
        repl(&coordinator, args.json).await
    } else {
        let mut result = Ok(());
        for ticker in &args.ticker {
            match coordinator.get_or_create(ticker).await {
                Ok(view) => print_analysis(&view, args.json)?,
                Err(e) => {
                    eprintln!("{ticker}: {e}");
                    result = Err(e.into());
                }
            }
        }
        result
    };

    coordinator.shutdown();
    result
}
