use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use swingbot::config::load_watchlist;
use swingbot::engine::Engine;
use swingbot::feed::{run_replay_feed, CsvCandleSource, PriceBoard};
use swingbot::gateway::PaperGateway;
use swingbot::journal::Journal;
use swingbot::persistence::StateStore;

#[derive(Parser)]
#[command(name = "swingbot", about = "Unattended candle-pattern trading agent")]
struct Cli {
    /// Watch-list CSV with per-symbol trade settings
    #[arg(long, default_value = "TradeSettings.csv")]
    settings: PathBuf,

    /// Directory of per-instrument candle CSVs
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// State snapshot for crash recovery
    #[arg(long, default_value = "State.json")]
    state: PathBuf,

    /// Append-only order journal
    #[arg(long, default_value = "OrderLog.txt")]
    journal: PathBuf,
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();

    let configs = load_watchlist(&cli.settings)
        .with_context(|| format!("loading {}", cli.settings.display()))?;
    tracing::info!(symbols = configs.len(), "watch list loaded");
    for cfg in &configs {
        tracing::info!(
            symbol = %cfg.symbol,
            timeframe = cfg.timeframe_min,
            lots = cfg.entry_lots,
            market = ?cfg.market,
            product = %cfg.product,
            window = format!("{}-{}", cfg.window.start, cfg.window.end),
            "watching"
        );
    }

    let board = PriceBoard::new();
    let candles = Arc::new(CsvCandleSource::new(&cli.data_dir));
    let gateway = Arc::new(PaperGateway::new());
    let journal = Arc::new(Journal::open(&cli.journal)?);
    let store = StateStore::new(&cli.state);

    let mut engine = Engine::new(
        configs.clone(),
        board.clone(),
        candles.clone(),
        gateway,
        journal,
        Some(store),
        Local::now().date_naive(),
    )?;

    let instruments: Vec<(String, u32)> = configs
        .iter()
        .map(|cfg| (cfg.instrument.clone(), cfg.timeframe_min))
        .collect();
    let feed = tokio::spawn(run_replay_feed(board, candles, instruments));

    tokio::select! {
        _ = engine.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    feed.abort();
    Ok(())
}
