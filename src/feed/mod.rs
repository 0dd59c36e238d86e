//! Market data: the shared price board and candle history sources.
//!
//! The board is the single hand-off point between whatever publishes prices
//! and the engine tick; the engine snapshots it once per tick so every
//! symbol is evaluated against a consistent view.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::models::Candle;

/// Latest traded price per instrument, shared between the feed task and the
/// engine. Cheap to clone; all clones see the same map.
#[derive(Clone, Default)]
pub struct PriceBoard {
    inner: Arc<RwLock<HashMap<String, f64>>>,
}

impl PriceBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, instrument: &str, ltp: f64) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(instrument.to_string(), ltp);
        }
    }

    pub fn get(&self, instrument: &str) -> Option<f64> {
        self.inner.read().ok()?.get(instrument).copied()
    }

    /// One consistent copy of the whole board for a tick.
    pub fn snapshot(&self) -> HashMap<String, f64> {
        self.inner
            .read()
            .map(|map| map.clone())
            .unwrap_or_default()
    }
}

/// Candle history provider. Implementations return candles ascending by
/// timestamp; a transient failure is an `Err` the scheduler skips over.
pub trait CandleSource: Send + Sync {
    fn fetch_candles(&self, instrument: &str, timeframe_min: u32) -> anyhow::Result<Vec<Candle>>;
}

#[derive(Debug, Deserialize)]
struct CandleRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

/// File-backed candle source: one CSV per instrument under `data_dir`,
/// columns `timestamp,open,high,low,close,volume` with timestamps as
/// `YYYY-MM-DD HH:MM:SS` in exchange-local time.
pub struct CsvCandleSource {
    data_dir: PathBuf,
}

impl CsvCandleSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn path_for(&self, instrument: &str) -> PathBuf {
        self.data_dir
            .join(format!("{}.csv", sanitize_instrument(instrument)))
    }
}

/// Instrument identifiers carry exchange prefixes and option punctuation
/// (`NSE:NIFTY25JUN24500CE`); map anything non-alphanumeric to `_` so they
/// are safe as file names.
pub fn sanitize_instrument(instrument: &str) -> String {
    instrument
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

impl CandleSource for CsvCandleSource {
    fn fetch_candles(&self, instrument: &str, _timeframe_min: u32) -> anyhow::Result<Vec<Candle>> {
        let path = self.path_for(instrument);
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)
            .with_context(|| format!("reading candle file {}", path.display()))?;

        let mut candles = Vec::new();
        for row in reader.deserialize() {
            let row: CandleRow = row.with_context(|| format!("parsing {}", path.display()))?;
            let timestamp = NaiveDateTime::parse_from_str(&row.timestamp, "%Y-%m-%d %H:%M:%S")
                .with_context(|| format!("bad timestamp {:?} in {}", row.timestamp, path.display()))?;
            candles.push(Candle {
                timestamp,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }

        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }
}

/// Paper price feed: republishes each instrument's latest candle close as
/// its traded price once a second. Stands in for a broker websocket when
/// running against file data.
pub async fn run_replay_feed(
    board: PriceBoard,
    source: Arc<dyn CandleSource>,
    instruments: Vec<(String, u32)>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        for (instrument, timeframe_min) in &instruments {
            match source.fetch_candles(instrument, *timeframe_min) {
                Ok(candles) => {
                    if let Some(last) = candles.last() {
                        board.publish(instrument, last.close);
                    }
                }
                Err(e) => {
                    tracing::debug!(instrument = %instrument, "replay feed fetch failed: {e:#}");
                }
            }
        }
    }
}

/// Convenience for tests and fixtures: write candles out in the format
/// `CsvCandleSource` reads back.
pub fn write_candle_file(path: &Path, candles: &[Candle]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating candle file {}", path.display()))?;
    writer.write_record(["timestamp", "open", "high", "low", "close", "volume"])?;
    for c in candles {
        writer.write_record([
            c.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            c.open.to_string(),
            c.high.to_string(),
            c.low.to_string(),
            c.close.to_string(),
            c.volume.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
