//! Watch-list configuration.
//!
//! The watch-list is a CSV file with one row per traded symbol, the same
//! column layout as a TradeSettings sheet export. Parsing failures are fatal:
//! the process reports the error and never starts monitoring.

use std::path::Path;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schedule::TradingWindow;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read watch-list {path}: {source}")]
    Io { path: String, source: csv::Error },

    #[error("malformed watch-list row: {0}")]
    Csv(#[from] csv::Error),

    #[error("symbol {symbol}: bad time \"{value}\" (expected HH:MM)")]
    BadTime { symbol: String, value: String },

    #[error("symbol {symbol}: timeframe must be a positive number of minutes")]
    BadTimeframe { symbol: String },

    #[error("watch-list contains no symbols")]
    Empty,
}

/// Market type tag; picks the price-scale adjustment in the level formulas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketKind {
    /// Index options ("IO"): premium scale, square-root adjustment.
    IndexOption,
    /// Underlying/stock/future/commodity ("UL"): cube-root adjustment.
    Underlying,
}

impl MarketKind {
    fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().as_str() {
            "UL" => MarketKind::Underlying,
            _ => MarketKind::IndexOption,
        }
    }
}

/// Product lifetime mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductKind {
    /// Flattened at the trading-window end; state resets every day.
    Intraday,
    /// Open positions carry across trading days; no forced flatten.
    Positional,
}

impl ProductKind {
    fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "positional" => ProductKind::Positional,
            _ => ProductKind::Intraday,
        }
    }
}

impl std::fmt::Display for ProductKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductKind::Intraday => write!(f, "intraday"),
            ProductKind::Positional => write!(f, "positional"),
        }
    }
}

/// Raw CSV row. Everything is optional so a sparse sheet still loads; the
/// defaults are applied when building [`SymbolConfig`].
#[derive(Debug, Deserialize)]
struct WatchRow {
    #[serde(rename = "Symbol")]
    symbol: Option<String>,
    #[serde(rename = "Timeframe")]
    timeframe: Option<u32>,
    #[serde(rename = "EntryLots")]
    entry_lots: Option<u32>,
    #[serde(rename = "SL1Points")]
    sl1_points: Option<f64>,
    #[serde(rename = "Sl2Points")]
    sl2_points: Option<f64>,
    #[serde(rename = "Sl3Points")]
    sl3_points: Option<f64>,
    #[serde(rename = "Sl4Points")]
    sl4_points: Option<f64>,
    #[serde(rename = "Tgt1Lots")]
    tgt1_lots: Option<u32>,
    #[serde(rename = "Tgt2Lots")]
    tgt2_lots: Option<u32>,
    #[serde(rename = "Tgt3Lots")]
    tgt3_lots: Option<u32>,
    #[serde(rename = "Tgt4Lots")]
    tgt4_lots: Option<u32>,
    #[serde(rename = "T1Percent")]
    t1_percent: Option<f64>,
    #[serde(rename = "T2Percent")]
    t2_percent: Option<f64>,
    #[serde(rename = "T3Percent")]
    t3_percent: Option<f64>,
    #[serde(rename = "T4Percent")]
    t4_percent: Option<f64>,
    #[serde(rename = "StartTime")]
    start_time: Option<String>,
    #[serde(rename = "StopTime")]
    stop_time: Option<String>,
    #[serde(rename = "Market")]
    market: Option<String>,
    #[serde(rename = "ProductType")]
    product_type: Option<String>,
}

/// Immutable per-symbol configuration, created once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolConfig {
    /// Display name, as written in the watch-list.
    pub symbol: String,
    /// Unique key per watch-list row; duplicate symbols (e.g. CE and PE rows
    /// for the same index) get distinct keys.
    pub key: String,
    /// Exchange-qualified instrument id used for feed and orders.
    pub instrument: String,
    pub timeframe_min: u32,
    pub entry_lots: u32,
    pub target_lots: [u32; 4],
    pub stop_points: [f64; 4],
    pub target_percent: [f64; 4],
    pub window: TradingWindow,
    pub market: MarketKind,
    pub product: ProductKind,
}

fn parse_hhmm(symbol: &str, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|_| ConfigError::BadTime {
        symbol: symbol.to_string(),
        value: value.to_string(),
    })
}

impl SymbolConfig {
    fn from_row(row: WatchRow, index: usize) -> Result<Option<Self>, ConfigError> {
        let symbol = match row.symbol {
            Some(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => return Ok(None), // blank row, skip
        };

        let timeframe_min = match row.timeframe {
            Some(tf) if tf > 0 => tf,
            _ => return Err(ConfigError::BadTimeframe { symbol }),
        };

        let start = parse_hhmm(&symbol, row.start_time.as_deref().unwrap_or("09:15"))?;
        let end = parse_hhmm(&symbol, row.stop_time.as_deref().unwrap_or("15:15"))?;

        let instrument = if symbol.contains(':') {
            symbol.clone()
        } else {
            format!("NSE:{symbol}")
        };

        Ok(Some(Self {
            key: format!("{symbol}_{index}"),
            instrument,
            timeframe_min,
            entry_lots: row.entry_lots.unwrap_or(0),
            target_lots: [
                row.tgt1_lots.unwrap_or(0),
                row.tgt2_lots.unwrap_or(0),
                row.tgt3_lots.unwrap_or(0),
                row.tgt4_lots.unwrap_or(0),
            ],
            stop_points: [
                row.sl1_points.unwrap_or(0.0),
                row.sl2_points.unwrap_or(0.0),
                row.sl3_points.unwrap_or(0.0),
                row.sl4_points.unwrap_or(0.0),
            ],
            target_percent: [
                row.t1_percent.unwrap_or(1.0),
                row.t2_percent.unwrap_or(1.0),
                row.t3_percent.unwrap_or(1.0),
                row.t4_percent.unwrap_or(1.0),
            ],
            window: TradingWindow::new(start, end),
            market: MarketKind::parse(row.market.as_deref().unwrap_or("IO")),
            product: ProductKind::parse(row.product_type.as_deref().unwrap_or("intraday")),
            symbol,
        }))
    }
}

/// Load the watch-list from `path`. Fatal on any malformed row.
pub fn load_watchlist(path: &Path) -> Result<Vec<SymbolConfig>, ConfigError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

    let mut configs = Vec::new();
    for (index, record) in reader.deserialize::<WatchRow>().enumerate() {
        if let Some(config) = SymbolConfig::from_row(record?, index)? {
            configs.push(config);
        }
    }

    if configs.is_empty() {
        return Err(ConfigError::Empty);
    }
    Ok(configs)
}
