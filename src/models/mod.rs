use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ProductKind;

/// Trade direction inferred from the signal candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// The side that closes a position opened in this direction.
    pub fn closing_side(&self) -> Direction {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

/// One OHLCV bar for a timeframe bucket.
///
/// Timestamps are the bucket open time in exchange-local wall time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// The completed candle that triggered a signal, retained for level
/// recalculation after the actual entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalCandle {
    pub direction: Direction,
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl SignalCandle {
    pub fn from_candle(candle: &Candle, direction: Direction) -> Self {
        Self {
            direction,
            timestamp: candle.timestamp,
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
        }
    }

    /// The candle extreme that anchors the entry trigger: high for BUY,
    /// low for SELL.
    pub fn anchor(&self) -> f64 {
        match self.direction {
            Direction::Buy => self.high,
            Direction::Sell => self.low,
        }
    }
}

/// Entry trigger, protective stop, and the four target/stop pairs derived
/// from a signal candle.
///
/// The initial stop guards the run from entry to Target 1; `stops[k]`
/// becomes the active stop once `targets[k]` has been hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelSet {
    pub entry_trigger: f64,
    pub initial_stop: f64,
    pub targets: [f64; 4],
    pub stops: [f64; 4],
}

/// An order intent handed to the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub id: Uuid,
    pub instrument: String,
    pub side: Direction,
    pub quantity: u32,
    pub reference_price: f64,
    pub product: ProductKind,
}

impl OrderRequest {
    pub fn new(
        instrument: &str,
        side: Direction,
        quantity: u32,
        reference_price: f64,
        product: ProductKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            instrument: instrument.to_string(),
            side,
            quantity,
            reference_price,
            product,
        }
    }
}

/// Gateway response. A submission can fail either by transport error or by
/// an explicit rejection; callers treat both the same way (retry next tick).
#[derive(Debug, Clone)]
pub struct OrderAck {
    pub order_id: Uuid,
    pub accepted: bool,
}
