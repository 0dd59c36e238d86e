//! Candlestick signal detection.
//!
//! The detector looks at the two most recent *completed* candles. The
//! still-forming candle is excluded by flooring "now" to the timeframe
//! boundary and discarding anything stamped at or after it.
//!
//! BUY: the latest completed candle closed bullish but printed a lower high
//! and a lower low than the candle before it (a green pullback bar).
//! SELL is the mirror image: a red bar with a higher high and higher low.

use chrono::NaiveDateTime;

use crate::models::{Candle, Direction, SignalCandle};
use crate::schedule::floor_to_timeframe;

/// Slice off the candles that have finished forming as of `now`.
/// Input must be ascending by timestamp (the candle-source contract).
pub fn completed_candles(candles: &[Candle], now: NaiveDateTime, timeframe_min: u32) -> &[Candle] {
    let boundary = floor_to_timeframe(now, timeframe_min);
    let end = candles.partition_point(|c| c.timestamp < boundary);
    &candles[..end]
}

/// Pattern check over one pair of adjacent completed candles.
pub fn detect_pattern(prev: &Candle, current: &Candle) -> Option<Direction> {
    if current.is_bullish() && current.high < prev.high && current.low < prev.low {
        Some(Direction::Buy)
    } else if current.is_bearish() && current.high > prev.high && current.low > prev.low {
        Some(Direction::Sell)
    } else {
        None
    }
}

/// Run detection over the candle history for one symbol.
///
/// Returns `None` both when no pattern is present and when there are fewer
/// than two completed candles — insufficient data is not an error, the
/// check simply does not fire this slot.
pub fn detect(candles: &[Candle], now: NaiveDateTime, timeframe_min: u32) -> Option<SignalCandle> {
    let completed = completed_candles(candles, now, timeframe_min);
    if completed.len() < 2 {
        return None;
    }

    let current = &completed[completed.len() - 1];
    let prev = &completed[completed.len() - 2];

    detect_pattern(prev, current).map(|direction| SignalCandle::from_candle(current, direction))
}
