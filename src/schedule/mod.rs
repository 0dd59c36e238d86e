//! Time arithmetic for candle buckets and signal-check scheduling.
//!
//! All times are exchange-local wall times (`chrono::Naive*`); the engine is
//! single-threaded per tick so nothing here needs a timezone-aware clock.

use chrono::{Duration, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Floor a wall time down to the start of its timeframe bucket.
///
/// Buckets are anchored to the hour: with a 15 minute timeframe, 9:38 floors
/// to 9:30; with a 5 minute timeframe, 9:38 floors to 9:35. Any candle
/// stamped at or after this boundary is still forming and must be ignored.
pub fn floor_to_timeframe(t: NaiveDateTime, timeframe_min: u32) -> NaiveDateTime {
    let bucket_minute = (t.minute() / timeframe_min) * timeframe_min;
    t.with_minute(bucket_minute)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

/// The first signal-check time strictly after `now`, on a grid anchored at
/// the symbol's window start: {start, start + tf, start + 2tf, ...}.
///
/// Before the window opens this is the start time itself, so the first
/// completed-candle check runs the moment the window begins.
pub fn next_check_after(
    now: NaiveDateTime,
    window_start: NaiveTime,
    timeframe_min: u32,
) -> NaiveDateTime {
    let anchor = now.date().and_time(window_start);
    if now < anchor {
        return anchor;
    }

    let step = i64::from(timeframe_min) * 60;
    let elapsed = (now - anchor).num_seconds();
    let intervals_done = elapsed / step + 1;
    anchor + Duration::seconds(intervals_done * step)
}

/// A per-symbol trading window parsed from "HH:MM" strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TradingWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Whether `t` falls inside the window. A window with start > end wraps
    /// over midnight (e.g. 22:00 to 02:00).
    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start <= t && t <= self.end
        } else {
            t >= self.start || t <= self.end
        }
    }

    /// Whether `t` has reached or passed the window end (square-off check).
    pub fn is_past_end(&self, t: NaiveTime) -> bool {
        t >= self.end
    }
}
