//! Price-level derivation.
//!
//! Everything here is pure: the caller copies the returned [`LevelSet`] into
//! its position state. The entry trigger and initial stop are anchored to
//! the signal candle's extremes and never move; the targets and post-target
//! stops are re-derived from the realized fill once entry happens.

use crate::config::{MarketKind, SymbolConfig};
use crate::models::{Direction, LevelSet, SignalCandle};

/// Scale coefficient shared by both market types.
const ADJ_COEFF: f64 = 0.2611;

/// Price-scale adjustment: option premia move on a square-root scale,
/// underlyings on a cube-root scale.
fn adjustment(value: f64, market: MarketKind) -> f64 {
    let root = match market {
        MarketKind::IndexOption => value.sqrt(),
        MarketKind::Underlying => value.cbrt(),
    };
    root * ADJ_COEFF
}

/// Entry trigger: one adjustment beyond the signal candle extreme, in the
/// direction of the trade.
pub fn entry_trigger(signal: &SignalCandle, market: MarketKind) -> f64 {
    match signal.direction {
        Direction::Buy => signal.high + adjustment(signal.high, market),
        Direction::Sell => signal.low - adjustment(signal.low, market),
    }
}

/// Initial protective stop: one adjustment beyond the opposite extreme.
pub fn initial_stop(signal: &SignalCandle, market: MarketKind) -> f64 {
    match signal.direction {
        Direction::Buy => signal.low - adjustment(signal.low, market),
        Direction::Sell => signal.high + adjustment(signal.high, market),
    }
}

/// The four target / post-target-stop pairs anchored at `entry_price`.
///
/// Target k sits `target_percent[k]` percent from the entry price. The first
/// stop sits `stop_points[0]` points behind the entry; each later stop sits
/// `stop_points[k]` points behind the previous target.
fn ladder(entry_price: f64, direction: Direction, cfg: &SymbolConfig) -> ([f64; 4], [f64; 4]) {
    let sign = match direction {
        Direction::Buy => 1.0,
        Direction::Sell => -1.0,
    };

    let mut targets = [0.0; 4];
    for (k, pct) in cfg.target_percent.iter().enumerate() {
        targets[k] = entry_price + sign * entry_price * pct / 100.0;
    }

    let mut stops = [0.0; 4];
    stops[0] = entry_price - sign * cfg.stop_points[0];
    for k in 1..4 {
        stops[k] = targets[k - 1] - sign * cfg.stop_points[k];
    }

    (targets, stops)
}

/// Compute the full level set for a signal.
///
/// With `fill_price = None` the targets are speculative, anchored at the
/// entry trigger itself; pass the realized fill to get the authoritative
/// set. The trigger and initial stop come from the signal candle either way.
pub fn compute(signal: &SignalCandle, cfg: &SymbolConfig, fill_price: Option<f64>) -> LevelSet {
    let trigger = entry_trigger(signal, cfg.market);
    let stop = initial_stop(signal, cfg.market);
    let entry_price = fill_price.unwrap_or(trigger);
    let (targets, stops) = ladder(entry_price, signal.direction, cfg);

    LevelSet {
        entry_trigger: trigger,
        initial_stop: stop,
        targets,
        stops,
    }
}

impl LevelSet {
    /// Re-derive targets and post-target stops from the realized fill price.
    /// The entry trigger and initial stop are left untouched.
    pub fn rebase(&mut self, fill_price: f64, direction: Direction, cfg: &SymbolConfig) {
        let (targets, stops) = ladder(fill_price, direction, cfg);
        self.targets = targets;
        self.stops = stops;
    }
}
