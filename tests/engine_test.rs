//! End-to-end lifecycle tests: file-backed candles in, orders out.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use swingbot::config::{MarketKind, ProductKind, SymbolConfig};
use swingbot::engine::Engine;
use swingbot::feed::{write_candle_file, CsvCandleSource, PriceBoard};
use swingbot::gateway::PaperGateway;
use swingbot::journal::Journal;
use swingbot::models::{Candle, Direction};
use swingbot::persistence::StateStore;
use swingbot::position::Stage;
use swingbot::schedule::TradingWindow;

fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 2)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

fn candle(h: u32, m: u32, open: f64, high: f64, low: f64, close: f64) -> Candle {
    Candle {
        timestamp: at(h, m, 0),
        open,
        high,
        low,
        close,
        volume: 1000.0,
    }
}

fn nifty_config() -> SymbolConfig {
    SymbolConfig {
        symbol: "NIFTY".to_string(),
        key: "NIFTY_0".to_string(),
        instrument: "NSE:NIFTY".to_string(),
        timeframe_min: 5,
        entry_lots: 10,
        target_lots: [2, 3, 3, 2],
        stop_points: [5.0, 4.0, 3.0, 2.0],
        target_percent: [1.0, 2.0, 3.0, 4.0],
        window: TradingWindow::new(
            NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
            NaiveTime::from_hms_opt(15, 15, 0).unwrap(),
        ),
        market: MarketKind::Underlying,
        product: ProductKind::Intraday,
    }
}

struct Fixture {
    dir: PathBuf,
    board: PriceBoard,
    gateway: Arc<PaperGateway>,
}

impl Fixture {
    /// Temp dir with a candle file showing a BUY pullback: green 9:25 bar
    /// (high 100, low 98) under the 9:20 bar. Entry trigger ≈ 101.21,
    /// initial stop ≈ 96.80.
    fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("swingbot-e2e-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();

        let candles = vec![
            candle(9, 20, 101.0, 104.0, 100.0, 102.0),
            candle(9, 25, 98.5, 100.0, 98.0, 99.5),
        ];
        write_candle_file(&dir.join("NSE_NIFTY.csv"), &candles).unwrap();

        Self {
            dir,
            board: PriceBoard::new(),
            gateway: Arc::new(PaperGateway::new()),
        }
    }

    fn engine(&self, with_store: bool) -> Engine {
        Engine::new(
            vec![nifty_config()],
            self.board.clone(),
            Arc::new(CsvCandleSource::new(&self.dir)),
            self.gateway.clone(),
            Arc::new(Journal::disabled()),
            with_store.then(|| StateStore::new(self.dir.join("State.json"))),
            NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
        )
        .unwrap()
    }

    /// Run the detection slot and cross the entry trigger at 101.25.
    fn enter(&self, engine: &mut Engine) {
        engine.tick(at(9, 26, 0)); // initialize schedule
        engine.tick(at(9, 30, 0)); // slot fires, signal armed
        assert_eq!(engine.traders()[0].state().stage, Stage::WaitingEntry);

        self.board.publish("NSE:NIFTY", 101.25);
        engine.tick(at(9, 30, 1));
        assert_eq!(engine.traders()[0].state().stage, Stage::InPosition);
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.dir).ok();
    }
}

#[test]
fn full_intraday_lifecycle_through_target4() {
    let fx = Fixture::new();
    let mut engine = fx.engine(false);
    fx.enter(&mut engine);

    // Targets off the 101.25 fill: 102.2625, 103.275, 104.2875, 105.3.
    for (price, h, m, stage, remaining) in [
        (102.30, 9, 35, Stage::Target1Hit, 8),
        (103.30, 9, 40, Stage::Target2Hit, 5),
        (104.30, 9, 45, Stage::Target3Hit, 2),
        (105.35, 9, 50, Stage::Target4Hit, 0),
    ] {
        fx.board.publish("NSE:NIFTY", price);
        engine.tick(at(h, m, 0));
        let state = engine.traders()[0].state();
        assert_eq!(state.stage, stage, "at price {price}");
        assert_eq!(state.remaining_lots, remaining, "at price {price}");
    }

    let orders = fx.gateway.orders();
    assert_eq!(orders.len(), 5);
    assert_eq!(orders[0].side, Direction::Buy);
    assert_eq!(orders[0].quantity, 10);
    assert!(orders[1..].iter().all(|o| o.side == Direction::Sell));
    // T4 flattens whatever is left (2), not the configured Tgt4Lots.
    assert_eq!(orders[4].quantity, 2);
    assert_eq!(orders[1..].iter().map(|o| o.quantity).sum::<u32>(), 10);

    // Ticks after the terminal stage change nothing.
    fx.board.publish("NSE:NIFTY", 110.0);
    engine.tick(at(9, 55, 0));
    assert_eq!(fx.gateway.order_count(), 5);
}

#[test]
fn initial_stop_exits_everything() {
    let fx = Fixture::new();
    let mut engine = fx.engine(false);
    fx.enter(&mut engine);

    // Initial stop ≈ 96.80 from the signal candle low.
    fx.board.publish("NSE:NIFTY", 96.5);
    engine.tick(at(9, 35, 0));

    let state = engine.traders()[0].state();
    assert_eq!(state.stage, Stage::ExitedInitialStop);
    assert_eq!(state.remaining_lots, 0);

    let orders = fx.gateway.orders();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[1].quantity, 10);
    assert_eq!(orders[1].side, Direction::Sell);
}

#[test]
fn stop_time_squares_off_exactly_once() {
    let fx = Fixture::new();
    let mut engine = fx.engine(false);
    fx.enter(&mut engine);

    fx.board.publish("NSE:NIFTY", 101.50);
    engine.tick(at(15, 15, 0));
    assert_eq!(engine.traders()[0].state().stage, Stage::ExitedAtStopTime);
    assert_eq!(fx.gateway.order_count(), 2);

    engine.tick(at(15, 15, 1));
    engine.tick(at(15, 30, 0));
    assert_eq!(fx.gateway.order_count(), 2);
}

#[test]
fn restart_resumes_same_day_position() {
    let fx = Fixture::new();
    {
        let mut engine = fx.engine(true);
        fx.enter(&mut engine);
        // The entering tick persisted the snapshot.
    }

    // Fresh engine against the same store: the position is back without
    // re-running detection or re-entering.
    let engine = fx.engine(true);
    let state = engine.traders()[0].state();
    assert_eq!(state.stage, Stage::InPosition);
    assert!(state.entry_taken);
    assert_eq!(state.entry_price, Some(101.25));
    assert_eq!(state.remaining_lots, 10);
    assert_eq!(fx.gateway.order_count(), 1); // no duplicate entry order
}

#[test]
fn one_signal_per_symbol_per_day() {
    let fx = Fixture::new();
    let mut engine = fx.engine(false);
    fx.enter(&mut engine);

    // Stop out, then let later slots come due: the symbol stays done.
    fx.board.publish("NSE:NIFTY", 96.5);
    engine.tick(at(9, 35, 0));
    assert_eq!(engine.traders()[0].state().stage, Stage::ExitedInitialStop);

    engine.tick(at(9, 40, 0));
    engine.tick(at(9, 45, 0));
    assert_eq!(engine.traders()[0].state().stage, Stage::ExitedInitialStop);
    assert_eq!(fx.gateway.order_count(), 2);
}

#[test]
fn unentered_signal_expires_at_stop_time() {
    let fx = Fixture::new();
    let mut engine = fx.engine(false);

    engine.tick(at(9, 26, 0));
    engine.tick(at(9, 30, 0));
    assert_eq!(engine.traders()[0].state().stage, Stage::WaitingEntry);

    // Price never reaches the trigger.
    fx.board.publish("NSE:NIFTY", 100.5);
    engine.tick(at(15, 15, 0));

    assert_eq!(engine.traders()[0].state().stage, Stage::ExpiredAtStopTime);
    assert_eq!(fx.gateway.order_count(), 0);
}
