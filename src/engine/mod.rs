//! The per-second evaluation loop.
//!
//! Each tick is synchronous and single-threaded: snapshot the price board
//! once, run any due signal checks, then advance every symbol's state
//! machine against the snapshot. One symbol's failure is logged and never
//! blocks the others. The async wrapper just drives `tick` from a 1 second
//! interval.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime};

use crate::config::{ProductKind, SymbolConfig};
use crate::feed::{CandleSource, PriceBoard};
use crate::gateway::OrderGateway;
use crate::journal::Journal;
use crate::persistence::{restore_for, StateSnapshot, StateStore};
use crate::position::SymbolTrader;
use crate::schedule::next_check_after;
use crate::signal;

pub struct Engine {
    traders: Vec<SymbolTrader>,
    board: PriceBoard,
    candles: Arc<dyn CandleSource>,
    gateway: Arc<dyn OrderGateway>,
    journal: Arc<Journal>,
    store: Option<StateStore>,
    trading_date: NaiveDate,
}

impl Engine {
    /// Build the engine, restoring any applicable state from `store`.
    pub fn new(
        configs: Vec<SymbolConfig>,
        board: PriceBoard,
        candles: Arc<dyn CandleSource>,
        gateway: Arc<dyn OrderGateway>,
        journal: Arc<Journal>,
        store: Option<StateStore>,
        today: NaiveDate,
    ) -> anyhow::Result<Self> {
        let saved = match &store {
            Some(store) => store.load()?,
            None => None,
        };

        let traders = configs
            .into_iter()
            .map(|cfg| {
                let restored = saved.as_ref().and_then(|snapshot| {
                    let state = snapshot.positions.get(&cfg.key)?.clone();
                    restore_for(state, snapshot.trading_date, today, &cfg)
                });
                match restored {
                    Some(state) => {
                        tracing::info!(
                            symbol = %cfg.symbol,
                            stage = ?state.stage,
                            lots = state.remaining_lots,
                            "restored persisted state"
                        );
                        SymbolTrader::with_state(cfg, state)
                    }
                    None => SymbolTrader::new(cfg),
                }
            })
            .collect();

        Ok(Self {
            traders,
            board,
            candles,
            gateway,
            journal,
            store,
            trading_date: today,
        })
    }

    pub fn traders(&self) -> &[SymbolTrader] {
        &self.traders
    }

    /// One evaluation pass at wall time `now`.
    pub fn tick(&mut self, now: NaiveDateTime) {
        if now.date() != self.trading_date {
            self.roll_day(now.date());
        }

        let prices = self.board.snapshot();
        self.run_signal_checks(now);
        self.run_traders(now, &prices);
        self.persist();
    }

    /// Date boundary: clear every record except open positional trades,
    /// which carry with a fresh check schedule.
    fn roll_day(&mut self, today: NaiveDate) {
        tracing::info!(date = %today, "new trading day");
        for trader in &mut self.traders {
            let state = trader.state();
            let carries = trader.config().product == ProductKind::Positional
                && state.entry_taken
                && !state.exited_today
                && state.remaining_lots > 0;
            if carries {
                trader.state_mut().next_check = None;
                tracing::info!(
                    symbol = %trader.config().symbol,
                    lots = trader.state().remaining_lots,
                    "carrying open positional trade forward"
                );
            } else {
                trader.reset_for_new_day();
            }
        }
        self.trading_date = today;
    }

    /// Run the candle-pattern check for every symbol whose grid slot has
    /// come due. The schedule always advances, even when the fetch fails or
    /// no pattern is present: a slot fires once.
    fn run_signal_checks(&mut self, now: NaiveDateTime) {
        for trader in &mut self.traders {
            if !trader.wants_signal_check() {
                continue;
            }

            let cfg = trader.config().clone();
            if !cfg.window.contains(now.time()) {
                continue;
            }

            let due = match trader.state().next_check {
                Some(due) => due,
                None => {
                    let due = next_check_after(now, cfg.window.start, cfg.timeframe_min);
                    trader.state_mut().next_check = Some(due);
                    continue;
                }
            };
            if now < due {
                continue;
            }
            trader.state_mut().next_check =
                Some(next_check_after(now, cfg.window.start, cfg.timeframe_min));

            match self.candles.fetch_candles(&cfg.instrument, cfg.timeframe_min) {
                Ok(candles) => {
                    if let Some(sig) = signal::detect(&candles, now, cfg.timeframe_min) {
                        trader.arm(sig, &self.journal);
                    }
                }
                Err(e) => {
                    // Transient data failures just forfeit this slot.
                    tracing::warn!(
                        symbol = %cfg.symbol,
                        "candle fetch failed, skipping this check: {e:#}"
                    );
                }
            }
        }
    }

    fn run_traders(&mut self, now: NaiveDateTime, prices: &HashMap<String, f64>) {
        for trader in &mut self.traders {
            let Some(&ltp) = prices.get(&trader.config().instrument) else {
                continue; // no quote yet this session
            };
            if let Err(e) = trader.on_tick(ltp, now, self.gateway.as_ref(), &self.journal) {
                tracing::error!(
                    symbol = %trader.config().symbol,
                    "tick evaluation failed: {e:#}"
                );
            }
        }
    }

    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let snapshot = StateSnapshot {
            trading_date: self.trading_date,
            positions: self
                .traders
                .iter()
                .map(|t| (t.config().key.clone(), t.state().clone()))
                .collect(),
        };
        if let Err(e) = store.save(&snapshot) {
            tracing::warn!("state save failed: {e:#}");
        }
    }

    /// Drive `tick` once a second until shutdown.
    pub async fn run(&mut self) {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            self.tick(Local::now().naive_local());
        }
    }
}
