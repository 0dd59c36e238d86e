//! Per-symbol position lifecycle.
//!
//! One [`SymbolTrader`] per watch-list row. A trader moves through a closed
//! set of stages: it is idle until the detector arms it, waits for price to
//! cross the entry trigger, then scales out through up to four targets with
//! a trailing ladder of stops. Every transition is driven by `on_tick` with
//! the latest traded price; order intents go out through the gateway and a
//! failed submission leaves the stage untouched so the same comparison runs
//! again on the next tick.

use anyhow::Context;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::{ProductKind, SymbolConfig};
use crate::gateway::OrderGateway;
use crate::journal::Journal;
use crate::levels;
use crate::models::{Direction, LevelSet, OrderRequest, SignalCandle};

/// Lifecycle stage. Exit stages and `Target4Hit` are terminal for the
/// trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// No signal yet.
    Idle,
    /// Signal armed, waiting for price to cross the entry trigger.
    WaitingEntry,
    /// Entered, no target hit yet; the initial stop applies.
    InPosition,
    Target1Hit,
    Target2Hit,
    Target3Hit,
    /// Target 4 flattens everything; terminal.
    Target4Hit,
    /// Stopped out on the initial stop before Target 1.
    ExitedInitialStop,
    ExitedAtStop1,
    ExitedAtStop2,
    ExitedAtStop3,
    /// Open position force-flattened at the window end (intraday only).
    ExitedAtStopTime,
    /// Signal armed but entry never triggered before the window end.
    ExpiredAtStopTime,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Stage::Target4Hit
                | Stage::ExitedInitialStop
                | Stage::ExitedAtStop1
                | Stage::ExitedAtStop2
                | Stage::ExitedAtStop3
                | Stage::ExitedAtStopTime
                | Stage::ExpiredAtStopTime
        )
    }

    /// Number of targets already hit while still in the market.
    fn targets_hit_count(&self) -> Option<usize> {
        match self {
            Stage::InPosition => Some(0),
            Stage::Target1Hit => Some(1),
            Stage::Target2Hit => Some(2),
            Stage::Target3Hit => Some(3),
            _ => None,
        }
    }

    fn after_target(hits: usize) -> Stage {
        match hits {
            1 => Stage::Target1Hit,
            2 => Stage::Target2Hit,
            3 => Stage::Target3Hit,
            _ => Stage::Target4Hit,
        }
    }

    fn stopped_out(hits: usize) -> Stage {
        match hits {
            0 => Stage::ExitedInitialStop,
            1 => Stage::ExitedAtStop1,
            2 => Stage::ExitedAtStop2,
            _ => Stage::ExitedAtStop3,
        }
    }
}

/// Mutable per-symbol record, one per trading day. Reset at the day
/// boundary unless carried forward for an open positional trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionState {
    pub stage: Stage,
    pub signal: Option<SignalCandle>,
    pub levels: Option<LevelSet>,
    pub entry_taken: bool,
    pub entry_price: Option<f64>,
    pub remaining_lots: u32,
    pub targets_hit: [bool; 4],
    pub exited_today: bool,
    /// Next scheduled signal-check timestamp (window-anchored grid).
    pub next_check: Option<NaiveDateTime>,
}

impl Default for PositionState {
    fn default() -> Self {
        Self {
            stage: Stage::Idle,
            signal: None,
            levels: None,
            entry_taken: false,
            entry_price: None,
            remaining_lots: 0,
            targets_hit: [false; 4],
            exited_today: false,
            next_check: None,
        }
    }
}

fn reached_target(direction: Direction, ltp: f64, level: f64) -> bool {
    match direction {
        Direction::Buy => ltp >= level,
        Direction::Sell => ltp <= level,
    }
}

fn breached_stop(direction: Direction, ltp: f64, level: f64) -> bool {
    match direction {
        Direction::Buy => ltp <= level,
        Direction::Sell => ltp >= level,
    }
}

pub struct SymbolTrader {
    cfg: SymbolConfig,
    state: PositionState,
}

impl SymbolTrader {
    pub fn new(cfg: SymbolConfig) -> Self {
        Self {
            cfg,
            state: PositionState::default(),
        }
    }

    /// Restore a trader from a persisted state record.
    pub fn with_state(cfg: SymbolConfig, state: PositionState) -> Self {
        Self { cfg, state }
    }

    pub fn config(&self) -> &SymbolConfig {
        &self.cfg
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut PositionState {
        &mut self.state
    }

    /// Whether the detector should still run for this symbol: one signal
    /// per symbol per trading day, suppressed once anything has happened.
    pub fn wants_signal_check(&self) -> bool {
        self.state.stage == Stage::Idle && !self.state.exited_today
    }

    /// Clear the day's state. Carry-forward decisions happen in the engine;
    /// by the time this is called the record is not being carried.
    pub fn reset_for_new_day(&mut self) {
        self.state = PositionState::default();
    }

    /// Arm the trader with a freshly detected signal: compute the
    /// speculative level set and move to `WaitingEntry`.
    pub fn arm(&mut self, signal: SignalCandle, journal: &Journal) {
        let level_set = levels::compute(&signal, &self.cfg, None);

        journal.record(&format!(
            "[SIGNAL DETECTED] {} {} | candle {}",
            self.cfg.symbol, signal.direction, signal.timestamp
        ));
        journal.record(&format!(
            "  Signal Candle High: {:.2} | Low: {:.2}",
            signal.high, signal.low
        ));
        journal.record(&format!(
            "  Entry Trigger: {:.2} | Initial Stop: {:.2}",
            level_set.entry_trigger, level_set.initial_stop
        ));
        for k in 0..4 {
            journal.record(&format!(
                "  Target {}: {:.2} | Stop {}: {:.2} | Exit Lots: {}",
                k + 1,
                level_set.targets[k],
                k + 1,
                level_set.stops[k],
                self.cfg.target_lots[k]
            ));
        }
        journal.record("");

        tracing::info!(
            symbol = %self.cfg.symbol,
            direction = %signal.direction,
            trigger = level_set.entry_trigger,
            stop = level_set.initial_stop,
            "signal armed"
        );

        self.state.signal = Some(signal);
        self.state.levels = Some(level_set);
        self.state.stage = Stage::WaitingEntry;
        self.state.remaining_lots = self.cfg.entry_lots;
    }

    /// Evaluate one price tick.
    ///
    /// Evaluation order: stop-time handling first (runs even outside the
    /// window), then entry, then staged exits — all gated on the trading
    /// window. Order failures never advance the stage.
    pub fn on_tick(
        &mut self,
        ltp: f64,
        now: NaiveDateTime,
        gateway: &dyn OrderGateway,
        journal: &Journal,
    ) -> anyhow::Result<()> {
        if self.state.stage.is_terminal() || self.state.exited_today {
            return Ok(());
        }
        if self.state.signal.is_none() {
            return Ok(()); // idle, nothing armed yet
        }

        let t = now.time();
        if self.cfg.window.is_past_end(t) {
            return self.handle_stop_time(ltp, gateway, journal);
        }
        if !self.cfg.window.contains(t) {
            return Ok(());
        }

        match self.state.stage {
            Stage::WaitingEntry => self.try_entry(ltp, gateway, journal),
            stage => match stage.targets_hit_count() {
                Some(hits) => self.manage_exits(hits, ltp, gateway, journal),
                None => Ok(()),
            },
        }
    }

    /// Window-end handling: flatten open intraday positions exactly once,
    /// expire signals that never reached entry. Positional positions are
    /// carried and simply stop being managed until the next session.
    fn handle_stop_time(
        &mut self,
        ltp: f64,
        gateway: &dyn OrderGateway,
        journal: &Journal,
    ) -> anyhow::Result<()> {
        if self.state.entry_taken {
            if self.cfg.product == ProductKind::Positional {
                return Ok(());
            }

            let lots = self.state.remaining_lots;
            if lots > 0 && self.submit_close(lots, ltp, gateway, journal) {
                self.state.stage = Stage::ExitedAtStopTime;
                self.state.exited_today = true;
                self.state.remaining_lots = 0;
                journal.record(&format!(
                    "[SQUARE OFF - StopTime] {} at {:.2}, Lots: {} (intraday)",
                    self.cfg.symbol, ltp, lots
                ));
            }
        } else {
            self.state.stage = Stage::ExpiredAtStopTime;
            self.state.exited_today = true;
            self.state.remaining_lots = 0;
            journal.record(&format!(
                "[SIGNAL EXPIRED - StopTime] {} - entry never triggered",
                self.cfg.symbol
            ));
        }
        Ok(())
    }

    fn try_entry(
        &mut self,
        ltp: f64,
        gateway: &dyn OrderGateway,
        journal: &Journal,
    ) -> anyhow::Result<()> {
        let direction = self.signal_direction()?;
        let trigger = self
            .state
            .levels
            .as_ref()
            .context("waiting for entry without levels")?
            .entry_trigger;

        if !reached_target(direction, ltp, trigger) {
            return Ok(());
        }
        if self.cfg.entry_lots == 0 {
            return Ok(()); // nothing to submit; signal expires at window end
        }

        let order = OrderRequest::new(
            &self.cfg.instrument,
            direction,
            self.cfg.entry_lots,
            ltp,
            self.cfg.product,
        );

        if !self.submit(&order, gateway, journal, "entry") {
            return Ok(());
        }

        self.state.entry_taken = true;
        self.state.entry_price = Some(ltp);
        self.state.remaining_lots = self.cfg.entry_lots;
        if let Some(level_set) = self.state.levels.as_mut() {
            level_set.rebase(ltp, direction, &self.cfg);
        }
        self.state.stage = Stage::InPosition;

        journal.record(&format!(
            "[ENTRY TAKEN] {} {} at {:.2}, Lots: {}",
            self.cfg.symbol, direction, ltp, self.cfg.entry_lots
        ));
        tracing::info!(
            symbol = %self.cfg.symbol,
            direction = %direction,
            fill = ltp,
            lots = self.cfg.entry_lots,
            "entry taken, levels rebased on fill"
        );
        Ok(())
    }

    /// Staged exit management. `hits` is the number of targets already hit:
    /// 0 means the initial stop and Target 1 are live, n means stop-after-
    /// target n and Target n+1 are live. Target 4 flattens everything.
    fn manage_exits(
        &mut self,
        hits: usize,
        ltp: f64,
        gateway: &dyn OrderGateway,
        journal: &Journal,
    ) -> anyhow::Result<()> {
        let direction = self.signal_direction()?;
        let level_set = self
            .state
            .levels
            .clone()
            .context("in position without levels")?;

        let active_stop = if hits == 0 {
            level_set.initial_stop
        } else {
            level_set.stops[hits - 1]
        };

        if breached_stop(direction, ltp, active_stop) {
            let lots = self.state.remaining_lots;
            if lots > 0 && self.submit_close(lots, ltp, gateway, journal) {
                self.state.stage = Stage::stopped_out(hits);
                self.state.exited_today = true;
                self.state.remaining_lots = 0;
                journal.record(&format!(
                    "[EXIT - {}] {} at {:.2}, Lots: {}. All positions closed.",
                    if hits == 0 {
                        "Initial SL".to_string()
                    } else {
                        format!("SL{hits}")
                    },
                    self.cfg.symbol,
                    ltp,
                    lots
                ));
            }
            return Ok(());
        }

        let target_idx = hits; // next target, 0-based
        if !reached_target(direction, ltp, level_set.targets[target_idx]) {
            return Ok(());
        }

        if target_idx == 3 {
            // Target 4 is a full flatten, not a partial scale-out.
            let lots = self.state.remaining_lots;
            if lots > 0 && self.submit_close(lots, ltp, gateway, journal) {
                self.state.stage = Stage::Target4Hit;
                self.state.targets_hit[3] = true;
                self.state.exited_today = true;
                self.state.remaining_lots = 0;
                journal.record(&format!(
                    "[T4 HIT] {} at {:.2}, Exited ALL {} lots. All positions closed.",
                    self.cfg.symbol, ltp, lots
                ));
            }
            return Ok(());
        }

        let lots = self.cfg.target_lots[target_idx];
        if lots == 0 || lots > self.state.remaining_lots {
            return Ok(()); // nothing configured to scale out at this target
        }
        if self.submit_close(lots, ltp, gateway, journal) {
            self.state.remaining_lots -= lots;
            self.state.targets_hit[target_idx] = true;
            self.state.stage = Stage::after_target(target_idx + 1);
            journal.record(&format!(
                "[T{} HIT] {} at {:.2}, Exited: {} lots, Remaining: {}",
                target_idx + 1,
                self.cfg.symbol,
                ltp,
                lots,
                self.state.remaining_lots
            ));
        }
        Ok(())
    }

    /// Submit a closing order for `lots`. Returns false on any failure so
    /// the caller leaves the stage untouched and retries next tick.
    fn submit_close(
        &self,
        lots: u32,
        ltp: f64,
        gateway: &dyn OrderGateway,
        journal: &Journal,
    ) -> bool {
        let direction = match self.state.signal.as_ref() {
            Some(signal) => signal.direction,
            None => return false,
        };
        let order = OrderRequest::new(
            &self.cfg.instrument,
            direction.closing_side(),
            lots,
            ltp,
            self.cfg.product,
        );
        self.submit(&order, gateway, journal, "close")
    }

    /// Submit an order and journal the outcome. Every submission leaves a
    /// line in the audit trail, including rejections and transport failures.
    fn submit(
        &self,
        order: &OrderRequest,
        gateway: &dyn OrderGateway,
        journal: &Journal,
        what: &str,
    ) -> bool {
        let header = format!(
            "[{} ORDER] {} ({what}) qty {} @ {:.2}",
            order.side, self.cfg.symbol, order.quantity, order.reference_price
        );
        match gateway.submit_order(order) {
            Ok(ack) if ack.accepted => {
                journal.record(&format!("{header} - Response: accepted"));
                true
            }
            Ok(_) => {
                journal.record(&format!("{header} - Response: rejected"));
                tracing::warn!(
                    symbol = %self.cfg.symbol,
                    "{what} order rejected, will retry next tick"
                );
                false
            }
            Err(e) => {
                journal.record(&format!("{header} - Response: failed ({e:#})"));
                tracing::warn!(
                    symbol = %self.cfg.symbol,
                    "{what} order submission failed: {e}, will retry next tick"
                );
                false
            }
        }
    }

    fn signal_direction(&self) -> anyhow::Result<Direction> {
        Ok(self
            .state
            .signal
            .as_ref()
            .context("no signal armed")?
            .direction)
    }
}
