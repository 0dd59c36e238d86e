//! Crash-safe state snapshots.
//!
//! The engine serializes every symbol's position record after every tick,
//! so a restart mid-session resumes exactly where it stopped. Across a date
//! boundary only open positional trades survive;
//! everything else starts the new session fresh.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::{ProductKind, SymbolConfig};
use crate::position::PositionState;

#[derive(Debug, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub trading_date: NaiveDate,
    /// Keyed by the symbol config key, not the display symbol, so duplicate
    /// watch-list rows for one symbol stay distinct.
    pub positions: HashMap<String, PositionState>,
}

pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the snapshot via a temp file and rename so a crash mid-write
    /// never leaves a truncated state file.
    pub fn save(&self, snapshot: &StateSnapshot) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }

    /// Load the previous snapshot. A missing file is a clean first start,
    /// not an error.
    pub fn load(&self) -> anyhow::Result<Option<StateSnapshot>> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()))
            }
        };
        let snapshot = serde_json::from_str(&json)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        Ok(Some(snapshot))
    }
}

/// Decide whether a persisted record applies to `today`'s session.
///
/// Same-date records are restored as-is (restart mid-session). A record from
/// an earlier date is only kept for positional trades that are actually in
/// the market; on carry the signal-check schedule is cleared so it is
/// re-derived against the new date.
pub fn restore_for(
    saved: PositionState,
    snapshot_date: NaiveDate,
    today: NaiveDate,
    cfg: &SymbolConfig,
) -> Option<PositionState> {
    if snapshot_date == today {
        return Some(saved);
    }

    let open_positional = cfg.product == ProductKind::Positional
        && saved.entry_taken
        && !saved.exited_today
        && saved.remaining_lots > 0;
    if !open_positional {
        return None;
    }

    let mut carried = saved;
    carried.next_check = None;
    Some(carried)
}
