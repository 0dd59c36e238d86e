//! Append-only operational audit trail.
//!
//! Every detected signal, order submission/result, and stage transition is
//! written as one timestamped line. The journal is an audit artifact, not a
//! debug log: write failures are reported via tracing and otherwise ignored
//! so a full disk can never stall the trading loop.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Local;

pub struct Journal {
    file: Option<Mutex<File>>,
}

impl Journal {
    /// Open (or create) the journal file in append mode.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Some(Mutex::new(file)),
        })
    }

    /// A journal that drops everything. Used by tests.
    pub fn disabled() -> Self {
        Self { file: None }
    }

    /// Append one line, prefixed with a wall-clock timestamp. Blank lines
    /// are written bare and serve as visual separators between events.
    pub fn record(&self, line: &str) {
        let Some(file) = &self.file else {
            return;
        };

        let rendered = if line.trim().is_empty() {
            "\n".to_string()
        } else {
            format!("[{}] {}\n", Local::now().format("%Y-%m-%d %H:%M:%S"), line)
        };

        match file.lock() {
            Ok(mut f) => {
                if let Err(e) = f.write_all(rendered.as_bytes()) {
                    tracing::warn!("journal write failed: {e}");
                }
            }
            Err(_) => tracing::warn!("journal lock poisoned, dropping line"),
        }
    }
}
