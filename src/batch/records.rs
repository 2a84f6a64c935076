use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::Path;
use tracing::info;

/// Per-run counters, written as one row of the run ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct RunStats {
    pub successes: usize,
    pub failures: usize,
    pub total: usize,
    pub date: String,
}

impl RunStats {
    pub fn new(date: String) -> Self {
        Self {
            date,
            ..Self::default()
        }
    }

    pub fn record_success(&mut self) {
        self.successes += 1;
        self.total += 1;
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
        self.total += 1;
    }
}

/// Append `stats` to the run ledger CSV, writing the header when the file is new.
///
/// Runs that processed nothing leave the ledger untouched; returns whether a
/// row was written.
pub fn append_run_record(path: &Path, stats: &RunStats) -> Result<bool> {
    if stats.total == 0 {
        return Ok(false);
    }

    let is_new = !path.exists() || std::fs::metadata(path)?.len() == 0;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open run ledger {}", path.display()))?;

    let mut wtr = csv::WriterBuilder::new()
        .has_headers(is_new)
        .from_writer(file);
    wtr.serialize(stats)?;
    wtr.flush()?;

    info!("Recorded run in {:?}", path);
    Ok(true)
}
