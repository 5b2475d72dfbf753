//! Append-only performance history (`.pacemaker/performance.jsonl`).
//!
//! One JSON record per line. Per-profile aggregates are derived from the
//! records and never persisted, so replaying the log rebuilds them exactly.
//!
//! The store assumes a single writer per file. Concurrent pacemakers
//! appending to the same path are not coordinated.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::types::{TaskProfile, VitalsSnapshot};

/// EMA learning rate for the running averages.
pub const LEARNING_RATE: f64 = 0.1;
/// Success rate assumed for a profile with no history.
pub const DEFAULT_SUCCESS_RATE: f64 = 0.8;
pub const SAFETY_MARGIN: f64 = 1.2;
pub const MIN_RECOMMENDED_BUDGET: u32 = 2;

/// Outcome of one governed session. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub task_profile: TaskProfile,
    pub loops_used: u32,
    pub max_loops_set: u32,
    pub success: bool,
    pub execution_time_secs: f64,
    /// `loops_used / max_loops_set`.
    pub efficiency: f64,
    pub vitals_start: VitalsSnapshot,
    pub vitals_end: VitalsSnapshot,
    /// Session start time (RFC 3339).
    pub timestamp: DateTime<Utc>,
}

/// Inputs for building a [`PerformanceRecord`] at session end.
#[derive(Debug, Clone)]
pub struct RecordInput<'a> {
    pub task_profile: &'a TaskProfile,
    pub max_loops_set: u32,
    pub loops_used: u32,
    pub success: bool,
    pub vitals_start: VitalsSnapshot,
    pub vitals_end: VitalsSnapshot,
    pub started_at: DateTime<Utc>,
    pub execution_time_secs: f64,
}

impl PerformanceRecord {
    pub fn new(input: &RecordInput<'_>) -> Self {
        Self {
            task_profile: input.task_profile.clone(),
            loops_used: input.loops_used,
            max_loops_set: input.max_loops_set,
            success: input.success,
            execution_time_secs: input.execution_time_secs,
            efficiency: efficiency(input.loops_used, input.max_loops_set),
            vitals_start: input.vitals_start,
            vitals_end: input.vitals_end,
            timestamp: input.started_at,
        }
    }
}

fn efficiency(loops_used: u32, max_loops_set: u32) -> f64 {
    if max_loops_set == 0 {
        return 0.0;
    }
    f64::from(loops_used) / f64::from(max_loops_set)
}

/// Derived aggregates for one task profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileStats {
    pub total_sessions: u32,
    pub successes: u32,
    pub avg_loops_used: Option<f64>,
    pub avg_efficiency: Option<f64>,
    /// Average iterations over successful sessions only.
    pub avg_successful_loops: Option<f64>,
}

impl ProfileStats {
    fn observe(&mut self, record: &PerformanceRecord) {
        self.total_sessions += 1;
        ema(&mut self.avg_loops_used, f64::from(record.loops_used));
        ema(&mut self.avg_efficiency, record.efficiency);
        if record.success {
            self.successes += 1;
            ema(&mut self.avg_successful_loops, f64::from(record.loops_used));
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_sessions == 0 {
            return DEFAULT_SUCCESS_RATE;
        }
        f64::from(self.successes) / f64::from(self.total_sessions)
    }

    pub fn recommended_budget(&self) -> Option<u32> {
        let avg = self.avg_successful_loops?;
        let budget = (avg * SAFETY_MARGIN).round() as u32;
        Some(budget.max(MIN_RECOMMENDED_BUDGET))
    }
}

/// First sample seeds the average.
fn ema(slot: &mut Option<f64>, sample: f64) {
    *slot = Some(match *slot {
        Some(current) => current + LEARNING_RATE * (sample - current),
        None => sample,
    });
}

/// Rebuild per-profile aggregates from records in append order.
pub fn replay(records: &[PerformanceRecord]) -> BTreeMap<TaskProfile, ProfileStats> {
    let mut stats: BTreeMap<TaskProfile, ProfileStats> = BTreeMap::new();
    for record in records {
        stats
            .entry(record.task_profile.clone())
            .or_default()
            .observe(record);
    }
    stats
}

/// Durable store with in-memory aggregates.
#[derive(Debug)]
pub struct PerformanceStore {
    /// `None` once the store runs in memory only.
    path: Option<PathBuf>,
    records: Vec<PerformanceRecord>,
    stats: BTreeMap<TaskProfile, ProfileStats>,
}

impl PerformanceStore {
    /// Open the log at `path` and load its history.
    ///
    /// Never fails: a missing file means no history, an unreadable file
    /// degrades the store to in-memory mode for the rest of the process.
    pub fn open(path: &Path) -> Self {
        match load_history(path) {
            Ok(records) => {
                info!(
                    path = %path.display(),
                    records = records.len(),
                    "performance history loaded"
                );
                let stats = replay(&records);
                Self {
                    path: Some(path.to_path_buf()),
                    records,
                    stats,
                }
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %format!("{err:#}"),
                    "performance history unreadable, continuing in memory"
                );
                Self::in_memory()
            }
        }
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            records: Vec::new(),
            stats: BTreeMap::new(),
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.path.is_some()
    }

    /// Append a record and fold it into the aggregates.
    ///
    /// A write failure is logged and switches the store to in-memory mode;
    /// the record is still kept for this process.
    pub fn append(&mut self, record: PerformanceRecord) {
        if let Some(path) = &self.path
            && let Err(err) = append_line(path, &record)
        {
            warn!(
                path = %path.display(),
                error = %format!("{err:#}"),
                "performance log append failed, continuing in memory"
            );
            self.path = None;
        }
        self.stats
            .entry(record.task_profile.clone())
            .or_default()
            .observe(&record);
        self.records.push(record);
    }

    pub fn records(&self) -> &[PerformanceRecord] {
        &self.records
    }

    pub fn stats(&self, profile: &TaskProfile) -> Option<&ProfileStats> {
        self.stats.get(profile)
    }

    pub fn profiles(&self) -> impl Iterator<Item = (&TaskProfile, &ProfileStats)> {
        self.stats.iter()
    }

    pub fn success_rate(&self, profile: &TaskProfile) -> f64 {
        self.stats
            .get(profile)
            .map_or(DEFAULT_SUCCESS_RATE, ProfileStats::success_rate)
    }

    /// `None` when the profile has no successful session yet.
    pub fn recommended_budget(&self, profile: &TaskProfile) -> Option<u32> {
        self.stats.get(profile)?.recommended_budget()
    }
}

/// Read every parseable record.
///
/// Lines that are not UTF-8 or not a valid record are skipped with a warning.
pub fn load_history(path: &Path) -> Result<Vec<PerformanceRecord>> {
    let contents = match fs::read(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no performance history yet");
            return Ok(Vec::new());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("read {}", path.display()));
        }
    };

    let mut records = Vec::new();
    for (index, raw) in contents.split(|byte| *byte == b'\n').enumerate() {
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line,
            Err(err) => {
                skip_line(path, index, &err);
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<PerformanceRecord>(line) {
            Ok(record) => records.push(record),
            Err(err) => skip_line(path, index, &err),
        }
    }
    Ok(records)
}

fn skip_line(path: &Path, index: usize, err: &dyn std::error::Error) {
    warn!(
        path = %path.display(),
        line = index + 1,
        error = %err,
        "skipping corrupt performance record"
    );
}

fn append_line(path: &Path, record: &PerformanceRecord) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let mut line = serde_json::to_string(record).context("serialize performance record")?;
    line.push('\n');

    // The handle is dropped (and closed) on every return path.
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("append {}", path.display()))?;
    file.flush()
        .with_context(|| format!("flush {}", path.display()))?;
    Ok(())
}
