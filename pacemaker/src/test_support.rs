//! Test-only helpers for building vitals, records and pacemaker homes.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use tempfile::TempDir;

use crate::core::complexity::SessionContext;
use crate::core::types::{TaskProfile, VitalsSnapshot};
use crate::io::config::{PacemakerConfig, write_config};
use crate::io::performance_log::{PerformanceRecord, RecordInput};
use crate::session::{ContextProvider, PacemakerSession};

pub fn vitals(mood: f64, focus: f64, stamina: f64) -> VitalsSnapshot {
    VitalsSnapshot::new(mood, focus, stamina)
}

pub fn healthy_vitals() -> VitalsSnapshot {
    vitals(0.9, 0.8, 0.9)
}

/// Create a deterministic record with fixed vitals and timing.
pub fn record(
    profile: &str,
    loops_used: u32,
    max_loops_set: u32,
    success: bool,
) -> PerformanceRecord {
    PerformanceRecord::new(&RecordInput {
        task_profile: &TaskProfile::new(profile),
        max_loops_set,
        loops_used,
        success,
        vitals_start: healthy_vitals(),
        vitals_end: healthy_vitals(),
        started_at: Utc::now(),
        execution_time_secs: 2.0,
    })
}

/// Context with every signal present.
pub fn busy_context(message: &str) -> SessionContext {
    SessionContext {
        file_count: Some(6),
        turn_count: Some(12),
        error_count: Some(2),
        tool_executions: Some(10),
        external_references: Some(1),
        latest_message: message.to_string(),
    }
}

/// Temporary directory holding a pacemaker config and performance log.
pub struct TestHome {
    dir: TempDir,
}

impl TestHome {
    /// Create a home whose config points the performance log inside it.
    pub fn new() -> Result<Self> {
        let home = Self {
            dir: tempfile::tempdir()?,
        };
        home.write_config(&PacemakerConfig::default())?;
        Ok(home)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join(".pacemaker/config.toml")
    }

    pub fn log_path(&self) -> PathBuf {
        self.path().join(".pacemaker/performance.jsonl")
    }

    /// Write `cfg` with its performance log redirected into this home.
    pub fn write_config(&self, cfg: &PacemakerConfig) -> Result<()> {
        let mut cfg = cfg.clone();
        cfg.pacemaker.performance_log = self.log_path();
        write_config(&self.config_path(), &cfg)
    }

    pub fn pacemaker<C: ContextProvider>(&self, context: C) -> PacemakerSession<C> {
        PacemakerSession::open(&self.config_path(), context)
    }
}
