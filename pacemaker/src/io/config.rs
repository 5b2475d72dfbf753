//! Pacemaker configuration stored under `.pacemaker/config.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_CONFIG_PATH: &str = ".pacemaker/config.toml";
/// Relative to the directory holding the config file.
pub const DEFAULT_PERFORMANCE_LOG: &str = "performance.jsonl";

/// Configuration (TOML). Missing fields default to built-in values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct PacemakerConfig {
    pub pacemaker: PacemakerSection,
    /// Legacy loop settings from the graph executor.
    pub graph_state: GraphStateSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct PacemakerSection {
    /// Append-only performance history (JSON lines). A relative path is
    /// resolved against the config file's directory.
    pub performance_log: PathBuf,

    /// Invalid consultation replies tolerated before cancelling. Unbounded if absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_invalid_inputs: Option<u32>,

    pub dynamic_limits: DynamicLimits,

    /// Per-profile base budget overrides layered over the built-in table.
    pub base_budgets: BTreeMap<String, u32>,
}

impl Default for PacemakerSection {
    fn default() -> Self {
        Self {
            performance_log: PathBuf::from(DEFAULT_PERFORMANCE_LOG),
            max_invalid_inputs: None,
            dynamic_limits: DynamicLimits::default(),
            base_budgets: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct DynamicLimits {
    /// Fallback override; signed so that non-positive values are skipped, not rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_loops: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct GraphStateSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_loops: Option<i64>,
}

impl PacemakerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.pacemaker.performance_log.as_os_str().is_empty() {
            return Err(anyhow!("pacemaker.performanceLog must be a non-empty path"));
        }
        if self.pacemaker.max_invalid_inputs == Some(0) {
            return Err(anyhow!("pacemaker.maxInvalidInputs must be > 0 when set"));
        }
        if let Some((key, _)) = self.pacemaker.base_budgets.iter().find(|(_, v)| **v == 0) {
            return Err(anyhow!("pacemaker.baseBudgets.{key} must be > 0"));
        }
        Ok(())
    }

    /// Performance log location for a config read from `config_path`.
    pub fn performance_log_path(&self, config_path: &Path) -> PathBuf {
        let log = &self.pacemaker.performance_log;
        match config_path.parent() {
            Some(dir) if log.is_relative() => dir.join(log),
            _ => log.clone(),
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PacemakerConfig::default()`.
pub fn load_config(path: &Path) -> Result<PacemakerConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        let cfg = PacemakerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PacemakerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &PacemakerConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

/// Configuration as captured once at construction time.
///
/// An unreadable file does not stop the pacemaker: budgets fall through to
/// built-in constants and the fallback chain reports the emergency level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSnapshot {
    Loaded(PacemakerConfig),
    Unreadable(String),
}

impl ConfigSnapshot {
    pub fn load(path: &Path) -> Self {
        match load_config(path) {
            Ok(cfg) => ConfigSnapshot::Loaded(cfg),
            Err(err) => {
                warn!(path = %path.display(), error = %format!("{err:#}"), "config unreadable");
                ConfigSnapshot::Unreadable(format!("{err:#}"))
            }
        }
    }

    /// Loaded config, or defaults when it could not be read.
    pub fn config_or_default(&self) -> PacemakerConfig {
        match self {
            ConfigSnapshot::Loaded(cfg) => cfg.clone(),
            ConfigSnapshot::Unreadable(_) => PacemakerConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, PacemakerConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let mut cfg = PacemakerConfig::default();
        cfg.pacemaker.dynamic_limits.max_loops = Some(12);
        cfg.pacemaker.base_budgets.insert("BUG_FIX".to_string(), 9);
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn parses_camel_case_keys() {
        let raw = r#"
[pacemaker]
performanceLog = "logs/perf.jsonl"
maxInvalidInputs = 3

[pacemaker.dynamicLimits]
maxLoops = 12

[graphState]
maxLoops = -1
"#;
        let cfg: PacemakerConfig = toml::from_str(raw).expect("parse");
        assert_eq!(cfg.pacemaker.performance_log, PathBuf::from("logs/perf.jsonl"));
        assert_eq!(cfg.pacemaker.max_invalid_inputs, Some(3));
        assert_eq!(cfg.pacemaker.dynamic_limits.max_loops, Some(12));
        assert_eq!(cfg.graph_state.max_loops, Some(-1));
        cfg.validate().expect("negative legacy override is still a valid file");
    }

    #[test]
    fn rejects_zero_base_budget() {
        let mut cfg = PacemakerConfig::default();
        cfg.pacemaker.base_budgets.insert("BUG_FIX".to_string(), 0);
        let err = cfg.validate().expect_err("zero base budget");
        assert!(err.to_string().contains("BUG_FIX"));
    }

    #[test]
    fn relative_log_path_follows_config_directory() {
        let cfg = PacemakerConfig::default();
        assert_eq!(
            cfg.performance_log_path(Path::new("/srv/agent/.pacemaker/config.toml")),
            PathBuf::from("/srv/agent/.pacemaker/performance.jsonl")
        );
        assert_eq!(
            cfg.performance_log_path(Path::new(DEFAULT_CONFIG_PATH)),
            PathBuf::from(".pacemaker/performance.jsonl")
        );
        assert_eq!(
            cfg.performance_log_path(Path::new("config.toml")),
            PathBuf::from(DEFAULT_PERFORMANCE_LOG)
        );

        let mut absolute = PacemakerConfig::default();
        absolute.pacemaker.performance_log = PathBuf::from("/var/log/perf.jsonl");
        assert_eq!(
            absolute.performance_log_path(Path::new("/srv/agent/config.toml")),
            PathBuf::from("/var/log/perf.jsonl")
        );
    }

    #[test]
    fn malformed_file_yields_unreadable_snapshot() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[pacemaker\nmaxLoops = ").expect("write");
        let snapshot = ConfigSnapshot::load(&path);
        assert!(matches!(snapshot, ConfigSnapshot::Unreadable(_)));
        assert_eq!(snapshot.config_or_default(), PacemakerConfig::default());
    }
}
