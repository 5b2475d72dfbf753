//! Lifecycle of one governed execution: `start` → `tick`* → `end`.
//!
//! A [`PacemakerSession`] is an owned object handed to the agent loop. It
//! holds at most one open [`SessionHandle`]; configuration and history are
//! loaded once at construction, so `tick` only compares numbers in memory.

use std::path::Path;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::core::budget::{BaseBudgetTable, BudgetCalculator, BudgetInputs};
use crate::core::complexity::{SessionContext, estimate_complexity};
use crate::core::tick::{TickReport, evaluate_tick};
use crate::core::types::{BudgetComputation, SessionState, TaskProfile, VitalsSnapshot};
use crate::core::urgency::estimate_urgency;
use crate::fallback::resolve_budget;
use crate::io::config::{ConfigSnapshot, PacemakerConfig};
use crate::io::performance_log::{PerformanceRecord, PerformanceStore, RecordInput};

/// Supplies the conversation/context snapshot at session start.
pub trait ContextProvider {
    fn snapshot(&self) -> SessionContext;
}

impl ContextProvider for SessionContext {
    fn snapshot(&self) -> SessionContext {
        self.clone()
    }
}

/// Loop settings owned by the caller's execution loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopSettings {
    pub max_loops: u32,
}

/// Bookkeeping for the open session. Lives from `start` to `end`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionHandle {
    pub id: String,
    pub task_profile: TaskProfile,
    pub budget: u32,
    pub started_at: DateTime<Utc>,
    pub vitals_start: VitalsSnapshot,
    /// Historical success rate captured at start for `tick`.
    pub success_rate: f64,
}

/// Result of `start`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStart {
    pub session_id: String,
    pub computation: BudgetComputation,
    /// Budget suggested by past successful sessions, if any.
    pub historical_recommendation: Option<u32>,
    /// Id of a stale handle discarded by this start.
    pub replaced_session: Option<String>,
}

/// Misuse of the lifecycle. Returned, never raised; state is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("`{operation}` called with no active session")]
    NoActiveSession { operation: &'static str },
}

pub struct PacemakerSession<C> {
    calculator: BudgetCalculator,
    config: ConfigSnapshot,
    store: PerformanceStore,
    context: C,
    active: Option<SessionHandle>,
}

impl<C: ContextProvider> PacemakerSession<C> {
    pub fn new(config: ConfigSnapshot, store: PerformanceStore, context: C) -> Self {
        let table = match &config {
            ConfigSnapshot::Loaded(cfg) => {
                BaseBudgetTable::with_overrides(&cfg.pacemaker.base_budgets)
            }
            ConfigSnapshot::Unreadable(_) => BaseBudgetTable::default(),
        };
        Self {
            calculator: BudgetCalculator::new(table),
            config,
            store,
            context,
            active: None,
        }
    }

    /// Load configuration from `config_path` and open the configured history.
    ///
    /// A relative performance log path is resolved against the config's directory.
    pub fn open(config_path: &Path, context: C) -> Self {
        let config = ConfigSnapshot::load(config_path);
        let log_path = config.config_or_default().performance_log_path(config_path);
        let store = PerformanceStore::open(&log_path);
        Self::new(config, store, context)
    }

    pub fn state(&self) -> SessionState {
        if self.active.is_some() {
            SessionState::Active
        } else {
            SessionState::NotStarted
        }
    }

    pub fn active(&self) -> Option<&SessionHandle> {
        self.active.as_ref()
    }

    pub fn store(&self) -> &PerformanceStore {
        &self.store
    }

    pub fn config(&self) -> PacemakerConfig {
        self.config.config_or_default()
    }

    /// Compute a budget without opening a session.
    pub fn compute_budget(
        &self,
        profile: &TaskProfile,
        vitals: VitalsSnapshot,
    ) -> BudgetComputation {
        let context = self.context.snapshot();
        let inputs = BudgetInputs {
            vitals,
            urgency: estimate_urgency(&context.latest_message),
            complexity: estimate_complexity(&context),
            success_rate: self.store.success_rate(profile),
        };
        debug!(
            profile = %profile,
            urgency = inputs.urgency,
            complexity = inputs.complexity,
            success_rate = inputs.success_rate,
            "budget inputs"
        );
        resolve_budget(profile, self.calculator.calculate(profile, &inputs), &self.config)
    }

    /// Open a session and store its budget on `loop_settings`.
    ///
    /// An already open session is discarded with a warning.
    #[instrument(skip_all, fields(profile = %profile))]
    pub fn start(
        &mut self,
        profile: &TaskProfile,
        vitals: VitalsSnapshot,
        loop_settings: &mut LoopSettings,
    ) -> SessionStart {
        let replaced_session = self.active.take().map(|stale| {
            warn!(
                stale_session = %stale.id,
                stale_profile = %stale.task_profile,
                "start called while active, discarding stale session"
            );
            stale.id
        });

        let computation = self.compute_budget(profile, vitals);
        let historical_recommendation = self.store.recommended_budget(profile);
        loop_settings.max_loops = computation.final_budget;

        let handle = SessionHandle {
            id: Uuid::new_v4().to_string(),
            task_profile: profile.clone(),
            budget: computation.final_budget,
            started_at: Utc::now(),
            vitals_start: vitals.sanitized(),
            success_rate: self.store.success_rate(profile),
        };
        info!(
            session = %handle.id,
            budget = handle.budget,
            historical = ?historical_recommendation,
            "session started"
        );
        let session_id = handle.id.clone();
        self.active = Some(handle);

        SessionStart {
            session_id,
            computation,
            historical_recommendation,
            replaced_session,
        }
    }

    /// Advice for the current iteration. In-memory comparisons only.
    pub fn tick(
        &self,
        current_iteration: u32,
        vitals: VitalsSnapshot,
    ) -> Result<TickReport, SessionError> {
        let handle = self
            .active
            .as_ref()
            .ok_or(SessionError::NoActiveSession { operation: "tick" })?;
        let report = evaluate_tick(current_iteration, handle.budget, &vitals, handle.success_rate);
        if report.detection.required {
            debug!(
                session = %handle.id,
                iteration = current_iteration,
                reason = ?report.detection.reason,
                "intervention required"
            );
        }
        Ok(report)
    }

    /// Close the session and append its record to the history.
    #[instrument(skip(self, vitals))]
    pub fn end(
        &mut self,
        success: bool,
        iterations_used: u32,
        vitals: VitalsSnapshot,
    ) -> Result<PerformanceRecord, SessionError> {
        let Some(handle) = self.active.take() else {
            warn!("end called with no active session");
            return Err(SessionError::NoActiveSession { operation: "end" });
        };

        let elapsed = Utc::now() - handle.started_at;
        let record = PerformanceRecord::new(&RecordInput {
            task_profile: &handle.task_profile,
            max_loops_set: handle.budget,
            loops_used: iterations_used,
            success,
            vitals_start: handle.vitals_start,
            vitals_end: vitals.sanitized(),
            started_at: handle.started_at,
            execution_time_secs: elapsed.num_milliseconds().max(0) as f64 / 1000.0,
        });
        self.store.append(record.clone());
        info!(
            session = %handle.id,
            profile = %handle.task_profile,
            efficiency = record.efficiency,
            "session ended"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{BudgetSource, Recommendation};

    fn healthy() -> VitalsSnapshot {
        VitalsSnapshot::new(0.9, 0.8, 0.9)
    }

    fn session() -> PacemakerSession<SessionContext> {
        PacemakerSession::new(
            ConfigSnapshot::Loaded(PacemakerConfig::default()),
            PerformanceStore::in_memory(),
            SessionContext::default(),
        )
    }

    #[test]
    fn start_sets_loop_budget_and_opens_handle() {
        let mut pacemaker = session();
        let mut settings = LoopSettings::default();
        let started = pacemaker.start(&"BUG_FIX".into(), healthy(), &mut settings);

        assert_eq!(pacemaker.state(), SessionState::Active);
        assert_eq!(settings.max_loops, started.computation.final_budget);
        assert_eq!(started.computation.source, BudgetSource::Calculated);
        assert_eq!(started.replaced_session, None);
        assert_eq!(pacemaker.active().map(|h| h.budget), Some(settings.max_loops));
    }

    #[test]
    fn double_start_replaces_stale_handle() {
        let mut pacemaker = session();
        let mut settings = LoopSettings::default();
        let first = pacemaker.start(&"BUG_FIX".into(), healthy(), &mut settings);
        let second = pacemaker.start(&"RESEARCH".into(), healthy(), &mut settings);

        assert_eq!(second.replaced_session, Some(first.session_id));
        let handle = pacemaker.active().expect("active");
        assert_eq!(handle.task_profile, TaskProfile::new("RESEARCH"));
        assert!(pacemaker.store().records().is_empty());
    }

    #[test]
    fn tick_at_budget_suggests_completion() {
        let mut pacemaker = session();
        let mut settings = LoopSettings::default();
        pacemaker.start(&"BUG_FIX".into(), healthy(), &mut settings);

        let report = pacemaker.tick(settings.max_loops, healthy()).expect("tick");
        assert!(matches!(
            report.recommendation,
            Recommendation::ConsiderCompletion | Recommendation::ExtensionPossible
        ));
    }

    #[test]
    fn tick_without_session_is_soft_error() {
        let pacemaker = session();
        assert_eq!(
            pacemaker.tick(1, healthy()).expect_err("no session"),
            SessionError::NoActiveSession { operation: "tick" }
        );
    }

    #[test]
    fn end_without_start_leaves_state_unchanged() {
        let mut pacemaker = session();
        let err = pacemaker.end(true, 3, healthy()).expect_err("no session");
        assert_eq!(err, SessionError::NoActiveSession { operation: "end" });
        assert_eq!(pacemaker.state(), SessionState::NotStarted);
        assert!(pacemaker.store().records().is_empty());
    }

    #[test]
    fn end_records_and_resets() {
        let mut pacemaker = session();
        let mut settings = LoopSettings::default();
        pacemaker.start(&"BUG_FIX".into(), healthy(), &mut settings);
        let record = pacemaker.end(true, 4, healthy()).expect("end");

        assert_eq!(record.loops_used, 4);
        assert_eq!(record.max_loops_set, settings.max_loops);
        assert_eq!(pacemaker.state(), SessionState::NotStarted);
        assert_eq!(pacemaker.store().records().len(), 1);
        assert_eq!(pacemaker.store().success_rate(&"BUG_FIX".into()), 1.0);
    }

    #[test]
    fn unmeasured_vitals_are_stored_finite() {
        let mut pacemaker = session();
        let mut settings = LoopSettings::default();
        pacemaker.start(
            &"BUG_FIX".into(),
            VitalsSnapshot::new(f64::NAN, 0.5, 0.5),
            &mut settings,
        );
        assert!(pacemaker.active().expect("active").vitals_start.is_finite());

        let record = pacemaker
            .end(false, 2, VitalsSnapshot::new(0.4, f64::NAN, 0.6))
            .expect("end");
        assert!(record.vitals_start.is_finite());
        assert!(record.vitals_end.is_finite());
        let line = serde_json::to_string(&record).expect("json");
        assert!(!line.contains("null"), "{line}");
    }

    #[test]
    fn invalid_vitals_fall_back_to_configured_budget() {
        let mut cfg = PacemakerConfig::default();
        cfg.pacemaker.dynamic_limits.max_loops = Some(9);
        let mut pacemaker = PacemakerSession::new(
            ConfigSnapshot::Loaded(cfg),
            PerformanceStore::in_memory(),
            SessionContext::default(),
        );
        let mut settings = LoopSettings::default();
        let started = pacemaker.start(
            &"BUG_FIX".into(),
            VitalsSnapshot::new(f64::NAN, 0.5, 0.5),
            &mut settings,
        );
        assert_eq!(settings.max_loops, 9);
        assert!(matches!(
            started.computation.source,
            BudgetSource::ConfigOverride { .. }
        ));
    }
}
