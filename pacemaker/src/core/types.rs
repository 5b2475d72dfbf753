//! Shared deterministic types for pacemaker core logic.
//!
//! These types define stable contracts between the calculator, the detector
//! and the session orchestration. They do not depend on external state or I/O.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque classification key produced by the task classifier.
///
/// The pacemaker only uses it as a lookup key and never inspects it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskProfile(String);

impl TaskProfile {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskProfile {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Health signals supplied by the agent runtime on every start/tick/end call.
///
/// Values are clamped into `[0, 1]` on construction. NaN is preserved so that
/// the calculator can reject it instead of silently treating it as a number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VitalsSnapshot {
    pub mood: f64,
    pub focus: f64,
    pub stamina: f64,
}

impl VitalsSnapshot {
    pub fn new(mood: f64, focus: f64, stamina: f64) -> Self {
        Self {
            mood: clamp_unit(mood),
            focus: clamp_unit(focus),
            stamina: clamp_unit(stamina),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.mood.is_finite() && self.focus.is_finite() && self.stamina.is_finite()
    }

    /// Copy with non-finite values replaced by [`NEUTRAL_VITAL`].
    ///
    /// Stored and persisted snapshots go through this; JSON has no NaN.
    pub fn sanitized(&self) -> Self {
        let finite_or_neutral = |value: f64| {
            if value.is_finite() {
                value
            } else {
                NEUTRAL_VITAL
            }
        };
        Self {
            mood: finite_or_neutral(self.mood),
            focus: finite_or_neutral(self.focus),
            stamina: finite_or_neutral(self.stamina),
        }
    }
}

/// Stand-in for a vitals value the runtime could not measure.
pub const NEUTRAL_VITAL: f64 = 0.5;

/// Clamp into `[0, 1]`, leaving NaN untouched.
pub fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Band that bounds how far a budget may move away from its base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Conservative,
    Balanced,
    Aggressive,
}

impl Tier {
    /// Inclusive `(min, max)` bounds for the final budget in this tier.
    pub fn bounds(self) -> (u32, u32) {
        match self {
            Tier::Conservative => (2, 6),
            Tier::Balanced => (3, 12),
            Tier::Aggressive => (5, 20),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::Conservative => "conservative",
            Tier::Balanced => "balanced",
            Tier::Aggressive => "aggressive",
        };
        f.write_str(name)
    }
}

/// Multipliers applied to the base budget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetFactors {
    pub vitals: f64,
    pub urgency: f64,
    pub complexity: f64,
    pub success: f64,
}

impl BudgetFactors {
    pub const NEUTRAL: BudgetFactors = BudgetFactors {
        vitals: 1.0,
        urgency: 1.0,
        complexity: 1.0,
        success: 1.0,
    };

    pub fn product(&self) -> f64 {
        self.vitals * self.urgency * self.complexity * self.success
    }
}

/// Which step of the fallback chain produced a budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BudgetSource {
    /// The dynamic formula.
    Calculated,
    /// A positive override read from configuration under `key`.
    ConfigOverride { key: String },
    /// Built-in default after the formula and overrides were unusable.
    FinalDefault,
    /// Configuration itself could not be read.
    Emergency,
}

/// Result of one budget calculation. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetComputation {
    pub task_profile: TaskProfile,
    pub base_budget: u32,
    pub factors: BudgetFactors,
    pub tier: Tier,
    /// Unrounded product before tier and safety clamps.
    pub raw_budget: f64,
    pub final_budget: u32,
    pub source: BudgetSource,
    pub reasoning: String,
}

/// Observable state of a pacemaker session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotStarted,
    Active,
}

/// Per-iteration advice returned by `tick`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Continue,
    ConsiderCompletion,
    EarlyCompletionPossible,
    ExtensionPossible,
    InterventionRequired,
}

/// Category of detected degradation that selects a consultation template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionPattern {
    ProgressStagnation,
    ConfidenceLoss,
    ThinkingConfusion,
    ExcessiveTrials,
}

impl fmt::Display for InterventionPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InterventionPattern::ProgressStagnation => "progress_stagnation",
            InterventionPattern::ConfidenceLoss => "confidence_loss",
            InterventionPattern::ThinkingConfusion => "thinking_confusion",
            InterventionPattern::ExcessiveTrials => "excessive_trials",
        };
        f.write_str(name)
    }
}
