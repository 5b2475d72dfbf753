//! Per-iteration recommendation rules.
//!
//! Pure threshold comparisons so `tick` never stalls the governed loop.

use serde::{Deserialize, Serialize};

use crate::core::degradation::{Detection, detect};
use crate::core::types::{Recommendation, VitalsSnapshot};

const EXTENSION_PROGRESS: f64 = 0.8;
const EARLY_COMPLETION_PROGRESS: f64 = 0.5;
const EARLY_COMPLETION_VITALS: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub current_iteration: u32,
    pub budget: u32,
    pub progress_rate: f64,
    pub recommendation: Recommendation,
    pub detection: Detection,
}

/// `current_iteration / budget`; a zero budget counts as exhausted.
pub fn progress_rate(current_iteration: u32, budget: u32) -> f64 {
    if budget == 0 {
        return 1.0;
    }
    f64::from(current_iteration) / f64::from(budget)
}

pub fn evaluate_tick(
    current_iteration: u32,
    budget: u32,
    vitals: &VitalsSnapshot,
    success_rate: f64,
) -> TickReport {
    let progress = progress_rate(current_iteration, budget);
    let detection = detect(vitals, success_rate);
    let recommendation = recommend(progress, vitals, &detection);
    TickReport {
        current_iteration,
        budget,
        progress_rate: progress,
        recommendation,
        detection,
    }
}

fn recommend(progress: f64, vitals: &VitalsSnapshot, detection: &Detection) -> Recommendation {
    if detection.required {
        Recommendation::InterventionRequired
    } else if progress >= 1.0 {
        Recommendation::ConsiderCompletion
    } else if progress > EXTENSION_PROGRESS {
        Recommendation::ExtensionPossible
    } else if progress > EARLY_COMPLETION_PROGRESS
        && vitals.stamina >= EARLY_COMPLETION_VITALS
        && vitals.focus >= EARLY_COMPLETION_VITALS
    {
        Recommendation::EarlyCompletionPossible
    } else {
        Recommendation::Continue
    }
}
