//! Degradation detection over vitals.
//!
//! Checks run in a fixed priority order and compare strictly: a value equal
//! to its threshold does not trigger.

use serde::{Deserialize, Serialize};

use crate::core::types::VitalsSnapshot;

pub const FOCUS_DANGER: f64 = 0.3;
pub const STAMINA_DANGER: f64 = 0.2;
pub const MOOD_CAUTION: f64 = 0.3;

/// Success rate under which a required intervention becomes critical.
const CRITICAL_SUCCESS_RATE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationReason {
    /// Focus collapsed.
    Confusion,
    /// Stamina collapsed.
    Exhaustion,
    /// Mood below caution.
    LowConfidence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    None,
    ClarifyAndConsult,
    HaltAndConsult,
    RequestGuidance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    None,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub required: bool,
    pub reason: Option<DegradationReason>,
    pub action: SuggestedAction,
    pub priority: Priority,
}

impl Detection {
    pub const HEALTHY: Detection = Detection {
        required: false,
        reason: None,
        action: SuggestedAction::None,
        priority: Priority::None,
    };

    fn required(reason: DegradationReason, action: SuggestedAction, priority: Priority) -> Self {
        Self {
            required: true,
            reason: Some(reason),
            action,
            priority,
        }
    }
}

/// Decide whether the agent needs a human.
pub fn detect(vitals: &VitalsSnapshot, success_rate: f64) -> Detection {
    let detection = if vitals.focus < FOCUS_DANGER {
        Detection::required(
            DegradationReason::Confusion,
            SuggestedAction::ClarifyAndConsult,
            Priority::High,
        )
    } else if vitals.stamina < STAMINA_DANGER {
        Detection::required(
            DegradationReason::Exhaustion,
            SuggestedAction::HaltAndConsult,
            Priority::High,
        )
    } else if vitals.mood < MOOD_CAUTION {
        Detection::required(
            DegradationReason::LowConfidence,
            SuggestedAction::RequestGuidance,
            Priority::Medium,
        )
    } else {
        return Detection::HEALTHY;
    };

    if success_rate < CRITICAL_SUCCESS_RATE {
        Detection {
            priority: Priority::Critical,
            ..detection
        }
    } else {
        detection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn focus_wins_over_stamina() {
        let detection = detect(&VitalsSnapshot::new(0.3, 0.2, 0.05), 0.8);
        assert!(detection.required);
        assert_eq!(detection.reason, Some(DegradationReason::Confusion));
    }

    #[test]
    fn values_at_threshold_do_not_trigger() {
        let at_threshold = VitalsSnapshot::new(MOOD_CAUTION, FOCUS_DANGER, STAMINA_DANGER);
        let detection = detect(&at_threshold, 0.8);
        assert_eq!(detection, Detection::HEALTHY);
    }

    #[test]
    fn values_just_below_threshold_trigger() {
        let epsilon = 1e-6;
        let stamina = detect(&VitalsSnapshot::new(0.9, 0.9, STAMINA_DANGER - epsilon), 0.8);
        assert_eq!(stamina.reason, Some(DegradationReason::Exhaustion));
        let mood = detect(&VitalsSnapshot::new(MOOD_CAUTION - epsilon, 0.9, 0.9), 0.8);
        assert_eq!(mood.reason, Some(DegradationReason::LowConfidence));
        assert_eq!(mood.priority, Priority::Medium);
    }

    #[test]
    fn low_success_rate_escalates_priority() {
        let detection = detect(&VitalsSnapshot::new(0.9, 0.9, 0.1), 0.2);
        assert_eq!(detection.priority, Priority::Critical);
        assert_eq!(detection.action, SuggestedAction::HaltAndConsult);
    }

    #[test]
    fn low_success_rate_alone_is_not_an_intervention() {
        assert_eq!(detect(&VitalsSnapshot::new(0.9, 0.9, 0.9), 0.0), Detection::HEALTHY);
    }
}
