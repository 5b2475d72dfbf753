//! Consultation templates and option → action mapping.
//!
//! Each [`InterventionPattern`] has exactly four options, each bound to one
//! [`ConsultationAction`]. Rendering and choice parsing are pure; the
//! interactive loop lives in `crate::consult`.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::core::degradation::{FOCUS_DANGER, MOOD_CAUTION, STAMINA_DANGER};
use crate::core::types::{InterventionPattern, VitalsSnapshot};

pub const OPTION_COUNT: usize = 4;

/// Continuation chosen by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationAction {
    Halt,
    Continue,
    ContinueWithGuidance,
    ClarifyRequirements,
    Restart,
    Reset,
    Simplify,
    ExtendBudget,
    AcceptCurrent,
    /// The wait for an operator was cancelled.
    Cancel,
}

impl ConsultationAction {
    /// Actions that additionally ask the operator for a free-text note.
    pub fn wants_note(self) -> bool {
        matches!(
            self,
            ConsultationAction::ContinueWithGuidance | ConsultationAction::ClarifyRequirements
        )
    }

    pub fn directive(self) -> LoopDirective {
        match self {
            ConsultationAction::Halt | ConsultationAction::AcceptCurrent => LoopDirective::Stop,
            ConsultationAction::Restart | ConsultationAction::Reset => LoopDirective::Restart,
            ConsultationAction::ExtendBudget => LoopDirective::Extend,
            ConsultationAction::Continue
            | ConsultationAction::ContinueWithGuidance
            | ConsultationAction::ClarifyRequirements
            | ConsultationAction::Simplify
            | ConsultationAction::Cancel => LoopDirective::Continue,
        }
    }
}

/// Coarse instruction for the execution loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopDirective {
    Continue,
    Stop,
    Restart,
    Extend,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsultationOutcome {
    pub pattern: InterventionPattern,
    /// 1-based option index; `None` when cancelled.
    pub chosen_option: Option<usize>,
    pub action: ConsultationAction,
    pub operator_note: Option<String>,
}

impl ConsultationOutcome {
    pub fn cancelled(pattern: InterventionPattern) -> Self {
        Self {
            pattern,
            chosen_option: None,
            action: ConsultationAction::Cancel,
            operator_note: None,
        }
    }

    pub fn directive(&self) -> LoopDirective {
        self.action.directive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateOption {
    pub label: &'static str,
    pub action: ConsultationAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsultationTemplate {
    pub title: &'static str,
    /// Situation text; `{current}` and `{max}` are substituted on render.
    pub situation: &'static str,
    pub options: [TemplateOption; OPTION_COUNT],
}

const fn option(label: &'static str, action: ConsultationAction) -> TemplateOption {
    TemplateOption { label, action }
}

const PROGRESS_STAGNATION: ConsultationTemplate = ConsultationTemplate {
    title: "Progress has stalled",
    situation: "Iteration {current} of {max} without measurable progress toward the goal.",
    options: [
        option("Stop here and report what was found", ConsultationAction::Halt),
        option("Continue with guidance from me", ConsultationAction::ContinueWithGuidance),
        option("Keep going with the current approach", ConsultationAction::Continue),
        option("Restart with a different approach", ConsultationAction::Restart),
    ],
};

const CONFIDENCE_LOSS: ConsultationTemplate = ConsultationTemplate {
    title: "Confidence is dropping",
    situation: "Iteration {current} of {max}: recent attempts keep failing and confidence is low.",
    options: [
        option("Keep going with the current approach", ConsultationAction::Continue),
        option("Continue with guidance from me", ConsultationAction::ContinueWithGuidance),
        option("Reset and rethink from scratch", ConsultationAction::Reset),
        option("Stop the session", ConsultationAction::Halt),
    ],
};

const THINKING_CONFUSION: ConsultationTemplate = ConsultationTemplate {
    title: "The requirements look unclear",
    situation: "Iteration {current} of {max}: focus collapsed and the work is going in circles.",
    options: [
        option("Clarify the requirements", ConsultationAction::ClarifyRequirements),
        option("Simplify the task", ConsultationAction::Simplify),
        option("Keep going with the current approach", ConsultationAction::Continue),
        option("Stop the session", ConsultationAction::Halt),
    ],
};

const EXCESSIVE_TRIALS: ConsultationTemplate = ConsultationTemplate {
    title: "Too many attempts",
    situation: "Iteration {current} of {max}: stamina is exhausted after repeated trials.",
    options: [
        option("Extend the iteration budget", ConsultationAction::ExtendBudget),
        option("Accept the current result", ConsultationAction::AcceptCurrent),
        option("Restart with a different approach", ConsultationAction::Restart),
        option("Stop the session", ConsultationAction::Halt),
    ],
};

pub fn template(pattern: InterventionPattern) -> &'static ConsultationTemplate {
    match pattern {
        InterventionPattern::ProgressStagnation => &PROGRESS_STAGNATION,
        InterventionPattern::ConfidenceLoss => &CONFIDENCE_LOSS,
        InterventionPattern::ThinkingConfusion => &THINKING_CONFUSION,
        InterventionPattern::ExcessiveTrials => &EXCESSIVE_TRIALS,
    }
}

/// Pick a template from vitals: focus, then mood, then stamina.
pub fn determine_pattern(vitals: &VitalsSnapshot) -> InterventionPattern {
    if vitals.focus < FOCUS_DANGER {
        InterventionPattern::ThinkingConfusion
    } else if vitals.mood < MOOD_CAUTION {
        InterventionPattern::ConfidenceLoss
    } else if vitals.stamina < STAMINA_DANGER {
        InterventionPattern::ExcessiveTrials
    } else {
        InterventionPattern::ProgressStagnation
    }
}

/// Render a template as operator-facing text.
pub fn render(pattern: InterventionPattern, current_iteration: u32, budget: u32) -> String {
    let template = template(pattern);
    let situation = template
        .situation
        .replace("{current}", &current_iteration.to_string())
        .replace("{max}", &budget.to_string());

    let mut out = String::new();
    let _ = writeln!(out, "== {} ({pattern}) ==", template.title);
    let _ = writeln!(out, "{situation}");
    let _ = writeln!(out);
    for (index, option) in template.options.iter().enumerate() {
        let _ = writeln!(out, "  {}. {}", index + 1, option.label);
    }
    out
}

/// Parse an operator reply into a 1-based option index.
pub fn parse_choice(input: &str) -> Option<usize> {
    let choice: usize = input.trim().parse().ok()?;
    (1..=OPTION_COUNT).contains(&choice).then_some(choice)
}

/// Action bound to a 1-based option index.
pub fn action_for(pattern: InterventionPattern, choice: usize) -> Option<ConsultationAction> {
    let index = choice.checked_sub(1)?;
    template(pattern).options.get(index).map(|opt| opt.action)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_PATTERNS: [InterventionPattern; 4] = [
        InterventionPattern::ProgressStagnation,
        InterventionPattern::ConfidenceLoss,
        InterventionPattern::ThinkingConfusion,
        InterventionPattern::ExcessiveTrials,
    ];

    #[test]
    fn pattern_selection_follows_priority() {
        assert_eq!(
            determine_pattern(&VitalsSnapshot::new(0.1, 0.1, 0.1)),
            InterventionPattern::ThinkingConfusion
        );
        assert_eq!(
            determine_pattern(&VitalsSnapshot::new(0.1, 0.8, 0.1)),
            InterventionPattern::ConfidenceLoss
        );
        assert_eq!(
            determine_pattern(&VitalsSnapshot::new(0.8, 0.8, 0.1)),
            InterventionPattern::ExcessiveTrials
        );
        assert_eq!(
            determine_pattern(&VitalsSnapshot::new(0.8, 0.8, 0.8)),
            InterventionPattern::ProgressStagnation
        );
    }

    #[test]
    fn every_template_offers_distinct_actions() {
        for pattern in ALL_PATTERNS {
            let actions: Vec<_> = template(pattern).options.iter().map(|o| o.action).collect();
            for (i, action) in actions.iter().enumerate() {
                assert!(!actions[i + 1..].contains(action), "{pattern}: duplicate {action:?}");
                assert_ne!(*action, ConsultationAction::Cancel);
            }
        }
    }

    #[test]
    fn render_substitutes_live_values() {
        let text = render(InterventionPattern::ExcessiveTrials, 7, 9);
        assert!(text.contains("Iteration 7 of 9"));
        assert!(text.contains("  4. Stop the session"));
        assert!(!text.contains("{current}"));
    }

    #[test]
    fn parse_choice_accepts_only_one_to_four() {
        assert_eq!(parse_choice(" 2\n"), Some(2));
        assert_eq!(parse_choice("0"), None);
        assert_eq!(parse_choice("5"), None);
        assert_eq!(parse_choice("two"), None);
    }

    #[test]
    fn cancel_continues_the_loop() {
        let outcome = ConsultationOutcome::cancelled(InterventionPattern::ConfidenceLoss);
        assert_eq!(outcome.directive(), LoopDirective::Continue);
    }

    #[test]
    fn action_lookup_is_one_based() {
        assert_eq!(
            action_for(InterventionPattern::ThinkingConfusion, 1),
            Some(ConsultationAction::ClarifyRequirements)
        );
        assert_eq!(action_for(InterventionPattern::ThinkingConfusion, 0), None);
    }
}
