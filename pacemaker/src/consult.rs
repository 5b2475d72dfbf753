//! Structured human consultation when the agent is degrading.
//!
//! `present` is the only blocking call in the crate: it waits on the operator
//! with no timeout. Callers that need one must wrap the call themselves.

use tracing::{info, instrument, warn};

use crate::core::consultation::{
    ConsultationOutcome, OPTION_COUNT, action_for, determine_pattern, parse_choice, render,
};
use crate::core::types::{InterventionPattern, VitalsSnapshot};
use crate::io::operator::{Operator, OperatorReply};

const CHOICE_PROMPT: &str = "Choose an option [1-4]: ";
const NOTE_PROMPT: &str = "Add a note for the agent (Enter to skip): ";

pub struct ConsultationEscalator<O> {
    operator: O,
    /// Invalid replies tolerated before cancelling; `None` re-prompts forever.
    max_invalid_inputs: Option<u32>,
}

impl<O: Operator> ConsultationEscalator<O> {
    pub fn new(operator: O) -> Self {
        Self {
            operator,
            max_invalid_inputs: None,
        }
    }

    pub fn with_max_invalid_inputs(mut self, limit: Option<u32>) -> Self {
        self.max_invalid_inputs = limit;
        self
    }

    pub fn into_operator(self) -> O {
        self.operator
    }

    /// Pick the pattern from `vitals` and present it.
    pub fn escalate(
        &mut self,
        vitals: &VitalsSnapshot,
        current_iteration: u32,
        budget: u32,
    ) -> ConsultationOutcome {
        self.present(determine_pattern(vitals), current_iteration, budget)
    }

    /// Render the template, collect a choice and map it to an action.
    ///
    /// Cancellation and operator I/O failures resolve to the `cancel` action.
    #[instrument(skip(self))]
    pub fn present(
        &mut self,
        pattern: InterventionPattern,
        current_iteration: u32,
        budget: u32,
    ) -> ConsultationOutcome {
        if let Err(err) = self.operator.show(&render(pattern, current_iteration, budget)) {
            warn!(error = %format!("{err:#}"), "could not show consultation");
            return ConsultationOutcome::cancelled(pattern);
        }

        let mut invalid_inputs = 0u32;
        loop {
            let line = match self.operator.ask(CHOICE_PROMPT) {
                Ok(OperatorReply::Line(line)) => line,
                Ok(OperatorReply::Cancelled) => {
                    info!("consultation cancelled by operator");
                    return ConsultationOutcome::cancelled(pattern);
                }
                Err(err) => {
                    warn!(
                        error = %format!("{err:#}"),
                        "operator input failed, cancelling consultation"
                    );
                    return ConsultationOutcome::cancelled(pattern);
                }
            };

            let Some((choice, action)) =
                parse_choice(&line).and_then(|c| action_for(pattern, c).map(|a| (c, a)))
            else {
                invalid_inputs += 1;
                warn!(input = %line, attempts = invalid_inputs, "invalid consultation choice");
                if self.max_invalid_inputs.is_some_and(|limit| invalid_inputs >= limit) {
                    warn!("too many invalid choices, cancelling consultation");
                    return ConsultationOutcome::cancelled(pattern);
                }
                // Best effort: the re-prompt below surfaces output errors anyway.
                let _ = self
                    .operator
                    .show(&format!("Please enter a number from 1 to {OPTION_COUNT}.\n"));
                continue;
            };

            let operator_note = if action.wants_note() {
                self.ask_note()
            } else {
                None
            };
            info!(choice, action = ?action, "consultation resolved");
            return ConsultationOutcome {
                pattern,
                chosen_option: Some(choice),
                action,
                operator_note,
            };
        }
    }

    fn ask_note(&mut self) -> Option<String> {
        match self.operator.ask(NOTE_PROMPT) {
            Ok(OperatorReply::Line(note)) => {
                let note = note.trim();
                (!note.is_empty()).then(|| note.to_string())
            }
            Ok(OperatorReply::Cancelled) => None,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "could not read operator note");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::consultation::{ConsultationAction, LoopDirective};
    use crate::io::operator::ConsoleOperator;
    use std::io::Cursor;

    type TestConsole = ConsoleOperator<Cursor<String>, Vec<u8>>;

    fn escalator(input: &str) -> ConsultationEscalator<TestConsole> {
        let console = ConsoleOperator::new(Cursor::new(input.to_string()), Vec::new());
        ConsultationEscalator::new(console)
    }

    #[test]
    fn valid_choice_maps_to_action() {
        let mut escalator = escalator("4\n");
        let outcome = escalator.present(InterventionPattern::ExcessiveTrials, 9, 10);
        assert_eq!(outcome.chosen_option, Some(4));
        assert_eq!(outcome.action, ConsultationAction::Halt);
        assert_eq!(outcome.directive(), LoopDirective::Stop);

        let transcript = String::from_utf8(escalator.into_operator().into_writer()).expect("utf8");
        assert!(transcript.contains("Iteration 9 of 10"));
    }

    #[test]
    fn invalid_input_reprompts_until_valid() {
        let mut escalator = escalator("abc\n9\n\n3\n");
        let outcome = escalator.present(InterventionPattern::ProgressStagnation, 2, 8);
        assert_eq!(outcome.chosen_option, Some(3));
        assert_eq!(outcome.action, ConsultationAction::Continue);

        let transcript = String::from_utf8(escalator.into_operator().into_writer()).expect("utf8");
        assert_eq!(transcript.matches(CHOICE_PROMPT).count(), 4);
    }

    #[test]
    fn guidance_collects_optional_note() {
        let mut escalator = escalator("2\n  try the smaller fixture first \n");
        let outcome = escalator.present(InterventionPattern::ConfidenceLoss, 5, 8);
        assert_eq!(outcome.action, ConsultationAction::ContinueWithGuidance);
        assert_eq!(
            outcome.operator_note.as_deref(),
            Some("try the smaller fixture first")
        );
    }

    #[test]
    fn empty_note_is_none() {
        let mut escalator = escalator("1\n\n");
        let outcome = escalator.present(InterventionPattern::ThinkingConfusion, 5, 8);
        assert_eq!(outcome.action, ConsultationAction::ClarifyRequirements);
        assert_eq!(outcome.operator_note, None);
    }

    #[test]
    fn closed_input_cancels_and_continues() {
        let mut escalator = escalator("nope\n");
        let outcome = escalator.present(InterventionPattern::ProgressStagnation, 3, 8);
        assert_eq!(outcome.action, ConsultationAction::Cancel);
        assert_eq!(outcome.chosen_option, None);
        assert_eq!(outcome.directive(), LoopDirective::Continue);
    }

    struct DetachedOperator;

    impl Operator for DetachedOperator {
        fn show(&mut self, _text: &str) -> anyhow::Result<()> {
            Ok(())
        }

        fn ask(&mut self, _prompt: &str) -> anyhow::Result<OperatorReply> {
            Err(anyhow::anyhow!("terminal detached"))
        }
    }

    #[test]
    fn operator_failure_resolves_to_cancel() {
        let mut escalator = ConsultationEscalator::new(DetachedOperator);
        let outcome = escalator.present(InterventionPattern::ConfidenceLoss, 4, 8);
        assert_eq!(outcome, ConsultationOutcome::cancelled(InterventionPattern::ConfidenceLoss));
        assert_eq!(outcome.directive(), LoopDirective::Continue);
    }

    #[test]
    fn bounded_retries_cancel() {
        let mut escalator = escalator("x\ny\n1\n").with_max_invalid_inputs(Some(2));
        let outcome = escalator.present(InterventionPattern::ProgressStagnation, 3, 8);
        assert_eq!(outcome.action, ConsultationAction::Cancel);
    }

    #[test]
    fn escalate_picks_pattern_from_vitals() {
        let mut escalator = escalator("3\n");
        let outcome = escalator.escalate(&VitalsSnapshot::new(0.9, 0.9, 0.1), 10, 10);
        assert_eq!(outcome.pattern, InterventionPattern::ExcessiveTrials);
        assert_eq!(outcome.action, ConsultationAction::Restart);
    }
}
