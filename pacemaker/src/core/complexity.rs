//! Session complexity estimate in `[0, 1]`.

use serde::{Deserialize, Serialize};

/// Score returned when no signal is available.
pub const NEUTRAL_COMPLEXITY: f64 = 0.3;

const FILE_SATURATION: f64 = 10.0;
const TURN_SATURATION: f64 = 20.0;
const ERROR_RATE_GAIN: f64 = 3.0;
const REFERENCE_SATURATION: f64 = 5.0;

/// Snapshot of the conversation/context system at session start.
///
/// Counts the context system could not supply are `None` and excluded from
/// the estimate rather than treated as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub file_count: Option<u32>,
    pub turn_count: Option<u32>,
    pub error_count: Option<u32>,
    pub tool_executions: Option<u32>,
    pub external_references: Option<u32>,
    /// Latest user message, used by the urgency estimate.
    pub latest_message: String,
}

/// Mean of the saturated sub-signals that are present.
pub fn estimate_complexity(context: &SessionContext) -> f64 {
    let mut signals = Vec::with_capacity(4);
    if let Some(files) = context.file_count {
        signals.push(saturate(f64::from(files) / FILE_SATURATION));
    }
    if let Some(turns) = context.turn_count {
        signals.push(saturate(f64::from(turns) / TURN_SATURATION));
    }
    if let Some(rate) = error_rate(context) {
        signals.push(saturate(rate * ERROR_RATE_GAIN));
    }
    if let Some(refs) = context.external_references {
        signals.push(saturate(f64::from(refs) / REFERENCE_SATURATION));
    }

    if signals.is_empty() {
        return NEUTRAL_COMPLEXITY;
    }
    signals.iter().sum::<f64>() / signals.len() as f64
}

fn error_rate(context: &SessionContext) -> Option<f64> {
    match (context.error_count, context.tool_executions) {
        (Some(errors), Some(runs)) if runs > 0 => Some(f64::from(errors) / f64::from(runs)),
        _ => None,
    }
}

fn saturate(value: f64) -> f64 {
    value.min(1.0)
}
