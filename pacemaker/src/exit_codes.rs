//! Stable exit codes for pacemaker CLI commands.

/// Command succeeded and no intervention is needed.
pub const OK: i32 = 0;
/// Command failed due to invalid arguments, config or other errors.
pub const INVALID: i32 = 1;
/// `pacemaker check` found a degradation that requires a human.
pub const INTERVENTION_REQUIRED: i32 = 3;
