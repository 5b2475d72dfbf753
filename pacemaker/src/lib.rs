//! Iteration-budget governor for autonomous agent loops.
//!
//! The pacemaker decides how many refinement iterations a session may spend,
//! watches the agent's vitals while it works, and escalates to a human when
//! the agent is degrading. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (budget formula, estimators,
//!   degradation detection, consultation templates). No I/O.
//! - **[`io`]**: Side-effecting operations (configuration, performance log,
//!   operator console).
//!
//! Orchestration modules ([`fallback`], [`session`], [`consult`]) combine core
//! logic with I/O into the `start` / `tick` / `end` lifecycle.

pub mod consult;
pub mod core;
pub mod exit_codes;
pub mod fallback;
pub mod io;
pub mod logging;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
