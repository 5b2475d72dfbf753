//! Ordered safety net that always yields a positive budget.
//!
//! Levels, each logged with its reason:
//! 1. the calculator's result;
//! 2. a positive `maxLoops` override from configuration
//!    (`pacemaker.dynamicLimits` first, then legacy `graphState`);
//! 3. [`FINAL_DEFAULT_BUDGET`];
//! 4. [`EMERGENCY_BUDGET`] when the configuration itself cannot be read.

use anyhow::{Result, anyhow};
use tracing::{info, warn};

use crate::core::budget::{CalculationError, clamp_external_budget, tier_containing};
use crate::core::types::{BudgetComputation, BudgetFactors, BudgetSource, TaskProfile, Tier};
use crate::io::config::ConfigSnapshot;

pub const FINAL_DEFAULT_BUDGET: u32 = 8;
pub const EMERGENCY_BUDGET: u32 = 5;

pub const DYNAMIC_LIMITS_KEY: &str = "pacemaker.dynamicLimits.maxLoops";
pub const LEGACY_LIMITS_KEY: &str = "graphState.maxLoops";

/// Source of configured loop-limit overrides.
pub trait LimitSource {
    /// Raw `(key, value)` candidates in priority order.
    fn max_loops_overrides(&self) -> Result<Vec<(&'static str, i64)>>;
}

impl LimitSource for ConfigSnapshot {
    fn max_loops_overrides(&self) -> Result<Vec<(&'static str, i64)>> {
        match self {
            ConfigSnapshot::Loaded(cfg) => {
                let mut candidates = Vec::with_capacity(2);
                if let Some(value) = cfg.pacemaker.dynamic_limits.max_loops {
                    candidates.push((DYNAMIC_LIMITS_KEY, value));
                }
                if let Some(value) = cfg.graph_state.max_loops {
                    candidates.push((LEGACY_LIMITS_KEY, value));
                }
                Ok(candidates)
            }
            ConfigSnapshot::Unreadable(reason) => {
                Err(anyhow!("configuration unreadable: {reason}"))
            }
        }
    }
}

/// Resolve a budget from the primary result, falling back as needed.
pub fn resolve_budget<L: LimitSource + ?Sized>(
    profile: &TaskProfile,
    primary: Result<BudgetComputation, CalculationError>,
    limits: &L,
) -> BudgetComputation {
    let reason = match primary {
        Ok(computation) => {
            info!(
                profile = %profile,
                budget = computation.final_budget,
                tier = %computation.tier,
                "budget calculated"
            );
            return computation;
        }
        Err(err) => err.to_string(),
    };
    warn!(profile = %profile, reason = %reason, "budget calculation failed, using fallback");

    let candidates = match limits.max_loops_overrides() {
        Ok(candidates) => candidates,
        Err(err) => {
            warn!(
                profile = %profile,
                error = %format!("{err:#}"),
                budget = EMERGENCY_BUDGET,
                "fallback configuration unreadable, using emergency budget"
            );
            return fallback_computation(
                profile,
                EMERGENCY_BUDGET,
                BudgetSource::Emergency,
                format!("calculation failed ({reason}); configuration unreadable ({err:#})"),
            );
        }
    };

    for (key, value) in candidates {
        match u32::try_from(value) {
            Ok(budget) if budget > 0 => {
                let clamped = clamp_external_budget(budget);
                info!(
                    profile = %profile,
                    key,
                    configured = value,
                    budget = clamped,
                    "using configured override"
                );
                return fallback_computation(
                    profile,
                    clamped,
                    BudgetSource::ConfigOverride {
                        key: key.to_string(),
                    },
                    format!("calculation failed ({reason}); override {key} = {value}"),
                );
            }
            _ => {
                warn!(
                    profile = %profile,
                    key,
                    configured = value,
                    "ignoring non-positive override"
                );
            }
        }
    }

    info!(profile = %profile, budget = FINAL_DEFAULT_BUDGET, "using final default budget");
    fallback_computation(
        profile,
        FINAL_DEFAULT_BUDGET,
        BudgetSource::FinalDefault,
        format!("calculation failed ({reason}); no usable override"),
    )
}

fn fallback_computation(
    profile: &TaskProfile,
    budget: u32,
    source: BudgetSource,
    detail: String,
) -> BudgetComputation {
    BudgetComputation {
        task_profile: profile.clone(),
        base_budget: budget,
        factors: BudgetFactors::NEUTRAL,
        tier: tier_containing(budget).unwrap_or(Tier::Conservative),
        raw_budget: f64::from(budget),
        final_budget: budget,
        source,
        reasoning: format!("profile {profile}: fallback budget {budget}: {detail}"),
    }
}
