//! Dynamic iteration budget formula.
//!
//! `BudgetCalculator::calculate` is deterministic and side-effect free. It
//! multiplies a per-profile base budget by vitals, urgency, complexity and
//! success factors, selects a tier from the raw signals, and clamps the
//! rounded product into the tier and the absolute safety bounds.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::types::{
    BudgetComputation, BudgetFactors, BudgetSource, TaskProfile, Tier, VitalsSnapshot, clamp_unit,
};

/// Hard lower bound no tier or fallback may go below.
pub const ABSOLUTE_MIN_BUDGET: u32 = 2;
/// Hard upper bound no tier or fallback may exceed.
pub const ABSOLUTE_MAX_BUDGET: u32 = 25;
/// Base budget used when a profile is not in the table.
pub const DEFAULT_BASE_BUDGET: u32 = 7;

const STAMINA_WEIGHT: f64 = 0.5;
const FOCUS_WEIGHT: f64 = 0.3;
const MOOD_WEIGHT: f64 = 0.2;

const VITALS_LOW_SCORE: f64 = 0.2;
const VITALS_HIGH_SCORE: f64 = 0.9;
const VITALS_LOW_FACTOR: f64 = 0.3;
const VITALS_HIGH_FACTOR: f64 = 1.3;

const URGENCY_GAIN: f64 = 0.6;
const COMPLEXITY_GAIN: f64 = 0.8;
const SUCCESS_FLOOR: f64 = 0.7;
const SUCCESS_GAIN: f64 = 0.6;

const DANGER_THRESHOLD: f64 = 0.2;
const STAMINA_CAUTION: f64 = 0.4;
const SUCCESS_CAUTION: f64 = 0.5;
const AGGRESSIVE_VITALS: f64 = 0.7;
const AGGRESSIVE_SUCCESS: f64 = 0.8;

const BUILTIN_BASE_BUDGETS: &[(&str, u32)] = &[
    ("SIMPLE_QUESTION", 3),
    ("DOCUMENTATION", 4),
    ("CODE_REVIEW", 5),
    ("RESEARCH", 6),
    ("BUG_FIX", 8),
    ("REFACTORING", 8),
    ("FEATURE_IMPLEMENTATION", 10),
    ("ARCHITECTURE_DESIGN", 12),
];

/// Why the primary formula could not produce a budget.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalculationError {
    #[error("non-finite input `{name}`")]
    NonFiniteInput { name: &'static str },
    #[error("raw budget {raw} is not a finite positive number")]
    InvalidRawBudget { raw: f64 },
    #[error("final budget {value} escaped the safety bounds")]
    OutOfBounds { value: u32 },
}

/// Where a base budget came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseSource {
    Known,
    Default,
}

/// Typed profile → base budget mapping with an explicit default branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseBudgetTable {
    entries: BTreeMap<TaskProfile, u32>,
    default: u32,
}

impl Default for BaseBudgetTable {
    fn default() -> Self {
        let entries = BUILTIN_BASE_BUDGETS
            .iter()
            .map(|(key, value)| (TaskProfile::from(*key), *value))
            .collect();
        Self {
            entries,
            default: DEFAULT_BASE_BUDGET,
        }
    }
}

impl BaseBudgetTable {
    /// Built-in table with `overrides` layered on top. Zero values are ignored.
    pub fn with_overrides<'a, I>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a u32)>,
    {
        let mut table = Self::default();
        for (key, value) in overrides {
            if *value > 0 {
                table.entries.insert(TaskProfile::new(key.clone()), *value);
            }
        }
        table
    }

    pub fn lookup(&self, profile: &TaskProfile) -> (u32, BaseSource) {
        match self.entries.get(profile) {
            Some(value) => (*value, BaseSource::Known),
            None => (self.default, BaseSource::Default),
        }
    }
}

/// Inputs to one calculation, already produced by the estimators and store.
#[derive(Debug, Clone, Copy)]
pub struct BudgetInputs {
    pub vitals: VitalsSnapshot,
    pub urgency: f64,
    pub complexity: f64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Default)]
pub struct BudgetCalculator {
    table: BaseBudgetTable,
}

impl BudgetCalculator {
    pub fn new(table: BaseBudgetTable) -> Self {
        Self { table }
    }

    pub fn calculate(
        &self,
        profile: &TaskProfile,
        inputs: &BudgetInputs,
    ) -> Result<BudgetComputation, CalculationError> {
        let vitals = VitalsSnapshot::new(
            inputs.vitals.mood,
            inputs.vitals.focus,
            inputs.vitals.stamina,
        );
        require_finite("vitals.mood", vitals.mood)?;
        require_finite("vitals.focus", vitals.focus)?;
        require_finite("vitals.stamina", vitals.stamina)?;
        let urgency = require_finite("urgency", clamp_unit(inputs.urgency))?;
        let complexity = require_finite("complexity", clamp_unit(inputs.complexity))?;
        let success_rate = require_finite("success_rate", clamp_unit(inputs.success_rate))?;

        let (base_budget, base_source) = self.table.lookup(profile);
        let factors = BudgetFactors {
            vitals: vitals_factor(&vitals),
            urgency: urgency_factor(urgency),
            complexity: complexity_factor(complexity),
            success: success_factor(success_rate),
        };
        let raw_budget = f64::from(base_budget) * factors.product();
        if !raw_budget.is_finite() || raw_budget <= 0.0 {
            return Err(CalculationError::InvalidRawBudget { raw: raw_budget });
        }

        let tier = select_tier(&vitals, success_rate);
        let final_budget = clamp_budget(raw_budget.round() as u32, tier);
        let (tier_min, tier_max) = tier.bounds();
        if !(ABSOLUTE_MIN_BUDGET..=ABSOLUTE_MAX_BUDGET).contains(&final_budget)
            || !(tier_min..=tier_max).contains(&final_budget)
        {
            return Err(CalculationError::OutOfBounds {
                value: final_budget,
            });
        }

        let reasoning = render_reasoning(
            profile,
            base_budget,
            base_source,
            &factors,
            tier,
            raw_budget,
            final_budget,
        );

        Ok(BudgetComputation {
            task_profile: profile.clone(),
            base_budget,
            factors,
            tier,
            raw_budget,
            final_budget,
            source: BudgetSource::Calculated,
            reasoning,
        })
    }
}

fn require_finite(name: &'static str, value: f64) -> Result<f64, CalculationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CalculationError::NonFiniteInput { name })
    }
}

/// Weighted vitals score mapped through low/linear/high bands.
pub fn vitals_factor(vitals: &VitalsSnapshot) -> f64 {
    let score =
        STAMINA_WEIGHT * vitals.stamina + FOCUS_WEIGHT * vitals.focus + MOOD_WEIGHT * vitals.mood;
    if score <= VITALS_LOW_SCORE {
        VITALS_LOW_FACTOR
    } else if score >= VITALS_HIGH_SCORE {
        VITALS_HIGH_FACTOR
    } else {
        let span = VITALS_HIGH_SCORE - VITALS_LOW_SCORE;
        VITALS_LOW_FACTOR
            + (score - VITALS_LOW_SCORE) / span * (VITALS_HIGH_FACTOR - VITALS_LOW_FACTOR)
    }
}

/// Urgency 0.5 is neutral.
pub fn urgency_factor(urgency: f64) -> f64 {
    1.0 + (urgency - 0.5) * URGENCY_GAIN
}

pub fn complexity_factor(complexity: f64) -> f64 {
    1.0 + complexity * COMPLEXITY_GAIN
}

pub fn success_factor(success_rate: f64) -> f64 {
    SUCCESS_FLOOR + success_rate * SUCCESS_GAIN
}

/// Tier from raw signals, evaluated in priority order.
pub fn select_tier(vitals: &VitalsSnapshot, success_rate: f64) -> Tier {
    if vitals.stamina < DANGER_THRESHOLD || vitals.focus < DANGER_THRESHOLD {
        return Tier::Conservative;
    }
    if success_rate < SUCCESS_CAUTION || vitals.stamina < STAMINA_CAUTION {
        return Tier::Conservative;
    }
    if vitals.stamina >= AGGRESSIVE_VITALS
        && vitals.focus >= AGGRESSIVE_VITALS
        && success_rate >= AGGRESSIVE_SUCCESS
    {
        return Tier::Aggressive;
    }
    Tier::Balanced
}

/// Clamp into the tier, then into the absolute bounds, then re-apply the tier floor.
pub fn clamp_budget(rounded: u32, tier: Tier) -> u32 {
    let (tier_min, tier_max) = tier.bounds();
    let tiered = rounded.clamp(tier_min, tier_max);
    let bounded = tiered.clamp(ABSOLUTE_MIN_BUDGET, ABSOLUTE_MAX_BUDGET);
    bounded.max(tier_min)
}

/// Most conservative tier whose bounds contain `budget`.
pub fn tier_containing(budget: u32) -> Option<Tier> {
    [Tier::Conservative, Tier::Balanced, Tier::Aggressive]
        .into_iter()
        .find(|tier| {
            let (min, max) = tier.bounds();
            (min..=max).contains(&budget)
        })
}

/// Clamp an externally supplied budget so that some tier and the absolute bounds contain it.
pub fn clamp_external_budget(budget: u32) -> u32 {
    let (_, widest_max) = Tier::Aggressive.bounds();
    budget.clamp(ABSOLUTE_MIN_BUDGET, ABSOLUTE_MAX_BUDGET.min(widest_max))
}

fn render_reasoning(
    profile: &TaskProfile,
    base_budget: u32,
    base_source: BaseSource,
    factors: &BudgetFactors,
    tier: Tier,
    raw_budget: f64,
    final_budget: u32,
) -> String {
    let base_note = match base_source {
        BaseSource::Known => "",
        BaseSource::Default => " (default for unknown profile)",
    };
    let (tier_min, tier_max) = tier.bounds();
    format!(
        "profile {profile}: base {base_budget}{base_note}; \
         vitals x{:.2}, urgency x{:.2}, complexity x{:.2}, success x{:.2}; \
         raw {raw_budget:.2}; tier {tier} [{tier_min}, {tier_max}]; final {final_budget}",
        factors.vitals, factors.urgency, factors.complexity, factors.success,
    )
}
