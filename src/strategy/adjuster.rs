//! Bounded, stepped parameter adjustment.
//!
//! Each failing category moves the parameters of its group one step up
//! from the value last used in the history. Complete regeneration and
//! repeated attempts under the same strategy amplify the result. Every
//! value is clamped to its declared bounds, so the output is always
//! within `[min, max]` no matter what the history holds.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use super::params::{ParameterGroup, ParameterKey, ParameterSet};
use super::types::StrategyType;
use crate::analysis::FailureAnalysis;
use crate::retry::Attempt;

/// Multiplier applied to every adjustment under complete regeneration.
pub const REGENERATION_AMPLIFICATION: f64 = 1.2;

/// Extra multiplier per repeated attempt of the same strategy.
pub const PROGRESSIVE_AMPLIFICATION_STEP: f64 = 0.1;

/// Absolute ceiling for any adjusted value.
pub const ADJUSTMENT_CEILING: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increase,
    Decrease,
}

/// Computes parameter adjustments for one job.
#[derive(Debug, Clone, Default)]
pub struct ParameterAdjuster {
    base: ParameterSet,
}

impl ParameterAdjuster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adjuster starting from the caller's base parameter values.
    pub fn with_base(base: ParameterSet) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &ParameterSet {
        &self.base
    }

    /// Last value used in history, else the base value, else the table default.
    pub fn current_value(&self, key: ParameterKey, history: &[Attempt]) -> f64 {
        history
            .iter()
            .rev()
            .find_map(|a| a.parameters().get(key))
            .or_else(|| self.base.get(key))
            .unwrap_or_else(|| key.spec().default)
    }

    /// One step from the current value, clamped to bounds.
    pub fn compute_adjustment(
        &self,
        key: ParameterKey,
        history: &[Attempt],
        direction: Direction,
    ) -> f64 {
        let spec = key.spec();
        let value = self.current_value(key, history);
        let next = match direction {
            Direction::Increase => value + spec.step,
            Direction::Decrease => value - spec.step,
        };
        spec.clamp(next)
    }

    /// Multiplier for a strategy on its `loop_attempt`-th attempt (1-based).
    pub fn amplification(strategy_type: StrategyType, loop_attempt: u32) -> f64 {
        let mut factor = 1.0;
        if strategy_type == StrategyType::CompleteRegeneration {
            factor *= REGENERATION_AMPLIFICATION;
        }
        if loop_attempt > 1 {
            factor *= 1.0 + PROGRESSIVE_AMPLIFICATION_STEP * f64::from(loop_attempt - 1);
        }
        factor
    }

    /// Parameters tuned in response to the analysis' primary and secondary failures.
    pub fn targets(analysis: &FailureAnalysis) -> BTreeSet<ParameterKey> {
        analysis
            .all_failures()
            .flat_map(|category| ParameterGroup::for_category(category).keys().collect::<Vec<_>>())
            .collect()
    }

    /// Adjustments for every failing category, amplified and clamped.
    pub fn adjust(
        &self,
        analysis: &FailureAnalysis,
        history: &[Attempt],
        strategy_type: StrategyType,
        loop_attempt: u32,
    ) -> ParameterSet {
        let factor = Self::amplification(strategy_type, loop_attempt);

        let adjustments: ParameterSet = Self::targets(analysis)
            .into_iter()
            .map(|key| {
                let stepped = self.compute_adjustment(key, history, Direction::Increase);
                let amplified = (stepped * factor).min(ADJUSTMENT_CEILING);
                (key, key.spec().clamp(amplified))
            })
            .collect();

        debug!(
            strategy = %strategy_type,
            loop_attempt,
            factor,
            adjusted = adjustments.len(),
            "Computed parameter adjustments"
        );
        adjustments
    }

    /// Full parameter set for an attempt: table defaults, then base values, then adjustments.
    pub fn effective_parameters(&self, adjustments: &ParameterSet) -> ParameterSet {
        ParameterSet::defaults()
            .overlay(&self.base)
            .overlay(adjustments)
    }
}
