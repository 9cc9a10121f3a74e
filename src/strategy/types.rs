//! Remediation strategy types.

use serde::{Deserialize, Serialize};

use super::params::ParameterSet;
use crate::quality::QualityTier;

/// A named remediation approach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    /// Tighten identity and pose adherence
    ModelFocused,
    /// Tighten product color and branding fidelity
    ProductFocused,
    /// No dominant failure; nudge everything that failed
    Balanced,
    /// Severe failure; regenerate at a higher tier with amplified adjustments
    CompleteRegeneration,
}

impl StrategyType {
    pub const ALL: [StrategyType; 4] = [
        Self::ModelFocused,
        Self::ProductFocused,
        Self::Balanced,
        Self::CompleteRegeneration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModelFocused => "model_focused",
            Self::ProductFocused => "product_focused",
            Self::Balanced => "balanced",
            Self::CompleteRegeneration => "complete_regeneration",
        }
    }
}

impl std::fmt::Display for StrategyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which group of metrics a strategy favors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Consistency,
    Accuracy,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Consistency => write!(f, "consistency"),
            Self::Accuracy => write!(f, "accuracy"),
        }
    }
}

/// Estimated cost of an ordinary strategy attempt.
pub const DEFAULT_ESTIMATED_COST: f64 = 0.06;

/// Estimated cost of a complete-regeneration attempt.
pub const REGENERATION_ESTIMATED_COST: f64 = 0.12;

/// A chosen remediation strategy with its attempt budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    #[serde(rename = "type")]
    pub strategy_type: StrategyType,
    pub priority: Priority,
    /// Clamped values for the parameters this strategy tunes
    pub parameter_adjustments: ParameterSet,
    pub max_attempts: u32,
    pub quality_tier: QualityTier,
    /// Estimated cost of one attempt, checked against the cost ceiling
    pub estimated_cost: f64,
}

impl Default for Strategy {
    fn default() -> Self {
        Self {
            strategy_type: StrategyType::Balanced,
            priority: Priority::Consistency,
            parameter_adjustments: ParameterSet::new(),
            max_attempts: 3,
            quality_tier: QualityTier::Standard,
            estimated_cost: DEFAULT_ESTIMATED_COST,
        }
    }
}

impl Strategy {
    pub fn with_estimated_cost(mut self, estimated_cost: f64) -> Self {
        self.estimated_cost = estimated_cost;
        self
    }
}
