//! Strategy selection and parameter adjustment.
//!
//! - [`StrategySelector`] maps a [`FailureAnalysis`](crate::analysis::FailureAnalysis)
//!   to a [`Strategy`] with an attempt budget
//! - [`ParameterAdjuster`] moves the parameters of failing groups within
//!   their declared bounds
//! - [`ParameterKey`] and [`ParameterSet`] are the typed parameter table

mod adjuster;
mod params;
mod selector;
mod types;

pub use adjuster::{
    Direction, ParameterAdjuster, ADJUSTMENT_CEILING, PROGRESSIVE_AMPLIFICATION_STEP,
    REGENERATION_AMPLIFICATION,
};
pub use params::{Concern, ParameterGroup, ParameterKey, ParameterSet, ParameterSpec};
pub use selector::{StrategySelector, BUDGET_SHRINK_HISTORY, REGENERATION_MAX_ATTEMPTS};
pub use types::{
    Priority, Strategy, StrategyType, DEFAULT_ESTIMATED_COST, REGENERATION_ESTIMATED_COST,
};
