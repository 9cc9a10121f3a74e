//! Process-wide learning tables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::debug;

use super::ring::RingBuffer;
use crate::error::{Error, Result};
use crate::retry::EpisodeResult;
use crate::strategy::{ParameterKey, Strategy, StrategyType};

/// Samples kept per `{strategy}_{parameter}` key.
pub const PARAMETER_EFFECTIVENESS_CAPACITY: usize = 50;

/// Samples kept per strategy for cost efficiency.
pub const COST_EFFICIENCY_CAPACITY: usize = 20;

/// Score floor used as the divisor for cost efficiency.
pub const COST_EFFICIENCY_SCORE_FLOOR: f64 = 0.1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SuccessCounter {
    pub attempts: u64,
    pub successes: u64,
}

impl SuccessCounter {
    pub fn rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }
}

#[derive(Debug, Default)]
struct LearningTables {
    strategy_success: BTreeMap<StrategyType, SuccessCounter>,
    parameter_effectiveness: BTreeMap<String, RingBuffer<f64>>,
    cost_efficiency: BTreeMap<StrategyType, RingBuffer<f64>>,
}

/// Success rate of one strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateStat {
    pub attempts: u64,
    pub successes: u64,
    pub rate: f64,
}

/// Count and arithmetic mean of a bounded sample buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanStat {
    pub count: usize,
    pub mean: f64,
}

impl MeanStat {
    fn of(ring: &RingBuffer<f64>) -> Option<Self> {
        ring.mean().map(|mean| Self {
            count: ring.len(),
            mean,
        })
    }
}

/// Serializable snapshot of the learning tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearningStatistics {
    pub success_rate: BTreeMap<StrategyType, RateStat>,
    pub average_effectiveness: BTreeMap<String, MeanStat>,
    pub average_cost_per_score: BTreeMap<StrategyType, MeanStat>,
}

impl LearningStatistics {
    pub fn is_empty(&self) -> bool {
        self.success_rate.is_empty()
            && self.average_effectiveness.is_empty()
            && self.average_cost_per_score.is_empty()
    }
}

/// Strategy outcome statistics shared by every job in the process.
///
/// Share it as `Arc<LearningStore>`. Each update takes the lock once and
/// never holds it across an await.
#[derive(Debug, Default)]
pub struct LearningStore {
    tables: Mutex<LearningTables>,
}

impl LearningStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table key for a parameter under a strategy, e.g. `model_focused_feature_lock`.
    pub fn parameter_key(strategy: StrategyType, key: ParameterKey) -> String {
        format!("{}_{}", strategy.as_str(), key.name())
    }

    fn with_tables<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut LearningTables) -> T,
    {
        let mut tables = self
            .tables
            .lock()
            .map_err(|e| Error::Internal(format!("Failed to lock learning tables: {}", e)))?;
        Ok(f(&mut tables))
    }

    /// Record the outcome of a finished episode.
    pub fn update_on_episode_end(&self, strategy: &Strategy, result: &EpisodeResult) -> Result<()> {
        let success = result.is_success();
        let best_score = result.best_score().unwrap_or(0.0);
        let effectiveness = if success { 1.0 } else { best_score };
        let cost_per_score = result.total_cost() / best_score.max(COST_EFFICIENCY_SCORE_FLOOR);
        let strategy_type = strategy.strategy_type;

        self.with_tables(|tables| {
            let counter = tables.strategy_success.entry(strategy_type).or_default();
            counter.attempts += 1;
            if success {
                counter.successes += 1;
            }

            for key in strategy.parameter_adjustments.keys() {
                tables
                    .parameter_effectiveness
                    .entry(Self::parameter_key(strategy_type, key))
                    .or_insert_with(|| RingBuffer::new(PARAMETER_EFFECTIVENESS_CAPACITY))
                    .push(effectiveness);
            }

            tables
                .cost_efficiency
                .entry(strategy_type)
                .or_insert_with(|| RingBuffer::new(COST_EFFICIENCY_CAPACITY))
                .push(cost_per_score);
        })?;

        debug!(
            strategy = %strategy_type,
            success,
            effectiveness,
            cost_per_score,
            "Updated learning tables"
        );
        Ok(())
    }

    pub fn statistics(&self) -> Result<LearningStatistics> {
        self.with_tables(|tables| LearningStatistics {
            success_rate: tables
                .strategy_success
                .iter()
                .map(|(strategy, counter)| {
                    (
                        *strategy,
                        RateStat {
                            attempts: counter.attempts,
                            successes: counter.successes,
                            rate: counter.rate(),
                        },
                    )
                })
                .collect(),
            average_effectiveness: tables
                .parameter_effectiveness
                .iter()
                .filter_map(|(key, ring)| MeanStat::of(ring).map(|s| (key.clone(), s)))
                .collect(),
            average_cost_per_score: tables
                .cost_efficiency
                .iter()
                .filter_map(|(strategy, ring)| MeanStat::of(ring).map(|s| (*strategy, s)))
                .collect(),
        })
    }

    /// Effectiveness samples for a parameter key, oldest first.
    pub fn parameter_samples(&self, key: &str) -> Result<Vec<f64>> {
        self.with_tables(|tables| {
            tables
                .parameter_effectiveness
                .get(key)
                .map(|ring| ring.iter().copied().collect())
                .unwrap_or_default()
        })
    }

    /// Clear all three tables.
    pub fn reset(&self) -> Result<()> {
        self.with_tables(|tables| *tables = LearningTables::default())
    }
}
