//! Passive learning from episode outcomes.
//!
//! [`LearningStore`] records per-strategy success counters, per-parameter
//! effectiveness and cost efficiency across every job in the process. The
//! statistics are reported but never fed back into strategy selection.

mod ring;
mod store;

pub use ring::RingBuffer;
pub use store::{
    LearningStatistics, LearningStore, MeanStat, RateStat, SuccessCounter,
    COST_EFFICIENCY_CAPACITY, COST_EFFICIENCY_SCORE_FLOOR, PARAMETER_EFFECTIVENESS_CAPACITY,
};
