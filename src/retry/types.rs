//! Episode identifiers, outcomes and reports.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::attempt::{Attempt, AttemptHistory};
use super::state::StateTransition;
use crate::analysis::{FailureAnalysis, FailureCategory};
use crate::strategy::{Strategy, StrategyType};

/// Caller-facing identifier for a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for one retry episode of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpisodeId(pub Uuid);

impl EpisodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EpisodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why an episode ended without a passing artifact.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EpisodeError {
    /// Every attempt of the loop failed to generate
    #[error("Generation failed on all {attempts} attempts: {last_error}")]
    GenerationFailed { attempts: u32, last_error: String },

    /// The next attempt's estimated cost would breach the cost ceiling
    #[error("Budget exceeded: spent {spent:.4} + next {next_estimate:.4} > limit {limit:.4}")]
    BudgetExceeded {
        spent: f64,
        next_estimate: f64,
        limit: f64,
    },

    /// The history already holds the global maximum number of attempts
    #[error("Retry limit reached: {attempts} attempts >= max {max_retries}")]
    RetryLimitReached { attempts: usize, max_retries: u32 },

    /// The strategy's attempt budget ran out
    #[error("Attempts exhausted after {attempts} attempts")]
    AttemptsExhausted { attempts: u32 },

    #[error("Episode cancelled")]
    Cancelled,
}

/// A passing (or best-partial) attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessResult {
    pub attempt: Attempt,
    /// Cost of the whole history, prior attempts included
    pub total_cost: f64,
    /// Attempts started in this episode
    pub attempts_used: u32,
    pub strategy: StrategyType,
    pub partial: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureResult {
    pub error: EpisodeError,
    /// Best overall quality across the whole history
    pub best_score: Option<f64>,
    pub attempts_used: u32,
    pub total_attempts: usize,
    pub total_cost: f64,
    pub failure_analysis: FailureAnalysis,
    pub recommendations: Vec<String>,
    pub strategy: StrategyType,
}

/// Outcome of one retry episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EpisodeResult {
    Success(SuccessResult),
    PartialSuccess(SuccessResult),
    Failure(FailureResult),
}

impl EpisodeResult {
    /// Success or partial success. Learning counts both as a win.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failure(_))
    }

    pub fn is_partial(&self) -> bool {
        matches!(self, Self::PartialSuccess(_))
    }

    pub fn total_cost(&self) -> f64 {
        match self {
            Self::Success(s) | Self::PartialSuccess(s) => s.total_cost,
            Self::Failure(f) => f.total_cost,
        }
    }

    pub fn attempts_used(&self) -> u32 {
        match self {
            Self::Success(s) | Self::PartialSuccess(s) => s.attempts_used,
            Self::Failure(f) => f.attempts_used,
        }
    }

    pub fn best_score(&self) -> Option<f64> {
        match self {
            Self::Success(s) | Self::PartialSuccess(s) => s.attempt.overall_quality(),
            Self::Failure(f) => f.best_score,
        }
    }

    pub fn strategy(&self) -> StrategyType {
        match self {
            Self::Success(s) | Self::PartialSuccess(s) => s.strategy,
            Self::Failure(f) => f.strategy,
        }
    }

    pub fn error(&self) -> Option<&EpisodeError> {
        match self {
            Self::Failure(f) => Some(&f.error),
            _ => None,
        }
    }
}

/// Everything an episode produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeReport {
    pub episode_id: EpisodeId,
    pub job_id: JobId,
    pub result: EpisodeResult,
    /// Full history, prior attempts first
    pub history: AttemptHistory,
    pub trace: Vec<StateTransition>,
    /// Strategy the loop ran with, as last refreshed
    pub strategy: Strategy,
}

/// Heuristic advice for a failed episode.
///
/// One line per persistent issue, then one for the stop reason.
pub fn recommendations(analysis: &FailureAnalysis, error: &EpisodeError) -> Vec<String> {
    let mut out: Vec<String> = analysis
        .consistent_issues
        .iter()
        .filter_map(|category| match category {
            FailureCategory::FaceConsistency => Some("check reference/model quality"),
            FailureCategory::PoseAccuracy => Some("simplify or re-specify the target pose"),
            FailureCategory::ColorAccuracy => Some("verify product image lighting"),
            FailureCategory::BrandingAccuracy => {
                Some("ensure branding elements are clearly visible")
            }
            FailureCategory::StyleAccuracy => None,
        })
        .map(String::from)
        .collect();

    match error {
        EpisodeError::BudgetExceeded { .. } | EpisodeError::RetryLimitReached { .. } => {
            out.push("raise the cost limit or lower the quality tier".to_string())
        }
        EpisodeError::AttemptsExhausted { .. } | EpisodeError::GenerationFailed { .. } => {
            out.push("retry later or escalate".to_string())
        }
        EpisodeError::Cancelled => {}
    }
    out
}
