//! # quality-retry
//!
//! Adaptive retry and quality-feedback control loop for generation jobs
//! whose output must pass an external quality gate.
//!
//! ## Core Components
//!
//! - **Analysis**: Classify a failing validation into failure categories and a severity
//! - **Strategy**: Pick a remediation strategy and adjust bounded parameters
//! - **Retry**: The checked episode state machine with cost and attempt budgets
//! - **Learning**: Passive, process-wide statistics about strategy outcomes
//! - **Quality**: The validator contract and a threshold-based adapter
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use quality_retry::{GenerationRequest, JobId, LearningStore, RetryConfig, RetryOrchestrator};
//!
//! let orchestrator = RetryOrchestrator::new(
//!     Arc::new(my_generator),
//!     Arc::new(my_validator),
//!     Arc::new(LearningStore::new()),
//!     RetryConfig::default(),
//! )?;
//!
//! let request = GenerationRequest::new("model-7", "studio portrait", "standing");
//! let report = orchestrator
//!     .run_retry_episode(&request, failing_validation, Vec::new(), JobId::new())
//!     .await?;
//!
//! if let Some(error) = report.result.error() {
//!     println!("episode failed: {}", error);
//! }
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod generation;
pub mod learning;
mod proptest;
pub mod quality;
pub mod retry;
pub mod strategy;

// Re-exports for convenience
pub use analysis::{FailureAnalysis, FailureAnalyzer, FailureCategory, Severity};
pub use config::{ConfigUpdate, RetryConfig, RetryConfigBuilder, TierOverrides};
pub use error::{Error, Result};
pub use generation::{GeneratedArtifact, GenerationRequest, Generator, PriorityWeights};
pub use learning::{LearningStatistics, LearningStore};
pub use quality::{
    QualityMetric, QualityOverrides, QualityScorer, QualityScores, QualityThresholds, QualityTier,
    QualityValidator, ThresholdValidator, ValidationRequest, ValidationResult,
};
pub use retry::{
    Attempt, AttemptHistory, CancelHandle, CancelSignal, EpisodeError, EpisodeId, EpisodeReport,
    EpisodeResult, JobId, RetryOrchestrator, RetryState,
};
pub use strategy::{
    Direction, ParameterAdjuster, ParameterKey, ParameterSet, Priority, Strategy,
    StrategySelector, StrategyType,
};
