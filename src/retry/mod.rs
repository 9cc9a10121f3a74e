//! Retry episodes.
//!
//! [`RetryOrchestrator`] drives the checked [`StateMachine`] for one job:
//!
//! ```text
//! INIT -> VALIDATING -> ANALYZING -> SELECTING -> ADJUSTING -> GENERATING
//!              ^                         |                        |
//!              +-------------------------+------------------------+
//!                                        |
//!               PASSED | BUDGET_EXCEEDED | EXHAUSTED | CANCELLED -> DONE
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use quality_retry::{JobId, LearningStore, RetryConfig, RetryOrchestrator};
//!
//! let learning = Arc::new(LearningStore::new());
//! let orchestrator = RetryOrchestrator::new(generator, validator, learning, RetryConfig::default())?;
//!
//! let report = orchestrator
//!     .run_retry_episode(&request, failing_validation, Vec::new(), JobId::new())
//!     .await?;
//! println!("success: {}", report.result.is_success());
//! ```

mod attempt;
mod cancel;
mod orchestrator;
mod state;
mod types;

pub use attempt::{Attempt, AttemptHistory};
pub use cancel::{CancelHandle, CancelSignal};
pub use orchestrator::RetryOrchestrator;
pub use state::{RetryState, StateMachine, StateTransition};
pub use types::{
    recommendations, EpisodeError, EpisodeId, EpisodeReport, EpisodeResult, FailureResult, JobId,
    SuccessResult,
};
