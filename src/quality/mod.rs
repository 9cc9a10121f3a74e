//! Quality scoring contract.
//!
//! The scoring function itself is external. This module defines what a
//! score looks like ([`ValidationResult`]), the per-tier thresholds, and
//! the [`QualityValidator`] seam the retry loop calls through.
//!
//! ## Example
//!
//! ```rust,ignore
//! use quality_retry::quality::{validate_or_fail, ThresholdValidator, ValidationRequest};
//!
//! let validator = ThresholdValidator::new(my_scorer);
//! let request = ValidationRequest::for_artifact(&generation_request, "artifact-17");
//! let result = validate_or_fail(&validator, &request).await;
//!
//! if !result.passes {
//!     println!("overall quality {:.2}", result.overall_quality);
//! }
//! ```

pub mod types;
pub mod validator;

pub use types::{
    cost_for_tier_name, QualityMetric, QualityOverrides, QualityScores, QualityThresholds,
    QualityTier, ValidationResult, DEFAULT_ATTEMPT_COST,
};
pub use validator::{
    validate_or_fail, QualityScorer, QualityValidator, ThresholdValidator, ValidationRequest,
};

#[cfg(test)]
pub use validator::ScriptedValidator;
