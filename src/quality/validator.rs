//! Quality validator contract and implementations.
//!
//! [`QualityValidator`] is the black box the retry loop consumes. The
//! [`ThresholdValidator`] adapter builds one from a raw [`QualityScorer`] by
//! applying the thresholds carried on each [`ValidationRequest`], and
//! [`validate_or_fail`] is the recovery boundary that turns validator errors
//! into zero-score results.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::types::{QualityMetric, QualityScores, QualityThresholds, QualityTier, ValidationResult};
use crate::error::Result;
use crate::generation::{GenerationRequest, PriorityWeights};

/// Everything a validator needs to score one artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub artifact_ref: String,
    pub expected_identity: String,
    pub expected_pose: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_ref: Option<String>,
    pub quality_tier: QualityTier,
    #[serde(default)]
    pub weights: PriorityWeights,
    /// Pass thresholds to apply; built-in tier thresholds when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<QualityThresholds>,
}

impl ValidationRequest {
    /// Build the validation request for an artifact generated from `request`.
    pub fn for_artifact(request: &GenerationRequest, artifact_ref: impl Into<String>) -> Self {
        Self {
            artifact_ref: artifact_ref.into(),
            expected_identity: request.model_id.clone(),
            expected_pose: request.pose.clone(),
            product_ref: request.product_ref.clone(),
            quality_tier: request.quality_tier,
            weights: request.weights,
            thresholds: None,
        }
    }

    pub fn with_thresholds(mut self, thresholds: QualityThresholds) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    /// Thresholds the pass decision is made against.
    pub fn effective_thresholds(&self) -> QualityThresholds {
        self.thresholds
            .unwrap_or_else(|| QualityThresholds::for_tier(self.quality_tier))
    }
}

/// Scores one candidate artifact.
///
/// Calls may be slow or fail; callers inside the retry loop go through
/// [`validate_or_fail`].
#[async_trait]
pub trait QualityValidator: Send + Sync {
    async fn validate(&self, request: &ValidationRequest) -> Result<ValidationResult>;
}

/// Raw per-metric scoring backend.
#[async_trait]
pub trait QualityScorer: Send + Sync {
    async fn score(&self, request: &ValidationRequest) -> Result<QualityScores>;
}

/// Validate, mapping any error or non-finite result to a zero-score failing result.
pub async fn validate_or_fail(
    validator: &dyn QualityValidator,
    request: &ValidationRequest,
) -> ValidationResult {
    match validator.validate(request).await {
        Ok(result) if result.is_finite() => result,
        Ok(_) => {
            warn!(artifact = %request.artifact_ref, "Validator returned non-finite scores");
            ValidationResult::failed("validator returned non-finite scores")
        }
        Err(e) => {
            warn!(artifact = %request.artifact_ref, error = %e, "Validation failed, scoring as zero");
            ValidationResult::failed(e.to_string())
        }
    }
}

/// Validator that applies request thresholds to a raw scorer.
pub struct ThresholdValidator<S> {
    scorer: S,
}

impl<S: QualityScorer> ThresholdValidator<S> {
    pub fn new(scorer: S) -> Self {
        Self { scorer }
    }

    /// Weighted aggregate of the applicable metrics.
    ///
    /// Consistency is the mean of face and pose. Accuracy is the mean of
    /// color, style and branding when a product is present, else style alone.
    pub fn overall_quality(
        scores: &QualityScores,
        weights: &PriorityWeights,
        has_product: bool,
    ) -> f64 {
        let consistency = (scores.face_consistency + scores.pose_accuracy) / 2.0;
        let accuracy = if has_product {
            (scores.color_accuracy + scores.style_accuracy + scores.branding_accuracy) / 3.0
        } else {
            scores.style_accuracy
        };
        let (wc, wa) = weights.normalized();
        wc * consistency + wa * accuracy
    }

    /// Pass decision against a threshold snapshot.
    pub fn passes(
        scores: &QualityScores,
        overall: f64,
        thresholds: &QualityThresholds,
        has_product: bool,
    ) -> bool {
        overall >= thresholds.overall
            && QualityMetric::ALL
                .iter()
                .filter(|m| has_product || !m.requires_product())
                .all(|m| scores.get(*m) >= thresholds.min_for(*m))
    }
}

#[async_trait]
impl<S: QualityScorer> QualityValidator for ThresholdValidator<S> {
    #[instrument(skip(self, request), fields(artifact = %request.artifact_ref, tier = %request.quality_tier))]
    async fn validate(&self, request: &ValidationRequest) -> Result<ValidationResult> {
        let scores = self.scorer.score(request).await?.clamped();
        let has_product = request.product_ref.is_some();
        let thresholds = request.effective_thresholds();

        let overall = Self::overall_quality(&scores, &request.weights, has_product);
        let passes = Self::passes(&scores, overall, &thresholds, has_product);
        debug!(overall, passes, "Scored artifact");

        Ok(ValidationResult::new(scores, overall, passes).with_thresholds(thresholds))
    }
}

/// A validator that replays scripted results, for tests.
#[cfg(test)]
pub struct ScriptedValidator {
    results: std::sync::Mutex<std::collections::VecDeque<Result<ValidationResult>>>,
    requests: std::sync::Mutex<Vec<ValidationRequest>>,
}

#[cfg(test)]
impl ScriptedValidator {
    pub fn new(results: Vec<Result<ValidationResult>>) -> Self {
        Self {
            results: std::sync::Mutex::new(results.into()),
            requests: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// One uniform-score result per entry, passing at `pass_threshold`.
    pub fn from_scores(scores: &[f64], pass_threshold: f64) -> Self {
        Self::new(
            scores
                .iter()
                .map(|s| {
                    Ok(ValidationResult::new(
                        QualityScores::uniform(*s),
                        *s,
                        *s >= pass_threshold,
                    ))
                })
                .collect(),
        )
    }

    pub fn requests(&self) -> Vec<ValidationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl QualityValidator for ScriptedValidator {
    async fn validate(&self, request: &ValidationRequest) -> Result<ValidationResult> {
        self.requests.lock().unwrap().push(request.clone());
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(crate::error::Error::validation("script exhausted")))
    }
}
