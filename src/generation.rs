//! Generation request and the external generator contract.
//!
//! The crate never renders anything itself. A [`Generator`] turns a
//! [`GenerationRequest`] plus adjusted parameters into an artifact reference,
//! and the retry loop treats any error it returns as a recoverable,
//! costed attempt.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::quality::QualityTier;
use crate::strategy::{ParameterKey, ParameterSet};

/// Relative weight of consistency (face, pose) against accuracy (product) metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorityWeights {
    pub consistency: f64,
    pub accuracy: f64,
}

impl PriorityWeights {
    pub fn new(consistency: f64, accuracy: f64) -> Self {
        Self {
            consistency,
            accuracy,
        }
    }

    /// Weights scaled to sum to 1. Two zero weights split evenly.
    pub fn normalized(&self) -> (f64, f64) {
        let total = self.consistency + self.accuracy;
        if total <= f64::EPSILON {
            (0.5, 0.5)
        } else {
            (self.consistency / total, self.accuracy / total)
        }
    }
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            consistency: 0.6,
            accuracy: 0.4,
        }
    }
}

/// Immutable base parameters for one generation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Reference identity the artifact must preserve
    pub model_id: String,
    /// Generation prompt
    pub prompt: String,
    /// Target pose
    pub pose: String,
    /// Optional product reference to render
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_ref: Option<String>,
    /// Requested quality tier
    #[serde(default)]
    pub quality_tier: QualityTier,
    /// Consistency/accuracy priority
    #[serde(default)]
    pub weights: PriorityWeights,
    /// Caller-supplied starting values; table defaults fill the rest
    #[serde(default, skip_serializing_if = "ParameterSet::is_empty")]
    pub base_parameters: ParameterSet,
}

impl GenerationRequest {
    pub fn new(
        model_id: impl Into<String>,
        prompt: impl Into<String>,
        pose: impl Into<String>,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            prompt: prompt.into(),
            pose: pose.into(),
            product_ref: None,
            quality_tier: QualityTier::default(),
            weights: PriorityWeights::default(),
            base_parameters: ParameterSet::new(),
        }
    }

    pub fn with_product(mut self, product_ref: impl Into<String>) -> Self {
        self.product_ref = Some(product_ref.into());
        self
    }

    pub fn with_quality_tier(mut self, tier: QualityTier) -> Self {
        self.quality_tier = tier;
        self
    }

    pub fn with_weights(mut self, weights: PriorityWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_base_parameter(mut self, key: ParameterKey, value: f64) -> Self {
        self.base_parameters.set(key, value);
        self
    }

    /// Check required fields. A failure here is a contract violation, not a quality failure.
    pub fn validate(&self) -> Result<()> {
        if self.model_id.trim().is_empty() {
            return Err(Error::invalid_request("model_id", "must not be empty"));
        }
        if self.prompt.trim().is_empty() {
            return Err(Error::invalid_request("prompt", "must not be empty"));
        }
        if self.pose.trim().is_empty() {
            return Err(Error::invalid_request("pose", "must not be empty"));
        }
        if matches!(self.product_ref.as_deref(), Some(p) if p.trim().is_empty()) {
            return Err(Error::invalid_request(
                "product_ref",
                "must not be blank when present",
            ));
        }
        for (field, weight) in [
            ("weights.consistency", self.weights.consistency),
            ("weights.accuracy", self.weights.accuracy),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(Error::invalid_request(
                    field,
                    format!("must be between 0.0 and 1.0, got {}", weight),
                ));
            }
        }
        Ok(())
    }
}

/// Artifact produced by one generate call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    /// Opaque reference handed to the validator
    pub artifact_ref: String,
    /// Cost reported by the backend, when it knows it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

impl GeneratedArtifact {
    pub fn new(artifact_ref: impl Into<String>) -> Self {
        Self {
            artifact_ref: artifact_ref.into(),
            cost: None,
        }
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    /// Reported cost if it is usable as an attempt cost.
    pub fn billable_cost(&self) -> Option<f64> {
        self.cost.filter(|c| c.is_finite() && *c >= 0.0)
    }
}

/// External artifact-generation backend.
///
/// Implementations must tolerate repeated calls with varying parameters.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest,
        parameters: &ParameterSet,
    ) -> Result<GeneratedArtifact>;
}

/// A generator that replays scripted outcomes, for tests.
#[cfg(test)]
pub struct ScriptedGenerator {
    outcomes: std::sync::Mutex<std::collections::VecDeque<Result<GeneratedArtifact>>>,
    calls: std::sync::Mutex<Vec<ParameterSet>>,
    tiers: std::sync::Mutex<Vec<QualityTier>>,
}

#[cfg(test)]
impl ScriptedGenerator {
    pub fn new(outcomes: Vec<Result<GeneratedArtifact>>) -> Self {
        Self {
            outcomes: std::sync::Mutex::new(outcomes.into()),
            calls: std::sync::Mutex::new(Vec::new()),
            tiers: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Generator that always succeeds with `artifact-N` references.
    pub fn always_ok(count: usize) -> Self {
        Self::new(
            (1..=count)
                .map(|i| Ok(GeneratedArtifact::new(format!("artifact-{}", i))))
                .collect(),
        )
    }

    pub fn calls(&self) -> Vec<ParameterSet> {
        self.calls.lock().unwrap().clone()
    }

    /// Tier of each generate call, in order.
    pub fn tiers(&self) -> Vec<QualityTier> {
        self.tiers.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
        parameters: &ParameterSet,
    ) -> Result<GeneratedArtifact> {
        self.calls.lock().unwrap().push(parameters.clone());
        self.tiers.lock().unwrap().push(request.quality_tier);
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::generation("script exhausted")))
    }
}
