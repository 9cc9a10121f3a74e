//! Core types for quality scoring.
//!
//! Defines the metrics a candidate artifact is scored on, the per-tier
//! pass thresholds, and the [`ValidationResult`] every attempt records.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Cost charged for an attempt whose tier is unknown or whose generation failed.
pub const DEFAULT_ATTEMPT_COST: f64 = 0.04;

/// Named cost/quality preset.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    /// Cheapest preset ($0.02 per attempt)
    Basic,
    /// Default preset ($0.04 per attempt)
    #[default]
    Standard,
    /// Higher fidelity ($0.08 per attempt)
    Premium,
    /// Maximum fidelity ($0.16 per attempt)
    Ultra,
}

impl QualityTier {
    pub const ALL: [QualityTier; 4] = [Self::Basic, Self::Standard, Self::Premium, Self::Ultra];

    /// Cost of one attempt generated at this tier.
    pub fn attempt_cost(&self) -> f64 {
        match self {
            Self::Basic => 0.02,
            Self::Standard => 0.04,
            Self::Premium => 0.08,
            Self::Ultra => 0.16,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Standard => "standard",
            Self::Premium => "premium",
            Self::Ultra => "ultra",
        }
    }
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "standard" => Ok(Self::Standard),
            "premium" => Ok(Self::Premium),
            "ultra" => Ok(Self::Ultra),
            other => Err(Error::config(format!("unknown quality tier: {}", other))),
        }
    }
}

/// Attempt cost for a tier given by name. Unknown names cost [`DEFAULT_ATTEMPT_COST`].
pub fn cost_for_tier_name(name: &str) -> f64 {
    name.parse::<QualityTier>()
        .map(|tier| tier.attempt_cost())
        .unwrap_or(DEFAULT_ATTEMPT_COST)
}

/// A single scored quality dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityMetric {
    FaceConsistency,
    PoseAccuracy,
    ColorAccuracy,
    StyleAccuracy,
    BrandingAccuracy,
}

impl QualityMetric {
    pub const ALL: [QualityMetric; 5] = [
        Self::FaceConsistency,
        Self::PoseAccuracy,
        Self::ColorAccuracy,
        Self::StyleAccuracy,
        Self::BrandingAccuracy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FaceConsistency => "face_consistency",
            Self::PoseAccuracy => "pose_accuracy",
            Self::ColorAccuracy => "color_accuracy",
            Self::StyleAccuracy => "style_accuracy",
            Self::BrandingAccuracy => "branding_accuracy",
        }
    }

    /// Whether the metric only applies when a product reference is present.
    pub fn requires_product(&self) -> bool {
        matches!(self, Self::ColorAccuracy | Self::BrandingAccuracy)
    }
}

impl std::fmt::Display for QualityMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-metric scores in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityScores {
    pub face_consistency: f64,
    pub pose_accuracy: f64,
    pub color_accuracy: f64,
    pub style_accuracy: f64,
    pub branding_accuracy: f64,
}

impl QualityScores {
    /// Every metric set to the same score.
    pub fn uniform(score: f64) -> Self {
        Self {
            face_consistency: score,
            pose_accuracy: score,
            color_accuracy: score,
            style_accuracy: score,
            branding_accuracy: score,
        }
    }

    pub fn zero() -> Self {
        Self::uniform(0.0)
    }

    pub fn get(&self, metric: QualityMetric) -> f64 {
        match metric {
            QualityMetric::FaceConsistency => self.face_consistency,
            QualityMetric::PoseAccuracy => self.pose_accuracy,
            QualityMetric::ColorAccuracy => self.color_accuracy,
            QualityMetric::StyleAccuracy => self.style_accuracy,
            QualityMetric::BrandingAccuracy => self.branding_accuracy,
        }
    }

    pub fn with(mut self, metric: QualityMetric, score: f64) -> Self {
        match metric {
            QualityMetric::FaceConsistency => self.face_consistency = score,
            QualityMetric::PoseAccuracy => self.pose_accuracy = score,
            QualityMetric::ColorAccuracy => self.color_accuracy = score,
            QualityMetric::StyleAccuracy => self.style_accuracy = score,
            QualityMetric::BrandingAccuracy => self.branding_accuracy = score,
        }
        self
    }

    pub fn is_finite(&self) -> bool {
        QualityMetric::ALL.iter().all(|m| self.get(*m).is_finite())
    }

    /// Clamp every score into `[0, 1]`.
    pub fn clamped(self) -> Self {
        QualityMetric::ALL
            .iter()
            .fold(self, |acc, m| acc.with(*m, acc.get(*m).clamp(0.0, 1.0)))
    }
}

/// Named optional overrides for a tier's thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_consistency: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pose_accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branding_accuracy: Option<f64>,
}

impl QualityOverrides {
    fn values(&self) -> [(&'static str, Option<f64>); 6] {
        [
            ("overall", self.overall),
            ("face_consistency", self.face_consistency),
            ("pose_accuracy", self.pose_accuracy),
            ("color_accuracy", self.color_accuracy),
            ("style_accuracy", self.style_accuracy),
            ("branding_accuracy", self.branding_accuracy),
        ]
    }

    /// Reject overrides outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in self.values() {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    return Err(Error::config(format!(
                        "threshold {} must be between 0.0 and 1.0, got {}",
                        name, v
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Pass thresholds applied when scoring an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    pub overall: f64,
    pub face_consistency: f64,
    pub pose_accuracy: f64,
    pub color_accuracy: f64,
    pub style_accuracy: f64,
    pub branding_accuracy: f64,
}

impl QualityThresholds {
    /// Built-in thresholds for a tier.
    pub fn for_tier(tier: QualityTier) -> Self {
        let (overall, metric, branding) = match tier {
            QualityTier::Basic => (0.50, 0.50, 0.60),
            QualityTier::Standard => (0.60, 0.60, 0.70),
            QualityTier::Premium => (0.75, 0.70, 0.80),
            QualityTier::Ultra => (0.85, 0.80, 0.85),
        };
        Self {
            overall,
            face_consistency: metric,
            pose_accuracy: metric,
            color_accuracy: metric,
            style_accuracy: metric,
            branding_accuracy: branding,
        }
    }

    pub fn min_for(&self, metric: QualityMetric) -> f64 {
        match metric {
            QualityMetric::FaceConsistency => self.face_consistency,
            QualityMetric::PoseAccuracy => self.pose_accuracy,
            QualityMetric::ColorAccuracy => self.color_accuracy,
            QualityMetric::StyleAccuracy => self.style_accuracy,
            QualityMetric::BrandingAccuracy => self.branding_accuracy,
        }
    }

    /// Replace each threshold the overrides name.
    pub fn with_overrides(self, overrides: &QualityOverrides) -> Self {
        Self {
            overall: overrides.overall.unwrap_or(self.overall),
            face_consistency: overrides.face_consistency.unwrap_or(self.face_consistency),
            pose_accuracy: overrides.pose_accuracy.unwrap_or(self.pose_accuracy),
            color_accuracy: overrides.color_accuracy.unwrap_or(self.color_accuracy),
            style_accuracy: overrides.style_accuracy.unwrap_or(self.style_accuracy),
            branding_accuracy: overrides.branding_accuracy.unwrap_or(self.branding_accuracy),
        }
    }
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self::for_tier(QualityTier::Standard)
    }
}

/// Outcome of scoring one candidate artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Per-metric scores
    pub scores: QualityScores,
    /// Aggregate quality in `[0, 1]`
    pub overall_quality: f64,
    /// Whether the artifact passed
    pub passes: bool,
    /// Threshold snapshot used for the pass decision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<QualityThresholds>,
    /// Set when validation itself failed and this is a zero-score stand-in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidationResult {
    pub fn new(scores: QualityScores, overall_quality: f64, passes: bool) -> Self {
        Self {
            scores,
            overall_quality,
            passes,
            thresholds: None,
            error: None,
        }
    }

    /// Zero-score failing result standing in for a validator failure.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            scores: QualityScores::zero(),
            overall_quality: 0.0,
            passes: false,
            thresholds: None,
            error: Some(reason.into()),
        }
    }

    pub fn with_thresholds(mut self, thresholds: QualityThresholds) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    pub fn score(&self, metric: QualityMetric) -> f64 {
        self.scores.get(metric)
    }

    pub fn is_finite(&self) -> bool {
        self.overall_quality.is_finite() && self.scores.is_finite()
    }

    /// Whether this result stands in for a failed validation call.
    pub fn is_validator_failure(&self) -> bool {
        self.error.is_some()
    }
}
