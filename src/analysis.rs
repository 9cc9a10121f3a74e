//! Failure analysis for failing validations.
//!
//! Classifies the latest [`ValidationResult`] into primary and secondary
//! failure categories and a severity. It also looks across the attempt
//! history for issues that keep recurring, and reports per-metric
//! improvement trends for diagnostics. Trends never drive branching.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::quality::{QualityMetric, ValidationResult};
use crate::retry::Attempt;

/// A quality dimension that failed its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    FaceConsistency,
    PoseAccuracy,
    ColorAccuracy,
    StyleAccuracy,
    BrandingAccuracy,
}

impl FailureCategory {
    pub const ALL: [FailureCategory; 5] = [
        Self::FaceConsistency,
        Self::PoseAccuracy,
        Self::ColorAccuracy,
        Self::StyleAccuracy,
        Self::BrandingAccuracy,
    ];

    pub fn metric(&self) -> QualityMetric {
        match self {
            Self::FaceConsistency => QualityMetric::FaceConsistency,
            Self::PoseAccuracy => QualityMetric::PoseAccuracy,
            Self::ColorAccuracy => QualityMetric::ColorAccuracy,
            Self::StyleAccuracy => QualityMetric::StyleAccuracy,
            Self::BrandingAccuracy => QualityMetric::BrandingAccuracy,
        }
    }

    /// Score below which this category is a failure in the latest validation.
    pub fn failure_threshold(&self) -> f64 {
        match self {
            Self::FaceConsistency | Self::PoseAccuracy => 0.5,
            Self::ColorAccuracy | Self::StyleAccuracy => 0.6,
            Self::BrandingAccuracy => 0.7,
        }
    }

    /// Looser threshold used when scanning history. Style is never tracked.
    pub fn persistent_threshold(&self) -> Option<f64> {
        match self {
            Self::FaceConsistency => Some(0.7),
            Self::PoseAccuracy => Some(0.6),
            Self::ColorAccuracy => Some(0.7),
            Self::BrandingAccuracy => Some(0.8),
            Self::StyleAccuracy => None,
        }
    }

    /// Whether a failure here counts as primary rather than secondary.
    pub fn is_primary(&self) -> bool {
        !matches!(self, Self::StyleAccuracy)
    }

    pub fn as_str(&self) -> &'static str {
        self.metric().as_str()
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Moderate,
    Severe,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Minor => write!(f, "minor"),
            Self::Moderate => write!(f, "moderate"),
            Self::Severe => write!(f, "severe"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendConfidence {
    High,
    Low,
}

/// Change in one metric between the first and second half of the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementTrend {
    pub metric: QualityMetric,
    pub first_half_mean: f64,
    pub second_half_mean: f64,
    pub improving: bool,
    pub confidence: TrendConfidence,
}

impl ImprovementTrend {
    pub fn delta(&self) -> f64 {
        self.second_half_mean - self.first_half_mean
    }
}

/// Result of analyzing a failing validation against its history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureAnalysis {
    pub primary_failures: BTreeSet<FailureCategory>,
    pub secondary_failures: BTreeSet<FailureCategory>,
    pub consistent_issues: BTreeSet<FailureCategory>,
    pub severity: Severity,
    /// Overall quality of the analyzed validation
    pub overall_quality: f64,
    /// Diagnostic only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub improvement_trends: Vec<ImprovementTrend>,
}

impl FailureAnalysis {
    pub fn has_primary(&self, category: FailureCategory) -> bool {
        self.primary_failures.contains(&category)
    }

    pub fn primary_count(&self) -> usize {
        self.primary_failures.len()
    }

    /// Primary failures followed by secondary ones.
    pub fn all_failures(&self) -> impl Iterator<Item = FailureCategory> + '_ {
        self.primary_failures
            .iter()
            .chain(self.secondary_failures.iter())
            .copied()
    }

    pub fn is_persistent(&self, category: FailureCategory) -> bool {
        self.consistent_issues.contains(&category)
    }
}

/// Fraction of prior attempts an issue must appear in to count as persistent.
pub const PERSISTENCE_RATIO: (usize, usize) = (3, 5);

/// Overall quality below which a failure is severe.
pub const SEVERE_QUALITY_CUTOFF: f64 = 0.3;

/// Overall quality below which a failure is at least moderate.
pub const MODERATE_QUALITY_CUTOFF: f64 = 0.6;

/// Classifies failing validations.
#[derive(Debug, Clone, Default)]
pub struct FailureAnalyzer;

impl FailureAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Analyze the latest validation given the full attempt history.
    pub fn analyze(&self, validation: &ValidationResult, history: &[Attempt]) -> FailureAnalysis {
        let mut primary_failures = BTreeSet::new();
        let mut secondary_failures = BTreeSet::new();

        for category in FailureCategory::ALL {
            if validation.score(category.metric()) < category.failure_threshold() {
                if category.is_primary() {
                    primary_failures.insert(category);
                } else {
                    secondary_failures.insert(category);
                }
            }
        }

        let severity = Self::classify_severity(validation.overall_quality, primary_failures.len());

        FailureAnalysis {
            primary_failures,
            secondary_failures,
            consistent_issues: Self::consistent_issues(history),
            severity,
            overall_quality: validation.overall_quality,
            improvement_trends: Self::improvement_trends(history),
        }
    }

    /// Severity from overall quality and the number of primary failures.
    pub fn classify_severity(overall_quality: f64, primary_count: usize) -> Severity {
        if overall_quality < SEVERE_QUALITY_CUTOFF || primary_count >= 3 {
            Severity::Severe
        } else if overall_quality < MODERATE_QUALITY_CUTOFF || primary_count >= 2 {
            Severity::Moderate
        } else {
            Severity::Minor
        }
    }

    /// Minimum number of attempts an issue must appear in: `ceil(0.6 × n)`.
    pub fn persistence_requirement(history_len: usize) -> usize {
        let (num, den) = PERSISTENCE_RATIO;
        (history_len * num).div_ceil(den)
    }

    /// Issues present in at least 60% of prior attempts, under looser thresholds.
    ///
    /// Attempts without a validation count toward the history length but
    /// never toward an issue.
    pub fn consistent_issues(history: &[Attempt]) -> BTreeSet<FailureCategory> {
        if history.is_empty() {
            return BTreeSet::new();
        }
        let required = Self::persistence_requirement(history.len());

        FailureCategory::ALL
            .into_iter()
            .filter_map(|category| category.persistent_threshold().map(|t| (category, t)))
            .filter(|(category, threshold)| {
                let hits = history
                    .iter()
                    .filter_map(Attempt::validation)
                    .filter(|v| v.score(category.metric()) < *threshold)
                    .count();
                hits >= required
            })
            .map(|(category, _)| category)
            .collect()
    }

    /// Compare per-metric means of the first and second half of the validated history.
    pub fn improvement_trends(history: &[Attempt]) -> Vec<ImprovementTrend> {
        let validated: Vec<&ValidationResult> =
            history.iter().filter_map(Attempt::validation).collect();
        if validated.len() < 2 {
            return Vec::new();
        }

        let (first, second) = validated.split_at(validated.len() / 2);
        let mean = |half: &[&ValidationResult], metric: QualityMetric| {
            half.iter().map(|v| v.score(metric)).sum::<f64>() / half.len() as f64
        };

        QualityMetric::ALL
            .into_iter()
            .map(|metric| {
                let first_half_mean = mean(first, metric);
                let second_half_mean = mean(second, metric);
                let delta = second_half_mean - first_half_mean;
                ImprovementTrend {
                    metric,
                    first_half_mean,
                    second_half_mean,
                    improving: second_half_mean > first_half_mean,
                    confidence: if delta.abs() > 0.1 {
                        TrendConfidence::High
                    } else {
                        TrendConfidence::Low
                    },
                }
            })
            .collect()
    }
}
