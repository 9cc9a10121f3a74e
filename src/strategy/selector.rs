//! Rule-based strategy selection.

use tracing::debug;

use super::adjuster::ParameterAdjuster;
use super::params::ParameterSet;
use super::types::{Priority, Strategy, StrategyType, REGENERATION_ESTIMATED_COST};
use crate::analysis::{FailureAnalysis, FailureCategory, Severity};
use crate::quality::QualityTier;
use crate::retry::Attempt;

/// History length at which the attempt budget starts shrinking.
pub const BUDGET_SHRINK_HISTORY: usize = 3;

/// Attempt budget for complete regeneration.
pub const REGENERATION_MAX_ATTEMPTS: u32 = 2;

/// Chooses a [`Strategy`] from a failure analysis and the attempt history.
///
/// Rules, in order:
/// 1. A face or pose primary failure selects `model_focused`.
/// 2. Otherwise a color or branding primary failure selects `product_focused`.
/// 3. A severe failure overrides either with `complete_regeneration` at
///    the premium tier.
/// 4. Once the history holds three or more attempts the budget shrinks by one.
#[derive(Debug, Clone, Default)]
pub struct StrategySelector {
    adjuster: ParameterAdjuster,
}

impl StrategySelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_adjuster(adjuster: ParameterAdjuster) -> Self {
        Self { adjuster }
    }

    pub fn adjuster(&self) -> &ParameterAdjuster {
        &self.adjuster
    }

    /// Select a strategy for the `loop_attempt`-th attempt (1-based) of the loop.
    pub fn select(
        &self,
        analysis: &FailureAnalysis,
        history: &[Attempt],
        loop_attempt: u32,
    ) -> Strategy {
        let mut strategy = Strategy::default();

        if analysis.has_primary(FailureCategory::FaceConsistency)
            || analysis.has_primary(FailureCategory::PoseAccuracy)
        {
            strategy.strategy_type = StrategyType::ModelFocused;
            strategy.priority = Priority::Consistency;
        } else if analysis.has_primary(FailureCategory::ColorAccuracy)
            || analysis.has_primary(FailureCategory::BrandingAccuracy)
        {
            strategy.strategy_type = StrategyType::ProductFocused;
            strategy.priority = Priority::Accuracy;
        }

        if analysis.severity == Severity::Severe {
            strategy.strategy_type = StrategyType::CompleteRegeneration;
            strategy.max_attempts = REGENERATION_MAX_ATTEMPTS;
            strategy.quality_tier = QualityTier::Premium;
            strategy.estimated_cost = REGENERATION_ESTIMATED_COST;
        }

        strategy.max_attempts = Self::shrink_budget(strategy.max_attempts, history.len());
        strategy.parameter_adjustments =
            self.adjustments_for(analysis, history, strategy.strategy_type, loop_attempt);

        debug!(
            strategy = %strategy.strategy_type,
            priority = %strategy.priority,
            severity = %analysis.severity,
            max_attempts = strategy.max_attempts,
            history_len = history.len(),
            "Selected strategy"
        );
        strategy
    }

    /// Adjustments for an already selected strategy type.
    pub fn adjustments_for(
        &self,
        analysis: &FailureAnalysis,
        history: &[Attempt],
        strategy_type: StrategyType,
        loop_attempt: u32,
    ) -> ParameterSet {
        self.adjuster
            .adjust(analysis, history, strategy_type, loop_attempt)
    }

    /// Refresh a strategy's adjustments in place. Type and budget are left alone.
    pub fn refresh(
        &self,
        strategy: &mut Strategy,
        analysis: &FailureAnalysis,
        history: &[Attempt],
        loop_attempt: u32,
    ) {
        strategy.parameter_adjustments =
            self.adjustments_for(analysis, history, strategy.strategy_type, loop_attempt);
    }

    /// Budget after accounting for the history length. Never below one.
    pub fn shrink_budget(max_attempts: u32, history_len: usize) -> u32 {
        if history_len >= BUDGET_SHRINK_HISTORY {
            max_attempts.saturating_sub(1).max(1)
        } else {
            max_attempts
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::FailureAnalyzer;
    use crate::quality::{QualityMetric, QualityScores, ValidationResult};
    use crate::strategy::ParameterKey;

    fn analyze(scores: QualityScores, overall: f64, history: &[Attempt]) -> FailureAnalysis {
        FailureAnalyzer::new().analyze(&ValidationResult::new(scores, overall, false), history)
    }

    fn filler(len: u32) -> Vec<Attempt> {
        (1..=len)
            .map(|i| {
                Attempt::validated(
                    i,
                    ParameterSet::new(),
                    ValidationResult::new(QualityScores::uniform(0.9), 0.5, false),
                    0.04,
                    StrategyType::Balanced,
                )
            })
            .collect()
    }

    #[test]
    fn test_face_failure_selects_model_focused() {
        let scores = QualityScores::uniform(0.8)
            .with(QualityMetric::FaceConsistency, 0.4)
            .with(QualityMetric::PoseAccuracy, 0.8);
        let analysis = analyze(scores, 0.55, &[]);
        let strategy = StrategySelector::new().select(&analysis, &[], 1);

        assert_eq!(strategy.strategy_type, StrategyType::ModelFocused);
        assert_eq!(strategy.priority, Priority::Consistency);
        assert_eq!(strategy.max_attempts, 3);
        assert_eq!(strategy.quality_tier, QualityTier::Standard);
        assert!(strategy
            .parameter_adjustments
            .contains(ParameterKey::IdentityPreservation));
    }

    #[test]
    fn test_model_rule_wins_over_product_rule() {
        let scores = QualityScores::uniform(0.9)
            .with(QualityMetric::PoseAccuracy, 0.4)
            .with(QualityMetric::ColorAccuracy, 0.4);
        let strategy = StrategySelector::new().select(&analyze(scores, 0.7, &[]), &[], 1);
        assert_eq!(strategy.strategy_type, StrategyType::ModelFocused);
    }

    #[test]
    fn test_color_failure_selects_product_focused() {
        let scores = QualityScores::uniform(0.9).with(QualityMetric::BrandingAccuracy, 0.6);
        let strategy = StrategySelector::new().select(&analyze(scores, 0.75, &[]), &[], 1);
        assert_eq!(strategy.strategy_type, StrategyType::ProductFocused);
        assert_eq!(strategy.priority, Priority::Accuracy);
    }

    #[test]
    fn test_no_primary_is_balanced() {
        let scores = QualityScores::uniform(0.9).with(QualityMetric::StyleAccuracy, 0.5);
        let strategy = StrategySelector::new().select(&analyze(scores, 0.7, &[]), &[], 1);
        assert_eq!(strategy.strategy_type, StrategyType::Balanced);
        assert_eq!(strategy.estimated_cost, 0.06);
    }

    #[test]
    fn test_severe_overrides_to_regeneration() {
        let scores = QualityScores::uniform(0.9).with(QualityMetric::FaceConsistency, 0.1);
        let strategy = StrategySelector::new().select(&analyze(scores, 0.2, &[]), &[], 1);

        assert_eq!(strategy.strategy_type, StrategyType::CompleteRegeneration);
        assert_eq!(strategy.max_attempts, 2);
        assert_eq!(strategy.quality_tier, QualityTier::Premium);
        assert_eq!(strategy.estimated_cost, 0.12);
    }

    #[test]
    fn test_budget_shrinks_with_history() {
        let scores = QualityScores::uniform(0.9).with(QualityMetric::FaceConsistency, 0.4);
        let history = filler(3);
        let strategy =
            StrategySelector::new().select(&analyze(scores, 0.6, &history), &history, 1);
        assert_eq!(strategy.max_attempts, 2);

        assert_eq!(StrategySelector::shrink_budget(1, 10), 1);
        assert_eq!(StrategySelector::shrink_budget(2, 2), 2);
        assert_eq!(StrategySelector::shrink_budget(2, 3), 1);
    }

    #[test]
    fn test_refresh_keeps_type_and_budget() {
        let selector = StrategySelector::new();
        let face = QualityScores::uniform(0.9).with(QualityMetric::FaceConsistency, 0.4);
        let mut strategy = selector.select(&analyze(face, 0.6, &[]), &[], 1);

        let color = QualityScores::uniform(0.9).with(QualityMetric::ColorAccuracy, 0.4);
        selector.refresh(&mut strategy, &analyze(color, 0.6, &[]), &[], 2);

        assert_eq!(strategy.strategy_type, StrategyType::ModelFocused);
        assert_eq!(strategy.max_attempts, 3);
        assert!(strategy.parameter_adjustments.contains(ParameterKey::ColorFidelity));
        assert!(!strategy.parameter_adjustments.contains(ParameterKey::FeatureLock));
    }
}
