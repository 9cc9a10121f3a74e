//! The retry episode loop.
//!
//! One episode runs strictly sequentially: analyze, select, adjust,
//! generate, validate, record, until an attempt passes or a budget runs
//! out. Generate and validate failures are recovered inside the loop.
//! Only malformed requests and contract violations come back as `Err`.

use std::sync::{Arc, RwLock};
use tracing::{debug, info, instrument, warn};

use super::attempt::{Attempt, AttemptHistory};
use super::cancel::CancelSignal;
use super::state::{RetryState, StateMachine};
use super::types::{
    recommendations, EpisodeError, EpisodeId, EpisodeReport, EpisodeResult, FailureResult, JobId,
    SuccessResult,
};
use crate::analysis::{FailureAnalysis, FailureAnalyzer};
use crate::config::{ConfigUpdate, RetryConfig, COST_EPSILON};
use crate::error::{Error, Result};
use crate::generation::{GenerationRequest, Generator};
use crate::learning::{LearningStatistics, LearningStore};
use crate::quality::{validate_or_fail, QualityValidator, ValidationRequest, ValidationResult};
use crate::strategy::{ParameterAdjuster, Strategy, StrategySelector};

/// Runs retry episodes against external generate and validate backends.
///
/// The learning store is injected so several orchestrators, or several
/// concurrent jobs on one orchestrator, can share it.
pub struct RetryOrchestrator {
    generator: Arc<dyn Generator>,
    validator: Arc<dyn QualityValidator>,
    learning: Arc<LearningStore>,
    config: RwLock<RetryConfig>,
    analyzer: FailureAnalyzer,
}

impl RetryOrchestrator {
    /// Create an orchestrator. Fails if `config` is invalid.
    pub fn new(
        generator: Arc<dyn Generator>,
        validator: Arc<dyn QualityValidator>,
        learning: Arc<LearningStore>,
        config: RetryConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            generator,
            validator,
            learning,
            config: RwLock::new(config),
            analyzer: FailureAnalyzer::new(),
        })
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> Result<RetryConfig> {
        self.config
            .read()
            .map(|config| config.clone())
            .map_err(|e| Error::Internal(format!("Failed to read retry config: {}", e)))
    }

    /// Apply a partial configuration update. Running episodes keep their snapshot.
    pub fn update_configuration(&self, update: &ConfigUpdate) -> Result<RetryConfig> {
        let mut config = self
            .config
            .write()
            .map_err(|e| Error::Internal(format!("Failed to write retry config: {}", e)))?;
        config.apply(update)?;
        info!(
            max_retries = config.max_retries,
            cost_limit = config.cost_limit,
            enable_learning = config.enable_learning,
            partial_success_threshold = config.partial_success_threshold,
            "Updated retry configuration"
        );
        Ok(config.clone())
    }

    pub fn learning(&self) -> &Arc<LearningStore> {
        &self.learning
    }

    pub fn learning_statistics(&self) -> Result<LearningStatistics> {
        self.learning.statistics()
    }

    pub fn reset_learning_data(&self) -> Result<()> {
        self.learning.reset()?;
        info!("Reset learning data");
        Ok(())
    }

    /// Whether another attempt under `strategy` fits both global budgets.
    pub fn can_retry(config: &RetryConfig, history: &AttemptHistory, strategy: &Strategy) -> bool {
        Self::check_budget(config, history, strategy).is_ok()
    }

    /// Budget check with the reason it failed.
    pub fn check_budget(
        config: &RetryConfig,
        history: &AttemptHistory,
        strategy: &Strategy,
    ) -> std::result::Result<(), EpisodeError> {
        if history.len() >= config.max_retries as usize {
            return Err(EpisodeError::RetryLimitReached {
                attempts: history.len(),
                max_retries: config.max_retries,
            });
        }
        let spent = history.total_cost();
        if spent + strategy.estimated_cost > config.cost_limit + COST_EPSILON {
            return Err(EpisodeError::BudgetExceeded {
                spent,
                next_estimate: strategy.estimated_cost,
                limit: config.cost_limit,
            });
        }
        Ok(())
    }

    /// Run one retry episode for a job whose last validation failed.
    pub async fn run_retry_episode(
        &self,
        request: &GenerationRequest,
        initial_validation: ValidationResult,
        prior_history: Vec<Attempt>,
        job_id: JobId,
    ) -> Result<EpisodeReport> {
        self.run_retry_episode_with_cancel(
            request,
            initial_validation,
            prior_history,
            job_id,
            CancelSignal::never(),
        )
        .await
    }

    /// Like [`run_retry_episode`](Self::run_retry_episode), stopping before
    /// the next attempt once `cancel` fires.
    #[instrument(skip_all, fields(job_id = %job_id))]
    pub async fn run_retry_episode_with_cancel(
        &self,
        request: &GenerationRequest,
        initial_validation: ValidationResult,
        prior_history: Vec<Attempt>,
        job_id: JobId,
        cancel: CancelSignal,
    ) -> Result<EpisodeReport> {
        request.validate()?;
        if !initial_validation.is_finite() {
            return Err(Error::invalid_request(
                "initial_validation",
                "scores must be finite",
            ));
        }

        let config = self.config()?;
        let mut history = AttemptHistory::from_attempts(prior_history)?;
        let prior_len = history.len();
        let episode_id = EpisodeId::new();
        let mut machine = StateMachine::new();

        machine.transition(RetryState::Validating, 0)?;
        if initial_validation.passes {
            return Err(Error::invalid_request(
                "initial_validation",
                "already passes, nothing to retry",
            ));
        }

        machine.transition(RetryState::Analyzing, 0)?;
        let mut analysis = self.analyzer.analyze(&initial_validation, history.as_slice());
        machine.transition(RetryState::Selecting, 0)?;

        let selector = StrategySelector::with_adjuster(ParameterAdjuster::with_base(
            request.base_parameters.clone(),
        ));
        let mut strategy = selector.select(&analysis, history.as_slice(), 1);

        info!(
            episode_id = %episode_id,
            strategy = %strategy.strategy_type,
            severity = %analysis.severity,
            max_attempts = strategy.max_attempts,
            prior_attempts = prior_len,
            "Starting retry episode"
        );

        let thresholds = config.thresholds_for(request.quality_tier);
        let mut attempts_used = 0u32;
        let mut generation_failures = 0u32;
        let mut last_generation_error = None;
        let mut stop = None;
        let mut passed = None;

        for k in 1..=strategy.max_attempts {
            if cancel.is_cancelled() {
                info!(attempt = k, "Episode cancelled before attempt");
                machine.transition(RetryState::Cancelled, k)?;
                stop = Some(EpisodeError::Cancelled);
                break;
            }
            if let Err(reason) = Self::check_budget(&config, &history, &strategy) {
                warn!(attempt = k, reason = %reason, "Stopping on budget");
                machine.transition(RetryState::BudgetExceeded, k)?;
                stop = Some(reason);
                break;
            }

            machine.transition(RetryState::Adjusting, k)?;
            if k > 1 {
                selector.refresh(&mut strategy, &analysis, history.as_slice(), k);
            }
            let parameters = selector
                .adjuster()
                .effective_parameters(&strategy.parameter_adjustments);

            machine.transition(RetryState::Generating, k)?;
            attempts_used = k;
            let index = history.next_index();
            let is_last = k == strategy.max_attempts;

            let generation_request = request.clone().with_quality_tier(strategy.quality_tier);
            let artifact = match self.generator.generate(&generation_request, &parameters).await {
                Ok(artifact) => artifact,
                Err(e) => {
                    warn!(attempt = index, error = %e, "Generation failed, recording costed attempt");
                    history.push(Attempt::generation_failed(
                        index,
                        parameters,
                        e.to_string(),
                        config.default_attempt_cost,
                        strategy.strategy_type,
                    ))?;
                    generation_failures += 1;
                    last_generation_error = Some(e.to_string());
                    if is_last {
                        machine.transition(RetryState::Exhausted, k)?;
                    } else {
                        machine.transition(RetryState::Analyzing, k)?;
                        machine.transition(RetryState::Selecting, k)?;
                    }
                    continue;
                }
            };

            let cost = artifact
                .billable_cost()
                .unwrap_or_else(|| strategy.quality_tier.attempt_cost());
            history.push(Attempt::generated(
                index,
                parameters,
                cost,
                strategy.strategy_type,
            ))?;

            machine.transition(RetryState::Validating, k)?;
            let validation_request = ValidationRequest::for_artifact(request, &artifact.artifact_ref)
                .with_thresholds(thresholds);
            let validation = validate_or_fail(self.validator.as_ref(), &validation_request).await;
            let passes = validation.passes;
            debug!(
                attempt = index,
                overall_quality = validation.overall_quality,
                passes,
                cost,
                "Attempt validated"
            );
            history.record_validation(validation.clone())?;

            if passes {
                machine.transition(RetryState::Passed, k)?;
                passed = history.last().cloned();
                break;
            }
            if is_last {
                machine.transition(RetryState::Exhausted, k)?;
            } else {
                machine.transition(RetryState::Analyzing, k)?;
                analysis = self.analyzer.analyze(&validation, history.as_slice());
                machine.transition(RetryState::Selecting, k)?;
            }
        }

        let total_cost = history.total_cost();
        let result = match (passed, stop) {
            (Some(attempt), _) => EpisodeResult::Success(SuccessResult {
                attempt,
                total_cost,
                attempts_used,
                strategy: strategy.strategy_type,
                partial: false,
            }),
            (None, Some(error)) => {
                EpisodeResult::Failure(Self::failure(error, &history, &analysis, &strategy, attempts_used))
            }
            (None, None) => match history.best_since(prior_len) {
                Some(best)
                    if best
                        .overall_quality()
                        .is_some_and(|q| q > config.partial_success_threshold) =>
                {
                    EpisodeResult::PartialSuccess(SuccessResult {
                        attempt: best.clone(),
                        total_cost,
                        attempts_used,
                        strategy: strategy.strategy_type,
                        partial: true,
                    })
                }
                _ => {
                    let error = match last_generation_error {
                        Some(last_error) if generation_failures == attempts_used => {
                            EpisodeError::GenerationFailed {
                                attempts: attempts_used,
                                last_error,
                            }
                        }
                        _ => EpisodeError::AttemptsExhausted {
                            attempts: attempts_used,
                        },
                    };
                    EpisodeResult::Failure(Self::failure(
                        error,
                        &history,
                        &analysis,
                        &strategy,
                        attempts_used,
                    ))
                }
            },
        };
        machine.transition(RetryState::Done, attempts_used)?;

        if config.enable_learning {
            if let Err(e) = self.learning.update_on_episode_end(&strategy, &result) {
                warn!(error = %e, "Failed to update learning store");
            }
        }

        info!(
            episode_id = %episode_id,
            success = result.is_success(),
            partial = result.is_partial(),
            attempts_used,
            total_cost,
            best_score = ?result.best_score(),
            "Retry episode finished"
        );

        Ok(EpisodeReport {
            episode_id,
            job_id,
            result,
            history,
            trace: machine.into_trace(),
            strategy,
        })
    }

    fn failure(
        error: EpisodeError,
        history: &AttemptHistory,
        analysis: &FailureAnalysis,
        strategy: &Strategy,
        attempts_used: u32,
    ) -> FailureResult {
        FailureResult {
            recommendations: recommendations(analysis, &error),
            error,
            best_score: history.best_score(),
            attempts_used,
            total_attempts: history.len(),
            total_cost: history.total_cost(),
            failure_analysis: analysis.clone(),
            strategy: strategy.strategy_type,
        }
    }
}

impl std::fmt::Debug for RetryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryOrchestrator")
            .field("config", &self.config)
            .field("learning", &self.learning)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfigBuilder;
    use crate::generation::{GeneratedArtifact, ScriptedGenerator};
    use crate::quality::{
        QualityMetric, QualityOverrides, QualityScores, QualityTier, ScriptedValidator,
    };
    use crate::retry::CancelHandle;
    use crate::strategy::{ParameterKey, ParameterSet, StrategyType};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct Harness {
        orchestrator: RetryOrchestrator,
        generator: Arc<ScriptedGenerator>,
        validator: Arc<ScriptedValidator>,
        learning: Arc<LearningStore>,
    }

    fn harness(
        generator: ScriptedGenerator,
        validator: ScriptedValidator,
        config: RetryConfig,
    ) -> Harness {
        let generator = Arc::new(generator);
        let validator = Arc::new(validator);
        let learning = Arc::new(LearningStore::new());
        let orchestrator = RetryOrchestrator::new(
            generator.clone(),
            validator.clone(),
            learning.clone(),
            config,
        )
        .unwrap();
        Harness {
            orchestrator,
            generator,
            validator,
            learning,
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new("model-7", "studio portrait, linen shirt", "standing")
            .with_product("sku-42")
    }

    /// face=0.4, pose=0.8, overall=0.55
    fn face_failure() -> ValidationResult {
        ValidationResult::new(
            QualityScores::uniform(0.8)
                .with(QualityMetric::FaceConsistency, 0.4)
                .with(QualityMetric::PoseAccuracy, 0.8),
            0.55,
            false,
        )
    }

    fn prior(index: u32, score: f64) -> Attempt {
        Attempt::validated(
            index,
            ParameterSet::new(),
            ValidationResult::new(QualityScores::uniform(score), score, false),
            0.04,
            StrategyType::Balanced,
        )
    }

    fn failure_of(report: &EpisodeReport) -> &FailureResult {
        match &report.result {
            EpisodeResult::Failure(f) => f,
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_third_attempt_passes() {
        let h = harness(
            ScriptedGenerator::always_ok(3),
            ScriptedValidator::from_scores(&[0.3, 0.55, 0.62], 0.6),
            RetryConfig::default(),
        );
        let report = h
            .orchestrator
            .run_retry_episode(&request(), face_failure(), Vec::new(), JobId::new())
            .await
            .unwrap();

        let EpisodeResult::Success(success) = &report.result else {
            panic!("expected success, got {:?}", report.result);
        };
        assert_eq!(success.attempts_used, 3);
        assert_eq!(success.attempt.index(), 3);
        assert_eq!(success.strategy, StrategyType::ModelFocused);
        assert!(!success.partial);
        assert!((success.total_cost - 0.12).abs() < 1e-9);
        assert_eq!(report.history.len(), 3);
        assert_eq!(h.generator.calls().len(), 3);

        let last: Vec<_> = report.trace.iter().rev().take(2).map(|t| t.to).collect();
        assert_eq!(last, vec![RetryState::Done, RetryState::Passed]);
        assert_eq!(report.trace.len(), 18);

        let stats = h.orchestrator.learning_statistics().unwrap();
        let rate = &stats.success_rate[&StrategyType::ModelFocused];
        assert_eq!((rate.attempts, rate.successes), (1, 1));
    }

    #[tokio::test]
    async fn test_adjusted_parameters_reach_generator() {
        let h = harness(
            ScriptedGenerator::always_ok(2),
            ScriptedValidator::from_scores(&[0.3, 0.7], 0.6),
            RetryConfig::default(),
        );
        h.orchestrator
            .run_retry_episode(&request(), face_failure(), Vec::new(), JobId::new())
            .await
            .unwrap();

        let calls = h.generator.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(ParameterSet::is_within_bounds));
        // one step up from the 0.8 default
        assert!((calls[0].get(ParameterKey::IdentityPreservation).unwrap() - 0.85).abs() < 1e-9);
        assert_eq!(calls[0].get(ParameterKey::ColorFidelity), Some(0.7));
        // second attempt reacts to the all-round 0.3 failure
        assert!(calls[1].get(ParameterKey::ColorFidelity).unwrap() > 0.7);
    }

    #[tokio::test]
    async fn test_budget_stops_before_generating() {
        let config = RetryConfigBuilder::new().cost_limit(0.10).build().unwrap();
        let h = harness(
            ScriptedGenerator::always_ok(3),
            ScriptedValidator::from_scores(&[0.9], 0.6),
            config.clone(),
        );

        let history = AttemptHistory::from_attempts(vec![prior(1, 0.45), prior(2, 0.5)]).unwrap();
        let strategy = Strategy::default().with_estimated_cost(0.04);
        assert!(!RetryOrchestrator::can_retry(&config, &history, &strategy));

        let report = h
            .orchestrator
            .run_retry_episode(
                &request(),
                face_failure(),
                vec![prior(1, 0.45), prior(2, 0.5)],
                JobId::new(),
            )
            .await
            .unwrap();

        let failure = failure_of(&report);
        assert!(matches!(failure.error, EpisodeError::BudgetExceeded { .. }));
        assert_eq!(failure.best_score, Some(0.5));
        assert_eq!(failure.attempts_used, 0);
        assert_eq!(failure.total_attempts, 2);
        assert!((failure.total_cost - 0.08).abs() < 1e-9);
        assert!(failure
            .recommendations
            .contains(&"raise the cost limit or lower the quality tier".to_string()));
        assert!(h.generator.calls().is_empty());
        assert!(h.validator.requests().is_empty());
    }

    #[test]
    fn test_budget_comparison_tolerates_float_error() {
        let config = RetryConfigBuilder::new().cost_limit(0.10).build().unwrap();
        let history = AttemptHistory::from_attempts(vec![prior(1, 0.2)]).unwrap();
        let strategy = Strategy::default();
        // the float sum 0.04 + 0.06 may land a hair above 0.10
        assert!(RetryOrchestrator::can_retry(&config, &history, &strategy));
    }

    #[tokio::test]
    async fn test_retry_limit_counts_prior_attempts() {
        let config = RetryConfigBuilder::new().max_retries(2).build().unwrap();
        let h = harness(
            ScriptedGenerator::always_ok(1),
            ScriptedValidator::from_scores(&[0.9], 0.6),
            config,
        );
        let report = h
            .orchestrator
            .run_retry_episode(
                &request(),
                face_failure(),
                vec![prior(1, 0.3), prior(2, 0.4)],
                JobId::new(),
            )
            .await
            .unwrap();
        assert!(matches!(
            failure_of(&report).error,
            EpisodeError::RetryLimitReached {
                attempts: 2,
                max_retries: 2
            }
        ));
    }

    #[tokio::test]
    async fn test_cost_ceiling_never_crossed() {
        let config = RetryConfigBuilder::new().cost_limit(0.13).build().unwrap();
        let h = harness(
            ScriptedGenerator::always_ok(3),
            ScriptedValidator::from_scores(&[0.3, 0.3, 0.3], 0.6),
            config,
        );
        let report = h
            .orchestrator
            .run_retry_episode(&request(), face_failure(), Vec::new(), JobId::new())
            .await
            .unwrap();

        let failure = failure_of(&report);
        // third attempt would need 0.08 + 0.06 > 0.13
        assert!(matches!(failure.error, EpisodeError::BudgetExceeded { .. }));
        assert_eq!(failure.attempts_used, 2);
        assert!(report.result.total_cost() <= 0.13);
    }

    #[tokio::test]
    async fn test_generation_failure_is_costed_and_skipped() {
        let h = harness(
            ScriptedGenerator::new(vec![
                Err(Error::generation("backend 503")),
                Ok(GeneratedArtifact::new("artifact-2")),
            ]),
            ScriptedValidator::from_scores(&[0.7], 0.6),
            RetryConfig::default(),
        );
        let report = h
            .orchestrator
            .run_retry_episode(&request(), face_failure(), Vec::new(), JobId::new())
            .await
            .unwrap();

        let EpisodeResult::Success(success) = &report.result else {
            panic!("expected success, got {:?}", report.result);
        };
        assert_eq!(success.attempts_used, 2);
        let first = &report.history.as_slice()[0];
        assert!(first.validation().is_none());
        assert!(first.error().unwrap().contains("backend 503"));
        assert_eq!(first.cost(), 0.04);
        assert!((success.total_cost - 0.08).abs() < 1e-9);
        assert_eq!(h.validator.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_all_generations_failing() {
        let h = harness(
            ScriptedGenerator::new(Vec::new()),
            ScriptedValidator::new(Vec::new()),
            RetryConfig::default(),
        );
        let report = h
            .orchestrator
            .run_retry_episode(&request(), face_failure(), Vec::new(), JobId::new())
            .await
            .unwrap();

        let failure = failure_of(&report);
        assert!(matches!(
            failure.error,
            EpisodeError::GenerationFailed { attempts: 3, .. }
        ));
        assert_eq!(failure.best_score, None);
        assert!((failure.total_cost - 0.12).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_validator_errors_score_zero() {
        let h = harness(
            ScriptedGenerator::always_ok(3),
            ScriptedValidator::new(vec![
                Err(Error::validation("scorer offline")),
                Err(Error::validation("scorer offline")),
                Err(Error::validation("scorer offline")),
            ]),
            RetryConfig::default(),
        );
        let report = h
            .orchestrator
            .run_retry_episode(&request(), face_failure(), Vec::new(), JobId::new())
            .await
            .unwrap();

        let failure = failure_of(&report);
        assert!(matches!(
            failure.error,
            EpisodeError::AttemptsExhausted { attempts: 3 }
        ));
        assert_eq!(failure.best_score, Some(0.0));
        assert!(report
            .history
            .iter()
            .all(|a| a.validation().is_some_and(ValidationResult::is_validator_failure)));
        assert!(failure
            .recommendations
            .contains(&"retry later or escalate".to_string()));

        let stats = h.learning.statistics().unwrap();
        assert_eq!(stats.success_rate[&StrategyType::ModelFocused].successes, 0);
    }

    #[tokio::test]
    async fn test_partial_success_uses_best_attempt() {
        let h = harness(
            ScriptedGenerator::always_ok(3),
            ScriptedValidator::from_scores(&[0.52, 0.58, 0.55], 0.6),
            RetryConfig::default(),
        );
        let report = h
            .orchestrator
            .run_retry_episode(&request(), face_failure(), Vec::new(), JobId::new())
            .await
            .unwrap();

        let EpisodeResult::PartialSuccess(partial) = &report.result else {
            panic!("expected partial success, got {:?}", report.result);
        };
        assert!(partial.partial);
        assert_eq!(partial.attempt.index(), 2);
        assert_eq!(partial.attempts_used, 3);
        assert!(report.result.is_success());
        assert_eq!(report.trace.last().unwrap().from, RetryState::Exhausted);
    }

    #[tokio::test]
    async fn test_partial_success_threshold_is_exclusive() {
        let h = harness(
            ScriptedGenerator::always_ok(3),
            ScriptedValidator::from_scores(&[0.5, 0.5, 0.5], 0.6),
            RetryConfig::default(),
        );
        let report = h
            .orchestrator
            .run_retry_episode(&request(), face_failure(), Vec::new(), JobId::new())
            .await
            .unwrap();
        assert!(!report.result.is_success());
    }

    #[tokio::test]
    async fn test_severe_failure_regenerates_at_premium_cost() {
        let h = harness(
            ScriptedGenerator::always_ok(2),
            ScriptedValidator::from_scores(&[0.2, 0.7], 0.6),
            RetryConfig::default(),
        );
        let report = h
            .orchestrator
            .run_retry_episode(
                &request(),
                ValidationResult::failed("scorer timeout"),
                Vec::new(),
                JobId::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.strategy.strategy_type, StrategyType::CompleteRegeneration);
        assert_eq!(report.strategy.max_attempts, 2);
        assert!((report.result.total_cost() - 0.16).abs() < 1e-9);
        assert!(report.result.is_success());
        // rendered at the tier that was billed, validated at the requested one
        assert_eq!(h.generator.tiers(), vec![QualityTier::Premium; 2]);
        assert!(h
            .validator
            .requests()
            .iter()
            .all(|r| r.quality_tier == QualityTier::Standard));
    }

    #[tokio::test]
    async fn test_ordinary_strategy_generates_at_standard() {
        let h = harness(
            ScriptedGenerator::always_ok(1),
            ScriptedValidator::from_scores(&[0.8], 0.6),
            RetryConfig::default(),
        );
        h.orchestrator
            .run_retry_episode(
                &request().with_quality_tier(QualityTier::Basic),
                face_failure(),
                Vec::new(),
                JobId::new(),
            )
            .await
            .unwrap();
        assert_eq!(h.generator.tiers(), vec![QualityTier::Standard]);
    }

    #[tokio::test]
    async fn test_configured_overrides_reach_validator() {
        let config = RetryConfigBuilder::new()
            .tier_override(
                QualityTier::Standard,
                QualityOverrides {
                    overall: Some(0.95),
                    ..Default::default()
                },
            )
            .build()
            .unwrap();
        let h = harness(
            ScriptedGenerator::always_ok(1),
            ScriptedValidator::from_scores(&[0.8], 0.6),
            config,
        );
        h.orchestrator
            .run_retry_episode(&request(), face_failure(), Vec::new(), JobId::new())
            .await
            .unwrap();

        let requests = h.validator.requests();
        assert_eq!(requests.len(), 1);
        let thresholds = requests[0].thresholds.unwrap();
        assert_eq!(thresholds.overall, 0.95);
        assert_eq!(thresholds.face_consistency, 0.60);
    }

    #[tokio::test]
    async fn test_reported_cost_overrides_tier_cost() {
        let h = harness(
            ScriptedGenerator::new(vec![Ok(GeneratedArtifact::new("a-1").with_cost(0.07))]),
            ScriptedValidator::from_scores(&[0.8], 0.6),
            RetryConfig::default(),
        );
        let report = h
            .orchestrator
            .run_retry_episode(&request(), face_failure(), Vec::new(), JobId::new())
            .await
            .unwrap();
        assert_eq!(report.history.last().unwrap().cost(), 0.07);
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let h = harness(
            ScriptedGenerator::always_ok(3),
            ScriptedValidator::from_scores(&[0.9], 0.6),
            RetryConfig::default(),
        );
        let (handle, signal) = CancelHandle::new();
        handle.cancel();

        let report = h
            .orchestrator
            .run_retry_episode_with_cancel(
                &request(),
                face_failure(),
                Vec::new(),
                JobId::new(),
                signal,
            )
            .await
            .unwrap();

        let failure = failure_of(&report);
        assert_eq!(failure.error, EpisodeError::Cancelled);
        assert_eq!(failure.attempts_used, 0);
        assert!(h.generator.calls().is_empty());
    }

    /// Cancels the episode from inside the first generate call.
    struct CancellingGenerator {
        handle: CancelHandle,
    }

    #[async_trait]
    impl Generator for CancellingGenerator {
        async fn generate(
            &self,
            _request: &GenerationRequest,
            _parameters: &ParameterSet,
        ) -> Result<GeneratedArtifact> {
            self.handle.cancel();
            Ok(GeneratedArtifact::new("artifact-1"))
        }
    }

    #[tokio::test]
    async fn test_cancel_keeps_appended_attempts() {
        let (handle, signal) = CancelHandle::new();
        let orchestrator = RetryOrchestrator::new(
            Arc::new(CancellingGenerator { handle }),
            Arc::new(ScriptedValidator::from_scores(&[0.3, 0.9], 0.6)),
            Arc::new(LearningStore::new()),
            RetryConfig::default(),
        )
        .unwrap();

        let report = orchestrator
            .run_retry_episode_with_cancel(
                &request(),
                face_failure(),
                Vec::new(),
                JobId::new(),
                signal,
            )
            .await
            .unwrap();

        let failure = failure_of(&report);
        assert_eq!(failure.error, EpisodeError::Cancelled);
        assert_eq!(failure.attempts_used, 1);
        assert_eq!(report.history.len(), 1);
        assert_eq!(failure.best_score, Some(0.3));
    }

    #[tokio::test]
    async fn test_learning_disabled() {
        let config = RetryConfigBuilder::new().enable_learning(false).build().unwrap();
        let h = harness(
            ScriptedGenerator::always_ok(1),
            ScriptedValidator::from_scores(&[0.9], 0.6),
            config,
        );
        h.orchestrator
            .run_retry_episode(&request(), face_failure(), Vec::new(), JobId::new())
            .await
            .unwrap();
        assert!(h.learning.statistics().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_contract_violations_are_errors() {
        let h = harness(
            ScriptedGenerator::always_ok(1),
            ScriptedValidator::from_scores(&[0.9], 0.6),
            RetryConfig::default(),
        );

        let passing = ValidationResult::new(QualityScores::uniform(0.9), 0.9, true);
        let err = h
            .orchestrator
            .run_retry_episode(&request(), passing, Vec::new(), JobId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest { .. }));

        let blank = GenerationRequest::new("", "prompt", "standing");
        assert!(h
            .orchestrator
            .run_retry_episode(&blank, face_failure(), Vec::new(), JobId::new())
            .await
            .is_err());

        let nan = ValidationResult::new(QualityScores::uniform(f64::NAN), 0.4, false);
        assert!(h
            .orchestrator
            .run_retry_episode(&request(), nan, Vec::new(), JobId::new())
            .await
            .is_err());

        let out_of_order = vec![prior(2, 0.3), prior(1, 0.4)];
        assert!(h
            .orchestrator
            .run_retry_episode(&request(), face_failure(), out_of_order, JobId::new())
            .await
            .is_err());
        assert!(h.generator.calls().is_empty());
    }

    #[test]
    fn test_update_configuration() {
        let h = harness(
            ScriptedGenerator::always_ok(0),
            ScriptedValidator::new(Vec::new()),
            RetryConfig::default(),
        );
        let updated = h
            .orchestrator
            .update_configuration(&ConfigUpdate::new().cost_limit(1.0).max_retries(8))
            .unwrap();
        assert_eq!(updated.cost_limit, 1.0);
        assert_eq!(h.orchestrator.config().unwrap().max_retries, 8);

        let bad = ConfigUpdate::new().partial_success_threshold(1.5);
        assert!(h.orchestrator.update_configuration(&bad).is_err());
        assert_eq!(
            h.orchestrator.config().unwrap().partial_success_threshold,
            0.5
        );
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = RetryConfig {
            cost_limit: -1.0,
            ..RetryConfig::default()
        };
        let result = RetryOrchestrator::new(
            Arc::new(ScriptedGenerator::always_ok(0)),
            Arc::new(ScriptedValidator::new(Vec::new())),
            Arc::new(LearningStore::new()),
            config,
        );
        assert!(result.is_err());
    }
}
