//! Attempts and attempt history.
//!
//! An [`Attempt`] is one generate+validate cycle. Its index, parameters and
//! cost are fixed when it is appended; only the validation slot is filled
//! in afterwards, once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::quality::ValidationResult;
use crate::strategy::{ParameterSet, StrategyType};

/// One generate+validate cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    index: u32,
    parameters: ParameterSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    validation: Option<ValidationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    cost: f64,
    strategy: StrategyType,
    timestamp: DateTime<Utc>,
}

impl Attempt {
    /// An attempt whose artifact was generated and is awaiting validation.
    pub fn generated(index: u32, parameters: ParameterSet, cost: f64, strategy: StrategyType) -> Self {
        Self {
            index,
            parameters,
            validation: None,
            error: None,
            cost,
            strategy,
            timestamp: Utc::now(),
        }
    }

    /// A completed attempt.
    pub fn validated(
        index: u32,
        parameters: ParameterSet,
        validation: ValidationResult,
        cost: f64,
        strategy: StrategyType,
    ) -> Self {
        let mut attempt = Self::generated(index, parameters, cost, strategy);
        attempt.validation = Some(validation);
        attempt
    }

    /// An attempt whose generation failed. It carries a cost but no validation.
    pub fn generation_failed(
        index: u32,
        parameters: ParameterSet,
        error: impl Into<String>,
        cost: f64,
        strategy: StrategyType,
    ) -> Self {
        let mut attempt = Self::generated(index, parameters, cost, strategy);
        attempt.error = Some(error.into());
        attempt
    }

    /// Same attempt under a different index, for building histories before they are appended.
    pub fn with_index(mut self, index: u32) -> Self {
        self.index = index;
        self
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn validation(&self) -> Option<&ValidationResult> {
        self.validation.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn strategy(&self) -> StrategyType {
        self.strategy
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Overall quality, if the attempt was validated.
    pub fn overall_quality(&self) -> Option<f64> {
        self.validation.as_ref().map(|v| v.overall_quality)
    }

    pub fn passed(&self) -> bool {
        self.validation.as_ref().is_some_and(|v| v.passes)
    }

    /// Fill the validation slot. Fails if the slot is already filled or generation failed.
    pub fn record_validation(&mut self, validation: ValidationResult) -> Result<()> {
        if self.error.is_some() {
            return Err(Error::Internal(format!(
                "attempt {} failed to generate and cannot be validated",
                self.index
            )));
        }
        if self.validation.is_some() {
            return Err(Error::Internal(format!(
                "attempt {} is already validated",
                self.index
            )));
        }
        self.validation = Some(validation);
        Ok(())
    }
}

/// Append-only attempt history for one job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptHistory {
    attempts: Vec<Attempt>,
}

impl AttemptHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt a prior history, checking that indices start at 1 or later and strictly increase.
    pub fn from_attempts(attempts: Vec<Attempt>) -> Result<Self> {
        let mut history = Self::new();
        for attempt in attempts {
            history.push(attempt)?;
        }
        Ok(history)
    }

    /// Index the next appended attempt must carry.
    pub fn next_index(&self) -> u32 {
        self.attempts.last().map(|a| a.index + 1).unwrap_or(1)
    }

    /// Append an attempt. Its index must exceed the last one and its cost must be non-negative.
    pub fn push(&mut self, attempt: Attempt) -> Result<()> {
        let floor = self.attempts.last().map(|a| a.index).unwrap_or(0);
        if attempt.index <= floor {
            return Err(Error::invalid_request(
                "history",
                format!(
                    "attempt index {} must be greater than {}",
                    attempt.index, floor
                ),
            ));
        }
        if !attempt.cost.is_finite() || attempt.cost < 0.0 {
            return Err(Error::invalid_request(
                "history",
                format!("attempt {} has invalid cost {}", attempt.index, attempt.cost),
            ));
        }
        self.attempts.push(attempt);
        Ok(())
    }

    /// Fill the validation of the most recent attempt.
    pub fn record_validation(&mut self, validation: ValidationResult) -> Result<()> {
        self.attempts
            .last_mut()
            .ok_or_else(|| Error::Internal("no attempt to validate".to_string()))?
            .record_validation(validation)
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn as_slice(&self) -> &[Attempt] {
        &self.attempts
    }

    pub fn last(&self) -> Option<&Attempt> {
        self.attempts.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attempt> {
        self.attempts.iter()
    }

    pub fn total_cost(&self) -> f64 {
        self.attempts.iter().map(|a| a.cost).sum()
    }

    /// Validated attempt with the highest overall quality. Ties keep the earliest.
    pub fn best(&self) -> Option<&Attempt> {
        self.best_since(0)
    }

    /// Like [`best`](Self::best), but only over attempts from position `start` on.
    pub fn best_since(&self, start: usize) -> Option<&Attempt> {
        self.attempts
            .iter()
            .skip(start)
            .filter(|a| a.validation.is_some())
            .fold(None, |best: Option<&Attempt>, a| match best {
                Some(b) if b.overall_quality() >= a.overall_quality() => Some(b),
                _ => Some(a),
            })
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best().and_then(Attempt::overall_quality)
    }
}
