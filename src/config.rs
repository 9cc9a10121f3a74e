//! Retry configuration.
//!
//! Configuration is a typed structure with named optional fields. Unknown
//! keys are rejected at deserialization instead of being merged into an
//! untyped tree.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::quality::{QualityOverrides, QualityThresholds, QualityTier, DEFAULT_ATTEMPT_COST};

/// Best score an exhausted episode must beat to be reported as partial success.
pub const DEFAULT_PARTIAL_SUCCESS_THRESHOLD: f64 = 0.5;

/// Default global attempt cap across an attempt history.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default cost ceiling per episode, in USD.
pub const DEFAULT_COST_LIMIT: f64 = 0.50;

/// Tolerance for cost comparisons so float sums do not spuriously breach a limit.
pub const COST_EPSILON: f64 = 1e-9;

fn validate_ratio(value: f64, name: &str) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::config(format!(
            "{} must be between 0.0 and 1.0, got {}",
            name, value
        )))
    }
}

fn validate_cost(value: f64, name: &str) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::config(format!(
            "{} must be a non-negative amount, got {}",
            name, value
        )))
    }
}

/// Threshold overrides per quality tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TierOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic: Option<QualityOverrides>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard: Option<QualityOverrides>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub premium: Option<QualityOverrides>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ultra: Option<QualityOverrides>,
}

impl TierOverrides {
    pub fn get(&self, tier: QualityTier) -> Option<&QualityOverrides> {
        match tier {
            QualityTier::Basic => self.basic.as_ref(),
            QualityTier::Standard => self.standard.as_ref(),
            QualityTier::Premium => self.premium.as_ref(),
            QualityTier::Ultra => self.ultra.as_ref(),
        }
    }

    pub fn set(&mut self, tier: QualityTier, overrides: QualityOverrides) {
        let slot = match tier {
            QualityTier::Basic => &mut self.basic,
            QualityTier::Standard => &mut self.standard,
            QualityTier::Premium => &mut self.premium,
            QualityTier::Ultra => &mut self.ultra,
        };
        *slot = Some(overrides);
    }

    /// Built-in tier thresholds with any override applied.
    pub fn thresholds_for(&self, tier: QualityTier) -> QualityThresholds {
        let base = QualityThresholds::for_tier(tier);
        match self.get(tier) {
            Some(overrides) => base.with_overrides(overrides),
            None => base,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for tier in QualityTier::ALL {
            if let Some(overrides) = self.get(tier) {
                overrides
                    .validate()
                    .map_err(|e| Error::config(format!("{} tier: {}", tier, e)))?;
            }
        }
        Ok(())
    }
}

/// Configuration for the retry orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Maximum attempts across the whole history (default: 5)
    pub max_retries: u32,
    /// Cost ceiling in USD (default: 0.50)
    pub cost_limit: f64,
    /// Whether episode outcomes update the learning store
    pub enable_learning: bool,
    /// Best score an exhausted episode must beat for partial success
    pub partial_success_threshold: f64,
    /// Cost charged for a generation that failed
    pub default_attempt_cost: f64,
    /// Threshold overrides per tier
    pub quality_overrides: TierOverrides,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            cost_limit: DEFAULT_COST_LIMIT,
            enable_learning: true,
            partial_success_threshold: DEFAULT_PARTIAL_SUCCESS_THRESHOLD,
            default_attempt_cost: DEFAULT_ATTEMPT_COST,
            quality_overrides: TierOverrides::default(),
        }
    }
}

impl RetryConfig {
    /// Parse from JSON, rejecting unknown keys, then validate.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_cost(self.cost_limit, "cost_limit")?;
        validate_cost(self.default_attempt_cost, "default_attempt_cost")?;
        validate_ratio(self.partial_success_threshold, "partial_success_threshold")?;
        if self.max_retries == 0 && self.cost_limit == 0.0 {
            return Err(Error::config(
                "max_retries and cost_limit cannot both be zero",
            ));
        }
        self.quality_overrides.validate()
    }

    /// Apply a partial update. The config is left untouched if the result is invalid.
    pub fn apply(&mut self, update: &ConfigUpdate) -> Result<()> {
        let mut next = self.clone();
        if let Some(max_retries) = update.max_retries {
            next.max_retries = max_retries;
        }
        if let Some(cost_limit) = update.cost_limit {
            next.cost_limit = cost_limit;
        }
        if let Some(enable_learning) = update.enable_learning {
            next.enable_learning = enable_learning;
        }
        if let Some(threshold) = update.partial_success_threshold {
            next.partial_success_threshold = threshold;
        }
        if let Some(overrides) = update.quality_overrides {
            next.quality_overrides = overrides;
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    pub fn thresholds_for(&self, tier: QualityTier) -> QualityThresholds {
        self.quality_overrides.thresholds_for(tier)
    }
}

/// Partial configuration update with named optional fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_limit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_learning: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_success_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_overrides: Option<TierOverrides>,
}

impl ConfigUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn cost_limit(mut self, cost_limit: f64) -> Self {
        self.cost_limit = Some(cost_limit);
        self
    }

    pub fn enable_learning(mut self, enable: bool) -> Self {
        self.enable_learning = Some(enable);
        self
    }

    pub fn partial_success_threshold(mut self, threshold: f64) -> Self {
        self.partial_success_threshold = Some(threshold);
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Builder for [`RetryConfig`].
#[derive(Debug, Clone, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn cost_limit(mut self, cost_limit: f64) -> Self {
        self.config.cost_limit = cost_limit;
        self
    }

    pub fn enable_learning(mut self, enable: bool) -> Self {
        self.config.enable_learning = enable;
        self
    }

    pub fn partial_success_threshold(mut self, threshold: f64) -> Self {
        self.config.partial_success_threshold = threshold;
        self
    }

    pub fn default_attempt_cost(mut self, cost: f64) -> Self {
        self.config.default_attempt_cost = cost;
        self
    }

    pub fn tier_override(mut self, tier: QualityTier, overrides: QualityOverrides) -> Self {
        self.config.quality_overrides.set(tier, overrides);
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<RetryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
