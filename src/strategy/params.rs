//! Typed tunable parameters.
//!
//! Every parameter belongs to one [`ParameterGroup`], and every group to one
//! [`Concern`]. The bounds table lives in [`ParameterKey::spec`], so adding a
//! key without bounds fails to compile.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analysis::FailureCategory;

/// Top-level concern a parameter tunes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concern {
    Consistency,
    Accuracy,
}

impl Concern {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consistency => "consistency",
            Self::Accuracy => "accuracy",
        }
    }
}

/// Subcategory of parameters within a concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterGroup {
    Face,
    Pose,
    Color,
    Style,
    Branding,
}

impl ParameterGroup {
    pub fn concern(&self) -> Concern {
        match self {
            Self::Face | Self::Pose => Concern::Consistency,
            Self::Color | Self::Style | Self::Branding => Concern::Accuracy,
        }
    }

    /// Group tuned in response to a failure category.
    pub fn for_category(category: FailureCategory) -> Self {
        match category {
            FailureCategory::FaceConsistency => Self::Face,
            FailureCategory::PoseAccuracy => Self::Pose,
            FailureCategory::ColorAccuracy => Self::Color,
            FailureCategory::StyleAccuracy => Self::Style,
            FailureCategory::BrandingAccuracy => Self::Branding,
        }
    }

    /// Keys in this group, in table order.
    pub fn keys(&self) -> impl Iterator<Item = ParameterKey> + '_ {
        ParameterKey::ALL.into_iter().filter(move |k| k.group() == *self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Face => "face",
            Self::Pose => "pose",
            Self::Color => "color",
            Self::Style => "style",
            Self::Branding => "branding",
        }
    }
}

/// A single tunable generation parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKey {
    ModelReferenceStrength,
    IdentityPreservation,
    FeatureLock,
    PoseGuidanceStrength,
    SkeletonAdherence,
    ColorFidelity,
    SaturationPreservation,
    StyleTransferStrength,
    TextureDetail,
    LogoPreservation,
    TextClarity,
}

impl ParameterKey {
    pub const ALL: [ParameterKey; 11] = [
        Self::ModelReferenceStrength,
        Self::IdentityPreservation,
        Self::FeatureLock,
        Self::PoseGuidanceStrength,
        Self::SkeletonAdherence,
        Self::ColorFidelity,
        Self::SaturationPreservation,
        Self::StyleTransferStrength,
        Self::TextureDetail,
        Self::LogoPreservation,
        Self::TextClarity,
    ];

    pub fn group(&self) -> ParameterGroup {
        match self {
            Self::ModelReferenceStrength | Self::IdentityPreservation | Self::FeatureLock => {
                ParameterGroup::Face
            }
            Self::PoseGuidanceStrength | Self::SkeletonAdherence => ParameterGroup::Pose,
            Self::ColorFidelity | Self::SaturationPreservation => ParameterGroup::Color,
            Self::StyleTransferStrength | Self::TextureDetail => ParameterGroup::Style,
            Self::LogoPreservation | Self::TextClarity => ParameterGroup::Branding,
        }
    }

    pub fn concern(&self) -> Concern {
        self.group().concern()
    }

    /// Bounds, step and default for this key.
    pub fn spec(&self) -> ParameterSpec {
        match self {
            Self::ModelReferenceStrength => ParameterSpec::new(0.5, 1.0, 0.1, 0.7),
            Self::IdentityPreservation => ParameterSpec::new(0.6, 1.0, 0.05, 0.8),
            Self::FeatureLock => ParameterSpec::new(0.0, 1.0, 0.1, 0.5),
            Self::PoseGuidanceStrength => ParameterSpec::new(0.4, 1.0, 0.1, 0.6),
            Self::SkeletonAdherence => ParameterSpec::new(0.5, 1.0, 0.05, 0.75),
            Self::ColorFidelity => ParameterSpec::new(0.5, 1.0, 0.1, 0.7),
            Self::SaturationPreservation => ParameterSpec::new(0.3, 1.0, 0.1, 0.6),
            Self::StyleTransferStrength => ParameterSpec::new(0.3, 1.0, 0.1, 0.5),
            Self::TextureDetail => ParameterSpec::new(0.4, 1.0, 0.1, 0.6),
            Self::LogoPreservation => ParameterSpec::new(0.6, 1.0, 0.05, 0.8),
            Self::TextClarity => ParameterSpec::new(0.5, 1.0, 0.1, 0.7),
        }
    }

    /// Snake-case parameter name, without its group.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ModelReferenceStrength => "model_reference_strength",
            Self::IdentityPreservation => "identity_preservation",
            Self::FeatureLock => "feature_lock",
            Self::PoseGuidanceStrength => "pose_guidance_strength",
            Self::SkeletonAdherence => "skeleton_adherence",
            Self::ColorFidelity => "color_fidelity",
            Self::SaturationPreservation => "saturation_preservation",
            Self::StyleTransferStrength => "style_transfer_strength",
            Self::TextureDetail => "texture_detail",
            Self::LogoPreservation => "logo_preservation",
            Self::TextClarity => "text_clarity",
        }
    }

    /// Dotted path such as `consistency.face.model_reference_strength`.
    pub fn path(&self) -> String {
        let group = self.group();
        format!("{}.{}.{}", group.concern().as_str(), group.as_str(), self.name())
    }
}

impl std::fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path())
    }
}

/// Bounds and stepping for a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub default: f64,
}

impl ParameterSpec {
    pub const fn new(min: f64, max: f64, step: f64, default: f64) -> Self {
        Self {
            min,
            max,
            step,
            default,
        }
    }

    /// Clamp into `[min, max]`. Non-finite input falls back to the default.
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_finite() {
            value.clamp(self.min, self.max)
        } else {
            self.default
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Parameter values keyed by [`ParameterKey`]. Values are always clamped on
/// insert, deserialization included.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<ParameterKey, f64>", into = "BTreeMap<ParameterKey, f64>")]
pub struct ParameterSet(BTreeMap<ParameterKey, f64>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every key at its table default.
    pub fn defaults() -> Self {
        ParameterKey::ALL
            .into_iter()
            .map(|k| (k, k.spec().default))
            .collect()
    }

    pub fn get(&self, key: ParameterKey) -> Option<f64> {
        self.0.get(&key).copied()
    }

    /// Insert a value, clamped to the key's bounds. Returns the stored value.
    pub fn set(&mut self, key: ParameterKey, value: f64) -> f64 {
        let clamped = key.spec().clamp(value);
        self.0.insert(key, clamped);
        clamped
    }

    pub fn with(mut self, key: ParameterKey, value: f64) -> Self {
        self.set(key, value);
        self
    }

    pub fn contains(&self, key: ParameterKey) -> bool {
        self.0.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = ParameterKey> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParameterKey, f64)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy every value from `other` over this set.
    pub fn overlay(mut self, other: &ParameterSet) -> Self {
        for (k, v) in other.iter() {
            self.set(k, v);
        }
        self
    }

    /// Whether every value lies within its declared bounds.
    pub fn is_within_bounds(&self) -> bool {
        self.iter().all(|(k, v)| k.spec().contains(v))
    }
}

impl FromIterator<(ParameterKey, f64)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (ParameterKey, f64)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (k, v) in iter {
            set.set(k, v);
        }
        set
    }
}

impl From<BTreeMap<ParameterKey, f64>> for ParameterSet {
    fn from(values: BTreeMap<ParameterKey, f64>) -> Self {
        values.into_iter().collect()
    }
}

impl From<ParameterSet> for BTreeMap<ParameterKey, f64> {
    fn from(set: ParameterSet) -> Self {
        set.0
    }
}
