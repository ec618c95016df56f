//! Safety signal models.
//!
//! Decide how much safety stake a command carries and whether that stake
//! forces edge execution (local control loop, no WAN in the critical path).

use super::artifact::{sigmoid, ModelArtifact};
use super::{SafetyAssessment, SafetyModel};
use crate::features::{FeatureVector, IDX_MAX_LATENCY, IDX_SAFETY_LEVEL};
use crate::EngineError;
use async_trait::async_trait;
use std::path::Path;

/// Rule-based safety model. Always available, O(1), never fails.
///
/// Edge is required when the declared safety level is high/critical
/// (indicator `> 0.5`) or the latency budget is extremely tight
/// (normalized max latency `< 0.1`, i.e. under 100 ms).
#[derive(Debug, Clone, Default)]
pub struct RuleSafetyModel;

impl RuleSafetyModel {
    /// Create the rule-based safety model.
    pub fn new() -> Self {
        Self
    }

    fn assess(features: &FeatureVector) -> SafetyAssessment {
        let requires_edge =
            features.get(IDX_SAFETY_LEVEL) > 0.5 || features.get(IDX_MAX_LATENCY) < 0.1;
        // Blend the caller's safety factor with the upstream risk score.
        let score = (features.get(1) + features.get(11)) / 2.0;
        let confidence = if requires_edge { 0.9 } else { 0.7 };
        SafetyAssessment {
            score,
            requires_edge,
            confidence,
        }
    }
}

#[async_trait]
impl SafetyModel for RuleSafetyModel {
    async fn evaluate(&self, features: &FeatureVector) -> Result<SafetyAssessment, EngineError> {
        Ok(Self::assess(features))
    }
}

/// Trained safety model: standardizes the vector through the artifact's
/// scaler and maps two linear heads (score, confidence) through a sigmoid.
#[derive(Debug, Clone)]
pub struct TrainedSafetyModel {
    artifact: ModelArtifact,
}

/// Sigmoid score above which the trained model requires edge execution.
const REQUIRES_EDGE_THRESHOLD: f64 = 0.6;

impl TrainedSafetyModel {
    /// Load the model from a JSON artifact file.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] on a missing/malformed artifact or
    /// one with fewer than two scoring heads.
    pub fn from_artifact(path: &Path) -> Result<Self, EngineError> {
        let artifact = ModelArtifact::load(path)?;
        artifact.require_heads(2)?;
        Ok(Self { artifact })
    }

    /// Build from an already-validated artifact (used by tests and callers
    /// that manage artifacts themselves).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the artifact is malformed or has
    /// fewer than two heads.
    pub fn from_parts(artifact: ModelArtifact) -> Result<Self, EngineError> {
        artifact.validate()?;
        artifact.require_heads(2)?;
        Ok(Self { artifact })
    }
}

#[async_trait]
impl SafetyModel for TrainedSafetyModel {
    async fn evaluate(&self, features: &FeatureVector) -> Result<SafetyAssessment, EngineError> {
        let z = self.artifact.standardize(features)?;
        let score = sigmoid(self.artifact.score(0, &z));
        let confidence = sigmoid(self.artifact.score(1, &z));
        Ok(SafetyAssessment {
            score,
            requires_edge: score >= REQUIRES_EDGE_THRESHOLD,
            confidence,
        })
    }
}
