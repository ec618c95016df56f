//! Routing signal models.
//!
//! Produce a probability distribution over execution locations and a
//! recommendation with confidence.

use super::artifact::{softmax3, ModelArtifact};
use super::{LocationProbabilities, RoutingModel, RoutingRecommendation};
use crate::features::{FeatureVector, IDX_MAX_LATENCY, IDX_SAFETY_LEVEL};
use crate::EngineError;
use async_trait::async_trait;
use std::path::Path;

/// Fixed hybrid preference mass before normalization. Hybrid has no direct
/// feature signal, so it competes with a constant baseline.
const HYBRID_PREFERENCE: f64 = 0.3;

/// Rule-based routing model. Always available, O(1), never fails.
///
/// Edge preference rises with the safety factor, latency tightness, and the
/// declared safety level; cloud preference with complexity and resource
/// demand. The three raw preferences are normalized into a probability
/// triple and the argmax becomes the recommendation.
#[derive(Debug, Clone, Default)]
pub struct RuleRoutingModel;

impl RuleRoutingModel {
    /// Create the rule-based routing model.
    pub fn new() -> Self {
        Self
    }

    fn recommend(features: &FeatureVector) -> RoutingRecommendation {
        let edge_pref = (features.get(1)
            + (1.0 - features.get(IDX_MAX_LATENCY))
            + features.get(IDX_SAFETY_LEVEL))
            / 3.0;
        let cloud_pref = (features.get(8) + features.get(9) + features.get(10)) / 3.0;

        let total = edge_pref + cloud_pref + HYBRID_PREFERENCE;
        let probabilities = LocationProbabilities {
            edge: edge_pref / total,
            cloud: cloud_pref / total,
            hybrid: HYBRID_PREFERENCE / total,
        };

        RoutingRecommendation {
            location: probabilities.argmax(),
            confidence: probabilities.max(),
            probabilities,
        }
    }
}

#[async_trait]
impl RoutingModel for RuleRoutingModel {
    async fn evaluate(
        &self,
        features: &FeatureVector,
    ) -> Result<RoutingRecommendation, EngineError> {
        Ok(Self::recommend(features))
    }
}

/// Trained routing model: three linear heads (edge, cloud, hybrid logits)
/// softmaxed into a probability triple.
#[derive(Debug, Clone)]
pub struct TrainedRoutingModel {
    artifact: ModelArtifact,
}

impl TrainedRoutingModel {
    /// Load the model from a JSON artifact file.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] on a missing/malformed artifact or
    /// one with fewer than three scoring heads.
    pub fn from_artifact(path: &Path) -> Result<Self, EngineError> {
        let artifact = ModelArtifact::load(path)?;
        artifact.require_heads(3)?;
        Ok(Self { artifact })
    }

    /// Build from an already-validated artifact.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the artifact is malformed or has
    /// fewer than three heads.
    pub fn from_parts(artifact: ModelArtifact) -> Result<Self, EngineError> {
        artifact.validate()?;
        artifact.require_heads(3)?;
        Ok(Self { artifact })
    }
}

#[async_trait]
impl RoutingModel for TrainedRoutingModel {
    async fn evaluate(
        &self,
        features: &FeatureVector,
    ) -> Result<RoutingRecommendation, EngineError> {
        let z = self.artifact.standardize(features)?;
        let (edge, cloud, hybrid) = softmax3(
            self.artifact.score(0, &z),
            self.artifact.score(1, &z),
            self.artifact.score(2, &z),
        );
        let probabilities = LocationProbabilities {
            edge,
            cloud,
            hybrid,
        };
        Ok(RoutingRecommendation {
            location: probabilities.argmax(),
            confidence: probabilities.max(),
            probabilities,
        })
    }
}
