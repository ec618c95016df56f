//! Performance signal models.
//!
//! Predict comparative edge/cloud latency and accuracy for a command and
//! call which side wins.

use super::artifact::{sigmoid, ModelArtifact};
use super::{PerformanceAdvantage, PerformanceModel, PerformancePrediction};
use crate::features::{FeatureVector, IDX_COMPLEXITY};
use crate::EngineError;
use async_trait::async_trait;
use std::path::Path;

/// Latency predictions are clamped to this floor — a prediction of zero
/// milliseconds is physically meaningless.
const MIN_LATENCY_MS: f64 = 0.1;

/// Rule-based performance model. Always available, O(1), never fails.
///
/// Latency estimates are linear in complexity; the cloud estimate also
/// penalizes poor edge availability (retries and rerouting inflate the
/// round trip). Cloud wins when the command is compute-heavy: complexity
/// above 0.7, or mean cpu/memory demand above 0.7.
#[derive(Debug, Clone, Default)]
pub struct RulePerformanceModel;

impl RulePerformanceModel {
    /// Create the rule-based performance model.
    pub fn new() -> Self {
        Self
    }

    fn predict(features: &FeatureVector) -> PerformancePrediction {
        let complexity = features.get(IDX_COMPLEXITY);
        let edge_latency_ms = 2.0 + 8.0 * complexity;
        let cloud_latency_ms = 20.0 + 15.0 * complexity + 30.0 * (1.0 - features.get(4));

        let resource_demand = (features.get(9) + features.get(10)) / 2.0;
        let advantage = if complexity > 0.7 || resource_demand > 0.7 {
            PerformanceAdvantage::Cloud
        } else {
            PerformanceAdvantage::Edge
        };

        PerformancePrediction {
            edge_latency_ms,
            cloud_latency_ms,
            edge_accuracy: 0.9 - 0.1 * complexity,
            cloud_accuracy: 0.95,
            advantage,
        }
    }
}

#[async_trait]
impl PerformanceModel for RulePerformanceModel {
    async fn evaluate(
        &self,
        features: &FeatureVector,
    ) -> Result<PerformancePrediction, EngineError> {
        Ok(Self::predict(features))
    }
}

/// Trained performance model backed by four linear heads:
/// edge latency, cloud latency (both in ms, clamped to a positive floor),
/// edge accuracy, cloud accuracy (both through a sigmoid).
#[derive(Debug, Clone)]
pub struct TrainedPerformanceModel {
    artifact: ModelArtifact,
}

impl TrainedPerformanceModel {
    /// Load the model from a JSON artifact file.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] on a missing/malformed artifact or
    /// one with fewer than four scoring heads.
    pub fn from_artifact(path: &Path) -> Result<Self, EngineError> {
        let artifact = ModelArtifact::load(path)?;
        artifact.require_heads(4)?;
        Ok(Self { artifact })
    }

    /// Build from an already-validated artifact.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the artifact is malformed or has
    /// fewer than four heads.
    pub fn from_parts(artifact: ModelArtifact) -> Result<Self, EngineError> {
        artifact.validate()?;
        artifact.require_heads(4)?;
        Ok(Self { artifact })
    }
}

#[async_trait]
impl PerformanceModel for TrainedPerformanceModel {
    async fn evaluate(
        &self,
        features: &FeatureVector,
    ) -> Result<PerformancePrediction, EngineError> {
        let z = self.artifact.standardize(features)?;

        let edge_latency_ms = self.artifact.score(0, &z).max(MIN_LATENCY_MS);
        let cloud_latency_ms = self.artifact.score(1, &z).max(MIN_LATENCY_MS);
        if !edge_latency_ms.is_finite() || !cloud_latency_ms.is_finite() {
            return Err(EngineError::Model(
                "predicted latency is non-finite".to_string(),
            ));
        }

        let advantage = if edge_latency_ms <= cloud_latency_ms {
            PerformanceAdvantage::Edge
        } else {
            PerformanceAdvantage::Cloud
        };

        Ok(PerformancePrediction {
            edge_latency_ms,
            cloud_latency_ms,
            edge_accuracy: sigmoid(self.artifact.score(2, &z)),
            cloud_accuracy: sigmoid(self.artifact.score(3, &z)),
            advantage,
        })
    }
}
