//! Signal model abstraction and implementations.
//!
//! Three independent, polymorphic models consume the same [`FeatureVector`]
//! and produce structured assessments:
//!
//! - [`SafetyModel`] → [`SafetyAssessment`]
//! - [`PerformanceModel`] → [`PerformancePrediction`]
//! - [`RoutingModel`] → [`RoutingRecommendation`]
//!
//! Each trait has two implementations sharing one contract: a rule-based
//! variant (deterministic branch logic over feature indices, O(1), never
//! fails) and a trained variant (pre-fitted scaler + linear scoring heads
//! loaded from a JSON artifact, may fail). Which variant backs a trait
//! object is decided once at engine construction; callers never know which
//! answered. The engine invokes all three concurrently per request — a
//! failure in one never blocks the other two.

use crate::features::FeatureVector;
use crate::{EngineError, ExecutionLocation};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod artifact;
pub mod performance;
pub mod routing;
pub mod safety;

pub use artifact::{LinearHead, ModelArtifact};
pub use performance::{RulePerformanceModel, TrainedPerformanceModel};
pub use routing::{RuleRoutingModel, TrainedRoutingModel};
pub use safety::{RuleSafetyModel, TrainedSafetyModel};

// ── Assessment types ───────────────────────────────────────────────────

/// Output of a safety model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyAssessment {
    /// Overall safety stake of the command, `[0,1]`.
    pub score: f64,
    /// Whether safety considerations force edge execution.
    pub requires_edge: bool,
    /// Model confidence in this assessment, `[0,1]`.
    pub confidence: f64,
}

/// Which side a performance model predicts will serve the command better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceAdvantage {
    /// Edge execution wins on latency/throughput.
    Edge,
    /// Cloud execution wins on capacity/accuracy.
    Cloud,
}

/// Output of a performance model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformancePrediction {
    /// Predicted end-to-end latency at the edge, milliseconds, `> 0`.
    pub edge_latency_ms: f64,
    /// Predicted end-to-end latency in the cloud, milliseconds, `> 0`.
    pub cloud_latency_ms: f64,
    /// Predicted result accuracy at the edge, `[0,1]`.
    pub edge_accuracy: f64,
    /// Predicted result accuracy in the cloud, `[0,1]`.
    pub cloud_accuracy: f64,
    /// Qualitative call on which side wins.
    pub advantage: PerformanceAdvantage,
}

/// Probability mass assigned to each execution location. Sums to ≈1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationProbabilities {
    /// Probability mass on edge execution.
    pub edge: f64,
    /// Probability mass on cloud execution.
    pub cloud: f64,
    /// Probability mass on hybrid execution.
    pub hybrid: f64,
}

impl LocationProbabilities {
    /// Location with the largest probability mass.
    ///
    /// Ties resolve in fixed order edge → cloud → hybrid.
    pub fn argmax(&self) -> ExecutionLocation {
        if self.edge >= self.cloud && self.edge >= self.hybrid {
            ExecutionLocation::Edge
        } else if self.cloud >= self.hybrid {
            ExecutionLocation::Cloud
        } else {
            ExecutionLocation::Hybrid
        }
    }

    /// The largest probability mass.
    pub fn max(&self) -> f64 {
        self.edge.max(self.cloud).max(self.hybrid)
    }
}

/// Output of a routing model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoutingRecommendation {
    /// Recommended execution location.
    pub location: ExecutionLocation,
    /// Model confidence in the recommendation, `[0,1]`.
    pub confidence: f64,
    /// Full probability triple over locations.
    pub probabilities: LocationProbabilities,
}

// ── Model traits ───────────────────────────────────────────────────────

/// Assesses the safety stakes of a command.
///
/// Implementations must be thread-safe (`Send + Sync`); the trait is
/// object-safe so the engine can hold `Arc<dyn SafetyModel>` selected at
/// construction time.
#[async_trait]
pub trait SafetyModel: Send + Sync {
    /// Evaluate the feature vector into a safety assessment.
    ///
    /// # Errors
    ///
    /// Trained variants may fail on malformed input; the engine substitutes
    /// the rule-based variant's output for that call. Rule-based variants
    /// never fail.
    async fn evaluate(&self, features: &FeatureVector) -> Result<SafetyAssessment, EngineError>;
}

/// Predicts comparative edge/cloud execution performance.
#[async_trait]
pub trait PerformanceModel: Send + Sync {
    /// Evaluate the feature vector into a performance prediction.
    ///
    /// # Errors
    ///
    /// Trained variants may fail on malformed input; rule-based never do.
    async fn evaluate(
        &self,
        features: &FeatureVector,
    ) -> Result<PerformancePrediction, EngineError>;
}

/// Recommends an execution location with a probability distribution.
#[async_trait]
pub trait RoutingModel: Send + Sync {
    /// Evaluate the feature vector into a routing recommendation.
    ///
    /// # Errors
    ///
    /// Trained variants may fail on malformed input; rule-based never do.
    async fn evaluate(
        &self,
        features: &FeatureVector,
    ) -> Result<RoutingRecommendation, EngineError>;
}
