//! Decision combining.
//!
//! Merges the three signal assessments plus the caller's decision factors
//! into per-location scores, picks the winner, and generates the reasoning
//! strings and the failure-fallback plan. Pure data transformation over
//! already-validated inputs — this stage never errors.
//!
//! ## Score model
//!
//! Fixed weights: safety 0.4, performance 0.3, routing 0.3.
//!
//! | Location | safety term          | performance term       | routing term |
//! |----------|----------------------|------------------------|--------------|
//! | edge     | 1 if requires_edge   | 1 if advantage == edge | P(edge)      |
//! | cloud    | 0.5 if !requires_edge| 1 if advantage == cloud| P(cloud)     |
//! | hybrid   | 0.3 (fixed)          | 0.7 (fixed)            | P(hybrid)    |
//!
//! Hybrid has no direct signal — no model votes for it — so it is scored
//! via fixed partial-credit constants. The winning score doubles as the
//! decision confidence and is deliberately NOT renormalized to a
//! probability; the scores are a max-score heuristic, not a distribution.

use crate::models::{
    PerformanceAdvantage, PerformancePrediction, RoutingRecommendation, SafetyAssessment,
};
use crate::{DecisionFactors, ExecutionLocation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Signal weights. Fixed by design; safety outranks the other two.
const SAFETY_WEIGHT: f64 = 0.4;
/// Weight of the performance prediction.
const PERFORMANCE_WEIGHT: f64 = 0.3;
/// Weight of the routing recommendation.
const ROUTING_WEIGHT: f64 = 0.3;

/// Hybrid partial credit against the safety signal.
const HYBRID_SAFETY_CREDIT: f64 = 0.3;
/// Hybrid partial credit against the performance signal.
const HYBRID_PERFORMANCE_CREDIT: f64 = 0.7;

/// Edge-latency threshold (ms) below which reasoning calls out edge speed.
const FAST_EDGE_LATENCY_MS: f64 = 10.0;

/// Per-location combined scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationScores {
    /// Combined score for edge execution.
    pub edge: f64,
    /// Combined score for cloud execution.
    pub cloud: f64,
    /// Combined score for hybrid execution.
    pub hybrid: f64,
}

impl LocationScores {
    /// Winner and its score. Ties resolve edge → cloud → hybrid.
    pub fn winner(&self) -> (ExecutionLocation, f64) {
        if self.edge >= self.cloud && self.edge >= self.hybrid {
            (ExecutionLocation::Edge, self.edge)
        } else if self.cloud >= self.hybrid {
            (ExecutionLocation::Cloud, self.cloud)
        } else {
            (ExecutionLocation::Hybrid, self.hybrid)
        }
    }
}

/// The engine's answer for one request. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionDecision {
    /// Chosen execution location.
    pub location: ExecutionLocation,
    /// Winning score, used directly as confidence (not renormalized).
    pub confidence: f64,
    /// Per-location combined scores for auditability.
    pub scores: LocationScores,
    /// Ordered human-readable justification.
    pub reasoning: Vec<String>,
    /// Failure mode → recommended mitigation.
    pub fallback_plan: HashMap<String, String>,
    /// Raw safety assessment this decision was combined from.
    pub safety: SafetyAssessment,
    /// Raw performance prediction this decision was combined from.
    pub performance: PerformancePrediction,
    /// Raw routing recommendation this decision was combined from.
    pub routing: RoutingRecommendation,
    /// Measured wall time of the decision, milliseconds.
    pub execution_time_ms: f64,
    /// True when the safe-fallback path produced this decision instead of
    /// the full signal pipeline.
    pub fallback_used: bool,
}

/// Build the fixed failure-mode → mitigation mapping for a winner.
///
/// The primary-failure mitigation is the *other* of {edge, cloud} relative
/// to the winner; a hybrid winner falls back to edge since its
/// latency-sensitive portion is the part that must keep running.
pub fn fallback_plan(winner: ExecutionLocation) -> HashMap<String, String> {
    let primary = match winner {
        ExecutionLocation::Edge => "execute in cloud",
        ExecutionLocation::Cloud | ExecutionLocation::Hybrid => "execute at edge",
    };
    HashMap::from([
        ("primary_failure".to_string(), primary.to_string()),
        (
            "communication_failure".to_string(),
            "local cache and retry".to_string(),
        ),
        (
            "resource_exhaustion".to_string(),
            "scale up or queue".to_string(),
        ),
        (
            "quality_degradation".to_string(),
            "human intervention".to_string(),
        ),
    ])
}

/// Combine the three assessments and the raw factors into a decision.
///
/// Pure and infallible. `execution_time_ms` is left at zero and
/// `fallback_used` at false; the engine facade fills in the measured time.
pub fn combine(
    safety: SafetyAssessment,
    performance: PerformancePrediction,
    routing: RoutingRecommendation,
    factors: &DecisionFactors,
) -> ExecutionDecision {
    let p = routing.probabilities;

    let edge = SAFETY_WEIGHT * if safety.requires_edge { 1.0 } else { 0.0 }
        + PERFORMANCE_WEIGHT
            * if performance.advantage == PerformanceAdvantage::Edge {
                1.0
            } else {
                0.0
            }
        + ROUTING_WEIGHT * p.edge;

    let cloud = SAFETY_WEIGHT * if safety.requires_edge { 0.0 } else { 0.5 }
        + PERFORMANCE_WEIGHT
            * if performance.advantage == PerformanceAdvantage::Cloud {
                1.0
            } else {
                0.0
            }
        + ROUTING_WEIGHT * p.cloud;

    let hybrid = SAFETY_WEIGHT * HYBRID_SAFETY_CREDIT
        + PERFORMANCE_WEIGHT * HYBRID_PERFORMANCE_CREDIT
        + ROUTING_WEIGHT * p.hybrid;

    let scores = LocationScores {
        edge,
        cloud,
        hybrid,
    };
    let (location, confidence) = scores.winner();

    let mut reasoning = Vec::new();
    if safety.requires_edge {
        reasoning.push(format!(
            "safety assessment requires edge execution (score {:.2}, factor {:.2})",
            safety.score, factors.safety
        ));
    }
    if performance.edge_latency_ms < FAST_EDGE_LATENCY_MS {
        reasoning.push(format!(
            "predicted edge latency {:.1}ms is under {FAST_EDGE_LATENCY_MS:.0}ms",
            performance.edge_latency_ms
        ));
    }
    if performance.advantage == PerformanceAdvantage::Cloud {
        reasoning.push(format!(
            "performance favors cloud ({:.1}ms vs {:.1}ms edge, accuracy {:.2})",
            performance.cloud_latency_ms, performance.edge_latency_ms, performance.cloud_accuracy
        ));
    }
    if location == ExecutionLocation::Hybrid {
        reasoning.push("hybrid split balances safety and throughput".to_string());
    }

    ExecutionDecision {
        location,
        confidence,
        scores,
        reasoning,
        fallback_plan: fallback_plan(location),
        safety,
        performance,
        routing,
        execution_time_ms: 0.0,
        fallback_used: false,
    }
}

// ── Tests ──────────────────────────────────────────────────────────────
