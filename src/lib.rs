//! # edgeroute
//!
//! An in-process edge-cloud execution routing engine for robot commands.
//!
//! Given an [`ExecutionRequest`], upstream [`DecisionContext`] analysis, and
//! caller-supplied [`DecisionFactors`], the engine decides within a
//! single-digit-millisecond budget whether the command should run at the
//! edge, in the cloud, or via a hybrid split — and attaches human-readable
//! reasoning plus a failure-fallback plan to every decision.
//!
//! ## Architecture
//!
//! ```text
//! ExecutionRequest ─┐
//! DecisionContext  ─┼→ FeatureExtractor → [safety │ performance │ routing]
//! DecisionFactors  ─┘        (pure)         (concurrent fan-out of 3)
//!                                                  │
//!                              combine() ←─────────┘
//!                                  │
//!                 cache put → tracker record → ExecutionDecision
//! ```
//!
//! The three signal models run concurrently per request. Each has a
//! rule-based implementation that never fails; when a trained-model variant
//! errors, the engine transparently substitutes the rule-based answer for
//! that call. If the pipeline itself fails, a conservative safe-fallback
//! decision is returned — [`RoutingEngine::decide`] never errors.

// ── Lint policy (aerospace-grade) ─────────────────────────────────────────
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub mod cache;
pub mod combiner;
pub mod config;
pub mod engine;
pub mod features;
pub mod gateway;
pub mod metrics;
pub mod models;
pub mod tracker;

// Re-exports for convenience
pub use combiner::{combine, ExecutionDecision, LocationScores};
pub use config::{EngineConfig, ModelBackend};
pub use engine::RoutingEngine;
pub use features::{extract_features, FeatureVector};
pub use models::{
    PerformanceAdvantage, PerformanceModel, PerformancePrediction, RoutingModel,
    RoutingRecommendation, SafetyAssessment, SafetyModel,
};
pub use tracker::{DecisionTracker, EngineMetrics};

/// Initialise the global tracing subscriber.
///
/// Reads the `LOG_FORMAT` environment variable to choose output format:
/// - `"json"` — structured JSON output for production log aggregators
/// - anything else (including unset) — human-readable pretty output
///
/// Filter level is controlled by `RUST_LOG` (e.g. `RUST_LOG=info`).
///
/// # Errors
///
/// Returns [`EngineError::Other`] if the global subscriber has already been
/// set (e.g. by a previous call or a test harness).
pub fn init_tracing() -> Result<(), EngineError> {
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let result = match format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_current_span(true)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init(),
    };

    result.map_err(|e| EngineError::Other(format!("tracing init failed: {e}")))
}

/// Top-level engine errors.
///
/// Every error surface in the decision pipeline maps to a variant here.
/// None of these ever reach a [`RoutingEngine::decide`] caller — they are
/// absorbed by rule-based substitution or the safe-fallback path — but they
/// do surface from constructors and from collaborator interfaces.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A signal model evaluation failed (bad artifact output, non-finite
    /// input). Recoverable: the engine substitutes the rule-based variant.
    #[error("model evaluation failed: {0}")]
    Model(String),

    /// A configuration value or model artifact is missing or invalid.
    ///
    /// Returned at construction time so that misconfiguration surfaces
    /// immediately rather than at the first decision.
    #[error("configuration error: {0}")]
    Config(String),

    /// A spawned evaluation task was cancelled or panicked.
    #[error("evaluation task failed to join: {0}")]
    TaskJoin(String),

    /// Catch-all for errors that do not fit a specific variant.
    #[error("{0}")]
    Other(String),
}

/// Required safety level of a robot command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyLevel {
    /// No meaningful harm potential.
    Low,
    /// Limited harm potential; standard handling.
    Medium,
    /// Significant harm potential; prefers local control.
    High,
    /// Safety-critical; must stay under tight local control.
    Critical,
}

impl SafetyLevel {
    /// Discretized feature encoding: `Low → 0.0`, `Medium → 0.5`,
    /// `High`/`Critical → 1.0`. Part of the feature-vector contract.
    pub fn indicator(self) -> f64 {
        match self {
            Self::Low => 0.0,
            Self::Medium => 0.5,
            Self::High | Self::Critical => 1.0,
        }
    }
}

/// Where a command executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionLocation {
    /// Run on the edge node physically closest to the robot.
    Edge,
    /// Run in the cloud, trading latency for capacity.
    Cloud,
    /// Split execution between edge and cloud.
    Hybrid,
}

impl ExecutionLocation {
    /// Stable label used for metrics and logging.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Edge => "edge",
            Self::Cloud => "cloud",
            Self::Hybrid => "hybrid",
        }
    }
}

/// A request to execute one robot command.
///
/// Immutable for the duration of one decision; the engine never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Identifier of the robot that will execute the command.
    pub robot_id: String,
    /// Abstract command name (vendor translation happens downstream).
    pub command: String,
    /// Command parameters, opaque to the engine beyond their count.
    pub parameters: HashMap<String, serde_json::Value>,
    /// Maximum tolerable end-to-end latency in milliseconds.
    pub max_latency_ms: f64,
    /// Required safety level.
    pub safety_level: SafetyLevel,
    /// Caller priority hint (higher = more urgent). Not used by the
    /// decision algorithm itself; carried for downstream dispatchers.
    pub priority: u8,
}

/// Upstream contextual analysis of a command, treated as opaque key-value
/// data. Only the specific numeric/qualitative fields exposed by the
/// accessors below are read; everything else passes through untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionContext(pub serde_json::Value);

impl DecisionContext {
    /// Wrap an arbitrary JSON value as context.
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    fn lookup(&self, section: &str, field: &str) -> Option<&serde_json::Value> {
        self.0.get(section)?.get(field)
    }

    fn numeric(&self, section: &str, field: &str) -> Option<f64> {
        self.lookup(section, field)?
            .as_f64()
            .filter(|v| v.is_finite())
    }

    /// Qualitative complexity level (e.g. `"low"`, `"critical"`), if present.
    pub fn complexity_level(&self) -> Option<&str> {
        self.lookup("complexity", "level")?.as_str()
    }

    /// Numeric complexity score in `[0,1]`, if present and finite.
    pub fn complexity_score(&self) -> Option<f64> {
        self.numeric("complexity", "score")
    }

    /// Estimated CPU requirement score in `[0,1]`, if present and finite.
    pub fn cpu_score(&self) -> Option<f64> {
        self.numeric("resources", "cpu_score")
    }

    /// Estimated memory requirement score in `[0,1]`, if present and finite.
    pub fn memory_score(&self) -> Option<f64> {
        self.numeric("resources", "memory_score")
    }

    /// Upstream safety risk score in `[0,1]`, if present and finite.
    pub fn safety_risk_score(&self) -> Option<f64> {
        self.numeric("safety", "risk_score")
    }
}

/// Caller-supplied normalized weighting hints in `[0,1]`.
///
/// Distinct from the engine's own computed assessments: these express what
/// the caller already knows about the request's latency sensitivity, safety
/// stakes, complexity, resource appetite, and edge availability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionFactors {
    /// Latency sensitivity.
    pub latency: f64,
    /// Safety stakes.
    pub safety: f64,
    /// Command complexity.
    pub complexity: f64,
    /// Resource appetite.
    pub resource: f64,
    /// Edge availability.
    pub availability: f64,
}

impl Default for DecisionFactors {
    fn default() -> Self {
        Self {
            latency: 0.5,
            safety: 0.5,
            complexity: 0.5,
            resource: 0.5,
            availability: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safety_level_indicator_encoding() {
        assert!(SafetyLevel::Low.indicator().abs() < f64::EPSILON);
        assert!((SafetyLevel::Medium.indicator() - 0.5).abs() < f64::EPSILON);
        assert!((SafetyLevel::High.indicator() - 1.0).abs() < f64::EPSILON);
        assert!((SafetyLevel::Critical.indicator() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_execution_location_labels() {
        assert_eq!(ExecutionLocation::Edge.as_str(), "edge");
        assert_eq!(ExecutionLocation::Cloud.as_str(), "cloud");
        assert_eq!(ExecutionLocation::Hybrid.as_str(), "hybrid");
    }

    #[test]
    fn test_decision_context_reads_nested_fields() {
        let ctx = DecisionContext::new(serde_json::json!({
            "complexity": { "level": "critical", "score": 0.9 },
            "resources": { "cpu_score": 0.4, "memory_score": 0.3 },
            "safety": { "risk_score": 0.8 },
        }));
        assert_eq!(ctx.complexity_level(), Some("critical"));
        assert_eq!(ctx.complexity_score(), Some(0.9));
        assert_eq!(ctx.cpu_score(), Some(0.4));
        assert_eq!(ctx.memory_score(), Some(0.3));
        assert_eq!(ctx.safety_risk_score(), Some(0.8));
    }

    #[test]
    fn test_decision_context_missing_fields_read_as_none() {
        let ctx = DecisionContext::default();
        assert_eq!(ctx.complexity_level(), None);
        assert_eq!(ctx.complexity_score(), None);
        assert_eq!(ctx.cpu_score(), None);
        assert_eq!(ctx.memory_score(), None);
        assert_eq!(ctx.safety_risk_score(), None);
    }

    #[test]
    fn test_decision_context_wrong_typed_field_reads_as_none() {
        let ctx = DecisionContext::new(serde_json::json!({
            "complexity": { "score": "not a number" },
        }));
        assert_eq!(ctx.complexity_score(), None);
    }

    #[test]
    fn test_decision_factors_default_is_neutral() {
        let f = DecisionFactors::default();
        assert!((f.latency - 0.5).abs() < f64::EPSILON);
        assert!((f.safety - 0.5).abs() < f64::EPSILON);
        assert!((f.complexity - 0.5).abs() < f64::EPSILON);
        assert!((f.resource - 0.5).abs() < f64::EPSILON);
        assert!((f.availability - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_engine_error_display_includes_message() {
        let err = EngineError::Config("scaler length mismatch".to_string());
        assert!(err.to_string().contains("scaler length mismatch"));
    }

    #[test]
    fn test_execution_request_serde_round_trip() {
        let req = ExecutionRequest {
            robot_id: "arm-7".to_string(),
            command: "pick_place".to_string(),
            parameters: HashMap::new(),
            max_latency_ms: 50.0,
            safety_level: SafetyLevel::High,
            priority: 3,
        };
        let json = serde_json::to_string(&req)
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: serialize: {e}")));
        assert!(json.contains("\"high\""));
        let parsed: ExecutionRequest = serde_json::from_str(&json)
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: deserialize: {e}")));
        assert_eq!(parsed.safety_level, SafetyLevel::High);
        assert_eq!(parsed.robot_id, "arm-7");
    }

    #[test]
    fn test_init_tracing_second_call_returns_err() {
        let _ = init_tracing();
        let result = init_tracing();
        assert!(result.is_err(), "double init must return Err, not panic");
    }
}
