//! Feature extraction.
//!
//! Turns an [`ExecutionRequest`], its [`DecisionContext`], and the caller's
//! [`DecisionFactors`] into the fixed-length [`FeatureVector`] that all
//! three signal models consume. The extractor is a pure function on the hot
//! path: no I/O, no allocation beyond the output array, and no failure mode
//! — a missing or non-finite source field defaults to a neutral `0.5`.
//!
//! ## Positional contract
//!
//! | Index | Feature                                            |
//! |-------|----------------------------------------------------|
//! | 0     | latency factor                                     |
//! | 1     | safety factor                                      |
//! | 2     | complexity factor                                  |
//! | 3     | resource factor                                    |
//! | 4     | availability factor                               |
//! | 5     | normalized max latency (`max_latency_ms / 1000`)   |
//! | 6     | normalized parameter count (`count / 10`)          |
//! | 7     | safety-level indicator in {0.0, 0.5, 1.0}          |
//! | 8     | complexity score (context)                         |
//! | 9     | cpu resource score (context)                       |
//! | 10    | memory resource score (context)                    |
//! | 11    | safety risk score (context)                        |
//!
//! The order is part of the model contract — rule-based models index into
//! it positionally. Changing it is a breaking change for every model.

use crate::{DecisionContext, DecisionFactors, ExecutionRequest};

/// Number of features in the vector. Part of the model contract.
pub const FEATURE_COUNT: usize = 12;

/// Index of the normalized max-latency feature.
pub const IDX_MAX_LATENCY: usize = 5;
/// Index of the safety-level indicator feature.
pub const IDX_SAFETY_LEVEL: usize = 7;
/// Index of the complexity-score feature.
pub const IDX_COMPLEXITY: usize = 8;

/// Fixed-length, fixed-order numeric encoding of one request.
///
/// Invariant: every slot is finite and within `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector(pub [f64; FEATURE_COUNT]);

impl FeatureVector {
    /// Read a feature by position.
    pub fn get(&self, idx: usize) -> f64 {
        self.0[idx]
    }

    /// Borrow the raw slice, e.g. for scaler application.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Round every slot to two decimal places.
    ///
    /// Deliberately lossy: quantization lets the decision cache treat
    /// "similar" requests as identical, raising the hit rate.
    pub fn quantized(&self) -> [i64; FEATURE_COUNT] {
        let mut out = [0_i64; FEATURE_COUNT];
        for (slot, value) in out.iter_mut().zip(self.0.iter()) {
            *slot = (value * 100.0).round() as i64;
        }
        out
    }
}

/// Clip a raw source value into the `[0,1]` invariant, replacing anything
/// non-finite with the neutral default.
fn sanitize(raw: f64) -> f64 {
    if raw.is_finite() {
        raw.clamp(0.0, 1.0)
    } else {
        0.5
    }
}

/// Extract the feature vector for one request.
///
/// Pure and infallible: missing context fields default to `0.5`, non-finite
/// inputs are replaced, and every output slot is clipped to `[0,1]`.
///
/// # Example
///
/// ```rust
/// use edgeroute::{extract_features, DecisionContext, DecisionFactors, ExecutionRequest, SafetyLevel};
/// use std::collections::HashMap;
///
/// let request = ExecutionRequest {
///     robot_id: "arm-1".into(),
///     command: "move_to".into(),
///     parameters: HashMap::new(),
///     max_latency_ms: 100.0,
///     safety_level: SafetyLevel::Medium,
///     priority: 1,
/// };
/// let features = extract_features(&request, &DecisionContext::default(), &DecisionFactors::default());
/// assert!(features.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
/// ```
pub fn extract_features(
    request: &ExecutionRequest,
    context: &DecisionContext,
    factors: &DecisionFactors,
) -> FeatureVector {
    let norm_latency = sanitize(request.max_latency_ms / 1000.0);
    let norm_params = sanitize(request.parameters.len() as f64 / 10.0);

    FeatureVector([
        sanitize(factors.latency),
        sanitize(factors.safety),
        sanitize(factors.complexity),
        sanitize(factors.resource),
        sanitize(factors.availability),
        norm_latency,
        norm_params,
        request.safety_level.indicator(),
        sanitize(context.complexity_score().unwrap_or(0.5)),
        sanitize(context.cpu_score().unwrap_or(0.5)),
        sanitize(context.memory_score().unwrap_or(0.5)),
        sanitize(context.safety_risk_score().unwrap_or(0.5)),
    ])
}
