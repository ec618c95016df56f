//! Pre-trained model artifacts.
//!
//! A [`ModelArtifact`] bundles the pre-fitted feature scaler (per-feature
//! mean and standard deviation) with one or more linear scoring heads. The
//! trained model variants load an artifact once at construction and apply
//! it per call: standardize the feature vector, compute each head's linear
//! score, then map scores onto the assessment struct.
//!
//! Artifacts are plain JSON, produced by an offline training pipeline that
//! is out of scope here. Loading validates every dimension up front so that
//! a malformed artifact fails at engine construction, not mid-decision.

use crate::features::{FeatureVector, FEATURE_COUNT};
use crate::EngineError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One linear scoring head: `score = weights · x + bias`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearHead {
    /// Per-feature weights; must have [`FEATURE_COUNT`] entries.
    pub weights: Vec<f64>,
    /// Additive bias.
    pub bias: f64,
}

/// A pre-fitted scaler plus linear scoring heads, loaded from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Per-feature mean used for standardization.
    pub scaler_mean: Vec<f64>,
    /// Per-feature standard deviation used for standardization.
    pub scaler_std: Vec<f64>,
    /// Scoring heads; how many are required depends on the model kind.
    pub heads: Vec<LinearHead>,
}

impl ModelArtifact {
    /// Load and validate an artifact from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the file is missing or unreadable,
    /// the JSON is malformed, any dimension disagrees with [`FEATURE_COUNT`],
    /// or a scaler deviation is non-positive or non-finite.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("artifact {}: {e}", path.display()))
        })?;
        let artifact: Self = serde_json::from_str(&raw).map_err(|e| {
            EngineError::Config(format!("artifact {}: malformed JSON: {e}", path.display()))
        })?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Check every dimension and scaler value.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] on the first violated constraint.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.scaler_mean.len() != FEATURE_COUNT {
            return Err(EngineError::Config(format!(
                "scaler_mean has {} entries, expected {FEATURE_COUNT}",
                self.scaler_mean.len()
            )));
        }
        if self.scaler_std.len() != FEATURE_COUNT {
            return Err(EngineError::Config(format!(
                "scaler_std has {} entries, expected {FEATURE_COUNT}",
                self.scaler_std.len()
            )));
        }
        if let Some(bad) = self
            .scaler_std
            .iter()
            .find(|s| !s.is_finite() || **s <= 0.0)
        {
            return Err(EngineError::Config(format!(
                "scaler_std entries must be positive and finite, got {bad}"
            )));
        }
        if self.heads.is_empty() {
            return Err(EngineError::Config("artifact has no scoring heads".into()));
        }
        for (i, head) in self.heads.iter().enumerate() {
            if head.weights.len() != FEATURE_COUNT {
                return Err(EngineError::Config(format!(
                    "head {i} has {} weights, expected {FEATURE_COUNT}",
                    head.weights.len()
                )));
            }
        }
        Ok(())
    }

    /// Require at least `n` scoring heads (model kinds need different counts).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] when fewer heads are present.
    pub fn require_heads(&self, n: usize) -> Result<(), EngineError> {
        if self.heads.len() < n {
            return Err(EngineError::Config(format!(
                "artifact has {} heads, model requires {n}",
                self.heads.len()
            )));
        }
        Ok(())
    }

    /// Standardize a feature vector through the pre-fitted scaler.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Model`] if any standardized value is
    /// non-finite — the per-call failure mode the engine recovers from by
    /// rule-based substitution.
    pub fn standardize(&self, features: &FeatureVector) -> Result<[f64; FEATURE_COUNT], EngineError> {
        let mut out = [0.0_f64; FEATURE_COUNT];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = (features.get(i) - self.scaler_mean[i]) / self.scaler_std[i];
            if !slot.is_finite() {
                return Err(EngineError::Model(format!(
                    "standardized feature {i} is non-finite"
                )));
            }
        }
        Ok(out)
    }

    /// Linear score of head `idx` over a standardized vector.
    pub fn score(&self, idx: usize, standardized: &[f64; FEATURE_COUNT]) -> f64 {
        let head = &self.heads[idx];
        head.weights
            .iter()
            .zip(standardized.iter())
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + head.bias
    }
}

/// Logistic squash onto `(0,1)`.
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Softmax over three scores, numerically stabilized.
pub fn softmax3(a: f64, b: f64, c: f64) -> (f64, f64, f64) {
    let m = a.max(b).max(c);
    let (ea, eb, ec) = ((a - m).exp(), (b - m).exp(), (c - m).exp());
    let sum = ea + eb + ec;
    (ea / sum, eb / sum, ec / sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) fn identity_artifact(heads: usize) -> ModelArtifact {
        ModelArtifact {
            scaler_mean: vec![0.0; FEATURE_COUNT],
            scaler_std: vec![1.0; FEATURE_COUNT],
            heads: (0..heads)
                .map(|_| LinearHead {
                    weights: vec![0.0; FEATURE_COUNT],
                    bias: 0.0,
                })
                .collect(),
        }
    }

    #[test]
    fn test_validate_accepts_well_formed_artifact() {
        assert!(identity_artifact(3).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_short_scaler() {
        let mut artifact = identity_artifact(1);
        artifact.scaler_mean.pop();
        assert!(matches!(
            artifact.validate(),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_deviation() {
        let mut artifact = identity_artifact(1);
        artifact.scaler_std[3] = 0.0;
        assert!(matches!(
            artifact.validate(),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_short_head() {
        let mut artifact = identity_artifact(1);
        artifact.heads[0].weights.truncate(4);
        assert!(matches!(
            artifact.validate(),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_headless_artifact() {
        let artifact = ModelArtifact {
            heads: Vec::new(),
            ..identity_artifact(1)
        };
        assert!(artifact.validate().is_err());
    }

    #[test]
    fn test_require_heads_enforces_minimum() {
        let artifact = identity_artifact(2);
        assert!(artifact.require_heads(2).is_ok());
        assert!(artifact.require_heads(3).is_err());
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let result = ModelArtifact::load(Path::new("/nonexistent/model.json"));
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_load_malformed_json_is_config_error() {
        let mut file = tempfile::NamedTempFile::new()
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: tempfile: {e}")));
        write!(file, "{{ not json")
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: write: {e}")));
        let result = ModelArtifact::load(file.path());
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_load_round_trips_valid_artifact() {
        let artifact = identity_artifact(3);
        let mut file = tempfile::NamedTempFile::new()
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: tempfile: {e}")));
        let json = serde_json::to_string(&artifact)
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: serialize: {e}")));
        write!(file, "{json}")
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: write: {e}")));
        let loaded = ModelArtifact::load(file.path())
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: load: {e}")));
        assert_eq!(loaded, artifact);
    }

    #[test]
    fn test_standardize_applies_mean_and_std() {
        let mut artifact = identity_artifact(1);
        artifact.scaler_mean = vec![0.5; FEATURE_COUNT];
        artifact.scaler_std = vec![0.25; FEATURE_COUNT];
        let features = FeatureVector([1.0; FEATURE_COUNT]);
        let z = artifact
            .standardize(&features)
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: standardize: {e}")));
        assert!(z.iter().all(|v| (v - 2.0).abs() < f64::EPSILON));
    }

    #[test]
    fn test_score_is_dot_product_plus_bias() {
        let mut artifact = identity_artifact(1);
        artifact.heads[0].weights = (0..FEATURE_COUNT).map(|i| i as f64).collect();
        artifact.heads[0].bias = 1.0;
        let z = {
            let mut z = [0.0; FEATURE_COUNT];
            z[2] = 2.0; // weight 2.0 at index 2 → contribution 4.0
            z
        };
        assert!((artifact.score(0, &z) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_sigmoid_is_bounded_and_centered() {
        assert!((sigmoid(0.0) - 0.5).abs() < f64::EPSILON);
        assert!(sigmoid(50.0) > 0.999);
        assert!(sigmoid(-50.0) < 0.001);
    }

    #[test]
    fn test_softmax3_sums_to_one() {
        let (a, b, c) = softmax3(1.0, 2.0, 3.0);
        assert!((a + b + c - 1.0).abs() < 1e-12);
        assert!(c > b && b > a);
    }

    #[test]
    fn test_softmax3_stable_for_large_scores() {
        let (a, b, c) = softmax3(1000.0, 1000.0, 1000.0);
        assert!((a + b + c - 1.0).abs() < 1e-12);
        assert!((a - b).abs() < f64::EPSILON);
    }
}
