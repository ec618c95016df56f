//! Engine configuration types.
//!
//! Provides [`EngineConfig`] for selecting signal-model backends and tuning
//! the decision cache and latency budget. All fields have sensible defaults
//! and are (de)serialisable via serde for TOML/JSON config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ── Default value functions ────────────────────────────────────────────

/// Default maximum number of cached decisions.
fn default_cache_capacity() -> usize {
    10_000
}

/// Default per-decision latency budget in milliseconds.
fn default_latency_budget_ms() -> f64 {
    10.0
}

// ── ModelBackend ───────────────────────────────────────────────────────

/// Which implementation backs a signal model.
///
/// Selection happens once, at engine construction — callers of the model
/// traits never learn which variant answered. A `Trained` backend that
/// fails per call is substituted by the rule-based variant for that call
/// only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelBackend {
    /// Deterministic branch logic over feature indices. Always available.
    #[default]
    RuleBased,
    /// Pre-trained scoring function loaded from a JSON artifact.
    Trained {
        /// Path to the artifact file (scaler statistics + linear heads).
        artifact: PathBuf,
    },
}

// ── EngineConfig ───────────────────────────────────────────────────────

/// Configuration for a [`crate::RoutingEngine`].
///
/// Controls backend selection per signal model, the decision-cache bound,
/// and the latency budget the metrics tracker counts compliance against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EngineConfig {
    /// Backend for the safety model.
    #[serde(default)]
    pub safety_backend: ModelBackend,

    /// Backend for the performance model.
    #[serde(default)]
    pub performance_backend: ModelBackend,

    /// Backend for the routing model.
    #[serde(default)]
    pub routing_backend: ModelBackend,

    /// Maximum number of cached decisions before eviction.
    ///
    /// Default: `10_000`. Zero disables caching.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Per-decision latency budget in milliseconds. Decisions faster than
    /// this count toward the sub-budget compliance rate.
    ///
    /// Range: `> 0.0`. Default: `10.0`.
    #[serde(default = "default_latency_budget_ms")]
    pub latency_budget_ms: f64,
}

impl EngineConfig {
    /// All-defaults configuration: rule-based models everywhere, 10 000
    /// cache entries, 10 ms budget.
    pub fn rule_based() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            latency_budget_ms: default_latency_budget_ms(),
            ..Self::default()
        }
    }
}

/// Validate an [`EngineConfig`], returning a list of human-readable errors.
///
/// # Returns
///
/// An empty `Vec` on success, or one error string per violated constraint.
pub fn validate(config: &EngineConfig) -> Vec<String> {
    let mut errors = Vec::new();

    if !config.latency_budget_ms.is_finite() || config.latency_budget_ms <= 0.0 {
        errors.push(format!(
            "latency_budget_ms must be a positive finite number, got {}",
            config.latency_budget_ms
        ));
    }

    for (name, backend) in [
        ("safety_backend", &config.safety_backend),
        ("performance_backend", &config.performance_backend),
        ("routing_backend", &config.routing_backend),
    ] {
        if let ModelBackend::Trained { artifact } = backend {
            if artifact.as_os_str().is_empty() {
                errors.push(format!("{name}: trained backend requires an artifact path"));
            }
        }
    }

    errors
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // -- defaults --------------------------------------------------------

    #[test]
    fn test_default_cache_capacity_is_10k() {
        assert_eq!(default_cache_capacity(), 10_000);
    }

    #[test]
    fn test_default_latency_budget_is_10ms() {
        assert!((default_latency_budget_ms() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rule_based_config_uses_rule_backends() {
        let cfg = EngineConfig::rule_based();
        assert_eq!(cfg.safety_backend, ModelBackend::RuleBased);
        assert_eq!(cfg.performance_backend, ModelBackend::RuleBased);
        assert_eq!(cfg.routing_backend, ModelBackend::RuleBased);
        assert_eq!(cfg.cache_capacity, 10_000);
        assert!((cfg.latency_budget_ms - 10.0).abs() < f64::EPSILON);
    }

    // -- serde -----------------------------------------------------------

    #[test]
    fn test_config_toml_round_trip() {
        let cfg = EngineConfig::rule_based();
        let toml_str = toml::to_string_pretty(&cfg)
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: serialize: {e}")));
        let parsed: EngineConfig = toml::from_str(&toml_str)
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: deserialize: {e}")));
        assert_eq!(cfg, parsed);
    }

    #[test]
    fn test_config_json_round_trip_with_trained_backend() {
        let cfg = EngineConfig {
            safety_backend: ModelBackend::Trained {
                artifact: PathBuf::from("/models/safety.json"),
            },
            ..EngineConfig::rule_based()
        };
        let json = serde_json::to_string(&cfg)
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: serialize: {e}")));
        let parsed: EngineConfig = serde_json::from_str(&json)
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: deserialize: {e}")));
        assert_eq!(cfg, parsed);
    }

    #[test]
    fn test_config_deserializes_empty_table_with_defaults() {
        let cfg: EngineConfig = toml::from_str("")
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: deserialize: {e}")));
        assert_eq!(cfg.safety_backend, ModelBackend::RuleBased);
        assert_eq!(cfg.cache_capacity, 10_000);
        assert!((cfg.latency_budget_ms - 10.0).abs() < f64::EPSILON);
    }

    // -- validation ------------------------------------------------------

    #[test]
    fn test_validate_default_config_passes() {
        let errors = validate(&EngineConfig::rule_based());
        assert!(errors.is_empty(), "expected no errors, got: {errors:?}");
    }

    #[test]
    fn test_validate_zero_budget_fails() {
        let mut cfg = EngineConfig::rule_based();
        cfg.latency_budget_ms = 0.0;
        let errors = validate(&cfg);
        assert!(errors.iter().any(|e| e.contains("latency_budget_ms")));
    }

    #[test]
    fn test_validate_nan_budget_fails() {
        let mut cfg = EngineConfig::rule_based();
        cfg.latency_budget_ms = f64::NAN;
        let errors = validate(&cfg);
        assert!(errors.iter().any(|e| e.contains("latency_budget_ms")));
    }

    #[test]
    fn test_validate_empty_artifact_path_fails() {
        let cfg = EngineConfig {
            routing_backend: ModelBackend::Trained {
                artifact: PathBuf::new(),
            },
            ..EngineConfig::rule_based()
        };
        let errors = validate(&cfg);
        assert!(errors.iter().any(|e| e.contains("routing_backend")));
    }

    #[test]
    fn test_validate_collects_multiple_errors() {
        let cfg = EngineConfig {
            safety_backend: ModelBackend::Trained {
                artifact: PathBuf::new(),
            },
            performance_backend: ModelBackend::Trained {
                artifact: PathBuf::new(),
            },
            routing_backend: ModelBackend::RuleBased,
            cache_capacity: 0,
            latency_budget_ms: -1.0,
        };
        let errors = validate(&cfg);
        assert!(
            errors.len() >= 3,
            "expected >=3 errors, got {}: {errors:?}",
            errors.len()
        );
    }
}
