//! Prometheus metrics for the routing engine.
//!
//! ## Usage
//!
//! Call [`init_metrics`] once at process startup **before** constructing an
//! engine. The helper functions (`inc_decision`, `observe_decision_latency`,
//! …) are no-ops if `init_metrics` was never called, so the engine is always
//! safe to run — observability simply degrades gracefully.
//!
//! ## Metrics Exposed
//!
//! | Name | Type | Labels |
//! |------|------|--------|
//! | `engine_decisions_total` | Counter | `location` |
//! | `engine_fallback_total` | Counter | — |
//! | `engine_model_substitutions_total` | Counter | `model` |
//! | `engine_cache_events_total` | Counter | `event` |
//! | `engine_decision_duration_seconds` | Histogram | — |

use crate::EngineError;
use prometheus::{
    CounterVec, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;
use std::time::Duration;

/// All Prometheus metrics for the engine, bundled together so they can be
/// stored in a single [`OnceLock`] and initialised atomically.
pub struct Metrics {
    /// Prometheus registry that owns all metric descriptors.
    pub registry: Registry,
    /// Decisions by chosen location.
    pub decisions_total: CounterVec,
    /// Safe-fallback decisions.
    pub fallback_total: prometheus::Counter,
    /// Per-call rule-based substitutions by model kind.
    pub model_substitutions: CounterVec,
    /// Cache hits and misses.
    pub cache_events: CounterVec,
    /// Decision latency histogram.
    pub decision_duration: Histogram,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Initialise all Prometheus metrics and register them with a private
/// registry.
///
/// Must be called once at process startup. Calling it a second time is a
/// no-op (returns `Ok(())`).
///
/// # Errors
///
/// Returns [`EngineError::Other`] if metric construction or registration
/// fails (e.g., duplicate descriptor names).
pub fn init_metrics() -> Result<(), EngineError> {
    if METRICS.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let decisions_total = CounterVec::new(
        Opts::new("engine_decisions_total", "Decisions by chosen location"),
        &["location"],
    )
    .map_err(|e| EngineError::Other(format!("metrics init failed: {e}")))?;
    registry
        .register(Box::new(decisions_total.clone()))
        .map_err(|e| EngineError::Other(format!("metrics registration failed: {e}")))?;

    let fallback_total = prometheus::Counter::with_opts(Opts::new(
        "engine_fallback_total",
        "Safe-fallback decisions",
    ))
    .map_err(|e| EngineError::Other(format!("metrics init failed: {e}")))?;
    registry
        .register(Box::new(fallback_total.clone()))
        .map_err(|e| EngineError::Other(format!("metrics registration failed: {e}")))?;

    let model_substitutions = CounterVec::new(
        Opts::new(
            "engine_model_substitutions_total",
            "Per-call rule-based substitutions by model kind",
        ),
        &["model"],
    )
    .map_err(|e| EngineError::Other(format!("metrics init failed: {e}")))?;
    registry
        .register(Box::new(model_substitutions.clone()))
        .map_err(|e| EngineError::Other(format!("metrics registration failed: {e}")))?;

    let cache_events = CounterVec::new(
        Opts::new("engine_cache_events_total", "Cache hits and misses"),
        &["event"],
    )
    .map_err(|e| EngineError::Other(format!("metrics init failed: {e}")))?;
    registry
        .register(Box::new(cache_events.clone()))
        .map_err(|e| EngineError::Other(format!("metrics registration failed: {e}")))?;

    let decision_duration = Histogram::with_opts(
        HistogramOpts::new(
            "engine_decision_duration_seconds",
            "Decision latency",
        )
        // Buckets tuned around the 10ms budget.
        .buckets(vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1]),
    )
    .map_err(|e| EngineError::Other(format!("metrics init failed: {e}")))?;
    registry
        .register(Box::new(decision_duration.clone()))
        .map_err(|e| EngineError::Other(format!("metrics registration failed: {e}")))?;

    // If another thread raced us, the first one wins — both initializations
    // produce identical metric descriptors, so neither outcome is incorrect.
    let _ = METRICS.set(Metrics {
        registry,
        decisions_total,
        fallback_total,
        model_substitutions,
        cache_events,
        decision_duration,
    });

    Ok(())
}

fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

// ── Public helper functions ────────────────────────────────────────────────

/// Increment the decision counter for a location label.
///
/// No-op if metrics have not been initialised.
pub fn inc_decision(location: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.decisions_total.get_metric_with_label_values(&[location]) {
            c.inc();
        }
    }
}

/// Increment the safe-fallback counter.
///
/// No-op if metrics have not been initialised.
pub fn inc_fallback() {
    if let Some(m) = metrics() {
        m.fallback_total.inc();
    }
}

/// Increment the substitution counter for a model kind
/// (`"safety"`, `"performance"`, `"routing"`).
///
/// No-op if metrics have not been initialised.
pub fn inc_model_substitution(model: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.model_substitutions.get_metric_with_label_values(&[model]) {
            c.inc();
        }
    }
}

/// Record a cache event (`"hit"` or `"miss"`).
///
/// No-op if metrics have not been initialised.
pub fn inc_cache_event(event: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.cache_events.get_metric_with_label_values(&[event]) {
            c.inc();
        }
    }
}

/// Record a decision's wall time.
///
/// No-op if metrics have not been initialised.
pub fn observe_decision_latency(d: Duration) {
    if let Some(m) = metrics() {
        m.decision_duration.observe(d.as_secs_f64());
    }
}

/// Gather and encode all metrics in the Prometheus text exposition format.
///
/// Returns an empty string if metrics have not been initialised or if
/// encoding fails — observability degrades gracefully rather than
/// panicking.
pub fn gather_metrics() -> String {
    let Some(m) = metrics() else {
        return String::new();
    };
    let families = m.registry.gather();
    if families.is_empty() {
        return String::new();
    }
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_metrics_succeeds_once() {
        let result = init_metrics();
        assert!(result.is_ok(), "init_metrics should succeed: {result:?}");
    }

    #[test]
    fn test_init_metrics_idempotent_second_call_is_noop() {
        let _ = init_metrics();
        assert!(init_metrics().is_ok());
    }

    #[test]
    fn test_helpers_do_not_panic_before_or_after_init() {
        // OnceLock may already be set by another test; both paths must be
        // safe.
        inc_decision("edge");
        inc_fallback();
        inc_model_substitution("safety");
        inc_cache_event("hit");
        observe_decision_latency(Duration::from_millis(3));
    }

    #[test]
    fn test_gather_metrics_returns_valid_utf8() {
        let _ = init_metrics();
        inc_decision("edge");
        let text = gather_metrics();
        assert!(std::str::from_utf8(text.as_bytes()).is_ok());
    }

    #[test]
    fn test_gather_metrics_contains_observed_counter() {
        let _ = init_metrics();
        inc_decision("cloud");
        let text = gather_metrics();
        assert!(
            text.contains("engine_decisions_total"),
            "exposition should include the decision counter: {text}"
        );
    }
}
