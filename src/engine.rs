//! The routing engine facade.
//!
//! [`RoutingEngine`] owns the whole decision pipeline: feature extraction,
//! the cache probe, the concurrent three-model fan-out, combining, and
//! metrics recording. Its one hot-path method, [`RoutingEngine::decide`],
//! is infallible by contract — a robot command must always get an answer.
//!
//! Failure is absorbed in two layers:
//!
//! 1. **Per-model substitution.** If a trained model errors (or its task
//!    fails to join), the rule-based variant answers for that call. The
//!    other two signals are unaffected.
//! 2. **Safe fallback.** If even substitution cannot produce a signal, a
//!    conservative decision is synthesized from the request's safety level
//!    and the context's complexity, marked `fallback_used`.
//!
//! Fallback decisions are never cached; the next identical request retries
//! the full pipeline.

use crate::cache::{cache_key, DecisionCache};
use crate::combiner::{self, ExecutionDecision, LocationScores};
use crate::config::{self, EngineConfig, ModelBackend};
use crate::features::extract_features;
use crate::metrics;
use crate::models::{
    LocationProbabilities, PerformanceAdvantage, PerformanceModel, PerformancePrediction,
    RoutingModel, RoutingRecommendation, RulePerformanceModel, RuleRoutingModel, RuleSafetyModel,
    SafetyAssessment, SafetyModel, TrainedPerformanceModel, TrainedRoutingModel,
    TrainedSafetyModel,
};
use crate::tracker::{DecisionTracker, EngineMetrics};
use crate::{
    DecisionContext, DecisionFactors, EngineError, ExecutionLocation, ExecutionRequest,
    SafetyLevel,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinError;
use tracing::{debug, instrument, warn};

/// Confidence assigned to safe-fallback decisions. Deliberately low so
/// downstream consumers can distinguish a conservative guess from a scored
/// decision.
const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Complexity score at or above which the safe fallback routes to cloud.
const FALLBACK_CLOUD_COMPLEXITY: f64 = 0.8;

/// Edge-cloud execution routing engine.
///
/// Cheap to share: all interior state is behind `Arc`, so the engine can be
/// cloned per connection handler or wrapped in an `Arc` itself.
#[derive(Clone)]
pub struct RoutingEngine {
    safety: Arc<dyn SafetyModel>,
    performance: Arc<dyn PerformanceModel>,
    routing: Arc<dyn RoutingModel>,

    // Substitutes for failed per-call evaluations. Always rule-based.
    rule_safety: RuleSafetyModel,
    rule_performance: RulePerformanceModel,
    rule_routing: RuleRoutingModel,

    cache: Arc<DecisionCache>,
    tracker: Arc<DecisionTracker>,
}

impl RoutingEngine {
    /// Build an engine from configuration.
    ///
    /// Trained backends load and validate their artifacts here, so a bad
    /// model file fails construction instead of the first decision.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] on an invalid configuration or an
    /// unloadable model artifact.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let errors = config::validate(&config);
        if !errors.is_empty() {
            return Err(EngineError::Config(errors.join("; ")));
        }

        let safety: Arc<dyn SafetyModel> = match &config.safety_backend {
            ModelBackend::RuleBased => Arc::new(RuleSafetyModel::new()),
            ModelBackend::Trained { artifact } => {
                Arc::new(TrainedSafetyModel::from_artifact(artifact)?)
            }
        };
        let performance: Arc<dyn PerformanceModel> = match &config.performance_backend {
            ModelBackend::RuleBased => Arc::new(RulePerformanceModel::new()),
            ModelBackend::Trained { artifact } => {
                Arc::new(TrainedPerformanceModel::from_artifact(artifact)?)
            }
        };
        let routing: Arc<dyn RoutingModel> = match &config.routing_backend {
            ModelBackend::RuleBased => Arc::new(RuleRoutingModel::new()),
            ModelBackend::Trained { artifact } => {
                Arc::new(TrainedRoutingModel::from_artifact(artifact)?)
            }
        };

        Ok(Self::with_models(safety, performance, routing, &config))
    }

    /// Build an engine around already-constructed models.
    ///
    /// The main seam for tests and for callers that construct models out of
    /// band. The cache bound and latency budget still come from `config`;
    /// backend selections in it are ignored.
    pub fn with_models(
        safety: Arc<dyn SafetyModel>,
        performance: Arc<dyn PerformanceModel>,
        routing: Arc<dyn RoutingModel>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            safety,
            performance,
            routing,
            rule_safety: RuleSafetyModel::new(),
            rule_performance: RulePerformanceModel::new(),
            rule_routing: RuleRoutingModel::new(),
            cache: Arc::new(DecisionCache::new(config.cache_capacity)),
            tracker: Arc::new(DecisionTracker::new(config.latency_budget_ms)),
        }
    }

    /// Decide where one robot command should execute.
    ///
    /// Never fails: model errors are substituted per call, and a pipeline
    /// failure yields a conservative safe-fallback decision. The measured
    /// wall time of this call is written into the returned decision and the
    /// engine's metrics.
    #[instrument(skip_all, fields(robot_id = %request.robot_id, command = %request.command))]
    pub async fn decide(
        &self,
        request: &ExecutionRequest,
        context: &DecisionContext,
        factors: &DecisionFactors,
    ) -> ExecutionDecision {
        let started = Instant::now();
        let features = extract_features(request, context, factors);
        let key = cache_key(&features);

        if let Some(mut hit) = self.cache.get(key) {
            metrics::inc_cache_event("hit");
            hit.execution_time_ms = elapsed_ms(started);
            self.finish(&hit);
            return hit;
        }
        metrics::inc_cache_event("miss");

        let safety_task = {
            let model = Arc::clone(&self.safety);
            tokio::spawn(async move { model.evaluate(&features).await })
        };
        let performance_task = {
            let model = Arc::clone(&self.performance);
            tokio::spawn(async move { model.evaluate(&features).await })
        };
        let routing_task = {
            let model = Arc::clone(&self.routing);
            tokio::spawn(async move { model.evaluate(&features).await })
        };

        let (safety_join, performance_join, routing_join) =
            tokio::join!(safety_task, performance_task, routing_task);

        let safety = match flatten(safety_join) {
            Ok(assessment) => assessment,
            Err(e) => {
                warn!(error = %e, "safety model failed, substituting rule-based");
                metrics::inc_model_substitution("safety");
                match self.rule_safety.evaluate(&features).await {
                    Ok(assessment) => assessment,
                    Err(e) => return self.safe_fallback(request, context, started, &e),
                }
            }
        };
        let performance = match flatten(performance_join) {
            Ok(prediction) => prediction,
            Err(e) => {
                warn!(error = %e, "performance model failed, substituting rule-based");
                metrics::inc_model_substitution("performance");
                match self.rule_performance.evaluate(&features).await {
                    Ok(prediction) => prediction,
                    Err(e) => return self.safe_fallback(request, context, started, &e),
                }
            }
        };
        let routing = match flatten(routing_join) {
            Ok(recommendation) => recommendation,
            Err(e) => {
                warn!(error = %e, "routing model failed, substituting rule-based");
                metrics::inc_model_substitution("routing");
                match self.rule_routing.evaluate(&features).await {
                    Ok(recommendation) => recommendation,
                    Err(e) => return self.safe_fallback(request, context, started, &e),
                }
            }
        };

        let mut decision = combiner::combine(safety, performance, routing, factors);
        decision.execution_time_ms = elapsed_ms(started);

        debug!(
            location = decision.location.as_str(),
            confidence = decision.confidence,
            execution_time_ms = decision.execution_time_ms,
            "decision made"
        );

        self.cache.put(key, decision.clone());
        self.finish(&decision);
        decision
    }

    /// Current process-lifetime decision metrics.
    pub fn snapshot_metrics(&self) -> EngineMetrics {
        self.tracker.snapshot()
    }

    /// Drop every cached decision. Hit rate resets; correctness is
    /// unaffected.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Record one finished decision in the tracker and Prometheus.
    fn finish(&self, decision: &ExecutionDecision) {
        self.tracker.record(decision.execution_time_ms, decision);
        metrics::inc_decision(decision.location.as_str());
        if decision.fallback_used {
            metrics::inc_fallback();
        }
        metrics::observe_decision_latency(Duration::from_secs_f64(
            decision.execution_time_ms.max(0.0) / 1000.0,
        ));
    }

    /// Conservative location when the pipeline cannot produce signals.
    ///
    /// High-stakes commands stay under local control; known-heavy commands
    /// go to cloud capacity; everything else hedges with a hybrid split.
    fn fallback_location(request: &ExecutionRequest, context: &DecisionContext) -> ExecutionLocation {
        if matches!(
            request.safety_level,
            SafetyLevel::High | SafetyLevel::Critical
        ) {
            ExecutionLocation::Edge
        } else if context.complexity_level() == Some("critical")
            || context
                .complexity_score()
                .is_some_and(|s| s >= FALLBACK_CLOUD_COMPLEXITY)
        {
            ExecutionLocation::Cloud
        } else {
            ExecutionLocation::Hybrid
        }
    }

    /// Synthesize a safe-fallback decision after a pipeline failure.
    ///
    /// Recorded in metrics like any other decision, but never cached.
    fn safe_fallback(
        &self,
        request: &ExecutionRequest,
        context: &DecisionContext,
        started: Instant,
        error: &EngineError,
    ) -> ExecutionDecision {
        warn!(error = %error, "decision pipeline failed, returning safe fallback");

        let location = Self::fallback_location(request, context);

        let reason = match location {
            ExecutionLocation::Edge => "elevated safety level keeps execution under local control",
            ExecutionLocation::Cloud => "critical complexity routed to cloud capacity",
            ExecutionLocation::Hybrid => "no overriding signal, hedging with a hybrid split",
        };
        let reasoning = vec![
            format!("decision pipeline unavailable ({error})"),
            reason.to_string(),
        ];

        let probabilities = LocationProbabilities {
            edge: if location == ExecutionLocation::Edge {
                1.0
            } else {
                0.0
            },
            cloud: if location == ExecutionLocation::Cloud {
                1.0
            } else {
                0.0
            },
            hybrid: if location == ExecutionLocation::Hybrid {
                1.0
            } else {
                0.0
            },
        };
        let scores = LocationScores {
            edge: probabilities.edge * FALLBACK_CONFIDENCE,
            cloud: probabilities.cloud * FALLBACK_CONFIDENCE,
            hybrid: probabilities.hybrid * FALLBACK_CONFIDENCE,
        };

        // Placeholder assessments: consumers of a fallback decision must
        // not treat these as measured signals.
        let decision = ExecutionDecision {
            location,
            confidence: FALLBACK_CONFIDENCE,
            scores,
            reasoning,
            fallback_plan: combiner::fallback_plan(location),
            safety: SafetyAssessment {
                score: request.safety_level.indicator(),
                requires_edge: location == ExecutionLocation::Edge,
                confidence: FALLBACK_CONFIDENCE,
            },
            performance: PerformancePrediction {
                edge_latency_ms: 10.0,
                cloud_latency_ms: 50.0,
                edge_accuracy: 0.9,
                cloud_accuracy: 0.95,
                advantage: PerformanceAdvantage::Edge,
            },
            routing: RoutingRecommendation {
                location,
                confidence: FALLBACK_CONFIDENCE,
                probabilities,
            },
            execution_time_ms: elapsed_ms(started),
            fallback_used: true,
        };

        self.finish(&decision);
        decision
    }
}

/// Milliseconds elapsed since `started`.
fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1_000.0
}

/// Collapse a spawned evaluation's join result into one error channel.
fn flatten<T>(joined: Result<Result<T, EngineError>, JoinError>) -> Result<T, EngineError> {
    match joined {
        Ok(result) => result,
        Err(e) => Err(EngineError::TaskJoin(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureVector;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn request(safety_level: SafetyLevel, max_latency_ms: f64) -> ExecutionRequest {
        ExecutionRequest {
            robot_id: "arm-1".to_string(),
            command: "move_to".to_string(),
            parameters: HashMap::new(),
            max_latency_ms,
            safety_level,
            priority: 1,
        }
    }

    fn engine() -> RoutingEngine {
        RoutingEngine::new(EngineConfig::rule_based())
            .unwrap_or_else(|e| std::panic::panic_any(format!("test: engine: {e}")))
    }

    struct FailingSafety;

    #[async_trait]
    impl SafetyModel for FailingSafety {
        async fn evaluate(
            &self,
            _features: &FeatureVector,
        ) -> Result<SafetyAssessment, EngineError> {
            Err(EngineError::Model("synthetic failure".to_string()))
        }
    }

    #[tokio::test]
    async fn test_decide_returns_decision_with_measured_time() {
        let engine = engine();
        let decision = engine
            .decide(
                &request(SafetyLevel::Medium, 100.0),
                &DecisionContext::default(),
                &DecisionFactors::default(),
            )
            .await;
        assert!((0.0..=1.0).contains(&decision.confidence));
        assert!(decision.execution_time_ms >= 0.0);
        assert!(!decision.fallback_used);
        assert!(!decision.fallback_plan.is_empty());
    }

    #[tokio::test]
    async fn test_decide_updates_tracker() {
        let engine = engine();
        for _ in 0..3 {
            engine
                .decide(
                    &request(SafetyLevel::Low, 50.0),
                    &DecisionContext::default(),
                    &DecisionFactors::default(),
                )
                .await;
        }
        assert_eq!(engine.snapshot_metrics().total_decisions, 3);
    }

    #[tokio::test]
    async fn test_repeated_request_hits_cache_with_same_location() {
        let engine = engine();
        let req = request(SafetyLevel::High, 5.0);
        let ctx = DecisionContext::default();
        let factors = DecisionFactors::default();

        let first = engine.decide(&req, &ctx, &factors).await;
        let second = engine.decide(&req, &ctx, &factors).await;
        assert_eq!(first.location, second.location);
        assert!((first.confidence - second.confidence).abs() < f64::EPSILON);
        assert_eq!(engine.snapshot_metrics().total_decisions, 2);
    }

    #[tokio::test]
    async fn test_clear_cache_forces_recompute_not_failure() {
        let engine = engine();
        let req = request(SafetyLevel::Medium, 100.0);
        let ctx = DecisionContext::default();
        let factors = DecisionFactors::default();

        let first = engine.decide(&req, &ctx, &factors).await;
        engine.clear_cache();
        let second = engine.decide(&req, &ctx, &factors).await;
        assert_eq!(first.location, second.location);
    }

    #[tokio::test]
    async fn test_failing_model_substituted_not_fallback() {
        let engine = RoutingEngine::with_models(
            Arc::new(FailingSafety),
            Arc::new(RulePerformanceModel::new()),
            Arc::new(RuleRoutingModel::new()),
            &EngineConfig::rule_based(),
        );
        let decision = engine
            .decide(
                &request(SafetyLevel::Critical, 5.0),
                &DecisionContext::default(),
                &DecisionFactors::default(),
            )
            .await;
        // Substitution answers with the rule-based safety signal; the
        // decision is a full pipeline product, not a safe fallback.
        assert!(!decision.fallback_used);
        assert!(decision.safety.requires_edge);
        assert_eq!(decision.location, ExecutionLocation::Edge);
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let mut cfg = EngineConfig::rule_based();
        cfg.latency_budget_ms = -1.0;
        assert!(matches!(
            RoutingEngine::new(cfg),
            Err(EngineError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_new_rejects_missing_artifact_at_construction() {
        let cfg = EngineConfig {
            safety_backend: ModelBackend::Trained {
                artifact: PathBuf::from("/nonexistent/safety.json"),
            },
            ..EngineConfig::rule_based()
        };
        assert!(matches!(
            RoutingEngine::new(cfg),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_elapsed_ms_is_nonnegative_and_grows() {
        let started = Instant::now();
        let first = elapsed_ms(started);
        assert!(first >= 0.0);
        std::thread::sleep(Duration::from_millis(2));
        let second = elapsed_ms(started);
        assert!(second >= first + 1.0, "expected growth, got {first} -> {second}");
    }

    #[test]
    fn test_fallback_location_high_safety_goes_edge() {
        let loc = RoutingEngine::fallback_location(
            &request(SafetyLevel::Critical, 100.0),
            &DecisionContext::default(),
        );
        assert_eq!(loc, ExecutionLocation::Edge);
    }

    #[test]
    fn test_fallback_location_critical_complexity_goes_cloud() {
        let ctx = DecisionContext::new(serde_json::json!({
            "complexity": { "level": "critical" },
        }));
        let loc = RoutingEngine::fallback_location(&request(SafetyLevel::Low, 100.0), &ctx);
        assert_eq!(loc, ExecutionLocation::Cloud);

        let ctx = DecisionContext::new(serde_json::json!({
            "complexity": { "score": 0.85 },
        }));
        let loc = RoutingEngine::fallback_location(&request(SafetyLevel::Low, 100.0), &ctx);
        assert_eq!(loc, ExecutionLocation::Cloud);
    }

    #[test]
    fn test_fallback_location_defaults_to_hybrid() {
        let loc = RoutingEngine::fallback_location(
            &request(SafetyLevel::Low, 100.0),
            &DecisionContext::default(),
        );
        assert_eq!(loc, ExecutionLocation::Hybrid);
    }

    #[test]
    fn test_safe_fallback_is_marked_and_recorded() {
        let engine = engine();
        let decision = engine.safe_fallback(
            &request(SafetyLevel::High, 5.0),
            &DecisionContext::default(),
            Instant::now(),
            &EngineError::Model("synthetic".to_string()),
        );
        assert!(decision.fallback_used);
        assert_eq!(decision.location, ExecutionLocation::Edge);
        assert!((decision.confidence - FALLBACK_CONFIDENCE).abs() < f64::EPSILON);
        assert!(decision
            .reasoning
            .iter()
            .any(|r| r.contains("pipeline unavailable")));

        let m = engine.snapshot_metrics();
        assert_eq!(m.total_decisions, 1);
        assert_eq!(m.fallback_decisions, 1);
    }
}
