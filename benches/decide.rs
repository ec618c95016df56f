//! Decision hot-path benchmarks.
//!
//! Run with `cargo bench`. The interesting numbers are the full-pipeline
//! latency (cache disabled, all three models evaluated) versus the cached
//! steady state, both of which must sit comfortably under the 10ms budget.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use edgeroute::{
    DecisionContext, DecisionFactors, EngineConfig, ExecutionRequest, RoutingEngine, SafetyLevel,
};
use std::collections::HashMap;
use tokio::runtime::Runtime;

fn request() -> ExecutionRequest {
    ExecutionRequest {
        robot_id: "arm-1".to_string(),
        command: "move_to".to_string(),
        parameters: HashMap::new(),
        max_latency_ms: 50.0,
        safety_level: SafetyLevel::Medium,
        priority: 1,
    }
}

fn bench_decide(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let req = request();
    let ctx = DecisionContext::default();
    let factors = DecisionFactors::default();

    let cached = RoutingEngine::new(EngineConfig::rule_based()).unwrap();
    // Warm the cache once so the timed loop measures the hit path.
    rt.block_on(cached.decide(&req, &ctx, &factors));
    c.bench_function("decide_cache_hit", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(cached.decide(&req, &ctx, &factors).await) });
    });

    let mut cfg = EngineConfig::rule_based();
    cfg.cache_capacity = 0;
    let uncached = RoutingEngine::new(cfg).unwrap();
    c.bench_function("decide_full_pipeline", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(uncached.decide(&req, &ctx, &factors).await) });
    });
}

criterion_group!(benches, bench_decide);
criterion_main!(benches);
