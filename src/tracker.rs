//! Engine metrics tracking.
//!
//! Running aggregates over the engine's lifetime: decision count, mean
//! decision latency, sub-budget compliance count, per-location counts, and
//! fallback usage. All counters are lock-free atomics so `record` never
//! blocks the hot path and `snapshot` is safe to call concurrently with
//! writers.
//!
//! Latency accumulates as integer micro-milliseconds (1 ms = 1 000 µms) to
//! avoid floating-point drift in long-running aggregations; the mean is
//! derived at snapshot time.

use crate::combiner::ExecutionDecision;
use crate::ExecutionLocation;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Conversion factor between milliseconds and stored micro-milliseconds.
const MICRO_PER_MS: f64 = 1_000.0;

/// Process-lifetime decision counters. Never rolled back.
#[derive(Debug)]
pub struct DecisionTracker {
    /// Latency budget decisions are measured against, milliseconds.
    budget_ms: f64,

    total: AtomicU64,
    latency_micro_sum: AtomicU64,
    sub_budget: AtomicU64,
    fallbacks: AtomicU64,

    edge: AtomicU64,
    cloud: AtomicU64,
    hybrid: AtomicU64,
}

/// A point-in-time view of the tracker's counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EngineMetrics {
    /// Total decisions made.
    pub total_decisions: u64,
    /// Arithmetic mean of measured decision latencies, milliseconds.
    pub avg_execution_time_ms: f64,
    /// Decisions faster than the latency budget.
    pub sub_budget_decisions: u64,
    /// Decisions produced by the safe-fallback path.
    pub fallback_decisions: u64,
    /// Decisions that chose edge execution.
    pub edge_decisions: u64,
    /// Decisions that chose cloud execution.
    pub cloud_decisions: u64,
    /// Decisions that chose hybrid execution.
    pub hybrid_decisions: u64,
}

impl DecisionTracker {
    /// Create a tracker with all counters at zero.
    pub fn new(budget_ms: f64) -> Self {
        Self {
            budget_ms,
            total: AtomicU64::new(0),
            latency_micro_sum: AtomicU64::new(0),
            sub_budget: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
            edge: AtomicU64::new(0),
            cloud: AtomicU64::new(0),
            hybrid: AtomicU64::new(0),
        }
    }

    /// Record one completed decision and its measured latency.
    ///
    /// Non-finite or negative latencies are recorded as zero — counters
    /// must stay monotone even on a broken clock.
    pub fn record(&self, execution_time_ms: f64, decision: &ExecutionDecision) {
        let latency = if execution_time_ms.is_finite() && execution_time_ms >= 0.0 {
            execution_time_ms
        } else {
            0.0
        };

        self.total.fetch_add(1, Ordering::Relaxed);
        self.latency_micro_sum
            .fetch_add((latency * MICRO_PER_MS).round() as u64, Ordering::Relaxed);
        if latency < self.budget_ms {
            self.sub_budget.fetch_add(1, Ordering::Relaxed);
        }
        if decision.fallback_used {
            self.fallbacks.fetch_add(1, Ordering::Relaxed);
        }
        match decision.location {
            ExecutionLocation::Edge => self.edge.fetch_add(1, Ordering::Relaxed),
            ExecutionLocation::Cloud => self.cloud.fetch_add(1, Ordering::Relaxed),
            ExecutionLocation::Hybrid => self.hybrid.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Read all counters. Safe under concurrent `record` calls; the view is
    /// per-counter consistent, which is all the best-effort contract needs.
    pub fn snapshot(&self) -> EngineMetrics {
        let total = self.total.load(Ordering::Relaxed);
        let micro_sum = self.latency_micro_sum.load(Ordering::Relaxed);
        let avg_execution_time_ms = if total == 0 {
            0.0
        } else {
            micro_sum as f64 / MICRO_PER_MS / total as f64
        };
        EngineMetrics {
            total_decisions: total,
            avg_execution_time_ms,
            sub_budget_decisions: self.sub_budget.load(Ordering::Relaxed),
            fallback_decisions: self.fallbacks.load(Ordering::Relaxed),
            edge_decisions: self.edge.load(Ordering::Relaxed),
            cloud_decisions: self.cloud.load(Ordering::Relaxed),
            hybrid_decisions: self.hybrid.load(Ordering::Relaxed),
        }
    }
}
