//! Decision caching.
//!
//! Memoizes decisions keyed by a deterministic hash of the quantized
//! feature vector (every slot rounded to two decimal places before
//! hashing). The rounding is deliberately lossy so that "similar" requests
//! share a cache entry and the hit rate stays useful.
//!
//! The baseline contract is an unbounded mapping; this implementation
//! bounds it at a configurable capacity and evicts an arbitrary entry when
//! full — the external `key`/`get`/`put` contract is unchanged. The cache
//! is best-effort, in-memory state: clearing it never affects decision
//! correctness, only the hit rate.

use crate::combiner::ExecutionDecision;
use crate::features::FeatureVector;
use dashmap::DashMap;
use std::hash::{Hash, Hasher};
use tracing::debug;

/// Deterministic cache key for a feature vector.
///
/// Quantizes every feature to two decimals, then hashes the rounded
/// sequence. Feature-identical (post-rounding) requests map to the same key.
pub fn cache_key(features: &FeatureVector) -> u64 {
    use std::collections::hash_map::DefaultHasher;

    let mut hasher = DefaultHasher::new();
    features.quantized().hash(&mut hasher);
    hasher.finish()
}

/// Concurrent, bounded decision cache.
///
/// Writes serialize per DashMap shard; reads never block writers beyond a
/// shard lock. Shared across requests via `Arc` inside the engine.
#[derive(Debug)]
pub struct DecisionCache {
    store: DashMap<u64, ExecutionDecision>,
    capacity: usize,
}

impl DecisionCache {
    /// Create a cache bounded at `capacity` entries. Zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            store: DashMap::new(),
            capacity,
        }
    }

    /// Look up a decision for a key.
    pub fn get(&self, key: u64) -> Option<ExecutionDecision> {
        let hit = self.store.get(&key).map(|entry| entry.clone());
        if hit.is_some() {
            debug!(key, "decision cache hit");
        }
        hit
    }

    /// Store a decision under a key, evicting an arbitrary entry if full.
    pub fn put(&self, key: u64, decision: ExecutionDecision) {
        if self.capacity == 0 {
            return;
        }
        if self.store.len() >= self.capacity && !self.store.contains_key(&key) {
            // Collect the victim key first to release all DashMap read
            // guards before calling remove (avoids shard deadlock).
            let victim = self.store.iter().next().map(|e| *e.key());
            if let Some(victim) = victim {
                self.store.remove(&victim);
                debug!(victim, "decision cache evicted entry at capacity");
            }
        }
        self.store.insert(key, decision);
    }

    /// Number of cached decisions.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// True when no decisions are cached.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Drop every cached decision. Safe at any time; only the hit rate
    /// suffers.
    pub fn clear(&self) {
        self.store.clear();
    }
}
