//! Device gateway interface.
//!
//! The engine decides *where* a command should run; a downstream dispatcher
//! decides *which node* runs it. [`DeviceGateway`] is that seam: given a
//! robot identifier, resolve the edge node physically closest to it along
//! with its current capacity. Implementations talk to a fleet registry or
//! service mesh; the engine itself only depends on the trait.

use crate::EngineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Description of one edge node as reported by the fleet registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeNodeDescriptor {
    /// Stable node identifier.
    pub node_id: String,
    /// Physical or logical placement label (e.g. `"cell-3/rack-b"`).
    pub location: String,
    /// Capability tags the node advertises (e.g. `"gpu"`, `"realtime"`).
    pub capabilities: Vec<String>,
    /// Current load in the same unit as `capacity`.
    pub current_load: f64,
    /// Total capacity of the node.
    pub capacity: f64,
}

impl EdgeNodeDescriptor {
    /// Remaining capacity, clamped at zero for overloaded nodes.
    pub fn headroom(&self) -> f64 {
        (self.capacity - self.current_load).max(0.0)
    }

    /// Whether the node advertises a capability tag.
    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.iter().any(|c| c == tag)
    }
}

/// Resolves robots to edge nodes.
///
/// Object-safe so dispatchers can hold `Arc<dyn DeviceGateway>` and swap
/// registry backends without touching decision logic.
#[async_trait]
pub trait DeviceGateway: Send + Sync {
    /// Find the edge node that should serve a robot's edge-side execution.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Other`] when the robot is unknown or no edge
    /// node is reachable. Callers treat this as a signal to fall back to
    /// cloud execution.
    async fn resolve_edge_node(&self, robot_id: &str) -> Result<EdgeNodeDescriptor, EngineError>;
}
