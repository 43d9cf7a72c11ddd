use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PlacementError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Online,
    Offline,
}

/// A candidate node as reported by the external node scheduler, with its
/// resource accounting. The core only reads these fields; the scheduler
/// owns the authoritative resource counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeCandidate {
    pub id: String,
    pub address: String,
    pub status: NodeStatus,
    pub available_cpu_cores: u32,
    pub available_memory_mb: u64,
    pub available_storage_mb: u64,
    pub region: Option<String>,
    /// Capability tags, e.g. `"intel-tdx"`, `"amd-sev"` for TEE platforms.
    pub capabilities: HashSet<String>,
    /// Image references already cached locally on this node.
    pub cached_images: HashSet<String>,
    pub reputation: i64,
}

/// Abstraction over the external node scheduler, which returns the
/// candidate node list and their resource accounting. A narrow black-box
/// interface — the core never maintains its own resource counters.
#[async_trait]
pub trait NodeScheduler: Send + Sync {
    async fn list_candidates(&self) -> Result<Vec<NodeCandidate>, PlacementError>;
}

/// In-memory node scheduler used by tests: holds a fixed candidate table
/// that can be mutated between calls to simulate nodes going offline or
/// capacity changing.
pub struct FakeNodeScheduler {
    nodes: Mutex<HashMap<String, NodeCandidate>>,
}

impl FakeNodeScheduler {
    #[must_use]
    pub fn new(nodes: Vec<NodeCandidate>) -> Self {
        Self {
            nodes: Mutex::new(nodes.into_iter().map(|n| (n.id.clone(), n)).collect()),
        }
    }

    pub fn set_status(&self, node_id: &str, status: NodeStatus) {
        if let Some(node) = self.nodes.lock().expect("lock poisoned").get_mut(node_id) {
            node.status = status;
        }
    }
}

#[async_trait]
impl NodeScheduler for FakeNodeScheduler {
    async fn list_candidates(&self) -> Result<Vec<NodeCandidate>, PlacementError> {
        Ok(self.nodes.lock().expect("lock poisoned").values().cloned().collect())
    }
}
