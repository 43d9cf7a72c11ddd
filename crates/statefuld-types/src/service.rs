use serde::{Deserialize, Serialize};

use crate::ids::{Name, Namespace, Ordinal, Owner, ServiceId};
use crate::replica::Replica;
use crate::spec::ServiceSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Creating,
    Running,
    Updating,
    Scaling,
    /// Between failure detection and re-election, or after a failed
    /// recovery attempt that leaves the service without automatic retry.
    Degraded,
    Failed,
    Terminated,
}

/// The Service Registry's authoritative record for a single declared
/// service and its live replica set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub owner: Owner,
    pub namespace: Namespace,
    pub name: Name,
    pub spec: ServiceSpec,
    pub status: ServiceStatus,
    /// Indexed by ordinal; invariant `replicas[i].ordinal == i`, no gaps.
    pub replicas: Vec<Replica>,
    pub current_leader: Option<Ordinal>,
    /// Incremented on any mutation that changes the declared replica count.
    pub generation: u64,
    /// Incremented on every successful leader election.
    pub consensus_epoch: u64,
    pub headless_endpoint: String,
    pub cluster_endpoint: String,
    pub mpc_cluster_id: Option<String>,
    pub mpc_threshold_public_key: Option<String>,
    pub last_election_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Service {
    #[must_use]
    pub fn replica(&self, ordinal: Ordinal) -> Option<&Replica> {
        self.replicas.get(ordinal.get() as usize)
    }

    #[must_use]
    pub fn replica_mut(&mut self, ordinal: Ordinal) -> Option<&mut Replica> {
        self.replicas.get_mut(ordinal.get() as usize)
    }

    #[must_use]
    pub fn leader_replica(&self) -> Option<&Replica> {
        self.current_leader.and_then(|ordinal| self.replica(ordinal))
    }

    #[must_use]
    pub fn used_node_ids(&self) -> Vec<&str> {
        self.replicas.iter().filter_map(|r| r.node_id.as_deref()).collect()
    }
}
