use serde::{Deserialize, Serialize};

use crate::ids::Ordinal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicaStatus {
    Pending,
    Provisioning,
    Running,
    Ready,
    Failed,
    Terminating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplicaRole {
    Leader,
    Follower,
    Candidate,
    MpcParty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

/// A node-local volume bound to exactly one replica at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeBinding {
    /// Matches a declared `VolumeSpec.name`.
    pub name: String,
    pub node_local_path: String,
    /// Opaque content-addressed handle from the last successful snapshot.
    pub snapshot_ref: Option<String>,
    pub last_backup_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl VolumeBinding {
    #[must_use]
    pub fn new(name: impl Into<String>, node_local_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_local_path: node_local_path.into(),
            snapshot_ref: None,
            last_backup_at: None,
        }
    }
}

/// One ordinal-indexed replica belonging to a service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Replica {
    pub ordinal: Ordinal,
    pub pod_name: String,
    pub node_id: Option<String>,
    pub node_address: Option<String>,
    /// Unique per (re)deployment; changes on recovery.
    pub instance_id: Option<String>,
    pub status: ReplicaStatus,
    pub role: ReplicaRole,
    pub endpoint: Option<String>,
    pub internal_dns: String,
    pub volume_bindings: Vec<VolumeBinding>,
    pub health_status: HealthStatus,
    pub last_health_check: Option<chrono::DateTime<chrono::Utc>>,
    /// Set once on first ready transition per instance.
    pub became_ready_at: Option<chrono::DateTime<chrono::Utc>>,
    pub mpc_party_id: Option<u32>,
    pub mpc_public_key: Option<String>,
}

impl Replica {
    #[must_use]
    pub fn new_pending(ordinal: Ordinal, pod_name: String, internal_dns: String, role: ReplicaRole) -> Self {
        Self {
            ordinal,
            pod_name,
            node_id: None,
            node_address: None,
            instance_id: None,
            status: ReplicaStatus::Pending,
            role,
            endpoint: None,
            internal_dns,
            volume_bindings: Vec::new(),
            health_status: HealthStatus::Unknown,
            last_health_check: None,
            became_ready_at: None,
            mpc_party_id: None,
            mpc_public_key: None,
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status == ReplicaStatus::Ready
    }

    #[must_use]
    pub fn is_healthy_and_ready(&self) -> bool {
        self.is_ready() && self.health_status == HealthStatus::Healthy
    }
}
