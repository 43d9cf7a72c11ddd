//! Domain value types and the unified error taxonomy for the statefuld
//! control plane.
//!
//! This crate has no I/O and no async runtime dependency: it is the pure
//! data layer shared by every other `statefuld-*` crate.

mod error;
mod ids;
mod replica;
mod service;
mod spec;

pub use error::CoreError;
pub use ids::{Name, Namespace, Ordinal, Owner, ServiceId};
pub use replica::{HealthStatus, Replica, ReplicaRole, ReplicaStatus, VolumeBinding};
pub use service::{Service, ServiceStatus};
pub use spec::{
    BackupSpec, ConsensusProtocol, ConsensusSpec, CpuArchitecture, GpuType, HardwareSpec,
    HealthCheckSpec, MpcSpec, PortProtocol, PortSpec, ReadinessSpec, ServiceSpec, StorageType,
    TeePlatform, VolumeSpec, VolumeTier,
};

/// Derives the deterministic volume path the node agent is asked to create,
/// backup, or restore. Same inputs yield the same path across create,
/// terminate, and recover cycles (spec invariant 7).
pub fn volume_path(data_root: &str, service_id: ServiceId, pod_name: &str, volume_name: &str) -> String {
    let data_root = data_root.trim_matches('/');
    format!("/{data_root}/{service_id}/{pod_name}/{volume_name}")
}

/// `"{service_name}-{ordinal}"`, stable across restarts.
pub fn pod_name(service_name: &str, ordinal: Ordinal) -> String {
    format!("{service_name}-{ordinal}")
}

/// `"{podName}.{name}.{namespace}.internal.{zone}"`.
pub fn internal_dns(pod_name: &str, name: &str, namespace: &str, zone: &str) -> String {
    format!("{pod_name}.{name}.{namespace}.internal.{zone}")
}

/// `quorum_required = consensus.minQuorum` if set, else `floor(n/2)+1`.
pub fn quorum_required(replica_count: usize, min_quorum: Option<u32>) -> usize {
    min_quorum
        .map(|q| q as usize)
        .unwrap_or_else(|| replica_count / 2 + 1)
}
