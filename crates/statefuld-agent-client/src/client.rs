use std::time::Duration;

use async_trait::async_trait;

use crate::error::AgentError;
use crate::types::{
    BackupVolumeRequest, BackupVolumeResponse, CreateContainerRequest, CreateContainerResponse,
    CreateVolumeRequest, DkgFinalizeRequest, DkgFinalizeResponse, DkgInitRequest, DkgInitResponse,
    LeaderChangeRequest, PeerUpdateRequest, RestoreVolumeRequest,
};

/// Abstraction over the node-agent HTTP contract, so the reconciler,
/// placement planner, cluster coordinator and health loops depend on a
/// trait rather than a concrete transport, gated behind a feature flag
/// to keep the core logic runtime-agnostic and unit-testable.
#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn create_volume(&self, endpoint: &str, req: CreateVolumeRequest) -> Result<(), AgentError>;

    async fn backup_volume(
        &self,
        endpoint: &str,
        req: BackupVolumeRequest,
    ) -> Result<BackupVolumeResponse, AgentError>;

    async fn restore_volume(&self, endpoint: &str, req: RestoreVolumeRequest) -> Result<(), AgentError>;

    async fn create_container(
        &self,
        endpoint: &str,
        req: CreateContainerRequest,
    ) -> Result<CreateContainerResponse, AgentError>;

    async fn stop_container(&self, endpoint: &str, instance_id: &str) -> Result<(), AgentError>;

    async fn leader_change(&self, endpoint: &str, req: LeaderChangeRequest) -> Result<(), AgentError>;

    async fn peer_update(&self, endpoint: &str, req: PeerUpdateRequest) -> Result<(), AgentError>;

    async fn dkg_init(&self, endpoint: &str, req: DkgInitRequest) -> Result<DkgInitResponse, AgentError>;

    async fn dkg_finalize(
        &self,
        endpoint: &str,
        req: DkgFinalizeRequest,
    ) -> Result<DkgFinalizeResponse, AgentError>;

    /// GETs `endpoint + path`; `Ok(true)` on any 2xx, `Ok(false)` on any
    /// other status, `Err` on transport failure or timeout. Used for both
    /// the health-check and readiness-check probes, which share this
    /// shape in the node-agent contract.
    async fn probe(&self, endpoint: &str, path: &str, timeout: Duration) -> Result<bool, AgentError>;
}
