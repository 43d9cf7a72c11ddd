use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::client::AgentClient;
use crate::error::AgentError;
use crate::types::{
    BackupVolumeRequest, BackupVolumeResponse, CreateContainerRequest, CreateContainerResponse,
    CreateVolumeRequest, DkgFinalizeRequest, DkgFinalizeResponse, DkgInitRequest, DkgInitResponse,
    LeaderChangeRequest, PeerUpdateRequest, RestoreVolumeRequest,
};

/// In-memory node agent used by tests, in place of a real HTTP transport.
/// Always succeeds unless the test pre-configures a failure for a given
/// endpoint/path combination via [`FakeAgentClient::fail_next`] or marks an
/// endpoint unreachable with [`FakeAgentClient::set_unreachable`].
pub struct FakeAgentClient {
    next_container_seq: AtomicU32,
    unreachable: Mutex<std::collections::HashSet<String>>,
    probe_results: Mutex<HashMap<String, bool>>,
    calls: Mutex<Vec<String>>,
}

impl Default for FakeAgentClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeAgentClient {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_container_seq: AtomicU32::new(0),
            unreachable: Mutex::new(std::collections::HashSet::new()),
            probe_results: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub async fn set_unreachable(&self, endpoint: impl Into<String>) {
        self.unreachable.lock().await.insert(endpoint.into());
    }

    pub async fn set_probe_result(&self, endpoint: impl Into<String>, healthy: bool) {
        self.probe_results.lock().await.insert(endpoint.into(), healthy);
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    async fn record(&self, call: impl Into<String>) {
        self.calls.lock().await.push(call.into());
    }

    async fn check_reachable(&self, endpoint: &str) -> Result<(), AgentError> {
        if self.unreachable.lock().await.contains(endpoint) {
            Err(AgentError::Timeout {
                endpoint: endpoint.to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AgentClient for FakeAgentClient {
    async fn create_volume(&self, endpoint: &str, req: CreateVolumeRequest) -> Result<(), AgentError> {
        self.check_reachable(endpoint).await?;
        self.record(format!("create_volume {} {}", endpoint, req.path)).await;
        Ok(())
    }

    async fn backup_volume(
        &self,
        endpoint: &str,
        req: BackupVolumeRequest,
    ) -> Result<BackupVolumeResponse, AgentError> {
        self.check_reachable(endpoint).await?;
        self.record(format!("backup_volume {} {}", endpoint, req.path)).await;
        Ok(BackupVolumeResponse {
            cid: format!("bafy-fake-{}-{}", req.service_id, req.replica_ordinal),
        })
    }

    async fn restore_volume(&self, endpoint: &str, req: RestoreVolumeRequest) -> Result<(), AgentError> {
        self.check_reachable(endpoint).await?;
        self.record(format!("restore_volume {} {}", endpoint, req.path)).await;
        Ok(())
    }

    async fn create_container(
        &self,
        endpoint: &str,
        req: CreateContainerRequest,
    ) -> Result<CreateContainerResponse, AgentError> {
        self.check_reachable(endpoint).await?;
        let seq = self.next_container_seq.fetch_add(1, Ordering::SeqCst);
        self.record(format!("create_container {} {}", endpoint, req.hostname)).await;
        Ok(CreateContainerResponse {
            endpoint: format!("{endpoint}/instances/{seq}"),
            ports: vec![],
        })
    }

    async fn stop_container(&self, endpoint: &str, instance_id: &str) -> Result<(), AgentError> {
        self.check_reachable(endpoint).await?;
        self.record(format!("stop_container {endpoint} {instance_id}")).await;
        Ok(())
    }

    async fn leader_change(&self, endpoint: &str, req: LeaderChangeRequest) -> Result<(), AgentError> {
        self.check_reachable(endpoint).await?;
        self.record(format!("leader_change {} epoch={}", endpoint, req.epoch)).await;
        Ok(())
    }

    async fn peer_update(&self, endpoint: &str, req: PeerUpdateRequest) -> Result<(), AgentError> {
        self.check_reachable(endpoint).await?;
        self.record(format!("peer_update {} epoch={}", endpoint, req.epoch)).await;
        Ok(())
    }

    async fn dkg_init(&self, endpoint: &str, req: DkgInitRequest) -> Result<DkgInitResponse, AgentError> {
        self.check_reachable(endpoint).await?;
        self.record(format!("dkg_init {} party={}", endpoint, req.party_id)).await;
        Ok(DkgInitResponse {
            public_key: format!("fake-pubkey-{}-{}", req.cluster_id, req.party_id),
        })
    }

    async fn dkg_finalize(
        &self,
        endpoint: &str,
        req: DkgFinalizeRequest,
    ) -> Result<DkgFinalizeResponse, AgentError> {
        self.check_reachable(endpoint).await?;
        self.record(format!("dkg_finalize {}", endpoint)).await;
        Ok(DkgFinalizeResponse {
            threshold_public_key: format!("fake-threshold-pubkey-{}", req.cluster_id),
        })
    }

    async fn probe(&self, endpoint: &str, _path: &str, _timeout: Duration) -> Result<bool, AgentError> {
        if self.unreachable.lock().await.contains(endpoint) {
            return Ok(false);
        }
        let results = self.probe_results.lock().await;
        Ok(*results.get(endpoint).unwrap_or(&true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn defaults_to_healthy_and_reachable() {
        let client = FakeAgentClient::new();
        assert!(client.probe("http://node-1", "/healthz", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_every_call() {
        let client = FakeAgentClient::new();
        client.set_unreachable("http://node-1").await;
        let result = client
            .create_volume(
                "http://node-1",
                CreateVolumeRequest {
                    path: "/data/a".to_string(),
                    size_mb: 100,
                    tier: "ssd".to_string(),
                },
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn set_probe_result_overrides_default() {
        let client = FakeAgentClient::new();
        client.set_probe_result("http://node-1", false).await;
        assert!(!client.probe("http://node-1", "/healthz", Duration::from_secs(1)).await.unwrap());
    }
}
