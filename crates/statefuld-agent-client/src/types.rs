//! Request/response payloads for the node-agent HTTP contract.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct CreateVolumeRequest {
    pub path: String,
    pub size_mb: u64,
    pub tier: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupVolumeRequest {
    pub path: String,
    pub service_id: String,
    pub replica_ordinal: u32,
    pub volume_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackupVolumeResponse {
    pub cid: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreVolumeRequest {
    pub path: String,
    pub cid: String,
}

/// Docker-like container creation payload.
#[derive(Debug, Clone, Serialize)]
pub struct CreateContainerRequest {
    #[serde(rename = "Image")]
    pub image: String,
    #[serde(rename = "Cmd", skip_serializing_if = "Vec::is_empty")]
    pub cmd: Vec<String>,
    #[serde(rename = "Env")]
    pub env: Vec<String>,
    #[serde(rename = "ExposedPorts")]
    pub exposed_ports: HashMap<String, serde_json::Value>,
    #[serde(rename = "HostConfig")]
    pub host_config: HostConfig,
    #[serde(rename = "Labels")]
    pub labels: HashMap<String, String>,
    #[serde(rename = "Hostname")]
    pub hostname: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HostConfig {
    #[serde(rename = "Binds", skip_serializing_if = "Vec::is_empty")]
    pub binds: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateContainerResponse {
    pub endpoint: String,
    #[serde(default)]
    pub ports: Vec<u16>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderChangeRequest {
    pub epoch: u64,
    pub leader_id: u32,
    pub leader_endpoint: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeerInfo {
    pub ordinal: u32,
    pub endpoint: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeerUpdateRequest {
    pub peers: Vec<PeerInfo>,
    pub epoch: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DkgParty {
    pub party_id: u32,
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DkgInitRequest {
    pub cluster_id: String,
    pub threshold: u32,
    pub total_parties: u32,
    pub party_id: u32,
    pub parties: Vec<DkgParty>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DkgInitResponse {
    pub public_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DkgFinalizeRequest {
    pub cluster_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DkgFinalizeResponse {
    pub threshold_public_key: String,
}
