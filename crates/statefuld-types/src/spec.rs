use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Declarative configuration for a service, as accepted by `Create` and
/// reapplied (for the replica count) by `Scale`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// `^[a-z0-9][a-z0-9-]*[a-z0-9]$`, length 1-63.
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub replicas: u32,
    pub image: String,
    #[serde(default = "default_tag")]
    pub tag: String,

    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub ports: Vec<PortSpec>,

    pub hardware: HardwareSpec,
    #[serde(default)]
    pub volumes: Vec<VolumeSpec>,
    pub consensus: Option<ConsensusSpec>,
    pub mpc: Option<MpcSpec>,
    pub health_check: HealthCheckSpec,
    pub readiness: Option<ReadinessSpec>,

    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,

    #[serde(default = "default_termination_grace_period_seconds")]
    pub termination_grace_period_seconds: u32,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_tag() -> String {
    "latest".to_string()
}

fn default_termination_grace_period_seconds() -> u32 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortSpec {
    pub name: String,
    pub container_port: u16,
    #[serde(default)]
    pub protocol: PortProtocol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortProtocol {
    #[default]
    Tcp,
    Udp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareSpec {
    pub cpu_cores: u32,
    #[serde(default)]
    pub cpu_architecture: CpuArchitecture,
    pub memory_mb: u64,
    pub storage_mb: u64,
    #[serde(default)]
    pub storage_type: StorageType,
    #[serde(default)]
    pub gpu_type: GpuType,
    #[serde(default)]
    pub gpu_count: u32,
    #[serde(default = "default_network_bandwidth_mbps")]
    pub network_bandwidth_mbps: u32,
    #[serde(default)]
    pub public_ip: bool,
    #[serde(default)]
    pub tee_platform: TeePlatform,
    pub region: Option<String>,
}

fn default_network_bandwidth_mbps() -> u32 {
    1000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuArchitecture {
    #[default]
    Amd64,
    Arm64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Ssd,
    Nvme,
    Hdd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GpuType {
    #[default]
    None,
    A100,
    H100,
    L40s,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TeePlatform {
    #[default]
    None,
    IntelSgx,
    IntelTdx,
    AmdSev,
    NvidiaCc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub name: String,
    pub size_mb: u64,
    pub tier: VolumeTier,
    pub mount_path: String,
    #[serde(default)]
    pub backup: BackupSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VolumeTier {
    Ssd,
    Nvme,
    IpfsBacked,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BackupSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_backup_interval_seconds")]
    pub interval_seconds: u32,
    #[serde(default = "default_retention_count")]
    pub retention_count: u32,
    #[serde(default)]
    pub ipfs_pin: bool,
}

fn default_backup_interval_seconds() -> u32 {
    3600
}

fn default_retention_count() -> u32 {
    24
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusSpec {
    pub protocol: ConsensusProtocol,
    pub min_quorum: Option<u32>,
    #[serde(default = "default_election_timeout_ms")]
    pub election_timeout_ms: u32,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u32,
    #[serde(default = "default_snapshot_threshold")]
    pub snapshot_threshold: u32,
}

fn default_election_timeout_ms() -> u32 {
    5000
}

fn default_heartbeat_interval_ms() -> u32 {
    500
}

fn default_snapshot_threshold() -> u32 {
    10_000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusProtocol {
    Raft,
    Paxos,
    Sqlit,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MpcSpec {
    pub enabled: bool,
    pub threshold: u32,
    pub total_parties: u32,
    #[serde(default)]
    pub tee_required: bool,
    pub tee_platform: Option<TeePlatform>,
    #[serde(default = "default_key_rotation_interval_ms")]
    pub key_rotation_interval_ms: u64,
}

fn default_key_rotation_interval_ms() -> u64 {
    86_400_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckSpec {
    pub path: String,
    pub port: u16,
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u32,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u32,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
}

fn default_interval_seconds() -> u32 {
    10
}

fn default_timeout_seconds() -> u32 {
    5
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_success_threshold() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessSpec {
    pub path: String,
    pub port: u16,
    #[serde(default = "default_initial_delay_seconds")]
    pub initial_delay_seconds: u32,
    #[serde(default = "default_period_seconds")]
    pub period_seconds: u32,
}

fn default_initial_delay_seconds() -> u32 {
    5
}

fn default_period_seconds() -> u32 {
    5
}

impl ServiceSpec {
    /// Validates the subset of schema constraints that are not already
    /// enforced by the type system (bounds, enums are validated by serde).
    pub fn validate(&self) -> Result<(), SpecValidationError> {
        if !(1..=100).contains(&self.replicas) {
            return Err(SpecValidationError::new("replicas must be in [1, 100]"));
        }
        if self.hardware.cpu_cores < 1 {
            return Err(SpecValidationError::new("hardware.cpuCores must be >= 1"));
        }
        if self.hardware.memory_mb < 128 {
            return Err(SpecValidationError::new("hardware.memoryMb must be >= 128"));
        }
        if self.hardware.storage_mb < 1024 {
            return Err(SpecValidationError::new("hardware.storageMb must be >= 1024"));
        }
        for volume in &self.volumes {
            if volume.size_mb < 100 {
                return Err(SpecValidationError::new(format!(
                    "volume {:?}: sizeMb must be >= 100",
                    volume.name
                )));
            }
        }
        if let Some(consensus) = &self.consensus {
            if let Some(min_quorum) = consensus.min_quorum {
                if min_quorum < 1 {
                    return Err(SpecValidationError::new("consensus.minQuorum must be >= 1"));
                }
            }
        }
        if let Some(mpc) = &self.mpc {
            if mpc.enabled {
                if mpc.threshold < 1 {
                    return Err(SpecValidationError::new("mpc.threshold must be >= 1"));
                }
                if mpc.total_parties < 2 {
                    return Err(SpecValidationError::new("mpc.totalParties must be >= 2"));
                }
                if mpc.total_parties > self.replicas {
                    return Err(SpecValidationError::new(
                        "mpc.totalParties must not exceed replicas",
                    ));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid spec: {0}")]
pub struct SpecValidationError(String);

impl SpecValidationError {
    fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
