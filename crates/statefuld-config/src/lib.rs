//! Configuration management for statefuld.
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (`STATEFULD_*` prefix, highest precedence)
//! 2. `statefuld.local.toml` (gitignored, local overrides)
//! 3. `statefuld.toml` (git-tracked, project config)
//! 4. `~/.config/statefuld/config.toml` (user defaults)
//! 5. Built-in defaults (lowest precedence)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Root configuration for a statefuld control-plane process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatefuldConfig {
    pub project: ProjectConfig,
    pub storage: StorageConfig,
    pub reconciler: ReconcilerConfig,
    pub health: HealthLoopConfig,
    pub backup: BackupLoopConfig,
    pub node_agent: NodeAgentConfig,
    pub cluster: ClusterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "statefuld-project".to_string(),
        }
    }
}

/// Knobs around the deterministic volume path scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root prefix used in `/{dataRoot}/{serviceId}/{podName}/{volumeName}`.
    pub data_root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_root: "var/lib/statefuld".to_string(),
        }
    }
}

/// Reconciler timing. The 120-second readiness deadline is a hard
/// baseline constraint; it is configurable here only because a real
/// deployment needs to tune it per workload, not because the deadline
/// is meant to be optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub readiness_timeout_seconds: u32,
    pub recovery_timeout_seconds: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            readiness_timeout_seconds: 120,
            recovery_timeout_seconds: 120,
        }
    }
}

/// Lower bound on how often the health loop is allowed to tick, regardless
/// of what a `ServiceSpec` requests — guards against a misconfigured spec
/// hammering node agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthLoopConfig {
    pub minimum_interval_seconds: u32,
}

impl Default for HealthLoopConfig {
    fn default() -> Self {
        Self {
            minimum_interval_seconds: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupLoopConfig {
    pub minimum_interval_seconds: u32,
}

impl Default for BackupLoopConfig {
    fn default() -> Self {
        Self {
            minimum_interval_seconds: 60,
        }
    }
}

/// Outbound HTTP client settings for calls to the node-agent contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeAgentConfig {
    pub request_timeout_seconds: u32,
    pub retry_count: u32,
}

impl Default for NodeAgentConfig {
    fn default() -> Self {
        Self {
            request_timeout_seconds: 10,
            retry_count: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// DNS zone suffix used to build `internalDns` (`"{podName}.{name}.{namespace}.internal.{zone}"`).
    pub dns_zone: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            dns_zone: "cluster.local".to_string(),
        }
    }
}

impl StatefuldConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Resolve relative paths to absolute, anchored at `base_dir`.
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();
        let data_root = PathBuf::from(&self.storage.data_root);
        if data_root.is_relative() {
            self.storage.data_root = base.join(data_root).to_string_lossy().into_owned();
        }
    }
}
