//! Per-service backup loop: periodic content-addressed snapshots of
//! every backup-enabled volume binding on every `ready` replica.

use std::sync::Arc;
use std::time::Duration;

use statefuld_agent_client::AgentClient;
use statefuld_types::{ReplicaStatus, Service};
use tokio::sync::{watch, Mutex};

/// Floor under which the backup loop refuses to run, mirroring the
/// health loop's minimum-tick ambient-stack addition.
const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(5);

/// Cadence is the minimum `backup.intervalSeconds` across all
/// backup-enabled volumes declared on the service. Returns `None` if no
/// volume has backups enabled, in which case the caller should not spawn
/// a loop.
#[must_use]
pub fn cadence(service: &Service) -> Option<Duration> {
    service
        .spec
        .volumes
        .iter()
        .filter(|v| v.backup.enabled)
        .map(|v| Duration::from_secs(u64::from(v.backup.interval_seconds)))
        .min()
}

/// Runs the backup loop for one service until `shutdown` fires. A no-op
/// loop (returns immediately) if no volume has backups enabled.
pub async fn run(service: Arc<Mutex<Service>>, agent: Arc<dyn AgentClient>, min_interval: Duration, mut shutdown: watch::Receiver<()>) {
    let Some(period) = ({ let guard = service.lock().await; cadence(&guard) }) else {
        return;
    };
    let period = period.max(min_interval.max(DEFAULT_MIN_INTERVAL));
    let mut tick = tokio::time::interval(period);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                run_once(&service, &agent).await;
            }
            _ = shutdown.changed() => {
                break;
            }
        }
    }
}

async fn run_once(service: &Arc<Mutex<Service>>, agent: &Arc<dyn AgentClient>) {
    let mut guard = service.lock().await;
    let service_id = guard.id;
    let backup_enabled: std::collections::HashSet<String> =
        guard.spec.volumes.iter().filter(|v| v.backup.enabled).map(|v| v.name.clone()).collect();
    if backup_enabled.is_empty() {
        return;
    }

    for replica in &mut guard.replicas {
        if replica.status != ReplicaStatus::Ready {
            continue;
        }
        let Some(address) = replica.node_address.clone() else { continue };
        let ordinal = replica.ordinal;
        for binding in &mut replica.volume_bindings {
            if !backup_enabled.contains(&binding.name) {
                continue;
            }
            if let Err(err) = statefuld_placement::snapshot_volume(agent.as_ref(), &address, service_id, ordinal, binding).await {
                tracing::warn!(%service_id, %ordinal, volume = %binding.name, error = %err, "periodic backup failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use statefuld_agent_client::FakeAgentClient;
    use statefuld_types::{
        BackupSpec, CpuArchitecture, GpuType, HardwareSpec, HealthCheckSpec, Name, Namespace, Ordinal, Owner,
        Replica, ReplicaRole, ServiceId, ServiceSpec, ServiceStatus, StorageType, TeePlatform, VolumeBinding,
        VolumeSpec, VolumeTier,
    };
    use tokio::sync::Mutex as TokioMutex;

    use super::*;

    fn service_with_backup_volume() -> Service {
        let owner = Owner::try_from("a".repeat(40)).unwrap();
        let mut svc = Service {
            id: ServiceId::derive("default", "db", owner, 1),
            owner,
            namespace: Namespace::parse("default").unwrap(),
            name: Name::parse("db").unwrap(),
            spec: ServiceSpec {
                name: "db".to_string(),
                namespace: "default".to_string(),
                replicas: 1,
                image: "x/sql".to_string(),
                tag: "1".to_string(),
                command: vec![],
                args: vec![],
                env: HashMap::new(),
                ports: vec![],
                hardware: HardwareSpec {
                    cpu_cores: 2,
                    cpu_architecture: CpuArchitecture::Amd64,
                    memory_mb: 2048,
                    storage_mb: 102_400,
                    storage_type: StorageType::Ssd,
                    gpu_type: GpuType::None,
                    gpu_count: 0,
                    network_bandwidth_mbps: 1000,
                    public_ip: false,
                    tee_platform: TeePlatform::None,
                    region: None,
                },
                volumes: vec![VolumeSpec {
                    name: "data".to_string(),
                    size_mb: 10_240,
                    tier: VolumeTier::IpfsBacked,
                    mount_path: "/data".to_string(),
                    backup: BackupSpec { enabled: true, interval_seconds: 60, retention_count: 24, ipfs_pin: true },
                }],
                consensus: None,
                mpc: None,
                health_check: HealthCheckSpec {
                    path: "/v1/status".to_string(),
                    port: 8080,
                    interval_seconds: 10,
                    timeout_seconds: 5,
                    failure_threshold: 3,
                    success_threshold: 1,
                },
                readiness: None,
                labels: HashMap::new(),
                annotations: HashMap::new(),
                termination_grace_period_seconds: 30,
            },
            status: ServiceStatus::Running,
            replicas: Vec::new(),
            current_leader: None,
            generation: 0,
            consensus_epoch: 0,
            headless_endpoint: "db.default.headless.cluster.local".to_string(),
            cluster_endpoint: "db.default.svc.cluster.local".to_string(),
            mpc_cluster_id: None,
            mpc_threshold_public_key: None,
            last_election_at: None,
            created_at: chrono::Utc::now(),
        };
        let mut replica = Replica::new_pending(Ordinal::new(0), "db-0".to_string(), "db-0.db.default.internal.cluster.local".to_string(), ReplicaRole::Leader);
        replica.status = ReplicaStatus::Ready;
        replica.node_address = Some("http://node-0:9000".to_string());
        replica.volume_bindings = vec![VolumeBinding::new("data", "/var/lib/statefuld/db-0/data")];
        svc.replicas = vec![replica];
        svc
    }

    #[test]
    fn cadence_is_minimum_across_backup_enabled_volumes() {
        let svc = service_with_backup_volume();
        assert_eq!(cadence(&svc), Some(Duration::from_secs(60)));
    }

    #[test]
    fn cadence_is_none_without_backup_enabled_volumes() {
        let mut svc = service_with_backup_volume();
        svc.spec.volumes[0].backup.enabled = false;
        assert_eq!(cadence(&svc), None);
    }

    #[tokio::test]
    async fn run_once_snapshots_ready_replica_bindings() {
        let svc = Arc::new(TokioMutex::new(service_with_backup_volume()));
        let agent: Arc<dyn AgentClient> = Arc::new(FakeAgentClient::new());
        run_once(&svc, &agent).await;
        let guard = svc.lock().await;
        assert!(guard.replica(Ordinal::new(0)).unwrap().volume_bindings[0].snapshot_ref.is_some());
    }
}
