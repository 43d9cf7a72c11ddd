//! C2 Reconciler: drives a service from its current replica set toward
//! its declared target — ordered provisioning, reverse-order scale-down,
//! and single-ordinal recovery.
//!
//! A start/stop/restart lifecycle generalized from a locally spawned OS
//! process to a remotely deployed container reached through
//! `statefuld-agent-client`. Every mutation here assumes the caller
//! already holds the per-service lock for the duration of the call,
//! including any readiness wait.

mod env;
mod error;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use statefuld_agent_client::{AgentClient, CreateContainerRequest, HostConfig};
use statefuld_placement::{select_node, NodeScheduler};
use statefuld_types::{
    internal_dns, pod_name, volume_path, CoreError, Ordinal, Replica, ReplicaRole, ReplicaStatus, Service,
    ServiceStatus, TeePlatform,
};

pub use error::ReconcilerError;

/// Tunable timing the reconciler needs beyond its hard constants
/// (the readiness deadline is fixed at 120s, but configurable here so a
/// deployment can tighten it for fast-failing test fixtures).
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub data_root: String,
    pub dns_zone: String,
    pub readiness_timeout: Duration,
    pub recovery_timeout: Duration,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            data_root: "var/lib/statefuld".to_string(),
            dns_zone: "cluster.local".to_string(),
            readiness_timeout: Duration::from_secs(120),
            recovery_timeout: Duration::from_secs(120),
        }
    }
}

pub struct Reconciler {
    agent: Arc<dyn AgentClient>,
    scheduler: Arc<dyn NodeScheduler>,
    settings: ReconcilerSettings,
}

impl Reconciler {
    #[must_use]
    pub fn new(agent: Arc<dyn AgentClient>, scheduler: Arc<dyn NodeScheduler>, settings: ReconcilerSettings) -> Self {
        Self { agent, scheduler, settings }
    }

    /// Scales `service` to `target` replicas: ordered provisioning
    /// one-at-a-time if scaling up, reverse-order termination if scaling
    /// down. A no-op if `target == service.replicas.len()`.
    pub async fn scale(&self, service: &mut Service, target: u32) -> Result<(), CoreError> {
        let current = service.replicas.len() as u32;
        if current == target {
            return Ok(());
        }
        service.generation += 1;
        service.status = ServiceStatus::Scaling;
        // Peer DNS names, REPLICA_COUNT, and the quorum fallback are all
        // derived from spec.replicas, so it must track the new target
        // before provisioning/terminating a single ordinal.
        service.spec.replicas = target;

        if target > current {
            for _ in current..target {
                self.provision_next(service).await?;
            }
        } else {
            for _ in target..current {
                self.terminate_last(service).await;
            }
        }
        service.status = ServiceStatus::Running;
        Ok(())
    }

    /// Provisions the next ordinal (current replica count) end to end:
    /// node selection, volume creation, container deployment, readiness
    /// gate. Does not advance until the replica is `ready`.
    pub async fn provision_next(&self, service: &mut Service) -> Result<(), CoreError> {
        let ordinal = Ordinal::new(service.replicas.len() as u32);
        match self.provision_next_inner(service, ordinal).await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::error!(service_id = %service.id, %ordinal, error = %err, "provisioning failed");
                service.status = ServiceStatus::Failed;
                Err(err.into_provisioning_error())
            }
        }
    }

    async fn provision_next_inner(&self, service: &mut Service, ordinal: Ordinal) -> Result<(), ReconcilerError> {
        let candidates = self.scheduler.list_candidates().await?;
        let used_node_ids: HashSet<&str> = service.used_node_ids().into_iter().collect();
        let required_tee = required_tee_platform(service);
        let image = format!("{}:{}", service.spec.image, service.spec.tag);

        let node = select_node(&candidates, &service.spec.hardware, required_tee, &image, &used_node_ids)
            .ok_or(statefuld_placement::PlacementError::NoSuitableNode(ordinal))?
            .clone();

        let pod = pod_name(service.name.as_str(), ordinal);
        let dns = internal_dns(&pod, service.name.as_str(), service.namespace.as_str(), &self.settings.dns_zone);
        let role = initial_role(service, ordinal);

        let mut replica = Replica::new_pending(ordinal, pod.clone(), dns, role);
        replica.node_id = Some(node.id.clone());
        replica.node_address = Some(node.address.clone());
        replica.status = ReplicaStatus::Provisioning;
        if role == ReplicaRole::MpcParty && service.spec.mpc.as_ref().is_some_and(|m| ordinal.get() < m.total_parties) {
            replica.mpc_party_id = Some(ordinal.get());
        }

        for volume in &service.spec.volumes {
            let path = volume_path(&self.settings.data_root, service.id, &pod, &volume.name);
            let binding = statefuld_placement::create_volume(
                self.agent.as_ref(),
                &node.address,
                ordinal,
                &volume.name,
                &path,
                volume.size_mb,
                volume.tier,
            )
            .await?;
            replica.volume_bindings.push(binding);
        }

        let env_vars = env::build_environment(service, &replica, &self.settings.dns_zone);
        let request = build_container_request(service, &replica, &env_vars);
        let response = self
            .agent
            .create_container(&node.address, request)
            .await
            .map_err(|source| ReconcilerError::ContainerDeployFailed(ordinal, source))?;

        replica.endpoint = Some(response.endpoint);
        replica.instance_id = Some(uuid::Uuid::new_v4().to_string());
        replica.status = ReplicaStatus::Running;

        service.replicas.push(replica);

        self.wait_for_readiness(service, ordinal, self.settings.readiness_timeout).await?;
        Ok(())
    }

    /// Polls `readinessCheck` (falling back to `healthCheck`) at the
    /// declared cadence until a single positive response, or the deadline
    /// elapses, with a hard 120s ceiling.
    async fn wait_for_readiness(
        &self,
        service: &mut Service,
        ordinal: Ordinal,
        deadline: Duration,
    ) -> Result<(), ReconcilerError> {
        let (path, port, period, initial_delay) = match &service.spec.readiness {
            Some(readiness) => (
                readiness.path.clone(),
                readiness.port,
                Duration::from_secs(u64::from(readiness.period_seconds)),
                Duration::from_secs(u64::from(readiness.initial_delay_seconds)),
            ),
            None => (
                service.spec.health_check.path.clone(),
                service.spec.health_check.port,
                Duration::from_secs(u64::from(service.spec.health_check.interval_seconds)),
                Duration::ZERO,
            ),
        };
        let probe_timeout = Duration::from_secs(u64::from(service.spec.health_check.timeout_seconds));
        let endpoint = service
            .replica(ordinal)
            .and_then(|r| r.endpoint.clone())
            .unwrap_or_default();
        let _ = port; // the node-agent contract addresses replicas by endpoint, not port

        if !initial_delay.is_zero() {
            tokio::time::sleep(initial_delay).await;
        }

        let agent = self.agent.clone();
        let result = tokio::time::timeout(deadline, async {
            loop {
                if agent.probe(&endpoint, &path, probe_timeout).await.unwrap_or(false) {
                    return;
                }
                tokio::time::sleep(period).await;
            }
        })
        .await;

        match result {
            Ok(()) => {
                let now = Utc::now();
                if let Some(replica) = service.replica_mut(ordinal) {
                    replica.status = ReplicaStatus::Ready;
                    replica.became_ready_at = Some(now);
                    replica.health_status = statefuld_types::HealthStatus::Healthy;
                    replica.last_health_check = Some(now);
                }
                Ok(())
            }
            Err(_) => Err(ReconcilerError::ReadinessTimeout(ordinal)),
        }
    }

    /// Pops the highest ordinal: marks `terminating`, best-effort stops
    /// the container, best-effort snapshots any `ipfsPin` volumes, then
    /// removes the record. Errors are logged, never propagated — scale-down
    /// is best-effort throughout.
    async fn terminate_last(&self, service: &mut Service) {
        let Some(replica) = service.replicas.last_mut() else {
            return;
        };
        replica.status = ReplicaStatus::Terminating;
        let ordinal = replica.ordinal;
        let node_address = replica.node_address.clone();
        let instance_id = replica.instance_id.clone();

        if let (Some(address), Some(instance)) = (&node_address, &instance_id) {
            if let Err(err) = self.agent.stop_container(address, instance).await {
                tracing::warn!(service_id = %service.id, %ordinal, error = %err, "best-effort container stop failed");
            }
        }

        if let Some(address) = &node_address {
            let backup_enabled: HashSet<String> = service
                .spec
                .volumes
                .iter()
                .filter(|v| v.backup.ipfs_pin)
                .map(|v| v.name.clone())
                .collect();
            if let Some(replica) = service.replica_mut(ordinal) {
                for binding in &mut replica.volume_bindings {
                    if backup_enabled.contains(&binding.name) {
                        if let Err(err) =
                            statefuld_placement::snapshot_volume(self.agent.as_ref(), address, service.id, ordinal, binding)
                                .await
                        {
                            tracing::warn!(service_id = %service.id, %ordinal, volume = %binding.name, error = %err, "best-effort snapshot on scale-down failed");
                        }
                    }
                }
            }
        }

        service.replicas.pop();
    }

    /// Tears down every replica in strict reverse ordinal order, for the
    /// `Terminate` operation.
    pub async fn terminate_all(&self, service: &mut Service) {
        while !service.replicas.is_empty() {
            self.terminate_last(service).await;
        }
    }

    /// Recovers a single failed ordinal in place: volume paths, DNS name,
    /// and MPC party id are preserved; the node and container instance
    /// are replaced. Restores any volume with a prior snapshot before the
    /// readiness wait. On failure the service is left `degraded`; no
    /// automatic retry; an operator must call `Failover` explicitly.
    pub async fn recover(&self, service: &mut Service, ordinal: Ordinal) -> Result<(), CoreError> {
        match self.recover_inner(service, ordinal).await {
            Ok(()) => {
                if service.status == ServiceStatus::Degraded {
                    service.status = ServiceStatus::Running;
                }
                Ok(())
            }
            Err(err) => {
                service.status = ServiceStatus::Degraded;
                Err(err.into_recovery_error(ordinal))
            }
        }
    }

    async fn recover_inner(&self, service: &mut Service, ordinal: Ordinal) -> Result<(), ReconcilerError> {
        let Some(old) = service.replica(ordinal).cloned() else {
            return Err(ReconcilerError::RecoveryFailed(ordinal));
        };

        if let (Some(address), Some(instance)) = (&old.node_address, &old.instance_id) {
            if let Err(err) = self.agent.stop_container(address, instance).await {
                tracing::warn!(service_id = %service.id, %ordinal, error = %err, "best-effort stop of failed instance");
            }
        }

        let candidates = self.scheduler.list_candidates().await?;
        let used_node_ids: HashSet<&str> = service.used_node_ids().into_iter().collect();
        let required_tee = required_tee_platform(service);
        let image = format!("{}:{}", service.spec.image, service.spec.tag);
        let node = select_node(&candidates, &service.spec.hardware, required_tee, &image, &used_node_ids)
            .ok_or(statefuld_placement::PlacementError::NoSuitableNode(ordinal))?
            .clone();

        let mut replica = old;
        replica.node_id = Some(node.id.clone());
        replica.node_address = Some(node.address.clone());
        replica.status = ReplicaStatus::Provisioning;
        replica.health_status = statefuld_types::HealthStatus::Unknown;

        for binding in &replica.volume_bindings {
            if binding.snapshot_ref.is_some() {
                statefuld_placement::restore_volume(self.agent.as_ref(), &node.address, ordinal, binding).await?;
            }
        }

        let env_vars = env::build_environment(service, &replica, &self.settings.dns_zone);
        let request = build_container_request(service, &replica, &env_vars);
        let response = self
            .agent
            .create_container(&node.address, request)
            .await
            .map_err(|source| ReconcilerError::ContainerDeployFailed(ordinal, source))?;
        replica.endpoint = Some(response.endpoint);
        replica.instance_id = Some(uuid::Uuid::new_v4().to_string());
        replica.status = ReplicaStatus::Running;

        if let Some(slot) = service.replica_mut(ordinal) {
            *slot = replica;
        }

        self.wait_for_readiness(service, ordinal, self.settings.recovery_timeout).await?;
        Ok(())
    }
}

fn required_tee_platform(service: &Service) -> Option<TeePlatform> {
    if service.spec.hardware.tee_platform != TeePlatform::None {
        return Some(service.spec.hardware.tee_platform);
    }
    if let Some(mpc) = &service.spec.mpc {
        if mpc.enabled && mpc.tee_required {
            return mpc.tee_platform;
        }
    }
    None
}

/// First replica becomes `leader` when consensus is in play and MPC is
/// not enabled; MPC-enabled services make every replica an `mpc-party`;
/// otherwise replicas after the first are `follower`.
fn initial_role(service: &Service, ordinal: Ordinal) -> ReplicaRole {
    let mpc_enabled = service.spec.mpc.as_ref().is_some_and(|m| m.enabled);
    if mpc_enabled {
        ReplicaRole::MpcParty
    } else if ordinal.get() == 0 {
        ReplicaRole::Leader
    } else {
        ReplicaRole::Follower
    }
}

fn build_container_request(service: &Service, replica: &Replica, env: &[String]) -> CreateContainerRequest {
    let mut exposed_ports = std::collections::HashMap::new();
    for port in &service.spec.ports {
        let proto = match port.protocol {
            statefuld_types::PortProtocol::Tcp => "tcp",
            statefuld_types::PortProtocol::Udp => "udp",
        };
        exposed_ports.insert(format!("{}/{proto}", port.container_port), serde_json::json!({}));
    }

    let binds = replica
        .volume_bindings
        .iter()
        .filter_map(|binding| {
            let volume_spec = service.spec.volumes.iter().find(|v| v.name == binding.name)?;
            Some(format!("{}:{}", binding.node_local_path, volume_spec.mount_path))
        })
        .collect();

    CreateContainerRequest {
        image: format!("{}:{}", service.spec.image, service.spec.tag),
        cmd: service.spec.command.iter().chain(service.spec.args.iter()).cloned().collect(),
        env: env.to_vec(),
        exposed_ports,
        host_config: HostConfig { binds },
        labels: service.spec.labels.clone(),
        hostname: replica.pod_name.clone(),
    }
}
