//! Consensus leader election and peer broadcast.

use std::sync::Arc;

use chrono::Utc;
use statefuld_agent_client::{AgentClient, LeaderChangeRequest, PeerInfo, PeerUpdateRequest};
use statefuld_types::{quorum_required, Ordinal, Replica, ReplicaRole, Service};

use crate::error::ClusterError;

/// Runs `electLeader`: picks the lowest-ordinal ready+healthy replica,
/// assigns roles, advances `consensusEpoch`, and best-effort broadcasts
/// the change. Assumes the caller already holds the per-service lock.
pub async fn elect_leader(agent: &Arc<dyn AgentClient>, service: &mut Service) -> Result<Ordinal, ClusterError> {
    let required = quorum_required(
        service.spec.replicas as usize,
        service.spec.consensus.as_ref().and_then(|c| c.min_quorum),
    );
    let mut candidates: Vec<Ordinal> = service
        .replicas
        .iter()
        .filter(|r| r.is_healthy_and_ready())
        .map(|r| r.ordinal)
        .collect();
    candidates.sort();

    if candidates.len() < required {
        return Err(ClusterError::QuorumLost { healthy: candidates.len(), required });
    }
    let winner = candidates[0];

    for replica in &mut service.replicas {
        replica.role = if replica.ordinal == winner { ReplicaRole::Leader } else { ReplicaRole::Follower };
    }
    service.current_leader = Some(winner);
    service.last_election_at = Some(Utc::now());
    service.consensus_epoch += 1;

    broadcast_leader_change(agent, service).await;
    Ok(winner)
}

/// Best-effort `leader-change` broadcast to every replica. Failures are
/// logged and never roll back the election.
pub async fn broadcast_leader_change(agent: &Arc<dyn AgentClient>, service: &Service) {
    let Some(leader_ordinal) = service.current_leader else { return };
    let Some(leader) = service.replica(leader_ordinal) else { return };
    let Some(leader_endpoint) = leader.endpoint.clone() else { return };

    let request = LeaderChangeRequest {
        epoch: service.consensus_epoch,
        leader_id: leader_ordinal.get(),
        leader_endpoint,
    };

    for replica in &service.replicas {
        let Some(endpoint) = &replica.endpoint else { continue };
        if let Err(err) = agent.leader_change(endpoint, request.clone()).await {
            tracing::warn!(
                service_id = %service.id,
                ordinal = %replica.ordinal,
                error = %err,
                "best-effort leader-change broadcast failed"
            );
        }
    }
}

/// Best-effort broadcast of the full peer list (`{ordinal, endpoint,
/// role}`) at the current epoch, used after a rebalance.
pub async fn broadcast_peer_update(agent: &Arc<dyn AgentClient>, service: &Service) {
    let peers: Vec<PeerInfo> = service
        .replicas
        .iter()
        .filter_map(|r| {
            Some(PeerInfo {
                ordinal: r.ordinal.get(),
                endpoint: r.endpoint.clone()?,
                role: role_str(r.role).to_string(),
            })
        })
        .collect();
    let request = PeerUpdateRequest { peers, epoch: service.consensus_epoch };

    for replica in &service.replicas {
        let Some(endpoint) = &replica.endpoint else { continue };
        if let Err(err) = agent.peer_update(endpoint, request.clone()).await {
            tracing::warn!(
                service_id = %service.id,
                ordinal = %replica.ordinal,
                error = %err,
                "best-effort peer-update broadcast failed"
            );
        }
    }
}

/// Initial consensus bring-up on first service creation: ordinal 0 is
/// leader, epoch 1, broadcast.
pub async fn initial_bring_up(agent: &Arc<dyn AgentClient>, service: &mut Service) {
    if service.spec.consensus.is_none() || service.replicas.is_empty() {
        return;
    }
    for replica in &mut service.replicas {
        replica.role = if replica.ordinal.get() == 0 { ReplicaRole::Leader } else { ReplicaRole::Follower };
    }
    service.current_leader = Some(Ordinal::new(0));
    service.consensus_epoch = 1;
    service.last_election_at = Some(Utc::now());
    broadcast_leader_change(agent, service).await;
}

/// Rebalances after a scaling operation: re-elects if the previous
/// leader was removed, then always broadcasts the new peer list.
pub async fn rebalance_after_scaling(agent: &Arc<dyn AgentClient>, service: &mut Service) -> Result<(), ClusterError> {
    if service.spec.consensus.is_none() {
        return Ok(());
    }
    let leader_still_present = service.current_leader.is_some_and(|ordinal| service.replica(ordinal).is_some());
    if !leader_still_present {
        elect_leader(agent, service).await?;
    }
    broadcast_peer_update(agent, service).await;
    Ok(())
}

fn role_str(role: ReplicaRole) -> &'static str {
    match role {
        ReplicaRole::Leader => "leader",
        ReplicaRole::Follower => "follower",
        ReplicaRole::Candidate => "candidate",
        ReplicaRole::MpcParty => "mpc-party",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use statefuld_agent_client::FakeAgentClient;
    use statefuld_types::{
        ConsensusProtocol, ConsensusSpec, CpuArchitecture, GpuType, HardwareSpec, HealthCheckSpec, HealthStatus,
        Name, Namespace, Owner, ReplicaStatus, ServiceId, ServiceSpec, ServiceStatus, StorageType, TeePlatform,
    };

    use super::*;

    fn service(replicas: u32, consensus: bool) -> Service {
        let owner = Owner::try_from("a".repeat(40)).unwrap();
        Service {
            id: ServiceId::derive("default", "db", owner, 1),
            owner,
            namespace: Namespace::parse("default").unwrap(),
            name: Name::parse("db").unwrap(),
            spec: ServiceSpec {
                name: "db".to_string(),
                namespace: "default".to_string(),
                replicas,
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
                volumes: vec![],
                consensus: consensus.then(|| ConsensusSpec {
                    protocol: ConsensusProtocol::Raft,
                    min_quorum: None,
                    election_timeout_ms: 5000,
                    heartbeat_interval_ms: 500,
                    snapshot_threshold: 10_000,
                }),
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
        }
    }

    fn ready_replica(ordinal: u32, healthy: bool) -> Replica {
        let mut r = Replica::new_pending(Ordinal::new(ordinal), format!("db-{ordinal}"), format!("db-{ordinal}.db.default.internal.cluster.local"), ReplicaRole::Follower);
        r.status = ReplicaStatus::Ready;
        r.health_status = if healthy { HealthStatus::Healthy } else { HealthStatus::Unhealthy };
        r.endpoint = Some(format!("http://node-{ordinal}:9000"));
        r
    }

    #[tokio::test]
    async fn elects_lowest_healthy_ordinal() {
        let mut svc = service(3, true);
        svc.replicas = vec![ready_replica(0, false), ready_replica(1, true), ready_replica(2, true)];
        let agent: Arc<dyn AgentClient> = Arc::new(FakeAgentClient::new());
        let winner = elect_leader(&agent, &mut svc).await.unwrap();
        assert_eq!(winner, Ordinal::new(1));
        assert_eq!(svc.current_leader, Some(Ordinal::new(1)));
        assert_eq!(svc.consensus_epoch, 1);
        assert_eq!(svc.replica(Ordinal::new(1)).unwrap().role, ReplicaRole::Leader);
        assert_eq!(svc.replica(Ordinal::new(2)).unwrap().role, ReplicaRole::Follower);
    }

    #[tokio::test]
    async fn fails_when_quorum_not_met() {
        let mut svc = service(3, true);
        svc.replicas = vec![ready_replica(0, false), ready_replica(1, false), ready_replica(2, true)];
        let agent: Arc<dyn AgentClient> = Arc::new(FakeAgentClient::new());
        let err = elect_leader(&agent, &mut svc).await.unwrap_err();
        assert!(matches!(err, ClusterError::QuorumLost { healthy: 1, required: 2 }));
    }

    #[tokio::test]
    async fn initial_bring_up_sets_ordinal_zero_leader_epoch_one() {
        let mut svc = service(3, true);
        svc.replicas = vec![ready_replica(0, true), ready_replica(1, true), ready_replica(2, true)];
        let agent: Arc<dyn AgentClient> = Arc::new(FakeAgentClient::new());
        initial_bring_up(&agent, &mut svc).await;
        assert_eq!(svc.current_leader, Some(Ordinal::new(0)));
        assert_eq!(svc.consensus_epoch, 1);
        assert_eq!(svc.replica(Ordinal::new(0)).unwrap().role, ReplicaRole::Leader);
    }

    #[tokio::test]
    async fn rebalance_reelects_when_leader_removed() {
        let mut svc = service(2, true);
        svc.replicas = vec![ready_replica(0, true), ready_replica(1, true)];
        svc.current_leader = Some(Ordinal::new(5));
        let agent: Arc<dyn AgentClient> = Arc::new(FakeAgentClient::new());
        rebalance_after_scaling(&agent, &mut svc).await.unwrap();
        assert_eq!(svc.current_leader, Some(Ordinal::new(0)));
    }
}
