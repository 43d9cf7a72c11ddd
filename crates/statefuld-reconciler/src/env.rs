//! Builds the deployment environment for a replica's container: the
//! declared `spec.env` merged with identity, MPC, and consensus variables.

use statefuld_types::{internal_dns, pod_name, Ordinal, Replica, ReplicaRole, Service};

fn role_str(role: ReplicaRole) -> &'static str {
    match role {
        ReplicaRole::Leader => "leader",
        ReplicaRole::Follower => "follower",
        ReplicaRole::Candidate => "candidate",
        ReplicaRole::MpcParty => "mpc-party",
    }
}

/// `CONSENSUS_PEERS` lists every other replica's internal DNS name, even
/// ones not yet provisioned — the name is a pure function of `(name,
/// namespace, ordinal, zone)`, so it is known in advance.
fn peer_dns_names(service: &Service, ordinal: Ordinal, dns_zone: &str) -> Vec<String> {
    (0..service.spec.replicas)
        .filter(|&i| i != ordinal.get())
        .map(|i| {
            let peer_pod = pod_name(service.name.as_str(), Ordinal::new(i));
            internal_dns(&peer_pod, service.name.as_str(), service.namespace.as_str(), dns_zone)
        })
        .collect()
}

/// Builds the `KEY=VALUE` environment pairs for a replica's container,
/// merging `spec.env` with identity, MPC, and consensus variables.
#[must_use]
pub fn build_environment(service: &Service, replica: &Replica, dns_zone: &str) -> Vec<String> {
    let mut env: Vec<String> = service.spec.env.iter().map(|(k, v)| format!("{k}={v}")).collect();

    env.push(format!("POD_NAME={}", replica.pod_name));
    env.push(format!("POD_ORDINAL={}", replica.ordinal));
    env.push(format!("SERVICE_NAME={}", service.name));
    env.push(format!("SERVICE_NAMESPACE={}", service.namespace));
    env.push(format!("REPLICA_COUNT={}", service.spec.replicas));
    env.push(format!("HEADLESS_SERVICE={}", service.headless_endpoint));
    env.push(format!("CLUSTER_SERVICE={}", service.cluster_endpoint));
    env.push(format!("NODE_ROLE={}", role_str(replica.role)));

    if let Some(mpc) = &service.spec.mpc {
        if mpc.enabled {
            env.push("MPC_ENABLED=true".to_string());
            if let Some(party_id) = replica.mpc_party_id {
                env.push(format!("MPC_PARTY_ID={party_id}"));
            }
            env.push(format!("MPC_THRESHOLD={}", mpc.threshold));
            env.push(format!("MPC_TOTAL_PARTIES={}", mpc.total_parties));
            if let Some(cluster_id) = &service.mpc_cluster_id {
                env.push(format!("MPC_CLUSTER_ID={cluster_id}"));
            }
        }
    }

    if let Some(consensus) = &service.spec.consensus {
        let protocol = match consensus.protocol {
            statefuld_types::ConsensusProtocol::Raft => "raft",
            statefuld_types::ConsensusProtocol::Paxos => "paxos",
            statefuld_types::ConsensusProtocol::Sqlit => "sqlit",
            statefuld_types::ConsensusProtocol::None => "none",
        };
        env.push(format!("CONSENSUS_PROTOCOL={protocol}"));
        let peers = peer_dns_names(service, replica.ordinal, dns_zone).join(",");
        env.push(format!("CONSENSUS_PEERS={peers}"));
        let min_quorum = consensus
            .min_quorum
            .unwrap_or_else(|| statefuld_types::quorum_required(service.spec.replicas as usize, None) as u32);
        env.push(format!("CONSENSUS_MIN_QUORUM={min_quorum}"));
        env.push(format!("CONSENSUS_ELECTION_TIMEOUT_MS={}", consensus.election_timeout_ms));
        env.push(format!("CONSENSUS_HEARTBEAT_INTERVAL_MS={}", consensus.heartbeat_interval_ms));
    }

    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use statefuld_types::{HealthCheckSpec, Name, Namespace, Owner, ReplicaStatus, ServiceSpec, ServiceStatus};
    use std::collections::HashMap;

    fn service_with(consensus: Option<statefuld_types::ConsensusSpec>, mpc: Option<statefuld_types::MpcSpec>) -> Service {
        Service {
            id: statefuld_types::ServiceId::derive("default", "db", Owner::try_from("a".repeat(40)).unwrap(), 1),
            owner: Owner::try_from("a".repeat(40)).unwrap(),
            namespace: Namespace::parse("default").unwrap(),
            name: Name::parse("db").unwrap(),
            spec: ServiceSpec {
                name: "db".to_string(),
                namespace: "default".to_string(),
                replicas: 3,
                image: "x/sql".to_string(),
                tag: "1".to_string(),
                command: vec![],
                args: vec![],
                env: HashMap::from([("FOO".to_string(), "bar".to_string())]),
                ports: vec![],
                hardware: statefuld_types::HardwareSpec {
                    cpu_cores: 2,
                    cpu_architecture: statefuld_types::CpuArchitecture::Amd64,
                    memory_mb: 2048,
                    storage_mb: 102_400,
                    storage_type: statefuld_types::StorageType::Ssd,
                    gpu_type: statefuld_types::GpuType::None,
                    gpu_count: 0,
                    network_bandwidth_mbps: 1000,
                    public_ip: false,
                    tee_platform: statefuld_types::TeePlatform::None,
                    region: None,
                },
                volumes: vec![],
                consensus,
                mpc,
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
            status: ServiceStatus::Creating,
            replicas: vec![],
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

    fn pending_replica(ordinal: u32, role: ReplicaRole) -> Replica {
        let mut r = Replica::new_pending(
            Ordinal::new(ordinal),
            format!("db-{ordinal}"),
            format!("db-{ordinal}.db.default.internal.cluster.local"),
            role,
        );
        r.status = ReplicaStatus::Provisioning;
        r
    }

    #[test]
    fn includes_identity_and_merged_env() {
        let service = service_with(None, None);
        let replica = pending_replica(0, ReplicaRole::Leader);
        let env = build_environment(&service, &replica, "cluster.local");
        assert!(env.contains(&"FOO=bar".to_string()));
        assert!(env.contains(&"POD_NAME=db-0".to_string()));
        assert!(env.contains(&"SERVICE_NAME=db".to_string()));
        assert!(env.contains(&"NODE_ROLE=leader".to_string()));
    }

    #[test]
    fn consensus_peers_excludes_self() {
        let consensus = statefuld_types::ConsensusSpec {
            protocol: statefuld_types::ConsensusProtocol::Raft,
            min_quorum: Some(2),
            election_timeout_ms: 5000,
            heartbeat_interval_ms: 500,
            snapshot_threshold: 10_000,
        };
        let service = service_with(Some(consensus), None);
        let replica = pending_replica(1, ReplicaRole::Follower);
        let env = build_environment(&service, &replica, "cluster.local");
        let peers_var = env.iter().find(|e| e.starts_with("CONSENSUS_PEERS=")).unwrap();
        assert!(!peers_var.contains("db-1.db.default"));
        assert!(peers_var.contains("db-0.db.default"));
        assert!(peers_var.contains("db-2.db.default"));
    }

    #[test]
    fn mpc_vars_present_only_when_enabled() {
        let mpc = statefuld_types::MpcSpec {
            enabled: true,
            threshold: 2,
            total_parties: 3,
            tee_required: false,
            tee_platform: None,
            key_rotation_interval_ms: 86_400_000,
        };
        let service = service_with(None, Some(mpc));
        let mut replica = pending_replica(0, ReplicaRole::MpcParty);
        replica.mpc_party_id = Some(0);
        let env = build_environment(&service, &replica, "cluster.local");
        assert!(env.contains(&"MPC_ENABLED=true".to_string()));
        assert!(env.contains(&"MPC_PARTY_ID=0".to_string()));
        assert!(env.contains(&"MPC_TOTAL_PARTIES=3".to_string()));
    }
}
