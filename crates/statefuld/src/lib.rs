//! Facade crate: wires the Service Registry (C1), Placement & Volume
//! Planner (C3), Reconciler (C2), Cluster Coordinator (C4), and Health &
//! Backup Loops (C5) behind the Core API.
//!
//! [`CoreApi`] owns no state of its own beyond the registry and the
//! per-service background-loop handles; every mutation it exposes takes
//! the relevant service's per-service lock (the `tokio::sync::Mutex<Service>`
//! a [`ServiceHandle`] wraps) for the duration of the operation. The
//! registry mutex inside [`ServiceRegistry`] is always acquired and
//! released strictly outside of that lock.

mod observability;

use std::collections::HashMap;
use std::sync::Arc;

use statefuld_agent_client::AgentClient;
use statefuld_cluster::ClusterCoordinator;
use statefuld_config::StatefuldConfig;
use statefuld_health::{LoopSettings, ServiceLoops};
use statefuld_placement::NodeScheduler;
use statefuld_reconciler::{Reconciler, ReconcilerSettings};
use statefuld_registry::ServiceRegistry;
use statefuld_types::{CoreError, Name, Namespace, Ordinal, Owner, Replica, Service, ServiceId, ServiceSpec, ServiceStatus};
use tokio::sync::Mutex;

pub use observability::init_tracing;
pub use statefuld_types as types;

/// The Core API: `Create`, `Get`, `GetByName`, `ListByOwner`, `Scale`,
/// `Failover`, `ElectLeader`, `GetLeader`, `Terminate`.
///
/// Holds `Arc`s to each component so it can be cheaply cloned and shared
/// across tasks (e.g. an HTTP handler per request), in the style of an
/// `Arc<RwLock<_>>`-backed services layer.
pub struct CoreApi {
    registry: Arc<ServiceRegistry>,
    reconciler: Arc<Reconciler>,
    cluster: Arc<ClusterCoordinator>,
    agent: Arc<dyn AgentClient>,
    loop_settings: LoopSettings,
    loops: Mutex<HashMap<ServiceId, ServiceLoops>>,
}

impl CoreApi {
    /// Builds the facade from its external collaborators (node-agent
    /// client, node scheduler) and a loaded [`StatefuldConfig`].
    #[must_use]
    pub fn new(agent: Arc<dyn AgentClient>, scheduler: Arc<dyn NodeScheduler>, config: &StatefuldConfig) -> Self {
        let registry = Arc::new(ServiceRegistry::new(config.cluster.dns_zone.clone()));
        let reconciler_settings = ReconcilerSettings {
            data_root: config.storage.data_root.clone(),
            dns_zone: config.cluster.dns_zone.clone(),
            readiness_timeout: std::time::Duration::from_secs(u64::from(config.reconciler.readiness_timeout_seconds)),
            recovery_timeout: std::time::Duration::from_secs(u64::from(config.reconciler.recovery_timeout_seconds)),
        };
        let reconciler = Arc::new(Reconciler::new(agent.clone(), scheduler, reconciler_settings));
        let cluster = Arc::new(ClusterCoordinator::new(agent.clone()));
        let loop_settings = LoopSettings {
            min_health_interval: std::time::Duration::from_secs(u64::from(config.health.minimum_interval_seconds)),
            min_backup_interval: std::time::Duration::from_secs(u64::from(config.backup.minimum_interval_seconds)),
        };
        Self {
            registry,
            reconciler,
            cluster,
            agent,
            loop_settings,
            loops: Mutex::new(HashMap::new()),
        }
    }

    /// `Create`: registers the service, then drives ordered provisioning
    /// of every declared replica one at a time, initial consensus/MPC
    /// bring-up, and arms the health and backup loops. On any
    /// provisioning failure the service remains registered in `failed`
    /// status and no loops are armed.
    pub async fn create(&self, owner: Owner, spec: ServiceSpec) -> Result<Service, CoreError> {
        let target = spec.replicas;
        let handle = self.registry.create(owner, spec).await?;

        {
            let mut guard = handle.lock().await;
            for _ in 0..target {
                self.reconciler.provision_next(&mut guard).await?;
            }

            if guard.spec.consensus.is_some() {
                self.cluster.initial_bring_up(&mut guard).await;
            }
            self.cluster.mpc_bring_up(&mut guard).await?;

            guard.status = ServiceStatus::Running;
            tracing::info!(service_id = %guard.id, replicas = guard.replicas.len(), "service ready");
        }

        self.arm_loops(handle.clone()).await;
        Ok(handle.lock().await.clone())
    }

    /// `Get`: returns a snapshot of the service, or `None` if unknown.
    pub async fn get(&self, id: ServiceId) -> Option<Service> {
        let handle = self.registry.get(id).await?;
        Some(handle.lock().await.clone())
    }

    /// `GetByName`: `(namespace, name)` lookup.
    pub async fn get_by_name(&self, namespace: &Namespace, name: &Name) -> Option<Service> {
        let handle = self.registry.get_by_name(namespace, name).await?;
        Some(handle.lock().await.clone())
    }

    /// `ListByOwner`.
    pub async fn list_by_owner(&self, owner: Owner) -> Vec<Service> {
        let handles = self.registry.list_by_owner(owner).await;
        let mut services = Vec::with_capacity(handles.len());
        for handle in handles {
            services.push(handle.lock().await.clone());
        }
        services
    }

    /// `Scale`: re-enters the reconciler to grow or shrink the replica
    /// set, then rebalances consensus and (if enabled) re-runs MPC
    /// bring-up, but only when the target actually differs from the
    /// current count — a no-op scale call has no observable side
    /// effects.
    pub async fn scale(&self, id: ServiceId, caller: Owner, replica_count: u32) -> Result<(), CoreError> {
        let handle = self.get_handle(id).await?;
        let mut guard = handle.lock().await;
        check_owner(&guard, caller)?;

        let previous_count = guard.replicas.len() as u32;
        self.reconciler.scale(&mut guard, replica_count).await?;

        if previous_count != replica_count {
            if guard.spec.consensus.is_some() {
                self.cluster.rebalance_after_scaling(&mut guard).await?;
            }
            if guard.spec.mpc.as_ref().is_some_and(|mpc| mpc.enabled) {
                self.cluster.mpc_update_after_scaling(&mut guard).await?;
            }
        }
        Ok(())
    }

    /// `Failover`: recovers a single ordinal in place (terminate, then
    /// re-provision at the same ordinal, restoring from snapshot if one
    /// exists). Forces a re-election if consensus is enabled and the
    /// current leader is no longer healthy and ready.
    pub async fn failover(&self, id: ServiceId, ordinal: Ordinal) -> Result<(), CoreError> {
        let handle = self.get_handle(id).await?;
        let mut guard = handle.lock().await;
        self.reconciler.recover(&mut guard, ordinal).await?;

        if guard.spec.consensus.is_some() {
            let leader_healthy = guard
                .current_leader
                .is_some_and(|leader| guard.replica(leader).is_some_and(statefuld_types::Replica::is_healthy_and_ready));
            if !leader_healthy {
                self.cluster.elect_leader(&mut guard).await?;
            }
        }
        Ok(())
    }

    /// `ElectLeader`: explicit operator-triggered re-election.
    pub async fn elect_leader(&self, id: ServiceId) -> Result<Ordinal, CoreError> {
        let handle = self.get_handle(id).await?;
        let mut guard = handle.lock().await;
        self.cluster.elect_leader(&mut guard).await
    }

    /// `GetLeader`: the current leader's replica record, if any. Returns
    /// `None` for both "service unknown" and "no leader elected" — the
    /// Core API table lists no error for this operation.
    pub async fn get_leader(&self, id: ServiceId) -> Option<Replica> {
        let handle = self.registry.get(id).await?;
        let guard = handle.lock().await;
        guard.leader_replica().cloned()
    }

    /// `Terminate`: stops the health and backup loops, tears down every
    /// replica in strict reverse ordinal order, and removes the service
    /// from the registry. A second call fails with `NotFound`.
    pub async fn terminate(&self, id: ServiceId, caller: Owner) -> Result<(), CoreError> {
        let handle = self.registry.terminate(id, caller).await?;

        if let Some(loops) = self.loops.lock().await.remove(&id) {
            loops.shutdown().await;
        }

        let mut guard = handle.lock().await;
        self.reconciler.terminate_all(&mut guard).await;
        guard.status = ServiceStatus::Terminated;
        tracing::info!(service_id = %id, "service terminated");
        Ok(())
    }

    async fn get_handle(&self, id: ServiceId) -> Result<statefuld_registry::ServiceHandle, CoreError> {
        self.registry.get(id).await.ok_or(CoreError::NotFound(id))
    }

    async fn arm_loops(&self, handle: statefuld_registry::ServiceHandle) {
        let id = handle.lock().await.id;
        let loops = ServiceLoops::spawn(handle, self.agent.clone(), self.cluster.clone(), self.loop_settings);
        self.loops.lock().await.insert(id, loops);
    }
}

fn check_owner(service: &Service, caller: Owner) -> Result<(), CoreError> {
    if service.owner == caller {
        Ok(())
    } else {
        Err(CoreError::Forbidden(service.id))
    }
}
