//! C4 Cluster Coordinator: consensus leader election, MPC DKG bring-up,
//! and peer broadcast.
//!
//! A thin struct over an `AgentClient` handle with `tracing::info!`
//! lifecycle logging, tracking replicas by ordinal the way the health
//! and reconciler crates do. Every function here assumes the caller
//! already holds the per-service lock for the duration of the call.

mod election;
mod error;
mod mpc;

use std::sync::Arc;

use statefuld_agent_client::AgentClient;
use statefuld_types::{CoreError, Ordinal, Service};

pub use error::ClusterError;
pub use mpc::derive_cluster_id;

/// Coordinates consensus and MPC bring-up for services. Holds only an
/// `AgentClient` handle — all mutable cluster state lives on the
/// `Service` record itself, consistent with the registry owning the
/// single source of truth.
pub struct ClusterCoordinator {
    agent: Arc<dyn AgentClient>,
}

impl ClusterCoordinator {
    #[must_use]
    pub fn new(agent: Arc<dyn AgentClient>) -> Self {
        Self { agent }
    }

    /// Runs `electLeader`: quorum check, lowest-ordinal tie-break, epoch
    /// increment, best-effort broadcast.
    pub async fn elect_leader(&self, service: &mut Service) -> Result<Ordinal, CoreError> {
        tracing::info!(service_id = %service.id, "running leader election");
        let winner = election::elect_leader(&self.agent, service).await?;
        tracing::info!(service_id = %service.id, %winner, epoch = service.consensus_epoch, "leader elected");
        Ok(winner)
    }

    /// Initial consensus bring-up on first service creation: ordinal 0
    /// becomes leader at epoch 1. A no-op if consensus is not configured.
    pub async fn initial_bring_up(&self, service: &mut Service) {
        election::initial_bring_up(&self.agent, service).await;
    }

    /// Rebalances consensus state after a scaling operation: re-elects
    /// only if the previous leader was removed, then always broadcasts
    /// the new peer list.
    pub async fn rebalance_after_scaling(&self, service: &mut Service) -> Result<(), CoreError> {
        election::rebalance_after_scaling(&self.agent, service).await?;
        Ok(())
    }

    /// Runs MPC cluster bring-up (DKG) across the first `totalParties`
    /// ready replicas. A no-op if MPC is not enabled.
    pub async fn mpc_bring_up(&self, service: &mut Service) -> Result<(), CoreError> {
        tracing::info!(service_id = %service.id, "running MPC DKG bring-up");
        mpc::bring_up(&self.agent, service, chrono::Utc::now()).await?;
        tracing::info!(service_id = %service.id, cluster_id = ?service.mpc_cluster_id, "MPC DKG bring-up complete");
        Ok(())
    }

    /// Re-runs the full DKG sequence after a scaling operation.
    pub async fn mpc_update_after_scaling(&self, service: &mut Service) -> Result<(), CoreError> {
        mpc::update_after_scaling(&self.agent, service, chrono::Utc::now()).await?;
        Ok(())
    }

    /// Selects a reachable subset of at least `threshold` MPC parties
    /// for a caller to forward a signing request to; threshold signing
    /// itself is not re-implemented here.
    #[must_use]
    pub fn select_signing_subset(&self, service: &Service, threshold: u32) -> Option<Vec<String>> {
        mpc::select_signing_subset(service, threshold)
    }
}
