//! MPC cluster bring-up: distributed key generation across the first
//! `totalParties` replicas.

use std::sync::Arc;

use statefuld_agent_client::{AgentClient, DkgFinalizeRequest, DkgInitRequest, DkgParty};
use statefuld_types::Service;

use crate::error::ClusterError;

/// Derives `mpcClusterId` deterministically from `(serviceId, now)`,
/// hashed with the same primitive `ServiceId` uses for its own derivation.
#[must_use]
pub fn derive_cluster_id(service: &Service, now: chrono::DateTime<chrono::Utc>) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(service.id.to_string().as_bytes());
    hasher.update(&now.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
    hasher.finalize().to_hex()[..16].to_string()
}

/// Runs the full DKG sequence: precondition check, per-party `dkg/init`
/// (first failure aborts), then `dkg/finalize` from party 0. Stores the
/// cluster id, each party's public key, and the aggregated threshold
/// public key on `service`. Assumes the caller holds the per-service
/// lock.
pub async fn bring_up(agent: &Arc<dyn AgentClient>, service: &mut Service, now: chrono::DateTime<chrono::Utc>) -> Result<(), ClusterError> {
    let Some(mpc) = service.spec.mpc.clone() else { return Ok(()) };
    if !mpc.enabled {
        return Ok(());
    }

    let ready: Vec<_> = service.replicas.iter().filter(|r| r.is_ready()).map(|r| r.ordinal).collect();
    if ready.len() < mpc.total_parties as usize {
        return Err(ClusterError::InsufficientParties { required: mpc.total_parties, ready: ready.len() });
    }

    let cluster_id = derive_cluster_id(service, now);
    let parties: Vec<DkgParty> = ready
        .iter()
        .take(mpc.total_parties as usize)
        .filter_map(|&ordinal| {
            let replica = service.replica(ordinal)?;
            Some(DkgParty { party_id: ordinal.get(), endpoint: replica.endpoint.clone()? })
        })
        .collect();

    for &ordinal in ready.iter().take(mpc.total_parties as usize) {
        let Some(endpoint) = service.replica(ordinal).and_then(|r| r.endpoint.clone()) else { continue };
        let request = DkgInitRequest {
            cluster_id: cluster_id.clone(),
            threshold: mpc.threshold,
            total_parties: mpc.total_parties,
            party_id: ordinal.get(),
            parties: parties.clone(),
        };
        let response = agent
            .dkg_init(&endpoint, request)
            .await
            .map_err(|err| ClusterError::DkgFailed(ordinal, err))?;
        if let Some(replica) = service.replica_mut(ordinal) {
            replica.mpc_party_id = Some(ordinal.get());
            replica.mpc_public_key = Some(response.public_key);
        }
    }

    let party_zero_endpoint = ready
        .first()
        .and_then(|&ordinal| service.replica(ordinal))
        .and_then(|r| r.endpoint.clone())
        .unwrap_or_default();
    let finalize = agent
        .dkg_finalize(&party_zero_endpoint, DkgFinalizeRequest { cluster_id: cluster_id.clone() })
        .await
        .map_err(ClusterError::DkgFinalizeFailed)?;

    service.mpc_cluster_id = Some(cluster_id);
    service.mpc_threshold_public_key = Some(finalize.threshold_public_key);
    Ok(())
}

/// Re-runs the full DKG sequence after scaling — a simple re-run policy;
/// proactive secret sharing is out of scope.
pub async fn update_after_scaling(agent: &Arc<dyn AgentClient>, service: &mut Service, now: chrono::DateTime<chrono::Utc>) -> Result<(), ClusterError> {
    bring_up(agent, service, now).await
}

/// Selects a reachable subset of at least `threshold` MPC parties for
/// the caller to forward a signing request to. The coordinator does not
/// re-implement threshold signing itself.
#[must_use]
pub fn select_signing_subset(service: &Service, threshold: u32) -> Option<Vec<String>> {
    let endpoints: Vec<String> = service
        .replicas
        .iter()
        .filter(|r| r.mpc_party_id.is_some() && r.is_healthy_and_ready())
        .filter_map(|r| r.endpoint.clone())
        .collect();
    if endpoints.len() < threshold as usize {
        return None;
    }
    Some(endpoints.into_iter().take(threshold as usize).collect())
}
