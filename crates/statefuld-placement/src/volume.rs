use chrono::Utc;
use statefuld_agent_client::{AgentClient, BackupVolumeRequest, CreateVolumeRequest, RestoreVolumeRequest};
use statefuld_types::{Ordinal, ServiceId, VolumeBinding, VolumeTier};

use crate::error::PlacementError;

fn tier_str(tier: VolumeTier) -> &'static str {
    match tier {
        VolumeTier::Ssd => "ssd",
        VolumeTier::Nvme => "nvme",
        VolumeTier::IpfsBacked => "ipfs-backed",
    }
}

/// Requests volume creation at the deterministic path. Failure aborts
/// provisioning.
pub async fn create_volume(
    agent: &dyn AgentClient,
    node_address: &str,
    ordinal: Ordinal,
    volume_name: &str,
    path: &str,
    size_mb: u64,
    tier: VolumeTier,
) -> Result<VolumeBinding, PlacementError> {
    agent
        .create_volume(
            node_address,
            CreateVolumeRequest {
                path: path.to_string(),
                size_mb,
                tier: tier_str(tier).to_string(),
            },
        )
        .await
        .map_err(|source| PlacementError::VolumeCreateFailed {
            ordinal,
            volume: volume_name.to_string(),
            source,
        })?;
    Ok(VolumeBinding::new(volume_name, path))
}

/// Requests a content-addressed snapshot. Best-effort: errors are logged
/// and returned to the caller, which must not propagate them as a fatal
/// failure of the enclosing operation.
pub async fn snapshot_volume(
    agent: &dyn AgentClient,
    node_address: &str,
    service_id: ServiceId,
    ordinal: Ordinal,
    binding: &mut VolumeBinding,
) -> Result<(), statefuld_agent_client::AgentError> {
    let response = agent
        .backup_volume(
            node_address,
            BackupVolumeRequest {
                path: binding.node_local_path.clone(),
                service_id: service_id.to_string(),
                replica_ordinal: ordinal.get(),
                volume_name: binding.name.clone(),
            },
        )
        .await?;
    binding.snapshot_ref = Some(response.cid);
    binding.last_backup_at = Some(Utc::now());
    Ok(())
}

/// Requests a restore from a content-addressed handle before the
/// container starts reading its volumes. Failure aborts recovery.
pub async fn restore_volume(
    agent: &dyn AgentClient,
    node_address: &str,
    ordinal: Ordinal,
    binding: &VolumeBinding,
) -> Result<(), PlacementError> {
    let Some(cid) = binding.snapshot_ref.clone() else {
        return Ok(());
    };
    agent
        .restore_volume(
            node_address,
            RestoreVolumeRequest {
                path: binding.node_local_path.clone(),
                cid,
            },
        )
        .await
        .map_err(|source| PlacementError::RestoreFailed {
            ordinal,
            volume: binding.name.clone(),
            source,
        })
}
