use crate::ids::{Ordinal, ServiceId};

/// The unified error taxonomy exposed across the Core API boundary.
///
/// Mirrors the values (not type names) enumerated by the error handling
/// design: caller errors are surfaced as-is, node-side provisioning
/// failures are wrapped in [`CoreError::ProvisioningFailed`], and
/// best-effort failures (`BroadcastFailed`, backup failures) are logged at
/// their call site rather than returned to the caller — they are kept in
/// this enum only so internal call sites and tests have a single error
/// type to construct and match on.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    #[error("service {namespace}/{name} already exists")]
    AlreadyExists { namespace: String, name: String },

    #[error("service {0} not found")]
    NotFound(ServiceId),

    #[error("caller is not the owner of service {0}")]
    Forbidden(ServiceId),

    #[error("no node satisfies the placement requirements for ordinal {0}")]
    NoSuitableNode(Ordinal),

    #[error("node agent failed to create volume {volume} for ordinal {ordinal}")]
    VolumeCreateFailed { ordinal: Ordinal, volume: String },

    #[error("node agent failed to deploy container for ordinal {0}")]
    ContainerDeployFailed(Ordinal),

    #[error("replica {0} did not become ready within the readiness deadline")]
    ReadinessTimeout(Ordinal),

    #[error("quorum lost: {healthy} healthy replicas, {required} required")]
    QuorumLost { healthy: usize, required: usize },

    #[error("MPC DKG bring-up failed at party {0}")]
    DkgFailed(Ordinal),

    #[error("MPC requires {required} ready parties, only {ready} are ready")]
    InsufficientParties { required: u32, ready: usize },

    /// Best-effort: logged and swallowed by the caller, never propagated
    /// past the broadcast call site.
    #[error("broadcast to replica {0} failed")]
    BroadcastFailed(Ordinal),

    #[error("backup of volume {volume} on ordinal {ordinal} failed")]
    BackupFailed { ordinal: Ordinal, volume: String },

    #[error("restore of volume {volume} on ordinal {ordinal} failed")]
    RestoreFailed { ordinal: Ordinal, volume: String },

    #[error("recovery of ordinal {0} did not complete; service is degraded")]
    RecoveryFailed(Ordinal),

    /// Wraps `NoSuitableNode` / `VolumeCreateFailed` / `ContainerDeployFailed`
    /// / `ReadinessTimeout` per the propagation policy: any of those during
    /// provisioning surfaces to the caller as `ProvisioningFailed` and
    /// transitions the service to `failed`.
    #[error("provisioning failed: {0}")]
    ProvisioningFailed(Box<CoreError>),
}

impl CoreError {
    /// True for errors that should transition the owning service to
    /// `failed`/`degraded` rather than merely being surfaced to the caller.
    #[must_use]
    pub fn is_fatal_to_service(&self) -> bool {
        matches!(
            self,
            CoreError::NoSuitableNode(_)
                | CoreError::VolumeCreateFailed { .. }
                | CoreError::ContainerDeployFailed(_)
                | CoreError::ReadinessTimeout(_)
                | CoreError::ProvisioningFailed(_)
                | CoreError::DkgFailed(_)
                | CoreError::InsufficientParties { .. }
                | CoreError::RecoveryFailed(_)
        )
    }
}
