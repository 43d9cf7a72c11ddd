use statefuld_placement::PlacementError;
use statefuld_types::{CoreError, Ordinal};
use thiserror::Error;

/// Internal reconciler error. Provisioning-time variants map onto
/// `CoreError::ProvisioningFailed`; recovery-time failures surface their
/// own taxonomy values.
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error(transparent)]
    Placement(#[from] PlacementError),

    #[error("node agent failed to deploy container for ordinal {0}: {1}")]
    ContainerDeployFailed(Ordinal, #[source] statefuld_agent_client::AgentError),

    #[error("replica {0} did not become ready within the readiness deadline")]
    ReadinessTimeout(Ordinal),

    #[error("recovery of ordinal {0} did not complete; service is degraded")]
    RecoveryFailed(Ordinal),
}

impl ReconcilerError {
    /// Maps this error onto the Core API error taxonomy. Called during
    /// initial provisioning: every variant here is fatal to that
    /// operation and gets wrapped in `ProvisioningFailed`.
    #[must_use]
    pub fn into_provisioning_error(self) -> CoreError {
        CoreError::ProvisioningFailed(Box::new(self.into_bare()))
    }

    /// Maps this error onto the Core API error taxonomy during recovery:
    /// `RestoreFailed` and readiness timeouts both collapse into
    /// `RecoveryFailed` — the service stays degraded and is left for an
    /// operator to retry.
    #[must_use]
    pub fn into_recovery_error(self, ordinal: Ordinal) -> CoreError {
        match self {
            ReconcilerError::RecoveryFailed(o) => CoreError::RecoveryFailed(o),
            _ => {
                tracing::warn!(error = %self, %ordinal, "recovery attempt failed");
                CoreError::RecoveryFailed(ordinal)
            }
        }
    }

    fn into_bare(self) -> CoreError {
        match self {
            ReconcilerError::Placement(p) => p.into(),
            ReconcilerError::ContainerDeployFailed(ordinal, _) => CoreError::ContainerDeployFailed(ordinal),
            ReconcilerError::ReadinessTimeout(ordinal) => CoreError::ReadinessTimeout(ordinal),
            ReconcilerError::RecoveryFailed(ordinal) => CoreError::RecoveryFailed(ordinal),
        }
    }
}
