use statefuld_types::{CoreError, Ordinal};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("quorum lost: {healthy} healthy replicas, {required} required")]
    QuorumLost { healthy: usize, required: usize },

    #[error("MPC requires {required} ready parties, only {ready} are ready")]
    InsufficientParties { required: u32, ready: usize },

    #[error("MPC DKG bring-up failed at party {0}: {1}")]
    DkgFailed(Ordinal, #[source] statefuld_agent_client::AgentError),

    #[error("dkg/finalize request failed: {0}")]
    DkgFinalizeFailed(#[source] statefuld_agent_client::AgentError),
}

impl From<ClusterError> for CoreError {
    fn from(err: ClusterError) -> Self {
        match err {
            ClusterError::QuorumLost { healthy, required } => CoreError::QuorumLost { healthy, required },
            ClusterError::InsufficientParties { required, ready } => {
                CoreError::InsufficientParties { required, ready }
            }
            ClusterError::DkgFailed(ordinal, _) => CoreError::DkgFailed(ordinal),
            ClusterError::DkgFinalizeFailed(_) => CoreError::DkgFailed(Ordinal::new(0)),
        }
    }
}
