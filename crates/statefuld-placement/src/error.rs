use statefuld_types::{CoreError, Ordinal};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("no node satisfies the placement requirements for ordinal {0}")]
    NoSuitableNode(Ordinal),

    #[error("node agent failed to create volume {volume} for ordinal {ordinal}: {source}")]
    VolumeCreateFailed {
        ordinal: Ordinal,
        volume: String,
        #[source]
        source: statefuld_agent_client::AgentError,
    },

    #[error("node agent failed to restore volume {volume} for ordinal {ordinal}: {source}")]
    RestoreFailed {
        ordinal: Ordinal,
        volume: String,
        #[source]
        source: statefuld_agent_client::AgentError,
    },

    #[error("failed to list node candidates: {0}")]
    SchedulerUnavailable(String),
}

impl From<PlacementError> for CoreError {
    fn from(err: PlacementError) -> Self {
        match err {
            PlacementError::NoSuitableNode(ordinal) => CoreError::NoSuitableNode(ordinal),
            PlacementError::VolumeCreateFailed { ordinal, volume, .. } => {
                CoreError::VolumeCreateFailed { ordinal, volume }
            }
            PlacementError::RestoreFailed { ordinal, volume, .. } => {
                CoreError::RestoreFailed { ordinal, volume }
            }
            PlacementError::SchedulerUnavailable(_) => CoreError::NoSuitableNode(Ordinal::new(0)),
        }
    }
}
