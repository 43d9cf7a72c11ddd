use thiserror::Error;

/// Errors from talking to a node agent. The caller maps these onto
/// [`statefuld_types::CoreError`]: 4xx becomes a caller error for that
/// replica, 5xx/transport becomes a node-side failure.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("transport error contacting {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("node agent at {endpoint} rejected the request with status {status}: {body}")]
    Rejected {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("unexpected response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
}

impl AgentError {
    /// True when the failure is caller-attributable (4xx) rather than a
    /// node-side or transport failure (5xx / timeout / connection).
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        matches!(self, AgentError::Rejected { status, .. } if (400..500).contains(status))
    }
}
