//! Client-side implementation of the node-agent HTTP contract: volume
//! create/backup/restore, container create/stop, consensus
//! leader-change/peer-update, and MPC DKG init/finalize.
//!
//! Everything above the transport depends on [`AgentClient`] rather than a
//! concrete implementation, so the reconciler, placement planner, cluster
//! coordinator, and health loops can run against [`FakeAgentClient`] in
//! tests without a network.

mod client;
mod error;
mod fake;
mod http;
mod types;

pub use client::AgentClient;
pub use error::AgentError;
pub use fake::FakeAgentClient;
pub use http::HttpAgentClient;
pub use types::{
    BackupVolumeRequest, BackupVolumeResponse, CreateContainerRequest, CreateContainerResponse,
    CreateVolumeRequest, DkgFinalizeRequest, DkgFinalizeResponse, DkgInitRequest, DkgInitResponse,
    DkgParty, HostConfig, LeaderChangeRequest, PeerInfo, PeerUpdateRequest, RestoreVolumeRequest,
};
