//! C3 Placement & Volume Planner: node selection (filter + score,
//! anti-affinity) and the deterministic per-replica volume lifecycle
//! (create, snapshot, restore).
//!
//! Pure functions over a small struct and a `thiserror` error enum,
//! generalized from placement-policy routing to node scoring.

mod error;
mod node;
mod scoring;
mod volume;

pub use error::PlacementError;
pub use node::{FakeNodeScheduler, NodeCandidate, NodeScheduler, NodeStatus};
pub use scoring::{select_node, tee_capability_tag};
pub use volume::{create_volume, restore_volume, snapshot_volume};
