use std::collections::HashSet;

use statefuld_types::{HardwareSpec, TeePlatform};

use crate::node::{NodeCandidate, NodeStatus};

/// Maps a [`TeePlatform`] onto the capability tag a node advertises.
/// Returns `None` for `TeePlatform::None`, which imposes no requirement.
#[must_use]
pub fn tee_capability_tag(platform: TeePlatform) -> Option<&'static str> {
    match platform {
        TeePlatform::None => None,
        TeePlatform::IntelSgx => Some("intel-sgx"),
        TeePlatform::IntelTdx => Some("intel-tdx"),
        TeePlatform::AmdSev => Some("amd-sev"),
        TeePlatform::NvidiaCc => Some("nvidia-cc"),
    }
}

/// Filter predicates: all must hold for a candidate to be scored at
/// all.
fn passes_filters(
    node: &NodeCandidate,
    hardware: &HardwareSpec,
    required_tee: Option<TeePlatform>,
) -> bool {
    if node.status != NodeStatus::Online {
        return false;
    }
    if node.available_cpu_cores < hardware.cpu_cores {
        return false;
    }
    if node.available_memory_mb < hardware.memory_mb {
        return false;
    }
    if node.available_storage_mb < hardware.storage_mb {
        return false;
    }
    if let Some(region) = &hardware.region {
        if node.region.as_deref() != Some(region.as_str()) {
            return false;
        }
    }
    if let Some(tee) = required_tee {
        if let Some(tag) = tee_capability_tag(tee) {
            if !node.capabilities.contains(tag) {
                return false;
            }
        }
    }
    true
}

/// `score = node.reputation + (100 if node.id not in usedNodeIds else 0) +
/// (50 if image is cached on node else 0)`.
fn score(node: &NodeCandidate, used_node_ids: &HashSet<&str>, image: &str) -> i64 {
    let mut score = node.reputation;
    if !used_node_ids.contains(node.id.as_str()) {
        score += 100;
    }
    if node.cached_images.contains(image) {
        score += 50;
    }
    score
}

/// Selects the highest-scoring node satisfying the filter predicates.
/// Ties are broken by iteration order; not otherwise pinned down.
#[must_use]
pub fn select_node<'a>(
    candidates: &'a [NodeCandidate],
    hardware: &HardwareSpec,
    required_tee: Option<TeePlatform>,
    image: &str,
    used_node_ids: &HashSet<&str>,
) -> Option<&'a NodeCandidate> {
    candidates
        .iter()
        .filter(|node| passes_filters(node, hardware, required_tee))
        .max_by_key(|node| score(node, used_node_ids, image))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_node(id: String, reputation: i64) -> NodeCandidate {
        NodeCandidate {
            id: id.clone(),
            address: format!("http://{id}"),
            status: NodeStatus::Online,
            available_cpu_cores: 64,
            available_memory_mb: 262_144,
            available_storage_mb: 4_000_000,
            region: None,
            capabilities: HashSet::new(),
            cached_images: HashSet::new(),
            reputation,
        }
    }

    fn roomy_hardware() -> HardwareSpec {
        HardwareSpec {
            cpu_cores: 1,
            cpu_architecture: statefuld_types::CpuArchitecture::Amd64,
            memory_mb: 128,
            storage_mb: 1024,
            storage_type: statefuld_types::StorageType::Ssd,
            gpu_type: statefuld_types::GpuType::None,
            gpu_count: 0,
            network_bandwidth_mbps: 1000,
            public_ip: false,
            tee_platform: statefuld_types::TeePlatform::None,
            region: None,
        }
    }

    proptest! {
        /// The selected node, if any, always has the maximum score among
        /// candidates that pass the filter predicates — `select_node`
        /// never returns a dominated candidate.
        #[test]
        fn selected_node_has_max_score_among_passing(
            reputations in proptest::collection::vec(-50i64..200, 1..12),
        ) {
            let candidates: Vec<NodeCandidate> = reputations
                .iter()
                .enumerate()
                .map(|(i, rep)| arb_node(format!("node-{i}"), *rep))
                .collect();
            let used = HashSet::new();
            let picked = select_node(&candidates, &roomy_hardware(), None, "img", &used)
                .expect("all candidates pass the filter with roomy hardware");
            let picked_score = score(picked, &used, "img");
            for candidate in &candidates {
                prop_assert!(picked_score >= score(candidate, &used, "img"));
            }
        }

        /// An anti-affinity bonus never pushes a used node's score above an
        /// otherwise-identical unused node's score (the 100-point bonus is
        /// assigned unconditionally to every unused candidate).
        #[test]
        fn unused_node_never_scores_below_used_twin(reputation in -50i64..200) {
            let used_node = arb_node("used".to_string(), reputation);
            let unused_node = arb_node("unused".to_string(), reputation);
            let used: HashSet<&str> = ["used"].into_iter().collect();
            prop_assert!(score(&unused_node, &used, "img") > score(&used_node, &used, "img"));
        }
    }
}
