//! Topology tree: arena representation (§3), tree builder, and the
//! allocator driver that ties rank search to tree mutation.
//!
//! The tree is rebuilt fresh on every allocation call and discarded on
//! return; nothing here is process-wide state (that lives in
//! [`crate::oracle::OracleRegistry`]).

use std::collections::HashSet;

use crate::device::{DeviceId, DeviceState, LinkClass};
use crate::oracle::TopologyOracle;

pub mod cost;
pub mod error;
pub mod rank;

pub use error::TopologyError;

/// A single arena entry: a leaf wraps a device index, an internal node
/// groups children merged at `link`.
#[derive(Debug, Clone)]
pub struct Node {
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Representative UUID (the first descendant leaf's UUID), diagnostics only.
    pub repr: DeviceId,
    pub link: LinkClass,
    /// `Some(device index)` for a leaf, `None` for an internal node.
    pub leaf_device: Option<usize>,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Arena-backed topology tree, built fresh for a single allocation call.
///
/// Parent links are `Option<usize>` indices into the arena rather than
/// co-owning references, so the tree is trivially acyclic and its
/// deallocation is just dropping the `Vec`.
pub struct Topology {
    nodes: Vec<Node>,
    states: Vec<DeviceState>,
    device_ids: Vec<DeviceId>,
    root: usize,
}

impl Topology {
    pub fn root(&self) -> usize {
        self.root
    }

    pub fn node(&self, idx: usize) -> &Node {
        &self.nodes[idx]
    }

    pub fn state(&self, device_idx: usize) -> DeviceState {
        self.states[device_idx]
    }

    pub fn set_state(&mut self, device_idx: usize, state: DeviceState) {
        self.states[device_idx] = state;
    }

    pub fn device_id(&self, device_idx: usize) -> &DeviceId {
        &self.device_ids[device_idx]
    }

    pub fn device_count(&self) -> usize {
        self.device_ids.len()
    }
}

/// Builds the topology tree from the oracle's device list and link
/// matrix, given the `in_use` and `available` UUID sets.
///
/// Leaves are created in oracle order, then merged by ascending link class:
/// `SameBoard, SingleSwitch, MultiSwitch, HostBridge, SameCpu, CrossCpu`.
/// Returns the tree together with the node indices of every leaf whose state
/// is `InUse`, in oracle order.
pub fn build(
    oracle: &dyn TopologyOracle,
    in_use: &HashSet<DeviceId>,
    available: &HashSet<DeviceId>,
) -> Result<(Topology, Vec<usize>), TopologyError> {
    let count = oracle.device_count();
    if count == 0 {
        return Err(TopologyError::OracleUnavailable(
            "oracle reports zero devices".to_string(),
        ));
    }

    let device_ids: Vec<DeviceId> = (0..count).map(|i| oracle.uuid(i).to_string()).collect();

    let mut states = Vec::with_capacity(count);
    let mut nodes = Vec::with_capacity(count);
    // working[i] holds the current top node index for oracle slot i, or
    // None once that slot has been merged into another.
    let mut working: Vec<Option<usize>> = Vec::with_capacity(count);
    let mut inuse_leaves = Vec::new();

    for (i, uuid) in device_ids.iter().enumerate() {
        let mut state = if available.contains(uuid) {
            DeviceState::Avail
        } else {
            DeviceState::None
        };
        if in_use.contains(uuid) {
            // INUSE wins over both AVAIL and NONE.
            state = DeviceState::InUse;
        }
        states.push(state);

        let node_idx = nodes.len();
        nodes.push(Node {
            parent: None,
            children: Vec::new(),
            repr: uuid.clone(),
            link: LinkClass::SameBoard,
            leaf_device: Some(i),
        });
        working.push(Some(node_idx));
        if state == DeviceState::InUse {
            inuse_leaves.push(node_idx);
        }
    }

    for &class in LinkClass::ASCENDING.iter() {
        for i in 0..working.len() {
            let Some(mut wi) = working[i] else { continue };
            for j in (i + 1)..working.len() {
                let Some(wj) = working[j] else { continue };
                let repr_i = nodes[wi].repr.clone();
                let repr_j = nodes[wj].repr.clone();
                if oracle.link_class(&repr_i, &repr_j) != class {
                    continue;
                }
                if nodes[wi].link != class {
                    let new_idx = nodes.len();
                    nodes.push(Node {
                        parent: None,
                        children: vec![wi],
                        repr: repr_i.clone(),
                        link: class,
                        leaf_device: None,
                    });
                    nodes[wi].parent = Some(new_idx);
                    working[i] = Some(new_idx);
                    wi = new_idx;
                }
                nodes[wi].children.push(wj);
                nodes[wj].parent = Some(wi);
                working[j] = None;
            }
        }
    }

    let root = working.into_iter().flatten().next().ok_or_else(|| {
        TopologyError::OracleUnavailable("tree builder produced no root".to_string())
    })?;

    Ok((
        Topology {
            nodes,
            states,
            device_ids,
            root,
        },
        inuse_leaves,
    ))
}

/// Largest power of two `<= n`, with `align2(0) = 0` and `align2(1) = 1`.
pub fn align2(n: usize) -> usize {
    if n <= 1 {
        return n;
    }
    let mut i = 1usize;
    while i <= n {
        i *= 2;
    }
    i / 2
}

/// Allocator: decomposes `needed` into a descending sum of powers of
/// two, repeatedly invoking rank search, mutating the tree's leaf states and
/// appending newly-assigned leaves to `inuse` as it goes.
///
/// `inuse` should start as the leaf node indices [`build`] reported as
/// pre-existing `InUse`; the same list is extended here so later rank
/// searches within the same call see the growing in-use set.
///
/// Returns the empty list if the root's available-leaf count is already
/// below `needed`. That is true allocation failure, distinct from a bug in
/// the decomposition loop (which cannot itself run out given that precheck).
pub fn allocate(topo: &mut Topology, needed: usize, inuse: &mut Vec<usize>) -> Vec<DeviceId> {
    let root = topo.root();
    if cost::avail_count(topo, root) < needed {
        return Vec::new();
    }

    let mut output = Vec::new();
    let mut remaining = needed;
    let mut chunk = align2(remaining);
    while remaining > 0 && chunk > 0 {
        match rank::rank(topo, root, chunk, inuse) {
            Some(node_idx) => {
                for leaf in cost::avail_leaves(topo, node_idx) {
                    let device_idx = topo.node(leaf).leaf_device.expect("avail leaf wraps a device");
                    topo.set_state(device_idx, DeviceState::InUse);
                    output.push(topo.device_id(device_idx).clone());
                    inuse.push(leaf);
                }
                remaining -= chunk;
                chunk = align2(remaining);
            }
            None => {
                chunk /= 2;
            }
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::YamlTopologyOracle;

    const EIGHT_GPU_YAML: &str = r#"
devices: ["GPU-0", "GPU-1", "GPU-2", "GPU-3", "GPU-4", "GPU-5", "GPU-6", "GPU-7"]
links:
  - { a: "GPU-0", b: "GPU-1", class: single_switch }
  - { a: "GPU-2", b: "GPU-3", class: single_switch }
  - { a: "GPU-4", b: "GPU-5", class: single_switch }
  - { a: "GPU-6", b: "GPU-7", class: single_switch }
  - { a: "GPU-0", b: "GPU-2", class: host_bridge }
  - { a: "GPU-0", b: "GPU-3", class: host_bridge }
  - { a: "GPU-1", b: "GPU-2", class: host_bridge }
  - { a: "GPU-1", b: "GPU-3", class: host_bridge }
  - { a: "GPU-4", b: "GPU-6", class: host_bridge }
  - { a: "GPU-4", b: "GPU-7", class: host_bridge }
  - { a: "GPU-5", b: "GPU-6", class: host_bridge }
  - { a: "GPU-5", b: "GPU-7", class: host_bridge }
"#;

    fn oracle() -> YamlTopologyOracle {
        YamlTopologyOracle::load_from_str(EIGHT_GPU_YAML, "<test>").unwrap()
    }

    fn set(ids: &[&str]) -> HashSet<DeviceId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn build_produces_a_single_root_covering_all_devices() {
        let oracle = oracle();
        let (topo, _) = build(&oracle, &HashSet::new(), &set(&["GPU-0"])).unwrap();
        assert_eq!(cost::avail_leaves(&topo, topo.root()).len(), 1);
        // every device reachable from the root
        fn count_leaves(topo: &Topology, n: usize) -> usize {
            if topo.node(n).is_leaf() {
                1
            } else {
                topo.node(n).children.iter().map(|&c| count_leaves(topo, c)).sum()
            }
        }
        assert_eq!(count_leaves(&topo, topo.root()), 8);
    }

    #[test]
    fn empty_oracle_fails() {
        struct Empty;
        impl TopologyOracle for Empty {
            fn device_count(&self) -> usize {
                0
            }
            fn uuid(&self, _: usize) -> &str {
                unreachable!()
            }
            fn link_class(&self, _: &str, _: &str) -> LinkClass {
                unreachable!()
            }
        }
        assert!(build(&Empty, &HashSet::new(), &HashSet::new()).is_err());
    }

    fn scenario(available: &[&str], needed: usize) -> Vec<String> {
        let oracle = oracle();
        let avail = set(available);
        let (mut topo, mut inuse) = build(&oracle, &HashSet::new(), &avail).unwrap();
        let mut got = allocate(&mut topo, needed, &mut inuse);
        got.sort();
        got
    }

    #[test]
    fn scenario_1_full_topology_request_four() {
        assert_eq!(
            scenario(&["GPU-0", "GPU-1", "GPU-2", "GPU-3", "GPU-4", "GPU-5", "GPU-6", "GPU-7"], 4),
            vec!["GPU-0", "GPU-1", "GPU-2", "GPU-3"]
        );
    }

    #[test]
    fn scenario_2_full_topology_request_two() {
        assert_eq!(
            scenario(&["GPU-0", "GPU-1", "GPU-2", "GPU-3", "GPU-4", "GPU-5", "GPU-6", "GPU-7"], 2),
            vec!["GPU-0", "GPU-1"]
        );
    }

    #[test]
    fn scenario_3_socket_fallback_request_four() {
        assert_eq!(
            scenario(&["GPU-0", "GPU-3", "GPU-4", "GPU-5", "GPU-6", "GPU-7"], 4),
            vec!["GPU-4", "GPU-5", "GPU-6", "GPU-7"]
        );
    }

    #[test]
    fn scenario_4_socket_fallback_request_two() {
        assert_eq!(
            scenario(&["GPU-0", "GPU-3", "GPU-4", "GPU-5", "GPU-6", "GPU-7"], 2),
            vec!["GPU-4", "GPU-5"]
        );
    }

    #[test]
    fn scenario_5_scattered_request_four() {
        assert_eq!(
            scenario(&["GPU-0", "GPU-2", "GPU-6", "GPU-7"], 4),
            vec!["GPU-0", "GPU-2", "GPU-6", "GPU-7"]
        );
    }

    #[test]
    fn scenario_6_scattered_request_two() {
        assert_eq!(scenario(&["GPU-0", "GPU-2", "GPU-6", "GPU-7"], 2), vec!["GPU-6", "GPU-7"]);
    }

    #[test]
    fn scenario_7_insufficient_capacity_returns_empty() {
        let got = scenario(&["GPU-0", "GPU-4", "GPU-5", "GPU-6", "GPU-7"], 6);
        assert!(got.is_empty());
    }

    #[test]
    fn scenario_8_single_device_prefers_bridge_connected() {
        assert_eq!(scenario(&["GPU-0", "GPU-1", "GPU-2", "GPU-4", "GPU-5"], 1), vec!["GPU-2"]);
    }

    #[test]
    fn lone_host_bridge_survivor_beats_lone_single_switch_survivor() {
        assert_eq!(scenario(&["GPU-1", "GPU-4", "GPU-6"], 1), vec!["GPU-1"]);
        assert_eq!(scenario(&["GPU-0", "GPU-4", "GPU-6"], 1), vec!["GPU-0"]);
    }

    #[test]
    fn single_switch_pair_member_beats_an_unpaired_leaf() {
        assert_eq!(scenario(&["GPU-0", "GPU-2", "GPU-6", "GPU-7"], 1), vec!["GPU-0"]);
    }

    #[test]
    fn allocate_at_zero_demand_is_idempotent() {
        let oracle = oracle();
        let avail = set(&["GPU-0", "GPU-1"]);
        let (mut topo, mut inuse) = build(&oracle, &HashSet::new(), &avail).unwrap();
        let got = allocate(&mut topo, 0, &mut inuse);
        assert!(got.is_empty());
    }

    #[test]
    fn align2_properties() {
        assert_eq!(align2(0), 0);
        assert_eq!(align2(1), 1);
        assert_eq!(align2(2), 2);
        assert_eq!(align2(3), 2);
        assert_eq!(align2(7), 4);
        assert_eq!(align2(8), 8);
        assert_eq!(align2(9), 8);
        for n in 1..=64usize {
            let a = align2(n);
            assert!(a <= n);
            assert!(a.is_power_of_two());
            assert!(a > n / 2);
        }
    }
}
