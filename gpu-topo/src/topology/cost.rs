//! Subtree cost evaluator: available-leaf enumeration, lowest-common-
//! ancestor link lookup, and pairwise cost summation.

use crate::device::{LinkClass, DeviceState, MAXCOST};

use super::Topology;

/// Leaf node indices under `node` whose device state is `Avail`.
pub fn avail_leaves(topo: &Topology, node: usize) -> Vec<usize> {
    let n = topo.node(node);
    if n.is_leaf() {
        let device_idx = n.leaf_device.expect("leaf must wrap a device");
        if topo.state(device_idx) == DeviceState::Avail {
            vec![node]
        } else {
            Vec::new()
        }
    } else {
        n.children.iter().flat_map(|&c| avail_leaves(topo, c)).collect()
    }
}

/// Number of `Avail` leaves under `node`.
pub fn avail_count(topo: &Topology, node: usize) -> usize {
    avail_leaves(topo, node).len()
}

/// Link class of the lowest common ancestor of leaves `a` and `b`.
///
/// Walks each leaf's ancestor chain and returns the `link` field of the
/// first node common to both chains. Under the tree invariants this always
/// exists (the root is a common ancestor of every leaf); the `CrossCpu`
/// fallback is a defensive path for an invariant violation, logged as an
/// error rather than panicking, matching the graceful-degradation policy
/// for internal structural violations.
pub fn p2p_link(topo: &Topology, a: usize, b: usize) -> LinkClass {
    let mut chain_a = Vec::new();
    let mut p = topo.node(a).parent;
    while let Some(idx) = p {
        chain_a.push(idx);
        p = topo.node(idx).parent;
    }
    let mut chain_b = Vec::new();
    let mut p = topo.node(b).parent;
    while let Some(idx) = p {
        chain_b.push(idx);
        p = topo.node(idx).parent;
    }
    for &pa in &chain_a {
        if chain_b.contains(&pa) {
            return topo.node(pa).link;
        }
    }
    tracing::error!(
        a = %topo.node(a).repr,
        b = %topo.node(b).repr,
        "no common ancestor for device pair, treating as worst-case cost"
    );
    LinkClass::CrossCpu
}

/// Sum of pairwise costs over `inuse` (pre-existing in-use leaves, as node
/// indices) plus the `Avail` leaves under `node`.
pub fn subtree_cost(topo: &Topology, node: usize, inuse: &[usize]) -> i64 {
    let mut devs: Vec<usize> = inuse.to_vec();
    devs.extend(avail_leaves(topo, node));
    let mut total = 0i64;
    for i in 0..devs.len() {
        for j in (i + 1)..devs.len() {
            total += p2p_link(topo, devs[i], devs[j]).cost();
        }
    }
    total
}

/// Cost of a possibly-absent node, used by rank search's ancestor-walk
/// tie-break. `MAXCOST` stands in for a null node.
pub fn node_cost(topo: &Topology, node: Option<usize>, inuse: &[usize]) -> i64 {
    match node {
        Some(n) => subtree_cost(topo, n, inuse),
        None => MAXCOST,
    }
}
