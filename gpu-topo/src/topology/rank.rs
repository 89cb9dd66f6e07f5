//! Rank search: recursive selection of a subtree with exactly `n`
//! `Avail` leaves and minimum cost among same-level candidates.

use std::cmp::Ordering;

use super::{cost, Topology};

/// Returns a node whose `Avail`-leaf count equals `n`, minimal by the
/// tie-break order below among candidates found at the same recursion
/// depth. Returns `None` if no exact-`n` subtree exists under `node`.
///
/// `inuse` is the node-index list of leaves already committed in this
/// allocation call (pre-existing plus any assigned by earlier chunks).
pub fn rank(topo: &Topology, node: usize, n: usize, inuse: &[usize]) -> Option<usize> {
    let avail = cost::avail_count(topo, node);
    if avail < n {
        return None;
    }
    if avail == n {
        return Some(node);
    }

    let children = topo.node(node).children.clone();
    let mut candidates = Vec::new();
    for &c in &children {
        if let Some(rc) = rank(topo, c, n, inuse) {
            candidates.push(rc);
        }
    }
    if candidates.is_empty() {
        return None;
    }

    candidates.sort_by(|&a, &b| compare_candidates(topo, a, b, inuse));
    Some(candidates[0])
}

/// Total order over rank-search candidates: lower cost wins; ties broken by
/// tighter link class (by [`LinkClass::tie_rank`], not by `Ord`); remaining
/// ties broken by walking both ancestor chains in lockstep until a common
/// ancestor is reached, comparing cost then link class at every step. If
/// the chains agree all the way up, candidates compare equal and the
/// caller's stable sort preserves original order, so the earlier index
/// wins when nothing else distinguishes them.
fn compare_candidates(topo: &Topology, a: usize, b: usize, inuse: &[usize]) -> Ordering {
    let (mut na, mut nb) = (a, b);
    loop {
        if na == nb {
            return Ordering::Equal;
        }
        let ca = cost::node_cost(topo, Some(na), inuse);
        let cb = cost::node_cost(topo, Some(nb), inuse);
        if ca != cb {
            return ca.cmp(&cb);
        }
        let la = topo.node(na).link;
        let lb = topo.node(nb).link;
        if la != lb {
            return la.tie_rank().cmp(&lb.tie_rank());
        }
        na = topo.node(na).parent.expect("candidates share a common ancestor");
        nb = topo.node(nb).parent.expect("candidates share a common ancestor");
    }
}
