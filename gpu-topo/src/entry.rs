//! Entry point: dispatches a request by resource kind, routing GPU
//! requests through the topology allocator and everything else through
//! trivial truncation.

use std::collections::HashSet;

use crate::device::DeviceId;
use crate::oracle::OracleRegistry;
use crate::topology;

/// The only resource kind that takes the topology-aware path.
pub const GPU_RESOURCE_KIND: &str = "nvidia.com/gpu";

/// `allocate(resourceKind, N, inUse, available) -> [UUID]` (§6).
///
/// Returns the empty list on genuine allocation failure (insufficient
/// capacity on the GPU path); falls back to arbitrary-but-deterministic
/// truncation of `available` whenever the GPU path itself is unavailable
/// (wrong resource kind, uninitialized oracle, tree build failure). Never
/// errors.
pub fn allocate(
    resource_kind: &str,
    needed: usize,
    in_use: &HashSet<DeviceId>,
    available: &HashSet<DeviceId>,
) -> Vec<DeviceId> {
    if resource_kind != GPU_RESOURCE_KIND {
        return truncate(available, needed);
    }

    let oracle = match OracleRegistry::get() {
        Some(oracle) => oracle,
        None => {
            tracing::warn!("topology oracle not initialized, falling back to truncation");
            return truncate(available, needed);
        }
    };

    match topology::build(oracle.as_ref(), in_use, available) {
        Ok((mut topo, mut inuse_leaves)) => {
            // A short result here means the precheck in topology::allocate
            // already found insufficient capacity. That is the correct
            // empty-list answer, not a case calling for truncation.
            topology::allocate(&mut topo, needed, &mut inuse_leaves)
        }
        Err(err) => {
            tracing::warn!(error = %err, "topology tree build failed, falling back to truncation");
            truncate(available, needed)
        }
    }
}

/// Deterministic stand-in for "first N elements of an unordered set":
/// lexicographic order on UUID, so repeated calls and test fixtures are
/// reproducible.
fn truncate(available: &HashSet<DeviceId>, needed: usize) -> Vec<DeviceId> {
    let mut sorted: Vec<DeviceId> = available.iter().cloned().collect();
    sorted.sort();
    sorted.truncate(needed);
    sorted
}
