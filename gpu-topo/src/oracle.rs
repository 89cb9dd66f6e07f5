//! Topology oracle: the consumed interface and the one concrete,
//! YAML-backed implementation this crate carries for the server binary and
//! test fixtures, plus the process-wide guarded registry.
//!
//! A real oracle (NVML/sysfs enumeration of physical GPUs) is an external
//! collaborator and out of scope here; [`YamlTopologyOracle`] exists so this
//! crate has something concrete to build, serve, and test against.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::device::{parse_link_class, LinkClass};

/// Total device count, per-index UUID, and pairwise link class lookup.
///
/// `link_class` is symmetric and undefined for `a == b`; implementations may
/// panic or return any value for that case since callers never invoke it
/// that way.
///
/// # Precondition
/// The link matrix must describe a proper hierarchy: once two devices are
/// known to be reachable at class `L`, every coarser class reported for
/// either of them against a third device must agree. Tree construction
/// indexes the matrix by a node's *representative* leaf once nodes are
/// merged, which is only correct under this transitivity assumption. Real
/// hardware satisfies it; this crate does not attempt to prove it in
/// general, only to sanity-check it for [`YamlTopologyOracle`] at load time.
pub trait TopologyOracle: Send + Sync {
    fn device_count(&self) -> usize;
    fn uuid(&self, index: usize) -> &str;
    fn link_class(&self, a: &str, b: &str) -> LinkClass;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("failed to read topology file '{path}': {reason}")]
    Io { path: String, reason: String },

    #[error("failed to parse topology YAML '{path}': {reason}")]
    Parse { path: String, reason: String },

    #[error("topology link '{a}'-'{b}' declared with unknown class '{class}'")]
    UnknownLinkClass { a: String, b: String, class: String },

    #[error("topology link references undeclared device '{device}'")]
    UnknownDevice { device: String },
}

/// YAML shape for [`YamlTopologyOracle`]:
///
/// ```yaml
/// devices:
///   - "GPU-0"
///   - "GPU-1"
/// links:
///   - { a: "GPU-0", b: "GPU-1", class: single_switch }
/// ```
#[derive(Debug, Deserialize)]
struct TopologyFile {
    devices: Vec<String>,
    #[serde(default)]
    links: Vec<LinkEntry>,
}

#[derive(Debug, Deserialize)]
struct LinkEntry {
    a: String,
    b: String,
    class: String,
}

/// Static device/link-class description loaded from a YAML file.
///
/// Unlisted pairs default to [`LinkClass::CrossCpu`], the loosest and most
/// conservative class (see the module precondition above).
#[derive(Debug)]
pub struct YamlTopologyOracle {
    devices: Vec<String>,
    links: HashMap<(String, String), LinkClass>,
}

impl YamlTopologyOracle {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, OracleError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| OracleError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::load_from_str(&raw, &path.display().to_string())
    }

    pub(crate) fn load_from_str(raw: &str, path_for_errors: &str) -> Result<Self, OracleError> {
        let file: TopologyFile = serde_yaml::from_str(raw).map_err(|e| OracleError::Parse {
            path: path_for_errors.to_string(),
            reason: e.to_string(),
        })?;

        let known: std::collections::HashSet<&str> =
            file.devices.iter().map(String::as_str).collect();

        let mut links = HashMap::new();
        for entry in &file.links {
            if !known.contains(entry.a.as_str()) {
                return Err(OracleError::UnknownDevice {
                    device: entry.a.clone(),
                });
            }
            if !known.contains(entry.b.as_str()) {
                return Err(OracleError::UnknownDevice {
                    device: entry.b.clone(),
                });
            }
            let class = parse_link_class(&entry.class).ok_or_else(|| OracleError::UnknownLinkClass {
                a: entry.a.clone(),
                b: entry.b.clone(),
                class: entry.class.clone(),
            })?;
            links.insert(Self::key(&entry.a, &entry.b), class);
        }

        let oracle = YamlTopologyOracle {
            devices: file.devices,
            links,
        };
        oracle.sanity_check_hierarchy();
        info!(devices = oracle.devices.len(), "loaded topology oracle");
        Ok(oracle)
    }

    fn key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }

    /// Best-effort precondition check, not a full hierarchy prover: for every
    /// triple `(x, y, z)` where `x`-`y` and `y`-`z` are both declared tighter
    /// than `CrossCpu`, warn if `x`-`z` (explicit or defaulted) is *strictly
    /// tighter* than both. A proper hierarchy never lets a pair be closer
    /// than the loosest link on a path connecting them through a third
    /// device.
    fn sanity_check_hierarchy(&self) {
        for i in 0..self.devices.len() {
            for j in (i + 1)..self.devices.len() {
                for k in (j + 1)..self.devices.len() {
                    let (x, y, z) = (&self.devices[i], &self.devices[j], &self.devices[k]);
                    let xy = self.link_class(x, y);
                    let yz = self.link_class(y, z);
                    let xz = self.link_class(x, z);
                    let loosest_path = xy.max(yz);
                    if xz < loosest_path {
                        warn!(
                            x = %x, y = %y, z = %z,
                            "topology hierarchy inconsistency: {x}-{z} reported tighter than the path through {y}"
                        );
                    }
                }
            }
        }
    }
}

impl TopologyOracle for YamlTopologyOracle {
    fn device_count(&self) -> usize {
        self.devices.len()
    }

    fn uuid(&self, index: usize) -> &str {
        &self.devices[index]
    }

    fn link_class(&self, a: &str, b: &str) -> LinkClass {
        self.links
            .get(&Self::key(a, b))
            .copied()
            .unwrap_or(LinkClass::CrossCpu)
    }
}

/// Process-wide guarded single-shot cache of the active [`TopologyOracle`].
///
/// Initializes at most once, retrying only on failure: a failed load is
/// never cached, so a transient error (bad path, malformed YAML) does not
/// poison the process for its lifetime.
pub struct OracleRegistry {
    slot: Mutex<Option<Arc<dyn TopologyOracle>>>,
}

static REGISTRY: OnceLock<OracleRegistry> = OnceLock::new();

impl OracleRegistry {
    fn global() -> &'static OracleRegistry {
        REGISTRY.get_or_init(|| OracleRegistry {
            slot: Mutex::new(None),
        })
    }

    /// Returns the cached oracle if already loaded, otherwise loads it from
    /// `path` and caches it on success. Concurrent callers during the same
    /// load block on the internal mutex; a failed load leaves the slot
    /// empty for the next caller to retry.
    pub fn get_or_init(path: impl AsRef<Path>) -> Result<Arc<dyn TopologyOracle>, OracleError> {
        let registry = Self::global();
        let mut slot = registry.slot.lock().expect("oracle registry mutex poisoned");
        if let Some(oracle) = slot.as_ref() {
            return Ok(Arc::clone(oracle));
        }
        debug!(path = %path.as_ref().display(), "initializing topology oracle");
        let oracle: Arc<dyn TopologyOracle> = Arc::new(YamlTopologyOracle::load_from_file(path)?);
        *slot = Some(Arc::clone(&oracle));
        Ok(oracle)
    }

    /// Returns the cached oracle without attempting to load one.
    pub fn get() -> Option<Arc<dyn TopologyOracle>> {
        Self::global()
            .slot
            .lock()
            .expect("oracle registry mutex poisoned")
            .clone()
    }

    #[cfg(test)]
    pub(crate) fn reset_for_test() {
        *Self::global().slot.lock().unwrap() = None;
    }

    /// Serializes tests that touch the process-wide registry; `cargo test`
    /// runs test functions on multiple threads by default, and the registry
    /// is a single global slot.
    #[cfg(test)]
    pub(crate) fn test_lock() -> std::sync::MutexGuard<'static, ()> {
        static LOCK: Mutex<()> = Mutex::new(());
        LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
