//! Structured error type for the topology tree builder.
//!
//! Handled by graceful degradation at the call site
//! ([`crate::entry::allocate`]): the entry point falls back to arbitrary
//! truncation rather than propagating it to its caller.
//!
//! `TopologyOracle::link_class` is infallible by contract: it always
//! resolves to a class, defaulting to `CrossCpu` when data is missing. So
//! the only way tree construction fails is an unusable oracle up front
//! (zero devices).

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// The topology oracle could not be reached or reported zero devices.
    #[error("topology oracle unavailable: {0}")]
    OracleUnavailable(String),
}
