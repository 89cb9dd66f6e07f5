//! gpu-topo – topology-aware GPU allocator and node bin-packing scorer.
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── device/     – device state and link-class cost table
//! ├── oracle/     – TopologyOracle trait, YAML-backed impl, process registry
//! ├── topology/   – tree builder, cost evaluator, rank search, allocator
//! ├── scorer/     – node GPU bin-packing score
//! ├── entry/      – resource-kind dispatch (the public allocate() contract)
//! ├── grpc/       – tonic service wiring
//! └── proto/      – generated gRPC/protobuf types & stubs
//! ```

pub mod device;
pub mod entry;
pub mod grpc;
pub mod oracle;
pub mod proto;
pub mod scorer;
pub mod topology;
