//! gRPC service wiring: a thin tonic service exposing the allocator's entry
//! point (`Allocate`) and the node scorer (`Score`) to remote callers, in the
//! shape a kubelet device plugin or a scheduler extender would talk to.

use std::collections::HashSet;

use tonic::{Request, Response, Status};

use crate::entry;
use crate::proto::gputopo_v1::gpu_topology_service_server::GpuTopologyService;
use crate::proto::gputopo_v1::{AllocateRequest, AllocateResponse, ScoreRequest, ScoreResponse};
use crate::scorer::{self, GpuWorkload, HostGpuState};

#[derive(Debug, Default)]
pub struct GpuTopologyServer;

#[tonic::async_trait]
impl GpuTopologyService for GpuTopologyServer {
    async fn allocate(
        &self,
        request: Request<AllocateRequest>,
    ) -> Result<Response<AllocateResponse>, Status> {
        let req = request.into_inner();
        let in_use: HashSet<String> = req.in_use.into_iter().collect();
        let available: HashSet<String> = req.available.into_iter().collect();

        let device_uuids = entry::allocate(&req.resource_kind, req.needed as usize, &in_use, &available);
        Ok(Response::new(AllocateResponse { device_uuids }))
    }

    async fn score(&self, request: Request<ScoreRequest>) -> Result<Response<ScoreResponse>, Status> {
        let req = request.into_inner();
        let workload = req
            .workload
            .ok_or_else(|| Status::invalid_argument("missing workload"))?;
        let host = req.host.ok_or_else(|| Status::invalid_argument("missing host"))?;

        let workload = GpuWorkload {
            container_gpu_limits: workload.container_gpu_limits,
            init_container_gpu_limits: workload.init_container_gpu_limits,
        };
        let host_state = HostGpuState {
            host_name: host.host_name,
            allocatable_gpu: host.allocatable_gpu,
            requested_gpu: host.requested_gpu,
        };

        let result = scorer::score(&workload, &host_state);
        Ok(Response::new(ScoreResponse {
            host_name: result.host_name,
            priority: result.priority,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OracleRegistry;
    use crate::proto::gputopo_v1::{GpuWorkload as ProtoWorkload, HostGpuState as ProtoHost};
    use std::io::Write;

    #[tokio::test]
    async fn allocate_rpc_truncates_for_non_gpu_kind() {
        let server = GpuTopologyServer;
        let request = Request::new(AllocateRequest {
            resource_kind: "cpu".to_string(),
            needed: 1,
            in_use: vec![],
            available: vec!["x".to_string()],
        });
        let response = server.allocate(request).await.unwrap().into_inner();
        assert_eq!(response.device_uuids, vec!["x".to_string()]);
    }

    #[tokio::test]
    async fn allocate_rpc_uses_topology_once_oracle_loaded() {
        let _guard = OracleRegistry::test_lock();
        OracleRegistry::reset_for_test();
        let yaml = r#"
devices: ["GPU-0", "GPU-1"]
links:
  - { a: "GPU-0", b: "GPU-1", class: single_switch }
"#;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(yaml.as_bytes()).unwrap();
        OracleRegistry::get_or_init(f.path()).unwrap();

        let server = GpuTopologyServer;
        let request = Request::new(AllocateRequest {
            resource_kind: "nvidia.com/gpu".to_string(),
            needed: 2,
            in_use: vec![],
            available: vec!["GPU-0".to_string(), "GPU-1".to_string()],
        });
        let mut response = server.allocate(request).await.unwrap().into_inner();
        response.device_uuids.sort();
        assert_eq!(response.device_uuids, vec!["GPU-0".to_string(), "GPU-1".to_string()]);
    }

    #[tokio::test]
    async fn score_rpc_rejects_missing_fields() {
        let server = GpuTopologyServer;
        let request = Request::new(ScoreRequest { workload: None, host: None });
        assert!(server.score(request).await.is_err());
    }

    #[tokio::test]
    async fn score_rpc_computes_priority() {
        let server = GpuTopologyServer;
        let request = Request::new(ScoreRequest {
            workload: Some(ProtoWorkload {
                container_gpu_limits: vec![2],
                init_container_gpu_limits: vec![],
            }),
            host: Some(ProtoHost {
                host_name: "node-a".to_string(),
                allocatable_gpu: 8,
                requested_gpu: 2,
            }),
        });
        let response = server.score(request).await.unwrap().into_inner();
        assert_eq!(response.host_name, "node-a");
        assert_eq!(response.priority, 96);
    }
}
