//! scheduler-sim – calls `Score` for a workload against a list of candidate
//! hosts read from YAML, then prints the hosts ranked by priority, the way
//! an external scheduler extender would rank nodes during bin-packing.
//!
//! Not for production: single-threaded, sequential RPCs, no concurrency.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use gpu_topo::proto::gputopo_v1::gpu_topology_service_client::GpuTopologyServiceClient;
use gpu_topo::proto::gputopo_v1::{GpuWorkload, HostGpuState, ScoreRequest};

#[derive(Parser, Debug)]
#[command(name = "scheduler-sim", about = "Ranks candidate hosts for a workload via the Score RPC")]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:50061")]
    server: String,

    /// YAML file describing the workload and candidate hosts.
    #[arg(long)]
    fixture: PathBuf,
}

#[derive(Debug, Deserialize)]
struct Fixture {
    workload: WorkloadSpec,
    hosts: Vec<HostSpec>,
}

#[derive(Debug, Deserialize)]
struct WorkloadSpec {
    #[serde(default)]
    container_gpu_limits: Vec<u64>,
    #[serde(default)]
    init_container_gpu_limits: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct HostSpec {
    host_name: String,
    allocatable_gpu: u64,
    requested_gpu: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let raw = std::fs::read_to_string(&cli.fixture)
        .with_context(|| format!("reading fixture file {}", cli.fixture.display()))?;
    let fixture: Fixture = serde_yaml::from_str(&raw).context("parsing fixture YAML")?;

    let mut client = GpuTopologyServiceClient::connect(cli.server.clone())
        .await
        .with_context(|| format!("connecting to gpu-topo server at {}", cli.server))?;

    let workload = GpuWorkload {
        container_gpu_limits: fixture.workload.container_gpu_limits,
        init_container_gpu_limits: fixture.workload.init_container_gpu_limits,
    };

    let mut ranked = Vec::new();
    for host in fixture.hosts {
        let response = client
            .score(ScoreRequest {
                workload: Some(workload.clone()),
                host: Some(HostGpuState {
                    host_name: host.host_name,
                    allocatable_gpu: host.allocatable_gpu,
                    requested_gpu: host.requested_gpu,
                }),
            })
            .await?
            .into_inner();
        ranked.push((response.host_name, response.priority));
    }

    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    for (host_name, priority) in ranked {
        println!("{}\t{}", priority, host_name);
    }

    Ok(())
}
