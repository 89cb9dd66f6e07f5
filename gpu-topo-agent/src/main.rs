//! gpu-topo-agent – a thin CLI client for the `Allocate` RPC.
//!
//! Stands in for a kubelet device-plugin integration that talks to the
//! allocator remotely instead of embedding `gpu-topo` as a library: it reads
//! a scenario file describing a single allocation request, calls `Allocate`
//! over gRPC, and prints the chosen device UUIDs.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use gpu_topo::proto::gputopo_v1::gpu_topology_service_client::GpuTopologyServiceClient;
use gpu_topo::proto::gputopo_v1::AllocateRequest;

#[derive(Parser, Debug)]
#[command(name = "gpu-topo-agent", about = "Calls the gpu-topo Allocate RPC for a scenario file")]
struct Cli {
    /// gRPC address of a running gpu-topo server.
    #[arg(long, default_value = "http://127.0.0.1:50061")]
    server: String,

    /// Path to a YAML scenario file: resource_kind, needed, in_use, available.
    #[arg(long)]
    scenario: PathBuf,
}

#[derive(Debug, Deserialize)]
struct Scenario {
    resource_kind: String,
    needed: u32,
    #[serde(default)]
    in_use: Vec<String>,
    #[serde(default)]
    available: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let raw = std::fs::read_to_string(&cli.scenario)
        .with_context(|| format!("reading scenario file {}", cli.scenario.display()))?;
    let scenario: Scenario = serde_yaml::from_str(&raw).context("parsing scenario YAML")?;

    let mut client = GpuTopologyServiceClient::connect(cli.server.clone())
        .await
        .with_context(|| format!("connecting to gpu-topo server at {}", cli.server))?;

    let response = client
        .allocate(AllocateRequest {
            resource_kind: scenario.resource_kind,
            needed: scenario.needed,
            in_use: scenario.in_use,
            available: scenario.available,
        })
        .await?
        .into_inner();

    for uuid in response.device_uuids {
        println!("{}", uuid);
    }

    Ok(())
}
