//! kubelet-sim – replays a sequence of Allocate requests against a running
//! gpu-topo server, the way a kubelet device-plugin integration test would
//! exercise the real service end to end.
//!
//! Not for production: no retries, no backoff, exits on the first error.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gpu_topo::proto::gputopo_v1::gpu_topology_service_client::GpuTopologyServiceClient;
use gpu_topo::proto::gputopo_v1::AllocateRequest;

#[derive(Parser, Debug)]
#[command(name = "kubelet-sim", about = "Replays Allocate requests against a gpu-topo server")]
struct Cli {
    #[arg(long, default_value = "http://127.0.0.1:50061")]
    server: String,

    /// YAML file containing a list of requests, see `Request` below.
    #[arg(long)]
    requests: PathBuf,
}

#[derive(Debug, Deserialize)]
struct Request {
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

    let raw = std::fs::read_to_string(&cli.requests)
        .with_context(|| format!("reading requests file {}", cli.requests.display()))?;
    let requests: Vec<Request> = serde_yaml::from_str(&raw).context("parsing requests YAML")?;

    let mut client = GpuTopologyServiceClient::connect(cli.server.clone())
        .await
        .with_context(|| format!("connecting to gpu-topo server at {}", cli.server))?;

    for (i, req) in requests.into_iter().enumerate() {
        let response = client
            .allocate(AllocateRequest {
                resource_kind: req.resource_kind,
                needed: req.needed,
                in_use: req.in_use,
                available: req.available,
            })
            .await?
            .into_inner();
        info!(index = i, uuids = ?response.device_uuids, "allocate replayed");
    }

    Ok(())
}
