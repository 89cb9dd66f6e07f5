use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use gpu_topo::grpc::GpuTopologyServer;
use gpu_topo::oracle::OracleRegistry;
use gpu_topo::proto::gputopo_v1::gpu_topology_service_server::GpuTopologyServiceServer;

/// Topology-aware GPU allocator and node bin-packing scorer, served over gRPC.
#[derive(Parser, Debug)]
#[command(name = "gpu-topo", about = "Topology-aware GPU allocator and node scorer service")]
struct Cli {
    /// Path to the YAML topology fixture (devices + link classes).
    #[arg(long, default_value = "topology.yaml")]
    topology: PathBuf,

    /// gRPC bind address.
    #[arg(long, default_value = "0.0.0.0:50061")]
    addr: SocketAddr,

    /// Increase log verbosity; repeat for more (-v debug, -vv trace).
    /// Ignored if `RUST_LOG` is set.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    OracleRegistry::get_or_init(&cli.topology)?;
    tracing::info!(addr = %cli.addr, topology = %cli.topology.display(), "starting gpu-topo service");

    tonic::transport::Server::builder()
        .add_service(GpuTopologyServiceServer::new(GpuTopologyServer))
        .serve(cli.addr)
        .await?;

    Ok(())
}
