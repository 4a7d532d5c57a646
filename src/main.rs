use anyhow::Context;
use mini_dfs::cluster::Cluster;
use mini_dfs::cluster::client::DfsClient;
use mini_dfs::config::DfsConfig;
use mini_dfs::dataservice::endpoint::{DataEndpoint, Fleet};
use mini_dfs::dataservice::service::DataService;
use mini_dfs::dataservice::types::{DataCommand, ServiceId};
use mini_dfs::liveness::beacon::{Beacon, BeaconTarget};
use mini_dfs::liveness::monitor::LivenessMonitor;
use mini_dfs::nameservice::service::NameService;
use mini_dfs::nameservice::types::NameCommand;
use mini_dfs::rpc::handlers::{data_node_router, name_node_router};
use mini_dfs::rpc::remote::RemoteDataService;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn usage(program: &str) -> ! {
    eprintln!("Usage: {} <standalone|data|name> [options]", program);
    eprintln!("  --bind <addr:port>       HTTP listen address (required)");
    eprintln!("  --root <dir>             storage root");
    eprintln!("  --config <file.json>     configuration file");
    eprintln!("  --chunk-size <bytes>     chunk size override");
    eprintln!("  --id <service id>        data node identity (data)");
    eprintln!("  --name-node <url>        where to send heartbeats (data)");
    eprintln!("  --data <id>=<url>        a data node, repeatable (name)");
    eprintln!("  --verbose                debug logging");
    eprintln!("Example: {} standalone --bind 127.0.0.1:7000 --root ./dfs", program);
    eprintln!(
        "Example: {} data --bind 127.0.0.1:7101 --id ds0 --root ./ds0 --name-node http://127.0.0.1:7000",
        program
    );
    eprintln!(
        "Example: {} name --bind 127.0.0.1:7000 --root ./dfs --data ds0=http://127.0.0.1:7101",
        program
    );
    std::process::exit(1);
}

fn value(args: &[String], i: usize) -> anyhow::Result<&str> {
    args.get(i + 1)
        .map(String::as_str)
        .with_context(|| format!("{} needs a value", args[i]))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let verbose = args.iter().any(|a| a == "--verbose");
    tracing_subscriber::fmt()
        .with_max_level(if verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    if args.len() < 2 {
        usage(&args[0]);
    }

    let mut bind_addr: Option<SocketAddr> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut root: Option<PathBuf> = None;
    let mut chunk_size: Option<usize> = None;
    let mut service_id: Option<String> = None;
    let mut name_node: Option<String> = None;
    let mut data_nodes: Vec<(ServiceId, String)> = vec![];

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" => {
                bind_addr = Some(value(&args, i)?.parse()?);
                i += 2;
            }
            "--config" => {
                config_path = Some(PathBuf::from(value(&args, i)?));
                i += 2;
            }
            "--root" => {
                root = Some(PathBuf::from(value(&args, i)?));
                i += 2;
            }
            "--chunk-size" => {
                chunk_size = Some(value(&args, i)?.parse()?);
                i += 2;
            }
            "--id" => {
                service_id = Some(value(&args, i)?.to_string());
                i += 2;
            }
            "--name-node" => {
                name_node = Some(value(&args, i)?.to_string());
                i += 2;
            }
            "--data" => {
                let entry = value(&args, i)?;
                let (id, url) = entry
                    .split_once('=')
                    .with_context(|| format!("expected <id>=<url>, got '{}'", entry))?;
                data_nodes.push((ServiceId::from(id), url.to_string()));
                i += 2;
            }
            "--verbose" => {
                i += 1;
            }
            other => {
                tracing::warn!("Ignoring unknown argument '{}'", other);
                i += 1;
            }
        }
    }

    let mut config = match &config_path {
        Some(path) => DfsConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {:?}", path))?,
        None => DfsConfig::default(),
    };
    if let Some(root) = root {
        config.root = root;
    }
    if let Some(chunk_size) = chunk_size {
        config.chunk_size = chunk_size;
    }

    let bind_addr = bind_addr.context("--bind is required")?;

    match args[1].as_str() {
        "standalone" => run_standalone(config, bind_addr).await,
        "data" => {
            let id = service_id.context("--id is required for a data node")?;
            run_data_node(config, bind_addr, ServiceId(id), name_node).await
        }
        "name" => run_name_node(config, bind_addr, data_nodes).await,
        _ => usage(&args[0]),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
    }
    tracing::info!("Shutdown requested");
}

/// Logs the liveness of every tracked data service on a fixed cadence.
fn spawn_stats_reporter(monitor: Arc<LivenessMonitor>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);

        loop {
            interval.tick().await;
            let services = monitor.snapshot();
            tracing::info!("Cluster stats: {} data services tracked", services.len());
            for (id, state, silent_for) in services {
                tracing::info!("  - {} {:?} (last report {:?} ago)", id, state, silent_for);
            }
        }
    });
}

async fn run_standalone(config: DfsConfig, bind_addr: SocketAddr) -> anyhow::Result<()> {
    // 1. Whole fleet in this process:
    let cluster = Cluster::start(config)?;
    spawn_stats_reporter(cluster.monitor().clone(), Duration::from_secs(30));

    // 2. Client API:
    let app = name_node_router(cluster.client(), cluster.monitor().clone());

    tracing::info!("HTTP server listening on {}", bind_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cluster.shutdown().await?;
    Ok(())
}

async fn run_data_node(
    config: DfsConfig,
    bind_addr: SocketAddr,
    id: ServiceId,
    name_node: Option<String>,
) -> anyhow::Result<()> {
    // 1. Chunk store and service loop:
    let (handle, task) = DataService::spawn(id.clone(), &config.root)?;

    // 2. Beacon towards the name node:
    let beacon = match name_node {
        Some(url) => {
            tracing::info!("Reporting liveness to {}", url);
            let probe = handle.clone();
            Some(Beacon::spawn(
                id.clone(),
                BeaconTarget::remote(&url),
                config.heartbeat_interval(),
                move || probe.is_running(),
            ))
        }
        None => {
            tracing::warn!("No --name-node given, running without a beacon");
            None
        }
    };

    // 3. HTTP server:
    let app = data_node_router(handle.clone());

    tracing::info!("Data node {} listening on {}", id, bind_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(beacon) = beacon {
        beacon.stop();
    }
    handle.call(DataCommand::Shutdown).await?;
    task.await?;
    Ok(())
}

async fn run_name_node(
    config: DfsConfig,
    bind_addr: SocketAddr,
    data_nodes: Vec<(ServiceId, String)>,
) -> anyhow::Result<()> {
    if data_nodes.len() < config.replication_factor {
        tracing::warn!(
            "Only {} data nodes configured; uploads need {}",
            data_nodes.len(),
            config.replication_factor
        );
    }

    // 1. Liveness monitor, fed by the /internal/heartbeat route:
    let monitor = LivenessMonitor::new(config.heartbeat_timeout());
    let poller = monitor.clone().start(config.monitor_interval());
    spawn_stats_reporter(monitor.clone(), Duration::from_secs(30));

    // 2. Remote fleet:
    let mut members: Vec<Arc<dyn DataEndpoint>> = Vec::with_capacity(data_nodes.len());
    for (id, url) in data_nodes {
        tracing::info!("Data node {} at {}", id, url);
        monitor.register(id.clone());
        members.push(Arc::new(RemoteDataService::new(id, &url)));
    }
    let fleet = Fleet::new(members);

    // 3. Name service and client facade:
    let (names, task) = NameService::spawn(
        &config.name_root(),
        fleet.clone(),
        monitor.clone(),
        config.replication_factor,
    )?;
    let client = Arc::new(DfsClient::new(
        names.clone(),
        fleet,
        monitor.clone(),
        config.chunk_size,
    ));

    // 4. HTTP server:
    let app = name_node_router(client, monitor);

    tracing::info!("Name node listening on {}", bind_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    poller.abort();
    names.call(NameCommand::Shutdown).await?;
    task.await?;
    Ok(())
}
