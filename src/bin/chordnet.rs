//! Process entry point (§10.5): parse the CLI, build a `Ring`, spawn its maintenance
//! daemons and TCP listener, and run until interrupted.

use chordnet::capability::PeerConnector;
use chordnet::cli::Cli;
use chordnet::config::Settings;
use chordnet::node::NodeInfo;
use chordnet::ring::Ring;
use chordnet::service::Service;
use chordnet::transport::tcp::TcpPeerConnector;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.env_filter_directive()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut settings = Settings::default().with_replicas(cli.replicas);
    settings.bootstrap_addr = cli.join.as_deref().map(|addr| addr.parse().expect("--join must be ip:port"));
    let local = NodeInfo::new(cli.ip, cli.port);
    let connector = TcpPeerConnector::new(settings.idle_connection_expiry, settings.rpc_timeout);
    let bootstrap_addr = settings.bootstrap_addr;
    let ring = Ring::new(local, connector.clone(), settings);

    if let Some(bootstrap_addr) = bootstrap_addr {
        let bootstrap_info = NodeInfo::new(bootstrap_addr.ip(), bootstrap_addr.port());
        let bootstrap = connector.connect(bootstrap_info);
        ring.join(bootstrap).await.expect("failed to join ring through bootstrap peer");
        tracing::info!(bootstrap = %bootstrap_addr, "joined ring");
    } else {
        tracing::info!("starting a new single-node ring");
    }

    let service = Service::spawn(ring.clone());

    let listen_addr = local.socket_addr();
    let listener_ring = ring.clone();
    let listener = tokio::spawn(async move {
        if let Err(e) = chordnet::transport::tcp::serve(listener_ring, listen_addr).await {
            tracing::error!(error = %e, "TCP listener exited");
        }
    });

    tracing::info!(local = %local, "chordnet peer running");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    listener.abort();
    service.shutdown().await;
    Ok(())
}
