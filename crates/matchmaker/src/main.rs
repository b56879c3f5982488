//! GhostSync matchmaker - pairs two peers that name the same room
//!
//! Each peer makes one TCP request. The first is told to wait, the second is
//! handed the first peer's observed address, and the room is forgotten.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use common::matchmaker::{Matchmaker, MatchmakerConfig, DEFAULT_MATCH_PORT};

/// GhostSync matchmaker - pairs two peers that name the same room
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to accept match requests on
    #[arg(short, long, default_value_t = DEFAULT_MATCH_PORT)]
    port: u16,

    /// Forget rooms whose second peer has not arrived within this many seconds
    #[arg(long)]
    room_ttl_secs: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(std::io::stdout());
    let log_level: tracing::Level = args.log_level.parse().unwrap_or(tracing::Level::INFO);
    let env_filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(non_blocking_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(stdout_layer).init();

    let build = common::build_info!();
    tracing::info!(version = build.version, profile = build.build_profile, "starting matchmaker");

    let matchmaker = Matchmaker::new(MatchmakerConfig {
        listen_addr: SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), args.port),
        room_ttl: args.room_ttl_secs.map(Duration::from_secs),
    });

    // Set up graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl+c: {}", e);
            return;
        }
        tracing::info!("Received shutdown signal");
        let _ = shutdown_tx.send(());
    });

    matchmaker.run(shutdown_rx).await?;
    Ok(())
}
