use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use common::discovery::DiscoveryError;
use common::node::NodeError;
use common::transfer::TransferError;
use tokio::sync::watch;

use crate::state::StateError;

/// Send files to a trusted peer
#[derive(Args, Debug, Clone)]
pub struct SendFiles {
    /// Alias of the receiving peer
    pub alias: String,

    /// Files to send, one after another
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Send to this address instead of looking the peer up on the LAN
    #[arg(long)]
    pub ip: Option<IpAddr>,

    /// Transfer port on the receiving side (default: the configured transfer port)
    #[arg(long)]
    pub port: Option<u16>,

    /// How long to listen for the peer's discovery beacon
    #[arg(long, default_value_t = 12)]
    pub wait_secs: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("login failed: {0}")]
    Login(#[from] StateError),
    #[error("{0}")]
    Node(#[from] NodeError),
    #[error("discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),
    #[error("send failed: {0}")]
    Transfer(#[from] TransferError),
}

#[async_trait::async_trait]
impl crate::op::Op for SendFiles {
    type Error = SendError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let (state, session) = ctx.login()?;
        let node = session.node(&state.config)?;
        let (record, seen) = node.resolve(&self.alias)?;

        let ip = match self.ip.or(seen) {
            Some(ip) => ip,
            None => {
                // Listen on the discovery port just long enough to hear the peer
                let (shutdown_tx, shutdown_rx) = watch::channel(());
                let discovery = node.discovery().clone();
                let listener =
                    tokio::spawn(async move { discovery.listen_loop(shutdown_rx).await });

                let found = node
                    .discovered()
                    .wait_for(&record.network_id, Duration::from_secs(self.wait_secs))
                    .await;
                let _ = shutdown_tx.send(());
                if let Ok(Err(e)) = listener.await {
                    return Err(e.into());
                }

                found.ok_or_else(|| NodeError::NotDiscovered(self.alias.clone()))?
            }
        };

        let target = SocketAddr::new(ip, self.port.unwrap_or(state.config.transfer_port));
        let count = self.files.len();
        let sent = node
            .transfer()
            .send_files(
                target,
                &self.files,
                &record.exchange_public_key,
                |index, percent| {
                    if percent == 100 {
                        eprintln!("[{}/{}] sent", index + 1, count);
                    }
                },
            )
            .await?;

        Ok(format!(
            "Sent {} file(s) ({} bytes on the wire) to '{}' at {}",
            count, sent, self.alias, target
        ))
    }
}
