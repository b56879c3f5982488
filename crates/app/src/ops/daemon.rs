use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use tokio::time::timeout;

use crate::process::{init_logging, utils};
use crate::state::StateError;

const FINAL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Run discovery and the transfer server until interrupted
#[derive(Args, Debug, Clone)]
pub struct Daemon {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    /// Also write daily log files here (default: from config)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("state error: {0}")]
    StateError(#[from] StateError),

    #[error("failed to install signal handlers: {0}")]
    Signals(std::io::Error),

    #[error("daemon failed: {0}")]
    Failed(String),
}

#[async_trait::async_trait]
impl crate::op::Op for Daemon {
    type Error = DaemonError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let (state, session) = ctx.login()?;

        let log_dir = self.log_dir.clone().or_else(|| state.config.log_dir.clone());
        let _guards = init_logging(self.log_level, log_dir.as_deref());

        let node = session.node(&state.config).map_err(StateError::from)?;
        tracing::info!(
            user = %session.username,
            network_id = %node.network_id(),
            inbox = %session.inbox.display(),
            "logged in"
        );

        let (graceful_waiter, _shutdown_tx, shutdown_rx) =
            utils::graceful_shutdown_blocker().map_err(DaemonError::Signals)?;

        let mut node_handle = tokio::spawn(common::node::spawn(node, shutdown_rx));

        // The node only returns on its own if it failed to start
        tokio::select! {
            _ = graceful_waiter => {}
            result = &mut node_handle => {
                return match result {
                    Ok(Ok(())) => Ok("daemon ended".to_string()),
                    Ok(Err(e)) => Err(DaemonError::Failed(e.to_string())),
                    Err(e) => Err(DaemonError::Failed(e.to_string())),
                };
            }
        }

        match timeout(FINAL_SHUTDOWN_TIMEOUT, node_handle).await {
            Ok(Ok(Err(e))) => tracing::error!("node error: {}", e),
            Ok(_) => {}
            Err(_) => {
                tracing::error!(
                    "Failed to shut down within {} seconds",
                    FINAL_SHUTDOWN_TIMEOUT.as_secs()
                );
            }
        }

        Ok("daemon ended".to_string())
    }
}
