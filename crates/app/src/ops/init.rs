use std::net::IpAddr;

use clap::Args;
use common::identity::IdentityError;

use crate::state::{AppConfig, AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// UDP port for incoming transfers
    #[arg(long)]
    pub transfer_port: Option<u16>,

    /// UDP port for discovery beacons
    #[arg(long)]
    pub discovery_port: Option<u16>,

    /// Where discovery beacons are sent (default: 255.255.255.255)
    #[arg(long)]
    pub broadcast_addr: Option<IpAddr>,

    /// Matchmaker address used by `ghost room`, as host:port
    #[arg(long)]
    pub matchmaker: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] StateError),
}

impl Init {
    fn config(&self) -> AppConfig {
        let mut config = AppConfig::default();
        if let Some(port) = self.transfer_port {
            config.transfer_port = port;
        }
        if let Some(port) = self.discovery_port {
            config.discovery_port = port;
        }
        if let Some(addr) = self.broadcast_addr {
            config.broadcast_addr = addr;
        }
        config.matchmaker_addr = self.matchmaker.clone();
        config
    }
}

#[async_trait::async_trait]
impl crate::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        // A second init only adds users to an existing directory
        let (state, created) = match AppState::init(ctx.config_path.clone(), Some(self.config())) {
            Ok(state) => (state, true),
            Err(StateError::AlreadyInitialized) => (ctx.state()?, false),
            Err(e) => return Err(e.into()),
        };

        let mut lines = Vec::new();
        if created {
            lines.push(format!(
                "Initialized ghost directory at: {}\n\
                 - Config: {}\n\
                 - Transfer port: {}\n\
                 - Discovery port: {}",
                state.ghost_dir.display(),
                state.config_path.display(),
                state.config.transfer_port,
                state.config.discovery_port,
            ));
        } else {
            lines.push(format!(
                "Using existing ghost directory at: {}",
                state.ghost_dir.display()
            ));
        }

        if let Some(user) = &ctx.user {
            match state.create_user(user) {
                Ok(salt_path) => {
                    lines.push(format!("- Salt for '{}': {}", user, salt_path.display()))
                }
                Err(StateError::Identity(IdentityError::SaltExists(path))) => {
                    lines.push(format!("- Salt for '{}' already exists: {}", user, path))
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(lines.join("\n"))
    }
}
