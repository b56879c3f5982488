use clap::{Args, Subcommand};

pub mod add;
pub mod list;
pub mod permit;
pub mod remove;
pub mod rename;

use common::peers::PeerStoreError;

use crate::op::Op;
use crate::state::StateError;

crate::command_enum! {
    (Add, add::Add),
    (Ls, list::List),
    (Rm, remove::Remove),
    (Mv, rename::Rename),
    (Permit, permit::Permit),
}

// Rename the generated Command to PeerCommand for clarity
pub type PeerCommand = Command;

/// Manage the logged-in user's trusted peers
#[derive(Args, Debug, Clone)]
pub struct Peer {
    #[command(subcommand)]
    pub command: PeerCommand,
}

#[async_trait::async_trait]
impl Op for Peer {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}

/// Error shared by the peer subcommands
#[derive(Debug, thiserror::Error)]
pub enum PeerOpError {
    #[error("login failed: {0}")]
    Login(#[from] StateError),
    #[error("peer store error: {0}")]
    Store(#[from] PeerStoreError),
    #[error("no peer with alias '{0}'")]
    UnknownAlias(String),
}
