use clap::Args;
use common::peers::Permissions;

use super::PeerOpError;

/// Replace what a trusted peer may pull from us
#[derive(Args, Debug, Clone)]
pub struct Permit {
    pub alias: String,

    /// Project the peer may access (repeatable)
    #[arg(long = "project")]
    pub projects: Vec<String>,

    /// Inventory item the peer may access (repeatable)
    #[arg(long = "inventory")]
    pub inventory: Vec<String>,
}

#[async_trait::async_trait]
impl crate::op::Op for Permit {
    type Error = PeerOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let (_, session) = ctx.login()?;
        session.peers.set_permissions(
            &self.alias,
            Permissions {
                projects: self.projects.clone(),
                inventory: self.inventory.clone(),
            },
        )?;
        Ok(format!(
            "'{}' may access {} project(s) and {} inventory item(s)",
            self.alias,
            self.projects.len(),
            self.inventory.len()
        ))
    }
}
