use clap::Args;

use super::PeerOpError;

#[derive(Args, Debug, Clone)]
pub struct Rename {
    pub old_alias: String,
    pub new_alias: String,
}

#[async_trait::async_trait]
impl crate::op::Op for Rename {
    type Error = PeerOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let (_, session) = ctx.login()?;
        if !session.peers.rename(&self.old_alias, &self.new_alias)? {
            return Err(PeerOpError::UnknownAlias(self.old_alias.clone()));
        }
        Ok(format!("Renamed '{}' to '{}'", self.old_alias, self.new_alias))
    }
}
