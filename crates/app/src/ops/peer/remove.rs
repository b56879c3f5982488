use clap::Args;

use super::PeerOpError;

#[derive(Args, Debug, Clone)]
pub struct Remove {
    pub alias: String,
}

#[async_trait::async_trait]
impl crate::op::Op for Remove {
    type Error = PeerOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let (_, session) = ctx.login()?;
        if !session.peers.delete(&self.alias)? {
            return Err(PeerOpError::UnknownAlias(self.alias.clone()));
        }
        Ok(format!("Removed '{}'", self.alias))
    }
}
