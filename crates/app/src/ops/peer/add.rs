use clap::Args;

use super::PeerOpError;

/// Trust a peer under an alias
#[derive(Args, Debug, Clone)]
pub struct Add {
    /// Local name for the peer
    pub alias: String,

    /// The peer's network id (from `ghost identity` on their side)
    pub network_id: String,

    /// The peer's hex exchange key
    pub exchange_key: String,
}

#[async_trait::async_trait]
impl crate::op::Op for Add {
    type Error = PeerOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let (_, session) = ctx.login()?;
        let record = session
            .peers
            .add_peer(&self.alias, &self.network_id, &self.exchange_key)?;
        Ok(format!("Trusted '{}' ({})", self.alias, record.network_id))
    }
}
