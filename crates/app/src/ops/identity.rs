use clap::Args;

use crate::state::StateError;

/// Print the logged-in user's network id and public keys
#[derive(Args, Debug, Clone)]
pub struct Identity;

#[derive(Debug, thiserror::Error)]
pub enum IdentityOpError {
    #[error("login failed: {0}")]
    Login(#[from] StateError),
}

#[async_trait::async_trait]
impl crate::op::Op for Identity {
    type Error = IdentityOpError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let (_, session) = ctx.login()?;
        let identity = &session.identity;

        Ok(format!(
            "user: {}\n\
             network id: {}\n\
             exchange key: {}\n\
             signing key: {}",
            session.username,
            identity.network_id(),
            identity.exchange_public().to_hex(),
            identity.signing_public().to_hex(),
        ))
    }
}
