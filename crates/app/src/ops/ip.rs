use clap::Args;

use common::net;

/// Print the addresses a peer could reach us on
#[derive(Args, Debug, Clone)]
pub struct Ip {
    /// Only print the outbound-route LAN address
    #[arg(long)]
    pub local: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum IpError {
    #[error("no route to determine a local address")]
    NoLocalAddress,
}

#[async_trait::async_trait]
impl crate::op::Op for Ip {
    type Error = IpError;
    type Output = String;

    async fn execute(&self, _ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let local = net::local_ip();
        if self.local {
            return local
                .map(|ip| ip.to_string())
                .ok_or(IpError::NoLocalAddress);
        }

        let public = net::public_ip().await;
        let local = local.map_or_else(|| "unknown".to_string(), |ip| ip.to_string());
        Ok(format!("public: {}\nlocal: {}", public, local))
    }
}
