//! Address helpers for telling a peer where to reach us

use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::time::Duration;

/// Echo service that answers with the caller's public address as plain text
pub const PUBLIC_IP_ECHO_URL: &str = "https://ident.me";

const ECHO_TIMEOUT: Duration = Duration::from_secs(5);
// Never contacted; connecting a UDP socket only selects the outbound route
const ROUTE_PROBE_ADDR: (Ipv4Addr, u16) = (Ipv4Addr::new(8, 8, 8, 8), 80);

#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("echo request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("echo service returned an invalid address: {0}")]
    InvalidAddress(String),
}

/// Best guess at our public address
///
/// Asks the echo service first. Without internet access this falls back to
/// the address of the default route, then to loopback.
pub async fn public_ip() -> IpAddr {
    match echo_ip(PUBLIC_IP_ECHO_URL).await {
        Ok(ip) => ip,
        Err(e) => {
            tracing::debug!("public ip lookup failed, using local address: {}", e);
            local_ip().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
        }
    }
}

/// Fetch our address as seen by the echo service at `url`
pub async fn echo_ip(url: &str) -> Result<IpAddr, NetError> {
    let client = reqwest::Client::builder().timeout(ECHO_TIMEOUT).build()?;
    let body = client.get(url).send().await?.error_for_status()?.text().await?;
    let body = body.trim();
    body.parse()
        .map_err(|_| NetError::InvalidAddress(body.to_string()))
}

/// Address of the interface that carries the default route
pub fn local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect(ROUTE_PROBE_ADDR).ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then_some(ip)
}
