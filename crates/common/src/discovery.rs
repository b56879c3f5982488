//! LAN peer discovery
//!
//! Every running peer broadcasts a beacon carrying its network id on a fixed
//! port, and listens on that port for everyone else's. The result is a map
//! from network id to the IP address the beacon last came from.
//!
//! Beacons are not authenticated. The map is only an address hint: a spoofed
//! entry can at worst send a transfer to the wrong host, where it fails to
//! decrypt. Authentication happens in [`crate::transfer`] via the session key.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::net::UdpSocket;
use tokio::sync::{watch, Notify};

pub use std::net::IpAddr;

/// Well-known port beacons are sent to and received on
pub const DEFAULT_DISCOVERY_PORT: u16 = 5556;
/// Prefix every beacon payload starts with
pub const BEACON_PREFIX: &str = "GHOST_DISCOVERY:";
/// How often a beacon is broadcast
pub const DEFAULT_BEACON_INTERVAL: Duration = Duration::from_secs(10);

const MAX_BEACON_SIZE: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("failed to bind discovery socket: {0}")]
    Bind(std::io::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the beacon payload announcing `network_id`
pub fn encode_beacon(network_id: &str) -> Vec<u8> {
    format!("{}{}", BEACON_PREFIX, network_id).into_bytes()
}

/// Extract the network id from a beacon payload, if it is one
pub fn parse_beacon(data: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(data).ok()?;
    let id = text.strip_prefix(BEACON_PREFIX)?.trim();
    if id.is_empty() || id.contains(':') {
        return None;
    }
    Some(id.to_string())
}

/// Process-wide network id -> last seen IP map
///
/// Written by the listen loop, read by anything resolving a LAN address.
/// Cheap to clone; clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct DiscoveredPeers {
    inner: Arc<RwLock<HashMap<String, IpAddr>>>,
    changed: Arc<Notify>,
}

impl DiscoveredPeers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, network_id: impl Into<String>, ip: IpAddr) -> Option<IpAddr> {
        let previous = self.inner.write().insert(network_id.into(), ip);
        self.changed.notify_waiters();
        previous
    }

    pub fn get(&self, network_id: &str) -> Option<IpAddr> {
        self.inner.read().get(network_id).copied()
    }

    pub fn snapshot(&self) -> HashMap<String, IpAddr> {
        self.inner.read().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Wait until `network_id` has been seen, or give up after `timeout`
    pub async fn wait_for(&self, network_id: &str, timeout: Duration) -> Option<IpAddr> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Registered before the check so an insert in between still wakes us
            let notified = self.changed.notified();
            if let Some(ip) = self.get(network_id) {
                return Some(ip);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.get(network_id);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Address the listen loop binds
    pub listen_addr: SocketAddr,
    /// Where beacons are sent
    pub broadcast_addr: SocketAddr,
    pub beacon_interval: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), DEFAULT_DISCOVERY_PORT),
            broadcast_addr: SocketAddr::new(Ipv4Addr::BROADCAST.into(), DEFAULT_DISCOVERY_PORT),
            beacon_interval: DEFAULT_BEACON_INTERVAL,
        }
    }
}

/// Beacon broadcaster and listener for one local identity
#[derive(Debug)]
pub struct Discovery {
    network_id: String,
    config: DiscoveryConfig,
    peers: DiscoveredPeers,
}

impl Discovery {
    pub fn new(network_id: impl Into<String>, config: DiscoveryConfig) -> Self {
        Self::with_peers(network_id, config, DiscoveredPeers::new())
    }

    pub fn with_peers(
        network_id: impl Into<String>,
        config: DiscoveryConfig,
        peers: DiscoveredPeers,
    ) -> Self {
        Self {
            network_id: network_id.into(),
            config,
            peers,
        }
    }

    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    pub fn peers(&self) -> &DiscoveredPeers {
        &self.peers
    }

    /// Record the sender of a beacon. Returns the announced id if the
    /// datagram was a beacon from someone other than us.
    pub fn handle_beacon(&self, data: &[u8], from: SocketAddr) -> Option<String> {
        let peer_id = parse_beacon(data)?;
        if peer_id == self.network_id {
            return None;
        }

        if self.peers.insert(peer_id.clone(), from.ip()) != Some(from.ip()) {
            tracing::info!(peer_id = %peer_id, ip = %from.ip(), "discovered peer");
        }
        Some(peer_id)
    }

    /// Broadcast our beacon every `beacon_interval` until shutdown
    ///
    /// Failed sends are logged and skipped.
    pub async fn broadcast_loop(
        &self,
        mut shutdown_rx: watch::Receiver<()>,
    ) -> Result<(), DiscoveryError> {
        let bind_addr = match self.config.broadcast_addr {
            SocketAddr::V4(_) => SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0),
            SocketAddr::V6(_) => SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), 0),
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(DiscoveryError::Bind)?;
        socket.set_broadcast(true)?;

        let beacon = encode_beacon(&self.network_id);
        tracing::debug!(to = %self.config.broadcast_addr, "broadcast loop running");

        loop {
            if let Err(e) = socket.send_to(&beacon, self.config.broadcast_addr).await {
                tracing::debug!("beacon send failed: {}", e);
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.beacon_interval) => {}
                _ = shutdown_rx.changed() => break,
            }
        }

        tracing::debug!("broadcast loop stopped");
        Ok(())
    }

    /// Bind the configured discovery port and listen for beacons until shutdown
    pub async fn listen_loop(&self, shutdown_rx: watch::Receiver<()>) -> Result<(), DiscoveryError> {
        let socket = UdpSocket::bind(self.config.listen_addr)
            .await
            .map_err(DiscoveryError::Bind)?;
        self.listen_on(socket, shutdown_rx).await;
        Ok(())
    }

    /// Listen for beacons on an already bound socket until shutdown
    pub async fn listen_on(&self, socket: UdpSocket, mut shutdown_rx: watch::Receiver<()>) {
        let mut buf = [0u8; MAX_BEACON_SIZE];
        tracing::debug!(addr = ?socket.local_addr().ok(), "listen loop running");

        loop {
            tokio::select! {
                received = socket.recv_from(&mut buf) => match received {
                    Ok((len, from)) => {
                        self.handle_beacon(&buf[..len], from);
                    }
                    Err(e) => tracing::debug!("discovery receive failed: {}", e),
                },
                _ = shutdown_rx.changed() => break,
            }
        }

        tracing::debug!("listen loop stopped");
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_beacon() {
        assert_eq!(
            parse_beacon(&encode_beacon("abc123")),
            Some("abc123".to_string())
        );
        assert_eq!(parse_beacon(b"GHOST_DISCOVERY:"), None);
        assert_eq!(parse_beacon(b"HELLO:abc123"), None);
        assert_eq!(parse_beacon(&[0xff, 0xfe, 0x00]), None);
    }

    #[test]
    fn test_handle_beacon_updates_map() {
        let discovery = Discovery::new("local-id", DiscoveryConfig::default());

        let id = discovery.handle_beacon(b"GHOST_DISCOVERY:abc123", addr("192.168.1.20:5556"));
        assert_eq!(id.as_deref(), Some("abc123"));
        assert_eq!(
            discovery.peers().get("abc123"),
            Some("192.168.1.20".parse().unwrap())
        );

        // A newer beacon moves the mapping
        discovery.handle_beacon(b"GHOST_DISCOVERY:abc123", addr("192.168.1.31:40000"));
        assert_eq!(
            discovery.peers().get("abc123"),
            Some("192.168.1.31".parse().unwrap())
        );
        assert_eq!(discovery.peers().len(), 1);
    }

    #[test]
    fn test_ignores_own_and_foreign_datagrams() {
        let discovery = Discovery::new("local-id", DiscoveryConfig::default());

        assert!(discovery
            .handle_beacon(b"GHOST_DISCOVERY:local-id", addr("10.0.0.2:5556"))
            .is_none());
        assert!(discovery
            .handle_beacon(b"PUNCH", addr("10.0.0.2:5556"))
            .is_none());
        assert!(discovery.peers().is_empty());
    }

    #[tokio::test]
    async fn test_wait_for_wakes_on_insert() {
        let peers = DiscoveredPeers::new();
        let writer = peers.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            writer.insert("abc123", "10.0.0.9".parse().unwrap());
        });

        let ip = peers.wait_for("abc123", Duration::from_secs(5)).await;
        assert_eq!(ip, Some("10.0.0.9".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_wait_for_times_out() {
        let peers = DiscoveredPeers::new();
        let ip = peers.wait_for("nobody", Duration::from_millis(50)).await;
        assert!(ip.is_none());
    }
}
