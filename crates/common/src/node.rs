use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::watch::Receiver as WatchReceiver;

use crate::discovery::{DiscoveredPeers, Discovery, DiscoveryConfig, DiscoveryError};
use crate::identity::Identity;
use crate::peers::{PeerRecord, PeerStore};
use crate::transfer::{TransferConfig, TransferError, TransferProtocol};

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("an identity is required")]
    MissingIdentity,
    #[error("a peer store is required")]
    MissingPeerStore,
    #[error("an inbox directory is required")]
    MissingInbox,
    #[error("no peer with alias '{0}'")]
    UnknownAlias(String),
    #[error("peer '{0}' was not seen on the local network")]
    NotDiscovered(String),
    #[error("failed to bind {0}: {1}")]
    Bind(&'static str, std::io::Error),
    #[error("discovery error: {0}")]
    Discovery(#[from] DiscoveryError),
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),
}

#[derive(Default)]
pub struct NodeBuilder {
    identity: Option<Identity>,
    peer_store: Option<PeerStore>,
    inbox: Option<PathBuf>,
    transfer_config: TransferConfig,
    discovery_config: DiscoveryConfig,
    discovered: Option<DiscoveredPeers>,
}

impl NodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn peer_store(mut self, peer_store: PeerStore) -> Self {
        self.peer_store = Some(peer_store);
        self
    }

    /// Directory received files are written to
    pub fn inbox(mut self, inbox: impl Into<PathBuf>) -> Self {
        self.inbox = Some(inbox.into());
        self
    }

    pub fn transfer_config(mut self, config: TransferConfig) -> Self {
        self.transfer_config = config;
        self
    }

    pub fn discovery_config(mut self, config: DiscoveryConfig) -> Self {
        self.discovery_config = config;
        self
    }

    /// Share an existing discovered-peer map instead of starting a fresh one
    pub fn discovered(mut self, discovered: DiscoveredPeers) -> Self {
        self.discovered = Some(discovered);
        self
    }

    pub fn build(self) -> Result<GhostNode, NodeError> {
        let identity = self.identity.ok_or(NodeError::MissingIdentity)?;
        let peer_store = self.peer_store.ok_or(NodeError::MissingPeerStore)?;
        let inbox = self.inbox.ok_or(NodeError::MissingInbox)?;

        let discovery = Discovery::with_peers(
            identity.network_id(),
            self.discovery_config,
            self.discovered.unwrap_or_default(),
        );
        let transfer = TransferProtocol::new(identity, peer_store, inbox, self.transfer_config);

        Ok(GhostNode {
            discovery: Arc::new(discovery),
            transfer: Arc::new(transfer),
        })
    }
}

/// One logged-in peer: its discovery service and its transfer endpoint
///
/// Cheap to clone; clones share the same state.
#[derive(Debug, Clone)]
pub struct GhostNode {
    discovery: Arc<Discovery>,
    transfer: Arc<TransferProtocol>,
}

/// Sockets a node receives on, bound ahead of [`GhostNode::run`]
#[derive(Debug)]
pub struct NodeSockets {
    pub transfer: UdpSocket,
    pub discovery: UdpSocket,
}

impl NodeSockets {
    pub fn transfer_addr(&self) -> Option<SocketAddr> {
        self.transfer.local_addr().ok()
    }

    pub fn discovery_addr(&self) -> Option<SocketAddr> {
        self.discovery.local_addr().ok()
    }
}

impl GhostNode {
    pub fn builder() -> NodeBuilder {
        NodeBuilder::new()
    }

    pub fn identity(&self) -> &Identity {
        self.transfer.identity()
    }

    pub fn network_id(&self) -> &str {
        self.discovery.network_id()
    }

    pub fn peer_store(&self) -> &PeerStore {
        self.transfer.store()
    }

    pub fn discovered(&self) -> &DiscoveredPeers {
        self.discovery.peers()
    }

    pub fn discovery(&self) -> &Arc<Discovery> {
        &self.discovery
    }

    pub fn transfer(&self) -> &Arc<TransferProtocol> {
        &self.transfer
    }

    /// Bind the transfer and discovery ports from the configs
    pub async fn bind(&self) -> Result<NodeSockets, NodeError> {
        let transfer = UdpSocket::bind(self.transfer.config().listen_addr)
            .await
            .map_err(|e| NodeError::Bind("transfer port", e))?;
        let discovery = UdpSocket::bind(self.discovery.config().listen_addr)
            .await
            .map_err(|e| NodeError::Bind("discovery port", e))?;
        Ok(NodeSockets {
            transfer,
            discovery,
        })
    }

    /// Run the broadcast, listen and transfer server loops until shutdown
    ///
    /// Returns early only if the broadcaster cannot start.
    pub async fn run(
        &self,
        sockets: NodeSockets,
        shutdown_rx: WatchReceiver<()>,
    ) -> Result<(), NodeError> {
        tracing::info!(
            network_id = %self.network_id(),
            transfer = ?sockets.transfer_addr(),
            discovery = ?sockets.discovery_addr(),
            "node running"
        );

        let NodeSockets {
            transfer: transfer_socket,
            discovery: discovery_socket,
        } = sockets;
        let discovery = &self.discovery;
        let transfer = self.transfer.clone();

        let broadcast_rx = shutdown_rx.clone();
        let broadcast = async move {
            discovery
                .broadcast_loop(broadcast_rx)
                .await
                .map_err(NodeError::from)
        };
        let listen_rx = shutdown_rx.clone();
        let listen = async move {
            discovery.listen_on(discovery_socket, listen_rx).await;
            Ok::<_, NodeError>(())
        };
        let server = async move {
            transfer.serve_on(transfer_socket, shutdown_rx).await;
            Ok::<_, NodeError>(())
        };

        tokio::try_join!(broadcast, listen, server)?;
        tracing::info!("node stopped");
        Ok(())
    }

    /// Look up a trusted peer and where it was last seen
    pub fn resolve(&self, alias: &str) -> Result<(PeerRecord, Option<IpAddr>), NodeError> {
        let record = self
            .peer_store()
            .get(alias)
            .ok_or_else(|| NodeError::UnknownAlias(alias.to_string()))?;
        let ip = self.discovered().get(&record.network_id);
        Ok((record, ip))
    }

    /// Send a file to a trusted peer by alias
    ///
    /// Without an explicit `ip`, waits up to `wait` for the peer to show up
    /// in discovery. The returned flag has [`TransferProtocol::send_file`]'s meaning.
    pub async fn send_to_alias(
        &self,
        alias: &str,
        file_path: &Path,
        ip: Option<IpAddr>,
        wait: Duration,
        progress: impl Fn(u8) + Send + Sync,
    ) -> Result<bool, NodeError> {
        let (record, seen) = self.resolve(alias)?;
        let ip = match ip.or(seen) {
            Some(ip) => ip,
            None => self
                .discovered()
                .wait_for(&record.network_id, wait)
                .await
                .ok_or_else(|| NodeError::NotDiscovered(alias.to_string()))?,
        };

        Ok(self
            .transfer
            .send_file(ip, file_path, &record.exchange_public_key, progress)
            .await)
    }
}

/// Bind and run `node` until shutdown
pub async fn spawn(node: GhostNode, shutdown_rx: WatchReceiver<()>) -> Result<(), NodeError> {
    let sockets = node.bind().await?;
    node.run(sockets, shutdown_rx).await
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::Secret;
    use crate::identity::derive_identity;

    fn node(dir: &Path) -> GhostNode {
        GhostNode::builder()
            .identity(derive_identity("alice", "pw", Some(&b"salt"[..])).unwrap())
            .peer_store(PeerStore::new(
                dir.join("trusted_peers.enc"),
                Secret::from_passphrase("pw", b"salt"),
            ))
            .inbox(dir.join("inbox"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_parts() {
        assert!(matches!(
            NodeBuilder::new().build(),
            Err(NodeError::MissingIdentity)
        ));
    }

    #[test]
    fn test_resolve_uses_discovered_address() {
        let dir = tempfile::TempDir::new().unwrap();
        let node = node(dir.path());
        let bob = derive_identity("bob", "pw", Some(&b"salt"[..])).unwrap();
        node.peer_store()
            .add_peer("Bravo", &bob.network_id(), &bob.exchange_public().to_hex())
            .unwrap();

        let (record, ip) = node.resolve("Bravo").unwrap();
        assert_eq!(record.network_id, bob.network_id());
        assert!(ip.is_none());

        node.discovered()
            .insert(bob.network_id(), "192.168.1.7".parse().unwrap());
        let (_, ip) = node.resolve("Bravo").unwrap();
        assert_eq!(ip, Some("192.168.1.7".parse().unwrap()));

        assert!(matches!(
            node.resolve("Nobody"),
            Err(NodeError::UnknownAlias(_))
        ));
    }

    #[tokio::test]
    async fn test_send_to_undiscovered_peer_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let node = node(dir.path());
        let bob = derive_identity("bob", "pw", Some(&b"salt"[..])).unwrap();
        node.peer_store()
            .add_peer("Bravo", &bob.network_id(), &bob.exchange_public().to_hex())
            .unwrap();

        let result = node
            .send_to_alias(
                "Bravo",
                Path::new("unused"),
                None,
                Duration::from_millis(20),
                |_| {},
            )
            .await;
        assert!(matches!(result, Err(NodeError::NotDiscovered(_))));
    }
}
