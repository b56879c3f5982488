use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use tempfile::TempDir;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::crypto::Secret;
use crate::discovery::DiscoveryConfig;
use crate::identity::{create_salt, Identity};
use crate::node::{GhostNode, NodeError};
use crate::peers::{PeerStore, PEERS_FILE_NAME};
use crate::transfer::TransferConfig;

const TEST_PASSPHRASE: &str = "testkit passphrase";

/// A logged-in peer living in its own temp directory, bound to loopback
pub struct TestPeer {
    /// The name of this peer, also its username
    pub name: String,
    dir: TempDir,
    node: GhostNode,
    transfer_addr: Option<SocketAddr>,
    shutdown_tx: Option<watch::Sender<()>>,
    node_task: Option<JoinHandle<Result<(), NodeError>>>,
}

impl TestPeer {
    /// Create a peer with a fresh salt, identity and empty peer store
    pub async fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let dir = tempfile::tempdir()?;

        let salt_path = dir.path().join(format!("salt_{}.bin", name));
        create_salt(&salt_path)?;
        let identity = Identity::load(&name, TEST_PASSPHRASE, &salt_path)?;
        let salt = std::fs::read(&salt_path)?;

        let store = PeerStore::new(
            dir.path().join("users").join(&name).join(PEERS_FILE_NAME),
            Secret::from_passphrase(TEST_PASSPHRASE, &salt),
        );

        let node = GhostNode::builder()
            .identity(identity)
            .peer_store(store)
            .inbox(dir.path().join("projects").join(&name))
            .transfer_config(TransferConfig {
                listen_addr: "127.0.0.1:0".parse()?,
                punch_delay: Duration::from_millis(10),
                ..TransferConfig::default()
            })
            .discovery_config(DiscoveryConfig {
                listen_addr: "127.0.0.1:0".parse()?,
                // Nothing listens here; beacons from test peers go nowhere
                broadcast_addr: "127.0.0.1:9".parse()?,
                beacon_interval: Duration::from_millis(200),
            })
            .build()?;

        Ok(Self {
            name,
            dir,
            node,
            transfer_addr: None,
            shutdown_tx: None,
            node_task: None,
        })
    }

    /// Bind loopback sockets and run the node in the background
    pub async fn start(&mut self) -> Result<()> {
        if self.node_task.is_some() {
            return Err(anyhow!("Peer already started"));
        }

        let sockets = self.node.bind().await?;
        self.transfer_addr = sockets.transfer_addr();

        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let node = self.node.clone();
        let name = self.name.clone();
        let handle = tokio::spawn(async move {
            let result = node.run(sockets, shutdown_rx).await;
            if let Err(e) = &result {
                tracing::error!("[{}] node error: {}", name, e);
            }
            result
        });

        self.shutdown_tx = Some(shutdown_tx);
        self.node_task = Some(handle);

        tracing::info!(
            "[{}] started as {} on {:?}",
            self.name,
            self.network_id(),
            self.transfer_addr
        );
        Ok(())
    }

    /// Signal shutdown and wait for the node to finish
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(handle) = self.node_task.take() {
            if let Some(tx) = self.shutdown_tx.take() {
                let _ = tx.send(());
            }
            handle.await??;
            tracing::info!("[{}] stopped", self.name);
        }
        Ok(())
    }

    pub fn node(&self) -> &GhostNode {
        &self.node
    }

    pub fn network_id(&self) -> &str {
        self.node.network_id()
    }

    pub fn exchange_public_hex(&self) -> String {
        self.node.identity().exchange_public().to_hex()
    }

    pub fn peer_store(&self) -> &PeerStore {
        self.node.peer_store()
    }

    /// Where this peer's transfer server listens; set once started
    pub fn transfer_addr(&self) -> Result<SocketAddr> {
        self.transfer_addr
            .ok_or_else(|| anyhow!("[{}] not started", self.name))
    }

    pub fn inbox(&self) -> &Path {
        self.node.transfer().inbox()
    }

    /// Trust `other` under `alias`
    pub fn trust(&self, alias: &str, other: &TestPeer) -> Result<()> {
        self.peer_store()
            .add_peer(alias, other.network_id(), &other.exchange_public_hex())?;
        Ok(())
    }

    /// Write a file into this peer's scratch space, returning its path
    pub fn write_file(&self, name: &str, contents: &[u8]) -> Result<PathBuf> {
        let outbox = self.dir.path().join("outbox");
        std::fs::create_dir_all(&outbox)?;
        let path = outbox.join(name);
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    /// Send a file straight to `to`'s transfer socket
    pub async fn send_file(&self, to: &TestPeer, path: &Path) -> Result<usize> {
        let sent = self
            .node
            .transfer()
            .send_file_to(to.transfer_addr()?, path, &to.exchange_public_hex(), |_| {})
            .await?;
        Ok(sent)
    }

    /// Contents of a file in this peer's inbox, if it has arrived
    pub fn received(&self, name: &str) -> Option<Vec<u8>> {
        std::fs::read(self.inbox().join(name)).ok()
    }
}
