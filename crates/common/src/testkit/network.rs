use super::peer::TestPeer;
use anyhow::Result;
use std::collections::HashMap;
use std::time::Duration;

/// A coordinator for multiple test peers
///
/// TestNetwork manages the lifecycle of multiple peers and provides
/// utilities for eventual consistency testing.
pub struct TestNetwork {
    /// All peers in the network, indexed by name
    peers: HashMap<String, TestPeer>,
}

impl TestNetwork {
    pub fn new() -> Self {
        Self {
            peers: HashMap::new(),
        }
    }

    /// Add a new peer to the network and start it
    pub async fn add_peer(&mut self, name: impl Into<String>) -> Result<&TestPeer> {
        let name = name.into();

        if self.peers.contains_key(&name) {
            return Err(anyhow::anyhow!("Peer '{}' already exists", name));
        }

        let mut peer = TestPeer::new(name.clone()).await?;
        peer.start().await?;

        Ok(&*self.peers.entry(name).or_insert(peer))
    }

    pub fn peer(&self, name: &str) -> Option<&TestPeer> {
        self.peers.get(name)
    }

    pub fn peer_names(&self) -> Vec<String> {
        self.peers.keys().cloned().collect()
    }

    /// Make every peer trust every other peer, using peer names as aliases
    pub fn trust_all(&self) -> Result<()> {
        for (name, peer) in &self.peers {
            for (other_name, other) in &self.peers {
                if name != other_name {
                    peer.trust(other_name, other)?;
                }
            }
        }
        tracing::debug!("{} peers trust each other", self.peers.len());
        Ok(())
    }

    /// Remove a peer from the network and stop it
    pub async fn remove_peer(&mut self, name: &str) -> Result<()> {
        if let Some(mut peer) = self.peers.remove(name) {
            peer.stop().await?;
        }
        Ok(())
    }

    /// Shutdown all peers in the network
    pub async fn shutdown(&mut self) -> Result<()> {
        for (name, peer) in self.peers.iter_mut() {
            if let Err(e) = peer.stop().await {
                tracing::error!("Error stopping peer {}: {}", name, e);
            }
        }
        self.peers.clear();
        Ok(())
    }

    /// Poll a condition until it succeeds or times out
    ///
    /// Transfers are fire-and-forget, so tests wait for their effects this way.
    pub async fn eventually<F>(&self, timeout: Duration, condition: F) -> Result<()>
    where
        F: Fn(&TestNetwork) -> bool,
    {
        let start = std::time::Instant::now();
        let poll_interval = Duration::from_millis(25);

        loop {
            if condition(self) {
                tracing::debug!("Eventual condition met after {:?}", start.elapsed());
                return Ok(());
            }

            if start.elapsed() > timeout {
                return Err(anyhow::anyhow!(
                    "Condition not met within timeout ({:?})",
                    timeout
                ));
            }

            tokio::time::sleep(poll_interval).await;
        }
    }
}

impl Default for TestNetwork {
    fn default() -> Self {
        Self::new()
    }
}
