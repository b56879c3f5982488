//! Trusted peer records
//!
//! A user's trusted peers are kept as one encrypted JSON document mapping
//! alias to [`PeerRecord`]. Every mutation rewrites the whole document.

mod store;

use serde::{Deserialize, Serialize};

pub use store::{PeerStore, PeerStoreError, PEERS_FILE_NAME};

/// What a trusted peer is allowed to pull from us
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub projects: Vec<String>,
    #[serde(default)]
    pub inventory: Vec<String>,
}

/// A single trusted peer, keyed by alias in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    /// Stable network id derived from the peer's signing key
    #[serde(rename = "ghost_id")]
    pub network_id: String,
    /// Hex-encoded X25519 exchange key
    #[serde(rename = "public_key")]
    pub exchange_public_key: String,
    #[serde(default)]
    pub permissions: Permissions,
}

impl PeerRecord {
    pub fn new(network_id: impl Into<String>, exchange_public_key: impl Into<String>) -> Self {
        Self {
            network_id: network_id.into(),
            exchange_public_key: exchange_public_key.into(),
            permissions: Permissions::default(),
        }
    }
}
