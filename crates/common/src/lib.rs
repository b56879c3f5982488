/**
 * Cryptographic types and operations.
 *  - Ed25519 signing and X25519 exchange keys
 *  - Symmetric secrets and the KDFs feeding them
 */
pub mod crypto;
/**
 * LAN beacons mapping network ids to
 *  the address they were last heard from.
 */
pub mod discovery;
/**
 * Device-bound identity derived from a physical
 *  salt, a username and a passphrase.
 */
pub mod identity;
/**
 * WAN rendezvous: server, client and wire messages.
 */
pub mod matchmaker;
/**
 * Address helpers for telling peers where to find us.
 */
pub mod net;
/**
 * A logged-in peer with its discovery and
 *  transfer loops wired together.
 */
pub mod node;
/**
 * Encrypted, file-backed store of trusted peers.
 */
pub mod peers;
/**
 * In-process multi-peer harness for integration tests.
 */
pub mod testkit;
/**
 * Chunked, encrypted, fire-and-forget file transfer.
 */
pub mod transfer;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::build_info;
    pub use crate::crypto::{ExchangePublic, ExchangeSecret, PublicKey, Secret, SecretKey};
    pub use crate::discovery::{DiscoveredPeers, Discovery, DiscoveryConfig};
    pub use crate::identity::{compute_room_id, derive_identity, Identity, IdentityError};
    pub use crate::matchmaker::{request_match, MatchResponse, Matchmaker, MatchmakerConfig};
    pub use crate::node::{GhostNode, NodeBuilder, NodeError};
    pub use crate::peers::{PeerRecord, PeerStore, Permissions};
    pub use crate::transfer::{TransferConfig, TransferProtocol};
    pub use crate::version::BuildInfo;
}
