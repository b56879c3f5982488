//! Shared test utilities for integration tests
#![allow(dead_code)]

use std::net::SocketAddr;

use common::crypto::Secret;
use common::identity::{derive_identity, Identity};
use common::peers::PeerStore;
use tempfile::TempDir;

/// An identity plus an empty peer store in a fresh temp dir
pub fn setup_user(username: &str) -> (Identity, PeerStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let salt = format!("salt-for-{}", username);
    let identity = derive_identity(username, "passphrase", Some(salt.as_bytes())).unwrap();
    let store = PeerStore::new(
        temp_dir.path().join("trusted_peers.enc"),
        Secret::from_passphrase("passphrase", salt.as_bytes()),
    );
    (identity, store, temp_dir)
}

pub fn loopback() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}
