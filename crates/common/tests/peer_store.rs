//! Peer store persistence across handles

mod common;

use ::common::crypto::Secret;
use ::common::peers::{PeerStore, Permissions};

#[test]
fn test_records_survive_reopen() {
    let (_, store, temp) = common::setup_user("alice");
    let (bob, _, _bob_dir) = common::setup_user("bob");

    store
        .add_peer("Bravo", &bob.network_id(), &bob.exchange_public().to_hex())
        .unwrap();
    store
        .set_permissions(
            "Bravo",
            Permissions {
                projects: vec!["garden".into()],
                inventory: vec![],
            },
        )
        .unwrap();

    let reopened = PeerStore::new(
        temp.path().join("trusted_peers.enc"),
        Secret::from_passphrase("passphrase", b"salt-for-alice"),
    );
    let peers = reopened.load();
    let record = &peers["Bravo"];
    assert_eq!(record.network_id, bob.network_id());
    assert_eq!(record.permissions.projects, vec!["garden".to_string()]);
}

#[test]
fn test_wrong_passphrase_reads_as_empty() {
    let (_, store, temp) = common::setup_user("alice");
    let (bob, _, _bob_dir) = common::setup_user("bob");
    store
        .add_peer("Bravo", &bob.network_id(), &bob.exchange_public().to_hex())
        .unwrap();

    let foreign = PeerStore::new(
        temp.path().join("trusted_peers.enc"),
        Secret::from_passphrase("not the passphrase", b"salt-for-alice"),
    );
    assert!(foreign.load().is_empty());
}

#[test]
fn test_on_disk_document_is_not_plaintext() {
    let (_, store, _temp) = common::setup_user("alice");
    let (bob, _, _bob_dir) = common::setup_user("bob");
    store
        .add_peer("Bravo", &bob.network_id(), &bob.exchange_public().to_hex())
        .unwrap();

    let raw = std::fs::read(store.path()).unwrap();
    let needle = bob.network_id();
    assert!(!raw
        .windows(needle.len())
        .any(|w| w == needle.as_bytes()));
}
