//! End-to-end transfers over loopback UDP

mod common;

use std::time::Duration;

use ::common::testkit::TestNetwork;
use ::common::transfer::CHUNK_SIZE;

#[tokio::test]
async fn test_trusted_peer_receives_file() {
    let mut net = TestNetwork::new();
    net.add_peer("alice").await.unwrap();
    net.add_peer("bob").await.unwrap();

    let alice = net.peer("alice").unwrap();
    let bob = net.peer("bob").unwrap();
    // Bob knows alice as "Bravo"
    bob.trust("Bravo", alice).unwrap();

    let data: Vec<u8> = (0..20_000u32).map(|i| (i * 7 % 256) as u8).collect();
    let path = alice.write_file("report.bin", &data).unwrap();
    let sent = alice.send_file(bob, &path).await.unwrap();
    assert!(sent > 2 * CHUNK_SIZE);

    net.eventually(Duration::from_secs(5), |net| {
        net.peer("bob").unwrap().received("report.bin").is_some()
    })
    .await
    .unwrap();

    assert_eq!(net.peer("bob").unwrap().received("report.bin").unwrap(), data);
    net.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_untrusted_sender_is_ignored() {
    let mut net = TestNetwork::new();
    net.add_peer("alice").await.unwrap();
    net.add_peer("mallory").await.unwrap();

    let alice = net.peer("alice").unwrap();
    let mallory = net.peer("mallory").unwrap();

    let path = mallory.write_file("payload.bin", b"let me in").unwrap();
    mallory.send_file(alice, &path).await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(alice.received("payload.bin").is_none());
    net.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_files_flow_both_ways() {
    let mut net = TestNetwork::new();
    net.add_peer("alice").await.unwrap();
    net.add_peer("bob").await.unwrap();
    net.trust_all().unwrap();

    let alice = net.peer("alice").unwrap();
    let bob = net.peer("bob").unwrap();

    let to_bob = alice.write_file("to_bob.txt", b"hello bob").unwrap();
    let to_alice = bob.write_file("to_alice.txt", b"hello alice").unwrap();
    alice.send_file(bob, &to_bob).await.unwrap();
    bob.send_file(alice, &to_alice).await.unwrap();

    net.eventually(Duration::from_secs(5), |net| {
        net.peer("bob").unwrap().received("to_bob.txt").is_some()
            && net.peer("alice").unwrap().received("to_alice.txt").is_some()
    })
    .await
    .unwrap();

    assert_eq!(
        net.peer("alice").unwrap().received("to_alice.txt").unwrap(),
        b"hello alice"
    );
    net.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_send_by_alias_with_explicit_ip() {
    let mut net = TestNetwork::new();
    net.add_peer("alice").await.unwrap();
    net.add_peer("bob").await.unwrap();
    net.trust_all().unwrap();

    let alice = net.peer("alice").unwrap();
    let bob = net.peer("bob").unwrap();
    let bob_addr = bob.transfer_addr().unwrap();

    // Alias lookup and an address hint feed the same send path
    let (record, _) = alice.node().resolve("bob").unwrap();
    assert_eq!(record.network_id, bob.network_id());

    let path = alice.write_file("hint.txt", b"via alias").unwrap();
    alice
        .node()
        .transfer()
        .send_file_to(bob_addr, &path, &record.exchange_public_key, |_| {})
        .await
        .unwrap();

    net.eventually(Duration::from_secs(5), |net| {
        net.peer("bob").unwrap().received("hint.txt").is_some()
    })
    .await
    .unwrap();
    net.shutdown().await.unwrap();
}
