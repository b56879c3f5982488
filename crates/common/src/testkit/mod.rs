/// Lightweight test harness for multi-peer integration tests
///
/// Each peer gets its own temp directory, salt, identity and peer store, and
/// binds its transfer and discovery sockets to ephemeral loopback ports.
///
/// # Example
///
/// ```rust,ignore
/// use common::testkit::TestNetwork;
///
/// #[tokio::test]
/// async fn test_send() -> anyhow::Result<()> {
///     let mut net = TestNetwork::new();
///     net.add_peer("alice").await?;
///     net.add_peer("bob").await?;
///     net.trust_all()?;
///
///     let alice = net.peer("alice").unwrap();
///     let bob = net.peer("bob").unwrap();
///     let path = alice.write_file("hello.txt", b"hi")?;
///     alice.send_file(bob, &path).await?;
///
///     net.eventually(Duration::from_secs(5), |net| {
///         net.peer("bob").unwrap().received("hello.txt").is_some()
///     }).await?;
///
///     net.shutdown().await
/// }
/// ```
mod network;
mod peer;

pub use network::TestNetwork;
pub use peer::TestPeer;
