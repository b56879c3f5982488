use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::watch;

use super::packet::{
    chunks, decode_frame, encode_frame, is_punch, sanitize_filename, Frame, PacketError,
    PacketHeader, DEFAULT_FILENAME, PUNCH_MARKER,
};
use super::reassembly::{
    Reassembler, ReassemblyError, DEFAULT_MAX_FRAME_SIZE, DEFAULT_MAX_PENDING,
    DEFAULT_REASSEMBLY_TIMEOUT,
};
use crate::crypto::SecretError;
use crate::identity::{Identity, IdentityError};
use crate::peers::PeerStore;

/// Well-known port the transfer server listens on
pub const DEFAULT_TRANSFER_PORT: u16 = 5555;
/// Pause between the hole punch and the first data chunk
pub const DEFAULT_PUNCH_DELAY: Duration = Duration::from_millis(100);

// Comfortably larger than CHUNK_SIZE so a datagram is never truncated
const RECV_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("invalid recipient key: {0}")]
    InvalidRecipientKey(#[from] IdentityError),
    #[error("crypto error: {0}")]
    Crypto(#[from] SecretError),
    #[error("header is {0} bytes, limit is 128")]
    HeaderTooLarge(usize),
    #[error("packet error: {0}")]
    Packet(PacketError),
    #[error("failed to bind transfer socket: {0}")]
    Bind(std::io::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("receive task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<PacketError> for TransferError {
    fn from(err: PacketError) -> Self {
        match err {
            PacketError::HeaderTooLarge(len) => TransferError::HeaderTooLarge(len),
            other => TransferError::Packet(other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Address the receive loop binds
    pub listen_addr: SocketAddr,
    /// Port assumed for peers resolved by IP alone
    pub peer_port: u16,
    pub punch_delay: Duration,
    pub reassembly_timeout: Duration,
    pub max_frame_size: usize,
    /// Senders that may hold a partial frame at once
    pub max_pending: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), DEFAULT_TRANSFER_PORT),
            peer_port: DEFAULT_TRANSFER_PORT,
            punch_delay: DEFAULT_PUNCH_DELAY,
            reassembly_timeout: DEFAULT_REASSEMBLY_TIMEOUT,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_pending: DEFAULT_MAX_PENDING,
        }
    }
}

/// Encrypted file sender and receiver for one logged-in identity
///
/// Sending is fire-and-forget: a successful send only means every datagram
/// was handed to the socket. The receiver never answers, whether a frame
/// decrypts or not.
pub struct TransferProtocol {
    identity: Identity,
    store: PeerStore,
    inbox: PathBuf,
    config: TransferConfig,
    reassembler: Mutex<Reassembler>,
}

impl std::fmt::Debug for TransferProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferProtocol")
            .field("network_id", &self.identity.network_id())
            .field("inbox", &self.inbox)
            .field("config", &self.config)
            .finish()
    }
}

impl TransferProtocol {
    pub fn new(
        identity: Identity,
        store: PeerStore,
        inbox: impl Into<PathBuf>,
        config: TransferConfig,
    ) -> Self {
        let reassembler = Reassembler::new(
            config.reassembly_timeout,
            config.max_frame_size,
            config.max_pending,
        );
        Self {
            identity,
            store,
            inbox: inbox.into(),
            config,
            reassembler: Mutex::new(reassembler),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn store(&self) -> &PeerStore {
        &self.store
    }

    pub fn inbox(&self) -> &Path {
        &self.inbox
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Send a file to `target_ip` on the configured peer port
    ///
    /// Returns false only when the send failed locally; delivery is never confirmed.
    pub async fn send_file(
        &self,
        target_ip: IpAddr,
        file_path: &Path,
        recipient_exchange_public_hex: &str,
        progress: impl Fn(u8) + Send + Sync,
    ) -> bool {
        let target = SocketAddr::new(target_ip, self.config.peer_port);
        match self
            .send_file_to(target, file_path, recipient_exchange_public_hex, progress)
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(%target, path = %file_path.display(), "send failed: {}", e);
                false
            }
        }
    }

    /// Send a file to an exact address, returning the framed packet length
    pub async fn send_file_to(
        &self,
        target: SocketAddr,
        file_path: &Path,
        recipient_exchange_public_hex: &str,
        progress: impl Fn(u8) + Send + Sync,
    ) -> Result<usize, TransferError> {
        let session_key = self.identity.session_key(recipient_exchange_public_hex)?;
        let plaintext = tokio::fs::read(file_path).await?;

        let filename = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_FILENAME.to_string());
        let packet = self.build_packet(&session_key, &filename, &plaintext)?;

        let socket = UdpSocket::bind(unspecified_for(&target))
            .await
            .map_err(TransferError::Bind)?;

        socket.send_to(PUNCH_MARKER, target).await?;
        tokio::time::sleep(self.config.punch_delay).await;

        let total = packet.len();
        let mut sent = 0usize;
        for chunk in chunks(&packet) {
            socket.send_to(chunk, target).await?;
            sent += chunk.len();
            progress((sent * 100 / total) as u8);
        }
        progress(100);

        tracing::info!(%target, filename = %filename, bytes = total, "file sent");
        Ok(total)
    }

    /// Send several files to one peer, one after another
    ///
    /// Stops at the first local failure. `progress` sees each file's percentage in turn.
    pub async fn send_files(
        &self,
        target: SocketAddr,
        file_paths: &[PathBuf],
        recipient_exchange_public_hex: &str,
        progress: impl Fn(usize, u8) + Send + Sync,
    ) -> Result<usize, TransferError> {
        let mut total = 0;
        for (index, path) in file_paths.iter().enumerate() {
            total += self
                .send_file_to(target, path, recipient_exchange_public_hex, |pct| {
                    progress(index, pct)
                })
                .await?;
        }
        Ok(total)
    }

    /// Encrypt `plaintext` and frame it under our network id
    pub fn build_packet(
        &self,
        session_key: &crate::crypto::Secret,
        filename: &str,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, TransferError> {
        let ciphertext = session_key.encrypt(plaintext)?;
        let header = PacketHeader::new(filename, ciphertext.len());
        Ok(encode_frame(
            &self.identity.network_id(),
            &header,
            &ciphertext,
        )?)
    }

    /// Feed one received datagram into reassembly
    ///
    /// Returns a complete frame once its last chunk has arrived. Hole punches
    /// and undecodable datagrams are dropped here.
    pub fn accept_datagram(&self, data: &[u8], from: SocketAddr) -> Option<Vec<u8>> {
        if is_punch(data) {
            tracing::trace!(%from, "hole punch received");
            return None;
        }

        match self.reassembler.lock().push(from, data) {
            Ok(frame) => frame,
            Err(ReassemblyError::TooLarge(len, limit)) => {
                tracing::warn!(%from, len, limit, "dropping oversized frame");
                None
            }
            Err(e) => {
                tracing::debug!(%from, "dropping datagram: {}", e);
                None
            }
        }
    }

    /// Authenticate, decrypt and store one complete frame
    ///
    /// Returns the written path. Every failure is logged locally and swallowed.
    pub async fn handle_frame(&self, data: &[u8], from: SocketAddr) -> Option<PathBuf> {
        let frame = match decode_frame(data) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(%from, "malformed frame: {}", e);
                return None;
            }
        };

        let sender = frame.sender_id.clone();
        match self.receive(frame).await {
            Ok(Some(path)) => {
                tracing::info!(
                    %from,
                    %sender,
                    path = %path.display(),
                    "received file"
                );
                Some(path)
            }
            Ok(None) => {
                tracing::debug!(%from, %sender, "dropping frame from unknown sender");
                None
            }
            Err(e) => {
                tracing::debug!(%from, %sender, "dropping frame: {}", e);
                None
            }
        }
    }

    /// Process a single datagram end to end
    pub async fn handle_incoming_udp(&self, data: &[u8], from: SocketAddr) -> Option<PathBuf> {
        let frame = self.accept_datagram(data, from)?;
        self.handle_frame(&frame, from).await
    }

    async fn receive(&self, frame: Frame) -> Result<Option<PathBuf>, TransferError> {
        let Frame {
            sender_id,
            header,
            payload,
        } = frame;

        // The store reads and decrypts its file under a blocking lock
        let store = self.store.clone();
        let identity = self.identity.clone();
        let opened = tokio::task::spawn_blocking(move || {
            let Some((alias, peer)) = store.find_by_network_id(&sender_id) else {
                return Ok(None);
            };
            let session_key = identity.session_key(&peer.exchange_public_key)?;
            let plaintext = session_key.decrypt(&payload)?;
            Ok::<_, TransferError>(Some((alias, plaintext)))
        })
        .await??;
        let Some((alias, plaintext)) = opened else {
            return Ok(None);
        };

        tokio::fs::create_dir_all(&self.inbox).await?;
        let filename = sanitize_filename(&header.filename);
        let path = self.inbox.join(&filename);
        // Written aside and renamed so the inbox never shows a partial file
        let partial = self.inbox.join(format!(".{}.part", filename));
        tokio::fs::write(&partial, &plaintext).await?;
        tokio::fs::rename(&partial, &path).await?;

        tracing::debug!(alias = %alias, bytes = plaintext.len(), "frame decrypted");
        Ok(Some(path))
    }

    /// Bind the configured transfer port and receive until shutdown
    pub async fn serve(
        self: Arc<Self>,
        shutdown_rx: watch::Receiver<()>,
    ) -> Result<(), TransferError> {
        let socket = UdpSocket::bind(self.config.listen_addr)
            .await
            .map_err(TransferError::Bind)?;
        self.serve_on(socket, shutdown_rx).await;
        Ok(())
    }

    /// Receive on an already bound socket until shutdown
    ///
    /// Reassembly runs inline so chunks keep their arrival order; each
    /// completed frame is handled on its own task.
    pub async fn serve_on(self: Arc<Self>, socket: UdpSocket, mut shutdown_rx: watch::Receiver<()>) {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        tracing::debug!(addr = ?socket.local_addr().ok(), "transfer server running");

        loop {
            tokio::select! {
                received = socket.recv_from(&mut buf) => match received {
                    Ok((len, from)) => {
                        if let Some(frame) = self.accept_datagram(&buf[..len], from) {
                            let this = self.clone();
                            tokio::spawn(async move {
                                this.handle_frame(&frame, from).await;
                            });
                        }
                    }
                    Err(e) => tracing::debug!("transfer receive failed: {}", e),
                },
                _ = shutdown_rx.changed() => break,
            }
        }

        tracing::debug!("transfer server stopped");
    }
}

fn unspecified_for(target: &SocketAddr) -> SocketAddr {
    match target {
        SocketAddr::V4(_) => SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0),
        SocketAddr::V6(_) => SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), 0),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::Secret;
    use crate::identity::derive_identity;
    use crate::transfer::packet::{CHUNK_SIZE, FRAME_PREFIX_LEN};

    struct Side {
        _dir: tempfile::TempDir,
        protocol: TransferProtocol,
    }

    fn side(username: &str) -> Side {
        let dir = tempfile::TempDir::new().unwrap();
        let identity = derive_identity(username, "passphrase", Some(&b"salt"[..])).unwrap();
        let store = PeerStore::new(
            dir.path().join("trusted_peers.enc"),
            Secret::from_passphrase("passphrase", b"salt"),
        );
        let inbox = dir.path().join("inbox");
        let config = TransferConfig {
            punch_delay: Duration::ZERO,
            ..TransferConfig::default()
        };
        Side {
            protocol: TransferProtocol::new(identity, store, inbox, config),
            _dir: dir,
        }
    }

    fn trust(receiver: &Side, alias: &str, sender: &Side) {
        let id = sender.protocol.identity();
        receiver
            .protocol
            .store()
            .add_peer(alias, &id.network_id(), &id.exchange_public().to_hex())
            .unwrap();
    }

    fn from() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn packet_for(sender: &Side, receiver: &Side, name: &str, data: &[u8]) -> Vec<u8> {
        let key = sender
            .protocol
            .identity()
            .session_key(&receiver.protocol.identity().exchange_public().to_hex())
            .unwrap();
        sender.protocol.build_packet(&key, name, data).unwrap()
    }

    #[tokio::test]
    async fn test_trusted_frame_lands_in_inbox() {
        let alice = side("alice");
        let bob = side("bob");
        trust(&bob, "Alpha", &alice);

        let data: Vec<u8> = (0..20_000u32).map(|i| (i % 199) as u8).collect();
        let packet = packet_for(&alice, &bob, "notes.txt", &data);

        let mut written = None;
        for chunk in chunks(&packet) {
            written = bob.protocol.handle_incoming_udp(chunk, from()).await;
        }

        let path = written.expect("frame should complete on the last chunk");
        assert_eq!(path, bob.protocol.inbox().join("notes.txt"));
        assert_eq!(std::fs::read(path).unwrap(), data);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_concurrent_frames_on_single_thread_runtime() {
        let alice = side("alice");
        let carol = side("carol");
        let bob = side("bob");
        trust(&bob, "Alpha", &alice);
        trust(&bob, "Charlie", &carol);

        let first = packet_for(&alice, &bob, "a.txt", b"from alice");
        let second = packet_for(&carol, &bob, "c.txt", b"from carol");
        let (a, c) = tokio::join!(
            bob.protocol.handle_frame(&first, from()),
            bob.protocol.handle_frame(&second, from()),
        );

        assert_eq!(std::fs::read(a.unwrap()).unwrap(), b"from alice");
        assert_eq!(std::fs::read(c.unwrap()).unwrap(), b"from carol");
    }

    #[tokio::test]
    async fn test_unknown_sender_is_dropped() {
        let alice = side("alice");
        let bob = side("bob");

        let packet = packet_for(&alice, &bob, "notes.txt", b"hello");
        assert!(bob.protocol.handle_incoming_udp(&packet, from()).await.is_none());
        assert!(!bob.protocol.inbox().exists());
    }

    #[tokio::test]
    async fn test_wrong_key_is_dropped() {
        let alice = side("alice");
        let bob = side("bob");
        let mallory = side("mallory");
        // Bob trusts alice's id but with mallory's exchange key
        bob.protocol
            .store()
            .add_peer(
                "Alpha",
                &alice.protocol.identity().network_id(),
                &mallory.protocol.identity().exchange_public().to_hex(),
            )
            .unwrap();

        let packet = packet_for(&alice, &bob, "notes.txt", b"hello");
        assert!(bob.protocol.handle_incoming_udp(&packet, from()).await.is_none());
    }

    #[tokio::test]
    async fn test_punch_and_garbage_are_ignored() {
        let bob = side("bob");
        assert!(bob.protocol.accept_datagram(PUNCH_MARKER, from()).is_none());
        assert!(bob.protocol.accept_datagram(b"garbage", from()).is_none());
        assert!(bob
            .protocol
            .handle_incoming_udp(&[b' '; FRAME_PREFIX_LEN + 4], from())
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_filename_cannot_escape_inbox() {
        let alice = side("alice");
        let bob = side("bob");
        trust(&bob, "Alpha", &alice);

        let packet = packet_for(&alice, &bob, "../../escape.txt", b"hello");
        let path = bob
            .protocol
            .handle_incoming_udp(&packet, from())
            .await
            .unwrap();
        assert_eq!(path, bob.protocol.inbox().join("escape.txt"));
    }

    #[test]
    fn test_long_filename_fails_locally() {
        let alice = side("alice");
        let bob = side("bob");
        let key = alice
            .protocol
            .identity()
            .session_key(&bob.protocol.identity().exchange_public().to_hex())
            .unwrap();

        let result = alice.protocol.build_packet(&key, &"x".repeat(200), b"hi");
        assert!(matches!(result, Err(TransferError::HeaderTooLarge(_))));
    }

    #[tokio::test]
    async fn test_send_reports_progress_to_completion() {
        let alice = side("alice");
        let bob = side("bob");
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("payload.bin");
        std::fs::write(&file, vec![7u8; 3 * CHUNK_SIZE]).unwrap();

        // Nobody listens on the target; UDP sends still succeed locally
        let sink = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let target = sink.local_addr().unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let sent = alice
            .protocol
            .send_file_to(
                target,
                &file,
                &bob.protocol.identity().exchange_public().to_hex(),
                move |pct| recorder.lock().push(pct),
            )
            .await
            .unwrap();

        let seen = seen.lock().clone();
        assert!(sent > 3 * CHUNK_SIZE);
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_send_missing_file_returns_false() {
        let alice = side("alice");
        let bob = side("bob");
        let ok = alice
            .protocol
            .send_file(
                "127.0.0.1".parse().unwrap(),
                Path::new("/definitely/not/here"),
                &bob.protocol.identity().exchange_public().to_hex(),
                |_| {},
            )
            .await;
        assert!(!ok);
    }
}
