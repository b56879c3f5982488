use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{PeerRecord, Permissions};
use crate::crypto::{ExchangePublic, KeyError, Secret, SecretError};

/// File name of the encrypted peer document inside a user's directory
pub const PEERS_FILE_NAME: &str = "trusted_peers.enc";

#[derive(Debug, thiserror::Error)]
pub enum PeerStoreError {
    #[error("alias must not be empty")]
    EmptyAlias,
    #[error("network id must not be empty")]
    EmptyNetworkId,
    #[error("invalid exchange key: {0}")]
    InvalidPublicKey(#[from] KeyError),
    #[error("exchange key is a low-order point")]
    LowOrderPublicKey,
    #[error("alias '{0}' is already taken")]
    AliasExists(String),
    #[error("no peer with alias '{0}'")]
    UnknownAlias(String),
    #[error("encryption error: {0}")]
    Secret(#[from] SecretError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Encrypted, file-backed alias -> [`PeerRecord`] map for one user
///
/// Clones share a single lock, so one `PeerStore` per user should be created
/// and handed to everything that touches that user's peers. Every mutation is
/// a full load, mutate, atomic-write transaction under that lock.
#[derive(Debug, Clone)]
pub struct PeerStore {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    key: Secret,
    lock: Mutex<()>,
}

impl PeerStore {
    pub fn new(path: impl Into<PathBuf>, key: Secret) -> Self {
        Self {
            inner: Arc::new(Inner {
                path: path.into(),
                key,
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Load every trusted peer
    ///
    /// A missing file, or one that does not decrypt under our key, reads as
    /// an empty set of peers.
    pub fn load(&self) -> BTreeMap<String, PeerRecord> {
        let _guard = self.inner.lock.lock();
        self.read_unlocked()
    }

    pub fn get(&self, alias: &str) -> Option<PeerRecord> {
        self.load().remove(alias)
    }

    /// Look up a peer by the network id it stamps on its packets
    pub fn find_by_network_id(&self, network_id: &str) -> Option<(String, PeerRecord)> {
        self.load()
            .into_iter()
            .find(|(_, record)| record.network_id == network_id)
    }

    /// Insert or replace the record stored under `alias`
    pub fn save(&self, alias: &str, record: PeerRecord) -> Result<(), PeerStoreError> {
        validate(alias, &record)?;

        let _guard = self.inner.lock.lock();
        let mut peers = self.read_unlocked();
        peers.insert(alias.to_string(), record);
        self.write_unlocked(&peers)
    }

    /// Add a peer, or update its keys while keeping any permissions already granted
    pub fn add_peer(
        &self,
        alias: &str,
        network_id: &str,
        exchange_public_key: &str,
    ) -> Result<PeerRecord, PeerStoreError> {
        let mut record = PeerRecord::new(network_id.trim(), exchange_public_key.trim());
        validate(alias, &record)?;

        let _guard = self.inner.lock.lock();
        let mut peers = self.read_unlocked();
        if let Some(existing) = peers.get(alias) {
            record.permissions = existing.permissions.clone();
        }
        peers.insert(alias.to_string(), record.clone());
        self.write_unlocked(&peers)?;

        tracing::debug!(alias, network_id, "peer saved");
        Ok(record)
    }

    pub fn set_permissions(
        &self,
        alias: &str,
        permissions: Permissions,
    ) -> Result<(), PeerStoreError> {
        let _guard = self.inner.lock.lock();
        let mut peers = self.read_unlocked();
        let record = peers
            .get_mut(alias)
            .ok_or_else(|| PeerStoreError::UnknownAlias(alias.to_string()))?;
        record.permissions = permissions;
        self.write_unlocked(&peers)
    }

    /// Remove a peer. Returns `false` if the alias was not present.
    pub fn delete(&self, alias: &str) -> Result<bool, PeerStoreError> {
        let _guard = self.inner.lock.lock();
        let mut peers = self.read_unlocked();
        if peers.remove(alias).is_none() {
            return Ok(false);
        }
        self.write_unlocked(&peers)?;
        Ok(true)
    }

    /// Move a record to a new alias; its network id and permissions are untouched
    ///
    /// Returns `false` if `old_alias` was not present.
    pub fn rename(&self, old_alias: &str, new_alias: &str) -> Result<bool, PeerStoreError> {
        if new_alias.trim().is_empty() {
            return Err(PeerStoreError::EmptyAlias);
        }

        let _guard = self.inner.lock.lock();
        let mut peers = self.read_unlocked();
        if !peers.contains_key(old_alias) {
            return Ok(false);
        }
        if old_alias == new_alias {
            return Ok(true);
        }
        if peers.contains_key(new_alias) {
            return Err(PeerStoreError::AliasExists(new_alias.to_string()));
        }

        if let Some(record) = peers.remove(old_alias) {
            peers.insert(new_alias.to_string(), record);
        }
        self.write_unlocked(&peers)?;
        Ok(true)
    }

    fn read_unlocked(&self) -> BTreeMap<String, PeerRecord> {
        let ciphertext = match std::fs::read(&self.inner.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %self.inner.path.display(), "failed to read peer store: {}", e);
                return BTreeMap::new();
            }
        };

        let plaintext = match self.inner.key.decrypt(&ciphertext) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                tracing::warn!(path = %self.inner.path.display(), "failed to decrypt peer store: {}", e);
                return BTreeMap::new();
            }
        };

        serde_json::from_slice(&plaintext).unwrap_or_else(|e| {
            tracing::warn!(path = %self.inner.path.display(), "failed to parse peer store: {}", e);
            BTreeMap::new()
        })
    }

    fn write_unlocked(&self, peers: &BTreeMap<String, PeerRecord>) -> Result<(), PeerStoreError> {
        let plaintext = serde_json::to_vec(peers)?;
        let ciphertext = self.inner.key.encrypt(&plaintext)?;

        let dir = match self.inner.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        // Same directory as the target so the rename stays on one filesystem
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&ciphertext)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.inner.path).map_err(|e| e.error)?;
        Ok(())
    }
}

fn validate(alias: &str, record: &PeerRecord) -> Result<(), PeerStoreError> {
    if alias.trim().is_empty() {
        return Err(PeerStoreError::EmptyAlias);
    }
    if record.network_id.trim().is_empty() {
        return Err(PeerStoreError::EmptyNetworkId);
    }
    if ExchangePublic::from_hex(&record.exchange_public_key)?.is_low_order() {
        return Err(PeerStoreError::LowOrderPublicKey);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::ExchangeSecret;

    fn store_in(dir: &Path) -> PeerStore {
        PeerStore::new(dir.join("alice").join(PEERS_FILE_NAME), Secret::generate())
    }

    fn exchange_hex() -> String {
        ExchangeSecret::generate().public().to_hex()
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(store_in(dir.path()).load().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let mut record = PeerRecord::new("abc123", exchange_hex());
        record.permissions.projects.push("ghost-notes".into());

        store.save("Bravo", record.clone()).unwrap();

        let peers = store.load();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers.get("Bravo"), Some(&record));
    }

    #[test]
    fn test_delete_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.add_peer("Bravo", "abc123", &exchange_hex()).unwrap();
        store.add_peer("Charlie", "def456", &exchange_hex()).unwrap();

        assert!(store.delete("Bravo").unwrap());
        assert!(!store.delete("Bravo").unwrap());

        let peers = store.load();
        assert!(!peers.contains_key("Bravo"));
        assert!(peers.contains_key("Charlie"));
    }

    #[test]
    fn test_rename_keeps_identity() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let record = store.add_peer("Bravo", "abc123", &exchange_hex()).unwrap();
        store.add_peer("Charlie", "def456", &exchange_hex()).unwrap();

        assert!(store.rename("Bravo", "Delta").unwrap());
        assert_eq!(store.get("Delta"), Some(record));
        assert_eq!(store.get("Bravo"), None);

        assert!(!store.rename("Missing", "Echo").unwrap());
        assert!(matches!(
            store.rename("Delta", "Charlie"),
            Err(PeerStoreError::AliasExists(_))
        ));
    }

    #[test]
    fn test_readd_preserves_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.add_peer("Bravo", "abc123", &exchange_hex()).unwrap();

        let permissions = Permissions {
            projects: vec!["p1".into()],
            inventory: vec!["tools.csv".into()],
        };
        store.set_permissions("Bravo", permissions.clone()).unwrap();

        let new_key = exchange_hex();
        let record = store.add_peer("Bravo", "abc123", &new_key).unwrap();
        assert_eq!(record.permissions, permissions);
        assert_eq!(store.get("Bravo").unwrap().exchange_public_key, new_key);
    }

    #[test]
    fn test_find_by_network_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.add_peer("Bravo", "abc123", &exchange_hex()).unwrap();

        let (alias, record) = store.find_by_network_id("abc123").unwrap();
        assert_eq!(alias, "Bravo");
        assert_eq!(record.network_id, "abc123");
        assert!(store.find_by_network_id("zzz").is_none());
    }

    #[test]
    fn test_foreign_key_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PEERS_FILE_NAME);

        let mine = PeerStore::new(&path, Secret::generate());
        mine.add_peer("Bravo", "abc123", &exchange_hex()).unwrap();

        let foreign = PeerStore::new(&path, Secret::generate());
        assert!(foreign.load().is_empty());

        std::fs::write(&path, b"garbage").unwrap();
        assert!(mine.load().is_empty());
    }

    #[test]
    fn test_file_is_not_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.add_peer("Bravo", "abc123", &exchange_hex()).unwrap();

        let raw = std::fs::read(store.path()).unwrap();
        let needle = b"abc123";
        assert!(!raw.windows(needle.len()).any(|w| w == needle));
    }

    #[test]
    fn test_rejects_invalid_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        assert!(matches!(
            store.add_peer("", "abc123", &exchange_hex()),
            Err(PeerStoreError::EmptyAlias)
        ));
        assert!(matches!(
            store.add_peer("Bravo", "", &exchange_hex()),
            Err(PeerStoreError::EmptyNetworkId)
        ));
        assert!(matches!(
            store.add_peer("Bravo", "abc123", "zz"),
            Err(PeerStoreError::InvalidPublicKey(_))
        ));
        assert!(matches!(
            store.add_peer("Bravo", "abc123", &"00".repeat(32)),
            Err(PeerStoreError::LowOrderPublicKey)
        ));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_concurrent_mutations_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                let key = exchange_hex();
                std::thread::spawn(move || {
                    store
                        .add_peer(&format!("peer-{}", i), &format!("id-{}", i), &key)
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.load().len(), 8);
    }
}
