use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use std::{fs, path::PathBuf};

use common::crypto::Secret;
use common::discovery::DiscoveryConfig;
use common::identity::{create_salt, Identity, IdentityError};
use common::node::{GhostNode, NodeError};
use common::peers::{PeerStore, PEERS_FILE_NAME};
use common::transfer::TransferConfig;
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "ghost";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const USERS_DIR_NAME: &str = "users";
pub const PROJECTS_DIR_NAME: &str = "projects";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// UDP port the transfer server listens on, and peers are sent to
    #[serde(default = "default_transfer_port")]
    pub transfer_port: u16,
    /// UDP port beacons are broadcast to and received on
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,
    #[serde(default = "default_broadcast_addr")]
    pub broadcast_addr: IpAddr,
    #[serde(default = "default_beacon_interval_secs")]
    pub beacon_interval_secs: u64,
    /// Pause between the hole punch and the first chunk
    #[serde(default = "default_punch_delay_ms")]
    pub punch_delay_ms: u64,
    /// Matchmaker used by `ghost room`, as host:port
    #[serde(default)]
    pub matchmaker_addr: Option<String>,
    /// Daemon log directory (stdout only if not set)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_transfer_port() -> u16 {
    common::transfer::DEFAULT_TRANSFER_PORT
}

fn default_discovery_port() -> u16 {
    common::discovery::DEFAULT_DISCOVERY_PORT
}

fn default_broadcast_addr() -> IpAddr {
    IpAddr::V4(Ipv4Addr::BROADCAST)
}

fn default_beacon_interval_secs() -> u64 {
    10
}

fn default_punch_delay_ms() -> u64 {
    100
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            transfer_port: default_transfer_port(),
            discovery_port: default_discovery_port(),
            broadcast_addr: default_broadcast_addr(),
            beacon_interval_secs: default_beacon_interval_secs(),
            punch_delay_ms: default_punch_delay_ms(),
            matchmaker_addr: None,
            log_dir: None,
        }
    }
}

impl AppConfig {
    pub fn transfer_config(&self) -> TransferConfig {
        TransferConfig {
            listen_addr: SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), self.transfer_port),
            peer_port: self.transfer_port,
            punch_delay: Duration::from_millis(self.punch_delay_ms),
            ..TransferConfig::default()
        }
    }

    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            listen_addr: SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), self.discovery_port),
            broadcast_addr: SocketAddr::new(self.broadcast_addr, self.discovery_port),
            beacon_interval: Duration::from_secs(self.beacon_interval_secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the ghost directory (~/.ghost)
    pub ghost_dir: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

/// A logged-in user: identity plus the stores derived from it
#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub identity: Identity,
    pub peers: PeerStore,
    pub inbox: PathBuf,
}

impl AppState {
    /// Get the ghost directory path (custom or default ~/.ghost)
    pub fn ghost_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Create the ghost directory and write its config
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let ghost_dir = Self::ghost_dir(custom_path)?;
        let config_path = ghost_dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        fs::create_dir_all(ghost_dir.join(USERS_DIR_NAME))?;
        fs::create_dir_all(ghost_dir.join(PROJECTS_DIR_NAME))?;

        let config = config.unwrap_or_default();
        fs::write(&config_path, toml::to_string_pretty(&config)?)?;

        Ok(Self {
            ghost_dir,
            config_path,
            config,
        })
    }

    /// Load existing state from the ghost directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let ghost_dir = Self::ghost_dir(custom_path)?;
        let config_path = ghost_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(StateError::NotInitialized);
        }

        let config: AppConfig = toml::from_str(&fs::read_to_string(&config_path)?)?;

        Ok(Self {
            ghost_dir,
            config_path,
            config,
        })
    }

    /// The physical salt that binds `username`'s identity to this device
    pub fn salt_path(&self, username: &str) -> Result<PathBuf, StateError> {
        let username = normalize_username(username)?;
        Ok(self.ghost_dir.join(format!("salt_{}.bin", username)))
    }

    pub fn peers_path(&self, username: &str) -> Result<PathBuf, StateError> {
        let username = normalize_username(username)?;
        Ok(self
            .ghost_dir
            .join(USERS_DIR_NAME)
            .join(username)
            .join(PEERS_FILE_NAME))
    }

    /// Where files received for `username` are written
    pub fn inbox(&self, username: &str) -> Result<PathBuf, StateError> {
        let username = normalize_username(username)?;
        Ok(self.ghost_dir.join(PROJECTS_DIR_NAME).join(username))
    }

    /// Generate the physical salt for a new user on this device
    pub fn create_user(&self, username: &str) -> Result<PathBuf, StateError> {
        let salt_path = self.salt_path(username)?;
        create_salt(&salt_path)?;
        Ok(salt_path)
    }

    /// Derive the user's identity and open their peer store
    pub fn login(&self, username: &str, passphrase: &str) -> Result<Session, StateError> {
        let salt_path = self.salt_path(username)?;
        let identity = Identity::load(username, passphrase, &salt_path)?;
        let salt = fs::read(&salt_path)?;

        Ok(Session {
            username: normalize_username(username)?,
            identity,
            peers: PeerStore::new(
                self.peers_path(username)?,
                Secret::from_passphrase(passphrase, &salt),
            ),
            inbox: self.inbox(username)?,
        })
    }
}

impl Session {
    /// A node for this session using the app's ports and timings
    pub fn node(&self, config: &AppConfig) -> Result<GhostNode, NodeError> {
        GhostNode::builder()
            .identity(self.identity.clone())
            .peer_store(self.peers.clone())
            .inbox(self.inbox.clone())
            .transfer_config(config.transfer_config())
            .discovery_config(config.discovery_config())
            .build()
    }
}

/// Lowercase and trim a username, rejecting anything unsafe in a file name
pub fn normalize_username(username: &str) -> Result<String, StateError> {
    let normalized = username.trim().to_lowercase();
    let valid = !normalized.is_empty()
        && normalized
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(StateError::InvalidUsername(username.to_string()));
    }
    Ok(normalized)
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("ghost directory not initialized. Run 'ghost init' first")]
    NotInitialized,

    #[error("ghost directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("invalid username '{0}': use letters, digits, '-' or '_'")]
    InvalidUsername(String),

    #[error("no user given. Pass --user or set GHOST_USER")]
    MissingUser,

    #[error("no passphrase given. Pass --passphrase or set GHOST_PASSPHRASE")]
    MissingPassphrase,

    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("node error: {0}")]
    Node(#[from] NodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_init_then_load() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().join("ghost");

        let state = AppState::init(Some(dir.clone()), None).unwrap();
        assert!(state.config_path.exists());
        assert!(matches!(
            AppState::init(Some(dir.clone()), None),
            Err(StateError::AlreadyInitialized)
        ));

        let loaded = AppState::load(Some(dir)).unwrap();
        assert_eq!(loaded.config, AppConfig::default());
    }

    #[test]
    fn test_load_uninitialized() {
        let temp = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            AppState::load(Some(temp.path().join("missing"))),
            Err(StateError::NotInitialized)
        ));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AppConfig = toml::from_str("transfer_port = 6000").unwrap();
        assert_eq!(config.transfer_port, 6000);
        assert_eq!(config.discovery_port, 5556);
        assert_eq!(config.transfer_config().peer_port, 6000);
        assert_eq!(
            config.discovery_config().broadcast_addr,
            "255.255.255.255:5556".parse().unwrap()
        );
    }

    #[test]
    fn test_user_paths() {
        let temp = tempfile::TempDir::new().unwrap();
        let state = AppState::init(Some(temp.path().to_path_buf()), None).unwrap();

        assert_eq!(
            state.salt_path(" Alice ").unwrap(),
            temp.path().join("salt_alice.bin")
        );
        assert_eq!(
            state.peers_path("alice").unwrap(),
            temp.path().join("users/alice/trusted_peers.enc")
        );
        assert!(matches!(
            state.inbox("../etc"),
            Err(StateError::InvalidUsername(_))
        ));
    }

    #[test]
    fn test_login_requires_salt() {
        let temp = tempfile::TempDir::new().unwrap();
        let state = AppState::init(Some(temp.path().to_path_buf()), None).unwrap();

        assert!(matches!(
            state.login("alice", "pw"),
            Err(StateError::Identity(IdentityError::MissingSalt))
        ));

        state.create_user("alice").unwrap();
        let first = state.login("alice", "pw").unwrap();
        let second = state.login("ALICE", "pw").unwrap();
        assert_eq!(first.identity.network_id(), second.identity.network_id());
        assert_eq!(first.inbox, temp.path().join("projects/alice"));
    }
}
