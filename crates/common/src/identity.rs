//! Device-bound peer identity
//!
//! An identity is never stored. It is re-derived at login from three inputs:
//! the physical salt file that lives on this device, the username, and the
//! passphrase. Peers recognize each other by the public halves, so the
//! derivation must be fully deterministic.

use std::io::Write;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::crypto::{
    ExchangePublic, ExchangeSecret, KeyError, PublicKey, Secret, SecretKey, PRIVATE_KEY_SIZE,
};

/// Length of a network id in characters; it exactly fills the wire id field
pub const NETWORK_ID_LEN: usize = 32;
/// Length of a room id in hex characters
pub const ROOM_ID_LEN: usize = 16;
/// Size of a freshly generated salt file in bytes
pub const SALT_SIZE: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("physical salt missing, identity cannot be verified")]
    MissingSalt,
    #[error("salt already exists at {0}")]
    SaltExists(String),
    #[error("key error: {0}")]
    Key(#[from] KeyError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything a logged-in peer needs to sign, exchange keys and be addressed
#[derive(Debug, Clone)]
pub struct Identity {
    seed: [u8; PRIVATE_KEY_SIZE],
    signing: SecretKey,
    exchange: ExchangeSecret,
}

impl Identity {
    /// Derive the identity using the salt file at `salt_path`
    pub fn load(
        username: &str,
        passphrase: &str,
        salt_path: impl AsRef<Path>,
    ) -> Result<Self, IdentityError> {
        let salt = match std::fs::read(salt_path.as_ref()) {
            Ok(salt) => salt,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(IdentityError::MissingSalt)
            }
            Err(e) => return Err(e.into()),
        };
        derive_identity(username, passphrase, Some(salt.as_slice()))
    }

    pub fn seed(&self) -> &[u8; PRIVATE_KEY_SIZE] {
        &self.seed
    }

    pub fn signing_key(&self) -> &SecretKey {
        &self.signing
    }

    pub fn signing_public(&self) -> PublicKey {
        self.signing.public()
    }

    pub fn exchange_key(&self) -> &ExchangeSecret {
        &self.exchange
    }

    pub fn exchange_public(&self) -> ExchangePublic {
        self.exchange.public()
    }

    /// The stable id this peer announces and stamps on outgoing packets
    pub fn network_id(&self) -> String {
        network_id_for(&self.signing_public())
    }

    /// Session key shared with the owner of `their_exchange_public_hex`
    pub fn session_key(&self, their_exchange_public_hex: &str) -> Result<Secret, IdentityError> {
        let shared = derive_shared_secret(&self.exchange, their_exchange_public_hex)?;
        Ok(Secret::from_shared_secret(&shared))
    }
}

/// Network id for a signing key: hex of the first half of the key bytes
pub fn network_id_for(public: &PublicKey) -> String {
    hex::encode(&public.to_bytes()[..NETWORK_ID_LEN / 2])
}

/// Derive a deterministic identity from salt, username and passphrase
///
/// seed = SHA-256(salt || lowercase(trim(username)) || passphrase); both
/// keypairs are generated from that seed.
pub fn derive_identity(
    username: &str,
    passphrase: &str,
    salt: Option<&[u8]>,
) -> Result<Identity, IdentityError> {
    let salt = salt.ok_or(IdentityError::MissingSalt)?;

    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(username.trim().to_lowercase().as_bytes());
    hasher.update(passphrase.as_bytes());
    let seed: [u8; PRIVATE_KEY_SIZE] = hasher.finalize().into();

    Ok(Identity {
        seed,
        signing: SecretKey::from(seed),
        exchange: ExchangeSecret::from(seed),
    })
}

/// Raw ECDH between our exchange secret and a peer's hex-encoded public key
pub fn derive_shared_secret(
    my_exchange_private: &ExchangeSecret,
    their_exchange_public_hex: &str,
) -> Result<[u8; 32], IdentityError> {
    let theirs = ExchangePublic::from_hex(their_exchange_public_hex)?;
    Ok(my_exchange_private.diffie_hellman(&theirs)?)
}

/// Order-independent rendezvous id for a pair of peers
///
/// Takes the two network ids. They are sorted before hashing so both sides
/// compute the same room.
pub fn compute_room_id(id_a: &str, id_b: &str) -> String {
    let (first, second) = if id_a <= id_b { (id_a, id_b) } else { (id_b, id_a) };

    let mut hasher = Sha256::new();
    hasher.update(first.as_bytes());
    hasher.update(second.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..ROOM_ID_LEN].to_string()
}

/// Write a fresh random salt to `salt_path`, refusing to replace an existing one
pub fn create_salt(salt_path: impl AsRef<Path>) -> Result<(), IdentityError> {
    let salt_path = salt_path.as_ref();
    if let Some(parent) = salt_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut salt = [0u8; SALT_SIZE];
    getrandom::getrandom(&mut salt).map_err(|e| std::io::Error::other(e.to_string()))?;

    let mut file = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(salt_path)
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Err(IdentityError::SaltExists(salt_path.display().to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    file.write_all(&salt)?;
    Ok(())
}
