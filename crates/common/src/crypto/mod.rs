//! Cryptographic primitives for GhostSync
//!
//! This module provides the cryptographic foundation for the sync protocol:
//!
//! - **Identity**: Ed25519 keypairs; the public half names a peer on the network
//! - **Key Exchange**: X25519 keypairs used for ECDH between two trusted peers
//! - **Encryption**: ChaCha20-Poly1305 for the peer store and for file payloads
//! - **Key Derivation**: PBKDF2 for passphrase keys, HKDF for session keys
//!
//! # Security Model
//!
//! ## Peer Identity
//! Both keypairs are generated from the same 32-byte seed, which is itself
//! derived from a device-local salt file and the user's credentials. The
//! same credentials on the same device always produce the same keys.
//!
//! ## Session Keys
//! Two peers that know each other's exchange public key compute the same
//! X25519 shared secret. The raw secret is never used directly; it is
//! expanded with HKDF into a `Secret` shared by every transfer between the pair.
//!
//! ## At-Rest Encryption
//! The trusted peer list is encrypted under a `Secret` stretched from the
//! user's passphrase and salt with PBKDF2.

mod kdf;
mod keys;
mod secret;

pub use ed25519_dalek::Signature;
pub use kdf::{PBKDF2_ITERATIONS, SESSION_KEY_INFO};
pub use keys::{
    ExchangePublic, ExchangeSecret, KeyError, PublicKey, SecretKey, PRIVATE_KEY_SIZE,
    PUBLIC_KEY_SIZE,
};
pub use secret::{Secret, SecretError, BLAKE3_HASH_SIZE, NONCE_SIZE, SECRET_SIZE};
