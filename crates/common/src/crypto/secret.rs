//! Symmetric encryption using ChaCha20-Poly1305
//!
//! A `Secret` protects two things in GhostSync:
//! - **The peer store**: one document per user, keyed from the passphrase
//! - **File payloads**: one session key per peer pair, keyed from ECDH

use std::ops::Deref;

use chacha20poly1305::Key;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};

/// Size of ChaCha20-Poly1305 nonce in bytes
pub const NONCE_SIZE: usize = 12;
/// Size of ChaCha20-Poly1305 key in bytes (256 bits)
pub const SECRET_SIZE: usize = 32;
/// Size of BLAKE3 hash in bytes (256 bits)
pub const BLAKE3_HASH_SIZE: usize = 32;

/// Errors that can occur during encryption/decryption
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("secret error: {0}")]
    Default(#[from] anyhow::Error),
}

/// A 256-bit symmetric encryption key
///
/// The encrypted format is: `nonce (12 bytes) || encrypted(hash(32 bytes) || plaintext) || tag (16 bytes)`.
/// The BLAKE3 hash of the plaintext is prepended before encryption and checked
/// again after decryption.
///
/// # Examples
///
/// ```ignore
/// let secret = Secret::generate();
///
/// let ciphertext = secret.encrypt(b"sensitive data")?;
/// let recovered = secret.decrypt(&ciphertext)?;
/// assert_eq!(b"sensitive data", &recovered[..]);
/// ```
#[derive(PartialEq, Clone)]
pub struct Secret([u8; SECRET_SIZE]);

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(..)")
    }
}

impl Deref for Secret {
    type Target = [u8; SECRET_SIZE];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<[u8; SECRET_SIZE]> for Secret {
    fn from(bytes: [u8; SECRET_SIZE]) -> Self {
        Secret(bytes)
    }
}

impl Secret {
    /// Generate a new random secret using a cryptographically secure RNG
    pub fn generate() -> Self {
        let mut buff = [0; SECRET_SIZE];
        getrandom::getrandom(&mut buff).expect("failed to generate random bytes");
        Self(buff)
    }

    /// Create a secret from a byte slice
    ///
    /// # Errors
    ///
    /// Returns an error if the slice length is not exactly `SECRET_SIZE` bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self, SecretError> {
        if data.len() != SECRET_SIZE {
            return Err(anyhow::anyhow!(
                "invalid secret size, expected {}, got {}",
                SECRET_SIZE,
                data.len()
            )
            .into());
        }
        let mut buff = [0; SECRET_SIZE];
        buff.copy_from_slice(data);
        Ok(buff.into())
    }

    pub fn bytes(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// Encrypt data using ChaCha20-Poly1305 AEAD
    ///
    /// A random nonce is generated for each encryption operation.
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, SecretError> {
        let plaintext_hash = blake3::hash(data);

        let mut data_with_hash = Vec::with_capacity(BLAKE3_HASH_SIZE + data.len());
        data_with_hash.extend_from_slice(plaintext_hash.as_bytes());
        data_with_hash.extend_from_slice(data);

        let key = Key::from_slice(self.bytes());
        let cipher = ChaCha20Poly1305::new(key);

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut nonce_bytes)
            .map_err(|e| anyhow::anyhow!("failed to generate nonce: {}", e))?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, data_with_hash.as_ref())
            .map_err(|_| anyhow::anyhow!("encrypt error"))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(nonce.as_ref());
        out.extend_from_slice(ciphertext.as_ref());

        Ok(out)
    }

    /// Decrypt data using ChaCha20-Poly1305 AEAD
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Data is too short to contain a nonce
    /// - Authentication tag verification fails (tampered data or wrong key)
    /// - Decrypted data is too short to contain the hash header
    /// - Hash verification fails
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, SecretError> {
        if data.len() < NONCE_SIZE {
            return Err(anyhow::anyhow!("data too short for nonce").into());
        }

        let key = Key::from_slice(self.bytes());
        let nonce = Nonce::from_slice(&data[..NONCE_SIZE]);
        let cipher = ChaCha20Poly1305::new(key);
        let decrypted = cipher
            .decrypt(nonce, &data[NONCE_SIZE..])
            .map_err(|_| anyhow::anyhow!("decrypt error"))?;

        if decrypted.len() < BLAKE3_HASH_SIZE {
            return Err(anyhow::anyhow!("decrypted data too short for hash header").into());
        }

        let stored_hash = &decrypted[..BLAKE3_HASH_SIZE];
        let plaintext = &decrypted[BLAKE3_HASH_SIZE..];

        let computed_hash = blake3::hash(plaintext);
        if stored_hash != computed_hash.as_bytes() {
            return Err(anyhow::anyhow!("hash verification failed - data corrupted").into());
        }

        Ok(plaintext.to_vec())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_secret_encrypt_decrypt() {
        let secret = Secret::generate();
        let data = b"hello world, this is a test message for encryption";

        let encrypted = secret.encrypt(data).unwrap();
        let decrypted = secret.decrypt(&encrypted).unwrap();

        assert_eq!(data.as_slice(), decrypted.as_slice());
    }

    #[test]
    fn test_secret_size_validation() {
        assert!(Secret::from_slice(&[1u8; 16]).is_err());
        assert!(Secret::from_slice(&[1u8; 64]).is_err());
        assert!(Secret::from_slice(&[1u8; SECRET_SIZE]).is_ok());
    }

    #[test]
    fn test_tampered_ciphertext_is_rejected() {
        let secret = Secret::generate();
        let mut encrypted = secret.encrypt(b"test data for integrity check").unwrap();

        encrypted[NONCE_SIZE + 10] ^= 0xFF;
        assert!(secret.decrypt(&encrypted).is_err());
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let encrypted = Secret::generate().encrypt(b"for someone else").unwrap();
        assert!(Secret::generate().decrypt(&encrypted).is_err());
    }

    #[test]
    fn test_empty_data_encryption() {
        let secret = Secret::generate();

        let encrypted = secret.encrypt(b"").unwrap();
        assert_eq!(encrypted.len(), NONCE_SIZE + BLAKE3_HASH_SIZE + 16);
        assert!(secret.decrypt(&encrypted).unwrap().is_empty());
    }

    #[test]
    fn test_short_input_is_rejected() {
        let secret = Secret::generate();
        assert!(secret.decrypt(&[0u8; NONCE_SIZE - 1]).is_err());
    }
}
