use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

/// Size of Ed25519 / X25519 private keys in bytes
pub const PRIVATE_KEY_SIZE: usize = 32;
/// Size of Ed25519 / X25519 public keys in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Errors that can occur during key operations
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("key error: {0}")]
    Default(#[from] anyhow::Error),
}

fn decode_key_hex(hex: &str, what: &str) -> Result<[u8; PUBLIC_KEY_SIZE], KeyError> {
    let hex = hex.trim();
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    let mut buff = [0; PUBLIC_KEY_SIZE];
    hex::decode_to_slice(hex, &mut buff)
        .map_err(|_| anyhow::anyhow!("{} hex decode error", what))?;
    Ok(buff)
}

/// Public half of a peer's signing identity
///
/// The network id a peer is known by is derived from these bytes
/// (see [`crate::identity::Identity::network_id`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Parse a public key from a hexadecimal string
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings.
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        let bytes = decode_key_hex(hex, "public key")?;
        let key = VerifyingKey::from_bytes(&bytes)
            .map_err(|e| anyhow::anyhow!("invalid ed25519 public key: {}", e))?;
        Ok(Self(key))
    }

    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0.to_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Verify an Ed25519 signature on a message.
    pub fn verify(
        &self,
        msg: &[u8],
        signature: &ed25519_dalek::Signature,
    ) -> Result<(), ed25519_dalek::SignatureError> {
        self.0.verify_strict(msg, signature)
    }
}

/// Secret half of a peer's signing identity
///
/// Never written to disk. It is regenerated from the identity seed at login.
#[derive(Clone)]
pub struct SecretKey(SigningKey);

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SecretKey").field(&self.public()).finish()
    }
}

impl From<[u8; PRIVATE_KEY_SIZE]> for SecretKey {
    fn from(seed: [u8; PRIVATE_KEY_SIZE]) -> Self {
        Self(SigningKey::from_bytes(&seed))
    }
}

impl SecretKey {
    /// Generate a new random secret key using a cryptographically secure RNG
    pub fn generate() -> Self {
        let mut bytes = [0u8; PRIVATE_KEY_SIZE];
        getrandom::getrandom(&mut bytes).expect("failed to generate random bytes");
        Self::from(bytes)
    }

    pub fn public(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    pub fn to_bytes(&self) -> [u8; PRIVATE_KEY_SIZE] {
        self.0.to_bytes()
    }

    /// Sign a message with this secret key using Ed25519.
    pub fn sign(&self, msg: &[u8]) -> ed25519_dalek::Signature {
        self.0.sign(msg)
    }
}

/// X25519 public key a peer hands out so others can derive session keys with it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExchangePublic(X25519PublicKey);

impl From<[u8; PUBLIC_KEY_SIZE]> for ExchangePublic {
    fn from(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(X25519PublicKey::from(bytes))
    }
}

impl ExchangePublic {
    /// Parse an exchange key from a hexadecimal string
    ///
    /// Accepts both plain hex and "0x"-prefixed hex strings.
    pub fn from_hex(hex: &str) -> Result<Self, KeyError> {
        Ok(decode_key_hex(hex, "exchange key")?.into())
    }

    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.0.to_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Whether this is a small-order point, which would make any ECDH output public
    pub fn is_low_order(&self) -> bool {
        // x25519 clamps every scalar to a multiple of the cofactor, so any
        // fixed scalar sends a small-order point to zero
        !StaticSecret::from([1u8; PRIVATE_KEY_SIZE])
            .diffie_hellman(&self.0)
            .was_contributory()
    }
}

/// X25519 private key used for ECDH against a peer's [`ExchangePublic`]
#[derive(Clone)]
pub struct ExchangeSecret(StaticSecret);

impl std::fmt::Debug for ExchangeSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ExchangeSecret").field(&self.public()).finish()
    }
}

impl From<[u8; PRIVATE_KEY_SIZE]> for ExchangeSecret {
    fn from(seed: [u8; PRIVATE_KEY_SIZE]) -> Self {
        Self(StaticSecret::from(seed))
    }
}

impl ExchangeSecret {
    pub fn generate() -> Self {
        let mut bytes = [0u8; PRIVATE_KEY_SIZE];
        getrandom::getrandom(&mut bytes).expect("failed to generate random bytes");
        Self::from(bytes)
    }

    pub fn public(&self) -> ExchangePublic {
        ExchangePublic(X25519PublicKey::from(&self.0))
    }

    /// Raw X25519 Diffie-Hellman against `their_public`
    ///
    /// The output is not uniformly random; run it through a KDF
    /// (see [`crate::crypto::Secret::from_shared_secret`]) before use as a key.
    /// Fails for small-order public keys, whose output does not depend on our secret.
    pub fn diffie_hellman(&self, their_public: &ExchangePublic) -> Result<[u8; 32], KeyError> {
        let shared = self.0.diffie_hellman(&their_public.0);
        if !shared.was_contributory() {
            return Err(anyhow::anyhow!("exchange key is a low-order point").into());
        }
        Ok(shared.to_bytes())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_public_key_hex_roundtrip() {
        let public_key = SecretKey::generate().public();
        let recovered = PublicKey::from_hex(&public_key.to_hex()).unwrap();
        assert_eq!(public_key, recovered);

        let prefixed = format!("0x{}", public_key.to_hex());
        assert_eq!(PublicKey::from_hex(&prefixed).unwrap(), public_key);
    }

    #[test]
    fn test_sign_and_verify() {
        let secret_key = SecretKey::generate();
        let public_key = secret_key.public();
        let message = b"hello, world!";

        let signature = secret_key.sign(message);
        assert!(public_key.verify(message, &signature).is_ok());

        // Verify fails with wrong message
        assert!(public_key.verify(b"hello, world?", &signature).is_err());

        // Verify fails with wrong key
        let other_key = SecretKey::generate().public();
        assert!(other_key.verify(message, &signature).is_err());
    }

    #[test]
    fn test_exchange_is_symmetric() {
        let alice = ExchangeSecret::generate();
        let bob = ExchangeSecret::generate();

        assert_eq!(
            alice.diffie_hellman(&bob.public()).unwrap(),
            bob.diffie_hellman(&alice.public()).unwrap()
        );
    }

    #[test]
    fn test_exchange_public_rejects_bad_hex() {
        assert!(ExchangePublic::from_hex("not hex").is_err());
        assert!(ExchangePublic::from_hex("abcd").is_err());
        // Well-formed hex parses; whether the point is usable is checked separately
        assert!(ExchangePublic::from_hex(&"00".repeat(PUBLIC_KEY_SIZE)).is_ok());
    }

    #[test]
    fn test_low_order_exchange_key_is_refused() {
        let zero = ExchangePublic::from_hex(&"00".repeat(PUBLIC_KEY_SIZE)).unwrap();
        assert!(zero.is_low_order());
        assert!(ExchangeSecret::generate().diffie_hellman(&zero).is_err());

        let mut one = [0u8; PUBLIC_KEY_SIZE];
        one[0] = 1;
        assert!(ExchangePublic::from(one).is_low_order());

        assert!(!ExchangeSecret::generate().public().is_low_order());
    }
}
