use hkdf::Hkdf;
use sha2::Sha256;

use super::secret::{Secret, SECRET_SIZE};

/// PBKDF2 rounds used to stretch a passphrase into a store key
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// HKDF info label binding session keys to this protocol
pub const SESSION_KEY_INFO: &[u8] = b"ghost-sync/session-key/v1";

impl Secret {
    /// Stretch a passphrase and salt into a symmetric key with PBKDF2-HMAC-SHA256
    pub fn from_passphrase(passphrase: &str, salt: &[u8]) -> Self {
        let mut key = [0u8; SECRET_SIZE];
        pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
        Secret::from(key)
    }

    /// Expand raw ECDH output into a session key with HKDF-SHA256
    ///
    /// Both sides of a pair feed in the same shared secret and get the same key.
    pub fn from_shared_secret(shared_secret: &[u8]) -> Self {
        let hkdf = Hkdf::<Sha256>::new(None, shared_secret);
        let mut key = [0u8; SECRET_SIZE];
        hkdf.expand(SESSION_KEY_INFO, &mut key)
            .expect("32 bytes is a valid length for HKDF");
        Secret::from(key)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_passphrase_key_is_deterministic() {
        let salt = b"0123456789abcdef";
        assert_eq!(
            Secret::from_passphrase("hunter2", salt),
            Secret::from_passphrase("hunter2", salt)
        );
        assert_ne!(
            Secret::from_passphrase("hunter2", salt),
            Secret::from_passphrase("hunter3", salt)
        );
        assert_ne!(
            Secret::from_passphrase("hunter2", salt),
            Secret::from_passphrase("hunter2", b"fedcba9876543210")
        );
    }

    #[test]
    fn test_session_key_differs_from_raw_secret() {
        let raw = [7u8; 32];
        let key = Secret::from_shared_secret(&raw);
        assert_ne!(key.bytes(), &raw[..]);
        assert_eq!(key, Secret::from_shared_secret(&raw));
    }
}
