//! Thin wrappers over the AES-256-GCM primitive.
//!
//! Every AEAD call in the crate goes through these helpers so primitive
//! errors are translated exactly once.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{Error, Result};

pub(crate) const NONCE_SIZE: usize = 12;
pub(crate) const TAG_SIZE: usize = 16;

/// Draws a fresh random nonce.
pub(crate) fn random_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Encrypts `plaintext` under a 32-byte key; returns ciphertext with the
/// 16-byte tag appended.
pub(crate) fn seal(key: &[u8], nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> Result<Vec<u8>> {
    debug_assert_eq!(key.len(), 32);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| Error::Crypto("AEAD encryption failed".to_string()))
}

/// Decrypts `ciphertext` (tag appended) under a 32-byte key and nonce.
pub(crate) fn open(key: &[u8], nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    debug_assert_eq!(key.len(), 32);
    debug_assert_eq!(nonce.len(), NONCE_SIZE);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| Error::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrip() {
        let key = [0x42u8; 32];
        let nonce = random_nonce();
        let sealed = seal(&key, &nonce, b"payload").unwrap();

        assert_eq!(sealed.len(), b"payload".len() + TAG_SIZE);
        assert_eq!(open(&key, &nonce, &sealed).unwrap(), b"payload");
    }

    #[test]
    fn tampering_is_rejected() {
        let key = [0x42u8; 32];
        let nonce = random_nonce();
        let mut sealed = seal(&key, &nonce, b"payload").unwrap();
        sealed[0] ^= 0x01;

        assert!(matches!(
            open(&key, &nonce, &sealed),
            Err(Error::DecryptionFailed)
        ));
    }
}
