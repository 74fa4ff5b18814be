//! The process master key used solely to wrap other keys at rest.

use std::fs;
use std::path::Path;

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::aead;
use crate::error::{Error, Result};

/// Size of the master key in bytes.
pub const MASTER_KEY_SIZE: usize = 32;

/// How the master key is protected on disk.
pub enum MasterKeyProtection {
    /// Raw key bytes in a file with owner-only permissions.
    ///
    /// This is a deliberate simplification acceptable on a single-tenant
    /// host; multi-tenant or higher-assurance deployments must use
    /// [`MasterKeyProtection::Passphrase`] (or hardware-backed storage
    /// outside this crate).
    Plain,

    /// Master key wrapped inside an Argon2id + AES-256-GCM container keyed
    /// by a caller-supplied passphrase.
    #[cfg(feature = "secure-storage")]
    Passphrase(secrecy::SecretString),
}

/// The long-lived symmetric key wrapping all other keys at rest.
///
/// Generated once (32 random bytes) on first use and reused thereafter.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; MASTER_KEY_SIZE]);

impl MasterKey {
    /// Loads the master key from `path`, creating it lazily on first use.
    pub fn load_or_create(path: &Path, protection: &MasterKeyProtection) -> Result<Self> {
        match protection {
            MasterKeyProtection::Plain => Self::load_or_create_plain(path),
            #[cfg(feature = "secure-storage")]
            MasterKeyProtection::Passphrase(passphrase) => {
                Self::load_or_create_wrapped(path, passphrase)
            }
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn load_or_create_plain(path: &Path) -> Result<Self> {
        if path.exists() {
            let bytes = fs::read(path)?;
            let key: [u8; MASTER_KEY_SIZE] = bytes.as_slice().try_into().map_err(|_| {
                Error::Storage(format!(
                    "master key file {} has invalid length {}",
                    path.display(),
                    bytes.len()
                ))
            })?;
            return Ok(Self(key));
        }

        let mut key = [0u8; MASTER_KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        write_restricted(path, &key)?;
        tracing::info!(path = %path.display(), "created master key file");
        Ok(Self(key))
    }

    #[cfg(feature = "secure-storage")]
    fn load_or_create_wrapped(path: &Path, passphrase: &secrecy::SecretString) -> Result<Self> {
        use secrecy::ExposeSecret;

        if path.exists() {
            let json = fs::read_to_string(path)?;
            let container = MasterKeyContainer::from_json(&json)?;
            return container.unwrap_key(passphrase.expose_secret().as_bytes());
        }

        let mut key = [0u8; MASTER_KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        let container =
            MasterKeyContainer::wrap_key(passphrase.expose_secret().as_bytes(), &key)?;
        write_restricted(path, container.to_json()?.as_bytes())?;
        tracing::info!(path = %path.display(), "created passphrase-wrapped master key file");
        Ok(Self(key))
    }
}

/// Writes `bytes` to `path` atomically with owner-only permissions.
/// 中文: 以原子方式写入文件，并将权限限制为仅属主可读写。
fn write_restricted(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, bytes)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600))?;
    }

    fs::rename(&temp_path, path)?;
    Ok(())
}

/// An encrypted container for the master key, protected by a passphrase.
///
/// Argon2id derives the wrapping key from the passphrase; AES-256-GCM
/// encrypts the master key bytes. The container stores its own derivation
/// parameters so they can be tightened without breaking existing files.
#[cfg(feature = "secure-storage")]
#[derive(serde::Serialize, serde::Deserialize)]
struct MasterKeyContainer {
    /// Base64-encoded `nonce || ciphertext || tag`.
    encrypted_key: String,
    /// Base64-encoded Argon2 salt.
    salt: String,
    /// Argon2 memory cost parameter (in KiB).
    memory_cost: u32,
    /// Argon2 time cost parameter (number of iterations).
    time_cost: u32,
    /// Argon2 parallelism cost parameter.
    parallelism_cost: u32,
    /// Creation timestamp in ISO 8601 format.
    created_at: String,
}

#[cfg(feature = "secure-storage")]
impl MasterKeyContainer {
    const SALT_SIZE: usize = 16;
    const DEFAULT_MEMORY_COST: u32 = 19456; // 19 MiB
    const DEFAULT_TIME_COST: u32 = 2;
    const DEFAULT_PARALLELISM_COST: u32 = 1;

    fn wrap_key(passphrase: &[u8], master_key: &[u8; MASTER_KEY_SIZE]) -> Result<Self> {
        use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

        // 1. Draw a fresh salt and derive the wrapping key.
        let mut salt = [0u8; Self::SALT_SIZE];
        OsRng.fill_bytes(&mut salt);

        let mut wrapping_key = [0u8; 32];
        crate::hash::derive_passphrase_key(
            passphrase,
            &salt,
            Self::DEFAULT_MEMORY_COST,
            Self::DEFAULT_TIME_COST,
            Self::DEFAULT_PARALLELISM_COST,
            &mut wrapping_key,
        )?;

        // 2. Seal the master key under the wrapping key.
        let nonce = aead::random_nonce();
        let sealed = aead::seal(&wrapping_key, &nonce, master_key)?;
        wrapping_key.zeroize();

        let mut blob = Vec::with_capacity(aead::NONCE_SIZE + sealed.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&sealed);

        Ok(Self {
            encrypted_key: BASE64.encode(blob),
            salt: BASE64.encode(salt),
            memory_cost: Self::DEFAULT_MEMORY_COST,
            time_cost: Self::DEFAULT_TIME_COST,
            parallelism_cost: Self::DEFAULT_PARALLELISM_COST,
            created_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    fn unwrap_key(&self, passphrase: &[u8]) -> Result<MasterKey> {
        use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

        // 1. Re-derive the wrapping key with the stored parameters.
        let salt = BASE64.decode(&self.salt)?;
        let mut wrapping_key = [0u8; 32];
        crate::hash::derive_passphrase_key(
            passphrase,
            &salt,
            self.memory_cost,
            self.time_cost,
            self.parallelism_cost,
            &mut wrapping_key,
        )?;

        // 2. Open the sealed master key.
        let blob = BASE64.decode(&self.encrypted_key)?;
        if blob.len() < aead::NONCE_SIZE + aead::TAG_SIZE {
            return Err(Error::Storage(
                "master key container is truncated".to_string(),
            ));
        }
        let (nonce, sealed) = blob.split_at(aead::NONCE_SIZE);
        let opened = aead::open(&wrapping_key, nonce, sealed).map_err(|_| {
            Error::Crypto("master key container authentication failed (wrong passphrase?)".to_string())
        })?;
        wrapping_key.zeroize();

        let key: [u8; MASTER_KEY_SIZE] = opened.as_slice().try_into().map_err(|_| {
            Error::Storage("master key container holds an invalid key length".to_string())
        })?;
        Ok(MasterKey(key))
    }

    fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::SerializeError)
    }

    fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::DeserializeError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn plain_master_key_is_created_once_and_reused() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("master.key");

        let first = MasterKey::load_or_create(&path, &MasterKeyProtection::Plain).unwrap();
        let second = MasterKey::load_or_create(&path, &MasterKeyProtection::Plain).unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
        assert_eq!(fs::read(&path).unwrap().len(), MASTER_KEY_SIZE);
    }

    #[cfg(unix)]
    #[test]
    fn master_key_file_has_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("master.key");
        MasterKey::load_or_create(&path, &MasterKeyProtection::Plain).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn corrupt_master_key_length_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("master.key");
        fs::write(&path, b"short").unwrap();

        assert!(matches!(
            MasterKey::load_or_create(&path, &MasterKeyProtection::Plain),
            Err(Error::Storage(_))
        ));
    }

    #[cfg(feature = "secure-storage")]
    #[test]
    fn wrapped_master_key_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("master.key");
        let protection = MasterKeyProtection::Passphrase(secrecy::SecretString::from(
            "vault-passphrase".to_string(),
        ));

        let first = MasterKey::load_or_create(&path, &protection).unwrap();
        let second = MasterKey::load_or_create(&path, &protection).unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());

        // The file holds a JSON container, not raw key bytes.
        let on_disk = fs::read(&path).unwrap();
        assert_ne!(on_disk.as_slice(), first.as_bytes());
        assert!(serde_json::from_slice::<serde_json::Value>(&on_disk).is_ok());
    }

    #[cfg(feature = "secure-storage")]
    #[test]
    fn wrong_passphrase_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("master.key");

        let good =
            MasterKeyProtection::Passphrase(secrecy::SecretString::from("correct".to_string()));
        MasterKey::load_or_create(&path, &good).unwrap();

        let bad =
            MasterKeyProtection::Passphrase(secrecy::SecretString::from("incorrect".to_string()));
        assert!(matches!(
            MasterKey::load_or_create(&path, &bad),
            Err(Error::Crypto(_))
        ));
    }
}
