//! File-backed key store with master-key wrapping.
//!
//! Layout under the storage root:
//!
//! ```text
//! <root>/master.key      master key (raw or passphrase-wrapped container)
//! <root>/keys/<id>.key   one JSON record per key, material AEAD-wrapped
//! ```
//!
//! 中文: 密钥以每个 id 一个 JSON 记录的形式持久化，材料在落盘前
//! 使用主密钥进行 AEAD 包装。

use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aead;
use crate::error::{Error, Result};
use crate::keys::{KeyMaterial, ManagedKey};
use crate::master::{MasterKey, MasterKeyProtection};
use crate::policy::{KeyType, SecurityLevel};
use crate::store::KeyStore;

const MASTER_KEY_FILE: &str = "master.key";
const KEYS_SUBDIR: &str = "keys";
const KEY_FILE_EXT: &str = "key";

/// A [`KeyStore`] persisting wrapped key records to the filesystem.
pub struct FileKeyStore {
    keys_dir: PathBuf,
    master: MasterKey,
}

impl FileKeyStore {
    /// Opens (or initializes) a store rooted at `root` with the master key
    /// kept as raw bytes on disk.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        Self::with_protection(root, MasterKeyProtection::Plain)
    }

    /// Opens (or initializes) a store rooted at `root` with the given
    /// master-key protection.
    pub fn with_protection<P: AsRef<Path>>(
        root: P,
        protection: MasterKeyProtection,
    ) -> Result<Self> {
        let root = root.as_ref();
        let keys_dir = root.join(KEYS_SUBDIR);
        fs::create_dir_all(&keys_dir)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(root, fs::Permissions::from_mode(0o700))?;
            fs::set_permissions(&keys_dir, fs::Permissions::from_mode(0o700))?;
        }

        let master = MasterKey::load_or_create(&root.join(MASTER_KEY_FILE), &protection)?;
        Ok(Self { keys_dir, master })
    }

    fn key_path(&self, key_id: &str) -> PathBuf {
        self.keys_dir.join(format!("{key_id}.{KEY_FILE_EXT}"))
    }

    /// Encrypts key material under the master key; `nonce || ciphertext || tag`.
    fn wrap_material(&self, material: &[u8]) -> Result<Vec<u8>> {
        let nonce = aead::random_nonce();
        let sealed = aead::seal(self.master.as_bytes(), &nonce, material)?;

        let mut blob = Vec::with_capacity(aead::NONCE_SIZE + sealed.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&sealed);
        Ok(blob)
    }

    fn unwrap_material(&self, key_id: &str, blob: &[u8]) -> Result<Vec<u8>> {
        if blob.len() < aead::NONCE_SIZE + aead::TAG_SIZE {
            return Err(Error::Storage(format!(
                "wrapped material for '{key_id}' is truncated"
            )));
        }
        let (nonce, sealed) = blob.split_at(aead::NONCE_SIZE);
        aead::open(self.master.as_bytes(), nonce, sealed).map_err(|_| {
            Error::Storage(format!(
                "failed to unwrap key material for '{key_id}' (master key mismatch?)"
            ))
        })
    }
}

/// On-disk form of a [`ManagedKey`]: metadata in the clear, material wrapped.
#[derive(Serialize, Deserialize)]
struct StoredKeyRecord {
    key_id: String,
    key_type: KeyType,
    security_level: SecurityLevel,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    /// Base64-encoded `nonce || ciphertext || tag` under the master key.
    wrapped_material: String,
}

impl KeyStore for FileKeyStore {
    fn save(&self, key: &ManagedKey) -> Result<()> {
        let record = StoredKeyRecord {
            key_id: key.key_id.clone(),
            key_type: key.key_type,
            security_level: key.security_level,
            created_at: key.created_at,
            expires_at: key.expires_at,
            wrapped_material: BASE64.encode(self.wrap_material(key.material.as_bytes())?),
        };
        let json = serde_json::to_string(&record).map_err(Error::SerializeError)?;

        // Atomic write to prevent data corruption.
        let path = self.key_path(&key.key_id);
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&temp_path, path)?;
        Ok(())
    }

    fn load(&self, key_id: &str) -> Result<Option<ManagedKey>> {
        let path = self.key_path(key_id);
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path)?;
        let record: StoredKeyRecord = serde_json::from_str(&json).map_err(|e| {
            Error::Storage(format!("failed to parse key record {}: {e}", path.display()))
        })?;

        let wrapped = BASE64.decode(&record.wrapped_material)?;
        let material = self.unwrap_material(key_id, &wrapped)?;

        Ok(Some(ManagedKey {
            key_id: record.key_id,
            key_type: record.key_type,
            material: KeyMaterial::new(material),
            created_at: record.created_at,
            expires_at: record.expires_at,
            security_level: record.security_level,
        }))
    }

    fn exists(&self, key_id: &str) -> bool {
        self.key_path(key_id).exists()
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.keys_dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != KEY_FILE_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        Ok(names)
    }

    fn delete(&self, key_id: &str) -> Result<()> {
        let path = self.key_path(key_id);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    fn sample_key(id: &str) -> ManagedKey {
        let now = Utc::now();
        ManagedKey {
            key_id: id.to_string(),
            key_type: KeyType::Hybrid,
            material: KeyMaterial::new(vec![9u8; 96]),
            created_at: now,
            expires_at: now + Duration::days(90),
            security_level: SecurityLevel::Maximum,
        }
    }

    #[test]
    fn save_load_roundtrip_preserves_record() {
        let dir = tempdir().unwrap();
        let store = FileKeyStore::new(dir.path()).unwrap();
        let key = sample_key("roundtrip");

        store.save(&key).unwrap();
        let loaded = store.load("roundtrip").unwrap().unwrap();

        assert_eq!(loaded.key_id, key.key_id);
        assert_eq!(loaded.key_type, key.key_type);
        assert_eq!(loaded.material.as_bytes(), key.material.as_bytes());
        assert_eq!(loaded.expires_at, key.expires_at);
    }

    #[test]
    fn material_is_not_stored_in_the_clear() {
        let dir = tempdir().unwrap();
        let store = FileKeyStore::new(dir.path()).unwrap();
        let key = sample_key("wrapped");
        store.save(&key).unwrap();

        let on_disk = fs::read_to_string(dir.path().join("keys/wrapped.key")).unwrap();
        let clear_b64 = BASE64.encode(key.material.as_bytes());
        assert!(!on_disk.contains(&clear_b64));
    }

    #[test]
    fn records_survive_reopening_with_the_same_master_key() {
        let dir = tempdir().unwrap();
        let key = sample_key("durable");
        {
            let store = FileKeyStore::new(dir.path()).unwrap();
            store.save(&key).unwrap();
        }

        let reopened = FileKeyStore::new(dir.path()).unwrap();
        let loaded = reopened.load("durable").unwrap().unwrap();
        assert_eq!(loaded.material.as_bytes(), key.material.as_bytes());
    }

    #[test]
    fn foreign_master_key_cannot_unwrap() {
        let dir_a = tempdir().unwrap();
        let dir_b = tempdir().unwrap();
        let key = sample_key("foreign");

        let store_a = FileKeyStore::new(dir_a.path()).unwrap();
        store_a.save(&key).unwrap();

        // Move the record under a store with a different master key.
        let store_b = FileKeyStore::new(dir_b.path()).unwrap();
        fs::copy(
            dir_a.path().join("keys/foreign.key"),
            dir_b.path().join("keys/foreign.key"),
        )
        .unwrap();

        assert!(matches!(store_b.load("foreign"), Err(Error::Storage(_))));
    }

    #[test]
    fn list_reports_only_key_records() {
        let dir = tempdir().unwrap();
        let store = FileKeyStore::new(dir.path()).unwrap();
        store.save(&sample_key("one")).unwrap();
        store.save(&sample_key("two")).unwrap();

        let mut names = store.list().unwrap();
        names.sort();
        assert_eq!(names, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn delete_removes_the_record() {
        let dir = tempdir().unwrap();
        let store = FileKeyStore::new(dir.path()).unwrap();
        store.save(&sample_key("gone")).unwrap();

        store.delete("gone").unwrap();
        assert!(!store.exists("gone"));
        assert!(store.load("gone").unwrap().is_none());
        // Deleting again is not an error.
        store.delete("gone").unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn key_records_have_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let store = FileKeyStore::new(dir.path()).unwrap();
        store.save(&sample_key("perms")).unwrap();

        let mode = fs::metadata(dir.path().join("keys/perms.key"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
