//! Key lifecycle management: generation, retrieval, rotation and expiry.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;

use crate::error::{Error, Result};
use crate::keys::{
    KeyMaterial, ManagedKey, HYBRID_KEY_SIZE, QUANTUM_RESISTANT_KEY_SIZE, SYMMETRIC_KEY_SIZE,
};
use crate::policy::{KeyType, SecurityLevel, SecurityPolicy};
use crate::store::KeyStore;

/// Creates, retrieves, rotates and expires key material.
///
/// The in-memory table is the authoritative view; every mutation is mirrored
/// into the injected [`KeyStore`] so that keys survive a process restart.
/// The table and the lockstep with the store are the shared mutable state of
/// this crate, guarded by the map's internal sharded locks.
pub struct KeyManager {
    policy: Arc<SecurityPolicy>,
    security_level: SecurityLevel,
    keys: DashMap<String, ManagedKey>,
    store: Arc<dyn KeyStore>,
}

impl KeyManager {
    /// Opens a manager over `store`, replaying every persisted key back into
    /// the in-memory table.
    pub fn open(
        store: Arc<dyn KeyStore>,
        policy: Arc<SecurityPolicy>,
        security_level: SecurityLevel,
    ) -> Result<Self> {
        let manager = Self {
            policy,
            security_level,
            keys: DashMap::new(),
            store,
        };

        for key_id in manager.store.list()? {
            if let Some(key) = manager.store.load(&key_id)? {
                manager.keys.insert(key_id, key);
            }
        }

        Ok(manager)
    }

    /// Generates a new key under `key_id` and persists a wrapped copy.
    ///
    /// Generating under an existing id overwrites the prior entry; callers
    /// must treat id reuse as rotation, not append.
    pub fn generate(&self, key_id: &str, key_type: KeyType) -> Result<ManagedKey> {
        let material = self.generate_material(key_type)?;
        let now = Utc::now();
        let key = ManagedKey {
            key_id: key_id.to_string(),
            key_type,
            material,
            created_at: now,
            expires_at: now + Duration::days(i64::from(self.policy.key_rotation_days)),
            security_level: self.security_level,
        };

        self.store.save(&key)?;
        self.keys.insert(key_id.to_string(), key.clone());

        tracing::debug!(key_id, key_type = key_type.as_str(), "generated key");
        Ok(key)
    }

    /// Returns the key stored under `key_id`.
    pub fn get(&self, key_id: &str) -> Result<ManagedKey> {
        self.keys
            .get(key_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::KeyNotFound(key_id.to_string()))
    }

    /// Whether a key exists under `key_id`.
    pub fn contains(&self, key_id: &str) -> bool {
        self.keys.contains_key(key_id)
    }

    /// Regenerates the key under the same id, preserving its type.
    pub fn rotate(&self, key_id: &str) -> Result<ManagedKey> {
        let key_type = self.get(key_id)?.key_type;
        self.generate(key_id, key_type)
    }

    /// Deletes every key whose expiry horizon lies at or before `now`, from
    /// both the table and the backing store. Returns the purged ids.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let expired: Vec<String> = self
            .keys
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| entry.key().clone())
            .collect();

        for key_id in &expired {
            self.keys.remove(key_id);
            self.store.delete(key_id)?;
            tracing::debug!(key_id, "purged expired key");
        }

        Ok(expired)
    }

    /// Number of keys currently in the table.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn generate_material(&self, key_type: KeyType) -> Result<KeyMaterial> {
        match key_type {
            KeyType::Symmetric => Ok(random_material(SYMMETRIC_KEY_SIZE)),
            KeyType::QuantumResistant => Ok(random_material(QUANTUM_RESISTANT_KEY_SIZE)),
            KeyType::Hybrid => Ok(random_material(HYBRID_KEY_SIZE)),
            KeyType::Asymmetric => {
                let mut rng = OsRng;
                let private_key = RsaPrivateKey::new(&mut rng, self.policy.asymmetric_key_bits)
                    .map_err(|e| Error::Crypto(format!("RSA key generation failed: {e}")))?;
                let pem = private_key
                    .to_pkcs8_pem(LineEnding::LF)
                    .map_err(|e| Error::Crypto(format!("RSA key encoding failed: {e}")))?;
                Ok(KeyMaterial::new(pem.as_bytes().to_vec()))
            }
        }
    }
}

fn random_material(len: usize) -> KeyMaterial {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    KeyMaterial::new(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryKeyStore;

    fn manager() -> KeyManager {
        let policy = Arc::new(SecurityPolicy::default());
        KeyManager::open(
            Arc::new(MemoryKeyStore::new()),
            policy,
            SecurityLevel::Maximum,
        )
        .unwrap()
    }

    #[test]
    fn generated_material_is_sized_per_type() {
        let manager = manager();

        let symmetric = manager.generate("sym", KeyType::Symmetric).unwrap();
        assert_eq!(symmetric.material.len(), SYMMETRIC_KEY_SIZE);

        let quantum = manager.generate("qr", KeyType::QuantumResistant).unwrap();
        assert_eq!(quantum.material.len(), QUANTUM_RESISTANT_KEY_SIZE);

        let hybrid = manager.generate("hyb", KeyType::Hybrid).unwrap();
        assert_eq!(hybrid.material.len(), HYBRID_KEY_SIZE);
    }

    #[test]
    fn get_missing_key_is_key_not_found() {
        let manager = manager();
        match manager.get("absent") {
            Err(Error::KeyNotFound(id)) => assert_eq!(id, "absent"),
            other => panic!("expected KeyNotFound, got {other:?}"),
        }
    }

    #[test]
    fn regeneration_overwrites_material() {
        let manager = manager();
        let first = manager.generate("reused", KeyType::Symmetric).unwrap();
        let second = manager.generate("reused", KeyType::Symmetric).unwrap();

        assert_ne!(first.material.as_bytes(), second.material.as_bytes());
        assert_eq!(manager.len(), 1);
        assert_eq!(
            manager.get("reused").unwrap().material.as_bytes(),
            second.material.as_bytes()
        );
    }

    #[test]
    fn rotate_preserves_key_type() {
        let manager = manager();
        manager.generate("rotating", KeyType::Hybrid).unwrap();
        let rotated = manager.rotate("rotating").unwrap();
        assert_eq!(rotated.key_type, KeyType::Hybrid);
        assert_eq!(rotated.material.len(), HYBRID_KEY_SIZE);
    }

    #[test]
    fn purge_removes_only_expired_keys() {
        let manager = manager();
        manager.generate("fresh", KeyType::Symmetric).unwrap();
        let stale = manager.generate("stale", KeyType::Symmetric).unwrap();

        let past_horizon = stale.expires_at + Duration::seconds(1);
        // "fresh" and "stale" share the same horizon here, so purge at a
        // point only "stale" would have reached in a staggered deployment.
        let purged = manager.purge_expired(past_horizon).unwrap();
        assert!(purged.contains(&"stale".to_string()));
        assert!(manager.get("stale").is_err());
    }

    #[test]
    fn open_replays_the_store() {
        let store = Arc::new(MemoryKeyStore::new());
        let policy = Arc::new(SecurityPolicy::default());
        let manager = KeyManager::open(
            store.clone(),
            policy.clone(),
            SecurityLevel::Standard,
        )
        .unwrap();
        let original = manager.generate("persisted", KeyType::Hybrid).unwrap();
        drop(manager);

        let reopened =
            KeyManager::open(store, policy, SecurityLevel::Standard).unwrap();
        let restored = reopened.get("persisted").unwrap();
        assert_eq!(restored.material.as_bytes(), original.material.as_bytes());
        assert_eq!(restored.key_type, KeyType::Hybrid);
    }
}
