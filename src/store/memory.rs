//! In-memory key store for tests and ephemeral deployments.

use dashmap::DashMap;

use crate::error::Result;
use crate::keys::ManagedKey;
use crate::store::KeyStore;

/// A [`KeyStore`] holding records in a concurrent map. Nothing survives the
/// process.
#[derive(Default)]
pub struct MemoryKeyStore {
    records: DashMap<String, ManagedKey>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn save(&self, key: &ManagedKey) -> Result<()> {
        self.records.insert(key.key_id.clone(), key.clone());
        Ok(())
    }

    fn load(&self, key_id: &str) -> Result<Option<ManagedKey>> {
        Ok(self.records.get(key_id).map(|entry| entry.value().clone()))
    }

    fn exists(&self, key_id: &str) -> bool {
        self.records.contains_key(key_id)
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self.records.iter().map(|entry| entry.key().clone()).collect())
    }

    fn delete(&self, key_id: &str) -> Result<()> {
        self.records.remove(key_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyMaterial;
    use crate::policy::{KeyType, SecurityLevel};
    use chrono::{Duration, Utc};

    fn sample_key(id: &str) -> ManagedKey {
        let now = Utc::now();
        ManagedKey {
            key_id: id.to_string(),
            key_type: KeyType::Symmetric,
            material: KeyMaterial::new(vec![1u8; 32]),
            created_at: now,
            expires_at: now + Duration::days(90),
            security_level: SecurityLevel::Standard,
        }
    }

    #[test]
    fn save_load_delete_cycle() {
        let store = MemoryKeyStore::new();
        store.save(&sample_key("a")).unwrap();

        assert!(store.exists("a"));
        assert!(store.load("a").unwrap().is_some());
        assert_eq!(store.list().unwrap(), vec!["a".to_string()]);

        store.delete("a").unwrap();
        assert!(!store.exists("a"));
        assert!(store.load("a").unwrap().is_none());
    }

    #[test]
    fn deleting_missing_id_is_not_an_error() {
        let store = MemoryKeyStore::new();
        store.delete("never-there").unwrap();
    }
}
