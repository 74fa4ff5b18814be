//! Pluggable at-rest key storage.
//!
//! The key table in [`crate::keys::KeyManager`] is backed by an explicit
//! store abstraction: in-memory for tests, file-backed with master-key
//! wrapping for production. The implementation is selected at construction.

pub mod file;
pub mod memory;

pub use file::FileKeyStore;
pub use memory::MemoryKeyStore;

use crate::error::Result;
use crate::keys::ManagedKey;

/// Persistence interface for managed keys.
///
/// Implementations take and return plaintext key records; whether material is
/// wrapped at rest is the implementation's concern.
pub trait KeyStore: Send + Sync {
    /// Persists `key`, overwriting any prior record under the same id.
    fn save(&self, key: &ManagedKey) -> Result<()>;

    /// Loads the record under `key_id`, or `None` if absent.
    fn load(&self, key_id: &str) -> Result<Option<ManagedKey>>;

    /// Whether a record exists under `key_id`.
    fn exists(&self, key_id: &str) -> bool;

    /// Lists every stored key id.
    fn list(&self) -> Result<Vec<String>>;

    /// Deletes the record under `key_id`; absent ids are not an error.
    fn delete(&self, key_id: &str) -> Result<()>;
}
