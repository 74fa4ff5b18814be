//! Key material and the managed key record.

pub mod manager;

pub use manager::KeyManager;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};
use crate::policy::{KeyType, SecurityLevel};

/// Key material sizes in bytes, per key type.
pub const SYMMETRIC_KEY_SIZE: usize = 32;
pub const QUANTUM_RESISTANT_KEY_SIZE: usize = 64;
pub const HYBRID_KEY_SIZE: usize = 96;

/// Width of one AEAD key segment inside hybrid material.
pub const SEGMENT_SIZE: usize = 32;

/// Opaque key bytes with automatic memory erasure on drop.
///
/// Serialized with `serde_bytes` so at-rest records keep the raw bytes rather
/// than a JSON integer array.
#[derive(Clone, PartialEq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial(#[serde(with = "serde_bytes")] Vec<u8>);

impl KeyMaterial {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial").finish_non_exhaustive()
    }
}

impl From<Vec<u8>> for KeyMaterial {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for KeyMaterial {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A key record owned by a [`KeyManager`].
///
/// Never mutated after creation: rotation produces a new record that replaces
/// the prior entry under the same id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedKey {
    pub key_id: String,
    pub key_type: KeyType,
    pub material: KeyMaterial,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub security_level: SecurityLevel,
}

impl ManagedKey {
    /// Whether this key has passed its expiry horizon.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// The primary 32-byte AEAD segment.
    pub fn primary_segment(&self) -> Result<&[u8]> {
        if self.material.len() < SEGMENT_SIZE {
            return Err(Error::Crypto(format!(
                "key material for '{}' is shorter than one AEAD segment",
                self.key_id
            )));
        }
        Ok(&self.material.as_bytes()[..SEGMENT_SIZE])
    }

    /// The secondary 32-byte AEAD segment used by the layered mode.
    ///
    /// Material shorter than two segments falls back to reusing the primary
    /// segment for both layers. The fallback weakens the layering without
    /// breaking it and is reported through a warning-level event.
    pub fn secondary_segment(&self) -> Result<&[u8]> {
        if self.material.len() >= 2 * SEGMENT_SIZE {
            Ok(&self.material.as_bytes()[SEGMENT_SIZE..2 * SEGMENT_SIZE])
        } else {
            tracing::warn!(
                key_id = %self.key_id,
                material_len = self.material.len(),
                "key material too short for an independent second segment; \
                 reusing the primary segment for both layers"
            );
            self.primary_segment()
        }
    }
}
