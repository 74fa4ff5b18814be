//! Composition of key management, envelope encryption and signatures into
//! the protect/unprotect surface.
//!
//! An orchestrator is constructed explicitly at the caller's composition
//! root and owns its components; there is no process-wide instance.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::envelope::EnvelopeCipher;
use crate::error::{Error, Result};
use crate::keys::KeyManager;
use crate::lockout::{AccessDecision, AccessGate};
use crate::policy::{KeyType, SecurityLevel, SecurityPolicy};
use crate::signature::SignatureService;
use crate::store::KeyStore;

/// Key id of the orchestrator-owned hybrid encryption key.
pub const MASTER_ENCRYPTION_KEY_ID: &str = "master_encryption";
/// Key id of the orchestrator-owned signing keypair.
pub const MASTER_SIGNATURE_KEY_ID: &str = "master_signature";

/// The outer wire artifact of [`SecurityOrchestrator::protect`].
///
/// Self-contained: everything `unprotect` needs is carried in the record.
/// The JSON encoding is insensitive to field order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Base64-encoded inner ciphertext blob.
    pub encrypted_data: String,
    /// Base64-encoded signature over the inner ciphertext bytes.
    pub signature: String,
    /// Creation time, seconds since the epoch.
    pub timestamp: i64,
    /// Tier the payload was protected at.
    pub security_level: SecurityLevel,
}

impl Envelope {
    /// Serializes the envelope to JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(Error::SerializeError)
    }

    /// Parses an envelope from JSON bytes. Any structural problem, including
    /// missing fields, is a [`Error::MalformedEnvelope`].
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::MalformedEnvelope(e.to_string()))
    }
}

/// Key handles issued for one secure channel: an encryption key retained by
/// the key manager plus a dedicated signing keypair.
pub struct SecureChannel {
    pub channel_id: String,
    /// Id of the hybrid encryption key created for the channel.
    pub encryption_key_id: String,
    /// PEM-encoded private signing key. Zeroized on drop.
    pub signature_private_pem: Zeroizing<String>,
    /// PEM-encoded public verification key.
    pub signature_public_pem: String,
}

/// Read-only snapshot of the orchestrator's state.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityStatus {
    pub security_level: SecurityLevel,
    pub encryption_keys: usize,
    pub signature_keys: usize,
    pub policy: PolicySnapshot,
    pub active_lockouts: usize,
    pub failed_attempts: u64,
}

/// The policy values surfaced by [`SecurityOrchestrator::status`].
#[derive(Debug, Clone, Serialize)]
pub struct PolicySnapshot {
    pub min_key_size_bits: u32,
    pub require_quantum_resistant: bool,
    pub key_rotation_days: u32,
}

/// Orchestrates key management, envelope encryption, signing and the access
/// gate behind a small protect/unprotect surface.
pub struct SecurityOrchestrator {
    security_level: SecurityLevel,
    policy: Arc<SecurityPolicy>,
    keys: KeyManager,
    cipher: EnvelopeCipher,
    signatures: SignatureService,
    gate: AccessGate,
    master_public_pem: String,
}

impl SecurityOrchestrator {
    /// Builds an orchestrator over `store` and initializes the master keys:
    /// a hybrid encryption key (persisted through the store) and a signing
    /// keypair (in-memory only, reissued each process).
    pub fn open(
        store: Arc<dyn KeyStore>,
        policy: SecurityPolicy,
        security_level: SecurityLevel,
    ) -> Result<Self> {
        let policy = Arc::new(policy);
        let keys = KeyManager::open(store, Arc::clone(&policy), security_level)?;

        if !keys.contains(MASTER_ENCRYPTION_KEY_ID) {
            keys.generate(MASTER_ENCRYPTION_KEY_ID, KeyType::Hybrid)?;
        }

        let signatures = SignatureService::new(policy.asymmetric_key_bits);
        let master_pair = signatures.generate_keypair(MASTER_SIGNATURE_KEY_ID)?;
        let gate = AccessGate::new(Arc::clone(&policy));

        Ok(Self {
            security_level,
            policy,
            keys,
            cipher: EnvelopeCipher::new(),
            signatures,
            gate,
            master_public_pem: master_pair.public_key_pem,
        })
    }

    /// Encrypts and signs `payload` under the key named `{label}_key`,
    /// creating that key lazily as a hybrid key.
    ///
    /// The signature covers the exact inner ciphertext bytes, not the
    /// plaintext.
    pub fn protect(&self, payload: &[u8], label: &str) -> Result<Envelope> {
        let key_id = format!("{label}_key");
        let key = match self.keys.get(&key_id) {
            Ok(key) => key,
            Err(Error::KeyNotFound(_)) => self.keys.generate(&key_id, KeyType::Hybrid)?,
            Err(e) => return Err(e),
        };

        let ciphertext = self.cipher.encrypt(&key, self.security_level, payload)?;
        let signature = self.signatures.sign(&ciphertext, MASTER_SIGNATURE_KEY_ID)?;

        Ok(Envelope {
            encrypted_data: BASE64.encode(&ciphertext),
            signature: BASE64.encode(signature),
            timestamp: Utc::now().timestamp(),
            security_level: self.security_level,
        })
    }

    /// Verifies and decrypts an envelope produced by [`Self::protect`].
    ///
    /// The signature is verified over the exact ciphertext bytes first;
    /// decryption only runs after verification succeeds, so tampered
    /// ciphertext never reaches the AEAD layer.
    pub fn unprotect(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        let ciphertext = BASE64
            .decode(&envelope.encrypted_data)
            .map_err(|e| Error::MalformedEnvelope(format!("encrypted_data: {e}")))?;
        let signature = BASE64
            .decode(&envelope.signature)
            .map_err(|e| Error::MalformedEnvelope(format!("signature: {e}")))?;

        if !self
            .signatures
            .verify(&ciphertext, &signature, &self.master_public_pem)
        {
            return Err(Error::SignatureInvalid);
        }

        self.cipher.decrypt(&ciphertext, &self.keys)
    }

    /// Parses JSON bytes into an [`Envelope`] and unprotects it.
    pub fn unprotect_json(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        self.unprotect(&Envelope::from_json(bytes)?)
    }

    /// Issues one hybrid encryption key and one signing keypair scoped to
    /// `channel_id`. Key issuance only; transport is the caller's concern.
    pub fn create_secure_channel(&self, channel_id: &str) -> Result<SecureChannel> {
        let encryption_key_id = format!("channel_{channel_id}_enc");
        let signature_key_id = format!("channel_{channel_id}_sig");

        self.keys.generate(&encryption_key_id, KeyType::Hybrid)?;
        let pair = self.signatures.generate_keypair(&signature_key_id)?;

        Ok(SecureChannel {
            channel_id: channel_id.to_string(),
            encryption_key_id,
            signature_private_pem: pair.private_key_pem,
            signature_public_pem: pair.public_key_pem,
        })
    }

    /// Read-only snapshot of key counts, lockout state and policy values.
    pub fn status(&self) -> SecurityStatus {
        SecurityStatus {
            security_level: self.security_level,
            encryption_keys: self.keys.len(),
            signature_keys: self.signatures.len(),
            policy: PolicySnapshot {
                min_key_size_bits: self.policy.min_key_size_bits,
                require_quantum_resistant: self.policy.require_quantum_resistant,
                key_rotation_days: self.policy.key_rotation_days,
            },
            active_lockouts: self.gate.active_lockouts(),
            failed_attempts: self.gate.total_failed_attempts(),
        }
    }

    /// Authentication gate: whether `identity` may proceed.
    pub fn check_access(&self, identity: &str) -> AccessDecision {
        self.gate.check(identity)
    }

    /// Records a failed authentication attempt for `identity`.
    pub fn record_failed_attempt(&self, identity: &str) -> AccessDecision {
        self.gate.record_failure(identity)
    }

    /// Records a successful authentication for `identity`.
    pub fn record_successful_attempt(&self, identity: &str) {
        self.gate.record_success(identity)
    }

    /// The key manager, for lifecycle operations (rotation, expiry sweeps).
    pub fn keys(&self) -> &KeyManager {
        &self.keys
    }

    /// The master verification key, SPKI PEM.
    pub fn master_public_key(&self) -> &str {
        &self.master_public_pem
    }
}
