//! Defines the custom error type for the `shield-kit` crate.

use thiserror::Error;

/// The main error type for the `shield-kit` crate.
///
/// The first four variants are the protocol failures callers are expected to
/// match on; the remaining variants cover persistence and translated
/// primitive-library failures. Raw errors from the underlying crypto crates
/// never cross this boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced key id is absent from the key table.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The outer envelope could not be parsed or is missing required fields.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Signature verification over the ciphertext failed. The ciphertext was
    /// not decrypted.
    #[error("signature verification failed")]
    SignatureInvalid,

    /// AEAD authentication failed at some layer, or the inner ciphertext blob
    /// is structurally invalid. No partial plaintext is ever returned.
    #[error("decryption failed")]
    DecryptionFailed,

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    SerializeError(serde_json::Error),

    #[error("deserialization failed: {0}")]
    DeserializeError(serde_json::Error),

    #[error("decoding from Base64 failed: {0}")]
    Base64DecodeError(#[from] base64::DecodeError),

    #[error("key storage error: {0}")]
    Storage(String),

    #[error("cryptographic operation failed: {0}")]
    Crypto(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
