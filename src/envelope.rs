//! The authenticated-encryption envelope format.
//!
//! An inner ciphertext blob is `metadata || ":::" || ciphertext || tag`,
//! where `metadata` is a JSON record naming the key id and carrying the
//! base64-encoded nonce(s) and tag(s). Standard and quantum-resistant tiers
//! use a single AEAD layer; the maximum tier applies two sequential layers
//! under independent key segments.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};

use crate::aead;
use crate::error::{Error, Result};
use crate::keys::{KeyManager, ManagedKey};
use crate::policy::SecurityLevel;

/// Separator between the metadata record and the raw ciphertext bytes.
///
/// The metadata is parsed up to the first occurrence; base64 fields cannot
/// contain a colon, so a well-formed record never collides with the marker.
pub const DELIMITER: &[u8] = b":::";

/// Metadata prefix of an inner ciphertext blob.
///
/// The two-layer form carries its security level on the wire; the one-layer
/// form omits it, and decryption branches on which shape parses.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum InnerMetadata {
    Layered {
        key_id: String,
        nonce1: String,
        nonce2: String,
        tag1: String,
        tag2: String,
        security_level: SecurityLevel,
    },
    Single {
        key_id: String,
        nonce: String,
        tag: String,
    },
}

/// Produces and parses layered authenticated-encryption envelopes.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvelopeCipher;

impl EnvelopeCipher {
    pub fn new() -> Self {
        Self
    }

    /// Encrypts `payload` under `key` at the given tier.
    pub fn encrypt(
        &self,
        key: &ManagedKey,
        level: SecurityLevel,
        payload: &[u8],
    ) -> Result<Vec<u8>> {
        if level.is_layered() {
            self.encrypt_layered(key, level, payload)
        } else {
            self.encrypt_single(key, payload)
        }
    }

    fn encrypt_single(&self, key: &ManagedKey, payload: &[u8]) -> Result<Vec<u8>> {
        let segment = key.primary_segment()?;
        let nonce = aead::random_nonce();
        let sealed = aead::seal(segment, &nonce, payload)?;
        let tag = &sealed[sealed.len() - aead::TAG_SIZE..];

        let metadata = InnerMetadata::Single {
            key_id: key.key_id.clone(),
            nonce: BASE64.encode(nonce),
            tag: BASE64.encode(tag),
        };

        assemble(&metadata, &sealed)
    }

    fn encrypt_layered(
        &self,
        key: &ManagedKey,
        level: SecurityLevel,
        payload: &[u8],
    ) -> Result<Vec<u8>> {
        let primary = key.primary_segment()?;
        let secondary = key.secondary_segment()?;

        // Layer 1: payload under the primary segment.
        let nonce1 = aead::random_nonce();
        let layer1 = aead::seal(primary, &nonce1, payload)?;
        let tag1 = layer1[layer1.len() - aead::TAG_SIZE..].to_vec();

        // Layer 2: the full layer-1 output (ciphertext and tag) under the
        // secondary segment. The recorded nonce and tag are exactly the
        // values this call used; substituting fresh randomness here would
        // make the blob permanently undecryptable.
        let nonce2 = aead::random_nonce();
        let layer2 = aead::seal(secondary, &nonce2, &layer1)?;
        let tag2 = &layer2[layer2.len() - aead::TAG_SIZE..];

        let metadata = InnerMetadata::Layered {
            key_id: key.key_id.clone(),
            nonce1: BASE64.encode(nonce1),
            nonce2: BASE64.encode(nonce2),
            tag1: BASE64.encode(tag1),
            tag2: BASE64.encode(tag2),
            security_level: level,
        };

        assemble(&metadata, &layer2)
    }

    /// Decrypts an inner ciphertext blob, resolving its key through `keys`.
    ///
    /// Structural problems in the blob (missing delimiter, unparseable
    /// metadata, bad field encodings) and authentication failures at either
    /// layer all surface as [`Error::DecryptionFailed`]; an unknown key id
    /// surfaces as [`Error::KeyNotFound`].
    pub fn decrypt(&self, blob: &[u8], keys: &KeyManager) -> Result<Vec<u8>> {
        let split = blob
            .windows(DELIMITER.len())
            .position(|window| window == DELIMITER)
            .ok_or(Error::DecryptionFailed)?;
        let (metadata_bytes, rest) = blob.split_at(split);
        let body = &rest[DELIMITER.len()..];

        let metadata: InnerMetadata =
            serde_json::from_slice(metadata_bytes).map_err(|_| Error::DecryptionFailed)?;

        match metadata {
            InnerMetadata::Single { key_id, nonce, tag } => {
                let key = keys.get(&key_id)?;
                let segment = key.primary_segment().map_err(|_| Error::DecryptionFailed)?;
                open_layer(segment, &nonce, &tag, body)
            }
            InnerMetadata::Layered {
                key_id,
                nonce1,
                nonce2,
                tag1,
                tag2,
                security_level: _,
            } => {
                let key = keys.get(&key_id)?;
                let primary = key.primary_segment().map_err(|_| Error::DecryptionFailed)?;
                let secondary = key
                    .secondary_segment()
                    .map_err(|_| Error::DecryptionFailed)?;

                // Undo layer 2, recovering the full layer-1 output.
                let layer1 = open_layer(secondary, &nonce2, &tag2, body)?;
                // Undo layer 1, recovering the payload.
                open_layer(primary, &nonce1, &tag1, &layer1)
            }
        }
    }
}

/// Serializes `metadata` and joins it to the sealed bytes with the delimiter.
fn assemble(metadata: &InnerMetadata, sealed: &[u8]) -> Result<Vec<u8>> {
    let metadata_bytes = serde_json::to_vec(metadata).map_err(Error::SerializeError)?;

    let mut blob = Vec::with_capacity(metadata_bytes.len() + DELIMITER.len() + sealed.len());
    blob.extend_from_slice(&metadata_bytes);
    blob.extend_from_slice(DELIMITER);
    blob.extend_from_slice(sealed);
    Ok(blob)
}

/// Undoes one AEAD layer using the nonce and tag recorded in metadata.
///
/// The body carries `ciphertext || tag`; the trailing tag is replaced by the
/// recorded one so a mismatch between the two fails authentication instead of
/// being silently accepted.
fn open_layer(segment: &[u8], nonce_b64: &str, tag_b64: &str, body: &[u8]) -> Result<Vec<u8>> {
    let nonce = BASE64.decode(nonce_b64).map_err(|_| Error::DecryptionFailed)?;
    let tag = BASE64.decode(tag_b64).map_err(|_| Error::DecryptionFailed)?;
    if nonce.len() != aead::NONCE_SIZE || tag.len() != aead::TAG_SIZE {
        return Err(Error::DecryptionFailed);
    }
    if body.len() < aead::TAG_SIZE {
        return Err(Error::DecryptionFailed);
    }

    let ciphertext = &body[..body.len() - aead::TAG_SIZE];
    let mut rebuilt = Vec::with_capacity(ciphertext.len() + aead::TAG_SIZE);
    rebuilt.extend_from_slice(ciphertext);
    rebuilt.extend_from_slice(&tag);

    aead::open(segment, &nonce, &rebuilt)
}
