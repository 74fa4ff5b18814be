//! RSA-PSS signatures bound to the quantum-resistant hash.
//!
//! Keypairs are issued per key id; the private half stays in memory, the
//! public half is exported as SPKI PEM. Signing uses the PSS probabilistic
//! padding over SHA3-256. `verify` is total: any malformed input yields
//! `false`, never an error.

use dashmap::DashMap;
use rsa::pkcs8::{DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::pss::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha3::Sha3_256;
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// A freshly issued signing keypair, both halves PEM-encoded.
pub struct SignatureKeyPair {
    /// PKCS#8 private key. Zeroized on drop; hand it out with care.
    pub private_key_pem: Zeroizing<String>,
    /// SPKI public key.
    pub public_key_pem: String,
}

/// Issues signing keypairs, signs, and verifies.
pub struct SignatureService {
    key_bits: usize,
    private_keys: DashMap<String, RsaPrivateKey>,
    public_keys: DashMap<String, String>,
}

impl SignatureService {
    /// Creates a service issuing keypairs with `key_bits` moduli.
    pub fn new(key_bits: usize) -> Self {
        Self {
            key_bits,
            private_keys: DashMap::new(),
            public_keys: DashMap::new(),
        }
    }

    /// Generates a keypair under `key_id`, retaining the private half in
    /// memory and returning both halves PEM-encoded.
    pub fn generate_keypair(&self, key_id: &str) -> Result<SignatureKeyPair> {
        let mut rng = rand::rngs::OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, self.key_bits)
            .map_err(|e| Error::Crypto(format!("RSA keypair generation failed: {e}")))?;
        let public_key = RsaPublicKey::from(&private_key);

        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| Error::Crypto(format!("private key encoding failed: {e}")))?;
        let public_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| Error::Crypto(format!("public key encoding failed: {e}")))?;

        self.private_keys.insert(key_id.to_string(), private_key);
        self.public_keys
            .insert(key_id.to_string(), public_pem.clone());

        Ok(SignatureKeyPair {
            private_key_pem: Zeroizing::new(private_pem.to_string()),
            public_key_pem: public_pem,
        })
    }

    /// Signs `data` with the private key stored under `key_id`.
    ///
    /// PSS signing is randomized: signing the same data twice produces
    /// different signatures, both of which verify.
    pub fn sign(&self, data: &[u8], key_id: &str) -> Result<Vec<u8>> {
        let private_key = self
            .private_keys
            .get(key_id)
            .ok_or_else(|| Error::KeyNotFound(key_id.to_string()))?;

        let signing_key = SigningKey::<Sha3_256>::new(private_key.value().clone());
        let mut rng = rand::rngs::OsRng;
        let signature = signing_key.sign_with_rng(&mut rng, data);
        Ok(signature.to_vec())
    }

    /// Verifies `signature` over `data` against an SPKI PEM public key.
    ///
    /// Never fails with an error: a malformed key, a malformed signature, or
    /// tampered data all return `false`, and callers must treat any non-true
    /// result as rejection.
    pub fn verify(&self, data: &[u8], signature: &[u8], public_key_pem: &str) -> bool {
        let Ok(public_key) = RsaPublicKey::from_public_key_pem(public_key_pem) else {
            return false;
        };
        let verifying_key = VerifyingKey::<Sha3_256>::new(public_key);

        // A signature slice of the wrong length is simply invalid.
        let Ok(signature) = Signature::try_from(signature) else {
            return false;
        };

        verifying_key.verify(data, &signature).is_ok()
    }

    /// The exported public key for `key_id`, if a keypair was issued.
    pub fn public_key(&self, key_id: &str) -> Option<String> {
        self.public_keys.get(key_id).map(|entry| entry.value().clone())
    }

    /// Number of keypairs held in memory.
    pub fn len(&self) -> usize {
        self.private_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.private_keys.is_empty()
    }
}
