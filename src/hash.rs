//! Quantum-resistant hash helpers.
//!
//! The wide-hash concern is served by the SHA-3 family. Passphrase-to-key
//! derivation for the master-key container uses Argon2id and lives behind the
//! `secure-storage` feature.

use sha3::{Digest, Sha3_256, Sha3_512};

/// Digest helpers bound to the SHA-3 family.
pub struct QuantumHash;

impl QuantumHash {
    /// SHA3-256 digest of `data`.
    pub fn sha3_256(data: &[u8]) -> [u8; 32] {
        let mut hasher = Sha3_256::new();
        hasher.update(data);
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&hasher.finalize());
        digest
    }

    /// SHA3-512 digest of `data`, for contexts that want the full-width hash.
    pub fn sha3_512(data: &[u8]) -> [u8; 64] {
        let mut hasher = Sha3_512::new();
        hasher.update(data);
        let mut digest = [0u8; 64];
        digest.copy_from_slice(&hasher.finalize());
        digest
    }
}

/// Derives a fixed-length key from a passphrase with Argon2id.
///
/// `out` determines the derived length; the caller owns salt generation and
/// persistence.
#[cfg(feature = "secure-storage")]
pub fn derive_passphrase_key(
    passphrase: &[u8],
    salt: &[u8],
    memory_cost: u32,
    time_cost: u32,
    parallelism: u32,
    out: &mut [u8],
) -> crate::error::Result<()> {
    use argon2::{Algorithm, Argon2, Params, Version};

    let params = Params::new(memory_cost, time_cost, parallelism, Some(out.len()))
        .map_err(|e| crate::error::Error::Crypto(format!("invalid Argon2 parameters: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    argon2
        .hash_password_into(passphrase, salt, out)
        .map_err(|e| crate::error::Error::Crypto(format!("Argon2 derivation failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha3_256_known_answer() {
        // SHA3-256("") from the FIPS 202 test vectors.
        let digest = QuantumHash::sha3_256(b"");
        assert_eq!(
            digest[..4],
            [0xa7, 0xff, 0xc6, 0xf8],
            "unexpected SHA3-256 empty-string prefix"
        );
        assert_eq!(digest.len(), 32);
    }

    #[test]
    fn sha3_512_width() {
        let digest = QuantumHash::sha3_512(b"shield-kit");
        assert_eq!(digest.len(), 64);
        assert_ne!(digest[..32], QuantumHash::sha3_256(b"shield-kit"));
    }

    #[cfg(feature = "secure-storage")]
    #[test]
    fn derivation_is_deterministic_per_salt() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        let mut c = [0u8; 32];

        derive_passphrase_key(b"passphrase", b"salt-one-16bytes", 8, 1, 1, &mut a).unwrap();
        derive_passphrase_key(b"passphrase", b"salt-one-16bytes", 8, 1, 1, &mut b).unwrap();
        derive_passphrase_key(b"passphrase", b"salt-two-16bytes", 8, 1, 1, &mut c).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
