//! Security levels, key types and the process-wide security policy.
//!
//! Levels and key types are closed enums so dispatch is exhaustive at
//! compile time; the serialized form uses snake_case tags.

use serde::{Deserialize, Serialize};

/// Security tier selecting how many encryption layers and which key sizes
/// apply.
///
/// The tier names are policy labels. `QuantumResistant` and `Maximum` rest on
/// large RSA moduli and the SHA-3 family, not on a lattice or hash-based
/// post-quantum scheme; callers must not read them as a cryptographic
/// guarantee of post-quantum security.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityLevel {
    /// Single AEAD layer, AES-256-GCM.
    Standard,
    /// Single AEAD layer with the quantum-resistant hash bound to signatures.
    QuantumResistant,
    /// Two sequential AEAD layers under independent key segments.
    Maximum,
}

impl SecurityLevel {
    /// The wire tag carried in envelopes and status reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::QuantumResistant => "quantum_resistant",
            Self::Maximum => "maximum",
        }
    }

    /// Whether this tier applies a second AEAD layer.
    pub fn is_layered(&self) -> bool {
        matches!(self, Self::Maximum)
    }
}

impl std::fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The shape of key material a [`crate::keys::ManagedKey`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    /// 32 random bytes for a single AES-256-GCM key.
    Symmetric,
    /// A freshly generated RSA keypair, PEM-encoded (PKCS#8).
    Asymmetric,
    /// 64 random bytes, sized for the wide-hash construction.
    QuantumResistant,
    /// 96 random bytes: primary AEAD segment, secondary AEAD segment for the
    /// layered mode, and a reserved segment.
    Hybrid,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Symmetric => "symmetric",
            Self::Asymmetric => "asymmetric",
            Self::QuantumResistant => "quantum_resistant",
            Self::Hybrid => "hybrid",
        }
    }
}

/// Process-wide security configuration.
///
/// Immutable after construction; orchestration reads it, nothing mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityPolicy {
    /// Minimum symmetric key size in bits.
    pub min_key_size_bits: u32,
    /// Whether quantum-resistant tiers are required for new deployments.
    pub require_quantum_resistant: bool,
    /// Key rotation interval in days; also the key expiry horizon.
    pub key_rotation_days: u32,
    /// Failed attempts per identity before a lockout is imposed.
    pub max_failed_attempts: u32,
    /// Lockout duration in seconds.
    pub lockout_duration_seconds: u64,
    /// Whether multi-factor authentication is required. Tracked for policy
    /// reporting only; no MFA flow exists in this crate.
    pub require_multi_factor: bool,
    /// RSA modulus size in bits for asymmetric and signature keys.
    pub asymmetric_key_bits: usize,
    /// Named symmetric algorithm. Informational; the AEAD is AES-256-GCM.
    pub encryption_algorithm: String,
    /// Named post-quantum signature scheme. Informational only: the scheme is
    /// never instantiated, signatures are RSA-PSS over SHA3-256.
    pub quantum_algorithm: String,
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            min_key_size_bits: 256,
            require_quantum_resistant: true,
            key_rotation_days: 90,
            max_failed_attempts: 5,
            lockout_duration_seconds: 3600,
            require_multi_factor: false,
            asymmetric_key_bits: 4096,
            encryption_algorithm: "AES-256-GCM".to_string(),
            quantum_algorithm: "SPHINCS+".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_wire_tags_are_snake_case() {
        assert_eq!(
            serde_json::to_string(&SecurityLevel::QuantumResistant).unwrap(),
            "\"quantum_resistant\""
        );
        assert_eq!(SecurityLevel::Maximum.as_str(), "maximum");

        let parsed: SecurityLevel = serde_json::from_str("\"standard\"").unwrap();
        assert_eq!(parsed, SecurityLevel::Standard);
    }

    #[test]
    fn only_maximum_is_layered() {
        assert!(SecurityLevel::Maximum.is_layered());
        assert!(!SecurityLevel::Standard.is_layered());
        assert!(!SecurityLevel::QuantumResistant.is_layered());
    }

    #[test]
    fn policy_defaults_match_deployment_baseline() {
        let policy = SecurityPolicy::default();

        assert_eq!(policy.min_key_size_bits, 256);
        assert_eq!(policy.key_rotation_days, 90);
        assert_eq!(policy.max_failed_attempts, 5);
        assert_eq!(policy.lockout_duration_seconds, 3600);
        assert_eq!(policy.asymmetric_key_bits, 4096);
        assert!(!policy.require_multi_factor);
    }
}
