//! # Shield-Kit: Key Lifecycle and Layered Signed Envelopes
//!
//! `shield-kit` manages cryptographic key lifecycle and produces a
//! self-describing, signed, authenticated-encryption envelope around
//! arbitrary byte payloads, with a selectable security tier controlling how
//! many encryption layers are applied.
//!
//! ## Core Concepts
//!
//! - **[`SecurityOrchestrator`]**: the composition root. `protect` encrypts
//!   a payload and signs the ciphertext; `unprotect` verifies the signature
//!   first and only then decrypts.
//! - **[`KeyManager`](keys::KeyManager)**: creates, retrieves, rotates and
//!   expires key material over a pluggable [`KeyStore`](store::KeyStore).
//! - **[`EnvelopeCipher`](envelope::EnvelopeCipher)**: the one-layer and
//!   two-layer AEAD wire format.
//! - **[`SignatureService`](signature::SignatureService)**: RSA-PSS
//!   signatures over SHA3-256 with a total, never-failing `verify`.
//!
//! The tier names (`standard` / `quantum_resistant` / `maximum`) are policy
//! labels: the quantum-resistant posture rests on large RSA moduli and the
//! SHA-3 family, not on a post-quantum algorithm.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use shield_kit::prelude::*;
//!
//! fn main() -> shield_kit::Result<()> {
//!     let store = Arc::new(FileKeyStore::new("/var/lib/shield")?);
//!     let orchestrator =
//!         SecurityOrchestrator::open(store, SecurityPolicy::default(), SecurityLevel::Maximum)?;
//!
//!     let envelope = orchestrator.protect(b"hello-world", "demo")?;
//!     let payload = orchestrator.unprotect(&envelope)?;
//!     assert_eq!(payload, b"hello-world");
//!     Ok(())
//! }
//! ```

mod aead;

pub mod envelope;
pub mod error;
pub mod hash;
pub mod keys;
pub mod lockout;
pub mod master;
pub mod orchestrator;
pub mod policy;
pub mod signature;
pub mod store;

pub use error::{Error, Result};
pub use orchestrator::{Envelope, SecureChannel, SecurityOrchestrator, SecurityStatus};
pub use policy::{KeyType, SecurityLevel, SecurityPolicy};

/// A collection of the most commonly used types.
pub mod prelude {
    pub use crate::envelope::EnvelopeCipher;
    pub use crate::error::{Error, Result};
    pub use crate::keys::KeyManager;
    pub use crate::lockout::AccessDecision;
    pub use crate::master::MasterKeyProtection;
    pub use crate::orchestrator::{
        Envelope, SecureChannel, SecurityOrchestrator, SecurityStatus,
    };
    pub use crate::policy::{KeyType, SecurityLevel, SecurityPolicy};
    pub use crate::signature::SignatureService;
    pub use crate::store::{FileKeyStore, KeyStore, MemoryKeyStore};
}

/// The version of the `shield-kit` crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
