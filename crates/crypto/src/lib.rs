//! Cryptographic primitives for the hayashi workspace.
//!
//! Wraps the `sha2` and `ed25519-dalek` crates behind the small, hash-first
//! API the apply pipeline needs: SHA-256 over raw bytes or XDR, Ed25519
//! verification against 32-byte transaction hashes, and signer-key helpers
//! for one-time pre-authorized transactions.

mod error;
mod hash;
mod keys;
mod signer_key;

pub use error::CryptoError;
pub use hash::{sha256, sha256_multi, sub_sha256, Sha256Hasher};
pub use keys::{verify_hash, PublicKey, SecretKey, Signature};
pub use signer_key::{pre_auth_tx_key, signature_hint};
