//! SHA-256 hashing utilities.

use hayashi_common::Hash256;
use sha2::{Digest, Sha256};

/// Computes the SHA-256 hash of the given data.
pub fn sha256(data: &[u8]) -> Hash256 {
    Hash256::hash(data)
}

/// Computes the SHA-256 hash of multiple data chunks.
///
/// Equivalent to concatenating all chunks and hashing the result, without
/// the intermediate buffer.
pub fn sha256_multi(chunks: &[&[u8]]) -> Hash256 {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update(chunk);
    }
    let result = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&result);
    Hash256(bytes)
}

/// Derives a sub-seed from a base seed and an index.
///
/// Used to give each transaction in a set its own PRNG seed: the base seed
/// is fixed per ledger and the index is the transaction's position.
pub fn sub_sha256(seed: &[u8; 32], index: u32) -> Hash256 {
    sha256_multi(&[seed, &index.to_be_bytes()])
}

/// A streaming SHA-256 hasher for incremental hash computation.
pub struct Sha256Hasher {
    inner: Sha256,
}

impl Sha256Hasher {
    /// Creates a new SHA-256 hasher.
    pub fn new() -> Self {
        Self {
            inner: Sha256::new(),
        }
    }

    /// Feeds data into the hasher.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Consumes the hasher and returns the computed hash.
    pub fn finalize(self) -> Hash256 {
        let result = self.inner.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&result);
        Hash256(bytes)
    }
}

impl Default for Sha256Hasher {
    fn default() -> Self {
        Self::new()
    }
}
