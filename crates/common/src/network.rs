//! Network identity types.

use crate::types::Hash256;

/// Network identifier derived from the network passphrase.
///
/// The identifier is mixed into every signed transaction payload as a
/// domain-separation tag, so a signature produced for one network can never
/// validate on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkId(pub Hash256);

impl NetworkId {
    /// Create a network ID from a passphrase.
    pub fn from_passphrase(passphrase: &str) -> Self {
        Self(Hash256::hash(passphrase.as_bytes()))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Public test network.
    pub fn testnet() -> Self {
        Self::from_passphrase("Test SDF Network ; September 2015")
    }

    /// Public production network.
    pub fn mainnet() -> Self {
        Self::from_passphrase("Public Global Stellar Network ; September 2015")
    }
}

impl From<NetworkId> for stellar_xdr::curr::Hash {
    fn from(id: NetworkId) -> Self {
        stellar_xdr::curr::Hash(id.0 .0)
    }
}
