//! Signer key helpers.

use hayashi_common::Hash256;
use stellar_xdr::curr::{SignerKey, Uint256};

/// Builds the one-time pre-authorized-transaction signer key for a
/// transaction contents hash.
///
/// An account that adds this signer pre-authorizes exactly one future
/// transaction; the signer is removed when that transaction applies.
pub fn pre_auth_tx_key(contents_hash: &Hash256) -> SignerKey {
    SignerKey::PreAuthTx(Uint256(contents_hash.0))
}

/// The 4-byte hint carried next to a signature: the trailing bytes of the
/// signing key, used to skip non-matching signers cheaply.
pub fn signature_hint(key_bytes: &[u8; 32]) -> [u8; 4] {
    [key_bytes[28], key_bytes[29], key_bytes[30], key_bytes[31]]
}
