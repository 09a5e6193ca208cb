//! Protocol version constants and feature gating.

/// The maximum ledger protocol version this build understands.
pub const CURRENT_LEDGER_PROTOCOL_VERSION: u32 = 23;

/// First protocol version that accepts fee-bump envelopes.
pub const FIRST_FEE_BUMP_PROTOCOL_VERSION: u32 = 13;

/// First protocol version that accepts contract transactions.
pub const FIRST_CONTRACT_PROTOCOL_VERSION: u32 = 20;

/// First protocol version that tracks per-account sequence time and ledger
/// for the min-seq-age / min-seq-ledger-gap preconditions.
pub const FIRST_SEQ_INFO_PROTOCOL_VERSION: u32 = 19;

/// Hard cap on the number of operations in a single transaction.
pub const MAX_OPS_PER_TX: u32 = 100;

/// Network-wide floor on the per-operation inclusion fee.
pub const MIN_INCLUSION_FEE_PER_OP: i64 = 100;

/// Check if a protocol version is strictly before a target.
#[inline]
pub fn protocol_version_is_before(version: u32, before: u32) -> bool {
    version < before
}

/// Check if a protocol version is at or after a target.
#[inline]
pub fn protocol_version_starts_from(version: u32, from: u32) -> bool {
    version >= from
}

/// Check if contract transactions are supported at a protocol version.
#[inline]
pub fn contracts_supported(version: u32) -> bool {
    protocol_version_starts_from(version, FIRST_CONTRACT_PROTOCOL_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gates() {
        assert!(protocol_version_is_before(12, FIRST_FEE_BUMP_PROTOCOL_VERSION));
        assert!(protocol_version_starts_from(13, FIRST_FEE_BUMP_PROTOCOL_VERSION));
        assert!(!contracts_supported(19));
        assert!(contracts_supported(20));
    }
}
