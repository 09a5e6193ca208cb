//! Ledger error types.

use thiserror::Error;

/// Errors from ledger state operations.
///
/// These indicate misuse of the store or view API, not transaction-level
/// failures; a caller that hits one during a ledger close must abort the
/// close rather than continue with possibly diverged state.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Attempted to create an entry that already exists.
    #[error("entry already exists: {0}")]
    EntryExists(String),

    /// Attempted to update or erase an entry that does not exist.
    #[error("entry not found: {0}")]
    EntryMissing(String),

    /// An entry kind has no corresponding ledger key.
    #[error("cannot derive key for entry: {0}")]
    UnkeyableEntry(String),

    /// XDR encoding or decoding failed.
    #[error("XDR error: {0}")]
    Xdr(#[from] stellar_xdr::curr::Error),

    /// Invariant violation in the store itself.
    #[error("internal ledger error: {0}")]
    Internal(String),
}

/// Result type alias using [`LedgerError`].
pub type Result<T> = std::result::Result<T, LedgerError>;
