//! Error types for transaction processing.
//!
//! Per-transaction and per-operation failures are never `Err` values; they
//! are data, carried in result records. [`TxError`] covers infrastructure
//! failures only; a caller that sees one during a ledger close must abort
//! the close rather than continue with possibly diverged state.

use thiserror::Error;

/// Infrastructure errors during transaction processing.
#[derive(Debug, Error)]
pub enum TxError {
    /// A fee source or source account vanished between validation and
    /// processing.
    #[error("unexpected ledger state: {0}")]
    UnexpectedState(String),

    /// Ledger store misuse.
    #[error("ledger error: {0}")]
    Ledger(#[from] hayashi_ledger::LedgerError),

    /// Crypto failure outside signature verification (which is a result
    /// code, not an error).
    #[error("crypto error: {0}")]
    Crypto(#[from] hayashi_crypto::CryptoError),

    /// XDR encoding or decoding failed.
    #[error("XDR error: {0}")]
    Xdr(#[from] stellar_xdr::curr::Error),

    /// Invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias using [`TxError`].
pub type Result<T> = std::result::Result<T, TxError>;
