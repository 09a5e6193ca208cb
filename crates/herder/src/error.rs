//! Herder error types.

use thiserror::Error;

/// Errors from transaction-set handling.
#[derive(Debug, Error)]
pub enum HerderError {
    /// Transaction-level infrastructure failure.
    #[error("transaction error: {0}")]
    Tx(#[from] hayashi_tx::TxError),

    /// Ledger store misuse.
    #[error("ledger error: {0}")]
    Ledger(#[from] hayashi_ledger::LedgerError),

    /// XDR encoding or decoding failed.
    #[error("XDR error: {0}")]
    Xdr(#[from] stellar_xdr::curr::Error),

    /// Invariant violation in set handling.
    #[error("internal herder error: {0}")]
    Internal(String),
}

/// Result type alias using [`HerderError`].
pub type Result<T> = std::result::Result<T, HerderError>;
