//! Common error types.

use thiserror::Error;

/// Errors produced by the common utility crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration value is invalid or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The node's protocol ceiling is incompatible with a collaborator.
    #[error("protocol mismatch: node supports {ours}, collaborator compiled for {theirs}")]
    ProtocolMismatch { ours: u32, theirs: u32 },

    /// An arithmetic operation overflowed or was otherwise invalid.
    #[error("math error: {0}")]
    Math(#[from] crate::math::MathError),

    /// XDR encoding or decoding failed.
    #[error("XDR error: {0}")]
    Xdr(#[from] stellar_xdr::curr::Error),
}

/// Result type alias using the common [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
