//! Transaction-set handling for the hayashi ledger-apply engine.
//!
//! A [`TxSetFrame`] canonicalizes a set of transactions for a given
//! previous-ledger hash: hash ordering and set identity, the deterministic
//! (but submitter-opaque) apply order, structural validation and trimming,
//! and surge pricing when demand exceeds ledger capacity.

mod error;
mod surge;
mod tx_set;

pub use error::{HerderError, Result};
pub use surge::surge_pricing_filter;
pub use tx_set::TxSetFrame;
