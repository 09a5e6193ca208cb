//! Transaction processing for the hayashi ledger-apply engine.
//!
//! Given a sealed, hash-ordered transaction slice and its apply order,
//! this crate produces the next ledger state deterministically: every
//! byte of every result must come out identical on any conforming
//! validator.
//!
//! # Pipeline
//!
//! 1. **Validation** ([`validation`]): structural, temporal, signature,
//!    sequence, and balance checks against a read-only view.
//! 2. **Fee processing** ([`process_fee_seq_num`]): every transaction
//!    pays and consumes its sequence number, in hash order, before any
//!    transaction body runs.
//! 3. **Apply** ([`apply_transaction_set`]): bodies run in apply order;
//!    each transaction gets a nested view, each operation a sub-view;
//!    failures roll back without disturbing neighbors.
//! 4. **Refunds**: unused refundable contract fees flow back to fee
//!    sources before the single root-view commit.
//!
//! Fee-bump envelopes compose around classic transactions
//! ([`fee_bump`]); contract invocations run through the [`host`] boundary
//! with resource metering and lifetime accounting.

pub mod account;
mod apply;
mod error;
mod fee;
mod fee_bump;
mod frame;
pub mod host;
pub mod operations;
mod result;
pub mod signature_checker;
pub mod test_utils;
pub mod validation;

pub use apply::{
    apply_transaction, apply_transaction_set, AppliedTransaction, ApplyContext, LedgerCloseResult,
};
pub use error::{Result, TxError};
pub use fee::{process_fee_seq_num, FeeOutcome};
pub use frame::{account_id_to_key, envelope_xdr, muxed_to_account_id, TransactionFrame};
pub use host::{ContractHost, HostInvocation, HostOutput, InvokerPhase, LedgerInfo, TxEffects};
pub use result::{MutableTxResult, RefundableFeeTracker};
pub use validation::{check_valid, min_inclusion_fee, LedgerContext, ValidationOutcome};
