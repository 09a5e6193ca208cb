//! Mutable transaction result records.
//!
//! Every transaction in a set gets one [`MutableTxResult`]; it is the only
//! thing the apply pipeline mutates on behalf of a transaction besides the
//! ledger view. The record converts to the wire `TransactionResult` once the
//! transaction settles.

use stellar_xdr::curr::{
    OperationResult, TransactionResult, TransactionResultCode, TransactionResultExt,
    TransactionResultResult,
};

use crate::TxError;

/// Tracker for the pre-charged refundable portion of a contract
/// transaction's fee.
///
/// Rent and event fees are consumed out of this reserve during host
/// invocation; whatever is left flows back to the fee source after apply.
#[derive(Debug, Clone)]
pub struct RefundableFeeTracker {
    max_refundable: i64,
    consumed_rent_fee: i64,
    consumed_event_fee: i64,
}

impl RefundableFeeTracker {
    /// Creates a tracker over a pre-charged reserve.
    pub fn new(max_refundable: i64) -> Self {
        Self {
            max_refundable,
            consumed_rent_fee: 0,
            consumed_event_fee: 0,
        }
    }

    /// Attempts to consume rent and event fees from the reserve.
    ///
    /// Returns false (leaving the tracker unchanged) when the reserve does
    /// not cover the new total.
    pub fn consume(&mut self, rent_fee: i64, event_fee: i64) -> bool {
        let new_rent = self.consumed_rent_fee.saturating_add(rent_fee);
        let new_event = self.consumed_event_fee.saturating_add(event_fee);
        if new_rent.saturating_add(new_event) > self.max_refundable {
            return false;
        }
        self.consumed_rent_fee = new_rent;
        self.consumed_event_fee = new_event;
        true
    }

    /// Total consumed so far.
    pub fn consumed(&self) -> i64 {
        self.consumed_rent_fee + self.consumed_event_fee
    }

    /// The unconsumed reserve, owed back to the fee source.
    pub fn refund(&self) -> i64 {
        self.max_refundable - self.consumed()
    }

    /// The full pre-charged reserve.
    pub fn max_refundable(&self) -> i64 {
        self.max_refundable
    }

    /// Forfeit the entire reserve; used when the invocation fails after
    /// fees were charged.
    pub fn forfeit(&mut self) {
        self.consumed_rent_fee = self.max_refundable;
        self.consumed_event_fee = 0;
    }
}

/// A transaction result under construction.
#[derive(Debug, Clone)]
pub struct MutableTxResult {
    fee_charged: i64,
    result: TransactionResultResult,
    refundable: Option<RefundableFeeTracker>,
}

impl MutableTxResult {
    /// Creates a result that assumes success with no operations yet.
    pub fn new(fee_charged: i64) -> Self {
        Self {
            fee_charged,
            result: TransactionResultResult::TxSuccess(Default::default()),
            refundable: None,
        }
    }

    /// Sets a payload-less error code.
    ///
    /// Success, failure-with-operations, and fee-bump wrapping codes carry
    /// payloads and are set through their dedicated methods; routing them
    /// here is a programming error.
    pub fn set_error(&mut self, code: TransactionResultCode) {
        self.result = match code {
            TransactionResultCode::TxTooEarly => TransactionResultResult::TxTooEarly,
            TransactionResultCode::TxTooLate => TransactionResultResult::TxTooLate,
            TransactionResultCode::TxMissingOperation => {
                TransactionResultResult::TxMissingOperation
            }
            TransactionResultCode::TxBadSeq => TransactionResultResult::TxBadSeq,
            TransactionResultCode::TxBadAuth => TransactionResultResult::TxBadAuth,
            TransactionResultCode::TxInsufficientBalance => {
                TransactionResultResult::TxInsufficientBalance
            }
            TransactionResultCode::TxNoAccount => TransactionResultResult::TxNoAccount,
            TransactionResultCode::TxInsufficientFee => {
                TransactionResultResult::TxInsufficientFee
            }
            TransactionResultCode::TxBadAuthExtra => TransactionResultResult::TxBadAuthExtra,
            TransactionResultCode::TxInternalError => TransactionResultResult::TxInternalError,
            TransactionResultCode::TxNotSupported => TransactionResultResult::TxNotSupported,
            TransactionResultCode::TxBadSponsorship => {
                TransactionResultResult::TxBadSponsorship
            }
            TransactionResultCode::TxBadMinSeqAgeOrGap => {
                TransactionResultResult::TxBadMinSeqAgeOrGap
            }
            TransactionResultCode::TxMalformed => TransactionResultResult::TxMalformed,
            TransactionResultCode::TxSorobanInvalid => {
                TransactionResultResult::TxSorobanInvalid
            }
            other => panic!("result code {:?} requires a payload", other),
        };
    }

    /// Records the operation results of a fully applied transaction.
    pub fn set_success(&mut self, op_results: Vec<OperationResult>) -> Result<(), TxError> {
        self.result = TransactionResultResult::TxSuccess(
            op_results
                .try_into()
                .map_err(|_| TxError::Internal("operation result vector too long".into()))?,
        );
        Ok(())
    }

    /// Records the operation results of a failed transaction.
    pub fn set_failed(&mut self, op_results: Vec<OperationResult>) -> Result<(), TxError> {
        self.result = TransactionResultResult::TxFailed(
            op_results
                .try_into()
                .map_err(|_| TxError::Internal("operation result vector too long".into()))?,
        );
        Ok(())
    }

    /// Replaces the result union wholesale; the fee-bump wrapper uses this
    /// to install inner result pairs.
    pub fn set_result(&mut self, result: TransactionResultResult) {
        self.result = result;
    }

    /// The current result code.
    pub fn result_code(&self) -> TransactionResultCode {
        self.result.discriminant()
    }

    /// Whether the transaction (or wrapped inner transaction) succeeded.
    pub fn is_success(&self) -> bool {
        matches!(
            self.result,
            TransactionResultResult::TxSuccess(_)
                | TransactionResultResult::TxFeeBumpInnerSuccess(_)
        )
    }

    /// The fee charged so far.
    pub fn fee_charged(&self) -> i64 {
        self.fee_charged
    }

    /// Overwrites the charged fee; refund processing lowers it.
    pub fn set_fee_charged(&mut self, fee_charged: i64) {
        self.fee_charged = fee_charged;
    }

    /// Arms the refundable-fee tracker for a contract transaction.
    pub fn initialize_refundable_fee(&mut self, max_refundable: i64) {
        self.refundable = Some(RefundableFeeTracker::new(max_refundable));
    }

    /// The refundable-fee tracker, if armed.
    pub fn refundable_fee(&self) -> Option<&RefundableFeeTracker> {
        self.refundable.as_ref()
    }

    /// Mutable access to the refundable-fee tracker.
    pub fn refundable_fee_mut(&mut self) -> Option<&mut RefundableFeeTracker> {
        self.refundable.as_mut()
    }

    /// Takes over another result's tracker state.
    ///
    /// Fee-bump application meters consumption on the inner result and
    /// then moves it back to the outer record, whose fee source receives
    /// the refund.
    pub fn adopt_refundable_tracker(&mut self, other: &MutableTxResult) {
        self.refundable = other.refundable.clone();
    }

    /// A read-only view of the result union.
    pub fn result(&self) -> &TransactionResultResult {
        &self.result
    }

    /// Converts to the wire result.
    pub fn into_xdr(self) -> TransactionResult {
        TransactionResult {
            fee_charged: self.fee_charged,
            result: self.result,
            ext: TransactionResultExt::V0,
        }
    }
}
