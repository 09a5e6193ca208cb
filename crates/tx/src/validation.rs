//! Per-transaction validity checks against a read-only ledger view.
//!
//! The checks run in a fixed order so every validator reports the same
//! first failure: structure, version gates, fee floor, timing, account
//! existence, sequence preconditions, authorization, balance. Per-op and
//! per-transaction failures become result codes; only infrastructure
//! problems surface as errors.

use hayashi_common::math::big_multiply;
use hayashi_common::{NetworkId, FIRST_CONTRACT_PROTOCOL_VERSION,
    FIRST_FEE_BUMP_PROTOCOL_VERSION, MAX_OPS_PER_TX, MIN_INCLUSION_FEE_PER_OP};
use hayashi_ledger::{header, View};
use stellar_xdr::curr::{
    InnerTransactionResult, InnerTransactionResultExt, InnerTransactionResultPair,
    InnerTransactionResultResult, LedgerHeader, Signer, TransactionResultCode,
    TransactionResultResult,
};

use crate::account::{self, ThresholdLevel};
use crate::frame::TransactionFrame;
use crate::operations::operation_threshold;
use crate::result::MutableTxResult;
use crate::signature_checker::{collect_signers_for_account, SignatureChecker};
use crate::Result;

/// Ledger-level context threaded through validation and apply.
#[derive(Debug, Clone)]
pub struct LedgerContext {
    /// Sequence number of the ledger being built.
    pub sequence: u32,
    /// Close time of the ledger being built.
    pub close_time: u64,
    /// Base fee from the previous header (pre-surge).
    pub base_fee: u32,
    /// Base reserve in effect.
    pub base_reserve: u32,
    /// Ledger protocol version in effect.
    pub protocol_version: u32,
    /// Cap on total operations per transaction set.
    pub max_tx_set_size: u32,
    /// Domain-separation tag for signed payloads.
    pub network_id: NetworkId,
}

impl LedgerContext {
    /// Builds a context for the ledger that will follow `header`.
    pub fn for_next_ledger(network_id: NetworkId, header: &LedgerHeader, close_time: u64) -> Self {
        Self {
            sequence: header.ledger_seq + 1,
            close_time,
            base_fee: header.base_fee,
            base_reserve: header.base_reserve,
            protocol_version: header.ledger_version,
            max_tx_set_size: header.max_tx_set_size,
            network_id,
        }
    }
}

/// How far a transaction got through the validity chain.
///
/// Fee processing advances sequence numbers for everything except
/// [`Invalid`](ValidationOutcome::Invalid) transactions, so the distinction
/// between pre-auth and post-auth failures is load-bearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Failed before authorization; the transaction never existed as far
    /// as sequence numbers are concerned.
    Invalid,
    /// Authorized but unable to pay or out of sequence.
    InvalidPostAuth,
    /// Passed every check.
    FullyValid,
}

/// The minimum inclusion fee for a transaction: a per-operation floor of
/// `max(base_fee, 100)`.
pub fn min_inclusion_fee(frame: &TransactionFrame, base_fee: u32) -> i64 {
    let per_op = std::cmp::max(base_fee as i64, MIN_INCLUSION_FEE_PER_OP);
    per_op * std::cmp::max(1, frame.num_operations() as i64)
}

/// Full validity check for one transaction.
///
/// `current_seq` threads the previous accepted sequence number for the same
/// source within a set; zero means "read it from the account".
/// Returns the verdict along with the result record carrying the first
/// failure code.
pub fn check_valid(
    frame: &TransactionFrame,
    view: &View<'_>,
    ctx: &LedgerContext,
    current_seq: i64,
    lower_bound_close_time_offset: u64,
    upper_bound_close_time_offset: u64,
) -> Result<(bool, MutableTxResult)> {
    let mut result = MutableTxResult::new(frame.fee(Some(ctx.base_fee as i64), false));

    if frame.is_fee_bump() {
        let valid = check_valid_fee_bump(
            frame,
            view,
            ctx,
            current_seq,
            lower_bound_close_time_offset,
            upper_bound_close_time_offset,
            &mut result,
        )?;
        return Ok((valid, result));
    }

    let contents_hash = frame.contents_hash()?;
    let mut checker =
        SignatureChecker::new(ctx.protocol_version, contents_hash, frame.signatures());

    let outcome = common_valid(
        frame,
        view,
        ctx,
        false,
        current_seq,
        lower_bound_close_time_offset,
        upper_bound_close_time_offset,
        &mut checker,
        &mut result,
    )?;
    if outcome != ValidationOutcome::FullyValid {
        return Ok((false, result));
    }

    if !check_operation_signatures(frame, view, &mut checker, &mut result)? {
        return Ok((false, result));
    }
    if !check_extra_signers(frame, &mut checker, &mut result) {
        return Ok((false, result));
    }
    if !checker.all_signatures_used() {
        result.set_error(TransactionResultCode::TxBadAuthExtra);
        return Ok((false, result));
    }

    Ok((true, result))
}

/// The shared validity chain for a classic transaction.
///
/// When `applying`, the fee was already collected, so the balance check
/// only guards against liabilities exceeding holdings.
#[allow(clippy::too_many_arguments)]
pub fn common_valid(
    frame: &TransactionFrame,
    view: &View<'_>,
    ctx: &LedgerContext,
    applying: bool,
    current_seq: i64,
    lower_bound_close_time_offset: u64,
    upper_bound_close_time_offset: u64,
    checker: &mut SignatureChecker<'_>,
    result: &mut MutableTxResult,
) -> Result<ValidationOutcome> {
    // Structure.
    if !frame.provides_valid_fee() {
        result.set_error(TransactionResultCode::TxMalformed);
        return Ok(ValidationOutcome::Invalid);
    }
    if frame.operations().is_empty() {
        result.set_error(TransactionResultCode::TxMissingOperation);
        return Ok(ValidationOutcome::Invalid);
    }
    if !frame.is_valid_structure(MAX_OPS_PER_TX) {
        result.set_error(TransactionResultCode::TxMalformed);
        return Ok(ValidationOutcome::Invalid);
    }

    // Version gates.
    if frame.is_contract_tx() && ctx.protocol_version < FIRST_CONTRACT_PROTOCOL_VERSION {
        result.set_error(TransactionResultCode::TxNotSupported);
        return Ok(ValidationOutcome::Invalid);
    }
    if frame.is_contract_tx() && frame.soroban_data().is_none() {
        result.set_error(TransactionResultCode::TxSorobanInvalid);
        return Ok(ValidationOutcome::Invalid);
    }

    // Fee floor.
    if frame.inclusion_fee() < min_inclusion_fee(frame, ctx.base_fee) {
        result.set_error(TransactionResultCode::TxInsufficientFee);
        return Ok(ValidationOutcome::Invalid);
    }

    // Timing.
    if let Some(code) = check_time_bounds(
        frame,
        ctx,
        lower_bound_close_time_offset,
        upper_bound_close_time_offset,
    ) {
        result.set_error(code);
        return Ok(ValidationOutcome::Invalid);
    }
    if let Some(code) = check_ledger_bounds(frame, ctx) {
        result.set_error(code);
        return Ok(ValidationOutcome::Invalid);
    }

    // Source account.
    let Some(source) = account::load_account(view, &frame.source_account_id()) else {
        result.set_error(TransactionResultCode::TxNoAccount);
        return Ok(ValidationOutcome::Invalid);
    };

    // Relative sequence preconditions.
    let gap = frame.min_seq_ledger_gap();
    if gap > 0 {
        let last_moved = account::seq_ledger(&source);
        if ctx.sequence < last_moved.saturating_add(gap) {
            result.set_error(TransactionResultCode::TxBadMinSeqAgeOrGap);
            return Ok(ValidationOutcome::Invalid);
        }
    }
    let age = frame.min_seq_age();
    if age > 0 {
        let last_moved = account::seq_time(&source);
        if ctx.close_time < last_moved.saturating_add(age) {
            result.set_error(TransactionResultCode::TxBadMinSeqAgeOrGap);
            return Ok(ValidationOutcome::Invalid);
        }
    }

    // Sequence number. While applying, fee processing has already moved
    // the account to the transaction's number; anything else means the
    // state diverged between the two phases (say, a merge and re-create
    // earlier in the set).
    let current = if current_seq != 0 {
        current_seq
    } else {
        source.seq_num.0
    };
    let bad_seq = if applying {
        current != frame.sequence_number()
    } else {
        is_bad_seq(frame, current)
    };
    if bad_seq {
        result.set_error(TransactionResultCode::TxBadSeq);
        return Ok(ValidationOutcome::Invalid);
    }

    // Authorization of the transaction source at the low threshold; the
    // operations re-check at their own levels.
    let signers = collect_signers_for_account(&source);
    if !checker.check_signature(&signers, account::threshold(&source, ThresholdLevel::Low)) {
        result.set_error(TransactionResultCode::TxBadAuth);
        return Ok(ValidationOutcome::Invalid);
    }

    // Balance. While applying, the fee is already gone from the balance.
    let fee_to_pay = if applying { 0 } else { frame.full_fee() };
    if header::available_balance(view.header(), &source) < fee_to_pay {
        result.set_error(TransactionResultCode::TxInsufficientBalance);
        return Ok(ValidationOutcome::InvalidPostAuth);
    }

    Ok(ValidationOutcome::FullyValid)
}

fn check_time_bounds(
    frame: &TransactionFrame,
    ctx: &LedgerContext,
    lower_offset: u64,
    upper_offset: u64,
) -> Option<TransactionResultCode> {
    let tb = frame.time_bounds()?;
    let min_time = tb.min_time.0;
    let max_time = tb.max_time.0;
    if min_time > 0 && ctx.close_time.saturating_add(lower_offset) < min_time {
        return Some(TransactionResultCode::TxTooEarly);
    }
    if max_time > 0 && ctx.close_time.saturating_add(upper_offset) > max_time {
        return Some(TransactionResultCode::TxTooLate);
    }
    None
}

fn check_ledger_bounds(
    frame: &TransactionFrame,
    ctx: &LedgerContext,
) -> Option<TransactionResultCode> {
    let lb = frame.ledger_bounds()?;
    if lb.min_ledger > 0 && ctx.sequence < lb.min_ledger {
        return Some(TransactionResultCode::TxTooEarly);
    }
    if lb.max_ledger > 0 && ctx.sequence >= lb.max_ledger {
        return Some(TransactionResultCode::TxTooLate);
    }
    None
}

/// Sequence-number acceptance.
///
/// Without a floor the transaction must consume exactly the next number.
/// With a `min_seq_num` floor the account's current number may sit anywhere
/// in `[min_seq_num, seq)`; the transaction still moves it to `seq`, so
/// sequence numbers never go backwards.
fn is_bad_seq(frame: &TransactionFrame, current: i64) -> bool {
    let seq = frame.sequence_number();
    match frame.min_seq_num() {
        Some(min_seq) => !(min_seq <= current && current < seq),
        None => seq != current + 1,
    }
}

fn check_operation_signatures(
    frame: &TransactionFrame,
    view: &View<'_>,
    checker: &mut SignatureChecker<'_>,
    result: &mut MutableTxResult,
) -> Result<bool> {
    let tx_source = frame.source_account_id();
    for op in frame.operations() {
        let op_source = op
            .source_account
            .as_ref()
            .map(crate::frame::muxed_to_account_id)
            .unwrap_or_else(|| tx_source.clone());
        // A missing op source may be created earlier in the same
        // transaction; existence is settled at apply time.
        let Some(op_account) = account::load_account(view, &op_source) else {
            continue;
        };
        let signers = collect_signers_for_account(&op_account);
        let needed = account::threshold(&op_account, operation_threshold(op));
        if !checker.check_signature(&signers, needed) {
            result.set_error(TransactionResultCode::TxBadAuth);
            return Ok(false);
        }
    }
    Ok(true)
}

fn check_extra_signers(
    frame: &TransactionFrame,
    checker: &mut SignatureChecker<'_>,
    result: &mut MutableTxResult,
) -> bool {
    for key in frame.extra_signers() {
        let signer = Signer { key, weight: 1 };
        if !checker.check_signature(std::slice::from_ref(&signer), 1) {
            result.set_error(TransactionResultCode::TxBadAuthExtra);
            return false;
        }
    }
    true
}

/// Fee-bump validity: outer structure, the strict fee-rate dominance check,
/// outer authorization and balance, then the wrapped transaction.
#[allow(clippy::too_many_arguments)]
fn check_valid_fee_bump(
    frame: &TransactionFrame,
    view: &View<'_>,
    ctx: &LedgerContext,
    current_seq: i64,
    lower_offset: u64,
    upper_offset: u64,
    result: &mut MutableTxResult,
) -> Result<bool> {
    if frame.full_fee() < 0 {
        result.set_error(TransactionResultCode::TxMalformed);
        return Ok(false);
    }
    if ctx.protocol_version < FIRST_FEE_BUMP_PROTOCOL_VERSION {
        result.set_error(TransactionResultCode::TxNotSupported);
        return Ok(false);
    }

    let inner = frame
        .inner_frame()
        .ok_or_else(|| crate::TxError::Internal("fee bump without inner tx".into()))?;

    if frame.inclusion_fee() < min_inclusion_fee(frame, ctx.base_fee) {
        result.set_error(TransactionResultCode::TxInsufficientFee);
        return Ok(false);
    }
    // A negative inner inclusion fee can occur when a contract resource fee
    // exceeds the declared total; such an inner transaction is never valid.
    if inner.inclusion_fee() < 0 {
        set_inner_failed_stub(&inner, result)?;
        return Ok(false);
    }
    // The wrap must actually outbid the inner transaction: compare
    // per-operation rates by cross-multiplication, in 128 bits. Equal rates
    // are not a bump.
    let v1 = big_multiply(frame.inclusion_fee(), min_inclusion_fee(&inner, ctx.base_fee));
    let v2 = big_multiply(inner.inclusion_fee(), min_inclusion_fee(frame, ctx.base_fee));
    if v1 <= v2 {
        result.set_error(TransactionResultCode::TxInsufficientFee);
        return Ok(false);
    }

    let Some(fee_source) = account::load_account(view, &frame.fee_source_account_id()) else {
        result.set_error(TransactionResultCode::TxNoAccount);
        return Ok(false);
    };

    let contents_hash = frame.contents_hash()?;
    let mut checker =
        SignatureChecker::new(ctx.protocol_version, contents_hash, frame.signatures());
    let signers = collect_signers_for_account(&fee_source);
    if !checker.check_signature(&signers, account::threshold(&fee_source, ThresholdLevel::Low)) {
        result.set_error(TransactionResultCode::TxBadAuth);
        return Ok(false);
    }
    if !checker.all_signatures_used() {
        result.set_error(TransactionResultCode::TxBadAuthExtra);
        return Ok(false);
    }
    if header::available_balance(view.header(), &fee_source) < frame.full_fee() {
        result.set_error(TransactionResultCode::TxInsufficientBalance);
        return Ok(false);
    }

    // Validate the wrapped transaction and wrap its verdict.
    let (inner_valid, inner_result) =
        check_valid(&inner, view, ctx, current_seq, lower_offset, upper_offset)?;
    let pair = inner_result_pair(&inner, inner_result)?;
    if inner_valid {
        result.set_result(TransactionResultResult::TxFeeBumpInnerSuccess(pair));
    } else {
        result.set_result(TransactionResultResult::TxFeeBumpInnerFailed(pair));
    }
    Ok(inner_valid)
}

fn set_inner_failed_stub(
    inner: &TransactionFrame,
    result: &mut MutableTxResult,
) -> Result<()> {
    let mut stub = MutableTxResult::new(0);
    stub.set_error(TransactionResultCode::TxInsufficientFee);
    let pair = inner_result_pair(inner, stub)?;
    result.set_result(TransactionResultResult::TxFeeBumpInnerFailed(pair));
    Ok(())
}

/// Re-expresses a classic result as the inner half of a fee-bump pair.
pub fn inner_result_pair(
    inner: &TransactionFrame,
    result: MutableTxResult,
) -> Result<InnerTransactionResultPair> {
    let xdr = result.into_xdr();
    let inner_result = InnerTransactionResult {
        fee_charged: xdr.fee_charged,
        result: to_inner_result(xdr.result)?,
        ext: InnerTransactionResultExt::V0,
    };
    Ok(InnerTransactionResultPair {
        transaction_hash: inner.contents_hash()?.into(),
        result: inner_result,
    })
}

fn to_inner_result(
    result: TransactionResultResult,
) -> Result<InnerTransactionResultResult> {
    use InnerTransactionResultResult as Inner;
    use TransactionResultResult as Outer;
    Ok(match result {
        Outer::TxSuccess(ops) => Inner::TxSuccess(ops),
        Outer::TxFailed(ops) => Inner::TxFailed(ops),
        Outer::TxTooEarly => Inner::TxTooEarly,
        Outer::TxTooLate => Inner::TxTooLate,
        Outer::TxMissingOperation => Inner::TxMissingOperation,
        Outer::TxBadSeq => Inner::TxBadSeq,
        Outer::TxBadAuth => Inner::TxBadAuth,
        Outer::TxInsufficientBalance => Inner::TxInsufficientBalance,
        Outer::TxNoAccount => Inner::TxNoAccount,
        Outer::TxInsufficientFee => Inner::TxInsufficientFee,
        Outer::TxBadAuthExtra => Inner::TxBadAuthExtra,
        Outer::TxInternalError => Inner::TxInternalError,
        Outer::TxNotSupported => Inner::TxNotSupported,
        Outer::TxBadSponsorship => Inner::TxBadSponsorship,
        Outer::TxBadMinSeqAgeOrGap => Inner::TxBadMinSeqAgeOrGap,
        Outer::TxMalformed => Inner::TxMalformed,
        Outer::TxSorobanInvalid => Inner::TxSorobanInvalid,
        Outer::TxFeeBumpInnerSuccess(_) | Outer::TxFeeBumpInnerFailed(_) => {
            return Err(crate::TxError::Internal(
                "nested fee bump result cannot be wrapped".into(),
            ))
        }
    })
}
