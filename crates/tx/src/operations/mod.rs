//! Operation dispatch and framing.
//!
//! Each operation kind is a deterministic function of (operation,
//! authorization, view). The framing here is what the pipeline guarantees:
//! the operation's source account must exist, its signers must reach the
//! operation's threshold, and the operation body runs against a nested view
//! the caller commits or discards based on the returned code.

mod account_merge;
mod bump_sequence;
mod create_account;
mod manage_data;
mod payment;

use stellar_xdr::curr::{
    AccountMergeResult, BumpSequenceResult, CreateAccountResult, InvokeHostFunctionResult,
    ManageDataResult, Operation, OperationBody, OperationResult, OperationResultTr, PaymentResult,
};

use hayashi_ledger::View;

use crate::account::{self, ThresholdLevel};
use crate::frame::{muxed_to_account_id, TransactionFrame};
use crate::host::{HostContext, TxEffects};
use crate::result::MutableTxResult;
use crate::signature_checker::{collect_signers_for_account, SignatureChecker};
use crate::validation::LedgerContext;
use crate::Result;

/// The signature threshold an operation must reach on its source account.
pub fn operation_threshold(op: &Operation) -> ThresholdLevel {
    match &op.body {
        OperationBody::BumpSequence(_) => ThresholdLevel::Low,
        OperationBody::AccountMerge(_) | OperationBody::SetOptions(_) => ThresholdLevel::High,
        OperationBody::InvokeHostFunction(_)
        | OperationBody::ExtendFootprintTtl(_)
        | OperationBody::RestoreFootprint(_) => ThresholdLevel::Low,
        _ => ThresholdLevel::Medium,
    }
}

/// Whether an operation result is a success for its kind.
pub fn operation_succeeded(result: &OperationResult) -> bool {
    match result {
        OperationResult::OpInner(tr) => match tr {
            OperationResultTr::CreateAccount(r) => matches!(r, CreateAccountResult::Success),
            OperationResultTr::Payment(r) => matches!(r, PaymentResult::Success),
            OperationResultTr::ManageData(r) => matches!(r, ManageDataResult::Success),
            OperationResultTr::BumpSequence(r) => matches!(r, BumpSequenceResult::Success),
            OperationResultTr::AccountMerge(r) => matches!(r, AccountMergeResult::Success(_)),
            OperationResultTr::InvokeHostFunction(r) => {
                matches!(r, InvokeHostFunctionResult::Success(_))
            }
            _ => false,
        },
        _ => false,
    }
}

/// Applies one operation inside the caller's nested view.
///
/// The returned code is data; `Err` is reserved for infrastructure
/// failures that must abort the ledger close.
#[allow(clippy::too_many_arguments)]
pub fn apply_operation(
    op: &Operation,
    frame: &TransactionFrame,
    view: &mut View<'_>,
    ctx: &LedgerContext,
    host_ctx: &HostContext<'_>,
    checker: &mut SignatureChecker<'_>,
    tx_result: &mut MutableTxResult,
    effects: &mut TxEffects,
) -> Result<OperationResult> {
    let source = op
        .source_account
        .as_ref()
        .map(muxed_to_account_id)
        .unwrap_or_else(|| frame.source_account_id());

    let Some(source_account) = account::load_account(view, &source) else {
        return Ok(OperationResult::OpNoAccount);
    };

    let signers = collect_signers_for_account(&source_account);
    let needed = account::threshold(&source_account, operation_threshold(op));
    if !checker.check_signature(&signers, needed) {
        return Ok(OperationResult::OpBadAuth);
    }

    match &op.body {
        OperationBody::CreateAccount(body) => create_account::apply(body, &source, view, ctx),
        OperationBody::Payment(body) => payment::apply(body, &source, view, ctx),
        OperationBody::ManageData(body) => manage_data::apply(body, &source, view, ctx),
        OperationBody::BumpSequence(body) => bump_sequence::apply(body, &source, view, ctx),
        OperationBody::AccountMerge(destination) => {
            account_merge::apply(destination, &source, view, ctx)
        }
        OperationBody::InvokeHostFunction(body) => crate::host::invoke_host_function(
            body, frame, &source, view, ctx, host_ctx, tx_result, effects,
        ),
        _ => Ok(OperationResult::OpNotSupported),
    }
}
