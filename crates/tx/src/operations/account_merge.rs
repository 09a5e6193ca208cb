//! AccountMerge operation.

use hayashi_ledger::View;
use stellar_xdr::curr::{
    AccountFlags, AccountId, AccountMergeResult, MuxedAccount, OperationResult, OperationResultTr,
};

use crate::account;
use crate::frame::muxed_to_account_id;
use crate::validation::LedgerContext;
use crate::Result;

/// Transfers the source's whole balance to the destination and deletes the
/// source account.
pub(crate) fn apply(
    destination: &MuxedAccount,
    source: &AccountId,
    view: &mut View<'_>,
    ctx: &LedgerContext,
) -> Result<OperationResult> {
    let dest = muxed_to_account_id(destination);
    if dest == *source {
        return Ok(make_result(AccountMergeResult::Malformed));
    }

    let source_account = account::load_account(view, source)
        .ok_or_else(|| crate::TxError::UnexpectedState("merge source vanished".into()))?;

    if source_account.flags & (AccountFlags::ImmutableFlag as u32) != 0 {
        return Ok(make_result(AccountMergeResult::ImmutableSet));
    }
    if source_account.num_sub_entries > 0 {
        return Ok(make_result(AccountMergeResult::HasSubEntries));
    }
    // A merged account can be re-created; if its sequence number already
    // sits at or above the re-creation number space of this ledger, old
    // transactions could replay against the new incarnation.
    if source_account.seq_num.0 >= (ctx.sequence as i64) << 32 {
        return Ok(make_result(AccountMergeResult::SeqnumTooFar));
    }

    let Some(mut dest_account) = account::load_account(view, &dest) else {
        return Ok(make_result(AccountMergeResult::NoAccount));
    };

    let transferred = source_account.balance;
    if !account::add_balance(&mut dest_account, transferred) {
        return Ok(make_result(AccountMergeResult::DestFull));
    }
    account::update_account(view, dest_account)?;
    view.erase(&account::account_key(source))?;

    Ok(make_result(AccountMergeResult::Success(transferred)))
}

fn make_result(result: AccountMergeResult) -> OperationResult {
    OperationResult::OpInner(OperationResultTr::AccountMerge(result))
}
