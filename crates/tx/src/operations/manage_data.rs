//! ManageData operation.

use hayashi_ledger::{header, View};
use stellar_xdr::curr::{
    AccountId, DataEntry, DataEntryExt, LedgerEntry, LedgerEntryData, LedgerEntryExt, LedgerKey,
    LedgerKeyData, ManageDataOp, ManageDataResult, OperationResult, OperationResultTr,
};

use crate::account;
use crate::validation::LedgerContext;
use crate::Result;

/// Creates, updates, or deletes a named data entry on the source account.
pub(crate) fn apply(
    op: &ManageDataOp,
    source: &AccountId,
    view: &mut View<'_>,
    _ctx: &LedgerContext,
) -> Result<OperationResult> {
    let mut source_account = account::load_account(view, source)
        .ok_or_else(|| crate::TxError::UnexpectedState("manage-data source vanished".into()))?;

    let key = LedgerKey::Data(LedgerKeyData {
        account_id: source.clone(),
        data_name: op.data_name.clone(),
    });
    let existing = view.load_without_record(&key);

    match (&op.data_value, existing) {
        (Some(value), Some(mut entry)) => {
            entry.data = LedgerEntryData::Data(DataEntry {
                account_id: source.clone(),
                data_name: op.data_name.clone(),
                data_value: value.clone(),
                ext: DataEntryExt::V0,
            });
            view.update(entry)?;
        }
        (Some(value), None) => {
            // A new sub-entry raises the reserve; the account must still
            // cover it.
            let new_sub_entries = source_account.num_sub_entries + 1;
            if source_account.balance < header::min_balance(view.header(), new_sub_entries) {
                return Ok(make_result(ManageDataResult::LowReserve));
            }
            view.create(LedgerEntry {
                last_modified_ledger_seq: 0,
                data: LedgerEntryData::Data(DataEntry {
                    account_id: source.clone(),
                    data_name: op.data_name.clone(),
                    data_value: value.clone(),
                    ext: DataEntryExt::V0,
                }),
                ext: LedgerEntryExt::V0,
            })?;
            source_account.num_sub_entries = new_sub_entries;
            account::update_account(view, source_account)?;
        }
        (None, Some(_)) => {
            view.erase(&key)?;
            source_account.num_sub_entries = source_account.num_sub_entries.saturating_sub(1);
            account::update_account(view, source_account)?;
        }
        (None, None) => {
            return Ok(make_result(ManageDataResult::NameNotFound));
        }
    }

    Ok(make_result(ManageDataResult::Success))
}

fn make_result(result: ManageDataResult) -> OperationResult {
    OperationResult::OpInner(OperationResultTr::ManageData(result))
}
