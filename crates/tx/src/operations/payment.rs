//! Payment operation.

use hayashi_ledger::{header, View};
use stellar_xdr::curr::{
    AccountId, Asset, LedgerKey, LedgerKeyTrustLine, OperationResult, OperationResultTr,
    PaymentOp, PaymentResult, TrustLineAsset, TrustLineEntry,
};

use crate::account;
use crate::frame::muxed_to_account_id;
use crate::validation::LedgerContext;
use crate::Result;

pub(crate) fn apply(
    op: &PaymentOp,
    source: &AccountId,
    view: &mut View<'_>,
    _ctx: &LedgerContext,
) -> Result<OperationResult> {
    if op.amount <= 0 {
        return Ok(make_result(PaymentResult::Malformed));
    }
    let dest = muxed_to_account_id(&op.destination);

    match &op.asset {
        Asset::Native => native_payment(source, &dest, op.amount, view),
        asset @ (Asset::CreditAlphanum4(_) | Asset::CreditAlphanum12(_)) => {
            credit_payment(source, &dest, asset, op.amount, view)
        }
    }
}

fn native_payment(
    source: &AccountId,
    dest: &AccountId,
    amount: i64,
    view: &mut View<'_>,
) -> Result<OperationResult> {
    let Some(mut dest_account) = account::load_account(view, dest) else {
        return Ok(make_result(PaymentResult::NoDestination));
    };
    let mut source_account = account::load_account(view, source)
        .ok_or_else(|| crate::TxError::UnexpectedState("payment source vanished".into()))?;

    if header::available_balance(view.header(), &source_account) < amount {
        return Ok(make_result(PaymentResult::Underfunded));
    }
    if !account::add_balance(&mut dest_account, amount) {
        return Ok(make_result(PaymentResult::LineFull));
    }
    if !account::add_balance(&mut source_account, -amount) {
        return Ok(make_result(PaymentResult::Underfunded));
    }

    account::update_account(view, source_account)?;
    account::update_account(view, dest_account)?;
    Ok(make_result(PaymentResult::Success))
}

fn credit_payment(
    source: &AccountId,
    dest: &AccountId,
    asset: &Asset,
    amount: i64,
    view: &mut View<'_>,
) -> Result<OperationResult> {
    if account::load_account(view, dest).is_none() {
        return Ok(make_result(PaymentResult::NoDestination));
    }

    let Some(mut source_line) = load_trustline(view, source, asset) else {
        return Ok(make_result(PaymentResult::SrcNoTrust));
    };
    if source_line.balance < amount {
        return Ok(make_result(PaymentResult::Underfunded));
    }
    let Some(mut dest_line) = load_trustline(view, dest, asset) else {
        return Ok(make_result(PaymentResult::NoTrust));
    };
    if dest_line.limit - dest_line.balance < amount {
        return Ok(make_result(PaymentResult::LineFull));
    }

    source_line.balance -= amount;
    dest_line.balance += amount;
    store_trustline(view, source_line)?;
    store_trustline(view, dest_line)?;
    Ok(make_result(PaymentResult::Success))
}

fn trustline_asset(asset: &Asset) -> TrustLineAsset {
    match asset {
        Asset::Native => TrustLineAsset::Native,
        Asset::CreditAlphanum4(a) => TrustLineAsset::CreditAlphanum4(a.clone()),
        Asset::CreditAlphanum12(a) => TrustLineAsset::CreditAlphanum12(a.clone()),
    }
}

fn load_trustline(
    view: &View<'_>,
    account_id: &AccountId,
    asset: &Asset,
) -> Option<TrustLineEntry> {
    let key = LedgerKey::Trustline(LedgerKeyTrustLine {
        account_id: account_id.clone(),
        asset: trustline_asset(asset),
    });
    match view.load_without_record(&key) {
        Some(entry) => match entry.data {
            stellar_xdr::curr::LedgerEntryData::Trustline(line) => Some(line),
            _ => None,
        },
        None => None,
    }
}

fn store_trustline(view: &mut View<'_>, line: TrustLineEntry) -> Result<()> {
    let key = LedgerKey::Trustline(LedgerKeyTrustLine {
        account_id: line.account_id.clone(),
        asset: line.asset.clone(),
    });
    let mut entry = view
        .load_without_record(&key)
        .ok_or_else(|| crate::TxError::UnexpectedState("trustline vanished".into()))?;
    entry.data = stellar_xdr::curr::LedgerEntryData::Trustline(line);
    view.update(entry)?;
    Ok(())
}

fn make_result(result: PaymentResult) -> OperationResult {
    OperationResult::OpInner(OperationResultTr::Payment(result))
}
