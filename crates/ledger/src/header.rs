//! Ledger header helpers: reserve math and balance availability.

use crate::error::Result;
use hayashi_common::Hash256;
use stellar_xdr::curr::{AccountEntry, AccountEntryExt, LedgerHeader};

/// Number of reserved sub-entry slots every account implicitly owns.
const ACCOUNT_BASE_ENTRIES: i64 = 2;

/// The minimum balance an account must retain, given its sub-entry count.
pub fn min_balance(header: &LedgerHeader, num_sub_entries: u32) -> i64 {
    (ACCOUNT_BASE_ENTRIES + num_sub_entries as i64) * header.base_reserve as i64
}

/// Native balance committed to open sell offers.
pub fn selling_liabilities(account: &AccountEntry) -> i64 {
    match &account.ext {
        AccountEntryExt::V0 => 0,
        AccountEntryExt::V1(v1) => v1.liabilities.selling,
    }
}

/// Native balance committed to open buy offers.
pub fn buying_liabilities(account: &AccountEntry) -> i64 {
    match &account.ext {
        AccountEntryExt::V0 => 0,
        AccountEntryExt::V1(v1) => v1.liabilities.buying,
    }
}

/// The balance an account can actually spend: total minus the reserve and
/// minus what is promised to open sell offers.
pub fn available_balance(header: &LedgerHeader, account: &AccountEntry) -> i64 {
    account.balance - min_balance(header, account.num_sub_entries) - selling_liabilities(account)
}

/// The identity hash of a header, used as `previousLedgerHash` by the next
/// ledger.
pub fn header_hash(header: &LedgerHeader) -> Result<Hash256> {
    Ok(Hash256::hash_xdr(header)?)
}
