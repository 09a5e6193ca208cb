//! Account entry helpers over the ledger view.
//!
//! Accounts are the entry kind the pipeline touches constantly (fees,
//! sequence numbers, signer removal), so the load/store plumbing and the
//! extension-chain bookkeeping live here rather than being repeated at
//! every call site.

use hayashi_ledger::View;
use stellar_xdr::curr::{
    AccountEntry, AccountEntryExt, AccountEntryExtensionV1, AccountEntryExtensionV1Ext,
    AccountEntryExtensionV2, AccountEntryExtensionV2Ext, AccountEntryExtensionV3, AccountId,
    ExtensionPoint, LedgerEntry, LedgerEntryData, LedgerEntryExt, LedgerKey, LedgerKeyAccount,
    Liabilities, SignerKey, TimePoint,
};

use crate::{Result, TxError};

/// The ledger key addressing an account.
pub fn account_key(account_id: &AccountId) -> LedgerKey {
    LedgerKey::Account(LedgerKeyAccount {
        account_id: account_id.clone(),
    })
}

/// Loads an account without recording the access.
pub fn load_account(view: &View<'_>, account_id: &AccountId) -> Option<AccountEntry> {
    match view.load_without_record(&account_key(account_id)) {
        Some(LedgerEntry {
            data: LedgerEntryData::Account(account),
            ..
        }) => Some(account),
        _ => None,
    }
}

/// Writes back a modified account, preserving the surrounding entry.
pub fn update_account(view: &mut View<'_>, account: AccountEntry) -> Result<()> {
    let key = account_key(&account.account_id);
    let mut entry = view
        .load_without_record(&key)
        .ok_or_else(|| TxError::UnexpectedState("account vanished during update".into()))?;
    entry.data = LedgerEntryData::Account(account);
    view.update(entry)?;
    Ok(())
}

/// Creates a brand-new account entry.
pub fn create_account(view: &mut View<'_>, account: AccountEntry) -> Result<()> {
    view.create(LedgerEntry {
        last_modified_ledger_seq: 0,
        data: LedgerEntryData::Account(account),
        ext: LedgerEntryExt::V0,
    })?;
    Ok(())
}

/// Adjusts a balance, rejecting overflow and negative results.
#[must_use]
pub fn add_balance(account: &mut AccountEntry, delta: i64) -> bool {
    let Some(new_balance) = account.balance.checked_add(delta) else {
        return false;
    };
    if new_balance < 0 {
        return false;
    }
    account.balance = new_balance;
    true
}

/// The ledger in which the account's sequence number last moved.
pub fn seq_ledger(account: &AccountEntry) -> u32 {
    seq_info(account).map(|v3| v3.seq_ledger).unwrap_or(0)
}

/// The close time at which the account's sequence number last moved.
pub fn seq_time(account: &AccountEntry) -> u64 {
    seq_info(account).map(|v3| v3.seq_time.0).unwrap_or(0)
}

fn seq_info(account: &AccountEntry) -> Option<&AccountEntryExtensionV3> {
    match &account.ext {
        AccountEntryExt::V1(v1) => match &v1.ext {
            AccountEntryExtensionV1Ext::V2(v2) => match &v2.ext {
                AccountEntryExtensionV2Ext::V3(v3) => Some(v3),
                _ => None,
            },
            _ => None,
        },
        _ => None,
    }
}

/// Advances the sequence number, recording when it moved.
///
/// From protocol 19 on, the extension chain is upgraded so the relative
/// age/gap preconditions of later transactions can be evaluated.
pub fn advance_sequence(
    account: &mut AccountEntry,
    seq: i64,
    ledger_seq: u32,
    close_time: u64,
    protocol_version: u32,
) {
    account.seq_num = stellar_xdr::curr::SequenceNumber(seq);
    if protocol_version < hayashi_common::FIRST_SEQ_INFO_PROTOCOL_VERSION {
        return;
    }

    let v1 = match std::mem::replace(&mut account.ext, AccountEntryExt::V0) {
        AccountEntryExt::V1(v1) => v1,
        AccountEntryExt::V0 => AccountEntryExtensionV1 {
            liabilities: Liabilities {
                buying: 0,
                selling: 0,
            },
            ext: AccountEntryExtensionV1Ext::V0,
        },
    };
    let v2 = match v1.ext {
        AccountEntryExtensionV1Ext::V2(v2) => v2,
        AccountEntryExtensionV1Ext::V0 => AccountEntryExtensionV2 {
            num_sponsored: 0,
            num_sponsoring: 0,
            // One descriptor per signer, all unsponsored.
            signer_sponsoring_i_ds: vec![
                stellar_xdr::curr::SponsorshipDescriptor(None);
                account.signers.len()
            ]
            .try_into()
            .unwrap_or_default(),
            ext: AccountEntryExtensionV2Ext::V0,
        },
    };
    let v3 = match v2.ext {
        AccountEntryExtensionV2Ext::V3(mut v3) => {
            v3.seq_ledger = ledger_seq;
            v3.seq_time = TimePoint(close_time);
            v3
        }
        AccountEntryExtensionV2Ext::V0 => AccountEntryExtensionV3 {
            ext: ExtensionPoint::V0,
            seq_ledger: ledger_seq,
            seq_time: TimePoint(close_time),
        },
    };
    account.ext = AccountEntryExt::V1(AccountEntryExtensionV1 {
        liabilities: v1.liabilities,
        ext: AccountEntryExtensionV1Ext::V2(AccountEntryExtensionV2 {
            num_sponsored: v2.num_sponsored,
            num_sponsoring: v2.num_sponsoring,
            signer_sponsoring_i_ds: v2.signer_sponsoring_i_ds,
            ext: AccountEntryExtensionV2Ext::V3(v3),
        }),
    });
}

/// Removes a signer from an account if present; true when removed.
pub fn remove_signer(account: &mut AccountEntry, key: &SignerKey) -> bool {
    let signers: Vec<_> = account.signers.iter().cloned().collect();
    let before = signers.len();
    let kept: Vec<_> = signers.into_iter().filter(|s| &s.key != key).collect();
    if kept.len() == before {
        return false;
    }
    account.num_sub_entries = account.num_sub_entries.saturating_sub(1);
    account.signers = kept.try_into().unwrap_or_default();
    true
}

/// Signature-weight threshold levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdLevel {
    /// Sequence bumps, trust revocations, contract invocations.
    Low,
    /// Most operations.
    Medium,
    /// Account-shape changes: merges, signer edits.
    High,
}

/// The weight an operation at the given level must gather.
pub fn threshold(account: &AccountEntry, level: ThresholdLevel) -> i32 {
    let idx = match level {
        ThresholdLevel::Low => 1,
        ThresholdLevel::Medium => 2,
        ThresholdLevel::High => 3,
    };
    account.thresholds.0[idx] as i32
}
