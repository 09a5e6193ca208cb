//! In-memory ledger store with nested transactional views.
//!
//! The view discipline is `open → mutate → commit ∨ discard`:
//!
//! - [`LedgerStore::root_view`] opens the outermost view for a ledger close.
//! - [`View::nest`] opens a child view; the borrow checker pins the parent
//!   for the child's lifetime, so views always commit innermost-first.
//! - [`View::commit`] folds pending changes (and the header) into the
//!   parent; dropping a view without committing discards them, which makes
//!   discard-on-failure automatic on every exit path.
//!
//! Pending changes are kept in a `BTreeMap` so they fold upward in a
//! deterministic key order. `last_modified_ledger_seq` is stamped when the
//! outermost view commits into the store.

use crate::error::{LedgerError, Result};
use std::collections::{BTreeMap, BTreeSet};
use stellar_xdr::curr::{
    LedgerEntry, LedgerEntryData, LedgerHeader, LedgerKey, LedgerKeyAccount,
    LedgerKeyClaimableBalance, LedgerKeyConfigSetting, LedgerKeyContractCode,
    LedgerKeyContractData, LedgerKeyData, LedgerKeyLiquidityPool, LedgerKeyOffer,
    LedgerKeyTrustLine, LedgerKeyTtl,
};

/// Derives the [`LedgerKey`] identifying a ledger entry.
pub fn entry_key(entry: &LedgerEntry) -> Result<LedgerKey> {
    let key = match &entry.data {
        LedgerEntryData::Account(account) => LedgerKey::Account(LedgerKeyAccount {
            account_id: account.account_id.clone(),
        }),
        LedgerEntryData::Trustline(line) => LedgerKey::Trustline(LedgerKeyTrustLine {
            account_id: line.account_id.clone(),
            asset: line.asset.clone(),
        }),
        LedgerEntryData::Offer(offer) => LedgerKey::Offer(LedgerKeyOffer {
            seller_id: offer.seller_id.clone(),
            offer_id: offer.offer_id,
        }),
        LedgerEntryData::Data(data) => LedgerKey::Data(LedgerKeyData {
            account_id: data.account_id.clone(),
            data_name: data.data_name.clone(),
        }),
        LedgerEntryData::ClaimableBalance(cb) => {
            LedgerKey::ClaimableBalance(LedgerKeyClaimableBalance {
                balance_id: cb.balance_id.clone(),
            })
        }
        LedgerEntryData::LiquidityPool(pool) => {
            LedgerKey::LiquidityPool(LedgerKeyLiquidityPool {
                liquidity_pool_id: pool.liquidity_pool_id.clone(),
            })
        }
        LedgerEntryData::ContractData(cd) => LedgerKey::ContractData(LedgerKeyContractData {
            contract: cd.contract.clone(),
            key: cd.key.clone(),
            durability: cd.durability,
        }),
        LedgerEntryData::ContractCode(code) => {
            LedgerKey::ContractCode(LedgerKeyContractCode {
                hash: code.hash.clone(),
            })
        }
        LedgerEntryData::ConfigSetting(setting) => {
            LedgerKey::ConfigSetting(LedgerKeyConfigSetting {
                config_setting_id: setting.discriminant(),
            })
        }
        LedgerEntryData::Ttl(ttl) => LedgerKey::Ttl(LedgerKeyTtl {
            key_hash: ttl.key_hash.clone(),
        }),
    };
    Ok(key)
}

fn key_label(key: &LedgerKey) -> String {
    // Compact label for error messages; full key dumps are unreadable.
    match key {
        LedgerKey::Account(_) => "account".to_string(),
        LedgerKey::Trustline(_) => "trustline".to_string(),
        LedgerKey::Offer(k) => format!("offer {}", k.offer_id),
        LedgerKey::Data(_) => "data".to_string(),
        LedgerKey::ClaimableBalance(_) => "claimable-balance".to_string(),
        LedgerKey::LiquidityPool(_) => "liquidity-pool".to_string(),
        LedgerKey::ContractData(_) => "contract-data".to_string(),
        LedgerKey::ContractCode(_) => "contract-code".to_string(),
        LedgerKey::ConfigSetting(_) => "config-setting".to_string(),
        LedgerKey::Ttl(_) => "ttl".to_string(),
    }
}

/// The in-memory ledger state: every live entry plus the current header.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    entries: BTreeMap<LedgerKey, LedgerEntry>,
    header: LedgerHeader,
}

impl LedgerStore {
    /// Creates an empty store with the given header.
    pub fn new(header: LedgerHeader) -> Self {
        Self {
            entries: BTreeMap::new(),
            header,
        }
    }

    /// Seeds an entry directly into the store, outside any view.
    pub fn insert_entry(&mut self, entry: LedgerEntry) -> Result<()> {
        let key = entry_key(&entry)?;
        self.entries.insert(key, entry);
        Ok(())
    }

    /// Reads an entry directly from the store, outside any view.
    pub fn get(&self, key: &LedgerKey) -> Option<&LedgerEntry> {
        self.entries.get(key)
    }

    /// The current ledger header.
    pub fn header(&self) -> &LedgerHeader {
        &self.header
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all live entries in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&LedgerKey, &LedgerEntry)> {
        self.entries.iter()
    }

    /// Opens the outermost view for a ledger close.
    pub fn root_view(&mut self) -> View<'_> {
        let header = self.header.clone();
        View {
            parent: self,
            pending: BTreeMap::new(),
            header,
            accessed: BTreeSet::new(),
            root: true,
        }
    }
}

/// Internal seam between a view and whatever it folds into.
trait ViewParent {
    fn lookup(&self, key: &LedgerKey) -> Option<LedgerEntry>;
    fn absorb(&mut self, pending: BTreeMap<LedgerKey, Option<LedgerEntry>>, header: LedgerHeader);
}

impl ViewParent for LedgerStore {
    fn lookup(&self, key: &LedgerKey) -> Option<LedgerEntry> {
        self.entries.get(key).cloned()
    }

    fn absorb(&mut self, pending: BTreeMap<LedgerKey, Option<LedgerEntry>>, header: LedgerHeader) {
        for (key, change) in pending {
            match change {
                Some(mut entry) => {
                    entry.last_modified_ledger_seq = header.ledger_seq;
                    self.entries.insert(key, entry);
                }
                None => {
                    self.entries.remove(&key);
                }
            }
        }
        self.header = header;
    }
}

/// A read-write transactional snapshot layered on a parent view or store.
///
/// Exactly one of [`commit`](View::commit) or [`discard`](View::discard) is
/// reached on every exit path: commit consumes the view, and any view that
/// goes out of scope un-committed (including during a panic unwind) is a
/// discard.
pub struct View<'a> {
    parent: &'a mut (dyn ViewParent + 'a),
    pending: BTreeMap<LedgerKey, Option<LedgerEntry>>,
    header: LedgerHeader,
    accessed: BTreeSet<LedgerKey>,
    root: bool,
}

impl<'a> ViewParent for View<'a> {
    fn lookup(&self, key: &LedgerKey) -> Option<LedgerEntry> {
        match self.pending.get(key) {
            Some(Some(entry)) => Some(entry.clone()),
            Some(None) => None,
            None => self.parent.lookup(key),
        }
    }

    fn absorb(&mut self, pending: BTreeMap<LedgerKey, Option<LedgerEntry>>, header: LedgerHeader) {
        for (key, change) in pending {
            self.pending.insert(key, change);
        }
        self.header = header;
    }
}

impl<'a> View<'a> {
    /// Opens a nested view on top of this one.
    pub fn nest(&mut self) -> View<'_> {
        let header = self.header.clone();
        View {
            parent: self,
            pending: BTreeMap::new(),
            header,
            accessed: BTreeSet::new(),
            root: false,
        }
    }

    /// Loads an entry, recording the key as accessed.
    pub fn load(&mut self, key: &LedgerKey) -> Option<LedgerEntry> {
        self.accessed.insert(key.clone());
        ViewParent::lookup(self, key)
    }

    /// Loads an entry without recording the access.
    ///
    /// Footprint gathering uses this so that read-only keys are not counted
    /// as touched entries.
    pub fn load_without_record(&self, key: &LedgerKey) -> Option<LedgerEntry> {
        ViewParent::lookup(self, key)
    }

    /// Creates a new entry.
    ///
    /// # Errors
    ///
    /// Fails with [`LedgerError::EntryExists`] if the key is already live.
    pub fn create(&mut self, entry: LedgerEntry) -> Result<()> {
        let key = entry_key(&entry)?;
        if ViewParent::lookup(self, &key).is_some() {
            return Err(LedgerError::EntryExists(key_label(&key)));
        }
        self.pending.insert(key, Some(entry));
        Ok(())
    }

    /// Replaces an existing entry.
    ///
    /// # Errors
    ///
    /// Fails with [`LedgerError::EntryMissing`] if the key is not live.
    pub fn update(&mut self, entry: LedgerEntry) -> Result<()> {
        let key = entry_key(&entry)?;
        if ViewParent::lookup(self, &key).is_none() {
            return Err(LedgerError::EntryMissing(key_label(&key)));
        }
        self.pending.insert(key, Some(entry));
        Ok(())
    }

    /// Erases an existing entry.
    ///
    /// # Errors
    ///
    /// Fails with [`LedgerError::EntryMissing`] if the key is not live.
    pub fn erase(&mut self, key: &LedgerKey) -> Result<()> {
        if ViewParent::lookup(self, key).is_none() {
            return Err(LedgerError::EntryMissing(key_label(key)));
        }
        self.pending.insert(key.clone(), None);
        Ok(())
    }

    /// The header as seen by this view.
    pub fn header(&self) -> &LedgerHeader {
        &self.header
    }

    /// Mutable access to the header.
    ///
    /// The header is mutable only on the outermost view; a nested caller
    /// reaching for it is an invariant violation and the process must not
    /// continue with a possibly diverged ledger.
    pub fn header_mut(&mut self) -> &mut LedgerHeader {
        assert!(self.root, "ledger header is read-only on nested views");
        &mut self.header
    }

    /// Whether this view has uncommitted changes.
    pub fn has_pending_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Keys recorded as accessed through [`load`](View::load).
    pub fn accessed_keys(&self) -> impl Iterator<Item = &LedgerKey> {
        self.accessed.iter()
    }

    /// Folds this view's changes into its parent.
    pub fn commit(self) {
        let View {
            parent,
            pending,
            header,
            ..
        } = self;
        parent.absorb(pending, header);
    }

    /// Drops this view's changes.
    ///
    /// Equivalent to letting the view go out of scope; the explicit form
    /// reads better on failure paths.
    pub fn discard(self) {}
}
