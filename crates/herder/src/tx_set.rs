//! Transaction-set frame.
//!
//! The set's identity is `SHA256(previousLedgerHash ‖ envelope_0 ‖ …)` over
//! full-hash-sorted envelopes, so the hash is a pure function of the
//! previous hash and the multiset of envelopes. The apply order is derived
//! separately: per-account sequence order survives, but the order between
//! accounts is hidden behind the set hash so submitters cannot position
//! their transactions.

use std::collections::VecDeque;

use hayashi_common::math::less_than_xored;
use hayashi_common::{math, Hash256, NetworkId, MAX_OPS_PER_TX};
use hayashi_crypto::Sha256Hasher;
use hayashi_ledger::{header, View};
use stellar_xdr::curr::{AccountId, LedgerHeader, TransactionSet};
use tracing::debug;

use hayashi_tx::validation::LedgerContext;
use hayashi_tx::{envelope_xdr, TransactionFrame};

use crate::error::{HerderError, Result};

/// An owned, canonicalizable set of transactions for one ledger.
pub struct TxSetFrame {
    previous_ledger_hash: Hash256,
    txs: Vec<TransactionFrame>,
    contents_hash: Option<Hash256>,
}

impl TxSetFrame {
    /// An empty set on top of the given previous-ledger hash.
    pub fn new(previous_ledger_hash: Hash256) -> Self {
        Self {
            previous_ledger_hash,
            txs: Vec::new(),
            contents_hash: None,
        }
    }

    /// Frames a wire set for the given network.
    pub fn from_wire(network_id: NetworkId, set: &TransactionSet) -> Self {
        let txs = set
            .txs
            .iter()
            .map(|env| TransactionFrame::from_wire(network_id, env.clone()))
            .collect();
        Self {
            previous_ledger_hash: set.previous_ledger_hash.clone().into(),
            txs,
            contents_hash: None,
        }
    }

    /// Converts back to the wire form, in canonical order.
    pub fn to_xdr(&mut self) -> Result<TransactionSet> {
        self.sort_for_hash()?;
        let txs: Vec<_> = self.txs.iter().map(|tx| tx.envelope().clone()).collect();
        Ok(TransactionSet {
            previous_ledger_hash: self.previous_ledger_hash.into(),
            txs: txs
                .try_into()
                .map_err(|_| HerderError::Internal("transaction set too large".into()))?,
        })
    }

    /// The hash this set builds on.
    pub fn previous_ledger_hash(&self) -> &Hash256 {
        &self.previous_ledger_hash
    }

    /// The transactions, in their current order.
    pub fn transactions(&self) -> &[TransactionFrame] {
        &self.txs
    }

    /// Adds a transaction, invalidating the cached identity.
    pub fn add_tx(&mut self, tx: TransactionFrame) {
        self.txs.push(tx);
        self.contents_hash = None;
    }

    /// Removes a transaction by full hash, invalidating the identity.
    pub fn remove_tx(&mut self, full_hash: &Hash256) -> Result<Option<TransactionFrame>> {
        let mut found = None;
        for (i, tx) in self.txs.iter().enumerate() {
            if tx.full_hash()? == *full_hash {
                found = Some(i);
                break;
            }
        }
        Ok(found.map(|i| {
            self.contents_hash = None;
            self.txs.remove(i)
        }))
    }

    /// Number of transactions.
    pub fn size_txs(&self) -> usize {
        self.txs.len()
    }

    /// Total operations, counting fee-bump wrappers.
    pub fn size_ops(&self) -> usize {
        self.txs.iter().map(|tx| tx.num_operations() as usize).sum()
    }

    /// Sorts into canonical (full-hash ascending) order.
    pub fn sort_for_hash(&mut self) -> Result<()> {
        let mut keyed = Vec::with_capacity(self.txs.len());
        for tx in self.txs.drain(..) {
            keyed.push((tx.full_hash()?, tx));
        }
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        self.txs = keyed.into_iter().map(|(_, tx)| tx).collect();
        Ok(())
    }

    fn is_sorted_for_hash(&self) -> Result<bool> {
        let mut prev: Option<Hash256> = None;
        for tx in &self.txs {
            let hash = tx.full_hash()?;
            if let Some(p) = prev {
                if hash < p {
                    return Ok(false);
                }
            }
            prev = Some(hash);
        }
        Ok(true)
    }

    /// The set's identity hash, computed over canonical order and cached
    /// until the set changes.
    pub fn contents_hash(&mut self) -> Result<Hash256> {
        if let Some(hash) = self.contents_hash {
            return Ok(hash);
        }
        self.sort_for_hash()?;
        let mut hasher = Sha256Hasher::new();
        hasher.update(self.previous_ledger_hash.as_bytes());
        for tx in &self.txs {
            hasher.update(&envelope_xdr(tx)?);
        }
        let hash = hasher.finalize();
        self.contents_hash = Some(hash);
        Ok(hash)
    }

    /// Groups transactions by source account, each queue ascending by
    /// sequence number, preserving first-seen account order.
    fn account_queues(&self) -> Vec<(AccountId, VecDeque<usize>)> {
        let mut queues: Vec<(AccountId, Vec<usize>)> = Vec::new();
        for (i, tx) in self.txs.iter().enumerate() {
            let id = tx.source_account_id();
            match queues.iter_mut().find(|(account, _)| *account == id) {
                Some((_, queue)) => queue.push(i),
                None => queues.push((id, vec![i])),
            }
        }
        queues
            .into_iter()
            .map(|(account, mut queue)| {
                queue.sort_by_key(|&i| self.txs[i].sequence_number());
                (account, queue.into())
            })
            .collect()
    }

    /// The deterministic order in which this set's transactions execute.
    ///
    /// Returns indices into the canonical (hash-sorted) slice. Round-robin
    /// batches keep per-account sequence order; within a batch, positions
    /// come from comparing full hashes XOR-ed with the set hash, so the
    /// final order is unpredictable until the set is fixed.
    pub fn apply_order(&mut self) -> Result<Vec<usize>> {
        let set_hash = self.contents_hash()?;
        let mut full_hashes = Vec::with_capacity(self.txs.len());
        for tx in &self.txs {
            full_hashes.push(tx.full_hash()?);
        }

        let mut queues = self.account_queues();
        let mut order = Vec::with_capacity(self.txs.len());
        while !queues.is_empty() {
            let mut batch: Vec<usize> = Vec::with_capacity(queues.len());
            for (_, queue) in &mut queues {
                if let Some(i) = queue.pop_front() {
                    batch.push(i);
                }
            }
            queues.retain(|(_, queue)| !queue.is_empty());
            batch.sort_by(|&a, &b| {
                if full_hashes[a] == full_hashes[b] {
                    std::cmp::Ordering::Equal
                } else if less_than_xored(&full_hashes[a], &full_hashes[b], &set_hash) {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Greater
                }
            });
            order.extend(batch);
        }
        Ok(order)
    }

    /// The effective base fee this set closes with.
    ///
    /// When the set's operations push past `max_tx_set_size` minus one
    /// maximal transaction, surge pricing was in effect and the lowest
    /// per-operation bid among included transactions becomes the base fee.
    pub fn base_fee(&self, header: &LedgerHeader) -> Result<i64> {
        let mut base_fee = header.base_fee as i64;
        let mut ops = 0usize;
        let mut lowest_bid_per_op = i64::MAX;
        for tx in &self.txs {
            let tx_ops = std::cmp::max(1, tx.num_operations() as i64);
            ops += tx_ops as usize;
            let per_op = math::big_divide(tx.inclusion_fee(), 1, tx_ops, math::Rounding::Up)
                .map_err(|e| HerderError::Internal(e.to_string()))?;
            lowest_bid_per_op = std::cmp::min(lowest_bid_per_op, per_op);
        }
        let surge_cutoff = header.max_tx_set_size.saturating_sub(MAX_OPS_PER_TX) as usize;
        if ops > surge_cutoff && lowest_bid_per_op != i64::MAX {
            base_fee = lowest_bid_per_op;
        }
        Ok(base_fee)
    }

    /// Total fees the set will collect at its effective base fee.
    pub fn total_fees(&self, header: &LedgerHeader) -> Result<i64> {
        let base_fee = self.base_fee(header)?;
        Ok(self
            .txs
            .iter()
            .map(|tx| tx.fee(Some(base_fee), true))
            .sum())
    }

    /// Structural and per-transaction validity of the whole set.
    pub fn check_valid(
        &self,
        view: &View<'_>,
        lcl_hash: &Hash256,
        ctx: &LedgerContext,
    ) -> Result<bool> {
        if *lcl_hash != self.previous_ledger_hash {
            debug!(
                got = %self.previous_ledger_hash,
                expected = %lcl_hash,
                "transaction set builds on the wrong ledger"
            );
            return Ok(false);
        }
        if self.size_ops() > view.header().max_tx_set_size as usize {
            debug!(
                ops = self.size_ops(),
                max = view.header().max_tx_set_size,
                "transaction set too large"
            );
            return Ok(false);
        }
        if !self.is_sorted_for_hash()? {
            debug!("transaction set not in canonical order");
            return Ok(false);
        }
        let report = self.classify_invalid(view, ctx)?;
        Ok(report.is_empty())
    }

    /// Removes and returns every transaction that fails per-transaction
    /// validity or fee affordability. Leaves the set in canonical order
    /// with its identity invalidated.
    pub fn trim_invalid(
        &mut self,
        view: &View<'_>,
        ctx: &LedgerContext,
    ) -> Result<Vec<TransactionFrame>> {
        self.sort_for_hash()?;
        let condemned = self.classify_invalid(view, ctx)?;
        if condemned.is_empty() {
            return Ok(Vec::new());
        }

        let mut trimmed = Vec::with_capacity(condemned.len());
        let mut kept = Vec::with_capacity(self.txs.len() - condemned.len());
        for (i, tx) in self.txs.drain(..).enumerate() {
            if condemned.contains(&i) {
                trimmed.push(tx);
            } else {
                kept.push(tx);
            }
        }
        self.txs = kept;
        self.contents_hash = None;
        Ok(trimmed)
    }

    /// Indices of transactions that fail validity or affordability.
    ///
    /// Per-account, transactions validate in sequence order with the
    /// previous accepted sequence threaded through, so one bad link
    /// condemns everything after it. A fee source that cannot cover the
    /// sum of its bids forfeits all of its transactions.
    fn classify_invalid(&self, view: &View<'_>, ctx: &LedgerContext) -> Result<Vec<usize>> {
        let mut condemned: Vec<usize> = Vec::new();
        let queues = self.account_queues();

        // Pass one: per-transaction validity, accumulating each fee
        // source's total bid.
        let mut fee_totals: Vec<(AccountId, i64)> = Vec::new();
        let mut valid_queues: Vec<Vec<usize>> = Vec::new();
        for (_, queue) in &queues {
            let mut last_seq = 0i64;
            let mut valid = Vec::new();
            for &i in queue {
                let tx = &self.txs[i];
                let (ok, result) = hayashi_tx::check_valid(tx, view, ctx, last_seq, 0, 0)?;
                if !ok {
                    debug!(code = ?result.result_code(), index = i, "trimming invalid transaction");
                    condemned.push(i);
                    continue;
                }
                last_seq = tx.sequence_number();
                let fee_source = tx.fee_source_account_id();
                match fee_totals.iter_mut().find(|(id, _)| *id == fee_source) {
                    Some((_, total)) => *total = total.saturating_add(tx.full_fee()),
                    None => fee_totals.push((fee_source, tx.full_fee())),
                }
                valid.push(i);
            }
            valid_queues.push(valid);
        }

        // Pass two: fee affordability. An account that cannot cover its
        // total bids forfeits all of its remaining transactions.
        for valid in &valid_queues {
            let mut broke = false;
            for &i in valid {
                let tx = &self.txs[i];
                if !broke {
                    let fee_source = tx.fee_source_account_id();
                    let total = fee_totals
                        .iter()
                        .find(|(id, _)| *id == fee_source)
                        .map(|(_, total)| *total)
                        .unwrap_or(0);
                    let available = hayashi_tx::account::load_account(view, &fee_source)
                        .map(|account| header::available_balance(view.header(), &account))
                        .unwrap_or(0);
                    if available < total {
                        debug!(index = i, "fee source cannot cover its bids");
                        broke = true;
                    }
                }
                if broke {
                    condemned.push(i);
                }
            }
        }

        condemned.sort_unstable();
        condemned.dedup();
        Ok(condemned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hayashi_tx::test_utils::*;

    fn set_of(ctx: &TestContext, envs: Vec<stellar_xdr::curr::TransactionEnvelope>) -> TxSetFrame {
        let mut set = TxSetFrame::new(Hash256::hash(b"previous ledger"));
        for env in envs {
            set.add_tx(ctx.frame(env));
        }
        set
    }

    #[test]
    fn contents_hash_is_permutation_invariant() {
        let ctx = TestContext::new();
        let alice = ctx.account(1);
        let bob = ctx.account(2);
        let carol = ctx.account(3);
        let e1 = alice.payment_tx(&bob, 100, 11, 100);
        let e2 = bob.payment_tx(&carol, 200, 4, 100);
        let e3 = carol.payment_tx(&alice, 300, 8, 100);

        let mut a = set_of(&ctx, vec![e1.clone(), e2.clone(), e3.clone()]);
        let mut b = set_of(&ctx, vec![e3, e1, e2]);
        assert_eq!(a.contents_hash().unwrap(), b.contents_hash().unwrap());
    }

    #[test]
    fn contents_hash_depends_on_previous_ledger() {
        let ctx = TestContext::new();
        let alice = ctx.account(1);
        let bob = ctx.account(2);
        let env = alice.payment_tx(&bob, 100, 11, 100);

        let mut a = TxSetFrame::new(Hash256::hash(b"ledger A"));
        a.add_tx(ctx.frame(env.clone()));
        let mut b = TxSetFrame::new(Hash256::hash(b"ledger B"));
        b.add_tx(ctx.frame(env));
        assert_ne!(a.contents_hash().unwrap(), b.contents_hash().unwrap());
    }

    #[test]
    fn apply_order_is_a_pure_function_of_the_set() {
        let ctx = TestContext::new();
        let alice = ctx.account(1);
        let bob = ctx.account(2);
        let envs = vec![
            alice.payment_tx(&bob, 100, 11, 100),
            alice.payment_tx(&bob, 100, 12, 100),
            bob.payment_tx(&alice, 50, 4, 100),
        ];
        let mut a = set_of(&ctx, envs.clone());
        let mut b = set_of(&ctx, envs);
        assert_eq!(a.apply_order().unwrap(), b.apply_order().unwrap());
    }

    #[test]
    fn apply_order_keeps_per_account_sequence_order() {
        let ctx = TestContext::new();
        let alice = ctx.account(1);
        let bob = ctx.account(2);
        let mut set = set_of(
            &ctx,
            vec![
                alice.payment_tx(&bob, 100, 13, 100),
                alice.payment_tx(&bob, 100, 11, 100),
                alice.payment_tx(&bob, 100, 12, 100),
                bob.payment_tx(&alice, 50, 4, 100),
            ],
        );
        let order = set.apply_order().unwrap();
        let seqs: Vec<i64> = order
            .iter()
            .map(|&i| set.transactions()[i].sequence_number())
            .filter(|&s| s >= 11)
            .collect();
        assert_eq!(seqs, vec![11, 12, 13]);
    }

    #[test]
    fn wire_round_trip_preserves_identity() {
        let ctx = TestContext::new();
        let alice = ctx.account(1);
        let bob = ctx.account(2);
        let mut set = set_of(
            &ctx,
            vec![
                alice.payment_tx(&bob, 100, 11, 100),
                bob.payment_tx(&alice, 50, 4, 100),
            ],
        );
        let hash = set.contents_hash().unwrap();
        let wire = set.to_xdr().unwrap();

        let mut decoded = TxSetFrame::from_wire(ctx.network_id, &wire);
        assert_eq!(decoded.contents_hash().unwrap(), hash);
        assert_eq!(decoded.size_txs(), 2);
    }

    #[test]
    fn base_fee_without_surge_is_the_header_fee() {
        let ctx = TestContext::new();
        let alice = ctx.account(1);
        let bob = ctx.account(2);
        let mut set = set_of(&ctx, vec![alice.payment_tx(&bob, 100, 11, 500)]);
        set.sort_for_hash().unwrap();
        let header = test_header(99);
        // One op against a 100-op budget: no surge.
        assert_eq!(set.base_fee(&header).unwrap(), 100);
    }

    #[test]
    fn base_fee_under_surge_is_the_lowest_accepted_bid() {
        let ctx = TestContext::new();
        let alice = ctx.account(1);
        let bob = ctx.account(2);
        let mut set = set_of(
            &ctx,
            vec![
                alice.payment_tx(&bob, 100, 11, 500),
                bob.payment_tx(&alice, 100, 4, 300),
            ],
        );
        set.sort_for_hash().unwrap();
        let mut header = test_header(99);
        // Make any inclusion count as surge.
        header.max_tx_set_size = 1;
        assert_eq!(set.base_fee(&header).unwrap(), 300);
    }

    #[test]
    fn bad_seq_cascade_trims_both() {
        let ctx = TestContext::new();
        let mut store = ctx.store_with_accounts(&[(1, 1_000_000_000, 5), (2, 1_000_000_000, 3)]);
        let alice = ctx.account(1);
        let bob = ctx.account(2);
        // Account seq is 5; 7 and 8 both skip ahead.
        let mut set = set_of(
            &ctx,
            vec![
                alice.payment_tx(&bob, 100, 7, 100),
                alice.payment_tx(&bob, 100, 8, 100),
            ],
        );

        let mut view = store.root_view();
        let trimmed = set
            .trim_invalid(&view.nest(), &ctx.ledger_context())
            .unwrap();
        assert_eq!(trimmed.len(), 2);
        assert_eq!(set.size_txs(), 0);
    }

    #[test]
    fn contiguous_sequences_survive_trimming() {
        let ctx = TestContext::new();
        let mut store = ctx.store_with_accounts(&[(1, 1_000_000_000, 10), (2, 1_000_000_000, 3)]);
        let alice = ctx.account(1);
        let bob = ctx.account(2);
        let mut set = set_of(
            &ctx,
            vec![
                alice.payment_tx(&bob, 100, 11, 100),
                alice.payment_tx(&bob, 100, 12, 100),
            ],
        );

        let mut view = store.root_view();
        let trimmed = set
            .trim_invalid(&view.nest(), &ctx.ledger_context())
            .unwrap();
        assert!(trimmed.is_empty());
        assert_eq!(set.size_txs(), 2);
    }

    #[test]
    fn fee_insolvent_account_forfeits_all_transactions() {
        let ctx = TestContext::new();
        // Alice can cover one fee but not both plus the reserve.
        let mut store = ctx.store_with_accounts(&[(1, 10_000_150, 10), (2, 1_000_000_000, 3)]);
        let alice = ctx.account(1);
        let bob = ctx.account(2);
        let mut set = set_of(
            &ctx,
            vec![
                alice.payment_tx(&bob, 1, 11, 100),
                alice.payment_tx(&bob, 1, 12, 100),
            ],
        );

        let mut view = store.root_view();
        let trimmed = set
            .trim_invalid(&view.nest(), &ctx.ledger_context())
            .unwrap();
        assert_eq!(trimmed.len(), 2);
    }

    #[test]
    fn check_valid_rejects_wrong_previous_hash() {
        let ctx = TestContext::new();
        let mut store = ctx.store_with_accounts(&[(1, 1_000_000_000, 10), (2, 1_000_000_000, 3)]);
        let alice = ctx.account(1);
        let bob = ctx.account(2);
        let mut set = set_of(&ctx, vec![alice.payment_tx(&bob, 100, 11, 100)]);
        set.sort_for_hash().unwrap();

        let mut view = store.root_view();
        let ok = set
            .check_valid(
                &view.nest(),
                &Hash256::hash(b"some other ledger"),
                &ctx.ledger_context(),
            )
            .unwrap();
        assert!(!ok);
    }

    #[test]
    fn check_valid_accepts_a_good_set() {
        let ctx = TestContext::new();
        let mut store = ctx.store_with_accounts(&[(1, 1_000_000_000, 10), (2, 1_000_000_000, 3)]);
        let alice = ctx.account(1);
        let bob = ctx.account(2);
        let mut set = set_of(&ctx, vec![alice.payment_tx(&bob, 100, 11, 100)]);
        set.sort_for_hash().unwrap();
        let lcl = *set.previous_ledger_hash();

        let mut view = store.root_view();
        let ok = set
            .check_valid(&view.nest(), &lcl, &ctx.ledger_context())
            .unwrap();
        assert!(ok);
    }
}
