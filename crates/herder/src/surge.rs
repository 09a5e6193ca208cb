//! Surge pricing: market-clearing selection when demand exceeds capacity.
//!
//! Account queues compete in a max-heap keyed by fee rate. Rates are
//! compared by 128-bit cross-multiplication (no division, no rounding
//! bias) and ties break by full hash XOR-ed with a per-session random
//! seed. When a queue's head does not fit the remaining budget the whole
//! queue is dropped: its later transactions would have broken sequence
//! contiguity anyway.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use hayashi_common::math::{big_multiply, less_than_xored};
use hayashi_common::Hash256;
use rand::Rng;
use tracing::warn;

use crate::error::Result;
use crate::tx_set::TxSetFrame;

/// Per-transaction data the comparator needs, precomputed once.
struct TxPricing {
    bid: i64,
    min_fee: i64,
    full_hash: Hash256,
    ops: usize,
}

/// One account's queue, ranked by its head transaction.
struct QueueCandidate {
    head_bid: i64,
    head_min_fee: i64,
    head_hash: Hash256,
    seed: Hash256,
    queue: VecDeque<usize>,
}

impl QueueCandidate {
    fn reload_head(&mut self, pricing: &[TxPricing]) {
        if let Some(&head) = self.queue.front() {
            self.head_bid = pricing[head].bid;
            self.head_min_fee = pricing[head].min_fee;
            self.head_hash = pricing[head].full_hash;
        }
    }
}

impl PartialEq for QueueCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueCandidate {}

impl PartialOrd for QueueCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueCandidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // fee1/min1 vs fee2/min2, compared as fee1*min2 vs fee2*min1.
        let v1 = big_multiply(self.head_bid, other.head_min_fee);
        let v2 = big_multiply(other.head_bid, self.head_min_fee);
        match v1.cmp(&v2) {
            Ordering::Equal => {
                if self.head_hash == other.head_hash {
                    Ordering::Equal
                } else if less_than_xored(&self.head_hash, &other.head_hash, &self.seed) {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            ord => ord,
        }
    }
}

/// Trims a set down to the highest-fee-rate subset fitting `ops_budget`.
///
/// `base_fee` feeds the minimum-fee side of the rate comparison. The set
/// is left in canonical order.
pub fn surge_pricing_filter(
    set: &mut TxSetFrame,
    ops_budget: usize,
    base_fee: u32,
) -> Result<()> {
    if set.size_ops() <= ops_budget {
        return Ok(());
    }
    warn!(
        ops = set.size_ops(),
        budget = ops_budget,
        "surge pricing in effect"
    );

    let seed = if cfg!(test) {
        Hash256::ZERO
    } else {
        Hash256(rand::thread_rng().gen())
    };

    let mut pricing = Vec::with_capacity(set.transactions().len());
    for tx in set.transactions() {
        pricing.push(TxPricing {
            bid: tx.inclusion_fee(),
            min_fee: hayashi_tx::min_inclusion_fee(tx, base_fee),
            full_hash: tx.full_hash()?,
            ops: std::cmp::max(1, tx.num_operations() as usize),
        });
    }

    // Group into per-account queues sorted by sequence number, then feed
    // the non-empty ones to the heap. Filtering empties up front keeps
    // the comparator a strict ordering over real candidates.
    let mut account_queues: Vec<(stellar_xdr::curr::AccountId, Vec<usize>)> = Vec::new();
    for (i, tx) in set.transactions().iter().enumerate() {
        let id = tx.source_account_id();
        match account_queues.iter_mut().find(|(account, _)| *account == id) {
            Some((_, queue)) => queue.push(i),
            None => account_queues.push((id, vec![i])),
        }
    }

    let mut heap: BinaryHeap<QueueCandidate> = BinaryHeap::new();
    for (_, mut indices) in account_queues {
        indices.sort_by_key(|&i| set.transactions()[i].sequence_number());
        let queue: VecDeque<usize> = indices.into();
        let mut candidate = QueueCandidate {
            head_bid: 0,
            head_min_fee: 1,
            head_hash: Hash256::ZERO,
            seed,
            queue,
        };
        candidate.reload_head(&pricing);
        heap.push(candidate);
    }

    let mut ops_left = ops_budget;
    let mut accepted: Vec<usize> = Vec::new();
    while ops_left > 0 {
        let Some(mut candidate) = heap.pop() else {
            break;
        };
        let Some(&head) = candidate.queue.front() else {
            continue;
        };
        if pricing[head].ops <= ops_left {
            accepted.push(head);
            ops_left -= pricing[head].ops;
            candidate.queue.pop_front();
            if !candidate.queue.is_empty() {
                candidate.reload_head(&pricing);
                heap.push(candidate);
            }
        }
        // A head that does not fit drops its whole queue: skipping just
        // the head would leave its successors with sequence gaps.
    }

    let keep: Vec<Hash256> = accepted.iter().map(|&i| pricing[i].full_hash).collect();
    let mut removed = Vec::new();
    for tx in set.transactions() {
        let hash = tx.full_hash()?;
        if !keep.contains(&hash) {
            removed.push(hash);
        }
    }
    for hash in removed {
        set.remove_tx(&hash)?;
    }
    set.sort_for_hash()?;
    Ok(())
}
