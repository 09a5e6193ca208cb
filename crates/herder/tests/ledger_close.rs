//! End-to-end ledger closes: transaction sets sealed by the herder layer
//! and driven through the apply pipeline.

use hayashi_common::Hash256;
use hayashi_herder::{surge_pricing_filter, TxSetFrame};
use hayashi_ledger::NetworkConfig;
use hayashi_tx::test_utils::*;
use hayashi_tx::{apply_transaction_set, TransactionFrame};
use stellar_xdr::curr::{TransactionResultCode, TransactionResultResult};

fn close_with_set(
    ctx: &TestContext,
    store: &mut hayashi_ledger::LedgerStore,
    set: &mut TxSetFrame,
) -> hayashi_tx::LedgerCloseResult {
    let base_fee = set.base_fee(store.header()).unwrap();
    let apply_order = set.apply_order().unwrap();
    let txs: Vec<TransactionFrame> = set.transactions().to_vec();
    let net = NetworkConfig::standard();
    let host = NullHost;
    apply_transaction_set(
        store,
        &txs,
        &apply_order,
        base_fee,
        ctx.close_time(),
        &ctx.config,
        &net,
        &host,
        [0u8; 32],
    )
    .unwrap()
}

#[test]
fn empty_set_only_advances_the_ledger() {
    let ctx = TestContext::new();
    let mut store = ctx.store_with_accounts(&[(1, 1_000_000_000, 10)]);
    let balance_before = ctx.balance_of(&store, &ctx.account(1));

    let net = NetworkConfig::standard();
    let host = NullHost;
    let result = apply_transaction_set(
        &mut store,
        &[],
        &[],
        100,
        ctx.close_time(),
        &ctx.config,
        &net,
        &host,
        [0u8; 32],
    )
    .unwrap();

    assert!(result.applied.is_empty());
    assert_eq!(store.header().ledger_seq, 100);
    assert_eq!(store.header().fee_pool, 0);
    assert_eq!(ctx.balance_of(&store, &ctx.account(1)), balance_before);
}

#[test]
fn two_accounts_no_surge() {
    let ctx = TestContext::new();
    let mut store = ctx.store_with_accounts(&[
        (1, 1_000_000_000, 42),
        (2, 1_000_000_000, 7),
        (3, 1_000_000_000, 1),
    ]);
    let a = ctx.account(1);
    let b = ctx.account(2);
    let dest = ctx.account(3);

    let mut set = TxSetFrame::new(Hash256::ZERO);
    // A: two operations, bid 200. B: one operation, bid 100.
    set.add_tx(ctx.frame(a.multi_payment_tx(&dest, 1_000, 2, 43, 200)));
    set.add_tx(ctx.frame(b.payment_tx(&dest, 1_000, 8, 100)));

    let base_fee = set.base_fee(store.header()).unwrap();
    assert_eq!(base_fee, 100);

    let result = close_with_set(&ctx, &mut store, &mut set);

    assert_eq!(result.applied.len(), 2);
    for applied in &result.applied {
        assert_eq!(
            applied.result.result.discriminant(),
            TransactionResultCode::TxSuccess
        );
    }
    assert_eq!(ctx.account_entry_of(&store, &a).seq_num.0, 43);
    assert_eq!(ctx.account_entry_of(&store, &b).seq_num.0, 8);
    // Everyone pays ops * base_fee: 200 + 100.
    assert_eq!(store.header().fee_pool, 300);
    assert_eq!(result.fees_collected, 300);
}

#[test]
fn surge_admits_only_the_highest_bid() {
    let ctx = TestContext::new();
    let mut store = ctx.store_with_accounts(&[
        (1, 1_000_000_000, 10),
        (2, 1_000_000_000, 20),
        (3, 1_000_000_000, 30),
        (4, 1_000_000_000, 1),
    ]);
    let bidders = [
        (ctx.account(1), 11, 100u32),
        (ctx.account(2), 21, 200),
        (ctx.account(3), 31, 300),
    ];
    let dest = ctx.account(4);

    let mut set = TxSetFrame::new(Hash256::ZERO);
    for (account, seq, bid) in &bidders {
        set.add_tx(ctx.frame(account.payment_tx(&dest, 1_000, *seq, *bid)));
    }

    // Capacity for a single operation: two bidders must be dropped.
    surge_pricing_filter(&mut set, 1, store.header().base_fee).unwrap();
    assert_eq!(set.size_txs(), 1);

    let mut header = store.header().clone();
    header.max_tx_set_size = 3;
    let base_fee = set.base_fee(&header).unwrap();
    // The lone accepted transaction bid 300 per op, and that is the fee.
    assert_eq!(base_fee, 300);

    let apply_order = set.apply_order().unwrap();
    let txs: Vec<TransactionFrame> = set.transactions().to_vec();
    let net = NetworkConfig::standard();
    let host = NullHost;
    let result = apply_transaction_set(
        &mut store,
        &txs,
        &apply_order,
        base_fee,
        ctx.close_time(),
        &ctx.config,
        &net,
        &host,
        [0u8; 32],
    )
    .unwrap();

    assert_eq!(result.applied.len(), 1);
    assert_eq!(result.applied[0].result.fee_charged, 300);
    assert_eq!(store.header().fee_pool, 300);

    // The losing bidders paid nothing and kept their sequence numbers.
    assert_eq!(ctx.balance_of(&store, &ctx.account(1)), 1_000_000_000);
    assert_eq!(ctx.account_entry_of(&store, &ctx.account(1)).seq_num.0, 10);
    assert_eq!(ctx.balance_of(&store, &ctx.account(2)), 1_000_000_000);
}

#[test]
fn bad_seq_cascade_never_reaches_apply() {
    let ctx = TestContext::new();
    let mut store = ctx.store_with_accounts(&[(1, 1_000_000_000, 5), (2, 1_000_000_000, 3)]);
    let alice = ctx.account(1);
    let bob = ctx.account(2);

    let mut set = TxSetFrame::new(Hash256::ZERO);
    set.add_tx(ctx.frame(alice.payment_tx(&bob, 100, 7, 100)));
    set.add_tx(ctx.frame(alice.payment_tx(&bob, 100, 8, 100)));

    let mut view = store.root_view();
    let trimmed = set.trim_invalid(&view.nest(), &ctx.ledger_context()).unwrap();
    view.discard();
    assert_eq!(trimmed.len(), 2);
    assert_eq!(set.size_txs(), 0);

    // Nothing left to apply; the account's sequence number is untouched.
    let result = close_with_set(&ctx, &mut store, &mut set);
    assert!(result.applied.is_empty());
    assert_eq!(ctx.account_entry_of(&store, &alice).seq_num.0, 5);
}

#[test]
fn failed_transaction_rolls_back_but_still_pays() {
    let ctx = TestContext::new();
    // Alice can cover fees, but the payment overshoots her balance.
    let mut store = ctx.store_with_accounts(&[(1, 11_000_000, 10), (2, 1_000_000_000, 3)]);
    let alice = ctx.account(1);
    let bob = ctx.account(2);

    let mut set = TxSetFrame::new(Hash256::ZERO);
    set.add_tx(ctx.frame(alice.payment_tx(&bob, 900_000_000, 11, 100)));

    let bob_before = ctx.balance_of(&store, &bob);
    let result = close_with_set(&ctx, &mut store, &mut set);

    let applied = &result.applied[0];
    assert!(matches!(
        applied.result.result,
        TransactionResultResult::TxFailed(_)
    ));
    // Rollback atomicity: no payment effects survive, only the fee.
    assert_eq!(ctx.balance_of(&store, &bob), bob_before);
    assert_eq!(ctx.balance_of(&store, &alice), 11_000_000 - 100);
    assert_eq!(store.header().fee_pool, 100);
    // The sequence number was still consumed.
    assert_eq!(ctx.account_entry_of(&store, &alice).seq_num.0, 11);
}

#[test]
fn fee_pool_grows_by_exactly_the_collected_fees() {
    let ctx = TestContext::new();
    let mut store = ctx.store_with_accounts(&[
        (1, 1_000_000_000, 10),
        (2, 1_000_000_000, 20),
        (3, 1_000_000_000, 1),
    ]);
    let alice = ctx.account(1);
    let bob = ctx.account(2);
    let dest = ctx.account(3);

    let mut set = TxSetFrame::new(Hash256::ZERO);
    set.add_tx(ctx.frame(alice.payment_tx(&dest, 5_000, 11, 150)));
    set.add_tx(ctx.frame(bob.payment_tx(&dest, 5_000, 21, 100)));

    let pool_before = store.header().fee_pool;
    let result = close_with_set(&ctx, &mut store, &mut set);

    assert_eq!(
        store.header().fee_pool - pool_before,
        result.fees_collected - result.refunds
    );
}

#[test]
fn applying_a_set_is_deterministic() {
    let ctx = TestContext::new();
    let accounts = &[
        (1u8, 1_000_000_000i64, 10i64),
        (2, 1_000_000_000, 20),
        (3, 1_000_000_000, 30),
        (4, 1_000_000_000, 1),
    ];
    let build_set = || {
        let mut set = TxSetFrame::new(Hash256::ZERO);
        let dest = ctx.account(4);
        set.add_tx(ctx.frame(ctx.account(1).payment_tx(&dest, 1_000, 11, 100)));
        set.add_tx(ctx.frame(ctx.account(2).payment_tx(&dest, 2_000, 21, 200)));
        set.add_tx(ctx.frame(ctx.account(3).payment_tx(&dest, 3_000, 31, 300)));
        set
    };

    let mut store_a = ctx.store_with_accounts(accounts);
    let mut store_b = ctx.store_with_accounts(accounts);
    let mut set_a = build_set();
    let mut set_b = build_set();

    let result_a = close_with_set(&ctx, &mut store_a, &mut set_a);
    let result_b = close_with_set(&ctx, &mut store_b, &mut set_b);

    assert_eq!(
        result_a
            .applied
            .iter()
            .map(|t| t.tx_index)
            .collect::<Vec<_>>(),
        result_b
            .applied
            .iter()
            .map(|t| t.tx_index)
            .collect::<Vec<_>>()
    );
    assert_eq!(store_a.header().fee_pool, store_b.header().fee_pool);
    assert_eq!(
        hayashi_ledger::header::header_hash(store_a.header()).unwrap(),
        hayashi_ledger::header::header_hash(store_b.header()).unwrap()
    );
}
