//! Fee and sequence-number processing.
//!
//! Fees are collected for *every* transaction of a set, in hash order, on
//! the outermost view, before any transaction body runs. A transaction
//! that later fails has therefore already paid. The reserve is deliberately
//! not enforced here; the balance may dip below it and the re-validation
//! step at apply time catches accounts that can no longer stand behind
//! their transactions.

use stellar_xdr::curr::TransactionResultCode;

use hayashi_ledger::View;

use crate::account;
use crate::frame::TransactionFrame;
use crate::result::MutableTxResult;
use crate::validation::LedgerContext;
use crate::{Result, TxError};

/// Outcome of fee processing for one transaction.
#[derive(Debug)]
pub struct FeeOutcome {
    /// What was actually deducted (capped at the fee source's balance).
    pub fee_charged: i64,
    /// The result record seeded for the apply phase.
    pub tx_result: MutableTxResult,
}

/// Charges a transaction's fee and advances its source sequence number.
///
/// Must run on the outermost view: the fee pool lives in the header and
/// the header is only writable there.
pub fn process_fee_seq_num(
    frame: &TransactionFrame,
    view: &mut View<'_>,
    ctx: &LedgerContext,
    base_fee: Option<i64>,
) -> Result<FeeOutcome> {
    let fee_source_id = frame.fee_source_account_id();
    let computed_fee = frame.fee(base_fee, true);

    let mut fee_source = account::load_account(view, &fee_source_id).ok_or_else(|| {
        // The set was validated against this very ledger; a missing fee
        // source here means the store diverged.
        TxError::UnexpectedState("fee source missing during fee processing".into())
    })?;

    let mut fee_charged = computed_fee;
    if fee_charged > 0 {
        fee_charged = std::cmp::min(fee_charged, fee_source.balance);
        // The balance may drop below the reserve here; apply-time
        // re-validation settles whether the transaction still stands.
        fee_source.balance -= fee_charged;
        account::update_account(view, fee_source)?;
        view.header_mut().fee_pool += fee_charged;
    }

    let mut tx_result = MutableTxResult::new(fee_charged);
    if frame.is_contract_tx() {
        tx_result.initialize_refundable_fee(frame.declared_resource_fee());
    }
    if fee_charged < computed_fee {
        tx_result.set_error(TransactionResultCode::TxInsufficientBalance);
    }

    // The sequence number advances even for transactions that will fail
    // later; only fully invalid transactions never reach this point.
    let source_id = frame.source_account_id();
    let mut source = account::load_account(view, &source_id).ok_or_else(|| {
        TxError::UnexpectedState("source missing during sequence processing".into())
    })?;
    account::advance_sequence(
        &mut source,
        frame.sequence_number(),
        ctx.sequence,
        ctx.close_time,
        ctx.protocol_version,
    );
    account::update_account(view, source)?;

    Ok(FeeOutcome {
        fee_charged,
        tx_result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn fee_moves_to_fee_pool_and_seq_advances() {
        let ctx = TestContext::new();
        let mut store = ctx.store_with_accounts(&[(1, 1_000_000_000, 10), (2, 500_000_000, 3)]);
        let alice = ctx.account(1);
        let bob = ctx.account(2);
        let frame = ctx.frame(alice.payment_tx(&bob, 1_000, 11, 250));

        let mut view = store.root_view();
        let outcome =
            process_fee_seq_num(&frame, &mut view, &ctx.ledger_context(), Some(100)).unwrap();
        view.commit();

        // One op at an effective base fee of 100.
        assert_eq!(outcome.fee_charged, 100);
        assert_eq!(store.header().fee_pool, 100);
        assert_eq!(ctx.balance_of(&store, &alice), 1_000_000_000 - 100);
        assert_eq!(ctx.account_entry_of(&store, &alice).seq_num.0, 11);
    }

    #[test]
    fn fee_capped_at_balance() {
        let ctx = TestContext::new();
        let mut store = ctx.store_with_accounts(&[(1, 60, 10), (2, 500_000_000, 3)]);
        let alice = ctx.account(1);
        let bob = ctx.account(2);
        let frame = ctx.frame(alice.payment_tx(&bob, 1_000, 11, 250));

        let mut view = store.root_view();
        let outcome =
            process_fee_seq_num(&frame, &mut view, &ctx.ledger_context(), Some(100)).unwrap();
        view.commit();

        assert_eq!(outcome.fee_charged, 60);
        assert_eq!(ctx.balance_of(&store, &alice), 0);
        assert_eq!(store.header().fee_pool, 60);
        assert_eq!(
            outcome.tx_result.result_code(),
            TransactionResultCode::TxInsufficientBalance
        );
        // Sequence still advances for a post-auth failure.
        assert_eq!(ctx.account_entry_of(&store, &alice).seq_num.0, 11);
    }

    #[test]
    fn fee_bump_charges_the_fee_source() {
        let ctx = TestContext::new();
        let mut store = ctx.store_with_accounts(&[
            (1, 1_000_000_000, 10),
            (2, 500_000_000, 3),
            (3, 800_000_000, 7),
        ]);
        let alice = ctx.account(1);
        let bob = ctx.account(2);
        let carol = ctx.account(3);
        let inner = alice.payment_tx(&bob, 1_000, 11, 100);
        let frame = ctx.frame(carol.fee_bump_tx(&inner, 400));

        let mut view = store.root_view();
        let outcome =
            process_fee_seq_num(&frame, &mut view, &ctx.ledger_context(), Some(100)).unwrap();
        view.commit();

        // Two charged operations (inner payment + wrapper) at base fee 100.
        assert_eq!(outcome.fee_charged, 200);
        assert_eq!(ctx.balance_of(&store, &carol), 800_000_000 - 200);
        // The inner source pays nothing but consumes its sequence number.
        assert_eq!(ctx.balance_of(&store, &alice), 1_000_000_000);
        assert_eq!(ctx.account_entry_of(&store, &alice).seq_num.0, 11);
        assert_eq!(ctx.account_entry_of(&store, &carol).seq_num.0, 7);
    }
}
