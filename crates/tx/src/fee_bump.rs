//! Fee-bump application.
//!
//! A fee-bump envelope composes a fee source around a classic transaction.
//! Apply runs in two phases: first the fee source's one-time signer is
//! removed in its own committed view (the signer is consumed even when the
//! wrapped transaction fails), then the wrapped transaction applies with
//! refunds redirected to the fee-bump's fee source. The outer result wraps
//! the inner result pair; a fee-bump that reached apply reports
//! `TxFeeBumpInnerSuccess` and the pair carries the inner verdict.

use hayashi_crypto::pre_auth_tx_key;
use stellar_xdr::curr::TransactionResultResult;

use hayashi_ledger::View;

use crate::account;
use crate::apply::{apply_transaction, ApplyContext};
use crate::frame::TransactionFrame;
use crate::host::TxEffects;
use crate::result::MutableTxResult;
use crate::validation::inner_result_pair;
use crate::{Result, TxError};

/// Applies a fee-bump transaction.
///
/// Returns whether the wrapped transaction's operations succeeded.
pub(crate) fn apply_fee_bump_transaction(
    frame: &TransactionFrame,
    view: &mut View<'_>,
    actx: &ApplyContext<'_>,
    tx_index: usize,
    tx_result: &mut MutableTxResult,
    effects: &mut TxEffects,
) -> Result<bool> {
    // Phase one: consume the fee source's one-time signer, committed
    // regardless of what the wrapped transaction does next.
    {
        let mut signer_view = view.nest();
        let signer_key = pre_auth_tx_key(&frame.contents_hash()?);
        if let Some(mut fee_source) =
            account::load_account(&signer_view, &frame.fee_source_account_id())
        {
            if account::remove_signer(&mut fee_source, &signer_key) {
                account::update_account(&mut signer_view, fee_source)?;
            }
        }
        signer_view.commit();
    }

    // Phase two: delegate to the wrapped transaction. The refundable
    // tracker moves onto the inner result for the duration so contract
    // invocations meter against it, then moves back so refund processing
    // credits the fee-bump's fee source.
    let inner = frame
        .inner_frame()
        .ok_or_else(|| TxError::Internal("fee bump without inner tx".into()))?;

    let mut inner_result = MutableTxResult::new(tx_result.fee_charged());
    if let Some(tracker) = tx_result.refundable_fee() {
        inner_result.initialize_refundable_fee(tracker.max_refundable());
    }

    let succeeded = apply_transaction(&inner, view, actx, tx_index, &mut inner_result, effects)?;

    tx_result.adopt_refundable_tracker(&inner_result);
    let fee_charged = inner_result.fee_charged();
    let pair = inner_result_pair(&inner, inner_result)?;
    tx_result.set_result(TransactionResultResult::TxFeeBumpInnerSuccess(pair));
    tx_result.set_fee_charged(fee_charged);

    Ok(succeeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use stellar_xdr::curr::{
        InnerTransactionResultResult, TransactionResultCode, TransactionResultResult,
    };

    #[test]
    fn fee_bump_over_failing_inner_keeps_fee() {
        let ctx = TestContext::new();
        // Alice can pay fees but not the payment itself.
        let mut store = ctx.store_with_accounts(&[
            (1, 10_000_000 + 500, 10),
            (2, 500_000_000, 3),
            (3, 800_000_000, 7),
        ]);
        let alice = ctx.account(1);
        let bob = ctx.account(2);
        let carol = ctx.account(3);
        let inner = alice.payment_tx(&bob, 400_000_000, 11, 100);
        let frame = ctx.frame(carol.fee_bump_tx(&inner, 400));

        let host = NullHost;
        let net = hayashi_ledger::NetworkConfig::standard();
        let result = crate::apply::apply_transaction_set(
            &mut store,
            std::slice::from_ref(&frame),
            &[0],
            100,
            ctx.close_time(),
            &ctx.config,
            &net,
            &host,
            [0u8; 32],
        )
        .unwrap();

        let applied = &result.applied[0];
        // The wrapper applied; the wrapped payment failed underfunded.
        match &applied.result.result {
            TransactionResultResult::TxFeeBumpInnerSuccess(pair) => {
                assert!(matches!(
                    pair.result.result,
                    InnerTransactionResultResult::TxFailed(_)
                ));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        // Carol paid for two operations; no refund path for classic txs.
        assert_eq!(applied.result.fee_charged, 200);
        assert_eq!(ctx.balance_of(&store, &carol), 800_000_000 - 200);
        // Alice paid nothing, kept her balance, but burned the sequence.
        assert_eq!(ctx.balance_of(&store, &alice), 10_000_000 + 500);
        assert_eq!(ctx.account_entry_of(&store, &alice).seq_num.0, 11);
    }

    #[test]
    fn fee_bump_over_succeeding_inner() {
        let ctx = TestContext::new();
        let mut store = ctx.store_with_accounts(&[
            (1, 100_000_000, 10),
            (2, 500_000_000, 3),
            (3, 800_000_000, 7),
        ]);
        let alice = ctx.account(1);
        let bob = ctx.account(2);
        let carol = ctx.account(3);
        let inner = alice.payment_tx(&bob, 1_000_000, 11, 100);
        let frame = ctx.frame(carol.fee_bump_tx(&inner, 400));

        let host = NullHost;
        let net = hayashi_ledger::NetworkConfig::standard();
        let result = crate::apply::apply_transaction_set(
            &mut store,
            std::slice::from_ref(&frame),
            &[0],
            100,
            ctx.close_time(),
            &ctx.config,
            &net,
            &host,
            [0u8; 32],
        )
        .unwrap();

        let applied = &result.applied[0];
        assert_eq!(
            applied.result.result.discriminant(),
            TransactionResultCode::TxFeeBumpInnerSuccess
        );
        assert_eq!(ctx.balance_of(&store, &bob), 500_000_000 + 1_000_000);
        assert_eq!(ctx.balance_of(&store, &alice), 100_000_000 - 1_000_000);
    }
}
