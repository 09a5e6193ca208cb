//! BumpSequence operation.

use hayashi_ledger::View;
use stellar_xdr::curr::{
    AccountId, BumpSequenceOp, BumpSequenceResult, OperationResult, OperationResultTr,
};

use crate::account;
use crate::validation::LedgerContext;
use crate::Result;

/// Moves the source account's sequence number forward to `bump_to`.
///
/// A target at or below the current number is a no-op success; sequence
/// numbers never move backwards.
pub(crate) fn apply(
    op: &BumpSequenceOp,
    source: &AccountId,
    view: &mut View<'_>,
    ctx: &LedgerContext,
) -> Result<OperationResult> {
    if op.bump_to.0 < 0 {
        return Ok(make_result(BumpSequenceResult::BadSeq));
    }

    let mut source_account = account::load_account(view, source)
        .ok_or_else(|| crate::TxError::UnexpectedState("bump-sequence source vanished".into()))?;

    if op.bump_to.0 > source_account.seq_num.0 {
        account::advance_sequence(
            &mut source_account,
            op.bump_to.0,
            ctx.sequence,
            ctx.close_time,
            ctx.protocol_version,
        );
        account::update_account(view, source_account)?;
    }

    Ok(make_result(BumpSequenceResult::Success))
}

fn make_result(result: BumpSequenceResult) -> OperationResult {
    OperationResult::OpInner(OperationResultTr::BumpSequence(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use stellar_xdr::curr::SequenceNumber;

    fn run(
        store: &mut hayashi_ledger::LedgerStore,
        ctx: &TestContext,
        source: &TestAccount,
        bump_to: i64,
    ) -> BumpSequenceResult {
        let op = BumpSequenceOp {
            bump_to: SequenceNumber(bump_to),
        };
        let mut view = store.root_view();
        let result = apply(&op, &source.account_id(), &mut view, &ctx.ledger_context()).unwrap();
        view.commit();
        match result {
            OperationResult::OpInner(OperationResultTr::BumpSequence(r)) => r,
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn bumps_forward() {
        let ctx = TestContext::new();
        let mut store = ctx.store_with_accounts(&[(1, 1_000_000_000, 10)]);
        let alice = ctx.account(1);

        assert!(matches!(
            run(&mut store, &ctx, &alice, 500),
            BumpSequenceResult::Success
        ));
        assert_eq!(ctx.account_entry_of(&store, &alice).seq_num.0, 500);
    }

    #[test]
    fn backwards_bump_is_a_noop() {
        let ctx = TestContext::new();
        let mut store = ctx.store_with_accounts(&[(1, 1_000_000_000, 10)]);
        let alice = ctx.account(1);

        assert!(matches!(
            run(&mut store, &ctx, &alice, 3),
            BumpSequenceResult::Success
        ));
        assert_eq!(ctx.account_entry_of(&store, &alice).seq_num.0, 10);
    }

    #[test]
    fn negative_target_is_bad_seq() {
        let ctx = TestContext::new();
        let mut store = ctx.store_with_accounts(&[(1, 1_000_000_000, 10)]);
        let alice = ctx.account(1);

        assert!(matches!(
            run(&mut store, &ctx, &alice, -1),
            BumpSequenceResult::BadSeq
        ));
    }
}
