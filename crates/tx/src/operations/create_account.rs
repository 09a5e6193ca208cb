//! CreateAccount operation.

use hayashi_ledger::{header, View};
use stellar_xdr::curr::{
    AccountEntry, AccountEntryExt, AccountId, CreateAccountOp, CreateAccountResult,
    OperationResult, OperationResultTr, String32, Thresholds,
};

use crate::account;
use crate::validation::LedgerContext;
use crate::Result;

/// Funds a new account from the source.
///
/// The new account starts at the sequence number `ledgerSeq << 32`, so
/// numbers from any earlier incarnation of the account can never recur.
pub(crate) fn apply(
    op: &CreateAccountOp,
    source: &AccountId,
    view: &mut View<'_>,
    ctx: &LedgerContext,
) -> Result<OperationResult> {
    if op.starting_balance < 0 {
        return Ok(make_result(CreateAccountResult::Malformed));
    }
    if account::load_account(view, &op.destination).is_some() {
        return Ok(make_result(CreateAccountResult::AlreadyExist));
    }

    let mut source_account = account::load_account(view, source)
        .ok_or_else(|| crate::TxError::UnexpectedState("create-account source vanished".into()))?;

    if op.starting_balance < header::min_balance(view.header(), 0) {
        return Ok(make_result(CreateAccountResult::LowReserve));
    }
    if header::available_balance(view.header(), &source_account) < op.starting_balance {
        return Ok(make_result(CreateAccountResult::Underfunded));
    }

    if !account::add_balance(&mut source_account, -op.starting_balance) {
        return Ok(make_result(CreateAccountResult::Underfunded));
    }
    account::update_account(view, source_account)?;

    let starting_seq = (ctx.sequence as i64) << 32;
    account::create_account(
        view,
        AccountEntry {
            account_id: op.destination.clone(),
            balance: op.starting_balance,
            seq_num: stellar_xdr::curr::SequenceNumber(starting_seq),
            num_sub_entries: 0,
            inflation_dest: None,
            flags: 0,
            home_domain: String32::default(),
            thresholds: Thresholds([1, 0, 0, 0]),
            signers: Default::default(),
            ext: AccountEntryExt::V0,
        },
    )?;

    Ok(make_result(CreateAccountResult::Success))
}

fn make_result(result: CreateAccountResult) -> OperationResult {
    OperationResult::OpInner(OperationResultTr::CreateAccount(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    fn run(
        ctx: &TestContext,
        store: &mut hayashi_ledger::LedgerStore,
        op: CreateAccountOp,
        source: &TestAccount,
    ) -> (CreateAccountResult, bool) {
        let mut view = store.root_view();
        let result = apply(&op, &source.account_id(), &mut view, &ctx.ledger_context()).unwrap();
        view.commit();
        match result {
            OperationResult::OpInner(OperationResultTr::CreateAccount(r)) => {
                let created = matches!(r, CreateAccountResult::Success);
                (r, created)
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn creates_funded_account() {
        let ctx = TestContext::new();
        let mut store = ctx.store_with_accounts(&[(1, 1_000_000_000, 1)]);
        let alice = ctx.account(1);
        let dest = ctx.account(5);

        let (result, created) = run(
            &ctx,
            &mut store,
            CreateAccountOp {
                destination: dest.account_id(),
                starting_balance: 50_000_000,
            },
            &alice,
        );
        assert!(created, "result: {:?}", result);

        let mut view = store.root_view();
        let new_account = crate::account::load_account(&view.nest(), &dest.account_id()).unwrap();
        assert_eq!(new_account.balance, 50_000_000);
        // Sequence starts in the current ledger's number space.
        assert_eq!(new_account.seq_num.0 >> 32, ctx.ledger_context().sequence as i64);
    }

    #[test]
    fn below_reserve_is_low_reserve() {
        let ctx = TestContext::new();
        let mut store = ctx.store_with_accounts(&[(1, 1_000_000_000, 1)]);
        let alice = ctx.account(1);
        let dest = ctx.account(5);

        let (result, _) = run(
            &ctx,
            &mut store,
            CreateAccountOp {
                destination: dest.account_id(),
                starting_balance: 1,
            },
            &alice,
        );
        assert!(matches!(result, CreateAccountResult::LowReserve));
    }

    #[test]
    fn existing_destination_rejected() {
        let ctx = TestContext::new();
        let mut store = ctx.store_with_accounts(&[(1, 1_000_000_000, 1), (2, 100_000_000, 1)]);
        let alice = ctx.account(1);
        let bob = ctx.account(2);

        let (result, _) = run(
            &ctx,
            &mut store,
            CreateAccountOp {
                destination: bob.account_id(),
                starting_balance: 50_000_000,
            },
            &alice,
        );
        assert!(matches!(result, CreateAccountResult::AlreadyExist));
    }

    #[test]
    fn poor_source_is_underfunded() {
        let ctx = TestContext::new();
        let mut store = ctx.store_with_accounts(&[(1, 20_000_000, 1)]);
        let alice = ctx.account(1);
        let dest = ctx.account(5);

        let (result, _) = run(
            &ctx,
            &mut store,
            CreateAccountOp {
                destination: dest.account_id(),
                starting_balance: 15_000_000,
            },
            &alice,
        );
        assert!(matches!(result, CreateAccountResult::Underfunded));
    }
}
