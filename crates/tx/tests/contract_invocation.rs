//! Contract invocation through a full ledger close: footprint gathering,
//! lifetime checks, resource enforcement, write-back, erasures, and
//! refundable-fee accounting, with the execution engine scripted.

use hayashi_ledger::{LedgerStore, NetworkConfig};
use hayashi_tx::host::ttl_key_for;
use hayashi_tx::test_utils::*;
use hayashi_tx::{apply_transaction_set, HostOutput, TransactionFrame};
use stellar_xdr::curr::{
    ContractDataDurability, ContractDataEntry, ContractId, ExtensionPoint, Hash,
    InvokeHostFunctionResult, LedgerEntry, LedgerEntryData, LedgerEntryExt, LedgerKey,
    LedgerKeyContractData, Limits, OperationResult, OperationResultTr, ScAddress, ScVal,
    TransactionResultResult, TtlEntry, WriteXdr,
};

fn contract_address() -> ScAddress {
    ScAddress::Contract(ContractId(Hash([7u8; 32])))
}

fn data_key(id: u32, durability: ContractDataDurability) -> LedgerKey {
    LedgerKey::ContractData(LedgerKeyContractData {
        contract: contract_address(),
        key: ScVal::U32(id),
        durability,
    })
}

fn data_entry(id: u32, durability: ContractDataDurability, val: u32) -> LedgerEntry {
    LedgerEntry {
        last_modified_ledger_seq: 0,
        data: LedgerEntryData::ContractData(ContractDataEntry {
            ext: ExtensionPoint::V0,
            contract: contract_address(),
            key: ScVal::U32(id),
            durability,
            val: ScVal::U32(val),
        }),
        ext: LedgerEntryExt::V0,
    }
}

fn seed_contract_entry(
    store: &mut LedgerStore,
    id: u32,
    durability: ContractDataDurability,
    live_until: u32,
) {
    let entry = data_entry(id, durability, 42);
    store.insert_entry(entry).unwrap();
    let key = data_key(id, durability);
    let ttl_key = ttl_key_for(&key).unwrap();
    let key_hash = match &ttl_key {
        LedgerKey::Ttl(k) => k.key_hash.clone(),
        _ => unreachable!(),
    };
    store
        .insert_entry(LedgerEntry {
            last_modified_ledger_seq: 0,
            data: LedgerEntryData::Ttl(TtlEntry {
                key_hash,
                live_until_ledger_seq: live_until,
            }),
            ext: LedgerEntryExt::V0,
        })
        .unwrap();
}

fn close_single(
    ctx: &TestContext,
    store: &mut LedgerStore,
    frame: TransactionFrame,
    host: &dyn hayashi_tx::ContractHost,
) -> hayashi_tx::LedgerCloseResult {
    let net = NetworkConfig::standard();
    apply_transaction_set(
        store,
        std::slice::from_ref(&frame),
        &[0],
        100,
        ctx.close_time(),
        &ctx.config,
        &net,
        host,
        [0u8; 32],
    )
    .unwrap()
}

fn invoke_result(result: &hayashi_tx::LedgerCloseResult) -> &InvokeHostFunctionResult {
    let ops = match &result.applied[0].result.result {
        TransactionResultResult::TxFailed(ops) | TransactionResultResult::TxSuccess(ops) => ops,
        other => panic!("unexpected tx result: {:?}", other),
    };
    match ops.as_slice().first() {
        Some(OperationResult::OpInner(OperationResultTr::InvokeHostFunction(r))) => r,
        other => panic!("unexpected op result: {:?}", other),
    }
}

#[test]
fn instruction_cap_overrun_is_a_resource_failure() {
    let ctx = TestContext::new();
    let mut store = ctx.store_with_accounts(&[(1, 1_000_000_000, 10)]);
    let alice = ctx.account(1);
    seed_contract_entry(&mut store, 1, ContractDataDurability::Persistent, 500);

    let env = alice.invoke_tx(
        11,
        1_000_200,
        1_000_000,
        vec![data_key(1, ContractDataDurability::Persistent)],
        vec![],
        1_000_000,
        10_000,
        10_000,
    );

    // The host reports one instruction more than the declared budget.
    let host = ScriptedHost {
        output: HostOutput {
            success: false,
            cpu_instructions: 1_000_001,
            ..HostOutput::default()
        },
    };
    let result = close_single(&ctx, &mut store, ctx.frame(env), &host);

    assert!(matches!(
        invoke_result(&result),
        InvokeHostFunctionResult::ResourceLimitExceeded
    ));
    // The fee, including the whole resource fee, is retained.
    assert_eq!(result.refunds, 0);
    assert_eq!(store.header().fee_pool, 1_000_100);
    assert_eq!(
        ctx.balance_of(&store, &alice),
        1_000_000_000 - 1_000_100
    );
    // The footprint entry is untouched.
    assert!(store
        .get(&data_key(1, ContractDataDurability::Persistent))
        .is_some());
}

#[test]
fn dead_persistent_entry_fails_before_the_host_runs() {
    let ctx = TestContext::new();
    let mut store = ctx.store_with_accounts(&[(1, 1_000_000_000, 10)]);
    let alice = ctx.account(1);
    // The entry died one ledger before the one being built (seq 100).
    seed_contract_entry(&mut store, 1, ContractDataDurability::Persistent, 99);

    let env = alice.invoke_tx(
        11,
        10_200,
        10_000,
        vec![data_key(1, ContractDataDurability::Persistent)],
        vec![],
        1_000_000,
        10_000,
        10_000,
    );

    // NullHost panics when invoked, proving the failure happens first.
    let result = close_single(&ctx, &mut store, ctx.frame(env), &NullHost);

    assert!(matches!(
        invoke_result(&result),
        InvokeHostFunctionResult::EntryArchived
    ));
}

#[test]
fn dead_temporary_entry_reads_as_absent() {
    let ctx = TestContext::new();
    let mut store = ctx.store_with_accounts(&[(1, 1_000_000_000, 10)]);
    let alice = ctx.account(1);
    seed_contract_entry(&mut store, 1, ContractDataDurability::Temporary, 99);

    let env = alice.invoke_tx(
        11,
        10_200,
        10_000,
        vec![data_key(1, ContractDataDurability::Temporary)],
        vec![],
        1_000_000,
        10_000,
        10_000,
    );

    let host = ScriptedHost {
        output: HostOutput {
            success: true,
            result_value: ScVal::Void.to_xdr(Limits::none()).unwrap(),
            ..HostOutput::default()
        },
    };
    let result = close_single(&ctx, &mut store, ctx.frame(env), &host);

    assert!(matches!(
        invoke_result(&result),
        InvokeHostFunctionResult::Success(_)
    ));
}

#[test]
fn write_back_erasure_and_refund() {
    let ctx = TestContext::new();
    let mut store = ctx.store_with_accounts(&[(1, 1_000_000_000, 10)]);
    let alice = ctx.account(1);
    // Two read-write entries: the host rewrites the first and stays
    // silent about the second, which erases it.
    seed_contract_entry(&mut store, 1, ContractDataDurability::Persistent, 500);
    seed_contract_entry(&mut store, 2, ContractDataDurability::Persistent, 500);

    let rewritten = data_entry(1, ContractDataDurability::Persistent, 43);
    let host = ScriptedHost {
        output: HostOutput {
            success: true,
            modified_entries: vec![rewritten.to_xdr(Limits::none()).unwrap()],
            result_value: ScVal::Void.to_xdr(Limits::none()).unwrap(),
            rent_fee: 50,
            ..HostOutput::default()
        },
    };

    let env = alice.invoke_tx(
        11,
        1_200,
        1_000,
        vec![],
        vec![
            data_key(1, ContractDataDurability::Persistent),
            data_key(2, ContractDataDurability::Persistent),
        ],
        1_000_000,
        10_000,
        10_000,
    );
    let result = close_single(&ctx, &mut store, ctx.frame(env), &host);

    assert!(matches!(
        invoke_result(&result),
        InvokeHostFunctionResult::Success(_)
    ));

    // Write-back landed.
    let k1 = data_key(1, ContractDataDurability::Persistent);
    match &store.get(&k1).unwrap().data {
        LedgerEntryData::ContractData(cd) => assert!(matches!(cd.val, ScVal::U32(43))),
        other => panic!("unexpected entry: {:?}", other),
    }
    // The silent read-write key and its lifetime entry are gone.
    let k2 = data_key(2, ContractDataDurability::Persistent);
    assert!(store.get(&k2).is_none());
    assert!(store.get(&ttl_key_for(&k2).unwrap()).is_none());
    // The survivor keeps its lifetime entry.
    assert!(store.get(&ttl_key_for(&k1).unwrap()).is_some());

    // Refund: reserve 1000, consumed 50 rent + 1 for the 4-byte return
    // value at 200 per KB, rounded up.
    assert_eq!(result.refunds, 949);
    // Charged 1000 + min(200, 100) up front, minus the refund.
    assert_eq!(result.applied[0].result.fee_charged, 1_100 - 949);
    assert_eq!(store.header().fee_pool, 1_100 - 949);
    assert_eq!(
        ctx.balance_of(&store, &alice),
        1_000_000_000 - (1_100 - 949)
    );
}

#[test]
fn rent_beyond_the_reserve_is_insufficient_refundable_fee() {
    let ctx = TestContext::new();
    let mut store = ctx.store_with_accounts(&[(1, 1_000_000_000, 10)]);
    let alice = ctx.account(1);
    seed_contract_entry(&mut store, 1, ContractDataDurability::Persistent, 500);

    let host = ScriptedHost {
        output: HostOutput {
            success: true,
            result_value: ScVal::Void.to_xdr(Limits::none()).unwrap(),
            rent_fee: 5_000,
            ..HostOutput::default()
        },
    };

    let env = alice.invoke_tx(
        11,
        1_200,
        1_000,
        vec![data_key(1, ContractDataDurability::Persistent)],
        vec![],
        1_000_000,
        10_000,
        10_000,
    );
    let result = close_single(&ctx, &mut store, ctx.frame(env), &host);

    assert!(matches!(
        invoke_result(&result),
        InvokeHostFunctionResult::InsufficientRefundableFee
    ));
    // The reserve is forfeited along with the rest of the fee.
    assert_eq!(result.refunds, 0);
    assert_eq!(store.header().fee_pool, 1_100);
}

#[test]
fn declared_read_budget_bounds_footprint_bytes() {
    let ctx = TestContext::new();
    let mut store = ctx.store_with_accounts(&[(1, 1_000_000_000, 10)]);
    let alice = ctx.account(1);
    seed_contract_entry(&mut store, 1, ContractDataDurability::Persistent, 500);

    // A one-byte read budget cannot cover the entry.
    let env = alice.invoke_tx(
        11,
        1_200,
        1_000,
        vec![data_key(1, ContractDataDurability::Persistent)],
        vec![],
        1_000_000,
        1,
        10_000,
    );
    let result = close_single(&ctx, &mut store, ctx.frame(env), &NullHost);

    assert!(matches!(
        invoke_result(&result),
        InvokeHostFunctionResult::ResourceLimitExceeded
    ));
}

#[test]
#[should_panic(expected = "without its lifetime entry")]
fn created_contract_entry_without_lifetime_is_an_invariant_violation() {
    let ctx = TestContext::new();
    let mut store = ctx.store_with_accounts(&[(1, 1_000_000_000, 10)]);
    let alice = ctx.account(1);

    // The host claims to create a brand-new contract entry but ships no
    // lifetime entry alongside it.
    let fresh = data_entry(9, ContractDataDurability::Persistent, 1);
    let host = ScriptedHost {
        output: HostOutput {
            success: true,
            modified_entries: vec![fresh.to_xdr(Limits::none()).unwrap()],
            result_value: ScVal::Void.to_xdr(Limits::none()).unwrap(),
            ..HostOutput::default()
        },
    };

    let env = alice.invoke_tx(
        11,
        1_200,
        1_000,
        vec![],
        vec![data_key(9, ContractDataDurability::Persistent)],
        1_000_000,
        10_000,
        10_000,
    );
    let _ = close_single(&ctx, &mut store, ctx.frame(env), &host);
}
