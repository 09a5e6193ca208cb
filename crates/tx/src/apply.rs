//! Transaction application.
//!
//! [`apply_transaction`] frames one transaction: re-validate against
//! post-fee balances in a nested view, run each operation in its own
//! sub-view, record results, and commit or roll back atomically.
//! [`apply_transaction_set`] drives a whole sealed set through a ledger
//! close: fees for every transaction first (hash order), then bodies
//! (apply order), then refunds, then a single commit of the root view.

use hayashi_common::{Config, Hash256};
use hayashi_crypto::{pre_auth_tx_key, sub_sha256};
use stellar_xdr::curr::{
    ContractEvent, DiagnosticEvent, TimePoint, TransactionResult, TransactionResultCode,
};
use tracing::{debug, info};

use hayashi_ledger::{header, LedgerStore, NetworkConfig, View};

use crate::account;
use crate::fee::{process_fee_seq_num, FeeOutcome};
use crate::frame::TransactionFrame;
use crate::host::{ContractHost, HostContext, TxEffects};
use crate::operations::{apply_operation, operation_succeeded};
use crate::result::MutableTxResult;
use crate::signature_checker::SignatureChecker;
use crate::validation::{common_valid, LedgerContext, ValidationOutcome};
use crate::{Result, TxError};

/// Everything an apply pass needs besides the ledger view.
pub struct ApplyContext<'a> {
    /// Ledger-level context for the ledger being built.
    pub ledger: LedgerContext,
    /// Node configuration.
    pub config: &'a Config,
    /// Contract-network limits.
    pub net: &'a NetworkConfig,
    /// The contract execution engine.
    pub host: &'a dyn ContractHost,
    /// Seed from which per-transaction PRNG seeds derive.
    pub base_prng_seed: [u8; 32],
}

impl<'a> ApplyContext<'a> {
    fn host_context(&self, tx_index: usize) -> HostContext<'a> {
        HostContext {
            config: self.config,
            net: self.net,
            host: self.host,
            prng_seed: sub_sha256(&self.base_prng_seed, tx_index as u32),
        }
    }
}

/// Applies one classic or fee-bump transaction inside a nested view.
///
/// `tx_result` must come from fee processing; its code tells this function
/// nothing (fee-level failures are filtered by the caller). Returns whether
/// the transaction's operations all succeeded.
pub fn apply_transaction(
    frame: &TransactionFrame,
    view: &mut View<'_>,
    actx: &ApplyContext<'_>,
    tx_index: usize,
    tx_result: &mut MutableTxResult,
    effects: &mut TxEffects,
) -> Result<bool> {
    if frame.is_fee_bump() {
        return crate::fee_bump::apply_fee_bump_transaction(
            frame, view, actx, tx_index, tx_result, effects,
        );
    }

    let contents_hash = frame.contents_hash()?;
    let mut checker = SignatureChecker::new(
        actx.ledger.protocol_version,
        contents_hash,
        frame.signatures(),
    );

    let mut tx_view = view.nest();

    // Fee collection may have drained balances since the set was
    // validated, so the common checks run again here.
    let outcome = common_valid(
        frame,
        &tx_view,
        &actx.ledger,
        true,
        0,
        0,
        0,
        &mut checker,
        tx_result,
    )?;
    if outcome != ValidationOutcome::FullyValid {
        tx_view.discard();
        return Ok(false);
    }

    let host_ctx = actx.host_context(tx_index);
    let mut op_results = Vec::with_capacity(frame.operations().len());
    let mut failed = false;

    for op in frame.operations() {
        let mut op_view = tx_view.nest();
        let result = apply_operation(
            op,
            frame,
            &mut op_view,
            &actx.ledger,
            &host_ctx,
            &mut checker,
            tx_result,
            effects,
        )?;
        let succeeded = operation_succeeded(&result);
        if succeeded {
            op_view.commit();
            op_results.push(result);
        } else {
            // The failing operation aborts the transaction; later
            // operations never run.
            op_view.discard();
            op_results.push(result);
            failed = true;
            break;
        }
    }

    if failed {
        tx_view.discard();
        tx_result.set_failed(op_results)?;
        return Ok(false);
    }

    if !checker.all_signatures_used() {
        tx_view.discard();
        tx_result.set_error(TransactionResultCode::TxBadAuthExtra);
        return Ok(false);
    }

    remove_one_time_signers(frame, &mut tx_view, &contents_hash)?;
    tx_view.commit();
    tx_result.set_success(op_results)?;
    Ok(true)
}

/// Drops one-time pre-authorization signers consumed by this transaction
/// from the transaction source and every operation source.
pub(crate) fn remove_one_time_signers(
    frame: &TransactionFrame,
    view: &mut View<'_>,
    contents_hash: &Hash256,
) -> Result<()> {
    let signer_key = pre_auth_tx_key(contents_hash);
    let mut targets = vec![frame.source_account_id()];
    for op in frame.operations() {
        if let Some(source) = &op.source_account {
            let id = crate::frame::muxed_to_account_id(source);
            if !targets.contains(&id) {
                targets.push(id);
            }
        }
    }
    for id in targets {
        if let Some(mut account) = account::load_account(view, &id) {
            if account::remove_signer(&mut account, &signer_key) {
                account::update_account(view, account)?;
            }
        }
    }
    Ok(())
}

/// One transaction's settled outcome.
#[derive(Debug)]
pub struct AppliedTransaction {
    /// Index into the hash-ordered transaction slice.
    pub tx_index: usize,
    /// The wire result.
    pub result: TransactionResult,
    /// Events from successful contract invocations.
    pub contract_events: Vec<ContractEvent>,
    /// Diagnostics, populated per configuration.
    pub diagnostic_events: Vec<DiagnosticEvent>,
}

/// Outcome of a whole ledger close.
#[derive(Debug)]
pub struct LedgerCloseResult {
    /// Settled transactions, in apply order.
    pub applied: Vec<AppliedTransaction>,
    /// Total fees collected before refunds.
    pub fees_collected: i64,
    /// Total refundable-fee refunds returned.
    pub refunds: i64,
}

/// Closes one ledger over a sealed transaction set.
///
/// `txs` must be in canonical hash order and already validated against the
/// store; `apply_order` holds indices into `txs`. The root view commits
/// exactly once, at the end; infrastructure errors abort the close with
/// nothing committed.
#[allow(clippy::too_many_arguments)]
pub fn apply_transaction_set(
    store: &mut LedgerStore,
    txs: &[TransactionFrame],
    apply_order: &[usize],
    base_fee: i64,
    close_time: u64,
    config: &Config,
    net: &NetworkConfig,
    host: &dyn ContractHost,
    base_prng_seed: [u8; 32],
) -> Result<LedgerCloseResult> {
    let previous_hash = header::header_hash(store.header()).map_err(TxError::from)?;

    let mut view = store.root_view();
    {
        let h = view.header_mut();
        h.previous_ledger_hash = previous_hash.into();
        h.ledger_seq += 1;
        h.scp_value.close_time = TimePoint(close_time);
    }

    let ctx = LedgerContext {
        sequence: view.header().ledger_seq,
        close_time,
        base_fee: view.header().base_fee,
        base_reserve: view.header().base_reserve,
        protocol_version: view.header().ledger_version,
        max_tx_set_size: view.header().max_tx_set_size,
        network_id: config.network_id(),
    };
    let actx = ApplyContext {
        ledger: ctx.clone(),
        config,
        net,
        host,
        base_prng_seed,
    };

    // Phase 1: every transaction pays before any transaction runs.
    let mut fees_collected = 0i64;
    let mut fee_outcomes: Vec<FeeOutcome> = Vec::with_capacity(txs.len());
    for frame in txs {
        let outcome = process_fee_seq_num(frame, &mut view, &ctx, Some(base_fee))?;
        fees_collected += outcome.fee_charged;
        fee_outcomes.push(outcome);
    }

    // Phase 2: bodies, in apply order.
    let mut applied = Vec::with_capacity(apply_order.len());
    let mut refunds = 0i64;
    for &tx_index in apply_order {
        let frame = &txs[tx_index];
        let FeeOutcome {
            fee_charged,
            tx_result,
        } = std::mem::replace(
            &mut fee_outcomes[tx_index],
            FeeOutcome {
                fee_charged: 0,
                tx_result: MutableTxResult::new(0),
            },
        );
        let mut tx_result = tx_result;
        let mut effects = TxEffects::default();

        // A fee-level failure (couldn't pay in full) skips the body; the
        // partial fee stays collected.
        let should_apply = tx_result.result_code() == TransactionResultCode::TxSuccess;
        let succeeded = if should_apply {
            apply_transaction(frame, &mut view, &actx, tx_index, &mut tx_result, &mut effects)?
        } else {
            false
        };

        // Unused refundable reserve flows back to the fee source, but only
        // for transactions that actually applied.
        if succeeded {
            let refund = tx_result.refundable_fee().map(|t| t.refund()).unwrap_or(0);
            if refund > 0 {
                let fee_source_id = frame.fee_source_account_id();
                let mut fee_source = account::load_account(&view, &fee_source_id)
                    .ok_or_else(|| {
                        TxError::UnexpectedState("fee source vanished before refund".into())
                    })?;
                if !account::add_balance(&mut fee_source, refund) {
                    return Err(TxError::Internal("refund overflowed fee source".into()));
                }
                account::update_account(&mut view, fee_source)?;
                view.header_mut().fee_pool -= refund;
                tx_result.set_fee_charged(fee_charged - refund);
                refunds += refund;
            }
        }

        debug!(
            ledger_seq = ctx.sequence,
            tx_index,
            success = succeeded,
            fee = tx_result.fee_charged(),
            code = ?tx_result.result_code(),
            "applied transaction"
        );

        applied.push(AppliedTransaction {
            tx_index,
            result: tx_result.into_xdr(),
            contract_events: effects.contract_events,
            diagnostic_events: effects.diagnostic_events,
        });
    }

    view.commit();
    info!(
        ledger_seq = store.header().ledger_seq,
        txs = txs.len(),
        fees = fees_collected,
        refunds,
        "closed ledger"
    );

    Ok(LedgerCloseResult {
        applied,
        fees_collected,
        refunds,
    })
}
