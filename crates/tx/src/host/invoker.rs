//! Contract invocation around the host call.
//!
//! The invoker walks `Gathering → Invoking → WritingBack → Finalizing`;
//! any failure aborts the invocation with a result code and forfeits the
//! transaction's refundable reserve. All view mutations happen in the
//! caller's nested view, so an abort needs no cleanup here.

use hayashi_common::math::{big_divide_saturating, Rounding};
use hayashi_common::Hash256;
use hayashi_crypto::sha256;
use stellar_xdr::curr::{
    AccountId, ContractDataDurability, ContractEvent, ContractEventBody, ContractEventType,
    ContractEventV0, DiagnosticEvent, ExtensionPoint, InvokeHostFunctionOp,
    InvokeHostFunctionResult, InvokeHostFunctionSuccessPreImage, LedgerEntry, LedgerEntryData,
    LedgerKey, LedgerKeyTtl, Limits, OperationResult, OperationResultTr, ReadXdr, ScSymbol, ScVal,
    SorobanResources, WriteXdr,
};

use hayashi_ledger::View;

use crate::frame::TransactionFrame;
use crate::host::{HostContext, HostInvocation, HostOutput, InvokerPhase, LedgerInfo, TxEffects};
use crate::result::MutableTxResult;
use crate::validation::LedgerContext;
use crate::{Result, TxError};

/// Byte-level metering accumulated around one invocation.
#[derive(Debug, Default)]
struct HostFunctionMetrics {
    read_entry: u32,
    write_entry: u32,
    ledger_read_byte: u32,
    ledger_write_byte: u32,
    emit_event: u32,
    emit_event_byte: u32,
    cpu_insn: u64,
    mem_byte: u64,
    invoke_time_nsecs: u64,
    success: bool,
}

impl HostFunctionMetrics {
    fn note_read_entry(&mut self, entry_size: u32) {
        self.read_entry += 1;
        self.ledger_read_byte = self.ledger_read_byte.saturating_add(entry_size);
    }

    fn note_write_entry(&mut self, entry_size: u32) {
        self.write_entry += 1;
        self.ledger_write_byte = self.ledger_write_byte.saturating_add(entry_size);
    }
}

/// Applies an InvokeHostFunction operation.
///
/// `tx_result` supplies the refundable-fee tracker armed during fee
/// processing; `effects` receives contract and diagnostic events.
#[allow(clippy::too_many_arguments)]
pub fn invoke_host_function(
    op: &InvokeHostFunctionOp,
    frame: &TransactionFrame,
    source: &AccountId,
    view: &mut View<'_>,
    ctx: &LedgerContext,
    host_ctx: &HostContext<'_>,
    tx_result: &mut MutableTxResult,
    effects: &mut TxEffects,
) -> Result<OperationResult> {
    let Some(soroban_data) = frame.soroban_data().cloned() else {
        return Ok(make_result(InvokeHostFunctionResult::Malformed));
    };
    let resources = &soroban_data.resources;
    let mut metrics = HostFunctionMetrics::default();
    let mut phase = InvokerPhase::Gathering;
    let advance = |from: &mut InvokerPhase, to: InvokerPhase| {
        tracing::trace!(?from, ?to, "host invoker phase");
        *from = to;
    };

    // ---- Gathering -------------------------------------------------------
    let mut entry_bufs: Vec<Vec<u8>> = Vec::new();
    let mut ttl_bufs: Vec<Vec<u8>> = Vec::new();

    let footprint_keys = resources
        .footprint
        .read_only
        .iter()
        .chain(resources.footprint.read_write.iter());
    for key in footprint_keys {
        let mut entry_size = 0u32;
        if let Some(entry) = view.load_without_record(key) {
            let mut include_entry = true;
            let mut ttl_buf: Vec<u8> = Vec::new();

            if is_contract_entry(key) {
                let ttl_key = ttl_key_for(key)?;
                let ttl_entry = view.load_without_record(&ttl_key).ok_or_else(|| {
                    TxError::Internal("contract entry without lifetime entry".into())
                })?;
                let live_until = ttl_live_until(&ttl_entry)?;
                if live_until < ctx.sequence {
                    if is_temporary_entry(key) {
                        // A dead temporary entry reads as absent.
                        include_entry = false;
                    } else {
                        advance(&mut phase, InvokerPhase::Aborted);
                        emit_metrics_events(host_ctx, &metrics, effects, false);
                        forfeit_reserve(tx_result);
                        return Ok(make_result(InvokeHostFunctionResult::EntryArchived));
                    }
                }
                ttl_buf = ttl_entry.to_xdr(Limits::none())?;
            }

            if include_entry {
                let entry_buf = entry.to_xdr(Limits::none())?;
                entry_size = (entry_buf.len() + ttl_buf.len()) as u32;
                entry_bufs.push(entry_buf);
                ttl_bufs.push(ttl_buf);
            }
        }
        metrics.note_read_entry(entry_size);

        if resources.disk_read_bytes < metrics.ledger_read_byte {
            advance(&mut phase, InvokerPhase::Aborted);
            emit_metrics_events(host_ctx, &metrics, effects, false);
            forfeit_reserve(tx_result);
            return Ok(make_result(InvokeHostFunctionResult::ResourceLimitExceeded));
        }
    }

    // ---- Invoking --------------------------------------------------------
    advance(&mut phase, InvokerPhase::Invoking);
    let invocation = build_invocation(
        op,
        source,
        ctx,
        host_ctx,
        resources,
        entry_bufs,
        ttl_bufs,
    )?;
    let out = host_ctx.host.invoke(&invocation);

    metrics.cpu_insn = out.cpu_instructions;
    metrics.mem_byte = out.memory_bytes;
    metrics.invoke_time_nsecs = out.invoke_time_nsecs;

    if !out.success {
        advance(&mut phase, InvokerPhase::Aborted);
        decode_diagnostics(&out, effects)?;
        emit_metrics_events(host_ctx, &metrics, effects, false);
        forfeit_reserve(tx_result);
        let code = if (resources.instructions as u64) < out.cpu_instructions {
            InvokeHostFunctionResult::ResourceLimitExceeded
        } else if host_ctx.net.tx_memory_limit < out.memory_bytes {
            InvokeHostFunctionResult::ResourceLimitExceeded
        } else {
            InvokeHostFunctionResult::Trapped
        };
        return Ok(make_result(code));
    }

    // ---- WritingBack -----------------------------------------------------
    advance(&mut phase, InvokerPhase::WritingBack);
    let mut created_and_modified: Vec<LedgerKey> = Vec::new();
    let mut created: Vec<LedgerKey> = Vec::new();

    for buf in &out.modified_entries {
        let entry = LedgerEntry::from_xdr(buf.as_slice(), Limits::none())?;
        if !entry_within_size_caps(&entry, buf.len(), host_ctx) {
            advance(&mut phase, InvokerPhase::Aborted);
            emit_metrics_events(host_ctx, &metrics, effects, false);
            forfeit_reserve(tx_result);
            return Ok(make_result(InvokeHostFunctionResult::ResourceLimitExceeded));
        }

        let key = hayashi_ledger::entry_key(&entry).map_err(TxError::from)?;
        created_and_modified.push(key.clone());

        // Lifetime-entry writes are paid out of the refundable reserve,
        // not the declared write budget.
        if !matches!(key, LedgerKey::Ttl(_)) {
            metrics.note_write_entry(buf.len() as u32);
            if resources.write_bytes < metrics.ledger_write_byte {
                advance(&mut phase, InvokerPhase::Aborted);
                emit_metrics_events(host_ctx, &metrics, effects, false);
                forfeit_reserve(tx_result);
                return Ok(make_result(InvokeHostFunctionResult::ResourceLimitExceeded));
            }
        }

        if view.load(&key).is_some() {
            view.update(entry)?;
        } else {
            view.create(entry)?;
            created.push(key);
        }
    }

    // Every created contract entry must arrive with its lifetime entry in
    // the same batch.
    for key in &created {
        if is_contract_entry(key) {
            let ttl_key = ttl_key_for(key)?;
            assert!(
                created.contains(&ttl_key),
                "host created a contract entry without its lifetime entry"
            );
        }
    }

    // Read-write keys the host did not return are erasures.
    for key in resources.footprint.read_write.iter() {
        if created_and_modified.contains(key) {
            continue;
        }
        if view.load(key).is_some() {
            view.erase(key)?;
            if is_contract_entry(key) {
                let ttl_key = ttl_key_for(key)?;
                if view.load(&ttl_key).is_some() {
                    view.erase(&ttl_key)?;
                }
            }
        }
    }

    // ---- Finalizing ------------------------------------------------------
    advance(&mut phase, InvokerPhase::Finalizing);
    let mut events: Vec<ContractEvent> = Vec::with_capacity(out.contract_events.len());
    for buf in &out.contract_events {
        metrics.emit_event += 1;
        metrics.emit_event_byte = metrics.emit_event_byte.saturating_add(buf.len() as u32);
        if host_ctx.net.tx_max_contract_events_size_bytes < metrics.emit_event_byte {
            advance(&mut phase, InvokerPhase::Aborted);
            emit_metrics_events(host_ctx, &metrics, effects, false);
            forfeit_reserve(tx_result);
            return Ok(make_result(InvokeHostFunctionResult::ResourceLimitExceeded));
        }
        events.push(ContractEvent::from_xdr(buf.as_slice(), Limits::none())?);
    }

    decode_diagnostics(&out, effects)?;

    // The return value counts against the event budget as well.
    metrics.emit_event_byte = metrics
        .emit_event_byte
        .saturating_add(out.result_value.len() as u32);
    if host_ctx.net.tx_max_contract_events_size_bytes < metrics.emit_event_byte {
        advance(&mut phase, InvokerPhase::Aborted);
        emit_metrics_events(host_ctx, &metrics, effects, false);
        forfeit_reserve(tx_result);
        return Ok(make_result(InvokeHostFunctionResult::ResourceLimitExceeded));
    }

    let event_fee = big_divide_saturating(
        metrics.emit_event_byte as i64,
        host_ctx.net.fee_per_contract_event_1kb,
        1024,
        Rounding::Up,
    );
    let tracker = tx_result
        .refundable_fee_mut()
        .ok_or_else(|| TxError::Internal("contract tx without refundable fee tracker".into()))?;
    if !tracker.consume(out.rent_fee, event_fee) {
        advance(&mut phase, InvokerPhase::Aborted);
        emit_metrics_events(host_ctx, &metrics, effects, false);
        forfeit_reserve(tx_result);
        return Ok(make_result(
            InvokeHostFunctionResult::InsufficientRefundableFee,
        ));
    }

    let return_value = ScVal::from_xdr(out.result_value.as_slice(), Limits::none())?;
    let preimage = InvokeHostFunctionSuccessPreImage {
        return_value: return_value.clone(),
        events: events
            .clone()
            .try_into()
            .map_err(|_| TxError::Internal("event vector too long".into()))?,
    };
    let success_hash = Hash256::hash_xdr(&preimage).map_err(TxError::from)?;

    metrics.success = true;
    emit_metrics_events(host_ctx, &metrics, effects, true);
    effects.contract_events.extend(events);
    effects.return_value = Some(return_value);
    debug_assert_eq!(phase, InvokerPhase::Finalizing);

    Ok(make_result(InvokeHostFunctionResult::Success(
        success_hash.into(),
    )))
}

fn build_invocation(
    op: &InvokeHostFunctionOp,
    source: &AccountId,
    ctx: &LedgerContext,
    host_ctx: &HostContext<'_>,
    resources: &SorobanResources,
    ledger_entries: Vec<Vec<u8>>,
    ttl_entries: Vec<Vec<u8>>,
) -> Result<HostInvocation> {
    let mut auth_entries = Vec::with_capacity(op.auth.len());
    for auth in op.auth.iter() {
        auth_entries.push(auth.to_xdr(Limits::none())?);
    }
    Ok(HostInvocation {
        protocol_version: host_ctx.config.current_ledger_protocol,
        instruction_budget: resources.instructions,
        enable_diagnostics: host_ctx.config.enable_diagnostic_events,
        host_function: op.host_function.to_xdr(Limits::none())?,
        resources: resources.to_xdr(Limits::none())?,
        source_account: source.to_xdr(Limits::none())?,
        auth_entries,
        ledger_info: LedgerInfo {
            protocol_version: ctx.protocol_version,
            sequence_number: ctx.sequence,
            timestamp: ctx.close_time,
            base_reserve: ctx.base_reserve,
            memory_limit: host_ctx.net.tx_memory_limit,
            min_temp_entry_ttl: host_ctx.net.min_temp_entry_ttl,
            min_persistent_entry_ttl: host_ctx.net.min_persistent_entry_ttl,
            max_entry_ttl: host_ctx.net.max_entry_ttl,
            network_id: ctx.network_id.0 .0,
            cpu_cost_params: host_ctx.net.cpu_cost_params.to_xdr(Limits::none())?,
            mem_cost_params: host_ctx.net.mem_cost_params.to_xdr(Limits::none())?,
        },
        ledger_entries,
        ttl_entries,
        base_prng_seed: host_ctx.prng_seed.0,
        rent_config: host_ctx.net.rent.clone(),
    })
}

fn entry_within_size_caps(entry: &LedgerEntry, entry_size: usize, host_ctx: &HostContext<'_>) -> bool {
    match &entry.data {
        LedgerEntryData::ContractCode(code) => {
            code.code.len() as u32 <= host_ctx.net.max_contract_size_bytes
        }
        LedgerEntryData::ContractData(_) => {
            entry_size as u32 <= host_ctx.net.max_contract_data_entry_size_bytes
        }
        _ => true,
    }
}

/// Whether a key addresses a contract entry that carries a lifetime.
fn is_contract_entry(key: &LedgerKey) -> bool {
    matches!(
        key,
        LedgerKey::ContractData(_) | LedgerKey::ContractCode(_)
    )
}

fn is_temporary_entry(key: &LedgerKey) -> bool {
    matches!(
        key,
        LedgerKey::ContractData(k) if k.durability == ContractDataDurability::Temporary
    )
}

/// The lifetime entry's key: the hash of the guarded key's serialization.
pub fn ttl_key_for(key: &LedgerKey) -> Result<LedgerKey> {
    let bytes = key.to_xdr(Limits::none())?;
    Ok(LedgerKey::Ttl(LedgerKeyTtl {
        key_hash: sha256(&bytes).into(),
    }))
}

fn ttl_live_until(entry: &LedgerEntry) -> Result<u32> {
    match &entry.data {
        LedgerEntryData::Ttl(ttl) => Ok(ttl.live_until_ledger_seq),
        _ => Err(TxError::Internal("lifetime key addressed non-ttl entry".into())),
    }
}

fn forfeit_reserve(tx_result: &mut MutableTxResult) {
    if let Some(tracker) = tx_result.refundable_fee_mut() {
        tracker.forfeit();
    }
}

fn decode_diagnostics(out: &HostOutput, effects: &mut TxEffects) -> Result<()> {
    for buf in &out.diagnostic_events {
        effects
            .diagnostic_events
            .push(DiagnosticEvent::from_xdr(buf.as_slice(), Limits::none())?);
    }
    Ok(())
}

/// Attaches per-invocation metering as diagnostic events.
fn emit_metrics_events(
    host_ctx: &HostContext<'_>,
    metrics: &HostFunctionMetrics,
    effects: &mut TxEffects,
    success: bool,
) {
    if !host_ctx.config.enable_diagnostic_events {
        return;
    }
    let counters: [(&str, u64); 8] = [
        ("read_entry", metrics.read_entry as u64),
        ("write_entry", metrics.write_entry as u64),
        ("ledger_read_byte", metrics.ledger_read_byte as u64),
        ("ledger_write_byte", metrics.ledger_write_byte as u64),
        ("emit_event", metrics.emit_event as u64),
        ("emit_event_byte", metrics.emit_event_byte as u64),
        ("cpu_insn", metrics.cpu_insn),
        ("mem_byte", metrics.mem_byte),
    ];
    for (topic, value) in counters {
        effects
            .diagnostic_events
            .push(metrics_event(success, topic, value));
    }
    effects.diagnostic_events.push(metrics_event(
        success,
        "invoke_time_nsecs",
        metrics.invoke_time_nsecs,
    ));
}

fn metrics_event(success: bool, topic: &str, value: u64) -> DiagnosticEvent {
    let topics: Vec<ScVal> = vec![
        ScVal::Symbol(ScSymbol(
            b"core_metrics".to_vec().try_into().unwrap_or_default(),
        )),
        ScVal::Symbol(ScSymbol(
            topic.as_bytes().to_vec().try_into().unwrap_or_default(),
        )),
    ];
    DiagnosticEvent {
        in_successful_contract_call: success,
        event: ContractEvent {
            ext: ExtensionPoint::V0,
            contract_id: None,
            type_: ContractEventType::Diagnostic,
            body: ContractEventBody::V0(ContractEventV0 {
                topics: topics.try_into().unwrap_or_default(),
                data: ScVal::U64(value),
            }),
        },
    }
}

fn make_result(result: InvokeHostFunctionResult) -> OperationResult {
    OperationResult::OpInner(OperationResultTr::InvokeHostFunction(result))
}
