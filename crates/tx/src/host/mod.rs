//! Contract-host boundary.
//!
//! The execution engine itself lives outside this workspace; the pipeline
//! talks to it through [`ContractHost`], a pure function from XDR-encoded
//! inputs to XDR-encoded outputs plus a metering header. Everything around
//! the call (footprint gathering, lifetime checks, resource enforcement,
//! write-back, erasures, event accounting) is this module's job and is
//! implemented in the invoker.

mod invoker;

pub use invoker::{invoke_host_function, ttl_key_for};

use hayashi_common::{Config, Hash256};
use hayashi_ledger::{NetworkConfig, RentFeeConfiguration};
use stellar_xdr::curr::{ContractEvent, DiagnosticEvent, ScVal};

/// Ledger snapshot forwarded to the host on every invocation.
#[derive(Debug, Clone)]
pub struct LedgerInfo {
    /// Ledger protocol version in effect.
    pub protocol_version: u32,
    /// Sequence number of the ledger being built.
    pub sequence_number: u32,
    /// Close time of the ledger being built.
    pub timestamp: u64,
    /// Base reserve in effect.
    pub base_reserve: u32,
    /// Hard cap on host memory, in bytes.
    pub memory_limit: u64,
    /// Lower bound on a temporary entry's initial lifetime.
    pub min_temp_entry_ttl: u32,
    /// Lower bound on a persistent entry's initial lifetime.
    pub min_persistent_entry_ttl: u32,
    /// Upper bound on any entry's lifetime.
    pub max_entry_ttl: u32,
    /// Domain-separation tag of the network.
    pub network_id: [u8; 32],
    /// XDR-encoded CPU cost model parameters.
    pub cpu_cost_params: Vec<u8>,
    /// XDR-encoded memory cost model parameters.
    pub mem_cost_params: Vec<u8>,
}

/// One invocation's inputs, XDR-encoded buffers plus the header fields.
#[derive(Debug, Clone)]
pub struct HostInvocation {
    /// Protocol the node is running.
    pub protocol_version: u32,
    /// Declared instruction budget; exceeding it must trap the call.
    pub instruction_budget: u32,
    /// Whether to produce diagnostic events.
    pub enable_diagnostics: bool,
    /// XDR-encoded host function to run.
    pub host_function: Vec<u8>,
    /// XDR-encoded declared resources (footprint included).
    pub resources: Vec<u8>,
    /// XDR-encoded invoking account.
    pub source_account: Vec<u8>,
    /// XDR-encoded authorization entries.
    pub auth_entries: Vec<Vec<u8>>,
    /// Ledger snapshot.
    pub ledger_info: LedgerInfo,
    /// XDR-encoded footprint entries, in footprint order.
    pub ledger_entries: Vec<Vec<u8>>,
    /// XDR-encoded lifetime entries, parallel to `ledger_entries`; an
    /// empty buffer for entry kinds that have no lifetime.
    pub ttl_entries: Vec<Vec<u8>>,
    /// Per-transaction PRNG seed.
    pub base_prng_seed: [u8; 32],
    /// Rent-fee inputs.
    pub rent_config: RentFeeConfiguration,
}

/// One invocation's outputs.
#[derive(Debug, Clone, Default)]
pub struct HostOutput {
    /// Whether the invocation completed without trapping.
    pub success: bool,
    /// XDR-encoded ledger entries created or modified by the call.
    pub modified_entries: Vec<Vec<u8>>,
    /// XDR-encoded contract events.
    pub contract_events: Vec<Vec<u8>>,
    /// XDR-encoded diagnostic events.
    pub diagnostic_events: Vec<Vec<u8>>,
    /// XDR-encoded return value.
    pub result_value: Vec<u8>,
    /// CPU instructions consumed.
    pub cpu_instructions: u64,
    /// Peak host memory, in bytes.
    pub memory_bytes: u64,
    /// Wall time spent in the host, in nanoseconds.
    pub invoke_time_nsecs: u64,
    /// Rent fee computed by the host.
    pub rent_fee: i64,
}

/// The embedded execution engine.
///
/// Implementations must be deterministic: identical inputs produce
/// identical outputs, and the only state they may keep is internal
/// metering.
pub trait ContractHost {
    /// The ledger protocol this host was compiled for.
    fn compiled_protocol_version(&self) -> u32;

    /// Runs one host function invocation.
    fn invoke(&self, invocation: &HostInvocation) -> HostOutput;
}

/// Host-side context threaded through operation application.
pub struct HostContext<'a> {
    /// Node configuration.
    pub config: &'a Config,
    /// Network-wide contract limits for this ledger.
    pub net: &'a NetworkConfig,
    /// The execution engine.
    pub host: &'a dyn ContractHost,
    /// This transaction's PRNG seed.
    pub prng_seed: Hash256,
}

/// Side effects a transaction accumulates outside the ledger view.
#[derive(Debug, Default)]
pub struct TxEffects {
    /// Events emitted by successful contract invocations.
    pub contract_events: Vec<ContractEvent>,
    /// Diagnostic events, populated when diagnostics are enabled or an
    /// invocation fails.
    pub diagnostic_events: Vec<DiagnosticEvent>,
    /// The invocation's return value, when one was produced.
    pub return_value: Option<ScVal>,
}

/// Progress of one invocation through the invoker.
///
/// Any failure moves the machine to `Aborted`: the transaction's view is
/// rolled back, diagnostics are still emitted, and the refundable reserve
/// is forfeited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokerPhase {
    /// Loading footprint entries and their lifetimes.
    Gathering,
    /// Inside the host call.
    Invoking,
    /// Materializing returned entries and erasures into the view.
    WritingBack,
    /// Event accounting and refundable-fee consumption.
    Finalizing,
    /// Failed; no state from this invocation survives.
    Aborted,
}
