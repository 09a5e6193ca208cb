//! Contract-network tunables read from ledger configuration.
//!
//! These mirror the on-ledger config entries that bound contract execution.
//! Loading them from config entries is the durable store's concern; the
//! apply pipeline receives them as a snapshot per ledger close.

use stellar_xdr::curr::ContractCostParams;

/// Inputs to the host's rent-fee computation, forwarded verbatim.
#[derive(Debug, Clone)]
pub struct RentFeeConfiguration {
    /// Fee per 1KB written to persistent storage.
    pub fee_per_write_1kb: i64,
    /// Flat fee per written ledger entry.
    pub fee_per_write_entry: i64,
    /// Rent rate denominator for persistent entries.
    pub persistent_rent_rate_denominator: i64,
    /// Rent rate denominator for temporary entries.
    pub temporary_rent_rate_denominator: i64,
}

/// Snapshot of network-wide contract execution limits for one ledger.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Hard cap on host memory per transaction, in bytes.
    pub tx_memory_limit: u64,
    /// Maximum size of an uploaded contract-code entry.
    pub max_contract_size_bytes: u32,
    /// Maximum serialized size of a contract-data entry.
    pub max_contract_data_entry_size_bytes: u32,
    /// Cap on total contract event bytes (including the return value).
    pub tx_max_contract_events_size_bytes: u32,
    /// Fee per 1KB of emitted contract events.
    pub fee_per_contract_event_1kb: i64,
    /// Lower bound on a temporary entry's initial lifetime, in ledgers.
    pub min_temp_entry_ttl: u32,
    /// Lower bound on a persistent entry's initial lifetime, in ledgers.
    pub min_persistent_entry_ttl: u32,
    /// Upper bound on any entry's lifetime, in ledgers.
    pub max_entry_ttl: u32,
    /// Rent-fee inputs forwarded to the host.
    pub rent: RentFeeConfiguration,
    /// CPU cost model parameters forwarded to the host.
    pub cpu_cost_params: ContractCostParams,
    /// Memory cost model parameters forwarded to the host.
    pub mem_cost_params: ContractCostParams,
}

impl NetworkConfig {
    /// The initial limits a network launches with.
    pub fn standard() -> Self {
        Self {
            tx_memory_limit: 40 * 1024 * 1024,
            max_contract_size_bytes: 64 * 1024,
            max_contract_data_entry_size_bytes: 64 * 1024,
            tx_max_contract_events_size_bytes: 8198,
            fee_per_contract_event_1kb: 200,
            min_temp_entry_ttl: 16,
            min_persistent_entry_ttl: 4096,
            max_entry_ttl: 3_110_400,
            rent: RentFeeConfiguration {
                fee_per_write_1kb: 1000,
                fee_per_write_entry: 100,
                persistent_rent_rate_denominator: 1402,
                temporary_rent_rate_denominator: 2804,
            },
            cpu_cost_params: ContractCostParams(Default::default()),
            mem_cost_params: ContractCostParams(Default::default()),
        }
    }
}
