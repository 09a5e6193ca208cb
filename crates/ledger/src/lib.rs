//! Ledger state for the hayashi apply pipeline.
//!
//! The centerpiece is [`LedgerStore`] and its nested transactional
//! [`View`]s: the apply pipeline opens one root view per ledger close,
//! transactions open nested views on top of it, and operations open views on
//! top of those. Committing a view folds its changes into the parent;
//! dropping it discards them. The store itself is an in-memory key-value
//! map; durable persistence lives behind it, outside this workspace.
//!
//! Also here: [`LedgerHeader`](stellar_xdr::curr::LedgerHeader) helpers
//! (reserve and balance math) and the contract-network tunables
//! ([`NetworkConfig`]) that the host invoker enforces.

mod error;
pub mod header;
mod network_config;
mod store;

pub use error::{LedgerError, Result};
pub use network_config::{NetworkConfig, RentFeeConfiguration};
pub use store::{entry_key, LedgerStore, View};
