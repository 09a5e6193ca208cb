//! Common types and utilities shared across the hayashi workspace.
//!
//! This crate is dependency-light and contains pure data types and helpers
//! with no I/O or side effects, making it a foundation for every other
//! crate in the workspace:
//!
//! - [`types`] - core value types such as [`Hash256`]
//! - [`network`] - network identity derived from a passphrase
//! - [`math`] - 128-bit arithmetic and XOR-seeded hash ordering
//! - [`protocol`] - protocol version constants and feature gates
//! - [`config`] - node configuration options
//! - [`error`] - the common error type and [`Result`] alias

pub mod config;
pub mod error;
pub mod math;
pub mod network;
pub mod protocol;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use network::NetworkId;
pub use protocol::*;
pub use types::Hash256;

/// Re-export of the XDR crate so downstream crates can reach wire types
/// through `hayashi_common::stellar_xdr` without a direct dependency.
pub use stellar_xdr;
