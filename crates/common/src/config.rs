//! Node configuration.

use crate::error::Error;
use crate::network::NetworkId;
use crate::protocol::{CURRENT_LEDGER_PROTOCOL_VERSION, MAX_OPS_PER_TX};
use serde::{Deserialize, Serialize};

/// Node configuration options recognized by the apply pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Network passphrase; hashed into the 32-byte network ID that is mixed
    /// into every signed payload.
    pub network_passphrase: String,

    /// Maximum ledger protocol version this node will run.
    #[serde(default = "default_ledger_protocol")]
    pub current_ledger_protocol: u32,

    /// Attach per-operation metrics events to contract invocation results.
    #[serde(default)]
    pub enable_diagnostic_events: bool,

    /// Hard cap on operations per transaction.
    #[serde(default = "default_max_ops_per_tx")]
    pub max_ops_per_tx: u32,
}

fn default_ledger_protocol() -> u32 {
    CURRENT_LEDGER_PROTOCOL_VERSION
}

fn default_max_ops_per_tx() -> u32 {
    MAX_OPS_PER_TX
}

impl Config {
    /// Configuration for the public test network.
    pub fn testnet() -> Self {
        Self {
            network_passphrase: "Test SDF Network ; September 2015".to_string(),
            current_ledger_protocol: CURRENT_LEDGER_PROTOCOL_VERSION,
            enable_diagnostic_events: false,
            max_ops_per_tx: MAX_OPS_PER_TX,
        }
    }

    /// The network ID derived from the configured passphrase.
    pub fn network_id(&self) -> NetworkId {
        NetworkId::from_passphrase(&self.network_passphrase)
    }

    /// Verify that the contract host was compiled for a compatible protocol.
    ///
    /// The host must match the node's protocol exactly; unstable pre-release
    /// builds are allowed to differ by one version.
    pub fn check_host_protocol(&self, host_protocol: u32, unstable_build: bool) -> Result<(), Error> {
        let ours = self.current_ledger_protocol;
        let compatible = if unstable_build {
            host_protocol.abs_diff(ours) <= 1
        } else {
            host_protocol == ours
        };
        if !compatible {
            return Err(Error::ProtocolMismatch {
                ours,
                theirs: host_protocol,
            });
        }
        Ok(())
    }
}
