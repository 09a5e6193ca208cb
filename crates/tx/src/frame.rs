//! Transaction frame - wrapper around a wire `TransactionEnvelope`.
//!
//! A frame is built off the wire once and never mutated; both identity
//! hashes are computed lazily and cached:
//!
//! - the *contents hash* is the signed payload,
//!   `SHA256(networkId ‖ envelopeType ‖ body)`, distinct for classic and
//!   fee-bump envelopes so a signature can never be replayed across kinds;
//! - the *full hash* is `SHA256(envelope)` including signatures, and is
//!   what transaction-set ordering is defined over.

use hayashi_common::{Hash256, NetworkId};
use hayashi_crypto::sha256;
use std::sync::OnceLock;
use stellar_xdr::curr::{
    AccountId, DecoratedSignature, FeeBumpTransactionInnerTx, Hash, LedgerBounds, Limits, Memo,
    MuxedAccount, Operation, OperationBody, Preconditions, PreconditionsV2, SequenceNumber,
    SignerKey, SorobanResources, SorobanTransactionData, TimeBounds, Transaction,
    TransactionEnvelope, TransactionExt, TransactionSignaturePayload,
    TransactionSignaturePayloadTaggedTransaction, WriteXdr,
};

use crate::{Result, TxError};

/// A wrapper around a `TransactionEnvelope` providing uniform access to
/// transaction properties across envelope kinds, plus cached hashes.
#[derive(Debug)]
pub struct TransactionFrame {
    envelope: TransactionEnvelope,
    network_id: NetworkId,
    contents_hash: OnceLock<Hash256>,
    full_hash: OnceLock<Hash256>,
}

impl Clone for TransactionFrame {
    fn clone(&self) -> Self {
        Self {
            envelope: self.envelope.clone(),
            network_id: self.network_id,
            contents_hash: self.contents_hash.clone(),
            full_hash: self.full_hash.clone(),
        }
    }
}

impl TransactionFrame {
    /// Builds a frame from a wire envelope for the given network.
    pub fn from_wire(network_id: NetworkId, envelope: TransactionEnvelope) -> Self {
        Self {
            envelope,
            network_id,
            contents_hash: OnceLock::new(),
            full_hash: OnceLock::new(),
        }
    }

    /// The underlying envelope.
    pub fn envelope(&self) -> &TransactionEnvelope {
        &self.envelope
    }

    /// The network this frame was built for.
    pub fn network_id(&self) -> &NetworkId {
        &self.network_id
    }

    /// The signed-payload hash of this envelope.
    pub fn contents_hash(&self) -> Result<Hash256> {
        if let Some(hash) = self.contents_hash.get() {
            return Ok(*hash);
        }
        let payload = self.signature_payload()?;
        let bytes = payload.to_xdr(Limits::none())?;
        let hash = sha256(&bytes);
        let _ = self.contents_hash.set(hash);
        Ok(hash)
    }

    /// The hash of the whole envelope, signatures included.
    pub fn full_hash(&self) -> Result<Hash256> {
        if let Some(hash) = self.full_hash.get() {
            return Ok(*hash);
        }
        let bytes = self.envelope.to_xdr(Limits::none())?;
        let hash = sha256(&bytes);
        let _ = self.full_hash.set(hash);
        Ok(hash)
    }

    fn signature_payload(&self) -> Result<TransactionSignaturePayload> {
        let tagged_tx = match &self.envelope {
            TransactionEnvelope::TxV0(env) => {
                TransactionSignaturePayloadTaggedTransaction::Tx(v0_to_v1(&env.tx))
            }
            TransactionEnvelope::Tx(env) => {
                TransactionSignaturePayloadTaggedTransaction::Tx(env.tx.clone())
            }
            TransactionEnvelope::TxFeeBump(env) => {
                TransactionSignaturePayloadTaggedTransaction::TxFeeBump(env.tx.clone())
            }
        };
        Ok(TransactionSignaturePayload {
            network_id: Hash(self.network_id.0 .0),
            tagged_transaction: tagged_tx,
        })
    }

    /// The transaction source. For a fee-bump this is the *inner*
    /// transaction's source; the outer envelope only names a fee source.
    pub fn source_account(&self) -> MuxedAccount {
        match &self.envelope {
            TransactionEnvelope::TxV0(env) => {
                MuxedAccount::Ed25519(env.tx.source_account_ed25519.clone())
            }
            TransactionEnvelope::Tx(env) => env.tx.source_account.clone(),
            TransactionEnvelope::TxFeeBump(env) => match &env.tx.inner_tx {
                FeeBumpTransactionInnerTx::Tx(inner) => inner.tx.source_account.clone(),
            },
        }
    }

    /// The account paying this envelope's fee.
    pub fn fee_source_account(&self) -> MuxedAccount {
        match &self.envelope {
            TransactionEnvelope::TxFeeBump(env) => env.tx.fee_source.clone(),
            _ => self.source_account(),
        }
    }

    /// The transaction source as an `AccountId`.
    pub fn source_account_id(&self) -> AccountId {
        muxed_to_account_id(&self.source_account())
    }

    /// The fee source as an `AccountId`.
    pub fn fee_source_account_id(&self) -> AccountId {
        muxed_to_account_id(&self.fee_source_account())
    }

    /// The sequence number consumed by this transaction.
    pub fn sequence_number(&self) -> i64 {
        match &self.envelope {
            TransactionEnvelope::TxV0(env) => env.tx.seq_num.0,
            TransactionEnvelope::Tx(env) => env.tx.seq_num.0,
            TransactionEnvelope::TxFeeBump(env) => match &env.tx.inner_tx {
                FeeBumpTransactionInnerTx::Tx(inner) => inner.tx.seq_num.0,
            },
        }
    }

    /// The declared total fee of this envelope.
    pub fn full_fee(&self) -> i64 {
        match &self.envelope {
            TransactionEnvelope::TxV0(env) => env.tx.fee as i64,
            TransactionEnvelope::Tx(env) => env.tx.fee as i64,
            TransactionEnvelope::TxFeeBump(env) => env.tx.fee,
        }
    }

    /// Resource fee declared by a contract transaction, zero otherwise.
    pub fn declared_resource_fee(&self) -> i64 {
        self.soroban_data().map(|d| d.resource_fee).unwrap_or(0)
    }

    /// The fee used for admission decisions: the total minus the declared
    /// resource fee.
    pub fn inclusion_fee(&self) -> i64 {
        self.full_fee() - self.declared_resource_fee()
    }

    /// The operations of this transaction (inner operations for fee-bumps).
    pub fn operations(&self) -> &[Operation] {
        match &self.envelope {
            TransactionEnvelope::TxV0(env) => env.tx.operations.as_slice(),
            TransactionEnvelope::Tx(env) => env.tx.operations.as_slice(),
            TransactionEnvelope::TxFeeBump(env) => match &env.tx.inner_tx {
                FeeBumpTransactionInnerTx::Tx(inner) => inner.tx.operations.as_slice(),
            },
        }
    }

    /// The operation count charged for this envelope. A fee-bump
    /// contributes one extra implicit operation.
    pub fn num_operations(&self) -> u32 {
        let ops = self.operations().len() as u32;
        if self.is_fee_bump() {
            ops + 1
        } else {
            ops
        }
    }

    /// The memo (inner memo for fee-bumps).
    pub fn memo(&self) -> &Memo {
        match &self.envelope {
            TransactionEnvelope::TxV0(env) => &env.tx.memo,
            TransactionEnvelope::Tx(env) => &env.tx.memo,
            TransactionEnvelope::TxFeeBump(env) => match &env.tx.inner_tx {
                FeeBumpTransactionInnerTx::Tx(inner) => &inner.tx.memo,
            },
        }
    }

    /// The preconditions (inner preconditions for fee-bumps).
    pub fn preconditions(&self) -> Preconditions {
        match &self.envelope {
            TransactionEnvelope::TxV0(env) => match &env.tx.time_bounds {
                Some(tb) => Preconditions::Time(tb.clone()),
                None => Preconditions::None,
            },
            TransactionEnvelope::Tx(env) => env.tx.cond.clone(),
            TransactionEnvelope::TxFeeBump(env) => match &env.tx.inner_tx {
                FeeBumpTransactionInnerTx::Tx(inner) => inner.tx.cond.clone(),
            },
        }
    }

    fn preconditions_v2(&self) -> Option<PreconditionsV2> {
        match self.preconditions() {
            Preconditions::V2(cond) => Some(cond),
            _ => None,
        }
    }

    /// Declared time bounds, if any.
    pub fn time_bounds(&self) -> Option<TimeBounds> {
        match self.preconditions() {
            Preconditions::None => None,
            Preconditions::Time(tb) => Some(tb),
            Preconditions::V2(cond) => cond.time_bounds,
        }
    }

    /// Declared ledger bounds, if any.
    pub fn ledger_bounds(&self) -> Option<LedgerBounds> {
        self.preconditions_v2().and_then(|c| c.ledger_bounds)
    }

    /// Relaxed sequence-number floor, if declared.
    pub fn min_seq_num(&self) -> Option<i64> {
        self.preconditions_v2()
            .and_then(|c| c.min_seq_num)
            .map(|SequenceNumber(n)| n)
    }

    /// Minimum age of the source's current sequence number, in seconds.
    pub fn min_seq_age(&self) -> u64 {
        self.preconditions_v2()
            .map(|c| c.min_seq_age.0)
            .unwrap_or(0)
    }

    /// Minimum ledger gap since the source's sequence number last moved.
    pub fn min_seq_ledger_gap(&self) -> u32 {
        self.preconditions_v2()
            .map(|c| c.min_seq_ledger_gap)
            .unwrap_or(0)
    }

    /// Additional signers this transaction requires.
    pub fn extra_signers(&self) -> Vec<SignerKey> {
        self.preconditions_v2()
            .map(|c| c.extra_signers.into_vec())
            .unwrap_or_default()
    }

    /// The signatures on this envelope (outer signatures for fee-bumps).
    pub fn signatures(&self) -> &[DecoratedSignature] {
        match &self.envelope {
            TransactionEnvelope::TxV0(env) => env.signatures.as_slice(),
            TransactionEnvelope::Tx(env) => env.signatures.as_slice(),
            TransactionEnvelope::TxFeeBump(env) => env.signatures.as_slice(),
        }
    }

    /// Whether this is a fee-bump envelope.
    pub fn is_fee_bump(&self) -> bool {
        matches!(&self.envelope, TransactionEnvelope::TxFeeBump(_))
    }

    /// Whether any operation invokes the contract host.
    pub fn is_contract_tx(&self) -> bool {
        self.operations().iter().any(|op| {
            matches!(
                op.body,
                OperationBody::InvokeHostFunction(_)
                    | OperationBody::ExtendFootprintTtl(_)
                    | OperationBody::RestoreFootprint(_)
            )
        })
    }

    /// Declared contract resources, if present.
    pub fn soroban_data(&self) -> Option<&SorobanTransactionData> {
        let ext = match &self.envelope {
            TransactionEnvelope::TxV0(_) => return None,
            TransactionEnvelope::Tx(env) => &env.tx.ext,
            TransactionEnvelope::TxFeeBump(env) => match &env.tx.inner_tx {
                FeeBumpTransactionInnerTx::Tx(inner) => &inner.tx.ext,
            },
        };
        match ext {
            TransactionExt::V0 => None,
            TransactionExt::V1(data) => Some(data),
        }
    }

    /// The declared resource footprint, if present.
    pub fn resources(&self) -> Option<&SorobanResources> {
        self.soroban_data().map(|d| &d.resources)
    }

    /// For fee-bumps, a frame over the wrapped classic transaction.
    pub fn inner_frame(&self) -> Option<TransactionFrame> {
        match &self.envelope {
            TransactionEnvelope::TxFeeBump(env) => match &env.tx.inner_tx {
                FeeBumpTransactionInnerTx::Tx(inner) => Some(TransactionFrame::from_wire(
                    self.network_id,
                    TransactionEnvelope::Tx(inner.clone()),
                )),
            },
            _ => None,
        }
    }

    /// Whether the declared fees are representable: no negative totals.
    pub fn provides_valid_fee(&self) -> bool {
        if self.full_fee() < 0 {
            return false;
        }
        match &self.envelope {
            TransactionEnvelope::TxFeeBump(_) => true,
            // Classic fees are unsigned on the wire.
            _ => true,
        }
    }

    /// Structural validity: operation counts and contract-transaction shape.
    pub fn is_valid_structure(&self, max_ops: u32) -> bool {
        let ops = self.operations().len() as u32;
        if ops == 0 || ops > max_ops {
            return false;
        }
        if self.is_contract_tx() && ops != 1 {
            return false;
        }
        true
    }

    /// The fee this transaction pays given an effective base fee.
    ///
    /// With no base fee the declared total stands. Otherwise the inclusion
    /// portion is repriced to `base_fee * num_operations`; while applying,
    /// the bid caps the repriced fee so a transaction never pays more than
    /// it declared.
    pub fn fee(&self, base_fee: Option<i64>, applying: bool) -> i64 {
        let Some(base_fee) = base_fee else {
            return self.full_fee();
        };
        let flat = self.declared_resource_fee();
        let adjusted = base_fee.saturating_mul(std::cmp::max(1, self.num_operations() as i64));
        if applying {
            flat + std::cmp::min(self.inclusion_fee(), adjusted)
        } else {
            flat + adjusted
        }
    }

    /// Keys this transaction's fee processing touches.
    pub fn keys_for_fee_processing(&self) -> Vec<stellar_xdr::curr::LedgerKey> {
        let mut keys = vec![account_id_to_key(&self.fee_source_account_id())];
        let source_key = account_id_to_key(&self.source_account_id());
        if !keys.contains(&source_key) {
            keys.push(source_key);
        }
        keys
    }
}

/// Converts a `MuxedAccount` to its underlying `AccountId`.
pub fn muxed_to_account_id(muxed: &MuxedAccount) -> AccountId {
    match muxed {
        MuxedAccount::Ed25519(key) => {
            AccountId(stellar_xdr::curr::PublicKey::PublicKeyTypeEd25519(key.clone()))
        }
        MuxedAccount::MuxedEd25519(m) => AccountId(
            stellar_xdr::curr::PublicKey::PublicKeyTypeEd25519(m.ed25519.clone()),
        ),
    }
}

/// The ledger key addressing an account entry.
pub fn account_id_to_key(account_id: &AccountId) -> stellar_xdr::curr::LedgerKey {
    stellar_xdr::curr::LedgerKey::Account(stellar_xdr::curr::LedgerKeyAccount {
        account_id: account_id.clone(),
    })
}

fn v0_to_v1(v0: &stellar_xdr::curr::TransactionV0) -> Transaction {
    Transaction {
        source_account: MuxedAccount::Ed25519(v0.source_account_ed25519.clone()),
        fee: v0.fee,
        seq_num: v0.seq_num.clone(),
        cond: match &v0.time_bounds {
            Some(tb) => Preconditions::Time(tb.clone()),
            None => Preconditions::None,
        },
        memo: v0.memo.clone(),
        operations: v0.operations.clone(),
        ext: TransactionExt::V0,
    }
}

/// Re-serializes a frame's envelope; used by set hashing.
pub fn envelope_xdr(frame: &TransactionFrame) -> Result<Vec<u8>> {
    frame
        .envelope()
        .to_xdr(Limits::none())
        .map_err(TxError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn frame_accessors() {
        let ctx = TestContext::new();
        let alice = ctx.account(1);
        let bob = ctx.account(2);
        let env = alice.payment_tx(&bob, 1_000, 42, 100);
        let frame = TransactionFrame::from_wire(ctx.network_id, env);

        assert_eq!(frame.num_operations(), 1);
        assert_eq!(frame.full_fee(), 100);
        assert_eq!(frame.sequence_number(), 42);
        assert!(!frame.is_fee_bump());
        assert!(!frame.is_contract_tx());
        assert_eq!(frame.source_account_id(), alice.account_id());
        assert_eq!(frame.fee_source_account_id(), alice.account_id());
    }

    #[test]
    fn hashes_are_cached_and_network_scoped() {
        let ctx = TestContext::new();
        let alice = ctx.account(1);
        let bob = ctx.account(2);
        let env = alice.payment_tx(&bob, 1_000, 1, 100);

        let frame = TransactionFrame::from_wire(ctx.network_id, env.clone());
        let h1 = frame.contents_hash().unwrap();
        assert_eq!(frame.contents_hash().unwrap(), h1);

        let other = TransactionFrame::from_wire(NetworkId::mainnet(), env);
        assert_ne!(other.contents_hash().unwrap(), h1);
        // The full hash covers the envelope only, so it is network-agnostic.
        assert_eq!(
            other.full_hash().unwrap(),
            frame.full_hash().unwrap()
        );
    }

    #[test]
    fn fee_bump_views() {
        let ctx = TestContext::new();
        let alice = ctx.account(1);
        let bob = ctx.account(2);
        let carol = ctx.account(3);
        let inner = alice.payment_tx(&bob, 1_000, 7, 100);
        let env = carol.fee_bump_tx(&inner, 400);
        let frame = TransactionFrame::from_wire(ctx.network_id, env);

        assert!(frame.is_fee_bump());
        assert_eq!(frame.full_fee(), 400);
        assert_eq!(frame.sequence_number(), 7);
        // Inner payment has one op; the wrapper adds one.
        assert_eq!(frame.num_operations(), 2);
        assert_eq!(frame.source_account_id(), alice.account_id());
        assert_eq!(frame.fee_source_account_id(), carol.account_id());

        let inner_frame = frame.inner_frame().unwrap();
        assert_eq!(inner_frame.full_fee(), 100);
        assert_ne!(
            inner_frame.contents_hash().unwrap(),
            frame.contents_hash().unwrap()
        );
    }

    #[test]
    fn repriced_fee_caps_at_bid_when_applying() {
        let ctx = TestContext::new();
        let alice = ctx.account(1);
        let bob = ctx.account(2);
        // 1 op, bid 250.
        let env = alice.payment_tx(&bob, 1_000, 1, 250);
        let frame = TransactionFrame::from_wire(ctx.network_id, env);

        assert_eq!(frame.fee(None, true), 250);
        assert_eq!(frame.fee(Some(100), true), 100);
        // Base fee above the bid: charging caps at the bid, nomination
        // pricing does not.
        assert_eq!(frame.fee(Some(300), true), 250);
        assert_eq!(frame.fee(Some(300), false), 300);
    }

    #[test]
    fn structure_checks() {
        let ctx = TestContext::new();
        let alice = ctx.account(1);
        let bob = ctx.account(2);
        let frame =
            TransactionFrame::from_wire(ctx.network_id, alice.payment_tx(&bob, 1, 1, 100));
        assert!(frame.is_valid_structure(100));
        assert!(!frame.is_valid_structure(0));
    }
}
