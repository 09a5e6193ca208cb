//! Shared test fixtures: deterministic accounts, signed envelopes, seeded
//! stores, and scripted contract hosts.
//!
//! Kept as a public module so downstream crates' tests can build the same
//! fixtures.

use hayashi_common::{Config, Hash256, NetworkId};
use hayashi_crypto::{signature_hint, PublicKey, SecretKey};
use hayashi_ledger::{LedgerStore, View};
use stellar_xdr::curr::{
    AccountEntry, AccountEntryExt, AccountId, Asset, DecoratedSignature, FeeBumpTransaction,
    FeeBumpTransactionEnvelope, FeeBumpTransactionExt, FeeBumpTransactionInnerTx, Hash,
    HostFunction, InvokeContractArgs, InvokeHostFunctionOp, LedgerBounds, LedgerFootprint,
    LedgerHeader, LedgerHeaderExt, LedgerKey, Memo, MuxedAccount, Operation, OperationBody,
    PaymentOp, Preconditions, PreconditionsV2, ScAddress, ScSymbol, SequenceNumber,
    SignatureHint, SorobanResources, SorobanTransactionData, SorobanTransactionDataExt,
    StellarValue, StellarValueExt, String32, Thresholds, TimeBounds, TimePoint, Transaction,
    TransactionEnvelope, TransactionExt, TransactionV1Envelope, Uint256, VecM,
};

use crate::account;
use crate::frame::TransactionFrame;
use crate::host::{ContractHost, HostInvocation, HostOutput};
use crate::validation::LedgerContext;

/// A deterministic signing identity for tests.
pub struct TestAccount {
    secret: SecretKey,
    network_id: NetworkId,
}

impl TestAccount {
    /// The account's verifying key.
    pub fn public_key(&self) -> PublicKey {
        self.secret.public_key()
    }

    /// The account's ledger identity.
    pub fn account_id(&self) -> AccountId {
        (&self.public_key()).into()
    }

    /// The account as a transaction source.
    pub fn muxed(&self) -> MuxedAccount {
        MuxedAccount::Ed25519(Uint256(*self.public_key().as_bytes()))
    }

    /// A ledger account entry for this identity.
    pub fn account_entry(&self, balance: i64, seq: i64) -> AccountEntry {
        AccountEntry {
            account_id: self.account_id(),
            balance,
            seq_num: SequenceNumber(seq),
            num_sub_entries: 0,
            inflation_dest: None,
            flags: 0,
            home_domain: String32::default(),
            thresholds: Thresholds([1, 0, 0, 0]),
            signers: VecM::default(),
            ext: AccountEntryExt::V0,
        }
    }

    /// Signs a 32-byte hash, producing a decorated signature.
    pub fn sign_hash(&self, hash: &Hash256) -> DecoratedSignature {
        let signature = self.secret.sign(hash.as_bytes());
        DecoratedSignature {
            hint: SignatureHint(signature_hint(self.public_key().as_bytes())),
            signature: stellar_xdr::curr::Signature(
                signature.as_bytes().to_vec().try_into().unwrap(),
            ),
        }
    }

    fn signed(&self, envelope: TransactionEnvelope) -> TransactionEnvelope {
        let frame = TransactionFrame::from_wire(self.network_id, envelope);
        let hash = frame.contents_hash().unwrap();
        let signature = self.sign_hash(&hash);
        let mut envelope = frame.envelope().clone();
        match &mut envelope {
            TransactionEnvelope::Tx(env) => {
                let mut sigs = env.signatures.to_vec();
                sigs.push(signature);
                env.signatures = sigs.try_into().unwrap();
            }
            TransactionEnvelope::TxFeeBump(env) => {
                let mut sigs = env.signatures.to_vec();
                sigs.push(signature);
                env.signatures = sigs.try_into().unwrap();
            }
            TransactionEnvelope::TxV0(env) => {
                let mut sigs = env.signatures.to_vec();
                sigs.push(signature);
                env.signatures = sigs.try_into().unwrap();
            }
        }
        envelope
    }

    fn payment_body(&self, dest: &TestAccount, amount: i64) -> Operation {
        Operation {
            source_account: None,
            body: OperationBody::Payment(PaymentOp {
                destination: dest.muxed(),
                asset: Asset::Native,
                amount,
            }),
        }
    }

    fn classic_tx(
        &self,
        operations: Vec<Operation>,
        seq: i64,
        fee: u32,
        cond: Preconditions,
    ) -> TransactionEnvelope {
        TransactionEnvelope::Tx(TransactionV1Envelope {
            tx: Transaction {
                source_account: self.muxed(),
                fee,
                seq_num: SequenceNumber(seq),
                cond,
                memo: Memo::None,
                operations: operations.try_into().unwrap(),
                ext: TransactionExt::V0,
            },
            signatures: VecM::default(),
        })
    }

    /// A signed single-operation native payment.
    pub fn payment_tx(
        &self,
        dest: &TestAccount,
        amount: i64,
        seq: i64,
        fee: u32,
    ) -> TransactionEnvelope {
        self.signed(self.classic_tx(
            vec![self.payment_body(dest, amount)],
            seq,
            fee,
            Preconditions::None,
        ))
    }

    /// A payment carrying several operations.
    pub fn multi_payment_tx(
        &self,
        dest: &TestAccount,
        amount: i64,
        ops: usize,
        seq: i64,
        fee: u32,
    ) -> TransactionEnvelope {
        let operations = (0..ops).map(|_| self.payment_body(dest, amount)).collect();
        self.signed(self.classic_tx(operations, seq, fee, Preconditions::None))
    }

    /// The same payment without any signature.
    pub fn unsigned_payment_tx(
        &self,
        dest: &TestAccount,
        amount: i64,
        seq: i64,
        fee: u32,
    ) -> TransactionEnvelope {
        self.classic_tx(
            vec![self.payment_body(dest, amount)],
            seq,
            fee,
            Preconditions::None,
        )
    }

    /// A payment signed by this account and, superfluously, a second one.
    pub fn payment_tx_cosigned(
        &self,
        dest: &TestAccount,
        cosigner: &TestAccount,
        amount: i64,
        seq: i64,
        fee: u32,
    ) -> TransactionEnvelope {
        let envelope = self.signed(self.classic_tx(
            vec![self.payment_body(dest, amount)],
            seq,
            fee,
            Preconditions::None,
        ));
        let frame = TransactionFrame::from_wire(self.network_id, envelope);
        let hash = frame.contents_hash().unwrap();
        let extra = cosigner.sign_hash(&hash);
        let mut envelope = frame.envelope().clone();
        if let TransactionEnvelope::Tx(env) = &mut envelope {
            let mut sigs = env.signatures.to_vec();
            sigs.push(extra);
            env.signatures = sigs.try_into().unwrap();
        }
        envelope
    }

    /// A signed payment with explicit time bounds.
    pub fn payment_tx_with_time_bounds(
        &self,
        dest: &TestAccount,
        amount: i64,
        seq: i64,
        fee: u32,
        min_time: u64,
        max_time: u64,
    ) -> TransactionEnvelope {
        self.signed(self.classic_tx(
            vec![self.payment_body(dest, amount)],
            seq,
            fee,
            Preconditions::Time(TimeBounds {
                min_time: TimePoint(min_time),
                max_time: TimePoint(max_time),
            }),
        ))
    }

    /// A signed payment with explicit ledger bounds.
    pub fn payment_tx_with_ledger_bounds(
        &self,
        dest: &TestAccount,
        amount: i64,
        seq: i64,
        fee: u32,
        min_ledger: u32,
        max_ledger: u32,
    ) -> TransactionEnvelope {
        self.signed(self.classic_tx(
            vec![self.payment_body(dest, amount)],
            seq,
            fee,
            Preconditions::V2(PreconditionsV2 {
                time_bounds: None,
                ledger_bounds: Some(LedgerBounds {
                    min_ledger,
                    max_ledger,
                }),
                min_seq_num: None,
                min_seq_age: stellar_xdr::curr::Duration(0),
                min_seq_ledger_gap: 0,
                extra_signers: VecM::default(),
            }),
        ))
    }

    /// A signed payment with a relaxed sequence-number floor.
    pub fn payment_tx_with_min_seq(
        &self,
        dest: &TestAccount,
        amount: i64,
        seq: i64,
        fee: u32,
        min_seq: i64,
    ) -> TransactionEnvelope {
        self.signed(self.classic_tx(
            vec![self.payment_body(dest, amount)],
            seq,
            fee,
            Preconditions::V2(PreconditionsV2 {
                time_bounds: None,
                ledger_bounds: None,
                min_seq_num: Some(SequenceNumber(min_seq)),
                min_seq_age: stellar_xdr::curr::Duration(0),
                min_seq_ledger_gap: 0,
                extra_signers: VecM::default(),
            }),
        ))
    }

    /// A signed fee-bump wrapping an existing classic envelope.
    pub fn fee_bump_tx(&self, inner: &TransactionEnvelope, fee: i64) -> TransactionEnvelope {
        let inner_v1 = match inner {
            TransactionEnvelope::Tx(env) => env.clone(),
            other => panic!("fee bump requires a v1 inner envelope, got {:?}", other),
        };
        self.signed(TransactionEnvelope::TxFeeBump(FeeBumpTransactionEnvelope {
            tx: FeeBumpTransaction {
                fee_source: self.muxed(),
                fee,
                inner_tx: FeeBumpTransactionInnerTx::Tx(inner_v1),
                ext: FeeBumpTransactionExt::V0,
            },
            signatures: VecM::default(),
        }))
    }

    /// A signed contract invocation with a declared footprint.
    #[allow(clippy::too_many_arguments)]
    pub fn invoke_tx(
        &self,
        seq: i64,
        fee: u32,
        resource_fee: i64,
        read_only: Vec<LedgerKey>,
        read_write: Vec<LedgerKey>,
        instructions: u32,
        read_bytes: u32,
        write_bytes: u32,
    ) -> TransactionEnvelope {
        let op = Operation {
            source_account: None,
            body: OperationBody::InvokeHostFunction(InvokeHostFunctionOp {
                host_function: HostFunction::InvokeContract(InvokeContractArgs {
                    contract_address: ScAddress::Contract(stellar_xdr::curr::ContractId(Hash(
                        [7u8; 32],
                    ))),
                    function_name: ScSymbol(b"run".to_vec().try_into().unwrap()),
                    args: VecM::default(),
                }),
                auth: VecM::default(),
            }),
        };
        let envelope = TransactionEnvelope::Tx(TransactionV1Envelope {
            tx: Transaction {
                source_account: self.muxed(),
                fee,
                seq_num: SequenceNumber(seq),
                cond: Preconditions::None,
                memo: Memo::None,
                operations: vec![op].try_into().unwrap(),
                ext: TransactionExt::V1(SorobanTransactionData {
                    ext: SorobanTransactionDataExt::V0,
                    resources: SorobanResources {
                        footprint: LedgerFootprint {
                            read_only: read_only.try_into().unwrap(),
                            read_write: read_write.try_into().unwrap(),
                        },
                        instructions,
                        disk_read_bytes: read_bytes,
                        write_bytes,
                    },
                    resource_fee,
                }),
            },
            signatures: VecM::default(),
        });
        self.signed(envelope)
    }
}

/// Shared scaffolding for transaction tests.
pub struct TestContext {
    /// Node configuration under test.
    pub config: Config,
    /// Network identity matching the configuration.
    pub network_id: NetworkId,
}

impl TestContext {
    /// Close time every test ledger uses.
    const CLOSE_TIME: u64 = 1_700_000_000;

    /// Fresh testnet-flavored context.
    pub fn new() -> Self {
        let config = Config::testnet();
        let network_id = config.network_id();
        Self { config, network_id }
    }

    /// The deterministic account for a one-byte seed.
    pub fn account(&self, n: u8) -> TestAccount {
        TestAccount {
            secret: SecretKey::from_seed(&[n; 32]),
            network_id: self.network_id,
        }
    }

    /// The close time used by [`ledger_context`](Self::ledger_context).
    pub fn close_time(&self) -> u64 {
        Self::CLOSE_TIME
    }

    /// The context for the ledger a fresh store would build next.
    pub fn ledger_context(&self) -> LedgerContext {
        LedgerContext {
            sequence: 100,
            close_time: Self::CLOSE_TIME,
            base_fee: 100,
            base_reserve: 5_000_000,
            protocol_version: 23,
            max_tx_set_size: 1000,
            network_id: self.network_id,
        }
    }

    /// Wraps an envelope for this context's network.
    pub fn frame(&self, envelope: TransactionEnvelope) -> TransactionFrame {
        TransactionFrame::from_wire(self.network_id, envelope)
    }

    /// A store at ledger 99 seeded with `(seed, balance, seq)` accounts.
    pub fn store_with_accounts(&self, accounts: &[(u8, i64, i64)]) -> LedgerStore {
        let mut store = LedgerStore::new(test_header(99));
        for &(n, balance, seq) in accounts {
            let account = self.account(n).account_entry(balance, seq);
            store
                .insert_entry(stellar_xdr::curr::LedgerEntry {
                    last_modified_ledger_seq: 0,
                    data: stellar_xdr::curr::LedgerEntryData::Account(account),
                    ext: stellar_xdr::curr::LedgerEntryExt::V0,
                })
                .unwrap();
        }
        store
    }

    /// Current balance of a test account.
    pub fn balance_of(&self, store: &LedgerStore, account: &TestAccount) -> i64 {
        self.account_entry_of(store, account).balance
    }

    /// Current entry of a test account.
    pub fn account_entry_of(&self, store: &LedgerStore, account: &TestAccount) -> AccountEntry {
        match store.get(&account::account_key(&account.account_id())) {
            Some(stellar_xdr::curr::LedgerEntry {
                data: stellar_xdr::curr::LedgerEntryData::Account(entry),
                ..
            }) => entry.clone(),
            other => panic!("account entry missing: {:?}", other),
        }
    }

    /// Loads an account through a throwaway view.
    pub fn load_account_via_view(
        &self,
        view: &View<'_>,
        account: &TestAccount,
    ) -> Option<AccountEntry> {
        account::load_account(view, &account.account_id())
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A ledger header for tests, positioned just before ledger 100.
pub fn test_header(ledger_seq: u32) -> LedgerHeader {
    LedgerHeader {
        ledger_version: 23,
        previous_ledger_hash: Hash([0; 32]),
        scp_value: StellarValue {
            tx_set_hash: Hash([0; 32]),
            close_time: TimePoint(0),
            upgrades: VecM::default(),
            ext: StellarValueExt::Basic,
        },
        tx_set_result_hash: Hash([0; 32]),
        bucket_list_hash: Hash([0; 32]),
        ledger_seq,
        total_coins: 1_000_000_000_000,
        fee_pool: 0,
        inflation_seq: 0,
        id_pool: 0,
        base_fee: 100,
        base_reserve: 5_000_000,
        max_tx_set_size: 1000,
        skip_list: [Hash([0; 32]), Hash([0; 32]), Hash([0; 32]), Hash([0; 32])],
        ext: LedgerHeaderExt::V0,
    }
}

/// A host that must never be reached; classic-only tests use it.
pub struct NullHost;

impl ContractHost for NullHost {
    fn compiled_protocol_version(&self) -> u32 {
        23
    }

    fn invoke(&self, _invocation: &HostInvocation) -> HostOutput {
        panic!("classic transaction reached the contract host");
    }
}

/// A host that replays a canned output, recording nothing.
pub struct ScriptedHost {
    /// The output returned from every invocation.
    pub output: HostOutput,
}

impl ContractHost for ScriptedHost {
    fn compiled_protocol_version(&self) -> u32 {
        23
    }

    fn invoke(&self, _invocation: &HostInvocation) -> HostOutput {
        self.output.clone()
    }
}
