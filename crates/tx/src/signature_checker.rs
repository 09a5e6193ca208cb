//! Signature weight checking for multi-signature transactions.
//!
//! [`SignatureChecker`] validates an envelope's signatures against account
//! signers, accumulating weights until a required threshold is met. Signers
//! are processed in a fixed order (pre-auth-tx, hash-x, ed25519, signed
//! payload) and every signature may satisfy at most one signer; the checker
//! remembers which signatures were consumed so the caller can reject
//! envelopes carrying unused signatures.

use hayashi_common::Hash256;
use hayashi_crypto::{verify_hash, PublicKey, Signature};
use stellar_xdr::curr::{AccountEntry, DecoratedSignature, Signer, SignerKey};

/// Tracks signature usage while accumulating signer weights.
pub struct SignatureChecker<'a> {
    protocol_version: u32,
    contents_hash: Hash256,
    signatures: &'a [DecoratedSignature],
    used_signatures: Vec<bool>,
}

impl<'a> SignatureChecker<'a> {
    /// Creates a checker over an envelope's signatures.
    pub fn new(
        protocol_version: u32,
        contents_hash: Hash256,
        signatures: &'a [DecoratedSignature],
    ) -> Self {
        Self {
            protocol_version,
            contents_hash,
            signatures,
            used_signatures: vec![false; signatures.len()],
        }
    }

    /// Checks whether the given signers reach the needed weight.
    ///
    /// Matching signatures are marked used and each signer can contribute
    /// at most once. Returns true as soon as the accumulated weight meets
    /// the threshold.
    pub fn check_signature(&mut self, signers: &[Signer], needed_weight: i32) -> bool {
        let mut total_weight: i32 = 0;

        // One-time pre-auth signers match by direct hash comparison; no
        // signature bytes are involved.
        for signer in signers {
            if let SignerKey::PreAuthTx(hash) = &signer.key {
                if hash.0 == self.contents_hash.0 {
                    total_weight += self.cap_weight(signer.weight) as i32;
                    if total_weight >= needed_weight {
                        return true;
                    }
                }
            }
        }

        let mut remaining: Vec<&Signer> = signers
            .iter()
            .filter(|s| !matches!(s.key, SignerKey::PreAuthTx(_)))
            .collect();

        for (sig_idx, sig) in self.signatures.iter().enumerate() {
            if self.used_signatures[sig_idx] {
                continue;
            }
            let matched = remaining
                .iter()
                .position(|signer| self.verify_signer(sig, signer));
            if let Some(pos) = matched {
                self.used_signatures[sig_idx] = true;
                let signer = remaining.remove(pos);
                total_weight += self.cap_weight(signer.weight) as i32;
                if total_weight >= needed_weight {
                    return true;
                }
            }
        }

        false
    }

    fn verify_signer(&self, sig: &DecoratedSignature, signer: &Signer) -> bool {
        match &signer.key {
            SignerKey::PreAuthTx(_) => false,
            SignerKey::HashX(expected) => verify_hash_x(sig, &expected.0),
            SignerKey::Ed25519(key) => verify_ed25519(sig, &key.0, &self.contents_hash),
            SignerKey::Ed25519SignedPayload(payload_signer) => verify_ed25519_signed_payload(
                sig,
                &payload_signer.ed25519.0,
                payload_signer.payload.as_slice(),
            ),
        }
    }

    /// Signer weights are capped at 255 starting from protocol 10.
    fn cap_weight(&self, weight: u32) -> u32 {
        if self.protocol_version >= 10 {
            weight.min(u8::MAX as u32)
        } else {
            weight
        }
    }

    /// Whether every signature on the envelope was consumed by some signer.
    pub fn all_signatures_used(&self) -> bool {
        self.used_signatures.iter().all(|&used| used)
    }
}

/// A HASH_X signature carries the 32-byte preimage of the signer's hash.
fn verify_hash_x(sig: &DecoratedSignature, expected_hash: &[u8; 32]) -> bool {
    if sig.signature.0.len() != 32 {
        return false;
    }
    let hint = [
        expected_hash[28],
        expected_hash[29],
        expected_hash[30],
        expected_hash[31],
    ];
    if sig.hint.0 != hint {
        return false;
    }
    Hash256::hash(&sig.signature.0).0 == *expected_hash
}

fn verify_ed25519(sig: &DecoratedSignature, key_bytes: &[u8; 32], contents_hash: &Hash256) -> bool {
    let hint = [key_bytes[28], key_bytes[29], key_bytes[30], key_bytes[31]];
    if sig.hint.0 != hint {
        return false;
    }
    let Ok(public_key) = PublicKey::from_bytes(key_bytes) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(sig.signature.0.as_slice()) else {
        return false;
    };
    verify_hash(&public_key, contents_hash, &signature).is_ok()
}

/// A signed-payload signature is an Ed25519 signature over the payload
/// itself; the hint XORs the key tail with the payload tail.
fn verify_ed25519_signed_payload(
    sig: &DecoratedSignature,
    key_bytes: &[u8; 32],
    payload: &[u8],
) -> bool {
    let mut payload_tail = [0u8; 4];
    let tail_len = payload.len().min(4);
    let start = payload.len() - tail_len;
    payload_tail[..tail_len].copy_from_slice(&payload[start..]);

    let hint = [
        key_bytes[28] ^ payload_tail[0],
        key_bytes[29] ^ payload_tail[1],
        key_bytes[30] ^ payload_tail[2],
        key_bytes[31] ^ payload_tail[3],
    ];
    if sig.hint.0 != hint {
        return false;
    }
    let Ok(public_key) = PublicKey::from_bytes(key_bytes) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(sig.signature.0.as_slice()) else {
        return false;
    };
    public_key.verify(payload, &signature).is_ok()
}

/// The account's signers including its master key, whose weight is the
/// first thresholds byte.
pub fn collect_signers_for_account(account: &AccountEntry) -> Vec<Signer> {
    let mut signers: Vec<Signer> = Vec::with_capacity(account.signers.len() + 1);
    let master_weight = account.thresholds.0[0] as u32;
    if master_weight > 0 {
        let key_bytes = match &account.account_id.0 {
            stellar_xdr::curr::PublicKey::PublicKeyTypeEd25519(key) => key.clone(),
        };
        signers.push(Signer {
            key: SignerKey::Ed25519(key_bytes),
            weight: master_weight,
        });
    }
    signers.extend(account.signers.iter().cloned());
    signers
}
