//! # Signature Recovery & Address Derivation
//!
//! secp256k1 public-key recovery for transaction senders and the
//! `ecrecover` precompile, plus CREATE/CREATE2 address derivation.

use crate::primitives::{keccak256, Address, Hash, U256};
use crate::transaction::{Transaction, TxType};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use rlp::RlpStream;
use thiserror::Error;

/// secp256k1 curve order `n`.
const SECP256K1_ORDER: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE,
    0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36, 0x41, 0x41,
];

/// `n / 2`, the EIP-2 malleability bound for `s`.
const SECP256K1_HALF_ORDER: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D, 0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B, 0x20, 0xA0,
];

/// Signature recovery failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// r or s outside `[1, n-1]`, or s above the EIP-2 bound.
    #[error("signature scalar out of range")]
    ScalarOutOfRange,

    /// The recovery id does not map to 0 or 1.
    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u64),

    /// Public-key recovery failed.
    #[error("public key recovery failed")]
    RecoveryFailed,

    /// EIP-155 chain id of the signature does not match the signer.
    #[error("chain id mismatch")]
    ChainIdMismatch,
}

// =============================================================================
// RAW RECOVERY (ecrecover)
// =============================================================================

/// Recovers the signer address from a 32-byte prehash and an `(r, s, v)`
/// signature where `v` is 0 or 1.
///
/// Returns `None` for any malformed signature; callers treat that as
/// "no address", matching `ecrecover` semantics.
#[must_use]
pub fn recover_address(message_hash: &Hash, r: &[u8; 32], s: &[u8; 32], v: u8) -> Option<Address> {
    if !is_valid_scalar(r) || !is_valid_scalar(s) {
        return None;
    }

    let mut sig_bytes = [0u8; 64];
    sig_bytes[..32].copy_from_slice(r);
    sig_bytes[32..].copy_from_slice(s);

    let sig = Signature::from_slice(&sig_bytes).ok()?;
    let recovery_id = RecoveryId::try_from(v).ok()?;
    let key = VerifyingKey::recover_from_prehash(message_hash.as_bytes(), &sig, recovery_id).ok()?;

    Some(address_from_pubkey(&key))
}

/// Derives the 20-byte address of an uncompressed secp256k1 public key.
#[must_use]
pub fn address_from_pubkey(public_key: &VerifyingKey) -> Address {
    let point = public_key.to_encoded_point(false);
    // Skip the 0x04 SEC1 prefix.
    let digest = keccak256(&point.as_bytes()[1..]);
    digest.to_address()
}

/// Checks a scalar is in `[1, n-1]`.
fn is_valid_scalar(scalar: &[u8; 32]) -> bool {
    scalar != &[0u8; 32] && scalar < &SECP256K1_ORDER
}

/// Checks `s` is in the lower half of the curve order (EIP-2).
#[must_use]
pub fn is_low_s(s: &[u8; 32]) -> bool {
    s < &SECP256K1_HALF_ORDER
}

// =============================================================================
// TRANSACTION SENDER RECOVERY
// =============================================================================

/// Recovers the sender of transactions under one chain id, enforcing
/// EIP-155 replay protection and EIP-2 low-s when the fork requires them.
#[derive(Debug, Clone)]
pub struct Signer {
    chain_id: u64,
    /// Enforce the EIP-2 (Homestead) low-s rule.
    enforce_low_s: bool,
    /// Enforce EIP-155 chain-id protection on legacy signatures that carry it.
    eip155: bool,
}

impl Signer {
    /// Creates a signer for the given chain id.
    #[must_use]
    pub const fn new(chain_id: u64, enforce_low_s: bool, eip155: bool) -> Self {
        Self {
            chain_id,
            enforce_low_s,
            eip155,
        }
    }

    /// Recovers the sender of `tx` from its signature.
    pub fn sender(&self, tx: &Transaction) -> Result<Address, SignatureError> {
        if tx.tx_type != TxType::Legacy && tx.chain_id != Some(self.chain_id) {
            return Err(SignatureError::ChainIdMismatch);
        }

        let (parity, chain_id) = self.signature_parity(tx)?;

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        tx.r.to_big_endian(&mut r);
        tx.s.to_big_endian(&mut s);

        if self.enforce_low_s && !is_low_s(&s) {
            return Err(SignatureError::ScalarOutOfRange);
        }

        if let Some(id) = chain_id {
            if id != self.chain_id {
                return Err(SignatureError::ChainIdMismatch);
            }
        }

        let hash = self.signing_hash(tx, chain_id.is_some());
        recover_address(&hash, &r, &s, parity).ok_or(SignatureError::RecoveryFailed)
    }

    /// Splits the transaction `v` into a 0/1 parity and the embedded chain
    /// id (legacy EIP-155 only).
    fn signature_parity(&self, tx: &Transaction) -> Result<(u8, Option<u64>), SignatureError> {
        let v = tx.v;
        if tx.tx_type != TxType::Legacy {
            // Typed transactions carry a bare y-parity; chain id travels in
            // its own field and is checked by the caller.
            if v.bits() > 1 {
                return Err(SignatureError::InvalidRecoveryId(v.low_u64()));
            }
            return Ok((v.low_u64() as u8, None));
        }

        if v.bits() > 64 {
            return Err(SignatureError::InvalidRecoveryId(u64::MAX));
        }
        let v = v.low_u64();

        match v {
            27 | 28 => Ok(((v - 27) as u8, None)),
            _ if self.eip155 && v >= 35 => {
                let parity = ((v - 35) % 2) as u8;
                let chain_id = (v - 35) / 2;
                Ok((parity, Some(chain_id)))
            }
            other => Err(SignatureError::InvalidRecoveryId(other)),
        }
    }

    /// Computes the hash the signature commits to.
    #[must_use]
    pub fn signing_hash(&self, tx: &Transaction, protected: bool) -> Hash {
        match tx.tx_type {
            TxType::Legacy | TxType::State => {
                let mut s = RlpStream::new();
                if protected {
                    s.begin_list(9);
                } else {
                    s.begin_list(6);
                }
                s.append(&tx.nonce);
                append_u256(&mut s, tx.gas_price.unwrap_or_default());
                s.append(&tx.gas);
                append_to(&mut s, tx.to);
                append_u256(&mut s, tx.value);
                s.append(&tx.input);
                if protected {
                    s.append(&self.chain_id);
                    s.append(&0u8);
                    s.append(&0u8);
                }
                keccak256(&s.out())
            }
            TxType::AccessList => {
                let mut s = RlpStream::new();
                s.begin_list(8);
                s.append(&self.chain_id);
                s.append(&tx.nonce);
                append_u256(&mut s, tx.gas_price.unwrap_or_default());
                s.append(&tx.gas);
                append_to(&mut s, tx.to);
                append_u256(&mut s, tx.value);
                s.append(&tx.input);
                s.append_list(&tx.access_list.0);
                let mut payload = vec![TxType::AccessList as u8];
                payload.extend_from_slice(&s.out());
                keccak256(&payload)
            }
            TxType::DynamicFee => {
                let mut s = RlpStream::new();
                s.begin_list(9);
                s.append(&self.chain_id);
                s.append(&tx.nonce);
                append_u256(&mut s, tx.tip.unwrap_or_default());
                append_u256(&mut s, tx.max_fee.unwrap_or_default());
                s.append(&tx.gas);
                append_to(&mut s, tx.to);
                append_u256(&mut s, tx.value);
                s.append(&tx.input);
                s.append_list(&tx.access_list.0);
                let mut payload = vec![TxType::DynamicFee as u8];
                payload.extend_from_slice(&s.out());
                keccak256(&payload)
            }
        }
    }
}

pub(crate) fn append_u256(s: &mut RlpStream, value: U256) {
    s.append(&value);
}

pub(crate) fn append_to(s: &mut RlpStream, to: Option<Address>) {
    match to {
        Some(addr) => s.append(&addr),
        None => s.append_empty_data(),
    };
}

// =============================================================================
// CONTRACT ADDRESS DERIVATION
// =============================================================================

/// CREATE address: `keccak(rlp([caller, nonce]))[12..]`.
#[must_use]
pub fn create_address(caller: Address, nonce: u64) -> Address {
    let mut s = RlpStream::new_list(2);
    s.append(&caller);
    s.append(&nonce);
    keccak256(&s.out()).to_address()
}

/// CREATE2 address: `keccak(0xff ‖ caller ‖ salt ‖ keccak(init_code))[12..]`.
#[must_use]
pub fn create2_address(caller: Address, salt: Hash, init_code_hash: Hash) -> Address {
    let mut buf = Vec::with_capacity(85);
    buf.push(0xff);
    buf.extend_from_slice(caller.as_bytes());
    buf.extend_from_slice(salt.as_bytes());
    buf.extend_from_slice(init_code_hash.as_bytes());
    keccak256(&buf).to_address()
}

// =============================================================================
// TESTS
// =============================================================================
