//! # Transactions
//!
//! The four transaction kinds the execution core accepts, their typed
//! wire envelopes (legacy RLP, 0x01 access-list, 0x02 dynamic-fee), and
//! the EIP-2930 access-list tuples.

use crate::crypto::{append_to, append_u256};
use crate::primitives::{keccak256, Address, Hash, U256};
use crate::DecodeError;
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};

// =============================================================================
// TRANSACTION TYPE
// =============================================================================

/// Transaction kind, matching the typed-envelope prefix byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TxType {
    /// Pre-typed transaction, plain RLP on the wire.
    Legacy = 0x00,
    /// EIP-2930 transaction with an explicit access list.
    AccessList = 0x01,
    /// EIP-1559 transaction with tip and fee cap.
    DynamicFee = 0x02,
    /// Internal system transaction injected by consensus; never on the wire.
    State = 0x7f,
}

impl TxType {
    /// Maps an envelope prefix byte to a transaction type.
    pub fn from_byte(byte: u8) -> Result<Self, DecodeError> {
        match byte {
            0x01 => Ok(Self::AccessList),
            0x02 => Ok(Self::DynamicFee),
            other => Err(DecodeError::UnknownTxType(other)),
        }
    }
}

// =============================================================================
// ACCESS LIST (EIP-2930)
// =============================================================================

/// One `(address, storage_keys)` tuple of an EIP-2930 access list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessEntry {
    /// Account the transaction pre-warms.
    pub address: Address,
    /// Storage slots pre-warmed under that account.
    pub storage_keys: Vec<Hash>,
}

impl Encodable for AccessEntry {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.address);
        s.append_list(&self.storage_keys);
    }
}

impl Decodable for AccessEntry {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        // Shape is fixed: exactly (address, [keys...]).
        if rlp.item_count()? != 2 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Ok(Self {
            address: rlp.val_at(0)?,
            storage_keys: rlp.list_at(1)?,
        })
    }
}

/// The full per-transaction access list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TxAccessList(pub Vec<AccessEntry>);

impl TxAccessList {
    /// Number of addresses in the list.
    #[must_use]
    pub fn address_count(&self) -> u64 {
        self.0.len() as u64
    }

    /// Total number of storage keys across all tuples.
    #[must_use]
    pub fn storage_key_count(&self) -> u64 {
        self.0.iter().map(|e| e.storage_keys.len() as u64).sum()
    }

    /// True when the list carries no tuples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// =============================================================================
// TRANSACTION
// =============================================================================

/// A transaction of any supported kind.
///
/// Fields that only exist for some kinds are optional; `get_gas_price`
/// and the codec select the right representation per `tx_type`.
#[derive(Clone, Debug, Default)]
pub struct Transaction {
    /// Transaction kind.
    pub tx_type: TxType,
    /// Chain id (typed transactions only).
    pub chain_id: Option<u64>,
    /// Sender nonce.
    pub nonce: u64,
    /// Gas price (legacy and access-list transactions).
    pub gas_price: Option<U256>,
    /// Max fee per gas (dynamic-fee transactions).
    pub max_fee: Option<U256>,
    /// Max priority fee per gas (dynamic-fee transactions).
    pub tip: Option<U256>,
    /// Gas limit purchased by the sender.
    pub gas: u64,
    /// Call target; `None` creates a contract.
    pub to: Option<Address>,
    /// Native value transferred.
    pub value: U256,
    /// Calldata or init code.
    pub input: Vec<u8>,
    /// EIP-2930 access list (typed transactions).
    pub access_list: TxAccessList,
    /// Signature v (legacy recovery id or typed y-parity).
    pub v: U256,
    /// Signature r.
    pub r: U256,
    /// Signature s.
    pub s: U256,
    /// Cached wire hash.
    pub hash: Hash,
    /// Recovered sender; zero until recovery (set directly for state txs).
    pub from: Address,
}

impl Default for TxType {
    fn default() -> Self {
        Self::Legacy
    }
}

impl Transaction {
    /// True when the transaction creates a contract.
    #[must_use]
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }

    /// Effective gas price against `base_fee`.
    ///
    /// Dynamic-fee transactions pay `min(tip + base_fee, max_fee)`; other
    /// kinds pay their declared gas price.
    #[must_use]
    pub fn get_gas_price(&self, base_fee: u64) -> U256 {
        if self.tx_type != TxType::DynamicFee {
            return self.gas_price.unwrap_or_default();
        }

        let max_fee = self.max_fee.unwrap_or_default();
        let tip = self.tip.unwrap_or_default();
        let with_base = tip.saturating_add(U256::from(base_fee));
        with_base.min(max_fee)
    }

    /// Worst-case wei the sender must hold up front:
    /// `gas · price + value` at the fee cap (or gas price).
    #[must_use]
    pub fn upfront_cost(&self, base_fee: u64) -> U256 {
        let price = match self.tx_type {
            TxType::DynamicFee => self.max_fee.unwrap_or_default(),
            _ => self.get_gas_price(base_fee),
        };
        price
            .saturating_mul(U256::from(self.gas))
            .saturating_add(self.value)
    }

    /// Computes and caches the wire hash of the marshalled transaction.
    pub fn compute_hash(&mut self) {
        self.hash = keccak256(&self.marshal());
    }

    // =========================================================================
    // WIRE CODEC
    // =========================================================================

    /// Marshals the transaction into its wire form: raw RLP for legacy,
    /// a type byte followed by the payload list for typed kinds.
    #[must_use]
    pub fn marshal(&self) -> Vec<u8> {
        match self.tx_type {
            TxType::Legacy | TxType::State => {
                let mut s = RlpStream::new_list(9);
                s.append(&self.nonce);
                append_u256(&mut s, self.gas_price.unwrap_or_default());
                s.append(&self.gas);
                append_to(&mut s, self.to);
                append_u256(&mut s, self.value);
                s.append(&self.input);
                append_u256(&mut s, self.v);
                append_u256(&mut s, self.r);
                append_u256(&mut s, self.s);
                s.out().to_vec()
            }
            TxType::AccessList => {
                let mut s = RlpStream::new_list(11);
                s.append(&self.chain_id.unwrap_or_default());
                s.append(&self.nonce);
                append_u256(&mut s, self.gas_price.unwrap_or_default());
                s.append(&self.gas);
                append_to(&mut s, self.to);
                append_u256(&mut s, self.value);
                s.append(&self.input);
                s.append_list(&self.access_list.0);
                append_u256(&mut s, self.v);
                append_u256(&mut s, self.r);
                append_u256(&mut s, self.s);
                let mut out = vec![TxType::AccessList as u8];
                out.extend_from_slice(&s.out());
                out
            }
            TxType::DynamicFee => {
                let mut s = RlpStream::new_list(12);
                s.append(&self.chain_id.unwrap_or_default());
                s.append(&self.nonce);
                append_u256(&mut s, self.tip.unwrap_or_default());
                append_u256(&mut s, self.max_fee.unwrap_or_default());
                s.append(&self.gas);
                append_to(&mut s, self.to);
                append_u256(&mut s, self.value);
                s.append(&self.input);
                s.append_list(&self.access_list.0);
                append_u256(&mut s, self.v);
                append_u256(&mut s, self.r);
                append_u256(&mut s, self.s);
                let mut out = vec![TxType::DynamicFee as u8];
                out.extend_from_slice(&s.out());
                out
            }
        }
    }

    /// Unmarshals a transaction from its wire form.
    pub fn unmarshal(raw: &[u8]) -> Result<Self, DecodeError> {
        let first = *raw.first().ok_or(DecodeError::EmptyInput)?;

        // Legacy transactions are bare RLP lists; an RLP list payload always
        // starts at 0xc0 or above, so lower bytes are typed envelopes.
        if first >= 0xc0 {
            return Self::unmarshal_legacy(raw);
        }

        let tx_type = TxType::from_byte(first)?;
        let rlp = Rlp::new(&raw[1..]);
        let mut tx = match tx_type {
            TxType::AccessList => {
                if rlp.item_count()? != 11 {
                    return Err(DecodeError::BadRlp("access-list tx needs 11 items".into()));
                }
                Transaction {
                    tx_type,
                    chain_id: Some(rlp.val_at(0)?),
                    nonce: rlp.val_at(1)?,
                    gas_price: Some(rlp.val_at(2)?),
                    gas: rlp.val_at(3)?,
                    to: decode_to(&rlp, 4)?,
                    value: rlp.val_at(5)?,
                    input: rlp.val_at(6)?,
                    access_list: TxAccessList(rlp.list_at(7)?),
                    v: rlp.val_at(8)?,
                    r: rlp.val_at(9)?,
                    s: rlp.val_at(10)?,
                    ..Transaction::default()
                }
            }
            TxType::DynamicFee => {
                if rlp.item_count()? != 12 {
                    return Err(DecodeError::BadRlp("dynamic-fee tx needs 12 items".into()));
                }
                Transaction {
                    tx_type,
                    chain_id: Some(rlp.val_at(0)?),
                    nonce: rlp.val_at(1)?,
                    tip: Some(rlp.val_at(2)?),
                    max_fee: Some(rlp.val_at(3)?),
                    gas: rlp.val_at(4)?,
                    to: decode_to(&rlp, 5)?,
                    value: rlp.val_at(6)?,
                    input: rlp.val_at(7)?,
                    access_list: TxAccessList(rlp.list_at(8)?),
                    v: rlp.val_at(9)?,
                    r: rlp.val_at(10)?,
                    s: rlp.val_at(11)?,
                    ..Transaction::default()
                }
            }
            TxType::Legacy | TxType::State => unreachable!("filtered by from_byte"),
        };

        tx.hash = keccak256(raw);
        Ok(tx)
    }

    fn unmarshal_legacy(raw: &[u8]) -> Result<Self, DecodeError> {
        let rlp = Rlp::new(raw);
        if rlp.item_count()? != 9 {
            return Err(DecodeError::BadRlp("legacy tx needs 9 items".into()));
        }

        let mut tx = Transaction {
            tx_type: TxType::Legacy,
            nonce: rlp.val_at(0)?,
            gas_price: Some(rlp.val_at(1)?),
            gas: rlp.val_at(2)?,
            to: decode_to(&rlp, 3)?,
            value: rlp.val_at(4)?,
            input: rlp.val_at(5)?,
            v: rlp.val_at(6)?,
            r: rlp.val_at(7)?,
            s: rlp.val_at(8)?,
            ..Transaction::default()
        };
        tx.hash = keccak256(raw);
        Ok(tx)
    }
}

fn decode_to(rlp: &Rlp, index: usize) -> Result<Option<Address>, DecodeError> {
    let item = rlp.at(index)?;
    let data = item.data()?;
    if data.is_empty() {
        Ok(None)
    } else {
        Address::from_slice(data)
            .map(Some)
            .ok_or_else(|| DecodeError::BadRlp("to field must be 20 bytes".into()))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_access_list() -> TxAccessList {
        TxAccessList(vec![
            AccessEntry {
                address: Address::new([1u8; 20]),
                storage_keys: vec![Hash::from_u256(U256::one()), Hash::from_u256(U256::from(2))],
            },
            AccessEntry {
                address: Address::new([2u8; 20]),
                storage_keys: vec![Hash::ZERO],
            },
        ])
    }

    #[test]
    fn test_legacy_round_trip() {
        let mut tx = Transaction {
            tx_type: TxType::Legacy,
            nonce: 7,
            gas_price: Some(U256::from(2_000_000_000u64)),
            gas: 21_000,
            to: Some(Address::new([9u8; 20])),
            value: U256::from(1_000_000_000_000u64),
            input: vec![],
            v: U256::from(27),
            r: U256::from(1),
            s: U256::from(2),
            ..Transaction::default()
        };
        tx.compute_hash();

        let decoded = Transaction::unmarshal(&tx.marshal()).unwrap();
        assert_eq!(decoded.nonce, tx.nonce);
        assert_eq!(decoded.gas_price, tx.gas_price);
        assert_eq!(decoded.to, tx.to);
        assert_eq!(decoded.value, tx.value);
        assert_eq!(decoded.hash, tx.hash);
    }

    #[test]
    fn test_access_list_round_trip() {
        let tx = Transaction {
            tx_type: TxType::AccessList,
            chain_id: Some(100),
            nonce: 1,
            gas_price: Some(U256::from(10u64)),
            gas: 60_000,
            to: Some(Address::new([3u8; 20])),
            value: U256::zero(),
            input: vec![0xca, 0xfe],
            access_list: sample_access_list(),
            v: U256::one(),
            r: U256::from(11),
            s: U256::from(12),
            ..Transaction::default()
        };

        let raw = tx.marshal();
        assert_eq!(raw[0], 0x01);

        let decoded = Transaction::unmarshal(&raw).unwrap();
        assert_eq!(decoded.tx_type, TxType::AccessList);
        assert_eq!(decoded.chain_id, Some(100));
        assert_eq!(decoded.access_list, tx.access_list);
        assert_eq!(decoded.input, tx.input);
    }

    #[test]
    fn test_dynamic_fee_round_trip_creation() {
        let tx = Transaction {
            tx_type: TxType::DynamicFee,
            chain_id: Some(100),
            nonce: 0,
            tip: Some(U256::from(1_000_000_000u64)),
            max_fee: Some(U256::from(30_000_000_000u64)),
            gas: 1_000_000,
            to: None,
            value: U256::zero(),
            input: vec![0x60, 0x00, 0x60, 0x00],
            v: U256::zero(),
            r: U256::from(5),
            s: U256::from(6),
            ..Transaction::default()
        };

        let raw = tx.marshal();
        assert_eq!(raw[0], 0x02);

        let decoded = Transaction::unmarshal(&raw).unwrap();
        assert!(decoded.is_contract_creation());
        assert_eq!(decoded.tip, tx.tip);
        assert_eq!(decoded.max_fee, tx.max_fee);
        assert_eq!(decoded.input, tx.input);
    }

    #[test]
    fn test_access_entry_shape_violation() {
        // A 3-item tuple is a decode error, not a silently ignored field.
        let mut s = RlpStream::new_list(3);
        s.append(&Address::ZERO);
        s.append_list::<Hash, Hash>(&[]);
        s.append(&7u8);
        let bad = s.out();
        assert!(rlp::decode::<AccessEntry>(&bad).is_err());
    }

    #[test]
    fn test_unknown_type_byte() {
        assert!(matches!(
            Transaction::unmarshal(&[0x05, 0xc0]),
            Err(DecodeError::UnknownTxType(0x05))
        ));
    }

    #[test]
    fn test_effective_gas_price() {
        let tx = Transaction {
            tx_type: TxType::DynamicFee,
            tip: Some(U256::from(2u64)),
            max_fee: Some(U256::from(10u64)),
            ..Transaction::default()
        };
        // tip + base below cap
        assert_eq!(tx.get_gas_price(5), U256::from(7));
        // capped
        assert_eq!(tx.get_gas_price(50), U256::from(10));
    }
}
