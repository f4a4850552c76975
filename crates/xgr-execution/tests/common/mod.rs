//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::sync::Arc;
use xgr_execution::chain::{ChainParams, Forks};
use xgr_execution::prelude::*;
use xgr_types::genesis::{GenesisAccount, GenesisAlloc};
use xgr_types::header::Header;
use xgr_types::receipt::{Log, Receipt};
use xgr_types::transaction::{Transaction, TxType};
use xgr_types::{keccak256, Address, Hash, U256};

/// One ether in wei.
pub const ETHER: u64 = 1_000_000_000_000_000_000;

pub fn addr(byte: u8) -> Address {
    Address::new([byte; 20])
}

pub fn word(n: u64) -> Hash {
    Hash::from_u256(U256::from(n))
}

pub fn default_params() -> ChainParams {
    ChainParams {
        chain_id: 100,
        forks: Forks::all_from_genesis(),
        ..ChainParams::default()
    }
}

pub fn funded_account(wei: u64) -> GenesisAccount {
    GenesisAccount {
        balance: Some(U256::from(wei)),
        ..GenesisAccount::default()
    }
}

pub fn contract_account(code: Vec<u8>) -> GenesisAccount {
    GenesisAccount {
        code: Some(code),
        ..GenesisAccount::default()
    }
}

/// Builds an executor over a fresh in-memory backend and commits the
/// genesis allocation.
pub fn executor_with_genesis(params: ChainParams, alloc: &GenesisAlloc) -> (Executor, Hash) {
    let backend: Arc<dyn StateBackend> = Arc::new(InMemoryState::new());
    let executor = Executor::new(params, backend);
    let root = executor.write_genesis(alloc, Hash::ZERO).expect("genesis");
    (executor, root)
}

pub fn header(number: u64) -> Header {
    Header {
        number,
        timestamp: 1_700_000_000,
        gas_limit: 30_000_000,
        difficulty: 0,
        base_fee: 0,
        miner: addr(0xcb),
        parent_root: Hash::ZERO,
    }
}

/// A legacy transaction with `from` pre-resolved (no signature).
pub fn legacy_tx(from: Address, to: Option<Address>, value: u64, gas: u64, price: u64) -> Transaction {
    let mut tx = Transaction {
        tx_type: TxType::Legacy,
        nonce: 0,
        gas_price: Some(U256::from(price)),
        gas,
        to,
        value: U256::from(value),
        from,
        ..Transaction::default()
    };
    tx.compute_hash();
    tx
}

/// Finds the synthetic fee-split log of a receipt and decodes its
/// `(donation, validator, burned)` words.
pub fn decode_fee_split(receipt: &Receipt) -> (U256, U256, U256) {
    let topic = keccak256(b"XGRFeeSplit(uint256,uint256,uint256)");
    let log: &Log = receipt
        .logs
        .iter()
        .find(|log| log.topics.first() == Some(&topic))
        .expect("fee split log present");
    assert_eq!(log.data.len(), 96);
    (
        U256::from_big_endian(&log.data[..32]),
        U256::from_big_endian(&log.data[32..64]),
        U256::from_big_endian(&log.data[64..96]),
    )
}
