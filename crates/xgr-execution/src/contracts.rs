//! # Well-Known Contract Addresses
//!
//! Fixed addresses the execution core treats specially: the system
//! caller, chain-specific precompiles, allow/block list contracts, and
//! the synthetic fee-split log emitter.

use xgr_types::Address;

/// Sender of internal state transactions.
#[must_use]
pub fn system_caller() -> Address {
    Address::from_hex("0xffffFFFfFFffffffffffffffFfFFFfffFFFfFFfE")
}

/// Gas limit every state transaction must declare.
pub const STATE_TRANSACTION_GAS_LIMIT: u64 = 1_000_000;

/// Native-transfer precompile.
#[must_use]
pub fn native_transfer_precompile() -> Address {
    Address::from_hex("0x0000000000000000000000000000000000002020")
}

/// BLS aggregate-signature verification precompile.
#[must_use]
pub fn bls_agg_verify_precompile() -> Address {
    Address::from_hex("0x0000000000000000000000000000000000002030")
}

/// Engine-execute precompile; also the account holding engine session state.
#[must_use]
pub fn engine_execute_precompile() -> Address {
    Address::from_hex("0x0000000000000000000000000000000000002040")
}

/// Debug console precompile.
#[must_use]
pub fn console_precompile() -> Address {
    Address::from_hex("0x000000000000000000000000000000000000c0de")
}

/// Contract-deployer allow list.
#[must_use]
pub fn allow_list_contracts_addr() -> Address {
    Address::from_hex("0x0200000000000000000000000000000000000000")
}

/// Transaction-sender allow list.
#[must_use]
pub fn allow_list_transactions_addr() -> Address {
    Address::from_hex("0x0200000000000000000000000000000000000002")
}

/// Contract-deployer block list.
#[must_use]
pub fn block_list_contracts_addr() -> Address {
    Address::from_hex("0x0300000000000000000000000000000000000000")
}

/// Transaction-sender block list.
#[must_use]
pub fn block_list_transactions_addr() -> Address {
    Address::from_hex("0x0300000000000000000000000000000000000002")
}

/// Synthetic fee-split log emitter.
#[must_use]
pub fn fee_split_log_addr() -> Address {
    Address::from_hex("0x000000000000000000000000000000000000fEE1")
}
