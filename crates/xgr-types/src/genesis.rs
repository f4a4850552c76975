//! # Genesis Allocations & State Overrides
//!
//! Inputs for `write_genesis` and for read-path state overrides.

use crate::primitives::{Address, Hash, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One account of the genesis allocation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GenesisAccount {
    /// Initial balance in wei.
    pub balance: Option<U256>,
    /// Initial nonce.
    #[serde(default)]
    pub nonce: u64,
    /// Deployed code.
    pub code: Option<Vec<u8>>,
    /// Pre-seeded storage.
    #[serde(default)]
    pub storage: BTreeMap<Hash, Hash>,
}

/// The full genesis allocation, keyed by address.
pub type GenesisAlloc = BTreeMap<Address, GenesisAccount>;

/// Per-address override for read-path executions.
///
/// `state` replaces the whole storage of the account; `state_diff` patches
/// individual slots. The two are mutually exclusive.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AccountOverride {
    /// Override nonce.
    pub nonce: Option<u64>,
    /// Override balance.
    pub balance: Option<U256>,
    /// Override code.
    pub code: Option<Vec<u8>>,
    /// Replace the full storage.
    pub state: Option<BTreeMap<Hash, Hash>>,
    /// Patch individual slots.
    pub state_diff: Option<BTreeMap<Hash, Hash>>,
}

/// A set of account overrides keyed by address.
pub type StateOverride = BTreeMap<Address, AccountOverride>;
