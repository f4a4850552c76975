//! # State Layer
//!
//! The snapshot abstraction over persisted world state, the journaled
//! per-block transaction overlay, and an in-memory backend used for
//! genesis writes and tests.
//!
//! A [`Snapshot`] is a read-only view of the world at one root. A
//! [`Txn`](journal::Txn) overlays journaled mutations on top of a
//! snapshot; `commit` turns the overlay into [`StateObject`] records
//! which the snapshot folds into a new root.

pub mod inmem;
pub mod journal;

use crate::errors::StateError;
use std::sync::Arc;
use xgr_types::{empty_code_hash, Address, Hash, U256};

// =============================================================================
// ACCOUNT
// =============================================================================

/// A persisted account as stored under a state root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    /// Transaction count / creation counter.
    pub nonce: u64,
    /// Balance in wei.
    pub balance: U256,
    /// Keccak-256 of the deployed code.
    pub code_hash: Hash,
    /// Storage commitment, opaque to the execution core.
    pub storage_root: Hash,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            nonce: 0,
            balance: U256::zero(),
            code_hash: empty_code_hash(),
            storage_root: Hash::ZERO,
        }
    }
}

impl Account {
    /// EIP-158 emptiness: zero nonce, zero balance, no code.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nonce == 0
            && self.balance.is_zero()
            && (self.code_hash == empty_code_hash() || self.code_hash.is_zero())
    }
}

// =============================================================================
// COMMIT RECORD
// =============================================================================

/// One dirty account as produced by `Txn::commit`, ready to be folded
/// into a snapshot.
#[derive(Clone, Debug, Default)]
pub struct StateObject {
    /// Account address.
    pub address: Address,
    /// Final nonce.
    pub nonce: u64,
    /// Final balance.
    pub balance: U256,
    /// Code set during the block, if any.
    pub code: Option<Vec<u8>>,
    /// Dirty storage slots in deterministic order.
    pub storage: Vec<(Hash, Hash)>,
    /// True when the account must be removed (suicide or EIP-158 cull).
    pub deleted: bool,
}

// =============================================================================
// SNAPSHOT & BACKEND TRAITS
// =============================================================================

/// Read-only world state at one root, plus the commit path producing
/// the next root.
pub trait Snapshot: Send + Sync {
    /// Loads an account, or `None` if it does not exist.
    fn get_account(&self, addr: Address) -> Option<Account>;

    /// Reads a storage slot; zero when absent.
    fn get_storage(&self, addr: Address, key: Hash) -> Hash;

    /// Loads code by its hash.
    fn get_code(&self, code_hash: Hash) -> Option<Vec<u8>>;

    /// Folds commit records into a new snapshot and returns it with its
    /// root.
    fn commit(&self, objects: &[StateObject]) -> Result<(Arc<dyn Snapshot>, Hash), StateError>;
}

/// Factory for snapshots at arbitrary roots.
pub trait StateBackend: Send + Sync {
    /// Snapshot of the empty world.
    fn new_snapshot(&self) -> Arc<dyn Snapshot>;

    /// Snapshot at a previously committed root.
    fn new_snapshot_at(&self, root: Hash) -> Result<Arc<dyn Snapshot>, StateError>;
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_empty() {
        assert!(Account::default().is_empty());

        let funded = Account {
            balance: U256::one(),
            ..Account::default()
        };
        assert!(!funded.is_empty());

        let used = Account {
            nonce: 1,
            ..Account::default()
        };
        assert!(!used.is_empty());
    }
}
