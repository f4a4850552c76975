//! # In-Memory State Backend
//!
//! A deterministic, hash-addressed world store. Production nodes back
//! the [`Snapshot`] trait with a trie over a KV store; this backend
//! keeps whole worlds in memory, which is what genesis writes and the
//! test suites need. Roots are the Keccak-256 of a canonical encoding,
//! so identical allocations always produce identical roots.

use super::{Account, Snapshot, StateBackend, StateObject};
use crate::errors::StateError;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use xgr_types::{keccak256, Address, Hash, U256};

/// Full account materialisation inside one world.
#[derive(Clone, Debug, Default)]
struct WorldAccount {
    nonce: u64,
    balance: U256,
    code: Vec<u8>,
    storage: BTreeMap<Hash, Hash>,
}

/// One committed world, keyed by address.
#[derive(Clone, Debug, Default)]
struct World {
    accounts: BTreeMap<Address, WorldAccount>,
}

impl World {
    /// Canonical root: Keccak over the sorted account encoding.
    fn root(&self) -> Hash {
        let mut buf = Vec::new();
        for (addr, account) in &self.accounts {
            buf.extend_from_slice(addr.as_bytes());
            buf.extend_from_slice(&account.nonce.to_be_bytes());
            let mut balance = [0u8; 32];
            account.balance.to_big_endian(&mut balance);
            buf.extend_from_slice(&balance);
            buf.extend_from_slice(keccak256(&account.code).as_bytes());
            for (key, value) in &account.storage {
                buf.extend_from_slice(key.as_bytes());
                buf.extend_from_slice(value.as_bytes());
            }
        }
        keccak256(&buf)
    }

    fn apply(&mut self, objects: &[StateObject]) {
        for object in objects {
            if object.deleted {
                self.accounts.remove(&object.address);
                continue;
            }

            let account = self.accounts.entry(object.address).or_default();
            account.nonce = object.nonce;
            account.balance = object.balance;
            if let Some(code) = &object.code {
                account.code = code.clone();
            }
            for (key, value) in &object.storage {
                if value.is_zero() {
                    account.storage.remove(key);
                } else {
                    account.storage.insert(*key, *value);
                }
            }
        }
    }
}

/// Shared store of committed worlds keyed by root.
type WorldStore = Arc<RwLock<HashMap<Hash, World>>>;

/// In-memory implementation of [`StateBackend`].
#[derive(Clone, Default)]
pub struct InMemoryState {
    worlds: WorldStore,
}

impl InMemoryState {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateBackend for InMemoryState {
    fn new_snapshot(&self) -> Arc<dyn Snapshot> {
        Arc::new(InMemorySnapshot {
            world: World::default(),
            worlds: Arc::clone(&self.worlds),
        })
    }

    fn new_snapshot_at(&self, root: Hash) -> Result<Arc<dyn Snapshot>, StateError> {
        let worlds = self.worlds.read();
        let world = worlds.get(&root).ok_or(StateError::UnknownRoot(root))?;
        Ok(Arc::new(InMemorySnapshot {
            world: world.clone(),
            worlds: Arc::clone(&self.worlds),
        }))
    }
}

/// Snapshot of one world.
struct InMemorySnapshot {
    world: World,
    worlds: WorldStore,
}

impl Snapshot for InMemorySnapshot {
    fn get_account(&self, addr: Address) -> Option<Account> {
        self.world.accounts.get(&addr).map(|account| Account {
            nonce: account.nonce,
            balance: account.balance,
            code_hash: keccak256(&account.code),
            storage_root: Hash::ZERO,
        })
    }

    fn get_storage(&self, addr: Address, key: Hash) -> Hash {
        self.world
            .accounts
            .get(&addr)
            .and_then(|account| account.storage.get(&key).copied())
            .unwrap_or(Hash::ZERO)
    }

    fn get_code(&self, code_hash: Hash) -> Option<Vec<u8>> {
        self.world
            .accounts
            .values()
            .find(|account| keccak256(&account.code) == code_hash)
            .map(|account| account.code.clone())
    }

    fn commit(&self, objects: &[StateObject]) -> Result<(Arc<dyn Snapshot>, Hash), StateError> {
        let mut next = self.world.clone();
        next.apply(objects);
        let root = next.root();

        self.worlds.write().insert(root, next.clone());

        Ok((
            Arc::new(InMemorySnapshot {
                world: next,
                worlds: Arc::clone(&self.worlds),
            }),
            root,
        ))
    }
}

// =============================================================================
// TESTS
// =============================================================================
