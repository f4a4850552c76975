//! # Journaled Transaction State
//!
//! `Txn` overlays a block's mutations on a read-only [`Snapshot`].
//! Every mutation appends an undo entry; a snapshot id is simply the
//! journal length at the time it was taken, and revert truncates back
//! to it. That keeps reverts O(Δ) and composes strictly LIFO across
//! nested call frames.

use super::{Account, Snapshot, StateObject};
use crate::chain::ForkConfig;
use crate::errors::{StateError, VmError};
use crate::host::StorageStatus;
use std::collections::BTreeMap;
use std::sync::Arc;
use xgr_types::receipt::Log;
use xgr_types::{empty_code_hash, keccak256, Address, Hash, U256};

// =============================================================================
// OVERLAY OBJECT
// =============================================================================

/// One account in the dirty overlay.
#[derive(Clone, Debug)]
struct TxnAccount {
    account: Account,
    /// Code once loaded or rewritten.
    code: Option<Vec<u8>>,
    /// True when `code` was written in this block.
    dirty_code: bool,
    /// Dirty storage slots only; clean reads go to the snapshot.
    storage: BTreeMap<Hash, Hash>,
    suicided: bool,
    touched: bool,
    deleted: bool,
}

impl TxnAccount {
    fn from_snapshot(account: Account) -> Self {
        Self {
            account,
            code: None,
            dirty_code: false,
            storage: BTreeMap::new(),
            suicided: false,
            touched: false,
            deleted: false,
        }
    }

    fn is_empty(&self) -> bool {
        self.account.is_empty()
    }
}

// =============================================================================
// JOURNAL ENTRIES
// =============================================================================

/// Undo records; each stores whatever the mutation overwrote.
#[derive(Clone, Debug)]
enum JournalEntry {
    /// Overlay entry freshly cloned from the snapshot; undo removes it.
    Loaded { addr: Address },
    /// Overlay entry replaced wholesale (account creation).
    Replaced {
        addr: Address,
        prev: Option<Box<TxnAccount>>,
    },
    Balance { addr: Address, prev: U256 },
    Nonce { addr: Address, prev: u64 },
    Code {
        addr: Address,
        prev_code: Option<Vec<u8>>,
        prev_dirty: bool,
        prev_hash: Hash,
    },
    Storage {
        addr: Address,
        key: Hash,
        prev: Option<Hash>,
    },
    Transient {
        addr: Address,
        key: Hash,
        prev: Option<Hash>,
    },
    Suicided { addr: Address, prev: bool },
    Touched { addr: Address, prev: bool },
    Refund { prev: u64 },
    Log,
}

/// Result of an overlay lookup.
enum Lookup<'a> {
    /// Deleted earlier in this block; reads see nothing.
    Deleted,
    /// Present in the overlay.
    Live(&'a TxnAccount),
    /// Never loaded; fall through to the snapshot.
    Missing,
}

// =============================================================================
// TXN
// =============================================================================

/// The journaled transaction state for one block.
pub struct Txn {
    snapshot: Arc<dyn Snapshot>,
    objects: BTreeMap<Address, TxnAccount>,
    journal: Vec<JournalEntry>,
    logs: Vec<Log>,
    refund: u64,
    transient: BTreeMap<(Address, Hash), Hash>,
}

impl Txn {
    /// Creates an empty overlay on `snapshot`.
    #[must_use]
    pub fn new(snapshot: Arc<dyn Snapshot>) -> Self {
        Self {
            snapshot,
            objects: BTreeMap::new(),
            journal: Vec::new(),
            logs: Vec::new(),
            refund: 0,
            transient: BTreeMap::new(),
        }
    }

    // =========================================================================
    // SNAPSHOT / REVERT
    // =========================================================================

    /// Names the current journal depth.
    #[must_use]
    pub fn snapshot(&self) -> usize {
        self.journal.len()
    }

    /// Discards all mutations and logs recorded after `id`.
    pub fn revert_to_snapshot(&mut self, id: usize) -> Result<(), StateError> {
        if id > self.journal.len() {
            return Err(StateError::InvalidSnapshotId(id));
        }

        while self.journal.len() > id {
            let entry = self.journal.pop().expect("length checked");
            self.undo(entry);
        }
        Ok(())
    }

    fn undo(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::Loaded { addr } => {
                self.objects.remove(&addr);
            }
            JournalEntry::Replaced { addr, prev } => match prev {
                Some(prev) => {
                    self.objects.insert(addr, *prev);
                }
                None => {
                    self.objects.remove(&addr);
                }
            },
            JournalEntry::Balance { addr, prev } => {
                if let Some(object) = self.objects.get_mut(&addr) {
                    object.account.balance = prev;
                }
            }
            JournalEntry::Nonce { addr, prev } => {
                if let Some(object) = self.objects.get_mut(&addr) {
                    object.account.nonce = prev;
                }
            }
            JournalEntry::Code {
                addr,
                prev_code,
                prev_dirty,
                prev_hash,
            } => {
                if let Some(object) = self.objects.get_mut(&addr) {
                    object.code = prev_code;
                    object.dirty_code = prev_dirty;
                    object.account.code_hash = prev_hash;
                }
            }
            JournalEntry::Storage { addr, key, prev } => {
                if let Some(object) = self.objects.get_mut(&addr) {
                    match prev {
                        Some(value) => {
                            object.storage.insert(key, value);
                        }
                        None => {
                            object.storage.remove(&key);
                        }
                    }
                }
            }
            JournalEntry::Transient { addr, key, prev } => match prev {
                Some(value) => {
                    self.transient.insert((addr, key), value);
                }
                None => {
                    self.transient.remove(&(addr, key));
                }
            },
            JournalEntry::Suicided { addr, prev } => {
                if let Some(object) = self.objects.get_mut(&addr) {
                    object.suicided = prev;
                }
            }
            JournalEntry::Touched { addr, prev } => {
                if let Some(object) = self.objects.get_mut(&addr) {
                    object.touched = prev;
                }
            }
            JournalEntry::Refund { prev } => {
                self.refund = prev;
            }
            JournalEntry::Log => {
                self.logs.pop();
            }
        }
    }

    /// Clones the account from the snapshot into the overlay on first
    /// mutation; the load itself is journaled so reverts drop it again.
    /// Writing to an account deleted earlier in the block starts from a
    /// fresh empty account, never from the pre-block snapshot.
    fn ensure_object(&mut self, addr: Address) -> &mut TxnAccount {
        let deleted = self.objects.get(&addr).is_some_and(|object| object.deleted);
        if deleted {
            let prev = self.objects.get(&addr).cloned().map(Box::new);
            self.objects
                .insert(addr, TxnAccount::from_snapshot(Account::default()));
            self.journal.push(JournalEntry::Replaced { addr, prev });
        } else if !self.objects.contains_key(&addr) {
            let account = self.snapshot.get_account(addr).unwrap_or_default();
            self.objects.insert(addr, TxnAccount::from_snapshot(account));
            self.journal.push(JournalEntry::Loaded { addr });
        }
        self.objects.get_mut(&addr).expect("just inserted")
    }

    fn mark_touched(&mut self, addr: Address) {
        let object = self.ensure_object(addr);
        if !object.touched {
            object.touched = true;
            self.journal.push(JournalEntry::Touched { addr, prev: false });
        }
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Overlay lookup distinguishing "deleted this block" from "never
    /// loaded": deleted accounts must not fall back to the snapshot.
    fn lookup(&self, addr: Address) -> Lookup<'_> {
        match self.objects.get(&addr) {
            Some(object) if object.deleted => Lookup::Deleted,
            Some(object) => Lookup::Live(object),
            None => Lookup::Missing,
        }
    }

    /// True when the account exists (in the overlay or the snapshot).
    #[must_use]
    pub fn exist(&self, addr: Address) -> bool {
        match self.lookup(addr) {
            Lookup::Deleted => false,
            Lookup::Live(_) => true,
            Lookup::Missing => self.snapshot.get_account(addr).is_some(),
        }
    }

    /// EIP-158 emptiness of the account.
    #[must_use]
    pub fn empty(&self, addr: Address) -> bool {
        match self.lookup(addr) {
            Lookup::Deleted => true,
            Lookup::Live(object) => object.is_empty(),
            Lookup::Missing => self
                .snapshot
                .get_account(addr)
                .map_or(true, |account| account.is_empty()),
        }
    }

    /// Current balance; zero for missing accounts.
    #[must_use]
    pub fn get_balance(&self, addr: Address) -> U256 {
        match self.lookup(addr) {
            Lookup::Deleted => U256::zero(),
            Lookup::Live(object) => object.account.balance,
            Lookup::Missing => self
                .snapshot
                .get_account(addr)
                .map_or_else(U256::zero, |account| account.balance),
        }
    }

    /// Current nonce; zero for missing accounts.
    #[must_use]
    pub fn get_nonce(&self, addr: Address) -> u64 {
        match self.lookup(addr) {
            Lookup::Deleted => 0,
            Lookup::Live(object) => object.account.nonce,
            Lookup::Missing => self
                .snapshot
                .get_account(addr)
                .map_or(0, |account| account.nonce),
        }
    }

    /// Code hash; zero for missing accounts.
    #[must_use]
    pub fn get_code_hash(&self, addr: Address) -> Hash {
        match self.lookup(addr) {
            Lookup::Deleted => Hash::ZERO,
            Lookup::Live(object) => object.account.code_hash,
            Lookup::Missing => self
                .snapshot
                .get_account(addr)
                .map_or(Hash::ZERO, |account| account.code_hash),
        }
    }

    /// Deployed code; empty for missing accounts and EOAs.
    #[must_use]
    pub fn get_code(&self, addr: Address) -> Vec<u8> {
        match self.lookup(addr) {
            Lookup::Deleted => Vec::new(),
            Lookup::Live(object) => {
                if let Some(code) = &object.code {
                    return code.clone();
                }
                self.snapshot
                    .get_code(object.account.code_hash)
                    .unwrap_or_default()
            }
            Lookup::Missing => match self.snapshot.get_account(addr) {
                Some(account) => self.snapshot.get_code(account.code_hash).unwrap_or_default(),
                None => Vec::new(),
            },
        }
    }

    /// Deployed code size.
    #[must_use]
    pub fn get_code_size(&self, addr: Address) -> usize {
        self.get_code(addr).len()
    }

    /// Current storage value (dirty overlay first, then snapshot).
    #[must_use]
    pub fn get_state(&self, addr: Address, key: Hash) -> Hash {
        if let Some(object) = self.objects.get(&addr) {
            if object.deleted {
                return Hash::ZERO;
            }
            if let Some(value) = object.storage.get(&key) {
                return *value;
            }
        }
        self.snapshot.get_storage(addr, key)
    }

    /// Storage value as committed under the parent root, ignoring all
    /// block-local writes (the EIP-2200 "original" value).
    #[must_use]
    pub fn get_committed_state(&self, addr: Address, key: Hash) -> Hash {
        self.snapshot.get_storage(addr, key)
    }

    /// Accumulated refund counter.
    #[must_use]
    pub fn get_refund(&self) -> u64 {
        self.refund
    }

    /// True when `addr` self-destructed in this block.
    #[must_use]
    pub fn has_suicided(&self, addr: Address) -> bool {
        self.objects
            .get(&addr)
            .is_some_and(|object| object.suicided)
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Touches the account without changing it (EIP-158 tracking for
    /// call targets).
    pub fn touch_account(&mut self, addr: Address) {
        self.mark_touched(addr);
    }

    /// Credits `amount` wei. A zero credit still touches the account,
    /// which matters for EIP-158 culling.
    pub fn add_balance(&mut self, addr: Address, amount: U256) {
        self.mark_touched(addr);
        let object = self.ensure_object(addr);
        let prev = object.account.balance;
        object.account.balance = prev.saturating_add(amount);
        self.journal.push(JournalEntry::Balance { addr, prev });
    }

    /// Debits `amount` wei; fails when the balance is short.
    pub fn sub_balance(&mut self, addr: Address, amount: U256) -> Result<(), VmError> {
        if self.get_balance(addr) < amount {
            return Err(VmError::NotEnoughFunds);
        }
        self.mark_touched(addr);
        let object = self.ensure_object(addr);
        let prev = object.account.balance;
        object.account.balance = prev - amount;
        self.journal.push(JournalEntry::Balance { addr, prev });
        Ok(())
    }

    /// Overwrites the balance.
    pub fn set_balance(&mut self, addr: Address, balance: U256) {
        self.mark_touched(addr);
        let object = self.ensure_object(addr);
        let prev = object.account.balance;
        object.account.balance = balance;
        self.journal.push(JournalEntry::Balance { addr, prev });
    }

    /// Overwrites the nonce.
    pub fn set_nonce(&mut self, addr: Address, nonce: u64) {
        self.mark_touched(addr);
        let object = self.ensure_object(addr);
        let prev = object.account.nonce;
        object.account.nonce = nonce;
        self.journal.push(JournalEntry::Nonce { addr, prev });
    }

    /// Increments the nonce; fails on wrap.
    pub fn incr_nonce(&mut self, addr: Address) -> Result<(), VmError> {
        let current = self.get_nonce(addr);
        let next = current.checked_add(1).ok_or(VmError::NonceUintOverflow)?;
        self.set_nonce(addr, next);
        Ok(())
    }

    /// Replaces the account code.
    pub fn set_code(&mut self, addr: Address, code: Vec<u8>) {
        self.mark_touched(addr);
        let hash = keccak256(&code);
        let (prev_code, prev_dirty, prev_hash) = {
            let object = self.ensure_object(addr);
            (object.code.clone(), object.dirty_code, object.account.code_hash)
        };
        self.journal.push(JournalEntry::Code {
            addr,
            prev_code,
            prev_dirty,
            prev_hash,
        });

        let object = self.objects.get_mut(&addr).expect("ensured");
        object.code = Some(code);
        object.dirty_code = true;
        object.account.code_hash = hash;
    }

    /// Writes a storage slot directly.
    pub fn set_state(&mut self, addr: Address, key: Hash, value: Hash) {
        self.mark_touched(addr);
        let object = self.ensure_object(addr);
        let prev = object.storage.insert(key, value);
        self.journal.push(JournalEntry::Storage { addr, key, prev });
    }

    /// Replaces the whole storage of an account (state-override reads).
    pub fn set_full_storage(&mut self, addr: Address, storage: &BTreeMap<Hash, Hash>) {
        // Full replacement is only reachable from override paths where the
        // snapshot storage is irrelevant afterwards.
        for (key, value) in storage {
            self.set_state(addr, *key, *value);
        }
    }

    /// Writes a slot through the EIP-2200 status machine, adjusting the
    /// refund counter, and classifies the write for gas charging.
    pub fn set_storage(
        &mut self,
        addr: Address,
        key: Hash,
        value: Hash,
        fork: &ForkConfig,
    ) -> StorageStatus {
        let current = self.get_state(addr, key);
        if current == value {
            return StorageStatus::Unchanged;
        }

        let original = self.get_committed_state(addr, key);
        self.set_state(addr, key, value);

        if !fork.istanbul {
            return if current.is_zero() {
                StorageStatus::Added
            } else if value.is_zero() {
                self.add_refund(15_000);
                StorageStatus::Deleted
            } else {
                StorageStatus::Modified
            };
        }

        let clear_refund: u64 = if fork.london { 4_800 } else { 15_000 };

        if original == current {
            if original.is_zero() {
                return StorageStatus::Added;
            }
            if value.is_zero() {
                self.add_refund(clear_refund);
                return StorageStatus::Deleted;
            }
            return StorageStatus::Modified;
        }

        // Dirty slot: net the refunds against the first write.
        if !original.is_zero() {
            if current.is_zero() {
                self.sub_refund(clear_refund);
            } else if value.is_zero() {
                self.add_refund(clear_refund);
            }
        }
        if original == value {
            let sload_gas: u64 = if fork.eip2929 { 100 } else { 800 };
            if original.is_zero() {
                self.add_refund(20_000 - sload_gas);
            } else {
                let reset_gas: u64 = if fork.eip2929 { 5_000 - 2_100 } else { 5_000 };
                self.add_refund(reset_gas - sload_gas);
            }
        }
        StorageStatus::ModifiedAgain
    }

    /// Reads transient storage (EIP-1153).
    #[must_use]
    pub fn get_transient(&self, addr: Address, key: Hash) -> Hash {
        self.transient
            .get(&(addr, key))
            .copied()
            .unwrap_or(Hash::ZERO)
    }

    /// Writes transient storage (journaled within the transaction).
    pub fn set_transient(&mut self, addr: Address, key: Hash, value: Hash) {
        let prev = self.transient.insert((addr, key), value);
        self.journal.push(JournalEntry::Transient { addr, key, prev });
    }

    /// Drops all transient storage at a transaction boundary.
    pub fn clear_transient(&mut self) {
        self.transient.clear();
    }

    /// Adds to the refund counter.
    pub fn add_refund(&mut self, amount: u64) {
        self.journal.push(JournalEntry::Refund { prev: self.refund });
        self.refund = self.refund.saturating_add(amount);
    }

    /// Subtracts from the refund counter.
    pub fn sub_refund(&mut self, amount: u64) {
        self.journal.push(JournalEntry::Refund { prev: self.refund });
        self.refund = self.refund.saturating_sub(amount);
    }

    /// Resets the refund counter at a transaction boundary.
    pub fn reset_refund(&mut self) {
        self.refund = 0;
    }

    /// Marks the account self-destructed and zeroes its balance.
    pub fn suicide(&mut self, addr: Address) {
        self.mark_touched(addr);
        let object = self.ensure_object(addr);
        let prev_suicided = object.suicided;
        let prev_balance = object.account.balance;
        object.suicided = true;
        object.account.balance = U256::zero();
        self.journal.push(JournalEntry::Suicided {
            addr,
            prev: prev_suicided,
        });
        self.journal.push(JournalEntry::Balance {
            addr,
            prev: prev_balance,
        });
    }

    /// Creates a fresh account object, preserving any prior balance
    /// (the ether-to-new-contract rule).
    pub fn create_account(&mut self, addr: Address) {
        let prev = self.objects.get(&addr).cloned().map(Box::new);
        let prior_balance = self.get_balance(addr);

        let mut object = TxnAccount::from_snapshot(Account::default());
        object.account.balance = prior_balance;
        object.touched = true;
        object.code = Some(Vec::new());
        object.account.code_hash = empty_code_hash();

        self.objects.insert(addr, object);
        self.journal.push(JournalEntry::Replaced { addr, prev });
    }

    /// Appends a log record.
    pub fn emit_log(&mut self, addr: Address, topics: Vec<Hash>, data: Vec<u8>) {
        self.logs.push(Log::new(addr, topics, data));
        self.journal.push(JournalEntry::Log);
    }

    /// Drains the per-transaction log buffer.
    pub fn take_logs(&mut self) -> Vec<Log> {
        std::mem::take(&mut self.logs)
    }

    // =========================================================================
    // COMMIT PATH
    // =========================================================================

    /// Flags suicided objects (and, when `delete_empty` is set, touched
    /// empty objects) for deletion before the next transaction runs.
    pub fn clean_delete_objects(&mut self, delete_empty: bool) {
        for object in self.objects.values_mut() {
            if object.suicided || (delete_empty && object.touched && object.is_empty()) {
                object.deleted = true;
            }
        }
        self.refund = 0;
    }

    /// Converts the overlay into commit records. `delete_empty` applies
    /// the EIP-158 cull to anything still pending.
    #[must_use]
    pub fn commit(&mut self, delete_empty: bool) -> Vec<StateObject> {
        let mut objects = Vec::with_capacity(self.objects.len());

        for (addr, object) in &self.objects {
            let deleted = object.deleted
                || object.suicided
                || (delete_empty && object.touched && object.is_empty());

            objects.push(StateObject {
                address: *addr,
                nonce: object.account.nonce,
                balance: object.account.balance,
                code: if object.dirty_code {
                    object.code.clone()
                } else {
                    None
                },
                storage: object
                    .storage
                    .iter()
                    .map(|(key, value)| (*key, *value))
                    .collect(),
                deleted,
            });
        }

        objects
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::inmem::InMemoryState;
    use crate::state::StateBackend;

    fn fresh_txn() -> Txn {
        Txn::new(InMemoryState::new().new_snapshot())
    }

    fn addr(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    fn word(n: u64) -> Hash {
        Hash::from_u256(U256::from(n))
    }

    #[test]
    fn test_balance_revert() {
        let mut txn = fresh_txn();
        txn.add_balance(addr(1), U256::from(100));

        let snap = txn.snapshot();
        txn.add_balance(addr(1), U256::from(50));
        assert_eq!(txn.get_balance(addr(1)), U256::from(150));

        txn.revert_to_snapshot(snap).unwrap();
        assert_eq!(txn.get_balance(addr(1)), U256::from(100));
    }

    #[test]
    fn test_sub_balance_insufficient() {
        let mut txn = fresh_txn();
        txn.add_balance(addr(1), U256::from(10));
        assert_eq!(
            txn.sub_balance(addr(1), U256::from(11)),
            Err(VmError::NotEnoughFunds)
        );
        // Failed debit leaves the balance untouched.
        assert_eq!(txn.get_balance(addr(1)), U256::from(10));
    }

    #[test]
    fn test_nonce_overflow() {
        let mut txn = fresh_txn();
        txn.set_nonce(addr(1), u64::MAX);
        assert_eq!(txn.incr_nonce(addr(1)), Err(VmError::NonceUintOverflow));
    }

    #[test]
    fn test_logs_scoped_by_snapshot() {
        let mut txn = fresh_txn();
        txn.emit_log(addr(1), vec![], vec![1]);

        let snap = txn.snapshot();
        txn.emit_log(addr(1), vec![], vec![2]);
        txn.revert_to_snapshot(snap).unwrap();

        let logs = txn.take_logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].data, vec![1]);
    }

    #[test]
    fn test_storage_revert_to_absent() {
        let mut txn = fresh_txn();
        let snap = txn.snapshot();
        txn.set_state(addr(1), word(1), word(42));
        assert_eq!(txn.get_state(addr(1), word(1)), word(42));

        txn.revert_to_snapshot(snap).unwrap();
        assert_eq!(txn.get_state(addr(1), word(1)), Hash::ZERO);
    }

    #[test]
    fn test_nested_revert_lifo() {
        let mut txn = fresh_txn();
        txn.set_state(addr(1), word(1), word(1));
        let outer = txn.snapshot();
        txn.set_state(addr(1), word(1), word(2));
        let inner = txn.snapshot();
        txn.set_state(addr(1), word(1), word(3));

        txn.revert_to_snapshot(inner).unwrap();
        assert_eq!(txn.get_state(addr(1), word(1)), word(2));
        txn.revert_to_snapshot(outer).unwrap();
        assert_eq!(txn.get_state(addr(1), word(1)), word(1));
    }

    #[test]
    fn test_set_storage_statuses_berlin() {
        let fork = ForkConfig {
            istanbul: true,
            eip2929: true,
            london: true,
            ..ForkConfig::default()
        };
        let mut txn = fresh_txn();
        let a = addr(1);

        // clean zero -> non-zero
        assert_eq!(
            txn.set_storage(a, word(1), word(5), &fork),
            StorageStatus::Added
        );
        // same value again
        assert_eq!(
            txn.set_storage(a, word(1), word(5), &fork),
            StorageStatus::Unchanged
        );
        // dirty -> different
        assert_eq!(
            txn.set_storage(a, word(1), word(6), &fork),
            StorageStatus::ModifiedAgain
        );
        // dirty -> back to original zero, refund 20000-100
        let before = txn.get_refund();
        assert_eq!(
            txn.set_storage(a, word(1), Hash::ZERO, &fork),
            StorageStatus::ModifiedAgain
        );
        assert_eq!(txn.get_refund(), before + 19_900);
    }

    #[test]
    fn test_set_storage_clear_refund_london() {
        let fork = ForkConfig {
            istanbul: true,
            eip2929: true,
            london: true,
            ..ForkConfig::default()
        };

        // Commit a non-zero slot, then clear it in a fresh overlay.
        let backend = InMemoryState::new();
        let object = StateObject {
            address: addr(1),
            storage: vec![(word(1), word(9))],
            ..StateObject::default()
        };
        let (snap, _) = backend.new_snapshot().commit(&[object]).unwrap();

        let mut txn = Txn::new(snap);
        assert_eq!(
            txn.set_storage(addr(1), word(1), Hash::ZERO, &fork),
            StorageStatus::Deleted
        );
        assert_eq!(txn.get_refund(), 4_800);
    }

    #[test]
    fn test_suicide_and_clean() {
        let mut txn = fresh_txn();
        txn.add_balance(addr(1), U256::from(77));
        assert!(!txn.has_suicided(addr(1)));

        txn.suicide(addr(1));
        assert!(txn.has_suicided(addr(1)));
        assert!(txn.get_balance(addr(1)).is_zero());

        txn.clean_delete_objects(true);
        let objects = txn.commit(true);
        assert!(objects.iter().any(|o| o.address == addr(1) && o.deleted));
    }

    #[test]
    fn test_transient_cleared_per_tx() {
        let mut txn = fresh_txn();
        txn.set_transient(addr(1), word(1), word(2));
        assert_eq!(txn.get_transient(addr(1), word(1)), word(2));

        txn.clear_transient();
        assert_eq!(txn.get_transient(addr(1), word(1)), Hash::ZERO);
    }

    #[test]
    fn test_create_account_preserves_balance() {
        let mut txn = fresh_txn();
        txn.add_balance(addr(1), U256::from(123));
        txn.set_state(addr(1), word(1), word(1));

        txn.create_account(addr(1));
        assert_eq!(txn.get_balance(addr(1)), U256::from(123));
        assert_eq!(txn.get_state(addr(1), word(1)), Hash::ZERO);
    }

    #[test]
    fn test_commit_returns_dirty_code() {
        let mut txn = fresh_txn();
        txn.set_code(addr(1), vec![0x60, 0x00]);
        let objects = txn.commit(false);
        let object = objects.iter().find(|o| o.address == addr(1)).unwrap();
        assert_eq!(object.code.as_deref(), Some(&[0x60u8, 0x00][..]));
    }
}
