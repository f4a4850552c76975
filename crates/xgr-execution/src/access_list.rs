//! # Warm Access List (EIP-2929)
//!
//! Tracks warm addresses and `(address, slot)` pairs for one
//! transaction. The list pointer stays stable for the whole
//! transaction; call and creation frames capture its contents with
//! [`AccessList::copy`] and restore them with [`AccessList::revert_to`]
//! when the frame fails.

use crate::contracts;
use std::collections::{HashMap, HashSet};
use xgr_types::{Address, Hash};

/// Precompiled contracts are warm from transaction start (Berlin and
/// later): the nine standard addresses plus the chain-specific ones.
#[must_use]
pub fn precompiled_addresses() -> Vec<Address> {
    let mut list: Vec<Address> = (1u8..=9)
        .map(|n| {
            let mut bytes = [0u8; 20];
            bytes[19] = n;
            Address::new(bytes)
        })
        .collect();

    list.push(contracts::native_transfer_precompile());
    list.push(contracts::bls_agg_verify_precompile());
    list.push(contracts::console_precompile());
    list.push(contracts::engine_execute_precompile());
    list
}

/// The per-transaction warm set.
#[derive(Clone, Debug, Default)]
pub struct AccessList {
    addresses: HashSet<Address>,
    slots: HashMap<Address, HashSet<Hash>>,
}

impl AccessList {
    /// Creates a warm set seeded with `init` plus every precompile.
    #[must_use]
    pub fn new(init: &[Address]) -> Self {
        let precompiles = precompiled_addresses();
        let mut addresses = HashSet::with_capacity(init.len() + precompiles.len());
        addresses.extend(init.iter().copied());
        addresses.extend(precompiles);

        Self {
            addresses,
            slots: HashMap::new(),
        }
    }

    /// True when `addr` is warm.
    #[must_use]
    pub fn contains_address(&self, addr: Address) -> bool {
        self.addresses.contains(&addr)
    }

    /// Warms `addr`; true when it was newly added.
    pub fn add_address(&mut self, addr: Address) -> bool {
        self.addresses.insert(addr)
    }

    /// True when `(addr, slot)` is warm.
    #[must_use]
    pub fn contains_slot(&self, addr: Address, slot: Hash) -> bool {
        self.slots
            .get(&addr)
            .is_some_and(|slots| slots.contains(&slot))
    }

    /// Warms `(addr, slot)`; returns `(address_added, slot_added)`.
    pub fn add_slot(&mut self, addr: Address, slot: Hash) -> (bool, bool) {
        let addr_added = self.add_address(addr);
        let slot_added = self.slots.entry(addr).or_default().insert(slot);
        (addr_added, slot_added)
    }

    /// Captures the current contents for frame-scope restore.
    #[must_use]
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Replaces the contents with a previously captured copy. The list
    /// itself stays in place; only the sets swap.
    pub fn revert_to(&mut self, snapshot: Self) {
        self.addresses = snapshot.addresses;
        self.slots = snapshot.slots;
    }

    /// Number of warm addresses (tests and diagnostics).
    #[must_use]
    pub fn address_count(&self) -> usize {
        self.addresses.len()
    }
}

// =============================================================================
// TESTS
// =============================================================================
