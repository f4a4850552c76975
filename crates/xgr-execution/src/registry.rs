//! # Engine Registry Reader
//!
//! Reads authorization, pause, donation, and fee floors from the
//! on-chain engine registry contract's fixed storage layout. Every
//! reader falls back to documented defaults when the registry address
//! is zero or the contract has no code yet; both happen during the
//! bootstrap window.

use crate::chain::{
    default_burned_address, default_donation_address, registry_slot_authorized_engine,
    registry_slot_donation_address, registry_slot_donation_percent, registry_slot_min_base_fee,
    registry_slot_paused, DEFAULT_DONATION_PERCENT,
};
use crate::host::Host;
use xgr_types::{Address, U256};

/// Validates `caller` as an authorized engine.
///
/// With no registry (zero address or empty code), only the bootstrap
/// EOA passes; a zero bootstrap EOA denies everyone. With a registry,
/// the contract must not be paused and `authorizedEngines[caller]`
/// must be set.
#[must_use]
pub fn authorize_engine_caller(host: &dyn Host, caller: Address) -> Option<Address> {
    let ctx = host.get_tx_context();
    let registry = ctx.engine_registry;

    if registry.is_zero() || host.get_code_size(registry) == 0 {
        if !ctx.bootstrap_engine.is_zero() && caller == ctx.bootstrap_engine {
            return Some(caller);
        }
        return None;
    }

    if !host.get_storage(registry, registry_slot_paused()).is_zero() {
        return None;
    }
    if host
        .get_storage(registry, registry_slot_authorized_engine(caller))
        .is_zero()
    {
        return None;
    }

    Some(caller)
}

/// Resolved fee-split recipients.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DonationConfig {
    /// Burn sink.
    pub burned_address: Address,
    /// Donation recipient.
    pub donation_address: Address,
    /// Donation share of the post-burn fee, 0-100.
    pub donation_percent: u64,
}

impl Default for DonationConfig {
    fn default() -> Self {
        Self {
            burned_address: default_burned_address(),
            donation_address: default_donation_address(),
            donation_percent: DEFAULT_DONATION_PERCENT,
        }
    }
}

/// Reads the donation configuration, with defaults when the registry
/// is absent. A zero donation address in the registry disables the
/// donation share entirely.
#[must_use]
pub fn donation_config(host: &dyn Host, registry: Address) -> DonationConfig {
    let mut config = DonationConfig::default();

    if registry.is_zero() || host.get_code_size(registry) == 0 {
        return config;
    }

    let addr_word = host.get_storage(registry, registry_slot_donation_address());
    let registry_addr = addr_word.to_address();

    let pct_word = host.get_storage(registry, registry_slot_donation_percent());
    let pct = pct_word.to_u256();
    if pct.bits() <= 64 && pct.low_u64() <= 100 {
        config.donation_percent = pct.low_u64();
    }

    if registry_addr.is_zero() {
        config.donation_percent = 0;
    } else {
        config.donation_address = registry_addr;
    }

    config
}

/// Reads the registry's minimum base fee; zero when unset or absent.
#[must_use]
pub fn min_base_fee(host: &dyn Host, registry: Address) -> U256 {
    if registry.is_zero() || host.get_code_size(registry) == 0 {
        return U256::zero();
    }
    host.get_storage(registry, registry_slot_min_base_fee())
        .to_u256()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DonationConfig::default();
        assert_eq!(config.burned_address, default_burned_address());
        assert_eq!(config.donation_address, config.burned_address);
        assert_eq!(config.donation_percent, 15);
    }
}
