//! # Chain Configuration
//!
//! Fork activation schedule, chain parameters from genesis, and the
//! storage layout of the on-chain engine registry.
//!
//! Registry slot numbers mirror `EngineRegistry.sol` and must not be
//! repacked; absence checks use code size, not just the zero address,
//! because pre-deployment bootstrap windows are expected.

use serde::Deserialize;
use std::collections::BTreeMap;
use xgr_types::{keccak256, Address, Hash};

// =============================================================================
// FORK CONFIGURATION
// =============================================================================

/// Boolean fork flags active at one block height.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ForkConfig {
    /// Homestead rules (creation intrinsic gas, low-s).
    pub homestead: bool,
    /// EIP-155 replay protection.
    pub eip155: bool,
    /// EIP-158 state clearing and the 24576-byte code limit.
    pub eip158: bool,
    /// Byzantium (REVERT, RETURNDATA*, STATICCALL).
    pub byzantium: bool,
    /// Constantinople (CREATE2, shifts, EXTCODEHASH).
    pub constantinople: bool,
    /// Istanbul (calldata repricing, SELFBALANCE, CHAINID).
    pub istanbul: bool,
    /// Berlin / EIP-2929 warm-cold access pricing.
    pub eip2929: bool,
    /// EIP-2930 typed access-list transactions.
    pub eip2930: bool,
    /// London (EIP-1559 fee market, BASEFEE, EIP-3529 refund cap).
    pub london: bool,
    /// Shanghai umbrella flag.
    pub shanghai: bool,
    /// EIP-3651 warm coinbase.
    pub eip3651: bool,
    /// EIP-3860 init-code size limit and metering.
    pub eip3860: bool,
    /// EIP-1153 transient storage.
    pub eip1153: bool,
    /// EIP-4200 relative jumps.
    pub eip4200: bool,
    /// EIP-4750 code functions (CALLF/RETF/JUMPF).
    pub eip4750: bool,
    /// Typed transaction hashes participate in consensus hashing.
    pub tx_hash_with_type: bool,
}

/// Fork activation heights as configured in genesis. `None` = never.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Forks {
    /// Homestead activation height.
    pub homestead: Option<u64>,
    /// EIP-155 activation height.
    pub eip155: Option<u64>,
    /// EIP-158 activation height.
    pub eip158: Option<u64>,
    /// Byzantium activation height.
    pub byzantium: Option<u64>,
    /// Constantinople activation height.
    pub constantinople: Option<u64>,
    /// Istanbul activation height.
    pub istanbul: Option<u64>,
    /// Berlin activation height.
    pub berlin: Option<u64>,
    /// London activation height.
    pub london: Option<u64>,
    /// Shanghai activation height.
    pub shanghai: Option<u64>,
    /// EIP-1153 activation height.
    pub eip1153: Option<u64>,
    /// EIP-4200 activation height.
    pub eip4200: Option<u64>,
    /// EIP-4750 activation height.
    pub eip4750: Option<u64>,
    /// Typed-hash fork activation height.
    pub tx_hash_with_type: Option<u64>,
}

impl Forks {
    /// All forks active from genesis.
    #[must_use]
    pub fn all_from_genesis() -> Self {
        Self {
            homestead: Some(0),
            eip155: Some(0),
            eip158: Some(0),
            byzantium: Some(0),
            constantinople: Some(0),
            istanbul: Some(0),
            berlin: Some(0),
            london: Some(0),
            shanghai: Some(0),
            eip1153: Some(0),
            eip4200: Some(0),
            eip4750: Some(0),
            tx_hash_with_type: Some(0),
        }
    }

    /// Resolves the flag set active at `number`.
    #[must_use]
    pub fn at(&self, number: u64) -> ForkConfig {
        let active = |height: Option<u64>| height.is_some_and(|h| number >= h);
        let berlin = active(self.berlin);
        let shanghai = active(self.shanghai);

        ForkConfig {
            homestead: active(self.homestead),
            eip155: active(self.eip155),
            eip158: active(self.eip158),
            byzantium: active(self.byzantium),
            constantinople: active(self.constantinople),
            istanbul: active(self.istanbul),
            eip2929: berlin,
            eip2930: berlin,
            london: active(self.london),
            shanghai,
            eip3651: shanghai,
            eip3860: shanghai,
            eip1153: active(self.eip1153),
            eip4200: active(self.eip4200),
            eip4750: active(self.eip4750),
            tx_hash_with_type: active(self.tx_hash_with_type),
        }
    }
}

// =============================================================================
// ADDRESS LIST CONFIG
// =============================================================================

/// Genesis configuration of one allow/block list. Presence of the config
/// enables the corresponding runtime.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressListConfig {
    /// Addresses granted the admin role at genesis.
    #[serde(default)]
    pub admin_addresses: Vec<Address>,
    /// Addresses granted the enabled role at genesis.
    #[serde(default)]
    pub enabled_addresses: Vec<Address>,
}

// =============================================================================
// CHAIN PARAMS
// =============================================================================

/// Chain-wide execution parameters from genesis.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainParams {
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Fork activation schedule.
    #[serde(default)]
    pub forks: Forks,
    /// Address of the deployed engine registry; zero while bootstrapping.
    #[serde(default)]
    pub engine_registry: Address,
    /// Engine EOA honoured while the registry is absent; zero denies all.
    #[serde(default)]
    pub bootstrap_engine_eoa: Address,
    /// London burn-contract schedule, keyed by activation height.
    #[serde(default)]
    pub burn_contract: BTreeMap<u64, Address>,
    /// Contract-deployer allow list (enables the runtime when present).
    #[serde(default)]
    pub contract_deployer_allow_list: Option<AddressListConfig>,
    /// Contract-deployer block list.
    #[serde(default)]
    pub contract_deployer_block_list: Option<AddressListConfig>,
    /// Transaction-sender allow list.
    #[serde(default)]
    pub transactions_allow_list: Option<AddressListConfig>,
    /// Transaction-sender block list.
    #[serde(default)]
    pub transactions_block_list: Option<AddressListConfig>,
}

impl ChainParams {
    /// Resolves the burn contract active at `number`: the schedule entry
    /// with the greatest height not above `number`.
    pub fn calculate_burn_contract(&self, number: u64) -> Result<Address, MissingBurnContract> {
        self.burn_contract
            .range(..=number)
            .next_back()
            .map(|(_, addr)| *addr)
            .ok_or(MissingBurnContract(number))
    }
}

/// No burn-contract schedule entry covers the requested height.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
#[error("no burn contract configured at block {0}")]
pub struct MissingBurnContract(pub u64);

// =============================================================================
// ENGINE REGISTRY STORAGE LAYOUT
// =============================================================================

/// `authorizedEngines` mapping slot.
const REGISTRY_SLOT_AUTHORIZED_ENGINES: u64 = 2;
/// `minBaseFee` slot.
const REGISTRY_SLOT_MIN_BASE_FEE: u64 = 5;
/// `paused` slot.
const REGISTRY_SLOT_PAUSED: u64 = 6;
// slot 7: __reserved0 (uint256)
/// `donationAddress` slot.
const REGISTRY_SLOT_DONATION_ADDRESS: u64 = 8;
/// `donationPercent` slot.
const REGISTRY_SLOT_DONATION_PERCENT: u64 = 9;

/// Fixed burn sink, also the donation fallback.
#[must_use]
pub fn default_burned_address() -> Address {
    Address::from_hex("0x0000000000000000000000000000000000000666")
}

/// Donation recipient used when no registry is deployed.
#[must_use]
pub fn default_donation_address() -> Address {
    default_burned_address()
}

/// Fallback donation percent (0-100) when no registry is deployed.
pub const DEFAULT_DONATION_PERCENT: u64 = 15;

/// Storage slot key for `minBaseFee`.
#[must_use]
pub fn registry_slot_min_base_fee() -> Hash {
    u256_slot(REGISTRY_SLOT_MIN_BASE_FEE)
}

/// Storage slot key for `paused`.
#[must_use]
pub fn registry_slot_paused() -> Hash {
    u256_slot(REGISTRY_SLOT_PAUSED)
}

/// Storage slot key for `donationAddress`.
#[must_use]
pub fn registry_slot_donation_address() -> Hash {
    u256_slot(REGISTRY_SLOT_DONATION_ADDRESS)
}

/// Storage slot key for `donationPercent`.
#[must_use]
pub fn registry_slot_donation_percent() -> Hash {
    u256_slot(REGISTRY_SLOT_DONATION_PERCENT)
}

/// Mapping slot key for `authorizedEngines[engine]`:
/// `keccak256(pad32(engine) ‖ pad32(slot))`.
#[must_use]
pub fn registry_slot_authorized_engine(engine: Address) -> Hash {
    let mut buf = [0u8; 64];
    buf[12..32].copy_from_slice(engine.as_bytes());
    buf[32..].copy_from_slice(u256_slot(REGISTRY_SLOT_AUTHORIZED_ENGINES).as_bytes());
    keccak256(&buf)
}

fn u256_slot(n: u64) -> Hash {
    let mut bytes = [0u8; 32];
    bytes[24..].copy_from_slice(&n.to_be_bytes());
    Hash::new(bytes)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forks_at_height() {
        let forks = Forks {
            homestead: Some(0),
            istanbul: Some(5),
            berlin: Some(10),
            ..Forks::default()
        };

        let early = forks.at(4);
        assert!(early.homestead);
        assert!(!early.istanbul);
        assert!(!early.eip2929);

        let late = forks.at(10);
        assert!(late.istanbul);
        assert!(late.eip2929);
        assert!(late.eip2930);
        assert!(!late.london);
    }

    #[test]
    fn test_shanghai_implies_3651_and_3860() {
        let config = Forks {
            shanghai: Some(1),
            ..Forks::default()
        }
        .at(1);
        assert!(config.eip3651);
        assert!(config.eip3860);
    }

    #[test]
    fn test_burn_contract_schedule() {
        let mut params = ChainParams::default();
        params.burn_contract.insert(0, Address::new([1u8; 20]));
        params.burn_contract.insert(100, Address::new([2u8; 20]));

        assert_eq!(
            params.calculate_burn_contract(50).unwrap(),
            Address::new([1u8; 20])
        );
        assert_eq!(
            params.calculate_burn_contract(100).unwrap(),
            Address::new([2u8; 20])
        );

        let empty = ChainParams::default();
        assert!(empty.calculate_burn_contract(0).is_err());
    }

    #[test]
    fn test_registry_slot_keys() {
        // Plain value slots are the raw big-endian slot number.
        assert_eq!(registry_slot_paused().to_u256().low_u64(), 6);
        assert_eq!(registry_slot_donation_address().to_u256().low_u64(), 8);

        // Mapping keys differ per engine address.
        let a = registry_slot_authorized_engine(Address::new([1u8; 20]));
        let b = registry_slot_authorized_engine(Address::new([2u8; 20]));
        assert_ne!(a, b);
    }
}
