//! # Allow / Block List Runtime
//!
//! Role-based address lists backed by contract storage. The role of an
//! address lives in a mapping at slot 0 of the list contract; calls to
//! the list contract itself run a small selector-based update runtime
//! with admin-only writes.

use crate::errors::VmError;
use crate::host::{Contract, ExecutionResult, Host};
use xgr_types::{keccak256, Address, Hash, U256};

/// Gas charged for list reads.
const READ_ADDRESS_LIST_GAS: u64 = 5_000;
/// Gas charged for role writes.
const WRITE_ADDRESS_LIST_GAS: u64 = 20_000;

/// Role of an address within one list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Role {
    /// Not on the list.
    None = 0,
    /// Listed.
    Enabled = 1,
    /// Listed and allowed to modify the list.
    Admin = 2,
}

impl Role {
    /// True when the role grants the listed capability.
    #[must_use]
    pub fn enabled(self) -> bool {
        !matches!(self, Self::None)
    }

    fn from_word(word: Hash) -> Self {
        match word.to_u256().low_u64() {
            1 => Self::Enabled,
            2 => Self::Admin,
            _ => Self::None,
        }
    }

    fn to_word(self) -> Hash {
        Hash::from_u256(U256::from(self as u8))
    }
}

/// Mapping key for `roles[addr]` at slot 0.
fn role_key(addr: Address) -> Hash {
    let mut buf = [0u8; 64];
    buf[12..32].copy_from_slice(addr.as_bytes());
    keccak256(&buf)
}

/// Reads the role of `addr` in the list at `list_addr`.
#[must_use]
pub fn get_role(host: &dyn Host, list_addr: Address, addr: Address) -> Role {
    Role::from_word(host.get_storage(list_addr, role_key(addr)))
}

fn selector(signature: &str) -> [u8; 4] {
    let digest = keccak256(signature.as_bytes());
    [
        digest.as_bytes()[0],
        digest.as_bytes()[1],
        digest.as_bytes()[2],
        digest.as_bytes()[3],
    ]
}

fn decode_address_arg(input: &[u8]) -> Result<Address, VmError> {
    let word = input.get(4..36).ok_or(VmError::InvalidInputData)?;
    if word[..12] != [0u8; 12] {
        return Err(VmError::InvalidInputData);
    }
    Hash::from_slice(word)
        .map(|hash| hash.to_address())
        .ok_or(VmError::InvalidInputData)
}

/// Executes a call targeting the list contract itself.
pub fn run(list_addr: Address, contract: &Contract, host: &mut dyn Host) -> ExecutionResult {
    let set_admin = selector("setAdmin(address)");
    let set_enabled = selector("setEnabled(address)");
    let set_none = selector("setNone(address)");
    let read_list = selector("readAddressList(address)");

    let Some(sel) = contract.input.get(..4) else {
        return ExecutionResult::failed(VmError::InvalidInputData, 0);
    };

    let (gas_cost, write_role) = if sel == read_list {
        (READ_ADDRESS_LIST_GAS, None)
    } else if sel == set_admin {
        (WRITE_ADDRESS_LIST_GAS, Some(Role::Admin))
    } else if sel == set_enabled {
        (WRITE_ADDRESS_LIST_GAS, Some(Role::Enabled))
    } else if sel == set_none {
        (WRITE_ADDRESS_LIST_GAS, Some(Role::None))
    } else {
        return ExecutionResult::failed(VmError::InvalidInputData, 0);
    };

    if gas_cost > contract.gas {
        return ExecutionResult::failed(VmError::OutOfGas, 0);
    }
    let gas_left = contract.gas - gas_cost;

    let target = match decode_address_arg(&contract.input) {
        Ok(addr) => addr,
        Err(err) => return ExecutionResult::failed(err, 0),
    };

    match write_role {
        None => {
            let role = get_role(host, list_addr, target);
            ExecutionResult {
                return_value: role.to_word().as_bytes().to_vec(),
                gas_left,
                gas_used: gas_cost,
                err: None,
                address: None,
            }
        }
        Some(role) => {
            if contract.is_static {
                return ExecutionResult::failed(VmError::StaticCallWrite, 0);
            }
            // Only admins may modify the list.
            if get_role(host, list_addr, contract.caller) != Role::Admin {
                tracing::debug!(
                    caller = %contract.caller,
                    list = %list_addr,
                    "address list update denied",
                );
                return ExecutionResult::failed(VmError::NotAuth, 0);
            }
            host.set_state(list_addr, role_key(target), role.to_word());
            ExecutionResult {
                return_value: Vec::new(),
                gas_left,
                gas_used: gas_cost,
                err: None,
                address: None,
            }
        }
    }
}

/// Seeds initial roles for one list during genesis.
pub fn seed_roles(
    set_state: &mut dyn FnMut(Address, Hash, Hash),
    list_addr: Address,
    admins: &[Address],
    enabled: &[Address],
) {
    for addr in admins {
        set_state(list_addr, role_key(*addr), Role::Admin.to_word());
    }
    for addr in enabled {
        set_state(list_addr, role_key(*addr), Role::Enabled.to_word());
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_word_round_trip() {
        for role in [Role::None, Role::Enabled, Role::Admin] {
            assert_eq!(Role::from_word(role.to_word()), role);
        }
        assert_eq!(Role::from_word(Hash::from_u256(U256::from(99))), Role::None);
    }

    #[test]
    fn test_role_enabled() {
        assert!(!Role::None.enabled());
        assert!(Role::Enabled.enabled());
        assert!(Role::Admin.enabled());
    }

    #[test]
    fn test_role_keys_distinct() {
        assert_ne!(
            role_key(Address::new([1u8; 20])),
            role_key(Address::new([2u8; 20]))
        );
    }
}
