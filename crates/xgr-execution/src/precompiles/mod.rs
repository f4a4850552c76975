//! # Precompile Registry
//!
//! The standard contracts at 0x01..0x09 plus the chain-specific set
//! (native transfer, BLS aggregate verification, console, and
//! engine-execute). Every precompile exposes a deterministic
//! `gas(input)` and a `run(input, caller, host)`; the registry charges
//! the gas before running and converts failures into frame failures
//! that consume all remaining gas.

pub mod blake2f;
pub mod bls_verify;
pub mod bn128;
pub mod console;
pub mod ecrecover;
pub mod engine_abi;
pub mod engine_execute;
pub mod identity;
pub mod modexp;
pub mod native_transfer;
pub mod ripemd160;
pub mod sha256;

use crate::chain::ForkConfig;
use crate::contracts;
use crate::errors::VmError;
use crate::host::{Contract, ExecutionResult, Host};
use xgr_types::Address;

/// A precompiled contract.
pub trait Precompile {
    /// Deterministic gas cost for `input`.
    fn gas(&self, input: &[u8], fork: &ForkConfig) -> u64;

    /// Executes the precompile.
    fn run(&self, input: &[u8], caller: Address, host: &mut dyn Host)
        -> Result<Vec<u8>, VmError>;
}

/// Registry dispatch over the fixed address set.
#[derive(Clone, Copy, Debug, Default)]
pub struct Precompiles;

impl Precompiles {
    /// Creates the registry.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn resolve(addr: Address, fork: &ForkConfig) -> Option<Box<dyn Precompile>> {
        if addr == contracts::native_transfer_precompile() {
            return Some(Box::new(native_transfer::NativeTransfer));
        }
        if addr == contracts::bls_agg_verify_precompile() {
            return Some(Box::new(bls_verify::BlsAggVerify));
        }
        if addr == contracts::console_precompile() {
            return Some(Box::new(console::Console));
        }
        if addr == contracts::engine_execute_precompile() {
            return Some(Box::new(engine_execute::EngineExecute));
        }

        let bytes = addr.as_bytes();
        if bytes[..19] != [0u8; 19] {
            return None;
        }
        match bytes[19] {
            1 => Some(Box::new(ecrecover::EcRecover)),
            2 => Some(Box::new(sha256::Sha256Hash)),
            3 => Some(Box::new(ripemd160::Ripemd160Hash)),
            4 => Some(Box::new(identity::Identity)),
            5 if fork.byzantium => Some(Box::new(modexp::ModExp)),
            6 if fork.byzantium => Some(Box::new(bn128::Bn128Add)),
            7 if fork.byzantium => Some(Box::new(bn128::Bn128Mul)),
            8 if fork.byzantium => Some(Box::new(bn128::Bn128Pairing)),
            9 if fork.istanbul => Some(Box::new(blake2f::Blake2F)),
            _ => None,
        }
    }

    /// True when the contract's code address is a registered precompile
    /// at the active fork.
    #[must_use]
    pub fn can_run(&self, contract: &Contract, fork: &ForkConfig) -> bool {
        Self::resolve(contract.code_address, fork).is_some()
    }

    /// Charges gas and executes. A precompile error fails the frame and
    /// consumes everything.
    pub fn run(
        &self,
        contract: &Contract,
        host: &mut dyn Host,
        fork: &ForkConfig,
    ) -> ExecutionResult {
        let Some(precompile) = Self::resolve(contract.code_address, fork) else {
            return ExecutionResult::failed(VmError::RuntimeNotFound, 0);
        };

        let cost = precompile.gas(&contract.input, fork);
        if cost > contract.gas {
            return ExecutionResult {
                gas_left: 0,
                gas_used: contract.gas,
                err: Some(VmError::OutOfGas),
                ..ExecutionResult::default()
            };
        }

        match precompile.run(&contract.input, contract.caller, host) {
            Ok(output) => ExecutionResult {
                return_value: output,
                gas_left: contract.gas - cost,
                gas_used: cost,
                err: None,
                address: None,
            },
            Err(err) => ExecutionResult {
                return_value: Vec::new(),
                gas_left: 0,
                gas_used: contract.gas,
                err: Some(err),
                address: None,
            },
        }
    }
}

/// Reads a right-padded word from `input`, zero-filling past the end.
#[must_use]
pub(crate) fn read_word(input: &[u8], offset: usize) -> [u8; 32] {
    let mut word = [0u8; 32];
    for (i, byte) in word.iter_mut().enumerate() {
        *byte = input.get(offset + i).copied().unwrap_or(0);
    }
    word
}

/// ABI word encoding a bool.
#[must_use]
pub(crate) fn encode_bool(value: bool) -> Vec<u8> {
    let mut word = vec![0u8; 32];
    if value {
        word[31] = 1;
    }
    word
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use xgr_types::U256;

    fn contract_for(addr: Address, input: Vec<u8>, gas: u64) -> Contract {
        Contract::new_call(
            1,
            Address::ZERO,
            Address::ZERO,
            addr,
            U256::zero(),
            gas,
            Vec::new(),
            input,
        )
    }

    fn std_addr(n: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        Address::new(bytes)
    }

    #[test]
    fn test_fork_gating() {
        let registry = Precompiles::new();
        let pre_byzantium = ForkConfig::default();
        let byzantium = ForkConfig {
            byzantium: true,
            ..ForkConfig::default()
        };

        let modexp = contract_for(std_addr(5), vec![], 100_000);
        assert!(!registry.can_run(&modexp, &pre_byzantium));
        assert!(registry.can_run(&modexp, &byzantium));

        let blake = contract_for(std_addr(9), vec![], 100_000);
        assert!(!registry.can_run(&blake, &byzantium));
    }

    #[test]
    fn test_unknown_address_falls_through() {
        let registry = Precompiles::new();
        let fork = ForkConfig::default();
        let plain = contract_for(Address::new([7u8; 20]), vec![], 100_000);
        assert!(!registry.can_run(&plain, &fork));
    }

    #[test]
    fn test_chain_specific_always_registered() {
        let registry = Precompiles::new();
        let fork = ForkConfig::default();
        for addr in [
            contracts::native_transfer_precompile(),
            contracts::bls_agg_verify_precompile(),
            contracts::console_precompile(),
            contracts::engine_execute_precompile(),
        ] {
            let contract = contract_for(addr, vec![], 100_000);
            assert!(registry.can_run(&contract, &fork));
        }
    }

    #[test]
    fn test_read_word_pads() {
        let word = read_word(&[1, 2], 0);
        assert_eq!(word[0], 1);
        assert_eq!(word[1], 2);
        assert_eq!(word[2..], [0u8; 30]);
    }
}
