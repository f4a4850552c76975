//! # Identity (0x04)

use super::Precompile;
use crate::chain::ForkConfig;
use crate::errors::VmError;
use crate::evm::gas::to_words;
use crate::host::Host;
use xgr_types::Address;

const IDENTITY_BASE_GAS: u64 = 15;
const IDENTITY_WORD_GAS: u64 = 3;

/// Data-copy precompile.
pub struct Identity;

impl Precompile for Identity {
    fn gas(&self, input: &[u8], _fork: &ForkConfig) -> u64 {
        IDENTITY_BASE_GAS + IDENTITY_WORD_GAS * to_words(input.len() as u64)
    }

    fn run(
        &self,
        input: &[u8],
        _caller: Address,
        _host: &mut dyn Host,
    ) -> Result<Vec<u8>, VmError> {
        Ok(input.to_vec())
    }
}

// =============================================================================
// TESTS
// =============================================================================
