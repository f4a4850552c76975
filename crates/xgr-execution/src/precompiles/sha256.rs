//! # SHA-256 (0x02)

use super::Precompile;
use crate::chain::ForkConfig;
use crate::errors::VmError;
use crate::evm::gas::to_words;
use crate::host::Host;
use sha2::{Digest, Sha256};
use xgr_types::Address;

const SHA256_BASE_GAS: u64 = 60;
const SHA256_WORD_GAS: u64 = 12;

/// SHA-256 hashing precompile.
pub struct Sha256Hash;

impl Precompile for Sha256Hash {
    fn gas(&self, input: &[u8], _fork: &ForkConfig) -> u64 {
        SHA256_BASE_GAS + SHA256_WORD_GAS * to_words(input.len() as u64)
    }

    fn run(
        &self,
        input: &[u8],
        _caller: Address,
        _host: &mut dyn Host,
    ) -> Result<Vec<u8>, VmError> {
        let mut hasher = Sha256::new();
        hasher.update(input);
        Ok(hasher.finalize().to_vec())
    }
}

// =============================================================================
// TESTS
// =============================================================================
