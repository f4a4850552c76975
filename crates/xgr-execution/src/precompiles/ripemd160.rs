//! # RIPEMD-160 (0x03)

use super::Precompile;
use crate::chain::ForkConfig;
use crate::errors::VmError;
use crate::evm::gas::to_words;
use crate::host::Host;
use ripemd::{Digest, Ripemd160};
use xgr_types::Address;

const RIPEMD_BASE_GAS: u64 = 600;
const RIPEMD_WORD_GAS: u64 = 120;

/// RIPEMD-160 hashing precompile. Output is the 20-byte digest
/// left-padded to a word.
pub struct Ripemd160Hash;

impl Precompile for Ripemd160Hash {
    fn gas(&self, input: &[u8], _fork: &ForkConfig) -> u64 {
        RIPEMD_BASE_GAS + RIPEMD_WORD_GAS * to_words(input.len() as u64)
    }

    fn run(
        &self,
        input: &[u8],
        _caller: Address,
        _host: &mut dyn Host,
    ) -> Result<Vec<u8>, VmError> {
        let mut hasher = Ripemd160::new();
        hasher.update(input);
        let digest = hasher.finalize();

        let mut out = vec![0u8; 32];
        out[12..].copy_from_slice(&digest);
        Ok(out)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::NullHost;

    #[test]
    fn test_output_padded_to_word() {
        let out = Ripemd160Hash
            .run(b"abc", Address::ZERO, &mut NullHost)
            .unwrap();
        assert_eq!(out.len(), 32);
        assert_eq!(out[..12], [0u8; 12]);
        assert_eq!(
            hex::encode(&out[12..]),
            "8eb208f7e05d987a9b044a8e98c6b087f15a0bfc"
        );
    }
}
