//! # ecrecover (0x01)

use super::{read_word, Precompile};
use crate::chain::ForkConfig;
use crate::errors::VmError;
use crate::host::Host;
use xgr_types::crypto::recover_address;
use xgr_types::{Address, Hash};

const ECRECOVER_GAS: u64 = 3_000;

/// Signature recovery precompile.
pub struct EcRecover;

impl Precompile for EcRecover {
    fn gas(&self, _input: &[u8], _fork: &ForkConfig) -> u64 {
        ECRECOVER_GAS
    }

    fn run(
        &self,
        input: &[u8],
        _caller: Address,
        _host: &mut dyn Host,
    ) -> Result<Vec<u8>, VmError> {
        let hash = Hash::new(read_word(input, 0));
        let v_word = read_word(input, 32);
        let r = read_word(input, 64);
        let s = read_word(input, 96);

        // v is 27 or 28 carried in a full word; anything else recovers
        // nothing, matching the empty-output convention.
        if v_word[..31] != [0u8; 31] || !(27..=28).contains(&v_word[31]) {
            return Ok(Vec::new());
        }

        match recover_address(&hash, &r, &s, v_word[31] - 27) {
            Some(address) => Ok(address.to_word().as_bytes().to_vec()),
            None => Ok(Vec::new()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ForkConfig;

    #[test]
    fn test_gas_is_flat() {
        assert_eq!(EcRecover.gas(&[], &ForkConfig::default()), 3_000);
        assert_eq!(EcRecover.gas(&[0u8; 512], &ForkConfig::default()), 3_000);
    }

    #[test]
    fn test_bad_v_returns_empty() {
        let mut state = crate::host::testing::NullHost;
        let mut input = vec![0u8; 128];
        input[63] = 26; // invalid v
        let out = EcRecover.run(&input, Address::ZERO, &mut state).unwrap();
        assert!(out.is_empty());
    }
}
