//! # Native Transfer Precompile
//!
//! Moves native balance on behalf of the calling contract. Input is
//! `abi(address from, address to, uint256 amount)`; `from` must equal
//! the caller so a contract can only spend its own balance.

use super::{encode_bool, read_word, Precompile};
use crate::chain::ForkConfig;
use crate::errors::VmError;
use crate::host::Host;
use xgr_types::{Address, Hash, U256};

const NATIVE_TRANSFER_GAS: u64 = 21_000;
const INPUT_LEN: usize = 96;

/// The native-transfer precompile.
pub struct NativeTransfer;

impl Precompile for NativeTransfer {
    fn gas(&self, _input: &[u8], _fork: &ForkConfig) -> u64 {
        NATIVE_TRANSFER_GAS
    }

    fn run(&self, input: &[u8], caller: Address, host: &mut dyn Host) -> Result<Vec<u8>, VmError> {
        if input.len() != INPUT_LEN {
            return Err(VmError::InvalidInputData);
        }

        let from = Hash::new(read_word(input, 0)).to_address();
        let to = Hash::new(read_word(input, 32)).to_address();
        let amount = U256::from_big_endian(&read_word(input, 64));

        if from != caller {
            return Err(VmError::UnauthorizedCaller);
        }

        host.transfer(from, to, amount)?;
        Ok(encode_bool(true))
    }
}

// =============================================================================
// TESTS
// =============================================================================
