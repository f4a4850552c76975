//! # Console Precompile
//!
//! Free debug logging from contract code; output goes to the node's
//! structured log, never to state.

use super::{read_word, Precompile};
use crate::chain::ForkConfig;
use crate::errors::VmError;
use crate::host::Host;
use xgr_types::{keccak256, Address, U256};

/// `log(string)` selector.
fn selector_log_string() -> [u8; 4] {
    first4(b"log(string)")
}

/// `log(uint256)` selector.
fn selector_log_uint() -> [u8; 4] {
    first4(b"log(uint256)")
}

fn first4(signature: &[u8]) -> [u8; 4] {
    let digest = keccak256(signature);
    [
        digest.as_bytes()[0],
        digest.as_bytes()[1],
        digest.as_bytes()[2],
        digest.as_bytes()[3],
    ]
}

/// The console precompile.
pub struct Console;

impl Precompile for Console {
    fn gas(&self, _input: &[u8], _fork: &ForkConfig) -> u64 {
        0
    }

    fn run(
        &self,
        input: &[u8],
        caller: Address,
        _host: &mut dyn Host,
    ) -> Result<Vec<u8>, VmError> {
        if input.len() < 4 {
            return Ok(Vec::new());
        }
        let selector: [u8; 4] = input[..4].try_into().expect("length checked");
        let payload = &input[4..];

        if selector == selector_log_string() {
            if let Some(message) = decode_string(payload) {
                tracing::debug!(target: "console", %caller, message);
            }
        } else if selector == selector_log_uint() {
            let value = U256::from_big_endian(&read_word(payload, 0));
            tracing::debug!(target: "console", %caller, value = %value);
        }

        // Unknown selectors are ignored; console output is best-effort.
        Ok(Vec::new())
    }
}

fn decode_string(payload: &[u8]) -> Option<String> {
    let offset = U256::from_big_endian(&read_word(payload, 0));
    if offset.bits() > 32 {
        return None;
    }
    let offset = offset.low_u64() as usize;
    let len = U256::from_big_endian(&read_word(payload, offset));
    if len.bits() > 32 {
        return None;
    }
    let len = len.low_u64() as usize;
    let bytes = payload.get(offset + 32..offset + 32 + len)?;
    String::from_utf8(bytes.to_vec()).ok()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::NullHost;

    #[test]
    fn test_console_is_free_and_silent() {
        assert_eq!(Console.gas(&[], &ForkConfig::default()), 0);
        let out = Console.run(&[], Address::ZERO, &mut NullHost).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_decode_string() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&[0u8; 31]);
        payload.push(32); // offset
        payload.extend_from_slice(&[0u8; 31]);
        payload.push(2); // length
        payload.extend_from_slice(b"hi");
        payload.extend_from_slice(&[0u8; 30]);
        assert_eq!(decode_string(&payload).as_deref(), Some("hi"));
    }
}
