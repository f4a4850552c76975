//! # Modular Exponentiation (0x05)
//!
//! EIP-198 input layout with EIP-2565 gas under Berlin and the original
//! EIP-198 schedule before it.

use super::{read_word, Precompile};
use crate::chain::ForkConfig;
use crate::errors::VmError;
use crate::host::Host;
use num_bigint::BigUint;
use xgr_types::{Address, U256};

/// Length fields above this are unpayable anyway; capping them keeps
/// the gas computation itself cheap.
const MAX_LENGTH: u64 = 1 << 20;

const MIN_GAS_EIP2565: u64 = 200;

/// Big-integer modexp precompile.
pub struct ModExp;

struct Sizes {
    base_len: u64,
    exp_len: u64,
    mod_len: u64,
}

fn read_length(input: &[u8], offset: usize) -> u64 {
    let word = U256::from_big_endian(&read_word(input, offset));
    if word > U256::from(MAX_LENGTH) {
        MAX_LENGTH
    } else {
        word.low_u64()
    }
}

fn sizes(input: &[u8]) -> Sizes {
    Sizes {
        base_len: read_length(input, 0),
        exp_len: read_length(input, 32),
        mod_len: read_length(input, 64),
    }
}

/// Reads `len` bytes of the payload at `offset`, zero-padded past the
/// end of `input`.
fn read_padded(input: &[u8], offset: usize, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = input.get(offset + i).copied().unwrap_or(0);
    }
    out
}

/// Leading 32 bytes of the exponent, used by both gas schedules.
fn exp_head(input: &[u8], s: &Sizes) -> U256 {
    let offset = 96 + s.base_len as usize;
    let len = (s.exp_len as usize).min(32);
    let head = read_padded(input, offset, len);
    U256::from_big_endian(&head)
}

fn adjusted_exp_len(s: &Sizes, head: U256) -> u64 {
    let head_bits = if head.is_zero() {
        0
    } else {
        head.bits() as u64 - 1
    };
    if s.exp_len <= 32 {
        head_bits
    } else {
        8 * (s.exp_len - 32) + head_bits
    }
}

/// EIP-198 multiplication complexity.
fn mult_complexity_eip198(x: u64) -> u64 {
    if x <= 64 {
        x * x
    } else if x <= 1024 {
        x * x / 4 + 96 * x - 3_072
    } else {
        x * x / 16 + 480 * x - 199_680
    }
}

impl Precompile for ModExp {
    fn gas(&self, input: &[u8], fork: &ForkConfig) -> u64 {
        let s = sizes(input);
        let max_len = s.base_len.max(s.mod_len);
        let iterations = adjusted_exp_len(&s, exp_head(input, &s)).max(1);

        if fork.eip2929 {
            // EIP-2565
            let words = max_len.div_ceil(8);
            let complexity = words.saturating_mul(words);
            complexity
                .saturating_mul(iterations)
                .checked_div(3)
                .unwrap_or(u64::MAX)
                .max(MIN_GAS_EIP2565)
        } else {
            mult_complexity_eip198(max_len)
                .saturating_mul(iterations)
                .checked_div(20)
                .unwrap_or(u64::MAX)
        }
    }

    fn run(
        &self,
        input: &[u8],
        _caller: Address,
        _host: &mut dyn Host,
    ) -> Result<Vec<u8>, VmError> {
        let s = sizes(input);
        let (base_len, exp_len, mod_len) =
            (s.base_len as usize, s.exp_len as usize, s.mod_len as usize);

        if mod_len == 0 {
            return Ok(Vec::new());
        }

        let base = BigUint::from_bytes_be(&read_padded(input, 96, base_len));
        let exponent = BigUint::from_bytes_be(&read_padded(input, 96 + base_len, exp_len));
        let modulus = BigUint::from_bytes_be(&read_padded(input, 96 + base_len + exp_len, mod_len));

        let result = if modulus == BigUint::from(0u8) {
            BigUint::from(0u8)
        } else {
            base.modpow(&exponent, &modulus)
        };

        // Left-pad the result to the modulus length.
        let bytes = result.to_bytes_be();
        let mut out = vec![0u8; mod_len];
        let start = mod_len - bytes.len();
        out[start..].copy_from_slice(&bytes);
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

    fn modexp_input(base: &[u8], exp: &[u8], modulus: &[u8]) -> Vec<u8> {
        let mut input = Vec::new();
        for len in [base.len(), exp.len(), modulus.len()] {
            let mut word = [0u8; 32];
            word[24..].copy_from_slice(&(len as u64).to_be_bytes());
            input.extend_from_slice(&word);
        }
        input.extend_from_slice(base);
        input.extend_from_slice(exp);
        input.extend_from_slice(modulus);
        input
    }

    #[test]
    fn test_three_pow_five_mod_seven() {
        // 3^5 mod 7 = 5
        let input = modexp_input(&[3], &[5], &[7]);
        let out = ModExp.run(&input, Address::ZERO, &mut NullHost).unwrap();
        assert_eq!(out, vec![5]);
    }

    #[test]
    fn test_zero_modulus() {
        let input = modexp_input(&[3], &[5], &[0]);
        let out = ModExp.run(&input, Address::ZERO, &mut NullHost).unwrap();
        assert_eq!(out, vec![0]);
    }

    #[test]
    fn test_min_gas_floor_berlin() {
        let fork = ForkConfig {
            byzantium: true,
            istanbul: true,
            eip2929: true,
            ..ForkConfig::default()
        };
        let input = modexp_input(&[3], &[5], &[7]);
        assert_eq!(ModExp.gas(&input, &fork), 200);
    }

    #[test]
    fn test_output_padded_to_mod_len() {
        // 2^2 mod 0x0100 = 4, mod_len 2 → [0, 4]
        let input = modexp_input(&[2], &[2], &[1, 0]);
        let out = ModExp.run(&input, Address::ZERO, &mut NullHost).unwrap();
        assert_eq!(out, vec![0, 4]);
    }
}
