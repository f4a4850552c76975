//! # alt_bn128 Curve Operations (0x06, 0x07, 0x08)
//!
//! Point addition, scalar multiplication, and the pairing check, with
//! Istanbul (EIP-1108) repricing.

use super::{read_word, Precompile};
use crate::chain::ForkConfig;
use crate::errors::VmError;
use crate::host::Host;
use bn::{AffineG1, AffineG2, Fq, Fq2, Fr, Group, Gt, G1, G2};
use xgr_types::Address;

const ADD_GAS_BYZANTIUM: u64 = 500;
const ADD_GAS_ISTANBUL: u64 = 150;
const MUL_GAS_BYZANTIUM: u64 = 40_000;
const MUL_GAS_ISTANBUL: u64 = 6_000;
const PAIRING_BASE_BYZANTIUM: u64 = 100_000;
const PAIRING_PAIR_BYZANTIUM: u64 = 80_000;
const PAIRING_BASE_ISTANBUL: u64 = 45_000;
const PAIRING_PAIR_ISTANBUL: u64 = 34_000;

/// Size of one (G1, G2) pairing input element.
const PAIR_ELEMENT_LEN: usize = 192;

fn read_fq(input: &[u8], offset: usize) -> Result<Fq, VmError> {
    Fq::from_slice(&read_word(input, offset)).map_err(|_| VmError::InvalidInputData)
}

/// Reads an uncompressed G1 point; (0, 0) is the point at infinity.
pub(crate) fn read_g1(input: &[u8], offset: usize) -> Result<G1, VmError> {
    let x = read_fq(input, offset)?;
    let y = read_fq(input, offset + 32)?;
    if x == Fq::zero() && y == Fq::zero() {
        return Ok(G1::zero());
    }
    AffineG1::new(x, y)
        .map(Into::into)
        .map_err(|_| VmError::InvalidInputData)
}

/// Reads an uncompressed G2 point in EVM order (imaginary limb first).
pub(crate) fn read_g2(input: &[u8], offset: usize) -> Result<G2, VmError> {
    let ay = read_fq(input, offset)?;
    let ax = read_fq(input, offset + 32)?;
    let by = read_fq(input, offset + 64)?;
    let bx = read_fq(input, offset + 96)?;
    let x = Fq2::new(ax, ay);
    let y = Fq2::new(bx, by);
    if x == Fq2::zero() && y == Fq2::zero() {
        return Ok(G2::zero());
    }
    AffineG2::new(x, y)
        .map(Into::into)
        .map_err(|_| VmError::InvalidInputData)
}

/// Serialises a G1 point as two 32-byte coordinates.
pub(crate) fn write_g1(point: G1) -> Vec<u8> {
    let mut out = vec![0u8; 64];
    if let Some(affine) = AffineG1::from_jacobian(point) {
        affine
            .x()
            .to_big_endian(&mut out[..32])
            .expect("32-byte buffer");
        affine
            .y()
            .to_big_endian(&mut out[32..])
            .expect("32-byte buffer");
    }
    out
}

// =============================================================================
// ADD (0x06)
// =============================================================================

/// Point addition.
pub struct Bn128Add;

impl Precompile for Bn128Add {
    fn gas(&self, _input: &[u8], fork: &ForkConfig) -> u64 {
        if fork.istanbul {
            ADD_GAS_ISTANBUL
        } else {
            ADD_GAS_BYZANTIUM
        }
    }

    fn run(
        &self,
        input: &[u8],
        _caller: Address,
        _host: &mut dyn Host,
    ) -> Result<Vec<u8>, VmError> {
        let a = read_g1(input, 0)?;
        let b = read_g1(input, 64)?;
        Ok(write_g1(a + b))
    }
}

// =============================================================================
// MUL (0x07)
// =============================================================================

/// Scalar multiplication.
pub struct Bn128Mul;

impl Precompile for Bn128Mul {
    fn gas(&self, _input: &[u8], fork: &ForkConfig) -> u64 {
        if fork.istanbul {
            MUL_GAS_ISTANBUL
        } else {
            MUL_GAS_BYZANTIUM
        }
    }

    fn run(
        &self,
        input: &[u8],
        _caller: Address,
        _host: &mut dyn Host,
    ) -> Result<Vec<u8>, VmError> {
        let point = read_g1(input, 0)?;
        let scalar =
            Fr::from_slice(&read_word(input, 64)).map_err(|_| VmError::InvalidInputData)?;
        Ok(write_g1(point * scalar))
    }
}

// =============================================================================
// PAIRING (0x08)
// =============================================================================

/// Pairing check over (G1, G2) pairs.
pub struct Bn128Pairing;

impl Precompile for Bn128Pairing {
    fn gas(&self, input: &[u8], fork: &ForkConfig) -> u64 {
        let pairs = (input.len() / PAIR_ELEMENT_LEN) as u64;
        if fork.istanbul {
            PAIRING_BASE_ISTANBUL + PAIRING_PAIR_ISTANBUL * pairs
        } else {
            PAIRING_BASE_BYZANTIUM + PAIRING_PAIR_BYZANTIUM * pairs
        }
    }

    fn run(
        &self,
        input: &[u8],
        _caller: Address,
        _host: &mut dyn Host,
    ) -> Result<Vec<u8>, VmError> {
        if input.len() % PAIR_ELEMENT_LEN != 0 {
            return Err(VmError::InvalidInputData);
        }

        let mut pairs = Vec::with_capacity(input.len() / PAIR_ELEMENT_LEN);
        for chunk in 0..input.len() / PAIR_ELEMENT_LEN {
            let offset = chunk * PAIR_ELEMENT_LEN;
            let g1 = read_g1(input, offset)?;
            let g2 = read_g2(input, offset + 64)?;
            pairs.push((g1, g2));
        }

        let ok = bn::pairing_batch(&pairs) == Gt::one();
        let mut out = vec![0u8; 32];
        if ok {
            out[31] = 1;
        }
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
    fn test_add_identity() {
        // (0,0) + (0,0) = (0,0)
        let out = Bn128Add
            .run(&[0u8; 128], Address::ZERO, &mut NullHost)
            .unwrap();
        assert_eq!(out, vec![0u8; 64]);
    }

    #[test]
    fn test_empty_pairing_is_true() {
        let out = Bn128Pairing.run(&[], Address::ZERO, &mut NullHost).unwrap();
        assert_eq!(out[31], 1);
    }

    #[test]
    fn test_ragged_pairing_input_rejected() {
        assert_eq!(
            Bn128Pairing.run(&[0u8; 191], Address::ZERO, &mut NullHost),
            Err(VmError::InvalidInputData)
        );
    }

    #[test]
    fn test_istanbul_repricing() {
        let byzantium = ForkConfig {
            byzantium: true,
            ..ForkConfig::default()
        };
        let istanbul = ForkConfig {
            byzantium: true,
            istanbul: true,
            ..ForkConfig::default()
        };
        assert_eq!(Bn128Add.gas(&[], &byzantium), 500);
        assert_eq!(Bn128Add.gas(&[], &istanbul), 150);
        assert_eq!(Bn128Pairing.gas(&[0u8; 192], &istanbul), 45_000 + 34_000);
    }
}
