//! # BLS Aggregate Verification Precompile
//!
//! Verifies one aggregated BLS signature over alt_bn128 against a set
//! of public keys. The message is supplied already mapped onto G1 by
//! the consensus layer (64-byte uncompressed point); signatures live in
//! G1, public keys in G2.
//!
//! Input: `msg_point(64) ‖ signature(64) ‖ n·pubkey(128)`.
//! Output: one bool word.

use super::{encode_bool, Precompile};
use crate::chain::ForkConfig;
use crate::errors::VmError;
use crate::host::Host;
use crate::precompiles::bn128::{read_g1, read_g2};
use bn::{Group, Gt, G2};
use xgr_types::Address;

const BLS_VERIFY_BASE_GAS: u64 = 50_000;
const BLS_VERIFY_KEY_GAS: u64 = 15_000;

const POINT_LEN: usize = 64;
const PUBKEY_LEN: usize = 128;

/// The BLS aggregate-verification precompile.
pub struct BlsAggVerify;

impl Precompile for BlsAggVerify {
    fn gas(&self, input: &[u8], _fork: &ForkConfig) -> u64 {
        let keys = input.len().saturating_sub(2 * POINT_LEN) / PUBKEY_LEN;
        BLS_VERIFY_BASE_GAS + BLS_VERIFY_KEY_GAS * keys as u64
    }

    fn run(
        &self,
        input: &[u8],
        _caller: Address,
        _host: &mut dyn Host,
    ) -> Result<Vec<u8>, VmError> {
        if input.len() < 2 * POINT_LEN + PUBKEY_LEN
            || (input.len() - 2 * POINT_LEN) % PUBKEY_LEN != 0
        {
            return Err(VmError::InvalidInputData);
        }

        let message = read_g1(input, 0)?;
        let signature = read_g1(input, POINT_LEN)?;

        let key_count = (input.len() - 2 * POINT_LEN) / PUBKEY_LEN;
        let mut aggregate = G2::zero();
        for i in 0..key_count {
            let key = read_g2(input, 2 * POINT_LEN + i * PUBKEY_LEN)?;
            aggregate = aggregate + key;
        }

        // e(sig, G2) == e(H(m), aggPk)  ⇔  e(sig, -G2) · e(H(m), aggPk) == 1
        let ok = bn::pairing_batch(&[(signature, -G2::one()), (message, aggregate)]) == Gt::one();
        Ok(encode_bool(ok))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::NullHost;
    use bn::{Fr, G1};

    fn serialize_g1(point: G1) -> Vec<u8> {
        crate::precompiles::bn128::write_g1(point)
    }

    fn serialize_g2(point: G2) -> Vec<u8> {
        let mut out = vec![0u8; 128];
        if let Some(affine) = bn::AffineG2::from_jacobian(point) {
            affine.x().imaginary().to_big_endian(&mut out[..32]).unwrap();
            affine.x().real().to_big_endian(&mut out[32..64]).unwrap();
            affine.y().imaginary().to_big_endian(&mut out[64..96]).unwrap();
            affine.y().real().to_big_endian(&mut out[96..]).unwrap();
        }
        out
    }

    #[test]
    fn test_single_key_round_trip() {
        // secret key s: pk = s·G2, sig = s·H(m)
        let secret = Fr::from_str("1234567").unwrap();
        let message = G1::one() * Fr::from_str("987654321").unwrap();
        let signature = message * secret;
        let pubkey = G2::one() * secret;

        let mut input = Vec::new();
        input.extend_from_slice(&serialize_g1(message));
        input.extend_from_slice(&serialize_g1(signature));
        input.extend_from_slice(&serialize_g2(pubkey));

        let out = BlsAggVerify.run(&input, Address::ZERO, &mut NullHost).unwrap();
        assert_eq!(out[31], 1);
    }

    #[test]
    fn test_wrong_signature_rejected() {
        let secret = Fr::from_str("1234567").unwrap();
        let message = G1::one() * Fr::from_str("987654321").unwrap();
        let signature = message * Fr::from_str("7654321").unwrap(); // wrong key
        let pubkey = G2::one() * secret;

        let mut input = Vec::new();
        input.extend_from_slice(&serialize_g1(message));
        input.extend_from_slice(&serialize_g1(signature));
        input.extend_from_slice(&serialize_g2(pubkey));

        let out = BlsAggVerify.run(&input, Address::ZERO, &mut NullHost).unwrap();
        assert_eq!(out[31], 0);
    }

    #[test]
    fn test_gas_scales_with_keys() {
        let fork = ForkConfig::default();
        let one_key = vec![0u8; 2 * 64 + 128];
        let three_keys = vec![0u8; 2 * 64 + 3 * 128];
        assert_eq!(BlsAggVerify.gas(&one_key, &fork), 65_000);
        assert_eq!(BlsAggVerify.gas(&three_keys, &fork), 95_000);
    }
}
