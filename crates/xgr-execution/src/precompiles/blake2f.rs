//! # BLAKE2b F Compression (0x09)
//!
//! EIP-152. The round-parameterised permutation is implemented here
//! directly; packaged BLAKE2 crates only expose the full hash.

use super::Precompile;
use crate::chain::ForkConfig;
use crate::errors::VmError;
use crate::host::Host;
use xgr_types::Address;

/// Exact EIP-152 input length.
const INPUT_LEN: usize = 213;

const SIGMA: [[usize; 16]; 10] = [
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
    [14, 10, 4, 8, 9, 15, 13, 6, 1, 12, 0, 2, 11, 7, 5, 3],
    [11, 8, 12, 0, 5, 2, 15, 13, 10, 14, 3, 6, 7, 1, 9, 4],
    [7, 9, 3, 1, 13, 12, 11, 14, 2, 6, 5, 10, 4, 0, 15, 8],
    [9, 0, 5, 7, 2, 4, 10, 15, 14, 1, 11, 12, 6, 8, 3, 13],
    [2, 12, 6, 10, 0, 11, 8, 3, 4, 13, 7, 5, 15, 14, 1, 9],
    [12, 5, 1, 15, 14, 13, 4, 10, 0, 7, 6, 3, 9, 2, 8, 11],
    [13, 11, 7, 14, 12, 1, 3, 9, 5, 0, 15, 4, 8, 6, 2, 10],
    [6, 15, 14, 9, 11, 3, 0, 8, 12, 2, 13, 7, 1, 4, 10, 5],
    [10, 2, 8, 4, 7, 6, 1, 5, 15, 11, 9, 14, 3, 12, 13, 0],
];

const IV: [u64; 8] = [
    0x6a09_e667_f3bc_c908,
    0xbb67_ae85_84ca_a73b,
    0x3c6e_f372_fe94_f82b,
    0xa54f_f53a_5f1d_36f1,
    0x510e_527f_ade6_82d1,
    0x9b05_688c_2b3e_6c1f,
    0x1f83_d9ab_fb41_bd6b,
    0x5be0_cd19_137e_2179,
];

#[allow(clippy::many_single_char_names)]
fn g(v: &mut [u64; 16], a: usize, b: usize, c: usize, d: usize, x: u64, y: u64) {
    v[a] = v[a].wrapping_add(v[b]).wrapping_add(x);
    v[d] = (v[d] ^ v[a]).rotate_right(32);
    v[c] = v[c].wrapping_add(v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(24);
    v[a] = v[a].wrapping_add(v[b]).wrapping_add(y);
    v[d] = (v[d] ^ v[a]).rotate_right(16);
    v[c] = v[c].wrapping_add(v[d]);
    v[b] = (v[b] ^ v[c]).rotate_right(63);
}

/// The F compression function over `rounds` rounds.
fn compress(rounds: u32, h: &mut [u64; 8], m: &[u64; 16], t: [u64; 2], last: bool) {
    let mut v = [0u64; 16];
    v[..8].copy_from_slice(h);
    v[8..].copy_from_slice(&IV);
    v[12] ^= t[0];
    v[13] ^= t[1];
    if last {
        v[14] = !v[14];
    }

    for round in 0..rounds as usize {
        let s = &SIGMA[round % 10];
        g(&mut v, 0, 4, 8, 12, m[s[0]], m[s[1]]);
        g(&mut v, 1, 5, 9, 13, m[s[2]], m[s[3]]);
        g(&mut v, 2, 6, 10, 14, m[s[4]], m[s[5]]);
        g(&mut v, 3, 7, 11, 15, m[s[6]], m[s[7]]);
        g(&mut v, 0, 5, 10, 15, m[s[8]], m[s[9]]);
        g(&mut v, 1, 6, 11, 12, m[s[10]], m[s[11]]);
        g(&mut v, 2, 7, 8, 13, m[s[12]], m[s[13]]);
        g(&mut v, 3, 4, 9, 14, m[s[14]], m[s[15]]);
    }

    for i in 0..8 {
        h[i] ^= v[i] ^ v[i + 8];
    }
}

/// BLAKE2b compression precompile.
pub struct Blake2F;

impl Precompile for Blake2F {
    fn gas(&self, input: &[u8], _fork: &ForkConfig) -> u64 {
        if input.len() != INPUT_LEN {
            return 0;
        }
        u64::from(u32::from_be_bytes([input[0], input[1], input[2], input[3]]))
    }

    fn run(
        &self,
        input: &[u8],
        _caller: Address,
        _host: &mut dyn Host,
    ) -> Result<Vec<u8>, VmError> {
        if input.len() != INPUT_LEN {
            return Err(VmError::InvalidInputData);
        }
        let final_flag = input[212];
        if final_flag > 1 {
            return Err(VmError::InvalidInputData);
        }

        let rounds = u32::from_be_bytes([input[0], input[1], input[2], input[3]]);

        let mut h = [0u64; 8];
        for (i, word) in h.iter_mut().enumerate() {
            let offset = 4 + i * 8;
            *word = u64::from_le_bytes(input[offset..offset + 8].try_into().expect("8 bytes"));
        }
        let mut m = [0u64; 16];
        for (i, word) in m.iter_mut().enumerate() {
            let offset = 68 + i * 8;
            *word = u64::from_le_bytes(input[offset..offset + 8].try_into().expect("8 bytes"));
        }
        let t = [
            u64::from_le_bytes(input[196..204].try_into().expect("8 bytes")),
            u64::from_le_bytes(input[204..212].try_into().expect("8 bytes")),
        ];

        compress(rounds, &mut h, &m, t, final_flag == 1);

        let mut out = Vec::with_capacity(64);
        for word in &h {
            out.extend_from_slice(&word.to_le_bytes());
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

    /// EIP-152 test vector 5: 12 rounds over "abc".
    fn vector_input() -> Vec<u8> {
        hex::decode(
            "0000000c48c9bdf267e6096a3ba7ca8485ae67bb2bf894fe72f36e3cf1361d5f3af54fa5\
             d182e6ad7f520e511f6c3e2b8c68059b6bbd41fbabd9831f79217e1319cde05b\
             6162630000000000000000000000000000000000000000000000000000000000\
             0000000000000000000000000000000000000000000000000000000000000000\
             0000000000000000000000000000000000000000000000000000000000000000\
             0000000000000000000000000000000000000000000000000000000000000000\
             0300000000000000000000000000000001",
        )
        .unwrap()
    }

    #[test]
    fn test_eip152_vector() {
        let out = Blake2F
            .run(&vector_input(), Address::ZERO, &mut NullHost)
            .unwrap();
        assert_eq!(
            hex::encode(&out),
            "ba80a53f981c4d0d6a2797b69f12f6e94c212f14685ac4b74b12bb6fdbffa2d1\
             7d87c5392aab792dc252d5de4533cc9518d38aa8dbf1925ab92386edd4009923"
        );
    }

    #[test]
    fn test_gas_is_rounds() {
        assert_eq!(Blake2F.gas(&vector_input(), &ForkConfig::default()), 12);
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert_eq!(
            Blake2F.run(&[0u8; 212], Address::ZERO, &mut NullHost),
            Err(VmError::InvalidInputData)
        );
    }
}
