//! # Primitive Value Types
//!
//! 20-byte addresses, 32-byte hashes, and the Keccak-256 helper every
//! other module builds on. These are defined by value, not identity.

use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;

// Re-export 256-bit arithmetic from primitive-types.
pub use primitive_types::{U256, U512};

// =============================================================================
// ADDRESS (20 bytes)
// =============================================================================

/// A 20-byte account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address.
    pub const ZERO: Self = Self([0u8; 20]);

    /// Creates an address from a 20-byte array.
    #[must_use]
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Creates an address from a slice. Returns `None` on wrong length.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() == 20 {
            let mut bytes = [0u8; 20];
            bytes.copy_from_slice(slice);
            Some(Self(bytes))
        } else {
            None
        }
    }

    /// Parses a `0x`-prefixed hex string. Shorter inputs are left-padded.
    ///
    /// # Panics
    ///
    /// Panics on non-hex input; intended for well-known constants.
    #[must_use]
    pub fn from_hex(hex_str: &str) -> Self {
        let clean = hex_str.trim_start_matches("0x");
        assert!(clean.len() <= 40, "address literal too long: {hex_str}");
        let mut padded = String::with_capacity(40);
        for _ in 0..(40 - clean.len()) {
            padded.push('0');
        }
        padded.push_str(clean);

        let mut bytes = [0u8; 20];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let hi = hex_digit(padded.as_bytes()[i * 2]);
            let lo = hex_digit(padded.as_bytes()[i * 2 + 1]);
            *byte = (hi << 4) | lo;
        }
        Self(bytes)
    }

    /// Returns the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Returns true if this is the zero address.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Returns the address as a left-padded 32-byte word.
    #[must_use]
    pub fn to_word(&self) -> Hash {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(&self.0);
        Hash(word)
    }
}

fn hex_digit(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        b'A'..=b'F' => c - b'A' + 10,
        _ => panic!("invalid hex digit: {}", c as char),
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl Encodable for Address {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.encoder().encode_value(&self.0);
    }
}

impl Decodable for Address {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        rlp.decoder().decode_value(|bytes| {
            Address::from_slice(bytes).ok_or(DecoderError::RlpIncorrectListLen)
        })
    }
}

// =============================================================================
// HASH (32 bytes)
// =============================================================================

/// A 32-byte word: Keccak-256 digests, storage keys, and storage values.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    /// The zero hash.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Creates a hash from a 32-byte array.
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Creates a hash from a slice. Returns `None` on wrong length.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() == 32 {
            let mut bytes = [0u8; 32];
            bytes.copy_from_slice(slice);
            Some(Self(bytes))
        } else {
            None
        }
    }

    /// Left-pads arbitrary bytes into a 32-byte word. Longer inputs keep
    /// their trailing 32 bytes.
    #[must_use]
    pub fn left_pad(slice: &[u8]) -> Self {
        let mut bytes = [0u8; 32];
        if slice.len() >= 32 {
            bytes.copy_from_slice(&slice[slice.len() - 32..]);
        } else {
            bytes[32 - slice.len()..].copy_from_slice(slice);
        }
        Self(bytes)
    }

    /// Encodes a `U256` as a big-endian word.
    #[must_use]
    pub fn from_u256(value: U256) -> Self {
        let mut bytes = [0u8; 32];
        value.to_big_endian(&mut bytes);
        Self(bytes)
    }

    /// Decodes the word as a big-endian `U256`.
    #[must_use]
    pub fn to_u256(&self) -> U256 {
        U256::from_big_endian(&self.0)
    }

    /// Returns the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns true if this is the zero hash.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Interprets the trailing 20 bytes as an address.
    #[must_use]
    pub fn to_address(&self) -> Address {
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&self.0[12..]);
        Address(addr)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<[u8; 32]> for Hash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl From<U256> for Hash {
    fn from(value: U256) -> Self {
        Self::from_u256(value)
    }
}

impl Encodable for Hash {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.encoder().encode_value(&self.0);
    }
}

impl Decodable for Hash {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        rlp.decoder()
            .decode_value(|bytes| Hash::from_slice(bytes).ok_or(DecoderError::RlpIncorrectListLen))
    }
}

// =============================================================================
// KECCAK-256
// =============================================================================

/// Computes the Keccak-256 digest of `data`.
#[must_use]
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    Hash(out)
}

/// Keccak-256 of the empty byte string, the code hash of every EOA.
#[must_use]
pub fn empty_code_hash() -> Hash {
    keccak256(&[])
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_from_hex_pads_left() {
        let addr = Address::from_hex("0x666");
        assert_eq!(addr.as_bytes()[19], 0x66);
        assert_eq!(addr.as_bytes()[18], 0x06);
        assert_eq!(&addr.as_bytes()[..18], &[0u8; 18]);
    }

    #[test]
    fn test_address_word_round_trip() {
        let addr = Address::new([0xabu8; 20]);
        assert_eq!(addr.to_word().to_address(), addr);
    }

    #[test]
    fn test_hash_u256_round_trip() {
        let value = U256::from(123_456_789u64);
        assert_eq!(Hash::from_u256(value).to_u256(), value);
    }

    #[test]
    fn test_keccak256_known_vector() {
        // keccak256("") is the canonical empty-code hash.
        let digest = keccak256(&[]);
        assert_eq!(
            hex::encode(digest.as_bytes()),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_hash_left_pad() {
        let h = Hash::left_pad(&[1, 2]);
        assert_eq!(h.as_bytes()[30], 1);
        assert_eq!(h.as_bytes()[31], 2);
        assert!(h.as_bytes()[..30].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_rlp_round_trip() {
        let addr = Address::new([7u8; 20]);
        let encoded = rlp::encode(&addr);
        let decoded: Address = rlp::decode(&encoded).unwrap();
        assert_eq!(decoded, addr);
    }
}
