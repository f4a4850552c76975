//! # XGR Chain Types
//!
//! Value types shared by every consumer of the XGR execution core:
//! addresses, hashes, transactions with their wire codecs, receipts,
//! logs, blooms, headers, and genesis allocations.
//!
//! Everything in this crate is plain data. Execution semantics live in
//! `xgr-execution`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod crypto;
pub mod genesis;
pub mod header;
pub mod primitives;
pub mod receipt;
pub mod transaction;

pub use primitives::{empty_code_hash, keccak256, Address, Hash, U256, U512};

/// Decode failures for wire formats handled by this crate.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// RLP structure did not match the expected shape.
    #[error("bad rlp: {0}")]
    BadRlp(String),

    /// The typed-envelope prefix byte is not a known transaction type.
    #[error("unknown transaction type: 0x{0:02x}")]
    UnknownTxType(u8),

    /// The envelope was empty.
    #[error("empty input")]
    EmptyInput,
}

impl From<rlp::DecoderError> for DecodeError {
    fn from(err: rlp::DecoderError) -> Self {
        Self::BadRlp(err.to_string())
    }
}
