//! # Block Header
//!
//! The slice of the header the execution core reads. Consensus owns the
//! full sealed header; only execution-relevant fields appear here.

use crate::primitives::{Address, Hash};
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// Execution-relevant block header fields.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Header {
    /// Block height.
    pub number: u64,
    /// Unix timestamp.
    pub timestamp: u64,
    /// Block gas limit, which also seeds the transition gas pool.
    pub gas_limit: u64,
    /// Legacy difficulty / prevrandao word.
    pub difficulty: u64,
    /// EIP-1559 base fee (zero pre-London).
    pub base_fee: u64,
    /// Block proposer.
    pub miner: Address,
    /// Parent state root this block executes on top of.
    pub parent_root: Hash,
}

/// A block as the execution core consumes it.
#[derive(Clone, Debug, Default)]
pub struct Block {
    /// Header fields.
    pub header: Header,
    /// Ordered transactions.
    pub transactions: Vec<Transaction>,
}
