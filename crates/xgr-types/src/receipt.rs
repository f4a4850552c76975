//! # Receipts, Logs, and Blooms
//!
//! Per-transaction receipts with their 2048-bit log bloom.

use crate::primitives::{keccak256, Address, Hash};
use crate::transaction::TxType;
use std::fmt;

// =============================================================================
// LOG
// =============================================================================

/// A single log record emitted during execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Log {
    /// Emitting account.
    pub address: Address,
    /// Indexed topics (0..=4).
    pub topics: Vec<Hash>,
    /// Opaque payload.
    pub data: Vec<u8>,
}

impl Log {
    /// Creates a log record.
    #[must_use]
    pub fn new(address: Address, topics: Vec<Hash>, data: Vec<u8>) -> Self {
        Self {
            address,
            topics,
            data,
        }
    }
}

// =============================================================================
// BLOOM (2048 bits)
// =============================================================================

/// A 2048-bit bloom filter over log addresses and topics.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Bloom(pub [u8; 256]);

impl Bloom {
    /// The empty bloom.
    pub const ZERO: Self = Self([0u8; 256]);

    /// Builds the bloom for a set of logs.
    #[must_use]
    pub fn from_logs(logs: &[Log]) -> Self {
        let mut bloom = Self::ZERO;
        for log in logs {
            bloom.add(log.address.as_bytes());
            for topic in &log.topics {
                bloom.add(topic.as_bytes());
            }
        }
        bloom
    }

    /// Sets the three bloom bits derived from `item`.
    pub fn add(&mut self, item: &[u8]) {
        let digest = keccak256(item);
        let bytes = digest.as_bytes();
        for i in [0usize, 2, 4] {
            let bit = ((u16::from(bytes[i]) << 8) | u16::from(bytes[i + 1])) & 0x7ff;
            self.0[255 - (bit / 8) as usize] |= 1 << (bit % 8);
        }
    }

    /// True if every bit set for `item` is present.
    #[must_use]
    pub fn contains(&self, item: &[u8]) -> bool {
        let digest = keccak256(item);
        let bytes = digest.as_bytes();
        for i in [0usize, 2, 4] {
            let bit = ((u16::from(bytes[i]) << 8) | u16::from(bytes[i + 1])) & 0x7ff;
            if self.0[255 - (bit / 8) as usize] & (1 << (bit % 8)) == 0 {
                return false;
            }
        }
        true
    }

    /// True when no bit is set.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl Default for Bloom {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Debug for Bloom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bloom(0x")?;
        for byte in &self.0[..4] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "...)")
    }
}

// =============================================================================
// RECEIPT
// =============================================================================

/// Terminal status of an applied transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiptStatus {
    /// Execution reverted or aborted; state was rolled back.
    Failed,
    /// Execution completed.
    Success,
}

/// The receipt minted for every applied transaction.
#[derive(Clone, Debug)]
pub struct Receipt {
    /// Terminal status.
    pub status: ReceiptStatus,
    /// Gas used by this and all prior transactions in the block.
    pub cumulative_gas_used: u64,
    /// Kind of the transaction this receipt belongs to.
    pub tx_type: TxType,
    /// Wire hash of the transaction.
    pub tx_hash: Hash,
    /// Gas used by this transaction alone.
    pub gas_used: u64,
    /// Created contract address, for creation transactions.
    pub contract_address: Option<Address>,
    /// Logs emitted, including synthetic controller logs.
    pub logs: Vec<Log>,
    /// Bloom over `logs`.
    pub logs_bloom: Bloom,
}

impl Receipt {
    /// Recomputes `logs_bloom` from the receipt's own logs.
    pub fn seal_bloom(&mut self) {
        self.logs_bloom = Bloom::from_logs(&self.logs);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bloom_membership() {
        let log = Log::new(
            Address::new([5u8; 20]),
            vec![keccak256(b"Transfer(address,address,uint256)")],
            vec![],
        );
        let bloom = Bloom::from_logs(&[log.clone()]);

        assert!(bloom.contains(log.address.as_bytes()));
        assert!(bloom.contains(log.topics[0].as_bytes()));
        assert!(!bloom.contains(Address::new([6u8; 20]).as_bytes()));
    }

    #[test]
    fn test_bloom_deterministic() {
        let logs = vec![Log::new(Address::new([1u8; 20]), vec![Hash::ZERO], vec![7])];
        assert_eq!(Bloom::from_logs(&logs), Bloom::from_logs(&logs));
    }

    #[test]
    fn test_empty_bloom() {
        assert!(Bloom::from_logs(&[]).is_zero());
    }
}
