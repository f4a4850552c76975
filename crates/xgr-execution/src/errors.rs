//! # Error Types
//!
//! Three error layers with distinct blast radii:
//!
//! - [`ConsensusError`] rejects a transaction outright; it never enters
//!   the block. Wrapped in [`TransitionError`] with a recoverability
//!   flag for the pool.
//! - [`VmError`] fails the current call frame (or the whole execution);
//!   the transaction is still included with a failed receipt.
//! - [`StateError`] signals backend-level trouble (unknown roots).

use thiserror::Error;
use xgr_types::crypto::SignatureError;
use xgr_types::{Address, Hash};

// =============================================================================
// VM ERRORS (execution failures, receipt status = Failed)
// =============================================================================

/// Errors raised while executing a call frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Frame ran out of gas.
    #[error("out of gas")]
    OutOfGas,

    /// Stack exceeded 1024 entries.
    #[error("stack overflow")]
    StackOverflow,

    /// Pop or peek on missing stack entries.
    #[error("stack underflow")]
    StackUnderflow,

    /// Jump target is not a JUMPDEST.
    #[error("invalid jump destination")]
    InvalidJump,

    /// Opcode undefined for the active fork.
    #[error("invalid opcode: 0x{0:02x}")]
    InvalidOpcode(u8),

    /// State mutation attempted inside STATICCALL.
    #[error("write protection in static call")]
    StaticCallWrite,

    /// Call depth passed 1024.
    #[error("max call depth exceeded")]
    Depth,

    /// Account balance below the attempted transfer.
    #[error("insufficient balance for transfer")]
    InsufficientBalance,

    /// Account balance below the attempted debit.
    #[error("not enough funds")]
    NotEnoughFunds,

    /// CREATE target already has code or nonce.
    #[error("contract address collision")]
    ContractAddressCollision,

    /// Deployed code exceeds the EIP-158 limit.
    #[error("max code size exceeded")]
    MaxCodeSizeExceeded,

    /// Not enough gas left to pay the code-store fee.
    #[error("contract creation code storage out of gas")]
    CodeStoreOutOfGas,

    /// RETURNDATACOPY past the end of the return buffer.
    #[error("return data out of bounds")]
    ReturnDataOutOfBounds,

    /// Gas arithmetic overflowed.
    #[error("gas overflow")]
    GasOverflow,

    /// Nonce increment would wrap.
    #[error("nonce uint64 overflow")]
    NonceUintOverflow,

    /// Caller denied by an allow/block list.
    #[error("caller not authorized")]
    NotAuth,

    /// Explicit REVERT; return data carries the reason.
    #[error("execution reverted")]
    Reverted,

    /// Precompile input could not be decoded or failed validation.
    #[error("invalid input data")]
    InvalidInputData,

    /// Precompile caller failed authorization or deadline checks.
    #[error("unauthorized caller")]
    UnauthorizedCaller,

    /// No runtime accepted the contract.
    #[error("runtime not found")]
    RuntimeNotFound,

    /// Backend failure surfaced mid-execution.
    #[error(transparent)]
    State(#[from] StateError),
}

impl VmError {
    /// True for REVERT, which preserves unconsumed gas.
    #[must_use]
    pub fn is_revert(&self) -> bool {
        matches!(self, Self::Reverted)
    }
}

// =============================================================================
// STATE ERRORS
// =============================================================================

/// Errors from the state backend or journal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    /// No snapshot exists for the requested root.
    #[error("unknown state root: {0}")]
    UnknownRoot(Hash),

    /// Snapshot id does not name a live journal position.
    #[error("invalid journal snapshot id: {0}")]
    InvalidSnapshotId(usize),
}

// =============================================================================
// CONSENSUS ERRORS (transaction rejected, not included)
// =============================================================================

/// Consensus-rule violations detected before execution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    /// Sender nonce does not equal the transaction nonce.
    #[error("incorrect nonce")]
    NonceIncorrect,

    /// Sender balance below the upfront gas cost.
    #[error("not enough funds to cover gas costs")]
    NotEnoughFundsForGas,

    /// Block gas pool exhausted.
    #[error("gas limit reached in the pool")]
    BlockLimitReached,

    /// Intrinsic gas computation overflowed.
    #[error("overflow in intrinsic gas calculation")]
    IntrinsicGasOverflow,

    /// Purchased gas below intrinsic cost.
    #[error("not enough gas supplied for intrinsic gas costs")]
    NotEnoughIntrinsicGas,

    /// Creation transaction init code above the EIP-3860 limit.
    #[error("max initcode size exceeded")]
    MaxInitCodeSizeExceeded,

    /// Transaction type inactive at the current fork.
    #[error("transaction type not supported for current fork")]
    TxTypeNotSupported,

    /// Typed transactions gated behind the typed-hash fork.
    #[error("typed transactions not allowed before txHashWithType fork")]
    TypedTxNotAllowed,

    /// Legacy or access-list transaction without a gas price.
    #[error("gas price is not set")]
    GasPriceNotSet,

    /// Priority fee above the fee cap.
    #[error("max priority fee per gas higher than max fee per gas")]
    TipAboveFeeCap,

    /// Priority fee exceeds 2^256-1 bounds check.
    #[error("max priority fee per gas higher than 2^256-1")]
    TipVeryHigh,

    /// Fee cap exceeds 2^256-1 bounds check.
    #[error("max fee per gas higher than 2^256-1")]
    FeeCapVeryHigh,

    /// Fee cap below the block base fee.
    #[error("max fee per gas less than block base fee")]
    FeeCapTooLow,

    /// Sender nonce would wrap on increment.
    #[error("nonce uint64 overflow")]
    NonceUintOverflow,

    /// State transaction declared a non-zero gas price.
    #[error("gasPrice of state transaction must be zero")]
    StateTxNonZeroGasPrice,

    /// State transaction declared the wrong gas limit.
    #[error("gas of state transaction must be {expected}")]
    StateTxBadGasLimit {
        /// The mandated state-transaction gas limit.
        expected: u64,
    },

    /// State transaction from an address other than the system caller.
    #[error("state transaction sender must be {expected}, but got {actual}")]
    StateTxBadSender {
        /// The mandated system caller.
        expected: Address,
        /// The sender the transaction declared.
        actual: Address,
    },

    /// State transaction without a target.
    #[error("to of state transaction must be specified")]
    StateTxMissingTo,

    /// Sender recovery failed.
    #[error("signature: {0}")]
    Signature(#[from] SignatureError),

    /// Backend failure while loading the parent state.
    #[error(transparent)]
    State(#[from] StateError),
}

// =============================================================================
// TRANSITION ERROR (consensus error + pool recoverability)
// =============================================================================

/// A rejected transaction, tagged with whether the pool may re-queue it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{source}")]
pub struct TransitionError {
    /// The underlying consensus violation.
    #[source]
    pub source: ConsensusError,
    /// True when the transaction may become valid later (re-queueable).
    pub recoverable: bool,
}

impl TransitionError {
    /// Wraps a consensus error with its recoverability.
    #[must_use]
    pub fn new(source: ConsensusError, recoverable: bool) -> Self {
        Self {
            source,
            recoverable,
        }
    }

    /// A recoverable rejection (pool may retry).
    #[must_use]
    pub fn recoverable(source: ConsensusError) -> Self {
        Self::new(source, true)
    }

    /// A terminal rejection (pool must drop).
    #[must_use]
    pub fn fatal(source: ConsensusError) -> Self {
        Self::new(source, false)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vm_error_display() {
        assert_eq!(VmError::OutOfGas.to_string(), "out of gas");
        assert_eq!(VmError::InvalidOpcode(0xfe).to_string(), "invalid opcode: 0xfe");
    }

    #[test]
    fn test_revert_classification() {
        assert!(VmError::Reverted.is_revert());
        assert!(!VmError::OutOfGas.is_revert());
        assert!(!VmError::StackUnderflow.is_revert());
    }

    #[test]
    fn test_transition_error_recoverable() {
        let err = TransitionError::recoverable(ConsensusError::NonceIncorrect);
        assert!(err.recoverable);
        assert_eq!(err.to_string(), "incorrect nonce");

        let err = TransitionError::fatal(ConsensusError::GasPriceNotSet);
        assert!(!err.recoverable);
    }
}
