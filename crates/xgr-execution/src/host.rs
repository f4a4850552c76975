//! # Host Seam
//!
//! The capability interface through which the EVM and the precompiles
//! touch state. The transition controller implements [`Host`]; the
//! runtimes borrow it for the duration of one frame. Passing the trait
//! by reference (instead of back-pointers) keeps ownership acyclic: the
//! transition owns the journal, access list, and receipts, and the EVM
//! only borrows them during `run`.

use crate::chain::ForkConfig;
use crate::errors::VmError;
use xgr_types::{Address, Hash, U256};

// =============================================================================
// CALL TYPE & CONTRACT
// =============================================================================

/// Kind of frame being entered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallType {
    /// Plain CALL with value transfer.
    Call,
    /// CALLCODE: callee code, caller storage.
    CallCode,
    /// DELEGATECALL: callee code, caller storage, caller/value inherited.
    DelegateCall,
    /// STATICCALL: read-only frame.
    StaticCall,
    /// CREATE.
    Create,
    /// CREATE2.
    Create2,
}

/// One call or creation frame.
#[derive(Clone, Debug)]
pub struct Contract {
    /// Frame kind.
    pub call_type: CallType,
    /// Call depth, 1 for the top-level frame.
    pub depth: usize,
    /// Transaction origin.
    pub origin: Address,
    /// Immediate caller.
    pub caller: Address,
    /// Account whose storage the frame writes.
    pub address: Address,
    /// Account whose code runs (differs under CALLCODE/DELEGATECALL).
    pub code_address: Address,
    /// Value carried by the frame.
    pub value: U256,
    /// Gas available to the frame.
    pub gas: u64,
    /// Bytecode to execute (init code for creations).
    pub code: Vec<u8>,
    /// Calldata.
    pub input: Vec<u8>,
    /// True inside a STATICCALL scope.
    pub is_static: bool,
}

impl Contract {
    /// Builds a CALL frame.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new_call(
        depth: usize,
        origin: Address,
        caller: Address,
        to: Address,
        value: U256,
        gas: u64,
        code: Vec<u8>,
        input: Vec<u8>,
    ) -> Self {
        Self {
            call_type: CallType::Call,
            depth,
            origin,
            caller,
            address: to,
            code_address: to,
            value,
            gas,
            code,
            input,
            is_static: false,
        }
    }

    /// Builds a creation frame targeting the derived `address`.
    #[must_use]
    pub fn new_creation(
        depth: usize,
        origin: Address,
        caller: Address,
        address: Address,
        value: U256,
        gas: u64,
        init_code: Vec<u8>,
    ) -> Self {
        Self {
            call_type: CallType::Create,
            depth,
            origin,
            caller,
            address,
            code_address: address,
            value,
            gas,
            code: init_code,
            input: Vec::new(),
            is_static: false,
        }
    }
}

// =============================================================================
// TRANSACTION CONTEXT
// =============================================================================

/// Per-transaction environment exposed to the runtimes.
///
/// `gas_price` is a 32-byte big-endian scalar; it is never downcast to a
/// machine word on the way through.
#[derive(Clone, Debug, Default)]
pub struct TxContext {
    /// Transaction origin.
    pub origin: Address,
    /// Effective gas price as a big-endian 256-bit word.
    pub gas_price: Hash,
    /// Block proposer receiving the validator fee share.
    pub coinbase: Address,
    /// Block height.
    pub number: u64,
    /// Block timestamp.
    pub timestamp: u64,
    /// Difficulty / prevrandao word.
    pub difficulty: Hash,
    /// Block gas limit.
    pub gas_limit: u64,
    /// EIP-1559 base fee (zero pre-London).
    pub base_fee: u64,
    /// Chain id.
    pub chain_id: u64,
    /// Resolved London burn contract.
    pub burn_contract: Address,
    /// Engine registry address from chain params.
    pub engine_registry: Address,
    /// Bootstrap engine EOA from chain params.
    pub bootstrap_engine: Address,
    /// Skip upfront-cost checks (read-only call paths).
    pub non_payable: bool,
}

// =============================================================================
// EXECUTION RESULT
// =============================================================================

/// Outcome of one frame (or of a whole transaction execution).
#[derive(Clone, Debug, Default)]
pub struct ExecutionResult {
    /// Return or revert data.
    pub return_value: Vec<u8>,
    /// Gas left unconsumed in the frame.
    pub gas_left: u64,
    /// Gas consumed, after settlement refunds where applied.
    pub gas_used: u64,
    /// Failure, if any.
    pub err: Option<VmError>,
    /// Created contract address, for creation frames.
    pub address: Option<Address>,
}

impl ExecutionResult {
    /// A frame failure that consumes `gas_left` as reported.
    #[must_use]
    pub fn failed(err: VmError, gas_left: u64) -> Self {
        Self {
            gas_left,
            err: Some(err),
            ..Self::default()
        }
    }

    /// True when the frame completed without error.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.err.is_none()
    }

    /// True when the frame failed in any way.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.err.is_some()
    }

    /// True when the frame ended in an explicit REVERT.
    #[must_use]
    pub fn reverted(&self) -> bool {
        matches!(self.err, Some(VmError::Reverted))
    }

    /// Settles `gas_used` against the purchased limit and applies the
    /// capped refund: `refund ≤ gas_used / 5` post-London, `/ 2` before.
    pub fn update_gas_used(&mut self, gas_limit: u64, refund: u64, london: bool) {
        self.gas_used = gas_limit.saturating_sub(self.gas_left);

        let quotient = if london { 5 } else { 2 };
        let applied = refund.min(self.gas_used / quotient);
        self.gas_left += applied;
        self.gas_used -= applied;
    }
}

// =============================================================================
// STORAGE STATUS (EIP-2200 slot machine)
// =============================================================================

/// Outcome classification of an SSTORE against the slot's original and
/// current values; drives gas and refund arithmetic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageStatus {
    /// Value equals the current value; nothing written.
    Unchanged,
    /// Clean slot changed between two non-zero values.
    Modified,
    /// Slot already dirty in this transaction; changed again.
    ModifiedAgain,
    /// Clean zero slot set to non-zero.
    Added,
    /// Clean non-zero slot cleared to zero.
    Deleted,
}

// =============================================================================
// HOST TRAIT
// =============================================================================

/// State and environment capabilities granted to the runtimes.
pub trait Host {
    /// True when the account exists in state.
    fn account_exists(&self, addr: Address) -> bool;

    /// True when the account is empty per EIP-158.
    fn empty(&self, addr: Address) -> bool;

    /// Current balance.
    fn get_balance(&self, addr: Address) -> U256;

    /// Current nonce.
    fn get_nonce(&self, addr: Address) -> u64;

    /// Deployed code (empty for EOAs).
    fn get_code(&self, addr: Address) -> Vec<u8>;

    /// Deployed code size.
    fn get_code_size(&self, addr: Address) -> usize;

    /// Code hash; zero for non-existent accounts.
    fn get_code_hash(&self, addr: Address) -> Hash;

    /// Reads a storage slot.
    fn get_storage(&self, addr: Address, key: Hash) -> Hash;

    /// Writes a storage slot through the EIP-2200 status machine,
    /// adjusting the refund counter as a side effect.
    fn set_storage(&mut self, addr: Address, key: Hash, value: Hash, fork: &ForkConfig)
        -> StorageStatus;

    /// Writes a storage slot directly, bypassing the status machine.
    fn set_state(&mut self, addr: Address, key: Hash, value: Hash);

    /// Reads transient storage (EIP-1153).
    fn get_transient(&self, addr: Address, key: Hash) -> Hash;

    /// Writes transient storage (EIP-1153).
    fn set_transient(&mut self, addr: Address, key: Hash, value: Hash);

    /// Moves `amount` wei; fails with `InsufficientBalance`.
    fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<(), VmError>;

    /// Appends a log record to the transaction's log buffer.
    fn emit_log(&mut self, addr: Address, topics: Vec<Hash>, data: Vec<u8>);

    /// Marks `addr` self-destructed and sweeps its balance to
    /// `beneficiary`; first destruction of an account adds the refund.
    fn selfdestruct(&mut self, addr: Address, beneficiary: Address);

    /// Dispatches a nested CALL or CREATE frame.
    fn callx(&mut self, contract: Contract) -> ExecutionResult;

    /// Per-transaction environment.
    fn get_tx_context(&self) -> TxContext;

    /// Hash of a historical block.
    fn get_block_hash(&self, number: u64) -> Hash;

    /// Warms an address; returns true when it was cold (EIP-2929).
    fn warm_address(&mut self, addr: Address) -> bool;

    /// Warms a storage slot; returns `(address_was_cold, slot_was_cold)`.
    fn warm_slot(&mut self, addr: Address, key: Hash) -> (bool, bool);
}

// =============================================================================
// TEST SUPPORT
// =============================================================================


// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_gas_used_refund_cap_london() {
        let mut result = ExecutionResult {
            gas_left: 20_000,
            ..ExecutionResult::default()
        };
        // limit 100k, used 80k, refund 30k → capped at 80k/5 = 16k
        result.update_gas_used(100_000, 30_000, true);
        assert_eq!(result.gas_used, 64_000);
        assert_eq!(result.gas_left, 36_000);
    }

    #[test]
    fn test_update_gas_used_refund_cap_pre_london() {
        let mut result = ExecutionResult {
            gas_left: 20_000,
            ..ExecutionResult::default()
        };
        // used 80k, refund 50k → capped at 80k/2 = 40k
        result.update_gas_used(100_000, 50_000, false);
        assert_eq!(result.gas_used, 40_000);
        assert_eq!(result.gas_left, 60_000);
    }

    #[test]
    fn test_result_classification() {
        let ok = ExecutionResult::default();
        assert!(ok.succeeded());
        assert!(!ok.reverted());

        let rev = ExecutionResult::failed(VmError::Reverted, 5);
        assert!(rev.is_failed());
        assert!(rev.reverted());

        let oog = ExecutionResult::failed(VmError::OutOfGas, 0);
        assert!(oog.is_failed());
        assert!(!oog.reverted());
    }
}
