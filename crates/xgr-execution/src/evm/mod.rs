//! # EVM Runtime
//!
//! The bytecode runtime: dispatch table, operand stack, frame memory,
//! gas schedule, and the interpreter. The transition controller routes
//! every frame that no precompile claims through [`Evm::run`].

pub mod dispatch;
pub mod gas;
pub mod interpreter;
pub mod memory;
pub mod opcodes;
pub mod stack;

pub use interpreter::{Interpreter, MAX_CALL_DEPTH, MAX_CODE_SIZE, MAX_INIT_CODE_SIZE};

use crate::chain::ForkConfig;
use crate::host::{Contract, ExecutionResult, Host};

/// The EVM runtime entry point.
#[derive(Clone, Copy, Debug, Default)]
pub struct Evm;

impl Evm {
    /// Creates the runtime.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// The EVM accepts any contract the precompile registry declined.
    #[must_use]
    pub fn can_run(&self, _contract: &Contract, _fork: &ForkConfig) -> bool {
        true
    }

    /// Executes one frame. Empty code completes immediately.
    pub fn run(
        &self,
        contract: &Contract,
        host: &mut dyn Host,
        fork: &ForkConfig,
    ) -> ExecutionResult {
        if contract.code.is_empty() {
            return ExecutionResult {
                gas_left: contract.gas,
                ..ExecutionResult::default()
            };
        }

        Interpreter::new(contract, host, fork).execute()
    }
}
