//! # XGR Execution Core
//!
//! The transaction execution core of the XGR chain: a per-block
//! [`transition::Transition`] engine that takes a parent state root and
//! a block header, applies transactions through the EVM interpreter and
//! the precompile set, enforces the consensus gas and fee rules, and
//! produces receipts, logs, and a new state root.
//!
//! ## Layers
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`state`] | snapshot abstraction, journaled overlay, in-memory backend |
//! | [`access_list`] | EIP-2929 warm sets with frame-scope revert |
//! | [`evm`] | dispatch table, stack, memory, gas, interpreter |
//! | [`precompiles`] | standard and chain-specific precompiles |
//! | [`registry`] | engine-registry storage reader |
//! | [`address_list`] | allow/block list roles and update runtime |
//! | [`transition`] | the per-block controller and fee split |
//!
//! The core is single-threaded per transition: transactions apply
//! strictly in order and nothing blocks on I/O. `Transition::commit` is
//! the only path that publishes a root, so a discarded transition never
//! exposes partial state.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod access_list;
pub mod address_list;
pub mod chain;
pub mod contracts;
pub mod errors;
pub mod evm;
pub mod host;
pub mod precompiles;
pub mod registry;
pub mod state;
pub mod transition;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::access_list::AccessList;
    pub use crate::chain::{ChainParams, ForkConfig, Forks};
    pub use crate::errors::{ConsensusError, StateError, TransitionError, VmError};
    pub use crate::evm::Evm;
    pub use crate::host::{
        CallType, Contract, ExecutionResult, Host, StorageStatus, TxContext,
    };
    pub use crate::precompiles::Precompiles;
    pub use crate::state::inmem::InMemoryState;
    pub use crate::state::journal::Txn;
    pub use crate::state::{Account, Snapshot, StateBackend, StateObject};
    pub use crate::transition::{Executor, Transition};
}
