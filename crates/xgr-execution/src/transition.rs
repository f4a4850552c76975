//! # Transition Controller
//!
//! The per-block executor. `Executor::begin_txn` loads a snapshot and
//! produces a [`Transition`]; `Transition::write` runs one transaction
//! through the consensus gates, the gas pool, the runtimes, and the fee
//! split, minting a receipt. `Transition::commit` folds the journal
//! into the backend and publishes the new root; nothing else does.

use crate::access_list::AccessList;
use crate::address_list;
use crate::chain::{ChainParams, ForkConfig};
use crate::contracts;
use crate::errors::{ConsensusError, StateError, TransitionError, VmError};
use crate::evm::{Evm, MAX_CALL_DEPTH, MAX_CODE_SIZE, MAX_INIT_CODE_SIZE};
use crate::host::{CallType, Contract, ExecutionResult, Host, StorageStatus, TxContext};
use crate::precompiles::Precompiles;
use crate::registry;
use crate::state::journal::Txn;
use crate::state::{Snapshot, StateBackend};
use std::sync::Arc;
use thiserror::Error;
use xgr_types::crypto::{create_address, Signer};
use xgr_types::genesis::{GenesisAlloc, StateOverride};
use xgr_types::header::{Block, Header};
use xgr_types::receipt::{Bloom, Log, Receipt, ReceiptStatus};
use xgr_types::transaction::{Transaction, TxType};
use xgr_types::{keccak256, Address, Hash, U256};

/// Per-transaction base gas.
pub const TX_GAS: u64 = 21_000;
/// Per-transaction base gas for contract creation after Homestead.
pub const TX_GAS_CONTRACT_CREATION: u64 = 53_000;
/// Intrinsic surcharge per access-list address (EIP-2930).
pub const TX_ACCESS_LIST_ADDRESS_GAS: u64 = 2_400;
/// Intrinsic surcharge per access-list storage key (EIP-2930).
pub const TX_ACCESS_LIST_STORAGE_KEY_GAS: u64 = 1_900;

/// Fixed per-transaction burn: 1000 Gwei, fork-independent.
pub fn fixed_burn_wei() -> U256 {
    U256::from(1_000u64) * U256::from(1_000_000_000u64)
}

/// Hook invoked after every apply, success or failure.
pub type PostHook = Arc<dyn Fn(&Transition) + Send + Sync>;
/// Hook invoked inside `write_genesis` before the commit.
pub type GenesisPostHook = Arc<dyn Fn(&mut Transition) -> Result<(), VmError> + Send + Sync>;
/// Historical block-hash resolver for one block.
pub type BlockHashFn = Arc<dyn Fn(u64) -> Hash + Send + Sync>;
/// Produces the per-block hash resolver from a header.
pub type BlockHashHelper = Arc<dyn Fn(&Header) -> BlockHashFn + Send + Sync>;

/// Direct state mutations and overrides that cannot proceed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SetupError {
    /// Target account already exists.
    #[error("can't add account to {0} because an account exists already")]
    AccountExists(Address),

    /// Target account does not exist.
    #[error("account doesn't exist at {0}")]
    AccountMissing(Address),

    /// `state` and `state_diff` are mutually exclusive.
    #[error("cannot override both state and state diff")]
    OverrideConflict,
}

// =============================================================================
// EXECUTOR
// =============================================================================

/// Block-level entry point owning the chain parameters and the state
/// backend.
pub struct Executor {
    params: ChainParams,
    state: Arc<dyn StateBackend>,
    /// Observability hook, called after every apply.
    pub post_hook: Option<PostHook>,
    /// Genesis customisation hook.
    pub genesis_post_hook: Option<GenesisPostHook>,
    /// Historical block-hash provider.
    pub get_hash: BlockHashHelper,
}

impl Executor {
    /// Creates an executor over `state`.
    pub fn new(params: ChainParams, state: Arc<dyn StateBackend>) -> Self {
        Self {
            params,
            state,
            post_hook: None,
            genesis_post_hook: None,
            get_hash: Arc::new(|_header| Arc::new(|_number| Hash::ZERO)),
        }
    }

    /// Active fork flags at `number`.
    #[must_use]
    pub fn forks_at(&self, number: u64) -> ForkConfig {
        self.params.forks.at(number)
    }

    /// Snapshot at a committed root.
    pub fn state_at(&self, root: Hash) -> Result<Arc<dyn Snapshot>, StateError> {
        self.state.new_snapshot_at(root)
    }

    /// Applies the genesis allocation and commits the genesis root.
    pub fn write_genesis(
        &self,
        alloc: &GenesisAlloc,
        initial_root: Hash,
    ) -> Result<Hash, TransitionError> {
        let snapshot = if initial_root.is_zero() {
            self.state.new_snapshot()
        } else {
            self.state
                .new_snapshot_at(initial_root)
                .map_err(|err| TransitionError::fatal(err.into()))?
        };

        let fork = self.params.forks.at(0);
        let ctx = TxContext {
            chain_id: self.params.chain_id,
            engine_registry: self.params.engine_registry,
            bootstrap_engine: self.params.bootstrap_engine_eoa,
            ..TxContext::default()
        };

        let mut transition = Transition {
            fork,
            state: Txn::new(Arc::clone(&snapshot)),
            snapshot,
            ctx,
            gas_pool: 0,
            get_hash: Arc::new(|_| Hash::ZERO),
            access_list: None,
            receipts: Vec::new(),
            total_gas: 0,
            donation_fee: U256::zero(),
            validator_fee: U256::zero(),
            burned_fee: U256::zero(),
            evm: Evm::new(),
            precompiles: Precompiles::new(),
            deployment_allow_list: None,
            deployment_block_list: None,
            txn_allow_list: None,
            txn_block_list: None,
            post_hook: None,
        };

        for (addr, account) in alloc {
            if let Some(balance) = account.balance {
                transition.state.add_balance(*addr, balance);
            }
            if account.nonce != 0 {
                transition.state.set_nonce(*addr, account.nonce);
            }
            if let Some(code) = &account.code {
                if !code.is_empty() {
                    transition.state.set_code(*addr, code.clone());
                }
            }
            for (key, value) in &account.storage {
                transition.state.set_state(*addr, *key, *value);
            }
        }

        self.seed_address_lists(&mut transition);

        if let Some(hook) = &self.genesis_post_hook {
            hook(&mut transition).map_err(|_| {
                TransitionError::fatal(ConsensusError::State(StateError::UnknownRoot(Hash::ZERO)))
            })?;
        }

        let objects = transition.state.commit(false);
        let (_, root) = transition
            .snapshot
            .commit(&objects)
            .map_err(|err| TransitionError::fatal(err.into()))?;
        Ok(root)
    }

    fn seed_address_lists(&self, transition: &mut Transition) {
        let mut set_state =
            |addr: Address, key: Hash, value: Hash| transition.state.set_state(addr, key, value);

        let lists = [
            (
                &self.params.contract_deployer_allow_list,
                contracts::allow_list_contracts_addr(),
            ),
            (
                &self.params.contract_deployer_block_list,
                contracts::block_list_contracts_addr(),
            ),
            (
                &self.params.transactions_allow_list,
                contracts::allow_list_transactions_addr(),
            ),
            (
                &self.params.transactions_block_list,
                contracts::block_list_transactions_addr(),
            ),
        ];
        for (config, addr) in lists {
            if let Some(config) = config {
                address_list::seed_roles(
                    &mut set_state,
                    addr,
                    &config.admin_addresses,
                    &config.enabled_addresses,
                );
            }
        }
    }

    /// Executes every transaction of `block` on top of `parent_root`.
    /// Transactions whose gas exceeds the block gas limit are skipped.
    pub fn process_block(
        &self,
        parent_root: Hash,
        block: &Block,
        block_creator: Address,
    ) -> Result<Transition, TransitionError> {
        let mut transition = self.begin_txn(parent_root, &block.header, block_creator)?;

        for tx in &block.transactions {
            if tx.gas > block.header.gas_limit {
                continue;
            }
            transition.write(tx)?;
        }

        Ok(transition)
    }

    /// Loads the parent snapshot and prepares a per-block transition.
    pub fn begin_txn(
        &self,
        parent_root: Hash,
        header: &Header,
        coinbase: Address,
    ) -> Result<Transition, TransitionError> {
        let fork = self.params.forks.at(header.number);

        let snapshot = self
            .state
            .new_snapshot_at(parent_root)
            .map_err(|err| TransitionError::fatal(err.into()))?;

        let burn_contract = if fork.london {
            self.params
                .calculate_burn_contract(header.number)
                .unwrap_or(Address::ZERO)
        } else {
            Address::ZERO
        };

        let ctx = TxContext {
            origin: Address::ZERO,
            gas_price: Hash::ZERO,
            coinbase,
            number: header.number,
            timestamp: header.timestamp,
            difficulty: Hash::from_u256(U256::from(header.difficulty)),
            gas_limit: header.gas_limit,
            base_fee: header.base_fee,
            chain_id: self.params.chain_id,
            burn_contract,
            engine_registry: self.params.engine_registry,
            bootstrap_engine: self.params.bootstrap_engine_eoa,
            non_payable: false,
        };

        Ok(Transition {
            fork,
            state: Txn::new(Arc::clone(&snapshot)),
            snapshot,
            ctx,
            gas_pool: header.gas_limit,
            get_hash: (self.get_hash)(header),
            access_list: None,
            receipts: Vec::new(),
            total_gas: 0,
            donation_fee: U256::zero(),
            validator_fee: U256::zero(),
            burned_fee: U256::zero(),
            evm: Evm::new(),
            precompiles: Precompiles::new(),
            deployment_allow_list: self
                .params
                .contract_deployer_allow_list
                .as_ref()
                .map(|_| contracts::allow_list_contracts_addr()),
            deployment_block_list: self
                .params
                .contract_deployer_block_list
                .as_ref()
                .map(|_| contracts::block_list_contracts_addr()),
            txn_allow_list: self
                .params
                .transactions_allow_list
                .as_ref()
                .map(|_| contracts::allow_list_transactions_addr()),
            txn_block_list: self
                .params
                .transactions_block_list
                .as_ref()
                .map(|_| contracts::block_list_transactions_addr()),
            post_hook: self.post_hook.clone(),
        })
    }
}

// =============================================================================
// TRANSITION
// =============================================================================

/// Per-block execution state: journal, access list, gas pool, receipts.
pub struct Transition {
    fork: ForkConfig,
    state: Txn,
    snapshot: Arc<dyn Snapshot>,
    ctx: TxContext,
    gas_pool: u64,
    get_hash: BlockHashFn,
    access_list: Option<AccessList>,

    receipts: Vec<Receipt>,
    total_gas: u64,
    donation_fee: U256,
    validator_fee: U256,
    burned_fee: U256,

    evm: Evm,
    precompiles: Precompiles,

    deployment_allow_list: Option<Address>,
    deployment_block_list: Option<Address>,
    txn_allow_list: Option<Address>,
    txn_block_list: Option<Address>,

    post_hook: Option<PostHook>,
}

impl Transition {
    /// Receipts minted so far.
    #[must_use]
    pub fn receipts(&self) -> &[Receipt] {
        &self.receipts
    }

    /// Cumulative gas used in the block.
    #[must_use]
    pub fn total_gas(&self) -> u64 {
        self.total_gas
    }

    /// Immutable view of the journal for hooks and read paths.
    #[must_use]
    pub fn txn(&self) -> &Txn {
        &self.state
    }

    /// Mutable journal access for collaborators that pre-seed state.
    pub fn txn_mut(&mut self) -> &mut Txn {
        &mut self.state
    }

    /// Switches read-only mode: upfront cost and fee checks are
    /// skipped (`eth_call`-style paths).
    pub fn set_non_payable(&mut self, non_payable: bool) {
        self.ctx.non_payable = non_payable;
    }

    /// Applies read-path account overrides.
    pub fn with_state_override(&mut self, overrides: &StateOverride) -> Result<(), SetupError> {
        for (addr, entry) in overrides {
            if entry.state.is_some() && entry.state_diff.is_some() {
                return Err(SetupError::OverrideConflict);
            }

            if let Some(nonce) = entry.nonce {
                self.state.set_nonce(*addr, nonce);
            }
            if let Some(balance) = entry.balance {
                self.state.set_balance(*addr, balance);
            }
            if let Some(code) = &entry.code {
                self.state.set_code(*addr, code.clone());
            }
            if let Some(state) = &entry.state {
                let replacement = state.iter().map(|(k, v)| (*k, *v)).collect();
                self.state.set_full_storage(*addr, &replacement);
            }
            if let Some(diff) = &entry.state_diff {
                for (key, value) in diff {
                    self.state.set_state(*addr, *key, *value);
                }
            }
        }
        Ok(())
    }

    /// Seeds an account that must not exist yet (genesis hooks).
    pub fn set_account_directly(
        &mut self,
        addr: Address,
        account: &xgr_types::genesis::GenesisAccount,
    ) -> Result<(), SetupError> {
        if self.state.exist(addr) {
            return Err(SetupError::AccountExists(addr));
        }

        if let Some(code) = &account.code {
            self.state.set_code(addr, code.clone());
        }
        for (key, value) in &account.storage {
            self.state.set_state(addr, *key, *value);
        }
        self.state
            .set_balance(addr, account.balance.unwrap_or_default());
        self.state.set_nonce(addr, account.nonce);
        Ok(())
    }

    /// Replaces code of an account that must already exist.
    pub fn set_code_directly(&mut self, addr: Address, code: Vec<u8>) -> Result<(), SetupError> {
        if !self.state.exist(addr) {
            return Err(SetupError::AccountMissing(addr));
        }
        self.state.set_code(addr, code);
        Ok(())
    }

    // =========================================================================
    // WRITE (per-transaction pipeline)
    // =========================================================================

    /// Applies one transaction and mints its receipt.
    pub fn write(&mut self, tx: &Transaction) -> Result<(), TransitionError> {
        let mut msg = tx.clone();

        if msg.from.is_zero() && msg.tx_type != TxType::State {
            let signer = Signer::new(self.ctx.chain_id, self.fork.homestead, self.fork.eip155);
            msg.from = signer
                .sender(&msg)
                .map_err(|err| TransitionError::fatal(err.into()))?;
        }

        let result = match self.apply(&msg) {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(tx_hash = %msg.hash, error = %err, "failed to apply tx");
                return Err(err);
            }
        };

        self.total_gas += result.gas_used;

        let mut logs = self.state.take_logs();
        if msg.tx_type != TxType::State {
            logs.push(self.fee_split_log());
        }

        self.state.clean_delete_objects(true);

        let mut receipt = Receipt {
            status: if result.is_failed() {
                ReceiptStatus::Failed
            } else {
                ReceiptStatus::Success
            },
            cumulative_gas_used: self.total_gas,
            tx_type: msg.tx_type,
            tx_hash: msg.hash,
            gas_used: result.gas_used,
            contract_address: msg
                .is_contract_creation()
                .then(|| create_address(msg.from, msg.nonce)),
            logs,
            logs_bloom: Bloom::ZERO,
        };
        receipt.seal_bloom();
        self.receipts.push(receipt);

        Ok(())
    }

    /// The synthetic `XGRFeeSplit(donation, validator, burned)` log.
    fn fee_split_log(&self) -> Log {
        let topic = keccak256(b"XGRFeeSplit(uint256,uint256,uint256)");
        let mut data = Vec::with_capacity(96);
        data.extend_from_slice(Hash::from_u256(self.donation_fee).as_bytes());
        data.extend_from_slice(Hash::from_u256(self.validator_fee).as_bytes());
        data.extend_from_slice(Hash::from_u256(self.burned_fee).as_bytes());
        Log::new(contracts::fee_split_log_addr(), vec![topic], data)
    }

    /// Applies a transaction inside a snapshot scope; failures revert
    /// everything and the post-hook always runs.
    pub fn apply(&mut self, msg: &Transaction) -> Result<ExecutionResult, TransitionError> {
        // EIP-1153: transient storage lives for exactly one transaction.
        self.state.clear_transient();

        let snapshot = self.state.snapshot();
        let result = self.apply_inner(msg);

        if result.is_err() {
            self.state
                .revert_to_snapshot(snapshot)
                .map_err(|err| TransitionError::fatal(err.into()))?;
        }

        if let Some(hook) = self.post_hook.clone() {
            hook(self);
        }

        result
    }

    fn sub_gas_pool(&mut self, amount: u64) -> Result<(), TransitionError> {
        if self.gas_pool < amount {
            return Err(TransitionError::recoverable(
                ConsensusError::BlockLimitReached,
            ));
        }
        self.gas_pool -= amount;
        Ok(())
    }

    fn add_gas_pool(&mut self, amount: u64) {
        self.gas_pool += amount;
    }

    fn nonce_check(&self, msg: &Transaction) -> Result<(), ConsensusError> {
        if self.state.get_nonce(msg.from) != msg.nonce {
            return Err(ConsensusError::NonceIncorrect);
        }
        Ok(())
    }

    /// EIP-1559 sanity: tip below cap, cap at or above base fee; legacy
    /// prices must clear the base fee under London.
    fn check_dynamic_fees(&self, msg: &Transaction) -> Result<(), ConsensusError> {
        if msg.tx_type == TxType::DynamicFee {
            let tip = msg.tip.unwrap_or_default();
            let cap = msg.max_fee.unwrap_or_default();
            if tip > cap {
                return Err(ConsensusError::TipAboveFeeCap);
            }
            if cap < U256::from(self.ctx.base_fee) {
                return Err(ConsensusError::FeeCapTooLow);
            }
            return Ok(());
        }

        if self.fork.london {
            let price = msg.gas_price.unwrap_or_default();
            if price < U256::from(self.ctx.base_fee) {
                return Err(ConsensusError::FeeCapTooLow);
            }
        }
        Ok(())
    }

    fn sub_gas_limit_price(&mut self, msg: &Transaction) -> Result<(), ConsensusError> {
        let upfront = msg
            .get_gas_price(self.ctx.base_fee)
            .saturating_mul(U256::from(msg.gas));
        self.state
            .sub_balance(msg.from, upfront)
            .map_err(|_| ConsensusError::NotEnoughFundsForGas)
    }

    fn check_tx(&mut self, msg: &Transaction) -> Result<(), TransitionError> {
        // Fork / type gating (consensus critical).
        if msg.tx_type == TxType::AccessList {
            if !self.fork.eip2930 {
                return Err(TransitionError::recoverable(
                    ConsensusError::TxTypeNotSupported,
                ));
            }
            if !self.fork.tx_hash_with_type {
                return Err(TransitionError::recoverable(
                    ConsensusError::TypedTxNotAllowed,
                ));
            }
        }
        if msg.tx_type == TxType::DynamicFee && !self.fork.london {
            return Err(TransitionError::recoverable(
                ConsensusError::TxTypeNotSupported,
            ));
        }

        // Gas price is mandatory outside the 1559 fee market.
        if msg.tx_type != TxType::DynamicFee
            && msg.tx_type != TxType::State
            && msg.gas_price.is_none()
        {
            return Err(TransitionError::recoverable(ConsensusError::GasPriceNotSet));
        }

        // Oversized init code on creation transactions is a consensus
        // rejection; the CREATE opcodes handle their own limit.
        if self.fork.eip3860
            && msg.is_contract_creation()
            && msg.input.len() > MAX_INIT_CODE_SIZE
        {
            return Err(TransitionError::recoverable(
                ConsensusError::MaxInitCodeSizeExceeded,
            ));
        }

        self.nonce_check(msg)
            .map_err(TransitionError::recoverable)?;

        if !self.ctx.non_payable {
            self.check_dynamic_fees(msg)
                .map_err(TransitionError::recoverable)?;
            self.sub_gas_limit_price(msg)
                .map_err(TransitionError::recoverable)?;
        }

        Ok(())
    }

    fn check_state_tx(&self, msg: &Transaction) -> Result<(), TransitionError> {
        if !msg.gas_price.unwrap_or_default().is_zero() {
            return Err(TransitionError::recoverable(
                ConsensusError::StateTxNonZeroGasPrice,
            ));
        }
        if msg.gas != contracts::STATE_TRANSACTION_GAS_LIMIT {
            return Err(TransitionError::recoverable(
                ConsensusError::StateTxBadGasLimit {
                    expected: contracts::STATE_TRANSACTION_GAS_LIMIT,
                },
            ));
        }
        if msg.from != contracts::system_caller() {
            return Err(TransitionError::recoverable(
                ConsensusError::StateTxBadSender {
                    expected: contracts::system_caller(),
                    actual: msg.from,
                },
            ));
        }
        match msg.to {
            Some(to) if !to.is_zero() => Ok(()),
            _ => Err(TransitionError::recoverable(
                ConsensusError::StateTxMissingTo,
            )),
        }
    }

    fn apply_inner(&mut self, msg: &Transaction) -> Result<ExecutionResult, TransitionError> {
        if msg.tx_type == TxType::State {
            self.check_state_tx(msg)?;
        } else {
            self.check_tx(msg)?;
        }

        // The block must still have room for the purchased gas.
        self.sub_gas_pool(msg.gas)?;

        let intrinsic_gas = transaction_gas_cost(
            msg,
            self.fork.homestead,
            self.fork.istanbul,
            self.fork.eip3860,
            self.fork.eip2930,
        )
        .map_err(TransitionError::fatal)?;

        // Unsigned arithmetic: an underflow shows up as a huge value.
        let gas_left = msg.gas.wrapping_sub(intrinsic_gas);
        if gas_left > msg.gas {
            return Err(TransitionError::fatal(
                ConsensusError::NotEnoughIntrinsicGas,
            ));
        }

        let gas_price = msg.get_gas_price(self.ctx.base_fee);
        let value = msg.value;
        self.ctx.gas_price = Hash::from_u256(gas_price);
        self.ctx.origin = msg.from;

        // EIP-2929: seed the warm set for this transaction.
        if self.fork.eip2929 {
            let mut init = vec![msg.from];
            if msg.is_contract_creation() {
                init.push(create_address(msg.from, msg.nonce));
            } else if let Some(to) = msg.to {
                init.push(to);
            }
            if self.fork.eip3651 {
                init.push(self.ctx.coinbase);
            }
            let mut list = AccessList::new(&init);
            if self.fork.eip2930 {
                for entry in &msg.access_list.0 {
                    list.add_address(entry.address);
                    for key in &entry.storage_keys {
                        list.add_slot(entry.address, *key);
                    }
                }
            }
            self.access_list = Some(list);
        } else {
            self.access_list = None;
        }

        let mut result = if msg.is_contract_creation() {
            self.create2(msg.from, msg.input.clone(), value, gas_left)
        } else {
            self.state
                .incr_nonce(msg.from)
                .map_err(|_| TransitionError::fatal(ConsensusError::NonceUintOverflow))?;
            let to = msg.to.expect("creation handled above");
            self.call2(msg.from, to, msg.input.clone(), value, gas_left)
        };

        let refund = self.state.get_refund();
        result.update_gas_used(msg.gas, refund, self.fork.london);

        // Refund the sender for unused gas.
        let remaining = U256::from(result.gas_left) * gas_price;
        self.state.add_balance(msg.from, remaining);

        self.split_fees(result.gas_used, gas_price);

        self.add_gas_pool(result.gas_left);
        Ok(result)
    }

    /// Burn, donation, validator split over the transaction fee.
    fn split_fees(&mut self, gas_used: u64, gas_price: U256) {
        let total_fee_raw = U256::from(gas_used) * gas_price;

        // Fixed burn, clamped so fees never go negative.
        let mut burned = fixed_burn_wei();
        let mut total_fee = total_fee_raw;
        if total_fee <= burned {
            burned = total_fee;
            total_fee = U256::zero();
        } else {
            total_fee -= burned;
        }

        let config = registry::donation_config(&*self, self.ctx.engine_registry);

        let mut donation = total_fee * U256::from(config.donation_percent) / U256::from(100u64);
        if donation > total_fee {
            donation = total_fee;
        }
        let validator = total_fee - donation;

        if !donation.is_zero() {
            self.state.add_balance(config.donation_address, donation);
        }
        if !validator.is_zero() {
            self.state.add_balance(self.ctx.coinbase, validator);
        }
        if !burned.is_zero() {
            self.state.add_balance(config.burned_address, burned);
        }

        tracing::trace!(
            donation = %donation,
            validator = %validator,
            burned = %burned,
            "fee split",
        );

        self.donation_fee = donation;
        self.validator_fee = validator;
        self.burned_fee = burned;
    }

    // =========================================================================
    // FRAME EXECUTION
    // =========================================================================

    /// Top-level creation: the target address derives from the current
    /// nonce of `caller`.
    pub fn create2(
        &mut self,
        caller: Address,
        init_code: Vec<u8>,
        value: U256,
        gas: u64,
    ) -> ExecutionResult {
        let address = create_address(caller, self.state.get_nonce(caller));
        let contract =
            Contract::new_creation(1, caller, caller, address, value, gas, init_code);
        self.apply_create(contract)
    }

    /// Top-level call.
    pub fn call2(
        &mut self,
        caller: Address,
        to: Address,
        input: Vec<u8>,
        value: U256,
        gas: u64,
    ) -> ExecutionResult {
        let code = self.state.get_code(to);
        let contract = Contract::new_call(1, caller, caller, to, value, gas, code, input);
        self.apply_call(contract)
    }

    /// Routes a frame to the list runtime, a precompile, or the EVM.
    fn run(&mut self, contract: &Contract) -> ExecutionResult {
        if let Some(result) = self.handle_address_list_update(contract) {
            return result;
        }

        // Transaction lists: allow list takes precedence over block list.
        if let Some(list) = self.txn_allow_list {
            if contract.caller != contracts::system_caller()
                && !address_list::get_role(&*self, list, contract.caller).enabled()
            {
                tracing::debug!(
                    caller = %contract.caller,
                    address = %contract.address,
                    "caller is not in the transaction allowlist",
                );
                return ExecutionResult::failed(VmError::NotAuth, 0);
            }
        } else if let Some(list) = self.txn_block_list {
            if contract.caller != contracts::system_caller()
                && address_list::get_role(&*self, list, contract.caller) == address_list::Role::Enabled
            {
                tracing::debug!(
                    caller = %contract.caller,
                    address = %contract.address,
                    "caller is in the transaction blocklist",
                );
                return ExecutionResult::failed(VmError::NotAuth, 0);
            }
        }

        let fork = self.fork;
        let precompiles = self.precompiles;
        if precompiles.can_run(contract, &fork) {
            return precompiles.run(contract, self, &fork);
        }

        let evm = self.evm;
        if evm.can_run(contract, &fork) {
            return evm.run(contract, self, &fork);
        }

        ExecutionResult::failed(VmError::RuntimeNotFound, 0)
    }

    fn handle_address_list_update(&mut self, contract: &Contract) -> Option<ExecutionResult> {
        for list in [
            self.deployment_allow_list,
            self.deployment_block_list,
            self.txn_allow_list,
            self.txn_block_list,
        ]
        .into_iter()
        .flatten()
        {
            if contract.code_address == list {
                return Some(address_list::run(list, contract, self));
            }
        }
        None
    }

    /// CALL-family frame with snapshot scope and access-list capture.
    fn apply_call(&mut self, contract: Contract) -> ExecutionResult {
        if contract.depth > MAX_CALL_DEPTH + 1 {
            return ExecutionResult::failed(VmError::Depth, contract.gas);
        }

        let snapshot = self.state.snapshot();
        let access_list_snap = self.access_list.as_ref().map(AccessList::copy);
        self.state.touch_account(contract.address);

        if contract.call_type == CallType::Call {
            if let Err(err) = self.transfer(contract.caller, contract.address, contract.value) {
                self.revert_frame(snapshot, access_list_snap);
                return ExecutionResult::failed(err, contract.gas);
            }
        }

        let result = self.run(&contract);
        if result.is_failed() {
            self.revert_frame(snapshot, access_list_snap);
        }
        result
    }

    fn revert_frame(&mut self, snapshot: usize, access_list_snap: Option<AccessList>) {
        self.state
            .revert_to_snapshot(snapshot)
            .expect("frame snapshots are LIFO");
        if let (Some(list), Some(snap)) = (self.access_list.as_mut(), access_list_snap) {
            list.revert_to(snap);
        }
    }

    fn has_code_or_nonce(&self, addr: Address) -> bool {
        if self.state.get_nonce(addr) != 0 {
            return true;
        }
        let code_hash = self.state.get_code_hash(addr);
        code_hash != xgr_types::empty_code_hash() && !code_hash.is_zero()
    }

    /// CREATE-family frame: nonce bump, collision check, init-code run,
    /// code-deposit fee, EIP-158 size limit.
    fn apply_create(&mut self, contract: Contract) -> ExecutionResult {
        let gas_limit = contract.gas;

        if contract.depth > MAX_CALL_DEPTH + 1 {
            return ExecutionResult::failed(VmError::Depth, gas_limit);
        }

        if let Err(err) = self.state.incr_nonce(contract.caller) {
            return ExecutionResult::failed(err, 0);
        }

        if self.has_code_or_nonce(contract.address) {
            return ExecutionResult::failed(VmError::ContractAddressCollision, 0);
        }

        let snapshot = self.state.snapshot();
        let access_list_snap = self.access_list.as_ref().map(AccessList::copy);

        // Oversized init code for CREATE/CREATE2 opcodes is an
        // exceptional abort; creation transactions were rejected by the
        // consensus checks already.
        if self.fork.eip3860 && contract.depth > 1 && contract.code.len() > MAX_INIT_CODE_SIZE {
            self.revert_frame(snapshot, access_list_snap);
            return ExecutionResult::failed(VmError::OutOfGas, 0);
        }

        if self.fork.eip158 {
            self.state.create_account(contract.address);
            if let Err(err) = self.state.incr_nonce(contract.address) {
                self.revert_frame(snapshot, access_list_snap);
                return ExecutionResult::failed(err, 0);
            }
        }

        if let Err(err) = self.transfer(contract.caller, contract.address, contract.value) {
            self.revert_frame(snapshot, access_list_snap);
            return ExecutionResult::failed(err, gas_limit);
        }

        // Deployment lists gate who may create contracts at all.
        if let Some(list) = self.deployment_allow_list {
            if contract.caller != contracts::system_caller()
                && !address_list::get_role(&*self, list, contract.caller).enabled()
            {
                tracing::debug!(
                    caller = %contract.caller,
                    address = %contract.address,
                    "caller is not in the deployment allowlist",
                );
                self.revert_frame(snapshot, access_list_snap);
                return ExecutionResult::failed(VmError::NotAuth, 0);
            }
        } else if let Some(list) = self.deployment_block_list {
            if contract.caller != contracts::system_caller()
                && address_list::get_role(&*self, list, contract.caller) == address_list::Role::Enabled
            {
                tracing::debug!(
                    caller = %contract.caller,
                    address = %contract.address,
                    "caller is in the deployment blocklist",
                );
                self.revert_frame(snapshot, access_list_snap);
                return ExecutionResult::failed(VmError::NotAuth, 0);
            }
        }

        let mut result = self.run(&contract);
        if result.is_failed() {
            self.revert_frame(snapshot, access_list_snap);
            return result;
        }

        if self.fork.eip158 && result.return_value.len() > MAX_CODE_SIZE {
            self.revert_frame(snapshot, access_list_snap);
            return ExecutionResult::failed(VmError::MaxCodeSizeExceeded, 0);
        }

        let deposit_cost = result.return_value.len() as u64 * 200;
        if result.gas_left < deposit_cost {
            result.err = Some(VmError::CodeStoreOutOfGas);
            result.return_value = Vec::new();

            if self.fork.homestead {
                self.revert_frame(snapshot, access_list_snap);
                result.gas_left = 0;
            }
            return result;
        }

        result.gas_left -= deposit_cost;
        result.address = Some(contract.address);
        self.state.set_code(contract.address, result.return_value.clone());

        result
    }

    /// Folds the journal into the snapshot and publishes the new root.
    pub fn commit(&mut self) -> Result<(Arc<dyn Snapshot>, Hash), StateError> {
        let objects = self.state.commit(self.fork.eip155);
        self.snapshot.commit(&objects)
    }
}

// =============================================================================
// HOST IMPLEMENTATION
// =============================================================================

impl Host for Transition {
    fn account_exists(&self, addr: Address) -> bool {
        self.state.exist(addr)
    }

    fn empty(&self, addr: Address) -> bool {
        self.state.empty(addr)
    }

    fn get_balance(&self, addr: Address) -> U256 {
        self.state.get_balance(addr)
    }

    fn get_nonce(&self, addr: Address) -> u64 {
        self.state.get_nonce(addr)
    }

    fn get_code(&self, addr: Address) -> Vec<u8> {
        self.state.get_code(addr)
    }

    fn get_code_size(&self, addr: Address) -> usize {
        self.state.get_code_size(addr)
    }

    fn get_code_hash(&self, addr: Address) -> Hash {
        self.state.get_code_hash(addr)
    }

    fn get_storage(&self, addr: Address, key: Hash) -> Hash {
        self.state.get_state(addr, key)
    }

    fn set_storage(
        &mut self,
        addr: Address,
        key: Hash,
        value: Hash,
        fork: &ForkConfig,
    ) -> StorageStatus {
        self.state.set_storage(addr, key, value, fork)
    }

    fn set_state(&mut self, addr: Address, key: Hash, value: Hash) {
        self.state.set_state(addr, key, value);
    }

    fn get_transient(&self, addr: Address, key: Hash) -> Hash {
        self.state.get_transient(addr, key)
    }

    fn set_transient(&mut self, addr: Address, key: Hash, value: Hash) {
        self.state.set_transient(addr, key, value);
    }

    fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<(), VmError> {
        if amount.is_zero() {
            self.state.add_balance(to, U256::zero());
            return Ok(());
        }
        self.state.sub_balance(from, amount).map_err(|err| {
            if err == VmError::NotEnoughFunds {
                VmError::InsufficientBalance
            } else {
                err
            }
        })?;
        self.state.add_balance(to, amount);
        Ok(())
    }

    fn emit_log(&mut self, addr: Address, topics: Vec<Hash>, data: Vec<u8>) {
        self.state.emit_log(addr, topics, data);
    }

    fn selfdestruct(&mut self, addr: Address, beneficiary: Address) {
        if !self.state.has_suicided(addr) {
            self.state.add_refund(24_000);
        }
        let balance = self.state.get_balance(addr);
        self.state.add_balance(beneficiary, balance);
        self.state.suicide(addr);
    }

    fn callx(&mut self, contract: Contract) -> ExecutionResult {
        match contract.call_type {
            CallType::Create | CallType::Create2 => self.apply_create(contract),
            _ => self.apply_call(contract),
        }
    }

    fn get_tx_context(&self) -> TxContext {
        self.ctx.clone()
    }

    fn get_block_hash(&self, number: u64) -> Hash {
        (self.get_hash)(number)
    }

    fn warm_address(&mut self, addr: Address) -> bool {
        match self.access_list.as_mut() {
            Some(list) => list.add_address(addr),
            None => false,
        }
    }

    fn warm_slot(&mut self, addr: Address, key: Hash) -> (bool, bool) {
        match self.access_list.as_mut() {
            Some(list) => list.add_slot(addr, key),
            None => (false, false),
        }
    }
}

// =============================================================================
// INTRINSIC GAS
// =============================================================================

/// Intrinsic gas of a transaction: base (or creation base after
/// Homestead), payload bytes, EIP-3860 init-code words, and the
/// EIP-2930 access-list surcharge. Overflow is a consensus error.
pub fn transaction_gas_cost(
    msg: &Transaction,
    is_homestead: bool,
    is_istanbul: bool,
    is_eip3860: bool,
    is_eip2930: bool,
) -> Result<u64, ConsensusError> {
    let mut cost: u64 = if msg.is_contract_creation() && is_homestead {
        TX_GAS_CONTRACT_CREATION
    } else {
        TX_GAS
    };

    let payload = &msg.input;
    if !payload.is_empty() {
        let zeros = payload.iter().filter(|byte| **byte == 0).count() as u64;
        let non_zeros = payload.len() as u64 - zeros;
        let non_zero_cost: u64 = if is_istanbul { 16 } else { 68 };

        cost = non_zeros
            .checked_mul(non_zero_cost)
            .and_then(|c| cost.checked_add(c))
            .ok_or(ConsensusError::IntrinsicGasOverflow)?;
        cost = zeros
            .checked_mul(4)
            .and_then(|c| cost.checked_add(c))
            .ok_or(ConsensusError::IntrinsicGasOverflow)?;
    }

    if msg.is_contract_creation() && is_eip3860 {
        let words = (payload.len() as u64).div_ceil(32);
        cost = words
            .checked_mul(2)
            .and_then(|c| cost.checked_add(c))
            .ok_or(ConsensusError::IntrinsicGasOverflow)?;
    }

    if is_eip2930 && matches!(msg.tx_type, TxType::AccessList | TxType::DynamicFee) {
        let addresses = msg.access_list.address_count();
        let slots = msg.access_list.storage_key_count();
        cost = addresses
            .checked_mul(TX_ACCESS_LIST_ADDRESS_GAS)
            .and_then(|c| cost.checked_add(c))
            .and_then(|c| slots.checked_mul(TX_ACCESS_LIST_STORAGE_KEY_GAS).map(|s| (c, s)))
            .and_then(|(c, s)| c.checked_add(s))
            .ok_or(ConsensusError::IntrinsicGasOverflow)?;
    }

    Ok(cost)
}

// =============================================================================
// TESTS
// =============================================================================
