//! # Interpreter
//!
//! The bytecode execution loop. Static gas and stack requirements come
//! from the dispatch table; dynamic costs (memory expansion, warm/cold
//! surcharges, copy sizes, storage statuses) are charged in the
//! handlers. Nested frames go back through [`Host::callx`], which owns
//! snapshotting and scope revert.

use super::dispatch::DISPATCH;
use super::gas::{self, costs};
use super::memory::Memory;
use super::opcodes::{analyze_jump_dests, Opcode};
use super::stack::Stack;
use crate::chain::ForkConfig;
use crate::errors::VmError;
use crate::host::{CallType, Contract, ExecutionResult, Host, StorageStatus, TxContext};
use std::collections::HashSet;
use xgr_types::crypto::{create2_address, create_address};
use xgr_types::{keccak256, Address, Hash, U256, U512};

/// Call-depth ceiling.
pub const MAX_CALL_DEPTH: usize = 1024;
/// EIP-158 deployed-code ceiling.
pub const MAX_CODE_SIZE: usize = 24_576;
/// EIP-3860 init-code ceiling.
pub const MAX_INIT_CODE_SIZE: usize = 2 * MAX_CODE_SIZE;
/// EIP-4750 return-stack ceiling.
const MAX_RETURN_STACK: usize = 1024;

/// Interpreter state for one frame.
pub struct Interpreter<'a> {
    host: &'a mut dyn Host,
    fork: &'a ForkConfig,
    ctx: TxContext,

    // frame identity
    call_type: CallType,
    address: Address,
    caller: Address,
    origin: Address,
    value: U256,
    code: Vec<u8>,
    input: Vec<u8>,
    depth: usize,
    is_static: bool,

    // machine state
    pc: usize,
    stack: Stack,
    memory: Memory,
    return_data: Vec<u8>,
    return_stack: Vec<usize>,
    gas_left: u64,
    gas_limit: u64,
    jump_dests: HashSet<usize>,

    // terminal state
    stopped: bool,
    ret: Vec<u8>,
    err: Option<VmError>,
}

impl<'a> Interpreter<'a> {
    /// Builds an interpreter for `contract`.
    pub fn new(contract: &Contract, host: &'a mut dyn Host, fork: &'a ForkConfig) -> Self {
        let ctx = host.get_tx_context();
        Self {
            host,
            fork,
            ctx,
            call_type: contract.call_type,
            address: contract.address,
            caller: contract.caller,
            origin: contract.origin,
            value: contract.value,
            jump_dests: analyze_jump_dests(&contract.code),
            code: contract.code.clone(),
            input: contract.input.clone(),
            depth: contract.depth,
            is_static: contract.is_static,
            pc: 0,
            stack: Stack::new(),
            memory: Memory::new(),
            return_data: Vec::new(),
            return_stack: Vec::new(),
            gas_left: contract.gas,
            gas_limit: contract.gas,
            stopped: false,
            ret: Vec::new(),
            err: None,
        }
    }

    /// Runs the frame to completion.
    pub fn execute(mut self) -> ExecutionResult {
        while !self.stopped {
            if self.pc >= self.code.len() {
                break; // implicit STOP
            }

            let byte = self.code[self.pc];
            let info = &DISPATCH[byte as usize];
            if !info.defined {
                self.fail(VmError::InvalidOpcode(byte));
                break;
            }
            if self.stack.len() < info.min_stack as usize {
                self.fail(VmError::StackUnderflow);
                break;
            }
            if !self.consume(info.base_gas) {
                break;
            }

            if let Err(err) = self.step(byte) {
                self.fail(err);
                break;
            }
        }

        self.into_result()
    }

    fn into_result(self) -> ExecutionResult {
        match self.err {
            None => ExecutionResult {
                return_value: self.ret,
                gas_left: self.gas_left,
                gas_used: self.gas_limit - self.gas_left,
                err: None,
                address: None,
            },
            Some(VmError::Reverted) => ExecutionResult {
                return_value: self.ret,
                gas_left: self.gas_left,
                gas_used: self.gas_limit - self.gas_left,
                err: Some(VmError::Reverted),
                address: None,
            },
            Some(err) => ExecutionResult {
                return_value: Vec::new(),
                gas_left: 0,
                gas_used: self.gas_limit,
                err: Some(err),
                address: None,
            },
        }
    }

    fn fail(&mut self, err: VmError) {
        self.err = Some(err);
        self.stopped = true;
    }

    /// Consumes gas; records OutOfGas and halts when short.
    fn consume(&mut self, amount: u64) -> bool {
        if amount > self.gas_left {
            self.gas_left = 0;
            self.fail(VmError::OutOfGas);
            false
        } else {
            self.gas_left -= amount;
            true
        }
    }

    fn charge(&mut self, amount: u64) -> Result<(), VmError> {
        if amount > self.gas_left {
            self.gas_left = 0;
            return Err(VmError::OutOfGas);
        }
        self.gas_left -= amount;
        Ok(())
    }

    /// Converts a 256-bit offset/size pair, charges memory expansion,
    /// and grows memory. Oversized regions surface as OutOfGas.
    fn memory_region(&mut self, offset: U256, size: U256) -> Result<(usize, usize), VmError> {
        if size.is_zero() {
            return Ok((0, 0));
        }
        if offset.bits() > 40 || size.bits() > 40 {
            return Err(VmError::OutOfGas);
        }
        let offset = offset.low_u64();
        let size = size.low_u64();

        let cost = self.memory.expand_cost(offset, size)?;
        self.charge(cost)?;
        self.memory.grow(offset, size);
        Ok((offset as usize, size as usize))
    }

    fn write_protection(&self) -> Result<(), VmError> {
        if self.is_static {
            return Err(VmError::StaticCallWrite);
        }
        Ok(())
    }

    fn require_fork(&self, active: bool, byte: u8) -> Result<(), VmError> {
        if active {
            Ok(())
        } else {
            Err(VmError::InvalidOpcode(byte))
        }
    }

    /// Charges the account-access cost of `addr` and warms it.
    fn account_access_cost(&mut self, addr: Address, tangerine: u64, istanbul: u64) -> Result<(), VmError> {
        let cost = if self.fork.eip2929 {
            if self.host.warm_address(addr) {
                costs::COLD_ACCOUNT_ACCESS
            } else {
                costs::WARM_ACCESS
            }
        } else if self.fork.istanbul {
            istanbul
        } else {
            tangerine
        };
        self.charge(cost)
    }

    // =========================================================================
    // STEP
    // =========================================================================

    #[allow(clippy::too_many_lines)]
    fn step(&mut self, byte: u8) -> Result<(), VmError> {
        self.pc += 1;

        // Ranged families first.
        if Opcode::is_push(byte) {
            let n = Opcode::push_bytes(byte);
            let mut word = [0u8; 32];
            let end = (self.pc + n).min(self.code.len());
            let available = end - self.pc;
            word[32 - n..32 - n + available].copy_from_slice(&self.code[self.pc..end]);
            self.stack.push(U256::from_big_endian(&word))?;
            self.pc += n;
            return Ok(());
        }
        if Opcode::is_dup(byte) {
            return self.stack.dup((byte - 0x7f) as usize);
        }
        if Opcode::is_swap(byte) {
            return self.stack.swap((byte - 0x8f) as usize);
        }
        if Opcode::is_log(byte) {
            return self.op_log((byte - 0xa0) as usize);
        }

        let op = Opcode::from_byte(byte).ok_or(VmError::InvalidOpcode(byte))?;
        match op {
            // =================================================================
            // STOP & ARITHMETIC
            // =================================================================
            Opcode::Stop => {
                self.stopped = true;
            }
            Opcode::Add => self.binary(|a, b| a.overflowing_add(b).0)?,
            Opcode::Mul => self.binary(|a, b| a.overflowing_mul(b).0)?,
            Opcode::Sub => self.binary(|a, b| a.overflowing_sub(b).0)?,
            Opcode::Div => self.binary(|a, b| if b.is_zero() { U256::zero() } else { a / b })?,
            Opcode::SDiv => self.binary(signed_div)?,
            Opcode::Mod => self.binary(|a, b| if b.is_zero() { U256::zero() } else { a % b })?,
            Opcode::SMod => self.binary(signed_mod)?,
            Opcode::AddMod => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                let n = self.stack.pop()?;
                let result = if n.is_zero() {
                    U256::zero()
                } else {
                    u512_to_u256((u256_to_u512(a) + u256_to_u512(b)) % u256_to_u512(n))
                };
                self.stack.push(result)?;
            }
            Opcode::MulMod => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                let n = self.stack.pop()?;
                let result = if n.is_zero() {
                    U256::zero()
                } else {
                    u512_to_u256((u256_to_u512(a) * u256_to_u512(b)) % u256_to_u512(n))
                };
                self.stack.push(result)?;
            }
            Opcode::Exp => {
                let base = self.stack.pop()?;
                let exponent = self.stack.pop()?;
                self.charge(gas::exp_cost(exponent))?;
                self.stack.push(exp_by_squaring(base, exponent))?;
            }
            Opcode::SignExtend => {
                let k = self.stack.pop()?;
                let x = self.stack.pop()?;
                let result = if k < U256::from(31) {
                    let bit_index = 8 * k.as_usize() + 7;
                    let mask = (U256::one() << (bit_index + 1)) - 1;
                    if x.bit(bit_index) {
                        x | !mask
                    } else {
                        x & mask
                    }
                } else {
                    x
                };
                self.stack.push(result)?;
            }

            // =================================================================
            // COMPARISON & BITWISE
            // =================================================================
            Opcode::Lt => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push_bool(a < b)?;
            }
            Opcode::Gt => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push_bool(a > b)?;
            }
            Opcode::SLt => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push_bool(signed_lt(a, b))?;
            }
            Opcode::SGt => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push_bool(signed_lt(b, a))?;
            }
            Opcode::Eq => {
                let a = self.stack.pop()?;
                let b = self.stack.pop()?;
                self.stack.push_bool(a == b)?;
            }
            Opcode::IsZero => {
                let a = self.stack.pop()?;
                self.stack.push_bool(a.is_zero())?;
            }
            Opcode::And => self.binary(|a, b| a & b)?,
            Opcode::Or => self.binary(|a, b| a | b)?,
            Opcode::Xor => self.binary(|a, b| a ^ b)?,
            Opcode::Not => {
                let a = self.stack.pop()?;
                self.stack.push(!a)?;
            }
            Opcode::Byte => {
                let i = self.stack.pop()?;
                let x = self.stack.pop()?;
                let result = if i < U256::from(32) {
                    U256::from(Hash::from_u256(x).as_bytes()[i.as_usize()])
                } else {
                    U256::zero()
                };
                self.stack.push(result)?;
            }
            Opcode::Shl => {
                self.require_fork(self.fork.constantinople, byte)?;
                let shift = self.stack.pop()?;
                let value = self.stack.pop()?;
                let result = if shift >= U256::from(256) {
                    U256::zero()
                } else {
                    value << shift.as_usize()
                };
                self.stack.push(result)?;
            }
            Opcode::Shr => {
                self.require_fork(self.fork.constantinople, byte)?;
                let shift = self.stack.pop()?;
                let value = self.stack.pop()?;
                let result = if shift >= U256::from(256) {
                    U256::zero()
                } else {
                    value >> shift.as_usize()
                };
                self.stack.push(result)?;
            }
            Opcode::Sar => {
                self.require_fork(self.fork.constantinople, byte)?;
                let shift = self.stack.pop()?;
                let value = self.stack.pop()?;
                self.stack.push(sar(value, shift))?;
            }

            // =================================================================
            // KECCAK256
            // =================================================================
            Opcode::Keccak256 => {
                let offset = self.stack.pop()?;
                let size = self.stack.pop()?;
                let (offset, size) = self.memory_region(offset, size)?;
                self.charge(gas::keccak_cost(size as u64))?;
                let digest = keccak256(&self.memory.read(offset, size));
                self.stack.push(digest.to_u256())?;
            }

            // =================================================================
            // ENVIRONMENT
            // =================================================================
            Opcode::Address => self.stack.push(self.address.to_word().to_u256())?,
            Opcode::Balance => {
                let addr = self.stack.pop_address()?;
                self.account_access_cost(
                    addr,
                    costs::ACCOUNT_ACCESS_TANGERINE,
                    costs::ACCOUNT_ACCESS_ISTANBUL,
                )?;
                let balance = self.host.get_balance(addr);
                self.stack.push(balance)?;
            }
            Opcode::Origin => self.stack.push(self.origin.to_word().to_u256())?,
            Opcode::Caller => self.stack.push(self.caller.to_word().to_u256())?,
            Opcode::CallValue => self.stack.push(self.value)?,
            Opcode::CallDataLoad => {
                let offset = self.stack.pop()?;
                let mut word = [0u8; 32];
                if offset.bits() <= 40 {
                    let offset = offset.low_u64() as usize;
                    for (i, byte) in word.iter_mut().enumerate() {
                        *byte = self
                            .input
                            .get(offset.wrapping_add(i))
                            .copied()
                            .unwrap_or(0);
                    }
                }
                self.stack.push(U256::from_big_endian(&word))?;
            }
            Opcode::CallDataSize => self.stack.push(U256::from(self.input.len()))?,
            Opcode::CallDataCopy => {
                let dst = self.stack.pop()?;
                let src = self.stack.pop()?;
                let size = self.stack.pop()?;
                let (dst, size) = self.memory_region(dst, size)?;
                self.charge(gas::copy_cost(size as u64))?;
                let src = saturating_usize(src);
                let input = std::mem::take(&mut self.input);
                self.memory.write_padded(dst, &input, src, size);
                self.input = input;
            }
            Opcode::CodeSize => self.stack.push(U256::from(self.code.len()))?,
            Opcode::CodeCopy => {
                let dst = self.stack.pop()?;
                let src = self.stack.pop()?;
                let size = self.stack.pop()?;
                let (dst, size) = self.memory_region(dst, size)?;
                self.charge(gas::copy_cost(size as u64))?;
                let src = saturating_usize(src);
                let code = std::mem::take(&mut self.code);
                self.memory.write_padded(dst, &code, src, size);
                self.code = code;
            }
            Opcode::GasPrice => self.stack.push(self.ctx.gas_price.to_u256())?,
            Opcode::ExtCodeSize => {
                let addr = self.stack.pop_address()?;
                self.account_access_cost(
                    addr,
                    costs::EXT_CODE_TANGERINE,
                    costs::EXT_CODE_TANGERINE,
                )?;
                let size = self.host.get_code_size(addr);
                self.stack.push(U256::from(size))?;
            }
            Opcode::ExtCodeCopy => {
                let addr = self.stack.pop_address()?;
                let dst = self.stack.pop()?;
                let src = self.stack.pop()?;
                let size = self.stack.pop()?;
                self.account_access_cost(
                    addr,
                    costs::EXT_CODE_TANGERINE,
                    costs::EXT_CODE_TANGERINE,
                )?;
                let (dst, size) = self.memory_region(dst, size)?;
                self.charge(gas::copy_cost(size as u64))?;
                let code = self.host.get_code(addr);
                self.memory
                    .write_padded(dst, &code, saturating_usize(src), size);
            }
            Opcode::ReturnDataSize => {
                self.require_fork(self.fork.byzantium, byte)?;
                self.stack.push(U256::from(self.return_data.len()))?;
            }
            Opcode::ReturnDataCopy => {
                self.require_fork(self.fork.byzantium, byte)?;
                let dst = self.stack.pop()?;
                let src = self.stack.pop()?;
                let size = self.stack.pop()?;

                // Reads past the buffer are a hard failure, unlike calldata.
                let end = src
                    .checked_add(size)
                    .ok_or(VmError::ReturnDataOutOfBounds)?;
                if end > U256::from(self.return_data.len()) {
                    return Err(VmError::ReturnDataOutOfBounds);
                }

                let (dst, size) = self.memory_region(dst, size)?;
                self.charge(gas::copy_cost(size as u64))?;
                let src = src.low_u64() as usize;
                let data = std::mem::take(&mut self.return_data);
                self.memory.write_padded(dst, &data, src, size);
                self.return_data = data;
            }
            Opcode::ExtCodeHash => {
                self.require_fork(self.fork.constantinople, byte)?;
                let addr = self.stack.pop_address()?;
                self.account_access_cost(
                    addr,
                    costs::ACCOUNT_ACCESS_TANGERINE,
                    costs::ACCOUNT_ACCESS_ISTANBUL,
                )?;
                let result = if self.host.empty(addr) {
                    U256::zero()
                } else {
                    self.host.get_code_hash(addr).to_u256()
                };
                self.stack.push(result)?;
            }

            // =================================================================
            // BLOCK
            // =================================================================
            Opcode::BlockHash => {
                let number = self.stack.pop()?;
                let current = U256::from(self.ctx.number);
                let oldest = U256::from(self.ctx.number.saturating_sub(256));
                let result = if number >= current || number < oldest {
                    U256::zero()
                } else {
                    self.host.get_block_hash(number.low_u64()).to_u256()
                };
                self.stack.push(result)?;
            }
            Opcode::Coinbase => self.stack.push(self.ctx.coinbase.to_word().to_u256())?,
            Opcode::Timestamp => self.stack.push(U256::from(self.ctx.timestamp))?,
            Opcode::Number => self.stack.push(U256::from(self.ctx.number))?,
            Opcode::Difficulty => self.stack.push(self.ctx.difficulty.to_u256())?,
            Opcode::GasLimit => self.stack.push(U256::from(self.ctx.gas_limit))?,
            Opcode::ChainId => {
                self.require_fork(self.fork.istanbul, byte)?;
                self.stack.push(U256::from(self.ctx.chain_id))?;
            }
            Opcode::SelfBalance => {
                self.require_fork(self.fork.istanbul, byte)?;
                let balance = self.host.get_balance(self.address);
                self.stack.push(balance)?;
            }
            Opcode::BaseFee => {
                self.require_fork(self.fork.london, byte)?;
                self.stack.push(U256::from(self.ctx.base_fee))?;
            }

            // =================================================================
            // STACK, MEMORY, STORAGE, FLOW
            // =================================================================
            Opcode::Pop => {
                self.stack.pop()?;
            }
            Opcode::MLoad => {
                let offset = self.stack.pop()?;
                let (offset, _) = self.memory_region(offset, U256::from(32))?;
                let word = self.memory.read_word(offset);
                self.stack.push(U256::from_big_endian(&word))?;
            }
            Opcode::MStore => {
                let offset = self.stack.pop()?;
                let value = self.stack.pop()?;
                let (offset, _) = self.memory_region(offset, U256::from(32))?;
                self.memory.write(offset, Hash::from_u256(value).as_bytes());
            }
            Opcode::MStore8 => {
                let offset = self.stack.pop()?;
                let value = self.stack.pop()?;
                let (offset, _) = self.memory_region(offset, U256::one())?;
                self.memory.write_byte(offset, value.byte(0));
            }
            Opcode::SLoad => {
                let key = self.stack.pop_hash()?;
                let cost = if self.fork.eip2929 {
                    let (_, slot_cold) = self.host.warm_slot(self.address, key);
                    if slot_cold {
                        costs::COLD_SLOAD
                    } else {
                        costs::WARM_ACCESS
                    }
                } else if self.fork.istanbul {
                    costs::SLOAD_ISTANBUL
                } else {
                    costs::SLOAD_TANGERINE
                };
                self.charge(cost)?;
                let value = self.host.get_storage(self.address, key);
                self.stack.push(value.to_u256())?;
            }
            Opcode::SStore => self.op_sstore()?,
            Opcode::Jump => {
                let dest = self.stack.pop()?;
                self.jump_to(dest)?;
            }
            Opcode::JumpI => {
                let dest = self.stack.pop()?;
                let condition = self.stack.pop()?;
                if !condition.is_zero() {
                    self.jump_to(dest)?;
                }
            }
            Opcode::Pc => self.stack.push(U256::from(self.pc - 1))?,
            Opcode::MSize => self.stack.push(U256::from(self.memory.len()))?,
            Opcode::Gas => self.stack.push(U256::from(self.gas_left))?,
            Opcode::JumpDest => {}

            // =================================================================
            // TRANSIENT STORAGE (EIP-1153) & MCOPY
            // =================================================================
            Opcode::TLoad => {
                self.require_fork(self.fork.eip1153, byte)?;
                let key = self.stack.pop_hash()?;
                let value = self.host.get_transient(self.address, key);
                self.stack.push(value.to_u256())?;
            }
            Opcode::TStore => {
                self.require_fork(self.fork.eip1153, byte)?;
                self.write_protection()?;
                let key = self.stack.pop_hash()?;
                let value = self.stack.pop_hash()?;
                self.host.set_transient(self.address, key, value);
            }
            Opcode::MCopy => {
                self.require_fork(self.fork.eip1153, byte)?;
                let dst = self.stack.pop()?;
                let src = self.stack.pop()?;
                let size = self.stack.pop()?;
                let (dst, size) = self.memory_region(dst, size)?;
                let (src, _) = self.memory_region(src, U256::from(size))?;
                self.charge(gas::copy_cost(size as u64))?;
                self.memory.copy_within(dst, src, size);
            }
            Opcode::Push0 => {
                self.require_fork(self.fork.shanghai, byte)?;
                self.stack.push(U256::zero())?;
            }

            // =================================================================
            // RELATIVE JUMPS & FUNCTIONS (EIP-4200, EIP-4750)
            // =================================================================
            Opcode::RJump => {
                self.require_fork(self.fork.eip4200, byte)?;
                let offset = self.read_i16_immediate()?;
                self.relative_jump(offset)?;
            }
            Opcode::RJumpI => {
                self.require_fork(self.fork.eip4200, byte)?;
                let offset = self.read_i16_immediate()?;
                let condition = self.stack.pop()?;
                if !condition.is_zero() {
                    self.relative_jump(offset)?;
                }
            }
            Opcode::RJumpV => {
                self.require_fork(self.fork.eip4200, byte)?;
                let count = *self.code.get(self.pc).ok_or(VmError::InvalidJump)? as usize;
                let table_end = self.pc + 1 + 2 * count;
                if count == 0 || table_end > self.code.len() {
                    return Err(VmError::InvalidJump);
                }
                let case = self.stack.pop()?;
                let base = self.pc;
                self.pc = table_end;
                if case < U256::from(count) {
                    let entry = base + 1 + 2 * case.as_usize();
                    let offset =
                        i16::from_be_bytes([self.code[entry], self.code[entry + 1]]);
                    self.relative_jump(offset)?;
                }
            }
            Opcode::CallF => {
                self.require_fork(self.fork.eip4750, byte)?;
                let target = self.read_u16_immediate()?;
                if self.return_stack.len() >= MAX_RETURN_STACK {
                    return Err(VmError::InvalidJump);
                }
                self.return_stack.push(self.pc);
                self.absolute_jump(target as usize)?;
            }
            Opcode::RetF => {
                self.require_fork(self.fork.eip4750, byte)?;
                let target = self.return_stack.pop().ok_or(VmError::InvalidJump)?;
                self.pc = target;
            }
            Opcode::JumpF => {
                self.require_fork(self.fork.eip4750, byte)?;
                let target = self.read_u16_immediate()?;
                self.absolute_jump(target as usize)?;
            }

            // =================================================================
            // CREATE & CALL FAMILY
            // =================================================================
            Opcode::Create => self.op_create(false)?,
            Opcode::Create2 => {
                self.require_fork(self.fork.constantinople, byte)?;
                self.op_create(true)?;
            }
            Opcode::Call => self.op_call(CallType::Call)?,
            Opcode::CallCode => self.op_call(CallType::CallCode)?,
            Opcode::DelegateCall => {
                self.require_fork(self.fork.homestead, byte)?;
                self.op_call(CallType::DelegateCall)?;
            }
            Opcode::StaticCall => {
                self.require_fork(self.fork.byzantium, byte)?;
                self.op_call(CallType::StaticCall)?;
            }

            // =================================================================
            // HALTS
            // =================================================================
            Opcode::Return => {
                let offset = self.stack.pop()?;
                let size = self.stack.pop()?;
                let (offset, size) = self.memory_region(offset, size)?;
                self.ret = self.memory.read(offset, size);
                self.stopped = true;
            }
            Opcode::Revert => {
                self.require_fork(self.fork.byzantium, byte)?;
                let offset = self.stack.pop()?;
                let size = self.stack.pop()?;
                let (offset, size) = self.memory_region(offset, size)?;
                self.ret = self.memory.read(offset, size);
                return Err(VmError::Reverted);
            }
            Opcode::Invalid => return Err(VmError::InvalidOpcode(0xfe)),
            Opcode::SelfDestruct => self.op_selfdestruct()?,
        }

        Ok(())
    }

    fn binary(&mut self, f: impl Fn(U256, U256) -> U256) -> Result<(), VmError> {
        let a = self.stack.pop()?;
        let b = self.stack.pop()?;
        self.stack.push(f(a, b))
    }

    fn jump_to(&mut self, dest: U256) -> Result<(), VmError> {
        if dest.bits() > 40 {
            return Err(VmError::InvalidJump);
        }
        let dest = dest.low_u64() as usize;
        if !self.jump_dests.contains(&dest) {
            return Err(VmError::InvalidJump);
        }
        self.pc = dest;
        Ok(())
    }

    fn read_i16_immediate(&mut self) -> Result<i16, VmError> {
        let bytes = self
            .code
            .get(self.pc..self.pc + 2)
            .ok_or(VmError::InvalidJump)?;
        let value = i16::from_be_bytes([bytes[0], bytes[1]]);
        self.pc += 2;
        Ok(value)
    }

    fn read_u16_immediate(&mut self) -> Result<u16, VmError> {
        let bytes = self
            .code
            .get(self.pc..self.pc + 2)
            .ok_or(VmError::InvalidJump)?;
        let value = u16::from_be_bytes([bytes[0], bytes[1]]);
        self.pc += 2;
        Ok(value)
    }

    fn relative_jump(&mut self, offset: i16) -> Result<(), VmError> {
        let target = (self.pc as i64) + i64::from(offset);
        if target < 0 || target as usize > self.code.len() {
            return Err(VmError::InvalidJump);
        }
        self.pc = target as usize;
        Ok(())
    }

    fn absolute_jump(&mut self, target: usize) -> Result<(), VmError> {
        if target > self.code.len() {
            return Err(VmError::InvalidJump);
        }
        self.pc = target;
        Ok(())
    }

    // =========================================================================
    // LOG
    // =========================================================================

    fn op_log(&mut self, topic_count: usize) -> Result<(), VmError> {
        self.write_protection()?;

        let offset = self.stack.pop()?;
        let size = self.stack.pop()?;
        let mut topics = Vec::with_capacity(topic_count);
        for _ in 0..topic_count {
            topics.push(self.stack.pop_hash()?);
        }

        let (offset, size) = self.memory_region(offset, size)?;
        self.charge(gas::log_dynamic_cost(topic_count as u64, size as u64))?;

        let data = self.memory.read(offset, size);
        self.host.emit_log(self.address, topics, data);
        Ok(())
    }

    // =========================================================================
    // SSTORE
    // =========================================================================

    fn op_sstore(&mut self) -> Result<(), VmError> {
        self.write_protection()?;
        if self.fork.istanbul && self.gas_left <= costs::SSTORE_SENTRY {
            return Err(VmError::OutOfGas);
        }

        let key = self.stack.pop_hash()?;
        let value = self.stack.pop_hash()?;

        if self.fork.eip2929 {
            let (_, slot_cold) = self.host.warm_slot(self.address, key);
            if slot_cold {
                self.charge(costs::COLD_SLOAD)?;
            }
        }

        let status = self.host.set_storage(self.address, key, value, self.fork);
        let cost = match status {
            StorageStatus::Added => costs::SSTORE_SET,
            StorageStatus::Deleted | StorageStatus::Modified => {
                if self.fork.eip2929 {
                    costs::SSTORE_RESET_BERLIN
                } else {
                    costs::SSTORE_RESET
                }
            }
            StorageStatus::Unchanged | StorageStatus::ModifiedAgain => {
                if self.fork.eip2929 {
                    costs::WARM_ACCESS
                } else if self.fork.istanbul {
                    costs::SLOAD_ISTANBUL
                } else {
                    costs::SSTORE_RESET
                }
            }
        };
        self.charge(cost)
    }

    // =========================================================================
    // CREATE
    // =========================================================================

    fn op_create(&mut self, is_create2: bool) -> Result<(), VmError> {
        self.write_protection()?;

        let value = self.stack.pop()?;
        let offset = self.stack.pop()?;
        let size = self.stack.pop()?;
        let salt = if is_create2 {
            Some(self.stack.pop_hash()?)
        } else {
            None
        };

        let (offset, size) = self.memory_region(offset, size)?;

        // Oversized init code aborts the frame as out-of-gas; creation
        // transactions are rejected earlier in the consensus checks.
        if self.fork.eip3860 && size > MAX_INIT_CODE_SIZE {
            return Err(VmError::OutOfGas);
        }
        if self.fork.eip3860 {
            self.charge(gas::init_code_cost(size as u64))?;
        }
        if is_create2 {
            self.charge(gas::keccak_cost(size as u64))?;
        }

        let init_code = self.memory.read(offset, size);
        let address = match salt {
            Some(salt) => create2_address(self.address, salt, keccak256(&init_code)),
            None => create_address(self.address, self.host.get_nonce(self.address)),
        };

        // EIP-150: forward all but one 64th.
        let child_gas = self.gas_left - self.gas_left / 64;
        self.gas_left -= child_gas;

        let mut contract = Contract::new_creation(
            self.depth + 1,
            self.origin,
            self.address,
            address,
            value,
            child_gas,
            init_code,
        );
        if is_create2 {
            contract.call_type = CallType::Create2;
        }

        let result = self.host.callx(contract);
        self.gas_left += result.gas_left;

        self.return_data = if result.reverted() {
            result.return_value.clone()
        } else {
            Vec::new()
        };

        if result.succeeded() {
            let created = result.address.unwrap_or(address);
            self.stack.push(created.to_word().to_u256())?;
        } else {
            self.stack.push(U256::zero())?;
        }
        Ok(())
    }

    // =========================================================================
    // CALL
    // =========================================================================

    fn op_call(&mut self, call_type: CallType) -> Result<(), VmError> {
        let requested_gas = self.stack.pop()?;
        let target = self.stack.pop_address()?;
        let value = match call_type {
            CallType::Call | CallType::CallCode => self.stack.pop()?,
            CallType::DelegateCall | CallType::StaticCall => U256::zero(),
            CallType::Create | CallType::Create2 => unreachable!("creations use op_create"),
        };
        let in_offset = self.stack.pop()?;
        let in_size = self.stack.pop()?;
        let out_offset = self.stack.pop()?;
        let out_size = self.stack.pop()?;

        if call_type == CallType::Call && self.is_static && !value.is_zero() {
            return Err(VmError::StaticCallWrite);
        }

        let (in_offset, in_size) = self.memory_region(in_offset, in_size)?;
        let (out_offset, out_size) = self.memory_region(out_offset, out_size)?;

        // Account access charge (warm/cold under Berlin).
        self.account_access_cost(target, costs::EXT_CODE_TANGERINE, costs::EXT_CODE_TANGERINE)?;

        let transfers_value =
            matches!(call_type, CallType::Call | CallType::CallCode) && !value.is_zero();
        if transfers_value {
            self.charge(costs::CALL_VALUE)?;
        }
        if call_type == CallType::Call && transfers_value {
            let needs_account = if self.fork.eip158 {
                self.host.empty(target)
            } else {
                !self.host.account_exists(target)
            };
            if needs_account {
                self.charge(costs::CALL_NEW_ACCOUNT)?;
            }
        }

        let mut child_gas = gas::call_gas(self.gas_left, requested_gas);
        self.charge(child_gas)?;
        if transfers_value {
            child_gas += costs::CALL_STIPEND;
        }

        let input = self.memory.read(in_offset, in_size);
        let code = self.host.get_code(target);

        let contract = match call_type {
            CallType::Call => {
                let mut c = Contract::new_call(
                    self.depth + 1,
                    self.origin,
                    self.address,
                    target,
                    value,
                    child_gas,
                    code,
                    input,
                );
                c.is_static = self.is_static;
                c
            }
            CallType::CallCode => Contract {
                call_type: CallType::CallCode,
                depth: self.depth + 1,
                origin: self.origin,
                caller: self.address,
                address: self.address,
                code_address: target,
                value,
                gas: child_gas,
                code,
                input,
                is_static: self.is_static,
            },
            CallType::DelegateCall => Contract {
                call_type: CallType::DelegateCall,
                depth: self.depth + 1,
                origin: self.origin,
                caller: self.caller,
                address: self.address,
                code_address: target,
                value: self.value,
                gas: child_gas,
                code,
                input,
                is_static: self.is_static,
            },
            CallType::StaticCall => Contract {
                call_type: CallType::StaticCall,
                depth: self.depth + 1,
                origin: self.origin,
                caller: self.address,
                address: target,
                code_address: target,
                value: U256::zero(),
                gas: child_gas,
                code,
                input,
                is_static: true,
            },
            CallType::Create | CallType::Create2 => unreachable!(),
        };

        let result = self.host.callx(contract);
        self.gas_left += result.gas_left;

        if !result.return_value.is_empty() {
            let n = result.return_value.len().min(out_size);
            self.memory.write(out_offset, &result.return_value[..n]);
        }
        let succeeded = result.succeeded();
        self.return_data = result.return_value;

        self.stack.push_bool(succeeded)?;
        Ok(())
    }

    // =========================================================================
    // SELFDESTRUCT
    // =========================================================================

    fn op_selfdestruct(&mut self) -> Result<(), VmError> {
        self.write_protection()?;
        let beneficiary = self.stack.pop_address()?;

        let mut cost = costs::SELFDESTRUCT;
        if self.fork.eip2929 && self.host.warm_address(beneficiary) {
            cost += costs::COLD_ACCOUNT_ACCESS;
        }

        let sweeps_value = !self.host.get_balance(self.address).is_zero();
        let needs_account = if self.fork.eip158 {
            sweeps_value && self.host.empty(beneficiary)
        } else {
            !self.host.account_exists(beneficiary)
        };
        if needs_account {
            cost += costs::SELFDESTRUCT_NEW_ACCOUNT;
        }

        self.charge(cost)?;
        self.host.selfdestruct(self.address, beneficiary);
        self.stopped = true;
        Ok(())
    }
}

// =============================================================================
// ARITHMETIC HELPERS
// =============================================================================

fn saturating_usize(value: U256) -> usize {
    if value.bits() > 40 {
        usize::MAX
    } else {
        value.low_u64() as usize
    }
}

fn signed_lt(a: U256, b: U256) -> bool {
    match (a.bit(255), b.bit(255)) {
        (true, false) => true,
        (false, true) => false,
        _ => a < b,
    }
}

fn twos_complement(value: U256) -> U256 {
    (!value).overflowing_add(U256::one()).0
}

fn signed_div(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let a_neg = a.bit(255);
    let b_neg = b.bit(255);
    let a_abs = if a_neg { twos_complement(a) } else { a };
    let b_abs = if b_neg { twos_complement(b) } else { b };
    let result = a_abs / b_abs;
    if a_neg == b_neg {
        result
    } else {
        twos_complement(result)
    }
}

fn signed_mod(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let a_neg = a.bit(255);
    let a_abs = if a_neg { twos_complement(a) } else { a };
    let b_abs = if b.bit(255) { twos_complement(b) } else { b };
    let result = a_abs % b_abs;
    if a_neg {
        twos_complement(result)
    } else {
        result
    }
}

fn sar(value: U256, shift: U256) -> U256 {
    let negative = value.bit(255);
    if shift >= U256::from(256) {
        return if negative { U256::MAX } else { U256::zero() };
    }
    let shift = shift.as_usize();
    if shift == 0 {
        return value;
    }
    let shifted = value >> shift;
    if negative {
        shifted | (U256::MAX << (256 - shift))
    } else {
        shifted
    }
}

fn exp_by_squaring(mut base: U256, mut exponent: U256) -> U256 {
    let mut result = U256::one();
    while !exponent.is_zero() {
        if exponent.bit(0) {
            result = result.overflowing_mul(base).0;
        }
        exponent >>= 1;
        base = base.overflowing_mul(base).0;
    }
    result
}

fn u256_to_u512(value: U256) -> U512 {
    let mut bytes = [0u8; 64];
    value.to_big_endian(&mut bytes[32..]);
    U512::from_big_endian(&bytes)
}

fn u512_to_u256(value: U512) -> U256 {
    let mut bytes = [0u8; 64];
    value.to_big_endian(&mut bytes);
    U256::from_big_endian(&bytes[32..])
}

// =============================================================================
// TESTS
// =============================================================================
