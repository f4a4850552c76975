//! # Engine-Execute Precompile
//!
//! The privileged entry point for authorized engine EOAs. It enforces
//! per-user monotone session ids, optionally bills a pro-rata grant
//! fee, runs the inner CALL with preflight-guaranteed fees, refunds the
//! engine exactly, and emits the two structured step events.
//!
//! The precompile's own `gas()` is the single source of truth for its
//! charge: every unit billed at settlement is derived from the same
//! `FeeCalc`.

use super::engine_abi::{
    self, decode_bill_grants_only, decode_engine_execute, decode_get_next_pid, decode_is_pid_used,
    encode_tuple, EngineCallSpec, EngineGrant, EngineMetaSpec, Token,
};
use super::{encode_bool, Precompile};
use crate::chain::ForkConfig;
use crate::contracts;
use crate::errors::VmError;
use crate::host::{Contract, Host};
use crate::registry::authorize_engine_caller;
use xgr_types::{keccak256, Address, Hash, U256};

/// Seconds per billing year for grant fees.
const SECONDS_PER_YEAR: u64 = 31_536_000;

/// Gas floor returned for an `ENGINE_EXECUTE` selector whose body does
/// not decode.
const MIN_MALFORMED_EXECUTE_GAS: u64 = 21_000;

/// Base units of a plain transaction.
const TX_BASE_UNITS: u64 = 21_000;

// =============================================================================
// SESSION STORAGE
// =============================================================================

fn slot_next_pid() -> Hash {
    keccak256(b"XGR:ENGINE:NEXT_PID")
}

/// Per-user session counter key: `keccak(slot ‖ user)` over the 32+20
/// byte schema. Public so indexers and genesis tooling can address the
/// counter directly.
#[must_use]
pub fn session_key(user: Address) -> Hash {
    let mut buf = [0u8; 52];
    buf[..32].copy_from_slice(slot_next_pid().as_bytes());
    buf[32..].copy_from_slice(user.as_bytes());
    keccak256(&buf)
}

fn k_next(user: Address) -> Hash {
    session_key(user)
}

fn sload_u256(host: &dyn Host, key: Hash) -> Option<U256> {
    let value = host.get_storage(contracts::engine_execute_precompile(), key);
    if value.is_zero() {
        None
    } else {
        Some(value.to_u256())
    }
}

fn sstore_u256(host: &mut dyn Host, key: Hash, value: U256) {
    host.set_storage(
        contracts::engine_execute_precompile(),
        key,
        Hash::from_u256(value),
        &ForkConfig::default(),
    );
}

/// `max(1, kNext(user))`.
fn current_next(host: &dyn Host, user: Address) -> U256 {
    match sload_u256(host, k_next(user)) {
        Some(next) if !next.is_zero() => next,
        _ => U256::one(),
    }
}

fn pid_used(host: &dyn Host, user: Address, pid: U256) -> bool {
    !pid.is_zero() && pid < current_next(host, user)
}

// =============================================================================
// FEE CALC (single source of truth)
// =============================================================================

fn calldata_cost_units(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .map(|byte| if *byte == 0 { 4u64 } else { 16 })
        .sum()
}

fn log_cost_units(topics: u64, data_len: usize) -> u64 {
    375 + 375 * topics + 8 * data_len as u64
}

fn call_overhead_units(to: Address, gas_limit: u64, data_len: usize) -> u64 {
    if to.is_zero() || gas_limit == 0 {
        return 0;
    }
    let words = (data_len as u64).div_ceil(32);
    700 + 2_600 + 3 * words
}

/// Deterministic unit breakdown shared by `gas()` and settlement.
struct FeeCalc {
    calldata: u64,
    meta_len: usize,
    extras_len: usize,
    call_overhead: u64,
    exec_limit: u64,
    validation_gas: u64,
}

impl FeeCalc {
    fn new(input: &[u8], grant: &EngineGrant, call: &EngineCallSpec, meta: &EngineMetaSpec) -> Self {
        let exec_limit = if !call.to.is_zero() && call.gas_limit > 0 {
            call.gas_limit
        } else {
            0
        };
        Self {
            calldata: calldata_cost_units(input),
            meta_len: engine_abi::engine_meta_len(grant, meta),
            extras_len: engine_abi::engine_extras_len(meta),
            call_overhead: call_overhead_units(call.to, call.gas_limit, call.data.len()),
            exec_limit,
            validation_gas: call.validation_gas,
        }
    }

    fn log_units(&self) -> u64 {
        log_cost_units(1, self.meta_len) + log_cost_units(1, self.extras_len)
    }

    /// What the precompile charges (no tx base, no calldata).
    fn precompile_gas_units(&self) -> u64 {
        self.validation_gas + self.log_units() + self.call_overhead + self.exec_limit
    }

    /// What the engine's transaction costs on the EVM side.
    fn evm_tx_units(&self) -> u64 {
        TX_BASE_UNITS + self.calldata + self.log_units() + self.call_overhead + self.exec_limit
    }

    /// Full settlement units including validation gas.
    fn total_tx_units(&self) -> u64 {
        self.evm_tx_units() + self.validation_gas
    }
}

// =============================================================================
// PRECOMPILE
// =============================================================================

/// The engine-execute precompile.
pub struct EngineExecute;

impl Precompile for EngineExecute {
    fn gas(&self, input: &[u8], _fork: &ForkConfig) -> u64 {
        if input.len() < 4 {
            return 0;
        }
        if input[..4] != engine_abi::selector(engine_abi::ENGINE_EXECUTE_SIG) {
            return 0;
        }
        match decode_engine_execute(&input[4..]) {
            Ok((grant, call, meta)) => {
                FeeCalc::new(input, &grant, &call, &meta).precompile_gas_units()
            }
            Err(_) => MIN_MALFORMED_EXECUTE_GAS,
        }
    }

    fn run(&self, input: &[u8], caller: Address, host: &mut dyn Host) -> Result<Vec<u8>, VmError> {
        if input.len() < 4 {
            return Err(VmError::InvalidInputData);
        }
        let selector: [u8; 4] = input[..4].try_into().expect("length checked");
        let args = &input[4..];

        if selector == engine_abi::selector(engine_abi::GET_NEXT_PID_SIG) {
            let user = decode_get_next_pid(args)?;
            let next = current_next(host, user);
            return Ok(Hash::from_u256(next).as_bytes().to_vec());
        }
        if selector == engine_abi::selector(engine_abi::IS_PID_USED_SIG) {
            let (user, pid) = decode_is_pid_used(args)?;
            return Ok(encode_bool(pid_used(host, user, pid)));
        }
        if selector == engine_abi::selector(engine_abi::BILL_GRANTS_ONLY_SIG) {
            return bill_grants_only(args, caller, host);
        }
        if selector != engine_abi::selector(engine_abi::ENGINE_EXECUTE_SIG) {
            return Err(VmError::InvalidInputData);
        }

        let (grant, mut call, meta) = decode_engine_execute(args)?;
        let fee = FeeCalc::new(input, &grant, &call, &meta);

        // Only the configured engine may invoke this entry point.
        let engine = authorize_engine_caller(host, caller).ok_or(VmError::InvalidInputData)?;
        // grant.engine is recorded but never consulted for authorization.
        let user = grant.from;

        if call.grant_fee_seconds > 0 {
            let fee_wei = bill_grants(
                host,
                user,
                engine,
                call.grant_fee_seconds,
                call.grant_fee_per_year_wei,
            )?;
            log_grant_fee_charged(
                host,
                user,
                engine,
                call.grant_fee_seconds,
                call.grant_fee_per_year_wei,
                fee_wei,
            );
        }

        // Session monotonicity against the single truth anchor kNext:
        //   new root:  session_id == kNext
        //   follow-up: session_id <  kNext
        //   reject:    session_id >  kNext
        let cur_next = current_next(host, user);
        if grant.session_id > cur_next {
            return Err(VmError::InvalidInputData);
        }
        // Persist immediately for a new root so the bump holds whatever
        // the inner call does.
        if grant.session_id == cur_next {
            sstore_u256(host, k_next(user), grant.session_id + U256::one());
        }

        let tx_time = host.get_tx_context().timestamp;
        if call.deadline != 0 && tx_time > call.deadline {
            return Err(VmError::UnauthorizedCaller);
        }

        // The actually paid gas price is the settlement anchor; the
        // context carries it as a 32-byte big-endian word.
        let ctx = host.get_tx_context();
        let paid_wei_per_gas = ctx.gas_price.to_u256();
        if paid_wei_per_gas.is_zero() {
            return Err(VmError::InvalidInputData);
        }

        // A missing or zero fee cap inherits the paid price; an explicit
        // cap below base fee is rejected.
        let base_fee = U256::from(ctx.base_fee);
        if call.max_fee_per_gas.is_zero() {
            call.max_fee_per_gas = paid_wei_per_gas;
        } else if call.max_fee_per_gas < base_fee {
            return Err(VmError::InvalidInputData);
        }
        // Without a target there is nothing to spend execution gas on.
        if call.to.is_zero() && call.gas_limit != 0 {
            return Err(VmError::InvalidInputData);
        }

        // Preflight: the user must cover the worst case now so the
        // refund below can never fail, even when the inner call reverts.
        let mut worst = U256::from(fee.total_tx_units()) * paid_wei_per_gas;
        worst = worst.saturating_add(call.value_wei);
        if call.grant_fee_seconds > 0 {
            worst = worst.saturating_add(grant_fee_wei(
                call.grant_fee_seconds,
                call.grant_fee_per_year_wei,
            ));
        }
        if host.get_balance(user) < worst {
            return Err(VmError::NotEnoughFunds);
        }

        let mut exec_gas_used = 0u64;
        let mut success = false;
        if call.gas_limit > 0 && !call.to.is_zero() {
            let code = host.get_code(call.to);
            let contract = Contract::new_call(
                1,
                user,
                user,
                call.to,
                call.value_wei,
                call.gas_limit,
                code,
                call.data.clone(),
            );
            let result = host.callx(contract);
            exec_gas_used = result.gas_used;
            success = result.succeeded();
        }

        // Refund the engine from the same unit breakdown gas() charged.
        let evm_units = fee.evm_tx_units();
        let total_units = fee.total_tx_units();
        let evm_fee_refund = U256::from(evm_units) * paid_wei_per_gas;
        let engine_fee_wei = U256::from(fee.validation_gas) * paid_wei_per_gas;
        let total_pay = evm_fee_refund + engine_fee_wei;
        if !total_pay.is_zero() {
            host.transfer(user, engine, total_pay)?;
        }

        // The meta event logs the session (root) id, not any node pid.
        let meta_data = encode_tuple(&[
            Token::uint(grant.session_id),
            Token::uint64(meta.iteration),
            Token::address(grant.xrc729),
            Token::Str(grant.ostc_id.clone()),
            Token::Word(grant.ostc_hash),
            Token::Str(meta.step_id.clone()),
            Token::address(meta.rule_contract),
            Token::Word(meta.rule_hash),
            Token::address(call.to),
            Token::boolean(success),
            Token::Bytes(meta.payload.clone()),
            Token::Bytes(meta.api_saves.clone()),
            Token::Bytes(meta.contract_saves.clone()),
        ]);
        let extras_data = encode_tuple(&[
            Token::uint(U256::from(exec_gas_used)),
            Token::Bytes(meta.extras.clone()),
        ]);

        let precompile = contracts::engine_execute_precompile();
        host.emit_log(
            precompile,
            vec![engine_abi::event_topic(engine_abi::ENGINE_META_EVENT_SIG)],
            meta_data,
        );
        // Extras are emitted unconditionally; gas() always prices both
        // events.
        host.emit_log(
            precompile,
            vec![engine_abi::event_topic(engine_abi::ENGINE_EXTRAS_EVENT_SIG)],
            extras_data,
        );

        Ok(encode_tuple(&[
            Token::boolean(success),
            Token::uint64(total_units),
            Token::uint(evm_fee_refund),
            Token::uint(engine_fee_wei),
        ]))
    }
}

// =============================================================================
// GRANT BILLING
// =============================================================================

/// `ceil(seconds · per_year_wei / seconds_per_year)`.
fn grant_fee_wei(seconds: u64, per_year_wei: U256) -> U256 {
    let year = U256::from(SECONDS_PER_YEAR);
    let numerator = per_year_wei.saturating_mul(U256::from(seconds)) + (year - U256::one());
    numerator / year
}

fn bill_grants(
    host: &mut dyn Host,
    payer: Address,
    engine: Address,
    seconds: u64,
    per_year_wei: U256,
) -> Result<U256, VmError> {
    if seconds == 0 {
        return Ok(U256::zero());
    }
    let fee = grant_fee_wei(seconds, per_year_wei);
    if fee.is_zero() {
        return Ok(fee);
    }
    host.transfer(payer, engine, fee)?;
    Ok(fee)
}

/// Topic-less diagnostic log mirroring each grant billing.
fn log_grant_fee_charged(
    host: &mut dyn Host,
    payer: Address,
    engine: Address,
    seconds: u64,
    per_year_wei: U256,
    fee: U256,
) {
    let payload = encode_tuple(&[
        Token::address(payer),
        Token::address(engine),
        Token::uint64(seconds),
        Token::uint(per_year_wei),
        Token::uint(fee),
    ]);
    host.emit_log(contracts::engine_execute_precompile(), Vec::new(), payload);
}

fn bill_grants_only(
    args: &[u8],
    caller: Address,
    host: &mut dyn Host,
) -> Result<Vec<u8>, VmError> {
    let engine = authorize_engine_caller(host, caller).ok_or(VmError::UnauthorizedCaller)?;
    let (payer, seconds, per_year_wei) = decode_bill_grants_only(args)?;

    let fee = bill_grants(host, payer, engine, seconds, per_year_wei)?;
    log_grant_fee_charged(host, payer, engine, seconds, per_year_wei, fee);

    Ok(Hash::from_u256(fee).as_bytes().to_vec())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_k_next_distinct_per_user() {
        let a = k_next(Address::new([1u8; 20]));
        let b = k_next(Address::new([2u8; 20]));
        assert_ne!(a, b);
    }

    #[test]
    fn test_calldata_units() {
        assert_eq!(calldata_cost_units(&[]), 0);
        assert_eq!(calldata_cost_units(&[0, 0, 1, 0xff]), 4 + 4 + 16 + 16);
    }

    #[test]
    fn test_log_units_formula() {
        assert_eq!(log_cost_units(1, 0), 750);
        assert_eq!(log_cost_units(1, 100), 750 + 800);
    }

    #[test]
    fn test_call_overhead_zero_without_target() {
        assert_eq!(call_overhead_units(Address::ZERO, 50_000, 100), 0);
        assert_eq!(call_overhead_units(Address::new([1u8; 20]), 0, 100), 0);
        assert_eq!(
            call_overhead_units(Address::new([1u8; 20]), 50_000, 64),
            700 + 2_600 + 6
        );
    }

    #[test]
    fn test_grant_fee_ceil() {
        // 1 second at 31_536_000 wei/year = exactly 1 wei
        assert_eq!(
            grant_fee_wei(1, U256::from(SECONDS_PER_YEAR)),
            U256::one()
        );
        // 1 second at 1 wei/year rounds up to 1 wei
        assert_eq!(grant_fee_wei(1, U256::one()), U256::one());
        // zero rate is zero
        assert_eq!(grant_fee_wei(10, U256::zero()), U256::zero());
    }

    #[test]
    fn test_gas_floor_on_malformed_execute() {
        let mut input = engine_abi::selector(engine_abi::ENGINE_EXECUTE_SIG).to_vec();
        input.extend_from_slice(&[0u8; 16]);
        assert_eq!(
            EngineExecute.gas(&input, &ForkConfig::default()),
            MIN_MALFORMED_EXECUTE_GAS
        );
    }

    #[test]
    fn test_gas_zero_for_other_selectors() {
        let input = engine_abi::selector(engine_abi::GET_NEXT_PID_SIG).to_vec();
        assert_eq!(EngineExecute.gas(&input, &ForkConfig::default()), 0);
        assert_eq!(EngineExecute.gas(&[], &ForkConfig::default()), 0);
    }
}
