//! Engine-execute scenarios: session monotonicity, fee preflight and
//! refund, authorization modes, grant billing, and the pid queries.

mod common;

use common::*;
use xgr_execution::contracts::engine_execute_precompile;
use xgr_execution::errors::VmError;
use xgr_execution::precompiles::engine_abi::{
    self, encode_tuple, Token, BILL_GRANTS_ONLY_SIG, ENGINE_EXECUTE_SIG, GET_NEXT_PID_SIG,
    IS_PID_USED_SIG,
};
use xgr_execution::precompiles::engine_execute::session_key;
use xgr_execution::chain::{registry_slot_authorized_engine, registry_slot_paused};
use xgr_execution::prelude::*;
use xgr_types::genesis::GenesisAlloc;
use xgr_types::transaction::Transaction;
use xgr_types::{Address, Hash, U256};

const GAS_PRICE: u64 = 3_000_000_000;

fn engine() -> Address {
    addr(0xee)
}

fn user() -> Address {
    addr(0x11)
}

fn target() -> Address {
    addr(0x22)
}

/// Parameters of one `ENGINE_EXECUTE` call under test.
struct ExecuteArgs {
    session_id: u64,
    to: Address,
    gas_limit: u64,
    validation_gas: u64,
    deadline: u64,
    value: u64,
    grant_fee_seconds: u64,
    grant_fee_per_year_wei: u64,
}

impl Default for ExecuteArgs {
    fn default() -> Self {
        Self {
            session_id: 1,
            to: target(),
            gas_limit: 50_000,
            validation_gas: 20_000,
            deadline: 0,
            value: 0,
            grant_fee_seconds: 0,
            grant_fee_per_year_wei: 0,
        }
    }
}

fn top_level(tuples: [Vec<u8>; 3]) -> Vec<u8> {
    let head = 32 * tuples.len();
    let mut out = Vec::new();
    let mut offset = head;
    for tuple in &tuples {
        out.extend_from_slice(Hash::from_u256(U256::from(offset)).as_bytes());
        offset += tuple.len();
    }
    for tuple in tuples {
        out.extend_from_slice(&tuple);
    }
    out
}

fn execute_input(args: &ExecuteArgs) -> Vec<u8> {
    let grant = encode_tuple(&[
        Token::address(user()),
        Token::address(engine()),
        Token::address(addr(0x72)),
        Token::Str("ostc-main".into()),
        Token::Word(word(1)),
        Token::uint(U256::zero()),
        Token::uint(U256::from(1_000_000u64)),
        Token::uint(U256::zero()),
        Token::uint(U256::from(args.session_id)),
        Token::uint(U256::from(100u64)),
    ]);
    let call = encode_tuple(&[
        Token::address(args.to),
        Token::Bytes(vec![]),
        Token::uint(U256::from(args.value)),
        Token::uint64(args.gas_limit),
        Token::uint64(args.validation_gas),
        Token::uint(U256::zero()),
        Token::uint64(args.deadline),
        Token::uint64(args.grant_fee_seconds),
        Token::uint(U256::from(args.grant_fee_per_year_wei)),
    ]);
    let meta = encode_tuple(&[
        Token::uint64(1),
        Token::Str("step-1".into()),
        Token::address(addr(0x73)),
        Token::Word(word(2)),
        Token::Bytes(vec![1, 2]),
        Token::Bytes(vec![]),
        Token::Bytes(vec![]),
        Token::Bytes(vec![9]),
    ]);

    let mut input = engine_abi::selector(ENGINE_EXECUTE_SIG).to_vec();
    input.extend_from_slice(&top_level([grant, call, meta]));
    input
}

fn engine_tx(input: Vec<u8>, nonce: u64) -> Transaction {
    let mut tx = Transaction {
        nonce,
        gas_price: Some(U256::from(GAS_PRICE)),
        gas: 3_000_000,
        to: Some(engine_execute_precompile()),
        from: engine(),
        input,
        ..Transaction::default()
    };
    tx.compute_hash();
    tx
}

/// Genesis with a funded user, a funded engine EOA, the inner-call
/// target, and a seeded engine-precompile account so session counters
/// survive EIP-158 culling.
fn engine_alloc(next_pid: Option<u64>) -> GenesisAlloc {
    let mut alloc = GenesisAlloc::new();
    alloc.insert(user(), funded_account(ETHER));
    alloc.insert(engine(), funded_account(ETHER));
    alloc.insert(target(), contract_account(vec![0x00]));

    let mut precompile = contract_account(vec![0xfe]);
    if let Some(next) = next_pid {
        precompile.storage.insert(session_key(user()), word(next));
    }
    alloc.insert(engine_execute_precompile(), precompile);
    alloc
}

fn bootstrap_params() -> xgr_execution::chain::ChainParams {
    let mut params = default_params();
    params.bootstrap_engine_eoa = engine();
    params
}

fn output_words(output: &[u8]) -> (bool, u64, U256, U256) {
    assert_eq!(output.len(), 128);
    (
        output[31] == 1,
        U256::from_big_endian(&output[32..64]).low_u64(),
        U256::from_big_endian(&output[64..96]),
        U256::from_big_endian(&output[96..128]),
    )
}

fn next_pid_of(transition: &Transition, user: Address) -> u64 {
    transition
        .txn()
        .get_state(engine_execute_precompile(), session_key(user))
        .to_u256()
        .low_u64()
}

#[test]
fn test_new_session_executes_and_bumps() {
    let (executor, root) = executor_with_genesis(bootstrap_params(), &engine_alloc(None));
    let mut transition = executor.begin_txn(root, &header(1), addr(0xcb)).unwrap();

    let user_before = transition.txn().get_balance(user());
    let engine_before = transition.txn().get_balance(engine());

    let result = transition
        .apply(&engine_tx(execute_input(&ExecuteArgs::default()), 0))
        .unwrap();
    assert!(result.succeeded());

    let (success, total_units, evm_refund, engine_fee) = output_words(&result.return_value);
    assert!(success);
    // validation gas 20_000 at 3 gwei
    assert_eq!(engine_fee, U256::from(60_000_000_000_000u64));

    // First session: kNext was absent, session 1 bumps it to 2.
    assert_eq!(next_pid_of(&transition, user()), 2);

    // The user paid exactly the unit total at the paid price.
    let user_after = transition.txn().get_balance(user());
    assert_eq!(
        user_before - user_after,
        U256::from(total_units) * U256::from(GAS_PRICE)
    );

    // The engine got the refund plus its fee (its own gas cost is paid
    // to the fee split separately).
    let engine_after = transition.txn().get_balance(engine());
    let gas_cost = U256::from(result.gas_used) * U256::from(GAS_PRICE);
    assert_eq!(engine_after + gas_cost - engine_before, evm_refund + engine_fee);

    // Exactly two structured events plus nothing else.
    let logs = transition.txn_mut().take_logs();
    assert_eq!(logs.len(), 2);
    assert_eq!(
        logs[0].topics[0],
        engine_abi::event_topic(engine_abi::ENGINE_META_EVENT_SIG)
    );
    assert_eq!(
        logs[1].topics[0],
        engine_abi::event_topic(engine_abi::ENGINE_EXTRAS_EVENT_SIG)
    );
}

#[test]
fn test_session_jump_rejected() {
    let (executor, root) = executor_with_genesis(bootstrap_params(), &engine_alloc(Some(5)));
    let mut transition = executor.begin_txn(root, &header(1), addr(0xcb)).unwrap();

    let args = ExecuteArgs {
        session_id: 6,
        ..ExecuteArgs::default()
    };
    let result = transition.apply(&engine_tx(execute_input(&args), 0)).unwrap();
    assert_eq!(result.err, Some(VmError::InvalidInputData));

    // kNext unchanged.
    assert_eq!(next_pid_of(&transition, user()), 5);
}

#[test]
fn test_follow_up_session_no_bump() {
    let (executor, root) = executor_with_genesis(bootstrap_params(), &engine_alloc(Some(5)));
    let mut transition = executor.begin_txn(root, &header(1), addr(0xcb)).unwrap();

    let args = ExecuteArgs {
        session_id: 4,
        ..ExecuteArgs::default()
    };
    let result = transition.apply(&engine_tx(execute_input(&args), 0)).unwrap();
    assert!(result.succeeded());
    assert_eq!(next_pid_of(&transition, user()), 5);
}

#[test]
fn test_matching_session_bumps_by_one() {
    let (executor, root) = executor_with_genesis(bootstrap_params(), &engine_alloc(Some(5)));
    let mut transition = executor.begin_txn(root, &header(1), addr(0xcb)).unwrap();

    let args = ExecuteArgs {
        session_id: 5,
        ..ExecuteArgs::default()
    };
    let result = transition.apply(&engine_tx(execute_input(&args), 0)).unwrap();
    assert!(result.succeeded());
    assert_eq!(next_pid_of(&transition, user()), 6);
}

#[test]
fn test_session_bump_survives_inner_revert() {
    // Target immediately reverts; the root bump must still persist.
    let mut alloc = engine_alloc(None);
    alloc.insert(target(), contract_account(vec![0x60, 0x00, 0x60, 0x00, 0xfd]));

    let (executor, root) = executor_with_genesis(bootstrap_params(), &alloc);
    let mut transition = executor.begin_txn(root, &header(1), addr(0xcb)).unwrap();

    let result = transition
        .apply(&engine_tx(execute_input(&ExecuteArgs::default()), 0))
        .unwrap();
    assert!(result.succeeded());

    let (success, _, _, _) = output_words(&result.return_value);
    assert!(!success);
    assert_eq!(next_pid_of(&transition, user()), 2);
}

#[test]
fn test_deadline_expired() {
    let (executor, root) = executor_with_genesis(bootstrap_params(), &engine_alloc(None));
    let mut transition = executor.begin_txn(root, &header(1), addr(0xcb)).unwrap();

    let args = ExecuteArgs {
        deadline: 1,
        ..ExecuteArgs::default()
    };
    let result = transition.apply(&engine_tx(execute_input(&args), 0)).unwrap();
    assert_eq!(result.err, Some(VmError::UnauthorizedCaller));
}

#[test]
fn test_zero_target_with_gas_limit_rejected() {
    let (executor, root) = executor_with_genesis(bootstrap_params(), &engine_alloc(None));
    let mut transition = executor.begin_txn(root, &header(1), addr(0xcb)).unwrap();

    let args = ExecuteArgs {
        to: Address::ZERO,
        gas_limit: 50_000,
        ..ExecuteArgs::default()
    };
    let result = transition.apply(&engine_tx(execute_input(&args), 0)).unwrap();
    assert_eq!(result.err, Some(VmError::InvalidInputData));
}

#[test]
fn test_log_only_step_without_target() {
    let (executor, root) = executor_with_genesis(bootstrap_params(), &engine_alloc(None));
    let mut transition = executor.begin_txn(root, &header(1), addr(0xcb)).unwrap();

    let args = ExecuteArgs {
        to: Address::ZERO,
        gas_limit: 0,
        ..ExecuteArgs::default()
    };
    let result = transition.apply(&engine_tx(execute_input(&args), 0)).unwrap();
    assert!(result.succeeded());

    // No inner call ⇒ reported as unsuccessful step, still two events.
    let (success, _, _, _) = output_words(&result.return_value);
    assert!(!success);
    assert_eq!(transition.txn_mut().take_logs().len(), 2);
}

#[test]
fn test_preflight_guards_refund() {
    let mut alloc = engine_alloc(None);
    alloc.insert(user(), funded_account(1_000));

    let (executor, root) = executor_with_genesis(bootstrap_params(), &alloc);
    let mut transition = executor.begin_txn(root, &header(1), addr(0xcb)).unwrap();

    let result = transition
        .apply(&engine_tx(execute_input(&ExecuteArgs::default()), 0))
        .unwrap();
    assert_eq!(result.err, Some(VmError::NotEnoughFunds));
}

#[test]
fn test_unauthorized_caller_rejected() {
    let (executor, root) = executor_with_genesis(bootstrap_params(), &engine_alloc(None));
    let mut transition = executor.begin_txn(root, &header(1), addr(0xcb)).unwrap();

    let mut tx = engine_tx(execute_input(&ExecuteArgs::default()), 0);
    tx.from = addr(0x66); // not the bootstrap engine
    tx.compute_hash();
    // Fund the impostor so only authorization can fail.
    transition
        .txn_mut()
        .add_balance(addr(0x66), U256::from(ETHER));

    let result = transition.apply(&tx).unwrap();
    assert_eq!(result.err, Some(VmError::InvalidInputData));
}

#[test]
fn test_registry_authorization_and_pause() {
    let registry = addr(0x99);

    let mut params = default_params();
    params.engine_registry = registry;

    let mut alloc = engine_alloc(None);
    let mut registry_alloc = contract_account(vec![0x01]);
    registry_alloc
        .storage
        .insert(registry_slot_authorized_engine(engine()), word(1));
    alloc.insert(registry, registry_alloc.clone());

    let (executor, root) = executor_with_genesis(params.clone(), &alloc);
    let mut transition = executor.begin_txn(root, &header(1), addr(0xcb)).unwrap();
    let result = transition
        .apply(&engine_tx(execute_input(&ExecuteArgs::default()), 0))
        .unwrap();
    assert!(result.succeeded());

    // Paused registry denies even listed engines.
    registry_alloc.storage.insert(registry_slot_paused(), word(1));
    let mut alloc = engine_alloc(None);
    alloc.insert(registry, registry_alloc);

    let (executor, root) = executor_with_genesis(params, &alloc);
    let mut transition = executor.begin_txn(root, &header(1), addr(0xcb)).unwrap();
    let result = transition
        .apply(&engine_tx(execute_input(&ExecuteArgs::default()), 0))
        .unwrap();
    assert_eq!(result.err, Some(VmError::InvalidInputData));
}

#[test]
fn test_grant_billing_inside_execute() {
    let (executor, root) = executor_with_genesis(bootstrap_params(), &engine_alloc(None));
    let mut transition = executor.begin_txn(root, &header(1), addr(0xcb)).unwrap();

    let user_before = transition.txn().get_balance(user());

    let args = ExecuteArgs {
        grant_fee_seconds: 3_600,
        grant_fee_per_year_wei: 31_536_000_000, // 1000 wei per second
        ..ExecuteArgs::default()
    };
    let result = transition.apply(&engine_tx(execute_input(&args), 0)).unwrap();
    assert!(result.succeeded());

    let (_, total_units, _, _) = output_words(&result.return_value);
    let grant_fee = U256::from(3_600_000u64);
    let user_after = transition.txn().get_balance(user());
    assert_eq!(
        user_before - user_after,
        U256::from(total_units) * U256::from(GAS_PRICE) + grant_fee
    );

    // Grant billing adds its topic-less diagnostic log.
    let logs = transition.txn_mut().take_logs();
    assert_eq!(logs.len(), 3);
    assert!(logs[0].topics.is_empty());
}

#[test]
fn test_bill_grants_only() {
    let (executor, root) = executor_with_genesis(bootstrap_params(), &engine_alloc(None));
    let mut transition = executor.begin_txn(root, &header(1), addr(0xcb)).unwrap();

    let user_before = transition.txn().get_balance(user());

    let mut input = engine_abi::selector(BILL_GRANTS_ONLY_SIG).to_vec();
    input.extend_from_slice(&encode_tuple(&[
        Token::address(user()),
        Token::uint64(3_600),
        Token::uint(U256::from(31_536_000_000u64)),
    ]));

    let result = transition.apply(&engine_tx(input, 0)).unwrap();
    assert!(result.succeeded());
    assert_eq!(
        U256::from_big_endian(&result.return_value),
        U256::from(3_600_000u64)
    );
    assert_eq!(
        user_before - transition.txn().get_balance(user()),
        U256::from(3_600_000u64)
    );
}

#[test]
fn test_pid_queries() {
    let (executor, root) = executor_with_genesis(bootstrap_params(), &engine_alloc(Some(5)));
    let mut transition = executor.begin_txn(root, &header(1), addr(0xcb)).unwrap();

    // ENGINE_GET_NEXT_PID reflects the stored counter.
    let mut input = engine_abi::selector(GET_NEXT_PID_SIG).to_vec();
    input.extend_from_slice(&encode_tuple(&[Token::address(user())]));
    let result = transition.apply(&engine_tx(input, 0)).unwrap();
    assert_eq!(U256::from_big_endian(&result.return_value), U256::from(5));

    // Unknown users report 1.
    let mut input = engine_abi::selector(GET_NEXT_PID_SIG).to_vec();
    input.extend_from_slice(&encode_tuple(&[Token::address(addr(0x77))]));
    let result = transition.apply(&engine_tx(input, 1)).unwrap();
    assert_eq!(U256::from_big_endian(&result.return_value), U256::one());

    // pid < kNext is used; pid == kNext and pid == 0 are not.
    for (pid, used) in [(4u64, true), (5, false), (0, false)] {
        let mut input = engine_abi::selector(IS_PID_USED_SIG).to_vec();
        input.extend_from_slice(&encode_tuple(&[
            Token::address(user()),
            Token::uint(U256::from(pid)),
        ]));
        let nonce = transition.txn().get_nonce(engine());
        let result = transition.apply(&engine_tx(input, nonce)).unwrap();
        assert_eq!(result.return_value[31] == 1, used, "pid {pid}");
    }
}
