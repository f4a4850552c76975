//! Bytecode execution through the full transition stack: storage
//! writes, warm/cold pricing, nested calls, and the CREATE opcode.

mod common;

use common::*;
use xgr_types::genesis::GenesisAlloc;
use xgr_types::receipt::ReceiptStatus;
use xgr_types::transaction::{AccessEntry, TxAccessList, TxType};
use xgr_types::{Address, U256};

/// `SSTORE(0, 42); STOP`
fn sstore_code() -> Vec<u8> {
    vec![0x60, 0x2a, 0x60, 0x00, 0x55, 0x00]
}

/// `SLOAD(0); POP; STOP`
fn sload_code() -> Vec<u8> {
    vec![0x60, 0x00, 0x54, 0x50, 0x00]
}

/// Returns `5 + 7` as one word.
fn add_and_return_code() -> Vec<u8> {
    vec![
        0x60, 0x07, 0x60, 0x05, 0x01, // ADD
        0x60, 0x00, 0x52, // MSTORE(0)
        0x60, 0x20, 0x60, 0x00, 0xf3, // RETURN(0, 32)
    ]
}

/// Calls `callee` with 0xffff gas and no data, pops the status, stops.
fn call_code(callee: Address) -> Vec<u8> {
    let mut code = vec![
        0x60, 0x00, // out size
        0x60, 0x00, // out offset
        0x60, 0x00, // in size
        0x60, 0x00, // in offset
        0x60, 0x00, // value
        0x73, // PUSH20 callee
    ];
    code.extend_from_slice(callee.as_bytes());
    code.extend_from_slice(&[0x61, 0xff, 0xff, 0xf1, 0x50, 0x00]); // PUSH2 gas CALL POP STOP
    code
}

/// Writes a 5-byte init blob to memory and CREATEs from it; the init
/// code returns one zero byte of runtime code.
fn factory_code() -> Vec<u8> {
    vec![
        0x64, 0x60, 0x01, 0x60, 0x00, 0xf3, // PUSH5 init code
        0x60, 0x00, 0x52, // MSTORE(0)
        0x60, 0x05, // size
        0x60, 0x1b, // offset 27
        0x60, 0x00, // value
        0xf0, // CREATE
        0x00, // STOP
    ]
}

#[test]
fn test_sstore_persists_after_commit() {
    let sender = addr(0xaa);
    let contract = addr(0xcc);

    let mut alloc = GenesisAlloc::new();
    alloc.insert(sender, funded_account(ETHER));
    alloc.insert(contract, contract_account(sstore_code()));

    let (executor, root) = executor_with_genesis(default_params(), &alloc);
    let mut transition = executor.begin_txn(root, &header(1), addr(0xcb)).unwrap();

    let tx = legacy_tx(sender, Some(contract), 0, 100_000, 1_000_000_000);
    transition.write(&tx).unwrap();
    assert_eq!(transition.receipts()[0].status, ReceiptStatus::Success);

    let (_, new_root) = transition.commit().unwrap();
    let snap = executor.state_at(new_root).unwrap();
    assert_eq!(snap.get_storage(contract, word(0)), word(42));
}

#[test]
fn test_cold_vs_prewarmed_sload_gas() {
    let sender = addr(0xaa);
    let contract = addr(0xcc);

    let mut alloc = GenesisAlloc::new();
    alloc.insert(sender, funded_account(ETHER));
    alloc.insert(contract, contract_account(sload_code()));

    let (executor, root) = executor_with_genesis(default_params(), &alloc);

    // Cold slot: 21000 + PUSH 3 + SLOAD 2100 + POP 2.
    let mut transition = executor.begin_txn(root, &header(1), addr(0xcb)).unwrap();
    let tx = legacy_tx(sender, Some(contract), 0, 100_000, 1_000_000_000);
    transition.write(&tx).unwrap();
    assert_eq!(transition.receipts()[0].gas_used, 23_105);

    // Pre-warmed through an EIP-2930 list: the slot reads warm, and the
    // list itself costs its intrinsic surcharge.
    let mut transition = executor.begin_txn(root, &header(1), addr(0xcb)).unwrap();
    let mut tx = legacy_tx(sender, Some(contract), 0, 100_000, 1_000_000_000);
    tx.tx_type = TxType::AccessList;
    tx.chain_id = Some(100);
    tx.access_list = TxAccessList(vec![AccessEntry {
        address: contract,
        storage_keys: vec![word(0)],
    }]);
    tx.compute_hash();
    transition.write(&tx).unwrap();
    // 21000 + 2400 + 1900 + 3 + 100 + 2
    assert_eq!(transition.receipts()[0].gas_used, 25_405);
}

#[test]
fn test_return_value_round_trip() {
    let sender = addr(0xaa);
    let contract = addr(0xcc);

    let mut alloc = GenesisAlloc::new();
    alloc.insert(sender, funded_account(ETHER));
    alloc.insert(contract, contract_account(add_and_return_code()));

    let (executor, root) = executor_with_genesis(default_params(), &alloc);
    let mut transition = executor.begin_txn(root, &header(1), addr(0xcb)).unwrap();

    let tx = legacy_tx(sender, Some(contract), 0, 100_000, 1_000_000_000);
    let result = transition.apply(&tx).unwrap();
    assert!(result.succeeded());
    assert_eq!(U256::from_big_endian(&result.return_value), U256::from(12));
}

#[test]
fn test_nested_call_commits_callee_storage() {
    let sender = addr(0xaa);
    let caller_contract = addr(0xca);
    let callee_contract = addr(0xcb);

    let mut alloc = GenesisAlloc::new();
    alloc.insert(sender, funded_account(ETHER));
    alloc.insert(caller_contract, contract_account(call_code(callee_contract)));
    alloc.insert(callee_contract, contract_account(sstore_code()));

    let (executor, root) = executor_with_genesis(default_params(), &alloc);
    let mut transition = executor.begin_txn(root, &header(1), addr(0xdd)).unwrap();

    let tx = legacy_tx(sender, Some(caller_contract), 0, 500_000, 1_000_000_000);
    transition.write(&tx).unwrap();
    assert_eq!(transition.receipts()[0].status, ReceiptStatus::Success);

    let (_, new_root) = transition.commit().unwrap();
    let snap = executor.state_at(new_root).unwrap();
    assert_eq!(snap.get_storage(callee_contract, word(0)), word(42));
}

#[test]
fn test_create_opcode_deploys() {
    use xgr_types::crypto::create_address;

    let sender = addr(0xaa);
    let factory = addr(0xfa);

    let mut alloc = GenesisAlloc::new();
    alloc.insert(sender, funded_account(ETHER));
    alloc.insert(factory, contract_account(factory_code()));

    let (executor, root) = executor_with_genesis(default_params(), &alloc);
    let mut transition = executor.begin_txn(root, &header(1), addr(0xcb)).unwrap();

    let tx = legacy_tx(sender, Some(factory), 0, 500_000, 1_000_000_000);
    transition.write(&tx).unwrap();
    assert_eq!(transition.receipts()[0].status, ReceiptStatus::Success);

    let created = create_address(factory, 0);
    let (_, new_root) = transition.commit().unwrap();
    let snap = executor.state_at(new_root).unwrap();
    let account = snap.get_account(created).expect("deployed");
    assert_eq!(account.nonce, 1);
    assert_eq!(account.code_hash, xgr_types::keccak256(&[0x00]));
    // The factory's creation nonce advanced.
    assert_eq!(snap.get_account(factory).unwrap().nonce, 1);
}
