//! End-to-end transaction tests against the in-memory state facade

use lyra_crypto::hash256;
use lyra_primitives::{Address, TokenId, H256, U256};
use lyra_vm::{Context, Database, MemoryDatabase, TxType, Vm, VmError};

const QUOTA_INIT: u64 = 1_000_000;

// Solidity constructor payload: stores 0 to slot 0, rejects non-zero call
// value, then returns the 0x35-byte runtime tail at offset 0x21.
const CREATE_PAYLOAD: &str = "608060405260008055348015601357600080fd5b5060358060216000396000f300\
                              6080604052600080fd00a165627a7a723058207c31c74808fe0f95820eb3c48eac\
                              8e3e10ef27058dc6ca159b547fccde9290790029";

fn create_payload() -> Vec<u8> {
    hex::decode(CREATE_PAYLOAD).unwrap()
}

fn send_ctx(depth: u64) -> Context {
    Context {
        depth,
        tx_type: TxType::Send,
        ..Context::default()
    }
}

fn receive_ctx(depth: u64) -> Context {
    Context {
        depth,
        tx_type: TxType::Receive,
        ..Context::default()
    }
}

fn deploy(db: &mut MemoryDatabase, addr: Address, code: &[u8]) {
    db.create_account(&addr);
    db.set_contract_code(&addr, code);
}

#[test]
fn send_create_charges_intrinsic_and_debits() {
    let token = TokenId::from_bytes([3; 10]);
    let from = Address::from_bytes([1; 20]);

    let mut db = MemoryDatabase::new();
    db.set_balance(&from, &token, U256::from(1000u64));

    let mut vm = Vm::new(send_ctx(1), &mut db);
    let outcome = vm.create(from, create_payload(), token, U256::from(10u64));

    assert_eq!(outcome.error, None);
    assert_eq!(outcome.contract_address, None);
    assert_eq!(outcome.quota_used, 58336);
    assert_eq!(db.balance(&from, &token), U256::from(990u64));
}

#[test]
fn send_create_insufficient_balance() {
    let token = TokenId::from_bytes([3; 10]);
    let from = Address::from_bytes([1; 20]);

    let mut db = MemoryDatabase::new();
    let mut vm = Vm::new(send_ctx(1), &mut db);
    let outcome = vm.create(from, create_payload(), token, U256::from(10u64));

    assert_eq!(outcome.error, Some(VmError::InsufficientBalance));
    assert_eq!(outcome.contract_address, None);
    assert_eq!(outcome.quota_used, 58336);
}

#[test]
fn receive_create_deploys_runtime_code() {
    let token = TokenId::from_bytes([3; 10]);
    let from = Address::from_bytes([1; 20]);

    let mut db = MemoryDatabase::new();
    let mut vm = Vm::new(receive_ctx(1), &mut db);
    let outcome = vm.create(from, create_payload(), token, U256::zero());

    assert_eq!(outcome.error, None);
    assert_eq!(outcome.quota_used, 74008);

    let addr = outcome.contract_address.expect("contract address");
    assert!(db.exists(&addr));

    // the deployed code is the runtime tail of the payload
    let payload = create_payload();
    let runtime = &payload[0x21..0x21 + 0x35];
    assert_eq!(db.get_contract_code(&addr), runtime);
    assert_eq!(db.get_contract_code_hash(&addr), hash256(runtime));
}

#[test]
fn receive_create_address_collision() {
    let token = TokenId::from_bytes([3; 10]);
    let from = Address::from_bytes([1; 20]);

    let mut db = MemoryDatabase::new();
    let next = db.peek_contract_address();
    db.create_account(&next);

    let mut vm = Vm::new(receive_ctx(1), &mut db);
    let outcome = vm.create(from, create_payload(), token, U256::zero());

    assert_eq!(outcome.error, Some(VmError::ContractAddressCreationFail));
    assert_eq!(outcome.contract_address, None);
    assert_eq!(outcome.quota_used, 58336);
}

#[test]
fn receive_create_depth_exceeded() {
    let token = TokenId::from_bytes([3; 10]);
    let from = Address::from_bytes([1; 20]);

    let mut db = MemoryDatabase::new();
    let mut vm = Vm::new(receive_ctx(1025), &mut db);
    let outcome = vm.create(from, create_payload(), token, U256::zero());

    assert_eq!(outcome.error, Some(VmError::Depth));
    assert_eq!(outcome.quota_used, 58336);
}

#[test]
fn call_returns_contract_output() {
    // PUSH1 1, PUSH1 2, ADD, PUSH1 0x20, DUP1, SWAP2, SWAP1, MSTORE,
    // PUSH1 0x20, SWAP1, RETURN
    let code = hex::decode("6001600201602080919052602090F3").unwrap();
    let to = Address::from_bytes([2; 20]);

    let mut db = MemoryDatabase::new();
    deploy(&mut db, to, &code);

    let mut vm = Vm::new(receive_ctx(1), &mut db);
    let outcome = vm.call(Address::ZERO, to, Vec::new(), TokenId::NATIVE, U256::zero());

    assert_eq!(outcome.error, None);
    assert_eq!(outcome.output.len(), 32);
    assert_eq!(outcome.output[31], 0x03);
    assert!(outcome.output[..31].iter().all(|&b| b == 0));
    // intrinsic 21000 plus 30 for the opcodes plus 6 for memory expansion
    assert_eq!(outcome.quota_used, 21036);
}

#[test]
fn call_send_debits_sender() {
    let token = TokenId::from_bytes([4; 10]);
    let from = Address::from_bytes([1; 20]);
    let to = Address::from_bytes([2; 20]);

    let mut db = MemoryDatabase::new();
    db.set_balance(&from, &token, U256::from(100u64));

    let mut vm = Vm::new(send_ctx(1), &mut db);
    let outcome = vm.call(from, to, Vec::new(), token, U256::from(40u64));

    assert_eq!(outcome.error, None);
    assert_eq!(outcome.quota_used, 21000);
    assert_eq!(db.balance(&from, &token), U256::from(60u64));
}

#[test]
fn call_send_insufficient_balance() {
    let token = TokenId::from_bytes([4; 10]);
    let from = Address::from_bytes([1; 20]);
    let to = Address::from_bytes([2; 20]);

    let mut db = MemoryDatabase::new();
    db.set_balance(&from, &token, U256::from(10u64));

    let mut vm = Vm::new(send_ctx(1), &mut db);
    let outcome = vm.call(from, to, Vec::new(), token, U256::from(40u64));

    assert_eq!(outcome.error, Some(VmError::InsufficientBalance));
    assert_eq!(outcome.quota_used, 21000);
    assert_eq!(db.balance(&from, &token), U256::from(10u64));
}

#[test]
fn call_out_of_quota_reverts_everything() {
    // JUMPDEST; PUSH1 0; JUMP
    let code = [0x5B, 0x60, 0x00, 0x56];
    let token = TokenId::from_bytes([4; 10]);
    let from = Address::from_bytes([1; 20]);
    let to = Address::from_bytes([2; 20]);

    let mut db = MemoryDatabase::new();
    deploy(&mut db, to, &code);

    let mut vm = Vm::new(receive_ctx(1), &mut db);
    let outcome = vm.call(from, to, Vec::new(), token, U256::from(5u64));

    assert_eq!(outcome.error, Some(VmError::OutOfQuota));
    assert_eq!(outcome.quota_used, QUOTA_INIT);
    assert!(outcome.logs.is_empty());
    assert!(outcome.transfers.is_empty());
    // the credit was rolled back and forfeited
    assert_eq!(db.balance(&to, &token), U256::zero());
}

#[test]
fn call_invalid_jump_into_push_immediate() {
    // PUSH1 0x05, JUMP, STOP, STOP, PUSH1 0: target 5 is an immediate byte
    let code = [0x60, 0x05, 0x56, 0x00, 0x00, 0x60, 0x00];
    let to = Address::from_bytes([2; 20]);

    let mut db = MemoryDatabase::new();
    deploy(&mut db, to, &code);

    let mut vm = Vm::new(receive_ctx(1), &mut db);
    let outcome = vm.call(Address::ZERO, to, Vec::new(), TokenId::NATIVE, U256::zero());

    assert_eq!(outcome.error, Some(VmError::InvalidJump(5)));
    // intrinsic plus PUSH1 plus JUMP
    assert_eq!(outcome.quota_used, 21011);
}

#[test]
fn call_failure_queues_refund_transfer() {
    // undefined opcode fails the run and restores the outer snapshot
    let code = [0x0C];
    let token = TokenId::from_bytes([4; 10]);
    let from = Address::from_bytes([1; 20]);
    let to = Address::from_bytes([2; 20]);

    let mut db = MemoryDatabase::new();
    deploy(&mut db, to, &code);

    let ctx = Context {
        depth: 3,
        snapshot_height: 90,
        snapshot_timestamp: 1_500_000_000,
        ..receive_ctx(3)
    };
    let mut vm = Vm::new(ctx, &mut db);
    let outcome = vm.call(from, to, Vec::new(), token, U256::from(5u64));

    assert_eq!(outcome.error, Some(VmError::InvalidOpcode(0x0C)));
    // the recipient is recredited so the queued refund can debit it
    assert_eq!(db.balance(&to, &token), U256::from(5u64));

    assert_eq!(outcome.transfers.len(), 1);
    let refund = &outcome.transfers[0];
    assert_eq!(refund.from, to);
    assert_eq!(refund.to, from);
    assert_eq!(refund.token_id, token);
    assert_eq!(refund.amount, U256::from(5u64));
    assert_eq!(refund.tx_type, TxType::Send);
    assert_eq!(refund.depth, 4);
    assert_eq!(refund.snapshot_height, 90);
    assert_eq!(refund.snapshot_timestamp, 1_500_000_000);
}

#[test]
fn call_revert_keeps_credit_and_queues_nothing() {
    // PUSH1 0 (size), PUSH1 0 (offset), REVERT
    let code = [0x60, 0x00, 0x60, 0x00, 0xFD];
    let token = TokenId::from_bytes([4; 10]);
    let from = Address::from_bytes([1; 20]);
    let to = Address::from_bytes([2; 20]);

    let mut db = MemoryDatabase::new();
    deploy(&mut db, to, &code);

    let mut vm = Vm::new(receive_ctx(1), &mut db);
    let outcome = vm.call(from, to, Vec::new(), token, U256::from(5u64));

    assert_eq!(outcome.error, Some(VmError::ExecutionReverted(Vec::new())));
    // the inner snapshot keeps the transferred amount with the recipient
    assert_eq!(db.balance(&to, &token), U256::from(5u64));
    assert!(outcome.transfers.is_empty());
    assert!(outcome.logs.is_empty());
}

#[test]
fn call_depth_exceeded_before_state_change() {
    let token = TokenId::from_bytes([4; 10]);
    let from = Address::from_bytes([1; 20]);
    let to = Address::from_bytes([2; 20]);

    let mut db = MemoryDatabase::new();
    let mut vm = Vm::new(receive_ctx(1025), &mut db);
    let outcome = vm.call(from, to, Vec::new(), token, U256::from(5u64));

    assert_eq!(outcome.error, Some(VmError::Depth));
    assert_eq!(outcome.quota_used, 21000);
    assert!(!db.exists(&to));
    assert_eq!(db.balance(&to, &token), U256::zero());
}

#[test]
fn sstore_clear_earns_capped_refund() {
    // PUSH1 0 (value), PUSH1 0 (key), SSTORE, STOP
    let code = [0x60, 0x00, 0x60, 0x00, 0x55, 0x00];
    let to = Address::from_bytes([2; 20]);

    let mut db = MemoryDatabase::new();
    deploy(&mut db, to, &code);
    db.set_state(&to, &H256::ZERO, H256::from_bytes([1; 32]));

    let mut vm = Vm::new(receive_ctx(1), &mut db);
    let outcome = vm.call(Address::ZERO, to, Vec::new(), TokenId::NATIVE, U256::zero());

    assert_eq!(outcome.error, None);
    assert!(db.get_state(&to, &H256::ZERO).is_zero());
    // consumed 26006, refund 15000 capped at consumed / 2 = 13003
    assert_eq!(outcome.quota_used, 26006 + 13003);
}

#[test]
fn sstore_set_charges_full_price() {
    // PUSH1 1 (value), PUSH1 0 (key), SSTORE, STOP
    let code = [0x60, 0x01, 0x60, 0x00, 0x55, 0x00];
    let to = Address::from_bytes([2; 20]);

    let mut db = MemoryDatabase::new();
    deploy(&mut db, to, &code);

    let mut vm = Vm::new(receive_ctx(1), &mut db);
    let outcome = vm.call(Address::ZERO, to, Vec::new(), TokenId::NATIVE, U256::zero());

    assert_eq!(outcome.error, None);
    assert_eq!(outcome.quota_used, 21000 + 3 + 3 + 20000);
    assert_eq!(
        db.get_state(&to, &H256::ZERO),
        H256::from_word(U256::one())
    );
}

#[test]
fn log_opcode_records_topics_and_height() {
    // PUSH1 7 (topic), PUSH1 0 (size), PUSH1 0 (offset), LOG1, STOP
    let code = [0x60, 0x07, 0x60, 0x00, 0x60, 0x00, 0xA1, 0x00];
    let to = Address::from_bytes([2; 20]);

    let mut db = MemoryDatabase::new();
    deploy(&mut db, to, &code);

    let ctx = Context {
        account_height: 42,
        ..receive_ctx(1)
    };
    let mut vm = Vm::new(ctx, &mut db);
    let outcome = vm.call(Address::ZERO, to, Vec::new(), TokenId::NATIVE, U256::zero());

    assert_eq!(outcome.error, None);
    assert_eq!(outcome.logs.len(), 1);
    let log = &outcome.logs[0];
    assert_eq!(log.address, to);
    assert_eq!(log.topics, vec![H256::from_word(U256::from(7u64))]);
    assert!(log.data.is_empty());
    assert_eq!(log.height, 42);
    // intrinsic + 3 pushes + log base + one topic
    assert_eq!(outcome.quota_used, 21000 + 9 + 375 + 375);
}

#[test]
fn balance_opcode_pops_address_and_token() {
    let token = TokenId::from_bytes([4; 10]);
    let to = Address::from_bytes([2; 20]);

    // PUSH10 token, PUSH20 address, BALANCE, PUSH1 0, MSTORE,
    // PUSH1 32, PUSH1 0, RETURN
    let mut code = vec![0x69];
    code.extend_from_slice(token.as_bytes());
    code.push(0x73);
    code.extend_from_slice(to.as_bytes());
    code.push(0x31);
    code.extend_from_slice(&[0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3]);

    let mut db = MemoryDatabase::new();
    deploy(&mut db, to, &code);

    let mut vm = Vm::new(receive_ctx(1), &mut db);
    // the call itself credits the queried balance
    let outcome = vm.call(Address::ZERO, to, Vec::new(), token, U256::from(7u64));

    assert_eq!(outcome.error, None);
    assert_eq!(U256::from_big_endian(&outcome.output), U256::from(7u64));
}

#[test]
fn blockhash_opcode_within_range() {
    let to = Address::from_bytes([2; 20]);
    let hash = H256::from_bytes([9; 32]);

    // PUSH1 100, BLOCKHASH, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, RETURN
    let code = [
        0x60, 0x64, 0x40, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3,
    ];

    let mut db = MemoryDatabase::new();
    deploy(&mut db, to, &code);
    db.set_block_hash(100, hash);

    let ctx = Context {
        snapshot_height: 100,
        ..receive_ctx(1)
    };
    let mut vm = Vm::new(ctx, &mut db);
    let outcome = vm.call(Address::ZERO, to, Vec::new(), TokenId::NATIVE, U256::zero());

    assert_eq!(outcome.error, None);
    assert_eq!(outcome.output, hash.as_bytes());
}

#[test]
fn blockhash_opcode_out_of_range() {
    let to = Address::from_bytes([2; 20]);

    // PUSH2 0x0200 (height 512, older than 256 blocks), BLOCKHASH, return it
    let code = [
        0x61, 0x02, 0x00, 0x40, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3,
    ];

    let mut db = MemoryDatabase::new();
    deploy(&mut db, to, &code);
    db.set_block_hash(512, H256::from_bytes([9; 32]));

    let ctx = Context {
        snapshot_height: 1000,
        ..receive_ctx(1)
    };
    let mut vm = Vm::new(ctx, &mut db);
    let outcome = vm.call(Address::ZERO, to, Vec::new(), TokenId::NATIVE, U256::zero());

    assert_eq!(outcome.error, None);
    assert!(outcome.output.iter().all(|&b| b == 0));
}

#[test]
fn blake2b_opcode_hashes_memory() {
    let to = Address::from_bytes([2; 20]);

    // MSTORE8 'a' at 0; BLAKE2B(0, 1); return the digest
    let code = [
        0x60, 0x61, 0x60, 0x00, 0x53, // PUSH1 'a', PUSH1 0, MSTORE8
        0x60, 0x01, 0x60, 0x00, 0x20, // PUSH1 1 (size), PUSH1 0 (offset), BLAKE2B
        0x60, 0x00, 0x52, // PUSH1 0, MSTORE
        0x60, 0x20, 0x60, 0x00, 0xF3, // PUSH1 32, PUSH1 0, RETURN
    ];

    let mut db = MemoryDatabase::new();
    deploy(&mut db, to, &code);

    let mut vm = Vm::new(receive_ctx(1), &mut db);
    let outcome = vm.call(Address::ZERO, to, Vec::new(), TokenId::NATIVE, U256::zero());

    assert_eq!(outcome.error, None);
    assert_eq!(outcome.output, hash256(b"a").as_bytes());
}

#[test]
fn calldata_flows_into_execution() {
    let to = Address::from_bytes([2; 20]);

    // PUSH1 0, CALLDATALOAD, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, RETURN
    let code = [
        0x60, 0x00, 0x35, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3,
    ];

    let mut db = MemoryDatabase::new();
    deploy(&mut db, to, &code);

    let mut vm = Vm::new(receive_ctx(1), &mut db);
    let outcome = vm.call(
        Address::ZERO,
        to,
        vec![0xAA, 0xBB, 0xCC, 0xDD],
        TokenId::NATIVE,
        U256::zero(),
    );

    assert_eq!(outcome.error, None);
    // calldata loads are right-padded with zeros
    assert_eq!(&outcome.output[..4], &[0xAA, 0xBB, 0xCC, 0xDD]);
    assert!(outcome.output[4..].iter().all(|&b| b == 0));
}

#[test]
fn exp_program() {
    let to = Address::from_bytes([2; 20]);

    // PUSH1 10 (exponent), PUSH1 2 (base), EXP, return the result
    let code = [
        0x60, 0x0A, 0x60, 0x02, 0x0A, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3,
    ];

    let mut db = MemoryDatabase::new();
    deploy(&mut db, to, &code);

    let mut vm = Vm::new(receive_ctx(1), &mut db);
    let outcome = vm.call(Address::ZERO, to, Vec::new(), TokenId::NATIVE, U256::zero());

    assert_eq!(outcome.error, None);
    assert_eq!(U256::from_big_endian(&outcome.output), U256::from(1024u64));
}

#[test]
fn cancellation_aborts_with_out_of_quota() {
    let code = [0x5B, 0x60, 0x00, 0x56];
    let to = Address::from_bytes([2; 20]);

    let mut db = MemoryDatabase::new();
    deploy(&mut db, to, &code);

    let mut vm = Vm::new(receive_ctx(1), &mut db);
    let token = vm.cancel_token();
    token.cancel();

    let outcome = vm.call(Address::ZERO, to, Vec::new(), TokenId::NATIVE, U256::zero());
    assert_eq!(outcome.error, Some(VmError::OutOfQuota));
    assert_eq!(outcome.quota_used, QUOTA_INIT);
}

#[test]
fn quota_used_never_exceeds_quota_init() {
    let programs: [&[u8]; 5] = [
        &[0x00],
        &[0x5B, 0x60, 0x00, 0x56],
        &[0x60, 0x05, 0x56, 0x00, 0x00, 0x60, 0x00],
        &[0x0C],
        &[0x60, 0x00, 0x60, 0x00, 0xFD],
    ];
    for code in programs {
        let to = Address::from_bytes([2; 20]);
        let mut db = MemoryDatabase::new();
        deploy(&mut db, to, code);

        let mut vm = Vm::new(receive_ctx(1), &mut db);
        let outcome = vm.call(Address::ZERO, to, Vec::new(), TokenId::NATIVE, U256::zero());
        assert!(
            outcome.quota_used <= QUOTA_INIT,
            "quota_used {} for {:02x?}",
            outcome.quota_used,
            code
        );
    }
}
