//! End-to-end tests for the call and creation instructions: nested
//! dispatch, gas forwarding and refunds, and the local failure paths.

use bytes::Bytes;
use fugue_evm::gas::cost;
use fugue_evm::instructions::system;
use fugue_evm::{Env, Frame, FrameProcessor, Interpreter, Message};
use fugue_primitives::{Address, U256};
use fugue_state::{compute_contract_address, Account, WorldState};

const GAS: u64 = 100_000;

fn creator() -> Address {
    Address::from_bytes([0xaa; 20])
}

fn target() -> Address {
    Address::from_bytes([0xbb; 20])
}

fn env() -> Env {
    Env::new(WorldState::new(), Address::from_bytes([0xee; 20]))
}

fn frame_at(current: Address, gas: u64, depth: u32) -> Frame {
    Frame::new(Message {
        caller: Address::from_bytes([0x99; 20]),
        target: Some(current),
        current_target: current,
        gas,
        value: U256::zero(),
        data: Bytes::new(),
        code: Bytes::new(),
        depth,
    })
}

/// Push CREATE arguments so that the endowment ends up on top.
fn push_create_args(frame: &mut Frame, endowment: U256, start: u64, size: u64) {
    frame.stack.push(U256::from(size));
    frame.stack.push(U256::from(start));
    frame.stack.push(endowment);
}

/// Push CALL/CALLCODE arguments so that the gas word ends up on top.
#[allow(clippy::too_many_arguments)]
fn push_call_args(
    frame: &mut Frame,
    gas: u64,
    to: Address,
    value: U256,
    in_start: u64,
    in_size: u64,
    out_start: u64,
    out_size: u64,
) {
    frame.stack.push(U256::from(out_size));
    frame.stack.push(U256::from(out_start));
    frame.stack.push(U256::from(in_size));
    frame.stack.push(U256::from(in_start));
    frame.stack.push(value);
    frame.stack.push(to.into_word());
    frame.stack.push(U256::from(gas));
}

// PUSH1 0, PUSH1 0, RETURN: init code producing an empty contract
const EMPTY_RETURN: &[u8] = &[0x60, 0x00, 0x60, 0x00, 0xf3];

// PUSH1 0xAB, PUSH1 0, MSTORE8, PUSH1 1, PUSH1 0, RETURN: returns [0xAB]
const RETURN_AB: &[u8] = &[0x60, 0xab, 0x60, 0x00, 0x53, 0x60, 0x01, 0x60, 0x00, 0xf3];

#[test]
fn create_deploys_contract_and_refunds_unspent_gas() {
    let mut env = env();
    let mut frame = frame_at(creator(), GAS, 0);

    frame.memory.extend(0, EMPTY_RETURN.len());
    frame.memory.write(0, EMPTY_RETURN);
    push_create_args(&mut frame, U256::zero(), 0, EMPTY_RETURN.len() as u64);

    system::create(&mut frame, &mut env, &Interpreter::new()).unwrap();

    let derived = compute_contract_address(creator(), 0);
    assert!(!derived.is_zero());
    assert_eq!(*frame.stack.peek().unwrap(), derived.into_word());
    assert_eq!(env.state.get_nonce(&creator()), 1);
    assert!(env.state.account_exists(&derived));
    assert!(env.state.get_code(&derived).is_empty());
    // 32_000 charged, everything else forwarded; the init frame spends
    // two pushes and a free RETURN
    assert_eq!(frame.gas_left, GAS - cost::CREATE - 6);
}

#[test]
fn sequential_creates_derive_distinct_addresses() {
    let mut env = env();
    let mut frame = frame_at(creator(), GAS, 0);

    push_create_args(&mut frame, U256::zero(), 0, 0);
    system::create(&mut frame, &mut env, &Interpreter::new()).unwrap();
    let first = frame.stack.pop().unwrap();

    push_create_args(&mut frame, U256::zero(), 0, 0);
    system::create(&mut frame, &mut env, &Interpreter::new()).unwrap();
    let second = frame.stack.pop().unwrap();

    assert_ne!(first, second);
    assert_eq!(first, compute_contract_address(creator(), 0).into_word());
    assert_eq!(second, compute_contract_address(creator(), 1).into_word());
    assert_eq!(env.state.get_nonce(&creator()), 2);
}

#[test]
fn create_insufficient_balance_pushes_zero() {
    let mut env = env();
    env.state.add_balance(&creator(), U256::from(5u64));
    let mut frame = frame_at(creator(), GAS, 0);
    push_create_args(&mut frame, U256::from(10u64), 0, 0);

    system::create(&mut frame, &mut env, &Interpreter::new()).unwrap();

    assert_eq!(frame.stack.len(), 1);
    assert_eq!(*frame.stack.peek().unwrap(), U256::zero());
    // Only the creation charge was taken; nothing was forwarded
    assert_eq!(frame.gas_left, GAS - cost::CREATE);
    assert_eq!(env.state.get_nonce(&creator()), 0);
}

#[test]
fn create_depth_guard_short_circuits_at_limit() {
    let mut env = env();
    env.depth_limit = 4;

    // At depth == limit the child would exceed it: no recursion
    let mut frame = frame_at(creator(), GAS, 4);
    push_create_args(&mut frame, U256::zero(), 0, 0);
    system::create(&mut frame, &mut env, &Interpreter::new()).unwrap();
    assert_eq!(*frame.stack.peek().unwrap(), U256::zero());
    assert_eq!(env.state.get_nonce(&creator()), 0);
    assert_eq!(frame.gas_left, GAS - cost::CREATE);

    // At depth == limit - 1 the creation recurses normally
    let mut frame = frame_at(creator(), GAS, 3);
    push_create_args(&mut frame, U256::zero(), 0, 0);
    system::create(&mut frame, &mut env, &Interpreter::new()).unwrap();
    assert_ne!(*frame.stack.peek().unwrap(), U256::zero());
    assert_eq!(env.state.get_nonce(&creator()), 1);
}

#[test]
fn create_endowment_moves_to_new_contract() {
    let mut env = env();
    env.state.add_balance(&creator(), U256::from(50u64));
    let mut frame = frame_at(creator(), GAS, 0);
    push_create_args(&mut frame, U256::from(50u64), 0, 0);

    system::create(&mut frame, &mut env, &Interpreter::new()).unwrap();

    let derived = compute_contract_address(creator(), 0);
    assert_eq!(env.state.get_balance(&creator()), U256::zero());
    assert_eq!(env.state.get_balance(&derived), U256::from(50u64));
}

#[test]
fn create_failed_init_pushes_zero_but_counts_nonce() {
    let mut env = env();
    let mut frame = frame_at(creator(), GAS, 0);

    // Init code is a single unassigned byte: the child frame dies and
    // takes all forwarded gas with it
    frame.memory.extend(0, 1);
    frame.memory.write(0, &[0xfe]);
    push_create_args(&mut frame, U256::zero(), 0, 1);

    system::create(&mut frame, &mut env, &Interpreter::new()).unwrap();

    assert_eq!(*frame.stack.peek().unwrap(), U256::zero());
    assert_eq!(frame.gas_left, 0);
    // The nonce was consumed by the attempt
    assert_eq!(env.state.get_nonce(&creator()), 1);
}

#[test]
fn call_to_empty_code_account_pushes_one_and_refunds() {
    let mut env = env();
    env.state.set_account(target(), Account::EMPTY);
    let mut frame = frame_at(creator(), GAS, 0);
    push_call_args(&mut frame, 5_000, target(), U256::zero(), 0, 0, 0, 0);

    system::call(&mut frame, &mut env, &Interpreter::new()).unwrap();

    assert_eq!(*frame.stack.peek().unwrap(), U256::one());
    assert!(frame.memory.is_empty());
    // The forwarded 5_000 came straight back: net cost is the base fee
    assert_eq!(frame.gas_left, GAS - cost::CALL);
}

#[test]
fn call_to_absent_account_charges_new_account_surcharge() {
    let mut env = env();
    let mut frame = frame_at(creator(), GAS, 0);
    push_call_args(&mut frame, 0, target(), U256::zero(), 0, 0, 0, 0);

    system::call(&mut frame, &mut env, &Interpreter::new()).unwrap();

    assert_eq!(*frame.stack.peek().unwrap(), U256::one());
    assert_eq!(frame.gas_left, GAS - cost::CALL - cost::NEW_ACCOUNT);
}

#[test]
fn call_insufficient_balance_refunds_forwarded_allowance() {
    let mut env = env();
    env.state.set_account(target(), Account::EMPTY);
    let mut frame = frame_at(creator(), GAS, 0);
    push_call_args(&mut frame, 2_000, target(), U256::from(10u64), 0, 0, 0, 0);

    system::call(&mut frame, &mut env, &Interpreter::new()).unwrap();

    assert_eq!(frame.stack.len(), 1);
    assert_eq!(*frame.stack.peek().unwrap(), U256::zero());
    // Charged 40 + 2_000 + 9_000, then the never-forwarded 2_000 + 2_300
    // stipend flowed back: net cost 40 + 9_000 - 2_300
    let charged = cost::CALL + 2_000 + cost::CALL_VALUE;
    let refunded = 2_000 + cost::CALL_STIPEND;
    assert_eq!(frame.gas_left, GAS - charged + refunded);
    assert_eq!(env.state.get_balance(&target()), U256::zero());
}

#[test]
fn call_depth_guard_short_circuits_at_limit() {
    let mut env = env();
    env.depth_limit = 2;
    env.state.set_account(target(), Account::EMPTY);

    let mut frame = frame_at(creator(), GAS, 2);
    push_call_args(&mut frame, 1_000, target(), U256::zero(), 0, 0, 0, 0);
    system::call(&mut frame, &mut env, &Interpreter::new()).unwrap();
    assert_eq!(*frame.stack.peek().unwrap(), U256::zero());
    assert_eq!(frame.gas_left, GAS - cost::CALL - 1_000 + 1_000);

    let mut frame = frame_at(creator(), GAS, 1);
    push_call_args(&mut frame, 1_000, target(), U256::zero(), 0, 0, 0, 0);
    system::call(&mut frame, &mut env, &Interpreter::new()).unwrap();
    assert_eq!(*frame.stack.peek().unwrap(), U256::one());
}

#[test]
fn call_copies_child_output_into_parent_memory() {
    let mut env = env();
    env.state.set_account(
        target(),
        Account {
            code: Bytes::from_static(RETURN_AB),
            ..Account::EMPTY
        },
    );
    let mut frame = frame_at(creator(), GAS, 0);
    // Output region of 8 bytes: only min(8, 1) byte is copied
    push_call_args(&mut frame, 10_000, target(), U256::zero(), 0, 0, 0, 8);

    system::call(&mut frame, &mut env, &Interpreter::new()).unwrap();

    assert_eq!(*frame.stack.peek().unwrap(), U256::one());
    assert_eq!(&frame.memory.read(0, 8)[..], &[0xab, 0, 0, 0, 0, 0, 0, 0]);
    // Child spent four pushes, one MSTORE8 with a fresh memory word, and
    // a free RETURN over covered memory
    let child_spent = 3 + 3 + (3 + 3) + 3 + 3;
    let out_region = 3;
    assert_eq!(
        frame.gas_left,
        GAS - cost::CALL - 10_000 - out_region + (10_000 - child_spent)
    );
}

#[test]
fn call_child_out_of_gas_pushes_zero_and_copies_nothing() {
    let mut env = env();
    env.state.set_account(
        target(),
        Account {
            code: Bytes::from_static(&[0x60, 0x00]),
            ..Account::EMPTY
        },
    );
    let mut frame = frame_at(creator(), GAS, 0);
    // Forward 2 gas: not enough for a single push
    push_call_args(&mut frame, 2, target(), U256::zero(), 0, 0, 0, 8);

    system::call(&mut frame, &mut env, &Interpreter::new()).unwrap();

    assert_eq!(*frame.stack.peek().unwrap(), U256::zero());
    assert!(frame.memory.read(0, 8).iter().all(|&b| b == 0));
    // The dead child refunds nothing
    assert_eq!(frame.gas_left, GAS - cost::CALL - 2 - 3);
}

#[test]
fn call_with_value_transfers_and_grants_stipend() {
    let mut env = env();
    env.state.add_balance(&creator(), U256::from(100u64));
    env.state.set_account(target(), Account::EMPTY);
    let mut frame = frame_at(creator(), GAS, 0);
    push_call_args(&mut frame, 0, target(), U256::from(30u64), 0, 0, 0, 0);

    system::call(&mut frame, &mut env, &Interpreter::new()).unwrap();

    assert_eq!(*frame.stack.peek().unwrap(), U256::one());
    assert_eq!(env.state.get_balance(&creator()), U256::from(70u64));
    assert_eq!(env.state.get_balance(&target()), U256::from(30u64));
    // Allowance was 0 + the 2_300 stipend; the empty-code child spent
    // none of it, so it all came back
    assert_eq!(frame.gas_left, GAS - cost::CALL - cost::CALL_VALUE + cost::CALL_STIPEND);
}

#[test]
fn callcode_runs_foreign_code_in_callers_context() {
    let mut env = env();
    let library = Address::from_bytes([0xcc; 20]);
    env.state.add_balance(&creator(), U256::from(77u64));
    env.state.set_account(
        library,
        Account {
            code: Bytes::from_static(RETURN_AB),
            ..Account::EMPTY
        },
    );
    let mut frame = frame_at(creator(), GAS, 0);
    push_call_args(&mut frame, 10_000, library, U256::from(5u64), 0, 0, 0, 1);

    system::callcode(&mut frame, &mut env, &Interpreter::new()).unwrap();

    assert_eq!(*frame.stack.peek().unwrap(), U256::one());
    assert_eq!(&frame.memory.read(0, 1)[..], &[0xab]);
    // The value moved from the caller to itself: nothing changed hands
    assert_eq!(env.state.get_balance(&creator()), U256::from(77u64));
    assert_eq!(env.state.get_balance(&library), U256::zero());
}

#[test]
fn callcode_insufficient_balance_pushes_zero() {
    let mut env = env();
    let library = Address::from_bytes([0xcc; 20]);
    env.state.set_account(library, Account::EMPTY);
    env.state.set_account(creator(), Account::EMPTY);
    let mut frame = frame_at(creator(), GAS, 0);
    push_call_args(&mut frame, 1_000, library, U256::from(10u64), 0, 0, 0, 0);

    system::callcode(&mut frame, &mut env, &Interpreter::new()).unwrap();

    assert_eq!(*frame.stack.peek().unwrap(), U256::zero());
    // The caller executes as itself, so no new-account surcharge applies
    let charged = cost::CALL + 1_000 + cost::CALL_VALUE;
    let refunded = 1_000 + cost::CALL_STIPEND;
    assert_eq!(frame.gas_left, GAS - charged + refunded);
}

#[test]
fn create_via_bytecode_leaves_address_on_stack() {
    let mut env = env();
    // PUSH1 0 (size), PUSH1 0 (start), PUSH1 0 (endowment), CREATE, STOP
    let code = &[0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0xf0, 0x00];
    let message = Message {
        caller: Address::from_bytes([0x99; 20]),
        target: Some(creator()),
        current_target: creator(),
        gas: GAS,
        value: U256::zero(),
        data: Bytes::new(),
        code: Bytes::from_static(code),
        depth: 0,
    };

    let frame = Interpreter::new().process_message(message, &mut env).unwrap();

    assert!(frame.is_success());
    let derived = compute_contract_address(creator(), 0);
    assert_eq!(*frame.stack.peek().unwrap(), derived.into_word());
    assert!(env.state.account_exists(&derived));
    // Three pushes plus the creation charge; the empty init frame
    // returned its whole allowance
    assert_eq!(frame.gas_left, GAS - 9 - cost::CREATE);
}

#[test]
fn self_calling_contract_bottoms_out_and_parent_survives() {
    let mut env = env();
    // An account whose code calls itself, forwarding a fixed 1024 gas:
    // PUSH1 0 ×5 (out/in regions and value), PUSH20 self,
    // PUSH2 0x0400 (gas), CALL, STOP. The forwarded allowance is part of
    // the dispatch charge, so the first nested frame cannot afford its
    // own CALL and dies of gas exhaustion.
    let mut code = vec![0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x73];
    code.extend_from_slice(target().as_bytes());
    code.extend_from_slice(&[0x61, 0x04, 0x00, 0xf1, 0x00]);
    env.state.set_account(
        target(),
        Account {
            code: Bytes::from(code.clone()),
            ..Account::EMPTY
        },
    );

    let message = Message {
        caller: Address::from_bytes([0x99; 20]),
        target: Some(target()),
        current_target: target(),
        gas: GAS,
        value: U256::zero(),
        data: Bytes::new(),
        code: Bytes::from(code),
        depth: 0,
    };

    let frame = Interpreter::new().process_message(message, &mut env).unwrap();

    // The dead descendant is recorded as a 0; the top frame itself
    // completes normally with nothing refunded from the child
    assert!(frame.is_success());
    assert_eq!(*frame.stack.peek().unwrap(), U256::zero());
    let pushes = 7 * 3;
    assert_eq!(frame.gas_left, GAS - pushes - (cost::CALL + 1024));
}
