//! System instructions: CREATE, RETURN, CALL, CALLCODE
//!
//! These handlers build child messages, recurse into the frame
//! processor, and fold the terminal child frame's gas and output back
//! into the parent. They intercept no errors: the two locally
//! recoverable conditions (insufficient balance, depth limit) are
//! pre-checked and reported as a 0 pushed onto the stack; everything
//! else propagates to the owner of the dispatch loop.

use crate::error::EvmResult;
use crate::frame::{Env, Frame, Message};
use crate::gas::{
    self, calculate_call_gas_cost, calculate_gas_extend_memory,
    calculate_message_call_gas_stipend, cost, subtract_gas,
};
use crate::interpreter::FrameProcessor;
use crate::memory::to_offset;
use bytes::Bytes;
use fugue_primitives::{Address, U256};
use fugue_state::compute_contract_address;

/// CREATE: deploy a new account running the initialization code taken
/// from memory, endowed with the popped value.
///
/// The parent forwards its entire remaining gas to the initialization
/// frame and gets back whatever that frame does not spend. On success
/// the derived address is pushed; on a failed initialization, or when
/// the endowment exceeds the creator's balance or the depth limit is
/// hit, a 0 is pushed instead.
pub fn create(frame: &mut Frame, env: &mut Env, processor: &impl FrameProcessor) -> EvmResult<()> {
    let endowment = frame.stack.pop()?;
    let memory_start = frame.stack.pop()?;
    let memory_size = frame.stack.pop()?;

    let gas_cost = cost::CREATE
        .saturating_add(calculate_gas_extend_memory(&frame.memory, memory_start, memory_size));
    frame.gas_left = subtract_gas(frame.gas_left, gas_cost)?;
    frame
        .memory
        .extend(to_offset(memory_start), to_offset(memory_size));

    let creator = frame.message.current_target;
    if env.state.get_balance(&creator) < endowment {
        frame.stack.push(U256::zero());
        return Ok(());
    }
    if frame.message.depth + 1 > env.depth_limit {
        frame.stack.push(U256::zero());
        return Ok(());
    }

    let init_code = frame
        .memory
        .read(to_offset(memory_start), to_offset(memory_size));

    // The nonce counts this creation even if the init code fails.
    let nonce = env.state.get_nonce(&creator);
    env.state.increment_nonce(&creator)?;
    let contract_address = compute_contract_address(creator, nonce);

    // Forward everything; the child refunds what it does not spend.
    let gas_forwarded = frame.gas_left;
    frame.gas_left = 0;

    let child_message = Message {
        caller: creator,
        target: None,
        current_target: contract_address,
        gas: gas_forwarded,
        value: endowment,
        data: Bytes::new(),
        code: init_code,
        depth: frame.message.depth + 1,
    };
    let child = processor.process_create_message(child_message, env)?;

    if child.is_success() {
        frame.stack.push(contract_address.into_word());
    } else {
        frame.stack.push(U256::zero());
    }
    frame.gas_left = child.gas_left;
    Ok(())
}

/// RETURN: halt the frame, copying a memory region into its output
/// buffer. The canonical successful-halt path.
pub fn return_(frame: &mut Frame) -> EvmResult<()> {
    let memory_start = frame.stack.pop()?;
    let memory_size = frame.stack.pop()?;

    let gas_cost = cost::ZERO
        .saturating_add(calculate_gas_extend_memory(&frame.memory, memory_start, memory_size));
    frame.gas_left = subtract_gas(frame.gas_left, gas_cost)?;
    frame
        .memory
        .extend(to_offset(memory_start), to_offset(memory_size));

    frame.output = frame
        .memory
        .read(to_offset(memory_start), to_offset(memory_size));
    frame.running = false;
    Ok(())
}

/// CALL: message-call into the popped target account.
pub fn call(frame: &mut Frame, env: &mut Env, processor: &impl FrameProcessor) -> EvmResult<()> {
    let gas = gas::gas_from_word(frame.stack.pop()?);
    let to = Address::from_word(frame.stack.pop()?);
    message_call(frame, env, processor, gas, to, to)
}

/// CALLCODE: message-call into the caller's own account, executing the
/// popped code address's code in the caller's context.
pub fn callcode(
    frame: &mut Frame,
    env: &mut Env,
    processor: &impl FrameProcessor,
) -> EvmResult<()> {
    let gas = gas::gas_from_word(frame.stack.pop()?);
    let code_address = Address::from_word(frame.stack.pop()?);
    let to = frame.message.current_target;
    message_call(frame, env, processor, gas, to, code_address)
}

/// Common body of CALL and CALLCODE. `to` is the account the child runs
/// as (and the value recipient); `code_address` is where the executed
/// code is fetched from. For CALL the two coincide.
fn message_call(
    frame: &mut Frame,
    env: &mut Env,
    processor: &impl FrameProcessor,
    gas: u64,
    to: Address,
    code_address: Address,
) -> EvmResult<()> {
    let value = frame.stack.pop()?;
    let memory_input_start = frame.stack.pop()?;
    let memory_input_size = frame.stack.pop()?;
    let memory_output_start = frame.stack.pop()?;
    let memory_output_size = frame.stack.pop()?;

    let call_gas_fee = calculate_call_gas_cost(&env.state, gas, &to, value);
    let message_call_gas_fee = gas.saturating_add(calculate_message_call_gas_stipend(value));

    frame.gas_left = subtract_gas(frame.gas_left, call_gas_fee)?;

    // Input and output regions are charged and extended in order, as
    // two separate all-or-nothing charges.
    let gas_input_memory =
        calculate_gas_extend_memory(&frame.memory, memory_input_start, memory_input_size);
    frame.gas_left = subtract_gas(frame.gas_left, gas_input_memory)?;
    frame
        .memory
        .extend(to_offset(memory_input_start), to_offset(memory_input_size));

    let gas_output_memory =
        calculate_gas_extend_memory(&frame.memory, memory_output_start, memory_output_size);
    frame.gas_left = subtract_gas(frame.gas_left, gas_output_memory)?;
    frame
        .memory
        .extend(to_offset(memory_output_start), to_offset(memory_output_size));

    let call_data = frame
        .memory
        .read(to_offset(memory_input_start), to_offset(memory_input_size));

    // The forwarded allowance was charged above but never handed over on
    // these two local-failure paths, so it flows straight back.
    let sender = frame.message.current_target;
    if env.state.get_balance(&sender) < value {
        frame.stack.push(U256::zero());
        frame.gas_left = frame.gas_left.saturating_add(message_call_gas_fee);
        return Ok(());
    }
    if frame.message.depth + 1 > env.depth_limit {
        frame.stack.push(U256::zero());
        frame.gas_left = frame.gas_left.saturating_add(message_call_gas_fee);
        return Ok(());
    }

    let code = env.state.get_code(&code_address);
    let child_message = Message {
        caller: sender,
        target: Some(to),
        current_target: to,
        gas: message_call_gas_fee,
        value,
        data: call_data,
        code,
        depth: frame.message.depth + 1,
    };
    let child = processor.process_message(child_message, env)?;

    if child.is_success() {
        frame.stack.push(U256::one());
        let copy_len = to_offset(memory_output_size).min(child.output.len());
        frame
            .memory
            .write(to_offset(memory_output_start), &child.output[..copy_len]);
    } else {
        frame.stack.push(U256::zero());
    }
    frame.gas_left = frame.gas_left.saturating_add(child.gas_left);
    Ok(())
}
