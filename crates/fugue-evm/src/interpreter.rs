//! Recursive message dispatch
//!
//! The interpreter runs one frame to its terminal state and is invoked
//! recursively by the system instructions for every nested call or
//! creation. The dispatch loop is the only place a fatal error is
//! intercepted: it terminates the frame with zero gas and the error
//! recorded, which is how failure is encoded for the parent to observe.

use crate::error::{EvmError, EvmResult};
use crate::frame::{Env, Frame, Message};
use crate::gas::{calculate_gas_extend_memory, cost, subtract_gas};
use crate::instructions::system;
use crate::memory::to_offset;
use crate::opcode::Opcode;
use bytes::Bytes;
use fugue_primitives::U256;
use tracing::{debug, trace};

/// The frame-processor capability the system instruction handlers
/// recurse through.
///
/// Keeping the handlers behind this interface breaks the mutual
/// dependency between them and the concrete dispatch loop.
pub trait FrameProcessor {
    /// Run a message call to its terminal frame.
    ///
    /// Ordinary execution outcomes, including exceptional halts of the
    /// code being run, are encoded in the returned frame's error,
    /// output and gas state. `Err` is reserved for requests that fail
    /// admission: a depth already past the configured limit, or a value
    /// the caller cannot cover. Handlers pre-check both, so nested
    /// dispatch never trips them.
    fn process_message(&self, message: Message, env: &mut Env) -> EvmResult<Frame>;

    /// Run a contract-creation message to its terminal frame,
    /// installing the produced code on success.
    fn process_create_message(&self, message: Message, env: &mut Env) -> EvmResult<Frame>;
}

/// Synchronous dispatch loop over one frame at a time.
#[derive(Clone, Debug, Default)]
pub struct Interpreter;

impl Interpreter {
    /// Create an interpreter
    pub fn new() -> Self {
        Self
    }

    /// Execute a frame's code until it halts, runs out of code, or dies.
    fn execute_code(&self, message: Message, env: &mut Env) -> Frame {
        let mut frame = Frame::new(message);
        debug!(
            account = %frame.message.current_target,
            depth = frame.message.depth,
            gas = frame.gas_left,
            "executing frame"
        );

        while frame.running && frame.pc < frame.message.code.len() {
            if let Err(err) = self.step(&mut frame, env) {
                trace!(%err, pc = frame.pc, "frame terminated exceptionally");
                frame.gas_left = 0;
                frame.output = Bytes::new();
                frame.error = Some(err);
                frame.running = false;
            }
        }
        // Running off the end of the code is an ordinary stop.
        if frame.running {
            frame.running = false;
        }

        debug!(
            account = %frame.message.current_target,
            gas_left = frame.gas_left,
            success = frame.is_success(),
            "frame terminal"
        );
        frame
    }

    /// Decode and execute a single instruction.
    fn step(&self, frame: &mut Frame, env: &mut Env) -> EvmResult<()> {
        let byte = frame.message.code[frame.pc];
        let opcode = Opcode::from_byte(byte).ok_or(EvmError::InvalidOpcode(byte))?;

        match opcode {
            Opcode::STOP => {
                frame.running = false;
            }
            Opcode::POP => {
                frame.gas_left = subtract_gas(frame.gas_left, cost::BASE)?;
                frame.stack.pop()?;
                frame.pc += 1;
            }
            Opcode::MLOAD => {
                let offset = frame.stack.pop()?;
                let gas_cost = cost::VERY_LOW.saturating_add(calculate_gas_extend_memory(
                    &frame.memory,
                    offset,
                    U256::from(32u64),
                ));
                frame.gas_left = subtract_gas(frame.gas_left, gas_cost)?;
                frame.memory.extend(to_offset(offset), 32);
                let word = U256::from_big_endian(&frame.memory.read(to_offset(offset), 32));
                frame.stack.push(word);
                frame.pc += 1;
            }
            Opcode::MSTORE => {
                let offset = frame.stack.pop()?;
                let value = frame.stack.pop()?;
                let gas_cost = cost::VERY_LOW.saturating_add(calculate_gas_extend_memory(
                    &frame.memory,
                    offset,
                    U256::from(32u64),
                ));
                frame.gas_left = subtract_gas(frame.gas_left, gas_cost)?;
                frame.memory.extend(to_offset(offset), 32);
                let mut buf = [0u8; 32];
                value.to_big_endian(&mut buf);
                frame.memory.write(to_offset(offset), &buf);
                frame.pc += 1;
            }
            Opcode::MSTORE8 => {
                let offset = frame.stack.pop()?;
                let value = frame.stack.pop()?;
                let gas_cost = cost::VERY_LOW.saturating_add(calculate_gas_extend_memory(
                    &frame.memory,
                    offset,
                    U256::one(),
                ));
                frame.gas_left = subtract_gas(frame.gas_left, gas_cost)?;
                frame.memory.extend(to_offset(offset), 1);
                frame.memory.write(to_offset(offset), &[value.byte(0)]);
                frame.pc += 1;
            }
            op if op.push_size() > 0 => {
                frame.gas_left = subtract_gas(frame.gas_left, cost::VERY_LOW)?;
                let size = op.push_size();
                let code = &frame.message.code;
                let mut buf = [0u8; 32];
                for i in 0..size {
                    let idx = frame.pc + 1 + i;
                    if idx < code.len() {
                        buf[32 - size + i] = code[idx];
                    }
                }
                frame.stack.push(U256::from_big_endian(&buf));
                frame.pc += 1 + size;
            }
            op if op.dup_depth() > 0 => {
                frame.gas_left = subtract_gas(frame.gas_left, cost::VERY_LOW)?;
                frame.stack.dup(op.dup_depth())?;
                frame.pc += 1;
            }
            Opcode::CREATE => {
                system::create(frame, env, self)?;
                frame.pc += 1;
            }
            Opcode::CALL => {
                system::call(frame, env, self)?;
                frame.pc += 1;
            }
            Opcode::CALLCODE => {
                system::callcode(frame, env, self)?;
                frame.pc += 1;
            }
            Opcode::RETURN => {
                system::return_(frame)?;
            }
            _ => return Err(EvmError::InvalidOpcode(byte)),
        }
        Ok(())
    }
}

impl FrameProcessor for Interpreter {
    fn process_message(&self, message: Message, env: &mut Env) -> EvmResult<Frame> {
        if message.depth > env.depth_limit {
            return Err(EvmError::CallDepthExceeded);
        }
        if !message.value.is_zero() {
            env.state
                .transfer(&message.caller, &message.current_target, message.value)
                .map_err(|_| EvmError::InsufficientBalance)?;
        }
        Ok(self.execute_code(message, env))
    }

    fn process_create_message(&self, message: Message, env: &mut Env) -> EvmResult<Frame> {
        let mut frame = self.process_message(message, env)?;
        if frame.is_success() {
            let contract_code = frame.output.clone();
            let deposit = (contract_code.len() as u64).saturating_mul(cost::CODE_DEPOSIT);
            match subtract_gas(frame.gas_left, deposit) {
                Ok(gas_left) => {
                    frame.gas_left = gas_left;
                    env.state
                        .set_code(frame.message.current_target, contract_code);
                }
                Err(_) => {
                    // Unaffordable deposit: the account stands, codeless.
                    env.state
                        .set_code(frame.message.current_target, Bytes::new());
                }
            }
        }
        Ok(frame)
    }
}
