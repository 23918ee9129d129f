//! Message and execution frame model

use crate::error::EvmError;
use crate::gas::cost::CALL_DEPTH_LIMIT;
use crate::memory::Memory;
use crate::stack::Stack;
use bytes::Bytes;
use fugue_primitives::{Address, U256};
use fugue_state::WorldState;

/// Immutable descriptor of one call or creation request.
///
/// A message is built fresh per call/create, consumed once to construct
/// a frame, and never mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    /// Account that issued the call
    pub caller: Address,
    /// Called account, or `None` while the target is still being created
    pub target: Option<Address>,
    /// Account whose context the code executes in
    pub current_target: Address,
    /// Gas allowance handed to the frame
    pub gas: u64,
    /// Value transferred with the call
    pub value: U256,
    /// Call input data
    pub data: Bytes,
    /// Code to execute
    pub code: Bytes,
    /// Nesting depth below the top-level invocation
    pub depth: u32,
}

/// One execution context: program counter, gas budget, stack, memory,
/// halt flag and output buffer, plus the message it was built from.
///
/// A frame exclusively owns its stack and memory; the world state it
/// reads and writes lives in the [`Env`] threaded through every handler
/// call, shared by all frames of the call tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Program counter into `message.code`
    pub pc: usize,
    /// Remaining gas; only decreases, except for refunds from completed
    /// children
    pub gas_left: u64,
    /// Operand stack
    pub stack: Stack,
    /// Frame-local scratch memory
    pub memory: Memory,
    /// True until a halting instruction executes; flips exactly once
    pub running: bool,
    /// Output produced by the halting instruction
    pub output: Bytes,
    /// Error the frame terminated with, if any
    pub error: Option<EvmError>,
    /// The request this frame executes
    pub message: Message,
}

impl Frame {
    /// Build a fresh frame for `message`
    pub fn new(message: Message) -> Self {
        Self {
            pc: 0,
            gas_left: message.gas,
            stack: Stack::new(),
            memory: Memory::new(),
            running: true,
            output: Bytes::new(),
            error: None,
            message,
        }
    }

    /// Whether the frame terminated without error
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Shared execution environment: the world state handle every frame in
/// the call tree mutates, the transaction-level originating sender, and
/// the configured depth limit.
#[derive(Clone, Debug)]
pub struct Env {
    /// World state shared by the whole call tree
    pub state: WorldState,
    /// Transaction-level originating sender
    pub origin: Address,
    /// Maximum call nesting depth; reducible for tests
    pub depth_limit: u32,
}

impl Env {
    /// Create an environment with the default depth limit
    pub fn new(state: WorldState, origin: Address) -> Self {
        Self {
            state,
            origin,
            depth_limit: CALL_DEPTH_LIMIT,
        }
    }
}
