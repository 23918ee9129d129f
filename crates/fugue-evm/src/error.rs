//! EVM error types

use fugue_state::StateError;
use thiserror::Error;

/// EVM execution errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvmError {
    /// A gas charge exceeded the remaining budget
    #[error("out of gas")]
    OutOfGas,

    /// Pop on an empty operand stack
    #[error("stack underflow")]
    StackUnderflow,

    /// Byte with no instruction assigned to it
    #[error("invalid opcode: 0x{0:02x}")]
    InvalidOpcode(u8),

    /// Nesting past the configured call depth limit
    #[error("call depth exceeded")]
    CallDepthExceeded,

    /// Balance too small to cover a transferred value
    #[error("insufficient balance")]
    InsufficientBalance,

    /// World state mutation failure
    #[error("state error: {0}")]
    State(#[from] StateError),
}

/// Result type for EVM operations
pub type EvmResult<T> = Result<T, EvmError>;
