//! # fugue-evm
//!
//! Message-call and contract-creation core of the Fugue VM: the
//! reference semantics other implementations must match bit for bit.
//!
//! This crate provides:
//! - The operand [`Stack`], frame-local [`Memory`] and gas metering
//! - The [`Message`] / [`Frame`] execution model
//! - The system instructions (CREATE, RETURN, CALL, CALLCODE) with
//!   their nested-frame gas accounting and failure semantics
//! - The recursive [`Interpreter`] the instructions dispatch through

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod frame;
pub mod gas;
pub mod instructions;
pub mod interpreter;
pub mod memory;
pub mod opcode;
pub mod stack;

pub use error::{EvmError, EvmResult};
pub use frame::{Env, Frame, Message};
pub use interpreter::{FrameProcessor, Interpreter};
pub use memory::Memory;
pub use stack::Stack;
