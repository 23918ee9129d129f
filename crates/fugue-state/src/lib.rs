//! # fugue-state
//!
//! World state for the Fugue VM: the mutable ledger of account balances,
//! nonces and code shared by every frame in a call tree.
//!
//! This crate provides:
//! - The [`Account`] record and the in-memory [`WorldState`] table
//! - Eager, immediately-visible mutation (nonce increments, transfers)
//! - [`WorldState::snapshot`] / [`WorldState::revert`] hooks for the
//!   surrounding transaction layer
//! - Deterministic contract address derivation

#![warn(missing_docs)]
#![warn(clippy::all)]

mod account;
mod address;
mod state;

pub use account::Account;
pub use address::compute_contract_address;
pub use state::{Snapshot, StateError, StateResult, WorldState};
