//! Gas metering
//!
//! All charges are all-or-nothing: a charge either reduces the budget by
//! exactly the amount asked for or fails with `OutOfGas` and leaves the
//! budget untouched. The caller is always charged before any allowance
//! is handed to a child frame; a child's unspent gas flows back only
//! once the child is terminal.

use crate::error::{EvmError, EvmResult};
use crate::memory::{Memory, WORD_SIZE};
use fugue_primitives::Address;
use fugue_state::WorldState;
use primitive_types::U256;

/// Gas costs for the dispatched instructions
pub mod cost {
    /// Free instructions (RETURN base cost)
    pub const ZERO: u64 = 0;
    /// Base cost (POP)
    pub const BASE: u64 = 2;
    /// Very low cost (PUSH, DUP, memory stores/loads)
    pub const VERY_LOW: u64 = 3;
    /// Memory gas per word
    pub const MEMORY: u64 = 3;
    /// CREATE base cost
    pub const CREATE: u64 = 32_000;
    /// CALL/CALLCODE base cost
    pub const CALL: u64 = 40;
    /// Surcharge for calling an account not yet in the state
    pub const NEW_ACCOUNT: u64 = 25_000;
    /// Surcharge for transferring a nonzero value
    pub const CALL_VALUE: u64 = 9_000;
    /// Extra gas granted to the callee of a value-bearing call
    pub const CALL_STIPEND: u64 = 2_300;
    /// Per-byte cost of installing created contract code
    pub const CODE_DEPOSIT: u64 = 200;

    /// Maximum call nesting depth
    pub const CALL_DEPTH_LIMIT: u32 = 1024;
}

/// Charge `amount` against `gas_left`.
///
/// Fails with `OutOfGas` when `amount > gas_left`; no partial charges.
pub fn subtract_gas(gas_left: u64, amount: u64) -> EvmResult<u64> {
    gas_left.checked_sub(amount).ok_or(EvmError::OutOfGas)
}

/// Total cost of a memory of `size_in_bytes`: linear plus quadratic in
/// the word count.
pub fn calculate_memory_gas_cost(size_in_bytes: u64) -> u64 {
    let words = size_in_bytes.div_ceil(WORD_SIZE as u64);
    let linear = words.saturating_mul(cost::MEMORY);
    let quadratic = words.saturating_mul(words) / 512;
    linear.saturating_add(quadratic)
}

/// Incremental cost of growing `memory` to cover `[offset, offset + size)`.
///
/// Zero when `size` is zero or the region is already covered. A region
/// beyond the addressable range prices at `u64::MAX`, which no budget
/// can pay.
pub fn calculate_gas_extend_memory(memory: &Memory, offset: U256, size: U256) -> u64 {
    if size.is_zero() {
        return 0;
    }
    let end = match offset.checked_add(size) {
        Some(end) if end <= U256::from(u64::MAX) => end.as_u64(),
        _ => return u64::MAX,
    };
    let current = memory.len() as u64;
    if end <= current {
        return 0;
    }
    calculate_memory_gas_cost(end) - calculate_memory_gas_cost(current)
}

/// Cost of dispatching a message call: the base fee, the full forwarded
/// allowance, and the new-account / value-transfer surcharges.
pub fn calculate_call_gas_cost(state: &WorldState, gas: u64, to: &Address, value: U256) -> u64 {
    let create_gas_cost = if state.account_exists(to) {
        0
    } else {
        cost::NEW_ACCOUNT
    };
    let transfer_gas_cost = if value.is_zero() { 0 } else { cost::CALL_VALUE };
    cost::CALL
        .saturating_add(gas)
        .saturating_add(create_gas_cost)
        .saturating_add(transfer_gas_cost)
}

/// Extra gas granted to the callee when a nonzero value is transferred
pub fn calculate_message_call_gas_stipend(value: U256) -> u64 {
    if value.is_zero() {
        0
    } else {
        cost::CALL_STIPEND
    }
}

/// Clamp a word popped as a gas amount into the gas counter's range.
///
/// An allowance past `u64::MAX` can never be charged, so clamping only
/// changes *how* the subsequent charge fails.
pub fn gas_from_word(word: U256) -> u64 {
    if word > U256::from(u64::MAX) {
        u64::MAX
    } else {
        word.as_u64()
    }
}
