//! # fugue-primitives
//!
//! Primitive types for the Fugue VM.
//!
//! Provides the fixed-width types every other crate builds on: the
//! 20-byte [`Address`], the 32-byte [`H256`] hash, and the 256-bit
//! machine word re-exported from `primitive-types`.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod address;
mod error;
mod hash;

pub use address::Address;
pub use error::PrimitiveError;
pub use hash::{Hash, H256};

// Re-export primitive-types for the 256-bit machine word
pub use primitive_types::U256;

/// Gas amount type
pub type Gas = u64;

/// Account nonce type
pub type Nonce = u64;
