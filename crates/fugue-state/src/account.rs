//! Account record

use bytes::Bytes;
use fugue_primitives::U256;

/// A single account: balance, nonce and code.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Account {
    /// Number of contracts this account has created (and, for externally
    /// owned accounts, transactions it has sent)
    pub nonce: u64,
    /// Balance in the base unit of value
    pub balance: U256,
    /// Contract code (empty for externally owned accounts)
    pub code: Bytes,
}

impl Account {
    /// The zero-valued account every unknown address maps to.
    pub const EMPTY: Account = Account {
        nonce: 0,
        balance: U256::zero(),
        code: Bytes::new(),
    };

    /// Check if the account is indistinguishable from an absent one
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance.is_zero() && self.code.is_empty()
    }

    /// Check if the account carries code
    pub fn has_code(&self) -> bool {
        !self.code.is_empty()
    }
}
