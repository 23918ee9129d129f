//! In-memory world state

use crate::account::Account;
use bytes::Bytes;
use fugue_primitives::{Address, U256};
use std::collections::HashMap;
use thiserror::Error;
use tracing::trace;

/// State mutation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StateError {
    /// Account nonce would overflow
    #[error("nonce overflow for {0}")]
    NonceOverflow(Address),

    /// Balance too small for a transfer
    #[error("insufficient funds in {0}")]
    InsufficientFunds(Address),
}

/// Result type for state operations
pub type StateResult<T> = Result<T, StateError>;

/// A point-in-time copy of the account table, returned by
/// [`WorldState::snapshot`] and consumed by [`WorldState::revert`].
#[derive(Clone, Debug)]
pub struct Snapshot {
    accounts: HashMap<Address, Account>,
}

/// Mutable ledger of accounts, shared by every frame in a call tree.
///
/// Lookups are total: an address that was never written maps to
/// [`Account::EMPTY`]. Mutations are applied eagerly and are visible to
/// every call nested below the point of mutation; rollback is the
/// responsibility of the surrounding transaction layer, via
/// [`WorldState::snapshot`] / [`WorldState::revert`].
#[derive(Clone, Debug, Default)]
pub struct WorldState {
    accounts: HashMap<Address, Account>,
}

impl WorldState {
    /// Create an empty world state
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the account at `address`, or the empty account if absent
    pub fn get_account(&self, address: &Address) -> Account {
        self.accounts.get(address).cloned().unwrap_or(Account::EMPTY)
    }

    /// Check whether `address` has ever been written
    pub fn account_exists(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    /// Insert or replace the account at `address`
    pub fn set_account(&mut self, address: Address, account: Account) {
        self.accounts.insert(address, account);
    }

    /// Get the balance at `address`
    pub fn get_balance(&self, address: &Address) -> U256 {
        self.accounts
            .get(address)
            .map(|a| a.balance)
            .unwrap_or_else(U256::zero)
    }

    /// Credit `amount` to `address`
    pub fn add_balance(&mut self, address: &Address, amount: U256) {
        let account = self.accounts.entry(*address).or_insert(Account::EMPTY);
        account.balance = account.balance.saturating_add(amount);
    }

    /// Debit `amount` from `address`
    pub fn sub_balance(&mut self, address: &Address, amount: U256) -> StateResult<()> {
        let account = self.accounts.entry(*address).or_insert(Account::EMPTY);
        if account.balance < amount {
            return Err(StateError::InsufficientFunds(*address));
        }
        account.balance -= amount;
        Ok(())
    }

    /// Move `amount` from `from` to `to`
    pub fn transfer(&mut self, from: &Address, to: &Address, amount: U256) -> StateResult<()> {
        self.sub_balance(from, amount)?;
        self.add_balance(to, amount);
        trace!(%from, %to, %amount, "value transferred");
        Ok(())
    }

    /// Get the nonce at `address`
    pub fn get_nonce(&self, address: &Address) -> u64 {
        self.accounts.get(address).map(|a| a.nonce).unwrap_or(0)
    }

    /// Bump the nonce at `address`, returning the new value
    pub fn increment_nonce(&mut self, address: &Address) -> StateResult<u64> {
        let account = self.accounts.entry(*address).or_insert(Account::EMPTY);
        account.nonce = account
            .nonce
            .checked_add(1)
            .ok_or(StateError::NonceOverflow(*address))?;
        Ok(account.nonce)
    }

    /// Get the code at `address` (empty for unknown addresses)
    pub fn get_code(&self, address: &Address) -> Bytes {
        self.accounts
            .get(address)
            .map(|a| a.code.clone())
            .unwrap_or_else(Bytes::new)
    }

    /// Install `code` at `address`
    pub fn set_code(&mut self, address: Address, code: Bytes) {
        let account = self.accounts.entry(address).or_insert(Account::EMPTY);
        account.code = code;
    }

    /// Capture the current account table for a later [`revert`].
    ///
    /// The call core itself never reverts; these hooks exist for the
    /// transaction layer above it.
    ///
    /// [`revert`]: WorldState::revert
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            accounts: self.accounts.clone(),
        }
    }

    /// Restore the account table captured by `snapshot`
    pub fn revert(&mut self, snapshot: Snapshot) {
        trace!(accounts = snapshot.accounts.len(), "state reverted to snapshot");
        self.accounts = snapshot.accounts;
    }
}
