//! Error types for farm and vault accounting

use alloy_primitives::{Address, U256};
use thiserror::Error;

/// Result type alias for accounting operations
pub type Result<T> = std::result::Result<T, FarmError>;

/// Errors raised by the farm engine, the emission schedule and the vaults
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FarmError {
    // === Lookup ===
    /// Pool, position, term sheet or stake does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Pool or term sheet is already registered
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    // === Balances ===
    /// Withdrawal larger than the staked amount
    #[error("Insufficient stake: requested {requested}, available {available}")]
    InsufficientStake { requested: U256, available: U256 },

    /// Reward source cannot cover a payout batch
    #[error("Insufficient reward funds: required {required}, available {available}")]
    InsufficientRewardFunds { required: U256, available: U256 },

    // === Parameters ===
    /// Argument out of range or inconsistent with current state
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Time lock or withdraw switch blocks the operation
    #[error("Locked: {0}")]
    Locked(String),

    // === Access ===
    /// Caller lacks the role required for the action
    #[error("Unauthorized: {caller} may not {action}")]
    Unauthorized { caller: Address, action: String },

    // === Arithmetic ===
    /// Checked 256-bit arithmetic overflowed, underflowed or divided by zero
    #[error("Arithmetic overflow")]
    ArithmeticOverflow,
}

impl FarmError {
    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub(crate) fn invalid(what: impl Into<String>) -> Self {
        Self::InvalidParameter(what.into())
    }

    pub(crate) fn locked(what: impl Into<String>) -> Self {
        Self::Locked(what.into())
    }
}
