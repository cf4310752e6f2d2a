//! # Term-sheet vaults
//!
//! Fixed-term deposit products. Each vault keeps a list of term sheets whose
//! economics never change after registration; enabling or disabling a sheet
//! only gates new deposits.
//!
//! | Vault | Deposit | Pays |
//! |-------|---------|------|
//! | [`TermVault`] | any in-token | `amount * rate / 1e6` out-token, partly releasable early |
//! | [`RewardVault`] | one token | linear reward over the lock, principal at unlock |
//! | [`NftLockVault`] | NFT plus KING | `amount * king_factor / 1e6` KING at unlock |
//!
//! Time is in seconds. Every operation takes `now` explicitly.

pub mod king;
pub mod queen;
pub mod royal;

pub use king::{KingDeposit, KingReceipt, TermSheet, TermVault};
pub use queen::{QueenStake, RewardTerms, RewardVault};
pub use royal::{decode_stake_id, encode_stake_id, NftLockVault, NftStake, NftTerms};

use alloy_primitives::{Address, U256};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::error::{FarmError, Result};
use crate::math;
use crate::reward_source::{Payout, RewardSource};
use crate::LIMIT_FACTOR_SCALE;

pub(crate) const SECONDS_PER_HOUR: u64 = 3600;

/// Minimum deposit and the maximum as a multiple of it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositLimit {
    #[serde(with = "crate::amount")]
    pub min_amount: U256,
    /// Max amount is `min_amount * factor / 1e4`. Zero means unlimited.
    pub max_amount_factor: u64,
}

impl DepositLimit {
    pub fn new(min_amount: U256, max_amount_factor: u64) -> Self {
        Self { min_amount, max_amount_factor }
    }

    pub fn max_amount(&self) -> Result<Option<U256>> {
        if self.max_amount_factor == 0 {
            return Ok(None);
        }
        math::mul_div(
            self.min_amount,
            U256::from(self.max_amount_factor),
            U256::from(LIMIT_FACTOR_SCALE),
        )
        .map(Some)
    }

    pub fn check(&self, amount: U256) -> Result<()> {
        if amount < self.min_amount {
            return Err(FarmError::invalid(format!(
                "deposit {amount} below minimum {}",
                self.min_amount
            )));
        }
        if let Some(max) = self.max_amount()? {
            if amount > max {
                return Err(FarmError::invalid(format!("deposit {amount} above maximum {max}")));
            }
        }
        Ok(())
    }
}

/// Per-user id lists. Insertion order is kept and removal does not reorder
/// the remaining ids.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserIds<K: std::hash::Hash + Eq> {
    ids: IndexMap<Address, IndexSet<K>>,
}

impl<K: std::hash::Hash + Eq + Clone> UserIds<K> {
    pub fn new() -> Self {
        Self { ids: IndexMap::new() }
    }

    /// Returns false if the id was already listed
    pub fn insert(&mut self, user: Address, id: K) -> bool {
        self.ids.entry(user).or_default().insert(id)
    }

    pub fn remove(&mut self, user: &Address, id: &K) -> bool {
        let Some(set) = self.ids.get_mut(user) else {
            return false;
        };
        let removed = set.shift_remove(id);
        if set.is_empty() {
            self.ids.shift_remove(user);
        }
        removed
    }

    pub fn contains(&self, user: &Address, id: &K) -> bool {
        self.ids.get(user).is_some_and(|set| set.contains(id))
    }

    pub fn of(&self, user: &Address) -> Vec<K> {
        self.ids
            .get(user)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Reward sources keyed by the token they pay in
#[derive(Debug, Default)]
pub struct Treasury {
    sources: IndexMap<Address, Box<dyn RewardSource>>,
}

impl Treasury {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, token: Address, source: Box<dyn RewardSource>) {
        self.sources.insert(token, source);
    }

    fn source_mut(&mut self, token: &Address) -> Result<&mut Box<dyn RewardSource>> {
        self.sources
            .get_mut(token)
            .ok_or_else(|| FarmError::not_found(format!("treasury for token {token}")))
    }

    pub fn available(&self, token: &Address) -> Option<U256> {
        self.sources.get(token).and_then(|s| s.available())
    }

    pub fn distributed(&self, token: &Address) -> U256 {
        self.sources.get(token).map(|s| s.distributed()).unwrap_or(U256::ZERO)
    }

    pub fn fund(&mut self, token: &Address, amount: U256) -> Result<()> {
        self.source_mut(token)?.fund(amount)
    }

    /// Pay `amount` of `token` to `to`. A zero amount is a no-op.
    pub fn pay(&mut self, token: &Address, to: Address, amount: U256) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        self.source_mut(token)?.settle(&[Payout::new(to, amount)])
    }
}
