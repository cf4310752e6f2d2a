//! Pool registry.
//!
//! Pools are kept in insertion order and addressed by [`PoolId`]. The
//! registry maintains the total weight so every pool's share of emission is
//! `weight / total_weight`. Weight changes and new pools settle every pool
//! under the old total first.

use std::fmt;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::accumulator::{BonusAccumulator, RewardAccumulator};
use crate::emission::EmissionSchedule;
use crate::error::{FarmError, Result};
use crate::math;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(pub u32);

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pool#{}", self.0)
    }
}

/// Parameters for a new pool
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPool {
    /// LP token staked in the pool
    pub stake_token: Address,
    /// Slippage token for dual-stake pools
    #[serde(default)]
    pub secondary_token: Option<Address>,
    /// Allocation points
    pub weight: u64,
    /// Overrides the farm's default secondary multiplier
    #[serde(default, with = "crate::amount::option")]
    pub secondary_multiplier: Option<U256>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: PoolId,
    pub stake_token: Address,
    pub secondary_token: Option<Address>,
    /// Allocation points
    pub weight: u64,
    #[serde(with = "crate::amount")]
    pub secondary_multiplier: U256,
    /// Sum of primary (LP) amounts
    #[serde(with = "crate::amount")]
    pub total_primary: U256,
    /// Sum of secondary amounts
    #[serde(with = "crate::amount")]
    pub total_secondary: U256,
    /// Sum of position principals, the accumulator denominator
    #[serde(with = "crate::amount")]
    pub total_staked: U256,
    pub reward: RewardAccumulator,
    pub bonus: BonusAccumulator,
    /// Hold early harvests instead of charging a fee
    pub harvest_lock: bool,
    /// Withdraw switch, consulted under the pool-switch gate
    pub withdraw_enabled: bool,
    /// Reward tokens burned in favour of the pool
    #[serde(with = "crate::amount")]
    pub burned_reward: U256,
    /// Secondary tokens forfeited by withdrawing stakers
    #[serde(with = "crate::amount")]
    pub forfeited_secondary: U256,
}

impl Pool {
    /// Accumulator value at `now` without mutating the pool
    pub fn preview_acc(&self, schedule: &EmissionSchedule, total_weight: u64, now: u64) -> Result<U256> {
        let last = self.reward.last_reward_block;
        if now <= last || self.total_staked.is_zero() {
            return Ok(self.reward.acc_per_share);
        }
        let reward = schedule.pool_reward(last, now, self.weight, total_weight)?;
        self.reward.preview(reward, self.total_staked)
    }

    /// Fold emission up to `now` into the accumulator. Returns the reward
    /// credited. Idempotent for a repeated `now`.
    pub fn update(&mut self, schedule: &EmissionSchedule, total_weight: u64, now: u64) -> Result<U256> {
        let last = self.reward.last_reward_block;
        if now <= last {
            return Ok(U256::ZERO);
        }
        if self.total_staked.is_zero() {
            self.reward.last_reward_block = now;
            return Ok(U256::ZERO);
        }
        let reward = schedule.pool_reward(last, now, self.weight, total_weight)?;
        self.reward.accrue(reward, self.total_staked, now)?;
        debug!(pool = %self.id, from = last, to = now, reward = %reward, acc = %self.reward.acc_per_share, "pool updated");
        Ok(reward)
    }

    /// Replace this position's principal contribution in the pool totals
    pub(crate) fn restake(
        &mut self,
        old: (U256, U256, U256),
        new: (U256, U256, U256),
    ) -> Result<()> {
        self.total_primary = math::add(math::sub(self.total_primary, old.0)?, new.0)?;
        self.total_secondary = math::add(math::sub(self.total_secondary, old.1)?, new.1)?;
        self.total_staked = math::add(math::sub(self.total_staked, old.2)?, new.2)?;
        Ok(())
    }
}

/// Ordered pool collection with a cached total weight
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRegistry {
    pools: Vec<Pool>,
    total_weight: u64,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pool> {
        self.pools.iter()
    }

    pub fn get(&self, id: PoolId) -> Result<&Pool> {
        self.pools
            .get(id.0 as usize)
            .ok_or_else(|| FarmError::not_found(id.to_string()))
    }

    pub fn get_mut(&mut self, id: PoolId) -> Result<&mut Pool> {
        self.pools
            .get_mut(id.0 as usize)
            .ok_or_else(|| FarmError::not_found(id.to_string()))
    }

    /// Update one pool against the current total weight
    pub fn update_pool(&mut self, id: PoolId, schedule: &EmissionSchedule, now: u64) -> Result<U256> {
        let total_weight = self.total_weight;
        self.get_mut(id)?.update(schedule, total_weight, now)
    }

    /// Update every pool
    pub fn mass_update(&mut self, schedule: &EmissionSchedule, now: u64) -> Result<()> {
        let total_weight = self.total_weight;
        for pool in &mut self.pools {
            pool.update(schedule, total_weight, now)?;
        }
        Ok(())
    }

    /// Register a pool. Fails with `AlreadyExists` if its stake token is
    /// already farmed.
    pub fn add(
        &mut self,
        spec: NewPool,
        default_multiplier: U256,
        harvest_lock: bool,
        schedule: &EmissionSchedule,
        now: u64,
    ) -> Result<PoolId> {
        if self.pools.iter().any(|p| p.stake_token == spec.stake_token) {
            return Err(FarmError::AlreadyExists(format!("pool for token {}", spec.stake_token)));
        }
        let total_weight = self
            .total_weight
            .checked_add(spec.weight)
            .ok_or(FarmError::ArithmeticOverflow)?;
        let index = u32::try_from(self.pools.len()).map_err(|_| FarmError::ArithmeticOverflow)?;

        self.mass_update(schedule, now)?;

        let id = PoolId(index);
        self.pools.push(Pool {
            id,
            stake_token: spec.stake_token,
            secondary_token: spec.secondary_token,
            weight: spec.weight,
            secondary_multiplier: spec.secondary_multiplier.unwrap_or(default_multiplier),
            total_primary: U256::ZERO,
            total_secondary: U256::ZERO,
            total_staked: U256::ZERO,
            reward: RewardAccumulator::new(now.max(schedule.start_block)),
            bonus: BonusAccumulator::default(),
            harvest_lock,
            withdraw_enabled: false,
            burned_reward: U256::ZERO,
            forfeited_secondary: U256::ZERO,
        });
        self.total_weight = total_weight;
        info!(pool = %id, token = %spec.stake_token, weight = spec.weight, total_weight, "pool added");
        Ok(id)
    }

    /// Change a pool's allocation points
    pub fn set_weight(&mut self, id: PoolId, weight: u64, schedule: &EmissionSchedule, now: u64) -> Result<()> {
        let old = self.get(id)?.weight;
        let total_weight = (self.total_weight - old)
            .checked_add(weight)
            .ok_or(FarmError::ArithmeticOverflow)?;
        self.mass_update(schedule, now)?;
        self.get_mut(id)?.weight = weight;
        self.total_weight = total_weight;
        info!(pool = %id, old, new = weight, total_weight, "pool weight changed");
        Ok(())
    }
}
