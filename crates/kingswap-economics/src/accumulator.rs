//! Fixed-point reward-per-share accumulator.
//!
//! `acc_per_share` is scaled by [`ACC_PRECISION`] and only ever grows by
//! `reward * ACC_PRECISION / total_staked`. A position's entitlement is
//! `principal * acc_per_share / ACC_PRECISION`; subtracting the debt recorded
//! at the last principal change gives what accrued since.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::math;
use crate::ACC_PRECISION;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardAccumulator {
    /// Accumulated reward per staked unit, scaled by `ACC_PRECISION`
    #[serde(with = "crate::amount")]
    pub acc_per_share: U256,
    /// Block up to which rewards have been folded in
    pub last_reward_block: u64,
}

impl RewardAccumulator {
    pub fn new(checkpoint: u64) -> Self {
        Self {
            acc_per_share: U256::ZERO,
            last_reward_block: checkpoint,
        }
    }

    /// Per-share increase for `reward` spread over `total_staked`
    pub fn increment(reward: U256, total_staked: U256) -> Result<U256> {
        if total_staked.is_zero() {
            return Ok(U256::ZERO);
        }
        math::mul_div(reward, U256::from(ACC_PRECISION), total_staked)
    }

    /// Fold `reward` in and move the checkpoint to `now`. With nothing staked
    /// only the checkpoint moves and the reward is dropped.
    pub fn accrue(&mut self, reward: U256, total_staked: U256, now: u64) -> Result<()> {
        let inc = Self::increment(reward, total_staked)?;
        self.acc_per_share = math::add(self.acc_per_share, inc)?;
        self.last_reward_block = now;
        Ok(())
    }

    /// Value `acc_per_share` would take after folding `reward` in
    pub fn preview(&self, reward: U256, total_staked: U256) -> Result<U256> {
        math::add(self.acc_per_share, Self::increment(reward, total_staked)?)
    }
}

/// `principal * acc / ACC_PRECISION`
pub fn entitlement(principal: U256, acc_per_share: U256) -> Result<U256> {
    math::mul_div(principal, acc_per_share, U256::from(ACC_PRECISION))
}

/// Accumulator for a secondary reward token pushed in by the operator
/// rather than emitted per block.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusAccumulator {
    #[serde(with = "crate::amount")]
    pub acc_per_share: U256,
    /// Total bonus tokens credited to the pool
    #[serde(with = "crate::amount")]
    pub distributed: U256,
}

impl BonusAccumulator {
    pub fn credit(&mut self, amount: U256, total_staked: U256) -> Result<()> {
        let inc = RewardAccumulator::increment(amount, total_staked)?;
        self.acc_per_share = math::add(self.acc_per_share, inc)?;
        self.distributed = math::add(self.distributed, amount)?;
        Ok(())
    }
}
