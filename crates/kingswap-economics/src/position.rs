//! Per (user, pool) stake records and the harvest rule.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::accumulator::entitlement;
use crate::config::HarvestPolicy;
use crate::error::Result;
use crate::math;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// LP units staked
    #[serde(with = "crate::amount")]
    pub primary: U256,
    /// Slippage-token units staked
    #[serde(with = "crate::amount")]
    pub secondary: U256,
    /// Weighted composite of the two amounts
    #[serde(with = "crate::amount")]
    pub principal: U256,
    /// `principal * acc / ACC_PRECISION` at the last principal change
    #[serde(with = "crate::amount")]
    pub reward_debt: U256,
    /// Reward held back by the harvest lock
    #[serde(with = "crate::amount")]
    pub unpaid_reward: U256,
    /// Block of the last reward payout
    pub last_harvest_block: u64,
    /// Debt against the bonus accumulator
    #[serde(with = "crate::amount")]
    pub bonus_debt: U256,
}

impl Position {
    pub fn opened_at(block: u64) -> Self {
        Self {
            last_harvest_block: block,
            ..Self::default()
        }
    }

    /// Newly accrued reward, excluding what the lock is holding
    pub fn accrued(&self, acc_per_share: U256) -> Result<U256> {
        math::sub(entitlement(self.principal, acc_per_share)?, self.reward_debt)
    }

    /// Everything claimable: accrued plus held back
    pub fn pending(&self, acc_per_share: U256) -> Result<U256> {
        math::add(self.accrued(acc_per_share)?, self.unpaid_reward)
    }

    pub fn pending_bonus(&self, bonus_acc: U256) -> Result<U256> {
        math::sub(entitlement(self.principal, bonus_acc)?, self.bonus_debt)
    }

    /// Rewrite both debts after a principal change
    pub fn checkpoint(&mut self, acc_per_share: U256, bonus_acc: U256) -> Result<()> {
        self.reward_debt = entitlement(self.principal, acc_per_share)?;
        self.bonus_debt = entitlement(self.principal, bonus_acc)?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_zero() && self.secondary.is_zero() && self.unpaid_reward.is_zero()
    }

    pub(crate) fn stake_tuple(&self) -> (U256, U256, U256) {
        (self.primary, self.secondary, self.principal)
    }
}

/// Result of applying the harvest rule to a pending amount
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestOutcome {
    /// Paid to the staker
    #[serde(with = "crate::amount")]
    pub paid: U256,
    /// Paid to the reward fee receiver
    #[serde(with = "crate::amount")]
    pub fee: U256,
    /// Held back in the position
    #[serde(with = "crate::amount")]
    pub held: U256,
}

/// Decide what happens to `pending` at `now`.
///
/// Past the interval the whole amount is paid. Inside it a locked pool holds
/// the amount, an unlocked one pays it minus the early-harvest fee. Any
/// payout restarts the interval.
pub fn apply_harvest(
    position: &mut Position,
    pending: U256,
    policy: &HarvestPolicy,
    pool_locked: bool,
    now: u64,
) -> Result<HarvestOutcome> {
    if pending.is_zero() {
        position.unpaid_reward = U256::ZERO;
        return Ok(HarvestOutcome::default());
    }
    let due = now >= position.last_harvest_block.saturating_add(policy.interval);
    if due {
        position.unpaid_reward = U256::ZERO;
        position.last_harvest_block = now;
        return Ok(HarvestOutcome { paid: pending, ..Default::default() });
    }
    if pool_locked {
        position.unpaid_reward = pending;
        return Ok(HarvestOutcome { held: pending, ..Default::default() });
    }
    let fee = math::percent_of(pending, policy.early_fee_percent)?;
    position.unpaid_reward = U256::ZERO;
    position.last_harvest_block = now;
    Ok(HarvestOutcome {
        paid: math::sub(pending, fee)?,
        fee,
        held: U256::ZERO,
    })
}
