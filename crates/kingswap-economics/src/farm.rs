//! # Farm Engine
//!
//! Parameterized reward-accrual engine for LP farms. One [`Farm`] covers the
//! dual-stream farm with harvest lock, the slippage-token farm and the
//! co-staking farm with a bonus token. The differences come from
//! [`FarmConfig`].
//!
//! ## Principal change
//!
//! ```text
//! update pool -> pending = principal * acc / S - debt + held
//!             -> harvest rule (pay / hold / pay minus fee)
//!             -> bonus payout
//!             -> apply stake delta, recompute principal
//!             -> debt = principal * acc / S
//! ```
//!
//! ## Concurrency
//!
//! State sits behind one `RwLock`. A mutation clones the state, works on the
//! copy, settles the reward payouts and only then swaps the copy in, so a
//! failing call leaves nothing behind. Queries take the read lock.

use alloy_primitives::{Address, U256};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::{AdminSet, Authorizer, Role};
use crate::config::{
    check_percent, FarmConfig, FeeReceivers, HarvestPolicy, SecondaryExit, StakeMode, WithdrawGate,
};
use crate::emission::EmissionSchedule;
use crate::error::{FarmError, Result};
use crate::math;
use crate::pool::{NewPool, Pool, PoolId, PoolRegistry};
use crate::position::{apply_harvest, HarvestOutcome, Position};
use crate::reward_source::{self, Payout, RewardSource};

/// Mutable farm-wide parameters
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmSettings {
    pub stake: StakeMode,
    pub withdraw_gate: WithdrawGate,
    pub harvest: HarvestPolicy,
    pub withdraw_fee_percent: u8,
    pub bonus_fee_percent: u8,
    #[serde(with = "crate::amount")]
    pub default_secondary_multiplier: U256,
    pub fee_receivers: FeeReceivers,
}

impl From<&FarmConfig> for FarmSettings {
    fn from(config: &FarmConfig) -> Self {
        Self {
            stake: config.stake,
            withdraw_gate: config.withdraw_gate,
            harvest: config.harvest.clone(),
            withdraw_fee_percent: config.withdraw_fee_percent,
            bonus_fee_percent: config.bonus_fee_percent,
            default_secondary_multiplier: config.default_secondary_multiplier,
            fee_receivers: config.fee_receivers.clone(),
        }
    }
}

/// Token amounts split by component
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeAmounts {
    #[serde(with = "crate::amount")]
    pub primary: U256,
    #[serde(with = "crate::amount")]
    pub secondary: U256,
}

/// Everything a deposit, withdrawal or harvest moved. The host performs the
/// stake and bonus token transfers; reward payouts are already settled.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub pool: PoolId,
    pub user: Address,
    pub block: u64,
    /// Reward token outcome
    pub harvest: HarvestOutcome,
    /// Bonus token paid to the user
    #[serde(with = "crate::amount")]
    pub bonus_paid: U256,
    /// Bonus token paid to the bonus fee receiver
    #[serde(with = "crate::amount")]
    pub bonus_fee: U256,
    /// Stake taken from the user
    pub deposited: StakeAmounts,
    /// Stake returned to the user
    pub returned: StakeAmounts,
    /// Stake sent to the withdraw fee receiver
    pub stake_fee: StakeAmounts,
    /// Secondary tokens kept by the farm
    #[serde(with = "crate::amount")]
    pub secondary_forfeited: U256,
    /// Reward given up by an emergency withdrawal
    #[serde(with = "crate::amount")]
    pub reward_forfeited: U256,
    /// Bonus tokens given up by an emergency withdrawal
    #[serde(with = "crate::amount")]
    pub bonus_forfeited: U256,
    /// Principal after the call
    #[serde(with = "crate::amount")]
    pub principal: U256,
}

/// Claimable amounts for one position
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReward {
    #[serde(with = "crate::amount")]
    pub reward: U256,
    #[serde(with = "crate::amount")]
    pub bonus: U256,
}

/// Record of a burn in favour of a pool
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnReceipt {
    pub user: Address,
    pub pool: PoolId,
    #[serde(with = "crate::amount")]
    pub amount: U256,
    #[serde(with = "crate::amount")]
    pub pool_total: U256,
}

#[derive(Clone, Copy, Debug)]
enum StakeChange {
    Deposit { primary: U256, secondary: U256 },
    Withdraw { primary: U256, secondary: U256 },
    Harvest,
}

#[derive(Clone, Debug)]
struct FarmState {
    schedule: EmissionSchedule,
    pools: PoolRegistry,
    positions: IndexMap<(PoolId, Address), Position>,
    settings: FarmSettings,
}

impl FarmState {
    fn check_withdraw_gate(&self, pool: &Pool) -> Result<()> {
        if self.settings.withdraw_gate == WithdrawGate::PoolSwitch && !pool.withdraw_enabled {
            return Err(FarmError::locked(format!("withdrawals disabled for {}", pool.id)));
        }
        Ok(())
    }

    fn validate_change(&self, pool: &Pool, pos: &Position, change: StakeChange) -> Result<()> {
        let dual = self.settings.stake.is_dual();
        match change {
            StakeChange::Deposit { primary, secondary } => {
                if !dual && !secondary.is_zero() {
                    return Err(FarmError::invalid(format!("{} takes no secondary stake", pool.id)));
                }
                let new_primary = math::add(pos.primary, primary)?;
                if new_primary.is_zero() && !secondary.is_zero() {
                    return Err(FarmError::invalid("secondary stake requires a primary stake"));
                }
            }
            StakeChange::Withdraw { primary, secondary } => {
                self.check_withdraw_gate(pool)?;
                if primary > pos.primary {
                    return Err(FarmError::InsufficientStake { requested: primary, available: pos.primary });
                }
                match self.settings.stake.secondary_exit() {
                    Some(SecondaryExit::Return) => {
                        if secondary > pos.secondary {
                            return Err(FarmError::InsufficientStake {
                                requested: secondary,
                                available: pos.secondary,
                            });
                        }
                    }
                    Some(SecondaryExit::Forfeit) | None => {
                        if !secondary.is_zero() {
                            return Err(FarmError::invalid(format!(
                                "secondary stake of {} cannot be withdrawn",
                                pool.id
                            )));
                        }
                    }
                }
            }
            StakeChange::Harvest => {}
        }
        Ok(())
    }

    /// Update the pool, harvest, apply the change and rewrite the debt
    fn touch(
        &mut self,
        pool_id: PoolId,
        user: Address,
        change: StakeChange,
        now: u64,
    ) -> Result<(Receipt, Vec<Payout>)> {
        let key = (pool_id, user);
        let mut pos = match (self.positions.get(&key), change) {
            (Some(p), _) => p.clone(),
            (None, StakeChange::Harvest) => {
                return Err(FarmError::not_found(format!("position of {user} in {pool_id}")));
            }
            (None, _) => Position::opened_at(now),
        };
        self.validate_change(self.pools.get(pool_id)?, &pos, change)?;

        self.pools.update_pool(pool_id, &self.schedule, now)?;
        let settings = &self.settings;
        let pool = self.pools.get_mut(pool_id)?;
        let acc = pool.reward.acc_per_share;
        let bonus_acc = pool.bonus.acc_per_share;

        let pending = pos.pending(acc)?;
        let harvest = apply_harvest(&mut pos, pending, &settings.harvest, pool.harvest_lock, now)?;
        if !harvest.held.is_zero() {
            warn!(pool = %pool_id, %user, held = %harvest.held, "harvest inside interval held back");
        }
        let bonus_pending = pos.pending_bonus(bonus_acc)?;
        let bonus_fee = math::percent_of(bonus_pending, settings.bonus_fee_percent)?;
        let bonus_paid = math::sub(bonus_pending, bonus_fee)?;

        let mut receipt = Receipt {
            pool: pool_id,
            user,
            block: now,
            bonus_paid,
            bonus_fee,
            ..Receipt::default()
        };

        let old = pos.stake_tuple();
        match change {
            StakeChange::Deposit { primary, secondary } => {
                pos.primary = math::add(pos.primary, primary)?;
                pos.secondary = math::add(pos.secondary, secondary)?;
                receipt.deposited = StakeAmounts { primary, secondary };
            }
            StakeChange::Withdraw { primary, secondary } => {
                pos.primary = math::sub(pos.primary, primary)?;
                let fee_primary = math::percent_of(primary, settings.withdraw_fee_percent)?;
                receipt.stake_fee.primary = fee_primary;
                receipt.returned.primary = math::sub(primary, fee_primary)?;
                match settings.stake.secondary_exit() {
                    Some(SecondaryExit::Forfeit) if !primary.is_zero() => {
                        receipt.secondary_forfeited = pos.secondary;
                        pool.forfeited_secondary = math::add(pool.forfeited_secondary, pos.secondary)?;
                        pos.secondary = U256::ZERO;
                    }
                    Some(SecondaryExit::Return) => {
                        pos.secondary = math::sub(pos.secondary, secondary)?;
                        let fee_secondary = math::percent_of(secondary, settings.withdraw_fee_percent)?;
                        receipt.stake_fee.secondary = fee_secondary;
                        receipt.returned.secondary = math::sub(secondary, fee_secondary)?;
                    }
                    _ => {}
                }
            }
            StakeChange::Harvest => {}
        }

        pos.principal = settings.stake.principal(pos.primary, pos.secondary, pool.secondary_multiplier)?;
        pool.restake(old, pos.stake_tuple())?;
        pos.checkpoint(acc, bonus_acc)?;
        receipt.principal = pos.principal;

        let mut payouts = Vec::with_capacity(2);
        if !harvest.paid.is_zero() {
            payouts.push(Payout::new(user, harvest.paid));
        }
        if !harvest.fee.is_zero() {
            payouts.push(Payout::new(settings.fee_receivers.reward, harvest.fee));
        }
        receipt.harvest = harvest;

        if pos.is_empty() {
            self.positions.shift_remove(&key);
        } else {
            self.positions.insert(key, pos);
        }
        Ok((receipt, payouts))
    }

    fn emergency_withdraw(&mut self, pool_id: PoolId, user: Address, now: u64) -> Result<Receipt> {
        let key = (pool_id, user);
        let total_weight = self.pools.total_weight();
        let pool = self.pools.get(pool_id)?;
        self.check_withdraw_gate(pool)?;
        let pos = match self.positions.get(&key) {
            Some(p) if !(p.primary.is_zero() && p.secondary.is_zero()) => p.clone(),
            _ => {
                return Err(FarmError::InsufficientStake {
                    requested: U256::ZERO,
                    available: U256::ZERO,
                })
            }
        };
        let acc = pool.preview_acc(&self.schedule, total_weight, now)?;
        let reward_forfeited = pos.pending(acc)?;
        let bonus_forfeited = pos.pending_bonus(pool.bonus.acc_per_share)?;

        let fee_pct = self.settings.withdraw_fee_percent;
        let exit = self.settings.stake.secondary_exit();
        let pool = self.pools.get_mut(pool_id)?;
        pool.restake(pos.stake_tuple(), (U256::ZERO, U256::ZERO, U256::ZERO))?;

        let mut receipt = Receipt {
            pool: pool_id,
            user,
            block: now,
            reward_forfeited,
            bonus_forfeited,
            ..Receipt::default()
        };
        receipt.stake_fee.primary = math::percent_of(pos.primary, fee_pct)?;
        receipt.returned.primary = math::sub(pos.primary, receipt.stake_fee.primary)?;
        match exit {
            Some(SecondaryExit::Return) => {
                receipt.stake_fee.secondary = math::percent_of(pos.secondary, fee_pct)?;
                receipt.returned.secondary = math::sub(pos.secondary, receipt.stake_fee.secondary)?;
            }
            _ => {
                receipt.secondary_forfeited = pos.secondary;
                pool.forfeited_secondary = math::add(pool.forfeited_secondary, pos.secondary)?;
            }
        }
        self.positions.shift_remove(&key);
        Ok(receipt)
    }

    fn pending(&self, pool_id: PoolId, user: &Address, now: u64) -> Result<PendingReward> {
        let pool = self.pools.get(pool_id)?;
        let Some(pos) = self.positions.get(&(pool_id, *user)) else {
            return Ok(PendingReward::default());
        };
        let acc = pool.preview_acc(&self.schedule, self.pools.total_weight(), now)?;
        Ok(PendingReward {
            reward: pos.pending(acc)?,
            bonus: pos.pending_bonus(pool.bonus.acc_per_share)?,
        })
    }

    /// Rewards owed to stakers plus everything the schedule still emits from
    /// `now`. Pools must be updated to `now`.
    fn obligations(&self, now: u64) -> Result<U256> {
        let mut owed = U256::ZERO;
        for ((pool_id, _), pos) in &self.positions {
            let acc = self.pools.get(*pool_id)?.reward.acc_per_share;
            owed = math::add(owed, pos.pending(acc)?)?;
        }
        let end = self.schedule.end_block().max(now);
        math::add(owed, self.schedule.reward_units(now, end)?)
    }

    fn check_funding(&self, source: &dyn RewardSource, now: u64) -> Result<()> {
        let Some(available) = source.available() else {
            return Ok(());
        };
        let required = self.obligations(now)?;
        if required > available {
            warn!(required = %required, available = %available, "schedule change exceeds reward funding");
            return Err(FarmError::invalid(format!(
                "schedule needs {required} reward units but the source holds {available}"
            )));
        }
        Ok(())
    }
}

struct Inner<A> {
    state: FarmState,
    source: Box<dyn RewardSource>,
    auth: A,
}

impl<A: Authorizer> Inner<A> {
    /// Run `f` on a copy of the state, settle its payouts, then commit
    fn transact<T>(
        &mut self,
        f: impl FnOnce(&mut FarmState, &dyn RewardSource) -> Result<(T, Vec<Payout>)>,
    ) -> Result<T> {
        let mut working = self.state.clone();
        let (out, payouts) = f(&mut working, self.source.as_ref())?;
        if !payouts.is_empty() {
            self.source.settle(&payouts)?;
        }
        self.state = working;
        Ok(out)
    }

    fn admin<T>(
        &mut self,
        caller: &Address,
        role: Role,
        action: &str,
        f: impl FnOnce(&mut FarmState, &dyn RewardSource) -> Result<T>,
    ) -> Result<T> {
        self.auth.check(caller, role, action)?;
        self.transact(|state, source| Ok((f(state, source)?, Vec::new())))
    }
}

/// Farm engine instance
pub struct Farm<A = AdminSet> {
    inner: RwLock<Inner<A>>,
}

impl Farm<AdminSet> {
    /// Build a farm with the reward source and roles named in `config`
    pub fn from_config(config: &FarmConfig) -> Result<Self> {
        let auth = AdminSet::from(&config.roles);
        Self::with_parts(config, reward_source::from_config(&config.reward_source), auth)
    }

    /// Hand the admin role to another account. Owner only.
    pub fn set_admin(&self, caller: &Address, admin: Address) -> Result<()> {
        let mut inner = self.inner.write();
        inner.auth.set_admin(caller, admin)?;
        info!(%admin, "admin replaced");
        Ok(())
    }

    pub fn roles(&self) -> AdminSet {
        self.inner.read().auth.clone()
    }
}

impl<A: Authorizer> Farm<A> {
    /// Build a farm with an explicit reward source and authorizer
    pub fn with_parts(config: &FarmConfig, source: Box<dyn RewardSource>, auth: A) -> Result<Self> {
        config.validate()?;
        info!(
            start = config.schedule.start_block,
            end = config.schedule.end_block(),
            streams = config.schedule.streams.len(),
            "farm created"
        );
        Ok(Self {
            inner: RwLock::new(Inner {
                state: FarmState {
                    schedule: config.schedule.clone(),
                    pools: PoolRegistry::new(),
                    positions: IndexMap::new(),
                    settings: FarmSettings::from(config),
                },
                source,
                auth,
            }),
        })
    }

    // === Staking ===

    /// Stake `primary` LP units and `secondary` slippage-token units
    pub fn deposit(&self, user: Address, pool: PoolId, primary: U256, secondary: U256, now: u64) -> Result<Receipt> {
        let receipt = self
            .inner
            .write()
            .transact(|s, _| s.touch(pool, user, StakeChange::Deposit { primary, secondary }, now))?;
        debug!(%pool, %user, %primary, %secondary, paid = %receipt.harvest.paid, "deposit");
        Ok(receipt)
    }

    /// Unstake. Under the forfeit rule `secondary` must be zero and the whole
    /// secondary stake is dropped whenever `primary` is non-zero.
    pub fn withdraw(&self, user: Address, pool: PoolId, primary: U256, secondary: U256, now: u64) -> Result<Receipt> {
        let receipt = self
            .inner
            .write()
            .transact(|s, _| s.touch(pool, user, StakeChange::Withdraw { primary, secondary }, now))?;
        debug!(%pool, %user, %primary, %secondary, paid = %receipt.harvest.paid, "withdraw");
        Ok(receipt)
    }

    /// Claim rewards without changing the stake
    pub fn harvest(&self, user: Address, pool: PoolId, now: u64) -> Result<Receipt> {
        self.inner
            .write()
            .transact(|s, _| s.touch(pool, user, StakeChange::Harvest, now))
    }

    /// Return the stake, give up every pending reward and bonus. Leaves both
    /// pool accumulators untouched.
    pub fn emergency_withdraw(&self, user: Address, pool: PoolId, now: u64) -> Result<Receipt> {
        let receipt = self
            .inner
            .write()
            .transact(|s, _| Ok((s.emergency_withdraw(pool, user, now)?, Vec::new())))?;
        warn!(
            %pool,
            %user,
            forfeited = %receipt.reward_forfeited,
            bonus_forfeited = %receipt.bonus_forfeited,
            "emergency withdraw"
        );
        Ok(receipt)
    }

    /// Record reward tokens the caller burned in favour of `pool`
    pub fn burn_reward_for_pool(&self, user: Address, pool: PoolId, amount: U256) -> Result<BurnReceipt> {
        self.inner.write().transact(|s, _| {
            let p = s.pools.get_mut(pool)?;
            p.burned_reward = math::add(p.burned_reward, amount)?;
            info!(%pool, %user, %amount, total = %p.burned_reward, "reward burned for pool");
            Ok((
                BurnReceipt { user, pool, amount, pool_total: p.burned_reward },
                Vec::new(),
            ))
        })
    }

    // === Administration ===

    pub fn add_pool(&self, caller: &Address, spec: NewPool, now: u64) -> Result<PoolId> {
        self.inner.write().admin(caller, Role::Admin, "add pool", |s, _| {
            let dual = s.settings.stake.is_dual();
            if dual != spec.secondary_token.is_some() {
                return Err(FarmError::invalid(if dual {
                    "pool needs a secondary token"
                } else {
                    "pool takes no secondary token"
                }));
            }
            let lock = s.settings.harvest.lock_by_default;
            let multiplier = s.settings.default_secondary_multiplier;
            s.pools.add(spec, multiplier, lock, &s.schedule, now)
        })
    }

    pub fn set_weight(&self, caller: &Address, pool: PoolId, weight: u64, now: u64) -> Result<()> {
        self.inner
            .write()
            .admin(caller, Role::Admin, "set pool weight", |s, _| s.pools.set_weight(pool, weight, &s.schedule, now))
    }

    /// Change a stream's per-block reward. Every pool is settled at the old
    /// rate first.
    pub fn set_reward_per_block(&self, caller: &Address, stream: usize, rate: U256, now: u64) -> Result<()> {
        self.inner.write().admin(caller, Role::Admin, "set reward per block", |s, source| {
            s.pools.mass_update(&s.schedule, now)?;
            s.schedule.set_reward_per_block(stream, rate)?;
            s.check_funding(source, now)?;
            info!(stream, %rate, "reward per block changed");
            Ok(())
        })
    }

    /// Move a phase boundary. Every pool is settled under the old layout first.
    pub fn set_phase_end(&self, caller: &Address, stream: usize, phase: usize, end: u64, now: u64) -> Result<()> {
        self.inner.write().admin(caller, Role::Admin, "set phase end", |s, source| {
            s.pools.mass_update(&s.schedule, now)?;
            s.schedule.set_phase_end(stream, phase, end, now)?;
            s.check_funding(source, now)?;
            info!(stream, phase, end, "phase end changed");
            Ok(())
        })
    }

    /// Stop a stream at `end`, or stretch its last phase to `end`
    pub fn set_stream_end(&self, caller: &Address, stream: usize, end: u64, now: u64) -> Result<()> {
        self.inner.write().admin(caller, Role::Admin, "set stream end", |s, source| {
            s.pools.mass_update(&s.schedule, now)?;
            s.schedule.set_stream_end(stream, end, now)?;
            s.check_funding(source, now)?;
            info!(stream, end, "stream end changed");
            Ok(())
        })
    }

    pub fn set_harvest_interval(&self, caller: &Address, interval: u64) -> Result<()> {
        self.inner.write().admin(caller, Role::Owner, "set harvest interval", |s, _| {
            s.settings.harvest.interval = interval;
            info!(interval, "harvest interval changed");
            Ok(())
        })
    }

    pub fn set_early_harvest_fee_percent(&self, caller: &Address, percent: u8) -> Result<()> {
        self.inner.write().admin(caller, Role::Admin, "set early harvest fee", |s, _| {
            check_percent("early harvest fee", percent)?;
            s.settings.harvest.early_fee_percent = percent;
            Ok(())
        })
    }

    pub fn set_withdraw_fee_percent(&self, caller: &Address, percent: u8) -> Result<()> {
        self.inner.write().admin(caller, Role::Owner, "set withdraw fee", |s, _| {
            check_percent("withdraw fee", percent)?;
            s.settings.withdraw_fee_percent = percent;
            Ok(())
        })
    }

    pub fn set_bonus_fee_percent(&self, caller: &Address, percent: u8) -> Result<()> {
        self.inner.write().admin(caller, Role::Owner, "set bonus fee", |s, _| {
            check_percent("bonus fee", percent)?;
            s.settings.bonus_fee_percent = percent;
            Ok(())
        })
    }

    pub fn set_fee_receivers(&self, caller: &Address, receivers: FeeReceivers) -> Result<()> {
        self.inner.write().admin(caller, Role::Owner, "set fee receivers", |s, _| {
            s.settings.fee_receivers = receivers;
            Ok(())
        })
    }

    pub fn set_harvest_lock(&self, caller: &Address, pool: PoolId, locked: bool) -> Result<()> {
        self.inner.write().admin(caller, Role::Admin, "set harvest lock", |s, _| {
            s.pools.get_mut(pool)?.harvest_lock = locked;
            Ok(())
        })
    }

    pub fn set_withdraw_enabled(&self, caller: &Address, pool: PoolId, enabled: bool) -> Result<()> {
        self.inner.write().admin(caller, Role::Admin, "set withdraw switch", |s, _| {
            s.pools.get_mut(pool)?.withdraw_enabled = enabled;
            Ok(())
        })
    }

    /// New multiplier applies to each position at its next touch
    pub fn set_secondary_multiplier(&self, caller: &Address, pool: PoolId, multiplier: U256) -> Result<()> {
        self.inner.write().admin(caller, Role::Admin, "set secondary multiplier", |s, _| {
            s.pools.get_mut(pool)?.secondary_multiplier = multiplier;
            Ok(())
        })
    }

    /// Spread `amount` bonus tokens over the pool's current stakers
    pub fn distribute_bonus(&self, caller: &Address, pool: PoolId, amount: U256) -> Result<()> {
        self.inner.write().admin(caller, Role::Admin, "distribute bonus", |s, _| {
            let p = s.pools.get_mut(pool)?;
            if p.total_staked.is_zero() {
                return Err(FarmError::invalid(format!("{pool} has no stake to credit a bonus to")));
            }
            p.bonus.credit(amount, p.total_staked)?;
            debug!(%pool, %amount, acc = %p.bonus.acc_per_share, "bonus distributed");
            Ok(())
        })
    }

    /// Top up a prefunded reward source
    pub fn fund(&self, amount: U256) -> Result<()> {
        self.inner.write().source.fund(amount)
    }

    // === Queries ===

    pub fn pending(&self, pool: PoolId, user: &Address, now: u64) -> Result<PendingReward> {
        self.inner.read().state.pending(pool, user, now)
    }

    pub fn multiplier(&self, from: u64, to: u64) -> Result<u64> {
        self.inner.read().state.schedule.multiplier(from, to)
    }

    pub fn stream_multipliers(&self, from: u64, to: u64) -> Result<Vec<u64>> {
        self.inner.read().state.schedule.multipliers(from, to)
    }

    pub fn reward_units(&self, from: u64, to: u64) -> Result<U256> {
        self.inner.read().state.schedule.reward_units(from, to)
    }

    pub fn reward_rate_at(&self, block: u64) -> Result<U256> {
        self.inner.read().state.schedule.reward_rate_at(block)
    }

    pub fn schedule(&self) -> EmissionSchedule {
        self.inner.read().state.schedule.clone()
    }

    pub fn settings(&self) -> FarmSettings {
        self.inner.read().state.settings.clone()
    }

    pub fn pool(&self, pool: PoolId) -> Result<Pool> {
        self.inner.read().state.pools.get(pool).cloned()
    }

    pub fn pools(&self) -> Vec<Pool> {
        self.inner.read().state.pools.iter().cloned().collect()
    }

    pub fn pool_count(&self) -> usize {
        self.inner.read().state.pools.len()
    }

    pub fn total_weight(&self) -> u64 {
        self.inner.read().state.pools.total_weight()
    }

    pub fn position(&self, pool: PoolId, user: &Address) -> Option<Position> {
        self.inner.read().state.positions.get(&(pool, *user)).cloned()
    }

    /// Remaining reward capacity, `None` when minting without a cap
    pub fn reward_available(&self) -> Option<U256> {
        self.inner.read().source.available()
    }

    pub fn reward_distributed(&self) -> U256 {
        self.inner.read().source.distributed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emission::{EmissionStream, Phase};

    fn addr(b: u8) -> Address {
        Address::with_last_byte(b)
    }

    const ADMIN: u8 = 0xAD;
    const OWNER: u8 = 0x0E;

    fn single_farm(start: u64) -> Farm {
        let schedule = EmissionSchedule::new(
            start,
            vec![EmissionStream::new("king", U256::from(10), vec![Phase { end: start + 1000, weight: 1 }])],
        )
        .unwrap();
        let cfg = FarmConfig::king_uni(start)
            .with_schedule(schedule)
            .with_roles(addr(OWNER), addr(ADMIN));
        let cfg = FarmConfig { reward_source: crate::RewardSourceConfig::Mint { cap: None }, ..cfg };
        Farm::from_config(&cfg).unwrap()
    }

    fn lp_pool(token: u8, weight: u64) -> NewPool {
        NewPool { stake_token: addr(token), secondary_token: None, weight, secondary_multiplier: None }
    }

    #[test]
    fn test_pending_zero_after_touch() {
        let farm = single_farm(0);
        let pool = farm.add_pool(&addr(ADMIN), lp_pool(1, 1), 0).unwrap();
        farm.deposit(addr(1), pool, U256::from(100), U256::ZERO, 10).unwrap();
        assert_eq!(farm.pending(pool, &addr(1), 20).unwrap().reward, U256::from(100));
        let r = farm.deposit(addr(1), pool, U256::from(1), U256::ZERO, 20).unwrap();
        assert_eq!(r.harvest.paid, U256::from(100));
        assert_eq!(farm.pending(pool, &addr(1), 20).unwrap().reward, U256::ZERO);
    }

    #[test]
    fn test_harvest_is_idempotent_in_same_block() {
        let farm = single_farm(0);
        let pool = farm.add_pool(&addr(ADMIN), lp_pool(1, 1), 0).unwrap();
        farm.deposit(addr(1), pool, U256::from(10), U256::ZERO, 0).unwrap();
        let first = farm.harvest(addr(1), pool, 50).unwrap();
        let second = farm.harvest(addr(1), pool, 50).unwrap();
        assert_eq!(first.harvest.paid, U256::from(500));
        assert_eq!(second.harvest.paid, U256::ZERO);
        assert_eq!(farm.reward_distributed(), U256::from(500));
    }

    #[test]
    fn test_withdraw_more_than_staked() {
        let farm = single_farm(0);
        let pool = farm.add_pool(&addr(ADMIN), lp_pool(1, 1), 0).unwrap();
        farm.deposit(addr(1), pool, U256::from(10), U256::ZERO, 0).unwrap();
        let err = farm.withdraw(addr(1), pool, U256::from(11), U256::ZERO, 5).unwrap_err();
        assert_eq!(err, FarmError::InsufficientStake { requested: U256::from(11), available: U256::from(10) });
        // nothing committed
        assert_eq!(farm.position(pool, &addr(1)).unwrap().primary, U256::from(10));
        assert_eq!(farm.pool(pool).unwrap().reward.last_reward_block, 0);
    }

    #[test]
    fn test_full_withdraw_removes_position() {
        let farm = single_farm(0);
        let pool = farm.add_pool(&addr(ADMIN), lp_pool(1, 1), 0).unwrap();
        farm.deposit(addr(1), pool, U256::from(10), U256::ZERO, 0).unwrap();
        let r = farm.withdraw(addr(1), pool, U256::from(10), U256::ZERO, 4).unwrap();
        assert_eq!(r.returned.primary, U256::from(10));
        assert_eq!(r.harvest.paid, U256::from(40));
        assert!(farm.position(pool, &addr(1)).is_none());
        assert_eq!(farm.pool(pool).unwrap().total_staked, U256::ZERO);
    }

    #[test]
    fn test_harvest_without_position() {
        let farm = single_farm(0);
        let pool = farm.add_pool(&addr(ADMIN), lp_pool(1, 1), 0).unwrap();
        assert!(matches!(farm.harvest(addr(9), pool, 3), Err(FarmError::NotFound(_))));
        assert!(matches!(farm.deposit(addr(9), PoolId(7), U256::from(1), U256::ZERO, 3), Err(FarmError::NotFound(_))));
    }

    #[test]
    fn test_admin_only() {
        let farm = single_farm(0);
        let err = farm.add_pool(&addr(1), lp_pool(1, 1), 0).unwrap_err();
        assert!(matches!(err, FarmError::Unauthorized { .. }));
        assert!(farm.set_harvest_interval(&addr(ADMIN), 5).is_err());
        farm.set_harvest_interval(&addr(OWNER), 5).unwrap();
        farm.set_admin(&addr(OWNER), addr(2)).unwrap();
        farm.add_pool(&addr(2), lp_pool(1, 1), 0).unwrap();
    }

    #[test]
    fn test_single_pool_rejects_secondary() {
        let farm = single_farm(0);
        let pool = farm.add_pool(&addr(ADMIN), lp_pool(1, 1), 0).unwrap();
        let err = farm.deposit(addr(1), pool, U256::from(1), U256::from(1), 0).unwrap_err();
        assert!(matches!(err, FarmError::InvalidParameter(_)));
        let bad = NewPool { secondary_token: Some(addr(9)), ..lp_pool(2, 1) };
        assert!(farm.add_pool(&addr(ADMIN), bad, 0).is_err());
    }

    #[test]
    fn test_fee_percent_bounds() {
        let farm = single_farm(0);
        assert!(farm.set_early_harvest_fee_percent(&addr(ADMIN), 101).is_err());
        farm.set_early_harvest_fee_percent(&addr(ADMIN), 100).unwrap();
        assert_eq!(farm.settings().harvest.early_fee_percent, 100);
    }
}
