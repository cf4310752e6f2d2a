//! Locked stakes earning a linear reward in the staked token.

use alloy_primitives::{Address, U256};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{DepositLimit, Treasury, UserIds, SECONDS_PER_HOUR};
use crate::auth::{AdminSet, Authorizer, Role};
use crate::error::{FarmError, Result};
use crate::math;
use crate::reward_source::RewardSource;
use crate::RATE_SCALE;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardTerms {
    #[serde(with = "crate::amount")]
    pub min_amount: U256,
    /// Max amount is `min_amount * factor / 1e4`, zero means unlimited
    pub max_amount_factor: u64,
    /// Reward over the full lock per staked unit, scaled by 1e6
    pub reward_factor: u64,
    pub lock_hours: u32,
    /// Hours between two reward withdrawals
    pub reward_lock_hours: u32,
    pub token: Address,
    #[serde(default)]
    pub enabled: bool,
}

impl RewardTerms {
    fn same_economics(&self, other: &Self) -> bool {
        self.min_amount == other.min_amount
            && self.max_amount_factor == other.max_amount_factor
            && self.reward_factor == other.reward_factor
            && self.lock_hours == other.lock_hours
            && self.reward_lock_hours == other.reward_lock_hours
            && self.token == other.token
    }

    fn limit(&self) -> DepositLimit {
        DepositLimit::new(self.min_amount, self.max_amount_factor)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueenStake {
    pub user: Address,
    pub terms_id: usize,
    #[serde(with = "crate::amount")]
    pub amount: U256,
    pub unlock_time: u64,
    pub last_reward_time: u64,
    pub reward_factor: u64,
    pub reward_lock_hours: u32,
    pub lock_hours: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueenReceipt {
    pub stake_id: u64,
    pub user: Address,
    pub token: Address,
    #[serde(with = "crate::amount")]
    pub reward: U256,
    /// Principal handed back, zero for reward-only withdrawals
    #[serde(with = "crate::amount")]
    pub principal: U256,
}

/// Reward accrued since the last reward withdrawal, capped at the unlock time
pub fn reward_due(stake: &QueenStake, now: u64) -> Result<U256> {
    if stake.amount.is_zero() || now <= stake.last_reward_time || stake.last_reward_time >= stake.unlock_time {
        return Ok(U256::ZERO);
    }
    let elapsed = now.min(stake.unlock_time) - stake.last_reward_time;
    let period = u64::from(stake.lock_hours)
        .checked_mul(SECONDS_PER_HOUR)
        .ok_or(FarmError::ArithmeticOverflow)?;
    if period == 0 {
        return Ok(U256::ZERO);
    }
    let num = math::mul(U256::from(stake.reward_factor), U256::from(elapsed))?;
    let den = math::mul(U256::from(period), U256::from(RATE_SCALE))?;
    math::mul_div(stake.amount, num, den)
}

/// QueenDecks vault
#[derive(Debug)]
pub struct RewardVault {
    roles: AdminSet,
    terms: Vec<RewardTerms>,
    stakes: IndexMap<u64, QueenStake>,
    user_ids: UserIds<u64>,
    total_staked: IndexMap<Address, U256>,
    next_stake_id: u64,
    treasury: Treasury,
}

impl RewardVault {
    pub fn new(roles: AdminSet) -> Self {
        Self {
            roles,
            terms: Vec::new(),
            stakes: IndexMap::new(),
            user_ids: UserIds::new(),
            total_staked: IndexMap::new(),
            next_stake_id: 1,
            treasury: Treasury::new(),
        }
    }

    /// Fails with `AlreadyExists` if a sheet repeats an existing one
    pub fn add_terms(&mut self, caller: &Address, sheets: Vec<RewardTerms>) -> Result<Vec<usize>> {
        self.roles.check(caller, Role::Owner, "add reward terms")?;
        for (i, sheet) in sheets.iter().enumerate() {
            let duplicate = self.terms.iter().chain(&sheets[..i]).any(|t| t.same_economics(sheet));
            if duplicate {
                return Err(FarmError::AlreadyExists(format!(
                    "reward terms for token {} with factor {}",
                    sheet.token, sheet.reward_factor
                )));
            }
            if sheet.lock_hours == 0 {
                return Err(FarmError::invalid("lock_hours must be positive"));
            }
        }
        let mut ids = Vec::with_capacity(sheets.len());
        for sheet in sheets {
            let id = self.terms.len();
            info!(terms = id, token = %sheet.token, reward_factor = sheet.reward_factor, "reward terms added");
            self.terms.push(sheet);
            ids.push(id);
        }
        Ok(ids)
    }

    pub fn enable_terms(&mut self, caller: &Address, terms_id: usize) -> Result<()> {
        self.roles.check(caller, Role::Owner, "switch reward terms")?;
        self.terms_mut(terms_id)?.enabled = true;
        Ok(())
    }

    pub fn disable_terms(&mut self, caller: &Address, terms_id: usize) -> Result<()> {
        self.roles.check(caller, Role::Owner, "switch reward terms")?;
        self.terms_mut(terms_id)?.enabled = false;
        Ok(())
    }

    pub fn set_treasury(&mut self, caller: &Address, token: Address, source: Box<dyn RewardSource>) -> Result<()> {
        self.roles.check(caller, Role::Owner, "set treasury")?;
        self.treasury.register(token, source);
        Ok(())
    }

    pub fn fund(&mut self, token: &Address, amount: U256) -> Result<()> {
        self.treasury.fund(token, amount)
    }

    pub fn deposit(&mut self, user: Address, terms_id: usize, amount: U256, now: u64) -> Result<(u64, QueenStake)> {
        let sheet = self.terms(terms_id)?;
        if !sheet.enabled {
            return Err(FarmError::locked(format!("reward terms {terms_id} are disabled")));
        }
        sheet.limit().check(amount)?;
        let unlock_time = u64::from(sheet.lock_hours)
            .checked_mul(SECONDS_PER_HOUR)
            .and_then(|d| now.checked_add(d))
            .ok_or(FarmError::ArithmeticOverflow)?;
        let stake = QueenStake {
            user,
            terms_id,
            amount,
            unlock_time,
            last_reward_time: now,
            reward_factor: sheet.reward_factor,
            reward_lock_hours: sheet.reward_lock_hours,
            lock_hours: sheet.lock_hours,
        };
        let token = sheet.token;
        let total = math::add(self.total_staked(&token), amount)?;

        let id = self.next_stake_id;
        self.next_stake_id += 1;
        self.total_staked.insert(token, total);
        self.stakes.insert(id, stake.clone());
        self.user_ids.insert(user, id);
        info!(%user, stake = id, terms = terms_id, %amount, unlock_time, "reward stake");
        Ok((id, stake))
    }

    /// Claim the accrued reward, at most once per `reward_lock_hours`
    pub fn withdraw_reward(&mut self, user: Address, stake_id: u64, now: u64) -> Result<QueenReceipt> {
        let stake = self.stake_of(&user, stake_id)?;
        let gate = u64::from(stake.reward_lock_hours) * SECONDS_PER_HOUR;
        if now < stake.last_reward_time.saturating_add(gate) {
            return Err(FarmError::locked(format!("reward of stake {stake_id} is still locked")));
        }
        let token = self.terms(stake.terms_id)?.token;
        let reward = reward_due(&stake, now)?;
        self.treasury.pay(&token, user, reward)?;
        if let Some(s) = self.stakes.get_mut(&stake_id) {
            s.last_reward_time = now;
        }
        debug!(%user, stake = stake_id, %reward, "stake reward withdrawn");
        Ok(QueenReceipt { stake_id, user, token, reward, principal: U256::ZERO })
    }

    /// Close the stake after unlock: principal plus any unclaimed reward
    pub fn withdraw(&mut self, user: Address, stake_id: u64, now: u64) -> Result<QueenReceipt> {
        let stake = self.stake_of(&user, stake_id)?;
        if now < stake.unlock_time {
            return Err(FarmError::locked(format!("stake {stake_id} unlocks at {}", stake.unlock_time)));
        }
        let token = self.terms(stake.terms_id)?.token;
        let reward = reward_due(&stake, now)?;
        let total = math::sub(self.total_staked(&token), stake.amount)?;
        self.treasury.pay(&token, user, reward)?;
        self.total_staked.insert(token, total);
        self.stakes.shift_remove(&stake_id);
        self.user_ids.remove(&user, &stake_id);
        debug!(%user, stake = stake_id, %reward, principal = %stake.amount, "reward stake closed");
        Ok(QueenReceipt { stake_id, user, token, reward, principal: stake.amount })
    }

    fn stake_of(&self, user: &Address, stake_id: u64) -> Result<QueenStake> {
        self.stakes
            .get(&stake_id)
            .filter(|s| s.user == *user)
            .cloned()
            .ok_or_else(|| FarmError::not_found(format!("stake {stake_id} of {user}")))
    }

    fn terms_mut(&mut self, terms_id: usize) -> Result<&mut RewardTerms> {
        self.terms
            .get_mut(terms_id)
            .ok_or_else(|| FarmError::not_found(format!("reward terms {terms_id}")))
    }

    pub fn terms(&self, terms_id: usize) -> Result<&RewardTerms> {
        self.terms
            .get(terms_id)
            .ok_or_else(|| FarmError::not_found(format!("reward terms {terms_id}")))
    }

    pub fn terms_len(&self) -> usize {
        self.terms.len()
    }

    pub fn all_terms(&self) -> &[RewardTerms] {
        &self.terms
    }

    pub fn stake_data(&self, user: &Address, stake_id: u64) -> Option<&QueenStake> {
        self.stakes.get(&stake_id).filter(|s| s.user == *user)
    }

    pub fn stake_ids(&self, user: &Address) -> Vec<u64> {
        self.user_ids.of(user)
    }

    pub fn total_staked(&self, token: &Address) -> U256 {
        self.total_staked.get(token).copied().unwrap_or_default()
    }
}
