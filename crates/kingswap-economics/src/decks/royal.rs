//! NFT-gated KING locks.
//!
//! A stake locks one NFT together with KING for `lock_seconds` and returns
//! `amount * king_factor / 1e6` KING at unlock. Stake ids pack the NFT and
//! the start time:
//!
//! ```text
//!  255            96 95          32 31         0
//! +----------------+--------------+------------+
//! |  nft address   |    nft id    | start time |
//! +----------------+--------------+------------+
//! ```

use alloy_primitives::{Address, U256};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::UserIds;
use crate::auth::{AdminSet, Authorizer, Role};
use crate::error::{FarmError, Result};
use crate::math;
use crate::reward_source::{Payout, RewardSource};
use crate::RATE_SCALE;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftTerms {
    pub nft: Address,
    #[serde(with = "crate::amount")]
    pub min_amount: U256,
    pub lock_seconds: u32,
    /// KING returned per KING staked, scaled by 1e6
    pub king_factor: u64,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftStake {
    pub user: Address,
    pub terms_id: usize,
    #[serde(with = "crate::amount")]
    pub amount_staked: U256,
    #[serde(with = "crate::amount")]
    pub amount_due: U256,
    pub unlock_time: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftReceipt {
    #[serde(with = "crate::amount")]
    pub stake_id: U256,
    pub user: Address,
    pub nft: Address,
    pub nft_id: u64,
    /// KING handed back, stake included
    #[serde(with = "crate::amount")]
    pub amount: U256,
    /// Part of `amount` paid by the reward source
    #[serde(with = "crate::amount")]
    pub reward: U256,
}

pub fn encode_stake_id(nft: Address, nft_id: u64, start_time: u32) -> U256 {
    let nft = U256::from_be_slice(nft.as_slice());
    (nft << 96usize) | (U256::from(nft_id) << 32usize) | U256::from(start_time)
}

/// Inverse of [`encode_stake_id`]
pub fn decode_stake_id(stake_id: U256) -> (Address, u64, u32) {
    let high: [u8; 32] = (stake_id >> 96usize).to_be_bytes();
    let nft = Address::from_slice(&high[12..]);
    let nft_id = ((stake_id >> 32usize) & U256::from(u64::MAX)).saturating_to::<u64>();
    let start_time = (stake_id & U256::from(u32::MAX)).saturating_to::<u32>();
    (nft, nft_id, start_time)
}

/// RoyalDecks vault
#[derive(Debug)]
pub struct NftLockVault {
    roles: AdminSet,
    terms: Vec<NftTerms>,
    stakes: IndexMap<U256, NftStake>,
    user_ids: UserIds<U256>,
    amount_staked: U256,
    amount_due: U256,
    source: Box<dyn RewardSource>,
}

impl NftLockVault {
    pub fn new(roles: AdminSet, source: Box<dyn RewardSource>) -> Self {
        Self {
            roles,
            terms: Vec::new(),
            stakes: IndexMap::new(),
            user_ids: UserIds::new(),
            amount_staked: U256::ZERO,
            amount_due: U256::ZERO,
            source,
        }
    }

    pub fn add_terms(&mut self, caller: &Address, sheets: Vec<NftTerms>) -> Result<Vec<usize>> {
        self.roles.check(caller, Role::Owner, "add nft terms")?;
        if let Some(bad) = sheets.iter().find(|t| t.king_factor == 0) {
            return Err(FarmError::invalid(format!("king_factor of {} terms must be positive", bad.nft)));
        }
        let mut ids = Vec::with_capacity(sheets.len());
        for sheet in sheets {
            let id = self.terms.len();
            info!(terms = id, nft = %sheet.nft, lock_seconds = sheet.lock_seconds, king_factor = sheet.king_factor, "nft terms added");
            self.terms.push(sheet);
            ids.push(id);
        }
        Ok(ids)
    }

    pub fn enable_terms(&mut self, caller: &Address, terms_id: usize) -> Result<()> {
        self.switch(caller, terms_id, true)
    }

    pub fn disable_terms(&mut self, caller: &Address, terms_id: usize) -> Result<()> {
        self.switch(caller, terms_id, false)
    }

    fn switch(&mut self, caller: &Address, terms_id: usize, enabled: bool) -> Result<()> {
        self.roles.check(caller, Role::Owner, "switch nft terms")?;
        self.terms
            .get_mut(terms_id)
            .ok_or_else(|| FarmError::not_found(format!("nft terms {terms_id}")))?
            .enabled = enabled;
        info!(terms = terms_id, enabled, "nft terms switched");
        Ok(())
    }

    pub fn fund(&mut self, amount: U256) -> Result<()> {
        self.source.fund(amount)
    }

    pub fn deposit(
        &mut self,
        user: Address,
        terms_id: usize,
        nft_id: u64,
        amount: U256,
        now: u64,
    ) -> Result<(U256, NftStake)> {
        let sheet = self.terms(terms_id)?;
        if !sheet.enabled {
            return Err(FarmError::locked(format!("nft terms {terms_id} are disabled")));
        }
        if amount < sheet.min_amount {
            return Err(FarmError::invalid(format!("stake {amount} below minimum {}", sheet.min_amount)));
        }
        let start = u32::try_from(now).map_err(|_| FarmError::ArithmeticOverflow)?;
        let stake_id = encode_stake_id(sheet.nft, nft_id, start);
        if self.stakes.contains_key(&stake_id) {
            return Err(FarmError::AlreadyExists(format!("stake {stake_id}")));
        }
        let amount_due = math::mul_div(amount, U256::from(sheet.king_factor), U256::from(RATE_SCALE))?;
        let stake = NftStake {
            user,
            terms_id,
            amount_staked: amount,
            amount_due,
            unlock_time: now + u64::from(sheet.lock_seconds),
        };
        let staked = math::add(self.amount_staked, amount)?;
        let due = math::add(self.amount_due, amount_due)?;

        self.amount_staked = staked;
        self.amount_due = due;
        self.stakes.insert(stake_id, stake.clone());
        self.user_ids.insert(user, stake_id);
        info!(%user, stake = %stake_id, %amount, %amount_due, unlock_time = stake.unlock_time, "nft stake");
        Ok((stake_id, stake))
    }

    pub fn withdraw(&mut self, user: Address, stake_id: U256, now: u64) -> Result<NftReceipt> {
        let stake = self
            .stakes
            .get(&stake_id)
            .filter(|s| s.user == user)
            .cloned()
            .ok_or_else(|| FarmError::not_found(format!("unknown or returned stake {stake_id}")))?;
        if now < stake.unlock_time {
            return Err(FarmError::locked(format!("stake {stake_id} unlocks at {}", stake.unlock_time)));
        }
        let reward = stake.amount_due.saturating_sub(stake.amount_staked);
        let staked = math::sub(self.amount_staked, stake.amount_staked)?;
        let due = math::sub(self.amount_due, stake.amount_due)?;
        if !reward.is_zero() {
            self.source.settle(&[Payout::new(user, reward)])?;
        }

        self.amount_staked = staked;
        self.amount_due = due;
        self.stakes.shift_remove(&stake_id);
        self.user_ids.remove(&user, &stake_id);
        let (nft, nft_id, _) = decode_stake_id(stake_id);
        debug!(%user, stake = %stake_id, amount = %stake.amount_due, "nft stake returned");
        Ok(NftReceipt {
            stake_id,
            user,
            nft,
            nft_id,
            amount: stake.amount_due,
            reward,
        })
    }

    pub fn terms(&self, terms_id: usize) -> Result<&NftTerms> {
        self.terms
            .get(terms_id)
            .ok_or_else(|| FarmError::not_found(format!("nft terms {terms_id}")))
    }

    pub fn stake_data(&self, user: &Address, stake_id: U256) -> Option<&NftStake> {
        self.stakes.get(&stake_id).filter(|s| s.user == *user)
    }

    pub fn stake_ids(&self, user: &Address) -> Vec<U256> {
        self.user_ids.of(user)
    }

    pub fn amount_staked(&self) -> U256 {
        self.amount_staked
    }

    pub fn amount_due(&self) -> U256 {
        self.amount_due
    }
}
