//! Fixed-rate term deposits with pro-rated early release.

use alloy_primitives::{Address, U256};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{DepositLimit, Treasury, UserIds, SECONDS_PER_HOUR};
use crate::auth::{AdminSet, Authorizer, Role};
use crate::early_exit::{compute_early_withdrawal, initial_locked_share, DepositSnapshot};
use crate::error::{FarmError, Result};
use crate::math;
use crate::reward_source::RewardSource;
use crate::RATE_SCALE;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermSheet {
    /// Token taken on deposit
    pub in_token: Address,
    /// Token the deposit is repaid in
    pub out_token: Address,
    /// Collection a depositor must lock an item of, if any
    #[serde(default)]
    pub nft: Option<Address>,
    /// Deposits still accepted under this sheet
    pub available_qty: u32,
    /// Part of `amount_due` releasable before maturity, in 1/255
    pub early_repayable_share: u8,
    /// Fee on early releases at the start of the term, in 1/255
    pub early_withdraw_fees: u8,
    pub limit_id: usize,
    pub deposit_hours: u32,
    /// Hours between two early withdrawals
    pub min_interim_hours: u32,
    /// Out-token units per in-token unit, scaled by 1e6
    pub rate: u64,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KingDeposit {
    pub user: Address,
    pub terms_id: usize,
    #[serde(with = "crate::amount")]
    pub amount: U256,
    #[serde(with = "crate::amount")]
    pub amount_due: U256,
    pub maturity_time: u64,
    pub last_withdraw_time: u64,
    pub locked_share: u16,
    pub nft_id: Option<u64>,
}

impl KingDeposit {
    fn snapshot(&self) -> DepositSnapshot {
        DepositSnapshot {
            amount_due: self.amount_due,
            last_withdraw_time: self.last_withdraw_time,
            maturity_time: self.maturity_time,
            locked_share: self.locked_share,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KingReceipt {
    pub deposit_id: u64,
    pub user: Address,
    pub out_token: Address,
    #[serde(with = "crate::amount")]
    pub amount_to_user: U256,
    /// Kept by the treasury
    #[serde(with = "crate::amount")]
    pub fees: U256,
    /// Still owed after this withdrawal
    #[serde(with = "crate::amount")]
    pub amount_due_left: U256,
    pub locked_share: u16,
    /// NFT handed back when the deposit closes
    pub nft_returned: Option<(Address, u64)>,
}

/// KingDecks vault
#[derive(Debug)]
pub struct TermVault {
    roles: AdminSet,
    limits: Vec<DepositLimit>,
    terms: Vec<TermSheet>,
    deposits: IndexMap<u64, KingDeposit>,
    user_ids: UserIds<u64>,
    total_due: IndexMap<Address, U256>,
    next_deposit_id: u64,
    treasury: Treasury,
}

impl TermVault {
    pub fn new(roles: AdminSet) -> Self {
        Self {
            roles,
            limits: Vec::new(),
            terms: Vec::new(),
            deposits: IndexMap::new(),
            user_ids: UserIds::new(),
            total_due: IndexMap::new(),
            next_deposit_id: 1,
            treasury: Treasury::new(),
        }
    }

    // === Administration ===

    /// Register limits, returns the id of the first one
    pub fn add_limits(&mut self, caller: &Address, limits: Vec<DepositLimit>) -> Result<usize> {
        self.roles.check(caller, Role::Owner, "add deposit limits")?;
        let first = self.limits.len();
        self.limits.extend(limits);
        Ok(first)
    }

    pub fn add_terms(&mut self, caller: &Address, sheets: Vec<TermSheet>) -> Result<Vec<usize>> {
        self.roles.check(caller, Role::Owner, "add term sheets")?;
        for sheet in &sheets {
            self.validate_terms(sheet)?;
        }
        let mut ids = Vec::with_capacity(sheets.len());
        for sheet in sheets {
            let id = self.terms.len();
            info!(terms = id, in_token = %sheet.in_token, out_token = %sheet.out_token, rate = sheet.rate, "term sheet added");
            self.terms.push(sheet);
            ids.push(id);
        }
        Ok(ids)
    }

    fn validate_terms(&self, sheet: &TermSheet) -> Result<()> {
        if sheet.limit_id >= self.limits.len() {
            return Err(FarmError::not_found(format!("deposit limit {}", sheet.limit_id)));
        }
        if sheet.deposit_hours == 0 {
            return Err(FarmError::invalid("deposit_hours must be positive"));
        }
        if sheet.rate == 0 {
            return Err(FarmError::invalid("rate must be positive"));
        }
        if sheet.early_repayable_share == 0 && sheet.early_withdraw_fees != 0 {
            return Err(FarmError::invalid("early withdraw fee set without an early repayable share"));
        }
        Ok(())
    }

    pub fn enable_terms(&mut self, caller: &Address, terms_id: usize) -> Result<()> {
        self.set_enabled(caller, terms_id, true)
    }

    pub fn disable_terms(&mut self, caller: &Address, terms_id: usize) -> Result<()> {
        self.set_enabled(caller, terms_id, false)
    }

    fn set_enabled(&mut self, caller: &Address, terms_id: usize, enabled: bool) -> Result<()> {
        self.roles.check(caller, Role::Owner, "switch term sheet")?;
        self.terms_mut(terms_id)?.enabled = enabled;
        info!(terms = terms_id, enabled, "term sheet switched");
        Ok(())
    }

    /// Source that repays deposits in `token`
    pub fn set_treasury(&mut self, caller: &Address, token: Address, source: Box<dyn RewardSource>) -> Result<()> {
        self.roles.check(caller, Role::Owner, "set treasury")?;
        self.treasury.register(token, source);
        Ok(())
    }

    pub fn fund(&mut self, token: &Address, amount: U256) -> Result<()> {
        self.treasury.fund(token, amount)
    }

    // === Deposits ===

    pub fn deposit(
        &mut self,
        user: Address,
        terms_id: usize,
        amount: U256,
        nft_id: Option<u64>,
        now: u64,
    ) -> Result<(u64, KingDeposit)> {
        let sheet = self.terms(terms_id)?;
        if !sheet.enabled {
            return Err(FarmError::locked(format!("term sheet {terms_id} is disabled")));
        }
        if sheet.available_qty == 0 {
            return Err(FarmError::invalid(format!("term sheet {terms_id} is sold out")));
        }
        if sheet.nft.is_some() && nft_id.is_none() {
            return Err(FarmError::invalid(format!("term sheet {terms_id} needs an NFT")));
        }
        let limit = self
            .limits
            .get(sheet.limit_id)
            .ok_or_else(|| FarmError::not_found(format!("deposit limit {}", sheet.limit_id)))?;
        limit.check(amount)?;

        let amount_due = math::mul_div(amount, U256::from(sheet.rate), U256::from(RATE_SCALE))?;
        let maturity_time = u64::from(sheet.deposit_hours)
            .checked_mul(SECONDS_PER_HOUR)
            .and_then(|d| now.checked_add(d))
            .ok_or(FarmError::ArithmeticOverflow)?;
        let out_token = sheet.out_token;
        let total = math::add(self.total_due.get(&out_token).copied().unwrap_or_default(), amount_due)?;

        let deposit = KingDeposit {
            user,
            terms_id,
            amount,
            amount_due,
            maturity_time,
            last_withdraw_time: now,
            locked_share: initial_locked_share(sheet.early_repayable_share),
            nft_id: sheet.nft.and(nft_id),
        };
        let id = self.next_deposit_id;
        self.next_deposit_id += 1;
        self.terms_mut(terms_id)?.available_qty -= 1;
        self.total_due.insert(out_token, total);
        self.deposits.insert(id, deposit.clone());
        self.user_ids.insert(user, id);
        info!(%user, deposit = id, terms = terms_id, %amount, %amount_due, maturity_time, "term deposit");
        Ok((id, deposit))
    }

    /// Repay in full at maturity, or release the early-repayable part pro
    /// rata before it.
    pub fn withdraw(&mut self, user: Address, deposit_id: u64, now: u64) -> Result<KingReceipt> {
        let deposit = self
            .deposits
            .get(&deposit_id)
            .filter(|d| d.user == user)
            .cloned()
            .ok_or_else(|| FarmError::not_found(format!("deposit {deposit_id} of {user}")))?;
        let sheet = self.terms(deposit.terms_id)?.clone();
        let out_token = sheet.out_token;

        if now >= deposit.maturity_time {
            self.treasury.pay(&out_token, user, deposit.amount_due)?;
            self.reduce_total_due(&out_token, deposit.amount_due)?;
            self.deposits.shift_remove(&deposit_id);
            self.user_ids.remove(&user, &deposit_id);
            debug!(%user, deposit = deposit_id, amount = %deposit.amount_due, "term deposit repaid");
            return Ok(KingReceipt {
                deposit_id,
                user,
                out_token,
                amount_to_user: deposit.amount_due,
                fees: U256::ZERO,
                amount_due_left: U256::ZERO,
                locked_share: 0,
                nft_returned: sheet.nft.zip(deposit.nft_id),
            });
        }

        let interim = u64::from(sheet.min_interim_hours) * SECONDS_PER_HOUR;
        if now < deposit.last_withdraw_time.saturating_add(interim) {
            return Err(FarmError::locked(format!(
                "deposit {deposit_id} withdrawn less than {} hours ago",
                sheet.min_interim_hours
            )));
        }
        let early = compute_early_withdrawal(&deposit.snapshot(), sheet.early_withdraw_fees, now)?;
        let released = early.released()?;
        if released.is_zero() {
            return Err(FarmError::invalid(format!("nothing of deposit {deposit_id} is releasable yet")));
        }
        self.treasury.pay(&out_token, user, early.amount_to_user)?;
        self.reduce_total_due(&out_token, released)?;

        let amount_due_left = math::sub(deposit.amount_due, released)?;
        if let Some(d) = self.deposits.get_mut(&deposit_id) {
            d.amount_due = amount_due_left;
            d.locked_share = early.new_locked_share;
            d.last_withdraw_time = now;
        }
        debug!(%user, deposit = deposit_id, paid = %early.amount_to_user, fees = %early.fees, "early withdrawal");
        Ok(KingReceipt {
            deposit_id,
            user,
            out_token,
            amount_to_user: early.amount_to_user,
            fees: early.fees,
            amount_due_left,
            locked_share: early.new_locked_share,
            nft_returned: None,
        })
    }

    fn reduce_total_due(&mut self, token: &Address, amount: U256) -> Result<()> {
        let entry = self.total_due.entry(*token).or_default();
        *entry = math::sub(*entry, amount)?;
        Ok(())
    }

    // === Queries ===

    pub fn terms(&self, terms_id: usize) -> Result<&TermSheet> {
        self.terms
            .get(terms_id)
            .ok_or_else(|| FarmError::not_found(format!("term sheet {terms_id}")))
    }

    fn terms_mut(&mut self, terms_id: usize) -> Result<&mut TermSheet> {
        self.terms
            .get_mut(terms_id)
            .ok_or_else(|| FarmError::not_found(format!("term sheet {terms_id}")))
    }

    pub fn terms_len(&self) -> usize {
        self.terms.len()
    }

    pub fn limit(&self, limit_id: usize) -> Option<&DepositLimit> {
        self.limits.get(limit_id)
    }

    pub fn limits_len(&self) -> usize {
        self.limits.len()
    }

    pub fn deposit_data(&self, user: &Address, deposit_id: u64) -> Option<&KingDeposit> {
        self.deposits.get(&deposit_id).filter(|d| d.user == *user)
    }

    pub fn deposit_ids(&self, user: &Address) -> Vec<u64> {
        self.user_ids.of(user)
    }

    pub fn total_due(&self, token: &Address) -> U256 {
        self.total_due.get(token).copied().unwrap_or_default()
    }
}
