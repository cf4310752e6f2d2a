//! Reward sources.
//!
//! The engine never holds reward tokens itself. Each transaction hands its
//! payouts to a [`RewardSource`] as one batch, and the batch either settles in
//! full or not at all.

use std::fmt;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RewardSourceConfig;
use crate::error::{FarmError, Result};
use crate::math;

/// A single reward transfer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub to: Address,
    #[serde(with = "crate::amount")]
    pub amount: U256,
}

impl Payout {
    pub fn new(to: Address, amount: U256) -> Self {
        Self { to, amount }
    }
}

/// Supplier of reward tokens
pub trait RewardSource: Send + Sync + fmt::Debug {
    /// Remaining capacity, `None` when unbounded
    fn available(&self) -> Option<U256>;

    /// Pay every payout or none of them
    fn settle(&mut self, payouts: &[Payout]) -> Result<()>;

    /// Add to the balance. Sources that mint cannot be funded.
    fn fund(&mut self, amount: U256) -> Result<()> {
        let _ = amount;
        Err(FarmError::invalid("reward source cannot be funded"))
    }

    /// Total paid out so far
    fn distributed(&self) -> U256;
}

fn batch_total(payouts: &[Payout]) -> Result<U256> {
    math::sum(payouts.iter().map(|p| p.amount))
}

/// Mints rewards on payment
#[derive(Clone, Debug, Default)]
pub struct MintOnDemand {
    minted: U256,
    cap: Option<U256>,
}

impl MintOnDemand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capped(cap: U256) -> Self {
        Self { minted: U256::ZERO, cap: Some(cap) }
    }
}

impl RewardSource for MintOnDemand {
    fn available(&self) -> Option<U256> {
        self.cap.map(|cap| cap.saturating_sub(self.minted))
    }

    fn settle(&mut self, payouts: &[Payout]) -> Result<()> {
        let total = batch_total(payouts)?;
        let minted = math::add(self.minted, total)?;
        if let Some(cap) = self.cap {
            if minted > cap {
                return Err(FarmError::InsufficientRewardFunds {
                    required: total,
                    available: cap.saturating_sub(self.minted),
                });
            }
        }
        self.minted = minted;
        if !total.is_zero() {
            debug!(amount = %total, minted = %self.minted, "minted rewards");
        }
        Ok(())
    }

    fn distributed(&self) -> U256 {
        self.minted
    }
}

/// Pays from a balance that must be funded in advance
#[derive(Clone, Debug, Default)]
pub struct PrefundedBalance {
    balance: U256,
    paid: U256,
}

impl PrefundedBalance {
    pub fn new(balance: U256) -> Self {
        Self { balance, paid: U256::ZERO }
    }

    pub fn balance(&self) -> U256 {
        self.balance
    }
}

impl RewardSource for PrefundedBalance {
    fn available(&self) -> Option<U256> {
        Some(self.balance)
    }

    fn settle(&mut self, payouts: &[Payout]) -> Result<()> {
        let total = batch_total(payouts)?;
        if total > self.balance {
            return Err(FarmError::InsufficientRewardFunds {
                required: total,
                available: self.balance,
            });
        }
        self.balance -= total;
        self.paid = math::add(self.paid, total)?;
        Ok(())
    }

    fn fund(&mut self, amount: U256) -> Result<()> {
        self.balance = math::add(self.balance, amount)?;
        debug!(amount = %amount, balance = %self.balance, "reward balance funded");
        Ok(())
    }

    fn distributed(&self) -> U256 {
        self.paid
    }
}

/// Build the source a configuration asks for
pub fn from_config(config: &RewardSourceConfig) -> Box<dyn RewardSource> {
    match config {
        RewardSourceConfig::Mint { cap: Some(cap) } => Box::new(MintOnDemand::capped(*cap)),
        RewardSourceConfig::Mint { cap: None } => Box::new(MintOnDemand::new()),
        RewardSourceConfig::Prefunded { balance } => Box::new(PrefundedBalance::new(*balance)),
    }
}
