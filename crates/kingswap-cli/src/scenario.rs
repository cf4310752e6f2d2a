//! Scenario files for the simulator.
//!
//! A scenario names a farm (a preset or a full `[farm]` table), the pools to
//! register at the start block and a list of steps. Every step runs against
//! one engine instance and its outcome is recorded. A failing step is
//! reported and the run carries on unless `stop_on_error` is set.
//!
//! ```toml
//! preset = "king-uni"
//! start_block = 0
//! fund = "2000000000000000000000"
//!
//! [[pools]]
//! stake_token = "0x0000000000000000000000000000000000000041"
//! weight = 1
//!
//! [[steps]]
//! action = "deposit"
//! user = "alice"
//! pool = 0
//! block = 0
//! primary = "10"
//! ```
//!
//! Accounts are hex addresses or plain labels. A label stands for the last
//! 20 bytes of its keccak hash, so `alice` is the same account in every run.

use std::path::Path;
use std::str::FromStr;

use alloy_primitives::{keccak256, Address, U256};
use anyhow::{bail, Context};
use kingswap_economics::{BurnReceipt, Farm, FarmConfig, NewPool, PendingReward, Pool, PoolId, Receipt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Account named in a scenario
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Account(pub String);

impl Account {
    pub fn address(&self) -> anyhow::Result<Address> {
        if self.0.starts_with("0x") {
            return Address::from_str(&self.0).with_context(|| format!("invalid address {:?}", self.0));
        }
        Ok(Address::from_word(keccak256(self.0.as_bytes())))
    }
}

fn default_owner() -> Account {
    Account("owner".to_string())
}

fn default_admin() -> Account {
    Account("admin".to_string())
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Preset name, see `kingswap presets`
    #[serde(default)]
    pub preset: Option<String>,

    /// Start block handed to the preset
    #[serde(default)]
    pub start_block: u64,

    /// Full farm configuration instead of a preset
    #[serde(default)]
    pub farm: Option<FarmConfig>,

    /// Replaces the configured owner
    #[serde(default = "default_owner")]
    pub owner: Account,

    /// Replaces the configured admin
    #[serde(default = "default_admin")]
    pub admin: Account,

    /// Initial reward source funding
    #[serde(default, with = "kingswap_economics::amount::option")]
    pub fund: Option<U256>,

    /// Abort on the first failing step
    #[serde(default)]
    pub stop_on_error: bool,

    #[serde(default)]
    pub pools: Vec<NewPool>,

    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One engine call. Pools are addressed by registration index.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Step {
    Deposit {
        user: Account,
        pool: u32,
        block: u64,
        #[serde(default, with = "kingswap_economics::amount")]
        primary: U256,
        #[serde(default, with = "kingswap_economics::amount")]
        secondary: U256,
    },
    Withdraw {
        user: Account,
        pool: u32,
        block: u64,
        #[serde(default, with = "kingswap_economics::amount")]
        primary: U256,
        #[serde(default, with = "kingswap_economics::amount")]
        secondary: U256,
    },
    Harvest {
        user: Account,
        pool: u32,
        block: u64,
    },
    EmergencyWithdraw {
        user: Account,
        pool: u32,
        block: u64,
    },
    Pending {
        user: Account,
        pool: u32,
        block: u64,
    },
    Fund {
        #[serde(with = "kingswap_economics::amount")]
        amount: U256,
    },
    AddPool {
        stake_token: Address,
        #[serde(default)]
        secondary_token: Option<Address>,
        weight: u64,
        block: u64,
    },
    SetWeight {
        pool: u32,
        weight: u64,
        block: u64,
    },
    SetRewardPerBlock {
        stream: usize,
        #[serde(with = "kingswap_economics::amount")]
        rate: U256,
        block: u64,
    },
    SetStreamEnd {
        stream: usize,
        end: u64,
        block: u64,
    },
    SetWithdrawEnabled {
        pool: u32,
        enabled: bool,
    },
    SetHarvestLock {
        pool: u32,
        locked: bool,
    },
    DistributeBonus {
        pool: u32,
        #[serde(with = "kingswap_economics::amount")]
        amount: U256,
    },
    Burn {
        user: Account,
        pool: u32,
        #[serde(with = "kingswap_economics::amount")]
        amount: U256,
    },
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Deposit { .. } => "deposit",
            Self::Withdraw { .. } => "withdraw",
            Self::Harvest { .. } => "harvest",
            Self::EmergencyWithdraw { .. } => "emergency-withdraw",
            Self::Pending { .. } => "pending",
            Self::Fund { .. } => "fund",
            Self::AddPool { .. } => "add-pool",
            Self::SetWeight { .. } => "set-weight",
            Self::SetRewardPerBlock { .. } => "set-reward-per-block",
            Self::SetStreamEnd { .. } => "set-stream-end",
            Self::SetWithdrawEnabled { .. } => "set-withdraw-enabled",
            Self::SetHarvestLock { .. } => "set-harvest-lock",
            Self::DistributeBonus { .. } => "distribute-bonus",
            Self::Burn { .. } => "burn",
        }
    }

    fn apply(&self, farm: &Farm, admin: &Address) -> anyhow::Result<Outcome> {
        let outcome = match self {
            Self::Deposit { user, pool, block, primary, secondary } => {
                Outcome::Receipt(farm.deposit(user.address()?, PoolId(*pool), *primary, *secondary, *block)?)
            }
            Self::Withdraw { user, pool, block, primary, secondary } => {
                Outcome::Receipt(farm.withdraw(user.address()?, PoolId(*pool), *primary, *secondary, *block)?)
            }
            Self::Harvest { user, pool, block } => Outcome::Receipt(farm.harvest(user.address()?, PoolId(*pool), *block)?),
            Self::EmergencyWithdraw { user, pool, block } => {
                Outcome::Receipt(farm.emergency_withdraw(user.address()?, PoolId(*pool), *block)?)
            }
            Self::Pending { user, pool, block } => {
                Outcome::Pending(farm.pending(PoolId(*pool), &user.address()?, *block)?)
            }
            Self::Fund { amount } => {
                farm.fund(*amount)?;
                Outcome::Done
            }
            Self::AddPool { stake_token, secondary_token, weight, block } => {
                let spec = NewPool {
                    stake_token: *stake_token,
                    secondary_token: *secondary_token,
                    weight: *weight,
                    secondary_multiplier: None,
                };
                Outcome::Pool { id: farm.add_pool(admin, spec, *block)? }
            }
            Self::SetWeight { pool, weight, block } => {
                farm.set_weight(admin, PoolId(*pool), *weight, *block)?;
                Outcome::Done
            }
            Self::SetRewardPerBlock { stream, rate, block } => {
                farm.set_reward_per_block(admin, *stream, *rate, *block)?;
                Outcome::Done
            }
            Self::SetStreamEnd { stream, end, block } => {
                farm.set_stream_end(admin, *stream, *end, *block)?;
                Outcome::Done
            }
            Self::SetWithdrawEnabled { pool, enabled } => {
                farm.set_withdraw_enabled(admin, PoolId(*pool), *enabled)?;
                Outcome::Done
            }
            Self::SetHarvestLock { pool, locked } => {
                farm.set_harvest_lock(admin, PoolId(*pool), *locked)?;
                Outcome::Done
            }
            Self::DistributeBonus { pool, amount } => {
                farm.distribute_bonus(admin, PoolId(*pool), *amount)?;
                Outcome::Done
            }
            Self::Burn { user, pool, amount } => {
                Outcome::Burn(farm.burn_reward_for_pool(user.address()?, PoolId(*pool), *amount)?)
            }
        };
        Ok(outcome)
    }
}

/// Result of one step
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Outcome {
    Receipt(Receipt),
    Pending(PendingReward),
    Burn(BurnReceipt),
    Pool { id: PoolId },
    Done,
    Failed { error: String },
}

#[derive(Clone, Debug, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub action: &'static str,
    pub outcome: Outcome,
}

/// Everything a run produced, plus the final pool state
#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub steps: Vec<StepReport>,
    pub pools: Vec<Pool>,
    #[serde(with = "kingswap_economics::amount")]
    pub reward_distributed: U256,
    /// Absent when rewards are minted without a cap
    #[serde(with = "kingswap_economics::amount::option")]
    pub reward_available: Option<U256>,
}

impl Report {
    pub fn failures(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, Outcome::Failed { .. }))
            .count()
    }
}

impl Scenario {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading scenario {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("in scenario {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("invalid scenario")
    }

    /// Farm configuration with the scenario's roles applied
    pub fn config(&self) -> anyhow::Result<FarmConfig> {
        let base = match (&self.preset, &self.farm) {
            (Some(_), Some(_)) => bail!("scenario sets both `preset` and a `[farm]` table"),
            (None, None) => bail!("scenario needs `preset` or a `[farm]` table"),
            (Some(name), None) => FarmConfig::preset(name, self.start_block)?,
            (None, Some(farm)) => farm.clone(),
        };
        Ok(base.with_roles(self.owner.address()?, self.admin.address()?))
    }

    pub fn run(&self) -> anyhow::Result<Report> {
        let config = self.config()?;
        let farm = Farm::from_config(&config)?;
        let admin = config.roles.admin;
        if let Some(amount) = self.fund {
            farm.fund(amount).context("initial funding")?;
        }
        for (i, spec) in self.pools.iter().enumerate() {
            let id = farm
                .add_pool(&admin, spec.clone(), config.schedule.start_block)
                .with_context(|| format!("registering pool {i}"))?;
            debug!(pool = %id, token = %spec.stake_token, weight = spec.weight, "scenario pool");
        }

        let mut steps = Vec::with_capacity(self.steps.len());
        for (i, step) in self.steps.iter().enumerate() {
            let outcome = match step.apply(&farm, &admin) {
                Ok(outcome) => outcome,
                Err(e) if self.stop_on_error => return Err(e.context(format!("step {i} ({})", step.name()))),
                Err(e) => {
                    warn!(step = i, action = step.name(), error = %e, "step failed");
                    Outcome::Failed { error: e.to_string() }
                }
            };
            steps.push(StepReport { step: i, action: step.name(), outcome });
        }

        let report = Report {
            steps,
            pools: farm.pools(),
            reward_distributed: farm.reward_distributed(),
            reward_available: farm.reward_available(),
        };
        info!(
            steps = report.steps.len(),
            failed = report.failures(),
            distributed = %report.reward_distributed,
            "scenario finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_labels() {
        let alice = Account("alice".into()).address().unwrap();
        assert_eq!(alice, Account("alice".into()).address().unwrap());
        assert_ne!(alice, Account("bob".into()).address().unwrap());
        let hex = Account("0x0000000000000000000000000000000000000001".into());
        assert_eq!(hex.address().unwrap(), Address::with_last_byte(1));
        assert!(Account("0x12".into()).address().is_err());
    }

    #[test]
    fn test_farm_source_is_exclusive() {
        let both = Scenario::parse("preset = \"king-uni\"\n[farm.schedule]\nstart_block = 0\nstreams = []\n");
        assert!(both.is_err() || both.unwrap().config().is_err());
        let neither = Scenario::parse("start_block = 5").unwrap();
        assert!(neither.config().is_err());
    }

    #[test]
    fn test_step_tags() {
        let scenario = Scenario::parse(
            r#"
            preset = "stoken-master"

            [[steps]]
            action = "set-withdraw-enabled"
            pool = 0
            enabled = true

            [[steps]]
            action = "emergency-withdraw"
            user = "carol"
            pool = 0
            block = 3
            "#,
        )
        .unwrap();
        let names: Vec<_> = scenario.steps.iter().map(Step::name).collect();
        assert_eq!(names, ["set-withdraw-enabled", "emergency-withdraw"]);
        assert!(Scenario::parse("preset = \"king-uni\"\n[[steps]]\naction = \"mint\"\n").is_err());
    }
}
