//! Farm configuration types
//!
//! One engine serves every farm family. The differences between them are
//! captured here and loaded from TOML or built from a preset.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::emission::{EmissionSchedule, EmissionStream, Phase};
use crate::error::{FarmError, Result};
use crate::math;
use crate::{DEFAULT_HARVEST_INTERVAL, ONE_KING};

/// Complete farm configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmConfig {
    /// Emission schedule
    pub schedule: EmissionSchedule,

    /// How staked tokens combine into a principal
    #[serde(default)]
    pub stake: StakeMode,

    /// Who may withdraw and when
    #[serde(default)]
    pub withdraw_gate: WithdrawGate,

    /// Harvest interval and early-harvest handling
    #[serde(default)]
    pub harvest: HarvestPolicy,

    /// Fee on every returned stake component, in percent
    #[serde(default)]
    pub withdraw_fee_percent: u8,

    /// Fee on bonus token payouts, in percent
    #[serde(default)]
    pub bonus_fee_percent: u8,

    /// Secondary-token multiplier given to new pools
    #[serde(default = "default_secondary_multiplier", with = "crate::amount")]
    pub default_secondary_multiplier: U256,

    /// Where rewards come from
    #[serde(default)]
    pub reward_source: RewardSourceConfig,

    /// Fee destinations
    #[serde(default)]
    pub fee_receivers: FeeReceivers,

    /// Privileged accounts
    #[serde(default)]
    pub roles: RoleConfig,
}

fn default_secondary_multiplier() -> U256 {
    U256::from(1)
}

/// Combination of staked tokens into one principal
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StakeMode {
    /// LP token only
    #[default]
    Single,
    /// LP token plus a slippage token
    Dual {
        weighting: SecondaryWeighting,
        exit: SecondaryExit,
    },
}

/// How the slippage token adds to principal
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecondaryWeighting {
    /// `primary + secondary * multiplier`
    Additive,
    /// `primary + min(primary, secondary * multiplier)`
    CappedAtPrimary,
}

/// What happens to the slippage token on withdrawal
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecondaryExit {
    /// Any withdrawal drops the whole secondary amount
    Forfeit,
    /// Secondary is withdrawn explicitly and returned
    Return,
}

impl StakeMode {
    /// Principal for a pair of component amounts
    pub fn principal(&self, primary: U256, secondary: U256, multiplier: U256) -> Result<U256> {
        match self {
            Self::Single => Ok(primary),
            Self::Dual { weighting, .. } => {
                let weighted = math::mul(secondary, multiplier)?;
                let extra = match weighting {
                    SecondaryWeighting::Additive => weighted,
                    SecondaryWeighting::CappedAtPrimary => weighted.min(primary),
                };
                math::add(primary, extra)
            }
        }
    }

    pub fn is_dual(&self) -> bool {
        matches!(self, Self::Dual { .. })
    }

    pub fn secondary_exit(&self) -> Option<SecondaryExit> {
        match self {
            Self::Single => None,
            Self::Dual { exit, .. } => Some(*exit),
        }
    }
}

/// Withdraw gating
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WithdrawGate {
    #[default]
    Open,
    /// Each pool has a switch, off when the pool is added
    PoolSwitch,
}

/// Harvest handling
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestPolicy {
    /// Blocks between free harvests. Zero pays on every touch.
    #[serde(default)]
    pub interval: u64,

    /// Fee on harvests inside the interval when the pool lock is off
    #[serde(default = "default_early_fee_percent")]
    pub early_fee_percent: u8,

    /// Initial value of the per-pool harvest lock
    #[serde(default)]
    pub lock_by_default: bool,
}

fn default_early_fee_percent() -> u8 {
    10
}

impl Default for HarvestPolicy {
    fn default() -> Self {
        Self {
            interval: 0,
            early_fee_percent: default_early_fee_percent(),
            lock_by_default: false,
        }
    }
}

/// Reward source selection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RewardSourceConfig {
    /// Mint rewards as they are paid, optionally up to a cap
    Mint {
        #[serde(default, with = "crate::amount::option")]
        cap: Option<U256>,
    },
    /// Pay from a balance funded in advance
    Prefunded {
        #[serde(default, with = "crate::amount")]
        balance: U256,
    },
}

impl Default for RewardSourceConfig {
    fn default() -> Self {
        Self::Mint { cap: None }
    }
}

/// Fee destinations
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeReceivers {
    /// Early-harvest reward fees
    #[serde(default)]
    pub reward: Address,
    /// Stake withdrawal fees
    #[serde(default)]
    pub withdraw: Address,
    /// Bonus token fees
    #[serde(default)]
    pub bonus: Address,
}

/// Privileged accounts
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleConfig {
    #[serde(default)]
    pub owner: Address,
    #[serde(default)]
    pub admin: Address,
}

/// Named presets accepted by [`FarmConfig::preset`]
pub const PRESETS: &[&str] = &["archbishop-v2", "stoken-master", "king-uni"];

impl FarmConfig {
    /// Dual-stream farm: yield farming plus trade mining, LP plus slippage
    /// token capped at the LP amount, harvest lock on by default.
    pub fn archbishop_v2(start_block: u64) -> Self {
        let streams = vec![
            EmissionStream::new(
                "yield-farming",
                U256::from(5 * ONE_KING),
                vec![Phase { end: start_block + 1_152_000, weight: 1 }],
            ),
            EmissionStream::new(
                "trade-mining",
                U256::from(10 * ONE_KING),
                vec![
                    Phase { end: start_block + 192_000, weight: 2 },
                    Phase { end: start_block + 2_304_000, weight: 1 },
                ],
            ),
        ];
        Self {
            schedule: EmissionSchedule { start_block, streams },
            stake: StakeMode::Dual {
                weighting: SecondaryWeighting::CappedAtPrimary,
                exit: SecondaryExit::Forfeit,
            },
            withdraw_gate: WithdrawGate::Open,
            harvest: HarvestPolicy {
                interval: DEFAULT_HARVEST_INTERVAL,
                early_fee_percent: 10,
                lock_by_default: true,
            },
            withdraw_fee_percent: 0,
            bonus_fee_percent: 0,
            default_secondary_multiplier: U256::from(1),
            reward_source: RewardSourceConfig::Mint { cap: None },
            fee_receivers: FeeReceivers::default(),
            roles: RoleConfig::default(),
        }
    }

    /// Slippage-token farm: additive weighting, withdrawals behind a per-pool
    /// switch and a 1% fee on both tokens.
    pub fn stoken_master(start_block: u64) -> Self {
        Self {
            schedule: EmissionSchedule {
                start_block,
                streams: vec![EmissionStream::new(
                    "stoken",
                    U256::from(10 * ONE_KING),
                    vec![
                        Phase { end: start_block + 192_000, weight: 2 },
                        Phase { end: start_block + 300_000, weight: 1 },
                    ],
                )],
            },
            stake: StakeMode::Dual {
                weighting: SecondaryWeighting::Additive,
                exit: SecondaryExit::Return,
            },
            withdraw_gate: WithdrawGate::PoolSwitch,
            harvest: HarvestPolicy {
                interval: 0,
                early_fee_percent: 0,
                lock_by_default: false,
            },
            withdraw_fee_percent: 1,
            bonus_fee_percent: 0,
            default_secondary_multiplier: U256::from(10),
            reward_source: RewardSourceConfig::Prefunded { balance: U256::ZERO },
            fee_receivers: FeeReceivers::default(),
            roles: RoleConfig::default(),
        }
    }

    /// LP farm co-staking into an external pool whose token is passed on as
    /// a bonus stream with a 10% fee.
    pub fn king_uni(start_block: u64) -> Self {
        Self {
            schedule: EmissionSchedule {
                start_block,
                streams: vec![EmissionStream::new(
                    "king",
                    U256::from(50 * ONE_KING),
                    vec![
                        Phase { end: start_block + 64_000, weight: 2 },
                        Phase { end: start_block + 128_000, weight: 1 },
                    ],
                )],
            },
            stake: StakeMode::Single,
            withdraw_gate: WithdrawGate::Open,
            harvest: HarvestPolicy {
                interval: 0,
                early_fee_percent: 0,
                lock_by_default: false,
            },
            withdraw_fee_percent: 0,
            bonus_fee_percent: 10,
            default_secondary_multiplier: U256::from(1),
            reward_source: RewardSourceConfig::Prefunded { balance: U256::ZERO },
            fee_receivers: FeeReceivers::default(),
            roles: RoleConfig::default(),
        }
    }

    /// Look up a preset by name
    pub fn preset(name: &str, start_block: u64) -> Result<Self> {
        match name {
            "archbishop-v2" => Ok(Self::archbishop_v2(start_block)),
            "stoken-master" => Ok(Self::stoken_master(start_block)),
            "king-uni" => Ok(Self::king_uni(start_block)),
            other => Err(FarmError::invalid(format!(
                "unknown preset {other:?}, expected one of {PRESETS:?}"
            ))),
        }
    }

    pub fn with_roles(mut self, owner: Address, admin: Address) -> Self {
        self.roles = RoleConfig { owner, admin };
        self
    }

    pub fn with_schedule(mut self, schedule: EmissionSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Check ranges the engine relies on
    pub fn validate(&self) -> Result<()> {
        self.schedule.validate()?;
        for (name, pct) in [
            ("withdraw_fee_percent", self.withdraw_fee_percent),
            ("bonus_fee_percent", self.bonus_fee_percent),
            ("harvest.early_fee_percent", self.harvest.early_fee_percent),
        ] {
            check_percent(name, pct)?;
        }
        Ok(())
    }
}

pub(crate) fn check_percent(name: &str, pct: u8) -> Result<()> {
    if u64::from(pct) > crate::PERCENT {
        return Err(FarmError::invalid(format!("{name} must be at most 100, got {pct}")));
    }
    Ok(())
}
