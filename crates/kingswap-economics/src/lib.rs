//! # KingSwap Economics - Farm Reward Accrual & Term Vaults
//!
//! Reward accounting for KingSwap liquidity mining, independent of any chain.
//! Callers pass block numbers (farms) or timestamps (vaults) explicitly and
//! receive receipts describing every token movement.
//!
//! ## Key Features
//!
//! - **Phased emission**: any number of streams, each with its own rate and
//!   contiguous weighted phases
//! - **Accumulator accounting**: reward-per-share with 1e12 fixed point, debt
//!   rewritten on every principal change
//! - **Harvest policy**: minimum interval, lock or early-harvest fee
//! - **Dual-token stakes**: LP plus slippage token, additive or capped
//! - **Term vaults**: fixed-rate deposits with pro-rated early release
//!
//! ## Accrual
//!
//! ```text
//! ┌──────────────┐  units   ┌──────────────┐  acc   ┌──────────────┐
//! │   Emission   │ ───────► │     Pool     │ ─────► │   Position   │
//! │   Schedule   │  weight  │  accumulator │  debt  │    ledger    │
//! └──────────────┘          └──────────────┘        └──────┬───────┘
//!                                                          │ payouts
//!                                                   ┌──────▼───────┐
//!                                                   │ RewardSource │
//!                                                   └──────────────┘
//! ```
//!
//! ## Farm presets
//!
//! | Preset | Stake | Streams | Harvest | Withdraw |
//! |--------|-------|---------|---------|----------|
//! | `archbishop-v2` | LP + slippage (capped) | yield farming, trade mining | 192,000 block lock | open, slippage forfeited |
//! | `stoken-master` | LP + slippage (additive) | one, two phases | every touch | per-pool switch, 1% fee |
//! | `king-uni` | LP | one, two phases | every touch | open, bonus stream |

pub mod accumulator;
pub mod amount;
pub mod auth;
pub mod config;
pub mod decks;
pub mod early_exit;
pub mod emission;
pub mod error;
pub mod farm;
pub mod math;
pub mod pool;
pub mod position;
pub mod reward_source;

pub use accumulator::{entitlement, BonusAccumulator, RewardAccumulator};
pub use auth::{AdminSet, Authorizer, Role};
pub use config::{
    FarmConfig, FeeReceivers, HarvestPolicy, RewardSourceConfig, RoleConfig, SecondaryExit,
    SecondaryWeighting, StakeMode, WithdrawGate, PRESETS,
};
pub use decks::{DepositLimit, NftLockVault, RewardVault, TermVault};
pub use early_exit::{compute_early_withdrawal, initial_locked_share, DepositSnapshot, EarlyWithdrawal};
pub use emission::{EmissionSchedule, EmissionStream, Phase};
pub use error::{FarmError, Result};
pub use farm::{BurnReceipt, Farm, FarmSettings, PendingReward, Receipt, StakeAmounts};
pub use pool::{NewPool, Pool, PoolId, PoolRegistry};
pub use position::{apply_harvest, HarvestOutcome, Position};
pub use reward_source::{MintOnDemand, Payout, PrefundedBalance, RewardSource};

/// Fixed-point scales and token units
pub mod constants {
    /// Scale of `acc_per_share`
    pub const ACC_PRECISION: u64 = 1_000_000_000_000;

    /// Denominator of repayable share and early withdraw fees
    pub const SHARE_SCALE: u16 = 255;

    /// Denominator of a deposit's locked share
    pub const LOCKED_SHARE_SCALE: u16 = 65_535;

    /// Denominator of vault rates and reward factors
    pub const RATE_SCALE: u64 = 1_000_000;

    /// Denominator of deposit limit factors
    pub const LIMIT_FACTOR_SCALE: u64 = 10_000;

    pub const PERCENT: u64 = 100;

    /// One KING in its smallest unit
    pub const ONE_KING: u128 = 1_000_000_000_000_000_000; // 10^18

    /// Blocks between free harvests in the dual-stream farm (~30 days)
    pub const DEFAULT_HARVEST_INTERVAL: u64 = 192_000;
}

pub use constants::*;
