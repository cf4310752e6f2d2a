//! One-shot calculators behind the `multiplier`, `early-exit` and `presets`
//! subcommands.

use std::fmt::Write as _;
use std::str::FromStr;

use alloy_primitives::U256;
use kingswap_economics::{
    compute_early_withdrawal, initial_locked_share, DepositSnapshot, EarlyWithdrawal, FarmConfig, StakeMode,
    WithdrawGate, PRESETS,
};
use serde::Serialize;

/// Parse a decimal or `0x` amount, underscores allowed
pub fn parse_amount(s: &str) -> Result<U256, String> {
    let s = s.trim().replace('_', "");
    U256::from_str(&s).map_err(|e| format!("invalid amount {s:?}: {e}"))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StreamWindow {
    pub name: String,
    pub multiplier: u64,
    #[serde(with = "kingswap_economics::amount")]
    pub reward_units: U256,
}

/// Emission of a preset over `[from, to)`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MultiplierReport {
    pub preset: String,
    pub from: u64,
    pub to: u64,
    pub streams: Vec<StreamWindow>,
    #[serde(with = "kingswap_economics::amount")]
    pub reward_units: U256,
}

impl MultiplierReport {
    pub fn build(preset: &str, start_block: u64, from: u64, to: u64) -> anyhow::Result<Self> {
        let schedule = FarmConfig::preset(preset, start_block)?.schedule;
        let multipliers = schedule.multipliers(from, to)?;
        let mut streams = Vec::with_capacity(multipliers.len());
        for (stream, multiplier) in schedule.streams.iter().zip(multipliers) {
            streams.push(StreamWindow {
                name: stream.name.clone(),
                multiplier,
                reward_units: stream.reward_per_block.checked_mul(U256::from(multiplier)).ok_or_else(|| {
                    anyhow::anyhow!("reward units of stream {} overflow", stream.name)
                })?,
            });
        }
        Ok(Self {
            preset: preset.to_string(),
            from,
            to,
            streams,
            reward_units: schedule.reward_units(from, to)?,
        })
    }
}

/// Early withdrawal of a deposit that has not been touched since `last`
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EarlyExitReport {
    pub deposit: DepositSnapshot,
    pub now: u64,
    pub withdrawal: EarlyWithdrawal,
    #[serde(with = "kingswap_economics::amount")]
    pub released: U256,
}

pub fn early_exit(
    amount_due: U256,
    repayable_share: u8,
    fee_share: u8,
    last: u64,
    maturity: u64,
    now: u64,
) -> anyhow::Result<EarlyExitReport> {
    if maturity <= last {
        anyhow::bail!("maturity {maturity} must be after the last withdrawal {last}");
    }
    let deposit = DepositSnapshot {
        amount_due,
        last_withdraw_time: last,
        maturity_time: maturity,
        locked_share: initial_locked_share(repayable_share),
    };
    let withdrawal = compute_early_withdrawal(&deposit, fee_share, now)?;
    Ok(EarlyExitReport {
        released: withdrawal.released()?,
        deposit,
        now,
        withdrawal,
    })
}

/// Human-readable summary of every preset
pub fn describe_presets(start_block: u64) -> anyhow::Result<String> {
    let mut out = String::new();
    for name in PRESETS {
        let config = FarmConfig::preset(name, start_block)?;
        writeln!(out, "{name}")?;
        writeln!(
            out,
            "  blocks:   {}..{}",
            config.schedule.start_block,
            config.schedule.end_block()
        )?;
        for stream in &config.schedule.streams {
            let phases: Vec<String> = stream
                .phases
                .iter()
                .map(|p| format!("x{} until {}", p.weight, p.end))
                .collect();
            writeln!(out, "  stream:   {} {}/block, {}", stream.name, stream.reward_per_block, phases.join(", "))?;
        }
        let stake = match config.stake {
            StakeMode::Single => "lp".to_string(),
            StakeMode::Dual { weighting, exit } => format!("lp + slippage ({weighting:?}, {exit:?})"),
        };
        let withdraw = match config.withdraw_gate {
            WithdrawGate::Open => "open",
            WithdrawGate::PoolSwitch => "per-pool switch",
        };
        writeln!(out, "  stake:    {stake}")?;
        writeln!(
            out,
            "  harvest:  interval {}, early fee {}%, lock {}",
            config.harvest.interval, config.harvest.early_fee_percent, config.harvest.lock_by_default
        )?;
        writeln!(out, "  withdraw: {withdraw}, fee {}%", config.withdraw_fee_percent)?;
    }
    Ok(out)
}
