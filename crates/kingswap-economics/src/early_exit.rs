//! Early-exit arithmetic for fixed-term deposits.
//!
//! A deposit owes `amount_due` at `maturity_time`. Before maturity only the
//! repayable part (the complement of `locked_share / 65535`) can be released,
//! and only pro rata to the time elapsed since the last withdrawal. The fee
//! charged on the released amount decays linearly to zero at maturity.
//!
//! | Field | Scale |
//! |-------|-------|
//! | `early_repayable_share`, `early_withdraw_fees` | `/ 255` |
//! | `locked_share` | `/ 65535` |

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::math;
use crate::{LOCKED_SHARE_SCALE, SHARE_SCALE};

/// Deposit fields the calculation reads
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositSnapshot {
    #[serde(with = "crate::amount")]
    pub amount_due: U256,
    pub last_withdraw_time: u64,
    pub maturity_time: u64,
    /// Part of `amount_due` that cannot leave early, in 1/65535
    pub locked_share: u16,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarlyWithdrawal {
    #[serde(with = "crate::amount")]
    pub amount_to_user: U256,
    #[serde(with = "crate::amount")]
    pub fees: U256,
    pub new_locked_share: u16,
}

impl EarlyWithdrawal {
    /// `amount_due` reduction: what the user gets plus the fee
    pub fn released(&self) -> Result<U256> {
        math::add(self.amount_to_user, self.fees)
    }
}

/// Locked share a fresh deposit starts with
pub fn initial_locked_share(early_repayable_share: u8) -> u16 {
    // 65535 / 255 == 257 exactly
    (u16::from(u8::MAX - early_repayable_share)) * (LOCKED_SHARE_SCALE / SHARE_SCALE)
}

/// Split an early withdrawal at `now` into payout, fee and the locked share
/// left on the deposit. Zero at or before the last withdrawal and at or
/// after maturity.
pub fn compute_early_withdrawal(
    deposit: &DepositSnapshot,
    early_withdraw_fees: u8,
    now: u64,
) -> Result<EarlyWithdrawal> {
    let last = deposit.last_withdraw_time;
    let maturity = deposit.maturity_time;
    if now <= last || now >= maturity || deposit.amount_due.is_zero() {
        return Ok(EarlyWithdrawal::default());
    }

    let scale = U256::from(LOCKED_SHARE_SCALE);
    let period = U256::from(maturity - last);
    let elapsed = U256::from(now - last);
    let remaining = U256::from(maturity - now);

    let unlocked = U256::from(LOCKED_SHARE_SCALE - deposit.locked_share);
    let repayable = math::mul_div(deposit.amount_due, unlocked, scale)?;
    let releasable = math::mul_div(repayable, elapsed, period)?;

    let fee_num = math::mul(U256::from(early_withdraw_fees), remaining)?;
    let fee_den = math::mul(U256::from(SHARE_SCALE), period)?;
    let fees = math::mul_div(releasable, fee_num, fee_den)?;

    let left_due = math::sub(deposit.amount_due, releasable)?;
    let left_repayable = math::sub(repayable, releasable)?;
    let new_locked_share = if left_due.is_zero() {
        0
    } else {
        let free = math::mul_div(left_repayable, scale, left_due)?;
        LOCKED_SHARE_SCALE - free.saturating_to::<u16>()
    };

    Ok(EarlyWithdrawal {
        amount_to_user: math::sub(releasable, fees)?,
        fees,
        new_locked_share,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const E15: u128 = 1_000_000_000_000_000;
    const E18: u128 = 1_000 * E15;
    const HOUR: u64 = 3600;

    fn deposit(repayable_share: u8) -> DepositSnapshot {
        DepositSnapshot {
            amount_due: U256::from(100 * E18),
            last_withdraw_time: 100,
            maturity_time: 1000 * HOUR + 100,
            locked_share: initial_locked_share(repayable_share),
        }
    }

    fn at(d: &DepositSnapshot, fees: u8, now: u64) -> EarlyWithdrawal {
        compute_early_withdrawal(d, fees, now).unwrap()
    }

    #[test]
    fn test_initial_locked_share() {
        assert_eq!(initial_locked_share(255), 0);
        assert_eq!(initial_locked_share(102), 39321);
        assert_eq!(initial_locked_share(0), 65535);
    }

    #[test]
    fn test_zero_outside_window() {
        let d = deposit(192);
        assert_eq!(at(&d, 64, 100).amount_to_user, U256::ZERO);
        assert_eq!(at(&d, 64, d.maturity_time).fees, U256::ZERO);
        assert_eq!(at(&d, 64, d.maturity_time + 1).amount_to_user, U256::ZERO);
        for locked in [deposit(102), deposit(0), d.clone()] {
            assert_eq!(at(&locked, 51, locked.last_withdraw_time), EarlyWithdrawal::default());
            assert_eq!(at(&locked, 51, locked.maturity_time), EarlyWithdrawal::default());
        }
        let near = at(&d, 64, d.maturity_time - 1);
        assert!(near.amount_to_user > U256::ZERO);
        assert!(near.fees > U256::ZERO);
    }

    #[test]
    fn test_fully_repayable_without_fees() {
        let d = deposit(255);
        for (hours, expected) in [(250, 25u128), (500, 50), (750, 75)] {
            let w = at(&d, 0, hours * HOUR + 100);
            assert_eq!(w.amount_to_user, U256::from(expected * E18));
            assert_eq!(w.fees, U256::ZERO);
            assert_eq!(w.new_locked_share, 0);
        }
        assert_eq!(at(&d, 0, 1000 * HOUR + 99).new_locked_share, 0);
    }

    #[test]
    fn test_partially_repayable_locked_share() {
        let d = deposit(102);
        let cases = [(250, 10u128, 43690u16), (500, 20, 49152), (750, 30, 56173)];
        for (hours, expected, locked) in cases {
            let w = at(&d, 0, hours * HOUR + 100);
            assert_eq!(w.amount_to_user, U256::from(expected * E18));
            assert_eq!(w.new_locked_share, locked);
        }
        assert_eq!(at(&d, 0, 1000 * HOUR + 99).new_locked_share, 65535);
    }

    #[test]
    fn test_fee_decays_towards_maturity() {
        let full = deposit(255);
        let cases = [(250, 21_250u128, 3_750u128), (500, 45_000, 5_000), (750, 71_250, 3_750)];
        for (hours, user, fee) in cases {
            let w = at(&full, 51, hours * HOUR + 100);
            assert_eq!(w.amount_to_user, U256::from(user * E15));
            assert_eq!(w.fees, U256::from(fee * E15));
        }

        let partial = deposit(102);
        let cases = [(250, 8_500u128, 1_500u128), (500, 18_000, 2_000), (750, 28_500, 1_500)];
        for (hours, user, fee) in cases {
            let w = at(&partial, 51, hours * HOUR + 100);
            assert_eq!(w.amount_to_user, U256::from(user * E15));
            assert_eq!(w.fees, U256::from(fee * E15));
            assert_eq!(w.released().unwrap(), U256::from((user + fee) * E15));
        }
    }
}
