//! Property tests for emission windows and accumulator accounting
//!
//! Increase cases with PROPTEST_CASES=1000.

use alloy_primitives::{Address, U256};
use kingswap_economics::{
    EmissionSchedule, EmissionStream, Farm, FarmConfig, NewPool, Phase, PoolId, RewardSourceConfig,
};
use proptest::prelude::*;

fn addr(b: u8) -> Address {
    Address::with_last_byte(b)
}

const OWNER: u8 = 0x0E;
const ADMIN: u8 = 0xAD;

prop_compose! {
    fn arb_stream()(
        rate in 1u64..1_000_000,
        phases in prop::collection::vec((1u64..500, 1u64..6), 1..4),
    ) -> (u64, Vec<(u64, u64)>) {
        (rate, phases)
    }
}

prop_compose! {
    fn arb_schedule()(
        start in 0u64..1000,
        streams in prop::collection::vec(arb_stream(), 1..3),
    ) -> EmissionSchedule {
        let streams = streams
            .into_iter()
            .enumerate()
            .map(|(i, (rate, layout))| {
                let mut end = start;
                let phases = layout
                    .into_iter()
                    .map(|(len, weight)| {
                        end += len;
                        Phase { end, weight }
                    })
                    .collect();
                EmissionStream::new(format!("stream-{i}"), U256::from(rate), phases)
            })
            .collect();
        EmissionSchedule::new(start, streams).unwrap()
    }
}

fn sorted3(mut v: [u64; 3]) -> (u64, u64, u64) {
    v.sort_unstable();
    (v[0], v[1], v[2])
}

/// Single-pool farm paying from an uncapped mint, harvest on every touch
fn farm(start: u64) -> (Farm, PoolId) {
    let config = FarmConfig {
        reward_source: RewardSourceConfig::Mint { cap: None },
        ..FarmConfig::stoken_master(start).with_roles(addr(OWNER), addr(ADMIN))
    };
    let farm = Farm::from_config(&config).unwrap();
    let pid = farm
        .add_pool(
            &addr(ADMIN),
            NewPool { stake_token: addr(0x41), secondary_token: Some(addr(0x51)), weight: 1, secondary_multiplier: None },
            0,
        )
        .unwrap();
    farm.set_withdraw_enabled(&addr(ADMIN), pid, true).unwrap();
    (farm, pid)
}

mod emission_tests {
    use super::*;

    proptest! {
        #[test]
        fn test_multiplier_is_additive(schedule in arb_schedule(), points in any::<[u16; 3]>()) {
            let (a, b, c) = sorted3(points.map(|p| u64::from(p) % 4000));
            for i in 0..schedule.streams.len() {
                let whole = schedule.stream_multiplier(i, a, c).unwrap();
                let left = schedule.stream_multiplier(i, a, b).unwrap();
                let right = schedule.stream_multiplier(i, b, c).unwrap();
                prop_assert_eq!(whole, left + right);
            }
            let units = schedule.reward_units(a, c).unwrap();
            prop_assert_eq!(units, schedule.reward_units(a, b).unwrap() + schedule.reward_units(b, c).unwrap());
        }

        #[test]
        fn test_nothing_outside_schedule(schedule in arb_schedule(), extra in 1u64..1000) {
            let start = schedule.start_block;
            let end = schedule.end_block();
            prop_assert_eq!(schedule.reward_units(0, start).unwrap(), U256::ZERO);
            prop_assert_eq!(schedule.reward_units(end, end + extra).unwrap(), U256::ZERO);
            prop_assert_eq!(
                schedule.reward_units(0, end + extra).unwrap(),
                schedule.reward_units(start, end).unwrap()
            );
        }

        #[test]
        fn test_block_rates_sum_to_units(schedule in arb_schedule(), from in 0u64..2500, len in 0u64..300) {
            let to = from + len;
            let mut total = U256::ZERO;
            for block in from..to {
                total += schedule.reward_rate_at(block + 1).unwrap();
            }
            prop_assert_eq!(total, schedule.reward_units(from, to).unwrap());
        }

        #[test]
        fn test_pool_shares_never_exceed_units(
            schedule in arb_schedule(),
            points in any::<[u16; 2]>(),
            weights in prop::collection::vec(1u64..100, 1..5),
        ) {
            let from = u64::from(points[0].min(points[1]));
            let to = u64::from(points[0].max(points[1]));
            let total_weight: u64 = weights.iter().sum();
            let mut shares = U256::ZERO;
            for w in &weights {
                shares += schedule.pool_reward(from, to, *w, total_weight).unwrap();
            }
            prop_assert!(shares <= schedule.reward_units(from, to).unwrap());
        }
    }
}

mod accounting_tests {
    use super::*;

    proptest! {
        #[test]
        fn test_empty_gap_is_skipped(
            start in 0u64..100,
            gap in 0u64..500,
            hold in 1u64..500,
            amount in 1u64..1_000_000,
        ) {
            let (farm, pid) = farm(start);
            let joined = start + gap;
            farm.deposit(addr(1), pid, U256::from(amount), U256::ZERO, joined).unwrap();
            let pool = farm.pool(pid).unwrap();
            prop_assert_eq!(pool.reward.acc_per_share, U256::ZERO);
            prop_assert_eq!(pool.reward.last_reward_block, joined);

            let now = joined + hold;
            let units = farm.reward_units(joined, now).unwrap();
            let pending = farm.pending(pid, &addr(1), now).unwrap().reward;
            prop_assert!(pending <= units);
            prop_assert!(pending + U256::from(1) >= units);
        }

        #[test]
        fn test_second_harvest_pays_nothing(
            amounts in (1u64..1_000_000, 0u64..1_000_000),
            hold in 1u64..10_000,
        ) {
            let (farm, pid) = farm(0);
            farm.deposit(addr(1), pid, U256::from(amounts.0), U256::from(amounts.1), 10).unwrap();
            let first = farm.harvest(addr(1), pid, 10 + hold).unwrap();
            prop_assert!(first.harvest.paid > U256::ZERO);
            let second = farm.harvest(addr(1), pid, 10 + hold).unwrap();
            prop_assert_eq!(second.harvest.paid, U256::ZERO);
            prop_assert_eq!(second.harvest.held, U256::ZERO);
        }

        #[test]
        fn test_nothing_pending_after_principal_change(
            ops in prop::collection::vec((0u8..3, any::<bool>(), 1u64..1_000, 0u64..200), 1..20),
        ) {
            let (farm, pid) = farm(0);
            let mut now = 0;
            for (who, add, amount, step) in ops {
                now += step;
                let user = addr(who + 1);
                let staked = farm.position(pid, &user).map(|p| p.primary).unwrap_or_default();
                let amount = U256::from(amount);
                if add || staked.is_zero() {
                    farm.deposit(user, pid, amount, U256::ZERO, now).unwrap();
                } else {
                    farm.withdraw(user, pid, amount.min(staked), U256::ZERO, now).unwrap();
                }
                prop_assert_eq!(farm.pending(pid, &user, now).unwrap().reward, U256::ZERO);
            }
        }

        #[test]
        fn test_payouts_stay_within_emission(
            ops in prop::collection::vec((0u8..3, 1u64..1_000, 0u64..200), 1..20),
        ) {
            let (farm, pid) = farm(0);
            let mut now = 0;
            for (who, amount, step) in ops {
                now += step;
                farm.deposit(addr(who + 1), pid, U256::from(amount), U256::ZERO, now).unwrap();
            }
            prop_assert!(farm.reward_distributed() <= farm.reward_units(0, now).unwrap());
        }
    }
}

mod ordering_tests {
    use super::*;

    const E18: u128 = 1_000_000_000_000_000_000;

    #[test]
    fn test_same_block_deposits_share_by_stake() {
        for order in [[1u8, 2], [2, 1]] {
            let (farm, pid) = farm(0);
            for who in order {
                let amount = if who == 1 { 10 } else { 30 };
                farm.deposit(addr(who), pid, U256::from(amount), U256::ZERO, 100).unwrap();
            }
            assert_eq!(farm.pool(pid).unwrap().reward.acc_per_share, U256::ZERO);
            assert_eq!(farm.pending(pid, &addr(1), 104).unwrap().reward, U256::from(20 * E18));
            assert_eq!(farm.pending(pid, &addr(2), 104).unwrap().reward, U256::from(60 * E18));
        }
    }
}
