//! Integration tests for the slippage-token farm
//!
//! LP plus slippage token weighted additively, withdrawals behind a per-pool
//! switch with a fee on both tokens, rewards paid from a funded balance.

use alloy_primitives::{Address, U256};
use kingswap_economics::{
    EmissionSchedule, EmissionStream, Farm, FarmConfig, FarmError, FeeReceivers, NewPool, Phase, PoolId,
    RewardSourceConfig,
};

fn addr(b: u8) -> Address {
    Address::with_last_byte(b)
}

const OWNER: u8 = 0x0E;
const ADMIN: u8 = 0xAD;
const ALICE: u8 = 1;
const BOB: u8 = 2;
const CAROL: u8 = 3;
const JIM: u8 = 0x11;

/// Boosted stream that ends before its bonus phase would
fn farm(start: u64, end: u64, rate: u64, multiplier: u64, reward_source: RewardSourceConfig) -> Farm {
    let schedule = EmissionSchedule::new(
        start,
        vec![EmissionStream::new("stoken", U256::from(rate), vec![Phase { end, weight: 2 }])],
    )
    .unwrap();
    let config = FarmConfig {
        default_secondary_multiplier: U256::from(multiplier),
        reward_source,
        fee_receivers: FeeReceivers { withdraw: addr(JIM), ..FeeReceivers::default() },
        ..FarmConfig::stoken_master(start)
            .with_schedule(schedule)
            .with_roles(addr(OWNER), addr(ADMIN))
    };
    Farm::from_config(&config).unwrap()
}

fn funded(balance: u64) -> RewardSourceConfig {
    RewardSourceConfig::Prefunded { balance: U256::from(balance) }
}

fn pool(farm: &Farm, token: u8, weight: u64, now: u64) -> PoolId {
    farm.add_pool(
        &addr(ADMIN),
        NewPool {
            stake_token: addr(0x40 + token),
            secondary_token: Some(addr(0x80 + token)),
            weight,
            secondary_multiplier: None,
        },
        now,
    )
    .unwrap()
}

fn deposit(farm: &Farm, who: u8, pid: PoolId, lp: u64, stoken: u64, now: u64) -> u64 {
    farm.deposit(addr(who), pid, U256::from(lp), U256::from(stoken), now)
        .unwrap()
        .harvest
        .paid
        .to::<u64>()
}

fn pending(farm: &Farm, who: u8, pid: PoolId, now: u64) -> u64 {
    farm.pending(pid, &addr(who), now).unwrap().reward.to::<u64>()
}

mod accrual_tests {
    use super::*;

    #[test]
    fn test_rewards_only_after_start() {
        let farm = farm(100, 150, 10, 10, funded(10_000));
        let pid = pool(&farm, 1, 100, 0);
        deposit(&farm, BOB, pid, 100, 10, 1);
        assert_eq!(farm.position(pid, &addr(BOB)).unwrap().principal, U256::from(200));
        assert_eq!(deposit(&farm, BOB, pid, 0, 0, 90), 0);
        assert_eq!(deposit(&farm, BOB, pid, 0, 0, 95), 0);
        assert_eq!(deposit(&farm, BOB, pid, 0, 0, 100), 0);
        assert_eq!(deposit(&farm, BOB, pid, 0, 0, 101), 20);
        assert_eq!(deposit(&farm, BOB, pid, 0, 0, 105), 80);
    }

    #[test]
    fn test_no_stake_no_distribution() {
        let farm = farm(200, 300, 50, 10, funded(1000));
        let pid = pool(&farm, 1, 100, 0);
        assert_eq!(farm.reward_available(), Some(U256::from(1000)));

        let r = farm.deposit(addr(BOB), pid, U256::from(10), U256::from(1), 210).unwrap();
        assert_eq!(r.harvest.paid, U256::ZERO);
        assert_eq!(r.deposited.primary, U256::from(10));
        assert_eq!(r.deposited.secondary, U256::from(1));
        assert_eq!(farm.reward_available(), Some(U256::from(1000)));

        assert_eq!(deposit(&farm, BOB, pid, 10, 1, 220), 1000);
        assert_eq!(farm.reward_available(), Some(U256::ZERO));
        let p = farm.pool(pid).unwrap();
        assert_eq!(p.total_primary, U256::from(20));
        assert_eq!(p.total_secondary, U256::from(2));
    }

    #[test]
    fn test_distribution_between_stakers() {
        let farm = farm(300, 400, 50, 10, funded(10_000));
        let pid = pool(&farm, 1, 100, 0);
        deposit(&farm, ALICE, pid, 10, 2, 310);
        deposit(&farm, BOB, pid, 20, 3, 314);
        deposit(&farm, CAROL, pid, 30, 4, 318);
        assert_eq!(deposit(&farm, ALICE, pid, 10, 1, 320), 589);
        assert_eq!(farm.reward_available(), Some(U256::from(9411)));
    }

    #[test]
    fn test_allocation_between_pools() {
        let farm = farm(400, 500, 50, 10, funded(10_000));
        let p0 = pool(&farm, 1, 10, 0);
        deposit(&farm, ALICE, p0, 10, 1, 410);
        let p1 = pool(&farm, 2, 20, 420);
        assert_eq!(pending(&farm, ALICE, p0, 420), 1000);

        deposit(&farm, BOB, p1, 10, 1, 425);
        assert_eq!(pending(&farm, ALICE, p0, 425), 1166);
        assert_eq!(pending(&farm, ALICE, p0, 430), 1333);
        assert_eq!(pending(&farm, BOB, p1, 430), 333);
        assert_eq!(farm.reward_available(), Some(U256::from(10_000)));

        assert_eq!(deposit(&farm, ALICE, p0, 0, 0, 431), 1366);
        assert_eq!(deposit(&farm, BOB, p1, 0, 0, 432), 466);
        assert_eq!(farm.reward_available(), Some(U256::from(8168)));
    }

    #[test]
    fn test_stops_at_end_block() {
        let farm = farm(500, 600, 50, 10, funded(10_000));
        let pid = pool(&farm, 1, 100, 0);
        let err = farm.deposit(addr(ALICE), pid, U256::ZERO, U256::from(1), 589).unwrap_err();
        assert!(matches!(err, FarmError::InvalidParameter(_)));

        deposit(&farm, ALICE, pid, 10, 1, 590);
        assert_eq!(deposit(&farm, ALICE, pid, 0, 1, 591), 100);
        assert_eq!(farm.position(pid, &addr(ALICE)).unwrap().principal, U256::from(30));
        assert_eq!(pending(&farm, ALICE, pid, 605), 900);
        assert_eq!(pending(&farm, ALICE, pid, 5_000), 900);
    }

    #[test]
    fn test_minted_rewards() {
        let farm = farm(700, 800, 50, 10, RewardSourceConfig::Mint { cap: None });
        let pid = pool(&farm, 1, 100, 0);
        deposit(&farm, ALICE, pid, 10, 1, 710);
        assert_eq!(farm.reward_distributed(), U256::ZERO);
        assert_eq!(pending(&farm, ALICE, pid, 720), 1000);
        assert_eq!(farm.reward_distributed(), U256::ZERO);
        assert_eq!(deposit(&farm, ALICE, pid, 0, 0, 730), 2000);
        assert_eq!(farm.reward_distributed(), U256::from(2000));
        assert_eq!(farm.reward_available(), None);
    }

    #[test]
    fn test_unfunded_payout_rolls_back() {
        let farm = farm(100, 200, 10, 10, funded(0));
        let pid = pool(&farm, 1, 100, 0);
        deposit(&farm, ALICE, pid, 10, 0, 100);
        let err = farm.harvest(addr(ALICE), pid, 110).unwrap_err();
        assert_eq!(err, FarmError::InsufficientRewardFunds { required: U256::from(200), available: U256::ZERO });
        // the failed harvest left the pool where it was
        assert_eq!(farm.pool(pid).unwrap().reward.last_reward_block, 100);

        farm.fund(U256::from(1000)).unwrap();
        assert_eq!(farm.harvest(addr(ALICE), pid, 110).unwrap().harvest.paid, U256::from(200));
    }
}

mod withdraw_tests {
    use super::*;

    #[test]
    fn test_withdraw_behind_switch() {
        let farm = farm(800, 900, 50, 10, funded(20_000));
        let pid = pool(&farm, 1, 100, 0);
        deposit(&farm, ALICE, pid, 1000, 1000, 734);

        let err = farm
            .withdraw(addr(ALICE), pid, U256::from(500), U256::from(500), 819)
            .unwrap_err();
        assert!(matches!(err, FarmError::Locked(_)));
        assert!(farm.set_withdraw_enabled(&addr(OWNER), pid, true).is_err());
        farm.set_withdraw_enabled(&addr(ADMIN), pid, true).unwrap();

        let err = farm
            .withdraw(addr(ALICE), pid, U256::from(1100), U256::from(500), 948)
            .unwrap_err();
        assert!(matches!(err, FarmError::InsufficientStake { .. }));

        let r = farm
            .withdraw(addr(ALICE), pid, U256::from(500), U256::from(500), 949)
            .unwrap();
        assert_eq!(r.harvest.paid, U256::from(9999));
        assert_eq!(r.returned.primary, U256::from(495));
        assert_eq!(r.returned.secondary, U256::from(495));
        assert_eq!(r.stake_fee.primary, U256::from(5));
        assert_eq!(r.stake_fee.secondary, U256::from(5));
        assert_eq!(r.principal, U256::from(5500));

        let pos = farm.position(pid, &addr(ALICE)).unwrap();
        assert_eq!(pos.primary, U256::from(500));
        assert_eq!(pos.secondary, U256::from(500));
    }

    #[test]
    fn test_secondary_over_withdraw() {
        let farm = farm(0, 100, 1, 10, funded(1000));
        let pid = pool(&farm, 1, 100, 0);
        farm.set_withdraw_enabled(&addr(ADMIN), pid, true).unwrap();
        deposit(&farm, ALICE, pid, 10, 2, 1);
        let err = farm.withdraw(addr(ALICE), pid, U256::ZERO, U256::from(3), 2).unwrap_err();
        assert_eq!(err, FarmError::InsufficientStake { requested: U256::from(3), available: U256::from(2) });
        let r = farm.withdraw(addr(ALICE), pid, U256::ZERO, U256::from(2), 2).unwrap();
        assert_eq!(r.principal, U256::from(10));
    }

    #[test]
    fn test_emergency_withdraw() {
        let farm = farm(950, 1050, 50, 10, funded(20_000));
        let pid = pool(&farm, 1, 100, 0);
        assert!(matches!(farm.emergency_withdraw(addr(ALICE), pid, 940), Err(FarmError::Locked(_))));
        farm.set_withdraw_enabled(&addr(ADMIN), pid, true).unwrap();
        assert!(matches!(
            farm.emergency_withdraw(addr(ALICE), pid, 941),
            Err(FarmError::InsufficientStake { .. })
        ));

        deposit(&farm, ALICE, pid, 1000, 1000, 942);
        let r = farm.emergency_withdraw(addr(ALICE), pid, 1060).unwrap();
        assert_eq!(r.harvest.paid, U256::ZERO);
        assert_eq!(r.returned.primary, U256::from(990));
        assert_eq!(r.returned.secondary, U256::from(990));
        assert_eq!(r.stake_fee.primary, U256::from(10));
        assert_eq!(r.stake_fee.secondary, U256::from(10));
        assert_eq!(r.secondary_forfeited, U256::ZERO);
        assert!(farm.position(pid, &addr(ALICE)).is_none());
        assert_eq!(farm.reward_available(), Some(U256::from(20_000)));
    }
}

mod admin_tests {
    use super::*;

    #[test]
    fn test_burn_for_pool() {
        let farm = farm(0, 300_000, 10, 200, funded(0));
        let p0 = pool(&farm, 1, 100, 0);
        pool(&farm, 2, 100, 0);
        let r = farm.burn_reward_for_pool(addr(ALICE), p0, U256::from(1000)).unwrap();
        assert_eq!(r.pool_total, U256::from(1000));
        assert_eq!(r.user, addr(ALICE));
        let r = farm.burn_reward_for_pool(addr(ALICE), p0, U256::from(2000)).unwrap();
        assert_eq!(r.amount, U256::from(2000));
        assert_eq!(farm.pool(p0).unwrap().burned_reward, U256::from(3000));
        assert!(farm.burn_reward_for_pool(addr(ALICE), PoolId(5), U256::from(1)).is_err());
    }

    #[test]
    fn test_set_admin() {
        let farm = farm(0, 300_000, 10, 200, funded(0));
        assert_eq!(farm.roles().admin(), addr(ADMIN));
        assert!(farm.set_admin(&addr(ADMIN), addr(ALICE)).is_err());
        farm.set_admin(&addr(OWNER), addr(ALICE)).unwrap();
        assert_eq!(farm.roles().admin(), addr(ALICE));
        let spec = NewPool {
            stake_token: addr(0x41),
            secondary_token: Some(addr(0x81)),
            weight: 1,
            secondary_multiplier: None,
        };
        assert!(farm.add_pool(&addr(ADMIN), spec.clone(), 0).is_err());
        farm.add_pool(&addr(ALICE), spec, 0).unwrap();
    }

    #[test]
    fn test_schedule_changes_need_funding() {
        let farm = farm(0, 300_000, 10, 200, funded(0));
        assert_eq!(farm.settings().default_secondary_multiplier, U256::from(200));

        let err = farm.set_stream_end(&addr(ADMIN), 0, 500_000, 0).unwrap_err();
        assert!(matches!(err, FarmError::InvalidParameter(_)));
        farm.fund(U256::from(10_000_000)).unwrap();
        assert!(farm.set_stream_end(&addr(ALICE), 0, 500_000, 0).is_err());
        farm.set_stream_end(&addr(ADMIN), 0, 500_000, 0).unwrap();
        assert_eq!(farm.schedule().end_block(), 500_000);

        assert!(farm.set_reward_per_block(&addr(ADMIN), 0, U256::from(20), 0).is_err());
        farm.set_reward_per_block(&addr(ADMIN), 0, U256::from(5), 0).unwrap();
        assert_eq!(farm.reward_rate_at(1).unwrap(), U256::from(10));
    }
}
