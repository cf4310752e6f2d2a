//! # Emission Schedule
//!
//! Block-windowed emission for farm rewards. A schedule starts at
//! `start_block` and carries one or more streams. Each stream pays a fixed
//! `reward_per_block` scaled by the weight of the phase a block falls in.
//!
//! ```text
//!  start          phase 0 end        phase 1 end
//!    |  weight w0      |   weight w1     |   0 afterwards
//!    +-----------------+-----------------+---------------->
//! ```
//!
//! ## Stock schedules
//!
//! | Schedule | Stream | Reward/block | Phases (offset from start, weight) |
//! |----------|--------|--------------|------------------------------------|
//! | Dual stream | yield farming | 5 KING | (1,152,000, 1) |
//! | Dual stream | trade mining | 10 KING | (192,000, 2), (2,304,000, 1) |
//! | Slippage token | stoken | 10 KING | (192,000, 2), (300,000, 1) |
//! | Uniswap co-farm | king | 50 KING | (64,000, 2), (128,000, 1) |
//!
//! The raw multiplier of a stream over `[from, to)` is the phase-weighted
//! block count. Reward units multiply it by `reward_per_block`.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::{FarmError, Result};
use crate::math;

/// One contiguous phase of a stream. It ends (exclusive) at `end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    /// Last block (exclusive) of the phase
    pub end: u64,
    /// Multiplier applied to every block of the phase
    pub weight: u64,
}

/// A reward stream with its own rate and phase layout
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmissionStream {
    /// Display name ("yield-farming", "trade-mining", ...)
    pub name: String,
    /// Reward units per block at weight 1
    #[serde(with = "crate::amount")]
    pub reward_per_block: U256,
    /// Contiguous phases, the first one starts at the schedule start
    pub phases: Vec<Phase>,
}

impl EmissionStream {
    pub fn new(name: impl Into<String>, reward_per_block: U256, phases: Vec<Phase>) -> Self {
        Self {
            name: name.into(),
            reward_per_block,
            phases,
        }
    }

    /// Block at which this stream stops paying
    pub fn end(&self) -> u64 {
        self.phases.last().map(|p| p.end).unwrap_or(0)
    }

    fn multiplier(&self, start: u64, from: u64, to: u64) -> Result<u64> {
        let mut total: u64 = 0;
        let mut lo = start;
        for phase in &self.phases {
            let hi = phase.end;
            let a = from.max(lo);
            let b = to.min(hi);
            if b > a {
                let span = phase
                    .weight
                    .checked_mul(b - a)
                    .ok_or(FarmError::ArithmeticOverflow)?;
                total = total.checked_add(span).ok_or(FarmError::ArithmeticOverflow)?;
            }
            lo = hi;
        }
        Ok(total)
    }
}

/// Full emission schedule: a start block and one or more streams
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmissionSchedule {
    /// First block that accrues rewards
    pub start_block: u64,
    /// Reward streams, all sharing the pool weights
    pub streams: Vec<EmissionStream>,
}

impl EmissionSchedule {
    /// Build and validate a schedule
    pub fn new(start_block: u64, streams: Vec<EmissionStream>) -> Result<Self> {
        let schedule = Self { start_block, streams };
        schedule.validate()?;
        Ok(schedule)
    }

    /// Single stream with a boosted phase followed by a normal one
    pub fn bonus(
        start_block: u64,
        reward_per_block: U256,
        bonus_end: u64,
        bonus_multiplier: u64,
        end_block: u64,
    ) -> Result<Self> {
        Self::new(
            start_block,
            vec![EmissionStream::new(
                "king",
                reward_per_block,
                vec![
                    Phase { end: bonus_end, weight: bonus_multiplier },
                    Phase { end: end_block, weight: 1 },
                ],
            )],
        )
    }

    /// Check phase ordering: every stream has phases, ends strictly increase
    /// and the first end lies after the start block.
    pub fn validate(&self) -> Result<()> {
        if self.streams.is_empty() {
            return Err(FarmError::invalid("schedule has no streams"));
        }
        for stream in &self.streams {
            if stream.phases.is_empty() {
                return Err(FarmError::invalid(format!("stream {} has no phases", stream.name)));
            }
            let mut prev = self.start_block;
            for phase in &stream.phases {
                if phase.end <= prev {
                    return Err(FarmError::invalid(format!(
                        "stream {}: phase end {} must be after {}",
                        stream.name, phase.end, prev
                    )));
                }
                prev = phase.end;
            }
        }
        Ok(())
    }

    /// Last block (exclusive) at which any stream pays
    pub fn end_block(&self) -> u64 {
        self.streams.iter().map(EmissionStream::end).max().unwrap_or(self.start_block)
    }

    fn check_range(from: u64, to: u64) -> Result<()> {
        if from > to {
            return Err(FarmError::invalid(format!("inverted block range {from}..{to}")));
        }
        Ok(())
    }

    /// Raw multiplier of the first stream over `[from, to)`
    pub fn multiplier(&self, from: u64, to: u64) -> Result<u64> {
        self.stream_multiplier(0, from, to)
    }

    /// Raw multiplier of one stream over `[from, to)`
    pub fn stream_multiplier(&self, stream: usize, from: u64, to: u64) -> Result<u64> {
        Self::check_range(from, to)?;
        let s = self
            .streams
            .get(stream)
            .ok_or_else(|| FarmError::not_found(format!("stream {stream}")))?;
        s.multiplier(self.start_block, from, to)
    }

    /// Raw multipliers for every stream, in stream order
    pub fn multipliers(&self, from: u64, to: u64) -> Result<Vec<u64>> {
        Self::check_range(from, to)?;
        self.streams
            .iter()
            .map(|s| s.multiplier(self.start_block, from, to))
            .collect()
    }

    /// Total reward units emitted over `[from, to)` across all streams
    pub fn reward_units(&self, from: u64, to: u64) -> Result<U256> {
        Self::check_range(from, to)?;
        let mut total = U256::ZERO;
        for s in &self.streams {
            let m = s.multiplier(self.start_block, from, to)?;
            total = math::add(total, math::mul(s.reward_per_block, U256::from(m))?)?;
        }
        Ok(total)
    }

    /// Reward credited to a pool over `[from, to)`.
    ///
    /// Each stream is split by weight and floored on its own, so a dual
    /// stream schedule can be a few units below a combined-rate split.
    pub fn pool_reward(&self, from: u64, to: u64, weight: u64, total_weight: u64) -> Result<U256> {
        Self::check_range(from, to)?;
        if total_weight == 0 || weight == 0 {
            return Ok(U256::ZERO);
        }
        let mut total = U256::ZERO;
        for s in &self.streams {
            let m = s.multiplier(self.start_block, from, to)?;
            let units = math::mul(s.reward_per_block, U256::from(m))?;
            let share = math::mul_div(units, U256::from(weight), U256::from(total_weight))?;
            total = math::add(total, share)?;
        }
        Ok(total)
    }

    /// Reward emitted by the single block interval `[block - 1, block)`
    pub fn reward_rate_at(&self, block: u64) -> Result<U256> {
        match block.checked_sub(1) {
            Some(prev) => self.reward_units(prev, block),
            None => Ok(U256::ZERO),
        }
    }

    /// Replace a stream's per-block reward
    pub fn set_reward_per_block(&mut self, stream: usize, reward_per_block: U256) -> Result<()> {
        let s = self
            .streams
            .get_mut(stream)
            .ok_or_else(|| FarmError::not_found(format!("stream {stream}")))?;
        s.reward_per_block = reward_per_block;
        Ok(())
    }

    /// Move the end of one phase. Only phases still running at `now` may
    /// move, and only to a block after `now`.
    pub fn set_phase_end(&mut self, stream: usize, phase: usize, end: u64, now: u64) -> Result<()> {
        let mut next = self.clone();
        let s = next
            .streams
            .get_mut(stream)
            .ok_or_else(|| FarmError::not_found(format!("stream {stream}")))?;
        let p = s
            .phases
            .get_mut(phase)
            .ok_or_else(|| FarmError::not_found(format!("phase {phase} of stream {stream}")))?;
        if p.end <= now {
            return Err(FarmError::invalid(format!("phase {phase} already ended at {}", p.end)));
        }
        if end <= now {
            return Err(FarmError::invalid(format!("new phase end {end} is not after block {now}")));
        }
        p.end = end;
        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Stop a stream at `end`. Phases past `end` are dropped and the phase
    /// containing it is clipped. An `end` past the last phase stretches that
    /// phase, which is only allowed while the stream is still paying.
    pub fn set_stream_end(&mut self, stream: usize, end: u64, now: u64) -> Result<()> {
        if end <= now {
            return Err(FarmError::invalid(format!("new stream end {end} is not after block {now}")));
        }
        let mut next = self.clone();
        let s = next
            .streams
            .get_mut(stream)
            .ok_or_else(|| FarmError::not_found(format!("stream {stream}")))?;
        let old_end = s.end();
        if end > old_end {
            if old_end <= now {
                return Err(FarmError::invalid(format!("stream {} already ended at {old_end}", s.name)));
            }
            if let Some(last) = s.phases.last_mut() {
                last.end = end;
            }
        } else {
            let keep = s.phases.iter().position(|p| p.end >= end).map_or(s.phases.len(), |i| i + 1);
            s.phases.truncate(keep);
            if let Some(last) = s.phases.last_mut() {
                last.end = end;
            }
        }
        next.validate()?;
        *self = next;
        Ok(())
    }
}
