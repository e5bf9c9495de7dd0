//! Stake accounting: who has locked funds, since when, and how that
//! translates into selection weight for the PoS lottery.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tunable constants governing stake eligibility, shared with the
/// ledger engine's difficulty/reward constants in `crate::config`-like
/// fashion but kept local since they are pure stake-domain knobs.
pub const MIN_STAKE_AMOUNT: u64 = 100;
pub const MIN_STAKE_AGE_MS: i64 = 86_400 * 1000;
pub const STAKE_CHECK_INTERVAL_MS: i64 = 60_000;

/// A day, in milliseconds — the unit `stake_weight`'s growth steps in.
const DAY_MS: i64 = 86_400_000;
const GROWTH_FACTOR: f64 = 1.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StakeInfo {
    pub amount: u64,
    pub stake_start_ms: i64,
    pub last_block_time_ms: i64,
}

impl StakeInfo {
    #[must_use]
    pub const fn new(amount: u64, now_ms: i64) -> Self {
        Self {
            amount,
            stake_start_ms: now_ms,
            last_block_time_ms: now_ms,
        }
    }

    /// `floor(stake_amount * 1.1^d)` where
    /// `d = floor((last_block_time - stake_start) / 86_400_000)`.
    /// Grows in 10% daily steps; only advances when the stake wins a
    /// block and `last_block_time` moves forward.
    #[must_use]
    pub fn weight(&self) -> u64 {
        let elapsed = (self.last_block_time_ms - self.stake_start_ms).max(0);
        let days = (elapsed / DAY_MS) as i32;
        #[allow(clippy::cast_precision_loss)]
        let scaled = self.amount as f64 * GROWTH_FACTOR.powi(days);
        scaled.floor() as u64
    }

    #[must_use]
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        (now_ms - self.stake_start_ms).max(0)
    }

    #[must_use]
    pub fn is_mature(&self, now_ms: i64) -> bool {
        self.age_ms(now_ms) >= MIN_STAKE_AGE_MS
    }

    #[must_use]
    pub fn eligible_to_propose(&self, now_ms: i64) -> bool {
        self.is_mature(now_ms) && now_ms - self.last_block_time_ms >= STAKE_CHECK_INTERVAL_MS
    }
}

/// `address → StakeInfo`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StakeRegistry {
    stakes: HashMap<String, StakeInfo>,
}

impl StakeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, address: &str) -> Option<&StakeInfo> {
        self.stakes.get(address)
    }

    /// Adds to an existing stake or creates a new one, resetting
    /// `stake_start`/`last_block_time` to `now_ms` only on first stake.
    pub fn add(&mut self, address: &str, amount: u64, now_ms: i64) {
        self.stakes
            .entry(address.to_string())
            .and_modify(|info| info.amount += amount)
            .or_insert_with(|| StakeInfo::new(amount, now_ms));
    }

    /// Decrements a stake, removing the entry once it hits zero.
    /// Returns the remaining amount, or `None` if the address had no
    /// stake or the decrement would underflow.
    pub fn subtract(&mut self, address: &str, amount: u64) -> Option<u64> {
        let info = self.stakes.get_mut(address)?;
        let remaining = info.amount.checked_sub(amount)?;
        if remaining == 0 {
            self.stakes.remove(address);
            Some(0)
        } else {
            info.amount = remaining;
            Some(remaining)
        }
    }

    /// Records a block win: advances `last_block_time_ms`.
    pub fn record_win(&mut self, address: &str, now_ms: i64) {
        if let Some(info) = self.stakes.get_mut(address) {
            info.last_block_time_ms = now_ms;
        }
    }

    #[must_use]
    pub fn total_weight(&self) -> u64 {
        self.stakes.values().map(StakeInfo::weight).sum()
    }

    #[must_use]
    pub fn eligible_addresses(&self, now_ms: i64) -> Vec<&String> {
        self.stakes
            .iter()
            .filter(|(_, info)| info.eligible_to_propose(now_ms))
            .map(|(addr, _)| addr)
            .collect()
    }

    /// Probability this address wins a given proposal attempt:
    /// `stake_weight(addr) / sum(stake_weight)`.
    #[must_use]
    pub fn win_probability(&self, address: &str) -> f64 {
        let Some(info) = self.get(address) else {
            return 0.0;
        };
        let total = self.total_weight();
        if total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let probability = info.weight() as f64 / total as f64;
        probability
    }

    pub fn is_empty(&self) -> bool {
        self.stakes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_grows_monotonically_with_age() {
        let start = 0i64;
        let a = StakeInfo {
            amount: 100,
            stake_start_ms: start,
            last_block_time_ms: start + DAY_MS,
        };
        let b = StakeInfo {
            amount: 100,
            stake_start_ms: start,
            last_block_time_ms: start + DAY_MS * 5,
        };
        assert!(b.weight() >= a.weight());
    }

    #[test]
    fn zero_elapsed_time_yields_bare_amount() {
        let info = StakeInfo::new(250, 1_000);
        assert_eq!(info.weight(), 250);
    }

    #[test]
    fn add_then_subtract_removes_entry_at_zero() {
        let mut registry = StakeRegistry::new();
        registry.add("alice", 100, 0);
        assert_eq!(registry.get("alice").unwrap().amount, 100);

        assert_eq!(registry.subtract("alice", 100), Some(0));
        assert!(registry.get("alice").is_none());
    }

    #[test]
    fn subtract_more_than_staked_fails() {
        let mut registry = StakeRegistry::new();
        registry.add("alice", 50, 0);
        assert!(registry.subtract("alice", 100).is_none());
    }

    #[test]
    fn eligibility_requires_age_and_check_interval() {
        let info = StakeInfo::new(200, 0);
        assert!(!info.eligible_to_propose(1000));
        assert!(info.eligible_to_propose(MIN_STAKE_AGE_MS + STAKE_CHECK_INTERVAL_MS));
    }
}
