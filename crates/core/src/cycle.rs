//! Per-cycle and per-day removal quotas.

use chrono::NaiveDate;

/// Removal limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
	pub per_cycle: usize,
	pub daily_cap: usize,
}

impl Default for Quota {
	fn default() -> Self {
		Self {
			per_cycle: 15,
			daily_cap: 150,
		}
	}
}

/// Counters carried from one cycle to the next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleState {
	pub attempted_today: usize,
	/// Local calendar day the counters belong to.
	pub day: NaiveDate,
	/// Allowance computed for the most recent cycle.
	pub per_cycle_target: usize,
}

impl CycleState {
	pub fn new(today: NaiveDate) -> Self {
		Self {
			attempted_today: 0,
			day: today,
			per_cycle_target: 0,
		}
	}

	/// Resets the counters when `today` is a different day. Returns `true` on reset.
	pub fn roll_day(&mut self, today: NaiveDate) -> bool {
		if today == self.day {
			return false;
		}
		self.day = today;
		self.attempted_today = 0;
		true
	}

	/// How many removals the next cycle may attempt.
	pub fn allowance(&mut self, quota: &Quota) -> usize {
		let left_today = quota.daily_cap.saturating_sub(self.attempted_today);
		self.per_cycle_target = quota.per_cycle.min(left_today);
		self.per_cycle_target
	}

	/// Adds `removed` to today's count, never past the daily cap. Returns the amount added.
	pub fn record(&mut self, removed: usize, quota: &Quota) -> usize {
		let before = self.attempted_today;
		self.attempted_today = before.saturating_add(removed).min(quota.daily_cap.max(before));
		self.attempted_today - before
	}

	pub fn remaining_today(&self, quota: &Quota) -> usize {
		quota.daily_cap.saturating_sub(self.attempted_today)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn day(d: u32) -> NaiveDate {
		NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
	}

	#[test]
	fn allowance_is_bounded_by_what_is_left_today() {
		let quota = Quota {
			per_cycle: 15,
			daily_cap: 20,
		};
		let mut state = CycleState::new(day(1));
		state.attempted_today = 10;
		assert_eq!(state.allowance(&quota), 10);
		assert_eq!(state.per_cycle_target, 10);
	}

	#[test]
	fn allowance_is_zero_at_the_cap() {
		let quota = Quota::default();
		let mut state = CycleState::new(day(1));
		state.attempted_today = 150;
		assert_eq!(state.allowance(&quota), 0);
	}

	#[test]
	fn record_never_exceeds_cap() {
		let quota = Quota {
			per_cycle: 15,
			daily_cap: 20,
		};
		let mut state = CycleState::new(day(1));
		assert_eq!(state.record(15, &quota), 15);
		assert_eq!(state.record(15, &quota), 5);
		assert_eq!(state.attempted_today, 20);
		assert_eq!(state.remaining_today(&quota), 0);
	}

	#[test]
	fn counters_reset_once_per_day() {
		let mut state = CycleState::new(day(1));
		state.attempted_today = 42;
		assert!(!state.roll_day(day(1)));
		assert_eq!(state.attempted_today, 42);

		assert!(state.roll_day(day(2)));
		assert_eq!(state.attempted_today, 0);
		state.attempted_today = 3;
		assert!(!state.roll_day(day(2)));
		assert_eq!(state.attempted_today, 3);
	}
}
