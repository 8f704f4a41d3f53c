//! When the next cycle runs.

use std::time::Duration;

use chrono::{DateTime, Days, NaiveTime, TimeZone, Timelike};

use crate::config::{IntervalMode, ScheduleConfig};

/// How cycle start times are chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleMode {
	/// Fixed local times: each of `hours` at `minute:second`.
	ClockAligned { hours: Vec<u32>, minute: u32, second: u32 },
	/// Start of the next clock hour.
	HourBoundary,
	/// A fixed delay after the previous cycle.
	FixedInterval(Duration),
}

impl ScheduleMode {
	pub fn from_config(config: &ScheduleConfig) -> Self {
		let mut hours: Vec<u32> = config.run_at_hours.iter().copied().filter(|h| *h <= 23).collect();
		hours.sort_unstable();
		hours.dedup();
		if !hours.is_empty() {
			return ScheduleMode::ClockAligned {
				hours,
				minute: config.run_at_minute.min(59),
				second: config.run_at_second.min(59),
			};
		}
		match config.interval_mode {
			IntervalMode::Hourly => ScheduleMode::HourBoundary,
			IntervalMode::Fixed => ScheduleMode::FixedInterval(Duration::from_secs(config.cycle_minutes.max(1) * 60)),
		}
	}

	/// First run time strictly after `now`.
	pub fn next_run<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Tz> {
		let fallback = now.clone() + chrono::Duration::hours(1);
		match self {
			ScheduleMode::ClockAligned { hours, minute, second } => {
				let today = now.date_naive();
				let at = |date: chrono::NaiveDate, hour: u32| {
					let time = NaiveTime::from_hms_opt(hour, *minute, *second)?;
					now.timezone().from_local_datetime(&date.and_time(time)).earliest()
				};
				let later_today = hours.iter().filter_map(|h| at(today, *h)).find(|t| t > now);
				later_today
					.or_else(|| {
						let tomorrow = today.checked_add_days(Days::new(1))?;
						hours.iter().filter_map(|h| at(tomorrow, *h)).find(|t| t > now)
					})
					.unwrap_or(fallback)
			}
			ScheduleMode::HourBoundary => fallback
				.with_minute(0)
				.and_then(|t| t.with_second(0))
				.and_then(|t| t.with_nanosecond(0))
				.filter(|t| t > now)
				.unwrap_or_else(|| now.clone() + chrono::Duration::hours(1)),
			ScheduleMode::FixedInterval(interval) => {
				let step = chrono::Duration::from_std(*interval).unwrap_or_else(|_| chrono::Duration::hours(1));
				now.clone() + step.max(chrono::Duration::seconds(1))
			}
		}
	}
}

/// Mode plus the most recently computed run time.
#[derive(Debug, Clone)]
pub struct Schedule<Tz: TimeZone = chrono::Local> {
	pub mode: ScheduleMode,
	pub next_run: Option<DateTime<Tz>>,
}

impl<Tz: TimeZone> Schedule<Tz> {
	pub fn new(mode: ScheduleMode) -> Self {
		Self { mode, next_run: None }
	}

	/// Computes and stores the run after `now`.
	pub fn advance(&mut self, now: &DateTime<Tz>) -> DateTime<Tz> {
		let next = self.mode.next_run(now);
		self.next_run = Some(next.clone());
		next
	}

	/// Time left until the stored run, zero when due or unset.
	pub fn delay_from(&self, now: &DateTime<Tz>) -> Duration {
		self.next_run
			.as_ref()
			.and_then(|next| (next.clone() - now.clone()).to_std().ok())
			.unwrap_or(Duration::ZERO)
	}
}
