//! Wall-clock access, swappable in tests.

use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone};
use parking_lot::Mutex;

/// Source of the current local time.
pub trait Clock: Send + Sync {
	fn now(&self) -> DateTime<Local>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Local> {
		Local::now()
	}
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
	now: Arc<Mutex<DateTime<Local>>>,
}

impl ManualClock {
	pub fn new(now: DateTime<Local>) -> Self {
		Self {
			now: Arc::new(Mutex::new(now)),
		}
	}

	/// Clock at the given local wall time; `None` if that time does not exist locally.
	pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Option<Self> {
		Local
			.with_ymd_and_hms(year, month, day, hour, minute, second)
			.earliest()
			.map(Self::new)
	}

	pub fn set(&self, now: DateTime<Local>) {
		*self.now.lock() = now;
	}

	pub fn advance(&self, by: chrono::Duration) {
		let mut now = self.now.lock();
		*now += by;
	}
}

impl Clock for ManualClock {
	fn now(&self) -> DateTime<Local> {
		*self.now.lock()
	}
}
