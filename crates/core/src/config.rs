//! Engine configuration.
//!
//! The binary fills these structs from flags and environment variables; the
//! engine only ever sees the typed form. Defaults mirror the documented
//! environment defaults.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::cycle::Quota;
use crate::executor::VerifyPolicy;
use crate::filter::SkipRules;
use crate::site::Site;

/// Directory name used for automation-owned browser profiles under `$HOME`.
pub const FALLBACK_PROFILE_DIR_NAME: &str = ".follow-prune-chrome";

/// Fully resolved engine configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
	pub quota: Quota,
	pub schedule: ScheduleConfig,
	pub skip: SkipRules,
	pub browser: BrowserConfig,
	pub credentials: Credentials,
	pub site: Site,
	pub timings: Timings,
	pub verify: VerifyPolicy,
}

/// How cycles are spaced when no explicit run hours are configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IntervalMode {
	/// Start of every clock hour.
	#[default]
	Hourly,
	/// `cycle_minutes` after the previous cycle finished.
	Fixed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
	/// Run the first cycle immediately instead of waiting for the first slot.
	/// Ignored when run hours are configured; those always wait.
	pub run_on_start: bool,
	pub interval_mode: IntervalMode,
	pub cycle_minutes: u64,
	/// Local hours (0-23) to run at; empty means interval scheduling.
	pub run_at_hours: Vec<u32>,
	pub run_at_minute: u32,
	pub run_at_second: u32,
}

impl Default for ScheduleConfig {
	fn default() -> Self {
		Self {
			run_on_start: true,
			interval_mode: IntervalMode::Hourly,
			cycle_minutes: 60,
			run_at_hours: Vec::new(),
			run_at_minute: 0,
			run_at_second: 0,
		}
	}
}

/// Where and how the automation browser is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserConfig {
	/// The user's primary browser data directory.
	pub user_data_dir: PathBuf,
	/// Preferred profile directory name inside `user_data_dir`.
	pub profile: String,
	/// Base directory for the automation-owned fallback profile pool.
	pub fallback_user_data_dir: PathBuf,
	/// Number of numbered pool slots besides the base directory.
	pub fallback_slots: usize,
	pub allow_temp_profile: bool,
	pub close_existing: bool,
	/// Attach to an externally managed browser at this endpoint instead of launching.
	pub remote_endpoint: Option<String>,
	/// Explicit browser executable; discovered when unset.
	pub executable: Option<PathBuf>,
	pub headless: bool,
}

impl Default for BrowserConfig {
	fn default() -> Self {
		Self {
			user_data_dir: default_user_data_dir(),
			profile: "Default".to_string(),
			fallback_user_data_dir: default_fallback_user_data_dir(),
			fallback_slots: 5,
			allow_temp_profile: false,
			close_existing: false,
			remote_endpoint: None,
			executable: None,
			headless: false,
		}
	}
}

/// Optional login credentials. Without them login is completed by hand.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
	pub username: Option<String>,
	pub password: Option<String>,
}

impl Credentials {
	pub fn new(username: Option<String>, password: Option<String>) -> Self {
		let clean = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
		Self {
			username: clean(username),
			password: clean(password),
		}
	}

	/// Both halves present, so the login form can be filled automatically.
	pub fn is_complete(&self) -> bool {
		self.username.is_some() && self.password.is_some()
	}
}

impl fmt::Debug for Credentials {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Credentials")
			.field("username", &self.username)
			.field("password", &self.password.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}

/// Inclusive range for randomized human-pacing delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
	pub min: Duration,
	pub max: Duration,
}

impl Pacing {
	pub const fn new(min_ms: u64, max_ms: u64) -> Self {
		Self {
			min: Duration::from_millis(min_ms),
			max: Duration::from_millis(max_ms),
		}
	}

	pub const fn none() -> Self {
		Self::new(0, 0)
	}

	/// Draws one delay uniformly from the range.
	pub fn sample(&self) -> Duration {
		use rand::Rng;

		if self.max <= self.min {
			return self.min;
		}
		let ms = rand::thread_rng().gen_range(self.min.as_millis() as u64..=self.max.as_millis() as u64);
		Duration::from_millis(ms)
	}
}

/// Every timeout, poll interval, and delay the engine uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timings {
	pub login_timeout: Duration,
	pub login_poll: Duration,
	pub list_open_timeout: Duration,
	pub list_open_retry: Duration,
	pub list_link_settle: Duration,
	pub scroll_settle: Duration,
	pub empty_list_settle: Duration,
	pub confirm_timeout: Duration,
	pub confirm_poll: Duration,
	pub row_settle: Duration,
	pub ui_pacing: Pacing,
	pub profile_pacing: Pacing,
	pub relaunch_delay: Duration,
	pub relaunch_retry: Duration,
	pub close_existing_settle: Duration,
	pub session_wait: Duration,
	pub cycle_cooldown: Duration,
	pub command_timeout: Duration,
	pub navigation_timeout: Duration,
}

impl Default for Timings {
	fn default() -> Self {
		Self {
			login_timeout: Duration::from_secs(10 * 60),
			login_poll: Duration::from_secs(3),
			list_open_timeout: Duration::from_secs(15),
			list_open_retry: Duration::from_secs(1),
			list_link_settle: Duration::from_secs(2),
			scroll_settle: Duration::from_millis(700),
			empty_list_settle: Duration::from_secs(1),
			confirm_timeout: Duration::from_secs(5),
			confirm_poll: Duration::from_millis(300),
			row_settle: Duration::from_millis(200),
			ui_pacing: Pacing::new(800, 1300),
			profile_pacing: Pacing::new(900, 1500),
			relaunch_delay: Duration::from_secs(5),
			relaunch_retry: Duration::from_secs(30),
			close_existing_settle: Duration::from_secs(2),
			session_wait: Duration::from_secs(60),
			cycle_cooldown: Duration::from_secs(5 * 60),
			command_timeout: Duration::from_secs(30),
			navigation_timeout: Duration::from_secs(30),
		}
	}
}

impl Timings {
	/// Near-zero timings for tests and dry runs.
	pub fn immediate() -> Self {
		let tick = Duration::from_millis(1);
		Self {
			login_timeout: Duration::from_millis(20),
			login_poll: tick,
			list_open_timeout: Duration::from_millis(20),
			list_open_retry: tick,
			list_link_settle: Duration::ZERO,
			scroll_settle: Duration::ZERO,
			empty_list_settle: Duration::ZERO,
			confirm_timeout: Duration::from_millis(10),
			confirm_poll: tick,
			row_settle: Duration::ZERO,
			ui_pacing: Pacing::none(),
			profile_pacing: Pacing::none(),
			relaunch_delay: Duration::from_millis(5),
			relaunch_retry: Duration::from_millis(5),
			close_existing_settle: Duration::ZERO,
			session_wait: Duration::from_millis(50),
			cycle_cooldown: Duration::from_millis(5),
			command_timeout: Duration::from_secs(1),
			navigation_timeout: Duration::from_secs(1),
		}
	}
}

/// Splits a comma-separated setting into trimmed, lowercased, non-empty items.
pub fn parse_list(raw: &str) -> Vec<String> {
	raw.split(',').map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty()).collect()
}

/// Parses comma-separated hours, dropping anything that is not an integer in 0..=23.
pub fn parse_run_hours(raw: &str) -> Vec<u32> {
	raw.split(',')
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.filter_map(|s| s.parse::<u32>().ok())
		.filter(|h| *h <= 23)
		.collect()
}

/// Platform default location of the user's Chrome data directory.
pub fn default_user_data_dir() -> PathBuf {
	if cfg!(target_os = "macos") {
		dirs::data_dir()
			.unwrap_or_else(|| home_dir().join("Library").join("Application Support"))
			.join("Google")
			.join("Chrome")
	} else if cfg!(target_os = "windows") {
		dirs::data_local_dir()
			.unwrap_or_else(home_dir)
			.join("Google")
			.join("Chrome")
			.join("User Data")
	} else {
		dirs::config_dir().unwrap_or_else(|| home_dir().join(".config")).join("google-chrome")
	}
}

/// Default base directory of the automation-owned profile pool.
pub fn default_fallback_user_data_dir() -> PathBuf {
	home_dir().join(FALLBACK_PROFILE_DIR_NAME)
}

fn home_dir() -> PathBuf {
	dirs::home_dir()
		.or_else(|| std::env::current_dir().ok())
		.unwrap_or_else(|| PathBuf::from("."))
}
