use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{Parser, ValueEnum};
use prune::config::{default_fallback_user_data_dir, default_user_data_dir, parse_run_hours};
use prune::{BrowserConfig, Config, Credentials, IntervalMode, Quota, ScheduleConfig, SkipRules, VerifyPolicy};

#[derive(Parser, Debug)]
#[command(name = "follow-prune")]
#[command(about = "Unfollow accounts on a schedule through a supervised Chrome session")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v debug, -vv trace)
	#[arg(short, long, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Accounts to unfollow per cycle
	#[arg(long, env = "UNFOLLOW_PER_CYCLE", default_value_t = 15)]
	pub per_cycle: usize,

	/// Minutes between cycles in fixed interval mode
	#[arg(long, env = "CYCLE_MINUTES", default_value_t = 60)]
	pub cycle_minutes: u64,

	/// Spacing of cycles when no run hours are set
	#[arg(long, env = "INTERVAL_MODE", value_enum, default_value_t = IntervalArg::Hourly)]
	pub interval_mode: IntervalArg,

	/// Upper bound on unfollows per calendar day
	#[arg(long, env = "MAX_UNFOLLOW_PER_DAY", default_value_t = 150)]
	pub daily_cap: usize,

	/// Run the first cycle right away instead of at the first scheduled time
	#[arg(long, env = "RUN_ON_START", action = clap::ArgAction::Set, value_parser = BoolishValueParser::new(), num_args = 0..=1, default_value = "true", default_missing_value = "true")]
	pub run_on_start: bool,

	/// Never unfollow verified accounts (API fallback only)
	#[arg(long, env = "SKIP_VERIFIED", action = clap::ArgAction::Set, value_parser = BoolishValueParser::new(), num_args = 0..=1, default_value = "false", default_missing_value = "true")]
	pub skip_verified: bool,

	/// Never unfollow private accounts (API fallback only)
	#[arg(long, env = "SKIP_PRIVATE", action = clap::ArgAction::Set, value_parser = BoolishValueParser::new(), num_args = 0..=1, default_value = "false", default_missing_value = "true")]
	pub skip_private: bool,

	/// Comma-separated category fragments to keep
	#[arg(long, env = "SKIP_CATEGORIES", default_value = "")]
	pub skip_categories: String,

	/// Comma-separated username fragments to keep
	#[arg(long, env = "SKIP_USERNAMES_CONTAIN", default_value = "")]
	pub skip_usernames_contain: String,

	/// Comma-separated account types to keep (e.g. business, creator)
	#[arg(long, env = "SKIP_ACCOUNT_TYPES", default_value = "")]
	pub skip_account_types: String,

	/// Chrome user data directory [default: the platform's Chrome directory]
	#[arg(long, env = "CHROME_USER_DATA_DIR", value_name = "DIR")]
	pub user_data_dir: Option<PathBuf>,

	/// Profile directory inside the user data directory
	#[arg(long, env = "CHROME_PROFILE", default_value = "Default")]
	pub profile: String,

	/// Base directory of the automation profile pool [default: ~/.follow-prune-chrome]
	#[arg(long, env = "CHROME_FALLBACK_USER_DATA_DIR", value_name = "DIR")]
	pub fallback_user_data_dir: Option<PathBuf>,

	/// Numbered pool directories tried after the base one
	#[arg(long, env = "CHROME_FALLBACK_SLOTS", default_value_t = 5)]
	pub fallback_slots: usize,

	/// Use an automation profile when the primary one is in use
	#[arg(long, env = "CHROME_ALLOW_TEMP", action = clap::ArgAction::Set, value_parser = BoolishValueParser::new(), num_args = 0..=1, default_value = "false", default_missing_value = "true")]
	pub allow_temp_profile: bool,

	/// Close running Chrome instances when the primary profile is in use
	#[arg(long, env = "CHROME_CLOSE_EXISTING", action = clap::ArgAction::Set, value_parser = BoolishValueParser::new(), num_args = 0..=1, default_value = "false", default_missing_value = "true")]
	pub close_existing: bool,

	/// Attach to a running Chrome instead of launching one
	#[arg(long, env = "CHROME_CONNECT_OVER_CDP", action = clap::ArgAction::Set, value_parser = BoolishValueParser::new(), num_args = 0..=1, default_value = "false", default_missing_value = "true")]
	pub connect_over_cdp: bool,

	/// Debugging endpoint used with --connect-over-cdp
	#[arg(long, env = "CHROME_CDP_URL", default_value = "http://localhost:9222")]
	pub cdp_url: String,

	/// Chrome executable [default: auto-discovered]
	#[arg(long, env = "CHROME_EXECUTABLE", value_name = "PATH")]
	pub chrome_path: Option<PathBuf>,

	#[arg(long, env = "CHROME_HEADLESS", action = clap::ArgAction::Set, value_parser = BoolishValueParser::new(), num_args = 0..=1, default_value = "false", default_missing_value = "true")]
	pub headless: bool,

	/// Comma-separated local hours (0-23) to run at; invalid entries are ignored
	#[arg(long, env = "RUN_AT_HOURS", default_value = "")]
	pub run_at_hours: String,

	#[arg(long, env = "RUN_AT_MINUTE", default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=59))]
	pub run_at_minute: u32,

	#[arg(long, env = "RUN_AT_SECOND", default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=59))]
	pub run_at_second: u32,

	/// Login username; without credentials the login is completed by hand
	#[arg(long, env = "IG_USERNAME")]
	pub username: Option<String>,

	#[arg(long, env = "IG_PASSWORD", hide_env_values = true)]
	pub password: Option<String>,

	/// Count an unfollow only when the page confirms it
	#[arg(long, env = "STRICT_VERIFY", action = clap::ArgAction::Set, value_parser = BoolishValueParser::new(), num_args = 0..=1, default_value = "false", default_missing_value = "true")]
	pub strict_verify: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum IntervalArg {
	Hourly,
	Fixed,
}

impl Cli {
	pub fn into_config(self) -> Config {
		Config {
			quota: Quota {
				per_cycle: self.per_cycle,
				daily_cap: self.daily_cap,
			},
			schedule: ScheduleConfig {
				run_on_start: self.run_on_start,
				interval_mode: match self.interval_mode {
					IntervalArg::Hourly => IntervalMode::Hourly,
					IntervalArg::Fixed => IntervalMode::Fixed,
				},
				cycle_minutes: self.cycle_minutes,
				run_at_hours: parse_run_hours(&self.run_at_hours),
				run_at_minute: self.run_at_minute,
				run_at_second: self.run_at_second,
			},
			skip: SkipRules::from_lists(
				self.skip_verified,
				self.skip_private,
				&self.skip_categories,
				&self.skip_usernames_contain,
				&self.skip_account_types,
			),
			browser: BrowserConfig {
				user_data_dir: self.user_data_dir.unwrap_or_else(default_user_data_dir),
				profile: self.profile,
				fallback_user_data_dir: self.fallback_user_data_dir.unwrap_or_else(default_fallback_user_data_dir),
				fallback_slots: self.fallback_slots,
				allow_temp_profile: self.allow_temp_profile,
				close_existing: self.close_existing,
				remote_endpoint: self.connect_over_cdp.then_some(self.cdp_url),
				executable: self.chrome_path,
				headless: self.headless,
			},
			credentials: Credentials::new(self.username, self.password),
			verify: if self.strict_verify {
				VerifyPolicy::Strict
			} else {
				VerifyPolicy::Optimistic
			},
			..Config::default()
		}
	}
}
