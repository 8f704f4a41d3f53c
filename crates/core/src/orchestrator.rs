//! The long-running cycle loop.
//!
//! Idle, run a cycle, compute the next run, sleep, repeat. Only a shutdown
//! request ends the loop; cycle failures are logged and followed by a
//! cooldown.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::auth::Authenticator;
use crate::clock::Clock;
use crate::config::{Config, Timings};
use crate::cycle::{CycleState, Quota};
use crate::error::Result;
use crate::executor::Executor;
use crate::schedule::{Schedule, ScheduleMode};
use crate::session::SessionHandle;
use crate::site::Site;
use crate::strategy::{CycleReport, StrategyChain, StrategyContext};
use crate::wait::{shutdown_requested, sleep_or_shutdown};

/// Owns the cycle counters, the schedule, and the strategy chain.
pub struct Orchestrator {
	quota: Quota,
	run_on_start: bool,
	state: CycleState,
	schedule: Schedule,
	chain: StrategyChain,
	session: SessionHandle,
	site: Site,
	timings: Timings,
	auth: Authenticator,
	executor: Executor,
	clock: Arc<dyn Clock>,
	username: Option<String>,
}

impl Orchestrator {
	pub fn new(config: &Config, chain: StrategyChain, session: SessionHandle, clock: Arc<dyn Clock>) -> Self {
		let auth = Authenticator::new(config.site.clone(), config.credentials.clone(), config.timings.clone());
		let executor = Executor::new(config.site.clone(), config.timings.clone(), config.verify, auth.clone());
		Self {
			quota: config.quota,
			run_on_start: config.schedule.run_on_start,
			state: CycleState::new(clock.now().date_naive()),
			schedule: Schedule::new(ScheduleMode::from_config(&config.schedule)),
			chain,
			session,
			site: config.site.clone(),
			timings: config.timings.clone(),
			auth,
			executor,
			clock,
			username: config.credentials.username.clone(),
		}
	}

	pub fn state(&self) -> &CycleState {
		&self.state
	}

	pub fn schedule(&self) -> &Schedule {
		&self.schedule
	}

	/// Runs cycles until `shutdown` flips to `true`.
	pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
		self.chain.warn_unfiltered();
		info!(
			target = "prune.cycle",
			per_cycle = self.quota.per_cycle,
			daily_cap = self.quota.daily_cap,
			mode = ?self.schedule.mode,
			strategies = ?self.chain.names(),
			"scheduler started"
		);

		// Configured run hours always wait for their first slot.
		let aligned = matches!(self.schedule.mode, ScheduleMode::ClockAligned { .. });
		if (aligned || !self.run_on_start) && !self.sleep_until_next_run(&mut shutdown).await {
			return;
		}

		loop {
			if *shutdown.borrow() {
				break;
			}
			let report = tokio::select! {
				report = self.run_cycle() => report,
				_ = shutdown_requested(&mut shutdown) => break,
			};
			if let Err(err) = report {
				warn!(target = "prune.cycle", error = %err, cooldown = ?self.timings.cycle_cooldown, "cycle failed");
				if !sleep_or_shutdown(self.timings.cycle_cooldown, &mut shutdown).await {
					break;
				}
				continue;
			}
			if !self.sleep_until_next_run(&mut shutdown).await {
				break;
			}
		}
		info!(target = "prune.cycle", "scheduler stopped");
	}

	async fn sleep_until_next_run(&mut self, shutdown: &mut watch::Receiver<bool>) -> bool {
		let now = self.clock.now();
		let next = self.schedule.advance(&now);
		let delay = self.schedule.delay_from(&now);
		info!(target = "prune.cycle", next_run = %next.format("%Y-%m-%d %H:%M:%S"), in_secs = delay.as_secs(), "next cycle scheduled");
		sleep_or_shutdown(delay, shutdown).await
	}

	/// Runs one cycle against the current live session.
	pub async fn run_cycle(&mut self) -> Result<CycleReport> {
		let today = self.clock.now().date_naive();
		if self.state.roll_day(today) {
			info!(target = "prune.cycle", %today, "new day; daily counter reset");
		}
		let allowed = self.state.allowance(&self.quota);
		if allowed == 0 {
			info!(
				target = "prune.cycle",
				attempted_today = self.state.attempted_today,
				daily_cap = self.quota.daily_cap,
				"daily cap reached; skipping cycle"
			);
			return Ok(CycleReport::default());
		}

		let session = self.session.wait_live(self.timings.session_wait).await?;
		let page = session.page();
		info!(target = "prune.cycle", allowed, generation = session.generation, "cycle started");

		if self.username.is_none() {
			match self.auth.resolve_username(page.as_ref()).await {
				Ok(username) => self.username = username,
				Err(err) => {
					if err.is_session_closed() {
						self.session.report_closed(session.generation);
					}
					return Err(err);
				}
			}
		}

		let ctx = StrategyContext {
			username: self.username.as_deref(),
			site: &self.site,
			timings: &self.timings,
			auth: &self.auth,
			executor: &self.executor,
		};
		let report = self.chain.run_cycle(page.as_ref(), &ctx, allowed).await;
		let recorded = self.state.record(report.removed, &self.quota);
		if report.session_closed {
			warn!(target = "prune.cycle", generation = session.generation, "browser went away during the cycle");
			self.session.report_closed(session.generation);
		}

		info!(
			target = "prune.cycle",
			removed = recorded,
			attempted = report.attempted,
			skipped = report.skipped,
			attempted_today = self.state.attempted_today,
			daily_cap = self.quota.daily_cap,
			"cycle finished"
		);
		Ok(report)
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use tempfile::TempDir;

	use super::*;
	use crate::clock::ManualClock;
	use crate::config::BrowserConfig;
	use crate::driver::MockPage;
	use crate::driver::mock::MockAccount;
	use crate::error::PruneError;
	use crate::filter::SkipRules;
	use crate::session::mock::MockLauncher;
	use crate::session::{Acquirer, Launcher, SessionSupervisor};

	struct Harness {
		_temp: TempDir,
		launcher: Arc<MockLauncher>,
		supervisor: SessionSupervisor,
		shutdown: watch::Sender<bool>,
		clock: ManualClock,
		config: Config,
	}

	impl Harness {
		async fn new(accounts: usize, quota: Quota) -> Self {
			let temp = TempDir::new().unwrap();
			let config = Config {
				quota,
				timings: Timings::immediate(),
				browser: BrowserConfig {
					user_data_dir: temp.path().join("chrome"),
					fallback_user_data_dir: temp.path().join("pool"),
					..BrowserConfig::default()
				},
				..Config::default()
			};
			let launcher = Arc::new(MockLauncher::with_pages(move || {
				MockPage::default().with_accounts((0..accounts).map(|i| MockAccount::following(&format!("user{i}"))))
			}));
			let acquirer = Acquirer::new(
				config.browser.clone(),
				config.timings.clone(),
				Arc::clone(&launcher) as Arc<dyn Launcher>,
			);
			let auth = Authenticator::new(config.site.clone(), config.credentials.clone(), config.timings.clone());
			let (shutdown, rx) = watch::channel(false);
			let supervisor = SessionSupervisor::start(acquirer, auth, config.timings.clone(), rx).await.unwrap();
			Self {
				_temp: temp,
				launcher,
				supervisor,
				shutdown,
				clock: ManualClock::at(2024, 3, 1, 10, 0, 0).unwrap(),
				config,
			}
		}

		fn orchestrator(&self) -> Orchestrator {
			Orchestrator::new(
				&self.config,
				StrategyChain::standard(self.config.site.clone(), SkipRules::default()),
				self.supervisor.handle(),
				Arc::new(self.clock.clone()),
			)
		}

		fn removed(&self) -> usize {
			self.launcher.latest().unwrap().mock_page().removed().len()
		}
	}

	#[tokio::test]
	async fn cycle_removes_up_to_per_cycle_quota() {
		let harness = Harness::new(
			30,
			Quota {
				per_cycle: 5,
				daily_cap: 150,
			},
		)
		.await;
		let mut orchestrator = harness.orchestrator();

		let report = orchestrator.run_cycle().await.unwrap();
		assert_eq!(report.allowed, 5);
		assert_eq!(report.removed, 5);
		assert_eq!(orchestrator.state().attempted_today, 5);
		assert_eq!(harness.removed(), 5);
	}

	#[tokio::test]
	async fn daily_cap_limits_later_cycles() {
		let harness = Harness::new(
			40,
			Quota {
				per_cycle: 15,
				daily_cap: 20,
			},
		)
		.await;
		let mut orchestrator = harness.orchestrator();

		assert_eq!(orchestrator.run_cycle().await.unwrap().removed, 15);
		let second = orchestrator.run_cycle().await.unwrap();
		assert_eq!(second.allowed, 5);
		assert_eq!(second.removed, 5);
		let third = orchestrator.run_cycle().await.unwrap();
		assert_eq!(third.allowed, 0);
		assert_eq!(orchestrator.state().attempted_today, 20);
		assert_eq!(harness.removed(), 20);

		harness.clock.advance(chrono::Duration::days(1));
		assert_eq!(orchestrator.run_cycle().await.unwrap().removed, 15);
		assert_eq!(orchestrator.state().attempted_today, 15);
	}

	#[tokio::test]
	async fn missing_session_is_a_cycle_error() {
		let harness = Harness::new(3, Quota::default()).await;
		let mut orchestrator = harness.orchestrator();
		harness.shutdown.send(true).unwrap();
		harness.supervisor.join().await;

		let err = orchestrator.run_cycle().await.unwrap_err();
		assert!(matches!(err, PruneError::NoSession));
		assert_eq!(orchestrator.state().attempted_today, 0);
	}

	#[tokio::test]
	async fn closed_session_during_cycle_triggers_relaunch() {
		let harness = Harness::new(10, Quota::default()).await;
		let mut orchestrator = harness.orchestrator();
		harness.launcher.latest().unwrap().mock_page().close();

		let report = orchestrator.run_cycle().await;
		assert!(report.map(|r| r.session_closed).unwrap_or(true));

		let mut handle = harness.supervisor.handle();
		let session = tokio::time::timeout(Duration::from_secs(2), async {
			loop {
				if let Some(session) = handle.current().filter(|s| s.generation > 1) {
					return session;
				}
				let _ = handle.wait_live(Duration::from_millis(20)).await;
				tokio::time::sleep(Duration::from_millis(5)).await;
			}
		})
		.await
		.unwrap();
		assert_eq!(session.generation, 2);
		assert_eq!(harness.supervisor.relaunches(), 1);
	}

	#[tokio::test]
	async fn run_loop_stops_on_shutdown() {
		let harness = Harness::new(10, Quota::default()).await;
		let mut orchestrator = harness.orchestrator();
		let (tx, rx) = watch::channel(false);

		let task = tokio::spawn(async move {
			orchestrator.run(rx).await;
			orchestrator
		});
		tokio::time::timeout(Duration::from_secs(2), async {
			while harness.removed() < 10 {
				tokio::time::sleep(Duration::from_millis(5)).await;
			}
		})
		.await
		.unwrap();
		tx.send(true).unwrap();

		let orchestrator = tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
		assert_eq!(orchestrator.state().attempted_today, 10);
		assert!(orchestrator.schedule().next_run.is_some());
	}

	#[tokio::test]
	async fn run_hours_wait_for_first_slot_even_with_run_on_start() {
		use chrono::Timelike;

		let mut harness = Harness::new(10, Quota::default()).await;
		harness.config.schedule.run_at_hours = vec![13];
		assert!(harness.config.schedule.run_on_start);
		let mut orchestrator = harness.orchestrator();
		let (tx, rx) = watch::channel(false);

		let task = tokio::spawn(async move {
			orchestrator.run(rx).await;
			orchestrator
		});
		tokio::time::sleep(Duration::from_millis(200)).await;
		assert_eq!(harness.removed(), 0);
		tx.send(true).unwrap();

		let orchestrator = tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
		assert_eq!(orchestrator.state().attempted_today, 0);
		let next = orchestrator.schedule().next_run.unwrap();
		assert_eq!((next.hour(), next.minute()), (13, 0));
		assert_eq!(next.date_naive(), harness.clock.now().date_naive());
	}
}
