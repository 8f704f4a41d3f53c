//! Owns the browser and relaunches it when it goes away.
//!
//! # Relaunch flow
//!
//! 1. Every published session carries a generation number and a watcher task
//!    that forwards its browser's `closed` flag as [`SessionEvent::Closed`]
//! 2. Callers that notice a dead page report the same event through
//!    [`SessionHandle::report_closed`]
//! 3. Events for an older generation are dropped; while a relaunch runs the
//!    [`RelaunchGuard`] turns further events into no-ops
//! 4. The relaunch task waits, closes the old browser, then acquires and
//!    authenticates a new one, retrying until it succeeds or shutdown is
//!    requested

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Acquirer, ActiveSession, SessionHandle, SessionState};
use crate::auth::Authenticator;
use crate::config::Timings;
use crate::error::Result;
use crate::wait::{shutdown_requested, sleep_or_shutdown};

/// Notification sent to the supervisor loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
	Closed { generation: u64 },
}

/// Allows one relaunch at a time.
#[derive(Debug, Default)]
pub struct RelaunchGuard(AtomicBool);

impl RelaunchGuard {
	/// Claims the guard; `false` when a relaunch is already running.
	pub fn try_begin(&self) -> bool {
		self.0.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok()
	}

	pub fn release(&self) {
		self.0.store(false, Ordering::Release);
	}

	pub fn is_active(&self) -> bool {
		self.0.load(Ordering::Acquire)
	}
}

struct Inner {
	acquirer: Acquirer,
	auth: Authenticator,
	timings: Timings,
	session: watch::Sender<Option<ActiveSession>>,
	state: watch::Sender<SessionState>,
	events: mpsc::UnboundedSender<SessionEvent>,
	generation: AtomicU64,
	guard: RelaunchGuard,
	relaunches: AtomicUsize,
}

/// Supervises the browser session in a background task.
pub struct SessionSupervisor {
	inner: Arc<Inner>,
	handle: SessionHandle,
	task: JoinHandle<()>,
}

impl SessionSupervisor {
	/// Acquires and authenticates the first session, then starts supervising.
	///
	/// Failures of the first acquisition are returned as is; fatal ones
	/// (attach failure, profile in use) should end the process.
	pub async fn start(
		acquirer: Acquirer,
		auth: Authenticator,
		timings: Timings,
		shutdown: watch::Receiver<bool>,
	) -> Result<Self> {
		let (session, session_rx) = watch::channel(None);
		let (state, state_rx) = watch::channel(SessionState::Launching);
		let (events, events_rx) = mpsc::unbounded_channel();
		let inner = Arc::new(Inner {
			acquirer,
			auth,
			timings,
			session,
			state,
			events: events.clone(),
			generation: AtomicU64::new(0),
			guard: RelaunchGuard::default(),
			relaunches: AtomicUsize::new(0),
		});

		if let Err(err) = inner.establish().await {
			inner.state.send_replace(SessionState::Terminated);
			return Err(err);
		}

		let task = tokio::spawn(Arc::clone(&inner).supervise(events_rx, shutdown));
		Ok(Self {
			inner,
			handle: SessionHandle::new(session_rx, state_rx, events),
			task,
		})
	}

	pub fn handle(&self) -> SessionHandle {
		self.handle.clone()
	}

	/// Relaunches started so far.
	pub fn relaunches(&self) -> usize {
		self.inner.relaunches.load(Ordering::SeqCst)
	}

	/// Waits for the supervisor to finish after shutdown was requested.
	pub async fn join(self) {
		if let Err(err) = self.task.await {
			warn!(target = "prune.session", error = %err, "session supervisor task failed");
		}
	}
}

impl Inner {
	async fn supervise(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<SessionEvent>, mut shutdown: watch::Receiver<bool>) {
		loop {
			tokio::select! {
				_ = shutdown_requested(&mut shutdown) => break,
				event = events.recv() => match event {
					Some(SessionEvent::Closed { generation }) => self.on_closed(generation, shutdown.clone()),
					None => break,
				},
			}
		}

		info!(target = "prune.session", "closing browser");
		self.state.send_replace(SessionState::Terminated);
		if let Some(session) = self.session.send_replace(None) {
			session.browser.close().await;
		}
	}

	fn on_closed(self: &Arc<Self>, generation: u64, shutdown: watch::Receiver<bool>) {
		let current = self.generation.load(Ordering::SeqCst);
		if generation != current {
			debug!(target = "prune.session", generation, current, "ignoring close of a replaced session");
			return;
		}
		if !self.guard.try_begin() {
			debug!(target = "prune.session", generation, "relaunch already in progress");
			return;
		}

		warn!(target = "prune.session", generation, delay = ?self.timings.relaunch_delay, "browser closed; relaunching");
		self.relaunches.fetch_add(1, Ordering::SeqCst);
		self.state.send_replace(SessionState::Closed);
		tokio::spawn(Arc::clone(self).relaunch(shutdown));
	}

	async fn relaunch(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
		if sleep_or_shutdown(self.timings.relaunch_delay, &mut shutdown).await {
			self.state.send_replace(SessionState::Relaunching);
			let old = self.session.borrow().clone();
			if let Some(old) = old {
				old.browser.close().await;
			}

			loop {
				// Dropping an unfinished attempt kills the browser it launched.
				let attempt = tokio::select! {
					attempt = self.establish() => attempt,
					_ = shutdown_requested(&mut shutdown) => break,
				};
				match attempt {
					Ok(session) => {
						if *shutdown.borrow() {
							self.session.send_replace(None);
							session.browser.close().await;
							self.state.send_replace(SessionState::Terminated);
						}
						break;
					}
					Err(err) => {
						warn!(
							target = "prune.session",
							error = %err,
							retry_in = ?self.timings.relaunch_retry,
							"relaunch failed"
						);
						if !sleep_or_shutdown(self.timings.relaunch_retry, &mut shutdown).await {
							break;
						}
					}
				}
			}
		}
		self.guard.release();
	}

	/// Acquires, authenticates, and publishes a new session.
	async fn establish(&self) -> Result<ActiveSession> {
		let (browser, profile) = self.acquirer.acquire().await?;
		if let Err(err) = self.auth.ensure_logged_in(browser.page().as_ref()).await {
			browser.close().await;
			return Err(err);
		}

		let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
		let session = ActiveSession {
			generation,
			profile,
			browser,
		};
		self.watch_closed(&session);
		self.session.send_replace(Some(session.clone()));
		self.state.send_replace(SessionState::Active);
		info!(target = "prune.session", generation, profile = %session.profile, "session active");
		Ok(session)
	}

	fn watch_closed(&self, session: &ActiveSession) {
		let mut closed = session.browser.closed();
		let events = self.events.clone();
		let generation = session.generation;
		tokio::spawn(async move {
			while !*closed.borrow_and_update() {
				if closed.changed().await.is_err() {
					break;
				}
			}
			let _ = events.send(SessionEvent::Closed { generation });
		});
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use tempfile::TempDir;

	use super::*;
	use crate::config::{BrowserConfig, Credentials};
	use crate::error::PruneError;
	use crate::session::Launcher;
	use crate::session::mock::MockLauncher;
	use crate::site::Site;

	const WAIT: Duration = Duration::from_secs(2);

	async fn start(temp: &TempDir, launcher: &Arc<MockLauncher>) -> (SessionSupervisor, watch::Sender<bool>) {
		let timings = Timings::immediate();
		let browser = BrowserConfig {
			user_data_dir: temp.path().join("chrome"),
			fallback_user_data_dir: temp.path().join("pool"),
			..BrowserConfig::default()
		};
		let acquirer = Acquirer::new(browser, timings.clone(), Arc::clone(launcher) as Arc<dyn Launcher>);
		let auth = Authenticator::new(Site::default(), Credentials::default(), timings.clone());
		let (tx, rx) = watch::channel(false);
		let supervisor = SessionSupervisor::start(acquirer, auth, timings, rx).await.unwrap();
		(supervisor, tx)
	}

	async fn wait_for_generation(handle: &mut SessionHandle, generation: u64) -> ActiveSession {
		tokio::time::timeout(WAIT, async {
			loop {
				if let Ok(session) = handle.wait_live(WAIT).await {
					if session.generation >= generation {
						return session;
					}
				}
				tokio::time::sleep(Duration::from_millis(2)).await;
			}
		})
		.await
		.unwrap()
	}

	#[test]
	fn guard_admits_one_holder() {
		let guard = RelaunchGuard::default();
		assert!(guard.try_begin());
		assert!(!guard.try_begin());
		guard.release();
		assert!(guard.try_begin());
	}

	#[tokio::test]
	async fn first_session_is_published() {
		let temp = TempDir::new().unwrap();
		let launcher = Arc::new(MockLauncher::new());
		let (supervisor, _tx) = start(&temp, &launcher).await;

		let session = supervisor.handle().current().unwrap();
		assert_eq!(session.generation, 1);
		assert_eq!(supervisor.handle().state(), SessionState::Active);
	}

	#[tokio::test]
	async fn crashed_browser_is_relaunched() {
		let temp = TempDir::new().unwrap();
		let launcher = Arc::new(MockLauncher::new());
		let (supervisor, _tx) = start(&temp, &launcher).await;
		let mut handle = supervisor.handle();

		launcher.latest().unwrap().crash();
		let session = wait_for_generation(&mut handle, 2).await;

		assert_eq!(session.generation, 2);
		assert_eq!(launcher.launches().len(), 2);
		assert_eq!(supervisor.relaunches(), 1);
	}

	#[tokio::test]
	async fn duplicate_close_events_relaunch_once() {
		let temp = TempDir::new().unwrap();
		let launcher = Arc::new(MockLauncher::new());
		let (supervisor, _tx) = start(&temp, &launcher).await;
		let mut handle = supervisor.handle();

		launcher.latest().unwrap().crash();
		handle.report_closed(1);
		handle.report_closed(1);
		wait_for_generation(&mut handle, 2).await;
		tokio::time::sleep(Duration::from_millis(50)).await;

		assert_eq!(supervisor.relaunches(), 1);
		assert_eq!(launcher.launches().len(), 2);
		assert_eq!(handle.current().unwrap().generation, 2);
	}

	#[tokio::test]
	async fn failed_relaunches_are_retried() {
		let temp = TempDir::new().unwrap();
		let launcher = Arc::new(MockLauncher::new());
		let (supervisor, _tx) = start(&temp, &launcher).await;
		let mut handle = supervisor.handle();

		launcher.fail_next(2);
		launcher.latest().unwrap().crash();
		let session = wait_for_generation(&mut handle, 2).await;

		assert_eq!(session.generation, 2);
		assert_eq!(launcher.launches().len(), 4);
		assert_eq!(supervisor.relaunches(), 1);
	}

	#[tokio::test]
	async fn shutdown_closes_browser() {
		let temp = TempDir::new().unwrap();
		let launcher = Arc::new(MockLauncher::new());
		let (supervisor, tx) = start(&temp, &launcher).await;
		let handle = supervisor.handle();

		tx.send(true).unwrap();
		supervisor.join().await;

		assert_eq!(handle.state(), SessionState::Terminated);
		assert!(handle.current().is_none());
		assert_eq!(launcher.latest().unwrap().close_calls(), 1);
	}

	#[tokio::test]
	async fn shutdown_interrupts_a_pending_relaunch() {
		use crate::driver::MockPage;

		let temp = TempDir::new().unwrap();
		let opened = Arc::new(AtomicUsize::new(0));
		let counter = Arc::clone(&opened);
		let launcher = Arc::new(MockLauncher::with_pages(move || {
			if counter.fetch_add(1, Ordering::SeqCst) == 0 {
				MockPage::default()
			} else {
				MockPage::default().logged_out(false)
			}
		}));
		let timings = Timings {
			login_timeout: Duration::from_millis(300),
			..Timings::immediate()
		};
		let browser = BrowserConfig {
			user_data_dir: temp.path().join("chrome"),
			fallback_user_data_dir: temp.path().join("pool"),
			..BrowserConfig::default()
		};
		let acquirer = Acquirer::new(browser, timings.clone(), Arc::clone(&launcher) as Arc<dyn Launcher>);
		let auth = Authenticator::new(Site::default(), Credentials::default(), timings.clone());
		let (tx, rx) = watch::channel(false);
		let supervisor = SessionSupervisor::start(acquirer, auth, timings, rx).await.unwrap();
		let handle = supervisor.handle();

		launcher.latest().unwrap().crash();
		tokio::time::timeout(WAIT, async {
			while launcher.launches().len() < 2 {
				tokio::time::sleep(Duration::from_millis(2)).await;
			}
		})
		.await
		.unwrap();

		tx.send(true).unwrap();
		tokio::time::timeout(WAIT, supervisor.join()).await.unwrap();
		tokio::time::sleep(Duration::from_millis(500)).await;
		assert_eq!(handle.state(), SessionState::Terminated);
		assert!(handle.current().is_none());
	}

	#[tokio::test]
	async fn fatal_start_failure_is_returned() {
		let temp = TempDir::new().unwrap();
		let launcher = Arc::new(MockLauncher::new());
		launcher.lock(temp.path().join("chrome"));
		let timings = Timings::immediate();
		let browser = BrowserConfig {
			user_data_dir: temp.path().join("chrome"),
			..BrowserConfig::default()
		};
		let acquirer = Acquirer::new(browser, timings.clone(), Arc::clone(&launcher) as Arc<dyn Launcher>);
		let auth = Authenticator::new(Site::default(), Credentials::default(), timings.clone());
		let (_tx, rx) = watch::channel(false);

		let err = SessionSupervisor::start(acquirer, auth, timings, rx).await.err().unwrap();
		assert!(matches!(err, PruneError::ProfileInUse { .. }));
	}

	#[tokio::test]
	async fn wait_live_times_out_without_session() {
		let temp = TempDir::new().unwrap();
		let launcher = Arc::new(MockLauncher::new());
		let (supervisor, tx) = start(&temp, &launcher).await;
		let mut handle = supervisor.handle();
		tx.send(true).unwrap();
		supervisor.join().await;

		let err = handle.wait_live(Duration::from_millis(20)).await.unwrap_err();
		assert!(matches!(err, PruneError::NoSession));
	}
}
