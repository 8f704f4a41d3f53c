//! Browser session lifecycle.
//!
//! [`Acquirer`] turns configuration into a running browser (remote attach,
//! primary profile, fallback pool, temporary profile). [`SessionSupervisor`]
//! owns that browser, watches for it going away and relaunches it; everyone
//! else reads the current session through a [`SessionHandle`].

mod acquire;
pub mod chrome;
pub mod mock;
pub mod profile;
mod supervisor;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

pub use acquire::Acquirer;
pub use supervisor::{RelaunchGuard, SessionEvent, SessionSupervisor};

use crate::driver::PageDriver;
use crate::error::{PruneError, Result};

/// Where the browser's profile came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileKind {
	/// An externally managed browser reached over its debugging endpoint.
	Remote { endpoint: String },
	/// The user's own browser data directory.
	Primary,
	/// Slot of the automation-owned pool; slot 0 is the base directory.
	Pool { slot: usize },
	/// One-off directory created because every pool slot was busy.
	Temporary,
}

/// Profile a session runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDescriptor {
	pub kind: ProfileKind,
	pub user_data_dir: Option<PathBuf>,
	pub profile_directory: Option<String>,
}

impl fmt::Display for ProfileDescriptor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match (&self.kind, &self.user_data_dir) {
			(ProfileKind::Remote { endpoint }, _) => write!(f, "remote browser at {endpoint}"),
			(kind, Some(dir)) => {
				let label = match kind {
					ProfileKind::Primary => "primary profile".to_string(),
					ProfileKind::Pool { slot } => format!("automation profile slot {slot}"),
					_ => "temporary profile".to_string(),
				};
				write!(f, "{label} {}", dir.display())?;
				if let Some(profile) = &self.profile_directory {
					write!(f, " ({profile})")?;
				}
				Ok(())
			}
			(_, None) => f.write_str("unknown profile"),
		}
	}
}

/// What to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
	pub user_data_dir: PathBuf,
	/// Profile directory inside `user_data_dir`; the browser picks one when unset.
	pub profile_directory: Option<String>,
}

/// A running browser with the one page the engine drives.
#[async_trait]
pub trait Browser: Send + Sync {
	fn page(&self) -> Arc<dyn PageDriver>;

	/// Flips to `true` once the browser or its page is gone.
	fn closed(&self) -> watch::Receiver<bool>;

	/// Closes the browser (or detaches from a remote one). Best effort.
	async fn close(&self);
}

/// Starts or attaches to browsers.
#[async_trait]
pub trait Launcher: Send + Sync {
	/// Launches a browser on a profile directory.
	///
	/// Fails with [`PruneError::ProfileLocked`] when another process holds
	/// the profile.
	async fn launch(&self, request: &LaunchRequest) -> Result<Arc<dyn Browser>>;

	/// Attaches to an already running browser.
	async fn attach(&self, endpoint: &str) -> Result<Arc<dyn Browser>>;

	/// Terminates browser processes competing for the primary profile.
	async fn close_competing(&self) -> Result<()>;
}

/// Lifecycle of the supervised session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Launching,
	Active,
	Closed,
	Relaunching,
	Terminated,
}

/// The live session: a browser plus how it was obtained.
#[derive(Clone)]
pub struct ActiveSession {
	pub generation: u64,
	pub profile: ProfileDescriptor,
	pub browser: Arc<dyn Browser>,
}

impl ActiveSession {
	pub fn page(&self) -> Arc<dyn PageDriver> {
		self.browser.page()
	}

	pub fn is_closed(&self) -> bool {
		*self.browser.closed().borrow()
	}
}

impl fmt::Debug for ActiveSession {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ActiveSession")
			.field("generation", &self.generation)
			.field("profile", &self.profile)
			.finish_non_exhaustive()
	}
}

/// Read side of the supervisor.
#[derive(Clone)]
pub struct SessionHandle {
	session: watch::Receiver<Option<ActiveSession>>,
	state: watch::Receiver<SessionState>,
	events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandle {
	pub(crate) fn new(
		session: watch::Receiver<Option<ActiveSession>>,
		state: watch::Receiver<SessionState>,
		events: mpsc::UnboundedSender<SessionEvent>,
	) -> Self {
		Self { session, state, events }
	}

	pub fn state(&self) -> SessionState {
		*self.state.borrow()
	}

	/// The current session, if it is up.
	pub fn current(&self) -> Option<ActiveSession> {
		if self.state() != SessionState::Active {
			return None;
		}
		self.session.borrow().clone().filter(|s| !s.is_closed())
	}

	/// Waits up to `timeout` for a live session.
	pub async fn wait_live(&mut self, timeout: Duration) -> Result<ActiveSession> {
		let wait = async {
			loop {
				if let Some(session) = self.current() {
					return Ok(session);
				}
				if self.state() == SessionState::Terminated {
					return Err(PruneError::NoSession);
				}
				tokio::select! {
					changed = self.session.changed() => changed.map_err(|_| PruneError::NoSession)?,
					changed = self.state.changed() => changed.map_err(|_| PruneError::NoSession)?,
				}
			}
		};
		tokio::time::timeout(timeout, wait).await.unwrap_or(Err(PruneError::NoSession))
	}

	/// Tells the supervisor a session went away, as seen by a caller.
	pub fn report_closed(&self, generation: u64) {
		let _ = self.events.send(SessionEvent::Closed { generation });
	}
}
