//! Error types for the orchestration engine.

use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

/// Errors raised by session acquisition, page automation, and scheduling.
///
/// Most of these are recovered locally (a candidate is skipped, a strategy
/// falls through, a session is relaunched). [`PruneError::is_fatal`] marks
/// the ones that should stop the process.
#[derive(Debug, Error)]
pub enum PruneError {
	#[error("{0}")]
	Context(String),

	#[error("browser launch failed: {0}")]
	BrowserLaunch(String),

	#[error("browser profile at {} is locked by another running instance", dir.display())]
	ProfileLocked { dir: PathBuf },

	#[error(
		"browser profile at {} is in use. Set CHROME_ALLOW_TEMP=true to use a dedicated automation profile, or CHROME_CLOSE_EXISTING=true to close the running browser",
		dir.display()
	)]
	ProfileInUse { dir: PathBuf },

	#[error(
		"could not attach to an existing browser at {endpoint}. Start the browser with --remote-debugging-port=9222 and try again. Original error: {reason}"
	)]
	AttachFailed { endpoint: String, reason: String },

	#[error("navigation to {url} failed: {reason}")]
	Navigation { url: String, reason: String },

	#[error("following list unavailable: {0}")]
	ListUnavailable(String),

	#[error("page automation failed: {0}")]
	Driver(String),

	#[error("no live browser session")]
	NoSession,

	#[error(transparent)]
	Runtime(#[from] prune_runtime::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Http(#[from] reqwest::Error),

	#[error(transparent)]
	Url(#[from] url::ParseError),
}

impl PruneError {
	/// Failures the operator has to fix before the process can do anything.
	pub fn is_fatal(&self) -> bool {
		matches!(self, PruneError::AttachFailed { .. } | PruneError::ProfileInUse { .. })
	}

	/// The profile directory is held by another browser process.
	pub fn is_profile_lock(&self) -> bool {
		matches!(self, PruneError::ProfileLocked { .. })
	}

	/// The browser or page behind the driver went away.
	pub fn is_session_closed(&self) -> bool {
		match self {
			PruneError::NoSession => true,
			PruneError::Runtime(err) => err.is_closed(),
			_ => false,
		}
	}
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PruneError>;

/// Swallows step failures that should not abort the caller.
pub(crate) trait Recover<T> {
	/// Replaces any error except a closed session with `fallback`.
	fn recover(self, fallback: T) -> Result<T>;
}

impl<T> Recover<T> for Result<T> {
	fn recover(self, fallback: T) -> Result<T> {
		match self {
			Err(err) if err.is_session_closed() => Err(err),
			Err(err) => {
				debug!(target = "prune.driver", error = %err, "step failed");
				Ok(fallback)
			}
			ok => ok,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn profile_in_use_message_names_the_escape_hatches() {
		let err = PruneError::ProfileInUse {
			dir: PathBuf::from("/home/me/.config/google-chrome"),
		};
		let msg = err.to_string();
		assert!(msg.contains("/home/me/.config/google-chrome"));
		assert!(msg.contains("CHROME_ALLOW_TEMP"));
		assert!(msg.contains("CHROME_CLOSE_EXISTING"));
		assert!(err.is_fatal());
	}

	#[test]
	fn lock_is_recoverable() {
		let err = PruneError::ProfileLocked { dir: PathBuf::from("/tmp/p") };
		assert!(err.is_profile_lock());
		assert!(!err.is_fatal());
	}

	#[test]
	fn closed_runtime_errors_mark_session_closed() {
		let err = PruneError::from(prune_runtime::Error::ConnectionClosed);
		assert!(err.is_session_closed());
		assert!(!PruneError::Driver("x".into()).is_session_closed());
	}

	#[test]
	fn recover_keeps_only_closed_sessions() {
		let soft: Result<bool> = Err(PruneError::Driver("detached node".into()));
		assert!(!soft.recover(false).unwrap());
		let closed: Result<bool> = Err(PruneError::NoSession);
		assert!(closed.recover(false).is_err());
	}
}
