//! Chrome backend for [`Launcher`].

mod browser;
mod finder;
mod probe;

use std::fs::File;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use prune_runtime::WebSocketTransport;
use prune_runtime::process::{free_local_port, kill_processes_named};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

pub use browser::ChromeBrowser;

use self::browser::PageSettings;
use super::profile::{is_lock_message, lock_holder};
use super::{Browser, LaunchRequest, Launcher};
use crate::config::{BrowserConfig, Timings};
use crate::error::{PruneError, Result};
use crate::site::Site;

const ENDPOINT_POLL: Duration = Duration::from_millis(200);
const ENDPOINT_ATTEMPTS: usize = 50;

/// Launches a local Chrome or attaches to a running one.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
	executable: Option<PathBuf>,
	headless: bool,
	settings: PageSettings,
}

impl ChromeLauncher {
	pub fn new(browser: &BrowserConfig, site: &Site, timings: &Timings) -> Self {
		Self {
			executable: browser.executable.clone(),
			headless: browser.headless,
			settings: PageSettings {
				cookie_url: site.home_url(),
				command_timeout: timings.command_timeout,
				navigation_timeout: timings.navigation_timeout,
			},
		}
	}

	fn executable(&self) -> Result<PathBuf> {
		self.executable
			.clone()
			.or_else(finder::find_chrome_executable)
			.ok_or_else(|| PruneError::BrowserLaunch("could not find a Chrome or Chromium executable; set CHROME_EXECUTABLE".into()))
	}

	fn args(&self, port: u16, request: &LaunchRequest) -> Vec<String> {
		let mut args = vec![
			format!("--remote-debugging-port={port}"),
			format!("--user-data-dir={}", request.user_data_dir.display()),
			"--no-first-run".to_string(),
			"--no-default-browser-check".to_string(),
		];
		if let Some(profile) = &request.profile_directory {
			args.push(format!("--profile-directory={profile}"));
		}
		if self.headless {
			args.push("--headless=new".to_string());
		}
		args
	}
}

#[async_trait]
impl Launcher for ChromeLauncher {
	async fn launch(&self, request: &LaunchRequest) -> Result<Arc<dyn Browser>> {
		let dir = &request.user_data_dir;
		if let Some(pid) = lock_holder(dir) {
			debug!(target = "prune.session", dir = %dir.display(), pid, "profile lock held");
			return Err(PruneError::ProfileLocked { dir: dir.clone() });
		}

		let executable = self.executable()?;
		let port = free_local_port()?;
		let log_path = std::env::temp_dir().join(format!("follow-prune-chrome-{port}.log"));
		let stderr = File::create(&log_path).map(Stdio::from).unwrap_or_else(|_| Stdio::null());

		let mut cmd = Command::new(&executable);
		cmd.args(self.args(port, request))
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(stderr)
			.kill_on_drop(true);
		#[cfg(unix)]
		cmd.process_group(0);

		info!(target = "prune.session", executable = %executable.display(), dir = %dir.display(), port, "launching browser");
		let mut child = cmd
			.spawn()
			.map_err(|e| PruneError::BrowserLaunch(format!("failed to start {}: {e}", executable.display())))?;

		let mut last_error = "endpoint not reachable".to_string();
		for _ in 0..ENDPOINT_ATTEMPTS {
			tokio::time::sleep(ENDPOINT_POLL).await;

			if let Ok(Some(status)) = child.try_wait() {
				let output = std::fs::read_to_string(&log_path).unwrap_or_default();
				let _ = std::fs::remove_file(&log_path);
				// Chrome hands the request to the instance owning the profile and exits.
				if status.success() || is_lock_message(&output) || lock_holder(dir).is_some() {
					return Err(PruneError::ProfileLocked { dir: dir.clone() });
				}
				return Err(PruneError::BrowserLaunch(format!(
					"browser exited before its debugging endpoint came up ({status})"
				)));
			}

			match probe::fetch_local_endpoint(port).await {
				Ok(info) => {
					debug!(target = "prune.session", browser = ?info.browser, "debugging endpoint up");
					let parts = match WebSocketTransport::connect(&info.web_socket_debugger_url).await {
						Ok(parts) => parts,
						Err(err) => {
							reap(child).await;
							return Err(err.into());
						}
					};
					let browser = ChromeBrowser::open(parts, Some(child), self.settings.clone()).await?;
					return Ok(browser);
				}
				Err(err) => last_error = err.to_string(),
			}
		}

		reap(child).await;
		Err(PruneError::BrowserLaunch(format!(
			"debugging endpoint on port {port} never came up: {last_error}"
		)))
	}

	async fn attach(&self, endpoint: &str) -> Result<Arc<dyn Browser>> {
		let attach_failed = |reason: String| PruneError::AttachFailed {
			endpoint: endpoint.to_string(),
			reason,
		};
		let ws_url = if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
			endpoint.to_string()
		} else {
			probe::fetch_endpoint(endpoint)
				.await
				.map_err(|e| attach_failed(e.to_string()))?
				.web_socket_debugger_url
		};
		let parts = WebSocketTransport::connect(&ws_url)
			.await
			.map_err(|e| attach_failed(e.to_string()))?;
		let browser = ChromeBrowser::open(parts, None, self.settings.clone())
			.await
			.map_err(|e| attach_failed(e.to_string()))?;
		Ok(browser)
	}

	async fn close_competing(&self) -> Result<()> {
		let names = finder::competing_process_names();
		let killed = tokio::task::spawn_blocking(move || kill_processes_named(names))
			.await
			.map_err(|e| PruneError::Context(format!("process kill task failed: {e}")))?;
		info!(target = "prune.session", ?killed, "closed running browsers");
		Ok(())
	}
}

/// Kills a launched browser and waits for it to exit.
pub(super) async fn reap(mut child: Child) {
	let pid = child.id();
	if let Err(err) = child.kill().await {
		warn!(target = "prune.session", ?pid, error = %err, "failed to stop browser process");
	}
}

#[cfg(test)]
mod tests {
	use std::path::Path;

	use super::*;

	fn launcher(headless: bool) -> ChromeLauncher {
		let browser = BrowserConfig {
			headless,
			executable: Some(PathBuf::from("/opt/chrome/chrome")),
			..BrowserConfig::default()
		};
		ChromeLauncher::new(&browser, &Site::default(), &Timings::default())
	}

	#[test]
	fn launch_args_carry_profile_and_port() {
		let request = LaunchRequest {
			user_data_dir: PathBuf::from("/data/chrome"),
			profile_directory: Some("Profile 1".into()),
		};
		let args = launcher(false).args(9333, &request);
		assert_eq!(args[0], "--remote-debugging-port=9333");
		assert!(args.contains(&"--user-data-dir=/data/chrome".to_string()));
		assert!(args.contains(&"--profile-directory=Profile 1".to_string()));
		assert!(!args.iter().any(|a| a.starts_with("--headless")));
	}

	#[test]
	fn headless_and_no_profile_directory() {
		let request = LaunchRequest {
			user_data_dir: PathBuf::from("/data/pool"),
			profile_directory: None,
		};
		let args = launcher(true).args(1, &request);
		assert!(args.contains(&"--headless=new".to_string()));
		assert!(!args.iter().any(|a| a.starts_with("--profile-directory")));
	}

	#[test]
	fn configured_executable_skips_discovery() {
		assert_eq!(launcher(false).executable().unwrap(), Path::new("/opt/chrome/chrome"));
	}

	#[tokio::test]
	async fn unreachable_attach_endpoint_is_attach_failure() {
		let port = free_local_port().unwrap();
		let err = launcher(false)
			.attach(&format!("http://127.0.0.1:{port}"))
			.await
			.err()
			.unwrap();
		assert!(matches!(err, PruneError::AttachFailed { .. }));
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn held_profile_is_reported_before_spawning() {
		let temp = tempfile::TempDir::new().unwrap();
		std::os::unix::fs::symlink(format!("host-{}", std::process::id()), temp.path().join("SingletonLock")).unwrap();
		let request = LaunchRequest {
			user_data_dir: temp.path().to_path_buf(),
			profile_directory: None,
		};
		let err = launcher(false).launch(&request).await.err().unwrap();
		assert!(err.is_profile_lock());
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn reap_stops_a_running_child() {
		let child = Command::new("sleep").arg("30").kill_on_drop(true).spawn().unwrap();
		let pid = child.id().unwrap();
		assert!(prune_runtime::process::pid_is_alive(pid));
		reap(child).await;
		assert!(!prune_runtime::process::pid_is_alive(pid));
	}
}
