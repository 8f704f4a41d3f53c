//! Turns browser configuration into a running browser.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::time::sleep;
use tracing::{info, warn};

use super::profile::{pool_dirs, select_profile_directory, temporary_dir};
use super::{Browser, LaunchRequest, Launcher, ProfileDescriptor, ProfileKind};
use crate::config::{BrowserConfig, Timings};
use crate::error::{PruneError, Result};

/// Picks the profile and launches (or attaches to) the browser.
#[derive(Clone)]
pub struct Acquirer {
	browser: BrowserConfig,
	timings: Timings,
	launcher: Arc<dyn Launcher>,
}

impl Acquirer {
	pub fn new(browser: BrowserConfig, timings: Timings, launcher: Arc<dyn Launcher>) -> Self {
		Self {
			browser,
			timings,
			launcher,
		}
	}

	/// Obtains a browser.
	///
	/// Remote attach failures and a held primary profile without any
	/// configured way around it are fatal.
	pub async fn acquire(&self) -> Result<(Arc<dyn Browser>, ProfileDescriptor)> {
		if let Some(endpoint) = &self.browser.remote_endpoint {
			info!(target = "prune.session", %endpoint, "attaching to running browser");
			let browser = self.launcher.attach(endpoint).await.map_err(|err| match err {
				err @ PruneError::AttachFailed { .. } => err,
				other => PruneError::AttachFailed {
					endpoint: endpoint.clone(),
					reason: other.to_string(),
				},
			})?;
			let profile = ProfileDescriptor {
				kind: ProfileKind::Remote {
					endpoint: endpoint.clone(),
				},
				user_data_dir: None,
				profile_directory: None,
			};
			return Ok((browser, profile));
		}

		let primary = &self.browser.user_data_dir;
		let profile_directory = select_profile_directory(primary, &self.browser.profile);
		match self.launch(ProfileKind::Primary, primary, profile_directory.clone()).await {
			Err(err) if err.is_profile_lock() => {}
			other => return other,
		}

		if self.browser.close_existing {
			warn!(target = "prune.session", dir = %primary.display(), "primary profile locked; closing the running browser");
			if let Err(err) = self.launcher.close_competing().await {
				warn!(target = "prune.session", error = %err, "could not close the running browser; retrying anyway");
			}
			sleep(self.timings.close_existing_settle).await;
			return self.launch(ProfileKind::Primary, primary, profile_directory).await;
		}

		if !self.browser.allow_temp_profile {
			return Err(PruneError::ProfileInUse { dir: primary.clone() });
		}

		warn!(target = "prune.session", dir = %primary.display(), "primary profile locked; using the automation profile pool");
		self.acquire_from_pool().await
	}

	async fn acquire_from_pool(&self) -> Result<(Arc<dyn Browser>, ProfileDescriptor)> {
		let base = &self.browser.fallback_user_data_dir;
		for (slot, dir) in pool_dirs(base, self.browser.fallback_slots).into_iter().enumerate() {
			if let Err(err) = std::fs::create_dir_all(&dir) {
				warn!(target = "prune.session", dir = %dir.display(), error = %err, "cannot create pool directory");
				continue;
			}
			match self.launch(ProfileKind::Pool { slot }, &dir, None).await {
				Ok(acquired) => return Ok(acquired),
				Err(err) => info!(target = "prune.session", slot, error = %err, "pool slot unavailable"),
			}
		}

		let dir = temporary_dir(base, chrono::Utc::now().timestamp_millis());
		std::fs::create_dir_all(&dir)?;
		warn!(target = "prune.session", dir = %dir.display(), "every pool slot is busy; launching a temporary profile");
		self.launch(ProfileKind::Temporary, &dir, None).await
	}

	async fn launch(
		&self,
		kind: ProfileKind,
		user_data_dir: &Path,
		profile_directory: Option<String>,
	) -> Result<(Arc<dyn Browser>, ProfileDescriptor)> {
		let request = LaunchRequest {
			user_data_dir: PathBuf::from(user_data_dir),
			profile_directory,
		};
		let browser = self.launcher.launch(&request).await?;
		let profile = ProfileDescriptor {
			kind,
			user_data_dir: Some(request.user_data_dir),
			profile_directory: request.profile_directory,
		};
		info!(target = "prune.session", %profile, "browser ready");
		Ok((browser, profile))
	}
}
