//! Login detection, login form automation, and account identity.

use tracing::{debug, info, warn};

use crate::config::{Credentials, Timings};
use crate::driver::{Intent, PageDriver};
use crate::error::{Recover, Result};
use crate::site::{SESSION_COOKIE, Site};
use crate::wait::Poll;
use prune_protocol::CurrentUserResponse;

/// Drives the site's authentication UI through a [`PageDriver`].
#[derive(Debug, Clone)]
pub struct Authenticator {
	site: Site,
	credentials: Credentials,
	timings: Timings,
}

impl Authenticator {
	pub fn new(site: Site, credentials: Credentials, timings: Timings) -> Self {
		Self {
			site,
			credentials,
			timings,
		}
	}

	/// Whether the page holds a non-empty session cookie.
	pub async fn is_logged_in(&self, page: &dyn PageDriver) -> Result<bool> {
		let cookies = page.cookies().await.recover(Vec::new())?;
		Ok(cookies.iter().any(|c| c.name == SESSION_COOKIE && !c.value.is_empty()))
	}

	/// Polls the session cookie until it appears or the login window closes.
	pub async fn wait_for_login(&self, page: &dyn PageDriver) -> Result<bool> {
		let poll = Poll::new(self.timings.login_timeout, self.timings.login_poll);
		let outcome = poll
			.retry(|| async move {
				match self.is_logged_in(page).await {
					Ok(true) => Some(Ok(())),
					Ok(false) => None,
					Err(err) => Some(Err(err)),
				}
			})
			.await;
		match outcome {
			Some(Ok(())) => Ok(true),
			Some(Err(err)) => Err(err),
			None => Ok(false),
		}
	}

	/// Makes sure the page is authenticated, filling the login form when
	/// credentials are configured and otherwise waiting for a manual login.
	///
	/// A login that never completes is logged and tolerated; later steps
	/// notice the missing session on their own.
	pub async fn ensure_logged_in(&self, page: &dyn PageDriver) -> Result<()> {
		page.navigate(&self.site.home_url()).await.recover(())?;
		if self.is_logged_in(page).await? {
			debug!(target = "prune.auth", "session cookie present");
			return Ok(());
		}

		self.dismiss_popups(page).await?;
		let form_visible = page.is_visible(&Intent::LoginUsername).await.recover(false)?;
		let (username, password) = match (&self.credentials.username, &self.credentials.password) {
			(Some(u), Some(p)) if form_visible => (u, p),
			_ => {
				info!(
					target = "prune.auth",
					timeout = ?self.timings.login_timeout,
					"waiting for manual login in the browser window (two-factor prompts included)"
				);
				self.finish_login(page).await?;
				return Ok(());
			}
		};

		page.fill(&Intent::LoginUsername, username).await.recover(false)?;
		page.fill(&Intent::LoginPassword, password).await.recover(false)?;
		if !page.click(&Intent::LoginSubmit).await.recover(false)? {
			warn!(target = "prune.auth", "login submit button not found");
		}
		info!(target = "prune.auth", "credentials submitted; complete any challenge in the browser window");
		self.finish_login(page).await
	}

	async fn finish_login(&self, page: &dyn PageDriver) -> Result<()> {
		if self.wait_for_login(page).await? {
			info!(target = "prune.auth", "logged in");
		} else {
			warn!(target = "prune.auth", timeout = ?self.timings.login_timeout, "login not detected; continuing");
		}
		self.dismiss_popups(page).await
	}

	/// Clicks away cookie banners and "save login" / notification prompts.
	pub async fn dismiss_popups(&self, page: &dyn PageDriver) -> Result<()> {
		let cookies = page.click_all(&Intent::CookieConsent).await.recover(0)?;
		let prompts = page.click_all(&Intent::DismissPrompt).await.recover(0)?;
		if cookies + prompts > 0 {
			debug!(target = "prune.auth", cookies, prompts, "dismissed popups");
		}
		Ok(())
	}

	/// Handle of the logged-in account.
	///
	/// Tries configured credentials, then the current-user API, then the
	/// account settings form.
	pub async fn resolve_username(&self, page: &dyn PageDriver) -> Result<Option<String>> {
		if let Some(username) = &self.credentials.username {
			return Ok(Some(username.clone()));
		}
		if let Some(user) = self.current_user(page).await? {
			if let Some(username) = user.username() {
				return Ok(Some(username));
			}
		}

		page.navigate(&self.site.account_edit_url()).await.recover(())?;
		let poll = Poll::new(self.timings.navigation_timeout, self.timings.login_poll.min(self.timings.list_open_retry));
		let username = poll
			.retry(|| async move {
				page.read_text(&Intent::AccountUsername)
					.await
					.ok()
					.flatten()
					.map(|v| v.trim().to_string())
					.filter(|v| !v.is_empty())
			})
			.await;
		if username.is_none() {
			warn!(target = "prune.auth", "could not determine the account username");
		}
		Ok(username)
	}

	/// Numeric id of the logged-in account.
	pub async fn current_user_id(&self, page: &dyn PageDriver) -> Result<Option<String>> {
		Ok(self.current_user(page).await?.and_then(|u| u.user_id()))
	}

	async fn current_user(&self, page: &dyn PageDriver) -> Result<Option<CurrentUserResponse>> {
		let url = self.site.api_url(self.site.current_user_api());
		let Some(raw) = page.fetch_json(&url, &[]).await.recover(None)? else {
			return Ok(None);
		};
		Ok(serde_json::from_value(raw).ok())
	}
}
