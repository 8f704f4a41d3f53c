//! The following list as rendered by the site.

use tokio::time::sleep;
use tracing::{debug, info};

use crate::auth::Authenticator;
use crate::config::Timings;
use crate::driver::{Intent, ListScope, PageDriver};
use crate::error::{PruneError, Recover, Result};
use crate::site::Site;
use crate::wait::Poll;

/// Checks whether a following list is currently shown.
pub async fn probe_list(page: &dyn PageDriver) -> Result<Option<ListScope>> {
	if page.is_visible(&Intent::ListDialog).await.recover(false)? {
		return Ok(Some(ListScope::Dialog));
	}
	if page.is_visible(&Intent::ListPage).await.recover(false)? {
		return Ok(Some(ListScope::Page));
	}
	Ok(None)
}

/// Opens the following list of `username`, retrying for a bounded time.
///
/// Each attempt visits the list URL directly and, when no list shows up,
/// goes through the profile page's "Following" link instead.
pub async fn open_following_list(
	page: &dyn PageDriver,
	site: &Site,
	auth: &Authenticator,
	timings: &Timings,
	username: &str,
) -> Result<ListScope> {
	let poll = Poll::new(timings.list_open_timeout, timings.list_open_retry);
	let mut attempts = 0usize;
	let opened = poll
		.retry(|| {
			attempts += 1;
			async move {
				match open_once(page, site, auth, timings, username).await {
					Ok(Some(scope)) => Some(Ok(scope)),
					Ok(None) => None,
					Err(err) if err.is_session_closed() => Some(Err(err)),
					Err(err) => {
						debug!(target = "prune.strategy", error = %err, "opening following list failed");
						None
					}
				}
			}
		})
		.await;

	match opened {
		Some(Ok(scope)) => {
			info!(target = "prune.strategy", ?scope, attempts, "following list opened");
			Ok(scope)
		}
		Some(Err(err)) => Err(err),
		None => Err(PruneError::ListUnavailable(format!(
			"no following list for {username} after {attempts} attempts"
		))),
	}
}

async fn open_once(
	page: &dyn PageDriver,
	site: &Site,
	auth: &Authenticator,
	timings: &Timings,
	username: &str,
) -> Result<Option<ListScope>> {
	page.navigate(&site.following_url(username)).await.recover(())?;
	auth.dismiss_popups(page).await?;
	if let Some(scope) = probe_list(page).await? {
		return Ok(Some(scope));
	}

	page.navigate(&site.profile_url(username)).await?;
	auth.dismiss_popups(page).await?;
	let link = Intent::FollowingLink {
		path: site.following_path(username),
	};
	if !page.click(&link).await.recover(false)? {
		debug!(target = "prune.strategy", "following link not found on profile");
	}
	sleep(timings.list_link_settle).await;
	probe_list(page).await
}

/// One actionable row of the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRow {
	pub scope: ListScope,
	/// Position among the currently actionable rows.
	pub index: usize,
	/// Handle shown in the row, when it could be read.
	pub username: Option<String>,
}

/// Walks the actionable rows of an open list, scrolling for more.
///
/// Rows that stay actionable after an attempt are passed over by position
/// on the next scan. The walk ends once two consecutive scrolls reveal
/// nothing new or `cap` rows have been produced.
#[derive(Debug, Clone)]
pub struct UiListCursor {
	scope: ListScope,
	cap: usize,
	skip: usize,
	produced: usize,
	exhausted: bool,
}

const MAX_IDLE_SCROLLS: usize = 2;

impl UiListCursor {
	pub fn new(scope: ListScope, cap: usize) -> Self {
		Self {
			scope,
			cap,
			skip: 0,
			produced: 0,
			exhausted: false,
		}
	}

	pub fn scope(&self) -> ListScope {
		self.scope
	}

	pub fn produced(&self) -> usize {
		self.produced
	}

	/// The last row is still actionable; step past it.
	pub fn mark_stale(&mut self) {
		self.skip += 1;
	}

	pub async fn next(&mut self, page: &dyn PageDriver, timings: &Timings) -> Result<Option<ListRow>> {
		if self.exhausted || self.produced >= self.cap {
			return Ok(None);
		}

		let rows = Intent::Rows { scope: self.scope };
		let mut idle = 0;
		loop {
			let visible = page.count(&rows).await.recover(0)?;
			if visible > self.skip {
				let index = self.skip;
				let username = page
					.read_text(&Intent::RowOwner {
						scope: self.scope,
						index,
					})
					.await
					.recover(None)?;
				self.produced += 1;
				return Ok(Some(ListRow {
					scope: self.scope,
					index,
					username,
				}));
			}
			if idle >= MAX_IDLE_SCROLLS {
				debug!(target = "prune.strategy", produced = self.produced, "list exhausted");
				self.exhausted = true;
				return Ok(None);
			}
			page.scroll(self.scope).await.recover(())?;
			sleep(timings.scroll_settle).await;
			idle += 1;
		}
	}
}
