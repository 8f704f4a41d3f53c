//! Performs a single unfollow.

use tokio::time::sleep;
use tracing::{debug, info};

use crate::auth::Authenticator;
use crate::candidate::Candidate;
use crate::config::Timings;
use crate::driver::{Intent, PageDriver};
use crate::error::{Recover, Result};
use crate::site::Site;
use crate::source::ListRow;
use crate::wait::Poll;

/// How an attempt whose result could not be observed is counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VerifyPolicy {
	/// Count it as removed.
	#[default]
	Optimistic,
	/// Count it as not removed.
	Strict,
}

/// Result of one unfollow attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
	/// The page switched to the not-following state.
	Confirmed,
	/// The action was performed but the new state never showed up.
	Unverified,
	/// Nothing could be clicked.
	Failed,
}

impl Outcome {
	pub fn counts_as_removed(self, policy: VerifyPolicy) -> bool {
		match self {
			Outcome::Confirmed => true,
			Outcome::Unverified => policy == VerifyPolicy::Optimistic,
			Outcome::Failed => false,
		}
	}
}

/// Clicks through the unfollow flow and paces consecutive attempts.
///
/// Step failures end the attempt as [`Outcome::Failed`]; only a closed
/// session is returned as an error.
#[derive(Debug, Clone)]
pub struct Executor {
	site: Site,
	timings: Timings,
	verify: VerifyPolicy,
	auth: Authenticator,
}

impl Executor {
	pub fn new(site: Site, timings: Timings, verify: VerifyPolicy, auth: Authenticator) -> Self {
		Self {
			site,
			timings,
			verify,
			auth,
		}
	}

	pub fn verify_policy(&self) -> VerifyPolicy {
		self.verify
	}

	pub fn counts(&self, outcome: Outcome) -> bool {
		outcome.counts_as_removed(self.verify)
	}

	/// Unfollows the account behind a row of the open following list.
	pub async fn unfollow_row(&self, page: &dyn PageDriver, row: &ListRow) -> Result<Outcome> {
		let rows = Intent::Rows { scope: row.scope };
		let before = page.count(&rows).await.recover(0)?;
		let action = Intent::Row {
			scope: row.scope,
			index: row.index,
		};
		if !page.click(&action).await.recover(false)? {
			debug!(target = "prune.strategy", index = row.index, "row button vanished");
			return Ok(Outcome::Failed);
		}
		self.confirm(page).await?;
		sleep(self.timings.row_settle).await;

		let rows = &rows;
		let left_list = self
			.verify_poll()
			.retry(|| async move {
				match page.count(rows).await {
					Ok(now) if now < before => Some(Ok(())),
					Err(err) if err.is_session_closed() => Some(Err(err)),
					_ => None,
				}
			})
			.await;
		let outcome = match left_list {
			Some(Ok(())) => Outcome::Confirmed,
			Some(Err(err)) => return Err(err),
			None => Outcome::Unverified,
		};
		self.log(row.username.as_deref().unwrap_or("(list row)"), outcome);
		sleep(self.timings.ui_pacing.sample()).await;
		Ok(outcome)
	}

	/// Visits the candidate's profile and unfollows from there.
	pub async fn unfollow_profile(&self, page: &dyn PageDriver, candidate: &Candidate) -> Result<Outcome> {
		let url = self.site.profile_url(&candidate.username);
		if let Err(err) = page.navigate(&url).await {
			if err.is_session_closed() {
				return Err(err);
			}
			debug!(target = "prune.strategy", user = %candidate.username, error = %err, "profile did not load");
			return Ok(Outcome::Failed);
		}
		self.auth.dismiss_popups(page).await?;
		if !page.click(&Intent::ProfileAction).await.recover(false)? {
			debug!(target = "prune.strategy", user = %candidate.username, "no following button on profile");
			return Ok(Outcome::Failed);
		}
		self.confirm(page).await?;

		let outcome = if self.wait_for(page, &Intent::FollowState, self.verify_poll()).await? {
			Outcome::Confirmed
		} else {
			Outcome::Unverified
		};
		self.log(&candidate.username, outcome);
		sleep(self.timings.profile_pacing.sample()).await;
		Ok(outcome)
	}

	/// Clicks "Unfollow" / "Cancel request" when the site asks for confirmation.
	async fn confirm(&self, page: &dyn PageDriver) -> Result<bool> {
		let appear = Poll::new(self.timings.confirm_poll * 3, self.timings.confirm_poll);
		if !self.wait_for(page, &Intent::ConfirmUnfollow, appear).await? {
			return Ok(false);
		}
		page.click(&Intent::ConfirmUnfollow).await.recover(false)
	}

	async fn wait_for(&self, page: &dyn PageDriver, intent: &Intent, poll: Poll) -> Result<bool> {
		let seen = poll
			.retry(|| async move {
				match page.is_visible(intent).await {
					Ok(true) => Some(Ok(())),
					Err(err) if err.is_session_closed() => Some(Err(err)),
					_ => None,
				}
			})
			.await;
		match seen {
			Some(Ok(())) => Ok(true),
			Some(Err(err)) => Err(err),
			None => Ok(false),
		}
	}

	fn verify_poll(&self) -> Poll {
		Poll::new(self.timings.confirm_timeout, self.timings.confirm_poll)
	}

	fn log(&self, username: &str, outcome: Outcome) {
		match outcome {
			Outcome::Confirmed => info!(target = "prune.strategy", user = %username, "unfollowed"),
			Outcome::Unverified => info!(
				target = "prune.strategy",
				user = %username,
				counted = self.counts(outcome),
				"unfollow not confirmed by the page"
			),
			Outcome::Failed => {}
		}
	}
}
