//! The following list as served by the private web API.

use std::collections::VecDeque;

use prune_protocol::FollowingPage;
use tracing::{debug, warn};

use crate::auth::Authenticator;
use crate::candidate::Candidate;
use crate::driver::PageDriver;
use crate::error::{Recover, Result};
use crate::site::{APP_ID, Site};

/// Paginates the accounts the logged-in user follows.
///
/// The account id is resolved on first use and kept across
/// [`restart`](Self::restart)s. A failed page ends the sequence.
#[derive(Debug, Clone)]
pub struct ApiCursor {
	site: Site,
	user_id: Option<String>,
	token: Option<String>,
	buffer: VecDeque<Candidate>,
	fetched: usize,
	pages: usize,
	cap: usize,
	done: bool,
}

impl ApiCursor {
	pub fn new(site: Site, cap: usize) -> Self {
		Self {
			site,
			user_id: None,
			token: None,
			buffer: VecDeque::new(),
			fetched: 0,
			pages: 0,
			cap,
			done: false,
		}
	}

	/// Starts over from the first page with a new cap.
	pub fn restart(&mut self, cap: usize) {
		self.token = None;
		self.buffer.clear();
		self.fetched = 0;
		self.pages = 0;
		self.cap = cap;
		self.done = false;
	}

	pub fn user_id(&self) -> Option<&str> {
		self.user_id.as_deref()
	}

	/// Candidates fetched since the last restart.
	pub fn fetched(&self) -> usize {
		self.fetched
	}

	pub async fn next(&mut self, page: &dyn PageDriver, auth: &Authenticator) -> Result<Option<Candidate>> {
		loop {
			if let Some(candidate) = self.buffer.pop_front() {
				return Ok(Some(candidate));
			}
			if self.done || self.fetched >= self.cap {
				return Ok(None);
			}
			self.fetch_page(page, auth).await?;
		}
	}

	async fn fetch_page(&mut self, page: &dyn PageDriver, auth: &Authenticator) -> Result<()> {
		let user_id = match &self.user_id {
			Some(id) => id.clone(),
			None => match auth.current_user_id(page).await? {
				Some(id) => {
					debug!(target = "prune.strategy", user_id = %id, "resolved account id");
					self.user_id = Some(id.clone());
					id
				}
				None => {
					warn!(target = "prune.strategy", "could not resolve account id");
					self.done = true;
					return Ok(());
				}
			},
		};

		let url = self
			.site
			.api_url(&self.site.following_api(&user_id, self.token.as_deref()));
		let raw = page.fetch_json(&url, &[("X-IG-App-ID", APP_ID)]).await.recover(None)?;
		let listing = raw.and_then(|v| serde_json::from_value::<FollowingPage>(v).ok());
		let Some(mut listing) = listing.filter(|l| l.users.is_some()) else {
			debug!(target = "prune.strategy", page = self.pages, "following page failed");
			self.done = true;
			return Ok(());
		};
		let users = listing.users.take().unwrap_or_default();

		self.pages += 1;
		let before = self.fetched;
		for candidate in users.into_iter().filter_map(Candidate::from_api) {
			if self.fetched >= self.cap {
				break;
			}
			self.buffer.push_back(candidate);
			self.fetched += 1;
		}
		self.token = listing.next_token();
		debug!(
			target = "prune.strategy",
			page = self.pages,
			added = self.fetched - before,
			more = self.token.is_some(),
			"following page"
		);
		if self.token.is_none() || self.fetched == before {
			self.done = true;
		}
		Ok(())
	}
}
