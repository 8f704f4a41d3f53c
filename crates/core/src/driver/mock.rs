//! Scripted in-memory page.
//!
//! [`MockPage`] models just enough of the site for the engine to run end to
//! end without a browser: login, interstitials, the following list (dialog or
//! page, lazily loaded on scroll), profile pages with their action button and
//! confirmation step, cookies, and the private API. Tests configure it with
//! the builder methods and inspect what the engine did afterwards.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::{Mutex, MutexGuard};
use prune_protocol::Cookie;
use serde_json::{Value, json};

use super::{Intent, ListScope, PageDriver};
use crate::error::{PruneError, Result};
use crate::site::{SESSION_COOKIE, Site};

/// Relationship between the logged-in account and another account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
	Following,
	Requested,
	NotFollowing,
}

impl Relation {
	fn actionable(self) -> bool {
		!matches!(self, Relation::NotFollowing)
	}
}

/// An account the mock site knows about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockAccount {
	pub username: String,
	pub relation: Relation,
	/// Asks for confirmation after the action button is clicked.
	pub confirm: bool,
	/// Ignores every attempt to remove it.
	pub stuck: bool,
}

impl MockAccount {
	pub fn following(username: &str) -> Self {
		Self {
			username: username.to_string(),
			relation: Relation::Following,
			confirm: true,
			stuck: false,
		}
	}

	pub fn requested(username: &str) -> Self {
		Self {
			relation: Relation::Requested,
			..Self::following(username)
		}
	}

	pub fn without_confirm(mut self) -> Self {
		self.confirm = false;
		self
	}

	pub fn stuck(mut self) -> Self {
		self.stuck = true;
		self
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum View {
	Blank,
	Home,
	List(Option<ListScope>),
	OwnProfile,
	Profile(String),
	AccountEdit,
	Other,
}

#[derive(Debug)]
struct MockState {
	site: Site,
	own_username: String,
	user_id: String,
	logged_in: bool,
	login_form: bool,
	accept_credentials: bool,
	login_after_checks: Option<usize>,
	cookie_banner: bool,
	prompts: usize,
	list_direct: Option<ListScope>,
	list_via_link: Option<ListScope>,
	page_size: usize,
	loaded: usize,
	accounts: Vec<MockAccount>,
	view: View,
	pending: Option<String>,
	api_pages: VecDeque<Option<Value>>,
	current_user_available: bool,
	closed: bool,
	fail_navigation: bool,
	fills: HashMap<&'static str, String>,
	navigations: Vec<String>,
	fetches: Vec<String>,
	actions: Vec<String>,
	scrolls: usize,
	submits: usize,
}

/// In-memory [`PageDriver`].
#[derive(Debug)]
pub struct MockPage {
	state: Mutex<MockState>,
}

impl Default for MockPage {
	fn default() -> Self {
		Self::new("me")
	}
}

impl MockPage {
	/// Logged-in page for `own_username` whose following list opens as a dialog.
	pub fn new(own_username: &str) -> Self {
		Self {
			state: Mutex::new(MockState {
				site: Site::default(),
				own_username: own_username.to_string(),
				user_id: "1001".to_string(),
				logged_in: true,
				login_form: false,
				accept_credentials: true,
				login_after_checks: None,
				cookie_banner: false,
				prompts: 0,
				list_direct: Some(ListScope::Dialog),
				list_via_link: Some(ListScope::Dialog),
				page_size: 12,
				loaded: 0,
				accounts: Vec::new(),
				view: View::Blank,
				pending: None,
				api_pages: VecDeque::new(),
				current_user_available: true,
				closed: false,
				fail_navigation: false,
				fills: HashMap::new(),
				navigations: Vec::new(),
				fetches: Vec::new(),
				actions: Vec::new(),
				scrolls: 0,
				submits: 0,
			}),
		}
	}

	pub fn with_accounts(self, accounts: impl IntoIterator<Item = MockAccount>) -> Self {
		self.state.lock().accounts.extend(accounts);
		self
	}

	/// How the following list renders when visited directly and via the profile link.
	pub fn with_list(self, direct: Option<ListScope>, via_link: Option<ListScope>) -> Self {
		{
			let mut state = self.state.lock();
			state.list_direct = direct;
			state.list_via_link = via_link;
		}
		self
	}

	/// Rows rendered per load.
	pub fn with_page_size(self, page_size: usize) -> Self {
		self.state.lock().page_size = page_size.max(1);
		self
	}

	/// Logged out with a login form that accepts credentials when `accept` is set.
	pub fn logged_out(self, accept: bool) -> Self {
		{
			let mut state = self.state.lock();
			state.logged_in = false;
			state.login_form = true;
			state.accept_credentials = accept;
		}
		self
	}

	/// Logged out until the session cookie has been checked `checks` times.
	pub fn login_after_checks(self, checks: usize) -> Self {
		{
			let mut state = self.state.lock();
			state.logged_in = false;
			state.login_after_checks = Some(checks);
		}
		self
	}

	pub fn with_cookie_banner(self) -> Self {
		self.state.lock().cookie_banner = true;
		self
	}

	pub fn with_prompts(self, prompts: usize) -> Self {
		self.state.lock().prompts = prompts;
		self
	}

	/// Queues answers of the following endpoint; `None` is a failed request.
	pub fn with_api_pages(self, pages: impl IntoIterator<Item = Option<Value>>) -> Self {
		self.state.lock().api_pages.extend(pages);
		self
	}

	pub fn without_current_user(self) -> Self {
		self.state.lock().current_user_available = false;
		self
	}

	pub fn failing_navigation(self) -> Self {
		self.state.lock().fail_navigation = true;
		self
	}

	/// Builds one following-endpoint page for `usernames`.
	pub fn api_page(usernames: &[&str], next_max_id: Option<&str>) -> Value {
		let users: Vec<Value> = usernames
			.iter()
			.enumerate()
			.map(|(i, u)| json!({ "pk": 5000 + i, "username": u }))
			.collect();
		json!({ "users": users, "next_max_id": next_max_id })
	}

	/// Builds one following-endpoint page from raw user objects.
	pub fn api_page_raw(users: Vec<Value>, next_max_id: Option<&str>) -> Value {
		json!({ "users": users, "next_max_id": next_max_id })
	}

	/// Simulates the tab or browser going away.
	pub fn close(&self) {
		self.state.lock().closed = true;
	}

	pub fn set_logged_in(&self, logged_in: bool) {
		self.state.lock().logged_in = logged_in;
	}

	pub fn navigations(&self) -> Vec<String> {
		self.state.lock().navigations.clone()
	}

	pub fn fetches(&self) -> Vec<String> {
		self.state.lock().fetches.clone()
	}

	/// Usernames whose action button was clicked, in order.
	pub fn actions(&self) -> Vec<String> {
		self.state.lock().actions.clone()
	}

	/// Usernames no longer followed.
	pub fn removed(&self) -> Vec<String> {
		self.state
			.lock()
			.accounts
			.iter()
			.filter(|a| a.relation == Relation::NotFollowing)
			.map(|a| a.username.clone())
			.collect()
	}

	pub fn relation(&self, username: &str) -> Option<Relation> {
		self.state
			.lock()
			.accounts
			.iter()
			.find(|a| a.username == username)
			.map(|a| a.relation)
	}

	pub fn scrolls(&self) -> usize {
		self.state.lock().scrolls
	}

	pub fn login_submits(&self) -> usize {
		self.state.lock().submits
	}

	pub fn filled(&self, intent: &Intent) -> Option<String> {
		self.state.lock().fills.get(fill_key(intent)).cloned()
	}

	pub fn is_logged_in(&self) -> bool {
		self.state.lock().logged_in
	}

	fn live(&self) -> Result<MutexGuard<'_, MockState>> {
		let state = self.state.lock();
		if state.closed {
			return Err(PruneError::Runtime(prune_runtime::Error::ConnectionClosed));
		}
		Ok(state)
	}
}

fn fill_key(intent: &Intent) -> &'static str {
	match intent {
		Intent::LoginUsername | Intent::AccountUsername => "username",
		Intent::LoginPassword => "password",
		_ => "other",
	}
}

impl MockState {
	fn path_of<'a>(&self, url: &'a str) -> Option<&'a str> {
		url.strip_prefix(self.site.home_url().as_str())
	}

	fn actionable_loaded(&self) -> Vec<usize> {
		self.accounts
			.iter()
			.take(self.loaded)
			.enumerate()
			.filter(|(_, a)| a.relation.actionable())
			.map(|(i, _)| i)
			.collect()
	}

	fn account_mut(&mut self, username: &str) -> Option<&mut MockAccount> {
		self.accounts.iter_mut().find(|a| a.username == username)
	}

	fn profile_relation(&self) -> Option<Relation> {
		match &self.view {
			View::Profile(u) => self.accounts.iter().find(|a| &a.username == u).map(|a| a.relation),
			_ => None,
		}
	}

	fn open_list(&mut self, scope: Option<ListScope>) {
		self.view = View::List(scope);
		self.loaded = self.page_size.min(self.accounts.len());
	}

	fn count(&self, intent: &Intent) -> usize {
		let on_login = !self.logged_in && self.login_form && self.view == View::Home;
		let hit = |b: bool| usize::from(b);
		match intent {
			Intent::LoginUsername | Intent::LoginPassword | Intent::LoginSubmit => hit(on_login),
			Intent::CookieConsent => hit(self.cookie_banner),
			Intent::DismissPrompt => self.prompts,
			Intent::ListDialog => hit(self.view == View::List(Some(ListScope::Dialog))),
			Intent::ListPage => hit(self.view == View::List(Some(ListScope::Page))),
			Intent::FollowingLink { .. } => hit(self.view == View::OwnProfile),
			Intent::Rows { scope } => {
				if self.view == View::List(Some(*scope)) {
					self.actionable_loaded().len()
				} else {
					0
				}
			}
			Intent::Row { scope, index } | Intent::RowOwner { scope, index } => {
				hit(self.view == View::List(Some(*scope)) && *index < self.actionable_loaded().len())
			}
			Intent::ProfileAction => hit(self.profile_relation().is_some_and(Relation::actionable)),
			Intent::ConfirmUnfollow => hit(self.pending.is_some()),
			Intent::FollowState => hit(self.profile_relation() == Some(Relation::NotFollowing)),
			Intent::AccountUsername => hit(self.view == View::AccountEdit),
		}
	}

	fn act(&mut self, username: String) {
		self.actions.push(username.clone());
		let confirm = self.account_mut(&username).map(|a| a.confirm).unwrap_or(false);
		if confirm {
			self.pending = Some(username);
		} else {
			self.apply(&username);
		}
	}

	fn apply(&mut self, username: &str) {
		if let Some(account) = self.account_mut(username) {
			if !account.stuck {
				account.relation = Relation::NotFollowing;
			}
		}
	}

	fn click(&mut self, intent: &Intent) -> bool {
		if self.count(intent) == 0 {
			return false;
		}
		match intent {
			Intent::LoginSubmit => {
				self.submits += 1;
				let filled = self.fills.contains_key("username") && self.fills.contains_key("password");
				if filled && self.accept_credentials {
					self.logged_in = true;
					self.login_form = false;
				}
			}
			Intent::CookieConsent => self.cookie_banner = false,
			Intent::DismissPrompt => self.prompts -= 1,
			Intent::FollowingLink { .. } => {
				let scope = self.list_via_link;
				self.open_list(scope);
			}
			Intent::Row { index, .. } => {
				let row = self.actionable_loaded()[*index];
				let username = self.accounts[row].username.clone();
				self.act(username);
			}
			Intent::ProfileAction => {
				if let View::Profile(u) = &self.view {
					let username = u.clone();
					self.act(username);
				}
			}
			Intent::ConfirmUnfollow => {
				if let Some(username) = self.pending.take() {
					self.apply(&username);
				}
			}
			_ => {}
		}
		true
	}
}

#[async_trait]
impl PageDriver for MockPage {
	async fn navigate(&self, url: &str) -> Result<()> {
		let mut state = self.live()?;
		state.navigations.push(url.to_string());
		if state.fail_navigation {
			return Err(PruneError::Navigation {
				url: url.to_string(),
				reason: "net::ERR_INTERNET_DISCONNECTED".into(),
			});
		}
		state.pending = None;
		let own = state.own_username.clone();
		let path = state.path_of(url).map(|p| p.trim_end_matches('/').to_string());
		match path.as_deref() {
			Some("") => state.view = View::Home,
			Some("accounts/edit") => state.view = View::AccountEdit,
			Some(p) if p == format!("{own}/following") => {
				let scope = state.list_direct;
				state.open_list(scope);
			}
			Some(p) if p == own => state.view = View::OwnProfile,
			Some(p) if !p.contains('/') => state.view = View::Profile(p.to_string()),
			_ => state.view = View::Other,
		}
		Ok(())
	}

	async fn current_url(&self) -> Result<String> {
		Ok(self.live()?.navigations.last().cloned().unwrap_or_else(|| "about:blank".into()))
	}

	async fn count(&self, intent: &Intent) -> Result<usize> {
		Ok(self.live()?.count(intent))
	}

	async fn click(&self, intent: &Intent) -> Result<bool> {
		Ok(self.live()?.click(intent))
	}

	async fn click_all(&self, intent: &Intent) -> Result<usize> {
		let mut state = self.live()?;
		let visible = state.count(intent);
		let mut clicked = 0;
		for _ in 0..visible {
			if state.click(intent) {
				clicked += 1;
			}
		}
		Ok(clicked)
	}

	async fn fill(&self, intent: &Intent, value: &str) -> Result<bool> {
		let mut state = self.live()?;
		if state.count(intent) == 0 {
			return Ok(false);
		}
		state.fills.insert(fill_key(intent), value.to_string());
		Ok(true)
	}

	async fn read_text(&self, intent: &Intent) -> Result<Option<String>> {
		let state = self.live()?;
		if state.count(intent) == 0 {
			return Ok(None);
		}
		Ok(match intent {
			Intent::AccountUsername => Some(state.own_username.clone()),
			Intent::LoginUsername => state.fills.get("username").cloned(),
			Intent::RowOwner { index, .. } | Intent::Row { index, .. } => {
				let row = state.actionable_loaded()[*index];
				let account = &state.accounts[row];
				Some(match intent {
					Intent::RowOwner { .. } => account.username.clone(),
					_ if account.relation == Relation::Requested => "Requested".to_string(),
					_ => "Following".to_string(),
				})
			}
			_ => None,
		})
	}

	async fn scroll(&self, scope: ListScope) -> Result<()> {
		let mut state = self.live()?;
		state.scrolls += 1;
		if state.view == View::List(Some(scope)) {
			state.loaded = (state.loaded + state.page_size).min(state.accounts.len());
		}
		Ok(())
	}

	async fn cookies(&self) -> Result<Vec<Cookie>> {
		let mut state = self.live()?;
		if let Some(left) = state.login_after_checks {
			if left == 0 {
				state.logged_in = true;
				state.login_after_checks = None;
			} else {
				state.login_after_checks = Some(left - 1);
			}
		}
		let mut cookies = vec![Cookie {
			name: "csrftoken".into(),
			value: "token".into(),
			domain: Some(".instagram.com".into()),
			path: Some("/".into()),
			http_only: false,
			secure: true,
		}];
		if state.logged_in {
			cookies.push(Cookie {
				name: SESSION_COOKIE.into(),
				value: "session".into(),
				domain: Some(".instagram.com".into()),
				path: Some("/".into()),
				http_only: true,
				secure: true,
			});
		}
		Ok(cookies)
	}

	async fn fetch_json(&self, url: &str, _headers: &[(&str, &str)]) -> Result<Option<Value>> {
		let mut state = self.live()?;
		state.fetches.push(url.to_string());
		if !state.logged_in {
			return Ok(None);
		}
		if url.contains("/accounts/current_user/") {
			if !state.current_user_available {
				return Ok(None);
			}
			return Ok(Some(json!({
				"user": { "pk": state.user_id, "username": state.own_username },
				"status": "ok"
			})));
		}
		if url.contains("/following/") {
			return Ok(state.api_pages.pop_front().flatten());
		}
		Ok(None)
	}
}
