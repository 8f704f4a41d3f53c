//! URLs of the site being automated.

use url::Url;

use crate::error::Result;

/// Web app id the site's own frontend sends with private API calls.
pub const APP_ID: &str = "936619743392459";

/// Page size requested from the following endpoint.
pub const FOLLOWING_PAGE_SIZE: usize = 50;

/// Name of the cookie that is present only for authenticated sessions.
pub const SESSION_COOKIE: &str = "sessionid";

const DEFAULT_BASE: &str = "https://www.instagram.com/";

/// Base URL of the site plus the paths the engine visits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
	base: Url,
}

impl Default for Site {
	fn default() -> Self {
		Self {
			base: Url::parse(DEFAULT_BASE).expect("default base url is valid"),
		}
	}
}

impl Site {
	/// Parses a base URL; a trailing slash is added when missing.
	pub fn new(base: &str) -> Result<Self> {
		let mut base = Url::parse(base)?;
		if !base.path().ends_with('/') {
			let path = format!("{}/", base.path());
			base.set_path(&path);
		}
		Ok(Self { base })
	}

	pub fn base(&self) -> &Url {
		&self.base
	}

	/// Host of the base URL, used to filter cookies.
	pub fn host(&self) -> &str {
		self.base.host_str().unwrap_or_default()
	}

	pub fn home_url(&self) -> String {
		self.base.to_string()
	}

	pub fn login_url(&self) -> String {
		self.join("accounts/login/")
	}

	pub fn account_edit_url(&self) -> String {
		self.join("accounts/edit/")
	}

	pub fn profile_url(&self, username: &str) -> String {
		self.join(&format!("{}/", encode_segment(username)))
	}

	pub fn following_url(&self, username: &str) -> String {
		self.join(&format!("{}/following/", encode_segment(username)))
	}

	/// Relative path of the following link on a profile page.
	pub fn following_path(&self, username: &str) -> String {
		format!("/{}/following/", encode_segment(username))
	}

	/// Relative endpoint resolving the logged-in account.
	pub fn current_user_api(&self) -> &'static str {
		"/api/v1/accounts/current_user/"
	}

	/// Relative endpoint for one page of accounts followed by `user_id`.
	pub fn following_api(&self, user_id: &str, max_id: Option<&str>) -> String {
		let mut path = format!(
			"/api/v1/friendships/{}/following/?count={FOLLOWING_PAGE_SIZE}",
			encode_segment(user_id)
		);
		if let Some(max_id) = max_id {
			path.push_str("&max_id=");
			path.push_str(&encode_segment(max_id));
		}
		path
	}

	/// Absolute URL of a relative API endpoint.
	pub fn api_url(&self, endpoint: &str) -> String {
		self.join(endpoint.trim_start_matches('/'))
	}

	fn join(&self, path: &str) -> String {
		self.base
			.join(path)
			.map(|u| u.to_string())
			.unwrap_or_else(|_| format!("{}{}", self.base, path))
	}
}

fn encode_segment(raw: &str) -> String {
	url::form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_site_paths() {
		let site = Site::default();
		assert_eq!(site.home_url(), "https://www.instagram.com/");
		assert_eq!(site.host(), "www.instagram.com");
		assert_eq!(site.profile_url("some.user"), "https://www.instagram.com/some.user/");
		assert_eq!(site.following_url("some_user"), "https://www.instagram.com/some_user/following/");
		assert_eq!(site.account_edit_url(), "https://www.instagram.com/accounts/edit/");
		assert_eq!(site.following_path("me"), "/me/following/");
	}

	#[test]
	fn following_api_adds_cursor_only_when_present() {
		let site = Site::default();
		assert_eq!(site.following_api("42", None), "/api/v1/friendships/42/following/?count=50");
		assert_eq!(
			site.following_api("42", Some("QVF=")),
			"/api/v1/friendships/42/following/?count=50&max_id=QVF%3D"
		);
		assert_eq!(
			site.api_url(site.current_user_api()),
			"https://www.instagram.com/api/v1/accounts/current_user/"
		);
	}

	#[test]
	fn custom_base_gets_trailing_slash() {
		let site = Site::new("http://127.0.0.1:8080/mirror").unwrap();
		assert_eq!(site.profile_url("x"), "http://127.0.0.1:8080/mirror/x/");
	}
}
