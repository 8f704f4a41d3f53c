//! Page automation seam.
//!
//! The engine never speaks selectors. It asks a [`PageDriver`] about
//! [`Intent`]s ("the login submit button", "the third actionable row of the
//! dialog list") and the driver decides how to find them. [`CdpPage`] does
//! this with injected scripts over the DevTools protocol; [`MockPage`] is a
//! scripted in-memory page for tests.

mod cdp;
pub mod mock;
pub(crate) mod script;

use async_trait::async_trait;
use prune_protocol::Cookie;
use serde::Serialize;
use serde_json::Value;

pub use cdp::CdpPage;
pub use mock::MockPage;

use crate::error::Result;

/// Where the following list is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListScope {
	/// Modal overlay on top of the profile.
	Dialog,
	/// Full-page list.
	Page,
}

/// Something on the page the engine wants to inspect or act on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Intent {
	LoginUsername,
	LoginPassword,
	LoginSubmit,
	/// Cookie banner buttons.
	CookieConsent,
	/// "Not now" / "Cancel" buttons of interstitial dialogs.
	DismissPrompt,
	/// The following list as a dialog overlay.
	ListDialog,
	/// The following list as a full page.
	ListPage,
	/// Link from a profile page to its following list.
	FollowingLink { path: String },
	/// Every actionable (Following / Requested) row button in the list.
	Rows { scope: ListScope },
	/// The `index`-th actionable row button.
	Row { scope: ListScope, index: usize },
	/// Handle shown in the `index`-th actionable row.
	RowOwner { scope: ListScope, index: usize },
	/// Following / Requested button on a profile page.
	ProfileAction,
	/// Unfollow / Cancel request confirmation.
	ConfirmUnfollow,
	/// Follow / Follow back button, shown once the relationship is gone.
	FollowState,
	/// Username input on the account settings page.
	AccountUsername,
}

/// Browser page operations the engine needs.
///
/// Every method may fail with a session-closed error once the browser goes
/// away; callers check [`PruneError::is_session_closed`](crate::PruneError::is_session_closed).
#[async_trait]
pub trait PageDriver: Send + Sync {
	/// Navigates and waits until the document has been parsed.
	async fn navigate(&self, url: &str) -> Result<()>;

	async fn current_url(&self) -> Result<String>;

	/// Number of visible matches.
	async fn count(&self, intent: &Intent) -> Result<usize>;

	async fn is_visible(&self, intent: &Intent) -> Result<bool> {
		Ok(self.count(intent).await? > 0)
	}

	/// Clicks the first visible match. Returns `false` when nothing matched.
	async fn click(&self, intent: &Intent) -> Result<bool>;

	/// Clicks every visible match and returns how many were clicked.
	async fn click_all(&self, intent: &Intent) -> Result<usize>;

	/// Types into the first visible match. Returns `false` when nothing matched.
	async fn fill(&self, intent: &Intent, value: &str) -> Result<bool>;

	/// Value (inputs) or text of the first match.
	async fn read_text(&self, intent: &Intent) -> Result<Option<String>>;

	/// Scrolls the list one viewport further.
	async fn scroll(&self, scope: ListScope) -> Result<()>;

	/// Cookies visible to the current site.
	async fn cookies(&self) -> Result<Vec<Cookie>>;

	/// Fetches JSON from inside the page with its credentials.
	///
	/// Non-2xx answers and network failures yield `Ok(None)`.
	async fn fetch_json(&self, url: &str, headers: &[(&str, &str)]) -> Result<Option<Value>>;
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn intents_serialize_as_tagged_objects() {
		assert_eq!(serde_json::to_value(Intent::LoginSubmit).unwrap(), json!({ "kind": "loginSubmit" }));
		assert_eq!(
			serde_json::to_value(Intent::Row {
				scope: ListScope::Dialog,
				index: 2
			})
			.unwrap(),
			json!({ "kind": "row", "scope": "dialog", "index": 2 })
		);
		assert_eq!(
			serde_json::to_value(Intent::FollowingLink { path: "/me/following/".into() }).unwrap(),
			json!({ "kind": "followingLink", "path": "/me/following/" })
		);
	}
}
