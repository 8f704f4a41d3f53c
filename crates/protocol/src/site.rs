//! Payloads returned by the site's private web API.
//!
//! The API is undocumented and drifts; every field is optional and ids or
//! tokens may arrive either as strings or as numbers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Renders an id-like JSON value (string or number) as a non-empty string.
pub fn id_string(value: &Value) -> Option<String> {
	match value {
		Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
		Value::Number(n) => Some(n.to_string()),
		_ => None,
	}
}

/// Nested `user` object of `/api/v1/accounts/current_user/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurrentUser {
	#[serde(default)]
	pub pk: Option<Value>,
	#[serde(default)]
	pub id: Option<Value>,
	#[serde(default)]
	pub username: Option<String>,
}

/// Response of `/api/v1/accounts/current_user/`.
///
/// Older responses put the fields at the top level, newer ones nest them
/// under `user`; both are accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurrentUserResponse {
	#[serde(default)]
	pub user: Option<CurrentUser>,
	#[serde(default)]
	pub pk: Option<Value>,
	#[serde(default)]
	pub id: Option<Value>,
	#[serde(default)]
	pub username: Option<String>,
}

impl CurrentUserResponse {
	/// Numeric account id, preferring `user.pk`, then `user.id`, then top-level fields.
	pub fn user_id(&self) -> Option<String> {
		let nested = self.user.as_ref();
		[
			nested.and_then(|u| u.pk.as_ref()),
			nested.and_then(|u| u.id.as_ref()),
			self.pk.as_ref(),
			self.id.as_ref(),
		]
		.into_iter()
		.flatten()
		.find_map(id_string)
	}

	/// Account handle, preferring the nested user object.
	pub fn username(&self) -> Option<String> {
		self.user
			.as_ref()
			.and_then(|u| u.username.clone())
			.or_else(|| self.username.clone())
			.map(|u| u.trim().to_string())
			.filter(|u| !u.is_empty())
	}
}

/// One followed account from the following listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiUser {
	#[serde(default)]
	pub pk: Option<Value>,
	#[serde(default)]
	pub username: Option<String>,
	#[serde(default)]
	pub full_name: Option<String>,
	#[serde(default)]
	pub is_verified: bool,
	#[serde(default)]
	pub is_private: bool,
	#[serde(default)]
	pub category: Option<String>,
	#[serde(default)]
	pub category_name: Option<String>,
	/// Either a label or the site's numeric account kind.
	#[serde(default)]
	pub account_type: Option<Value>,
	#[serde(default)]
	pub is_business: bool,
	#[serde(default)]
	pub is_professional: bool,
}

/// Page of `/api/v1/friendships/{id}/following/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FollowingPage {
	/// Missing when the endpoint answered with something other than a listing.
	#[serde(default)]
	pub users: Option<Vec<ApiUser>>,
	#[serde(default)]
	pub next_max_id: Option<Value>,
}

impl FollowingPage {
	/// Opaque continuation token, absent on the last page.
	pub fn next_token(&self) -> Option<String> {
		self.next_max_id.as_ref().and_then(id_string)
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn current_user_prefers_nested_pk() {
		let resp: CurrentUserResponse = serde_json::from_value(json!({
			"user": { "pk": 1234567, "username": "me" },
			"id": "999"
		}))
		.unwrap();
		assert_eq!(resp.user_id().as_deref(), Some("1234567"));
		assert_eq!(resp.username().as_deref(), Some("me"));
	}

	#[test]
	fn current_user_falls_back_to_top_level() {
		let resp: CurrentUserResponse = serde_json::from_value(json!({ "id": "42", "username": "  top " })).unwrap();
		assert_eq!(resp.user_id().as_deref(), Some("42"));
		assert_eq!(resp.username().as_deref(), Some("top"));
	}

	#[test]
	fn following_page_token_accepts_numbers_and_strings() {
		let page: FollowingPage = serde_json::from_value(json!({ "users": [], "next_max_id": 50 })).unwrap();
		assert_eq!(page.next_token().as_deref(), Some("50"));

		let page: FollowingPage = serde_json::from_value(json!({ "users": [], "next_max_id": "QVFE" })).unwrap();
		assert_eq!(page.next_token().as_deref(), Some("QVFE"));

		let page: FollowingPage = serde_json::from_value(json!({ "users": [], "next_max_id": "" })).unwrap();
		assert_eq!(page.next_token(), None);
	}

	#[test]
	fn following_page_without_users_is_distinguishable() {
		let page: FollowingPage = serde_json::from_value(json!({ "status": "fail" })).unwrap();
		assert!(page.users.is_none());
	}
}
