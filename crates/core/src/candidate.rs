//! Followed accounts considered for removal.

use prune_protocol::ApiUser;
use serde_json::Value;

/// Attributes of one followed account, as reported by the site API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidate {
	pub username: String,
	pub display_name: Option<String>,
	pub verified: bool,
	pub private: bool,
	pub category: Option<String>,
	/// Explicit account kind label, lowercased.
	pub account_type: Option<String>,
	pub is_business: bool,
	pub is_professional: bool,
}

impl Candidate {
	/// Candidate known only by handle (the list UI exposes nothing else).
	pub fn named(username: impl Into<String>) -> Self {
		Self {
			username: username.into(),
			..Self::default()
		}
	}

	/// Builds a candidate from an API user; `None` when the handle is missing.
	pub fn from_api(user: ApiUser) -> Option<Self> {
		let username = user.username.map(|u| u.trim().to_string()).filter(|u| !u.is_empty())?;
		let category = user.category.or(user.category_name).filter(|c| !c.trim().is_empty());
		let account_type = user.account_type.as_ref().and_then(account_type_label);
		Some(Self {
			username,
			display_name: user.full_name.filter(|n| !n.is_empty()),
			verified: user.is_verified,
			private: user.is_private,
			category,
			account_type,
			is_business: user.is_business,
			is_professional: user.is_professional,
		})
	}

	/// Every account-type label this candidate matches, lowercased.
	///
	/// The explicit label is joined by `business` and `creator` when the
	/// corresponding flags are set.
	pub fn account_types(&self) -> Vec<String> {
		let mut types = Vec::with_capacity(3);
		if let Some(kind) = &self.account_type {
			types.push(kind.clone());
		}
		if self.is_business && !types.iter().any(|t| t == "business") {
			types.push("business".to_string());
		}
		if self.is_professional && !types.iter().any(|t| t == "creator") {
			types.push("creator".to_string());
		}
		types
	}
}

fn account_type_label(value: &Value) -> Option<String> {
	let label = match value {
		Value::String(s) => s.trim().to_lowercase(),
		Value::Number(n) => n.to_string(),
		_ => return None,
	};
	(!label.is_empty()).then_some(label)
}
