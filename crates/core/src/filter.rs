//! Skip rules protecting accounts from removal.

use std::collections::BTreeSet;

use crate::candidate::Candidate;
use crate::config::parse_list;

/// Configured reasons to keep following an account.
///
/// Rules are OR-combined. An empty rule set never skips anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipRules {
	pub verified: bool,
	pub private: bool,
	/// Lowercased substrings matched against the category.
	pub categories: Vec<String>,
	/// Lowercased substrings matched against the username.
	pub username_contains: Vec<String>,
	/// Lowercased account-type labels.
	pub account_types: BTreeSet<String>,
}

impl SkipRules {
	/// Builds rules from raw comma-separated settings.
	pub fn from_lists(verified: bool, private: bool, categories: &str, username_contains: &str, account_types: &str) -> Self {
		Self {
			verified,
			private,
			categories: parse_list(categories),
			username_contains: parse_list(username_contains),
			account_types: parse_list(account_types).into_iter().collect(),
		}
	}

	pub fn is_empty(&self) -> bool {
		!self.verified
			&& !self.private
			&& self.categories.is_empty()
			&& self.username_contains.is_empty()
			&& self.account_types.is_empty()
	}

	/// Whether `candidate` must be left alone.
	pub fn should_skip(&self, candidate: &Candidate) -> bool {
		self.reason(candidate).is_some()
	}

	/// First rule that matches, for logging.
	pub fn reason(&self, candidate: &Candidate) -> Option<&'static str> {
		if self.verified && candidate.verified {
			return Some("verified");
		}
		if self.private && candidate.private {
			return Some("private");
		}
		if !self.username_contains.is_empty() {
			let username = candidate.username.to_lowercase();
			if self.username_contains.iter().any(|needle| username.contains(needle.as_str())) {
				return Some("username");
			}
		}
		if !self.categories.is_empty() {
			if let Some(category) = &candidate.category {
				let category = category.to_lowercase();
				if self.categories.iter().any(|needle| category.contains(needle.as_str())) {
					return Some("category");
				}
			}
		}
		if !self.account_types.is_empty()
			&& candidate
				.account_types()
				.iter()
				.any(|kind| self.account_types.contains(kind))
		{
			return Some("account type");
		}
		None
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn candidate(username: &str) -> Candidate {
		Candidate::named(username)
	}

	#[test]
	fn empty_rules_never_skip() {
		let rules = SkipRules::default();
		assert!(rules.is_empty());
		let mut c = candidate("anyone");
		c.verified = true;
		c.private = true;
		c.category = Some("Brand".into());
		assert!(!rules.should_skip(&c));
	}

	#[test]
	fn verified_and_private_flags() {
		let rules = SkipRules {
			verified: true,
			..SkipRules::default()
		};
		let mut c = candidate("a");
		assert!(!rules.should_skip(&c));
		c.verified = true;
		assert_eq!(rules.reason(&c), Some("verified"));

		let rules = SkipRules {
			private: true,
			..SkipRules::default()
		};
		c.private = true;
		assert_eq!(rules.reason(&c), Some("private"));
	}

	#[test]
	fn username_substring_is_case_insensitive() {
		let rules = SkipRules::from_lists(false, false, "", " Shop ,", "");
		assert!(rules.should_skip(&candidate("BestSHOPever")));
		assert!(!rules.should_skip(&candidate("friend")));
	}

	#[test]
	fn category_substring_requires_a_category() {
		let rules = SkipRules::from_lists(false, false, "musician", "", "");
		let mut c = candidate("band");
		assert!(!rules.should_skip(&c));
		c.category = Some("Musician/Band".into());
		assert_eq!(rules.reason(&c), Some("category"));
	}

	#[test]
	fn account_types_include_flag_derived_labels() {
		let rules = SkipRules::from_lists(false, false, "", "", "Creator");
		let mut c = candidate("maker");
		assert!(!rules.should_skip(&c));
		c.is_professional = true;
		assert_eq!(rules.reason(&c), Some("account type"));

		let rules = SkipRules::from_lists(false, false, "", "", "business");
		let mut c = candidate("store");
		c.account_type = Some("business".into());
		assert!(rules.should_skip(&c));
	}
}
