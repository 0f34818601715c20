//! Group-based authorization and default-group injection.

// self
use crate::_prelude::*;

/// Returns the user groups that also appear in `allowed`, keeping the user's order.
pub fn filter<'a>(user_groups: &'a [String], allowed: &[String]) -> Vec<&'a str> {
	user_groups
		.iter()
		.filter(|group| allowed.iter().any(|permitted| permitted == *group))
		.map(String::as_str)
		.collect()
}

/// Decides whether a user may log in given a group allow-list.
///
/// An empty allow-list means no gate is configured and every user passes. Otherwise the user
/// needs at least one group that matches an allowed entry exactly.
pub fn is_authorized(user_groups: &[String], allowed: &[String]) -> bool {
	allowed.is_empty() || !filter(user_groups, allowed).is_empty()
}

/// Groups appended to every identity a broker emits.
///
/// This is a plain value owned by whoever injects default groups, so there is no process-wide
/// state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DefaultGroups(Vec<String>);
impl DefaultGroups {
	/// Wraps the configured default groups.
	pub fn new<I, S>(groups: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self(groups.into_iter().map(Into::into).collect())
	}

	/// Unions the defaults into `groups`, dropping duplicates and keeping first-seen order.
	pub fn apply(&self, groups: Vec<String>) -> Vec<String> {
		let mut seen = std::collections::HashSet::new();

		groups.into_iter().chain(self.0.iter().cloned()).filter(|g| seen.insert(g.clone())).collect()
	}

	/// Returns the configured defaults.
	pub fn as_slice(&self) -> &[String] {
		&self.0
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn strings(values: &[&str]) -> Vec<String> {
		values.iter().map(|value| value.to_string()).collect()
	}

	#[test]
	fn authorization_requires_intersection() {
		let user = strings(&["dev", "qa"]);

		assert!(is_authorized(&user, &strings(&["dev", "ops"])));
		assert!(!is_authorized(&user, &strings(&["ops"])));
		assert!(!is_authorized(&[], &strings(&["ops"])));
	}

	#[test]
	fn empty_allow_list_admits_everyone() {
		assert!(is_authorized(&[], &[]));
		assert!(is_authorized(&strings(&["dev"]), &[]));
	}

	#[test]
	fn matching_is_exact_and_order_independent() {
		let allowed = strings(&["ops", "dev"]);

		assert!(!is_authorized(&strings(&["Dev", "dev-team"]), &allowed));
		assert_eq!(filter(&strings(&["qa", "dev", "ops"]), &allowed), vec!["dev", "ops"]);
		assert_eq!(
			is_authorized(&strings(&["qa", "dev"]), &allowed),
			is_authorized(&strings(&["dev", "qa"]), &strings(&["dev", "ops"]))
		);
	}

	#[test]
	fn default_groups_union_without_duplicates() {
		let defaults = DefaultGroups::new(["users", "dev"]);

		assert_eq!(defaults.apply(strings(&["dev", "ops", "dev"])), strings(&["dev", "ops", "users"]));
		assert_eq!(DefaultGroups::default().apply(strings(&["a"])), strings(&["a"]));
	}
}
