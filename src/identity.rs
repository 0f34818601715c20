//! Canonical identity record handed to the broker, plus the scopes the broker requested.

// self
use crate::_prelude::*;

/// Scopes the broker's client asked for, reduced to what connectors care about.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scopes {
	/// The client requested offline access; connectors attach refresh state.
	#[serde(default)]
	pub offline_access: bool,
}
impl Scopes {
	/// Scopes requesting offline access.
	pub fn offline() -> Self {
		Self { offline_access: true }
	}
}

/// Provider-independent identity produced by every connector.
///
/// Connectors only build this value after the upstream exchange succeeded and any configured
/// group gate passed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
	/// Stable upstream user identifier.
	pub user_id: String,
	/// Upstream username.
	pub username: String,
	/// Username the user prefers to be shown as.
	#[serde(default)]
	pub preferred_username: String,
	/// Email address (or the best available stand-in).
	#[serde(default)]
	pub email: String,
	/// Whether the email address is verified.
	#[serde(default)]
	pub email_verified: bool,
	/// Phone number, when the upstream reports one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub phone: Option<String>,
	/// Group memberships.
	#[serde(default)]
	pub groups: Vec<String>,
	/// Opaque connector state, set only when offline access was requested.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub connector_data: Option<Vec<u8>>,
}
