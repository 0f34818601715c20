//! Opaque token state persisted by the broker between callback and refresh.

mod secret;

pub use secret::*;

// crates.io
use oauth2::{TokenResponse, basic::BasicTokenResponse};
// self
use crate::_prelude::*;

/// Token record serialized into [`Identity::connector_data`](crate::identity::Identity).
///
/// The broker stores the bytes verbatim and hands them back on refresh; only the connector that
/// produced them decodes the record.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
	/// Bearer access token.
	pub access_token: TokenSecret,
	/// Refresh token, if the provider issued one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
	/// Token type reported by the provider (normally `bearer`).
	pub token_type: String,
	/// Absolute expiry, when the provider reported `expires_in`.
	#[serde(default, skip_serializing_if = "Option::is_none", with = "time::serde::rfc3339::option")]
	pub expires_at: Option<OffsetDateTime>,
}
impl TokenRecord {
	/// Builds a record from an `oauth2` token response received at `issued_at`.
	///
	/// A response without a refresh token keeps `previous_refresh`, matching providers that only
	/// rotate access tokens.
	pub fn from_response(
		response: &BasicTokenResponse,
		issued_at: OffsetDateTime,
		previous_refresh: Option<TokenSecret>,
	) -> Self {
		let expires_at = response
			.expires_in()
			.and_then(|ttl| i64::try_from(ttl.as_secs()).ok())
			.map(|secs| issued_at + Duration::seconds(secs));
		let refresh_token = response
			.refresh_token()
			.map(|secret| TokenSecret::new(secret.secret().as_str()))
			.or(previous_refresh);

		Self {
			access_token: TokenSecret::new(response.access_token().secret().as_str()),
			refresh_token,
			token_type: response.token_type().as_ref().to_owned(),
			expires_at,
		}
	}

	/// Returns `true` if the record has expired at the provided instant.
	///
	/// Records without an expiry never expire locally.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| instant >= expires_at)
	}

	/// Returns `true` when the record is expired and can be renewed with a refresh grant.
	pub fn needs_refresh_at(&self, instant: OffsetDateTime) -> bool {
		self.is_expired_at(instant) && self.refresh_token.is_some()
	}

	/// Serializes the record into opaque connector data.
	pub fn to_connector_data(&self) -> Result<Vec<u8>> {
		serde_json::to_vec(self).map_err(|source| Error::StateEncoding { source })
	}

	/// Decodes a record previously produced by [`TokenRecord::to_connector_data`].
	pub fn from_connector_data(data: &[u8]) -> Result<Self> {
		let de = &mut serde_json::Deserializer::from_slice(data);

		serde_path_to_error::deserialize(de).map_err(|source| Error::MalformedState { source })
	}
}
impl Debug for TokenRecord {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRecord")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("token_type", &self.token_type)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	fn record(expires_at: Option<OffsetDateTime>, refresh: Option<&str>) -> TokenRecord {
		TokenRecord {
			access_token: TokenSecret::new("access"),
			refresh_token: refresh.map(TokenSecret::new),
			token_type: "bearer".into(),
			expires_at,
		}
	}

	#[test]
	fn expiry_and_refresh_checks() {
		let now = datetime!(2025-01-01 12:00 UTC);
		let expired = record(Some(datetime!(2025-01-01 11:00 UTC)), Some("refresh"));
		let live = record(Some(datetime!(2025-01-01 13:00 UTC)), Some("refresh"));

		assert!(expired.needs_refresh_at(now));
		assert!(!live.needs_refresh_at(now));
		assert!(!record(Some(datetime!(2025-01-01 11:00 UTC)), None).needs_refresh_at(now));
		assert!(!record(None, Some("refresh")).is_expired_at(now));
	}

	#[test]
	fn connector_data_decodes_back() {
		let original = record(Some(datetime!(2025-01-01 13:00 UTC)), Some("refresh"));
		let data = original.to_connector_data().expect("Token record should encode.");

		assert!(!data.is_empty());

		let decoded = TokenRecord::from_connector_data(&data).expect("Connector data should decode.");

		assert_eq!(decoded, original);
	}

	#[test]
	fn corrupt_connector_data_is_malformed_state() {
		let err = TokenRecord::from_connector_data(b"{\"access_token\":42}")
			.expect_err("Corrupt connector data should fail.");

		assert!(matches!(err, Error::MalformedState { .. }));
	}
}
