//! Connector contract consumed by the broker.
//!
//! The two connector families share almost nothing beyond their output type, so [`Connector`] is
//! a tagged variant rather than a trait object. The common surface (open, refresh, close) lives on
//! the enum; family-specific steps (building a login URL, reading a session cookie) are reached
//! through [`Connector::as_oauth2`] and [`Connector::as_session_cookie`].

pub mod oauth2;
pub mod session_cookie;

pub use self::{oauth2::*, session_cookie::*};
pub use crate::obs::ConnectorKind;

// crates.io
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	identity::{Identity, Scopes},
};

/// Configuration for any supported connector, tagged by `type`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ConnectorConfig {
	/// OAuth 2.0 authorization-code connector.
	#[serde(rename = "oauth2")]
	OAuth2(OAuth2Config),
	/// Session-cookie connector.
	#[serde(rename = "session_cookie")]
	SessionCookie(SessionCookieConfig),
}
impl ConnectorConfig {
	/// Parses a JSON configuration document, reporting the path of the first bad field.
	pub fn from_json(raw: &str) -> Result<Self> {
		let de = &mut serde_json::Deserializer::from_str(raw);

		serde_path_to_error::deserialize(de).map_err(|e| ConfigError::from(e).into())
	}

	/// Connector family this configuration opens.
	pub fn kind(&self) -> ConnectorKind {
		match self {
			Self::OAuth2(_) => ConnectorKind::OAuth2,
			Self::SessionCookie(_) => ConnectorKind::SessionCookie,
		}
	}
}

/// An opened connector of any supported family.
#[derive(Debug)]
pub enum Connector {
	/// OAuth 2.0 authorization-code connector.
	OAuth2(OAuth2Connector),
	/// Session-cookie connector.
	SessionCookie(SessionCookieConnector),
}
impl Connector {
	/// Opens the connector described by `config`.
	///
	/// OAuth 2.0 connectors run discovery here; construction fails as a whole if it fails.
	pub async fn open(config: ConnectorConfig) -> Result<Self> {
		match config {
			ConnectorConfig::OAuth2(config) => OAuth2Connector::open(config).await.map(Self::OAuth2),
			ConnectorConfig::SessionCookie(config) =>
				SessionCookieConnector::open(config).map(Self::SessionCookie),
		}
	}

	/// Connector family.
	pub fn kind(&self) -> ConnectorKind {
		match self {
			Self::OAuth2(_) => ConnectorKind::OAuth2,
			Self::SessionCookie(_) => ConnectorKind::SessionCookie,
		}
	}

	/// Whether [`Connector::refresh`] does more than echo the identity back.
	pub fn supports_refresh(&self) -> bool {
		matches!(self, Self::OAuth2(_))
	}

	/// Refreshes a previously issued identity.
	pub async fn refresh(&self, scopes: Scopes, identity: &Identity) -> Result<Identity> {
		match self {
			Self::OAuth2(connector) => connector.refresh(scopes, identity).await,
			Self::SessionCookie(connector) => connector.refresh(identity).await,
		}
	}

	/// Tears down the connector's lifetime scope. Idempotent.
	pub fn close(&self) {
		match self {
			Self::OAuth2(connector) => connector.close(),
			Self::SessionCookie(connector) => connector.close(),
		}
	}

	/// Returns `true` once the connector has been closed.
	pub fn is_closed(&self) -> bool {
		match self {
			Self::OAuth2(connector) => connector.is_closed(),
			Self::SessionCookie(connector) => connector.is_closed(),
		}
	}

	/// OAuth 2.0 capability, when this is an OAuth 2.0 connector.
	pub fn as_oauth2(&self) -> Option<&OAuth2Connector> {
		match self {
			Self::OAuth2(connector) => Some(connector),
			_ => None,
		}
	}

	/// Session-cookie capability, when this is a session-cookie connector.
	pub fn as_session_cookie(&self) -> Option<&SessionCookieConnector> {
		match self {
			Self::SessionCookie(connector) => Some(connector),
			_ => None,
		}
	}
}

/// Runs `fut` unless the connector lifetime is cancelled first.
pub(crate) async fn until_closed<T, Fut>(lifetime: &CancellationToken, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	lifetime.run_until_cancelled(fut).await.unwrap_or(Err(Error::Cancelled))
}
