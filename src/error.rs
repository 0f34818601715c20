//! Connector-level error types shared by the trust builder, connectors, and normalizer.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Canonical connector error exposed by public APIs.
///
/// `Display` output is safe to show to end users: upstream response bodies and the configured
/// group allow-list never appear in it. Structured fields keep the detail for logs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Upstream identity source was unreachable or answered with something unusable.
	#[error(transparent)]
	Upstream(#[from] UpstreamError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The identity provider itself reported a login failure.
	#[error("{}", upstream_auth_message(.code, .description.as_deref()))]
	UpstreamAuth {
		/// OAuth `error` parameter.
		code: String,
		/// OAuth `error_description` parameter, when present.
		description: Option<String>,
	},
	/// The user authenticated but is not a member of any permitted group.
	#[error("User `{username}` is not a member of any permitted group.")]
	AuthorizationDenied {
		/// Upstream username that was denied.
		username: String,
	},
	/// Opaque refresh state handed back by the broker could not be decoded.
	#[error("Connector data could not be decoded.")]
	MalformedState {
		/// Structured decoding failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Token state could not be encoded into connector data.
	#[error("Connector data could not be encoded.")]
	StateEncoding {
		/// Serialization failure.
		#[source]
		source: serde_json::Error,
	},
	/// The connector was closed while the call was in flight.
	#[error("Connector was closed before the upstream call completed.")]
	Cancelled,
}
impl Error {
	/// Classifies the failure by the party that caused it.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Config(_) => ErrorKind::Configuration,
			Self::Upstream(_) | Self::Transport(_) | Self::Cancelled => ErrorKind::Upstream,
			Self::UpstreamAuth { .. } | Self::AuthorizationDenied { .. } => ErrorKind::User,
			Self::MalformedState { .. } | Self::StateEncoding { .. } => ErrorKind::Configuration,
		}
	}
}

/// Responsible party for an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// The end user (or their upstream account) caused the failure.
	User,
	/// The upstream identity source failed or could not be reached.
	Upstream,
	/// Operator-supplied configuration or broker state is wrong.
	Configuration,
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Root CA file could not be read.
	#[error("Root CA file `{path}` could not be read.")]
	RootCaUnreadable {
		/// Configured file path.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Root CA file does not hold any usable PEM certificate.
	#[error("No certificates found in root CA file `{path}`.")]
	RootCaEmpty {
		/// Configured file path.
		path: String,
	},
	/// A configured URL cannot be parsed.
	#[error("Configured {field} URL is invalid.")]
	InvalidUrl {
		/// Configuration field holding the URL.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The broker asked for a callback URL other than the configured redirect URI.
	#[error("Callback URL `{requested}` does not match the configured redirect URI `{configured}`.")]
	CallbackMismatch {
		/// Callback URL supplied by the caller.
		requested: String,
		/// Redirect URI from the connector configuration.
		configured: String,
	},
	/// Connector configuration document cannot be parsed.
	#[error("Connector configuration is invalid at `{path}`.")]
	Parse {
		/// Path of the offending field.
		path: String,
		/// Underlying decoding failure.
		#[source]
		source: serde_json::Error,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<serde_path_to_error::Error<serde_json::Error>> for ConfigError {
	fn from(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
		let path = e.path().to_string();

		Self::Parse { path, source: e.into_inner() }
	}
}

/// Upstream failures (never retried by the connector).
#[derive(Debug, ThisError)]
pub enum UpstreamError {
	/// Provider metadata could not be discovered.
	#[error("Provider discovery through `{url}` failed.")]
	Discovery {
		/// Well-known metadata URL.
		url: String,
		/// HTTP status code, when a response arrived.
		status: Option<u16>,
		/// Underlying failure, when one exists.
		#[source]
		source: Option<BoxError>,
	},
	/// An authenticated upstream API call returned a non-success status.
	#[error("Upstream API returned HTTP {status}.")]
	Api {
		/// HTTP status code.
		status: u16,
		/// Raw response body, kept for logs only.
		body: String,
	},
	/// Token endpoint rejected the exchange or answered unexpectedly.
	#[error("Token endpoint request failed: {message}.")]
	TokenEndpoint {
		/// Provider- or connector-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Upstream responded with JSON that does not match the expected shape.
	#[error("The {endpoint} endpoint returned malformed JSON.")]
	ResponseParse {
		/// Logical endpoint label.
		endpoint: &'static str,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Remote session lookup failed or returned no user.
	#[error("Session lookup failed: {message}.")]
	SessionLookup {
		/// Connector-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Underlying failure, when one exists.
		#[source]
		source: Option<BoxError>,
	},
}
impl UpstreamError {
	/// HTTP status attached to the failure, when one was observed.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Discovery { status, .. }
			| Self::TokenEndpoint { status, .. }
			| Self::SessionLookup { status, .. } => *status,
			Self::Api { status, .. } => Some(*status),
			Self::ResponseParse { .. } => None,
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the {endpoint} endpoint.")]
	Network {
		/// Logical endpoint label.
		endpoint: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling an upstream endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: &'static str,
		src: impl 'static + Send + Sync + StdError,
	) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}
}

fn upstream_auth_message(code: &str, description: Option<&str>) -> String {
	match description {
		Some(description) if !description.is_empty() =>
			format!("Identity provider reported `{code}`: {description}."),
		_ => format!("Identity provider reported `{code}`."),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn upstream_auth_display_carries_code_and_description() {
		let err = Error::UpstreamAuth {
			code: "access_denied".into(),
			description: Some("user cancelled".into()),
		};

		assert_eq!(err.to_string(), "Identity provider reported `access_denied`: user cancelled.");

		let err = Error::UpstreamAuth { code: "access_denied".into(), description: None };

		assert_eq!(err.to_string(), "Identity provider reported `access_denied`.");
		assert_eq!(err.kind(), ErrorKind::User);
	}

	#[test]
	fn api_error_display_hides_body() {
		let err = Error::from(UpstreamError::Api { status: 403, body: "secret detail".into() });

		assert!(!err.to_string().contains("secret detail"));
		assert_eq!(err.kind(), ErrorKind::Upstream);
	}

	#[test]
	fn config_errors_classify_as_configuration() {
		let err = Error::from(ConfigError::CallbackMismatch {
			requested: "https://evil.example.com/cb".into(),
			configured: "https://dex.example.com/callback".into(),
		});

		assert_eq!(err.kind(), ErrorKind::Configuration);
	}

	#[test]
	fn state_encoding_failure_is_surfaced() {
		let source = serde_json::from_str::<u8>("\"not a byte\"")
			.expect_err("A string should not decode as a byte.");
		let err = Error::StateEncoding { source };

		assert_eq!(err.to_string(), "Connector data could not be encoded.");
		assert_eq!(err.kind(), ErrorKind::Configuration);
		assert!(StdError::source(&err).is_some());
	}
}
