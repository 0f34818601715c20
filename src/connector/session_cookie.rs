//! Session-cookie connector backed by a remote session-query API.
//!
//! The upstream platform signs users in itself and leaves a session cookie behind. The broker
//! forwards that cookie value here; [`SessionCookieConnector::login`] asks the platform who owns
//! the session and normalizes the answer. Nothing about the resolved session is kept on the
//! connector, so one instance serves any number of concurrent logins.

// crates.io
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	connector::until_closed,
	error::{ConfigError, UpstreamError},
	http::{self, ReqwestHttpClient},
	identity::Identity,
	obs::{self, ConnectorKind},
	tls::{TlsOptions, TrustPolicy},
	token::TokenSecret,
};

/// Name of the inbound cookie carrying the upstream session identifier.
pub const SESSION_COOKIE_NAME: &str = "tce";
/// Cookie value prefix the upstream sets for anonymous visitors.
pub const NOT_LOGGED_IN_PREFIX: &str = "not-logged-in";
/// Header carrying the service-to-service signature on session queries.
pub const SIGNATURE_HEADER: &str = "SYSTEM_CALL_SIGNATURE";

const KIND: ConnectorKind = ConnectorKind::SessionCookie;
const SESSION_QUERY_PATH: &str = "/ui/spi/v2/sessions/query";
const LOGIN_PATH: &str = "/oidc/login";
const PROMPT: &str = "username";

/// Configuration for a [`SessionCookieConnector`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookieConfig {
	/// Upstream platform base URL.
	#[serde(rename = "baseURL")]
	pub base_url: String,
	/// Broker redirect URL registered with the platform.
	///
	/// Accepted so existing connector documents keep parsing; session lookups do not send it.
	#[serde(default, rename = "redirectURL")]
	pub redirect_uri: String,
	/// Client identifier registered with the platform.
	///
	/// Accepted for configuration compatibility only; the signature header authenticates lookups.
	#[serde(default, rename = "clientID")]
	pub client_id: String,
	/// Client secret registered with the platform.
	///
	/// Accepted for configuration compatibility only; never sent upstream.
	#[serde(default, rename = "clientSecret")]
	pub client_secret: TokenSecret,
	/// Use the login name instead of the numeric id as the user identifier.
	#[serde(default, rename = "useLoginAsID")]
	pub use_login_as_id: bool,
	/// Value sent in the [`SIGNATURE_HEADER`] header.
	#[serde(rename = "serviceSignature")]
	pub service_signature: TokenSecret,
	/// Transport trust settings.
	#[serde(flatten)]
	pub tls: TlsOptions,
}

#[derive(Debug, Deserialize)]
struct Session {
	#[serde(default, rename = "loginUser")]
	login_user: Option<SessionUser>,
}

/// User record returned by the session-query API.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionUser {
	/// Login name.
	pub user: String,
	/// Numeric user identifier.
	pub id: i64,
	/// Tenant namespace.
	pub namespace: String,
	/// Email address.
	pub email: String,
	/// Phone number.
	pub phone: String,
	/// Upstream API token.
	pub token: TokenSecret,
	/// Numeric role.
	pub role: i64,
	/// Account type label.
	pub account_type: String,
}
impl SessionUser {
	fn is_anonymous(&self) -> bool {
		self.id == 0 && self.user.is_empty()
	}
}

/// Connector that resolves identities from an upstream session cookie.
pub struct SessionCookieConnector {
	config: SessionCookieConfig,
	session_url: Url,
	login_url: Url,
	http_client: ReqwestHttpClient,
	lifetime: CancellationToken,
}
impl SessionCookieConnector {
	/// Builds the connector and its transport. No upstream call is made.
	pub fn open(config: SessionCookieConfig) -> Result<Self> {
		obs::observe_sync(KIND, "open", || {
			let base = Url::parse(&config.base_url)
				.map_err(|source| ConfigError::InvalidUrl { field: "baseURL", source })?;
			let session_url = join_path(&base, SESSION_QUERY_PATH);
			let login_url = join_path(&base, LOGIN_PATH);
			let http_client = TrustPolicy::from_options(&config.tls).build_http_client(KIND.as_str())?;

			Ok(Self { config, session_url, login_url, http_client, lifetime: CancellationToken::new() })
		})
	}

	/// Configuration the connector was opened with.
	pub fn config(&self) -> &SessionCookieConfig {
		&self.config
	}

	/// Label of the credential the broker collects.
	///
	/// The credential is really a cookie value; the label is what the upstream integration
	/// expects.
	pub fn prompt(&self) -> &'static str {
		PROMPT
	}

	/// Upstream login page for unauthenticated requests.
	pub fn redirect(&self) -> &Url {
		&self.login_url
	}

	/// Resolves the identity owning `session_token` through the session-query API.
	pub async fn login(&self, session_token: &str) -> Result<Identity> {
		obs::observe(KIND, "login", async move {
			let user = until_closed(&self.lifetime, self.query_session(session_token)).await?;

			Ok(self.normalize(user))
		})
		.await
	}

	/// Returns the identity unchanged.
	///
	/// Upstream sessions cannot be refreshed, so identities stay valid until the broker expires
	/// them.
	pub async fn refresh(&self, identity: &Identity) -> Result<Identity> {
		obs::observe(KIND, "refresh", async move { Ok(identity.clone()) }).await
	}

	/// Cancels the connector's lifetime scope, aborting in-flight session queries.
	pub fn close(&self) {
		self.lifetime.cancel();
	}

	/// Returns `true` once [`SessionCookieConnector::close`] has been called.
	pub fn is_closed(&self) -> bool {
		self.lifetime.is_cancelled()
	}

	async fn query_session(&self, session_token: &str) -> Result<SessionUser> {
		let body = serde_json::json!({ "id": session_token }).to_string();
		let request = self
			.http_client
			.post(self.session_url.clone())
			.header(CONTENT_TYPE, "application/json")
			.header(ACCEPT, "application/json")
			.header(SIGNATURE_HEADER, self.config.service_signature.expose())
			.body(body);
		let (status, body) =
			self.http_client.send_text("session-query", request).await.map_err(|e| match e {
				Error::Transport(source) =>
					lookup_error("session query endpoint is unreachable", None, Some(source)),
				other => other,
			})?;

		if !http::is_success(status) {
			return Err(lookup_error(
				format!("session query endpoint returned HTTP {status}"),
				Some(status),
				None::<UpstreamError>,
			));
		}

		let de = &mut serde_json::Deserializer::from_str(&body);
		let session: Session = serde_path_to_error::deserialize(de).map_err(|e| {
			lookup_error("session query response could not be decoded", Some(status), Some(e))
		})?;

		session.login_user.filter(|user| !user.is_anonymous()).ok_or_else(|| {
			lookup_error("session has no logged-in user", Some(status), None::<UpstreamError>)
		})
	}

	fn normalize(&self, user: SessionUser) -> Identity {
		let user_id = if self.config.use_login_as_id { user.user.clone() } else { user.id.to_string() };

		Identity {
			user_id,
			username: user.user,
			email: user.email,
			// The platform does not report verification; integration presumes verified accounts.
			email_verified: true,
			phone: Some(user.phone).filter(|phone| !phone.is_empty()),
			..Default::default()
		}
	}
}
impl Debug for SessionCookieConnector {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionCookieConnector")
			.field("base_url", &self.config.base_url)
			.field("session_url", &self.session_url.as_str())
			.field("closed", &self.is_closed())
			.finish()
	}
}

/// Finds the upstream session token among inbound `(name, value)` cookie pairs.
///
/// Returns `None` when the cookie is absent, empty, or marks an anonymous visitor.
pub fn extract_session_token<'a, I>(cookies: I) -> Option<String>
where
	I: IntoIterator<Item = (&'a str, &'a str)>,
{
	let (_, value) = cookies.into_iter().find(|(name, _)| *name == SESSION_COOKIE_NAME)?;

	if value.is_empty() || value.starts_with(NOT_LOGGED_IN_PREFIX) {
		return None;
	}

	Some(value.to_owned())
}

/// Same as [`extract_session_token`], reading a raw `Cookie` header value.
pub fn extract_session_token_from_header(header: &str) -> Option<String> {
	extract_session_token(
		header
			.split(';')
			.filter_map(|pair| pair.trim().split_once('='))
			.map(|(name, value)| (name.trim(), value.trim().trim_matches('"'))),
	)
}

fn join_path(base: &Url, suffix: &str) -> Url {
	let mut url = base.clone();
	let path = format!("{}{suffix}", base.path().trim_end_matches('/'));

	url.set_path(&path);

	url
}

fn lookup_error(
	message: impl Into<String>,
	status: Option<u16>,
	source: Option<impl 'static + Send + Sync + StdError>,
) -> Error {
	UpstreamError::SessionLookup {
		message: message.into(),
		status,
		source: source.map(|e| Box::new(e) as Box<dyn StdError + Send + Sync>),
	}
	.into()
}
