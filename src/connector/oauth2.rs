//! OAuth 2.0 authorization-code connector with provider discovery and group gating.
//!
//! Opening the connector fetches `<issuer>/.well-known/oauth-authorization-server` to learn the
//! authorization and token endpoints. Logins then follow the usual redirect/callback round trip;
//! the token obtained from the callback authenticates a call to the provider's user API, whose
//! answer is normalized into an [`Identity`]. When the broker asked for offline access the token
//! record is attached as connector data, and [`OAuth2Connector::refresh`] replays the user lookup
//! with it later.

// crates.io
use oauth2::{
	AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet, EndpointSet,
	HttpClientError, RedirectUrl, RefreshToken, RequestTokenError, Scope, TokenUrl,
	basic::{BasicClient, BasicRequestTokenError, BasicTokenResponse},
};
use reqwest::header::ACCEPT;
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	connector::until_closed,
	error::{ConfigError, TransportError, UpstreamError},
	groups,
	http::{self, ReqwestHttpClient, ResponseMetadataSlot},
	identity::{Identity, Scopes},
	obs::{self, ConnectorKind},
	tls::{TlsOptions, TrustPolicy},
	token::{TokenRecord, TokenSecret},
};

type ConfiguredBasicClient =
	BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

const KIND: ConnectorKind = ConnectorKind::OAuth2;
const WELL_KNOWN_PATH: &str = "/.well-known/oauth-authorization-server";
const USERS_PATH: &str = "/apis/user.openshift.io/v1/users/~";
const USER_INFO_SCOPE: &str = "user:info";

/// Configuration for an [`OAuth2Connector`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuth2Config {
	/// Provider base URL; discovery and the user API hang off it.
	pub issuer: String,
	/// OAuth client identifier.
	#[serde(rename = "clientID")]
	pub client_id: String,
	/// OAuth client secret.
	#[serde(rename = "clientSecret")]
	pub client_secret: TokenSecret,
	/// Redirect URI registered with the provider; callbacks must match it exactly.
	#[serde(rename = "redirectURI")]
	pub redirect_uri: String,
	/// Allow-list of upstream groups. Empty disables the gate.
	#[serde(default)]
	pub groups: Vec<String>,
	/// Transport trust settings.
	#[serde(flatten)]
	pub tls: TlsOptions,
}

/// Endpoints learned from provider discovery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
	/// Authorization endpoint users are redirected to.
	pub authorization_endpoint: String,
	/// Token endpoint used for code exchange and refresh.
	pub token_endpoint: String,
}

/// Query parameters delivered to the redirect URI.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackQuery {
	/// Authorization code.
	#[serde(default)]
	pub code: Option<String>,
	/// Opaque state echoed back by the provider.
	#[serde(default)]
	pub state: Option<String>,
	/// OAuth error code reported by the provider.
	#[serde(default)]
	pub error: Option<String>,
	/// Human-readable error detail reported by the provider.
	#[serde(default)]
	pub error_description: Option<String>,
}
impl CallbackQuery {
	/// Parses a raw (already separated, undecoded) query string.
	pub fn parse(query: &str) -> Self {
		let mut parsed = Self::default();

		for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
			let slot = match key.as_ref() {
				"code" => &mut parsed.code,
				"state" => &mut parsed.state,
				"error" => &mut parsed.error,
				"error_description" => &mut parsed.error_description,
				_ => continue,
			};

			slot.get_or_insert_with(|| value.into_owned());
		}

		parsed
	}

	/// Extracts the callback parameters from a full redirect URL.
	pub fn from_url(url: &Url) -> Self {
		Self::parse(url.query().unwrap_or_default())
	}
}

#[derive(Debug, Deserialize)]
struct UpstreamUser {
	metadata: ObjectMeta,
	#[serde(default, rename = "fullName")]
	full_name: Option<String>,
	#[serde(default)]
	groups: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ObjectMeta {
	#[serde(default)]
	name: String,
	#[serde(default)]
	uid: String,
}

/// Connector for OAuth 2.0 providers that publish authorization-server metadata.
///
/// The instance is immutable after [`OAuth2Connector::open`] and safe to share across concurrent
/// logins; per-login token state only travels through return values and connector data.
pub struct OAuth2Connector {
	config: OAuth2Config,
	metadata: ProviderMetadata,
	users_url: Url,
	oauth_client: ConfiguredBasicClient,
	http_client: ReqwestHttpClient,
	lifetime: CancellationToken,
}
impl OAuth2Connector {
	/// Builds the transport, runs discovery, and returns a ready connector.
	///
	/// Nothing is returned unless every step succeeds.
	pub async fn open(config: OAuth2Config) -> Result<Self> {
		obs::observe(KIND, "discover", async move {
			let lifetime = CancellationToken::new();
			let http_client = TrustPolicy::from_options(&config.tls).build_http_client(KIND.as_str())?;
			let issuer = config.issuer.trim_end_matches('/');
			let well_known = parse_url("issuer", &format!("{issuer}{WELL_KNOWN_PATH}"))?;
			let users_url = parse_url("issuer", &format!("{issuer}{USERS_PATH}"))?;
			let redirect_url = RedirectUrl::new(config.redirect_uri.clone())
				.map_err(|source| ConfigError::InvalidUrl { field: "redirectURI", source })?;
			let metadata =
				until_closed(&lifetime, discover(&http_client, &well_known)).await?;
			let auth_url = AuthUrl::new(metadata.authorization_endpoint.clone())
				.map_err(|e| discovery_error(&well_known, None, e))?;
			let token_url = TokenUrl::new(metadata.token_endpoint.clone())
				.map_err(|e| discovery_error(&well_known, None, e))?;
			let oauth_client = BasicClient::new(ClientId::new(config.client_id.clone()))
				.set_client_secret(ClientSecret::new(config.client_secret.expose().to_owned()))
				.set_auth_uri(auth_url)
				.set_token_uri(token_url)
				.set_redirect_uri(redirect_url);

			Ok(Self { config, metadata, users_url, oauth_client, http_client, lifetime })
		})
		.await
	}

	/// Configuration the connector was opened with.
	pub fn config(&self) -> &OAuth2Config {
		&self.config
	}

	/// Endpoints learned during discovery.
	pub fn metadata(&self) -> &ProviderMetadata {
		&self.metadata
	}

	/// Returns the provider authorization URL for a new login.
	///
	/// `callback_url` must equal the configured redirect URI; anything else is rejected before a
	/// URL is produced.
	pub fn login_url(&self, callback_url: &str, state: &str) -> Result<Url> {
		obs::observe_sync(KIND, "login_url", || {
			if callback_url != self.config.redirect_uri {
				return Err(ConfigError::CallbackMismatch {
					requested: callback_url.to_owned(),
					configured: self.config.redirect_uri.clone(),
				}
				.into());
			}

			let (url, _) = self
				.oauth_client
				.authorize_url(|| CsrfToken::new(state.to_owned()))
				.add_scope(Scope::new(USER_INFO_SCOPE.to_owned()))
				.url();

			Ok(url)
		})
	}

	/// Completes a login from the provider's callback parameters.
	pub async fn handle_callback(&self, scopes: Scopes, query: &CallbackQuery) -> Result<Identity> {
		obs::observe(KIND, "callback", async move {
			if let Some(code) = query.error.as_deref().filter(|code| !code.is_empty()) {
				return Err(Error::UpstreamAuth {
					code: code.to_owned(),
					description: query.error_description.clone().filter(|d| !d.is_empty()),
				});
			}

			let code = query.code.as_deref().filter(|code| !code.is_empty()).ok_or_else(|| {
				Error::UpstreamAuth {
					code: "invalid_request".into(),
					description: Some("Callback is missing the authorization code".into()),
				}
			})?;
			let token = self.exchange_code(code).await?;

			self.resolve_identity(scopes, token).await
		})
		.await
	}

	/// Re-resolves an identity from the token record stored in its connector data.
	///
	/// An expired record that carries a refresh token is renewed first.
	pub async fn refresh(&self, scopes: Scopes, identity: &Identity) -> Result<Identity> {
		obs::observe(KIND, "refresh", async move {
			let mut token =
				TokenRecord::from_connector_data(identity.connector_data.as_deref().unwrap_or_default())?;

			if token.needs_refresh_at(OffsetDateTime::now_utc()) {
				token = self.renew(&token).await?;
			}

			self.resolve_identity(scopes, token).await
		})
		.await
	}

	/// Cancels the connector's lifetime scope, aborting in-flight upstream calls.
	///
	/// Calling it more than once has no further effect.
	pub fn close(&self) {
		self.lifetime.cancel();
	}

	/// Returns `true` once [`OAuth2Connector::close`] has been called.
	pub fn is_closed(&self) -> bool {
		self.lifetime.is_cancelled()
	}

	async fn exchange_code(&self, code: &str) -> Result<TokenRecord> {
		let slot = ResponseMetadataSlot::default();
		let handle = self.http_client.instrumented(slot.clone());
		let response = until_closed(&self.lifetime, async {
			self.oauth_client
				.exchange_code(AuthorizationCode::new(code.to_owned()))
				.request_async(&handle)
				.await
				.map_err(|e| map_token_error(e, slot.status()))
		})
		.await?;

		Ok(token_record(&response, None))
	}

	async fn renew(&self, token: &TokenRecord) -> Result<TokenRecord> {
		let Some(refresh) = token.refresh_token.as_ref() else {
			return Ok(token.clone());
		};
		let slot = ResponseMetadataSlot::default();
		let handle = self.http_client.instrumented(slot.clone());
		let refresh_secret = RefreshToken::new(refresh.expose().to_owned());
		let response = until_closed(&self.lifetime, async {
			self.oauth_client
				.exchange_refresh_token(&refresh_secret)
				.request_async(&handle)
				.await
				.map_err(|e| map_token_error(e, slot.status()))
		})
		.await?;

		Ok(token_record(&response, Some(refresh.clone())))
	}

	async fn resolve_identity(&self, scopes: Scopes, token: TokenRecord) -> Result<Identity> {
		let user = until_closed(&self.lifetime, self.fetch_user(&token)).await?;
		let groups = user.groups.unwrap_or_default();
		let username = user.metadata.name;

		if !groups::is_authorized(&groups, &self.config.groups) {
			return Err(Error::AuthorizationDenied { username });
		}

		#[cfg(feature = "tracing")]
		tracing::debug!(user = username.as_str(), full_name = ?user.full_name, "Resolved upstream user.");
		#[cfg(not(feature = "tracing"))]
		let _ = user.full_name;

		let connector_data =
			if scopes.offline_access { Some(token.to_connector_data()?) } else { None };

		Ok(Identity {
			user_id: user.metadata.uid,
			preferred_username: username.clone(),
			// The user API exposes no email attribute; the username stands in for it.
			email: username.clone(),
			username,
			groups,
			connector_data,
			..Default::default()
		})
	}

	async fn fetch_user(&self, token: &TokenRecord) -> Result<UpstreamUser> {
		let request = self
			.http_client
			.get(self.users_url.clone())
			.header(ACCEPT, "application/json")
			.bearer_auth(token.access_token.expose());
		let (status, body) = self.http_client.send_text("user-info", request).await?;

		if !http::is_success(status) {
			return Err(UpstreamError::Api { status, body }.into());
		}

		let de = &mut serde_json::Deserializer::from_str(&body);

		serde_path_to_error::deserialize(de)
			.map_err(|source| UpstreamError::ResponseParse { endpoint: "user-info", source }.into())
	}
}
impl Debug for OAuth2Connector {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuth2Connector")
			.field("issuer", &self.config.issuer)
			.field("client_id", &self.config.client_id)
			.field("metadata", &self.metadata)
			.field("closed", &self.is_closed())
			.finish()
	}
}

async fn discover(http_client: &ReqwestHttpClient, url: &Url) -> Result<ProviderMetadata> {
	let request = http_client.get(url.clone()).header(ACCEPT, "application/json");
	let (status, body) = http_client
		.send_text("discovery", request)
		.await
		.map_err(|e| discovery_error(url, None, e))?;

	if !http::is_success(status) {
		return Err(UpstreamError::Discovery { url: url.to_string(), status: Some(status), source: None }
			.into());
	}

	let de = &mut serde_json::Deserializer::from_str(&body);

	serde_path_to_error::deserialize(de).map_err(|e| discovery_error(url, Some(status), e))
}

fn discovery_error(
	url: &Url,
	status: Option<u16>,
	source: impl 'static + Send + Sync + StdError,
) -> Error {
	UpstreamError::Discovery { url: url.to_string(), status, source: Some(Box::new(source)) }.into()
}

fn parse_url(field: &'static str, value: &str) -> Result<Url> {
	Url::parse(value).map_err(|source| ConfigError::InvalidUrl { field, source }.into())
}

fn token_record(response: &BasicTokenResponse, previous_refresh: Option<TokenSecret>) -> TokenRecord {
	TokenRecord::from_response(response, OffsetDateTime::now_utc(), previous_refresh)
}

fn map_token_error(err: BasicRequestTokenError<HttpClientError<ReqwestError>>, status: Option<u16>) -> Error {
	match err {
		RequestTokenError::ServerResponse(response) => {
			let code = response.error().as_ref().to_owned();
			let message = match response.error_description() {
				Some(description) => format!("provider returned `{code}`: {description}"),
				None => format!("provider returned `{code}`"),
			};

			UpstreamError::TokenEndpoint { message, status }.into()
		},
		RequestTokenError::Request(HttpClientError::Reqwest(inner)) =>
			TransportError::network("token", *inner).into(),
		RequestTokenError::Request(HttpClientError::Http(inner)) => ConfigError::from(inner).into(),
		RequestTokenError::Request(HttpClientError::Io(inner)) => TransportError::Io(inner).into(),
		RequestTokenError::Request(HttpClientError::Other(message)) =>
			UpstreamError::TokenEndpoint { message, status }.into(),
		RequestTokenError::Request(_) => UpstreamError::TokenEndpoint {
			message: "HTTP client error occurred while calling the token endpoint".into(),
			status,
		}
		.into(),
		RequestTokenError::Parse(source, _body) =>
			UpstreamError::ResponseParse { endpoint: "token", source }.into(),
		RequestTokenError::Other(message) => UpstreamError::TokenEndpoint { message, status }.into(),
	}
}
