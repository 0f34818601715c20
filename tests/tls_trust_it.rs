// crates.io
use httpmock::prelude::*;
// self
use identity_connector::{
	_preludet::*,
	connector::{OAuth2Connector, SessionCookieConnector},
	error::{ConfigError, ErrorKind},
	tls::{TlsOptions, TrustPolicy},
};

const ROOT_CA: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/root-ca.pem");
const EMPTY_BUNDLE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/empty-bundle.pem");
const MOCK_CA: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/httpmock-ca.pem");

async fn start_tls_endpoint() -> (MockServer, String) {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/ping");
			then.status(204);
		})
		.await;

	// The hostname makes the mock present a leaf certificate issued for `localhost`.
	let url = format!("https://localhost:{}/ping", server.port());

	(server, url)
}

async fn handshake(policy: TrustPolicy, url: &str) -> Result<u16, ReqwestError> {
	let client =
		policy.build_http_client("tls-it").expect("Client should build for a valid trust policy.");

	client.get(url).send().await.map(|response| response.status().as_u16())
}

#[test]
fn policy_resolution_follows_priority_order() {
	let custom = TlsOptions {
		insecure_ca: false,
		root_ca: Some(ROOT_CA.into()),
		include_system_root_cas: true,
	};

	assert_eq!(
		TrustPolicy::from_options(&custom),
		TrustPolicy::CustomRoots { path: ROOT_CA.into(), include_system_roots: true }
	);
	assert_eq!(
		TrustPolicy::from_options(&TlsOptions { insecure_ca: true, ..custom }),
		TrustPolicy::Insecure
	);
	assert_eq!(TrustPolicy::from_options(&TlsOptions::default()), TrustPolicy::Platform);
}

#[test]
fn unreadable_root_bundle_blocks_connector_construction() {
	let mut config = session_cookie_test_config("https://console.example.com");

	config.tls = TlsOptions {
		root_ca: Some("/nonexistent/identity-connector/root.pem".into()),
		..TlsOptions::default()
	};

	let err = SessionCookieConnector::open(config).expect_err("Missing bundles should fail open.");

	assert!(matches!(err, Error::Config(ConfigError::RootCaUnreadable { .. })));
	assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn bundle_without_certificates_blocks_connector_construction() {
	let mut config = session_cookie_test_config("https://console.example.com");

	config.tls = TlsOptions { root_ca: Some(EMPTY_BUNDLE.into()), ..TlsOptions::default() };

	let err = SessionCookieConnector::open(config).expect_err("Empty bundles should fail open.");

	assert!(matches!(err, Error::Config(ConfigError::RootCaEmpty { .. })));
}

#[tokio::test]
async fn oauth2_connector_checks_trust_before_discovery() {
	let server = MockServer::start_async().await;
	// A discovery attempt would surface as an upstream error instead.
	server
		.mock_async(|when, then| {
			when.method(GET).path("/.well-known/oauth-authorization-server");
			then.status(500);
		})
		.await;

	let mut config = oauth2_test_config(&server.base_url(), &[]);

	config.tls = TlsOptions { root_ca: Some(EMPTY_BUNDLE.into()), ..TlsOptions::default() };

	let err = OAuth2Connector::open(config)
		.await
		.expect_err("Trust failures should abort construction before any upstream call.");

	assert!(matches!(err, Error::Config(ConfigError::RootCaEmpty { .. })));
}

#[tokio::test]
async fn insecure_policy_accepts_any_server_certificate() {
	let (_server, url) = start_tls_endpoint().await;
	let status =
		handshake(TrustPolicy::Insecure, &url).await.expect("Insecure clients should skip verification.");

	assert_eq!(status, 204);
}

#[tokio::test]
async fn custom_roots_reject_servers_outside_the_bundle() {
	let (_server, url) = start_tls_endpoint().await;

	for include_system_roots in [false, true] {
		let err = handshake(TrustPolicy::CustomRoots { path: ROOT_CA.into(), include_system_roots }, &url)
			.await
			.expect_err("A certificate from an unrelated authority should be rejected.");

		assert!(err.is_connect(), "Rejection should happen during connect: {err:?}.");
	}
}

#[tokio::test]
async fn custom_roots_accept_servers_issued_by_the_bundle() {
	let (_server, url) = start_tls_endpoint().await;

	for include_system_roots in [false, true] {
		let status =
			handshake(TrustPolicy::CustomRoots { path: MOCK_CA.into(), include_system_roots }, &url)
				.await
				.expect("A certificate issued by the bundled authority should be trusted.");

		assert_eq!(status, 204);
	}
}

#[tokio::test]
async fn platform_policy_rejects_private_authorities() {
	let (_server, url) = start_tls_endpoint().await;
	let err = handshake(TrustPolicy::Platform, &url)
		.await
		.expect_err("Built-in roots should not trust the mock authority.");

	assert!(err.is_connect(), "Rejection should happen during connect: {err:?}.");
}
