//! Pluggable upstream identity connectors: OAuth 2.0 code flow and session-cookie lookups
//! normalized into one canonical identity, each behind an explicit TLS trust policy.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod connector;
pub mod error;
pub mod groups;
pub mod http;
pub mod identity;
pub mod obs;
pub mod tls;
pub mod token;
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests.

	pub use crate::_prelude::*;

	// self
	use crate::{
		connector::{OAuth2Config, SessionCookieConfig},
		tls::TlsOptions,
		token::TokenSecret,
	};

	/// Test client identifier.
	pub const TEST_CLIENT_ID: &str = "client-it";
	/// Test client secret.
	pub const TEST_CLIENT_SECRET: &str = "secret-it";
	/// Redirect URI configured on test OAuth 2.0 connectors.
	pub const TEST_REDIRECT_URI: &str = "https://dex.example.com/callback";
	/// Service signature configured on test session-cookie connectors.
	pub const TEST_SERVICE_SIGNATURE: &str = "signature-it";

	/// Trust options for talking to the TLS-enabled mock server; certificate checks are off.
	pub fn mock_tls_options() -> TlsOptions {
		TlsOptions { insecure_ca: true, ..Default::default() }
	}

	/// OAuth 2.0 connector configuration pointing at `issuer` with the given group allow-list.
	pub fn oauth2_test_config(issuer: &str, groups: &[&str]) -> OAuth2Config {
		OAuth2Config {
			issuer: issuer.to_owned(),
			client_id: TEST_CLIENT_ID.to_owned(),
			client_secret: TokenSecret::new(TEST_CLIENT_SECRET),
			redirect_uri: TEST_REDIRECT_URI.to_owned(),
			groups: groups.iter().map(|group| group.to_string()).collect(),
			tls: mock_tls_options(),
		}
	}

	/// Session-cookie connector configuration pointing at `base_url`.
	pub fn session_cookie_test_config(base_url: &str) -> SessionCookieConfig {
		SessionCookieConfig {
			base_url: base_url.to_owned(),
			redirect_uri: TEST_REDIRECT_URI.to_owned(),
			client_id: TEST_CLIENT_ID.to_owned(),
			client_secret: TokenSecret::new(TEST_CLIENT_SECRET),
			use_login_as_id: false,
			service_signature: TokenSecret::new(TEST_SERVICE_SIGNATURE),
			tls: mock_tls_options(),
		}
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::Mutex;
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {httpmock as _, tokio as _};
