//! Trust policy resolution and HTTP client construction.
//!
//! Every connector builds its transport through [`TrustPolicy::build_http_client`], so the set of
//! accepted certificate authorities always comes from explicit configuration and never from the
//! scheme of the URL being called.

// std
use std::time::Duration as StdDuration;
// crates.io
use reqwest::{Certificate, redirect::Policy};
// self
use crate::{_prelude::*, error::ConfigError, http::ReqwestHttpClient, obs};

const CONNECT_TIMEOUT: StdDuration = StdDuration::from_secs(30);
const TCP_KEEPALIVE: StdDuration = StdDuration::from_secs(30);
const POOL_IDLE_TIMEOUT: StdDuration = StdDuration::from_secs(90);
const POOL_MAX_IDLE_PER_HOST: usize = 100;

/// TLS fields shared by every connector configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsOptions {
	/// Skip certificate verification entirely.
	#[serde(default, rename = "insecureCA")]
	pub insecure_ca: bool,
	/// Path to a PEM bundle of additional trusted roots.
	#[serde(default, rename = "rootCA")]
	pub root_ca: Option<String>,
	/// Keep the built-in roots next to the custom bundle.
	#[serde(default, rename = "includeSystemRootCAs")]
	pub include_system_root_cas: bool,
}

/// Resolved certificate trust rule for a connector transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrustPolicy {
	/// Accept any certificate. Explicit opt-in only.
	Insecure,
	/// Trust the roots in a PEM file, optionally alongside the built-in roots.
	CustomRoots {
		/// PEM bundle path.
		path: String,
		/// Whether the built-in roots remain trusted.
		include_system_roots: bool,
	},
	/// Trust the built-in root store.
	Platform,
}
impl TrustPolicy {
	/// Resolves the policy from configuration in priority order: insecure, custom roots,
	/// platform default.
	pub fn from_options(options: &TlsOptions) -> Self {
		if options.insecure_ca {
			return Self::Insecure;
		}

		match options.root_ca.as_deref() {
			Some(path) if !path.is_empty() => Self::CustomRoots {
				path: path.to_owned(),
				include_system_roots: options.include_system_root_cas,
			},
			_ => Self::Platform,
		}
	}

	/// Builds an HTTP client enforcing this policy.
	///
	/// `connector` labels the trust-downgrade warning emitted for [`TrustPolicy::Insecure`].
	/// Nothing is shared with other clients, so a failure leaves no partial state behind.
	pub fn build_http_client(&self, connector: &str) -> Result<ReqwestHttpClient> {
		let mut builder = ReqwestClient::builder()
			.connect_timeout(CONNECT_TIMEOUT)
			.tcp_keepalive(TCP_KEEPALIVE)
			.pool_idle_timeout(POOL_IDLE_TIMEOUT)
			.pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
			.redirect(Policy::none());

		match self {
			Self::Insecure => {
				obs::warn_trust_downgrade(connector);

				builder = builder
					.danger_accept_invalid_certs(true)
					.danger_accept_invalid_hostnames(true);
			},
			Self::CustomRoots { path, include_system_roots } => {
				let roots = load_root_certificates(path)?;

				builder = builder.tls_built_in_root_certs(*include_system_roots);

				for cert in roots {
					builder = builder.add_root_certificate(cert);
				}
			},
			Self::Platform => {},
		}

		let client = builder.build().map_err(ConfigError::http_client_build)?;

		Ok(ReqwestHttpClient::with_client(client))
	}
}

/// Reads a PEM bundle and returns every certificate in it.
///
/// Fails when the file is unreadable or holds no certificate.
pub fn load_root_certificates(path: &str) -> Result<Vec<Certificate>> {
	let pem = std::fs::read(path)
		.map_err(|source| ConfigError::RootCaUnreadable { path: path.to_owned(), source })?;
	let certs = Certificate::from_pem_bundle(&pem)
		.map_err(|_| ConfigError::RootCaEmpty { path: path.to_owned() })?;

	if certs.is_empty() {
		return Err(ConfigError::RootCaEmpty { path: path.to_owned() }.into());
	}

	Ok(certs)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const ROOT_CA: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/root-ca.pem");
	const EMPTY_BUNDLE: &str =
		concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/empty-bundle.pem");

	#[test]
	fn insecure_takes_priority_over_root_ca() {
		let options = TlsOptions {
			insecure_ca: true,
			root_ca: Some(ROOT_CA.into()),
			include_system_root_cas: true,
		};

		assert_eq!(TrustPolicy::from_options(&options), TrustPolicy::Insecure);
	}

	#[test]
	fn empty_root_ca_path_falls_back_to_platform() {
		let options = TlsOptions { root_ca: Some(String::new()), ..Default::default() };

		assert_eq!(TrustPolicy::from_options(&options), TrustPolicy::Platform);
		assert_eq!(TrustPolicy::from_options(&TlsOptions::default()), TrustPolicy::Platform);
	}

	#[test]
	fn root_ca_policy_carries_system_roots_flag() {
		let options = TlsOptions {
			root_ca: Some(ROOT_CA.into()),
			include_system_root_cas: true,
			..Default::default()
		};

		assert_eq!(
			TrustPolicy::from_options(&options),
			TrustPolicy::CustomRoots { path: ROOT_CA.into(), include_system_roots: true }
		);
	}

	#[test]
	fn custom_roots_build_from_valid_bundle() {
		for include_system_roots in [false, true] {
			let policy = TrustPolicy::CustomRoots { path: ROOT_CA.into(), include_system_roots };

			policy.build_http_client("test").expect("Valid bundle should build a client.");
		}
	}

	#[test]
	fn missing_root_ca_is_configuration_error() {
		let policy = TrustPolicy::CustomRoots {
			path: "/nonexistent/root-ca.pem".into(),
			include_system_roots: false,
		};
		let err = policy.build_http_client("test").expect_err("Missing bundle should fail.");

		assert!(matches!(err, Error::Config(ConfigError::RootCaUnreadable { .. })));
	}

	#[test]
	fn bundle_without_certificates_is_configuration_error() {
		let policy =
			TrustPolicy::CustomRoots { path: EMPTY_BUNDLE.into(), include_system_roots: true };
		let err = policy.build_http_client("test").expect_err("Empty bundle should fail.");

		assert!(matches!(err, Error::Config(ConfigError::RootCaEmpty { .. })));
	}
}
