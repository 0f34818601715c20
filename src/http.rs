//! Transport primitives shared by every connector.
//!
//! [`ReqwestHttpClient`] is the single HTTP stack a connector talks through. The trust builder in
//! [`crate::tls`] produces it, so discovery, token exchange, user-info and session lookups all run
//! under the same trust policy. Token exchanges go through `oauth2`, which receives an
//! [`InstrumentedHandle`]; the handle records the response status in a [`ResponseMetadataSlot`]
//! so token-endpoint failures can report what the provider answered.

// std
use std::ops::Deref;
// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};
// self
use crate::{_prelude::*, error::TransportError};

/// Captures metadata from the most recent HTTP response for downstream error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the upstream endpoint, if available.
	pub status: Option<u16>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
///
/// A fresh slot is created for every token request, so nothing recorded here outlives the call
/// that produced it.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}

	/// Returns the captured status without consuming the slot.
	pub fn status(&self) -> Option<u16> {
		self.0.lock().as_ref().and_then(|meta| meta.status)
	}
}

/// Thin wrapper around [`ReqwestClient`] bound to a connector's trust policy.
///
/// Redirect following must stay disabled on the wrapped client: token endpoints answer directly,
/// and a redirect on the session-lookup call would forward the service signature header.
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds an instrumented `oauth2` handle that captures response metadata.
	pub(crate) fn instrumented(&self, slot: ResponseMetadataSlot) -> InstrumentedHandle {
		InstrumentedHandle(Arc::new(InstrumentedHttpClient { client: self.0.clone(), slot }))
	}

	/// Sends a request and returns the status plus the full body text.
	pub(crate) async fn send_text(
		&self,
		endpoint: &'static str,
		request: reqwest::RequestBuilder,
	) -> Result<(u16, String)> {
		let response =
			request.send().await.map_err(|e| TransportError::network(endpoint, e))?;
		let status = response.status().as_u16();
		let body = response.text().await.map_err(|e| TransportError::network(endpoint, e))?;

		Ok((status, body))
	}
}
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl Debug for ReqwestHttpClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ReqwestHttpClient(..)")
	}
}

struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}

/// `oauth2` transport handle returned by [`ReqwestHttpClient`].
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = Arc::clone(&self.0);

		Box::pin(async move {
			client.slot.take();

			let response = client
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();

			client.slot.store(ResponseMetadata { status: Some(status.as_u16()) });

			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// Returns `true` for 2xx status codes.
pub(crate) fn is_success(status: u16) -> bool {
	(200..300).contains(&status)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn slot_take_clears_metadata() {
		let slot = ResponseMetadataSlot::default();

		slot.store(ResponseMetadata { status: Some(401) });

		assert_eq!(slot.status(), Some(401));
		assert_eq!(slot.take().and_then(|meta| meta.status), Some(401));
		assert!(slot.take().is_none());
	}

	#[test]
	fn success_range_is_2xx_only() {
		assert!(is_success(200));
		assert!(is_success(204));
		assert!(!is_success(302));
		assert!(!is_success(500));
	}
}
