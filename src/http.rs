//! Transport primitives for provider round trips.
//!
//! [`HttpTransport`] is the crate's only dependency on an HTTP stack. Adapters build
//! requests with [`ProviderRequest`], send them under a [`CallContext`], and read the
//! buffered [`ProviderResponse`]. The `oauth2` crate's token requests run over the same
//! transport through [`InstrumentedHandle`], which records the response status into a
//! [`ResponseMetadataSlot`] so rejected exchanges can report it.

pub use oauth2::{HttpRequest, HttpResponse};

// std
use std::borrow::Cow;
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError,
	http::{
		Method, Request,
		header::{ACCEPT, CONTENT_TYPE, USER_AGENT},
	},
};
// self
use crate::{_prelude::*, context::CallContext, error::TransportError};

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

const USER_AGENT_VALUE: &str = concat!("oauth2-identity/", env!("CARGO_PKG_VERSION"));

/// Object-safe HTTP transport shared by every adapter.
///
/// Implementations execute exactly one request per call and never retry; authorization
/// codes are single-use, so a replayed exchange is always wrong. Responses must be returned
/// for every HTTP status, leaving status interpretation to the adapters.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and buffers the full response body.
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_>;
}

/// Captures metadata from the most recent HTTP response for downstream error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the provider, if available.
	pub status: Option<u16>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
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
}

/// [`AsyncHttpClient`] view over a [`HttpTransport`] for the `oauth2` crate.
pub(crate) struct InstrumentedHandle<'t> {
	transport: &'t dyn HttpTransport,
	slot: ResponseMetadataSlot,
}
impl<'t> InstrumentedHandle<'t> {
	pub(crate) fn new(transport: &'t dyn HttpTransport, slot: ResponseMetadataSlot) -> Self {
		Self { transport, slot }
	}
}
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle<'_> {
	type Error = HttpClientError<TransportError>;
	type Future = Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.slot.take();

			let response = self.transport.execute(request).await.map_err(Box::new)?;

			self.slot.store(ResponseMetadata { status: Some(response.status().as_u16()) });

			Ok(response)
		})
	}
}

/// Outbound request assembled by an adapter.
#[derive(Debug)]
pub(crate) struct ProviderRequest {
	method: Method,
	url: Url,
	headers: Vec<(&'static str, String)>,
	content_type: Option<&'static str>,
	body: Vec<u8>,
}
impl ProviderRequest {
	pub(crate) fn get(url: Url) -> Self {
		Self { method: Method::GET, url, headers: Vec::new(), content_type: None, body: Vec::new() }
	}

	pub(crate) fn post_json(url: Url, body: &JsonValue) -> Self {
		Self {
			method: Method::POST,
			url,
			headers: Vec::new(),
			content_type: Some("application/json"),
			body: body.to_string().into_bytes(),
		}
	}

	pub(crate) fn post_form<'p, I>(url: Url, pairs: I) -> Self
	where
		I: IntoIterator<Item = (&'p str, &'p str)>,
	{
		let body = url::form_urlencoded::Serializer::new(String::new()).extend_pairs(pairs).finish();

		Self {
			method: Method::POST,
			url,
			headers: Vec::new(),
			content_type: Some("application/x-www-form-urlencoded;charset=utf-8"),
			body: body.into_bytes(),
		}
	}

	pub(crate) fn query<'p, I>(mut self, pairs: I) -> Self
	where
		I: IntoIterator<Item = (&'p str, &'p str)>,
	{
		self.url.query_pairs_mut().extend_pairs(pairs);

		self
	}

	pub(crate) fn bearer(self, token: &str) -> Self {
		self.header("authorization", format!("Bearer {token}"))
	}

	pub(crate) fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
		self.headers.push((name, value.into()));

		self
	}

	fn into_http(self) -> Result<HttpRequest, TransportError> {
		let mut builder = Request::builder()
			.method(self.method)
			.uri(self.url.as_str())
			.header(ACCEPT, "application/json")
			.header(USER_AGENT, USER_AGENT_VALUE);

		if let Some(content_type) = self.content_type {
			builder = builder.header(CONTENT_TYPE, content_type);
		}
		for (name, value) in self.headers {
			builder = builder.header(name, value);
		}

		Ok(builder.body(self.body)?)
	}

	/// Sends the request once under `ctx`.
	pub(crate) async fn send(
		self,
		transport: &dyn HttpTransport,
		ctx: &CallContext,
	) -> Result<ProviderResponse, TransportError> {
		let request = self.into_http()?;
		let response = ctx.guard(transport.execute(request)).await??;

		Ok(ProviderResponse { status: response.status().as_u16(), body: response.into_body() })
	}
}

/// Buffered provider response.
#[derive(Clone, Debug)]
pub(crate) struct ProviderResponse {
	pub(crate) status: u16,
	pub(crate) body: Vec<u8>,
}
impl ProviderResponse {
	pub(crate) fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	pub(crate) fn text(&self) -> Cow<'_, str> {
		String::from_utf8_lossy(&self.body)
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Token endpoints answer directly, so [`ReqwestHttpClient::new`] disables redirect
/// following. A client supplied through [`ReqwestHttpClient::with_client`] is used as is.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Builds a client that does not follow redirects.
	pub fn new() -> Result<Self, crate::error::ConfigError> {
		let client = ReqwestClient::builder().redirect(reqwest::redirect::Policy::none()).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestHttpClient {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let response = client.execute(request.try_into()?).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut converted = HttpResponse::new(response.bytes().await?.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}
