//! Internal OAuth client facade for providers that follow the standard code grant.
//!
//! Google, GitHub, Facebook, Microsoft, X, and Apple answer the RFC 6749 token request, so
//! their exchanges go through the `oauth2` crate. Extra members of the token response
//! (`id_token`, ...) are kept so the identity step can use them.

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret, EndpointNotSet,
	EndpointSet, ExtraTokenFields, HttpClientError, PkceCodeVerifier, RedirectUrl,
	RequestTokenError, StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
		BasicTokenType,
	},
};
// self
use crate::{
	_prelude::*,
	auth::Token,
	config::ClientSettings,
	context::CallContext,
	error::{ProviderFailure, TransportError},
	http::{HttpTransport, InstrumentedHandle, ResponseMetadata, ResponseMetadataSlot},
	pkce::PkceVerifier,
	provider::{ClientAuthMethod, ExchangeOptions, ProviderDescriptor, ProviderErrorContext, envelope},
};

/// Token response members beyond the RFC 6749 set.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub(crate) struct ProviderTokenFields {
	#[serde(flatten)]
	fields: BTreeMap<String, JsonValue>,
}
impl ExtraTokenFields for ProviderTokenFields {}

type ProviderTokenResponse = StandardTokenResponse<ProviderTokenFields, BasicTokenType>;
type ConfiguredClient = Client<
	BasicErrorResponse,
	ProviderTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;
type FacadeRequestError = RequestTokenError<HttpClientError<TransportError>, BasicErrorResponse>;

/// Per-call inputs that vary between adapters.
#[derive(Debug, Default)]
pub(crate) struct CodeExchange<'a> {
	pub(crate) pkce_verifier: Option<&'a PkceVerifier>,
	/// Replaces the configured secret (Apple mints one per exchange).
	pub(crate) client_secret: Option<&'a str>,
}

/// Standard authorization-code exchange bound to one descriptor.
#[derive(Debug)]
pub(crate) struct CodeGrantFacade {
	auth_url: AuthUrl,
	token_url: TokenUrl,
	redirect_url: RedirectUrl,
	client_id: ClientId,
	client_secret: Option<ClientSecret>,
	auth_method: ClientAuthMethod,
}
impl CodeGrantFacade {
	pub(crate) fn from_descriptor(descriptor: &ProviderDescriptor, settings: &ClientSettings) -> Self {
		let client_secret = match descriptor.client_auth_method {
			ClientAuthMethod::NoneWithPkce => None,
			_ if settings.client_secret.is_empty() => None,
			_ => Some(ClientSecret::new(settings.client_secret.clone())),
		};

		Self {
			auth_url: AuthUrl::from_url(descriptor.endpoints.authorization.clone()),
			token_url: TokenUrl::from_url(descriptor.endpoints.token.clone()),
			redirect_url: RedirectUrl::from_url(settings.redirect_url.clone()),
			client_id: ClientId::new(settings.client_id.clone()),
			client_secret,
			auth_method: descriptor.client_auth_method,
		}
	}

	fn client(&self, secret_override: Option<&str>) -> ConfiguredClient {
		let mut client: ConfiguredClient = Client::new(self.client_id.clone())
			.set_auth_uri(self.auth_url.clone())
			.set_token_uri(self.token_url.clone())
			.set_redirect_uri(self.redirect_url.clone());
		let secret = secret_override
			.map(|secret| ClientSecret::new(secret.to_owned()))
			.or_else(|| self.client_secret.clone());

		if let Some(secret) = secret {
			client = client.set_client_secret(secret);
		}
		if !matches!(self.auth_method, ClientAuthMethod::ClientSecretBasic) {
			client = client.set_auth_type(AuthType::RequestBody);
		}

		client
	}

	/// Exchanges `code` once; `now` stamps the derived expiry.
	pub(crate) async fn exchange(
		&self,
		transport: &dyn HttpTransport,
		ctx: &CallContext,
		code: &str,
		options: &ExchangeOptions,
		call: CodeExchange<'_>,
		now: OffsetDateTime,
	) -> Result<Token, ProviderFailure> {
		let meta = ResponseMetadataSlot::default();
		let handle = InstrumentedHandle::new(transport, meta.clone());
		let client = self.client(call.client_secret);
		let mut request = client.exchange_code(AuthorizationCode::new(code.to_owned()));

		if let Some(verifier) = call.pkce_verifier {
			request = request.set_pkce_verifier(PkceCodeVerifier::new(verifier.expose().to_owned()));
		}
		for (key, value) in &options.extra_params {
			request = request.add_extra_param(key.as_str(), value.as_str());
		}

		let response = ctx
			.guard(request.request_async(&handle))
			.await?
			.map_err(|err| map_request_error(meta.take(), err))?;

		map_token_response(response, now)
	}
}

fn map_token_response(response: ProviderTokenResponse, now: OffsetDateTime) -> Result<Token, ProviderFailure> {
	let mut builder = Token::builder().access_token(response.access_token().secret().to_owned());

	if let Some(refresh) = response.refresh_token() {
		builder = builder.refresh_token(refresh.secret().to_owned());
	}
	if let Some(expires_in) = response.expires_in() {
		builder = builder.expires_in(now, i64::try_from(expires_in.as_secs()).unwrap_or(i64::MAX));
	}
	for (key, value) in &response.extra_fields().fields {
		builder = builder.claim(key.to_owned(), value.clone());
	}

	builder.build().map_err(|e| ProviderFailure::malformed(e.to_string(), Some(200)))
}

fn map_request_error(meta: Option<ResponseMetadata>, err: FacadeRequestError) -> ProviderFailure {
	let status = meta.and_then(|meta| meta.status);

	match err {
		RequestTokenError::ServerResponse(response) => {
			let mut ctx = ProviderErrorContext::new().with_error_code(response.error().as_ref());

			if let Some(description) = response.error_description() {
				ctx = ctx.with_error_message(description.to_owned());
			}
			if let Some(status) = status {
				ctx = ctx.with_http_status(status);
			}

			ctx.into()
		},
		RequestTokenError::Request(error) => map_transport_error(error),
		// Providers such as GitHub answer `200 OK` with an OAuth error body.
		RequestTokenError::Parse(source, body) => serde_json::from_slice::<JsonValue>(&body)
			.ok()
			.and_then(|value| envelope::embedded_error(&value, status.unwrap_or(200)))
			.map(ProviderFailure::Rejected)
			.unwrap_or(ProviderFailure::Json { source, status }),
		RequestTokenError::Other(message) => match status {
			Some(status) if !(200..300).contains(&status) => ProviderErrorContext::new()
				.with_http_status(status)
				.with_error_message(message)
				.into(),
			_ => ProviderFailure::malformed(message, status),
		},
	}
}

fn map_transport_error(err: HttpClientError<TransportError>) -> ProviderFailure {
	match err {
		HttpClientError::Reqwest(inner) => ProviderFailure::Transport(*inner),
		HttpClientError::Http(inner) => TransportError::Request(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => ProviderFailure::malformed(message, None),
		_ => ProviderFailure::malformed("HTTP client error occurred while calling the token endpoint", None),
	}
}
