//! QQ Connect.
//!
//! The token endpoint answers with query-string text (`access_token=...&expires_in=...`),
//! while errors come back as JSON, often wrapped in `callback( ... );`. The profile call needs
//! the openid, which only the separate `/oauth2.0/me` lookup returns, again inside the
//! callback wrapper.

// self
use crate::{
	_prelude::*,
	auth::{NormalizedIdentity, Token},
	config::{ClientSettings, ProviderConfig, SecretRequirement},
	context::CallContext,
	error::{ConfigError, ProviderFailure},
	http::{ProviderRequest, ProviderResponse},
	obs::{self, Operation},
	provider::{
		AuthorizationOptions, ExchangeOptions, IdentityProvider, ProviderDescriptor, ProviderFuture,
		ProviderKind, envelope,
	},
	providers::{self, JsonReply, ProviderRuntime},
};

/// Provider handled by this module.
pub const KIND: ProviderKind = ProviderKind::Qq;

/// Published graph.qq.com endpoints; the auxiliary endpoint resolves the openid.
pub fn descriptor(_config: &ProviderConfig) -> Result<ProviderDescriptor, ConfigError> {
	Ok(ProviderDescriptor::builder(KIND)
		.published(
			"https://graph.qq.com/oauth2.0/authorize",
			"https://graph.qq.com/oauth2.0/token",
			Some("https://graph.qq.com/user/get_user_info"),
			Some("https://graph.qq.com/oauth2.0/me"),
		)
		.default_scopes(["get_user_info"])
		.build()?)
}

#[derive(Debug, Deserialize)]
struct QqOpenId {
	openid: String,
	#[serde(default)]
	unionid: String,
}

#[derive(Debug, Deserialize)]
struct QqUser {
	#[serde(default)]
	nickname: String,
	#[serde(default)]
	figureurl_qq_2: String,
	#[serde(default)]
	figureurl_qq_1: String,
}

/// Adapter for QQ.
#[derive(Debug)]
pub struct QqProvider {
	descriptor: ProviderDescriptor,
	settings: ClientSettings,
	userinfo: Url,
	openid: Url,
	runtime: ProviderRuntime,
}
impl QqProvider {
	/// Builds the adapter against the published endpoints.
	pub fn new(config: &ProviderConfig, runtime: ProviderRuntime) -> Result<Self> {
		Self::with_descriptor(config, descriptor(config)?, runtime)
	}

	/// Builds the adapter against `descriptor`.
	pub fn with_descriptor(
		config: &ProviderConfig,
		descriptor: ProviderDescriptor,
		runtime: ProviderRuntime,
	) -> Result<Self> {
		let settings = config.client_settings(KIND, SecretRequirement::Required)?;
		let userinfo = descriptor.endpoints.require_userinfo().map_err(ConfigError::from)?.clone();
		let openid = descriptor.endpoints.require_auxiliary().map_err(ConfigError::from)?.clone();

		Ok(Self { descriptor, settings, userinfo, openid, runtime })
	}

	async fn exchange(
		&self,
		ctx: &CallContext,
		code: &str,
		options: &ExchangeOptions,
	) -> Result<Token, ProviderFailure> {
		let response = ProviderRequest::get(self.descriptor.endpoints.token.clone())
			.query([
				("grant_type", "authorization_code"),
				("client_id", self.settings.client_id.as_str()),
				("client_secret", self.settings.client_secret.as_str()),
				("code", code),
				("redirect_uri", self.settings.redirect_url.as_str()),
			])
			.query(options.extra_params.iter().map(|(key, value)| (key.as_str(), value.as_str())))
			.send(self.runtime.transport(), ctx)
			.await?;
		let fields = token_fields(&response)?;
		let field = |key: &str| fields.get(key).map(String::as_str).unwrap_or_default();
		let expires_in = field("expires_in").parse::<i64>().unwrap_or_default();

		Token::builder()
			.access_token(field("access_token"))
			.refresh_token(field("refresh_token"))
			.expires_in(self.runtime.now(), expires_in)
			.build()
			.map_err(|e| providers::missing_access_token(e, response.status))
	}

	async fn identity(&self, ctx: &CallContext, token: &Token) -> Result<NormalizedIdentity, ProviderFailure> {
		let access_token = token.access_token.expose();
		let ids = JsonReply::fetch(
			self.runtime.transport(),
			ctx,
			ProviderRequest::get(self.openid.clone())
				.query([("access_token", access_token), ("unionid", "1")]),
		)
		.await?
		.decode::<QqOpenId>()?;
		let reply = JsonReply::fetch(
			self.runtime.transport(),
			ctx,
			ProviderRequest::get(self.userinfo.clone()).query([
				("access_token", access_token),
				("oauth_consumer_key", self.settings.client_id.as_str()),
				("openid", ids.openid.as_str()),
			]),
		)
		.await?;
		let user = reply.decode::<QqUser>()?;
		let user_id = envelope::first_non_empty([ids.unionid.as_str(), ids.openid.as_str()]);
		let avatar = envelope::first_non_empty([user.figureurl_qq_2.as_str(), user.figureurl_qq_1.as_str()]);

		Ok(NormalizedIdentity::new(KIND, user_id, reply.value)
			.with_display_name(user.nickname)
			.with_avatar_url(avatar))
	}
}
impl IdentityProvider for QqProvider {
	fn kind(&self) -> ProviderKind {
		KIND
	}

	fn authorization_url(&self, state: &str, options: &AuthorizationOptions) -> Url {
		providers::authorization_url(&self.descriptor, &self.settings, state, options, &[])
	}

	fn exchange_code<'a>(
		&'a self,
		ctx: &'a CallContext,
		code: &'a str,
		options: &'a ExchangeOptions,
	) -> ProviderFuture<'a, Token> {
		obs::observed(KIND, Operation::Exchange, ctx, async move {
			self.exchange(ctx, code, options).await.map_err(|e| Error::token_exchange(KIND, e))
		})
	}

	fn fetch_identity<'a>(
		&'a self,
		ctx: &'a CallContext,
		token: &'a Token,
	) -> ProviderFuture<'a, NormalizedIdentity> {
		obs::observed(KIND, Operation::Identity, ctx, async move {
			self.identity(ctx, token).await.map_err(|e| Error::identity_fetch(KIND, e))
		})
	}
}

/// Reads a token body that is either query text or (when `fmt=json` is requested) JSON.
fn token_fields(response: &ProviderResponse) -> Result<BTreeMap<String, String>, ProviderFailure> {
	let text = response.text();
	let body = envelope::strip_callback(&text);

	let fields = match serde_json::from_str::<JsonValue>(body) {
		Ok(value) => {
			if let Some(ctx) = envelope::embedded_error(&value, response.status) {
				return Err(ctx.into());
			}

			value
				.as_object()
				.map(|object| {
					object.keys().map(|key| (key.to_owned(), envelope::text_field(&value, key))).collect()
				})
				.unwrap_or_default()
		},
		Err(_) => envelope::parse_query_text(body),
	};

	if !response.is_success() {
		return Err(envelope::status_rejection(response).into());
	}

	Ok(fields)
}
