//! Feishu (Lark) passport login.

// self
use crate::{
	_prelude::*,
	auth::{NormalizedIdentity, Token},
	config::{ClientSettings, ProviderConfig, SecretRequirement},
	context::CallContext,
	error::{ConfigError, ProviderFailure},
	http::ProviderRequest,
	obs::{self, Operation},
	provider::{
		AuthorizationOptions, ExchangeOptions, IdentityProvider, ProviderDescriptor, ProviderFuture,
		ProviderKind, envelope,
	},
	providers::{self, JsonReply, ProviderRuntime},
};

/// Provider handled by this module.
pub const KIND: ProviderKind = ProviderKind::Feishu;

/// Published passport endpoints. Scopes are configured in the Feishu console, so none are sent.
pub fn descriptor(_config: &ProviderConfig) -> Result<ProviderDescriptor, ConfigError> {
	Ok(ProviderDescriptor::builder(KIND)
		.published(
			"https://passport.feishu.cn/suite/passport/oauth/authorize",
			"https://passport.feishu.cn/suite/passport/oauth/token",
			Some("https://passport.feishu.cn/suite/passport/oauth/userinfo"),
			None,
		)
		.build()?)
}

#[derive(Debug, Deserialize)]
struct FeishuToken {
	#[serde(default)]
	access_token: String,
	#[serde(default)]
	refresh_token: String,
	#[serde(default)]
	expires_in: i64,
	#[serde(default)]
	refresh_expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct FeishuUser {
	#[serde(default)]
	name: String,
	#[serde(default)]
	en_name: String,
	#[serde(default)]
	avatar_url: String,
	#[serde(default)]
	email: String,
	#[serde(default)]
	union_id: String,
	#[serde(default)]
	open_id: String,
}

/// Adapter for Feishu.
#[derive(Debug)]
pub struct FeishuProvider {
	descriptor: ProviderDescriptor,
	settings: ClientSettings,
	userinfo: Url,
	runtime: ProviderRuntime,
}
impl FeishuProvider {
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

		Ok(Self { descriptor, settings, userinfo, runtime })
	}

	async fn exchange(
		&self,
		ctx: &CallContext,
		code: &str,
		options: &ExchangeOptions,
	) -> Result<Token, ProviderFailure> {
		let mut body = serde_json::Map::new();

		body.insert("grant_type".into(), "authorization_code".into());
		body.insert("client_id".into(), self.settings.client_id.as_str().into());
		body.insert("client_secret".into(), self.settings.client_secret.as_str().into());
		body.insert("code".into(), code.into());
		body.insert("redirect_uri".into(), self.settings.redirect_url.as_str().into());

		for (key, value) in &options.extra_params {
			body.insert(key.to_owned(), value.as_str().into());
		}

		let request =
			ProviderRequest::post_json(self.descriptor.endpoints.token.clone(), &JsonValue::Object(body));
		let reply = JsonReply::fetch(self.runtime.transport(), ctx, request).await?.unwrap_member("data");
		let token = reply.decode::<FeishuToken>()?;
		let mut builder = Token::builder()
			.access_token(token.access_token)
			.refresh_token(token.refresh_token)
			.expires_in(self.runtime.now(), token.expires_in);

		if token.refresh_expires_in > 0 {
			builder = builder.claim("refresh_expires_in", token.refresh_expires_in);
		}

		builder.build().map_err(|e| providers::missing_access_token(e, reply.status))
	}

	async fn identity(&self, ctx: &CallContext, token: &Token) -> Result<NormalizedIdentity, ProviderFailure> {
		let request = ProviderRequest::get(self.userinfo.clone()).bearer(token.access_token.expose());
		let reply = JsonReply::fetch(self.runtime.transport(), ctx, request).await?.unwrap_member("data");
		let user = reply.decode::<FeishuUser>()?;
		let user_id = envelope::first_non_empty([user.union_id.as_str(), user.open_id.as_str()]);

		if user_id.is_empty() {
			return Err(ProviderFailure::malformed(
				"profile carries neither union_id nor open_id",
				Some(reply.status),
			));
		}

		let display_name = envelope::first_non_empty([user.name.as_str(), user.en_name.as_str()]);

		Ok(NormalizedIdentity::new(KIND, user_id, reply.value)
			.with_email(user.email)
			.with_display_name(display_name)
			.with_avatar_url(user.avatar_url))
	}
}
impl IdentityProvider for FeishuProvider {
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
