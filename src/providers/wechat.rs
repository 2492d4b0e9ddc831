//! WeChat website login (QR connect).
//!
//! WeChat names its credentials `appid`/`secret`, passes them as query parameters, and signals
//! failures with `{errcode, errmsg}` under `200 OK`. The openid/unionid pair travels from the
//! exchange to the profile call as token claims.

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
		ProviderKind, ProviderQuirks, envelope,
	},
	providers::{self, JsonReply, ProviderRuntime},
};

/// Provider handled by this module.
pub const KIND: ProviderKind = ProviderKind::Wechat;

/// Published open-platform endpoints.
pub fn descriptor(_config: &ProviderConfig) -> Result<ProviderDescriptor, ConfigError> {
	Ok(ProviderDescriptor::builder(KIND)
		.published(
			"https://open.weixin.qq.com/connect/qrconnect",
			"https://api.weixin.qq.com/sns/oauth2/access_token",
			Some("https://api.weixin.qq.com/sns/userinfo"),
			None,
		)
		.default_scopes(["snsapi_login"])
		.quirks(ProviderQuirks {
			client_id_param: "appid",
			fragment: Some("wechat_redirect"),
			..ProviderQuirks::default()
		})
		.build()?)
}

#[derive(Debug, Deserialize)]
struct WechatToken {
	#[serde(default)]
	access_token: String,
	#[serde(default)]
	refresh_token: String,
	#[serde(default)]
	expires_in: i64,
	#[serde(default)]
	openid: String,
	#[serde(default)]
	unionid: String,
	#[serde(default)]
	scope: String,
}

#[derive(Debug, Deserialize)]
struct WechatUser {
	#[serde(default)]
	openid: String,
	#[serde(default)]
	unionid: String,
	#[serde(default)]
	nickname: String,
	#[serde(default)]
	headimgurl: String,
}

/// Adapter for WeChat.
#[derive(Debug)]
pub struct WechatProvider {
	descriptor: ProviderDescriptor,
	settings: ClientSettings,
	userinfo: Url,
	runtime: ProviderRuntime,
}
impl WechatProvider {
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
		let request = ProviderRequest::get(self.descriptor.endpoints.token.clone())
			.query([
				("appid", self.settings.client_id.as_str()),
				("secret", self.settings.client_secret.as_str()),
				("code", code),
				("grant_type", "authorization_code"),
			])
			.query(options.extra_params.iter().map(|(key, value)| (key.as_str(), value.as_str())));
		let reply = JsonReply::fetch(self.runtime.transport(), ctx, request).await?;
		let body = reply.decode::<WechatToken>()?;

		Token::builder()
			.access_token(body.access_token)
			.refresh_token(body.refresh_token)
			.expires_in(self.runtime.now(), body.expires_in)
			.claim("openid", body.openid)
			.claim("unionid", body.unionid)
			.claim("scope", body.scope)
			.build()
			.map_err(|e| providers::missing_access_token(e, reply.status))
	}

	async fn identity(&self, ctx: &CallContext, token: &Token) -> Result<NormalizedIdentity, ProviderFailure> {
		let openid = token
			.claim_str("openid")
			.ok_or_else(|| ProviderFailure::malformed("token carries no `openid` claim", None))?;
		let request = ProviderRequest::get(self.userinfo.clone())
			.query([("access_token", token.access_token.expose()), ("openid", openid)]);
		let reply = JsonReply::fetch(self.runtime.transport(), ctx, request).await?;
		let user = reply.decode::<WechatUser>()?;
		let user_id = envelope::first_non_empty([
			user.unionid.as_str(),
			token.claim_str("unionid").unwrap_or_default(),
			user.openid.as_str(),
			openid,
		]);

		Ok(NormalizedIdentity::new(KIND, user_id, reply.value)
			.with_display_name(user.nickname)
			.with_avatar_url(user.headimgurl))
	}
}
impl IdentityProvider for WechatProvider {
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
