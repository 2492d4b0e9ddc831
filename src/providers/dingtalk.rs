//! DingTalk (new OAuth 2.0 API).
//!
//! Token exchange is a JSON POST with camelCase credentials; the profile call authenticates
//! with the `x-acs-dingtalk-access-token` header. Failures arrive as `{code, message}` bodies.

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
pub const KIND: ProviderKind = ProviderKind::Dingtalk;

const ACCESS_TOKEN_HEADER: &str = "x-acs-dingtalk-access-token";

/// Published DingTalk endpoints.
pub fn descriptor(_config: &ProviderConfig) -> Result<ProviderDescriptor, ConfigError> {
	Ok(ProviderDescriptor::builder(KIND)
		.published(
			"https://login.dingtalk.com/oauth2/auth",
			"https://api.dingtalk.com/v1.0/oauth2/userAccessToken",
			Some("https://api.dingtalk.com/v1.0/contact/users/me"),
			None,
		)
		.default_scopes(["openid", "corpid"])
		.build()?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DingtalkToken {
	#[serde(default)]
	access_token: String,
	#[serde(default)]
	refresh_token: String,
	#[serde(default)]
	expire_in: i64,
	#[serde(default)]
	corp_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DingtalkUser {
	#[serde(default)]
	nick: String,
	#[serde(default)]
	avatar_url: String,
	#[serde(default)]
	email: String,
	#[serde(default)]
	open_id: String,
	#[serde(default)]
	union_id: String,
}

/// Adapter for DingTalk.
#[derive(Debug)]
pub struct DingtalkProvider {
	descriptor: ProviderDescriptor,
	settings: ClientSettings,
	userinfo: Url,
	runtime: ProviderRuntime,
}
impl DingtalkProvider {
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
		let mut body = serde_json::json!({
			"clientId": self.settings.client_id,
			"clientSecret": self.settings.client_secret,
			"code": code,
			"grantType": "authorization_code",
		});

		if let JsonValue::Object(object) = &mut body {
			for (key, value) in &options.extra_params {
				object.insert(key.to_owned(), value.as_str().into());
			}
		}

		let request = ProviderRequest::post_json(self.descriptor.endpoints.token.clone(), &body);
		let reply = JsonReply::fetch(self.runtime.transport(), ctx, request).await?;
		let token = reply.decode::<DingtalkToken>()?;

		Token::builder()
			.access_token(token.access_token)
			.refresh_token(token.refresh_token)
			.expires_in(self.runtime.now(), token.expire_in)
			.claim("corpId", token.corp_id)
			.build()
			.map_err(|e| providers::missing_access_token(e, reply.status))
	}

	async fn identity(&self, ctx: &CallContext, token: &Token) -> Result<NormalizedIdentity, ProviderFailure> {
		let request = ProviderRequest::get(self.userinfo.clone())
			.header(ACCESS_TOKEN_HEADER, token.access_token.expose());
		let reply = JsonReply::fetch(self.runtime.transport(), ctx, request).await?;
		let user = reply.decode::<DingtalkUser>()?;
		let user_id = envelope::first_non_empty([user.union_id.as_str(), user.open_id.as_str()]);

		if user_id.is_empty() {
			return Err(ProviderFailure::malformed("profile carries neither unionId nor openId", Some(reply.status)));
		}

		Ok(NormalizedIdentity::new(KIND, user_id, reply.value)
			.with_email(user.email)
			.with_display_name(user.nick)
			.with_avatar_url(user.avatar_url))
	}
}
impl IdentityProvider for DingtalkProvider {
	fn kind(&self) -> ProviderKind {
		KIND
	}

	fn authorization_url(&self, state: &str, options: &AuthorizationOptions) -> Url {
		providers::authorization_url(
			&self.descriptor,
			&self.settings,
			state,
			options,
			&[("prompt", "consent")],
		)
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
