//! Google OAuth 2.0 with the v2 userinfo endpoint.

// self
use crate::{
	_prelude::*,
	auth::{NormalizedIdentity, Token},
	config::{ClientSettings, ProviderConfig, SecretRequirement},
	context::CallContext,
	error::{ConfigError, ProviderFailure},
	http::ProviderRequest,
	oauth::{CodeExchange, CodeGrantFacade},
	obs::{self, Operation},
	provider::{
		AuthorizationOptions, ExchangeOptions, IdentityProvider, ProviderDescriptor, ProviderFuture,
		ProviderKind,
	},
	providers::{self, JsonReply, ProviderRuntime},
};

/// Provider handled by this module.
pub const KIND: ProviderKind = ProviderKind::Google;

/// Published Google endpoints.
pub fn descriptor(_config: &ProviderConfig) -> Result<ProviderDescriptor, ConfigError> {
	Ok(ProviderDescriptor::builder(KIND)
		.published(
			"https://accounts.google.com/o/oauth2/auth",
			"https://oauth2.googleapis.com/token",
			Some("https://www.googleapis.com/oauth2/v2/userinfo"),
			None,
		)
		.default_scopes([
			"https://www.googleapis.com/auth/userinfo.email",
			"https://www.googleapis.com/auth/userinfo.profile",
		])
		.build()?)
}

#[derive(Debug, Deserialize)]
struct GoogleUser {
	id: String,
	#[serde(default)]
	email: String,
	#[serde(default)]
	name: String,
	#[serde(default)]
	picture: String,
}

/// Adapter for Google.
#[derive(Debug)]
pub struct GoogleProvider {
	descriptor: ProviderDescriptor,
	settings: ClientSettings,
	facade: CodeGrantFacade,
	userinfo: Url,
	runtime: ProviderRuntime,
}
impl GoogleProvider {
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
		let facade = CodeGrantFacade::from_descriptor(&descriptor, &settings);

		Ok(Self { descriptor, settings, facade, userinfo, runtime })
	}

	async fn identity(&self, ctx: &CallContext, token: &Token) -> Result<NormalizedIdentity, ProviderFailure> {
		let reply = JsonReply::fetch(
			self.runtime.transport(),
			ctx,
			ProviderRequest::get(self.userinfo.clone()).bearer(token.access_token.expose()),
		)
		.await?;
		let user = reply.decode::<GoogleUser>()?;

		Ok(NormalizedIdentity::new(KIND, user.id, reply.value)
			.with_email(user.email)
			.with_display_name(user.name)
			.with_avatar_url(user.picture))
	}
}
impl IdentityProvider for GoogleProvider {
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
			self.facade
				.exchange(
					self.runtime.transport(),
					ctx,
					code,
					options,
					CodeExchange::default(),
					self.runtime.now(),
				)
				.await
				.map_err(|e| Error::token_exchange(KIND, e))
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
