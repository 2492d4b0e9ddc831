//! Facebook Login over Graph API v3.2.

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
pub const KIND: ProviderKind = ProviderKind::Facebook;

/// Published Graph endpoints; the profile URL pins the requested fields.
pub fn descriptor(_config: &ProviderConfig) -> Result<ProviderDescriptor, ConfigError> {
	Ok(ProviderDescriptor::builder(KIND)
		.published(
			"https://www.facebook.com/v3.2/dialog/oauth",
			"https://graph.facebook.com/v3.2/oauth/access_token",
			Some("https://graph.facebook.com/me?fields=id,name,email,picture.type(large)"),
			None,
		)
		.default_scopes(["public_profile", "email"])
		.build()?)
}

#[derive(Debug, Deserialize)]
struct FacebookUser {
	id: String,
	#[serde(default)]
	name: String,
	#[serde(default)]
	email: String,
	#[serde(default)]
	picture: Option<FacebookPicture>,
}

#[derive(Debug, Deserialize)]
struct FacebookPicture {
	data: FacebookPictureData,
}

#[derive(Debug, Deserialize)]
struct FacebookPictureData {
	#[serde(default)]
	url: String,
}

/// Adapter for Facebook.
#[derive(Debug)]
pub struct FacebookProvider {
	descriptor: ProviderDescriptor,
	settings: ClientSettings,
	facade: CodeGrantFacade,
	userinfo: Url,
	runtime: ProviderRuntime,
}
impl FacebookProvider {
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
		let user = reply.decode::<FacebookUser>()?;
		let avatar = user.picture.map(|picture| picture.data.url).unwrap_or_default();

		Ok(NormalizedIdentity::new(KIND, user.id, reply.value)
			.with_email(user.email)
			.with_display_name(user.name)
			.with_avatar_url(avatar))
	}
}
impl IdentityProvider for FacebookProvider {
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
