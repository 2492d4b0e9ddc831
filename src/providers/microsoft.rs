//! Microsoft identity platform (v2.0 endpoints) with the Graph `/me` profile.

// self
use crate::{
	_prelude::*,
	auth::{NormalizedIdentity, Token},
	config::{ClientSettings, ExtraKey, ProviderConfig, SecretRequirement},
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
pub const KIND: ProviderKind = ProviderKind::Microsoft;
/// Tenant used when the configuration names none.
pub const DEFAULT_TENANT: &str = "common";

/// Tenant-scoped endpoints; the `tenant` extra selects the directory.
pub fn descriptor(config: &ProviderConfig) -> Result<ProviderDescriptor, ConfigError> {
	let tenant = tenant(config)?;
	let authorization = format!("https://login.microsoftonline.com/{tenant}/oauth2/v2.0/authorize");
	let token = format!("https://login.microsoftonline.com/{tenant}/oauth2/v2.0/token");

	Ok(ProviderDescriptor::builder(KIND)
		.published(&authorization, &token, Some("https://graph.microsoft.com/v1.0/me"), None)
		.default_scopes(["User.Read", "openid", "profile", "email"])
		.build()?)
}

fn tenant(config: &ProviderConfig) -> Result<&str, ConfigError> {
	let tenant = config.extra_str(ExtraKey::TENANT).unwrap_or(DEFAULT_TENANT);

	if tenant.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '.' | '_')) {
		Ok(tenant)
	} else {
		Err(ConfigError::InvalidExtra {
			provider: KIND,
			key: ExtraKey::TENANT.name,
			reason: format!("`{tenant}` is not a tenant name or id"),
		})
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphUser {
	id: String,
	#[serde(default)]
	display_name: Option<String>,
	#[serde(default)]
	mail: Option<String>,
	#[serde(default)]
	user_principal_name: Option<String>,
}

/// Adapter for Microsoft accounts.
#[derive(Debug)]
pub struct MicrosoftProvider {
	descriptor: ProviderDescriptor,
	settings: ClientSettings,
	facade: CodeGrantFacade,
	userinfo: Url,
	runtime: ProviderRuntime,
}
impl MicrosoftProvider {
	/// Builds the adapter against the configured tenant's endpoints.
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
		let user = reply.decode::<GraphUser>()?;
		let email = match user.mail.filter(|mail| !mail.is_empty()) {
			Some(mail) => mail,
			None => user.user_principal_name.unwrap_or_default(),
		};

		Ok(NormalizedIdentity::new(KIND, user.id, reply.value)
			.with_email(email)
			.with_display_name(user.display_name.unwrap_or_default()))
	}
}
impl IdentityProvider for MicrosoftProvider {
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
