//! GitHub OAuth apps.
//!
//! The token endpoint answers `200 OK` even for rejected codes, with an
//! `{error, error_description}` body; the shared code-grant facade classifies those as
//! rejections. Private e-mail addresses are absent from `/user`, so a blank profile e-mail
//! triggers one `/user/emails` lookup; a rejected or malformed answer there only degrades the
//! result.

// self
use crate::{
	_prelude::*,
	auth::{NormalizedIdentity, Token},
	config::{ClientSettings, ProviderConfig, SecretRequirement},
	context::CallContext,
	error::{ConfigError, ProviderFailure, TransportError},
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
pub const KIND: ProviderKind = ProviderKind::Github;

/// Published github.com endpoints.
pub fn descriptor(_config: &ProviderConfig) -> Result<ProviderDescriptor, ConfigError> {
	Ok(ProviderDescriptor::builder(KIND)
		.published(
			"https://github.com/login/oauth/authorize",
			"https://github.com/login/oauth/access_token",
			Some("https://api.github.com/user"),
			Some("https://api.github.com/user/emails"),
		)
		.default_scopes(["read:user", "user:email"])
		.build()?)
}

#[derive(Debug, Deserialize)]
struct GithubUser {
	id: u64,
	login: String,
	#[serde(default)]
	name: Option<String>,
	#[serde(default)]
	email: Option<String>,
	#[serde(default)]
	avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubEmail {
	email: String,
	#[serde(default)]
	primary: bool,
	#[serde(default)]
	verified: bool,
}

/// Adapter for GitHub.
#[derive(Debug)]
pub struct GithubProvider {
	descriptor: ProviderDescriptor,
	settings: ClientSettings,
	facade: CodeGrantFacade,
	userinfo: Url,
	emails: Option<Url>,
	runtime: ProviderRuntime,
}
impl GithubProvider {
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
		let emails = descriptor.endpoints.auxiliary.clone();
		let facade = CodeGrantFacade::from_descriptor(&descriptor, &settings);

		Ok(Self { descriptor, settings, facade, userinfo, emails, runtime })
	}

	async fn identity(&self, ctx: &CallContext, token: &Token) -> Result<NormalizedIdentity, ProviderFailure> {
		let access_token = token.access_token.expose();
		let reply = JsonReply::fetch(
			self.runtime.transport(),
			ctx,
			ProviderRequest::get(self.userinfo.clone()).bearer(access_token),
		)
		.await?;
		let user = reply.decode::<GithubUser>()?;
		let mut email = user.email.unwrap_or_default();

		if email.is_empty() {
			email = self.verified_email(ctx, access_token).await?;
		}

		let display_name = match user.name {
			Some(name) if !name.trim().is_empty() => name,
			_ => user.login,
		};

		Ok(NormalizedIdentity::new(KIND, user.id.to_string(), reply.value)
			.with_email(email)
			.with_display_name(display_name)
			.with_avatar_url(user.avatar_url.unwrap_or_default()))
	}

	/// Resolves the primary verified address; rejections and odd bodies degrade to an empty
	/// email, while cancellation and deadlines still fail the call.
	async fn verified_email(&self, ctx: &CallContext, access_token: &str) -> Result<String, ProviderFailure> {
		let Some(url) = &self.emails else {
			return Ok(String::new());
		};
		let lookup = async {
			let reply = JsonReply::fetch(
				self.runtime.transport(),
				ctx,
				ProviderRequest::get(url.clone()).bearer(access_token),
			)
			.await?;

			reply.decode::<Vec<GithubEmail>>()
		};

		match lookup.await {
			Ok(emails) => Ok(pick_email(emails)),
			Err(
				e @ ProviderFailure::Transport(TransportError::Cancelled | TransportError::TimedOut { .. }),
			) => Err(e),
			Err(e) => {
				obs::warn_degraded(KIND, Operation::Identity, &e);

				Ok(String::new())
			},
		}
	}
}
impl IdentityProvider for GithubProvider {
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

fn pick_email(emails: Vec<GithubEmail>) -> String {
	let primary = emails.iter().position(|entry| entry.primary && entry.verified);
	let fallback = || emails.iter().position(|entry| entry.verified);

	primary.or_else(fallback).map(|idx| emails[idx].email.clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn email(address: &str, primary: bool, verified: bool) -> GithubEmail {
		GithubEmail { email: address.into(), primary, verified }
	}

	#[test]
	fn primary_verified_address_wins() {
		let picked = pick_email(vec![
			email("old@example.com", false, true),
			email("primary@example.com", true, true),
		]);

		assert_eq!(picked, "primary@example.com");
	}

	#[test]
	fn unverified_primary_falls_back_to_first_verified() {
		let picked = pick_email(vec![
			email("primary@example.com", true, false),
			email("backup@example.com", false, true),
		]);

		assert_eq!(picked, "backup@example.com");
		assert_eq!(pick_email(vec![email("x@example.com", true, false)]), "");
	}
}
