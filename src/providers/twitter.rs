//! X (Twitter) OAuth 2.0 with PKCE.
//!
//! The published descriptor sets the `pkce_required` quirk. While it is set, each
//! authorization URL mints a fresh random verifier and parks it in the shared
//! [`VerifierStore`](crate::pkce::VerifierStore) under the flow state. The matching exchange
//! must present that state through [`ExchangeOptions::state`]; the verifier is removed on
//! lookup, so a replayed exchange fails with [`Error::VerifierMissing`] before any request is
//! sent.

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
	pkce::{self, PkceVerifier},
	provider::{
		AuthorizationOptions, ClientAuthMethod, ExchangeOptions, IdentityProvider, ProviderDescriptor,
		ProviderFuture, ProviderKind, ProviderQuirks,
	},
	providers::{self, JsonReply, ProviderRuntime},
};

/// Provider handled by this module.
pub const KIND: ProviderKind = ProviderKind::Twitter;

/// Published X endpoints; confidential clients authenticate with HTTP Basic.
pub fn descriptor(_config: &ProviderConfig) -> Result<ProviderDescriptor, ConfigError> {
	Ok(ProviderDescriptor::builder(KIND)
		.published(
			"https://twitter.com/i/oauth2/authorize",
			"https://api.twitter.com/2/oauth2/token",
			Some("https://api.twitter.com/2/users/me?user.fields=id,name,username,profile_image_url"),
			None,
		)
		.client_auth_method(ClientAuthMethod::ClientSecretBasic)
		.default_scopes(["users.read", "tweet.read"])
		.quirks(ProviderQuirks { pkce_required: true, ..ProviderQuirks::default() })
		.build()?)
}

#[derive(Debug, Deserialize)]
struct TwitterUser {
	id: String,
	#[serde(default)]
	name: String,
	#[serde(default)]
	username: String,
	#[serde(default)]
	profile_image_url: String,
}

/// Adapter for X.
#[derive(Debug)]
pub struct TwitterProvider {
	descriptor: ProviderDescriptor,
	settings: ClientSettings,
	facade: CodeGrantFacade,
	userinfo: Url,
	runtime: ProviderRuntime,
}
impl TwitterProvider {
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

	/// Consumes the flow's verifier; descriptors without the PKCE quirk exchange without one.
	fn take_verifier(&self, options: &ExchangeOptions) -> Result<Option<PkceVerifier>> {
		if !self.descriptor.quirks.pkce_required {
			return Ok(None);
		}

		options
			.state
			.as_deref()
			.and_then(|state| self.runtime.verifiers.take(KIND, state))
			.map(Some)
			.ok_or(Error::VerifierMissing { provider: KIND })
	}

	async fn identity(&self, ctx: &CallContext, token: &Token) -> Result<NormalizedIdentity, ProviderFailure> {
		let reply = JsonReply::fetch(
			self.runtime.transport(),
			ctx,
			ProviderRequest::get(self.userinfo.clone()).bearer(token.access_token.expose()),
		)
		.await?;
		let user = reply.decode::<TwitterUserEnvelope>()?.data;
		let display_name = if user.name.is_empty() { user.username } else { user.name };

		Ok(NormalizedIdentity::new(KIND, user.id, reply.value)
			.with_display_name(display_name)
			.with_avatar_url(user.profile_image_url))
	}
}
impl IdentityProvider for TwitterProvider {
	fn kind(&self) -> ProviderKind {
		KIND
	}

	fn authorization_url(&self, state: &str, options: &AuthorizationOptions) -> Url {
		if !self.descriptor.quirks.pkce_required {
			return providers::authorization_url(&self.descriptor, &self.settings, state, options, &[]);
		}

		let verifier = PkceVerifier::generate();
		let challenge = verifier.challenge();

		self.runtime.verifiers.insert(KIND, state, verifier);

		providers::authorization_url(
			&self.descriptor,
			&self.settings,
			state,
			options,
			&[("code_challenge", challenge.as_str()), ("code_challenge_method", pkce::CHALLENGE_METHOD)],
		)
	}

	fn exchange_code<'a>(
		&'a self,
		ctx: &'a CallContext,
		code: &'a str,
		options: &'a ExchangeOptions,
	) -> ProviderFuture<'a, Token> {
		obs::observed(KIND, Operation::Exchange, ctx, async move {
			let verifier = self.take_verifier(options)?;
			let call = CodeExchange { pkce_verifier: verifier.as_ref(), client_secret: None };

			self.facade
				.exchange(self.runtime.transport(), ctx, code, options, call, self.runtime.now())
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

#[derive(Debug, Deserialize)]
struct TwitterUserEnvelope {
	data: TwitterUser,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::*, pkce::compute_pkce_challenge};

	fn adapter() -> (TwitterProvider, Arc<crate::pkce::VerifierStore>) {
		let runtime = ProviderRuntime::new(test_http_client());
		let verifiers = runtime.verifiers.clone();
		let adapter = TwitterProvider::new(&test_config("tw-client", "tw-secret"), runtime)
			.expect("Twitter adapter should build.");

		(adapter, verifiers)
	}

	#[test]
	fn authorization_url_carries_a_stored_s256_challenge() {
		let (adapter, verifiers) = adapter();
		let url = adapter.authorization_url("flow-1", &AuthorizationOptions::default());
		let pairs = url.query_pairs().into_owned().collect::<BTreeMap<_, _>>();
		let verifier = verifiers.take(KIND, "flow-1").expect("Verifier should be stored.");

		assert_eq!(pairs["code_challenge_method"], "S256");
		assert_eq!(pairs["code_challenge"], compute_pkce_challenge(verifier.expose()));
		assert_eq!(pairs["scope"], "users.read tweet.read");
	}

	#[test]
	fn each_flow_gets_a_fresh_verifier() {
		let (adapter, verifiers) = adapter();
		let first = adapter.authorization_url("same-state", &AuthorizationOptions::default());
		let second = adapter.authorization_url("same-state", &AuthorizationOptions::default());

		assert_ne!(first, second);
		assert_eq!(verifiers.len(), 1);
	}

	#[test]
	fn descriptors_without_the_pkce_quirk_skip_the_challenge() {
		let config = test_config("tw-client", "tw-secret");
		let mut descriptor = descriptor(&config).expect("Published descriptor should build.");

		descriptor.quirks.pkce_required = false;

		let runtime = ProviderRuntime::new(test_http_client());
		let verifiers = runtime.verifiers.clone();
		let adapter = TwitterProvider::with_descriptor(&config, descriptor, runtime)
			.expect("Twitter adapter should build.");
		let url = adapter.authorization_url("flow-2", &AuthorizationOptions::default());

		assert!(url.query_pairs().all(|(key, _)| key != "code_challenge"));
		assert_eq!(verifiers.len(), 0);
		assert!(matches!(adapter.take_verifier(&ExchangeOptions::default()), Ok(None)));
	}

	#[tokio::test]
	async fn exchange_without_state_is_refused_before_io() {
		let (adapter, _) = adapter();
		let err = adapter
			.exchange_code(&CallContext::new(), "code", &ExchangeOptions::default())
			.await
			.expect_err("Exchanges without a flow state must fail.");

		assert!(matches!(err, Error::VerifierMissing { provider: ProviderKind::Twitter }));
	}
}
