//! Sign in with Apple.
//!
//! Apple has no static client secret: every exchange presents a fresh ES256 assertion signed
//! with the team's private key. Identity claims come from the `id_token` returned by the
//! token endpoint. The user's name is only ever sent once, as the `user` form field of the
//! first `form_post` callback; [`AppleUser`] parses it so callers can keep it.

// crates.io
use jsonwebtoken::{Algorithm, EncodingKey, Header};
// self
use crate::{
	_prelude::*,
	auth::{NormalizedIdentity, Token},
	config::{ClientSettings, ExtraKey, ProviderConfig, SecretRequirement},
	context::CallContext,
	error::{ConfigError, ProviderFailure},
	oauth::{CodeExchange, CodeGrantFacade},
	obs::{self, Operation},
	provider::{
		AuthorizationOptions, ExchangeOptions, IdentityProvider, ProviderDescriptor, ProviderFuture,
		ProviderKind, ProviderQuirks, envelope,
	},
	providers::{self, ProviderRuntime},
};

/// Provider handled by this module.
pub const KIND: ProviderKind = ProviderKind::Apple;
/// Audience of the client-secret assertion.
pub const AUDIENCE: &str = "https://appleid.apple.com";

const CLIENT_SECRET_TTL: Duration = Duration::minutes(5);

/// Published Apple endpoints; the callback arrives as a form POST.
pub fn descriptor(_config: &ProviderConfig) -> Result<ProviderDescriptor, ConfigError> {
	Ok(ProviderDescriptor::builder(KIND)
		.published("https://appleid.apple.com/auth/authorize", "https://appleid.apple.com/auth/token", None, None)
		.default_scopes(["name", "email"])
		.quirks(ProviderQuirks { response_mode: Some("form_post"), ..ProviderQuirks::default() })
		.build()?)
}

#[derive(Debug, Serialize)]
struct ClientSecretClaims<'a> {
	iss: &'a str,
	sub: &'a str,
	aud: &'static str,
	iat: i64,
	exp: i64,
}

/// Validated signing material for the client-secret assertion.
struct AppleSigner {
	team_id: String,
	key_id: String,
	key: EncodingKey,
}
impl AppleSigner {
	fn from_config(config: &ProviderConfig) -> Result<Self, ConfigError> {
		let team_id = config.require_extra(KIND, ExtraKey::TEAM_ID)?.to_owned();
		let key_id = config.require_extra(KIND, ExtraKey::KEY_ID)?.to_owned();
		let pem = providers::armored_pem(config.require_extra(KIND, ExtraKey::PRIVATE_KEY)?, "PRIVATE KEY");
		let key = EncodingKey::from_ec_pem(pem.as_bytes())
			.map_err(|source| ConfigError::InvalidSigningKey { provider: KIND, source })?;

		Ok(Self { team_id, key_id, key })
	}

	fn client_secret(&self, client_id: &str, now: OffsetDateTime) -> Result<String, ConfigError> {
		let mut header = Header::new(Algorithm::ES256);

		header.kid = Some(self.key_id.clone());

		let claims = ClientSecretClaims {
			iss: &self.team_id,
			sub: client_id,
			aud: AUDIENCE,
			iat: now.unix_timestamp(),
			exp: (now + CLIENT_SECRET_TTL).unix_timestamp(),
		};

		jsonwebtoken::encode(&header, &claims, &self.key)
			.map_err(|source| ConfigError::Signing { provider: KIND, source })
	}
}
impl Debug for AppleSigner {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AppleSigner")
			.field("team_id", &self.team_id)
			.field("key_id", &self.key_id)
			.finish_non_exhaustive()
	}
}

/// Adapter for Sign in with Apple.
#[derive(Debug)]
pub struct AppleProvider {
	descriptor: ProviderDescriptor,
	settings: ClientSettings,
	facade: CodeGrantFacade,
	signer: AppleSigner,
	runtime: ProviderRuntime,
}
impl AppleProvider {
	/// Builds the adapter against the published endpoints.
	pub fn new(config: &ProviderConfig, runtime: ProviderRuntime) -> Result<Self> {
		Self::with_descriptor(config, descriptor(config)?, runtime)
	}

	/// Builds the adapter against `descriptor`, parsing the signing key up front.
	pub fn with_descriptor(
		config: &ProviderConfig,
		descriptor: ProviderDescriptor,
		runtime: ProviderRuntime,
	) -> Result<Self> {
		let settings = config.client_settings(KIND, SecretRequirement::Unused)?;
		let signer = AppleSigner::from_config(config)?;
		let facade = CodeGrantFacade::from_descriptor(&descriptor, &settings);

		Ok(Self { descriptor, settings, facade, signer, runtime })
	}

	/// Mints the client-secret assertion the next exchange would present.
	pub fn client_secret(&self) -> Result<String> {
		Ok(self.signer.client_secret(&self.settings.client_id, self.runtime.now())?)
	}
}
impl IdentityProvider for AppleProvider {
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
			let now = self.runtime.now();
			let secret = self.signer.client_secret(&self.settings.client_id, now)?;
			let call = CodeExchange { pkce_verifier: None, client_secret: Some(&secret) };

			self.facade
				.exchange(self.runtime.transport(), ctx, code, options, call, now)
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
			identity_from_token(token).map_err(|e| Error::identity_fetch(KIND, e))
		})
	}
}

fn identity_from_token(token: &Token) -> Result<NormalizedIdentity, ProviderFailure> {
	let id_token = token
		.claim_str("id_token")
		.ok_or_else(|| ProviderFailure::malformed("token carries no `id_token` claim", None))?;
	let claims = JsonValue::Object(envelope::decode_jwt_payload(id_token)?);
	let subject = envelope::text_field(&claims, "sub");

	if subject.is_empty() {
		return Err(ProviderFailure::malformed("ID token has no `sub` claim", None));
	}

	let email = envelope::text_field(&claims, "email");

	Ok(NormalizedIdentity::new(KIND, subject, claims).with_email(email))
}

/// The `user` form field Apple posts on the first authorization only.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct AppleUser {
	/// Name the user chose to share.
	#[serde(default)]
	pub name: AppleUserName,
	/// E-mail (possibly a private relay address).
	#[serde(default)]
	pub email: String,
}
impl AppleUser {
	/// Parses the raw JSON value of the `user` form field.
	pub fn parse(form_value: &str) -> Result<Self> {
		envelope::parse_json(form_value.as_bytes(), None).map_err(|e| Error::identity_fetch(KIND, e))
	}

	/// Joins the shared name parts, skipping blanks.
	pub fn display_name(&self) -> String {
		[self.name.first_name.trim(), self.name.last_name.trim()]
			.into_iter()
			.filter(|part| !part.is_empty())
			.collect::<Vec<_>>()
			.join(" ")
	}

	/// Fills the name and e-mail that the ID token cannot carry, keeping non-empty fields.
	pub fn complete(&self, mut identity: NormalizedIdentity) -> NormalizedIdentity {
		if identity.display_name.is_empty() {
			identity.display_name = self.display_name();
		}
		if identity.email.is_empty() {
			identity.email = self.email.clone();
		}

		identity
	}
}

/// Name parts inside [`AppleUser`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppleUserName {
	/// Given name.
	#[serde(default)]
	pub first_name: String,
	/// Family name.
	#[serde(default)]
	pub last_name: String,
}
