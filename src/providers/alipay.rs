//! Alipay open platform (web authorization via `auth_user`).
//!
//! Alipay does not speak RFC 6749 on its token side. Both the exchange
//! (`alipay.system.oauth.token`) and the profile lookup (`alipay.user.info.share`) are
//! gateway calls: a flat parameter set signed with the app's RSA private key (`RSA2`, i.e.
//! SHA256withRSA over the sorted `k=v&...` string) and posted to `gateway.do`. Results come
//! back under `<method>_response`, failures under `error_response` or with a non-`10000`
//! code.

// crates.io
use base64::{
	Engine as _,
	engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use jsonwebtoken::{Algorithm, EncodingKey};
use time::macros::offset;
// self
use crate::{
	_prelude::*,
	auth::{NormalizedIdentity, Token},
	config::{ClientSettings, ExtraKey, ProviderConfig, SecretRequirement},
	context::CallContext,
	error::{ConfigError, ProviderFailure},
	http::ProviderRequest,
	obs::{self, Operation},
	provider::{
		AuthorizationOptions, ClientAuthMethod, ExchangeOptions, IdentityProvider, ProviderDescriptor,
		ProviderErrorContext, ProviderFuture, ProviderKind, ProviderQuirks, envelope,
	},
	providers::{self, JsonReply, ProviderRuntime},
};

/// Provider handled by this module.
pub const KIND: ProviderKind = ProviderKind::Alipay;
/// Display name used when the profile omits a nickname.
pub const PLACEHOLDER_NAME: &str = "Alipay User";

const TOKEN_METHOD: &str = "alipay.system.oauth.token";
const USER_INFO_METHOD: &str = "alipay.user.info.share";

/// Published Alipay endpoints; token and profile calls share the gateway.
pub fn descriptor(_config: &ProviderConfig) -> Result<ProviderDescriptor, ConfigError> {
	Ok(ProviderDescriptor::builder(KIND)
		.published(
			"https://openauth.alipay.com/oauth2/publicAppAuthorize.htm",
			"https://openapi.alipay.com/gateway.do",
			Some("https://openapi.alipay.com/gateway.do"),
			None,
		)
		.client_auth_method(ClientAuthMethod::Custom)
		.default_scopes(["auth_user"])
		.quirks(ProviderQuirks { client_id_param: "app_id", ..ProviderQuirks::default() })
		.build()?)
}

/// RSA2 request signer bound to one app id.
struct GatewaySigner {
	app_id: String,
	key: EncodingKey,
}
impl GatewaySigner {
	fn from_config(config: &ProviderConfig, app_id: &str) -> Result<Self, ConfigError> {
		let material = config.require_extra(KIND, ExtraKey::PRIVATE_KEY)?;
		let pkcs8 = EncodingKey::from_rsa_pem(providers::armored_pem(material, "PRIVATE KEY").as_bytes());
		// Alipay's key tool emits PKCS#1 bodies for non-Java stacks.
		let key = match pkcs8 {
			Ok(key) => key,
			Err(_) => EncodingKey::from_rsa_pem(providers::armored_pem(material, "RSA PRIVATE KEY").as_bytes())
				.map_err(|source| ConfigError::InvalidSigningKey { provider: KIND, source })?,
		};

		Ok(Self { app_id: app_id.to_owned(), key })
	}

	/// Returns the full form for `method`, `sign` included.
	fn sign(
		&self,
		method: &str,
		business: &[(&str, &str)],
		now: OffsetDateTime,
	) -> Result<BTreeMap<String, String>, ConfigError> {
		let mut params = BTreeMap::from([
			("app_id".to_owned(), self.app_id.clone()),
			("method".to_owned(), method.to_owned()),
			("format".to_owned(), "JSON".to_owned()),
			("charset".to_owned(), "utf-8".to_owned()),
			("sign_type".to_owned(), "RSA2".to_owned()),
			("timestamp".to_owned(), gateway_timestamp(now)),
			("version".to_owned(), "1.0".to_owned()),
		]);

		for (key, value) in business {
			params.insert((*key).to_owned(), (*value).to_owned());
		}

		let content = signing_content(&params);
		let signature = jsonwebtoken::crypto::sign(content.as_bytes(), &self.key, Algorithm::RS256)
			.map_err(|source| ConfigError::Signing { provider: KIND, source })?;
		// The signer emits base64url; the gateway expects standard base64.
		let raw = URL_SAFE_NO_PAD.decode(signature).map_err(|e| ConfigError::InvalidExtra {
			provider: KIND,
			key: ExtraKey::PRIVATE_KEY.name,
			reason: format!("signature could not be re-encoded ({e})"),
		})?;

		params.insert("sign".to_owned(), STANDARD.encode(raw));

		Ok(params)
	}
}
impl Debug for GatewaySigner {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("GatewaySigner").field("app_id", &self.app_id).finish_non_exhaustive()
	}
}

/// `yyyy-MM-dd HH:mm:ss` in Beijing time, as the gateway requires.
fn gateway_timestamp(now: OffsetDateTime) -> String {
	let local = now.to_offset(offset!(+8));

	format!(
		"{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
		local.year(),
		u8::from(local.month()),
		local.day(),
		local.hour(),
		local.minute(),
		local.second(),
	)
}

/// Sorted `k=v` pairs joined by `&`, skipping `sign` and empty values.
fn signing_content(params: &BTreeMap<String, String>) -> String {
	params
		.iter()
		.filter(|(key, value)| key.as_str() != "sign" && !value.is_empty())
		.map(|(key, value)| format!("{key}={value}"))
		.collect::<Vec<_>>()
		.join("&")
}

/// Extracts `<method>_response`, surfacing gateway errors as rejections.
fn gateway_payload(reply: JsonReply, method: &str) -> Result<JsonReply, ProviderFailure> {
	let status = reply.status;

	if let Some(error) = reply.value.get("error_response") {
		let ctx = envelope::embedded_error(error, status).unwrap_or_else(|| {
			ProviderErrorContext::new()
				.with_http_status(status)
				.with_body_preview(reply.value.to_string())
		});

		return Err(ctx.into());
	}

	let key = format!("{}_response", method.replace('.', "_"));
	let JsonValue::Object(mut body) = reply.value else {
		return Err(ProviderFailure::malformed("gateway body is not an object", Some(status)));
	};
	let payload = body
		.remove(&key)
		.ok_or_else(|| ProviderFailure::malformed(format!("gateway body has no `{key}`"), Some(status)))?;

	if let Some(ctx) = envelope::embedded_error(&payload, status) {
		return Err(ctx.into());
	}

	Ok(JsonReply { value: payload, status })
}

/// Adapter for Alipay.
#[derive(Debug)]
pub struct AlipayProvider {
	descriptor: ProviderDescriptor,
	settings: ClientSettings,
	signer: GatewaySigner,
	userinfo: Url,
	runtime: ProviderRuntime,
}
impl AlipayProvider {
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
		let signer = GatewaySigner::from_config(config, &settings.client_id)?;
		let userinfo = descriptor.endpoints.require_userinfo().map_err(ConfigError::from)?.clone();

		Ok(Self { descriptor, settings, signer, userinfo, runtime })
	}

	async fn call(
		&self,
		ctx: &CallContext,
		url: &Url,
		method: &str,
		form: &BTreeMap<String, String>,
	) -> Result<JsonReply, ProviderFailure> {
		let request = ProviderRequest::post_form(
			url.clone(),
			form.iter().map(|(key, value)| (key.as_str(), value.as_str())),
		);
		let reply = JsonReply::fetch(self.runtime.transport(), ctx, request).await?;

		gateway_payload(reply, method)
	}

	async fn exchange(&self, ctx: &CallContext, form: &BTreeMap<String, String>) -> Result<Token, ProviderFailure> {
		let reply = self.call(ctx, &self.descriptor.endpoints.token, TOKEN_METHOD, form).await?;
		let field = |key: &str| envelope::text_field(&reply.value, key);

		Token::builder()
			.access_token(field("access_token"))
			.refresh_token(field("refresh_token"))
			.expires_in(self.runtime.now(), field("expires_in").parse::<i64>().unwrap_or_default())
			.claim("user_id", field("user_id"))
			.claim("open_id", field("open_id"))
			.build()
			.map_err(|e| providers::missing_access_token(e, reply.status))
	}

	async fn identity(
		&self,
		ctx: &CallContext,
		token: &Token,
		form: &BTreeMap<String, String>,
	) -> Result<NormalizedIdentity, ProviderFailure> {
		let reply = self.call(ctx, &self.userinfo, USER_INFO_METHOD, form).await?;
		let field = |key: &str| envelope::text_field(&reply.value, key);
		let user_id = envelope::first_non_empty([
			field("user_id").as_str(),
			field("open_id").as_str(),
			token.claim_str("user_id").unwrap_or_default(),
			token.claim_str("open_id").unwrap_or_default(),
		]);

		if user_id.is_empty() {
			return Err(ProviderFailure::malformed("profile carries neither user_id nor open_id", Some(reply.status)));
		}

		let nickname = field("nick_name");
		let display_name = if nickname.is_empty() { PLACEHOLDER_NAME.to_owned() } else { nickname };
		let avatar = field("avatar");

		Ok(NormalizedIdentity::new(KIND, user_id, reply.value)
			.with_display_name(display_name)
			.with_avatar_url(avatar))
	}
}
impl IdentityProvider for AlipayProvider {
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
			let mut business = vec![("grant_type", "authorization_code"), ("code", code)];

			business.extend(options.extra_params.iter().map(|(key, value)| (key.as_str(), value.as_str())));

			let form = self.signer.sign(TOKEN_METHOD, &business, self.runtime.now())?;

			self.exchange(ctx, &form).await.map_err(|e| Error::token_exchange(KIND, e))
		})
	}

	fn fetch_identity<'a>(
		&'a self,
		ctx: &'a CallContext,
		token: &'a Token,
	) -> ProviderFuture<'a, NormalizedIdentity> {
		obs::observed(KIND, Operation::Identity, ctx, async move {
			let form = self.signer.sign(
				USER_INFO_METHOD,
				&[("auth_token", token.access_token.expose())],
				self.runtime.now(),
			)?;

			self.identity(ctx, token, &form).await.map_err(|e| Error::identity_fetch(KIND, e))
		})
	}
}
