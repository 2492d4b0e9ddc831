//! Ephemeral token produced by a code exchange.

// self
use crate::_prelude::*;

/// Access or refresh token value that renders as `<redacted>` in logs.
///
/// Serializes as the raw string so callers can hand it to their own session layer.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Returns the raw value. Callers must avoid logging it.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("TokenSecret(<redacted>)")
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Errors produced by [`TokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum TokenBuilderError {
	/// Issued when the provider answered without an access token.
	#[error("Access token is required.")]
	MissingAccessToken,
}

/// Tokens returned by [`IdentityProvider::exchange_code`](crate::provider::IdentityProvider::exchange_code).
///
/// Never persisted by this crate. `extra_claims` carries provider-specific values the identity
/// step needs later (an ID token, an `openid`/`unionid` pair, a corp id, ...).
#[derive(Clone, Serialize, Deserialize)]
pub struct Token {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token secret, if the provider issued one.
	pub refresh_token: Option<TokenSecret>,
	/// Expiry instant derived from `expires_in` and the adapter's clock.
	pub expires_at: Option<OffsetDateTime>,
	/// Provider-specific values returned alongside the token.
	pub extra_claims: BTreeMap<String, JsonValue>,
}
impl Token {
	/// Returns a builder for assembling tokens from provider responses.
	pub fn builder() -> TokenBuilder {
		TokenBuilder::default()
	}

	/// Looks up a provider-specific claim.
	pub fn claim(&self, key: &str) -> Option<&JsonValue> {
		self.extra_claims.get(key)
	}

	/// Looks up a non-empty string claim.
	pub fn claim_str(&self, key: &str) -> Option<&str> {
		self.claim(key).and_then(JsonValue::as_str).filter(|value| !value.is_empty())
	}

	/// Returns `true` when the token has a known expiry at or before `instant`.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| instant >= expires_at)
	}
}
impl Debug for Token {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Token")
			.field("access_token", &self.access_token)
			.field("refresh_token", &self.refresh_token)
			.field("expires_at", &self.expires_at)
			.field("extra_claims", &self.extra_claims.keys().collect::<Vec<_>>())
			.finish()
	}
}

/// Builder for [`Token`].
#[derive(Debug, Default)]
pub struct TokenBuilder {
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	expires_at: Option<OffsetDateTime>,
	extra_claims: BTreeMap<String, JsonValue>,
}
impl TokenBuilder {
	/// Sets the access token. Empty values count as missing.
	pub fn access_token(mut self, value: impl Into<String>) -> Self {
		let value = value.into();

		self.access_token = (!value.is_empty()).then_some(TokenSecret(value));

		self
	}

	/// Sets the refresh token. Empty values are ignored.
	pub fn refresh_token(mut self, value: impl Into<String>) -> Self {
		let value = value.into();

		self.refresh_token = (!value.is_empty()).then_some(TokenSecret(value));

		self
	}

	/// Sets an absolute expiry.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Derives the expiry from a relative lifetime; non-positive values leave it unknown.
	pub fn expires_in(mut self, issued_at: OffsetDateTime, seconds: i64) -> Self {
		self.expires_at = (seconds > 0).then(|| issued_at + Duration::seconds(seconds));

		self
	}

	/// Adds a provider-specific claim. Null and empty-string values are skipped.
	pub fn claim(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
		let value = value.into();

		if !matches!(&value, JsonValue::Null) && value.as_str() != Some("") {
			self.extra_claims.insert(key.into(), value);
		}

		self
	}

	/// Consumes the builder and validates the resulting token.
	pub fn build(self) -> Result<Token, TokenBuilderError> {
		let access_token = self.access_token.ok_or(TokenBuilderError::MissingAccessToken)?;

		Ok(Token {
			access_token,
			refresh_token: self.refresh_token,
			expires_at: self.expires_at,
			extra_claims: self.extra_claims,
		})
	}
}
