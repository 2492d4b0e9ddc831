//! The identity-provider contract plus the data shared by every adapter.
//!
//! `descriptor` exposes validated endpoint sets (HTTPS-only, loopback excepted) and the
//! client-authentication/scope quirks of a provider. `envelope` holds the response
//! normalization helpers: wrapped-callback stripping, query-string token bodies, in-body
//! error codes, and unverified JWT payload decoding. [`IdentityProvider`] is the
//! three-operation contract each adapter implements.

pub mod descriptor;
pub mod envelope;

pub use descriptor::*;
pub use envelope::ProviderErrorContext;

// self
use crate::{
	_prelude::*,
	auth::{NormalizedIdentity, Token},
	context::CallContext,
};

/// Boxed future returned by the network-bound [`IdentityProvider`] operations.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Uniform contract over one external identity provider.
///
/// Adapters are immutable after construction and safe for unsynchronized concurrent use.
/// The only cross-call state lives in the PKCE verifier store held by PKCE-based adapters.
pub trait IdentityProvider
where
	Self: Send + Sync,
{
	/// Which provider this adapter talks to.
	fn kind(&self) -> ProviderKind;

	/// Builds the URL the end-user is sent to.
	///
	/// Deterministic for fixed configuration and `state`, except for adapters that must mint
	/// a fresh PKCE challenge per flow. Performs no network I/O and cannot fail.
	fn authorization_url(&self, state: &str, options: &AuthorizationOptions) -> Url;

	/// Exchanges an authorization code for a [`Token`].
	fn exchange_code<'a>(
		&'a self,
		ctx: &'a CallContext,
		code: &'a str,
		options: &'a ExchangeOptions,
	) -> ProviderFuture<'a, Token>;

	/// Resolves the normalized identity behind `token`.
	///
	/// Absent optional fields (email, name, avatar) are returned as empty strings.
	fn fetch_identity<'a>(
		&'a self,
		ctx: &'a CallContext,
		token: &'a Token,
	) -> ProviderFuture<'a, NormalizedIdentity>;
}

/// Closed set of supported providers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
	/// Alipay open platform.
	Alipay,
	/// Sign in with Apple.
	Apple,
	/// DingTalk.
	Dingtalk,
	/// Facebook Login.
	Facebook,
	/// Feishu (Lark) passport.
	Feishu,
	/// GitHub OAuth apps.
	Github,
	/// Google OAuth 2.0.
	Google,
	/// Microsoft identity platform.
	Microsoft,
	/// QQ Connect.
	Qq,
	/// X (Twitter) OAuth 2.0 with PKCE.
	Twitter,
	/// WeChat open platform website login.
	Wechat,
}
impl ProviderKind {
	/// Every provider, in label order.
	pub const ALL: [ProviderKind; 11] = [
		ProviderKind::Alipay,
		ProviderKind::Apple,
		ProviderKind::Dingtalk,
		ProviderKind::Facebook,
		ProviderKind::Feishu,
		ProviderKind::Github,
		ProviderKind::Google,
		ProviderKind::Microsoft,
		ProviderKind::Qq,
		ProviderKind::Twitter,
		ProviderKind::Wechat,
	];

	/// Returns the stable lowercase label used for registry lookups.
	pub const fn as_str(self) -> &'static str {
		match self {
			ProviderKind::Alipay => "alipay",
			ProviderKind::Apple => "apple",
			ProviderKind::Dingtalk => "dingtalk",
			ProviderKind::Facebook => "facebook",
			ProviderKind::Feishu => "feishu",
			ProviderKind::Github => "github",
			ProviderKind::Google => "google",
			ProviderKind::Microsoft => "microsoft",
			ProviderKind::Qq => "qq",
			ProviderKind::Twitter => "twitter",
			ProviderKind::Wechat => "wechat",
		}
	}
}
impl Display for ProviderKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for ProviderKind {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		Self::ALL
			.into_iter()
			.find(|kind| kind.as_str().eq_ignore_ascii_case(s))
			.ok_or_else(|| Error::UnsupportedProvider { name: s.to_owned() })
	}
}

/// Per-call knobs for [`IdentityProvider::authorization_url`].
#[derive(Clone, Debug, Default)]
pub struct AuthorizationOptions {
	/// Replaces the adapter's default scopes when set.
	pub scopes: Option<Vec<String>>,
	/// Additional query parameters appended after the adapter's own.
	pub extra_params: Vec<(String, String)>,
}
impl AuthorizationOptions {
	/// Overrides the requested scopes.
	pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes = Some(scopes.into_iter().map(Into::into).collect());

		self
	}

	/// Appends one extra query parameter.
	pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.extra_params.push((key.into(), value.into()));

		self
	}
}

/// Per-call knobs for [`IdentityProvider::exchange_code`].
#[derive(Clone, Debug, Default)]
pub struct ExchangeOptions {
	/// Flow state returned with the code; required by PKCE-based adapters.
	pub state: Option<String>,
	/// Additional token-request parameters.
	pub extra_params: Vec<(String, String)>,
}
impl ExchangeOptions {
	/// Options carrying the flow state.
	pub fn with_state(state: impl Into<String>) -> Self {
		Self { state: Some(state.into()), extra_params: Vec::new() }
	}

	/// Appends one extra token-request parameter.
	pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.extra_params.push((key.into(), value.into()));

		self
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn kind_labels_round_trip() {
		for kind in ProviderKind::ALL {
			assert_eq!(kind.as_str().parse::<ProviderKind>().ok(), Some(kind));
		}

		assert_eq!("GitHub".parse::<ProviderKind>().ok(), Some(ProviderKind::Github));
		assert!(matches!(
			"myspace".parse::<ProviderKind>(),
			Err(Error::UnsupportedProvider { name }) if name == "myspace"
		));
	}

	#[test]
	fn kind_serializes_as_label() {
		let payload = serde_json::to_string(&ProviderKind::Wechat)
			.expect("ProviderKind should serialize to JSON.");

		assert_eq!(payload, "\"wechat\"");
	}
}
