//! Provider descriptor data structures and helpers shared by all adapters.
//!
//! A descriptor carries the validated endpoint set of one provider, the way its token
//! endpoint expects client credentials, and the authorization-request quirks (scope
//! delimiter, PKCE, response mode, client-id parameter name) that adapters consult.

/// Builder API for assembling provider descriptors.
pub mod builder;
/// Provider-specific quirk toggles.
pub mod quirks;

pub use builder::*;
pub use quirks::*;

// crates.io
use url::Host;
// self
use crate::{_prelude::*, provider::ProviderKind};

/// How an adapter presents client credentials to the token endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	#[default]
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
	/// Public clients that prove possession via PKCE.
	NoneWithPkce,
	/// Provider-specific request shape (JSON body, query credentials, signed gateway).
	Custom,
}

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Page the end-user is redirected to.
	pub authorization: Url,
	/// Code exchange endpoint.
	pub token: Url,
	/// Profile endpoint, when identity is not embedded in the token response.
	pub userinfo: Option<Url>,
	/// Secondary lookup (QQ identifier resolution, GitHub e-mail listing).
	pub auxiliary: Option<Url>,
}
impl ProviderEndpoints {
	/// Moves every endpoint onto `base` while keeping paths and queries.
	///
	/// Regional deployments and local mock servers reuse the provider's path layout under a
	/// different origin; a non-root `base` path is kept as a prefix.
	pub fn rebase(&self, base: &Url) -> Self {
		Self {
			authorization: rebase_url(&self.authorization, base),
			token: rebase_url(&self.token, base),
			userinfo: self.userinfo.as_ref().map(|url| rebase_url(url, base)),
			auxiliary: self.auxiliary.as_ref().map(|url| rebase_url(url, base)),
		}
	}

	/// Returns the profile endpoint or a descriptor error naming it.
	pub fn require_userinfo(&self) -> Result<&Url, ProviderDescriptorError> {
		self.userinfo
			.as_ref()
			.ok_or(ProviderDescriptorError::MissingEndpoint { endpoint: "userinfo" })
	}

	/// Returns the auxiliary endpoint or a descriptor error naming it.
	pub fn require_auxiliary(&self) -> Result<&Url, ProviderDescriptorError> {
		self.auxiliary
			.as_ref()
			.ok_or(ProviderDescriptorError::MissingEndpoint { endpoint: "auxiliary" })
	}

	pub(crate) fn validate(&self) -> Result<(), ProviderDescriptorError> {
		validate_endpoint("authorization", &self.authorization)?;
		validate_endpoint("token", &self.token)?;

		if let Some(userinfo) = self.userinfo.as_ref() {
			validate_endpoint("userinfo", userinfo)?;
		}
		if let Some(auxiliary) = self.auxiliary.as_ref() {
			validate_endpoint("auxiliary", auxiliary)?;
		}

		Ok(())
	}
}

/// Immutable provider descriptor consumed by adapters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderDescriptor {
	/// Provider described.
	pub kind: ProviderKind,
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
	/// Token endpoint client authentication.
	pub client_auth_method: ClientAuthMethod,
	/// Scopes requested when the caller does not override them.
	pub default_scopes: Vec<String>,
	/// Provider-specific quirks.
	pub quirks: ProviderQuirks,
}
impl ProviderDescriptor {
	/// Creates a new builder for the provided kind.
	pub fn builder(kind: ProviderKind) -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new(kind)
	}

	/// Returns a copy using `endpoints`, validated like the originals.
	pub fn with_endpoints(
		mut self,
		endpoints: ProviderEndpoints,
	) -> Result<Self, ProviderDescriptorError> {
		endpoints.validate()?;

		self.endpoints = endpoints;

		Ok(self)
	}

	/// Joins `scopes` (or the defaults) with the provider's delimiter.
	pub fn scope_param(&self, scopes: Option<&[String]>) -> String {
		let scopes = scopes.unwrap_or(&self.default_scopes);
		let mut delimiter = [0_u8; 4];

		scopes.join(self.quirks.scope_delimiter.encode_utf8(&mut delimiter))
	}
}

fn rebase_url(url: &Url, base: &Url) -> Url {
	let mut rebased = base.clone();
	let prefix = base.path().trim_end_matches('/');

	rebased.set_path(&format!("{prefix}{}", url.path()));
	rebased.set_query(url.query());
	rebased.set_fragment(None);

	rebased
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ProviderDescriptorError> {
	match url.scheme() {
		"https" => Ok(()),
		"http" if is_loopback(url) => Ok(()),
		_ => Err(ProviderDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() }),
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(Host::Ipv4(ip)) => ip.is_loopback(),
		Some(Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	}
}
