//! Credential records for the adapters.
//!
//! [`ProviderConfig`] is the free-form input record; adapters turn it into typed settings at
//! construction and fail with [`ConfigError`] before any network call. [`IdentityConfig`]
//! bundles one record per provider so any serde format can load the whole set.

// self
use crate::{_prelude::*, error::ConfigError, provider::ProviderKind};

/// Canonical extra key plus the legacy spellings accepted for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtraKey {
	/// Canonical snake_case key.
	pub name: &'static str,
	/// Older spellings that are still honored.
	pub aliases: &'static [&'static str],
}
impl ExtraKey {
	/// Apple key identifier placed in the client-secret header.
	pub const KEY_ID: ExtraKey = ExtraKey { name: "key_id", aliases: &["KeyID"] };
	/// PEM-encoded private key (EC P-256 for Apple, RSA for Alipay).
	pub const PRIVATE_KEY: ExtraKey =
		ExtraKey { name: "private_key", aliases: &["AppPrivateKey", "PrivateKey"] };
	/// Apple developer team identifier.
	pub const TEAM_ID: ExtraKey = ExtraKey { name: "team_id", aliases: &["TeamID"] };
	/// Microsoft directory tenant (`common`, `organizations`, `consumers`, or an id).
	pub const TENANT: ExtraKey = ExtraKey { name: "tenant", aliases: &["Tenant"] };

	fn candidates(self) -> impl Iterator<Item = &'static str> {
		std::iter::once(self.name).chain(self.aliases.iter().copied())
	}
}

/// Per-provider credential record.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
	/// OAuth client identifier (app id, app key). Empty means "not configured".
	pub client_id: String,
	/// OAuth client secret; unused by providers that sign their own assertions.
	pub client_secret: String,
	/// Callback URL registered with the provider.
	pub redirect_url: String,
	/// Provider-only settings keyed by field name.
	pub extra: BTreeMap<String, JsonValue>,
}
impl ProviderConfig {
	/// Creates a record without extras.
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		redirect_url: impl Into<String>,
	) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: client_secret.into(),
			redirect_url: redirect_url.into(),
			extra: BTreeMap::new(),
		}
	}

	/// Adds one extra value.
	pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
		self.extra.insert(key.into(), value.into());

		self
	}

	/// Returns `true` when a client identifier is present.
	pub fn is_configured(&self) -> bool {
		!self.client_id.trim().is_empty()
	}

	/// Looks up a non-blank string extra under its canonical name or an alias.
	pub fn extra_str(&self, key: ExtraKey) -> Option<&str> {
		key.candidates()
			.filter_map(|candidate| self.extra.get(candidate))
			.filter_map(JsonValue::as_str)
			.map(str::trim)
			.find(|value| !value.is_empty())
	}

	/// Like [`Self::extra_str`], failing with [`ConfigError::MissingExtra`] when absent.
	///
	/// Non-string values under the key are reported as [`ConfigError::InvalidExtra`].
	pub fn require_extra(&self, provider: ProviderKind, key: ExtraKey) -> Result<&str, ConfigError> {
		if let Some(value) = self.extra_str(key) {
			return Ok(value);
		}

		match key.candidates().find_map(|candidate| self.extra.get(candidate)) {
			Some(value) if !value.is_string() && !value.is_null() => Err(ConfigError::InvalidExtra {
				provider,
				key: key.name,
				reason: format!("expected a string, found `{value}`"),
			}),
			_ => Err(ConfigError::MissingExtra { provider, key: key.name }),
		}
	}

	/// Validates the fields every adapter needs.
	pub(crate) fn client_settings(
		&self,
		provider: ProviderKind,
		secret: SecretRequirement,
	) -> Result<ClientSettings, ConfigError> {
		let client_id = self.client_id.trim();

		if client_id.is_empty() {
			return Err(ConfigError::MissingClientId { provider });
		}

		let client_secret = self.client_secret.trim();

		if client_secret.is_empty() && matches!(secret, SecretRequirement::Required) {
			return Err(ConfigError::MissingClientSecret { provider });
		}

		let redirect_url = Url::parse(self.redirect_url.trim())
			.map_err(|source| ConfigError::InvalidRedirect { provider, source })?;

		Ok(ClientSettings {
			client_id: client_id.to_owned(),
			client_secret: client_secret.to_owned(),
			redirect_url,
		})
	}
}
impl Debug for ProviderConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProviderConfig")
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.field("redirect_url", &self.redirect_url)
			.field("extra", &self.extra.keys().collect::<Vec<_>>())
			.finish()
	}
}

/// Whether an adapter authenticates with the shared client secret.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SecretRequirement {
	Required,
	/// Providers that sign their own assertions (Apple, Alipay).
	Unused,
}

/// Validated subset of [`ProviderConfig`] shared by all adapters.
#[derive(Clone)]
pub(crate) struct ClientSettings {
	pub(crate) client_id: String,
	pub(crate) client_secret: String,
	pub(crate) redirect_url: Url,
}
impl Debug for ClientSettings {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientSettings")
			.field("client_id", &self.client_id)
			.field("redirect_url", &self.redirect_url.as_str())
			.finish_non_exhaustive()
	}
}

/// One [`ProviderConfig`] per supported provider.
///
/// Records with an empty client id are skipped by
/// [`ProviderFactory::build_registry`](crate::registry::ProviderFactory::build_registry).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
	/// Alipay credentials.
	pub alipay: ProviderConfig,
	/// Sign in with Apple credentials.
	pub apple: ProviderConfig,
	/// DingTalk credentials.
	pub dingtalk: ProviderConfig,
	/// Facebook credentials.
	pub facebook: ProviderConfig,
	/// Feishu credentials.
	pub feishu: ProviderConfig,
	/// GitHub credentials.
	pub github: ProviderConfig,
	/// Google credentials.
	pub google: ProviderConfig,
	/// Microsoft credentials.
	pub microsoft: ProviderConfig,
	/// QQ Connect credentials.
	pub qq: ProviderConfig,
	/// X (Twitter) credentials.
	pub twitter: ProviderConfig,
	/// WeChat credentials.
	pub wechat: ProviderConfig,
}
impl IdentityConfig {
	/// Returns the record for `kind`.
	pub fn get(&self, kind: ProviderKind) -> &ProviderConfig {
		match kind {
			ProviderKind::Alipay => &self.alipay,
			ProviderKind::Apple => &self.apple,
			ProviderKind::Dingtalk => &self.dingtalk,
			ProviderKind::Facebook => &self.facebook,
			ProviderKind::Feishu => &self.feishu,
			ProviderKind::Github => &self.github,
			ProviderKind::Google => &self.google,
			ProviderKind::Microsoft => &self.microsoft,
			ProviderKind::Qq => &self.qq,
			ProviderKind::Twitter => &self.twitter,
			ProviderKind::Wechat => &self.wechat,
		}
	}

	/// Replaces the record for `kind`.
	pub fn set(&mut self, kind: ProviderKind, config: ProviderConfig) {
		let slot = match kind {
			ProviderKind::Alipay => &mut self.alipay,
			ProviderKind::Apple => &mut self.apple,
			ProviderKind::Dingtalk => &mut self.dingtalk,
			ProviderKind::Facebook => &mut self.facebook,
			ProviderKind::Feishu => &mut self.feishu,
			ProviderKind::Github => &mut self.github,
			ProviderKind::Google => &mut self.google,
			ProviderKind::Microsoft => &mut self.microsoft,
			ProviderKind::Qq => &mut self.qq,
			ProviderKind::Twitter => &mut self.twitter,
			ProviderKind::Wechat => &mut self.wechat,
		};

		*slot = config;
	}

	/// Builder-style variant of [`Self::set`].
	pub fn with(mut self, kind: ProviderKind, config: ProviderConfig) -> Self {
		self.set(kind, config);

		self
	}

	/// Iterates over records whose client id is set, in label order.
	pub fn configured(&self) -> impl Iterator<Item = (ProviderKind, &ProviderConfig)> {
		ProviderKind::ALL
			.into_iter()
			.map(|kind| (kind, self.get(kind)))
			.filter(|(_, config)| config.is_configured())
	}
}
