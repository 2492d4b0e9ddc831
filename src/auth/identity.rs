//! The normalized identity record every adapter returns.

// self
use crate::{_prelude::*, provider::ProviderKind};

/// Provider-independent view of the signed-in external account.
///
/// `provider_user_id` is stable across logins by the same external identity. When a provider
/// exposes both an app-scoped and an ecosystem-wide identifier, the ecosystem-wide one is
/// used. Fields the provider did not return are empty strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedIdentity {
	/// Provider that vouched for the identity.
	pub provider: ProviderKind,
	/// Stable external identifier.
	pub provider_user_id: String,
	/// E-mail address, possibly empty.
	pub email: String,
	/// Display name, possibly empty.
	pub display_name: String,
	/// Avatar URL, possibly empty.
	pub avatar_url: String,
	/// Unmodified provider payload, for diagnostics.
	pub raw_payload: JsonValue,
}
impl NormalizedIdentity {
	/// Starts an identity with empty optional fields.
	pub fn new(provider: ProviderKind, provider_user_id: impl Into<String>, raw_payload: JsonValue) -> Self {
		Self {
			provider,
			provider_user_id: provider_user_id.into(),
			email: String::new(),
			display_name: String::new(),
			avatar_url: String::new(),
			raw_payload,
		}
	}

	/// Returns the stable lowercase provider label.
	pub fn provider_name(&self) -> &'static str {
		self.provider.as_str()
	}

	/// Sets the e-mail address.
	pub fn with_email(mut self, email: impl Into<String>) -> Self {
		self.email = email.into();

		self
	}

	/// Sets the display name.
	pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
		self.display_name = display_name.into();

		self
	}

	/// Sets the avatar URL.
	pub fn with_avatar_url(mut self, avatar_url: impl Into<String>) -> Self {
		self.avatar_url = avatar_url.into();

		self
	}
}
