// self
use crate::{
	_prelude::*,
	provider::{ClientAuthMethod, ProviderDescriptor, ProviderEndpoints, ProviderKind, ProviderQuirks},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ProviderDescriptorError {
	/// Authorization endpoint is required.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// Token endpoint is required.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// An endpoint the adapter depends on was not declared.
	#[error("Missing {endpoint} endpoint.")]
	MissingEndpoint {
		/// Which endpoint is absent.
		endpoint: &'static str,
	},
	/// Endpoint literal could not be parsed.
	#[error("The {endpoint} endpoint is not a valid URL: {reason}.")]
	InvalidEndpoint {
		/// Which endpoint failed to parse.
		endpoint: &'static str,
		/// Parser message.
		reason: String,
	},
	/// Endpoints must use HTTPS (plain HTTP is accepted for loopback hosts).
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// PKCE requirement implies the public-client authentication method.
	#[error(
		"The `pkce_required` quirk requires the none_with_pkce or client_secret_basic client authentication method."
	)]
	PkceRequiredWithoutPkceAuth,
	/// Reject scope delimiters that are control characters.
	#[error("Scope delimiter must be a printable character.")]
	InvalidScopeDelimiter {
		/// Invalid delimiter that was supplied.
		delimiter: char,
	},
}

/// Builder for [`ProviderDescriptor`] values.
#[derive(Debug)]
pub struct ProviderDescriptorBuilder {
	/// Provider being described.
	pub kind: ProviderKind,
	/// Authorization endpoint.
	pub authorization_endpoint: Option<Url>,
	/// Token endpoint used for code exchanges.
	pub token_endpoint: Option<Url>,
	/// Optional profile endpoint.
	pub userinfo_endpoint: Option<Url>,
	/// Optional secondary lookup endpoint.
	pub auxiliary_endpoint: Option<Url>,
	/// Client authentication method for the token endpoint.
	pub client_auth_method: ClientAuthMethod,
	/// Scopes requested by default.
	pub default_scopes: Vec<String>,
	/// Provider-specific quirks.
	pub quirks: ProviderQuirks,
	/// First endpoint literal that failed to parse, reported by [`Self::build`].
	invalid: Option<ProviderDescriptorError>,
}
impl ProviderDescriptorBuilder {
	/// Creates a new builder seeded with the provided kind.
	pub fn new(kind: ProviderKind) -> Self {
		Self {
			kind,
			authorization_endpoint: None,
			token_endpoint: None,
			userinfo_endpoint: None,
			auxiliary_endpoint: None,
			client_auth_method: ClientAuthMethod::default(),
			default_scopes: Vec::new(),
			quirks: ProviderQuirks::default(),
			invalid: None,
		}
	}

	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the profile endpoint.
	pub fn userinfo_endpoint(mut self, url: Url) -> Self {
		self.userinfo_endpoint = Some(url);

		self
	}

	/// Sets the secondary lookup endpoint.
	pub fn auxiliary_endpoint(mut self, url: Url) -> Self {
		self.auxiliary_endpoint = Some(url);

		self
	}

	/// Replaces every endpoint at once.
	pub fn endpoints(mut self, endpoints: ProviderEndpoints) -> Self {
		self.authorization_endpoint = Some(endpoints.authorization);
		self.token_endpoint = Some(endpoints.token);
		self.userinfo_endpoint = endpoints.userinfo;
		self.auxiliary_endpoint = endpoints.auxiliary;

		self
	}

	/// Parses the provider's published endpoint literals.
	///
	/// Parse failures are deferred to [`Self::build`] so built-in tables stay declarative.
	pub fn published(
		mut self,
		authorization: &str,
		token: &str,
		userinfo: Option<&str>,
		auxiliary: Option<&str>,
	) -> Self {
		self.authorization_endpoint = self.parse("authorization", authorization);
		self.token_endpoint = self.parse("token", token);
		self.userinfo_endpoint = userinfo.and_then(|raw| self.parse("userinfo", raw));
		self.auxiliary_endpoint = auxiliary.and_then(|raw| self.parse("auxiliary", raw));

		self
	}

	/// Overrides the client authentication method.
	pub fn client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.client_auth_method = method;

		self
	}

	/// Sets the default scopes.
	pub fn default_scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.default_scopes = scopes.into_iter().map(Into::into).collect();

		self
	}

	/// Overrides the provider quirks.
	pub fn quirks(mut self, quirks: ProviderQuirks) -> Self {
		self.quirks = quirks;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		if let Some(err) = self.invalid {
			return Err(err);
		}

		let authorization = self
			.authorization_endpoint
			.ok_or(ProviderDescriptorError::MissingAuthorizationEndpoint)?;
		let token = self.token_endpoint.ok_or(ProviderDescriptorError::MissingTokenEndpoint)?;
		let endpoints = ProviderEndpoints {
			authorization,
			token,
			userinfo: self.userinfo_endpoint,
			auxiliary: self.auxiliary_endpoint,
		};
		let descriptor = ProviderDescriptor {
			kind: self.kind,
			endpoints,
			client_auth_method: self.client_auth_method,
			default_scopes: self.default_scopes,
			quirks: self.quirks,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}

	fn parse(&mut self, endpoint: &'static str, raw: &str) -> Option<Url> {
		match Url::parse(raw) {
			Ok(url) => Some(url),
			Err(e) => {
				self.invalid.get_or_insert(ProviderDescriptorError::InvalidEndpoint {
					endpoint,
					reason: e.to_string(),
				});

				None
			},
		}
	}
}

impl ProviderDescriptor {
	/// Validates invariants for the descriptor.
	fn validate(&self) -> Result<(), ProviderDescriptorError> {
		if self.quirks.pkce_required
			&& !matches!(self.client_auth_method, ClientAuthMethod::NoneWithPkce | ClientAuthMethod::ClientSecretBasic)
		{
			return Err(ProviderDescriptorError::PkceRequiredWithoutPkceAuth);
		}

		self.endpoints.validate()?;

		validate_scope_delimiter(self.quirks.scope_delimiter)
	}
}

fn validate_scope_delimiter(delimiter: char) -> Result<(), ProviderDescriptorError> {
	if delimiter.is_control() {
		Err(ProviderDescriptorError::InvalidScopeDelimiter { delimiter })
	} else {
		Ok(())
	}
}
