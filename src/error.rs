//! Error taxonomy shared by adapters, the PKCE store, and the registry.

// self
use crate::{
	_prelude::*,
	provider::{ProviderDescriptorError, ProviderErrorContext, ProviderKind},
};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Missing or malformed credential/key material, detected before any network call.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Provider rejected the authorization code or answered with an unusable token body.
	#[error("Token exchange with {provider} failed: {failure}")]
	TokenExchange {
		/// Provider that was called.
		provider: ProviderKind,
		/// What went wrong.
		#[source]
		failure: ProviderFailure,
	},
	/// Identity lookup failed in transport or returned an unparsable profile.
	#[error("Identity fetch from {provider} failed: {failure}")]
	IdentityFetch {
		/// Provider that was called.
		provider: ProviderKind,
		/// What went wrong.
		#[source]
		failure: ProviderFailure,
	},
	/// PKCE verifier for the flow state was never stored, already consumed, or expired.
	#[error("No PKCE verifier is pending for this {provider} flow state.")]
	VerifierMissing {
		/// Provider whose flow lost its verifier.
		provider: ProviderKind,
	},
	/// Registry lookup miss.
	#[error("Provider `{name}` is not supported or not configured.")]
	UnsupportedProvider {
		/// Name that was looked up.
		name: String,
	},
}
impl Error {
	pub(crate) fn token_exchange(provider: ProviderKind, failure: impl Into<ProviderFailure>) -> Self {
		Self::TokenExchange { provider, failure: failure.into() }
	}

	pub(crate) fn identity_fetch(provider: ProviderKind, failure: impl Into<ProviderFailure>) -> Self {
		Self::IdentityFetch { provider, failure: failure.into() }
	}

	/// Returns the provider-signalled context when the failure was an explicit rejection.
	pub fn rejection(&self) -> Option<&ProviderErrorContext> {
		match self {
			Self::TokenExchange { failure: ProviderFailure::Rejected(ctx), .. }
			| Self::IdentityFetch { failure: ProviderFailure::Rejected(ctx), .. } => Some(ctx),
			_ => None,
		}
	}
}

/// Configuration and validation failures; always raised before network I/O.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Endpoint set failed validation.
	#[error(transparent)]
	Descriptor(#[from] ProviderDescriptorError),
	/// Client identifier is empty.
	#[error("The {provider} client id is empty.")]
	MissingClientId {
		/// Provider being configured.
		provider: ProviderKind,
	},
	/// Client secret is required but empty.
	#[error("The {provider} client secret is empty.")]
	MissingClientSecret {
		/// Provider being configured.
		provider: ProviderKind,
	},
	/// Redirect URL cannot be parsed.
	#[error("The {provider} redirect URL is invalid.")]
	InvalidRedirect {
		/// Provider being configured.
		provider: ProviderKind,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A required provider-specific extra is absent or blank.
	#[error("The {provider} configuration is missing the `{key}` extra.")]
	MissingExtra {
		/// Provider being configured.
		provider: ProviderKind,
		/// Canonical extra key.
		key: &'static str,
	},
	/// A provider-specific extra has the wrong shape.
	#[error("The {provider} `{key}` extra is invalid: {reason}.")]
	InvalidExtra {
		/// Provider being configured.
		provider: ProviderKind,
		/// Canonical extra key.
		key: &'static str,
		/// Why the value was rejected.
		reason: String,
	},
	/// Private key material could not be parsed.
	#[error("The {provider} private key could not be parsed.")]
	InvalidSigningKey {
		/// Provider being configured.
		provider: ProviderKind,
		/// Underlying key parsing failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
	/// Signing a client assertion or request failed.
	#[error("Signing the {provider} request failed.")]
	Signing {
		/// Provider being called.
		provider: ProviderKind,
		/// Underlying signer failure.
		#[source]
		source: jsonwebtoken::errors::Error,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Why a provider call failed.
#[derive(Debug, ThisError)]
pub enum ProviderFailure {
	/// The provider explicitly signalled an error (status, `errcode`, `error`, ...).
	#[error("{0}")]
	Rejected(ProviderErrorContext),
	/// JSON body did not match the expected shape.
	#[error("Response JSON is malformed at `{}`.", .source.path())]
	Json {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Non-JSON body (query text, wrapped callback, JWT) could not be decoded.
	#[error("Response is malformed: {message}.")]
	Malformed {
		/// What could not be decoded.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Request never produced a usable response.
	#[error(transparent)]
	Transport(#[from] TransportError),
}
impl ProviderFailure {
	pub(crate) fn malformed(message: impl Into<String>, status: Option<u16>) -> Self {
		Self::Malformed { message: message.into(), status }
	}
}
impl From<ProviderErrorContext> for ProviderFailure {
	fn from(ctx: ProviderErrorContext) -> Self {
		Self::Rejected(ctx)
	}
}

/// Transport-level failures (network, IO, deadline, cancellation).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the provider.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the provider.")]
	Io(#[from] std::io::Error),
	/// Outbound request could not be assembled.
	#[error("Request could not be built.")]
	Request(#[from] oauth2::http::Error),
	/// Call context deadline elapsed.
	#[error("Provider call timed out after {after:?}.")]
	TimedOut {
		/// Configured timeout.
		after: std::time::Duration,
	},
	/// Call context was cancelled by the caller.
	#[error("Provider call was cancelled.")]
	Cancelled,
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn rejection_message_surfaces_in_display() {
		let ctx = ProviderErrorContext::new()
			.with_http_status(200)
			.with_error_code("40029")
			.with_error_message("invalid code");
		let err = Error::token_exchange(ProviderKind::Wechat, ctx);

		assert!(err.to_string().contains("invalid code"));
		assert!(err.to_string().contains("wechat"));
		assert_eq!(
			err.rejection().and_then(|ctx| ctx.error_code.as_deref()),
			Some("40029"),
		);
	}

	#[test]
	fn transport_failures_keep_their_source() {
		let err = Error::identity_fetch(ProviderKind::Github, TransportError::Cancelled);
		let source = StdError::source(&err).expect("Identity errors should expose a source.");

		assert_eq!(source.to_string(), "Provider call was cancelled.");
		assert!(err.rejection().is_none());
	}
}
