//! Name-keyed adapter registry and the factory that fills it from configuration.
//!
//! The registry is an explicitly constructed value (clone it to share it); lookups take a read
//! lock, while registration and credential rotation take the write lock briefly. The factory
//! owns the runtime shared by every adapter it builds: the transport, the clock, and the PKCE
//! verifier store.

// self
use crate::{
	_prelude::*,
	clock::Clock,
	config::{IdentityConfig, ProviderConfig},
	error::ConfigError,
	http::HttpTransport,
	pkce::VerifierStore,
	provider::{IdentityProvider, ProviderDescriptor, ProviderEndpoints, ProviderKind},
	providers::{self, ProviderRuntime},
};

type AdapterMap = Arc<RwLock<HashMap<ProviderKind, Arc<dyn IdentityProvider>>>>;

/// Shared lookup table from provider name to adapter.
#[derive(Clone, Default)]
pub struct ProviderRegistry(AdapterMap);
impl ProviderRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Looks up an adapter by its lowercase label (matched case-insensitively).
	///
	/// Unknown names and known-but-unregistered providers both yield
	/// [`Error::UnsupportedProvider`].
	pub fn get(&self, name: &str) -> Result<Arc<dyn IdentityProvider>> {
		let kind = ProviderKind::from_str(name)?;

		self.get_kind(kind).ok_or_else(|| Error::UnsupportedProvider { name: name.to_owned() })
	}

	/// Looks up an adapter by kind.
	pub fn get_kind(&self, kind: ProviderKind) -> Option<Arc<dyn IdentityProvider>> {
		self.0.read().get(&kind).cloned()
	}

	/// Returns `true` when `kind` is registered.
	pub fn contains(&self, kind: ProviderKind) -> bool {
		self.0.read().contains_key(&kind)
	}

	/// Registers `adapter` under its own kind, returning the adapter it replaced.
	pub fn register(&self, adapter: Arc<dyn IdentityProvider>) -> Option<Arc<dyn IdentityProvider>> {
		self.0.write().insert(adapter.kind(), adapter)
	}

	/// Removes the adapter for `kind`.
	pub fn unregister(&self, kind: ProviderKind) -> Option<Arc<dyn IdentityProvider>> {
		self.0.write().remove(&kind)
	}

	/// Registered labels in sorted order.
	pub fn names(&self) -> Vec<&'static str> {
		let mut kinds = self.0.read().keys().copied().collect::<Vec<_>>();

		kinds.sort();

		kinds.into_iter().map(ProviderKind::as_str).collect()
	}

	/// Number of registered adapters.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when nothing is registered.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	/// Drops every adapter.
	pub fn clear(&self) {
		self.0.write().clear();
	}
}
impl Debug for ProviderRegistry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("ProviderRegistry").field(&self.names()).finish()
	}
}

/// Builds adapters that share one transport, clock, and verifier store.
#[derive(Clone, Debug)]
pub struct ProviderFactory {
	runtime: ProviderRuntime,
	endpoints: HashMap<ProviderKind, ProviderEndpoints>,
}
impl ProviderFactory {
	/// Factory over `http`, the system clock, and a fresh verifier store.
	pub fn new(http: Arc<dyn HttpTransport>) -> Self {
		Self { runtime: ProviderRuntime::new(http), endpoints: HashMap::new() }
	}

	/// Factory over the bundled reqwest transport.
	#[cfg(feature = "reqwest")]
	pub fn with_reqwest() -> Result<Self, ConfigError> {
		Ok(Self::new(Arc::new(crate::http::ReqwestHttpClient::new()?)))
	}

	/// Swaps the time source; the verifier store is recreated on the new clock.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.runtime.verifiers = Arc::new(VerifierStore::new(clock.clone()));
		self.runtime.clock = clock;

		self
	}

	/// Shares an existing verifier store.
	pub fn with_verifier_store(mut self, verifiers: Arc<VerifierStore>) -> Self {
		self.runtime.verifiers = verifiers;

		self
	}

	/// Replaces the endpoints used for `kind` (regional hosts, test servers).
	pub fn with_endpoints(mut self, kind: ProviderKind, endpoints: ProviderEndpoints) -> Self {
		self.endpoints.insert(kind, endpoints);

		self
	}

	/// Runtime handed to every adapter.
	pub fn runtime(&self) -> &ProviderRuntime {
		&self.runtime
	}

	/// Resolves the descriptor for `kind`, applying any endpoint override.
	pub fn descriptor(&self, kind: ProviderKind, config: &ProviderConfig) -> Result<ProviderDescriptor, ConfigError> {
		let descriptor = providers::descriptor_for(kind, config)?;

		match self.endpoints.get(&kind) {
			Some(endpoints) => Ok(descriptor.with_endpoints(endpoints.clone())?),
			None => Ok(descriptor),
		}
	}

	/// Builds one adapter, validating `config` before any network use.
	pub fn build(&self, kind: ProviderKind, config: &ProviderConfig) -> Result<Arc<dyn IdentityProvider>> {
		let descriptor = self.descriptor(kind, config)?;

		providers::build_adapter(config, descriptor, &self.runtime)
	}

	/// Builds and registers an adapter for every provider with a client id.
	///
	/// Fails on the first invalid record so misconfiguration surfaces at startup.
	pub fn build_registry(&self, config: &IdentityConfig) -> Result<ProviderRegistry> {
		let registry = ProviderRegistry::new();

		for (kind, provider_config) in config.configured() {
			registry.register(self.build(kind, provider_config)?);
		}

		Ok(registry)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::*,
		auth::{NormalizedIdentity, Token},
		context::CallContext,
		provider::{AuthorizationOptions, ExchangeOptions, ProviderFuture},
	};

	#[derive(Debug)]
	struct StaticProvider(ProviderKind, &'static str);
	impl IdentityProvider for StaticProvider {
		fn kind(&self) -> ProviderKind {
			self.0
		}

		fn authorization_url(&self, state: &str, _: &AuthorizationOptions) -> Url {
			let mut url = Url::parse("https://login.example.com/authorize").expect("Static URL should parse.");

			url.query_pairs_mut().append_pair("state", state).append_pair("rev", self.1);

			url
		}

		fn exchange_code<'a>(
			&'a self,
			_: &'a CallContext,
			code: &'a str,
			_: &'a ExchangeOptions,
		) -> ProviderFuture<'a, Token> {
			Box::pin(async move {
				Ok(Token::builder().access_token(code).build().expect("Static token should build."))
			})
		}

		fn fetch_identity<'a>(
			&'a self,
			_: &'a CallContext,
			_: &'a Token,
		) -> ProviderFuture<'a, NormalizedIdentity> {
			Box::pin(async move { Ok(NormalizedIdentity::new(self.0, "static", JsonValue::Null)) })
		}
	}

	#[test]
	fn registry_replaces_and_removes_adapters() {
		let registry = ProviderRegistry::new();

		assert!(registry.register(Arc::new(StaticProvider(ProviderKind::Qq, "v1"))).is_none());

		let replaced = registry
			.register(Arc::new(StaticProvider(ProviderKind::Qq, "v2")))
			.expect("Re-registration should return the previous adapter.");
		let current = registry.get("qq").expect("QQ should be registered.");

		assert!(replaced.authorization_url("s", &AuthorizationOptions::default()).as_str().contains("rev=v1"));
		assert!(current.authorization_url("s", &AuthorizationOptions::default()).as_str().contains("rev=v2"));
		assert!(registry.unregister(ProviderKind::Qq).is_some());
		assert!(registry.is_empty());
	}

	#[test]
	fn lookups_miss_with_unsupported_provider() {
		let registry = ProviderRegistry::new();

		registry.register(Arc::new(StaticProvider(ProviderKind::Github, "v1")));

		assert!(registry.get("GitHub").is_ok());
		assert!(matches!(
			registry.get("google"),
			Err(Error::UnsupportedProvider { name }) if name == "google"
		));
		assert!(matches!(registry.get("myspace"), Err(Error::UnsupportedProvider { .. })));

		registry.clear();

		assert!(registry.get("github").is_err());
	}

	#[test]
	fn only_configured_providers_are_registered() {
		let (factory, _, _) = test_factory();
		let config = IdentityConfig::default().with(ProviderKind::Github, test_config("gh-client", "gh-secret"));
		let registry = factory.build_registry(&config).expect("Registry should build.");

		assert_eq!(registry.names(), vec!["github"]);
		assert_eq!(registry.get("github").expect("GitHub should be registered.").kind(), ProviderKind::Github);

		for kind in ProviderKind::ALL.into_iter().filter(|kind| *kind != ProviderKind::Github) {
			assert!(matches!(registry.get(kind.as_str()), Err(Error::UnsupportedProvider { .. })));
		}
	}

	#[test]
	fn invalid_records_fail_registry_construction() {
		let (factory, _, _) = test_factory();
		let config = IdentityConfig::default().with(ProviderKind::Apple, test_config("com.example.web", ""));

		assert!(matches!(
			factory.build_registry(&config),
			Err(Error::Config(ConfigError::MissingExtra { provider: ProviderKind::Apple, .. }))
		));
	}

	#[test]
	fn endpoint_overrides_are_validated() {
		let (factory, _, _) = test_factory();
		let published = providers::descriptor_for(ProviderKind::Google, &ProviderConfig::default())
			.expect("Published descriptor should build.");
		let insecure = published
			.endpoints
			.rebase(&Url::parse("http://idp.example.com").expect("Base URL should parse."));
		let loopback = published
			.endpoints
			.rebase(&Url::parse("http://127.0.0.1:8080/mock").expect("Base URL should parse."));
		let config = test_config("google-client", "google-secret");

		assert!(factory.clone().with_endpoints(ProviderKind::Google, insecure).build(ProviderKind::Google, &config).is_err());

		let adapter = factory
			.with_endpoints(ProviderKind::Google, loopback)
			.build(ProviderKind::Google, &config)
			.expect("Loopback overrides should be accepted.");
		let url = adapter.authorization_url("st", &AuthorizationOptions::default());

		assert_eq!(url.as_str().split('?').next(), Some("http://127.0.0.1:8080/mock/o/oauth2/auth"));
	}
}
