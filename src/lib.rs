//! One identity contract over eleven third-party OAuth 2.0 login providers: quirk-aware
//! adapters, a PKCE verifier store, and a name-keyed provider registry.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod obs;
pub mod oauth;
pub mod pkce;
pub mod provider;
pub mod providers;
pub mod registry;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		clock::{Clock, ManualClock},
		config::ProviderConfig,
		http::{HttpTransport, ReqwestHttpClient},
		pkce::VerifierStore,
		registry::ProviderFactory,
	};

	/// Redirect URL shared by integration-test configurations.
	pub const TEST_REDIRECT_URL: &str = "https://app.example.com/oauth/callback?from=login";

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_http_client() -> Arc<dyn HttpTransport> {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		Arc::new(ReqwestHttpClient::with_client(client))
	}

	/// Manual clock pinned to a fixed instant so expiry math stays deterministic.
	pub fn test_clock() -> Arc<ManualClock> {
		Arc::new(ManualClock::new(time::macros::datetime!(2025-06-01 08:00:00 UTC)))
	}

	/// Builds a provider config with the shared redirect URL.
	pub fn test_config(client_id: &str, client_secret: &str) -> ProviderConfig {
		ProviderConfig::new(client_id, client_secret, TEST_REDIRECT_URL)
	}

	/// Factory wired to the insecure test transport, a manual clock, and a fresh verifier
	/// store.
	pub fn test_factory() -> (ProviderFactory, Arc<ManualClock>, Arc<VerifierStore>) {
		let clock = test_clock();
		let dyn_clock: Arc<dyn Clock> = clock.clone();
		let verifiers = Arc::new(VerifierStore::new(dyn_clock.clone()));
		let factory = ProviderFactory::new(test_http_client())
			.with_clock(dyn_clock)
			.with_verifier_store(verifiers.clone());

		(factory, clock, verifiers)
	}

	/// Reads a PEM fixture from `tests/fixtures`.
	pub fn fixture(name: &str) -> String {
		let path = format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));

		std::fs::read_to_string(&path).expect("Fixture file should be readable.")
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value as JsonValue;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
