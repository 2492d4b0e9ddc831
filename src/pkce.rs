//! PKCE verifier generation and the short-lived verifier store.
//!
//! A verifier is minted when the authorization URL is built and consumed exactly once by the
//! matching code exchange. Every store operation runs under one lock; entries carry their
//! creation instant so abandoned flows expire after the store's TTL.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	clock::{Clock, SystemClock},
	provider::ProviderKind,
};

const PKCE_VERIFIER_LEN: usize = 64;

/// The only challenge method this crate emits (RFC 7636 `S256`).
pub const CHALLENGE_METHOD: &str = "S256";

/// Redacted PKCE code verifier.
#[derive(Clone, PartialEq, Eq)]
pub struct PkceVerifier(String);
impl PkceVerifier {
	/// Mints a cryptographically random verifier.
	pub fn generate() -> Self {
		Self(rand::rng().sample_iter(Alphanumeric).take(PKCE_VERIFIER_LEN).map(char::from).collect())
	}

	/// Returns the verifier value for the token request.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Derives the `S256` challenge.
	pub fn challenge(&self) -> String {
		compute_pkce_challenge(&self.0)
	}
}
impl Debug for PkceVerifier {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("PkceVerifier").field(&"<redacted>").finish()
	}
}

/// Computes `base64url_no_padding(SHA256(verifier))`.
pub fn compute_pkce_challenge(verifier: &str) -> String {
	let mut hasher = Sha256::new();

	hasher.update(verifier.as_bytes());

	URL_SAFE_NO_PAD.encode(hasher.finalize())
}

struct PendingVerifier {
	verifier: PkceVerifier,
	created_at: OffsetDateTime,
}

/// Shared, lock-protected `flow state -> verifier` map with single-use semantics.
pub struct VerifierStore {
	entries: Mutex<HashMap<(ProviderKind, String), PendingVerifier>>,
	clock: Arc<dyn Clock>,
	ttl: Duration,
}
impl VerifierStore {
	/// Lifetime of an unconsumed verifier unless overridden.
	pub const DEFAULT_TTL: Duration = Duration::minutes(10);

	/// Creates an empty store reading time from `clock`.
	pub fn new(clock: Arc<dyn Clock>) -> Self {
		Self { entries: Mutex::new(HashMap::new()), clock, ttl: Self::DEFAULT_TTL }
	}

	/// Overrides the verifier lifetime.
	pub fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl = ttl;

		self
	}

	/// Records the verifier for `state`, replacing any pending one and sweeping expired entries.
	pub fn insert(&self, provider: ProviderKind, state: &str, verifier: PkceVerifier) {
		let now = self.clock.now();
		let mut entries = self.entries.lock();

		entries.retain(|_, pending| !self.is_expired(pending, now));
		entries.insert((provider, state.to_owned()), PendingVerifier { verifier, created_at: now });
	}

	/// Removes and returns the verifier for `state`.
	///
	/// Returns `None` when it was never stored, was already consumed, or has expired.
	pub fn take(&self, provider: ProviderKind, state: &str) -> Option<PkceVerifier> {
		let now = self.clock.now();
		let pending = self.entries.lock().remove(&(provider, state.to_owned()))?;

		(!self.is_expired(&pending, now)).then_some(pending.verifier)
	}

	/// Drops expired entries, returning how many were removed.
	pub fn sweep(&self) -> usize {
		let now = self.clock.now();
		let mut entries = self.entries.lock();
		let before = entries.len();

		entries.retain(|_, pending| !self.is_expired(pending, now));

		before - entries.len()
	}

	/// Number of pending verifiers, expired ones included until the next sweep.
	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	/// Returns `true` when nothing is pending.
	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}

	/// Forgets every pending verifier.
	pub fn clear(&self) {
		self.entries.lock().clear();
	}

	fn is_expired(&self, pending: &PendingVerifier, now: OffsetDateTime) -> bool {
		now - pending.created_at >= self.ttl
	}
}
impl Default for VerifierStore {
	fn default() -> Self {
		Self::new(Arc::new(SystemClock))
	}
}
impl Debug for VerifierStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("VerifierStore").field("pending", &self.len()).field("ttl", &self.ttl).finish()
	}
}
