//! Adapter implementations, one independent type per provider.
//!
//! Every adapter module exposes `descriptor(&ProviderConfig)` with its published endpoints and
//! a `with_descriptor` constructor that validates typed settings up front. The helpers below
//! hold the few pieces the adapters genuinely share: runtime dependencies, authorization URL
//! assembly, and JSON reply handling.

pub mod alipay;
pub mod apple;
pub mod dingtalk;
pub mod facebook;
pub mod feishu;
pub mod github;
pub mod google;
pub mod microsoft;
pub mod qq;
pub mod twitter;
pub mod wechat;

pub use alipay::AlipayProvider;
pub use apple::{AppleProvider, AppleUser};
pub use dingtalk::DingtalkProvider;
pub use facebook::FacebookProvider;
pub use feishu::FeishuProvider;
pub use github::GithubProvider;
pub use google::GoogleProvider;
pub use microsoft::MicrosoftProvider;
pub use qq::QqProvider;
pub use twitter::TwitterProvider;
pub use wechat::WechatProvider;

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::TokenBuilderError,
	clock::{Clock, SystemClock},
	config::{ClientSettings, ProviderConfig},
	context::CallContext,
	error::{ConfigError, ProviderFailure},
	http::{HttpTransport, ProviderRequest},
	obs::{self, CallOutcome, CallSpan, Operation},
	pkce::VerifierStore,
	provider::{AuthorizationOptions, IdentityProvider, ProviderDescriptor, ProviderKind, envelope},
};

/// Dependencies shared by every adapter built from one factory.
#[derive(Clone)]
pub struct ProviderRuntime {
	/// Transport used for every provider round trip.
	pub http: Arc<dyn HttpTransport>,
	/// Time source for token expiry, signed secrets, and verifier TTLs.
	pub clock: Arc<dyn Clock>,
	/// Pending PKCE verifiers.
	pub verifiers: Arc<VerifierStore>,
}
impl ProviderRuntime {
	/// Runtime using the system clock and a fresh verifier store.
	pub fn new(http: Arc<dyn HttpTransport>) -> Self {
		let clock: Arc<dyn Clock> = Arc::new(SystemClock);
		let verifiers = Arc::new(VerifierStore::new(clock.clone()));

		Self { http, clock, verifiers }
	}

	pub(crate) fn transport(&self) -> &dyn HttpTransport {
		self.http.as_ref()
	}

	pub(crate) fn now(&self) -> OffsetDateTime {
		self.clock.now()
	}
}
impl Debug for ProviderRuntime {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProviderRuntime").field("verifiers", &self.verifiers).finish_non_exhaustive()
	}
}

/// Returns the published descriptor for `kind`, shaped by `config` where the provider needs it.
pub fn descriptor_for(kind: ProviderKind, config: &ProviderConfig) -> Result<ProviderDescriptor, ConfigError> {
	match kind {
		ProviderKind::Alipay => alipay::descriptor(config),
		ProviderKind::Apple => apple::descriptor(config),
		ProviderKind::Dingtalk => dingtalk::descriptor(config),
		ProviderKind::Facebook => facebook::descriptor(config),
		ProviderKind::Feishu => feishu::descriptor(config),
		ProviderKind::Github => github::descriptor(config),
		ProviderKind::Google => google::descriptor(config),
		ProviderKind::Microsoft => microsoft::descriptor(config),
		ProviderKind::Qq => qq::descriptor(config),
		ProviderKind::Twitter => twitter::descriptor(config),
		ProviderKind::Wechat => wechat::descriptor(config),
	}
}

/// Builds the adapter for `descriptor.kind`.
pub fn build_adapter(
	config: &ProviderConfig,
	descriptor: ProviderDescriptor,
	runtime: &ProviderRuntime,
) -> Result<Arc<dyn IdentityProvider>> {
	let runtime = runtime.clone();
	let adapter: Arc<dyn IdentityProvider> = match descriptor.kind {
		ProviderKind::Alipay => Arc::new(AlipayProvider::with_descriptor(config, descriptor, runtime)?),
		ProviderKind::Apple => Arc::new(AppleProvider::with_descriptor(config, descriptor, runtime)?),
		ProviderKind::Dingtalk =>
			Arc::new(DingtalkProvider::with_descriptor(config, descriptor, runtime)?),
		ProviderKind::Facebook =>
			Arc::new(FacebookProvider::with_descriptor(config, descriptor, runtime)?),
		ProviderKind::Feishu => Arc::new(FeishuProvider::with_descriptor(config, descriptor, runtime)?),
		ProviderKind::Github => Arc::new(GithubProvider::with_descriptor(config, descriptor, runtime)?),
		ProviderKind::Google => Arc::new(GoogleProvider::with_descriptor(config, descriptor, runtime)?),
		ProviderKind::Microsoft =>
			Arc::new(MicrosoftProvider::with_descriptor(config, descriptor, runtime)?),
		ProviderKind::Qq => Arc::new(QqProvider::with_descriptor(config, descriptor, runtime)?),
		ProviderKind::Twitter => Arc::new(TwitterProvider::with_descriptor(config, descriptor, runtime)?),
		ProviderKind::Wechat => Arc::new(WechatProvider::with_descriptor(config, descriptor, runtime)?),
	};

	Ok(adapter)
}

/// Assembles the authorization URL: descriptor quirks first, then adapter extras, then caller
/// extras.
pub(crate) fn authorization_url(
	descriptor: &ProviderDescriptor,
	settings: &ClientSettings,
	state: &str,
	options: &AuthorizationOptions,
	extra: &[(&str, &str)],
) -> Url {
	let _span = CallSpan::new(descriptor.kind, Operation::Authorize).entered();
	let mut url = descriptor.endpoints.authorization.clone();
	let scope = descriptor.scope_param(options.scopes.as_deref());

	{
		let mut query = url.query_pairs_mut();

		query
			.append_pair(descriptor.quirks.client_id_param, &settings.client_id)
			.append_pair("redirect_uri", settings.redirect_url.as_str())
			.append_pair("response_type", "code");

		if !scope.is_empty() {
			query.append_pair("scope", &scope);
		}

		query.append_pair("state", state);

		if let Some(mode) = descriptor.quirks.response_mode {
			query.append_pair("response_mode", mode);
		}
		for (key, value) in extra {
			query.append_pair(key, value);
		}
		for (key, value) in &options.extra_params {
			query.append_pair(key, value);
		}
	}

	url.set_fragment(descriptor.quirks.fragment);
	obs::record_call_outcome(descriptor.kind, Operation::Authorize, CallOutcome::Success);

	url
}

/// JSON body that already passed status and embedded-error checks.
#[derive(Debug)]
pub(crate) struct JsonReply {
	pub(crate) value: JsonValue,
	pub(crate) status: u16,
}
impl JsonReply {
	/// Sends `request` once and checks the reply.
	pub(crate) async fn fetch(
		transport: &dyn HttpTransport,
		ctx: &CallContext,
		request: ProviderRequest,
	) -> Result<Self, ProviderFailure> {
		let response = request.send(transport, ctx).await?;
		let value = envelope::checked_json(&response)?;

		Ok(Self { value, status: response.status })
	}

	pub(crate) fn decode<T>(&self) -> Result<T, ProviderFailure>
	where
		T: DeserializeOwned,
	{
		envelope::from_value(self.value.clone(), Some(self.status))
	}

	/// Returns the object nested under `key`, or the whole body when absent.
	pub(crate) fn unwrap_member(self, key: &str) -> Self {
		match self.value {
			JsonValue::Object(mut object) if object.get(key).is_some_and(JsonValue::is_object) => Self {
				value: object.remove(key).unwrap_or(JsonValue::Null),
				status: self.status,
			},
			value => Self { value, status: self.status },
		}
	}
}

/// Normalizes configured key material into PEM.
///
/// Armored keys pass through (with `\n` escapes from env files expanded); bare base64 bodies
/// are wrapped in `label` armor at 64 columns.
pub(crate) fn armored_pem(key: &str, label: &str) -> String {
	let key = key.trim().replace("\\n", "\n");

	if key.starts_with("-----BEGIN") {
		return key;
	}

	let body = key.chars().filter(|ch| !ch.is_whitespace()).collect::<Vec<_>>();
	let mut pem = format!("-----BEGIN {label}-----\n");

	for line in body.chunks(64) {
		pem.extend(line);
		pem.push('\n');
	}

	pem.push_str(&format!("-----END {label}-----\n"));

	pem
}

/// Maps token builder errors for bodies that lacked an access token.
pub(crate) fn missing_access_token(err: TokenBuilderError, status: u16) -> ProviderFailure {
	ProviderFailure::malformed(format!("token response is unusable: {err}"), Some(status))
}
