#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use oauth2_identity::{
	_preludet::*,
	config::ProviderConfig,
	context::CallContext,
	provider::{ExchangeOptions, IdentityProvider, ProviderKind},
	providers::{self, alipay},
};

fn adapter(server: &MockServer) -> Arc<dyn IdentityProvider> {
	let base = Url::parse(&server.base_url()).expect("Mock server URL should parse.");
	let published = providers::descriptor_for(ProviderKind::Alipay, &ProviderConfig::default())
		.expect("Published descriptor should build.");
	let config =
		test_config("2021000000000000", "").with_extra("private_key", fixture("alipay_rsa2.pem"));
	let (factory, _, _) = test_factory();

	factory
		.with_endpoints(ProviderKind::Alipay, published.endpoints.rebase(&base))
		.build(ProviderKind::Alipay, &config)
		.expect("Alipay adapter should build.")
}

#[tokio::test]
async fn signed_gateway_calls_resolve_the_user_id() {
	let server = MockServer::start_async().await;
	let adapter = adapter(&server);
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/gateway.do")
				.body_includes("method=alipay.system.oauth.token")
				.body_includes("app_id=2021000000000000")
				.body_includes("code=ali-code")
				.body_includes("sign_type=RSA2")
				.body_includes("sign=");
			then.status(200).header("content-type", "text/html;charset=utf-8").body(
				"{\"alipay_system_oauth_token_response\":{\"access_token\":\"ali-at\",\"expires_in\":1296000,\"re_expires_in\":2592000,\"refresh_token\":\"ali-rt\",\"user_id\":\"2088102150477652\"},\"sign\":\"ERITJKEIJKJHKKKKKKKHJEREEEEEEEEEEE\"}",
			);
		})
		.await;
	let profile_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/gateway.do")
				.body_includes("method=alipay.user.info.share")
				.body_includes("auth_token=ali-at");
			then.status(200).header("content-type", "text/html;charset=utf-8").body(
				"{\"alipay_user_info_share_response\":{\"code\":\"10000\",\"msg\":\"Success\",\"user_id\":\"2088102150477652\",\"avatar\":\"https://tfs.example.com/i.png\",\"nick_name\":\"\"},\"sign\":\"ERITJKEIJKJHKKKKKKKHJEREEEEEEEEEEE\"}",
			);
		})
		.await;
	let ctx = CallContext::new();
	let token = adapter
		.exchange_code(&ctx, "ali-code", &ExchangeOptions::default())
		.await
		.expect("Alipay exchange should succeed.");
	let identity = adapter.fetch_identity(&ctx, &token).await.expect("Alipay identity should resolve.");

	token_mock.assert_async().await;
	profile_mock.assert_async().await;

	assert_eq!(token.access_token.expose(), "ali-at");
	assert_eq!(token.claim_str("user_id"), Some("2088102150477652"));
	assert_eq!(identity.provider_user_id, "2088102150477652");
	assert_eq!(identity.display_name, alipay::PLACEHOLDER_NAME);
	assert_eq!(identity.avatar_url, "https://tfs.example.com/i.png");
}

#[tokio::test]
async fn error_responses_surface_the_sub_code() {
	let server = MockServer::start_async().await;
	let adapter = adapter(&server);

	server
		.mock_async(|when, then| {
			when.method(POST).path("/gateway.do");
			then.status(200).header("content-type", "text/html;charset=utf-8").body(
				"{\"error_response\":{\"code\":\"40002\",\"msg\":\"Invalid Arguments\",\"sub_code\":\"isv.code-invalid\",\"sub_msg\":\"Authorization code is invalid\"},\"sign\":\"x\"}",
			);
		})
		.await;

	let err = adapter
		.exchange_code(&CallContext::new(), "reused", &ExchangeOptions::default())
		.await
		.expect_err("Gateway errors must fail the exchange.");
	let rejection = err.rejection().expect("Failure should carry the provider context.");

	assert!(matches!(err, Error::TokenExchange { provider: ProviderKind::Alipay, .. }));
	assert_eq!(rejection.error_code.as_deref(), Some("isv.code-invalid"));
	assert_eq!(rejection.error_message.as_deref(), Some("Authorization code is invalid"));
}
