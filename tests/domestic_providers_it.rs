#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use oauth2_identity::{
	_preludet::*,
	auth::Token,
	clock::Clock,
	config::ProviderConfig,
	context::CallContext,
	provider::{ExchangeOptions, IdentityProvider, ProviderKind},
	providers,
};

fn adapter(server: &MockServer, kind: ProviderKind) -> Arc<dyn IdentityProvider> {
	let base = Url::parse(&server.base_url()).expect("Mock server URL should parse.");
	let published = providers::descriptor_for(kind, &ProviderConfig::default())
		.expect("Published descriptor should build.");
	let (factory, _, _) = test_factory();

	factory
		.with_endpoints(kind, published.endpoints.rebase(&base))
		.build(kind, &test_config("client-it", "secret-it"))
		.expect("Adapter should build against the mock server.")
}

#[tokio::test]
async fn wechat_prefers_the_unionid() {
	let server = MockServer::start_async().await;
	let adapter = adapter(&server, ProviderKind::Wechat);
	let token_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/sns/oauth2/access_token")
				.query_param("appid", "client-it")
				.query_param("secret", "secret-it")
				.query_param("code", "wx-code")
				.query_param("grant_type", "authorization_code");
			then.status(200).header("content-type", "text/plain").body(
				"{\"access_token\":\"wx-at\",\"expires_in\":7200,\"refresh_token\":\"wx-rt\",\"openid\":\"op1\",\"scope\":\"snsapi_login\",\"unionid\":\"un1\"}",
			);
		})
		.await;
	let user_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/sns/userinfo")
				.query_param("access_token", "wx-at")
				.query_param("openid", "op1");
			then.status(200).header("content-type", "text/plain").body(
				"{\"openid\":\"op1\",\"nickname\":\"Zhang San\",\"sex\":1,\"headimgurl\":\"https://thirdwx.example.com/0\",\"unionid\":\"un1\"}",
			);
		})
		.await;
	let ctx = CallContext::new();
	let token = adapter
		.exchange_code(&ctx, "wx-code", &ExchangeOptions::default())
		.await
		.expect("WeChat exchange should succeed.");
	let identity = adapter.fetch_identity(&ctx, &token).await.expect("WeChat identity should resolve.");

	token_mock.assert_async().await;
	user_mock.assert_async().await;

	assert_eq!(token.claim_str("openid"), Some("op1"));
	assert_eq!(token.claim_str("unionid"), Some("un1"));
	assert_eq!(identity.provider_user_id, "un1");
	assert_eq!(identity.display_name, "Zhang San");
	assert_eq!(identity.avatar_url, "https://thirdwx.example.com/0");
	assert!(identity.email.is_empty());
}

#[tokio::test]
async fn wechat_errcode_bodies_are_exchange_failures() {
	let server = MockServer::start_async().await;
	let adapter = adapter(&server, ProviderKind::Wechat);

	server
		.mock_async(|when, then| {
			when.method(GET).path("/sns/oauth2/access_token");
			then.status(200)
				.header("content-type", "text/plain")
				.body("{\"errcode\":40029,\"errmsg\":\"invalid code\"}");
		})
		.await;

	let err = adapter
		.exchange_code(&CallContext::new(), "bad-code", &ExchangeOptions::default())
		.await
		.expect_err("errcode bodies must fail.");
	let rejection = err.rejection().expect("Failure should carry the provider context.");

	assert!(matches!(err, Error::TokenExchange { provider: ProviderKind::Wechat, .. }));
	assert_eq!(rejection.error_code.as_deref(), Some("40029"));
	assert_eq!(rejection.error_message.as_deref(), Some("invalid code"));
}

#[tokio::test]
async fn qq_parses_query_text_tokens_and_callback_wrapped_ids() {
	let server = MockServer::start_async().await;
	let adapter = adapter(&server, ProviderKind::Qq);
	let token_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/oauth2.0/token")
				.query_param("client_id", "client-it")
				.query_param("code", "qq-code")
				.query_param("redirect_uri", TEST_REDIRECT_URL);
			then.status(200)
				.header("content-type", "text/html")
				.body("access_token=qq-at&expires_in=7776000&refresh_token=qq-rt");
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/oauth2.0/me")
				.query_param("access_token", "qq-at")
				.query_param("unionid", "1");
			then.status(200)
				.header("content-type", "text/html")
				.body("callback( {\"client_id\":\"client-it\",\"openid\":\"abc123\"} );\n");
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/user/get_user_info")
				.query_param("oauth_consumer_key", "client-it")
				.query_param("openid", "abc123");
			then.status(200).header("content-type", "application/json").body(
				"{\"ret\":0,\"msg\":\"\",\"nickname\":\"Little Penguin\",\"figureurl_qq_1\":\"https://qzapp.example.com/40\",\"figureurl_qq_2\":\"\"}",
			);
		})
		.await;

	let ctx = CallContext::new();
	let token = adapter
		.exchange_code(&ctx, "qq-code", &ExchangeOptions::default())
		.await
		.expect("QQ exchange should succeed.");
	let identity = adapter.fetch_identity(&ctx, &token).await.expect("QQ identity should resolve.");

	token_mock.assert_async().await;

	assert_eq!(token.access_token.expose(), "qq-at");
	assert_eq!(token.refresh_token.as_ref().map(|secret| secret.expose()), Some("qq-rt"));
	assert_eq!(identity.provider_user_id, "abc123");
	assert_eq!(identity.display_name, "Little Penguin");
	assert_eq!(identity.avatar_url, "https://qzapp.example.com/40");
}

#[tokio::test]
async fn qq_profile_errors_are_identity_failures() {
	let server = MockServer::start_async().await;
	let adapter = adapter(&server, ProviderKind::Qq);

	server
		.mock_async(|when, then| {
			when.method(GET).path("/oauth2.0/me");
			then.status(200)
				.header("content-type", "text/html")
				.body("callback( {\"client_id\":\"client-it\",\"openid\":\"abc123\",\"unionid\":\"UID_9\"} );");
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/user/get_user_info");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"ret\":-1,\"msg\":\"client request's parameters are invalid, invalid openid\"}");
		})
		.await;

	let token = Token::builder().access_token("qq-at").build().expect("Token should build.");
	let err = adapter
		.fetch_identity(&CallContext::new(), &token)
		.await
		.expect_err("Non-zero ret must fail.");

	assert_eq!(err.rejection().and_then(|ctx| ctx.error_code.as_deref()), Some("-1"));
}

#[tokio::test]
async fn dingtalk_posts_camel_case_json_and_reads_the_header_authenticated_profile() {
	let server = MockServer::start_async().await;
	let adapter = adapter(&server, ProviderKind::Dingtalk);
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/v1.0/oauth2/userAccessToken")
				.header("content-type", "application/json")
				.body_includes("\"clientId\":\"client-it\"")
				.body_includes("\"grantType\":\"authorization_code\"")
				.body_includes("\"code\":\"dt-code\"");
			then.status(200).header("content-type", "application/json").body(
				"{\"accessToken\":\"dt-at\",\"refreshToken\":\"dt-rt\",\"expireIn\":7200,\"corpId\":\"ding9f50\"}",
			);
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v1.0/contact/users/me")
				.header("x-acs-dingtalk-access-token", "dt-at");
			then.status(200).header("content-type", "application/json").body(
				"{\"nick\":\"Li Si\",\"avatarUrl\":\"https://static.example.com/a.png\",\"email\":\"lisi@example.com\",\"openId\":\"o-1\",\"unionId\":\"u-1\"}",
			);
		})
		.await;

	let ctx = CallContext::new();
	let token = adapter
		.exchange_code(&ctx, "dt-code", &ExchangeOptions::default())
		.await
		.expect("DingTalk exchange should succeed.");
	let identity = adapter.fetch_identity(&ctx, &token).await.expect("DingTalk identity should resolve.");

	token_mock.assert_async().await;

	assert_eq!(token.claim_str("corpId"), Some("ding9f50"));
	assert_eq!(token.expires_at, Some(test_clock().now() + Duration::hours(2)));
	assert_eq!(identity.provider_user_id, "u-1");
	assert_eq!(identity.display_name, "Li Si");
	assert_eq!(identity.email, "lisi@example.com");
	assert_eq!(identity.avatar_url, "https://static.example.com/a.png");
}

#[tokio::test]
async fn dingtalk_code_bodies_are_exchange_failures() {
	let server = MockServer::start_async().await;
	let adapter = adapter(&server, ProviderKind::Dingtalk);

	server
		.mock_async(|when, then| {
			when.method(POST).path("/v1.0/oauth2/userAccessToken");
			then.status(400).header("content-type", "application/json").body(
				"{\"code\":\"InvalidAuthentication\",\"message\":\"authCode is invalid\",\"requestid\":\"5A9E\"}",
			);
		})
		.await;

	let err = adapter
		.exchange_code(&CallContext::new(), "dt-code", &ExchangeOptions::default())
		.await
		.expect_err("DingTalk rejections must fail.");
	let rejection = err.rejection().expect("Failure should carry the provider context.");

	assert_eq!(rejection.http_status, Some(400));
	assert_eq!(rejection.error_code.as_deref(), Some("InvalidAuthentication"));
	assert_eq!(rejection.error_message.as_deref(), Some("authCode is invalid"));
}

#[tokio::test]
async fn feishu_unwraps_data_envelopes() {
	let server = MockServer::start_async().await;
	let adapter = adapter(&server, ProviderKind::Feishu);

	server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/suite/passport/oauth/token")
				.body_includes("\"grant_type\":\"authorization_code\"")
				.body_includes("\"code\":\"fs-code\"");
			then.status(200).header("content-type", "application/json").body(
				"{\"code\":0,\"data\":{\"access_token\":\"u-fs\",\"refresh_token\":\"ur-fs\",\"expires_in\":6900,\"refresh_expires_in\":2592000,\"token_type\":\"Bearer\"}}",
			);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/suite/passport/oauth/userinfo").header("authorization", "Bearer u-fs");
			then.status(200).header("content-type", "application/json").body(
				"{\"code\":0,\"data\":{\"name\":\"\",\"en_name\":\"Wang Wu\",\"avatar_url\":\"https://s1.example.com/w\",\"email\":\"wang@example.com\",\"open_id\":\"ou_1\",\"union_id\":\"on_1\"}}",
			);
		})
		.await;

	let ctx = CallContext::new();
	let token = adapter
		.exchange_code(&ctx, "fs-code", &ExchangeOptions::default())
		.await
		.expect("Feishu exchange should succeed.");
	let identity = adapter.fetch_identity(&ctx, &token).await.expect("Feishu identity should resolve.");

	assert_eq!(token.access_token.expose(), "u-fs");
	assert_eq!(token.claim("refresh_expires_in").and_then(JsonValue::as_i64), Some(2_592_000));
	assert_eq!(identity.provider_user_id, "on_1");
	assert_eq!(identity.display_name, "Wang Wu");
	assert_eq!(identity.email, "wang@example.com");
}

#[tokio::test]
async fn feishu_profiles_without_identifiers_are_malformed() {
	let server = MockServer::start_async().await;
	let adapter = adapter(&server, ProviderKind::Feishu);

	server
		.mock_async(|when, then| {
			when.method(GET).path("/suite/passport/oauth/userinfo");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"code\":0,\"data\":{\"name\":\"Ghost\"}}");
		})
		.await;

	let token = Token::builder().access_token("u-fs").build().expect("Token should build.");
	let err = adapter
		.fetch_identity(&CallContext::new(), &token)
		.await
		.expect_err("Profiles without identifiers must fail.");

	assert!(matches!(err, Error::IdentityFetch { provider: ProviderKind::Feishu, .. }));
	assert!(err.rejection().is_none());
}
