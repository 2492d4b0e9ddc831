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
	error::{ProviderFailure, TransportError},
	provider::{ExchangeOptions, IdentityProvider, ProviderKind},
	providers,
	registry::ProviderFactory,
};

fn mock_factory(server: &MockServer, kind: ProviderKind) -> ProviderFactory {
	let base = Url::parse(&server.base_url()).expect("Mock server URL should parse.");
	let published = providers::descriptor_for(kind, &ProviderConfig::default())
		.expect("Published descriptor should build.");
	let (factory, _, _) = test_factory();

	factory.with_endpoints(kind, published.endpoints.rebase(&base))
}

fn adapter(server: &MockServer, kind: ProviderKind) -> Arc<dyn IdentityProvider> {
	mock_factory(server, kind)
		.build(kind, &test_config("client-it", "secret-it"))
		.expect("Adapter should build against the mock server.")
}

#[tokio::test]
async fn github_falls_back_to_the_primary_verified_email() {
	let server = MockServer::start_async().await;
	let adapter = adapter(&server, ProviderKind::Github);
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/login/oauth/access_token")
				.header("accept", "application/json")
				.body_includes("code=gh-code");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"gho_1\",\"token_type\":\"bearer\",\"scope\":\"read:user,user:email\"}");
		})
		.await;
	let user_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/user").header("authorization", "Bearer gho_1");
			then.status(200).header("content-type", "application/json").body(
				"{\"id\":583231,\"login\":\"octocat\",\"name\":null,\"email\":null,\"avatar_url\":\"https://avatars.example.com/u/583231\"}",
			);
		})
		.await;
	let emails_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/user/emails").header("authorization", "Bearer gho_1");
			then.status(200).header("content-type", "application/json").body(
				"[{\"email\":\"old@example.com\",\"primary\":false,\"verified\":true},{\"email\":\"octo@example.com\",\"primary\":true,\"verified\":true}]",
			);
		})
		.await;
	let ctx = CallContext::new();
	let token = adapter
		.exchange_code(&ctx, "gh-code", &ExchangeOptions::default())
		.await
		.expect("GitHub exchange should succeed.");
	let identity = adapter.fetch_identity(&ctx, &token).await.expect("GitHub identity should resolve.");

	token_mock.assert_calls_async(1).await;
	user_mock.assert_calls_async(1).await;
	emails_mock.assert_calls_async(1).await;

	assert_eq!(token.access_token.expose(), "gho_1");
	assert_eq!(identity.provider, ProviderKind::Github);
	assert_eq!(identity.provider_user_id, "583231");
	assert_eq!(identity.display_name, "octocat");
	assert_eq!(identity.email, "octo@example.com");
	assert_eq!(identity.avatar_url, "https://avatars.example.com/u/583231");
}

#[tokio::test]
async fn github_email_lookup_failures_degrade_to_an_empty_email() {
	let server = MockServer::start_async().await;
	let adapter = adapter(&server, ProviderKind::Github);

	server
		.mock_async(|when, then| {
			when.method(GET).path("/user");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"id\":7,\"login\":\"quiet\",\"name\":\"Quiet Cat\"}");
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/user/emails");
			then.status(403)
				.header("content-type", "application/json")
				.body("{\"message\":\"Resource not accessible by integration\"}");
		})
		.await;

	let token = Token::builder().access_token("gho_2").build().expect("Token should build.");
	let identity = adapter
		.fetch_identity(&CallContext::new(), &token)
		.await
		.expect("E-mail lookup failures must not fail the login.");

	assert_eq!(identity.provider_user_id, "7");
	assert_eq!(identity.display_name, "Quiet Cat");
	assert!(identity.email.is_empty());
}

#[tokio::test]
async fn github_email_lookup_honors_cancellation() {
	let server = MockServer::start_async().await;
	let adapter = adapter(&server, ProviderKind::Github);

	server
		.mock_async(|when, then| {
			when.method(GET).path("/user");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"id\":1,\"login\":\"hidden\",\"email\":null}");
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/user/emails");
			then.status(200)
				.delay(std::time::Duration::from_secs(5))
				.header("content-type", "application/json")
				.body("[]");
		})
		.await;
	let token = Token::builder().access_token("gho_3").build().expect("Token should build.");
	let ctx = CallContext::new();
	let canceller = {
		let ctx = ctx.clone();

		tokio::spawn(async move {
			tokio::time::sleep(std::time::Duration::from_millis(100)).await;
			ctx.cancel();
		})
	};
	let err = adapter
		.fetch_identity(&ctx, &token)
		.await
		.expect_err("Cancelled lookups must not resolve an identity.");

	canceller.await.expect("Canceller task should finish.");

	assert!(matches!(
		err,
		Error::IdentityFetch {
			provider: ProviderKind::Github,
			failure: ProviderFailure::Transport(TransportError::Cancelled),
		}
	));
}

#[tokio::test]
async fn github_error_bodies_under_http_ok_are_exchange_failures() {
	let server = MockServer::start_async().await;
	let adapter = adapter(&server, ProviderKind::Github);

	server
		.mock_async(|when, then| {
			when.method(POST).path("/login/oauth/access_token");
			then.status(200).header("content-type", "application/json").body(
				"{\"error\":\"bad_verification_code\",\"error_description\":\"The code passed is incorrect or expired.\"}",
			);
		})
		.await;

	let err = adapter
		.exchange_code(&CallContext::new(), "stale", &ExchangeOptions::default())
		.await
		.expect_err("Error bodies must not become tokens.");

	assert!(matches!(err, Error::TokenExchange { provider: ProviderKind::Github, .. }));
	assert_eq!(
		err.rejection().and_then(|ctx| ctx.error_code.as_deref()),
		Some("bad_verification_code")
	);
}

#[tokio::test]
async fn google_exchange_and_profile_round_trip() {
	let server = MockServer::start_async().await;
	let adapter = adapter(&server, ProviderKind::Google);
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/token")
				.body_includes("grant_type=authorization_code")
				.body_includes("client_secret=secret-it");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"ya29.a0\",\"token_type\":\"Bearer\",\"expires_in\":3599,\"refresh_token\":\"1//rt\",\"id_token\":\"h.p.s\"}",
			);
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/oauth2/v2/userinfo").header("authorization", "Bearer ya29.a0");
			then.status(200).header("content-type", "application/json").body(
				"{\"id\":\"1098\",\"email\":\"ada@example.com\",\"verified_email\":true,\"name\":\"Ada Lovelace\",\"picture\":\"https://lh3.example.com/a\"}",
			);
		})
		.await;

	let ctx = CallContext::new();
	let token = adapter
		.exchange_code(&ctx, "g-code", &ExchangeOptions::default())
		.await
		.expect("Google exchange should succeed.");
	let identity = adapter.fetch_identity(&ctx, &token).await.expect("Google identity should resolve.");

	token_mock.assert_async().await;

	assert_eq!(token.refresh_token.as_ref().map(|secret| secret.expose()), Some("1//rt"));
	assert_eq!(token.claim_str("id_token"), Some("h.p.s"));
	assert_eq!(token.expires_at, Some(test_clock().now() + Duration::seconds(3599)));
	assert_eq!(identity.provider_user_id, "1098");
	assert_eq!(identity.email, "ada@example.com");
	assert_eq!(identity.display_name, "Ada Lovelace");
	assert_eq!(identity.avatar_url, "https://lh3.example.com/a");
	assert_eq!(identity.raw_payload["verified_email"], true);
}

#[tokio::test]
async fn google_rejections_keep_status_and_code() {
	let server = MockServer::start_async().await;
	let adapter = adapter(&server, ProviderKind::Google);

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\",\"error_description\":\"Bad Request\"}");
		})
		.await;

	let err = adapter
		.exchange_code(&CallContext::new(), "used", &ExchangeOptions::default())
		.await
		.expect_err("Rejected codes must fail.");
	let rejection = err.rejection().expect("Failure should carry the provider context.");

	assert_eq!(rejection.http_status, Some(400));
	assert_eq!(rejection.error_code.as_deref(), Some("invalid_grant"));
}

#[tokio::test]
async fn facebook_profile_uses_the_nested_picture() {
	let server = MockServer::start_async().await;
	let adapter = adapter(&server, ProviderKind::Facebook);

	server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/me")
				.query_param("fields", "id,name,email,picture.type(large)")
				.header("authorization", "Bearer EAAB");
			then.status(200).header("content-type", "application/json").body(
				"{\"id\":\"10158\",\"name\":\"Grace Hopper\",\"email\":\"grace@example.com\",\"picture\":{\"data\":{\"height\":200,\"is_silhouette\":false,\"url\":\"https://graph.example.com/pic\",\"width\":200}}}",
			);
		})
		.await;

	let token = Token::builder().access_token("EAAB").build().expect("Token should build.");
	let identity = adapter
		.fetch_identity(&CallContext::new(), &token)
		.await
		.expect("Facebook identity should resolve.");

	assert_eq!(identity.provider_user_id, "10158");
	assert_eq!(identity.display_name, "Grace Hopper");
	assert_eq!(identity.email, "grace@example.com");
	assert_eq!(identity.avatar_url, "https://graph.example.com/pic");
}

#[tokio::test]
async fn facebook_graph_errors_are_identity_failures() {
	let server = MockServer::start_async().await;
	let adapter = adapter(&server, ProviderKind::Facebook);

	server
		.mock_async(|when, then| {
			when.method(GET).path("/me");
			then.status(400).header("content-type", "application/json").body(
				"{\"error\":{\"message\":\"Invalid OAuth access token.\",\"type\":\"OAuthException\",\"code\":190}}",
			);
		})
		.await;

	let token = Token::builder().access_token("expired").build().expect("Token should build.");
	let err = adapter
		.fetch_identity(&CallContext::new(), &token)
		.await
		.expect_err("Graph errors must fail the identity step.");

	assert!(matches!(err, Error::IdentityFetch { provider: ProviderKind::Facebook, .. }));
	assert_eq!(err.rejection().and_then(|ctx| ctx.http_status), Some(400));
}

#[tokio::test]
async fn microsoft_uses_the_tenant_token_endpoint_and_upn_fallback() {
	let server = MockServer::start_async().await;
	let adapter = adapter(&server, ProviderKind::Microsoft);
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/common/oauth2/v2.0/token").body_includes("code=ms-code");
			then.status(200).header("content-type", "application/json").body(
				"{\"token_type\":\"Bearer\",\"scope\":\"User.Read\",\"expires_in\":3736,\"access_token\":\"eyJ0\"}",
			);
		})
		.await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/v1.0/me").header("authorization", "Bearer eyJ0");
			then.status(200).header("content-type", "application/json").body(
				"{\"id\":\"87d349ed\",\"displayName\":\"Megan Bowen\",\"mail\":null,\"userPrincipalName\":\"MeganB@contoso.example\"}",
			);
		})
		.await;

	let ctx = CallContext::new();
	let token = adapter
		.exchange_code(&ctx, "ms-code", &ExchangeOptions::default())
		.await
		.expect("Microsoft exchange should succeed.");
	let identity = adapter.fetch_identity(&ctx, &token).await.expect("Microsoft identity should resolve.");

	token_mock.assert_async().await;

	assert_eq!(identity.provider_user_id, "87d349ed");
	assert_eq!(identity.display_name, "Megan Bowen");
	assert_eq!(identity.email, "MeganB@contoso.example");
	assert!(identity.avatar_url.is_empty());
}
