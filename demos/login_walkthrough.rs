//! Walks through one social login: build a registry from configuration, send the user to the
//! consent page, then trade the callback code for a normalized identity.
//!
//! Set `GITHUB_CLIENT_ID`, `GITHUB_CLIENT_SECRET` and, once the browser returns, `GITHUB_CODE`
//! to run the exchange against GitHub itself.

// std
use std::{env, time::Duration};
// crates.io
use color_eyre::Result;
// self
use oauth2_identity::{
	config::{IdentityConfig, ProviderConfig},
	context::CallContext,
	provider::{AuthorizationOptions, ExchangeOptions, ProviderKind},
	registry::ProviderFactory,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = IdentityConfig::default()
		.with(
			ProviderKind::Github,
			ProviderConfig::new(
				env::var("GITHUB_CLIENT_ID").unwrap_or_else(|_| "demo-client".into()),
				env::var("GITHUB_CLIENT_SECRET").unwrap_or_else(|_| "demo-secret".into()),
				"https://app.example.com/oauth/github/callback",
			),
		)
		.with(
			ProviderKind::Twitter,
			ProviderConfig::new(
				"demo-x-client",
				"demo-x-secret",
				"https://app.example.com/oauth/twitter/callback",
			),
		);
	let registry = ProviderFactory::with_reqwest()?.build_registry(&config)?;

	println!("Configured providers: {}.", registry.names().join(", "));

	// The application owns `state`; keep it in the user's session and compare on return.
	let state = "csrf-7c1f";
	let github = registry.get("github")?;
	let twitter = registry.get("twitter")?;

	println!("GitHub consent page: {}.", github.authorization_url(state, &AuthorizationOptions::default()));
	println!("X consent page (PKCE): {}.", twitter.authorization_url(state, &AuthorizationOptions::default()));

	let Ok(code) = env::var("GITHUB_CODE") else {
		println!("Set GITHUB_CODE to the callback's `code` parameter to finish the login.");

		return Ok(());
	};
	let ctx = CallContext::new().with_timeout(Duration::from_secs(15));
	let options = ExchangeOptions::with_state(state);
	let token = github.exchange_code(&ctx, &code, &options).await?;
	let identity = github.fetch_identity(&ctx, &token).await?;

	println!(
		"Signed in {} ({}) as {} <{}>.",
		identity.provider, identity.provider_user_id, identity.display_name, identity.email
	);

	Ok(())
}
