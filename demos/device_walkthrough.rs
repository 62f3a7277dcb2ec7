//! Walks a device through sign-up, sign-in, refresh, and listing against an in-process
//! authorization service backed by a mock OAuth provider.

// std
use std::sync::Arc;
// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use color_eyre::Result;
use httpmock::prelude::*;
use tokio::net::TcpListener;
use url::Url;
// self
use hub_authorization::{
	auth::{ProviderName, ScopeSet, TokenSecret},
	client::AuthorizationClient,
	http::ProviderHttpClient,
	oauth::{AuthStyle, OAuthClient, OAuthClientConfig, OAuthEndpoint},
	rpc::{self, AppState},
	service::{
		AuthorizationService, DeviceSessionRequest, GetUserDevicesRequest, RefreshTokenRequest,
		SignUpRequest,
	},
	store::{DeviceStore, MemoryStore},
	well_known::WellKnownConfiguration,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let provider = MockServer::start_async().await;
	let id_token = format!(
		"{}.{}.",
		URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#),
		URL_SAFE_NO_PAD.encode(br#"{"sub":"demo-user"}"#),
	);
	let code_mock = provider
		.mock_async(|when, then| {
			when.method(POST).path("/token").body_includes("grant_type=authorization_code");
			then.status(200).header("content-type", "application/json").body(
				serde_json::json!({
					"access_token": "demo-access-1",
					"refresh_token": "demo-refresh-1",
					"token_type": "bearer",
					"expires_in": 3600,
					"id_token": id_token,
				})
				.to_string(),
			);
		})
		.await;
	let refresh_mock = provider
		.mock_async(|when, then| {
			when.method(POST).path("/token").body_includes("grant_type=refresh_token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access-2\",\"token_type\":\"bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	let oauth = OAuthClient::new(OAuthClientConfig {
		client_id: "demo-device-client".into(),
		client_secret: "demo-secret".into(),
		scopes: ScopeSet::new(["openid", "offline_access"])?,
		endpoint: OAuthEndpoint {
			auth_url: provider.url("/authorize"),
			token_url: provider.url("/token"),
			auth_style: AuthStyle::InParams,
		},
		redirect_url: "https://hub.example.com/callback".into(),
		..OAuthClientConfig::default()
	})?;
	let store: Arc<dyn DeviceStore> = Arc::new(MemoryStore::default());
	let service = AuthorizationService::new(store, oauth, ProviderName::new("demo-provider")?);
	let app = rpc::router(AppState::new(
		service,
		OAuthClientConfig::default(),
		WellKnownConfiguration::default(),
	));
	let listener = TcpListener::bind("127.0.0.1:0").await?;
	let base = Url::parse(&format!("http://{}", listener.local_addr()?))?;
	let server = tokio::spawn(async move { axum::serve(listener, app).await });
	let http = ProviderHttpClient::new(std::time::Duration::from_secs(5))?;
	// Sign-up does not interpret the bearer; any placeholder passes the middleware.
	let onboarding =
		AuthorizationClient::new(http.clone(), base.clone(), Arc::new(TokenSecret::new("onboarding")));
	let signed_up = onboarding
		.sign_up(&SignUpRequest {
			device_id: "demo-device".into(),
			authorization_code: TokenSecret::new("demo-code"),
			auth_provider: "demo-provider".into(),
		})
		.await?;

	code_mock.assert_async().await;
	println!("Signed up demo-device for {} ({}s).", signed_up.user_id, signed_up.expires_in);

	let device =
		AuthorizationClient::new(http.clone(), base.clone(), Arc::new(signed_up.access_token.clone()));
	let session = DeviceSessionRequest {
		device_id: "demo-device".into(),
		user_id: signed_up.user_id.clone(),
		..Default::default()
	};
	let signed_in = device.sign_in(&session).await?;

	println!("Signed in; token valid for {}s.", signed_in.expires_in);

	let refreshed = onboarding
		.refresh_token(&RefreshTokenRequest {
			device_id: "demo-device".into(),
			user_id: signed_up.user_id.clone(),
			refresh_token: signed_up.refresh_token.clone(),
		})
		.await?;

	refresh_mock.assert_async().await;
	println!("Refreshed; access token fingerprint {}.", refreshed.access_token.fingerprint());

	let owner = AuthorizationClient::new(http, base, Arc::new(refreshed.access_token));
	let devices = owner.get_user_devices(&GetUserDevicesRequest::default()).await?;

	for entry in devices.devices {
		println!("{} belongs to {}.", entry.device_id, entry.user_id);
	}

	server.abort();

	Ok(())
}
