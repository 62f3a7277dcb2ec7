#![cfg(feature = "test")]

// crates.io
use httpmock::prelude::*;
use tokio::net::TcpListener;
// self
use hub_authorization::{
	_preludet::*,
	auth::TokenSecret,
	client::{AuthorizationClient, ServiceTokenManager, TokenSource, fetch_well_known},
	error::ConfigError,
	http::ProviderHttpClient,
	oauth::{OAuthClient, OAuthClientConfig},
	rpc::{self, AppState, AuthorizeClient},
	service::{DeviceSessionRequest, GetUserDevicesRequest},
	store::DeviceStore,
	well_known::{WebOAuthClient, WellKnownConfiguration},
};

fn http() -> ProviderHttpClient {
	ProviderHttpClient::new(std::time::Duration::from_secs(5))
		.expect("HTTP client should build successfully.")
}

fn well_known_body(authority: &str) -> String {
	serde_json::json!({
		"authority": authority,
		"httpGatewayAddress": "https://hub.example.com",
		"webOauthClient": { "clientId": "web-client", "scopes": ["openid"] },
		"deviceOauthClient": { "clientId": "device-client", "providerName": "github" }
	})
	.to_string()
}

#[tokio::test]
async fn fetch_well_known_validates_the_document() {
	let server = MockServer::start_async().await;
	let base = Url::parse(&server.base_url()).expect("Mock base URL should parse.");
	let mut mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/.well-known/configuration");
			then.status(200)
				.header("content-type", "application/json")
				.body(well_known_body("https://idp.example.com"));
		})
		.await;
	let document = fetch_well_known(&http(), &base).await.expect("Valid document should load.");

	mock.assert_async().await;

	assert_eq!(document.web_oauth_client.client_id, "web-client");
	assert_eq!(document.device_oauth_client.provider_name, "github");

	mock.delete_async().await;

	let _incomplete = server
		.mock_async(|when, then| {
			when.method(GET).path("/.well-known/configuration");
			then.status(200).header("content-type", "application/json").body(well_known_body(""));
		})
		.await;
	let err = fetch_well_known(&http(), &base)
		.await
		.expect_err("A document without authority must be rejected.");

	assert!(matches!(err, ConfigError::WellKnown { .. }));
	assert_eq!(err.to_string(), "Could not retrieve the well-known configuration.");
	assert!(
		std::error::Error::source(&err)
			.is_some_and(|source| source.to_string().contains("authority"))
	);
}

#[tokio::test]
async fn fetch_well_known_reports_http_failures() {
	let server = MockServer::start_async().await;
	let base = Url::parse(&server.base_url()).expect("Mock base URL should parse.");
	let _missing = server
		.mock_async(|when, then| {
			when.method(GET).path("/.well-known/configuration");
			then.status(404);
		})
		.await;
	let err = fetch_well_known(&http(), &base).await.expect_err("A 404 must be rejected.");

	assert!(matches!(err, ConfigError::WellKnown { .. }));
}

#[tokio::test]
async fn authorization_client_round_trips_commands_and_errors() {
	let (service, store) = build_test_service("https://idp.example.com");

	store
		.save(test_record("device-1", "user-1", "access-1", "refresh-1"))
		.await
		.expect("Seeding the device record should succeed.");

	let well_known = WellKnownConfiguration {
		authority: "https://idp.example.com".into(),
		http_gateway_address: "https://hub.example.com".into(),
		web_oauth_client: WebOAuthClient { client_id: "web-client".into(), ..Default::default() },
		..Default::default()
	};
	let app = rpc::router(AppState::new(service, OAuthClientConfig::default(), well_known));
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("Listener should bind.");
	let address = listener.local_addr().expect("Listener should expose its address.");
	let server = tokio::spawn(async move { axum::serve(listener, app).await });
	let base = Url::parse(&format!("http://{address}")).expect("Service URL should parse.");
	let client = AuthorizationClient::new(http(), base, Arc::new(TokenSecret::new("access-1")));
	let session = DeviceSessionRequest {
		device_id: "device-1".into(),
		user_id: "user-1".into(),
		..Default::default()
	};
	let signed_in = client.sign_in(&session).await.expect("Sign in should succeed.");

	assert!(signed_in.expires_in > 0);

	let devices = client
		.get_user_devices(&GetUserDevicesRequest::default())
		.await
		.expect("Listing devices should succeed.");

	assert_eq!(devices.devices.len(), 1);

	let authorize = client
		.authorize_url(AuthorizeClient::Device)
		.await
		.expect("Authorization URL should be issued.");

	assert!(authorize.url.contains(&authorize.state));

	let document = client.well_known().await.expect("Well-known document should load.");

	assert_eq!(document.authority, "https://idp.example.com");

	let err = client
		.sign_in(&DeviceSessionRequest { user_id: "user-2".into(), ..session.clone() })
		.await
		.expect_err("Foreign user must be rejected.");

	assert!(matches!(err, Error::PermissionDenied { .. }));

	client.sign_out(&session).await.expect("Sign out should succeed.");

	let err = client.sign_in(&session).await.expect_err("Signed-out device must be rejected.");

	assert!(matches!(err, Error::Unauthenticated { .. }));

	server.abort();
}

#[tokio::test]
async fn service_token_manager_fetches_on_start() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").body_includes("grant_type=client_credentials");
			then.status(200)
				.header("content-type", "application/json")
				.body(r#"{"access_token":"service-1","token_type":"bearer","expires_in":3600}"#);
		})
		.await;
	let client = OAuthClient::new(test_oauth_config(&server.base_url()))
		.expect("OAuth client should build successfully.");
	let manager = ServiceTokenManager::start(client, std::time::Duration::from_millis(50))
		.await
		.expect("Service token manager should start.");
	let token = manager.token().await.expect("Service token should be available.");

	assert_eq!(token.expose(), "service-1");

	tokio::time::sleep(std::time::Duration::from_millis(150)).await;

	mock.assert_calls_async(1).await;
	manager.close().await;
}

#[tokio::test]
async fn service_token_manager_start_fails_when_the_provider_rejects() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(401)
				.header("content-type", "application/json")
				.body(r#"{"error":"invalid_client"}"#);
		})
		.await;
	let client = OAuthClient::new(test_oauth_config(&server.base_url()))
		.expect("OAuth client should build successfully.");
	let err = ServiceTokenManager::start(client, std::time::Duration::from_secs(1))
		.await
		.expect_err("Start must fail when the first fetch fails.");

	assert!(matches!(err, Error::InvalidClient { .. }));
}
