//! JSON-over-HTTP surface of the authorization service.
//!
//! Every `/api/v1` route requires `Authorization: Bearer <token>`; failures are answered with
//! an [`ErrorBody`] and a status derived from the error kind.

pub mod bearer;
pub mod error;

pub use bearer::*;
pub use error::*;

// crates.io
use axum::{
	Extension, Json, Router,
	extract::{Query, State},
	http::Uri,
	middleware,
	routing::{get, post},
};
use tower_http::trace::TraceLayer;
// self
use crate::{
	_prelude::*,
	oauth::{OAuthClientConfig, random_state},
	service::{
		AuthorizationService, DeleteDevicesRequest, DeleteDevicesResponse, GetUserDevicesRequest,
		GetUserDevicesResponse, RefreshTokenRequest, RefreshTokenResponse, SignInRequest,
		SignInResponse, SignOffRequest, SignOffResponse, SignOutRequest, SignOutResponse,
		SignUpRequest, SignUpResponse,
	},
	well_known::{WELL_KNOWN_PATH, WellKnownConfiguration},
};

/// Route prefix of the command surface.
pub const API_PREFIX: &str = "/api/v1";

/// Shared handler state.
#[derive(Clone, Debug)]
pub struct AppState {
	/// Command handlers.
	pub service: AuthorizationService,
	/// Web console client, used for `authorize-url?client=sdk`.
	pub sdk_oauth: Arc<OAuthClientConfig>,
	/// Document served under the well-known path.
	pub well_known: Arc<WellKnownConfiguration>,
}
impl AppState {
	/// Bundles handler state.
	pub fn new(
		service: AuthorizationService,
		sdk_oauth: OAuthClientConfig,
		well_known: WellKnownConfiguration,
	) -> Self {
		Self { service, sdk_oauth: Arc::new(sdk_oauth), well_known: Arc::new(well_known) }
	}
}

/// Which client registration an authorization URL is built for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorizeClient {
	/// Device onboarding client.
	#[default]
	Device,
	/// Web console client.
	Sdk,
}

/// Query of `GET /api/v1/authorize-url`.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizeUrlQuery {
	/// Target client registration.
	pub client: AuthorizeClient,
}

/// Authorization URL and the state it carries.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeUrlResponse {
	/// URL the user is sent to.
	pub url: String,
	/// Anti-CSRF state embedded in `url`.
	pub state: String,
}

/// Health probe answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
	/// Always `ok`.
	pub status: String,
}

/// Builds the service router.
pub fn router(state: AppState) -> Router {
	let api = Router::new()
		.route("/sign-up", post(sign_up))
		.route("/sign-in", post(sign_in))
		.route("/sign-out", post(sign_out))
		.route("/sign-off", post(sign_off))
		.route("/refresh-token", post(refresh_token))
		.route("/devices", post(get_user_devices))
		.route("/delete-devices", post(delete_devices))
		.route("/authorize-url", get(authorize_url))
		.route_layer(middleware::from_fn(require_bearer));

	Router::new()
		.nest(API_PREFIX, api)
		.route(WELL_KNOWN_PATH, get(well_known))
		.route("/health", get(health))
		.fallback(unknown_route)
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

async fn sign_up(
	State(state): State<AppState>,
	RpcJson(request): RpcJson<SignUpRequest>,
) -> Result<Json<SignUpResponse>> {
	state.service.sign_up(request).await.map(Json)
}

async fn sign_in(
	State(state): State<AppState>,
	Extension(bearer): Extension<Bearer>,
	RpcJson(request): RpcJson<SignInRequest>,
) -> Result<Json<SignInResponse>> {
	state.service.sign_in(bearer.expose(), request).await.map(Json)
}

async fn sign_out(
	State(state): State<AppState>,
	Extension(bearer): Extension<Bearer>,
	RpcJson(request): RpcJson<SignOutRequest>,
) -> Result<Json<SignOutResponse>> {
	state.service.sign_out(bearer.expose(), request).await.map(Json)
}

async fn sign_off(
	State(state): State<AppState>,
	Extension(bearer): Extension<Bearer>,
	RpcJson(request): RpcJson<SignOffRequest>,
) -> Result<Json<SignOffResponse>> {
	state.service.sign_off(bearer.expose(), request).await.map(Json)
}

async fn refresh_token(
	State(state): State<AppState>,
	RpcJson(request): RpcJson<RefreshTokenRequest>,
) -> Result<Json<RefreshTokenResponse>> {
	state.service.refresh_token(request).await.map(Json)
}

async fn get_user_devices(
	State(state): State<AppState>,
	Extension(bearer): Extension<Bearer>,
	RpcJson(request): RpcJson<GetUserDevicesRequest>,
) -> Result<Json<GetUserDevicesResponse>> {
	state.service.get_user_devices(bearer.expose(), request).await.map(Json)
}

async fn delete_devices(
	State(state): State<AppState>,
	Extension(bearer): Extension<Bearer>,
	RpcJson(request): RpcJson<DeleteDevicesRequest>,
) -> Result<Json<DeleteDevicesResponse>> {
	state.service.delete_devices(bearer.expose(), request).await.map(Json)
}

async fn authorize_url(
	State(state): State<AppState>,
	Query(query): Query<AuthorizeUrlQuery>,
) -> Result<Json<AuthorizeUrlResponse>> {
	let oauth_state = random_state();
	let url = match query.client {
		AuthorizeClient::Device => state.service.client.auth_code_url(&oauth_state)?,
		AuthorizeClient::Sdk => state.sdk_oauth.auth_code_url(&oauth_state)?,
	};

	Ok(Json(AuthorizeUrlResponse { url: url.into(), state: oauth_state }))
}

async fn well_known(State(state): State<AppState>) -> Json<WellKnownConfiguration> {
	Json(state.well_known.as_ref().clone())
}

async fn health() -> Json<HealthResponse> {
	Json(HealthResponse { status: "ok".into() })
}

async fn unknown_route(uri: Uri) -> Error {
	Error::NotFound { reason: format!("no route for {}", uri.path()) }
}
