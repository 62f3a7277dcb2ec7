//! OAuth 2.0 client for the device provider.
//!
//! [`OAuthClient`] wraps an `oauth2` client configured from [`OAuthClientConfig`] and runs
//! the authorization-code, refresh-token, and client-credentials grants over an
//! instrumented reqwest transport. Failures are classified by a [`ProviderStrategy`].

pub mod claims;
pub mod config;

pub use config::*;

// crates.io
use oauth2::{
	AuthType, AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret, EndpointNotSet,
	EndpointSet, ExtraTokenFields, HttpClientError, RedirectUrl, RefreshToken, RequestTokenError,
	Scope, StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRequestTokenError, BasicRevocationErrorResponse,
		BasicTokenIntrospectionResponse, BasicTokenType,
	},
};
// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, UserId},
	error::{ConfigError, TransientError, TransportError},
	http::{ProviderHttpClient, ResponseMetadata, ResponseMetadataSlot},
	provider::{
		DefaultProviderStrategy, GrantType, ProviderErrorContext, ProviderErrorKind, ProviderStrategy,
	},
};

/// Default timeout applied to provider calls.
pub const DEFAULT_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Extra token response fields carrying the OpenID Connect `id_token`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IdTokenFields {
	/// Compact JWT identifying the user, when the provider speaks OpenID Connect.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id_token: Option<String>,
}
impl ExtraTokenFields for IdTokenFields {}

/// Token response shape accepted from the provider.
pub type DeviceTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;

type ConfiguredClient = Client<
	BasicErrorResponse,
	DeviceTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;

/// Tokens returned by a provider grant.
#[derive(Clone, Debug)]
pub struct ProviderTokens {
	/// Opaque access token handed to the device.
	pub access_token: TokenSecret,
	/// Refresh token, when the provider issued or rotated one.
	pub refresh_token: Option<TokenSecret>,
	/// Lifetime of the access token; `None` means it never expires.
	pub expires_in: Option<Duration>,
	/// OpenID Connect ID token, when present.
	pub id_token: Option<String>,
}

/// Provider client bound to one [`OAuthClientConfig`].
#[derive(Clone)]
pub struct OAuthClient {
	config: Arc<OAuthClientConfig>,
	oauth_client: ConfiguredClient,
	http_client: ProviderHttpClient,
	strategy: Arc<dyn ProviderStrategy>,
}
impl OAuthClient {
	/// Builds a client with the default transport and [`DefaultProviderStrategy`].
	pub fn new(config: OAuthClientConfig) -> Result<Self> {
		Self::with_http_client(config, ProviderHttpClient::new(DEFAULT_REQUEST_TIMEOUT)?)
	}

	/// Builds a client that sends requests through `http_client`.
	pub fn with_http_client(config: OAuthClientConfig, http_client: ProviderHttpClient) -> Result<Self> {
		if config.client_id.is_empty() {
			return Err(ConfigError::InvalidSetting {
				key: "OAUTH_CLIENT_ID",
				reason: "client id is required".into(),
			}
			.into());
		}

		let auth_url = AuthUrl::new(config.endpoint.auth_url.clone())
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "authorization", source })?;
		let token_url = TokenUrl::new(config.endpoint.token_url.clone())
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "token", source })?;
		let mut oauth_client: ConfiguredClient = Client::new(ClientId::new(config.client_id.clone()))
			.set_auth_uri(auth_url)
			.set_token_uri(token_url);

		if !config.client_secret.is_empty() {
			oauth_client =
				oauth_client.set_client_secret(ClientSecret::new(config.client_secret.clone()));
		}
		if !config.redirect_url.is_empty() {
			let redirect_url = RedirectUrl::new(config.redirect_url.clone())
				.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "redirect", source })?;

			oauth_client = oauth_client.set_redirect_uri(redirect_url);
		}
		if matches!(config.endpoint.auth_style, AuthStyle::InParams) {
			oauth_client = oauth_client.set_auth_type(AuthType::RequestBody);
		}

		Ok(Self {
			config: Arc::new(config),
			oauth_client,
			http_client,
			strategy: Arc::new(DefaultProviderStrategy),
		})
	}

	/// Replaces the error classification strategy.
	pub fn with_strategy(mut self, strategy: Arc<dyn ProviderStrategy>) -> Self {
		self.strategy = strategy;

		self
	}

	/// Settings the client was built from.
	pub fn config(&self) -> &OAuthClientConfig {
		&self.config
	}

	/// Builds the authorization URL carrying `state`.
	pub fn auth_code_url(&self, state: &str) -> Result<Url> {
		Ok(self.config.auth_code_url(state)?)
	}

	/// Exchanges an authorization code for provider tokens.
	pub async fn exchange_code(&self, code: &str) -> Result<ProviderTokens> {
		let meta = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(meta.clone());
		let response = self
			.oauth_client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.request_async(&handle)
			.await
			.map_err(|err| {
				map_request_error(self.strategy.as_ref(), GrantType::AuthorizationCode, meta.take(), err)
			})?;

		map_token_response(response)
	}

	/// Exchanges a refresh token for a new access token.
	pub async fn refresh(&self, refresh_token: &str) -> Result<ProviderTokens> {
		let meta = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(meta.clone());
		let refresh_secret = RefreshToken::new(refresh_token.to_owned());
		let response = self
			.oauth_client
			.exchange_refresh_token(&refresh_secret)
			.request_async(&handle)
			.await
			.map_err(|err| {
				map_request_error(self.strategy.as_ref(), GrantType::RefreshToken, meta.take(), err)
			})?;

		map_token_response(response)
	}

	/// Requests an app-only token with the configured scopes.
	pub async fn client_credentials(&self) -> Result<ProviderTokens> {
		let meta = ResponseMetadataSlot::default();
		let handle = self.http_client.with_metadata(meta.clone());
		let mut request = self.oauth_client.exchange_client_credentials();

		for scope in self.config.scopes.iter() {
			request = request.add_scope(Scope::new(scope.to_owned()));
		}

		let response = request.request_async(&handle).await.map_err(|err| {
			map_request_error(self.strategy.as_ref(), GrantType::ClientCredentials, meta.take(), err)
		})?;

		map_token_response(response)
	}

	/// Derives the device owner from the configured owner claim.
	///
	/// The `id_token` is preferred; JWT-shaped access tokens are consulted when the provider
	/// returned none.
	pub fn owner_from(&self, tokens: &ProviderTokens) -> Result<UserId> {
		let token = match tokens.id_token.as_deref() {
			Some(id_token) => id_token,
			None if claims::looks_like_jwt(tokens.access_token.expose()) =>
				tokens.access_token.expose(),
			None =>
				return Err(Error::InvalidGrant {
					reason: "token response carries no ID token".into(),
				}),
		};

		claims::owner_claim(token, &self.config.owner_claim)
	}
}
impl Debug for OAuthClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthClient").field("config", &self.config).finish_non_exhaustive()
	}
}

fn map_token_response(response: DeviceTokenResponse) -> Result<ProviderTokens> {
	let expires_in = match response.expires_in() {
		Some(lifetime) => {
			let secs =
				i64::try_from(lifetime.as_secs()).map_err(|_| ConfigError::ExpiresInOutOfRange)?;

			if secs <= 0 {
				return Err(ConfigError::NonPositiveExpiresIn.into());
			}

			let lifetime = Duration::seconds(secs);

			OffsetDateTime::now_utc()
				.checked_add(lifetime)
				.ok_or(ConfigError::ExpiresInOutOfRange)?;

			Some(lifetime)
		},
		None => None,
	};

	Ok(ProviderTokens {
		access_token: TokenSecret::new(response.access_token().secret().to_owned()),
		refresh_token: response
			.refresh_token()
			.map(|token| TokenSecret::new(token.secret().to_owned()))
			.filter(|token| !token.is_empty()),
		expires_in,
		id_token: response.extra_fields().id_token.clone(),
	})
}

fn map_request_error(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<ReqwestError>>,
) -> Error {
	let meta_ref = meta.as_ref();
	let error = match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(strategy, grant, response, meta_ref),
		RequestTokenError::Request(error) => map_transport_error(meta_ref, error),
		RequestTokenError::Parse(error, body) =>
			map_parse_error(strategy, grant, meta_ref, error, &body),
		RequestTokenError::Other(message) => TransientError::TokenEndpoint {
			message,
			status: meta_status(meta_ref),
			retry_after: meta_retry_after(meta_ref),
		}
		.into(),
	};

	tracing::debug!(grant = %grant, kind = error.kind(), "Token request failed.");

	error
}

fn map_server_response_error(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let mut ctx =
		ProviderErrorContext::new(grant).with_oauth_error(response.error().as_ref().to_string());

	if let Some(description) = response.error_description() {
		ctx = ctx.with_error_description(description.clone());
	}
	if let Some(status) = meta_status(meta) {
		ctx = ctx.with_http_status(status);
	}

	let message = match response.error_description() {
		Some(description) => format!("token endpoint returned an OAuth error: {description}"),
		None => format!("token endpoint returned an OAuth error: {}", response.error().as_ref()),
	};

	strategy.classify_token_error(&ctx).into_error(
		message,
		meta_status(meta),
		meta_retry_after(meta),
	)
}

// Some providers (GitHub) report failures with a success status and an error body.
fn map_parse_error(
	strategy: &dyn ProviderStrategy,
	grant: GrantType,
	meta: Option<&ResponseMetadata>,
	source: serde_path_to_error::Error<serde_json::Error>,
	body: &[u8],
) -> Error {
	let preview = String::from_utf8_lossy(body).into_owned();
	let mut ctx = ProviderErrorContext::new(grant).with_body_preview(preview.clone());

	if let Some(status) = meta_status(meta) {
		ctx = ctx.with_http_status(status);
	}

	match strategy.classify_token_error(&ctx) {
		ProviderErrorKind::Transient =>
			TransientError::TokenResponseParse { source, status: meta_status(meta) }.into(),
		kind => kind.into_error(
			format!("token endpoint returned an error body: {}", ctx.body_preview.unwrap_or(preview)),
			meta_status(meta),
			meta_retry_after(meta),
		),
	}
}

fn map_transport_error(meta: Option<&ResponseMetadata>, err: HttpClientError<ReqwestError>) -> Error {
	match err {
		HttpClientError::Reqwest(inner) => map_reqwest_error(meta, *inner),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransientError::TokenEndpoint {
			message: format!("HTTP client error occurred while calling the token endpoint: {message}"),
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
		_ => TransientError::TokenEndpoint {
			message: "HTTP client error occurred while calling the token endpoint".into(),
			status: meta_status(meta),
			retry_after: meta_retry_after(meta),
		}
		.into(),
	}
}

fn map_reqwest_error(meta: Option<&ResponseMetadata>, err: ReqwestError) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::TokenEndpoint {
			message: "request timed out while calling the token endpoint".into(),
			status: meta_status(meta).or_else(|| err.status().map(|code| code.as_u16())),
			retry_after: meta_retry_after(meta),
		}
		.into();
	}

	TransportError::from(err).into()
}

fn meta_status(meta: Option<&ResponseMetadata>) -> Option<u16> {
	meta.and_then(|value| value.status)
}

fn meta_retry_after(meta: Option<&ResponseMetadata>) -> Option<Duration> {
	meta.and_then(|value| value.retry_after)
}
