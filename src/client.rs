//! Consumer side of the RPC surface: a typed client, service tokens, and well-known discovery.

pub mod service_token;

pub use service_token::*;

pub use crate::well_known::fetch_well_known;

// crates.io
use reqwest::{Method, StatusCode};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{TransientError, TransportError},
	http::{ProviderHttpClient, parse_retry_after},
	rpc::{API_PREFIX, AuthorizeClient, AuthorizeUrlResponse, ErrorBody},
	service::{
		DeleteDevicesRequest, DeleteDevicesResponse, GetUserDevicesRequest,
		GetUserDevicesResponse, RefreshTokenRequest, RefreshTokenResponse, SignInRequest,
		SignInResponse, SignOffRequest, SignOffResponse, SignOutRequest, SignOutResponse,
		SignUpRequest, SignUpResponse,
	},
	well_known::WellKnownConfiguration,
};

/// Boxed future returned by [`TokenSource::token`].
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<TokenSecret>> + 'a + Send>>;

/// Supplies the bearer credential attached to outgoing calls.
pub trait TokenSource
where
	Self: Send + Sync,
{
	/// Returns the credential for the next call.
	fn token(&self) -> TokenFuture<'_>;
}
impl TokenSource for TokenSecret {
	fn token(&self) -> TokenFuture<'_> {
		Box::pin(async move { Ok(self.clone()) })
	}
}

/// Typed client for the authorization service.
#[derive(Clone)]
pub struct AuthorizationClient {
	http: ProviderHttpClient,
	base: Url,
	tokens: Arc<dyn TokenSource>,
}
impl AuthorizationClient {
	/// Creates a client for the service at `base` (scheme, host, and port).
	pub fn new(http: ProviderHttpClient, base: Url, tokens: Arc<dyn TokenSource>) -> Self {
		Self { http, base, tokens }
	}

	/// Service base URL.
	pub fn base(&self) -> &Url {
		&self.base
	}

	/// Registers a device with an authorization code.
	pub async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpResponse> {
		self.command("sign-up", request).await
	}

	/// Validates a device session.
	pub async fn sign_in(&self, request: &SignInRequest) -> Result<SignInResponse> {
		self.command("sign-in", request).await
	}

	/// Ends a device session.
	pub async fn sign_out(&self, request: &SignOutRequest) -> Result<SignOutResponse> {
		self.command("sign-out", request).await
	}

	/// Deregisters a device.
	pub async fn sign_off(&self, request: &SignOffRequest) -> Result<SignOffResponse> {
		self.command("sign-off", request).await
	}

	/// Renews a device's access token.
	pub async fn refresh_token(&self, request: &RefreshTokenRequest) -> Result<RefreshTokenResponse> {
		self.command("refresh-token", request).await
	}

	/// Lists the caller's devices.
	pub async fn get_user_devices(
		&self,
		request: &GetUserDevicesRequest,
	) -> Result<GetUserDevicesResponse> {
		self.command("devices", request).await
	}

	/// Deletes the caller's devices.
	pub async fn delete_devices(&self, request: &DeleteDevicesRequest) -> Result<DeleteDevicesResponse> {
		self.command("delete-devices", request).await
	}

	/// Asks the service for an authorization URL with a fresh state.
	pub async fn authorize_url(&self, client: AuthorizeClient) -> Result<AuthorizeUrlResponse> {
		let mut url = self.endpoint("authorize-url")?;
		let client = match client {
			AuthorizeClient::Device => "device",
			AuthorizeClient::Sdk => "sdk",
		};

		url.query_pairs_mut().append_pair("client", client);

		self.send::<(), _>(Method::GET, url, None).await
	}

	/// Fetches and validates the service's well-known document.
	pub async fn well_known(&self) -> Result<WellKnownConfiguration> {
		Ok(fetch_well_known(&self.http, &self.base).await?)
	}

	async fn command<Req, Resp>(&self, name: &str, request: &Req) -> Result<Resp>
	where
		Req: Serialize + Sync,
		Resp: for<'de> Deserialize<'de>,
	{
		let url = self.endpoint(name)?;

		self.send(Method::POST, url, Some(request)).await
	}

	fn endpoint(&self, name: &str) -> Result<Url> {
		self.base
			.join(&format!("{API_PREFIX}/{name}"))
			.map_err(|e| Error::invalid_argument(format!("service URL {}: {e}", self.base)))
	}

	async fn send<Req, Resp>(&self, method: Method, url: Url, body: Option<&Req>) -> Result<Resp>
	where
		Req: Serialize + Sync,
		Resp: for<'de> Deserialize<'de>,
	{
		let token = self.tokens.token().await?;
		let mut request = self.http.inner().request(method, url).bearer_auth(token.expose());

		if let Some(body) = body {
			request = request.json(body);
		}

		let response = request.send().await.map_err(map_send_error)?;
		let status = response.status();
		let retry_after = parse_retry_after(response.headers());
		let bytes = response.bytes().await.map_err(map_send_error)?;

		if !status.is_success() {
			tracing::debug!(status = status.as_u16(), ?retry_after, "Authorization call failed.");

			return Err(decode_error(status, &bytes));
		}

		let mut de = serde_json::Deserializer::from_slice(&bytes);

		serde_path_to_error::deserialize(&mut de).map_err(|e| {
			TransientError::Unavailable { message: format!("malformed response body: {e}") }.into()
		})
	}
}
impl Debug for AuthorizationClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizationClient").field("base", &self.base).finish_non_exhaustive()
	}
}

fn decode_error(status: StatusCode, bytes: &[u8]) -> Error {
	let body = serde_json::from_slice::<ErrorBody>(bytes).unwrap_or_else(|_| ErrorBody {
		code: String::new(),
		message: String::from_utf8_lossy(bytes).chars().take(256).collect(),
	});

	body.into_error(status)
}

fn map_send_error(err: ReqwestError) -> Error {
	if err.is_timeout() || err.is_connect() {
		return TransientError::Unavailable { message: err.to_string() }.into();
	}

	TransportError::from(err).into()
}
