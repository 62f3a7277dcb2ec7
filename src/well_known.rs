//! Well-known configuration document advertised to consoles and SDKs.

// self
use crate::{_prelude::*, error::ConfigError, http::ProviderHttpClient};

/// Path the document is served under.
pub const WELL_KNOWN_PATH: &str = "/.well-known/configuration";

/// Validation failures of a fetched document.
#[derive(Debug, ThisError)]
pub enum WellKnownError {
	/// A mandatory field is absent or empty.
	#[error("Field `{0}` must be set in the well-known configuration.")]
	MissingField(&'static str),
	/// The endpoint answered with a non-success status.
	#[error("Well-known endpoint answered with HTTP {0}.")]
	Status(u16),
}

/// Service configuration published for clients.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WellKnownConfiguration {
	/// OAuth authority the console signs in against.
	pub authority: String,
	/// Public address of the HTTP gateway.
	pub http_gateway_address: String,
	/// Client registration used by the web console.
	pub web_oauth_client: WebOAuthClient,
	/// Client registration devices are onboarded with.
	pub device_oauth_client: DeviceOAuthClient,
}
impl WellKnownConfiguration {
	/// Fails when a field the console cannot start without is missing.
	pub fn validate(&self) -> Result<(), WellKnownError> {
		for (field, value) in [
			("webOauthClient.clientId", &self.web_oauth_client.client_id),
			("authority", &self.authority),
			("httpGatewayAddress", &self.http_gateway_address),
		] {
			if value.trim().is_empty() {
				return Err(WellKnownError::MissingField(field));
			}
		}

		Ok(())
	}
}

/// Web console OAuth client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebOAuthClient {
	/// Client identifier.
	pub client_id: String,
	/// Requested audience.
	pub audience: String,
	/// Requested scopes.
	pub scopes: Vec<String>,
}

/// Device onboarding OAuth client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeviceOAuthClient {
	/// Client identifier.
	pub client_id: String,
	/// Requested audience.
	pub audience: String,
	/// Requested scopes.
	pub scopes: Vec<String>,
	/// Provider name devices present at sign-up.
	pub provider_name: String,
	/// Redirect URL registered with the provider.
	pub redirect_url: String,
	/// `response_mode` used for device authorization.
	pub response_mode: String,
}

/// Fetches and validates the document served under `base`.
///
/// Every failure is reported as [`ConfigError::WellKnown`] with the cause attached.
pub async fn fetch_well_known(
	http: &ProviderHttpClient,
	base: &Url,
) -> Result<WellKnownConfiguration, ConfigError> {
	let url = base.join(WELL_KNOWN_PATH).map_err(ConfigError::well_known)?;
	let response = http.inner().get(url).send().await.map_err(ConfigError::well_known)?;
	let status = response.status();

	if !status.is_success() {
		return Err(ConfigError::well_known(WellKnownError::Status(status.as_u16())));
	}

	let bytes = response.bytes().await.map_err(ConfigError::well_known)?;
	let mut de = serde_json::Deserializer::from_slice(&bytes);
	let document: WellKnownConfiguration =
		serde_path_to_error::deserialize(&mut de).map_err(ConfigError::well_known)?;

	document.validate().map_err(ConfigError::well_known)?;

	Ok(document)
}
