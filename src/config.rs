//! Environment-driven service settings.
//!
//! Every key is read from the process environment (`ADDRESS`, `DEVICE_OAUTH_CLIENT_ID`, ...);
//! `DEVICE_OAUTH_SCOPES`, `SDK_OAUTH_SCOPES`, and `LISTEN_ACME_DOMAINS` are comma lists.
//! [`Settings::validate`] runs before the service starts serving.

// std
use std::{net::SocketAddr, path::PathBuf};
// crates.io
use config::{Config, Environment, Map};
use serde::Deserializer;
// self
use crate::{
	_prelude::*,
	auth::{ProviderName, ScopeSet},
	error::ConfigError,
	oauth::{AuthStyle, OAuthClientConfig, OAuthEndpoint},
	tls::{AcmeConfig, FileTlsConfig, ListenConfig},
	well_known::{DeviceOAuthClient, WebOAuthClient, WellKnownConfiguration},
};

/// Raw settings as read from the environment.
#[derive(Clone, Deserialize)]
pub struct Settings {
	/// Listen address.
	pub address: String,
	/// Provider name devices sign up through.
	pub device_provider: String,
	/// Device OAuth client id.
	pub device_oauth_client_id: String,
	/// Device OAuth client secret.
	pub device_oauth_client_secret: String,
	/// Device OAuth redirect URL.
	pub device_oauth_redirect_url: String,
	/// Device provider authorization endpoint.
	pub device_oauth_endpoint_auth_url: String,
	/// Device provider token endpoint.
	pub device_oauth_endpoint_token_url: String,
	/// Device provider client authentication style.
	pub device_oauth_endpoint_auth_style: String,
	/// Device OAuth scopes.
	#[serde(deserialize_with = "comma_list")]
	pub device_oauth_scopes: Vec<String>,
	/// Device OAuth `response_mode`.
	pub device_oauth_response_mode: String,
	/// Device OAuth `audience`.
	pub device_oauth_audience: String,
	/// Device OAuth `access_type`.
	pub device_oauth_access_type: String,
	/// Device OAuth `response_type` override.
	pub device_oauth_response_type: String,
	/// ID token claim naming the device owner.
	pub device_oauth_owner_claim: String,
	/// SDK (web console) OAuth client id.
	pub sdk_oauth_client_id: String,
	/// SDK OAuth redirect URL.
	pub sdk_oauth_redirect_url: String,
	/// SDK provider authorization endpoint.
	pub sdk_oauth_endpoint_auth_url: String,
	/// SDK OAuth `audience`.
	pub sdk_oauth_audience: String,
	/// SDK OAuth scopes.
	#[serde(deserialize_with = "comma_list")]
	pub sdk_oauth_scopes: Vec<String>,
	/// SDK OAuth `response_mode`.
	pub sdk_oauth_response_mode: String,
	/// `acme`, `file`, or `none`.
	pub listen_type: String,
	/// ACME client CA pool.
	pub listen_acme_ca_pool: String,
	/// ACME directory URL.
	pub listen_acme_directory_url: String,
	/// ACME domains.
	#[serde(deserialize_with = "comma_list")]
	pub listen_acme_domains: Vec<String>,
	/// ACME registration email.
	pub listen_acme_registration_email: String,
	/// ACME renewal tick, in seconds.
	pub listen_acme_tick_frequency: u64,
	/// Trust the system CA pool for ACME listeners.
	pub listen_acme_use_system_certification_pool: bool,
	/// File listener client CA pool.
	pub listen_file_ca_pool: String,
	/// Directory holding the listener certificate and key.
	pub listen_file_cert_dir_path: String,
	/// Certificate file name.
	pub listen_file_cert_name: String,
	/// Key file name.
	pub listen_file_cert_key_name: String,
	/// Trust the system CA pool for file listeners.
	pub listen_file_use_system_certification_pool: bool,
	/// Raise the default log level to debug.
	pub log_enable_debug: bool,
	/// Store backend URI (`memory://` or `file:///dir`).
	pub store_uri: String,
	/// Store database name.
	pub store_database: String,
	/// OAuth authority advertised in the well-known document.
	pub authority: String,
	/// HTTP gateway address advertised in the well-known document.
	pub http_gateway_address: String,
	/// Timeout for provider calls, in seconds.
	pub request_timeout: u64,
}
impl Settings {
	/// Loads settings from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::load(Environment::default())
	}

	/// Loads settings from an explicit key/value map using the environment parsing rules.
	pub fn from_map(vars: Map<String, String>) -> Result<Self, ConfigError> {
		Self::load(Environment::default().source(Some(vars)))
	}

	fn load(source: Environment) -> Result<Self, ConfigError> {
		let settings = Config::builder()
			.set_default("address", "0.0.0.0:9100")?
			.set_default("device_provider", "github")?
			.set_default("device_oauth_client_id", "")?
			.set_default("device_oauth_client_secret", "")?
			.set_default("device_oauth_redirect_url", "")?
			.set_default("device_oauth_endpoint_auth_url", "")?
			.set_default("device_oauth_endpoint_token_url", "")?
			.set_default("device_oauth_endpoint_auth_style", AuthStyle::AutoDetect.as_str())?
			.set_default("device_oauth_scopes", Vec::<String>::new())?
			.set_default("device_oauth_response_mode", "query")?
			.set_default("device_oauth_audience", "")?
			.set_default("device_oauth_access_type", "")?
			.set_default("device_oauth_response_type", "")?
			.set_default("device_oauth_owner_claim", OAuthClientConfig::DEFAULT_OWNER_CLAIM)?
			.set_default("sdk_oauth_client_id", "")?
			.set_default("sdk_oauth_redirect_url", "")?
			.set_default("sdk_oauth_endpoint_auth_url", "")?
			.set_default("sdk_oauth_audience", "")?
			.set_default("sdk_oauth_scopes", Vec::<String>::new())?
			.set_default("sdk_oauth_response_mode", "query")?
			.set_default("listen_type", "acme")?
			.set_default("listen_acme_ca_pool", "")?
			.set_default("listen_acme_directory_url", "")?
			.set_default("listen_acme_domains", Vec::<String>::new())?
			.set_default("listen_acme_registration_email", "")?
			.set_default("listen_acme_tick_frequency", 15)?
			.set_default("listen_acme_use_system_certification_pool", false)?
			.set_default("listen_file_ca_pool", "")?
			.set_default("listen_file_cert_dir_path", "")?
			.set_default("listen_file_cert_name", "")?
			.set_default("listen_file_cert_key_name", "")?
			.set_default("listen_file_use_system_certification_pool", false)?
			.set_default("log_enable_debug", false)?
			.set_default("store_uri", "memory://")?
			.set_default("store_database", "authorization")?
			.set_default("authority", "")?
			.set_default("http_gateway_address", "")?
			.set_default("request_timeout", 10)?
			.add_source(source)
			.build()?;

		Ok(settings.try_deserialize()?)
	}

	/// Runs every check the service needs before it starts serving.
	pub fn validate(&self) -> Result<(), ConfigError> {
		self.listen_address()?;
		self.listen_config()?;
		self.provider_name()?;
		self.device_oauth()?;
		self.sdk_oauth()?;

		if self.request_timeout == 0 {
			return Err(invalid("REQUEST_TIMEOUT", "must be positive"));
		}

		Ok(())
	}

	/// Parsed listen address.
	pub fn listen_address(&self) -> Result<SocketAddr, ConfigError> {
		self.address.parse().map_err(|e| invalid("ADDRESS", format!("`{}`: {e}", self.address)))
	}

	/// Provider name devices must present at sign-up.
	pub fn provider_name(&self) -> Result<ProviderName, ConfigError> {
		ProviderName::new(&self.device_provider).map_err(|e| invalid("DEVICE_PROVIDER", e.to_string()))
	}

	/// Listener TLS mode.
	pub fn listen_config(&self) -> Result<ListenConfig, ConfigError> {
		match self.listen_type.as_str() {
			"acme" => Ok(ListenConfig::Acme(AcmeConfig {
				ca_pool: self.listen_acme_ca_pool.clone(),
				directory_url: self.listen_acme_directory_url.clone(),
				domains: non_empty(&self.listen_acme_domains),
				registration_email: self.listen_acme_registration_email.clone(),
				tick_frequency: std::time::Duration::from_secs(self.listen_acme_tick_frequency),
				use_system_certification_pool: self.listen_acme_use_system_certification_pool,
			})),
			"file" => {
				if self.listen_file_cert_name.is_empty() || self.listen_file_cert_key_name.is_empty() {
					return Err(invalid(
						"LISTEN_FILE_CERT_NAME",
						"certificate and key names are required in file mode",
					));
				}

				Ok(ListenConfig::File(FileTlsConfig {
					ca_pool: self.listen_file_ca_pool.clone(),
					cert_dir_path: PathBuf::from(&self.listen_file_cert_dir_path),
					cert_name: self.listen_file_cert_name.clone(),
					cert_key_name: self.listen_file_cert_key_name.clone(),
					use_system_certification_pool: self.listen_file_use_system_certification_pool,
				}))
			},
			"none" => Ok(ListenConfig::None),
			other => Err(invalid(
				"LISTEN_TYPE",
				format!("`{other}` is not one of acme, file, none"),
			)),
		}
	}

	/// Device OAuth client settings.
	pub fn device_oauth(&self) -> Result<OAuthClientConfig, ConfigError> {
		if self.device_oauth_client_id.is_empty() {
			return Err(invalid("DEVICE_OAUTH_CLIENT_ID", "is required"));
		}
		if self.device_oauth_endpoint_auth_url.is_empty() {
			return Err(invalid("DEVICE_OAUTH_ENDPOINT_AUTH_URL", "is required"));
		}
		if self.device_oauth_endpoint_token_url.is_empty() {
			return Err(invalid("DEVICE_OAUTH_ENDPOINT_TOKEN_URL", "is required"));
		}

		let auth_style = self.device_oauth_endpoint_auth_style.parse::<AuthStyle>().map_err(|_| {
			invalid(
				"DEVICE_OAUTH_ENDPOINT_AUTH_STYLE",
				format!("`{}` is not one of AutoDetect, InParams, InHeader", self.device_oauth_endpoint_auth_style),
			)
		})?;
		let owner_claim = if self.device_oauth_owner_claim.is_empty() {
			OAuthClientConfig::DEFAULT_OWNER_CLAIM.to_owned()
		} else {
			self.device_oauth_owner_claim.clone()
		};

		Ok(OAuthClientConfig {
			client_id: self.device_oauth_client_id.clone(),
			client_secret: self.device_oauth_client_secret.clone(),
			scopes: ScopeSet::new(non_empty(&self.device_oauth_scopes))?,
			endpoint: OAuthEndpoint {
				auth_url: self.device_oauth_endpoint_auth_url.clone(),
				token_url: self.device_oauth_endpoint_token_url.clone(),
				auth_style,
			},
			audience: self.device_oauth_audience.clone(),
			redirect_url: self.device_oauth_redirect_url.clone(),
			access_type: self.device_oauth_access_type.clone(),
			response_type: self.device_oauth_response_type.clone(),
			response_mode: self.device_oauth_response_mode.clone(),
			owner_claim,
		})
	}

	/// SDK (web console) OAuth client settings; only the authorization URL is ever built.
	pub fn sdk_oauth(&self) -> Result<OAuthClientConfig, ConfigError> {
		Ok(OAuthClientConfig {
			client_id: self.sdk_oauth_client_id.clone(),
			scopes: ScopeSet::new(non_empty(&self.sdk_oauth_scopes))?,
			endpoint: OAuthEndpoint {
				auth_url: self.sdk_oauth_endpoint_auth_url.clone(),
				..OAuthEndpoint::default()
			},
			audience: self.sdk_oauth_audience.clone(),
			redirect_url: self.sdk_oauth_redirect_url.clone(),
			response_mode: self.sdk_oauth_response_mode.clone(),
			..OAuthClientConfig::default()
		})
	}

	/// Provider call timeout.
	pub fn request_timeout(&self) -> std::time::Duration {
		std::time::Duration::from_secs(self.request_timeout)
	}

	/// Well-known document advertised to clients.
	pub fn well_known(&self) -> Result<WellKnownConfiguration, ConfigError> {
		let device = self.device_oauth()?;
		let sdk = self.sdk_oauth()?;

		Ok(WellKnownConfiguration {
			authority: self.authority.clone(),
			http_gateway_address: self.http_gateway_address.clone(),
			web_oauth_client: WebOAuthClient {
				client_id: sdk.client_id,
				audience: sdk.audience,
				scopes: sdk.scopes.as_slice().to_vec(),
			},
			device_oauth_client: DeviceOAuthClient {
				client_id: device.client_id,
				audience: device.audience,
				scopes: device.scopes.as_slice().to_vec(),
				provider_name: self.device_provider.clone(),
				redirect_url: device.redirect_url,
				response_mode: device.response_mode,
			},
		})
	}
}
impl Debug for Settings {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Settings")
			.field("address", &self.address)
			.field("device_provider", &self.device_provider)
			.field("device_oauth_client_id", &self.device_oauth_client_id)
			.field(
				"device_oauth_client_secret",
				&(!self.device_oauth_client_secret.is_empty()).then_some("<redacted>"),
			)
			.field("device_oauth_endpoint_auth_url", &self.device_oauth_endpoint_auth_url)
			.field("device_oauth_endpoint_token_url", &self.device_oauth_endpoint_token_url)
			.field("device_oauth_scopes", &self.device_oauth_scopes)
			.field("sdk_oauth_client_id", &self.sdk_oauth_client_id)
			.field("listen_type", &self.listen_type)
			.field("log_enable_debug", &self.log_enable_debug)
			.field("store_uri", &self.store_uri)
			.field("store_database", &self.store_database)
			.field("authority", &self.authority)
			.field("http_gateway_address", &self.http_gateway_address)
			.field("request_timeout", &self.request_timeout)
			.finish_non_exhaustive()
	}
}

// Environment values stay strings so numeric-looking credentials survive; defaults arrive as
// sequences.
fn comma_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Raw {
		Joined(String),
		List(Vec<String>),
	}

	Ok(match Raw::deserialize(deserializer)? {
		Raw::Joined(joined) => joined.split(',').map(str::to_owned).collect(),
		Raw::List(list) => list,
	})
}

fn non_empty(values: &[String]) -> Vec<String> {
	values.iter().map(|value| value.trim()).filter(|value| !value.is_empty()).map(str::to_owned).collect()
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
	ConfigError::InvalidSetting { key, reason: reason.into() }
}
