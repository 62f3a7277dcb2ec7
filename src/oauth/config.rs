//! Provider client settings and authorization URL construction.

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{_prelude::*, auth::ScopeSet, error::ConfigError};

const STATE_LEN: usize = 32;

/// How the client authenticates against the token endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthStyle {
	/// Let the client pick; credentials travel in the `Authorization` header.
	#[default]
	AutoDetect,
	/// Send `client_id` and `client_secret` in the form body.
	InParams,
	/// Send credentials using HTTP Basic authentication.
	InHeader,
}
impl AuthStyle {
	/// Returns the canonical setting spelling.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::AutoDetect => "AutoDetect",
			Self::InParams => "InParams",
			Self::InHeader => "InHeader",
		}
	}
}
impl FromStr for AuthStyle {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"" | "AutoDetect" => Ok(Self::AutoDetect),
			"InParams" => Ok(Self::InParams),
			"InHeader" => Ok(Self::InHeader),
			other => Err(ConfigError::InvalidSetting {
				key: "AUTH_STYLE",
				reason: format!("`{other}` is not one of AutoDetect, InParams, InHeader"),
			}),
		}
	}
}
impl Display for AuthStyle {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Authorization and token endpoints of a provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthEndpoint {
	/// Authorization endpoint users are redirected to.
	pub auth_url: String,
	/// Token endpoint used for code, refresh, and client-credentials exchanges.
	pub token_url: String,
	/// Client authentication style for the token endpoint.
	pub auth_style: AuthStyle,
}

/// OAuth client settings for one provider registration.
///
/// Empty strings mean "not configured"; optional authorization URL parameters are only
/// emitted when set.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthClientConfig {
	/// Client identifier registered with the provider.
	pub client_id: String,
	/// Client secret; empty for public clients.
	pub client_secret: String,
	/// Scopes requested during authorization and client-credentials grants.
	pub scopes: ScopeSet,
	/// Provider endpoints.
	pub endpoint: OAuthEndpoint,
	/// Optional `audience` authorization parameter.
	pub audience: String,
	/// Redirect URI registered with the provider.
	pub redirect_url: String,
	/// Optional `access_type` authorization parameter (e.g. `offline`).
	pub access_type: String,
	/// Optional `response_type` override; `code` when empty.
	pub response_type: String,
	/// Optional `response_mode` authorization parameter.
	pub response_mode: String,
	/// Claim of the provider's ID token that names the device owner.
	pub owner_claim: String,
}
impl OAuthClientConfig {
	/// Default claim naming the device owner.
	pub const DEFAULT_OWNER_CLAIM: &'static str = "sub";

	/// Builds the authorization URL users follow to grant access, carrying `state`.
	pub fn auth_code_url(&self, state: &str) -> Result<Url, ConfigError> {
		let mut url = Url::parse(&self.endpoint.auth_url)
			.map_err(|source| ConfigError::InvalidEndpoint { endpoint: "authorization", source })?;
		let mut pairs = url.query_pairs_mut();
		let response_type =
			if self.response_type.is_empty() { "code" } else { self.response_type.as_str() };

		pairs.append_pair("response_type", response_type);
		pairs.append_pair("client_id", &self.client_id);

		if !self.redirect_url.is_empty() {
			pairs.append_pair("redirect_uri", &self.redirect_url);
		}
		if !self.scopes.is_empty() {
			pairs.append_pair("scope", &self.scopes.normalized());
		}

		pairs.append_pair("state", state);

		for (key, value) in [
			("access_type", &self.access_type),
			("audience", &self.audience),
			("response_mode", &self.response_mode),
		] {
			if !value.is_empty() {
				pairs.append_pair(key, value);
			}
		}

		drop(pairs);

		Ok(url)
	}
}
impl Default for OAuthClientConfig {
	fn default() -> Self {
		Self {
			client_id: String::new(),
			client_secret: String::new(),
			scopes: ScopeSet::default(),
			endpoint: OAuthEndpoint::default(),
			audience: String::new(),
			redirect_url: String::new(),
			access_type: String::new(),
			response_type: String::new(),
			response_mode: String::new(),
			owner_claim: Self::DEFAULT_OWNER_CLAIM.into(),
		}
	}
}
impl Debug for OAuthClientConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthClientConfig")
			.field("client_id", &self.client_id)
			.field("client_secret", &(!self.client_secret.is_empty()).then_some("<redacted>"))
			.field("scopes", &self.scopes)
			.field("endpoint", &self.endpoint)
			.field("audience", &self.audience)
			.field("redirect_url", &self.redirect_url)
			.field("access_type", &self.access_type)
			.field("response_type", &self.response_type)
			.field("response_mode", &self.response_mode)
			.field("owner_claim", &self.owner_claim)
			.finish()
	}
}

/// Generates a fresh anti-CSRF `state` value.
pub fn random_state() -> String {
	rand::rng().sample_iter(Alphanumeric).take(STATE_LEN).map(char::from).collect()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn config() -> OAuthClientConfig {
		OAuthClientConfig {
			client_id: "client".into(),
			scopes: ScopeSet::new(["openid", "offline_access"]).expect("Scopes should be valid."),
			endpoint: OAuthEndpoint {
				auth_url: "https://idp.example.com/authorize?tenant=hub".into(),
				token_url: "https://idp.example.com/token".into(),
				auth_style: AuthStyle::AutoDetect,
			},
			redirect_url: "https://hub.example.com/callback".into(),
			..OAuthClientConfig::default()
		}
	}

	fn query(url: &Url) -> Vec<(String, String)> {
		url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect()
	}

	#[test]
	fn auth_code_url_omits_unset_parameters() {
		let url = config().auth_code_url("state-1").expect("URL should build.");
		let pairs = query(&url);
		let keys = pairs.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>();

		assert_eq!(
			keys,
			vec!["tenant", "response_type", "client_id", "redirect_uri", "scope", "state"]
		);
		assert!(pairs.contains(&("response_type".into(), "code".into())));
		assert!(pairs.contains(&("scope".into(), "openid offline_access".into())));
	}

	#[test]
	fn auth_code_url_includes_configured_parameters() {
		let cfg = OAuthClientConfig {
			audience: "https://api.hub.example.com".into(),
			access_type: "offline".into(),
			response_type: "code id_token".into(),
			response_mode: "form_post".into(),
			..config()
		};
		let pairs = query(&cfg.auth_code_url("state-2").expect("URL should build."));

		assert!(pairs.contains(&("audience".into(), "https://api.hub.example.com".into())));
		assert!(pairs.contains(&("access_type".into(), "offline".into())));
		assert!(pairs.contains(&("response_mode".into(), "form_post".into())));
		assert_eq!(pairs.iter().filter(|(k, _)| k == "response_type").count(), 1);
		assert!(pairs.contains(&("response_type".into(), "code id_token".into())));
	}

	#[test]
	fn auth_code_url_rejects_invalid_endpoint() {
		let cfg = OAuthClientConfig {
			endpoint: OAuthEndpoint { auth_url: "not a url".into(), ..OAuthEndpoint::default() },
			..config()
		};

		assert!(matches!(
			cfg.auth_code_url("state"),
			Err(ConfigError::InvalidEndpoint { endpoint: "authorization", .. })
		));
	}

	#[test]
	fn auth_style_parses_setting_values() {
		assert_eq!("InParams".parse::<AuthStyle>().ok(), Some(AuthStyle::InParams));
		assert_eq!("".parse::<AuthStyle>().ok(), Some(AuthStyle::AutoDetect));
		assert!("Basic".parse::<AuthStyle>().is_err());
	}

	#[test]
	fn random_state_is_alphanumeric() {
		let state = random_state();

		assert_eq!(state.len(), STATE_LEN);
		assert!(state.chars().all(|c| c.is_ascii_alphanumeric()));
		assert_ne!(state, random_state());
	}

	#[test]
	fn debug_redacts_client_secret() {
		let cfg = OAuthClientConfig { client_secret: "hunter2".into(), ..config() };

		assert!(!format!("{cfg:?}").contains("hunter2"));
	}
}
