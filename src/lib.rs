//! Device authorization service for IoT hubs: OAuth 2.0 sign-up, device sessions, token
//! refresh, and device ownership behind one bearer-authenticated RPC surface.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod provider;
pub mod rpc;
pub mod service;
pub mod store;
pub mod tls;
pub mod well_known;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{DeviceId, DeviceRecord, ProviderName, ScopeSet, UserId},
		oauth::{AuthStyle, OAuthClient, OAuthClientConfig, OAuthEndpoint},
		service::AuthorizationService,
		store::{DeviceStore, MemoryStore},
	};

	/// Provider name used by every test fixture.
	pub const TEST_PROVIDER: &str = "test-provider";

	/// Builds a device OAuth client configuration pointing at a mock provider base URL.
	pub fn test_oauth_config(base: &str) -> OAuthClientConfig {
		OAuthClientConfig {
			client_id: "device-client".into(),
			client_secret: "device-secret".into(),
			scopes: ScopeSet::new(["openid", "offline_access"])
				.expect("Test scopes should be valid."),
			endpoint: OAuthEndpoint {
				auth_url: format!("{base}/authorize"),
				token_url: format!("{base}/token"),
				auth_style: AuthStyle::InParams,
			},
			redirect_url: "https://hub.example.com/callback".into(),
			response_mode: "query".into(),
			..OAuthClientConfig::default()
		}
	}

	/// Builds an unsigned JWT-shaped `id_token` carrying the provided `sub` claim.
	pub fn test_id_token(sub: &str) -> String {
		use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
		let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"{sub}"}}"#));

		format!("{header}.{payload}.")
	}

	/// Builds a token endpoint JSON body the way a provider answers a code exchange.
	pub fn test_token_body(access: &str, refresh: Option<&str>, sub: &str) -> String {
		let mut body = serde_json::json!({
			"access_token": access,
			"token_type": "bearer",
			"expires_in": 3600,
			"id_token": test_id_token(sub),
		});

		if let Some(refresh) = refresh {
			body["refresh_token"] = serde_json::Value::from(refresh);
		}

		body.to_string()
	}

	/// Constructs an [`AuthorizationService`] backed by an in-memory store and a provider
	/// client aimed at `base`.
	pub fn build_test_service(base: &str) -> (AuthorizationService, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn DeviceStore> = store_backend.clone();
		let client = OAuthClient::new(test_oauth_config(base))
			.expect("Test OAuth client should build successfully.");
		let provider = ProviderName::new(TEST_PROVIDER).expect("Test provider should be valid.");
		let service = AuthorizationService::new(store, client, provider);

		(service, store_backend)
	}

	/// Builds an active device record that expires an hour from now.
	pub fn test_record(device: &str, owner: &str, access: &str, refresh: &str) -> DeviceRecord {
		DeviceRecord::builder(
			DeviceId::new(device).expect("Device fixture should be valid."),
			UserId::new(owner).expect("User fixture should be valid."),
			ProviderName::new(TEST_PROVIDER).expect("Provider fixture should be valid."),
		)
		.access_token(access)
		.refresh_token(refresh)
		.issued_at(OffsetDateTime::now_utc() - Duration::minutes(1))
		.expires_in(Duration::hours(1))
		.build()
		.expect("Device record fixture should build successfully.")
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, BTreeSet, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tower as _};
