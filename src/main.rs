//! Authorization service binary.

// std
use std::error::Error as StdError;
// crates.io
use tokio::net::TcpListener;
// self
use hub_authorization::{
	config::Settings,
	http::ProviderHttpClient,
	oauth::OAuthClient,
	obs,
	rpc::{self, AppState},
	service::AuthorizationService,
	store,
	tls::{self, TlsListener},
};

type BoxError = Box<dyn StdError + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
	let settings = Settings::from_env()?;

	obs::init_logging(settings.log_enable_debug);
	settings.validate()?;

	tracing::info!(?settings, "Starting authorization service.");

	let server_tls = tls::server_config(&settings.listen_config()?)?;
	let store = store::open(&settings.store_uri, &settings.store_database)?;
	let http = ProviderHttpClient::new(settings.request_timeout())?;
	let client = OAuthClient::with_http_client(settings.device_oauth()?, http)?;
	let service = AuthorizationService::new(store, client, settings.provider_name()?);
	let well_known = settings.well_known()?;

	if let Err(e) = well_known.validate() {
		tracing::warn!(error = %e, "Well-known configuration is incomplete; consoles will refuse it.");
	}

	let app = rpc::router(AppState::new(service, settings.sdk_oauth()?, well_known));
	let tcp = TcpListener::bind(settings.listen_address()?).await?;

	tracing::info!(address = %tcp.local_addr()?, tls = server_tls.is_some(), "Listening.");

	match server_tls {
		Some(server_tls) =>
			axum::serve(TlsListener::new(tcp, server_tls), app)
				.with_graceful_shutdown(shutdown_signal())
				.await?,
		None => axum::serve(tcp, app).with_graceful_shutdown(shutdown_signal()).await?,
	}

	tracing::info!("Authorization service stopped.");

	Ok(())
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %e, "Failed to listen for the shutdown signal.");

		std::future::pending::<()>().await;
	}

	tracing::info!("Shutdown signal received.");
}
