//! Listener TLS material.
//!
//! - `file`: PEM certificate + key loaded into a rustls [`ServerConfig`]; a CA pool turns on
//!   mutual TLS.
//! - `acme`: settings are validated, then startup fails because automatic issuance is not
//!   built in.
//! - `none`: plaintext, for use behind a TLS-terminating proxy.

// std
use std::{
	fs::File,
	io::{self, BufReader},
	net::SocketAddr,
	path::{Path, PathBuf},
};
// crates.io
use axum::serve::Listener;
use rustls::{
	RootCertStore, ServerConfig,
	crypto::{CryptoProvider, ring},
	pki_types::{CertificateDer, PrivateKeyDer},
	server::WebPkiClientVerifier,
};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::{TlsAcceptor, server::TlsStream};
// self
use crate::_prelude::*;

const HANDSHAKE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Errors raised while preparing listener TLS.
#[derive(Debug, ThisError)]
pub enum TlsError {
	/// A PEM file could not be read.
	#[error("Failed to read {path}.")]
	Io {
		/// File that failed.
		path: PathBuf,
		/// Underlying IO failure.
		#[source]
		source: io::Error,
	},
	/// The certificate file holds no certificate.
	#[error("No certificate found in {path}.")]
	NoCertificates {
		/// File that was searched.
		path: PathBuf,
	},
	/// The key file holds no private key.
	#[error("No private key found in {path}.")]
	NoPrivateKey {
		/// File that was searched.
		path: PathBuf,
	},
	/// rustls rejected the material.
	#[error(transparent)]
	Rustls(#[from] rustls::Error),
	/// The client certificate verifier could not be built.
	#[error("Client certificate verifier could not be built: {reason}.")]
	ClientVerifier {
		/// Verifier builder failure.
		reason: String,
	},
	/// ACME settings are incomplete or malformed.
	#[error("ACME settings are invalid: {reason}.")]
	InvalidAcme {
		/// Which setting failed.
		reason: String,
	},
	/// ACME issuance was requested.
	#[error("ACME certificate issuance from {directory_url} is not available; use LISTEN_TYPE=file or none.")]
	AcmeUnavailable {
		/// Configured ACME directory.
		directory_url: String,
	},
}

/// How the service listener is secured.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListenConfig {
	/// Certificates issued through ACME.
	Acme(AcmeConfig),
	/// Certificates read from disk.
	File(FileTlsConfig),
	/// Plaintext.
	None,
}

/// ACME listener settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcmeConfig {
	/// CA pool trusted for client certificates.
	pub ca_pool: String,
	/// ACME directory URL.
	pub directory_url: String,
	/// Domains certificates are requested for.
	pub domains: Vec<String>,
	/// Account registration email.
	pub registration_email: String,
	/// How often renewal is checked.
	pub tick_frequency: std::time::Duration,
	/// Whether the system CA pool is trusted as well.
	pub use_system_certification_pool: bool,
}
impl AcmeConfig {
	/// Checks the settings an ACME client needs.
	pub fn validate(&self) -> Result<(), TlsError> {
		let invalid = |reason: String| TlsError::InvalidAcme { reason };
		let directory = Url::parse(&self.directory_url)
			.map_err(|e| invalid(format!("directory URL `{}`: {e}", self.directory_url)))?;

		if directory.scheme() != "https" && directory.scheme() != "http" {
			return Err(invalid(format!("directory URL `{directory}` must be http(s)")));
		}
		if self.domains.iter().all(|domain| domain.trim().is_empty()) {
			return Err(invalid("at least one domain is required".into()));
		}
		if !self.registration_email.contains('@') {
			return Err(invalid(format!(
				"registration email `{}` is not an address",
				self.registration_email
			)));
		}
		if self.tick_frequency.is_zero() {
			return Err(invalid("tick frequency must be positive".into()));
		}

		Ok(())
	}
}

/// File-based listener settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileTlsConfig {
	/// CA pool trusted for client certificates; empty disables client authentication.
	pub ca_pool: String,
	/// Directory holding the certificate and key.
	pub cert_dir_path: PathBuf,
	/// Certificate chain file name.
	pub cert_name: String,
	/// Private key file name.
	pub cert_key_name: String,
	/// Whether the system CA pool is trusted as well.
	pub use_system_certification_pool: bool,
}
impl FileTlsConfig {
	/// Path of the certificate chain.
	pub fn cert_path(&self) -> PathBuf {
		self.cert_dir_path.join(&self.cert_name)
	}

	/// Path of the private key.
	pub fn key_path(&self) -> PathBuf {
		self.cert_dir_path.join(&self.cert_key_name)
	}
}

/// Builds the rustls configuration for the listener, or `None` for plaintext.
pub fn server_config(listen: &ListenConfig) -> Result<Option<Arc<ServerConfig>>, TlsError> {
	match listen {
		ListenConfig::None => Ok(None),
		ListenConfig::File(file) => load_server_config(file).map(Some),
		ListenConfig::Acme(acme) => {
			acme.validate()?;

			Err(TlsError::AcmeUnavailable { directory_url: acme.directory_url.clone() })
		},
	}
}

/// Loads PEM material from disk into a rustls [`ServerConfig`].
pub fn load_server_config(file: &FileTlsConfig) -> Result<Arc<ServerConfig>, TlsError> {
	let provider = Arc::new(ring::default_provider());
	let cert_path = file.cert_path();
	let certs = load_certs(&cert_path)?;
	let key = load_key(&file.key_path())?;
	let builder =
		ServerConfig::builder_with_provider(provider.clone()).with_safe_default_protocol_versions()?;
	let builder = if file.ca_pool.is_empty() {
		builder.with_no_client_auth()
	} else {
		builder.with_client_cert_verifier(client_verifier(Path::new(&file.ca_pool), provider)?)
	};

	if file.use_system_certification_pool {
		tracing::warn!("System certificate pool is not consulted for client certificates.");
	}

	let mut config = builder.with_single_cert(certs, key)?;

	config.alpn_protocols = vec![b"http/1.1".to_vec()];

	Ok(Arc::new(config))
}

fn client_verifier(
	ca_pool: &Path,
	provider: Arc<CryptoProvider>,
) -> Result<Arc<dyn rustls::server::danger::ClientCertVerifier>, TlsError> {
	let mut roots = RootCertStore::empty();

	for cert in load_certs(ca_pool)? {
		roots.add(cert)?;
	}

	WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider)
		.build()
		.map_err(|e| TlsError::ClientVerifier { reason: e.to_string() })
}

fn open(path: &Path) -> Result<BufReader<File>, TlsError> {
	File::open(path)
		.map(BufReader::new)
		.map_err(|source| TlsError::Io { path: path.to_owned(), source })
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
	let certs = rustls_pemfile::certs(&mut open(path)?)
		.collect::<Result<Vec<_>, _>>()
		.map_err(|source| TlsError::Io { path: path.to_owned(), source })?;

	if certs.is_empty() {
		return Err(TlsError::NoCertificates { path: path.to_owned() });
	}

	Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
	rustls_pemfile::private_key(&mut open(path)?)
		.map_err(|source| TlsError::Io { path: path.to_owned(), source })?
		.ok_or_else(|| TlsError::NoPrivateKey { path: path.to_owned() })
}

/// TCP listener that completes a TLS handshake before handing connections to axum.
///
/// Failed handshakes are logged and skipped.
pub struct TlsListener {
	tcp: TcpListener,
	acceptor: TlsAcceptor,
}
impl TlsListener {
	/// Wraps a bound listener.
	pub fn new(tcp: TcpListener, config: Arc<ServerConfig>) -> Self {
		Self { tcp, acceptor: TlsAcceptor::from(config) }
	}
}
impl Listener for TlsListener {
	type Addr = SocketAddr;
	type Io = TlsStream<TcpStream>;

	async fn accept(&mut self) -> (Self::Io, Self::Addr) {
		loop {
			let (stream, addr) = match self.tcp.accept().await {
				Ok(accepted) => accepted,
				Err(e) => {
					tracing::warn!(error = %e, "Failed to accept connection.");
					tokio::time::sleep(std::time::Duration::from_millis(100)).await;

					continue;
				},
			};

			match tokio::time::timeout(HANDSHAKE_TIMEOUT, self.acceptor.accept(stream)).await {
				Ok(Ok(tls)) => return (tls, addr),
				Ok(Err(e)) => tracing::debug!(%addr, error = %e, "TLS handshake failed."),
				Err(_) => tracing::debug!(%addr, "TLS handshake timed out."),
			}
		}
	}

	fn local_addr(&self) -> io::Result<Self::Addr> {
		self.tcp.local_addr()
	}
}
impl Debug for TlsListener {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TlsListener").field("local_addr", &self.tcp.local_addr().ok()).finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, fs, process};
	// self
	use super::*;

	fn acme() -> AcmeConfig {
		AcmeConfig {
			ca_pool: String::new(),
			directory_url: "https://acme.example.com/directory".into(),
			domains: vec!["hub.example.com".into()],
			registration_email: "ops@example.com".into(),
			tick_frequency: std::time::Duration::from_secs(15),
			use_system_certification_pool: false,
		}
	}

	#[test]
	fn acme_settings_are_validated_before_failing() {
		let missing_domains = AcmeConfig { domains: vec![String::new()], ..acme() };

		assert!(matches!(missing_domains.validate(), Err(TlsError::InvalidAcme { .. })));
		assert!(matches!(
			AcmeConfig { registration_email: "ops".into(), ..acme() }.validate(),
			Err(TlsError::InvalidAcme { .. })
		));
		assert!(matches!(
			server_config(&ListenConfig::Acme(acme())),
			Err(TlsError::AcmeUnavailable { .. })
		));
	}

	#[test]
	fn plaintext_has_no_server_config() {
		assert!(server_config(&ListenConfig::None).expect("Plaintext should succeed.").is_none());
	}

	#[test]
	fn missing_and_empty_pem_files_are_reported() {
		let dir = env::temp_dir().join(format!(
			"hub_authorization_tls_{}_{}",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos()
		));

		fs::create_dir_all(&dir).expect("Temp dir should be created.");

		let file = FileTlsConfig {
			ca_pool: String::new(),
			cert_dir_path: dir.clone(),
			cert_name: "tls.crt".into(),
			cert_key_name: "tls.key".into(),
			use_system_certification_pool: false,
		};

		assert!(matches!(load_server_config(&file), Err(TlsError::Io { .. })));

		fs::write(file.cert_path(), "not a certificate").expect("Cert fixture should be written.");

		assert!(matches!(load_server_config(&file), Err(TlsError::NoCertificates { .. })));

		fs::remove_dir_all(&dir).expect("Temp dir should be removed.");
	}
}
