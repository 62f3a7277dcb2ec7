//! Client-credentials token kept fresh for service-to-service calls.

// crates.io
use tokio::{sync::watch, task::JoinHandle};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	client::{TokenFuture, TokenSource},
	error::TransientError,
	oauth::{OAuthClient, ProviderTokens},
	obs::CommandKind,
	service::observe,
};

#[derive(Debug, Default)]
struct TokenState {
	token: Option<TokenSecret>,
	refresh_at: Option<OffsetDateTime>,
	last_error: Option<String>,
}
impl TokenState {
	fn apply(&mut self, result: Result<ProviderTokens>, now: OffsetDateTime) {
		match result {
			Ok(tokens) => {
				self.refresh_at = tokens.expires_in.map(|lifetime| now + lifetime * 2 / 3);
				self.token = Some(tokens.access_token);
				self.last_error = None;
			},
			Err(e) => {
				tracing::error!(error = %e, "Service token refresh failed.");

				self.token = None;
				self.refresh_at = Some(now);
				self.last_error = Some(e.to_string());
			},
		}
	}

	fn should_refresh(&self, now: OffsetDateTime) -> bool {
		self.refresh_at.is_some_and(|at| now >= at)
	}
}

/// Holds a client-credentials token and refreshes it once two thirds of its lifetime passed.
///
/// The token is fetched when the manager starts; a background task then checks it every
/// tick. A failed refresh is reported by [`ServiceTokenManager::token`] until a later tick
/// succeeds.
pub struct ServiceTokenManager {
	state: Arc<RwLock<TokenState>>,
	shutdown: watch::Sender<bool>,
	task: Mutex<Option<JoinHandle<()>>>,
}
impl ServiceTokenManager {
	/// Fetches the first token and starts the refresh task.
	pub async fn start(client: OAuthClient, tick: std::time::Duration) -> Result<Self> {
		let first = fetch(&client).await?;
		let mut state = TokenState::default();

		state.apply(Ok(first), OffsetDateTime::now_utc());

		let state = Arc::new(RwLock::new(state));
		let (shutdown, mut stop) = watch::channel(false);
		let task_state = state.clone();
		let task = tokio::spawn(async move {
			let mut ticker = tokio::time::interval(tick);

			// The first tick completes immediately.
			ticker.tick().await;

			loop {
				tokio::select! {
					_ = stop.changed() => break,
					_ = ticker.tick() => {
						let due = task_state.read().should_refresh(OffsetDateTime::now_utc());

						if !due {
							continue;
						}

						let result = fetch(&client).await;

						task_state.write().apply(result, OffsetDateTime::now_utc());
					},
				}
			}

			tracing::debug!("Service token refresh task stopped.");
		});

		Ok(Self { state, shutdown, task: Mutex::new(Some(task)) })
	}

	/// Current token, or the error of the last failed refresh.
	pub fn current(&self) -> Result<TokenSecret> {
		let state = self.state.read();

		if let Some(message) = &state.last_error {
			return Err(TransientError::Unavailable { message: message.clone() }.into());
		}

		state
			.token
			.clone()
			.ok_or_else(|| TransientError::Unavailable { message: "no service token".into() }.into())
	}

	/// Stops the refresh task and waits for it to exit.
	pub async fn close(&self) {
		let _ = self.shutdown.send(true);
		let task = self.task.lock().take();

		if let Some(task) = task {
			if let Err(e) = task.await {
				tracing::warn!(error = %e, "Service token refresh task failed.");
			}
		}
	}
}
impl TokenSource for ServiceTokenManager {
	fn token(&self) -> TokenFuture<'_> {
		Box::pin(async move { self.current() })
	}
}
impl Drop for ServiceTokenManager {
	fn drop(&mut self) {
		let _ = self.shutdown.send(true);
	}
}
impl Debug for ServiceTokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.read();

		f.debug_struct("ServiceTokenManager")
			.field("has_token", &state.token.is_some())
			.field("refresh_at", &state.refresh_at)
			.field("last_error", &state.last_error)
			.finish()
	}
}

async fn fetch(client: &OAuthClient) -> Result<ProviderTokens> {
	observe(CommandKind::ServiceToken, "client_credentials", client.client_credentials()).await
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn tokens(lifetime: Option<Duration>) -> ProviderTokens {
		ProviderTokens {
			access_token: TokenSecret::new("service-token"),
			refresh_token: None,
			expires_in: lifetime,
			id_token: None,
		}
	}

	#[test]
	fn refresh_is_due_after_two_thirds_of_the_lifetime() {
		let now = OffsetDateTime::now_utc();
		let mut state = TokenState::default();

		state.apply(Ok(tokens(Some(Duration::seconds(90)))), now);

		assert!(!state.should_refresh(now + Duration::seconds(59)));
		assert!(state.should_refresh(now + Duration::seconds(60)));
	}

	#[test]
	fn tokens_without_expiry_are_never_refreshed() {
		let now = OffsetDateTime::now_utc();
		let mut state = TokenState::default();

		state.apply(Ok(tokens(None)), now);

		assert!(!state.should_refresh(now + Duration::days(365)));
	}

	#[test]
	fn failures_are_kept_until_the_next_success() {
		let now = OffsetDateTime::now_utc();
		let mut state = TokenState::default();

		state.apply(Ok(tokens(Some(Duration::seconds(90)))), now);
		state.apply(Err(Error::Revoked), now);

		assert!(state.token.is_none());
		assert!(state.last_error.is_some());
		assert!(state.should_refresh(now));

		state.apply(Ok(tokens(Some(Duration::seconds(90)))), now);

		assert!(state.last_error.is_none());
		assert!(state.token.is_some());
	}
}
